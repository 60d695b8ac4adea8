// src/ui/mod.rs
use std::io;
use std::time::Duration;

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, MouseEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::{info, warn};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame, Terminal,
};

use crate::book::Book;
use crate::epub::EpubArchive;
use crate::errors::EpubError;
use crate::navigation::flatten_toc;
use crate::render::PageMetrics;
use crate::session::{ReadingSession, RenderState};

// Barra superior + barra inferior
const BAR_LINES: u16 = 2;

// Modos de la aplicación
pub enum AppMode {
    Normal,
    Command,
}

// Estado de la aplicación
pub struct App<A: EpubArchive> {
    pub session: ReadingSession<A>,
    pub margin: u16,
    pub command_input: String,
    pub mode: AppMode,
    pub status_message: String,
    pub toc_selected: usize, // Entrada resaltada en la tabla de contenidos
    pub should_quit: bool,
    pub show_metadata: bool,
    pub show_toc: bool,
}

impl<A: EpubArchive> App<A> {
    pub fn new(session: ReadingSession<A>, margin: u16) -> Self {
        App {
            session,
            margin,
            command_input: String::new(),
            mode: AppMode::Normal,
            status_message: String::new(),
            toc_selected: 0,
            should_quit: false,
            show_metadata: false,
            show_toc: false,
        }
    }

    pub fn load_first_chapter(&mut self) {
        if self.session.navigator().total_chapters() == 0 {
            self.status_message = "El libro no tiene capítulos".to_string();
            return;
        }
        self.session.open_chapter(0);
        self.update_status();
    }

    // Capítulo, página y entrada del TOC actuales
    fn update_status(&mut self) {
        let navigator = self.session.navigator();
        let (current, total) = navigator.current_position();
        let pager = self.session.pager();
        let mut status = format!(
            "Capítulo {} de {} · página {} de {}",
            current,
            total,
            pager.page_index() + 1,
            pager.page_count()
        );
        if let Some(label) = navigator.current_toc_label() {
            status.push_str(" · ");
            status.push_str(label);
        }
        self.status_message = status;
    }

    pub fn next_page(&mut self) {
        if self.session.next_page() {
            self.update_status();
        } else {
            self.status_message = "Fin del libro".to_string();
        }
    }

    pub fn prev_page(&mut self) {
        if self.session.prev_page() {
            self.update_status();
        } else {
            self.status_message = "Principio del libro".to_string();
        }
    }

    pub fn next_chapter(&mut self) {
        if self.session.next_chapter() {
            self.update_status();
        } else {
            self.status_message = "Ya estás en el último capítulo".to_string();
        }
    }

    pub fn prev_chapter(&mut self) {
        if self.session.prev_chapter() {
            self.update_status();
        } else {
            self.status_message = "Ya estás en el primer capítulo".to_string();
        }
    }

    // Navega a un capítulo específico (basado en 1)
    pub fn goto_chapter(&mut self, index: usize) {
        if self.session.goto_chapter(index) {
            self.update_status();
        } else {
            self.status_message = format!("Capítulo {} no válido", index);
        }
    }

    // Salta a la entrada del TOC (basada en 1)
    pub fn goto_toc_entry(&mut self, index: usize) {
        let jumped = index > 0 && self.session.jump_to_toc(index - 1);
        if jumped {
            self.show_toc = false;
            self.update_status();
        } else {
            self.status_message = format!("Entrada del índice {} no válida", index);
        }
    }

    pub fn on_resize(&mut self, width: u16, height: u16) {
        self.session.on_resize(page_metrics(width, height, self.margin));
    }

    // Se llama una vez por vuelta del bucle: agrupa los cambios de tamaño
    pub fn flush_resize(&mut self) {
        if self.session.flush_measure() {
            self.update_status();
        }
    }

    // Procesa la entrada de comandos
    pub fn process_command(&mut self) {
        let cmd = self.command_input.trim().to_lowercase();
        let parts: Vec<&str> = cmd.split_whitespace().collect();

        match parts.as_slice() {
            ["q"] | ["quit"] => {
                self.should_quit = true;
            }
            ["n"] | ["next"] => {
                self.next_chapter();
            }
            ["p"] | ["prev"] => {
                self.prev_chapter();
            }
            ["g", index_str] | ["goto", index_str] => match index_str.parse::<usize>() {
                Ok(index) => self.goto_chapter(index),
                Err(_) => self.status_message = format!("Número de capítulo inválido: {}", index_str),
            },
            ["toc", index_str] => match index_str.parse::<usize>() {
                Ok(index) => self.goto_toc_entry(index),
                Err(_) => self.status_message = format!("Número de entrada inválido: {}", index_str),
            },
            ["t"] | ["toc"] => {
                self.show_toc = true;
                self.show_metadata = false;
            }
            ["m"] | ["meta"] => {
                self.show_metadata = true;
                self.show_toc = false;
            }
            [] => {}
            _ => {
                self.status_message = format!("Comando desconocido: {}", cmd);
            }
        }

        self.command_input.clear();
        self.mode = AppMode::Normal;
    }

    // Maneja eventos de teclado
    pub fn handle_key_event(&mut self, key: KeyCode) {
        match self.mode {
            AppMode::Normal if self.show_toc => {
                let entries = flatten_toc(self.session.navigator().get_toc()).len();
                match key {
                    KeyCode::Char('j') | KeyCode::Down => {
                        if self.toc_selected + 1 < entries {
                            self.toc_selected += 1;
                        }
                    }
                    KeyCode::Char('k') | KeyCode::Up => {
                        self.toc_selected = self.toc_selected.saturating_sub(1);
                    }
                    KeyCode::Enter => self.goto_toc_entry(self.toc_selected + 1),
                    KeyCode::Esc | KeyCode::Char('t') => self.show_toc = false,
                    KeyCode::Char('q') => self.should_quit = true,
                    _ => {}
                }
            }
            AppMode::Normal => match key {
                KeyCode::Right | KeyCode::Char('l') | KeyCode::Char(' ') | KeyCode::PageDown => self.next_page(),
                KeyCode::Left | KeyCode::Char('h') | KeyCode::PageUp => self.prev_page(),
                KeyCode::Char('n') => self.next_chapter(),
                KeyCode::Char('p') => self.prev_chapter(),
                KeyCode::Char('t') => {
                    self.show_toc = true;
                    self.show_metadata = false;
                }
                KeyCode::Char('m') => {
                    self.show_metadata = !self.show_metadata;
                    self.show_toc = false;
                }
                KeyCode::Char(':') => {
                    self.mode = AppMode::Command;
                    self.command_input.clear();
                }
                KeyCode::Char('q') => self.should_quit = true,
                KeyCode::Esc => {
                    self.show_toc = false;
                    self.show_metadata = false;
                }
                _ => {}
            },
            AppMode::Command => match key {
                KeyCode::Enter => self.process_command(),
                KeyCode::Char(c) => self.command_input.push(c),
                KeyCode::Backspace => {
                    self.command_input.pop();
                }
                KeyCode::Esc => {
                    self.command_input.clear();
                    self.mode = AppMode::Normal;
                }
                _ => {}
            },
        }
    }

    // Rueda del ratón: páginas en la lectura, selección en el índice
    pub fn handle_wheel(&mut self, delta_x: f64, delta_y: f64) {
        if self.show_toc {
            if delta_y > 0.0 {
                self.handle_key_event(KeyCode::Down);
            } else if delta_y < 0.0 {
                self.handle_key_event(KeyCode::Up);
            }
        } else if self.session.on_wheel(delta_x, delta_y) {
            self.update_status();
        }
    }
}

/// Tamaño de página para un terminal de `width` x `height` celdas.
pub fn page_metrics(width: u16, height: u16, margin: u16) -> PageMetrics {
    PageMetrics {
        width,
        height: height.saturating_sub(BAR_LINES),
        margin,
    }
}

// Función para ejecutar la UI
pub fn run_app<B: Backend, A: EpubArchive>(terminal: &mut Terminal<B>, app: &mut App<A>) -> io::Result<()> {
    app.load_first_chapter();

    loop {
        terminal.draw(|f| ui(f, app))?;

        if event::poll(Duration::from_millis(100))? {
            match event::read()? {
                Event::Key(key) if key.kind == event::KeyEventKind::Press => app.handle_key_event(key.code),
                Event::Mouse(mouse) => match mouse.kind {
                    MouseEventKind::ScrollDown => app.handle_wheel(0.0, 1.0),
                    MouseEventKind::ScrollUp => app.handle_wheel(0.0, -1.0),
                    MouseEventKind::ScrollRight => app.handle_wheel(1.0, 0.0),
                    MouseEventKind::ScrollLeft => app.handle_wheel(-1.0, 0.0),
                    _ => {}
                },
                Event::Resize(width, height) => app.on_resize(width, height),
                _ => {}
            }
        }
        app.flush_resize();

        if app.should_quit {
            return Ok(());
        }
    }
}

// Función para renderizar la UI
fn ui<A: EpubArchive>(f: &mut Frame<'_>, app: &App<A>) {
    let size = f.size();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Barra de estado superior
            Constraint::Min(1),    // Contenido principal
            Constraint::Length(1), // Barra de estado inferior o entrada de comando
        ])
        .split(size);

    let title_widget =
        Paragraph::new(app.session.book().title.as_str()).style(Style::default().bg(Color::Blue).fg(Color::White));
    f.render_widget(title_widget, chunks[0]);

    if app.show_metadata {
        render_metadata(f, chunks[1], app.session.book());
    } else if app.show_toc {
        render_toc(f, chunks[1], app);
    } else {
        render_content(f, chunks[1], app);
    }

    match app.mode {
        AppMode::Normal => {
            let status = Paragraph::new(app.status_message.as_str()).style(Style::default().bg(Color::Blue).fg(Color::White));
            f.render_widget(status, chunks[2]);
        }
        AppMode::Command => {
            let command = format!(":{}", app.command_input);
            let command_widget = Paragraph::new(command).style(Style::default().bg(Color::Black).fg(Color::White));
            f.render_widget(command_widget, chunks[2]);
        }
    }
}

// Los tres estados visibles: cargando, error en línea o la página
fn render_content<A: EpubArchive>(f: &mut Frame<'_>, area: Rect, app: &App<A>) {
    let lines: Vec<Line> = match app.session.state() {
        RenderState::Loading => vec![Line::from(Span::styled(
            "Cargando…",
            Style::default().add_modifier(Modifier::ITALIC),
        ))],
        RenderState::Error(message) => vec![Line::from(Span::styled(message.as_str(), Style::default().fg(Color::Red)))],
        RenderState::Content => {
            let indent = " ".repeat(app.session.metrics().margin as usize);
            app.session
                .page_lines()
                .iter()
                .map(|line| Line::from(format!("{}{}", indent, line)))
                .collect()
        }
    };

    let text_widget = Paragraph::new(lines).block(Block::default().borders(Borders::NONE));
    f.render_widget(text_widget, area);
}

// Función para renderizar la tabla de contenidos
fn render_toc<A: EpubArchive>(f: &mut Frame<'_>, area: Rect, app: &App<A>) {
    let mut toc_text = vec![Line::from(vec![Span::styled(
        "Tabla de Contenidos",
        Style::default().add_modifier(Modifier::BOLD),
    )])];

    for (i, (depth, entry)) in flatten_toc(app.session.navigator().get_toc()).into_iter().enumerate() {
        let style = if i == app.toc_selected {
            Style::default().bg(Color::Rgb(40, 40, 40))
        } else {
            Style::default()
        };
        toc_text.push(Line::from(vec![
            Span::raw(format!("{:>3}. {}", i + 1, "  ".repeat(depth))),
            Span::styled(entry.label.clone(), style),
        ]));
    }

    // Mantener la selección a la vista
    let visible = area.height as usize;
    let scroll = (app.toc_selected + 1).saturating_sub(visible / 2) as u16;

    let toc_widget = Paragraph::new(toc_text)
        .block(Block::default().borders(Borders::NONE))
        .scroll((scroll, 0))
        .wrap(Wrap { trim: true });

    f.render_widget(toc_widget, area);
}

// Función para renderizar los metadatos
fn render_metadata(f: &mut Frame<'_>, area: Rect, book: &Book) {
    let metadata = &book.metadata;
    let field = |name: &'static str, value: Option<&str>| {
        Line::from(vec![Span::raw(name), Span::raw(value.unwrap_or("N/A").to_string())])
    };

    let meta_text = vec![
        Line::from(vec![Span::styled("Metadatos", Style::default().add_modifier(Modifier::BOLD))]),
        field("Título: ", Some(book.title.as_str())),
        field("Autor: ", metadata.creator.as_deref()),
        field("Idioma: ", metadata.language.as_deref()),
        field("Identificador: ", metadata.identifier.as_deref()),
        field("Editor: ", metadata.publisher.as_deref()),
        field("Fecha: ", metadata.date.as_deref()),
        field("Portada: ", book.cover.as_ref().map(|cover| cover.path.as_str())),
        field("Escritura vertical: ", Some(if book.is_vertical { "sí" } else { "no" })),
        field("Importado: ", Some(book.created_at.format("%Y-%m-%d %H:%M").to_string().as_str())),
    ];

    let meta_widget = Paragraph::new(meta_text)
        .block(Block::default().borders(Borders::NONE))
        .wrap(Wrap { trim: true });

    f.render_widget(meta_widget, area);
}

/// Deja el terminal como estaba al salir, también si algo falla a medias.
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> io::Result<Self> {
        enable_raw_mode()?;
        execute!(io::stdout(), EnterAlternateScreen, EnableMouseCapture)?;
        Ok(TerminalGuard)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if let Err(e) = disable_raw_mode() {
            warn!("No se pudo desactivar el modo raw: {}", e);
        }
        if let Err(e) = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture) {
            warn!("No se pudo restaurar el terminal: {}", e);
        }
    }
}

// Inicializa el terminal y ejecuta la aplicación
pub fn start_ui(book: Book, margin: u16) -> Result<(), EpubError> {
    let guard = TerminalGuard::enter()?;
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)?;

    let size = terminal.size()?;
    let session = ReadingSession::open(book, page_metrics(size.width, size.height, margin))?;
    let mut app = App::new(session, margin);

    let res = run_app(&mut terminal, &mut app);
    info!("Lectura terminada: '{}'", app.session.book().title);

    // La sesión se suelta antes de restaurar el terminal
    drop(app);
    terminal.show_cursor()?;
    drop(guard);

    res.map_err(EpubError::from)
}
