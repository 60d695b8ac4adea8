// src/session.rs
//
// Sesión de lectura de un libro: dueña del archivo abierto, del estado de
// paginación y del ancla de lectura. Cada carga de capítulo saca un token
// nuevo; solo el resultado del último token llega a mostrarse.

use std::cell::Cell;
use std::fs::File;
use std::io::BufReader;
use std::rc::Rc;

use log::{debug, info, warn};

use crate::anchor::{ReadingAnchorTracker, ViewportBounds};
use crate::book::Book;
use crate::epub::{open_archive_file, EpubArchive, ZipEpubArchive};
use crate::errors::EpubError;
use crate::navigation::{flatten_toc, Navigator};
use crate::pagination::PaginationController;
use crate::path;
use crate::render::{sanitize_cancellable, ChapterLayout, PageMetrics};

/// Trabajo que una petición más nueva puede dejar obsoleto.
pub trait CancelToken {
    fn is_cancelled(&self) -> bool;
}

/// Token que nunca se cancela, para usos sin concurrencia.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverCancel;

impl CancelToken for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Emisor de tokens de renderizado, monótonamente crecientes.
#[derive(Debug, Clone, Default)]
pub struct RenderGate {
    latest: Rc<Cell<u64>>,
}

impl RenderGate {
    pub fn new() -> Self {
        RenderGate::default()
    }

    pub fn issue(&self) -> RenderToken {
        let id = self.latest.get() + 1;
        self.latest.set(id);
        RenderToken { id, latest: Rc::clone(&self.latest) }
    }

    pub fn latest(&self) -> u64 {
        self.latest.get()
    }
}

/// Token de una carga de capítulo. Queda cancelado en cuanto se emite otro.
#[derive(Debug, Clone)]
pub struct RenderToken {
    id: u64,
    latest: Rc<Cell<u64>>,
}

impl RenderToken {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_current(&self) -> bool {
        self.latest.get() == self.id
    }
}

impl CancelToken for RenderToken {
    fn is_cancelled(&self) -> bool {
        !self.is_current()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentRequest {
    pub id: u64,
    pub spine_index: usize,
    pub fragment: String,
}

/// Saltos a un fragmento dentro de un capítulo, con su propio contador. Solo
/// hay una petición pendiente: la nueva sustituye a la anterior.
#[derive(Debug, Default)]
pub struct FragmentRequests {
    counter: u64,
    pending: Option<FragmentRequest>,
}

impl FragmentRequests {
    pub fn request(&mut self, spine_index: usize, fragment: impl Into<String>) -> u64 {
        self.counter += 1;
        self.pending = Some(FragmentRequest {
            id: self.counter,
            spine_index,
            fragment: fragment.into(),
        });
        self.counter
    }

    pub fn pending(&self) -> Option<&FragmentRequest> {
        self.pending.as_ref()
    }

    pub fn clear(&mut self) {
        self.pending = None;
    }

    /// Saca la petición pendiente si es para el capítulo que acaba de
    /// maquetarse. Si es de otro capítulo se queda esperando.
    pub fn take_ready(&mut self, spine_index: usize) -> Option<FragmentRequest> {
        match &self.pending {
            Some(request) if request.spine_index == spine_index => self.pending.take(),
            _ => None,
        }
    }
}

/// Agrupa ráfagas de peticiones de medida en una sola pasada.
#[derive(Debug, Default)]
pub struct MeasureScheduler {
    pending: bool,
}

impl MeasureScheduler {
    /// Devuelve `true` solo si no había ya una medida pendiente.
    pub fn request(&mut self) -> bool {
        !std::mem::replace(&mut self.pending, true)
    }

    pub fn take(&mut self) -> bool {
        std::mem::take(&mut self.pending)
    }
}

/// Lo que ve el lector: cargando, un error en línea o el contenido.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderState {
    Loading,
    Error(String),
    Content,
}

/// Carga de capítulo en vuelo.
#[derive(Debug, Clone)]
pub struct ChapterLoad {
    pub spine_index: usize,
    pub token: RenderToken,
}

/// Capítulo ya saneado, pendiente de aplicarse.
#[derive(Debug, Clone)]
pub struct PreparedChapter {
    pub spine_index: usize,
    pub token: RenderToken,
    pub markup: String,
}

pub struct ReadingSession<A: EpubArchive> {
    book: Book,
    archive: A,
    navigator: Navigator,
    pager: PaginationController,
    anchors: ReadingAnchorTracker,
    gate: RenderGate,
    fragments: FragmentRequests,
    measure: MeasureScheduler,
    metrics: PageMetrics,
    pending_metrics: Option<PageMetrics>,
    state: RenderState,
    markup: String,
    layout: Option<ChapterLayout>,
}

impl ReadingSession<ZipEpubArchive<BufReader<File>>> {
    /// Abre el .epub del libro en disco.
    pub fn open(book: Book, metrics: PageMetrics) -> Result<Self, EpubError> {
        let archive = open_archive_file(&book.archive_path)?;
        Ok(ReadingSession::new(book, archive, metrics))
    }
}

impl<A: EpubArchive> ReadingSession<A> {
    pub fn new(book: Book, archive: A, metrics: PageMetrics) -> Self {
        let navigator = Navigator::new(book.spine_map(), book.toc.clone());
        info!("Sesión de lectura abierta: '{}' ({} capítulos)", book.title, navigator.total_chapters());
        ReadingSession {
            book,
            archive,
            navigator,
            pager: PaginationController::new(),
            anchors: ReadingAnchorTracker::new(),
            gate: RenderGate::new(),
            fragments: FragmentRequests::default(),
            measure: MeasureScheduler::default(),
            metrics,
            pending_metrics: None,
            state: RenderState::Loading,
            markup: String::new(),
            layout: None,
        }
    }

    pub fn book(&self) -> &Book {
        &self.book
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn pager(&self) -> &PaginationController {
        &self.pager
    }

    pub fn anchors(&self) -> &ReadingAnchorTracker {
        &self.anchors
    }

    pub fn state(&self) -> &RenderState {
        &self.state
    }

    pub fn metrics(&self) -> PageMetrics {
        self.metrics
    }

    /// Marcado saneado del capítulo mostrado.
    pub fn chapter_markup(&self) -> &str {
        &self.markup
    }

    pub fn layout(&self) -> Option<&ChapterLayout> {
        self.layout.as_ref()
    }

    /// Líneas de la página visible; vacío si no hay contenido.
    pub fn page_lines(&self) -> &[String] {
        match (&self.state, &self.layout) {
            (RenderState::Content, Some(layout)) => layout.page_lines(self.pager.page_index()),
            _ => &[],
        }
    }

    /// Primera mitad de una carga: token nuevo y estado "cargando".
    pub fn begin_chapter(&mut self, spine_index: usize) -> Result<ChapterLoad, EpubError> {
        self.navigator.set_current(spine_index)?;
        let token = self.gate.issue();
        debug!("Carga del capítulo {} con token {}", spine_index + 1, token.id());
        self.state = RenderState::Loading;
        Ok(ChapterLoad { spine_index, token })
    }

    /// Lee y sanea el capítulo. `Ok(None)` si una carga más nueva lo ha
    /// dejado obsoleto por el camino.
    pub fn prepare_chapter(&mut self, load: &ChapterLoad) -> Result<Option<PreparedChapter>, EpubError> {
        let chapter_path = self.navigator.chapter_path(load.spine_index)?;
        let html = self
            .archive
            .read_entry_as_text(&chapter_path)
            .ok_or_else(|| EpubError::ChapterNotFound(chapter_path.clone()))?;
        if load.token.is_cancelled() {
            debug!("Token {} obsoleto tras leer {}", load.token.id(), chapter_path);
            return Ok(None);
        }

        let chapter_dir = path::dirname(&chapter_path);
        let book_id = self.book.id.as_str();
        let archive = &self.archive;
        let resolve_asset = |reference: &str| {
            let full_path = path::resolve(chapter_dir, path::strip_query_fragment(reference));
            archive
                .contains(&full_path)
                .then(|| format!("asset://{}/{}", book_id, full_path))
        };

        Ok(sanitize_cancellable(&html, resolve_asset, &load.token).map(|markup| PreparedChapter {
            spine_index: load.spine_index,
            token: load.token.clone(),
            markup,
        }))
    }

    /// Muestra el capítulo preparado, salvo que su token ya no sea el último.
    pub fn apply_chapter(&mut self, prepared: PreparedChapter) -> bool {
        if prepared.token.is_cancelled() {
            debug!(
                "Descartado el capítulo {} (token {} de {})",
                prepared.spine_index + 1,
                prepared.token.id(),
                self.gate.latest()
            );
            return false;
        }
        self.markup = prepared.markup;
        self.pager.reset();
        self.layout_markup();
        self.state = RenderState::Content;
        self.fire_fragment(prepared.spine_index);
        true
    }

    /// Marca como fallida la carga, si sigue siendo la última.
    pub fn fail_chapter(&mut self, load: &ChapterLoad, error: &EpubError) {
        warn!("Capítulo {}: {}", load.spine_index + 1, error);
        if load.token.is_current() {
            self.layout = None;
            self.state = RenderState::Error(error.to_string());
        }
    }

    /// Carga completa de un capítulo. Un error queda en el estado de la
    /// sesión (mensaje en línea) y la sesión sigue siendo usable.
    pub fn open_chapter(&mut self, spine_index: usize) -> bool {
        let load = match self.begin_chapter(spine_index) {
            Ok(load) => load,
            Err(e) => {
                warn!("{}", e);
                return false;
            }
        };
        match self.prepare_chapter(&load) {
            Ok(Some(prepared)) => self.apply_chapter(prepared),
            Ok(None) => false,
            Err(e) => {
                self.fail_chapter(&load, &e);
                false
            }
        }
    }

    pub fn next_chapter(&mut self) -> bool {
        if !self.navigator.next() {
            return false;
        }
        self.fragments.clear();
        self.open_chapter(self.navigator.current_spine_index())
    }

    pub fn prev_chapter(&mut self) -> bool {
        if !self.navigator.prev() {
            return false;
        }
        self.fragments.clear();
        self.open_chapter(self.navigator.current_spine_index())
    }

    /// Capítulo por número (empezando en 1).
    pub fn goto_chapter(&mut self, one_based: usize) -> bool {
        if !self.navigator.goto(one_based) {
            return false;
        }
        self.fragments.clear();
        self.open_chapter(self.navigator.current_spine_index())
    }

    /// Salta a la entrada `index` del TOC aplanado en preorden.
    pub fn jump_to_toc(&mut self, index: usize) -> bool {
        let target = flatten_toc(self.navigator.get_toc())
            .get(index)
            .and_then(|(_, entry)| self.navigator.toc_target(entry));
        let Some((spine_index, fragment)) = target else {
            return false;
        };

        match fragment {
            Some(fragment) => {
                self.fragments.request(spine_index, fragment);
            }
            None => self.fragments.clear(),
        }
        let already_shown =
            spine_index == self.navigator.current_spine_index() && self.state == RenderState::Content;
        if already_shown {
            self.pager.set_page(0);
            self.fire_fragment(spine_index);
            true
        } else {
            self.open_chapter(spine_index)
        }
    }

    /// Página siguiente; al final del capítulo pasa al siguiente.
    pub fn next_page(&mut self) -> bool {
        self.pager.next_page() || self.next_chapter()
    }

    /// Página anterior; al principio del capítulo va a la última página del anterior.
    pub fn prev_page(&mut self) -> bool {
        if self.pager.prev_page() {
            return true;
        }
        let from = self.navigator.current_spine_index();
        self.prev_chapter();
        if self.navigator.current_spine_index() == from {
            return false;
        }
        // Si la carga falló no hay páginas a las que ir
        if self.state == RenderState::Content {
            let last = self.pager.page_count() - 1;
            self.pager.set_page(last);
        }
        true
    }

    pub fn on_wheel(&mut self, delta_x: f64, delta_y: f64) -> bool {
        self.pager.on_wheel(delta_x, delta_y)
    }

    /// Anota un cambio de tamaño. Las ráfagas se agrupan hasta `flush_measure`.
    pub fn on_resize(&mut self, metrics: PageMetrics) {
        self.pending_metrics = Some(metrics);
        if !self.measure.request() {
            debug!("Medida ya pendiente, se agrupa");
        }
    }

    /// Hace la medida pendiente, si la hay. Devuelve si se re-maquetó.
    pub fn flush_measure(&mut self) -> bool {
        if !self.measure.take() {
            return false;
        }
        match self.pending_metrics.take() {
            Some(metrics) => {
                self.relayout(metrics);
                true
            }
            None => false,
        }
    }

    /// Re-maqueta con otro tamaño de página conservando el texto visible.
    pub fn relayout(&mut self, metrics: PageMetrics) {
        let spine_index = self.navigator.current_spine_index();
        match &self.layout {
            Some(layout) => {
                let viewport = ViewportBounds::for_page(self.pager.page_index(), self.pager.viewport_width());
                self.anchors.capture(viewport, layout, spine_index);
            }
            None => self.anchors.clear(),
        }

        self.metrics = metrics;
        if self.state != RenderState::Content {
            self.anchors.clear();
            return;
        }
        self.layout_markup();
        let restored = match &self.layout {
            Some(layout) => self.anchors.restore(layout, spine_index),
            None => None,
        };
        if let Some(offset) = restored {
            self.pager.set_page_by_offset(offset);
        }
        debug!(
            "Re-maquetado a {}x{}: página {} de {}",
            metrics.width,
            metrics.height,
            self.pager.page_index() + 1,
            self.pager.page_count()
        );
    }

    fn layout_markup(&mut self) {
        let layout = ChapterLayout::new(&self.markup, self.metrics);
        self.pager.recalc_layout(layout.content_width(), self.metrics.width as f64);
        self.layout = Some(layout);
    }

    fn fire_fragment(&mut self, spine_index: usize) {
        let Some(request) = self.fragments.take_ready(spine_index) else {
            return;
        };
        let offset = self
            .layout
            .as_ref()
            .and_then(|layout| layout.fragment_offset(&request.fragment));
        match offset {
            Some(offset) => {
                self.pager.set_page_by_offset(offset);
            }
            None => debug!("Fragmento #{} no encontrado en el capítulo", request.fragment),
        }
    }
}

impl<A: EpubArchive> Drop for ReadingSession<A> {
    fn drop(&mut self) {
        debug!("Sesión de lectura cerrada: '{}'", self.book.title);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::Cursor;
    use std::path::PathBuf;

    use super::*;
    use crate::config::ReaderConfig;
    use crate::epub::archive::test_support::zip_bytes;
    use crate::epub::{open_archive, parse_epub_archive};

    pub(crate) type MemoryArchive = ZipEpubArchive<Cursor<Vec<u8>>>;
    pub(crate) type MemorySession = ReadingSession<MemoryArchive>;

    const CONTAINER: &str = r#"<container xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles><rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/></rootfiles>
</container>"#;

    const OPF: &str = r#"<package xmlns="http://www.idpf.org/2007/opf">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/"><dc:title>Prueba</dc:title></metadata>
  <manifest>
    <item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>
    <item id="c1" href="text/c1.xhtml" media-type="application/xhtml+xml"/>
    <item id="c2" href="text/c2.xhtml" media-type="application/xhtml+xml"/>
    <item id="gone" href="text/gone.xhtml" media-type="application/xhtml+xml"/>
    <item id="img" href="img/a.png" media-type="image/png"/>
  </manifest>
  <spine><itemref idref="c1"/><itemref idref="c2"/><itemref idref="gone"/></spine>
</package>"#;

    const NAV: &str = r#"<html><body><nav epub:type="toc"><ol>
  <li><a href="text/c1.xhtml">Uno</a></li>
  <li><a href="text/c2.xhtml#final">Dos, al final</a></li>
</ol></nav></body></html>"#;

    const C1: &str = r#"<html><body><p>Primero</p><p><img src="../img/a.png"/><img src="../img/no.png"/></p></body></html>"#;

    fn long_chapter() -> String {
        let paragraphs: String = (1..=30).map(|i| format!("<p>párrafo número {}</p>", i)).collect();
        format!(r#"<html><body>{}<h2 id="final">Final</h2></body></html>"#, paragraphs)
    }

    fn metrics(width: u16) -> PageMetrics {
        PageMetrics { width, height: 4, margin: 1 }
    }

    pub(crate) fn session() -> MemorySession {
        let c2 = long_chapter();
        let bytes = zip_bytes(&[
            ("META-INF/container.xml", CONTAINER),
            ("OEBPS/content.opf", OPF),
            ("OEBPS/nav.xhtml", NAV),
            ("OEBPS/text/c1.xhtml", C1),
            ("OEBPS/text/c2.xhtml", &c2),
            ("OEBPS/img/a.png", "png"),
        ]);
        let mut archive = open_archive(bytes).unwrap();
        let book = parse_epub_archive(&mut archive, "prueba.epub", PathBuf::from("prueba.epub"), &ReaderConfig::default())
            .unwrap();
        ReadingSession::new(book, archive, metrics(12))
    }

    #[test]
    fn test_render_tokens() {
        let gate = RenderGate::new();
        let first = gate.issue();
        assert!(first.is_current());
        let second = gate.issue();
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
        assert_eq!(second.id(), 2);
    }

    #[test]
    fn test_only_latest_render_is_applied() {
        let mut session = session();
        let load1 = session.begin_chapter(0).unwrap();
        let prepared1 = session.prepare_chapter(&load1).unwrap().unwrap();

        let load2 = session.begin_chapter(1).unwrap();
        let prepared2 = session.prepare_chapter(&load2).unwrap().unwrap();
        assert!(session.apply_chapter(prepared2));

        // La primera llega tarde: no se aplica
        assert!(!session.apply_chapter(prepared1));
        assert!(session.chapter_markup().contains("párrafo número 1"));
        assert!(!session.chapter_markup().contains("Primero"));
        assert_eq!(session.state(), &RenderState::Content);
    }

    #[test]
    fn test_superseded_load_stops_early() {
        let mut session = session();
        let load1 = session.begin_chapter(0).unwrap();
        let _load2 = session.begin_chapter(1).unwrap();
        assert!(session.prepare_chapter(&load1).unwrap().is_none());
    }

    #[test]
    fn test_assets_resolved_against_chapter_directory() {
        let mut session = session();
        assert!(session.open_chapter(0));
        let expected = format!(r#"<img src="asset://{}/OEBPS/img/a.png">"#, session.book().id);
        assert!(session.chapter_markup().contains(&expected));
        // La imagen que no está en el archivo desaparece
        assert!(!session.chapter_markup().contains("no.png"));
        assert_eq!(session.page_lines()[0], "Primero");
    }

    #[test]
    fn test_missing_chapter_is_inline_error() {
        let mut session = session();
        assert!(!session.open_chapter(2));
        match session.state() {
            RenderState::Error(message) => assert!(message.contains("OEBPS/text/gone.xhtml")),
            other => panic!("estado inesperado: {:?}", other),
        }
        assert!(session.page_lines().is_empty());

        // La sesión sigue funcionando
        assert!(session.open_chapter(0));
        assert_eq!(session.state(), &RenderState::Content);
    }

    #[test]
    fn test_toc_jump_to_fragment() {
        let mut session = session();
        assert!(session.open_chapter(0));
        assert!(session.jump_to_toc(1));
        assert_eq!(session.navigator().current_spine_index(), 1);
        assert!(session.pager().page_index() > 0);
        assert_eq!(session.pager().page_index(), session.pager().page_count() - 1);
        assert!(session.page_lines().iter().any(|line| line == "Final"));
        assert!(session.fragments.pending().is_none());
    }

    #[test]
    fn test_newer_fragment_request_wins() {
        let mut requests = FragmentRequests::default();
        let first = requests.request(1, "a");
        let second = requests.request(1, "b");
        assert!(second > first);
        assert!(requests.take_ready(0).is_none());
        let ready = requests.take_ready(1).unwrap();
        assert_eq!(ready.fragment, "b");
        assert!(requests.take_ready(1).is_none());
    }

    #[test]
    fn test_measure_requests_coalesce() {
        let mut measure = MeasureScheduler::default();
        assert!(measure.request());
        assert!(!measure.request());
        assert!(measure.take());
        assert!(!measure.take());
    }

    #[test]
    fn test_resize_keeps_reading_position() {
        let mut session = session();
        assert!(session.open_chapter(1));
        for _ in 0..5 {
            session.next_page();
        }
        let before: Vec<String> = session.page_lines().to_vec();
        let number = before
            .iter()
            .find(|line| line.starts_with("número"))
            .cloned()
            .unwrap();

        // Tres eventos de tamaño, una sola re-maquetación con el último
        session.on_resize(metrics(20));
        session.on_resize(metrics(25));
        session.on_resize(metrics(30));
        assert!(session.flush_measure());
        assert!(!session.flush_measure());
        assert_eq!(session.metrics().width, 30);

        let needle = format!("párrafo {}", number);
        assert!(session.page_lines().iter().any(|line| line.contains(&needle)));
    }

    // Libro con los capítulos dados, en ese orden de spine. Un capítulo sin
    // contenido se declara en el manifiesto pero no se mete en el ZIP.
    fn session_with(chapters: &[(&str, Option<&str>)]) -> MemorySession {
        let items: String = chapters
            .iter()
            .map(|(id, _)| format!(r#"<item id="{0}" href="{0}.xhtml" media-type="application/xhtml+xml"/>"#, id))
            .collect();
        let itemrefs: String = chapters.iter().map(|(id, _)| format!(r#"<itemref idref="{}"/>"#, id)).collect();
        let opf = format!(
            r#"<package xmlns="http://www.idpf.org/2007/opf">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/"><dc:title>Otro</dc:title></metadata>
  <manifest>{}</manifest>
  <spine>{}</spine>
</package>"#,
            items, itemrefs
        );
        let paths: Vec<(String, &str)> = chapters
            .iter()
            .filter_map(|(id, content)| content.map(|content| (format!("OEBPS/{}.xhtml", id), content)))
            .collect();
        let mut entries = vec![("META-INF/container.xml", CONTAINER), ("OEBPS/content.opf", opf.as_str())];
        entries.extend(paths.iter().map(|(path, content)| (path.as_str(), *content)));

        let mut archive = open_archive(zip_bytes(&entries)).unwrap();
        let book = parse_epub_archive(&mut archive, "otro.epub", PathBuf::from("otro.epub"), &ReaderConfig::default())
            .unwrap();
        ReadingSession::new(book, archive, metrics(12))
    }

    #[test]
    fn test_resize_on_image_only_page_does_not_jump_back() {
        let images = "<img/>".repeat(8);
        let chapter = format!(
            "<html><body><p>alfa</p><p>beta</p><p>gamma</p><p>delta</p><p>eps</p><p>zeta</p>{}</body></html>",
            images
        );
        let mut session = session_with(&[("c1", Some(chapter.as_str()))]);
        assert!(session.open_chapter(0));
        assert_eq!(session.pager().page_count(), 5);

        session.next_page();
        assert_eq!(session.page_lines()[0], "gamma");
        session.on_resize(metrics(12));
        assert!(session.flush_measure());
        assert_eq!(session.pager().page_index(), 1);
        // El ancla se gasta en la re-maquetación
        assert!(session.anchors().anchor().is_none());

        for _ in 0..3 {
            session.next_page();
        }
        assert_eq!(session.pager().page_index(), 4);
        assert!(session.page_lines().iter().all(|line| line == "[imagen]"));

        // Sin texto visible no hay ancla: la página se queda donde estaba
        session.on_resize(metrics(12));
        assert!(session.flush_measure());
        assert_eq!(session.pager().page_index(), 4);
    }

    #[test]
    fn test_prev_page_into_failed_chapter_still_moves() {
        let mut session = session_with(&[("roto", None), ("c1", Some(C1))]);
        assert!(session.open_chapter(1));
        assert_eq!(session.pager().page_index(), 0);

        // El capítulo anterior no se puede cargar, pero el lector sí se movió
        assert!(session.prev_page());
        assert_eq!(session.navigator().current_spine_index(), 0);
        assert!(matches!(session.state(), RenderState::Error(_)));
        assert_eq!(session.pager().page_index(), 0);
        assert!(session.page_lines().is_empty());

        // Ya en el primero: no hay a dónde ir
        assert!(!session.prev_page());
    }

    #[test]
    fn test_page_turns_cross_chapters() {
        let mut session = session();
        assert!(session.open_chapter(0));
        while session.pager().page_index() + 1 < session.pager().page_count() {
            session.next_page();
        }
        assert!(session.next_page());
        assert_eq!(session.navigator().current_spine_index(), 1);
        assert_eq!(session.pager().page_index(), 0);

        assert!(session.prev_page());
        assert_eq!(session.navigator().current_spine_index(), 0);
        assert_eq!(session.pager().page_index(), session.pager().page_count() - 1);
        assert!(!session.prev_chapter());
    }
}
