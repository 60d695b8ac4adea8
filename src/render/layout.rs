// src/render/layout.rs
//
// Maquetación en columnas del capítulo saneado: cada columna mide lo que la
// página (una celda del terminal = un píxel) y las columnas se suceden en
// horizontal, como hace el navegador con `column-width`. De paso se anota
// dónde cae cada carácter de cada nodo de texto para poder capturar y
// restaurar anclas de lectura.

use std::collections::HashMap;

use ego_tree::NodeRef;
use scraper::{Html, Node};
use textwrap::WordSeparator;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::anchor::{Rect, TextGeometry, TextNodeBoxes};
use crate::render::sanitize::body_of;

const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "section", "article", "aside", "header", "footer", "nav", "blockquote", "figure",
    "figcaption", "li", "ul", "ol", "dl", "dt", "dd", "table", "tr", "pre", "hr", "h1", "h2", "h3", "h4",
    "h5", "h6",
];

// Tras estos se deja una línea en blanco
const SPACED_ELEMENTS: &[&str] = &["p", "blockquote", "figure", "h1", "h2", "h3", "h4", "h5", "h6"];

const SKIPPED_ELEMENTS: &[&str] = &["head", "title", "script", "style", "meta", "link", "noscript"];

/// Tamaño de página en celdas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageMetrics {
    pub width: u16,
    pub height: u16,
    pub margin: u16,
}

impl PageMetrics {
    fn text_width(&self) -> usize {
        (self.width as usize).saturating_sub(2 * self.margin as usize).max(1)
    }

    fn lines_per_column(&self) -> usize {
        (self.height as usize).max(1)
    }
}

#[derive(Debug, Clone)]
struct Glyph {
    offset: usize,
    line: usize,
    x: usize,
    width: usize,
}

#[derive(Debug, Clone)]
struct TextRun {
    path: Vec<usize>,
    char_len: usize,
    glyphs: Vec<Glyph>,
    rects: Vec<Rect>,
}

/// Capítulo maquetado para un tamaño de página concreto.
#[derive(Debug, Clone)]
pub struct ChapterLayout {
    metrics: PageMetrics,
    lines: Vec<String>,
    runs: Vec<TextRun>,
    run_by_path: HashMap<Vec<usize>, usize>,
    // id de elemento -> línea donde empieza
    fragments: HashMap<String, usize>,
}

impl ChapterLayout {
    pub fn new(body_markup: &str, metrics: PageMetrics) -> Self {
        let document = Html::parse_document(body_markup);
        let body = body_of(&document);

        let mut builder = Builder::new(metrics);
        let mut path = Vec::new();
        for (index, child) in body.children().enumerate() {
            path.push(index);
            builder.walk(child, &mut path);
            path.pop();
        }
        builder.finish()
    }

    pub fn metrics(&self) -> PageMetrics {
        self.metrics
    }

    pub fn column_count(&self) -> usize {
        self.lines.len().div_ceil(self.metrics.lines_per_column()).max(1)
    }

    pub fn content_width(&self) -> f64 {
        (self.column_count() * self.metrics.width as usize) as f64
    }

    /// Líneas de la columna `page_index`.
    pub fn page_lines(&self, page_index: usize) -> &[String] {
        let per_column = self.metrics.lines_per_column();
        let start = (page_index * per_column).min(self.lines.len());
        let end = (start + per_column).min(self.lines.len());
        &self.lines[start..end]
    }

    /// Desplazamiento del contenido donde empieza el elemento con ese id.
    pub fn fragment_offset(&self, id: &str) -> Option<f64> {
        let line = *self.fragments.get(id)?;
        Some(self.column_left(line))
    }

    fn column_left(&self, line: usize) -> f64 {
        let column = line / self.metrics.lines_per_column();
        (column * self.metrics.width as usize) as f64
    }

    fn glyph_rect(&self, glyph: &Glyph) -> Rect {
        let per_column = self.metrics.lines_per_column();
        Rect {
            left: self.column_left(glyph.line) + (self.metrics.margin as usize + glyph.x) as f64,
            top: (glyph.line % per_column) as f64,
            width: glyph.width as f64,
            height: 1.0,
        }
    }
}

impl TextGeometry for ChapterLayout {
    fn text_nodes(&self) -> Vec<TextNodeBoxes<'_>> {
        self.runs
            .iter()
            .map(|run| TextNodeBoxes { path: &run.path, rects: &run.rects })
            .collect()
    }

    fn text_len(&self, path: &[usize]) -> Option<usize> {
        let run = &self.runs[*self.run_by_path.get(path)?];
        Some(run.char_len)
    }

    fn char_left(&self, path: &[usize], offset: usize) -> Option<f64> {
        let run = &self.runs[*self.run_by_path.get(path)?];
        // Los espacios colapsados no tienen glifo: el siguiente que sí
        let glyph = run
            .glyphs
            .iter()
            .find(|glyph| glyph.offset >= offset)
            .or_else(|| run.glyphs.last())?;
        Some(self.glyph_rect(glyph).left)
    }
}

// Carácter pendiente de colocar, con el nodo de texto del que viene
#[derive(Debug, Clone, Copy)]
struct InlineChar {
    c: char,
    source: Option<(usize, usize)>,
}

struct Builder {
    metrics: PageMetrics,
    lines: Vec<String>,
    current: String,
    x: usize,
    inline: Vec<InlineChar>,
    pending_ids: Vec<(String, usize)>,
    runs: Vec<TextRun>,
    fragments: HashMap<String, usize>,
}

impl Builder {
    fn new(metrics: PageMetrics) -> Self {
        Builder {
            metrics,
            lines: Vec::new(),
            current: String::new(),
            x: 0,
            inline: Vec::new(),
            pending_ids: Vec::new(),
            runs: Vec::new(),
            fragments: HashMap::new(),
        }
    }

    fn walk(&mut self, node: NodeRef<Node>, path: &mut Vec<usize>) {
        match node.value() {
            Node::Text(text) => self.push_text(&text.text, path),
            Node::Element(element) => {
                let name = element.name();
                if SKIPPED_ELEMENTS.contains(&name) {
                    return;
                }
                if let Some(id) = element.id() {
                    self.pending_ids.push((id.to_string(), self.inline.len()));
                }
                match name {
                    "br" => {
                        self.flush();
                        return;
                    }
                    "img" | "svg" => {
                        self.flush();
                        let alt = element.attr("alt").map(str::trim).filter(|alt| !alt.is_empty());
                        self.push_line(match alt {
                            Some(alt) => format!("[imagen: {}]", alt),
                            None => "[imagen]".to_string(),
                        });
                        return;
                    }
                    _ => {}
                }

                let is_block = BLOCK_ELEMENTS.contains(&name);
                if is_block {
                    self.flush();
                }
                for (index, child) in node.children().enumerate() {
                    path.push(index);
                    self.walk(child, path);
                    path.pop();
                }
                if is_block {
                    self.flush();
                }
                if SPACED_ELEMENTS.contains(&name) {
                    self.blank_line();
                }
            }
            _ => {}
        }
    }

    fn push_text(&mut self, text: &str, path: &[usize]) {
        let run_index = self.runs.len();
        self.runs.push(TextRun {
            path: path.to_vec(),
            char_len: text.chars().count(),
            glyphs: Vec::new(),
            rects: Vec::new(),
        });

        for (offset, c) in text.chars().enumerate() {
            if c.is_whitespace() {
                // Espacios colapsados, como en HTML
                let last_is_space = self.inline.last().map_or(true, |last| last.c == ' ');
                if !last_is_space {
                    self.inline.push(InlineChar { c: ' ', source: None });
                }
            } else {
                self.inline.push(InlineChar { c, source: Some((run_index, offset)) });
            }
        }
    }

    /// Coloca el texto en línea acumulado en líneas de la columna.
    fn flush(&mut self) {
        while self.inline.last().map_or(false, |last| last.c == ' ') {
            self.inline.pop();
        }
        if self.inline.is_empty() {
            let line = self.lines.len();
            for (id, _) in self.pending_ids.drain(..) {
                self.fragments.entry(id).or_insert(line);
            }
            return;
        }

        let inline = std::mem::take(&mut self.inline);
        let text: String = inline.iter().map(|ic| ic.c).collect();
        let char_starts: Vec<usize> = text.char_indices().map(|(byte, _)| byte).collect();
        let mut char_lines = vec![0; inline.len()];

        let text_width = self.metrics.text_width();
        let mut byte = 0;
        for word in WordSeparator::UnicodeBreakProperties.find_words(&text) {
            // Las palabras cubren el texto de forma contigua; si no, se busca
            let start = if text[byte..].starts_with(word.word) {
                byte
            } else {
                text[byte..].find(word.word).map_or(byte, |pos| byte + pos)
            };
            byte = start + word.word.len() + word.whitespace.len();
            let first_char = char_starts.partition_point(|&b| b < start);

            let word_width = UnicodeWidthStr::width(word.word);
            if self.x > 0 && self.x + word_width > text_width {
                self.break_line();
            }
            for (i, c) in word.word.chars().enumerate() {
                let char_index = first_char + i;
                let width = UnicodeWidthChar::width(c).unwrap_or(0);
                if self.x > 0 && self.x + width > text_width {
                    self.break_line();
                }
                if let Some((run, offset)) = inline.get(char_index).and_then(|ic| ic.source) {
                    self.runs[run].glyphs.push(Glyph { offset, line: self.lines.len(), x: self.x, width });
                }
                if let Some(slot) = char_lines.get_mut(char_index) {
                    *slot = self.lines.len();
                }
                self.current.push(c);
                self.x += width;
            }
            if !word.whitespace.is_empty() && self.x > 0 && self.x < text_width {
                let space_index = first_char + word.word.chars().count();
                if let Some(slot) = char_lines.get_mut(space_index) {
                    *slot = self.lines.len();
                }
                self.current.push(' ');
                self.x += 1;
            }
        }
        self.break_line();

        for (id, char_index) in self.pending_ids.drain(..) {
            let line = char_lines.get(char_index).copied().unwrap_or(self.lines.len());
            self.fragments.entry(id).or_insert(line);
        }
    }

    fn break_line(&mut self) {
        let line = std::mem::take(&mut self.current);
        self.lines.push(line.trim_end().to_string());
        self.x = 0;
    }

    fn push_line(&mut self, line: String) {
        self.lines.push(line);
    }

    fn blank_line(&mut self) {
        if self.lines.last().map_or(false, |last| !last.is_empty()) {
            self.lines.push(String::new());
        }
    }

    fn finish(mut self) -> ChapterLayout {
        self.flush();
        while self.lines.last().map_or(false, |last| last.is_empty()) {
            self.lines.pop();
        }

        let mut layout = ChapterLayout {
            metrics: self.metrics,
            lines: self.lines,
            runs: Vec::new(),
            run_by_path: HashMap::new(),
            fragments: self.fragments,
        };

        let mut runs = self.runs;
        for run in &mut runs {
            run.rects = line_rects(&layout, &run.glyphs);
        }
        layout.run_by_path = runs.iter().enumerate().map(|(i, run)| (run.path.clone(), i)).collect();
        layout.runs = runs;
        layout
    }
}

// Una caja por línea ocupada por el nodo
fn line_rects(layout: &ChapterLayout, glyphs: &[Glyph]) -> Vec<Rect> {
    let mut rects: Vec<(usize, Rect)> = Vec::new();
    for glyph in glyphs {
        let rect = layout.glyph_rect(glyph);
        match rects.last_mut() {
            Some((line, current)) if *line == glyph.line => {
                let right = current.right().max(rect.right());
                current.left = current.left.min(rect.left);
                current.width = right - current.left;
            }
            _ => rects.push((glyph.line, rect)),
        }
    }
    rects.into_iter().map(|(_, rect)| rect).collect()
}
