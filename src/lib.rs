// src/lib.rs
//
// Lector de EPUB: importación (estructura, TOC, escritura vertical),
// saneado y maquetación de capítulos, y paginación estable frente a
// cambios de tamaño.

pub mod anchor;
pub mod book;
pub mod config;
pub mod epub;
pub mod errors;
pub mod metadata;
pub mod navigation;
pub mod pagination;
pub mod path;
pub mod render;
pub mod session;
pub mod store;
pub mod toc;
pub mod ui;
pub mod vertical;

pub use book::{Book, CoverRef};
pub use config::{ReaderConfig, TocHeuristics};
pub use epub::{parse_epub, parse_epub_archive};
pub use errors::{EpubError, ImportError};
pub use navigation::TocEntry;
pub use pagination::{PaginationController, PaginationState};
pub use session::{ReadingSession, RenderState};
pub use store::{BookStore, JsonBookStore, MemoryBookStore};
