// src/render/mod.rs
//
// De XHTML del capítulo a algo que se puede pintar: primero se sanea
// (recursos resueltos o quitados) y luego se maqueta en columnas.

pub mod layout;
pub mod sanitize;

pub use layout::{ChapterLayout, PageMetrics};
pub use sanitize::{sanitize, sanitize_cancellable};
