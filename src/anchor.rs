// src/anchor.rs
//
// Mantiene la posición de lectura a través de re-maquetaciones. Los límites
// de página dependen del ancho del viewport, así que tras un cambio de tamaño
// la página se vuelve a calcular desde el texto que se estaba leyendo, nunca
// desde el índice numérico anterior.

use log::debug;
use serde::{Deserialize, Serialize};

/// Caja de un fragmento de texto maquetado, en coordenadas del contenido.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }
}

/// Franja horizontal visible del contenido.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportBounds {
    pub left: f64,
    pub right: f64,
}

impl ViewportBounds {
    pub fn for_page(page_index: usize, page_width: f64) -> Self {
        let left = page_index as f64 * page_width;
        ViewportBounds { left, right: left + page_width }
    }

    fn intersects(&self, rect: &Rect) -> bool {
        rect.left < self.right && rect.right() > self.left
    }
}

/// Nodo de texto maquetado visto por el rastreador.
#[derive(Debug, Clone, Copy)]
pub struct TextNodeBoxes<'a> {
    // Índices de hijo desde la raíz del contenido hasta el nodo de texto
    pub path: &'a [usize],
    pub rects: &'a [Rect],
}

/// Geometría de un contenido ya maquetado, direccionable por rutas de nodo.
/// Es lo que en un navegador daría el árbol DOM vivo.
pub trait TextGeometry {
    /// Nodos de texto en orden de documento.
    fn text_nodes(&self) -> Vec<TextNodeBoxes<'_>>;

    /// Longitud en caracteres del nodo de texto en `path`, si la ruta sigue
    /// llevando a un nodo de texto.
    fn text_len(&self, path: &[usize]) -> Option<usize>;

    /// Posición horizontal (coordenadas del contenido) del carácter `offset`.
    fn char_left(&self, path: &[usize], offset: usize) -> Option<f64>;
}

/// "El lector estaba mirando este carácter."
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingAnchor {
    pub spine_index: usize,
    pub node_path: Vec<usize>,
    pub char_offset: usize,
}

/// Captura y restaura el ancla. Solo guarda un valor en vuelo, sin historial.
#[derive(Debug, Default)]
pub struct ReadingAnchorTracker {
    anchor: Option<ReadingAnchor>,
}

impl ReadingAnchorTracker {
    pub fn new() -> Self {
        ReadingAnchorTracker::default()
    }

    pub fn anchor(&self) -> Option<&ReadingAnchor> {
        self.anchor.as_ref()
    }

    pub fn clear(&mut self) {
        self.anchor = None;
    }

    /// Guarda el primer nodo de texto visible en `viewport`. Si no hay ninguno
    /// (página solo con imágenes) el ancla queda vacía.
    pub fn capture<G: TextGeometry>(&mut self, viewport: ViewportBounds, content: &G, spine_index: usize) -> Option<&ReadingAnchor> {
        self.anchor = capture(viewport, content, spine_index);
        match &self.anchor {
            Some(anchor) => debug!("Ancla capturada: capítulo {} nodo {:?}", spine_index, anchor.node_path),
            None => debug!("Ningún texto visible en el capítulo {}: sin ancla", spine_index),
        }
        self.anchor.as_ref()
    }

    /// Desplazamiento del contenido que vuelve a mostrar el ancla guardada.
    /// El ancla se consume: una segunda llamada devuelve `None`.
    pub fn restore<G: TextGeometry>(&mut self, content: &G, current_spine_index: usize) -> Option<f64> {
        let anchor = self.anchor.take();
        restore(content, anchor.as_ref(), current_spine_index)
    }
}

pub fn capture<G: TextGeometry>(viewport: ViewportBounds, content: &G, spine_index: usize) -> Option<ReadingAnchor> {
    content
        .text_nodes()
        .into_iter()
        .find(|node| node.rects.iter().any(|rect| !rect.is_empty() && viewport.intersects(rect)))
        .map(|node| ReadingAnchor {
            spine_index,
            node_path: node.path.to_vec(),
            // Un carácter de granularidad es suficiente
            char_offset: 0,
        })
}

/// No hace nada si el ancla es de otro capítulo: un ancla nunca cruza un
/// límite de capítulo.
pub fn restore<G: TextGeometry>(content: &G, anchor: Option<&ReadingAnchor>, current_spine_index: usize) -> Option<f64> {
    let anchor = anchor?;
    if anchor.spine_index != current_spine_index {
        debug!(
            "Ancla del capítulo {} ignorada en el capítulo {}",
            anchor.spine_index, current_spine_index
        );
        return None;
    }
    let len = content.text_len(&anchor.node_path)?;
    let offset = anchor.char_offset.min(len.saturating_sub(1));
    content.char_left(&anchor.node_path, offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Geometría mínima: cada nodo es una tira de caracteres de 1px de ancho
    struct FakeGeometry {
        nodes: Vec<(Vec<usize>, Vec<Rect>, f64, usize)>,
    }

    impl FakeGeometry {
        fn new() -> Self {
            FakeGeometry {
                nodes: vec![
                    (vec![0, 0], vec![], 0.0, 0),
                    (vec![1, 0], vec![Rect { left: 10.0, top: 0.0, width: 40.0, height: 1.0 }], 10.0, 40),
                    (vec![2, 0], vec![Rect { left: 120.0, top: 0.0, width: 30.0, height: 1.0 }], 120.0, 30),
                    (vec![3, 1, 0], vec![Rect { left: 230.0, top: 3.0, width: 5.0, height: 1.0 }], 230.0, 5),
                ],
            }
        }

        fn find(&self, path: &[usize]) -> Option<&(Vec<usize>, Vec<Rect>, f64, usize)> {
            self.nodes.iter().find(|(p, ..)| p == path)
        }
    }

    impl TextGeometry for FakeGeometry {
        fn text_nodes(&self) -> Vec<TextNodeBoxes<'_>> {
            self.nodes
                .iter()
                .map(|(path, rects, ..)| TextNodeBoxes { path, rects })
                .collect()
        }

        fn text_len(&self, path: &[usize]) -> Option<usize> {
            self.find(path).map(|(.., len)| *len)
        }

        fn char_left(&self, path: &[usize], offset: usize) -> Option<f64> {
            self.find(path).map(|(_, _, left, _)| left + offset as f64)
        }
    }

    #[test]
    fn test_capture_first_visible_node() {
        let geometry = FakeGeometry::new();
        let anchor = capture(ViewportBounds::for_page(1, 100.0), &geometry, 4).unwrap();
        assert_eq!(anchor.node_path, vec![2, 0]);
        assert_eq!(anchor.spine_index, 4);
        assert_eq!(anchor.char_offset, 0);

        // El nodo sin cajas nunca se elige
        let anchor = capture(ViewportBounds::for_page(0, 100.0), &geometry, 4).unwrap();
        assert_eq!(anchor.node_path, vec![1, 0]);
    }

    #[test]
    fn test_capture_nothing_visible() {
        let geometry = FakeGeometry::new();
        assert!(capture(ViewportBounds::for_page(9, 100.0), &geometry, 0).is_none());
    }

    #[test]
    fn test_restore_same_chapter() {
        let geometry = FakeGeometry::new();
        let anchor = ReadingAnchor { spine_index: 2, node_path: vec![3, 1, 0], char_offset: 99 };
        // El offset se acota a la longitud actual del nodo
        assert_eq!(restore(&geometry, Some(&anchor), 2), Some(234.0));
    }

    #[test]
    fn test_restore_never_crosses_chapters() {
        let geometry = FakeGeometry::new();
        let anchor = ReadingAnchor { spine_index: 2, node_path: vec![2, 0], char_offset: 0 };
        assert_eq!(restore(&geometry, Some(&anchor), 3), None);
        assert_eq!(restore(&geometry, None, 3), None);
    }

    #[test]
    fn test_restore_stale_path() {
        let geometry = FakeGeometry::new();
        let anchor = ReadingAnchor { spine_index: 0, node_path: vec![7, 7], char_offset: 0 };
        assert_eq!(restore(&geometry, Some(&anchor), 0), None);
    }

    #[test]
    fn test_tracker_anchor_is_consumed_once() {
        let geometry = FakeGeometry::new();
        let mut tracker = ReadingAnchorTracker::new();
        tracker.capture(ViewportBounds::for_page(1, 100.0), &geometry, 0);
        assert_eq!(tracker.anchor().unwrap().node_path, vec![2, 0]);
        assert_eq!(tracker.restore(&geometry, 0), Some(120.0));
        assert!(tracker.anchor().is_none());
        assert_eq!(tracker.restore(&geometry, 0), None);
    }

    #[test]
    fn test_tracker_forgets_old_anchor_when_nothing_visible() {
        let geometry = FakeGeometry::new();
        let mut tracker = ReadingAnchorTracker::new();
        tracker.capture(ViewportBounds::for_page(1, 100.0), &geometry, 0);
        assert!(tracker.capture(ViewportBounds::for_page(9, 100.0), &geometry, 0).is_none());
        assert_eq!(tracker.restore(&geometry, 0), None);
    }

    #[test]
    fn test_tracker_ignores_anchor_from_other_chapter() {
        let geometry = FakeGeometry::new();
        let mut tracker = ReadingAnchorTracker::new();
        tracker.capture(ViewportBounds::for_page(1, 100.0), &geometry, 0);
        assert_eq!(tracker.restore(&geometry, 1), None);
    }
}
