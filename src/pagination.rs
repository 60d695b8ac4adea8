// src/pagination.rs
//
// Paginación horizontal: el contenido fluye en columnas del ancho del
// viewport y cada página es un desplazamiento de ese ancho. Todo se deriva de
// dos números (ancho del contenido y del viewport) que se vuelven a medir en
// cada cambio de capítulo, de tamaño o de fuente; nunca se asume que el ancho
// del contenido sea estable.

/// Delta mínimo de la rueda para pasar página.
const WHEEL_THRESHOLD: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaginationState {
    pub page_index: usize,
    // Siempre >= 1
    pub page_count: usize,
    pub viewport_width: f64,
}

impl Default for PaginationState {
    fn default() -> Self {
        PaginationState {
            page_index: 0,
            page_count: 1,
            viewport_width: 0.0,
        }
    }
}

/// Máquina de estados sobre `PaginationState`. Tras cualquier operación se
/// cumple `page_index < page_count`.
#[derive(Debug, Clone, Default)]
pub struct PaginationController {
    state: PaginationState,
}

impl PaginationController {
    pub fn new() -> Self {
        PaginationController::default()
    }

    pub fn state(&self) -> PaginationState {
        self.state
    }

    pub fn page_index(&self) -> usize {
        self.state.page_index
    }

    pub fn page_count(&self) -> usize {
        self.state.page_count
    }

    pub fn viewport_width(&self) -> f64 {
        self.state.viewport_width
    }

    /// Vuelve al estado inicial (página 0), al renderizar un capítulo nuevo.
    pub fn reset(&mut self) {
        self.state = PaginationState::default();
    }

    pub fn recalc_layout(&mut self, content_width: f64, viewport_width: f64) {
        // `!(x > 0)` también atrapa NaN
        if !(viewport_width > 0.0) {
            self.state = PaginationState::default();
            return;
        }
        // f64::max ignora un NaN en content_width
        let span = content_width.max(viewport_width);
        let pages = (span / viewport_width).ceil();
        self.state.viewport_width = viewport_width;
        self.state.page_count = if pages.is_finite() { (pages as usize).max(1) } else { 1 };
        self.clamp();
    }

    pub fn next_page(&mut self) -> bool {
        self.set_page(self.state.page_index.saturating_add(1))
    }

    pub fn prev_page(&mut self) -> bool {
        self.set_page(self.state.page_index.saturating_sub(1))
    }

    /// Fija la página (acotada). Devuelve si cambió.
    pub fn set_page(&mut self, index: usize) -> bool {
        let before = self.state.page_index;
        self.state.page_index = index;
        self.clamp();
        before != self.state.page_index
    }

    /// Página que contiene un desplazamiento en píxeles del contenido. Es el
    /// puente entre la posición medida de un ancla y el índice de página.
    pub fn set_page_by_offset(&mut self, pixel_offset: f64) -> bool {
        let width = self.state.viewport_width;
        let index = if width > 0.0 && pixel_offset.is_finite() && pixel_offset > 0.0 {
            (pixel_offset / width).floor() as usize
        } else {
            0
        };
        self.set_page(index)
    }

    /// Rueda del ratón o trackpad: manda el eje con más desplazamiento.
    pub fn on_wheel(&mut self, delta_x: f64, delta_y: f64) -> bool {
        let delta = if delta_x.abs() > delta_y.abs() { delta_x } else { delta_y };
        if delta >= WHEEL_THRESHOLD {
            self.next_page()
        } else if delta <= -WHEEL_THRESHOLD {
            self.prev_page()
        } else {
            false
        }
    }

    /// Desplazamiento del contenido (en píxeles) de la página actual.
    pub fn offset(&self) -> f64 {
        self.state.page_index as f64 * self.state.viewport_width
    }

    /// Transformación CSS que trae la página actual a la vista.
    pub fn transform(&self) -> String {
        let offset = self.offset();
        if offset == 0.0 {
            "translate3d(0px, 0px, 0px)".to_string()
        } else {
            format!("translate3d({}px, 0px, 0px)", -offset)
        }
    }

    fn clamp(&mut self) {
        let last = self.state.page_count.max(1) - 1;
        self.state.page_index = self.state.page_index.min(last);
    }
}
