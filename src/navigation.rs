// src/navigation.rs
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::epub::{ManifestItem, SpineItem};
use crate::errors::EpubError;
use crate::path;

// Representa una entrada en la Tabla de Contenidos (TOC)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TocEntry {
    pub id: String,
    pub label: String,
    // Relativo al directorio del OPF, como los href del manifiesto; puede
    // llevar fragmento.
    pub href: String,
    // Solo los árboles que vienen del NCX tienen hijos
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TocEntry>,
}

impl TocEntry {
    pub fn leaf(id: impl Into<String>, label: impl Into<String>, href: impl Into<String>) -> Self {
        TocEntry {
            id: id.into(),
            label: label.into(),
            href: href.into(),
            children: Vec::new(),
        }
    }

    pub fn fragment(&self) -> Option<&str> {
        path::fragment(&self.href)
    }
}

/// Recorre el árbol en preorden devolviendo (profundidad, entrada).
pub fn flatten_toc(toc: &[TocEntry]) -> Vec<(usize, &TocEntry)> {
    fn walk<'a>(entries: &'a [TocEntry], depth: usize, out: &mut Vec<(usize, &'a TocEntry)>) {
        for entry in entries {
            out.push((depth, entry));
            walk(&entry.children, depth + 1, out);
        }
    }
    let mut out = Vec::new();
    walk(toc, 0, &mut out);
    out
}

/// Ruta completa dentro del ZIP -> posición en el spine.
///
/// Si el mismo documento aparece dos veces en el spine gana la primera.
#[derive(Debug, Clone)]
pub struct SpineMap {
    base_path: String,
    positions: HashMap<String, usize>,
    // Por posición del spine: (ruta completa, href del manifiesto)
    chapters: Vec<Option<(String, String)>>,
}

impl SpineMap {
    pub fn new(base_path: &str, manifest: &[ManifestItem], spine: &[SpineItem]) -> Self {
        let by_id: HashMap<&str, &ManifestItem> =
            manifest.iter().map(|item| (item.id.as_str(), item)).collect();

        let mut positions = HashMap::new();
        let mut chapters = Vec::with_capacity(spine.len());
        for (index, itemref) in spine.iter().enumerate() {
            let chapter = by_id.get(itemref.idref.as_str()).map(|item| {
                let full_path = path::resolve(base_path, path::strip_query_fragment(&item.href));
                positions.entry(full_path.clone()).or_insert(index);
                (full_path, item.href.clone())
            });
            chapters.push(chapter);
        }

        SpineMap {
            base_path: base_path.to_string(),
            positions,
            chapters,
        }
    }

    /// Posición en el spine de una ruta completa (se ignoran query y fragmento).
    pub fn index_of_path(&self, full_path: &str) -> Option<usize> {
        self.positions.get(path::strip_query_fragment(full_path)).copied()
    }

    /// Posición en el spine de un href relativo al OPF (el formato de `TocEntry::href`).
    pub fn index_of_href(&self, href: &str) -> Option<usize> {
        let full_path = path::resolve(&self.base_path, path::strip_query_fragment(href));
        self.positions.get(&full_path).copied()
    }

    pub fn chapter_path(&self, index: usize) -> Option<&str> {
        self.chapters.get(index)?.as_ref().map(|(full, _)| full.as_str())
    }

    pub fn manifest_href(&self, index: usize) -> Option<&str> {
        self.chapters.get(index)?.as_ref().map(|(_, href)| href.as_str())
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn len(&self) -> usize {
        self.chapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }
}

// Gestiona el estado de la navegación por capítulos
#[derive(Debug)]
pub struct Navigator {
    spine: SpineMap,
    // Índice actual dentro del spine
    current_spine_index: usize,
    // Tabla de contenidos para mostrar al usuario (puede no coincidir 1:1 con el spine)
    toc: Vec<TocEntry>,
}

impl Navigator {
    pub fn new(spine: SpineMap, toc: Vec<TocEntry>) -> Self {
        Navigator {
            spine,
            current_spine_index: 0,
            toc,
        }
    }

    // Avanza al siguiente capítulo en el spine
    pub fn next(&mut self) -> bool {
        if self.current_spine_index + 1 < self.spine.len() {
            self.current_spine_index += 1;
            true
        } else {
            false
        }
    }

    // Retrocede al capítulo anterior en el spine
    pub fn prev(&mut self) -> bool {
        if self.current_spine_index > 0 {
            self.current_spine_index -= 1;
            true
        } else {
            false
        }
    }

    // Va a un capítulo específico por su índice (basado en 1 para el usuario)
    pub fn goto(&mut self, index_one_based: usize) -> bool {
        if index_one_based > 0 && index_one_based <= self.spine.len() {
            self.current_spine_index = index_one_based - 1;
            true
        } else {
            false
        }
    }

    pub fn set_current(&mut self, spine_index: usize) -> Result<(), EpubError> {
        if spine_index >= self.spine.len() {
            return Err(EpubError::InvalidChapterIndex(spine_index));
        }
        self.current_spine_index = spine_index;
        Ok(())
    }

    pub fn current_spine_index(&self) -> usize {
        self.current_spine_index
    }

    pub fn chapter_path(&self, spine_index: usize) -> Result<String, EpubError> {
        if spine_index >= self.spine.len() {
            return Err(EpubError::InvalidChapterIndex(spine_index));
        }
        self.spine
            .chapter_path(spine_index)
            .map(str::to_string)
            .ok_or_else(|| EpubError::ChapterNotFound(format!("posición {} del spine", spine_index + 1)))
    }

    /// Capítulo y fragmento a los que apunta una entrada del TOC.
    pub fn toc_target(&self, entry: &TocEntry) -> Option<(usize, Option<String>)> {
        let index = self.spine.index_of_href(&entry.href)?;
        Some((index, entry.fragment().map(str::to_string)))
    }

    /// Etiqueta de la primera entrada del TOC del capítulo más cercano en o antes del actual.
    pub fn current_toc_label(&self) -> Option<&str> {
        // rev(): ante empate, max_by_key se queda con el último
        flatten_toc(&self.toc)
            .into_iter()
            .rev()
            .filter_map(|(_, entry)| Some((self.spine.index_of_href(&entry.href)?, entry)))
            .filter(|(index, _)| *index <= self.current_spine_index)
            .max_by_key(|(index, _)| *index)
            .map(|(_, entry)| entry.label.as_str())
    }

    // Devuelve el número de capítulo actual (basado en 1) y el total
    pub fn current_position(&self) -> (usize, usize) {
        (self.current_spine_index + 1, self.spine.len())
    }

    pub fn total_chapters(&self) -> usize {
        self.spine.len()
    }

    pub fn get_toc(&self) -> &[TocEntry] {
        &self.toc
    }

    pub fn spine(&self) -> &SpineMap {
        &self.spine
    }
}
