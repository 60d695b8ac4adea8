// src/config.rs
use std::fs;
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::errors::EpubError;

pub const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    // Margen lateral de cada página, en celdas
    pub page_margin: u16,
    // Documentos del spine que se inspeccionan buscando escritura vertical
    pub vertical_sample_size: usize,
    pub toc: TocHeuristics,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        ReaderConfig {
            page_margin: 2,
            vertical_sample_size: 3,
            toc: TocHeuristics::default(),
        }
    }
}

impl ReaderConfig {
    /// Lee `config.json` del directorio de la biblioteca; si no existe, valores por defecto.
    pub fn load(library_dir: &Path) -> Result<Self, EpubError> {
        let path = library_dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(ReaderConfig::default());
        }
        let content = fs::read_to_string(&path)?;
        let config = serde_json::from_str(&content)?;
        info!("Configuración cargada desde {}", path.display());
        Ok(config)
    }
}

/// Umbrales del escaneo heurístico de TOC. Son valores empíricos: no hay
/// que tomarlos como precisos.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TocHeuristics {
    // Se comparan en minúsculas contra el título y el texto del documento
    pub markers: Vec<String>,
    pub marker_score: u32,
    pub min_spine_links: usize,
    pub spine_links_score: u32,
    pub density_divisor: usize,
    pub density_cap: u32,
    // "Capítulo N" cuando no hay etiqueta
    pub fallback_label: String,
}

impl Default for TocHeuristics {
    fn default() -> Self {
        TocHeuristics {
            markers: ["contents", "table of contents", "目次", "目录", "índice", "contenido"]
                .iter()
                .map(|m| m.to_string())
                .collect(),
            marker_score: 3,
            min_spine_links: 3,
            spine_links_score: 2,
            density_divisor: 5,
            density_cap: 3,
            fallback_label: "Capítulo".to_string(),
        }
    }
}

impl TocHeuristics {
    pub fn fallback_label(&self, one_based: usize) -> String {
        format!("{} {}", self.fallback_label, one_based)
    }
}
