// src/book.rs
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::epub::{ArchiveStructure, EpubArchive, ManifestItem, SpineItem};
use crate::metadata::Metadata;
use crate::navigation::{SpineMap, TocEntry};

/// Versión del esquema con la que se guardan los libros.
pub const SCHEMA_VERSION: u32 = 2;

/// Referencia a la imagen de portada dentro del archivo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverRef {
    // Ruta completa ya resuelta dentro del ZIP
    pub path: String,
    pub media_type: String,
}

/// Libro importado. Se crea una vez al importar y no cambia después; el
/// almacén es su dueño y la sesión de lectura trabaja con una copia.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub schema_version: u32,
    pub id: String,
    pub title: String,
    // Ruta del .epub en disco
    pub archive_path: PathBuf,
    pub opf_path: String,
    pub manifest: Vec<ManifestItem>,
    pub spine: Vec<SpineItem>,
    pub toc: Vec<TocEntry>,
    pub cover: Option<CoverRef>,
    pub is_vertical: bool,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
}

impl Book {
    pub fn new(structure: ArchiveStructure, toc: Vec<TocEntry>, is_vertical: bool, archive_path: PathBuf) -> Self {
        Book {
            schema_version: SCHEMA_VERSION,
            id: Uuid::new_v4().to_string(),
            title: structure.title,
            archive_path,
            opf_path: structure.opf_path,
            manifest: structure.manifest,
            spine: structure.spine,
            toc,
            cover: structure.cover,
            is_vertical,
            metadata: structure.metadata,
            created_at: Utc::now(),
        }
    }

    /// Directorio del OPF, base de todos los href del manifiesto.
    pub fn base_path(&self) -> &str {
        crate::path::dirname(&self.opf_path)
    }

    pub fn spine_map(&self) -> SpineMap {
        SpineMap::new(self.base_path(), &self.manifest, &self.spine)
    }

    pub fn load_cover<A: EpubArchive>(&self, archive: &mut A) -> Option<Vec<u8>> {
        let cover = self.cover.as_ref()?;
        archive.read_entry_as_binary(&cover.path)
    }
}
