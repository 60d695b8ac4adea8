// src/epub/archive.rs
//
// Acceso aleatorio a las entradas del ZIP por ruta normalizada.

use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;

use log::{debug, warn};
use percent_encoding::percent_decode_str;
use regex::Regex;
use zip::ZipArchive;

use crate::errors::EpubError;

pub trait EpubArchive {
    /// Contenido de la entrada como texto, o `None` si no existe.
    fn read_entry_as_text(&mut self, path: &str) -> Option<String>;

    /// Bytes de la entrada, o `None` si no existe.
    fn read_entry_as_binary(&mut self, path: &str) -> Option<Vec<u8>>;

    /// Rutas de todas las entradas que casan con `pattern`, ordenadas.
    fn list_entries_matching(&self, pattern: &Regex) -> Vec<String>;

    fn contains(&self, path: &str) -> bool;
}

#[derive(Debug)]
pub struct ZipEpubArchive<R: Read + Seek> {
    archive: ZipArchive<R>,
}

/// Abre un EPUB ya cargado en memoria.
pub fn open_archive(bytes: Vec<u8>) -> Result<ZipEpubArchive<Cursor<Vec<u8>>>, EpubError> {
    ZipEpubArchive::new(Cursor::new(bytes))
}

pub fn open_archive_file(path: &Path) -> Result<ZipEpubArchive<BufReader<File>>, EpubError> {
    let file = File::open(path)?;
    ZipEpubArchive::new(BufReader::new(file))
}

impl<R: Read + Seek> ZipEpubArchive<R> {
    pub fn new(reader: R) -> Result<Self, EpubError> {
        Ok(ZipEpubArchive { archive: ZipArchive::new(reader)? })
    }

    // Los href del OPF van con escapes URL ("Cap%C3%ADtulo.xhtml") y los
    // nombres del ZIP no: si la ruta exacta no está, se prueba decodificada.
    fn entry_name(&self, path: &str) -> Option<String> {
        if self.archive.file_names().any(|name| name == path) {
            return Some(path.to_string());
        }
        if !path.contains('%') {
            return None;
        }
        let decoded = percent_decode_str(path).decode_utf8().ok()?;
        self.archive
            .file_names()
            .any(|name| name == decoded)
            .then(|| decoded.into_owned())
    }

    fn read_bytes(&mut self, path: &str) -> Option<Vec<u8>> {
        let name = self.entry_name(path)?;
        let mut entry = match self.archive.by_name(&name) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("No se pudo abrir la entrada {}: {}", name, e);
                return None;
            }
        };
        let mut content = Vec::new();
        if let Err(e) = entry.read_to_end(&mut content) {
            warn!("No se pudo descomprimir la entrada {}: {}", name, e);
            return None;
        }
        debug!("Leída entrada {} ({} bytes)", name, content.len());
        Some(content)
    }
}

impl<R: Read + Seek> EpubArchive for ZipEpubArchive<R> {
    fn read_entry_as_text(&mut self, path: &str) -> Option<String> {
        let bytes = self.read_bytes(path)?;
        let text = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => {
                warn!("La entrada {} no es UTF-8 válido, se reemplazan caracteres", path);
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            }
        };
        // Quitar BOM si lo hay
        Some(text.strip_prefix('\u{feff}').map(str::to_string).unwrap_or(text))
    }

    fn read_entry_as_binary(&mut self, path: &str) -> Option<Vec<u8>> {
        self.read_bytes(path)
    }

    fn list_entries_matching(&self, pattern: &Regex) -> Vec<String> {
        let mut names: Vec<String> = self
            .archive
            .file_names()
            .filter(|name| pattern.is_match(name))
            .map(str::to_string)
            .collect();
        names.sort();
        names
    }

    fn contains(&self, path: &str) -> bool {
        self.entry_name(path).is_some()
    }
}
