// src/errors.rs
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EpubError {
    #[error("Error de I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("Error al procesar archivo ZIP: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Error al parsear XML: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("Error al (de)serializar JSON: {0}")]
    Json(#[from] serde_json::Error),

    // container.xml o el documento OPF no existen: la importación se aborta
    #[error("No se encontró el contenedor del EPUB: {0}")]
    MissingContainer(String),

    // Afecta solo a un capítulo; la sesión de lectura sigue siendo usable
    #[error("No se encontró el capítulo en el archivo: {0}")]
    ChapterNotFound(String),

    // Nunca llega al usuario: la imagen se elimina en silencio
    #[error("No se pudo resolver el recurso: {0}")]
    AssetUnresolved(String),

    // Manifiesto y spine inconsistentes; las entradas afectadas se omiten
    #[error("Estructura incompleta: {0}")]
    StructureIncomplete(String),

    #[error("Índice de capítulo fuera de rango: {0}")]
    InvalidChapterIndex(usize),

    #[error("Error al parsear el índice (TOC): {0}")]
    TocParseError(String),

    #[error("Error en el almacén de libros: {0}")]
    Store(String),
}

/// Único error que devuelve `parse_epub`.
#[derive(Error, Debug)]
#[error("No se pudo cargar el EPUB: {source}")]
pub struct ImportError {
    #[from]
    pub source: EpubError,
}

impl ImportError {
    pub fn is_missing_container(&self) -> bool {
        matches!(self.source, EpubError::MissingContainer(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn import_error_wraps_missing_container() {
        let err: ImportError = EpubError::MissingContainer("META-INF/container.xml".into()).into();
        assert!(err.is_missing_container());
        assert!(err.to_string().starts_with("No se pudo cargar el EPUB"));
    }

    #[test]
    fn import_error_from_parse_failure_is_not_missing_container() {
        let xml_err = roxmltree::Document::parse("<a>").unwrap_err();
        let err: ImportError = EpubError::from(xml_err).into();
        assert!(!err.is_missing_container());
    }
}
