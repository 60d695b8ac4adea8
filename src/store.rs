// src/store.rs
//
// Almacén de libros importados. El núcleo solo necesita put/get_all/get_by_id;
// la migración de registros viejos es cosa del almacén y es transparente: lo
// que sale de aquí siempre tiene la forma actual de `Book`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use log::{debug, info, warn};
use serde_json::{Map, Value};

use crate::book::{Book, SCHEMA_VERSION};
use crate::errors::EpubError;

// Campos de la versión 1 que ya no existen
const OBSOLETE_FIELDS: &[&str] = &["cover_blob", "chapters", "file_name"];

pub trait BookStore {
    fn put(&mut self, book: &Book) -> Result<(), EpubError>;

    /// Todos los libros, del más antiguo al más reciente.
    fn get_all(&self) -> Result<Vec<Book>, EpubError>;

    fn get_by_id(&self, id: &str) -> Result<Option<Book>, EpubError>;
}

/// Un fichero `<id>.json` por libro.
#[derive(Debug, Clone)]
pub struct JsonBookStore {
    dir: PathBuf,
}

impl JsonBookStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, EpubError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(JsonBookStore { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, id: &str) -> Option<PathBuf> {
        is_valid_id(id).then(|| self.dir.join(format!("{}.json", id)))
    }

    fn write_record(&self, path: &Path, book: &Book) -> Result<(), EpubError> {
        let json = serde_json::to_string_pretty(book)?;
        // Se escribe aparte y se renombra para no dejar registros a medias
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    fn read_record(&self, path: &Path) -> Result<Book, EpubError> {
        let content = fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&content)?;
        let outdated = schema_version(&value) < SCHEMA_VERSION as u64;
        let book = migrate(value)?;
        if outdated {
            info!("Registro migrado a la versión {}: {}", SCHEMA_VERSION, path.display());
            if let Err(e) = self.write_record(path, &book) {
                warn!("No se pudo guardar el registro migrado {}: {}", path.display(), e);
            }
        }
        Ok(book)
    }
}

impl BookStore for JsonBookStore {
    fn put(&mut self, book: &Book) -> Result<(), EpubError> {
        let path = self
            .record_path(&book.id)
            .ok_or_else(|| EpubError::Store(format!("id de libro no válido: '{}'", book.id)))?;
        self.write_record(&path, book)?;
        debug!("Libro guardado: {} ({})", book.title, path.display());
        Ok(())
    }

    fn get_all(&self) -> Result<Vec<Book>, EpubError> {
        let mut books = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().map_or(true, |ext| ext != "json") {
                continue;
            }
            // Un registro roto no tumba la biblioteca entera
            match self.read_record(&path) {
                Ok(book) => books.push(book),
                Err(e) => warn!("Registro ignorado {}: {}", path.display(), e),
            }
        }
        sort_books(&mut books);
        Ok(books)
    }

    fn get_by_id(&self, id: &str) -> Result<Option<Book>, EpubError> {
        let Some(path) = self.record_path(id) else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        self.read_record(&path).map(Some)
    }
}

#[derive(Debug, Default)]
pub struct MemoryBookStore {
    books: HashMap<String, Book>,
}

impl MemoryBookStore {
    pub fn new() -> Self {
        MemoryBookStore::default()
    }
}

impl BookStore for MemoryBookStore {
    fn put(&mut self, book: &Book) -> Result<(), EpubError> {
        self.books.insert(book.id.clone(), book.clone());
        Ok(())
    }

    fn get_all(&self) -> Result<Vec<Book>, EpubError> {
        let mut books: Vec<Book> = self.books.values().cloned().collect();
        sort_books(&mut books);
        Ok(books)
    }

    fn get_by_id(&self, id: &str) -> Result<Option<Book>, EpubError> {
        Ok(self.books.get(id).cloned())
    }
}

/// Lleva un registro de cualquier versión anterior a la forma actual.
pub fn migrate(mut value: Value) -> Result<Book, EpubError> {
    let version = schema_version(&value);
    if version > SCHEMA_VERSION as u64 {
        return Err(EpubError::Store(format!(
            "registro con versión de esquema {} (la más nueva soportada es {})",
            version, SCHEMA_VERSION
        )));
    }
    let record = value
        .as_object_mut()
        .ok_or_else(|| EpubError::Store("el registro no es un objeto JSON".to_string()))?;

    if version < SCHEMA_VERSION as u64 {
        migrate_record(record);
    }
    Ok(serde_json::from_value(value)?)
}

fn migrate_record(record: &mut Map<String, Value>) {
    for field in OBSOLETE_FIELDS {
        record.remove(*field);
    }
    record.entry("cover").or_insert(Value::Null);
    record.entry("is_vertical").or_insert(Value::Bool(false));
    record.entry("toc").or_insert_with(|| Value::Array(Vec::new()));
    record.entry("metadata").or_insert_with(|| Value::Object(Map::new()));
    record
        .entry("created_at")
        .or_insert_with(|| Value::String(Utc::now().to_rfc3339()));
    record.insert("schema_version".to_string(), Value::from(SCHEMA_VERSION));
}

// Los registros sin versión son de la 1
fn schema_version(value: &Value) -> u64 {
    value.get("schema_version").and_then(Value::as_u64).unwrap_or(1)
}

fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

fn sort_books(books: &mut [Book]) {
    books.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
}
