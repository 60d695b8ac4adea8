// src/epub/mod.rs
//
// Lectura de container.xml y del OPF, y la composición completa de la
// importación (`parse_epub`).

pub mod archive;

use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use roxmltree::{Document, Node, ParsingOptions};
use serde::{Deserialize, Serialize};

use crate::book::{Book, CoverRef};
use crate::config::ReaderConfig;
use crate::errors::{EpubError, ImportError};
use crate::metadata::Metadata;
use crate::path;
use crate::{toc, vertical};

pub use archive::{open_archive, open_archive_file, EpubArchive, ZipEpubArchive};

pub const CONTAINER_PATH: &str = "META-INF/container.xml";
const OPF_MIME_TYPE: &str = "application/oebps-package+xml";

// Representa un item en el manifiesto del OPF
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestItem {
    pub id: String,
    // Relativo al directorio del OPF, sin resolver
    pub href: String,
    pub media_type: String,
    // Tokens separados por espacios ("cover-image nav")
    pub properties: Option<String>,
}

impl ManifestItem {
    pub fn has_property(&self, token: &str) -> bool {
        self.properties
            .as_deref()
            .map_or(false, |props| props.split_whitespace().any(|p| p == token))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpineItem {
    pub idref: String,
    pub linear: Option<String>,
}

/// Lo que sale del OPF antes de resolver TOC y escritura vertical.
#[derive(Debug, Clone)]
pub struct ArchiveStructure {
    pub opf_path: String,
    // Directorio que contiene el OPF (para resolver rutas relativas)
    pub base_path: String,
    pub title: String,
    pub metadata: Metadata,
    pub manifest: Vec<ManifestItem>,
    pub spine: Vec<SpineItem>,
    pub cover: Option<CoverRef>,
}

/// Parsea XML admitiendo DOCTYPE, que los NCX y XHTML suelen traer.
pub fn parse_xml(text: &str) -> Result<Document<'_>, roxmltree::Error> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    Document::parse_with_options(text, options)
}

/// Punto de entrada de la importación: abre el fichero y construye el `Book`.
pub fn parse_epub(epub_path: &Path, config: &ReaderConfig) -> Result<Book, ImportError> {
    let mut archive = open_archive_file(epub_path)?;
    let file_name = epub_path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("libro.epub")
        .to_string();
    parse_epub_archive(&mut archive, &file_name, epub_path.to_path_buf(), config)
}

/// Igual que `parse_epub` pero sobre un archivo ya abierto.
pub fn parse_epub_archive<A: EpubArchive>(
    archive: &mut A,
    file_name: &str,
    archive_ref: PathBuf,
    config: &ReaderConfig,
) -> Result<Book, ImportError> {
    let structure = extract(archive, file_name)?;

    let is_vertical = vertical::detect(
        archive,
        &structure.base_path,
        &structure.manifest,
        &structure.spine,
        config.vertical_sample_size,
    );
    let toc = toc::resolve(
        archive,
        &structure.base_path,
        &structure.manifest,
        &structure.spine,
        &config.toc,
    );

    info!(
        "Importado '{}': {} items en el manifiesto, {} en el spine, {} entradas de TOC{}",
        structure.title,
        structure.manifest.len(),
        structure.spine.len(),
        toc.len(),
        if is_vertical { ", escritura vertical" } else { "" }
    );
    Ok(Book::new(structure, toc, is_vertical, archive_ref))
}

/// Lee container.xml y el OPF: manifiesto, spine, título y portada.
pub fn extract<A: EpubArchive>(archive: &mut A, file_name: &str) -> Result<ArchiveStructure, EpubError> {
    // 1. Parsear container.xml para encontrar el archivo OPF
    let opf_path = parse_container(archive)?;
    let base_path = path::dirname(&opf_path).to_string();

    // 2. Leer y parsear el archivo OPF
    let opf_content = archive
        .read_entry_as_text(&opf_path)
        .ok_or_else(|| EpubError::MissingContainer(opf_path.clone()))?;
    let opf_doc = parse_xml(&opf_content)?;

    let package_node = opf_doc
        .descendants()
        .find(|n| n.tag_name().name() == "package")
        .unwrap_or_else(|| opf_doc.root_element());

    // 3. Metadatos
    let metadata = match child_named(package_node, "metadata") {
        Some(node) => Metadata::parse(node),
        None => {
            warn!("El OPF no tiene <metadata>");
            Metadata::default()
        }
    };

    // 4. Manifiesto
    let manifest = child_named(package_node, "manifest")
        .map(parse_manifest)
        .unwrap_or_default();

    // 5. Spine (solo las referencias que existen en el manifiesto)
    let spine = child_named(package_node, "spine")
        .map(|node| parse_spine(node, &manifest))
        .unwrap_or_default();
    if spine.is_empty() {
        warn!("{}", EpubError::StructureIncomplete("el spine está vacío".to_string()));
    }

    let title = metadata
        .title
        .clone()
        .unwrap_or_else(|| title_from_file_name(file_name));
    let cover = find_cover(&base_path, &metadata, &manifest);

    Ok(ArchiveStructure {
        opf_path,
        base_path,
        title,
        metadata,
        manifest,
        spine,
        cover,
    })
}

// --- Funciones auxiliares de parsing ---

fn parse_container<A: EpubArchive>(archive: &mut A) -> Result<String, EpubError> {
    let container_content = archive
        .read_entry_as_text(CONTAINER_PATH)
        .ok_or_else(|| EpubError::MissingContainer(CONTAINER_PATH.to_string()))?;

    let doc = parse_xml(&container_content)?;
    let rootfile_node = doc
        .descendants()
        .find(|n| n.tag_name().name() == "rootfile")
        .ok_or_else(|| EpubError::MissingContainer("<rootfile> en container.xml".to_string()))?;

    let opf_path = rootfile_node
        .attribute("full-path")
        .ok_or_else(|| EpubError::MissingContainer("atributo full-path de <rootfile>".to_string()))?;

    let media_type = rootfile_node.attribute("media-type");
    if media_type != Some(OPF_MIME_TYPE) {
        warn!("media-type del rootfile no es '{}', es {:?}. Continuando...", OPF_MIME_TYPE, media_type);
    }

    Ok(path::resolve("", opf_path))
}

fn child_named<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| n.tag_name().name() == name)
}

fn parse_manifest(manifest_node: Node) -> Vec<ManifestItem> {
    let mut manifest = Vec::new();
    for item_node in manifest_node.children().filter(|n| n.tag_name().name() == "item") {
        let (Some(id), Some(href), Some(media_type)) = (
            item_node.attribute("id"),
            item_node.attribute("href"),
            item_node.attribute("media-type"),
        ) else {
            warn!("Item del manifiesto sin id, href o media-type, se omite");
            continue;
        };
        manifest.push(ManifestItem {
            id: id.to_string(),
            href: href.to_string(),
            media_type: media_type.to_string(),
            properties: item_node.attribute("properties").map(str::to_string),
        });
    }
    manifest
}

fn parse_spine(spine_node: Node, manifest: &[ManifestItem]) -> Vec<SpineItem> {
    let mut spine = Vec::new();
    for itemref_node in spine_node.children().filter(|n| n.tag_name().name() == "itemref") {
        let Some(idref) = itemref_node.attribute("idref") else {
            warn!("<itemref> sin idref, se omite");
            continue;
        };
        if !manifest.iter().any(|item| item.id == idref) {
            let err = EpubError::StructureIncomplete(format!("el spine referencia '{}' que no está en el manifiesto", idref));
            warn!("{}", err);
            continue;
        }
        spine.push(SpineItem {
            idref: idref.to_string(),
            linear: itemref_node.attribute("linear").map(str::to_string),
        });
    }
    spine
}

fn find_cover(base_path: &str, metadata: &Metadata, manifest: &[ManifestItem]) -> Option<CoverRef> {
    // EPUB3: properties="cover-image"; EPUB2: <meta name="cover" content="id"/>
    let item = manifest
        .iter()
        .find(|item| item.has_property("cover-image"))
        .or_else(|| {
            let cover_id = metadata.cover_id.as_deref()?;
            manifest.iter().find(|item| item.id == cover_id)
        })?;
    debug!("Portada: {}", item.href);
    Some(CoverRef {
        path: path::resolve(base_path, path::strip_query_fragment(&item.href)),
        media_type: item.media_type.clone(),
    })
}

fn title_from_file_name(file_name: &str) -> String {
    Path::new(file_name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .unwrap_or(file_name)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::archive::test_support::zip_bytes;
    use super::*;

    const CONTAINER: &str = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles><rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/></rootfiles>
</container>"#;

    const OPF: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <meta name="cover" content="old-cover"/>
  </metadata>
  <manifest>
    <item id="c1" href="Text/ch1.xhtml" media-type="application/xhtml+xml"/>
    <item id="broken" href="Text/broken.xhtml"/>
    <item id="old-cover" href="Images/old.jpg" media-type="image/jpeg"/>
    <item id="cover" href="Images/cover.png" media-type="image/png" properties="cover-image"/>
  </manifest>
  <spine>
    <itemref idref="c1"/>
    <itemref idref="broken"/>
    <itemref/>
    <itemref idref="c1" linear="no"/>
  </spine>
</package>"#;

    #[test]
    fn test_extract_structure() {
        let mut archive = open_archive(zip_bytes(&[
            ("META-INF/container.xml", CONTAINER),
            ("OEBPS/content.opf", OPF),
        ]))
        .unwrap();
        let structure = extract(&mut archive, "Mi libro.epub").unwrap();

        assert_eq!(structure.opf_path, "OEBPS/content.opf");
        assert_eq!(structure.base_path, "OEBPS");
        // Sin <dc:title>: nombre del fichero sin extensión
        assert_eq!(structure.title, "Mi libro");
        // "broken" no tiene media-type
        assert_eq!(structure.manifest.len(), 3);
        assert_eq!(structure.spine.len(), 2);
        assert_eq!(structure.spine[1].linear.as_deref(), Some("no"));
        // cover-image gana a <meta name="cover">
        let cover = structure.cover.unwrap();
        assert_eq!(cover.path, "OEBPS/Images/cover.png");
        assert_eq!(cover.media_type, "image/png");
    }

    #[test]
    fn test_cover_from_meta_pointer() {
        let opf = OPF.replace(r#" properties="cover-image""#, "");
        let mut archive = open_archive(zip_bytes(&[
            ("META-INF/container.xml", CONTAINER),
            ("OEBPS/content.opf", &opf),
        ]))
        .unwrap();
        let structure = extract(&mut archive, "x.epub").unwrap();
        assert_eq!(structure.cover.unwrap().path, "OEBPS/Images/old.jpg");
    }

    #[test]
    fn test_missing_container_is_fatal() {
        let mut archive = open_archive(zip_bytes(&[("OEBPS/content.opf", OPF)])).unwrap();
        assert!(matches!(extract(&mut archive, "x.epub"), Err(EpubError::MissingContainer(_))));
    }

    #[test]
    fn test_missing_opf_is_missing_container() {
        let mut archive = open_archive(zip_bytes(&[("META-INF/container.xml", CONTAINER)])).unwrap();
        assert!(matches!(extract(&mut archive, "x.epub"), Err(EpubError::MissingContainer(_))));
    }

    #[test]
    fn test_parse_xml_accepts_doctype() {
        let ncx = r#"<?xml version="1.0"?>
<!DOCTYPE ncx PUBLIC "-//NISO//DTD ncx 2005-1//EN" "http://www.daisy.org/z3986/2005/ncx-2005-1.dtd">
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/"><navMap/></ncx>"#;
        assert!(parse_xml(ncx).is_ok());
    }

    #[test]
    fn test_title_from_file_name() {
        assert_eq!(title_from_file_name("novela.epub"), "novela");
        assert_eq!(title_from_file_name("sin_extension"), "sin_extension");
    }
}
