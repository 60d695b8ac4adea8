// src/vertical.rs
//
// Detección heurística de libros en escritura vertical (tategaki). Un falso
// negativo se tolera; las comprobaciones son lo bastante específicas para que
// los falsos positivos sean raros. Gana la primera señal que aparece:
// metadatos del OPF, luego hojas de estilo, luego los primeros documentos
// del spine.

use lazy_static::lazy_static;
use log::{debug, warn};
use regex::Regex;
use scraper::{Html, Selector};

use crate::epub::{parse_xml, EpubArchive, ManifestItem, SpineItem};
use crate::metadata::Metadata;
use crate::navigation::SpineMap;
use crate::path;

lazy_static! {
    // writing-mode, -webkit-writing-mode, -epub-writing-mode, -ms-writing-mode
    static ref RE_VERTICAL_CSS: Regex = Regex::new(
        r"(?i)(?:-(?:webkit|epub|ms)-)?writing-mode\s*:\s*(?:vertical-rl|vertical-lr|tb-rl)"
    )
    .unwrap();

    static ref RE_VERTICAL_VALUE: Regex = Regex::new(r"(?i)^\s*(?:vertical-rl|vertical-lr|tb-rl)\s*$").unwrap();

    static ref RE_VERTICAL_CLASS: Regex = Regex::new(r"(?i)^(?:vrtl|vertical|vertical-rl|vertical-lr|tate|tategaki)$").unwrap();

    static ref RE_OPF: Regex = Regex::new(r"(?i)\.opf$").unwrap();
}

pub fn detect<A: EpubArchive>(
    archive: &mut A,
    base_path: &str,
    manifest: &[ManifestItem],
    spine: &[SpineItem],
    sample_size: usize,
) -> bool {
    if metadata_signals_vertical(archive) {
        debug!("Escritura vertical: metadatos del OPF");
        return true;
    }
    if stylesheets_signal_vertical(archive, base_path, manifest) {
        debug!("Escritura vertical: hoja de estilos");
        return true;
    }
    if spine_documents_signal_vertical(archive, base_path, manifest, spine, sample_size) {
        debug!("Escritura vertical: documentos del spine");
        return true;
    }
    false
}

// (a) Cualquier OPF del archivo con rendition:layout pre-paginated o un
// writing-mode vertical declarado en metadatos.
fn metadata_signals_vertical<A: EpubArchive>(archive: &mut A) -> bool {
    for opf_path in archive.list_entries_matching(&RE_OPF) {
        let Some(content) = archive.read_entry_as_text(&opf_path) else {
            continue;
        };
        let doc = match parse_xml(&content) {
            Ok(doc) => doc,
            Err(e) => {
                warn!("No se pudo parsear {} buscando escritura vertical: {}", opf_path, e);
                continue;
            }
        };
        let Some(metadata_node) = doc.descendants().find(|n| n.tag_name().name() == "metadata") else {
            continue;
        };
        let metadata = Metadata::parse(metadata_node);
        let vertical_mode = metadata
            .writing_mode
            .as_deref()
            .map_or(false, |mode| RE_VERTICAL_VALUE.is_match(mode));
        if metadata.is_pre_paginated() || vertical_mode {
            return true;
        }
    }
    false
}

// (b) Hojas de estilo declaradas en el manifiesto
fn stylesheets_signal_vertical<A: EpubArchive>(archive: &mut A, base_path: &str, manifest: &[ManifestItem]) -> bool {
    manifest
        .iter()
        .filter(|item| item.media_type == "text/css" || item.href.to_ascii_lowercase().ends_with(".css"))
        .any(|item| {
            let css_path = path::resolve(base_path, path::strip_query_fragment(&item.href));
            archive
                .read_entry_as_text(&css_path)
                .map_or(false, |css| RE_VERTICAL_CSS.is_match(&css))
        })
}

// (c) Los primeros documentos del spine: style/class de cualquier elemento
// y los bloques <style> incrustados.
fn spine_documents_signal_vertical<A: EpubArchive>(
    archive: &mut A,
    base_path: &str,
    manifest: &[ManifestItem],
    spine: &[SpineItem],
    sample_size: usize,
) -> bool {
    let spine_map = SpineMap::new(base_path, manifest, spine);
    (0..spine_map.len().min(sample_size))
        .filter_map(|index| spine_map.chapter_path(index).map(str::to_string))
        .any(|chapter_path| {
            archive
                .read_entry_as_text(&chapter_path)
                .map_or(false, |html| document_signals_vertical(&html))
        })
}

fn document_signals_vertical(html: &str) -> bool {
    let document = Html::parse_document(html);
    let any_selector = Selector::parse("*").unwrap();

    document.select(&any_selector).any(|element| {
        let value = element.value();
        if value.attr("style").map_or(false, |style| RE_VERTICAL_CSS.is_match(style)) {
            return true;
        }
        if value.classes().any(|class| RE_VERTICAL_CLASS.is_match(class)) {
            return true;
        }
        value.name() == "style" && RE_VERTICAL_CSS.is_match(&element.text().collect::<String>())
    })
}
