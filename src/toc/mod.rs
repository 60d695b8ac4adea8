// src/toc/mod.rs
//
// Tabla de contenidos canónica. Se prueban las fuentes en orden y gana la
// primera que devuelve algo:
//   1. documento de navegación EPUB3 (item con properties="nav")
//   2. NCX de EPUB2
//   3. escaneo heurístico de documentos HTML que parecen un índice
//   4. una entrada por capítulo del spine
// Todas las entradas acaban con un href relativo al OPF que apunta a una
// posición del spine; las que no resuelven se descartan.

mod ncx;
mod scan;

use std::collections::HashSet;

use log::{debug, warn};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::config::TocHeuristics;
use crate::epub::{EpubArchive, ManifestItem, SpineItem};
use crate::navigation::{SpineMap, TocEntry};
use crate::path;

pub fn resolve<A: EpubArchive>(
    archive: &mut A,
    base_path: &str,
    manifest: &[ManifestItem],
    spine: &[SpineItem],
    heuristics: &TocHeuristics,
) -> Vec<TocEntry> {
    let spine_map = SpineMap::new(base_path, manifest, spine);

    let toc = from_nav(archive, base_path, manifest, &spine_map, heuristics);
    if !toc.is_empty() {
        debug!("TOC desde el documento de navegación ({} entradas)", toc.len());
        return toc;
    }

    let toc = ncx::from_ncx(archive, base_path, manifest, &spine_map, heuristics);
    if !toc.is_empty() {
        debug!("TOC desde el NCX ({} entradas de primer nivel)", toc.len());
        return toc;
    }

    let toc = scan::from_scan(archive, base_path, manifest, &spine_map, heuristics);
    if !toc.is_empty() {
        debug!("TOC desde el escaneo heurístico ({} entradas)", toc.len());
        return toc;
    }

    warn!("No se encontró tabla de contenidos; se genera una entrada por capítulo");
    from_spine(&spine_map, heuristics)
}

/// Enlace de un documento HTML ya resuelto contra el spine.
#[derive(Debug, Clone)]
struct Link {
    label: String,
    spine_index: usize,
    fragment: Option<String>,
}

// Parsea el documento de navegación (EPUB 3)
fn from_nav<A: EpubArchive>(
    archive: &mut A,
    base_path: &str,
    manifest: &[ManifestItem],
    spine_map: &SpineMap,
    heuristics: &TocHeuristics,
) -> Vec<TocEntry> {
    let Some(nav_item) = manifest.iter().find(|item| item.has_property("nav")) else {
        return Vec::new();
    };
    let nav_path = path::resolve(base_path, path::strip_query_fragment(&nav_item.href));
    let Some(content) = archive.read_entry_as_text(&nav_path) else {
        warn!("No se pudo leer el documento de navegación: {}", nav_path);
        return Vec::new();
    };

    let document = Html::parse_document(&content);
    let nav_selector = Selector::parse("nav").unwrap();

    // Todos los <nav> en orden de documento (toc, landmarks, page-list...)
    let nav_dir = path::dirname(&nav_path);
    let links = document
        .select(&nav_selector)
        .flat_map(|nav| collect_links(nav, nav_dir, spine_map, None))
        .collect();
    links_to_entries(links, spine_map, heuristics)
}

/// Enlaces `<a href>` bajo `root` que resuelven a una posición del spine.
fn collect_links(root: ElementRef, doc_dir: &str, spine_map: &SpineMap, pattern: Option<&Regex>) -> Vec<Link> {
    let anchor_selector = Selector::parse("a[href]").unwrap();
    let mut links = Vec::new();

    for anchor in root.select(&anchor_selector) {
        let Some(href) = anchor.value().attr("href").map(str::trim) else {
            continue;
        };
        if href.is_empty() || path::is_external(href) {
            continue;
        }
        if pattern.map_or(false, |re| !re.is_match(href)) {
            continue;
        }
        let target = path::resolve(doc_dir, path::strip_query_fragment(href));
        let Some(spine_index) = spine_map.index_of_path(&target) else {
            debug!("Enlace del TOC sin capítulo en el spine: {}", href);
            continue;
        };
        links.push(Link {
            label: element_text(anchor),
            spine_index,
            fragment: path::fragment(href).map(str::to_string),
        });
    }
    links
}

/// Texto del elemento con los espacios colapsados.
fn element_text(element: ElementRef) -> String {
    element.text().collect::<String>().split_whitespace().collect::<Vec<_>>().join(" ")
}

// Un destino del spine solo aparece una vez (la primera), y el resultado
// queda en orden de lectura.
fn links_to_entries(links: Vec<Link>, spine_map: &SpineMap, heuristics: &TocHeuristics) -> Vec<TocEntry> {
    let mut seen = HashSet::new();
    let mut links: Vec<Link> = links.into_iter().filter(|link| seen.insert(link.spine_index)).collect();
    links.sort_by_key(|link| link.spine_index);

    links
        .into_iter()
        .filter_map(|link| {
            let href = spine_map.manifest_href(link.spine_index)?;
            let href = path::with_fragment(path::strip_query_fragment(href), link.fragment.as_deref());
            let label = if link.label.is_empty() {
                heuristics.fallback_label(link.spine_index + 1)
            } else {
                link.label
            };
            Some(TocEntry::leaf(String::new(), label, href))
        })
        .enumerate()
        .map(|(i, mut entry)| {
            entry.id = format!("toc-{}", i + 1);
            entry
        })
        .collect()
}

fn from_spine(spine_map: &SpineMap, heuristics: &TocHeuristics) -> Vec<TocEntry> {
    (0..spine_map.len())
        .filter_map(|index| {
            let href = spine_map.manifest_href(index)?;
            Some(TocEntry::leaf(
                format!("toc-{}", index + 1),
                heuristics.fallback_label(index + 1),
                path::strip_query_fragment(href),
            ))
        })
        .collect()
}

fn is_html_item(item: &ManifestItem) -> bool {
    let href = path::strip_query_fragment(&item.href).to_ascii_lowercase();
    item.media_type.contains("html")
        || href.ends_with(".xhtml")
        || href.ends_with(".html")
        || href.ends_with(".htm")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::epub::archive::test_support::zip_bytes;
    use crate::epub::open_archive;

    pub(crate) fn item(id: &str, href: &str, media_type: &str, properties: Option<&str>) -> ManifestItem {
        ManifestItem {
            id: id.into(),
            href: href.into(),
            media_type: media_type.into(),
            properties: properties.map(str::to_string),
        }
    }

    pub(crate) fn xhtml(id: &str, href: &str) -> ManifestItem {
        item(id, href, "application/xhtml+xml", None)
    }

    pub(crate) fn spine_of(ids: &[&str]) -> Vec<SpineItem> {
        ids.iter().map(|id| SpineItem { idref: id.to_string(), linear: None }).collect()
    }

    const NAV: &str = r#"<html xmlns:epub="http://www.idpf.org/2007/ops"><body>
      <nav epub:type="toc"><ol>
        <li><a href="../Text/ch2.xhtml?v=2#s1">  Segundo
             capítulo </a></li>
        <li><a href="../Text/ch1.xhtml">Primero</a>
          <ol><li><a href="../Text/ch1.xhtml#sub">Sub</a></li></ol></li>
        <li><a href="../Text/missing.xhtml">Perdido</a></li>
        <li><a href="https://example.com/">Fuera</a></li>
        <li><a href="../Text/ch3.xhtml"></a></li>
      </ol></nav>
      <nav epub:type="page-list"><ol><li><a href="../Text/ch4.xhtml#p5">5</a></li></ol></nav>
    </body></html>"#;

    const NCX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE ncx PUBLIC "-//NISO//DTD ncx 2005-1//EN" "http://www.daisy.org/z3986/2005/ncx-2005-1.dtd">
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1"><navMap>
  <navPoint id="n1"><navLabel><text>Solo en NCX</text></navLabel><content src="Text/ch3.xhtml"/></navPoint>
</navMap></ncx>"#;

    fn manifest() -> Vec<ManifestItem> {
        vec![
            xhtml("c1", "Text/ch1.xhtml"),
            xhtml("c2", "Text/ch2.xhtml"),
            xhtml("c3", "Text/ch3.xhtml"),
            xhtml("c4", "Text/ch4.xhtml"),
            item("nav", "Nav/nav.xhtml", "application/xhtml+xml", Some("nav")),
            item("ncx", "toc.ncx", "application/x-dtbncx+xml", None),
        ]
    }

    #[test]
    fn test_nav_document_wins_over_ncx() {
        let mut archive = open_archive(zip_bytes(&[
            ("OEBPS/Nav/nav.xhtml", NAV),
            ("OEBPS/toc.ncx", NCX),
        ]))
        .unwrap();
        let toc = resolve(
            &mut archive,
            "OEBPS",
            &manifest(),
            &spine_of(&["c1", "c2", "c3", "c4"]),
            &TocHeuristics::default(),
        );

        let labels: Vec<&str> = toc.iter().map(|e| e.label.as_str()).collect();
        // Orden de lectura, sin duplicados de ch1; el page-list también cuenta
        assert_eq!(labels, vec!["Primero", "Segundo capítulo", "Capítulo 3", "5"]);
        assert!(!labels.contains(&"Solo en NCX"));
        assert_eq!(toc[0].href, "Text/ch1.xhtml");
        // La query no cuenta para resolver, el fragmento se conserva
        assert_eq!(toc[1].href, "Text/ch2.xhtml#s1");
        assert_eq!(toc[2].id, "toc-3");
        assert_eq!(toc[3].href, "Text/ch4.xhtml#p5");
    }

    #[test]
    fn test_first_nav_in_document_order_wins_duplicates() {
        let nav = r#"<html><body>
          <nav epub:type="landmarks"><ol><li><a href="../Text/ch3.xhtml">Inicio</a></li></ol></nav>
          <nav epub:type="toc"><ol>
            <li><a href="../Text/ch1.xhtml">Uno</a></li>
            <li><a href="../Text/ch3.xhtml">Tres</a></li>
          </ol></nav>
        </body></html>"#;
        let mut archive = open_archive(zip_bytes(&[("OEBPS/Nav/nav.xhtml", nav)])).unwrap();
        let toc = resolve(
            &mut archive,
            "OEBPS",
            &manifest(),
            &spine_of(&["c1", "c2", "c3"]),
            &TocHeuristics::default(),
        );
        let labels: Vec<&str> = toc.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["Uno", "Inicio"]);
    }

    #[test]
    fn test_falls_back_to_ncx_when_nav_is_empty() {
        let empty_nav = r#"<html><body><nav epub:type="toc"><ol></ol></nav></body></html>"#;
        let mut archive = open_archive(zip_bytes(&[
            ("OEBPS/Nav/nav.xhtml", empty_nav),
            ("OEBPS/toc.ncx", NCX),
        ]))
        .unwrap();
        let toc = resolve(
            &mut archive,
            "OEBPS",
            &manifest(),
            &spine_of(&["c1", "c2", "c3", "c4"]),
            &TocHeuristics::default(),
        );
        assert_eq!(toc.len(), 1);
        assert_eq!(toc[0].label, "Solo en NCX");
        assert_eq!(toc[0].href, "Text/ch3.xhtml");
    }

    #[test]
    fn test_spine_fallback_has_one_entry_per_chapter() {
        let mut archive = open_archive(zip_bytes(&[
            ("OEBPS/Text/ch1.xhtml", "<html><body><p>uno</p></body></html>"),
            ("OEBPS/Text/ch2.xhtml", "<html><body><p>dos</p></body></html>"),
            ("OEBPS/Text/ch3.xhtml", "<html><body><p>tres</p></body></html>"),
        ]))
        .unwrap();
        let manifest = vec![
            xhtml("c1", "Text/ch1.xhtml"),
            xhtml("c2", "Text/ch2.xhtml"),
            xhtml("c3", "Text/ch3.xhtml"),
        ];
        let spine = spine_of(&["c1", "c2", "c3"]);
        let toc = resolve(&mut archive, "OEBPS", &manifest, &spine, &TocHeuristics::default());

        assert_eq!(toc.len(), 3);
        let map = SpineMap::new("OEBPS", &manifest, &spine);
        for (index, entry) in toc.iter().enumerate() {
            assert_eq!(map.index_of_href(&entry.href), Some(index));
            assert_eq!(entry.label, format!("Capítulo {}", index + 1));
        }
    }

    #[test]
    fn test_is_html_item() {
        assert!(is_html_item(&xhtml("a", "a.xhtml")));
        assert!(is_html_item(&item("b", "b.htm", "application/octet-stream", None)));
        assert!(!is_html_item(&item("c", "c.css", "text/css", None)));
    }
}
