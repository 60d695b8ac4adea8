// src/toc/scan.rs
//
// Último recurso antes del spine: buscar entre los documentos HTML uno que
// tenga pinta de índice (palabra "contents"/"目次", enlaces a capítulos).

use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use scraper::{Html, Selector};

use super::{collect_links, element_text, is_html_item, links_to_entries};
use crate::config::TocHeuristics;
use crate::epub::{EpubArchive, ManifestItem};
use crate::navigation::{SpineMap, TocEntry};
use crate::path;

lazy_static! {
    // "cap1.xhtml", "../Text/c.html#n3"...
    static ref RE_HTML_HREF: Regex = Regex::new(r"(?i)^[^#?]+\.x?html?(#.*)?$").unwrap();
}

pub(super) fn from_scan<A: EpubArchive>(
    archive: &mut A,
    base_path: &str,
    manifest: &[ManifestItem],
    spine_map: &SpineMap,
    heuristics: &TocHeuristics,
) -> Vec<TocEntry> {
    let mut best: Option<(u32, Vec<super::Link>)> = None;

    for item in manifest.iter().filter(|item| is_html_item(item)) {
        let doc_path = path::resolve(base_path, path::strip_query_fragment(&item.href));
        let Some(content) = archive.read_entry_as_text(&doc_path) else {
            continue;
        };
        let (score, links) = score_candidate(&content, path::dirname(&doc_path), spine_map, heuristics);
        if score > 0 {
            debug!("Candidato a índice {}: puntuación {}", doc_path, score);
        }
        // Empate: se queda el primero encontrado
        if score > 0 && best.as_ref().map_or(true, |(top, _)| score > *top) {
            best = Some((score, links));
        }
    }

    match best {
        Some((_, links)) => links_to_entries(links, spine_map, heuristics),
        None => Vec::new(),
    }
}

fn score_candidate(
    content: &str,
    doc_dir: &str,
    spine_map: &SpineMap,
    heuristics: &TocHeuristics,
) -> (u32, Vec<super::Link>) {
    let document = Html::parse_document(content);
    let root = document.root_element();

    let title_selector = Selector::parse("title").unwrap();
    let title = document.select(&title_selector).next().map(element_text).unwrap_or_default();
    let body_selector = Selector::parse("body").unwrap();
    let body_text = document.select(&body_selector).next().map(element_text).unwrap_or_default();
    let haystack = format!("{} {}", title, body_text).to_lowercase();

    let mut score = 0;
    if heuristics.markers.iter().any(|marker| haystack.contains(&marker.to_lowercase())) {
        score += heuristics.marker_score;
    }

    let anchor_selector = Selector::parse("a[href]").unwrap();
    let link_count = root
        .select(&anchor_selector)
        .filter_map(|a| a.value().attr("href"))
        .map(str::trim)
        .filter(|href| !path::is_external(href) && RE_HTML_HREF.is_match(href))
        .count();

    let links = collect_links(root, doc_dir, spine_map, Some(&RE_HTML_HREF));
    if links.len() >= heuristics.min_spine_links {
        score += heuristics.spine_links_score;
    }
    if heuristics.density_divisor > 0 {
        score += ((link_count / heuristics.density_divisor) as u32).min(heuristics.density_cap);
    }

    (score, links)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epub::archive::test_support::zip_bytes;
    use crate::epub::open_archive;
    use crate::toc::tests::{spine_of, xhtml};

    const CONTENTS_PAGE: &str = r#"<html><head><title>目次</title></head><body>
        <p><a href="ch2.xhtml">第二章</a></p>
        <p><a href="ch1.xhtml#top">第一章</a></p>
        <p><a href="ch3.xhtml">第三章</a></p>
        <p><a href="notes.pdf">notas</a></p>
    </body></html>"#;

    const LINKY_CHAPTER: &str = r#"<html><body><p>Texto con
        <a href="ch1.xhtml">uno</a> <a href="ch2.xhtml">dos</a></p></body></html>"#;

    fn setup() -> (Vec<ManifestItem>, SpineMap) {
        let manifest = vec![
            xhtml("c0", "Text/ch0.xhtml"),
            xhtml("c1", "Text/ch1.xhtml"),
            xhtml("c2", "Text/ch2.xhtml"),
            xhtml("c3", "Text/ch3.xhtml"),
            xhtml("contents", "Text/contents.xhtml"),
        ];
        let spine_map = SpineMap::new("", &manifest, &spine_of(&["contents", "c0", "c1", "c2", "c3"]));
        (manifest, spine_map)
    }

    #[test]
    fn test_scan_picks_contents_page() {
        let (manifest, spine_map) = setup();
        let mut archive = open_archive(zip_bytes(&[
            ("Text/ch0.xhtml", LINKY_CHAPTER),
            ("Text/contents.xhtml", CONTENTS_PAGE),
        ]))
        .unwrap();

        let toc = from_scan(&mut archive, "", &manifest, &spine_map, &TocHeuristics::default());
        let labels: Vec<&str> = toc.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["第一章", "第二章", "第三章"]);
        assert_eq!(toc[0].href, "Text/ch1.xhtml#top");
    }

    #[test]
    fn test_scan_tie_keeps_first_candidate() {
        let (manifest, spine_map) = setup();
        // Misma puntuación que CONTENTS_PAGE, pero ch0 va antes en el manifiesto
        let other_contents = r#"<html><head><title>Contents</title></head><body>
            <p><a href="ch1.xhtml">One</a></p>
            <p><a href="ch2.xhtml">Two</a></p>
            <p><a href="ch3.xhtml">Three</a></p>
        </body></html>"#;
        let mut archive = open_archive(zip_bytes(&[
            ("Text/ch0.xhtml", other_contents),
            ("Text/contents.xhtml", CONTENTS_PAGE),
        ]))
        .unwrap();

        let toc = from_scan(&mut archive, "", &manifest, &spine_map, &TocHeuristics::default());
        let labels: Vec<&str> = toc.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["One", "Two", "Three"]);
    }

    #[test]
    fn test_scan_without_candidates_is_empty() {
        let (manifest, spine_map) = setup();
        let mut archive = open_archive(zip_bytes(&[("Text/ch1.xhtml", "<html><body><p>nada</p></body></html>")])).unwrap();
        assert!(from_scan(&mut archive, "", &manifest, &spine_map, &TocHeuristics::default()).is_empty());
    }

    #[test]
    fn test_score_counts_marker_and_links() {
        let (_, spine_map) = setup();
        let (score, links) = score_candidate(CONTENTS_PAGE, "Text", &spine_map, &TocHeuristics::default());
        // marcador (3) + al menos 3 enlaces al spine (2) + densidad 3/5 = 0
        assert_eq!(score, 5);
        assert_eq!(links.len(), 3);
    }
}
