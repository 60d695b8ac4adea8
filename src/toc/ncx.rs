// src/toc/ncx.rs
//
// NCX de EPUB2. El prefijo de namespace de los elementos no es fiable
// ("navPoint", "ncx:navPoint"...), así que todo se busca por nombre local.

use std::collections::HashSet;

use log::warn;
use roxmltree::Node;

use crate::config::TocHeuristics;
use crate::epub::{parse_xml, EpubArchive, ManifestItem};
use crate::errors::EpubError;
use crate::navigation::{SpineMap, TocEntry};
use crate::path;

const NCX_MIME_TYPE: &str = "application/x-dtbncx+xml";

pub(super) fn from_ncx<A: EpubArchive>(
    archive: &mut A,
    base_path: &str,
    manifest: &[ManifestItem],
    spine_map: &SpineMap,
    heuristics: &TocHeuristics,
) -> Vec<TocEntry> {
    let Some(ncx_item) = manifest.iter().find(|item| {
        item.media_type == NCX_MIME_TYPE
            || path::strip_query_fragment(&item.href).to_ascii_lowercase().ends_with(".ncx")
    }) else {
        return Vec::new();
    };

    let ncx_path = path::resolve(base_path, path::strip_query_fragment(&ncx_item.href));
    let Some(content) = archive.read_entry_as_text(&ncx_path) else {
        warn!("No se pudo leer el NCX: {}", ncx_path);
        return Vec::new();
    };
    let doc = match parse_xml(&content) {
        Ok(doc) => doc,
        Err(e) => {
            warn!("{}", EpubError::TocParseError(format!("{}: {}", ncx_path, e)));
            return Vec::new();
        }
    };
    let Some(nav_map) = doc.descendants().find(|n| n.tag_name().name() == "navMap") else {
        warn!("{}", EpubError::TocParseError(format!("no hay <navMap> en {}", ncx_path)));
        return Vec::new();
    };

    let walker = NavPointWalker {
        ncx_dir: path::dirname(&ncx_path),
        spine_map,
        heuristics,
    };
    let mut toc = walker.walk(nav_map);
    let mut counter = 0;
    assign_ids(&mut toc, &mut counter);
    toc
}

struct NavPointWalker<'a> {
    ncx_dir: &'a str,
    spine_map: &'a SpineMap,
    heuristics: &'a TocHeuristics,
}

impl NavPointWalker<'_> {
    // Función recursiva: conserva la jerarquía de navPoint
    fn walk(&self, parent: Node) -> Vec<TocEntry> {
        let mut entries = Vec::new();
        let mut seen_leaves = HashSet::new();

        for nav_point in parent.children().filter(|n| n.tag_name().name() == "navPoint") {
            let Some(entry) = self.nav_point(nav_point) else {
                continue;
            };
            // Hermanos hoja con el mismo destino: solo el primero
            if entry.children.is_empty() && !seen_leaves.insert(entry.href.clone()) {
                continue;
            }
            entries.push(entry);
        }
        entries
    }

    fn nav_point(&self, node: Node) -> Option<TocEntry> {
        let children = self.walk(node);

        let target = node
            .children()
            .find(|n| n.tag_name().name() == "content")
            .and_then(|content| content.attribute("src"))
            .and_then(|src| self.resolve_src(src));

        // Sin destino propio: se usa el del primer descendiente; si tampoco
        // hay, se descarta el nodo entero.
        let (href, spine_index) = match target {
            Some(found) => found,
            None => {
                let first = children.first()?;
                (first.href.clone(), self.spine_map.index_of_href(&first.href)?)
            }
        };

        let label = nav_label(node).unwrap_or_else(|| self.heuristics.fallback_label(spine_index + 1));
        Some(TocEntry {
            id: String::new(),
            label,
            href,
            children,
        })
    }

    // src relativo al NCX -> href relativo al OPF, como los del manifiesto
    fn resolve_src(&self, src: &str) -> Option<(String, usize)> {
        let src = src.trim();
        if src.is_empty() || path::is_external(src) {
            return None;
        }
        let full_path = path::resolve(self.ncx_dir, path::strip_query_fragment(src));
        let spine_index = self.spine_map.index_of_path(&full_path)?;
        let manifest_href = self.spine_map.manifest_href(spine_index)?;
        let href = path::with_fragment(path::strip_query_fragment(manifest_href), path::fragment(src));
        Some((href, spine_index))
    }
}

fn nav_label(nav_point: Node) -> Option<String> {
    let label_node = nav_point.children().find(|n| n.tag_name().name() == "navLabel")?;
    let text: String = label_node
        .descendants()
        .filter(|n| n.tag_name().name() == "text")
        .flat_map(|n| n.descendants().filter(Node::is_text).filter_map(|t| t.text()))
        .collect();
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!text.is_empty()).then_some(text)
}

fn assign_ids(entries: &mut [TocEntry], counter: &mut usize) {
    for entry in entries {
        *counter += 1;
        entry.id = format!("toc-{}", counter);
        assign_ids(&mut entry.children, counter);
    }
}
