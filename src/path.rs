// src/path.rs
//
// Resolución de rutas dentro del ZIP. Todo el crate resuelve rutas con
// `resolve`: si dos sitios normalizan distinto, las imágenes y el TOC dejan
// de encontrar sus entradas sin dar ningún error.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // "https:", "data:", "blob:", "mailto:"... cualquier esquema
    static ref RE_SCHEME: Regex = Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:").unwrap();
}

/// Une `base` y `href` y colapsa los segmentos `.` y `..`.
///
/// Un `..` de más por encima de la raíz del archivo se ignora, nunca falla.
pub fn resolve(base: &str, href: &str) -> String {
    let combined = format!("{}/{}", base, href);
    let mut components: Vec<&str> = Vec::new();

    for component in combined.split('/') {
        match component {
            "." | "" => {}
            ".." => {
                components.pop();
            }
            _ => components.push(component),
        }
    }

    components.join("/")
}

/// Directorio que contiene `path` ("OEBPS/Text/c1.xhtml" -> "OEBPS/Text").
pub fn dirname(path: &str) -> &str {
    match path.rfind('/') {
        Some(pos) => &path[..pos],
        None => "",
    }
}

/// Quita query y fragmento: es lo que se compara contra el spine.
pub fn strip_query_fragment(href: &str) -> &str {
    let end = href.find(|c| c == '#' || c == '?').unwrap_or(href.len());
    &href[..end]
}

/// Fragmento (sin '#'), si lo hay y no está vacío.
pub fn fragment(href: &str) -> Option<&str> {
    href.split_once('#')
        .map(|(_, frag)| frag)
        .filter(|frag| !frag.is_empty())
}

/// Vuelve a pegar un fragmento a un href ya normalizado.
pub fn with_fragment(href: &str, fragment: Option<&str>) -> String {
    match fragment {
        Some(frag) => format!("{}#{}", href, frag),
        None => href.to_string(),
    }
}

/// URLs que no hay que resolver contra el archivo: absolutas, `data:`,
/// `blob:`, relativas al protocolo ("//host/x").
pub fn is_external(href: &str) -> bool {
    let href = href.trim();
    href.starts_with("//") || RE_SCHEME.is_match(href)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_resolve_parent_segment() {
        assert_eq!(resolve("a/b/", "../c.png"), "a/c.png");
    }

    #[test]
    fn test_resolve_drops_excess_parents() {
        assert_eq!(resolve("a/", "../../x"), "x");
        assert_eq!(resolve("", "../../x"), "x");
    }

    #[test]
    fn test_resolve_empty_base() {
        assert_eq!(resolve("", "Text/ch1.xhtml"), "Text/ch1.xhtml");
        assert_eq!(resolve("OEBPS", "./Text//ch1.xhtml"), "OEBPS/Text/ch1.xhtml");
    }

    #[test]
    fn test_dirname() {
        assert_eq!(dirname("OEBPS/Text/ch1.xhtml"), "OEBPS/Text");
        assert_eq!(dirname("content.opf"), "");
    }

    #[test]
    fn test_query_and_fragment() {
        assert_eq!(strip_query_fragment("ch1.xhtml#sec2"), "ch1.xhtml");
        assert_eq!(strip_query_fragment("ch1.xhtml?x=1#sec2"), "ch1.xhtml");
        assert_eq!(fragment("ch1.xhtml#sec2"), Some("sec2"));
        assert_eq!(fragment("ch1.xhtml#"), None);
        assert_eq!(fragment("ch1.xhtml"), None);
        assert_eq!(with_fragment("Text/ch1.xhtml", Some("a")), "Text/ch1.xhtml#a");
    }

    #[test]
    fn test_is_external() {
        assert!(is_external("https://x/y.png"));
        assert!(is_external("data:image/png;base64,AAAA"));
        assert!(is_external("blob:abc"));
        assert!(is_external("//cdn.example/x.png"));
        assert!(!is_external("../Images/x.png"));
        assert!(!is_external("x.png"));
    }

    proptest! {
        #[test]
        fn prop_resolve_never_keeps_dot_segments(
            base in prop::collection::vec(prop_oneof![Just("..".to_string()), Just(".".to_string()), Just(String::new()), "[a-z]{1,4}"], 0..6),
            href in prop::collection::vec(prop_oneof![Just("..".to_string()), Just(".".to_string()), Just(String::new()), "[a-z]{1,4}"], 0..6),
        ) {
            let resolved = resolve(&base.join("/"), &href.join("/"));
            for segment in resolved.split('/') {
                prop_assert!(segment != "." && segment != "..");
            }
            prop_assert!(!resolved.starts_with('/'));
            prop_assert!(!resolved.contains("//"));
        }

        #[test]
        fn prop_resolve_is_idempotent(base in "[a-z./]{0,12}", href in "[a-z./]{0,12}") {
            let once = resolve(&base, &href);
            prop_assert_eq!(resolve("", &once), once.clone());
        }
    }
}
