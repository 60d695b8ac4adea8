// src/render/sanitize.rs
//
// Reescribe las referencias a imágenes de un capítulo (<img src>, <image
// href> de SVG) a URLs que se puedan mostrar, y quita las que no resuelven.

use std::collections::HashMap;

use ego_tree::NodeId;
use html5ever::{local_name, namespace_prefix, namespace_url, ns, QualName};
use log::{debug, warn};
use scraper::node::Element;
use scraper::{ElementRef, Html, Node, Selector};

use crate::errors::EpubError;
use crate::path;
use crate::session::{CancelToken, NeverCancel};

enum Rewrite {
    Remove,
    Src(String),
    // SVG: se ponen href y xlink:href
    SvgHref(String),
}

/// Sanea el capítulo y devuelve el marcado del <body>.
pub fn sanitize<F>(chapter_html: &str, resolve_asset: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    sanitize_cancellable(chapter_html, resolve_asset, &NeverCancel).unwrap_or_default()
}

/// Como `sanitize`, pero comprueba `cancel` tras resolver cada recurso y
/// devuelve `None` si una petición más nueva la ha dejado obsoleta.
pub fn sanitize_cancellable<F, C>(chapter_html: &str, mut resolve_asset: F, cancel: &C) -> Option<String>
where
    F: FnMut(&str) -> Option<String>,
    C: CancelToken + ?Sized,
{
    let mut document = Html::parse_document(chapter_html);

    let mut rewrites: Vec<(NodeId, Rewrite)> = Vec::new();
    let mut resolved: HashMap<String, Option<String>> = HashMap::new();

    for element in body_of(&document).descendants().filter_map(ElementRef::wrap) {
        let (reference, is_svg) = match element.value().name() {
            // El parser HTML convierte un <image> fuera de <svg> en <img href>
            "img" => match element.value().attr("src") {
                Some(src) => (Some(src), false),
                None => (svg_href(element), true),
            },
            "image" => (svg_href(element), true),
            _ => continue,
        };
        let Some(reference) = reference.map(str::trim).filter(|r| !r.is_empty()) else {
            continue;
        };
        if path::is_external(reference) {
            continue;
        }

        let url = match resolved.get(reference) {
            Some(url) => url.clone(),
            None => {
                let url = resolve_asset(reference);
                if cancel.is_cancelled() {
                    debug!("Saneado del capítulo abandonado: hay una petición más nueva");
                    return None;
                }
                resolved.insert(reference.to_string(), url.clone());
                url
            }
        };

        match (url, is_svg) {
            (Some(url), false) => rewrites.push((element.id(), Rewrite::Src(url))),
            (Some(url), true) => rewrites.push((element.id(), Rewrite::SvgHref(url))),
            (None, is_svg) => {
                warn!("{}", EpubError::AssetUnresolved(reference.to_string()));
                // Una imagen huérfana dentro de un SVG no se puede pintar a
                // medias: fuera el <svg> entero.
                let target = if is_svg { enclosing_svg(element).unwrap_or(element) } else { element };
                rewrites.push((target.id(), Rewrite::Remove));
            }
        }
    }

    for (id, rewrite) in rewrites {
        let Some(mut node) = document.tree.get_mut(id) else {
            continue;
        };
        match rewrite {
            Rewrite::Remove => node.detach(),
            Rewrite::Src(url) => {
                if let Node::Element(element) = node.value() {
                    set_attr(element, QualName::new(None, ns!(), local_name!("src")), &url);
                }
            }
            Rewrite::SvgHref(url) => {
                if let Node::Element(element) = node.value() {
                    for (_, value) in element.attrs.iter_mut().filter(|(name, _)| is_href(name)) {
                        *value = url.as_str().into();
                    }
                    set_attr(element, QualName::new(None, ns!(), local_name!("href")), &url);
                    set_attr(
                        element,
                        QualName::new(Some(namespace_prefix!("xlink")), ns!(xlink), local_name!("href")),
                        &url,
                    );
                }
            }
        }
    }

    Some(body_of(&document).inner_html())
}

pub(crate) fn body_of(document: &Html) -> ElementRef<'_> {
    let body_selector = Selector::parse("body").unwrap();
    document.select(&body_selector).next().unwrap_or_else(|| document.root_element())
}

// href, xlink:href, y "xlink:href" sin namespace cuando no hay <svg> alrededor
fn svg_href(element: ElementRef) -> Option<&str> {
    element
        .value()
        .attrs
        .iter()
        .find(|(name, _)| is_href(name))
        .map(|(_, value)| &**value)
}

fn is_href(name: &QualName) -> bool {
    &*name.local == "href" || &*name.local == "xlink:href"
}

fn enclosing_svg(element: ElementRef) -> Option<ElementRef> {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|ancestor| ancestor.value().name() == "svg")
}

// Sustituye el valor si el atributo ya existe (mismo namespace y nombre
// local, el prefijo da igual); si no, lo añade al final.
fn set_attr(element: &mut Element, name: QualName, value: &str) {
    let existing = element
        .attrs
        .iter_mut()
        .find(|(key, _)| key.ns == name.ns && key.local == name.local);
    match existing {
        Some((_, current)) => *current = value.into(),
        None => {
            element.attrs.insert(name, value.into());
        }
    }
}
