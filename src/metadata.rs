// src/metadata.rs
use roxmltree::Node;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub title: Option<String>,
    pub creator: Option<String>,
    pub language: Option<String>,
    pub identifier: Option<String>,
    pub publisher: Option<String>,
    pub date: Option<String>,
    // ID del manifiesto al que apunta <meta name="cover" content="...">
    #[serde(default)]
    pub cover_id: Option<String>,
    // <meta property="rendition:layout">pre-paginated</meta>
    #[serde(default)]
    pub rendition_layout: Option<String>,
    // <meta name="primary-writing-mode" content="vertical-rl"/> (Kindle)
    #[serde(default)]
    pub writing_mode: Option<String>,
}

impl Metadata {
    // Parsea los metadatos desde el nodo <metadata> del archivo OPF
    pub fn parse(metadata_node: Node) -> Self {
        let mut metadata = Metadata::default();

        for child in metadata_node.children().filter(Node::is_element) {
            // Usamos el nombre local para ignorar prefijos de namespace (dc:, opf:...)
            match child.tag_name().name() {
                "title" => set_once(&mut metadata.title, child),
                "creator" => set_once(&mut metadata.creator, child),
                "language" => set_once(&mut metadata.language, child),
                "identifier" => set_once(&mut metadata.identifier, child),
                "publisher" => set_once(&mut metadata.publisher, child),
                "date" => set_once(&mut metadata.date, child),
                "meta" => metadata.parse_meta(child),
                _ => {}
            }
        }
        metadata
    }

    fn parse_meta(&mut self, meta: Node) {
        // EPUB2: <meta name="..." content="..."/>
        if let (Some(name), Some(content)) = (meta.attribute("name"), meta.attribute("content")) {
            match name {
                "cover" => self.cover_id = Some(content.trim().to_string()),
                "rendition:layout" => self.rendition_layout = Some(content.trim().to_string()),
                "primary-writing-mode" => self.writing_mode = Some(content.trim().to_string()),
                _ => {}
            }
            return;
        }

        // EPUB3: <meta property="...">valor</meta>
        let value = node_text(meta);
        match meta.attribute("property") {
            Some("rendition:layout") if value.is_some() => self.rendition_layout = value,
            Some(prop) if prop.ends_with("writing-mode") && value.is_some() => {
                self.writing_mode = value
            }
            _ => {}
        }
    }

    pub fn is_pre_paginated(&self) -> bool {
        self.rendition_layout.as_deref() == Some("pre-paginated")
    }
}

fn set_once(slot: &mut Option<String>, node: Node) {
    if slot.is_none() {
        *slot = node_text(node);
    }
}

fn node_text(node: Node) -> Option<String> {
    let text: String = node.descendants().filter(Node::is_text).filter_map(|n| n.text()).collect();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}
