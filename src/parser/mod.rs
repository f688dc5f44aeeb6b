//! SCL XML parser.
//!
//! Converts a read-only [`roxmltree::Document`] into an owned [`SclDocument`].
//! Only element nodes are kept; comments and processing instructions are
//! dropped, whitespace-only text is ignored.
//!
//! - [`helpers`] – Qualified names, namespace declarations and text extraction

pub mod helpers;

use crate::document::{Element, ElementId, SclDocument};
use anyhow::{Context, Result};
use helpers::{declared_namespaces, direct_text, qualified_attribute_name, qualified_tag};
use roxmltree::{Document, Node};

/// Parse SCL XML text into an [`SclDocument`].
pub fn parse_document(text: &str) -> Result<SclDocument> {
    let options = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..Default::default()
    };
    let xml = Document::parse_with_options(text, options).context("Failed to parse XML")?;
    let root_node = xml.root_element();
    let mut doc = SclDocument::with_root(convert_element(root_node));
    let root = doc.root();
    for child in root_node.children().filter(|c| c.is_element()) {
        build_subtree(&mut doc, root, child);
    }
    Ok(doc)
}

fn build_subtree(doc: &mut SclDocument, parent: ElementId, node: Node) {
    let id = doc.push_child(parent, convert_element(node));
    for child in node.children().filter(|c| c.is_element()) {
        build_subtree(doc, id, child);
    }
}

fn convert_element(node: Node) -> Element {
    let mut element = Element::new(qualified_tag(node));
    for attr in node.attributes() {
        element
            .attributes
            .insert(qualified_attribute_name(node, &attr), attr.value().to_string());
    }
    element.namespaces = declared_namespaces(node);
    element.text = direct_text(node);
    element
}
