//! Helper functions for turning roxmltree nodes into owned element data.

use indexmap::IndexMap;
use roxmltree::{Attribute, Node};

const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Tag name including the namespace prefix used in the source, if any.
pub fn qualified_tag(node: Node) -> String {
    let name = node.tag_name();
    match name.namespace().and_then(|ns| prefix_for(node, ns)) {
        Some(prefix) => format!("{}:{}", prefix, name.name()),
        None => name.name().to_string(),
    }
}

/// Attribute name including its namespace prefix, if any.
pub fn qualified_attribute_name(node: Node, attr: &Attribute) -> String {
    match attr.namespace() {
        Some(XML_NAMESPACE) => format!("xml:{}", attr.name()),
        Some(ns) => match prefix_for(node, ns) {
            Some(prefix) => format!("{}:{}", prefix, attr.name()),
            None => attr.name().to_string(),
        },
        None => attr.name().to_string(),
    }
}

fn prefix_for<'input>(node: Node<'_, 'input>, uri: &str) -> Option<&'input str> {
    node.lookup_prefix(uri).filter(|p| !p.is_empty())
}

/// Namespace declarations introduced by `node` (not inherited from its parent).
pub fn declared_namespaces(node: Node) -> IndexMap<String, String> {
    let inherited: Vec<(Option<&str>, &str)> = node
        .parent_element()
        .map(|p| p.namespaces().map(|ns| (ns.name(), ns.uri())).collect())
        .unwrap_or_default();
    node.namespaces()
        .filter(|ns| ns.name() != Some("xml"))
        .filter(|ns| !inherited.contains(&(ns.name(), ns.uri())))
        .map(|ns| (ns.name().unwrap_or("").to_string(), ns.uri().to_string()))
        .collect()
}

/// Concatenated direct text children, trimmed; `None` if only whitespace.
pub fn direct_text(node: Node) -> Option<String> {
    let text: String = node
        .children()
        .filter(|c| c.is_text())
        .filter_map(|c| c.text())
        .collect();
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
