//! Generate SCL XML text from a [`SclDocument`].
//!
//! Output uses 2-space indentation and an XML declaration. Attribute and
//! namespace declaration order follow the parsed input.

use crate::document::{ElementId, SclDocument};

/// Generate the XML text for the whole document.
pub fn generate_scl_xml(doc: &SclDocument) -> String {
    let mut out = String::with_capacity(16 * 1024);
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    write_element(&mut out, doc, doc.root(), 0);
    out
}

fn indent(out: &mut String, level: usize) {
    for _ in 0..level {
        out.push_str("  ");
    }
}

/// Escape text content for XML.
fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Escape an attribute value for XML. Like [`xml_escape`] but also encodes
/// quotes, newlines as `&#xA;` and carriage returns as `&#xD;`.
fn xml_escape_attr(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            '\t' => out.push_str("&#x9;"),
            _ => out.push(ch),
        }
    }
    out
}

fn write_element(out: &mut String, doc: &SclDocument, id: ElementId, level: usize) {
    let element = doc.element(id);
    indent(out, level);
    out.push('<');
    out.push_str(&element.tag);
    for (prefix, uri) in &element.namespaces {
        if prefix.is_empty() {
            out.push_str(&format!(" xmlns=\"{}\"", xml_escape_attr(uri)));
        } else {
            out.push_str(&format!(" xmlns:{}=\"{}\"", prefix, xml_escape_attr(uri)));
        }
    }
    for (name, value) in &element.attributes {
        out.push_str(&format!(" {}=\"{}\"", name, xml_escape_attr(value)));
    }

    match (&element.text, element.children.is_empty()) {
        (None, true) => out.push_str("/>\n"),
        (Some(text), true) => {
            out.push_str(&format!(">{}</{}>\n", xml_escape(text), element.tag));
        }
        (text, false) => {
            out.push_str(">\n");
            if let Some(text) = text {
                indent(out, level + 1);
                out.push_str(&xml_escape(text));
                out.push('\n');
            }
            for child in &element.children {
                write_element(out, doc, *child, level + 1);
            }
            indent(out, level);
            out.push_str(&format!("</{}>\n", element.tag));
        }
    }
}
