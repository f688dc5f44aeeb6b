//! Structural identities of SCL elements.
//!
//! An identity is a `>`-separated path that locates an element by structure
//! (names, instances, data coordinates) rather than by position. Every element
//! below an IED has an identity starting with that IED's name, so stripping
//! the name yields a *portable* identity that can be re-prefixed with another
//! IED name to locate the structurally equivalent element elsewhere.

use crate::document::{ElementId, SclDocument};
use crate::model::NO_ELEMENT;

/// Full structural identity of `id` (including the IED name prefix).
pub fn identity(doc: &SclDocument, id: ElementId) -> String {
    let Some(parent) = doc.parent(id) else {
        return String::new();
    };
    let attr = |name: &str| doc.attribute_or_empty(id, name);
    let tag = doc.tag(id);
    let parent_identity = || {
        if parent == doc.root() {
            String::new()
        } else {
            identity(doc, parent)
        }
    };

    match tag {
        "IED" => attr("name").to_string(),
        "Server" | "Inputs" => format!("{}>", parent_identity()),
        "LDevice" => {
            let ied = doc
                .closest(id, "IED")
                .map(|ied| identity(doc, ied))
                .unwrap_or_default();
            format!("{}>>{}", ied, attr("inst"))
        }
        "LN0" => format!("{}>LLN0", parent_identity()),
        "LN" => format!(
            "{}>{} {} {}",
            parent_identity(),
            attr("prefix"),
            attr("lnClass"),
            attr("inst")
        ),
        "FCDA" => {
            let da = doc
                .non_empty_attribute(id, "daName")
                .map(|da| format!(".{}", da))
                .unwrap_or_default();
            format!(
                "{}>{}/{} {} {}.{}{} ({})",
                parent_identity(),
                attr("ldInst"),
                attr("prefix"),
                attr("lnClass"),
                attr("lnInst"),
                attr("doName"),
                da,
                attr("fc")
            )
        }
        "ExtRef" => ext_ref_identity(doc, id, &parent_identity()),
        "Val" => {
            let index = doc.sibling_index(id, |s| doc.tag(s) == "Val");
            match doc.non_empty_attribute(id, "sGroup") {
                Some(group) => format!("{}>{}.{}", parent_identity(), group, index),
                None => format!("{}>{}", parent_identity(), index),
            }
        }
        "Private" => {
            let private_type = attr("type");
            let index = doc.sibling_index(id, |s| {
                doc.tag(s) == "Private" && doc.attribute_or_empty(s, "type") == private_type
            });
            format!("{}>{}[{}]", parent_identity(), private_type, index)
        }
        _ if doc.has_attribute(id, "name") => {
            format!("{}>{}", parent_identity(), attr("name"))
        }
        _ => {
            let index = doc.sibling_index(id, |s| doc.tag(s) == tag);
            if parent == doc.root() {
                format!("{}[{}]", tag, index)
            } else {
                format!("{}>{}[{}]", parent_identity(), tag, index)
            }
        }
    }
}

fn ext_ref_identity(doc: &SclDocument, id: ElementId, parent_identity: &str) -> String {
    if let Some(int_addr) = doc.non_empty_attribute(id, "intAddr") {
        let index = doc.sibling_index(id, |s| {
            doc.tag(s) == "ExtRef" && doc.attribute(s, "intAddr") == Some(int_addr)
        });
        return format!("{}>{}[{}]", parent_identity, int_addr, index);
    }

    let attr = |name: &str| doc.attribute_or_empty(id, name);
    let cb_path = match doc.non_empty_attribute(id, "srcCBName") {
        Some(cb_name) => format!(
            "{} {}/{} {} {} {} ",
            attr("serviceType"),
            doc.non_empty_attribute(id, "srcLDInst")
                .unwrap_or_else(|| attr("ldInst")),
            attr("srcPrefix"),
            doc.non_empty_attribute(id, "srcLNClass").unwrap_or("LLN0"),
            attr("srcLNInst"),
            cb_name
        ),
        None => String::new(),
    };
    format!(
        "{}>{}{} {}/{} {} {} {} {}",
        parent_identity,
        cb_path,
        attr("iedName"),
        attr("ldInst"),
        attr("prefix"),
        attr("lnClass"),
        attr("lnInst"),
        attr("doName"),
        attr("daName")
    )
}

/// Identity of `element` with the leading `ied_name` removed.
///
/// Returns [`NO_ELEMENT`] when `element` is `None`.
pub fn portable(doc: &SclDocument, element: Option<ElementId>, ied_name: &str) -> String {
    let Some(element) = element else {
        return NO_ELEMENT.to_string();
    };
    let full = identity(doc, element);
    match full.strip_prefix(ied_name) {
        Some(rest) => rest.to_string(),
        None => {
            tracing::warn!(identity = %full, ied_name, "identity does not start with IED name");
            full
        }
    }
}

/// Concrete identity for a portable identity re-homed into `ied_name`.
pub fn rehydrate(portable: &str, ied_name: &str) -> String {
    format!("{}{}", ied_name, portable)
}

/// Locate the element of kind `tag` with the given identity.
///
/// The search is scoped to the IED named by the identity's first segment
/// when such an IED exists.
pub fn find(doc: &SclDocument, tag: &str, identity_str: &str) -> Option<ElementId> {
    if tag == "IED" {
        return doc.ied(identity_str);
    }
    let scope = identity_str
        .split('>')
        .next()
        .and_then(|ied_name| doc.ied(ied_name))
        .unwrap_or_else(|| doc.root());
    doc.descendants_by_tag(scope, tag)
        .find(|e| identity(doc, *e) == identity_str)
}

/// IEC 61850 object reference of a control block, e.g. `P1CTRL/LLN0.gcb01`.
pub fn object_reference(doc: &SclDocument, control_block: ElementId) -> Option<String> {
    let ied_name = doc.ied_name_of(control_block)?;
    let ld_inst = doc.attribute(doc.closest(control_block, "LDevice")?, "inst")?;
    let ln = doc.parent(control_block)?;
    let name = doc.attribute(control_block, "name")?;
    Some(format!(
        "{}{}/{}{}{}.{}",
        ied_name,
        ld_inst,
        doc.attribute_or_empty(ln, "prefix"),
        doc.attribute_or_empty(ln, "lnClass"),
        doc.attribute_or_empty(ln, "inst"),
        name
    ))
}
