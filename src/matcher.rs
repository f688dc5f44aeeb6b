//! Control block ↔ ExtRef subscription matching.
//!
//! A subscriber's `ExtRef` names its source control block through the
//! `iedName`, `srcLDInst`, `srcPrefix`, `srcLNClass`, `srcLNInst`, `srcCBName`
//! and `serviceType` attributes. Missing `src*` attributes fall back to the
//! ExtRef's own `ldInst` (for the logical device) or to the device-level
//! logical node `LLN0` (for the class).

use crate::document::{ElementId, SclDocument};
use crate::model::ControlBlockKind;

/// Structural coordinates of a control block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlBlockCoordinates {
    pub ied_name: String,
    pub ld_inst: String,
    pub prefix: String,
    pub ln_class: String,
    pub ln_inst: String,
    pub cb_name: String,
    pub kind: ControlBlockKind,
}

impl ControlBlockCoordinates {
    /// Read the coordinates of `control_block`. Returns `None` if the element
    /// is not a control block or is not placed inside IED/LDevice/LN0.
    pub fn of(doc: &SclDocument, control_block: ElementId) -> Option<Self> {
        let kind = ControlBlockKind::from_tag(doc.tag(control_block))?;
        let ln = doc.parent(control_block)?;
        let ld = doc.closest(ln, "LDevice")?;
        Some(Self {
            ied_name: doc.ied_name_of(control_block)?.to_string(),
            ld_inst: doc.attribute_or_empty(ld, "inst").to_string(),
            prefix: doc.attribute_or_empty(ln, "prefix").to_string(),
            ln_class: doc.attribute_or_empty(ln, "lnClass").to_string(),
            ln_inst: doc.attribute_or_empty(ln, "inst").to_string(),
            cb_name: doc.attribute_or_empty(control_block, "name").to_string(),
            kind,
        })
    }
}

/// Strictness of the matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchOptions {
    /// Accept ExtRefs with a missing or empty `serviceType` once all
    /// coordinates agree (legacy references).
    pub accept_untyped_references: bool,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            accept_untyped_references: true,
        }
    }
}

impl MatchOptions {
    /// Require an explicit, matching `serviceType` on every reference.
    pub fn strict() -> Self {
        Self {
            accept_untyped_references: false,
        }
    }
}

/// Does `ext_ref` reference the control block described by `cb`?
pub fn matches_control_block(
    doc: &SclDocument,
    cb: &ControlBlockCoordinates,
    ext_ref: ElementId,
    options: &MatchOptions,
) -> bool {
    let attr = |name: &str| doc.non_empty_attribute(ext_ref, name);

    let ld_inst = attr("srcLDInst").or_else(|| attr("ldInst")).unwrap_or("");
    let prefix = attr("srcPrefix").unwrap_or("");
    let ln_class = attr("srcLNClass").unwrap_or("LLN0");
    let ln_inst = attr("srcLNInst").unwrap_or("");

    let coordinates_agree = attr("iedName") == Some(cb.ied_name.as_str())
        && attr("srcCBName") == Some(cb.cb_name.as_str())
        && ld_inst == cb.ld_inst
        && prefix == cb.prefix
        && ln_class == cb.ln_class
        && ln_inst == cb.ln_inst;
    if !coordinates_agree {
        return false;
    }

    match attr("serviceType") {
        Some(service_type) => service_type == cb.kind.service_type(),
        None => options.accept_untyped_references,
    }
}

/// ExtRefs below `scope` that reference `control_block`, in document order.
pub fn find_subscriptions_within(
    doc: &SclDocument,
    scope: ElementId,
    control_block: ElementId,
    options: &MatchOptions,
) -> Vec<ElementId> {
    let Some(cb) = ControlBlockCoordinates::of(doc, control_block) else {
        return Vec::new();
    };
    doc.descendants_by_tag(scope, "ExtRef")
        .filter(|ext_ref| matches_control_block(doc, &cb, *ext_ref, options))
        .collect()
}

/// All ExtRefs in the document that reference `control_block`.
pub fn find_control_block_subscriptions(
    doc: &SclDocument,
    control_block: ElementId,
    options: &MatchOptions,
) -> Vec<ElementId> {
    find_subscriptions_within(doc, doc.root(), control_block, options)
}

/// Is `ext_ref` bound to a concrete data source?
///
/// True when `iedName`, `ldInst`, `lnClass`, `lnInst` and `doName` are all
/// present, independent of whether any control block matches it.
pub fn is_subscribed(doc: &SclDocument, ext_ref: ElementId) -> bool {
    ["iedName", "ldInst", "lnClass", "lnInst", "doName"]
        .iter()
        .all(|name| doc.has_attribute(ext_ref, name))
}

/// Do `ext_ref` and `fcda` address the same data attribute?
pub fn match_data_attributes(doc: &SclDocument, ext_ref: ElementId, fcda: ElementId) -> bool {
    ["ldInst", "prefix", "lnClass", "lnInst", "doName", "daName"]
        .iter()
        .all(|name| doc.attribute_or_empty(ext_ref, name) == doc.attribute_or_empty(fcda, name))
}

/// The data set referenced by a control block's `datSet`, looked up in the
/// control block's own logical node.
pub fn control_block_data_set(doc: &SclDocument, control_block: ElementId) -> Option<ElementId> {
    let name = doc.non_empty_attribute(control_block, "datSet")?;
    let ln = doc.parent(control_block)?;
    doc.child_named(ln, "DataSet", name)
}

/// The FCDA of the control block's data set addressed by `ext_ref`, if any.
pub fn matching_fcda(
    doc: &SclDocument,
    control_block: ElementId,
    ext_ref: ElementId,
) -> Option<ElementId> {
    let data_set = control_block_data_set(doc, control_block)?;
    doc.children_by_tag(data_set, "FCDA")
        .find(|fcda| match_data_attributes(doc, ext_ref, *fcda))
}
