//! Subscription supervision (LGOS / LSVS logical nodes).
//!
//! A subscriber monitors a GOOSE or SV stream with an `LGOS` or `LSVS` logical
//! node whose `GoCBRef` / `SvCBRef` data object carries the control block's
//! object reference in `DAI name="setSrcRef"`.

use crate::document::{Edit, ElementId, NewElement, SclDocument};
use crate::identity::object_reference;
use crate::model::ControlBlockKind;
use tracing::debug;

const SRC_REF: &str = "setSrcRef";

/// The `Val` element below `DOI <data_object> / DAI setSrcRef`, if present.
fn src_ref_value(doc: &SclDocument, ln: ElementId, data_object: &str) -> Option<ElementId> {
    let doi = doc.child_named(ln, "DOI", data_object)?;
    let dai = doc.child_named(doi, "DAI", SRC_REF)?;
    doc.children_by_tag(dai, "Val").next()
}

/// Supervision LNs of `ln_class` in `ied`, in document order.
fn supervision_lns<'a>(
    doc: &'a SclDocument,
    ied: ElementId,
    ln_class: &'a str,
) -> impl Iterator<Item = ElementId> + 'a {
    doc.descendants_by_tag(ied, "LN")
        .filter(move |ln| doc.attribute(*ln, "lnClass") == Some(ln_class))
}

/// The LN in `subscriber_ied` supervising `control_block`, if any.
///
/// Returns the first LGOS/LSVS (matching the control block kind) whose
/// `setSrcRef` value equals the control block's object reference.
pub fn find_supervision(
    doc: &SclDocument,
    control_block: ElementId,
    subscriber_ied: ElementId,
) -> Option<ElementId> {
    let kind = ControlBlockKind::from_tag(doc.tag(control_block))?;
    let ln_class = kind.supervision_ln_class()?;
    let data_object = kind.supervision_data_object()?;
    let cb_ref = object_reference(doc, control_block)?;
    supervision_lns(doc, subscriber_ied, ln_class).find(|ln| {
        src_ref_value(doc, *ln, data_object)
            .and_then(|val| doc.text(val))
            .is_some_and(|text| text == cb_ref)
    })
}

/// Where to place a supervision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisionTarget {
    /// A subscriber IED, or a specific LGOS/LSVS LN within it.
    pub subscriber: ElementId,
    /// The control block to be supervised.
    pub source_control_block: ElementId,
}

/// Policy for [`instantiate_subscription_supervision`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisionOptions {
    /// Allow creating a new LN when no free one exists in the subscriber IED.
    pub new_supervision_ln: bool,
    /// Instance number of a newly created LN; next free number when `None`.
    pub fixed_ln_inst: Option<u32>,
    /// Decline when the `setSrcRef` attribute is read-only.
    pub check_editable_src_ref: bool,
    /// Decline when the subscriber already supervises the control block.
    pub check_duplicate_supervisions: bool,
    /// Decline when `Services/SupSubscription` limits would be exceeded.
    pub check_max_supervision_limits: bool,
}

impl Default for SupervisionOptions {
    fn default() -> Self {
        Self {
            new_supervision_ln: false,
            fixed_ln_inst: None,
            check_editable_src_ref: true,
            check_duplicate_supervisions: true,
            check_max_supervision_limits: true,
        }
    }
}

impl SupervisionOptions {
    /// Every check disabled and no LN creation; the caller has already
    /// chosen the supervision LN.
    pub fn unchecked() -> Self {
        Self {
            new_supervision_ln: false,
            fixed_ln_inst: None,
            check_editable_src_ref: false,
            check_duplicate_supervisions: false,
            check_max_supervision_limits: false,
        }
    }
}

/// Build the edit that makes `target.subscriber` supervise
/// `target.source_control_block`.
///
/// Returns `None` when the policy declines or the structure does not allow
/// a supervision (wrong LN class, no free LN, no LN type available).
pub fn instantiate_subscription_supervision(
    doc: &SclDocument,
    target: SupervisionTarget,
    options: &SupervisionOptions,
) -> Option<Edit> {
    let cb = target.source_control_block;
    let kind = ControlBlockKind::from_tag(doc.tag(cb))?;
    let ln_class = kind.supervision_ln_class()?;
    let data_object = kind.supervision_data_object()?;
    let cb_ref = object_reference(doc, cb)?;
    let ied = doc.closest(target.subscriber, "IED")?;

    if options.check_duplicate_supervisions && find_supervision(doc, cb, ied).is_some() {
        debug!(%cb_ref, "supervision already present");
        return None;
    }

    let existing = if matches!(doc.tag(target.subscriber), "LN" | "LN0") {
        if doc.attribute(target.subscriber, "lnClass") != Some(ln_class) {
            debug!(%cb_ref, "target LN has the wrong class");
            return None;
        }
        Some(target.subscriber)
    } else {
        supervision_lns(doc, ied, ln_class).find(|ln| {
            src_ref_value(doc, *ln, data_object)
                .and_then(|val| doc.text(val))
                .is_none_or(str::is_empty)
        })
    };

    match existing {
        Some(ln) => {
            if options.check_editable_src_ref && !src_ref_editable(doc, ln, data_object) {
                debug!(%cb_ref, "setSrcRef is not editable");
                return None;
            }
            Some(write_src_ref(doc, ln, data_object, &cb_ref))
        }
        None if options.new_supervision_ln => {
            if options.check_max_supervision_limits
                && !below_supervision_limit(doc, ied, kind, ln_class)
            {
                debug!(%cb_ref, "supervision limit reached");
                return None;
            }
            new_supervision_ln(doc, ied, ln_class, data_object, &cb_ref, options.fixed_ln_inst)
        }
        None => None,
    }
}

fn src_ref_editable(doc: &SclDocument, ln: ElementId, data_object: &str) -> bool {
    let Some(dai) = doc
        .child_named(ln, "DOI", data_object)
        .and_then(|doi| doc.child_named(doi, "DAI", SRC_REF))
    else {
        return true;
    };
    doc.attribute(dai, "valKind") != Some("RO") || doc.attribute(dai, "valImport") == Some("true")
}

fn below_supervision_limit(
    doc: &SclDocument,
    ied: ElementId,
    kind: ControlBlockKind,
    ln_class: &str,
) -> bool {
    let limit_attr = match kind {
        ControlBlockKind::Goose => "maxGo",
        _ => "maxSv",
    };
    let limit = doc
        .children_by_tag(ied, "Services")
        .flat_map(|s| doc.children_by_tag(s, "SupSubscription"))
        .find_map(|sup| doc.attribute(sup, limit_attr))
        .and_then(|v| v.parse::<usize>().ok());
    match limit {
        Some(max) => supervision_lns(doc, ied, ln_class).count() < max,
        None => true,
    }
}

/// Edit setting the `setSrcRef` value, creating DOI/DAI/Val where missing.
fn write_src_ref(doc: &SclDocument, ln: ElementId, data_object: &str, cb_ref: &str) -> Edit {
    let val = NewElement::new("Val").text(cb_ref);
    let dai = NewElement::new("DAI")
        .attr("name", SRC_REF)
        .attr("valImport", "true")
        .attr("valKind", "RO");

    let Some(doi) = doc.child_named(ln, "DOI", data_object) else {
        let reference = doc
            .children(ln)
            .find(|c| !matches!(doc.tag(*c), "Text" | "Private" | "DOI"));
        return Edit::Insert {
            parent: ln,
            element: NewElement::new("DOI")
                .attr("name", data_object)
                .child(dai.child(val)),
            reference,
        };
    };
    let Some(dai_id) = doc.child_named(doi, "DAI", SRC_REF) else {
        return Edit::Insert {
            parent: doi,
            element: dai.child(val),
            reference: None,
        };
    };
    match doc.children_by_tag(dai_id, "Val").next() {
        Some(existing) => Edit::SetText {
            element: existing,
            text: Some(cb_ref.to_string()),
        },
        None => Edit::Insert {
            parent: dai_id,
            element: val,
            reference: None,
        },
    }
}

fn new_supervision_ln(
    doc: &SclDocument,
    ied: ElementId,
    ln_class: &str,
    data_object: &str,
    cb_ref: &str,
    fixed_inst: Option<u32>,
) -> Option<Edit> {
    let existing: Vec<ElementId> = supervision_lns(doc, ied, ln_class).collect();
    let ln_type = existing
        .iter()
        .find_map(|ln| doc.non_empty_attribute(*ln, "lnType"))
        .or_else(|| template_ln_type(doc, ln_class))?
        .to_string();

    let inst = match fixed_inst {
        Some(inst) if inst > 0 => inst,
        _ => (1..)
            .find(|n: &u32| {
                !existing
                    .iter()
                    .any(|ln| doc.attribute(*ln, "inst") == Some(n.to_string().as_str()))
            })
            .unwrap_or(1),
    };

    // place next to the last LN of the same class, else after the last LN of the first LDevice
    let (parent, after) = match existing.last() {
        Some(last) => (doc.parent(*last)?, Some(*last)),
        None => {
            let ld = doc.descendants_by_tag(ied, "LDevice").next()?;
            let last_ln = doc
                .children(ld)
                .filter(|c| matches!(doc.tag(*c), "LN0" | "LN"))
                .last();
            (ld, last_ln)
        }
    };
    let reference = after.and_then(|a| {
        doc.children(parent)
            .skip_while(|c| *c != a)
            .nth(1)
    });

    let element = NewElement::new("LN")
        .attr("lnClass", ln_class)
        .attr("inst", inst.to_string())
        .attr("lnType", ln_type)
        .child(
            NewElement::new("DOI").attr("name", data_object).child(
                NewElement::new("DAI")
                    .attr("name", SRC_REF)
                    .attr("valImport", "true")
                    .attr("valKind", "RO")
                    .child(NewElement::new("Val").text(cb_ref)),
            ),
        );
    Some(Edit::Insert {
        parent,
        element,
        reference,
    })
}

fn template_ln_type<'a>(doc: &'a SclDocument, ln_class: &str) -> Option<&'a str> {
    let templates = doc.children_by_tag(doc.root(), "DataTypeTemplates").next()?;
    doc.children_by_tag(templates, "LNodeType")
        .find(|t| doc.attribute(*t, "lnClass") == Some(ln_class))
        .and_then(|t| doc.attribute(t, "id"))
}
