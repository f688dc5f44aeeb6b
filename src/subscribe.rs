//! Subscription edits: bind ExtRefs to published data.

use crate::document::{Edit, ElementId, SclDocument};
use crate::matcher::{ControlBlockCoordinates, is_subscribed};
use crate::supervision::{SupervisionTarget, instantiate_subscription_supervision};
use tracing::{debug, warn};

/// Published data: an FCDA together with the control block sending it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Source {
    pub fcda: ElementId,
    pub control_block: ElementId,
}

/// A subscriber ExtRef and the data it should receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connection {
    pub sink: ElementId,
    pub source: Source,
}

/// Policy for [`subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubscribeOptions {
    /// Overwrite ExtRefs that are already subscribed.
    pub force: bool,
    /// Do not create supervision for the subscribed control blocks.
    pub ignore_supervision: bool,
    /// Skip the `pLN`/`pDO`/`pDA` name restrictions.
    pub check_only_b_type: bool,
}

/// Can `connection` be established under `options`?
pub fn can_subscribe(doc: &SclDocument, connection: &Connection, options: &SubscribeOptions) -> bool {
    let sink = connection.sink;
    let fcda = connection.source.fcda;
    if doc.tag(sink) != "ExtRef" || doc.tag(fcda) != "FCDA" {
        return false;
    }
    if !options.force && is_subscribed(doc, sink) {
        debug!(?sink, "ExtRef already subscribed");
        return false;
    }
    let Some(cb) = ControlBlockCoordinates::of(doc, connection.source.control_block) else {
        return false;
    };
    if let Some(p_serv_t) = doc.non_empty_attribute(sink, "pServT") {
        if p_serv_t != cb.kind.service_type() {
            return false;
        }
    }
    if options.check_only_b_type {
        return true;
    }
    [("pLN", "lnClass"), ("pDO", "doName"), ("pDA", "daName")]
        .iter()
        .all(|(restriction, attr)| match doc.non_empty_attribute(sink, restriction) {
            Some(expected) => doc.attribute_or_empty(fcda, attr) == expected,
            None => true,
        })
}

/// Attribute update binding `connection.sink` to its source.
fn subscription_update(doc: &SclDocument, connection: &Connection) -> Option<Edit> {
    let fcda = connection.source.fcda;
    let cb = ControlBlockCoordinates::of(doc, connection.source.control_block)?;
    let publisher = doc.ied_name_of(fcda)?.to_string();
    let always = |v: &str| Some(v.to_string());
    let optional = |v: &str| (!v.is_empty()).then(|| v.to_string());
    let fcda_attr = |name: &str| doc.attribute_or_empty(fcda, name);

    let attributes = vec![
        ("iedName".to_string(), Some(publisher)),
        ("serviceType".to_string(), always(cb.kind.service_type())),
        ("ldInst".to_string(), always(fcda_attr("ldInst"))),
        ("prefix".to_string(), optional(fcda_attr("prefix"))),
        ("lnClass".to_string(), always(fcda_attr("lnClass"))),
        ("lnInst".to_string(), always(fcda_attr("lnInst"))),
        ("doName".to_string(), always(fcda_attr("doName"))),
        ("daName".to_string(), optional(fcda_attr("daName"))),
        ("srcLDInst".to_string(), always(cb.ld_inst.as_str())),
        ("srcPrefix".to_string(), optional(cb.prefix.as_str())),
        ("srcLNClass".to_string(), always(cb.ln_class.as_str())),
        ("srcLNInst".to_string(), optional(cb.ln_inst.as_str())),
        ("srcCBName".to_string(), always(cb.cb_name.as_str())),
    ];
    Some(Edit::Update {
        element: connection.sink,
        attributes,
    })
}

/// Build the edit wiring every acceptable connection.
///
/// Connections rejected by [`can_subscribe`] are skipped. Unless
/// `ignore_supervision` is set, a supervision is requested once per control
/// block and subscriber IED.
pub fn subscribe(doc: &SclDocument, connections: &[Connection], options: &SubscribeOptions) -> Edit {
    let mut edits = Vec::new();
    let mut supervised: Vec<(ElementId, ElementId)> = Vec::new();

    for connection in connections {
        if !can_subscribe(doc, connection, options) {
            warn!(sink = ?connection.sink, "connection rejected");
            continue;
        }
        let Some(update) = subscription_update(doc, connection) else {
            continue;
        };
        edits.push(update);

        if options.ignore_supervision {
            continue;
        }
        let Some(subscriber) = doc.closest(connection.sink, "IED") else {
            continue;
        };
        let key = (connection.source.control_block, subscriber);
        if supervised.contains(&key) {
            continue;
        }
        supervised.push(key);
        let target = SupervisionTarget {
            subscriber,
            source_control_block: connection.source.control_block,
        };
        if let Some(edit) = instantiate_subscription_supervision(doc, target, &Default::default()) {
            edits.push(edit);
        }
    }
    Edit::Batch(edits)
}
