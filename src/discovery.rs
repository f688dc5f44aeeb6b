//! Mapping discovery between two IEDs.
//!
//! [`get_mapping_info`] walks the GOOSE and SV control blocks of a publisher
//! IED and collects, for each one, the subscriber ExtRefs of a second IED that
//! reference it. Results are expressed in portable identities so they can be
//! captured into a stencil and re-applied to other IEDs.

use crate::combinations::combinations;
use crate::document::{ElementId, SclDocument};
use crate::identity::portable;
use crate::matcher::{MatchOptions, find_subscriptions_within, is_subscribed, matching_fcda};
use crate::model::{ControlBlockInfo, ControlBlockKind, Mapping, NO_SUPERVISION};
use crate::supervision::find_supervision;
use crate::vendor::RecognizerRegistry;
use anyhow::{Result, anyhow};
use tracing::{debug, info};

/// Knobs for discovery.
#[derive(Debug, Default)]
pub struct DiscoveryOptions {
    pub matching: MatchOptions,
    pub recognizers: RecognizerRegistry,
}

/// Discover the control blocks of `from_name` subscribed by `to_name`,
/// using default matching and the default vendor recognizers.
pub fn get_mapping_info(
    doc: &SclDocument,
    from_name: &str,
    to_name: &str,
) -> Result<Vec<ControlBlockInfo>> {
    get_mapping_info_with(doc, from_name, to_name, &DiscoveryOptions::default())
}

/// Like [`get_mapping_info`] with explicit options.
///
/// Control blocks without any accepted ExtRef are omitted. Order follows the
/// document: control blocks in publisher order, mappings in subscriber order.
pub fn get_mapping_info_with(
    doc: &SclDocument,
    from_name: &str,
    to_name: &str,
    options: &DiscoveryOptions,
) -> Result<Vec<ControlBlockInfo>> {
    let from_ied = doc
        .ied(from_name)
        .ok_or_else(|| anyhow!("IED {} not found", from_name))?;
    let to_ied = doc
        .ied(to_name)
        .ok_or_else(|| anyhow!("IED {} not found", to_name))?;

    let control_blocks = doc.descendants(from_ied).filter(|e| {
        ControlBlockKind::from_tag(doc.tag(*e))
            .is_some_and(|kind| ControlBlockKind::SUBSCRIBABLE.contains(&kind))
    });

    let mut infos = Vec::new();
    for cb in control_blocks {
        let mappings = control_block_mappings(doc, cb, to_ied, from_name, to_name, options);
        if mappings.is_empty() {
            continue;
        }
        let Some(kind) = ControlBlockKind::from_tag(doc.tag(cb)) else {
            continue;
        };
        let supervision = match find_supervision(doc, cb, to_ied) {
            Some(ln) => portable(doc, Some(ln), to_name),
            None => NO_SUPERVISION.to_string(),
        };
        let info = ControlBlockInfo {
            id: portable(doc, Some(cb), from_name),
            name: doc.attribute_or_empty(cb, "name").to_string(),
            from: from_name.to_string(),
            to: to_name.to_string(),
            kind,
            mappings,
            supervision,
        };
        debug!(id = %info.id, mappings = info.mappings.len(), "control block discovered");
        infos.push(info);
    }
    info!(from = from_name, to = to_name, control_blocks = infos.len(), "discovery done");
    Ok(infos)
}

fn control_block_mappings(
    doc: &SclDocument,
    cb: ElementId,
    to_ied: ElementId,
    from_name: &str,
    to_name: &str,
    options: &DiscoveryOptions,
) -> Vec<Mapping> {
    find_subscriptions_within(doc, to_ied, cb, &options.matching)
        .into_iter()
        .filter_map(|ext_ref| {
            if is_subscribed(doc, ext_ref) {
                Some(Mapping::Data {
                    fcda: portable(doc, matching_fcda(doc, cb, ext_ref), from_name),
                    ext_ref: portable(doc, Some(ext_ref), to_name),
                })
            } else {
                let note = options.recognizers.recognize(doc, ext_ref)?;
                Some(Mapping::Quality {
                    ext_ref: portable(doc, Some(ext_ref), to_name),
                    note,
                })
            }
        })
        .collect()
}

/// Discover mappings for every pair of `ied_names` in both directions.
///
/// Pairs are visited in combination order; for each pair `(a, b)` the
/// results of `a → b` precede those of `b → a`.
pub fn discover_pairs(
    doc: &SclDocument,
    ied_names: &[String],
    options: &DiscoveryOptions,
) -> Result<Vec<ControlBlockInfo>> {
    let mut infos = Vec::new();
    for pair in combinations(ied_names, 2) {
        infos.extend(get_mapping_info_with(doc, &pair[0], &pair[1], options)?);
        infos.extend(get_mapping_info_with(doc, &pair[1], &pair[0], options)?);
    }
    Ok(infos)
}

/// IED names referenced by `infos` in first-appearance order (`to` before `from`).
pub fn unique_ieds(infos: &[ControlBlockInfo]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for info in infos {
        for name in [&info.to, &info.from] {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
    }
    names
}
