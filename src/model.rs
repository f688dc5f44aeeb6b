//! Serializable data model shared by discovery, capture and application.
//!
//! Field names follow the persisted stencil JSON format (`IEDS`,
//! `ControlBlocks`, `FCDA`, `ExtRef`, ...), so files written by other tools
//! using the same format load unchanged.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Sentinel stored in [`ControlBlockInfo::supervision`] when no supervising
/// logical node was found.
pub const NO_SUPERVISION: &str = "None";

/// Sentinel portable identity of an element that could not be resolved.
pub const NO_ELEMENT: &str = "NONE";

// ────────────────────────────────────────────────────────────────────────────
// Control blocks
// ────────────────────────────────────────────────────────────────────────────

/// Kind of a publishing control block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlBlockKind {
    #[serde(rename = "GSEControl")]
    Goose,
    #[serde(rename = "SampledValueControl")]
    SampledValue,
    #[serde(rename = "ReportControl")]
    Report,
}

impl ControlBlockKind {
    /// Kinds whose subscriptions are discovered and templated.
    pub const SUBSCRIBABLE: [ControlBlockKind; 2] =
        [ControlBlockKind::Goose, ControlBlockKind::SampledValue];

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "GSEControl" => Some(Self::Goose),
            "SampledValueControl" => Some(Self::SampledValue),
            "ReportControl" => Some(Self::Report),
            _ => None,
        }
    }

    /// SCL element tag.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Goose => "GSEControl",
            Self::SampledValue => "SampledValueControl",
            Self::Report => "ReportControl",
        }
    }

    /// Value of the ExtRef `serviceType` attribute for this kind.
    pub fn service_type(self) -> &'static str {
        match self {
            Self::Goose => "GOOSE",
            Self::SampledValue => "SMV",
            Self::Report => "Report",
        }
    }

    /// Logical node class supervising this kind of stream, if any.
    pub fn supervision_ln_class(self) -> Option<&'static str> {
        match self {
            Self::Goose => Some("LGOS"),
            Self::SampledValue => Some("LSVS"),
            Self::Report => None,
        }
    }

    /// Data object of the supervision LN holding the control block reference.
    pub fn supervision_data_object(self) -> Option<&'static str> {
        match self {
            Self::Goose => Some("GoCBRef"),
            Self::SampledValue => Some("SvCBRef"),
            Self::Report => None,
        }
    }
}

/// One source/sink pairing of a control block.
///
/// Serialized untagged: `{"FCDA", "ExtRef"}` for data, `{"ExtRef",
/// "SELMessageQuality"}` for vendor quality links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Mapping {
    Quality {
        #[serde(rename = "ExtRef")]
        ext_ref: String,
        /// Internal address of the quality reference, or a failure marker.
        #[serde(rename = "SELMessageQuality")]
        note: String,
    },
    Data {
        #[serde(rename = "FCDA")]
        fcda: String,
        #[serde(rename = "ExtRef")]
        ext_ref: String,
    },
}

impl Mapping {
    pub fn is_quality(&self) -> bool {
        matches!(self, Mapping::Quality { .. })
    }
}

/// Subscription summary of one control block between two IEDs (or functions).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlBlockInfo {
    /// Portable identity of the control block (publisher IED name stripped).
    pub id: String,
    pub name: String,
    /// Publisher: an IED name after discovery, a function name in a stencil.
    pub from: String,
    /// Subscriber: an IED name after discovery, a function name in a stencil.
    pub to: String,
    #[serde(rename = "type")]
    pub kind: ControlBlockKind,
    pub mappings: Vec<Mapping>,
    /// Portable identity of the supervising LN, or [`NO_SUPERVISION`].
    pub supervision: String,
}

impl ControlBlockInfo {
    pub fn has_supervision(&self) -> bool {
        self.supervision != NO_SUPERVISION
    }

    /// True if this block connects `a` and `b` in either direction.
    pub fn connects(&self, a: &str, b: &str) -> bool {
        (self.from == a && self.to == b) || (self.from == b && self.to == a)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Stencil catalogue
// ────────────────────────────────────────────────────────────────────────────

/// Identity tags read from `Private` elements of a captured IED.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StencilPrivates {
    #[serde(rename = "OpenSCD-Stencil-Id")]
    pub stencil_id: String,
    #[serde(rename = "OpenSCD-Stencil-Version")]
    pub stencil_version: String,
}

/// Requirements an IED must meet to fill a function of an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IedRequirement {
    /// Name of the IED the function was captured from.
    pub original_name: String,
    #[serde(rename = "type")]
    pub ied_type: String,
    pub manufacturer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default)]
    pub privates: Vec<StencilPrivates>,
}

/// One version of an application template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub deprecated: bool,
    /// Function name → IED requirements.
    #[serde(rename = "IEDS")]
    pub ieds: IndexMap<String, IedRequirement>,
    /// Control blocks whose `from`/`to` hold function names.
    #[serde(rename = "ControlBlocks")]
    pub control_blocks: Vec<ControlBlockInfo>,
}

impl Application {
    /// Function names in declaration order.
    pub fn functions(&self) -> impl Iterator<Item = &str> {
        self.ieds.keys().map(String::as_str)
    }
}

/// All versions of an application, identified by category and name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedApplications {
    pub category: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub versions: Vec<Application>,
}

/// A stencil file: a named, versioned catalogue of applications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StencilData {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub applications: Vec<VersionedApplications>,
}

impl Default for StencilData {
    fn default() -> Self {
        Self {
            name: "Noname".to_string(),
            version: "0.0.1".to_string(),
            applications: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_variants_use_persisted_keys() {
        let data = Mapping::Data {
            fcda: "DS>x".into(),
            ext_ref: "In>y[0]".into(),
        };
        let quality = Mapping::Quality {
            ext_ref: "In>z[0]".into(),
            note: "GOOSE_Q".into(),
        };
        let json = serde_json::to_value(vec![data.clone(), quality.clone()]).unwrap();
        assert_eq!(json[0]["FCDA"], "DS>x");
        assert_eq!(json[0]["ExtRef"], "In>y[0]");
        assert!(json[0].get("SELMessageQuality").is_none());
        assert_eq!(json[1]["SELMessageQuality"], "GOOSE_Q");
        assert!(json[1].get("FCDA").is_none());

        let back: Vec<Mapping> = serde_json::from_value(json).unwrap();
        assert_eq!(back, vec![data, quality]);
    }

    #[test]
    fn control_block_kind_serializes_as_tag() {
        let json = serde_json::to_string(&ControlBlockKind::SampledValue).unwrap();
        assert_eq!(json, "\"SampledValueControl\"");
        assert_eq!(ControlBlockKind::from_tag("GSEControl"), Some(ControlBlockKind::Goose));
        assert_eq!(ControlBlockKind::Goose.service_type(), "GOOSE");
        assert_eq!(ControlBlockKind::Report.supervision_ln_class(), None);
    }
}
