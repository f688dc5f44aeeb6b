//! Stencil catalogue: capture, persistence and lookup of application templates.
//!
//! - [`apply`] – Re-instantiate a captured application on concrete IEDs

pub mod apply;

pub use apply::{ApplyError, ApplyOptions, ApplyReport, FunctionBinding, Stage, StencilApplication, apply_stencil};

use crate::discovery::unique_ieds;
use crate::document::{ElementId, SclDocument};
use crate::model::{
    Application, ControlBlockInfo, IedRequirement, StencilData, StencilPrivates,
    VersionedApplications,
};
use anyhow::{Context, Result, anyhow, bail};
use camino::Utf8Path;
use indexmap::IndexMap;
use tracing::info;

const STENCIL_ID_PRIVATE: &str = "OpenSCD-Stencil-Id";
const STENCIL_VERSION_PRIVATE: &str = "OpenSCD-Stencil-Version";

/// Metadata of an application version being captured.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplicationMeta {
    pub category: String,
    pub name: String,
    pub description: String,
    pub version: String,
    pub version_description: String,
    pub deprecated: bool,
}

/// A discovered control block the user chose to leave out of a capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcludedControlBlock {
    pub id: String,
    pub from: String,
    pub to: String,
}

impl ExcludedControlBlock {
    fn matches(&self, info: &ControlBlockInfo) -> bool {
        self.id == info.id && self.from == info.from && self.to == info.to
    }
}

impl StencilData {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            applications: Vec::new(),
        }
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Failed to parse stencil JSON")
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: impl AsRef<Utf8Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path.as_std_path())
            .with_context(|| format!("Failed to read stencil {}", path))?;
        Self::from_json(&text).with_context(|| format!("Invalid stencil {}", path))
    }

    pub fn save(&self, path: impl AsRef<Utf8Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path.as_std_path(), self.to_json()?)
            .with_context(|| format!("Failed to write stencil {}", path))
    }

    /// Suggested file name, e.g. `Bay_Protection_1.0.json`.
    pub fn file_name(&self) -> String {
        let name = if self.name.is_empty() {
            "Unknown Stencil"
        } else {
            self.name.as_str()
        };
        format!("{}_{}.json", name.replace(' ', "_"), self.version)
    }

    /// Applications with their versions, optionally hiding deprecated ones.
    ///
    /// Applications left without any version are omitted.
    pub fn applications(&self, show_deprecated: bool) -> Vec<(&VersionedApplications, Vec<&Application>)> {
        self.applications
            .iter()
            .map(|app| {
                let versions: Vec<&Application> = app
                    .versions
                    .iter()
                    .filter(|v| show_deprecated || !v.deprecated)
                    .collect();
                (app, versions)
            })
            .filter(|(_, versions)| !versions.is_empty())
            .collect()
    }

    pub fn find_version(&self, category: &str, name: &str, version: &str) -> Option<&Application> {
        self.applications
            .iter()
            .find(|app| app.category == category && app.name == name)
            .and_then(|app| app.versions.iter().find(|v| v.version == version))
    }

    /// Capture discovered mappings as an application version.
    ///
    /// `functions` maps each IED name appearing in `infos` to its function
    /// name. An existing version with the same category, name and version is
    /// replaced; otherwise the version is added to the matching application or
    /// a new application is created.
    pub fn add_application(
        &mut self,
        doc: &SclDocument,
        infos: &[ControlBlockInfo],
        functions: &IndexMap<String, String>,
        excluded: &[ExcludedControlBlock],
        meta: &ApplicationMeta,
    ) -> Result<()> {
        let kept: Vec<&ControlBlockInfo> = infos
            .iter()
            .filter(|info| !excluded.iter().any(|e| e.matches(info)))
            .collect();
        if kept.is_empty() {
            bail!("No control blocks left to capture");
        }
        let kept_owned: Vec<ControlBlockInfo> = kept.into_iter().cloned().collect();

        let function_of = |ied_name: &str| {
            functions
                .get(ied_name)
                .cloned()
                .ok_or_else(|| anyhow!("No function name given for IED {}", ied_name))
        };

        let mut ieds: IndexMap<String, IedRequirement> = IndexMap::new();
        for ied_name in unique_ieds(&kept_owned) {
            let function = function_of(&ied_name)?;
            let ied = doc
                .ied(&ied_name)
                .ok_or_else(|| anyhow!("IED {} not found", ied_name))?;
            if ieds.insert(function.clone(), ied_requirement(doc, ied)).is_some() {
                bail!("Function {} assigned to more than one IED", function);
            }
        }

        let control_blocks = kept_owned
            .into_iter()
            .map(|info| {
                Ok(ControlBlockInfo {
                    from: function_of(&info.from)?,
                    to: function_of(&info.to)?,
                    ..info
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let version = Application {
            version: meta.version.clone(),
            description: meta.version_description.clone(),
            deprecated: meta.deprecated,
            ieds,
            control_blocks,
        };

        match self
            .applications
            .iter_mut()
            .find(|app| app.category == meta.category && app.name == meta.name)
        {
            Some(app) => {
                app.description = meta.description.clone();
                match app.versions.iter_mut().find(|v| v.version == meta.version) {
                    Some(existing) => *existing = version,
                    None => app.versions.push(version),
                }
            }
            None => self.applications.push(VersionedApplications {
                category: meta.category.clone(),
                name: meta.name.clone(),
                description: meta.description.clone(),
                versions: vec![version],
            }),
        }
        info!(category = %meta.category, name = %meta.name, version = %meta.version, "application captured");
        Ok(())
    }
}

/// Requirements of the function filled by `ied`.
pub fn ied_requirement(doc: &SclDocument, ied: ElementId) -> IedRequirement {
    IedRequirement {
        original_name: doc.attribute_or_empty(ied, "name").to_string(),
        ied_type: doc.attribute_or_empty(ied, "type").to_string(),
        manufacturer: doc.attribute_or_empty(ied, "manufacturer").to_string(),
        comment: None,
        privates: vec![StencilPrivates {
            stencil_id: doc
                .private_text(ied, STENCIL_ID_PRIVATE)
                .unwrap_or("No Stencil ID Found")
                .to_string(),
            stencil_version: doc
                .private_text(ied, STENCIL_VERSION_PRIVATE)
                .unwrap_or("No Stencil Version Found")
                .to_string(),
        }],
    }
}

/// IEDs of `doc` able to fill a function: same `type` and `manufacturer`.
pub fn candidate_ieds(doc: &SclDocument, requirement: &IedRequirement) -> Vec<ElementId> {
    doc.ieds()
        .filter(|ied| {
            doc.attribute_or_empty(*ied, "type") == requirement.ied_type
                && doc.attribute_or_empty(*ied, "manufacturer") == requirement.manufacturer
        })
        .collect()
}

/// Two display lines for an IED: name with description, then
/// manufacturer and type.
pub fn ied_description(doc: &SclDocument, ied: ElementId) -> (String, String) {
    let name = doc.attribute_or_empty(ied, "name");
    let first = match doc.non_empty_attribute(ied, "desc") {
        Some(desc) => format!("{} - {}", name, desc),
        None => name.to_string(),
    };
    let second = [
        doc.non_empty_attribute(ied, "manufacturer"),
        doc.non_empty_attribute(ied, "type"),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join(" - ");
    (first, second)
}
