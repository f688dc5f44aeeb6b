//! Re-instantiate a captured application on concrete IEDs.

use crate::combinations::combinations;
use crate::document::{Edit, ElementId, SclDocument};
use crate::identity::{find, rehydrate};
use crate::matcher::ControlBlockCoordinates;
use crate::model::{Application, ControlBlockInfo, Mapping};
use crate::subscribe::{Connection, Source, SubscribeOptions, can_subscribe, subscribe};
use crate::supervision::{SupervisionOptions, SupervisionTarget, instantiate_subscription_supervision};
use anyhow::{Result, anyhow, bail};
use indexmap::IndexMap;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Structural problems met while applying an application.
///
/// None of these abort the run; they are collected in [`ApplyReport::errors`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyError {
    #[error("Could not find CB: {0}")]
    MissingControlBlock(String),

    #[error("Could not find FCDA: {0}")]
    MissingFcda(String),

    #[error("Could not find ExtRef: {0}")]
    MissingExtRef(String),

    /// A vendor quality ExtRef did not resolve.
    #[error("Could not find ExtRef: {0}")]
    MissingQualityExtRef(String),

    #[error("Could not find Supervision: {0}")]
    MissingSupervision(String),

    /// The supervision LN resolved but no supervision edit could be built.
    #[error("Could not instantiate supervision: {0}")]
    SupervisionDeclined(String),
}

/// Function name → concrete IED name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionBinding {
    map: IndexMap<String, String>,
}

impl FunctionBinding {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, function: impl Into<String>, ied_name: impl Into<String>) {
        self.map.insert(function.into(), ied_name.into());
    }

    pub fn unbind(&mut self, function: &str) -> Option<String> {
        self.map.shift_remove(function)
    }

    pub fn reset(&mut self) {
        self.map.clear();
    }

    pub fn ied(&self, function: &str) -> Option<&str> {
        self.map.get(function).map(String::as_str)
    }

    /// Bound function names in binding order.
    pub fn functions(&self) -> Vec<String> {
        self.map.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl<F: Into<String>, I: Into<String>> FromIterator<(F, I)> for FunctionBinding {
    fn from_iter<T: IntoIterator<Item = (F, I)>>(iter: T) -> Self {
        let mut binding = Self::new();
        for (function, ied) in iter {
            binding.bind(function, ied);
        }
        binding
    }
}

/// Policies handed to the subscription and supervision builders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyOptions {
    pub subscribe: SubscribeOptions,
    pub supervision: SupervisionOptions,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            subscribe: SubscribeOptions {
                force: true,
                ignore_supervision: true,
                check_only_b_type: true,
            },
            supervision: SupervisionOptions::unchecked(),
        }
    }
}

/// Outcome of [`apply_stencil`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub subscriptions: usize,
    pub supervisions: usize,
    pub quality_links: usize,
    pub errors: Vec<ApplyError>,
}

impl ApplyReport {
    pub fn summary(&self) -> String {
        format!(
            "{} subscriptions and {} supervisions done",
            self.subscriptions, self.supervisions
        )
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    fn record(&mut self, error: ApplyError) {
        warn!("{}", error);
        self.errors.push(error);
    }
}

/// Apply `application` to `doc` for every pair of bound functions.
///
/// Lookup failures are recorded in the report and the sweep carries on with
/// the next mapping or control block.
pub fn apply_stencil(
    doc: &mut SclDocument,
    application: &Application,
    binding: &FunctionBinding,
    options: &ApplyOptions,
) -> ApplyReport {
    let mut report = ApplyReport::default();
    for pair in combinations(&binding.functions(), 2) {
        let (a, b) = (pair[0].as_str(), pair[1].as_str());
        for info in application
            .control_blocks
            .iter()
            .filter(|info| info.connects(a, b))
        {
            let (Some(from), Some(to)) = (binding.ied(&info.from), binding.ied(&info.to)) else {
                continue;
            };
            apply_control_block(doc, info, from, to, options, &mut report);
        }
    }
    info!(
        subscriptions = report.subscriptions,
        supervisions = report.supervisions,
        errors = report.errors.len(),
        "{}",
        report.summary()
    );
    report
}

fn apply_control_block(
    doc: &mut SclDocument,
    info: &ControlBlockInfo,
    from: &str,
    to: &str,
    options: &ApplyOptions,
    report: &mut ApplyReport,
) {
    let cb_id = rehydrate(&info.id, from);
    let Some(cb) = find(doc, info.kind.tag(), &cb_id) else {
        report.record(ApplyError::MissingControlBlock(cb_id));
        return;
    };

    let mut edits = Vec::new();
    let mut connections = Vec::new();
    for mapping in &info.mappings {
        match mapping {
            Mapping::Data { fcda, ext_ref } => {
                let fcda_id = rehydrate(fcda, from);
                let ext_ref_id = rehydrate(ext_ref, to);
                let Some(fcda) = find(doc, "FCDA", &fcda_id) else {
                    report.record(ApplyError::MissingFcda(fcda_id));
                    continue;
                };
                let Some(sink) = find(doc, "ExtRef", &ext_ref_id) else {
                    report.record(ApplyError::MissingExtRef(ext_ref_id));
                    continue;
                };
                connections.push(Connection {
                    sink,
                    source: Source {
                        fcda,
                        control_block: cb,
                    },
                });
            }
            Mapping::Quality { ext_ref, .. } => {
                let ext_ref_id = rehydrate(ext_ref, to);
                let Some(sink) = find(doc, "ExtRef", &ext_ref_id) else {
                    report.record(ApplyError::MissingQualityExtRef(ext_ref_id));
                    continue;
                };
                let Some(coordinates) = ControlBlockCoordinates::of(doc, cb) else {
                    warn!(cb = %cb_id, ext_ref = %ext_ref_id, "control block has no coordinates, quality link skipped");
                    continue;
                };
                edits.push(quality_update(sink, &coordinates));
                report.quality_links += 1;
            }
        }
    }

    let accepted = connections
        .iter()
        .filter(|c| can_subscribe(doc, c, &options.subscribe))
        .count();
    report.subscriptions += accepted;
    edits.push(subscribe(doc, &connections, &options.subscribe));
    debug!(cb = %cb_id, accepted, "subscriptions built");
    doc.apply(Edit::Batch(edits));

    if !info.has_supervision() {
        return;
    }
    let supervision_id = rehydrate(&info.supervision, to);
    let Some(ln) = find(doc, "LN", &supervision_id) else {
        report.record(ApplyError::MissingSupervision(supervision_id));
        return;
    };
    let target = SupervisionTarget {
        subscriber: ln,
        source_control_block: cb,
    };
    match instantiate_subscription_supervision(doc, target, &options.supervision) {
        Some(edit) => {
            doc.apply(edit);
            report.supervisions += 1;
        }
        None => report.record(ApplyError::SupervisionDeclined(supervision_id)),
    }
}

/// Point a vendor quality ExtRef at the control block's source coordinates.
fn quality_update(sink: ElementId, cb: &ControlBlockCoordinates) -> Edit {
    let optional = |v: &str| (!v.is_empty()).then(|| v.to_string());
    Edit::Update {
        element: sink,
        attributes: vec![
            ("iedName".to_string(), Some(cb.ied_name.clone())),
            ("srcCBName".to_string(), Some(cb.cb_name.clone())),
            ("srcLDInst".to_string(), Some(cb.ld_inst.clone())),
            ("srcPrefix".to_string(), optional(&cb.prefix)),
            ("srcLNClass".to_string(), Some(cb.ln_class.clone())),
            ("srcLNInst".to_string(), optional(&cb.ln_inst)),
        ],
    }
}

/// Lifecycle position of a [`StencilApplication`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Template only; no function is bound.
    Captured,
    /// At least one function is bound to an IED.
    Bound,
    /// Edits were dispatched; [`StencilApplication::reset`] starts over.
    Applied,
}

/// An application version together with its binding to a target document.
#[derive(Debug, Clone)]
pub struct StencilApplication<'a> {
    application: &'a Application,
    binding: FunctionBinding,
    stage: Stage,
}

impl<'a> StencilApplication<'a> {
    pub fn new(application: &'a Application) -> Self {
        Self {
            application,
            binding: FunctionBinding::new(),
            stage: Stage::Captured,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn binding(&self) -> &FunctionBinding {
        &self.binding
    }

    /// Bind `function` to the IED `ied_name` of `doc`.
    pub fn bind(&mut self, doc: &SclDocument, function: &str, ied_name: &str) -> Result<()> {
        if self.stage == Stage::Applied {
            bail!("Application already applied; reset before binding again");
        }
        if !self.application.ieds.contains_key(function) {
            bail!("Unknown function {}", function);
        }
        doc.ied(ied_name)
            .ok_or_else(|| anyhow!("IED {} not found", ied_name))?;
        self.binding.bind(function, ied_name);
        self.stage = Stage::Bound;
        Ok(())
    }

    pub fn unbind(&mut self, function: &str) {
        self.binding.unbind(function);
        if self.binding.is_empty() && self.stage == Stage::Bound {
            self.stage = Stage::Captured;
        }
    }

    /// Dispatch the edits for the current binding.
    pub fn apply(&mut self, doc: &mut SclDocument, options: &ApplyOptions) -> Result<ApplyReport> {
        if self.stage != Stage::Bound {
            bail!("No functions bound");
        }
        let report = apply_stencil(doc, self.application, &self.binding, options);
        self.stage = Stage::Applied;
        Ok(report)
    }

    pub fn reset(&mut self) {
        self.binding.reset();
        self.stage = Stage::Captured;
    }
}
