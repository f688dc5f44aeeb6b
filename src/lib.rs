//! IEC 61850 SCL subscription stencils.
//!
//! This crate discovers the GOOSE and Sampled Value subscriptions between
//! IEDs of an SCL document, captures them as reusable, IED-name independent
//! templates ("stencils") and re-applies those templates to other IEDs.
//!
//! - [`document`] – In-memory SCL tree with edit requests
//! - [`parser`] / [`generator`] – Read and write SCL XML
//! - [`identity`] – Element identities and their portable form
//! - [`matcher`] – Which ExtRefs subscribe to a control block
//! - [`discovery`] – Collect subscriptions between two IEDs
//! - [`subscribe`] / [`supervision`] – Build subscription and LGOS/LSVS edits
//! - [`stencil`] – Capture, persist and apply templates
//!
//! The binary `scl-stencil` exposes these steps on the command line.

pub mod combinations;
pub mod discovery;
pub mod document;
pub mod generator;
pub mod identity;
pub mod matcher;
pub mod model;
pub mod parser;
pub mod stencil;
pub mod subscribe;
pub mod supervision;
pub mod vendor;

pub use document::{Edit, ElementId, SclDocument};
pub use model::{Application, ControlBlockInfo, ControlBlockKind, Mapping, StencilData};
