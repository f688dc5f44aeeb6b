//! SCL XML generator – regenerate XML text from an in-memory [`SclDocument`].
//!
//! - [`scl_xml`] – Write elements, attributes and namespace declarations.

pub mod scl_xml;

pub use scl_xml::generate_scl_xml;
