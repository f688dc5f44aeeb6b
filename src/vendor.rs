//! Vendor-specific quality reference recognizers.
//!
//! Some vendors wire message-quality monitoring through partially filled
//! ExtRefs that point at a control block but carry no data coordinates. Such
//! references are not real subscriptions; a [`QualityRecognizer`] classifies
//! them so discovery can still record the link. Recognizers are registered
//! per manufacturer in a [`RecognizerRegistry`], keeping the matcher itself
//! vendor-neutral.

use crate::document::{ElementId, SclDocument};
use crate::matcher::is_subscribed;
use indexmap::IndexMap;

/// Marker recorded when a quality reference has no `intAddr`.
pub const MISSING_INT_ADDR: &str = "No intAddr found";

/// Classifies ExtRefs of one manufacturer's IEDs as quality links.
pub trait QualityRecognizer {
    /// Value of the IED `manufacturer` attribute this recognizer handles.
    fn manufacturer(&self) -> &str;

    /// Returns the quality payload if `ext_ref` is a quality link.
    fn recognize(&self, doc: &SclDocument, ext_ref: ElementId) -> Option<String>;
}

/// SEL relays: an ExtRef without `serviceType` that is not fully bound is a
/// GOOSE message-quality link; its payload is the `intAddr`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SelQualityRecognizer;

impl QualityRecognizer for SelQualityRecognizer {
    fn manufacturer(&self) -> &str {
        "SEL"
    }

    fn recognize(&self, doc: &SclDocument, ext_ref: ElementId) -> Option<String> {
        if doc.non_empty_attribute(ext_ref, "serviceType").is_some() {
            return None;
        }
        if is_subscribed(doc, ext_ref) {
            return None;
        }
        Some(
            doc.attribute(ext_ref, "intAddr")
                .unwrap_or(MISSING_INT_ADDR)
                .to_string(),
        )
    }
}

/// Quality recognizers keyed by manufacturer.
pub struct RecognizerRegistry {
    recognizers: IndexMap<String, Box<dyn QualityRecognizer>>,
}

impl RecognizerRegistry {
    /// A registry without any vendor carve-outs.
    pub fn empty() -> Self {
        Self {
            recognizers: IndexMap::new(),
        }
    }

    /// Register a recognizer, replacing any previous one for its manufacturer.
    pub fn register(&mut self, recognizer: Box<dyn QualityRecognizer>) {
        self.recognizers
            .insert(recognizer.manufacturer().to_string(), recognizer);
    }

    pub fn manufacturers(&self) -> impl Iterator<Item = &str> {
        self.recognizers.keys().map(String::as_str)
    }

    /// Classify `ext_ref` using the recognizer of its IED's manufacturer.
    pub fn recognize(&self, doc: &SclDocument, ext_ref: ElementId) -> Option<String> {
        let ied = doc.closest(ext_ref, "IED")?;
        let manufacturer = doc.attribute(ied, "manufacturer")?;
        self.recognizers
            .get(manufacturer)
            .and_then(|r| r.recognize(doc, ext_ref))
    }
}

impl Default for RecognizerRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(SelQualityRecognizer));
        registry
    }
}

impl std::fmt::Debug for RecognizerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.recognizers.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const XML: &str = r#"<SCL>
  <IED name="S1" manufacturer="SEL"><Inputs>
    <ExtRef iedName="P1" srcCBName="gcb01" intAddr="GOOSE_Q1"/>
    <ExtRef iedName="P1" srcCBName="gcb01" serviceType=""/>
    <ExtRef iedName="P1" srcCBName="gcb01" serviceType="GOOSE"/>
    <ExtRef iedName="P1" ldInst="LD" lnClass="XCBR" lnInst="1" doName="Pos"/>
  </Inputs></IED>
  <IED name="O1" manufacturer="Other"><Inputs>
    <ExtRef iedName="P1" srcCBName="gcb01" intAddr="GOOSE_Q1"/>
  </Inputs></IED>
</SCL>"#;

    #[test]
    fn sel_quality_references_are_recognized() {
        let doc = SclDocument::parse(XML).unwrap();
        let e: Vec<_> = doc.descendants_by_tag(doc.root(), "ExtRef").collect();
        let registry = RecognizerRegistry::default();
        assert_eq!(registry.recognize(&doc, e[0]).as_deref(), Some("GOOSE_Q1"));
        assert_eq!(registry.recognize(&doc, e[1]).as_deref(), Some(MISSING_INT_ADDR));
        assert_eq!(registry.recognize(&doc, e[2]), None);
        assert_eq!(registry.recognize(&doc, e[3]), None);
        assert_eq!(registry.recognize(&doc, e[4]), None);
    }

    #[test]
    fn empty_registry_is_vendor_neutral() {
        let doc = SclDocument::parse(XML).unwrap();
        let first = doc.descendants_by_tag(doc.root(), "ExtRef").next().unwrap();
        assert_eq!(RecognizerRegistry::empty().recognize(&doc, first), None);
        assert_eq!(
            RecognizerRegistry::default().manufacturers().collect::<Vec<_>>(),
            vec!["SEL"]
        );
    }
}
