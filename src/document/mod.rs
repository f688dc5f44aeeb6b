//! Owned, mutable SCL element tree.
//!
//! [`SclDocument`] stores every element in an arena addressed by [`ElementId`].
//! Ids stay valid for the lifetime of the document: removing an element only
//! detaches it from its parent. All structural queries used by the mapping
//! engine (by IED name, by tag, by attribute) are explicit functions on the
//! tree rather than ad hoc path selectors.
//!
//! - [`edit`] – Insert / update / remove edits and their application

pub mod edit;

pub use edit::{Edit, NewElement};

use anyhow::{Context, Result};
use camino::Utf8Path;
use indexmap::IndexMap;

/// Handle of an element inside a [`SclDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub(crate) usize);

/// A single XML element.
///
/// `attributes` and `namespaces` keep their document order so that a written
/// file differs from the input only where edits were applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// Qualified tag name (`"IED"`, `"eTr:Foo"`).
    pub tag: String,
    pub attributes: IndexMap<String, String>,
    /// Namespace declarations made on this element (`""` is the default namespace).
    pub namespaces: IndexMap<String, String>,
    /// Direct, non-whitespace text content.
    pub text: Option<String>,
    pub children: Vec<ElementId>,
    pub parent: Option<ElementId>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: IndexMap::new(),
            namespaces: IndexMap::new(),
            text: None,
            children: Vec::new(),
            parent: None,
        }
    }
}

/// An SCL document held in memory.
#[derive(Debug, Clone)]
pub struct SclDocument {
    elements: Vec<Element>,
    root: ElementId,
}

impl SclDocument {
    /// Parse SCL XML text.
    pub fn parse(text: &str) -> Result<Self> {
        crate::parser::parse_document(text)
    }

    /// Read and parse an SCL file.
    pub fn from_path(path: impl AsRef<Utf8Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path.as_std_path())
            .with_context(|| format!("Failed to read {}", path))?;
        Self::parse(&text).with_context(|| format!("Failed to parse SCL {}", path))
    }

    /// Regenerate XML text for the whole document.
    pub fn write_to_string(&self) -> String {
        crate::generator::generate_scl_xml(self)
    }

    /// Write the document to `path`.
    pub fn save(&self, path: impl AsRef<Utf8Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path.as_std_path(), self.write_to_string())
            .with_context(|| format!("Failed to write {}", path))
    }

    /// Create a document consisting of a single root element.
    pub(crate) fn with_root(root: Element) -> Self {
        Self {
            elements: vec![root],
            root: ElementId(0),
        }
    }

    /// Append `element` as the last child of `parent` and return its id.
    pub(crate) fn push_child(&mut self, parent: ElementId, mut element: Element) -> ElementId {
        let id = ElementId(self.elements.len());
        element.parent = Some(parent);
        self.elements.push(element);
        self.elements[parent.0].children.push(id);
        id
    }

    pub fn root(&self) -> ElementId {
        self.root
    }

    pub fn element(&self, id: ElementId) -> &Element {
        &self.elements[id.0]
    }

    pub(crate) fn element_mut(&mut self, id: ElementId) -> &mut Element {
        &mut self.elements[id.0]
    }

    /// Returns `true` if `id` belongs to this document and is reachable from the root.
    pub fn is_attached(&self, id: ElementId) -> bool {
        if id.0 >= self.elements.len() {
            return false;
        }
        let mut current = id;
        loop {
            if current == self.root {
                return true;
            }
            match self.elements[current.0].parent {
                Some(p) => current = p,
                None => return false,
            }
        }
    }

    pub fn tag(&self, id: ElementId) -> &str {
        &self.elements[id.0].tag
    }

    pub fn attribute(&self, id: ElementId, name: &str) -> Option<&str> {
        self.elements[id.0].attributes.get(name).map(String::as_str)
    }

    /// Attribute value, treating an absent attribute as the empty string.
    pub fn attribute_or_empty(&self, id: ElementId, name: &str) -> &str {
        self.attribute(id, name).unwrap_or("")
    }

    /// Attribute value if present and not empty.
    pub fn non_empty_attribute(&self, id: ElementId, name: &str) -> Option<&str> {
        self.attribute(id, name).filter(|v| !v.is_empty())
    }

    pub fn has_attribute(&self, id: ElementId, name: &str) -> bool {
        self.elements[id.0].attributes.contains_key(name)
    }

    pub fn text(&self, id: ElementId) -> Option<&str> {
        self.elements[id.0].text.as_deref()
    }

    pub fn parent(&self, id: ElementId) -> Option<ElementId> {
        self.elements[id.0].parent
    }

    pub fn children(&self, id: ElementId) -> impl Iterator<Item = ElementId> + '_ {
        self.elements[id.0].children.iter().copied()
    }

    pub fn children_by_tag<'a>(
        &'a self,
        id: ElementId,
        tag: &'a str,
    ) -> impl Iterator<Item = ElementId> + 'a {
        self.children(id).filter(move |c| self.tag(*c) == tag)
    }

    /// First child with the given tag whose `name` attribute equals `name`.
    pub fn child_named(&self, id: ElementId, tag: &str, name: &str) -> Option<ElementId> {
        self.children_by_tag(id, tag)
            .find(|c| self.attribute(*c, "name") == Some(name))
    }

    /// All descendants of `id` in document order, excluding `id` itself.
    pub fn descendants(&self, id: ElementId) -> Descendants<'_> {
        let mut stack: Vec<ElementId> = self.elements[id.0].children.clone();
        stack.reverse();
        Descendants { doc: self, stack }
    }

    pub fn descendants_by_tag<'a>(
        &'a self,
        id: ElementId,
        tag: &'a str,
    ) -> impl Iterator<Item = ElementId> + 'a {
        self.descendants(id).filter(move |d| self.tag(*d) == tag)
    }

    /// Walk from `id` (inclusive) towards the root.
    pub fn ancestors(&self, id: ElementId) -> impl Iterator<Item = ElementId> + '_ {
        std::iter::successors(Some(id), move |e| self.parent(*e))
    }

    /// Nearest ancestor-or-self with the given tag.
    pub fn closest(&self, id: ElementId, tag: &str) -> Option<ElementId> {
        self.ancestors(id).find(|a| self.tag(*a) == tag)
    }

    /// Top-level `IED` elements in document order.
    pub fn ieds(&self) -> impl Iterator<Item = ElementId> + '_ {
        self.children_by_tag(self.root, "IED")
    }

    /// Top-level `IED` element with the given name.
    pub fn ied(&self, name: &str) -> Option<ElementId> {
        self.child_named(self.root, "IED", name)
    }

    /// Name of the IED enclosing `id`.
    pub fn ied_name_of(&self, id: ElementId) -> Option<&str> {
        self.closest(id, "IED")
            .and_then(|ied| self.attribute(ied, "name"))
    }

    /// Direct text of the first `Private` child of `id` with the given `type`.
    pub fn private_text(&self, id: ElementId, private_type: &str) -> Option<&str> {
        self.children_by_tag(id, "Private")
            .find(|p| self.attribute(*p, "type") == Some(private_type))
            .and_then(|p| self.text(p))
    }

    /// Index of `id` among siblings satisfying `same`, in document order.
    pub(crate) fn sibling_index(&self, id: ElementId, same: impl Fn(ElementId) -> bool) -> usize {
        match self.parent(id) {
            Some(parent) => self
                .children(parent)
                .filter(|c| same(*c))
                .position(|c| c == id)
                .unwrap_or(0),
            None => 0,
        }
    }
}

/// Pre-order iterator returned by [`SclDocument::descendants`].
pub struct Descendants<'a> {
    doc: &'a SclDocument,
    stack: Vec<ElementId>,
}

impl Iterator for Descendants<'_> {
    type Item = ElementId;

    fn next(&mut self) -> Option<ElementId> {
        let next = self.stack.pop()?;
        self.stack
            .extend(self.doc.elements[next.0].children.iter().rev().copied());
        Some(next)
    }
}
