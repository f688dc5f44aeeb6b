//! Document edits.
//!
//! Every mutation of an [`SclDocument`] goes through an [`Edit`]. Engines build
//! edits from read-only queries and hand them to [`SclDocument::apply`], which
//! plays the role of the "dispatch edit" service of an editor host.

use super::{Element, ElementId, SclDocument};
use indexmap::IndexMap;
use tracing::warn;

/// A single change (or batch of changes) to a document.
#[derive(Debug, Clone, PartialEq)]
pub enum Edit {
    /// Insert a new subtree below `parent`, before `reference` or at the end.
    Insert {
        parent: ElementId,
        element: NewElement,
        reference: Option<ElementId>,
    },
    /// Set (`Some`) or remove (`None`) attributes, in order.
    Update {
        element: ElementId,
        attributes: Vec<(String, Option<String>)>,
    },
    /// Replace the direct text content of an element.
    SetText {
        element: ElementId,
        text: Option<String>,
    },
    /// Detach an element from its parent.
    Remove { element: ElementId },
    /// Several edits applied in order.
    Batch(Vec<Edit>),
}

/// Description of an element subtree that does not exist in the document yet.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewElement {
    pub tag: String,
    pub attributes: IndexMap<String, String>,
    pub text: Option<String>,
    pub children: Vec<NewElement>,
}

impl NewElement {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    /// Builder: add an attribute.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Builder: set the text content.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Builder: append a child subtree.
    pub fn child(mut self, child: NewElement) -> Self {
        self.children.push(child);
        self
    }
}

impl SclDocument {
    /// Apply an edit to the document.
    ///
    /// Edits addressing detached elements are skipped with a warning.
    pub fn apply(&mut self, edit: Edit) {
        match edit {
            Edit::Batch(edits) => {
                for e in edits {
                    self.apply(e);
                }
            }
            Edit::Insert {
                parent,
                element,
                reference,
            } => {
                if !self.is_attached(parent) {
                    warn!(?parent, tag = %element.tag, "insert below detached element skipped");
                    return;
                }
                let id = self.insert_subtree(parent, element);
                let children = &mut self.element_mut(parent).children;
                // push_child appended the new element; move it in front of the reference
                if let Some(reference) = reference {
                    if let Some(pos) = children.iter().position(|c| *c == reference) {
                        children.pop();
                        children.insert(pos, id);
                    }
                }
            }
            Edit::Update {
                element,
                attributes,
            } => {
                if !self.is_attached(element) {
                    warn!(?element, "update of detached element skipped");
                    return;
                }
                let attrs = &mut self.element_mut(element).attributes;
                for (name, value) in attributes {
                    match value {
                        Some(v) => {
                            attrs.insert(name, v);
                        }
                        None => {
                            attrs.shift_remove(&name);
                        }
                    }
                }
            }
            Edit::SetText { element, text } => {
                if !self.is_attached(element) {
                    warn!(?element, "text change of detached element skipped");
                    return;
                }
                self.element_mut(element).text = text;
            }
            Edit::Remove { element } => {
                let Some(parent) = self.parent(element) else {
                    warn!(?element, "removal of detached element skipped");
                    return;
                };
                self.element_mut(parent).children.retain(|c| *c != element);
                self.element_mut(element).parent = None;
            }
        }
    }

    fn insert_subtree(&mut self, parent: ElementId, new: NewElement) -> ElementId {
        let mut element = Element::new(new.tag);
        element.attributes = new.attributes;
        element.text = new.text;
        let id = self.push_child(parent, element);
        for child in new.children {
            self.insert_subtree(id, child);
        }
        id
    }
}
