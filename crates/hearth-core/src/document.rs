//! The document contract.
//!
//! The persistence engine treats a document as opaque apart from the
//! content handles it references. Everything else travels through serde.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::content::Content;

/// A persistable document graph.
///
/// `Clone` must be a deep copy: auto-recovery clones a document on the
/// thread that owns it and serializes the clone in the background.
pub trait Document: Clone + Serialize + DeserializeOwned + Send + 'static {
    /// The name the document was last saved under, if any.
    fn name(&self) -> Option<&str>;

    /// Whether the document has unsaved changes.
    fn is_modified(&self) -> bool;

    /// A counter bumped on every change, if the document keeps one.
    fn revision(&self) -> Option<u64> {
        None
    }

    /// Call `visit` on every content reachable from the document.
    fn visit_contents(&self, visit: &mut dyn FnMut(&Content));

    /// Replace every reachable content by `replace(content)`.
    fn replace_contents(&mut self, replace: &mut dyn FnMut(&Content) -> Content);
}

/// All content handles reachable from `document`, in traversal order.
pub fn reachable_contents<D: Document>(document: &D) -> Vec<Content> {
    let mut contents = Vec::new();
    document.visit_contents(&mut |content| contents.push(content.clone()));
    contents
}
