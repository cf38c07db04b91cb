//! Trusted content sources.
//!
//! A trusted source is a set of known-good content (typically the shared
//! furniture and texture catalogs) searched by digest while reading an
//! archive. Hosts that load plugins expose each plugin's catalog as one
//! more source of a [`CompositeSource`].

use std::sync::Arc;

use hearth_core::{Content, ContentDigests, Digest};

/// A set of known-good content handles.
pub trait TrustedContentSource: Send + Sync {
    /// Every content handle offered by this source.
    fn contents(&self) -> Vec<Content>;

    /// The first content of this source whose digest is `digest`.
    fn find(&self, digest: &Digest, digests: &ContentDigests) -> Option<Content> {
        if !digest.is_valid() {
            return None;
        }
        self.contents()
            .into_iter()
            .find(|content| digests.digest(content).matches(digest))
    }
}

/// A fixed set of trusted content.
#[derive(Clone, Debug, Default)]
pub struct ContentLibrary {
    contents: Vec<Content>,
}

impl ContentLibrary {
    pub fn new(contents: Vec<Content>) -> Self {
        Self { contents }
    }

    pub fn push(&mut self, content: Content) {
        self.contents.push(content);
    }

    pub fn len(&self) -> usize {
        self.contents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }
}

impl TrustedContentSource for ContentLibrary {
    fn contents(&self) -> Vec<Content> {
        self.contents.clone()
    }
}

/// Several sources searched in order.
#[derive(Clone, Default)]
pub struct CompositeSource {
    sources: Vec<Arc<dyn TrustedContentSource>>,
}

impl CompositeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, source: Arc<dyn TrustedContentSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn push(&mut self, source: Arc<dyn TrustedContentSource>) {
        self.sources.push(source);
    }
}

impl TrustedContentSource for CompositeSource {
    fn contents(&self) -> Vec<Content> {
        self.sources.iter().flat_map(|source| source.contents()).collect()
    }

    fn find(&self, digest: &Digest, digests: &ContentDigests) -> Option<Content> {
        self.sources.iter().find_map(|source| source.find(digest, digests))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_finds_by_digest() {
        let digests = ContentDigests::new();
        let wood = Content::from_bytes("wood.png", b"wood".to_vec());
        let library = ContentLibrary::new(vec![Content::from_bytes("stone.png", b"stone".to_vec()), wood.clone()]);

        let found = library.find(&Digest::hash(b"wood"), &digests).unwrap();
        assert!(found.ptr_eq(&wood));
        assert!(library.find(&Digest::hash(b"glass"), &digests).is_none());
        assert!(library.find(&Digest::INVALID, &digests).is_none());
    }

    #[test]
    fn test_composite_searches_in_order() {
        let digests = ContentDigests::new();
        let first = Content::from_bytes("a", b"same".to_vec());
        let second = Content::from_bytes("b", b"same".to_vec());
        let composite = CompositeSource::new()
            .with_source(Arc::new(ContentLibrary::new(vec![first.clone()])))
            .with_source(Arc::new(ContentLibrary::new(vec![second])));

        assert_eq!(composite.contents().len(), 2);
        let found = composite.find(&Digest::hash(b"same"), &digests).unwrap();
        assert!(found.ptr_eq(&first));
    }
}
