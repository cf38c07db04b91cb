//! Known-answer vectors for digests and the manifest layout.

use hearth_core::Digest;

/// A known-answer digest vector.
#[derive(Debug, Clone)]
pub struct DigestVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    pub input: &'static [u8],
    /// Expected SHA-1 (hex).
    pub expected_hex: &'static str,
    /// Expected SHA-1 as written in a manifest (base64).
    pub expected_base64: &'static str,
}

/// Get all digest vectors.
pub fn all_vectors() -> Vec<DigestVector> {
    vec![
        DigestVector {
            name: "empty input",
            input: b"",
            expected_hex: "da39a3ee5e6b4b0d3255bfef95601890afd80709",
            expected_base64: "2jmj7l5rSw0yVb/vlWAYkK/YBwk=",
        },
        DigestVector {
            name: "abc",
            input: b"abc",
            expected_hex: "a9993e364706816aba3e25717850c26c9cd0d89d",
            expected_base64: "qZk+NkcGgWq6PiVxeFDCbJzQ2J0=",
        },
        DigestVector {
            name: "two-block message",
            input: b"abcdbcdecdefdefgefghfghighijhijkijkljklmklmnlmnomnopnopq",
            expected_hex: "84983e441c3bd26ebaae4aa1f95129e5e54670f1",
            expected_base64: "hJg+RBw70m66rkqh+VEp5eVGcPE=",
        },
        DigestVector {
            name: "quick brown fox",
            input: b"The quick brown fox jumps over the lazy dog",
            expected_hex: "2fd4e1c67a2d28fced849ee1bb76e7391b93eb12",
            expected_base64: "L9ThxnotKPzthJ7hu3bnORuT6xI=",
        },
    ]
}

/// Manifest text for a single content entry `0` holding `abc`.
pub const SINGLE_ENTRY_MANIFEST: &str = "ContentDigests-Version: 1.0\n\nName: 0\nSHA-1-Digest: qZk+NkcGgWq6PiVxeFDCbJzQ2J0=\n";

/// Names of the vectors whose digest does not match.
pub fn verify_all_vectors() -> Vec<&'static str> {
    all_vectors()
        .into_iter()
        .filter(|v| {
            let digest = Digest::hash(v.input);
            digest.to_hex() != v.expected_hex || digest.to_base64() != v.expected_base64
        })
        .map(|v| v.name)
        .collect()
}
