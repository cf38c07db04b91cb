//! Proptest generators for property-based testing.

use std::collections::{BTreeMap, BTreeSet};

use hearth_core::Content;
use proptest::prelude::*;
use proptest::sample::Index;

use crate::home::SampleHome;

/// Blob bytes up to `max_len` long.
pub fn blob(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// A home name.
pub fn home_name() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9 _-]{0,23}".prop_map(String::from)
}

/// Files of a multi-part model, by relative name.
pub fn group_files() -> impl Strategy<Value = BTreeMap<String, Vec<u8>>> {
    prop::collection::btree_map("[a-z]{1,8}\\.(obj|mtl|png)", blob(64), 1..5)
}

/// Parameters for generating a home.
///
/// Every piece references two blobs by index; each reference becomes its
/// own content handle, so equal blobs give distinct handles with equal
/// digests.
#[derive(Debug, Clone)]
pub struct HomeParams {
    pub name: Option<String>,
    pub walls: usize,
    pub blobs: Vec<Vec<u8>>,
    pub pieces: Vec<(usize, usize)>,
}

impl HomeParams {
    /// Number of distinct blob values referenced by some piece.
    pub fn distinct_referenced_blobs(&self) -> usize {
        self.pieces
            .iter()
            .flat_map(|&(icon, model)| [icon, model])
            .map(|i| self.blobs[i].as_slice())
            .collect::<BTreeSet<_>>()
            .len()
    }
}

impl Arbitrary for HomeParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            prop::option::of(home_name()),
            0usize..4,
            prop::collection::vec(blob(256), 1..5),
            prop::collection::vec((any::<Index>(), any::<Index>()), 0..6),
        )
            .prop_map(|(name, walls, blobs, pieces)| {
                let pieces = pieces
                    .into_iter()
                    .map(|(icon, model)| (icon.index(blobs.len()), model.index(blobs.len())))
                    .collect();
                HomeParams {
                    name,
                    walls,
                    blobs,
                    pieces,
                }
            })
            .boxed()
    }
}

/// Build a home from parameters.
pub fn home_from_params(params: &HomeParams) -> SampleHome {
    let mut home = SampleHome::new();
    home.name = params.name.clone();
    for i in 0..params.walls {
        let offset = i as f32 * 100.0;
        home.add_wall(offset, 0.0, offset + 100.0, 0.0);
    }
    for (n, &(icon, model)) in params.pieces.iter().enumerate() {
        home.add_piece(
            &format!("piece-{n}"),
            Content::from_bytes(format!("icon-{n}.png"), params.blobs[icon].clone()),
            Content::from_bytes(format!("model-{n}.obj"), params.blobs[model].clone()),
        );
    }
    home
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_core::reachable_contents;

    proptest! {
        #[test]
        fn home_has_two_contents_per_piece(params: HomeParams) {
            let home = home_from_params(&params);
            prop_assert_eq!(reachable_contents(&home).len(), params.pieces.len() * 2);
            prop_assert_eq!(home.walls.len(), params.walls);
        }
    }
}
