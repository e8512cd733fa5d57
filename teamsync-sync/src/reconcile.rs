//! Keyed membership diff.
//!
//! `to_add`: desired identities whose key is absent from the observed side, or
//! present with a different login. `to_remove`: the mirror image. Keys are
//! canonicalized with the configured [`Matching`] first, so under
//! `CaseInsensitive` "Alice" and "alice" are the same person. Two keys on the
//! same side that collapse to one canonical key keep the last entry.
//!
//! Output order follows key order; callers should only rely on membership.

use std::collections::BTreeMap;

use teamsync_core::{Identity, Matching, Membership};

/// Changes needed to turn observed membership into desired membership.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delta {
    pub to_add: Vec<Identity>,
    pub to_remove: Vec<Identity>,
}

impl Delta {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// Diff `desired` against `observed`. Pure: no I/O, no shared state.
pub fn compute_delta(desired: &Membership, observed: &Membership, matching: Matching) -> Delta {
    let desired = canonical(desired, matching);
    let observed = canonical(observed, matching);

    Delta {
        to_add: one_sided(&desired, &observed, matching),
        to_remove: one_sided(&observed, &desired, matching),
    }
}

fn canonical(members: &Membership, matching: Matching) -> BTreeMap<String, &Identity> {
    members
        .iter()
        .map(|(key, identity)| (matching.normalize(&key.0), identity))
        .collect()
}

/// Entries of `from` with no counterpart in `other`, or a counterpart whose
/// login differs.
fn one_sided(
    from: &BTreeMap<String, &Identity>,
    other: &BTreeMap<String, &Identity>,
    matching: Matching,
) -> Vec<Identity> {
    from.iter()
        .filter(|(key, identity)| match other.get(*key) {
            Some(counterpart) => !matching.matches(&counterpart.login, &identity.login),
            None => true,
        })
        .map(|(_, identity)| (*identity).clone())
        .collect()
}
