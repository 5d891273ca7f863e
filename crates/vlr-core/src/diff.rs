use std::collections::BTreeSet;

use crate::{ClusterId, ListingSnapshot};

/// Keys present in `current` but not in `previous`.
pub fn new_object_keys<'a>(
    previous: &'a ListingSnapshot,
    current: &'a ListingSnapshot,
) -> impl Iterator<Item = &'a str> + 'a {
    current.keys().filter(move |key| !previous.contains_key(key))
}

/// Distinct clusters that gained at least one object since `previous`.
///
/// An empty `previous` makes every cluster in `current` new. Keys that are
/// not cluster-scoped are ignored.
pub fn new_cluster_ids(previous: &ListingSnapshot, current: &ListingSnapshot) -> BTreeSet<ClusterId> {
    new_object_keys(previous, current).filter_map(ClusterId::from_object_key).collect()
}
