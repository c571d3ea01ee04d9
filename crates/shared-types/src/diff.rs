//! Positional comparison of two fetches of the same calendar.

use std::collections::BTreeSet;

use crate::EntrySlots;

/// Zero-based indices whose slot differs between `old` and `new`.
///
/// An entry appearing, disappearing or being replaced by another URL all
/// count as a change. Iterating the result yields ascending indices.
pub fn diff(old: &EntrySlots, new: &EntrySlots) -> BTreeSet<usize> {
    old.iter()
        .zip(new.iter())
        .enumerate()
        .filter(|(_, (before, after))| before != after)
        .map(|(index, _)| index)
        .collect()
}
