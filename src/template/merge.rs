//! Merge primitives shared by field merging and overlay composition

use std::collections::HashMap;
use std::hash::Hash;

use super::fields::MergeMode;

/// Pick the last present value, scanning earliest to latest
pub fn rightmost_wins<T, I>(values: I) -> Option<T>
where
    I: IntoIterator<Item = Option<T>>,
{
    values.into_iter().flatten().last()
}

/// Deduplicate entries by key: each key keeps the position of its first
/// occurrence and the value of its last
pub fn merge_by_key<T, K, F>(entries: impl IntoIterator<Item = T>, key_of: F) -> Vec<T>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut merged: Vec<T> = Vec::new();
    let mut positions: HashMap<K, usize> = HashMap::new();

    for entry in entries {
        let key = key_of(&entry);
        match positions.get(&key) {
            Some(&index) => merged[index] = entry,
            None => {
                positions.insert(key, merged.len());
                merged.push(entry);
            }
        }
    }

    merged
}

/// Apply one node's declared list to the accumulator
pub fn apply_list<T: Clone>(acc: &mut Vec<T>, declared: &[T], mode: MergeMode) {
    match mode {
        MergeMode::Replace => {
            acc.clear();
            acc.extend_from_slice(declared);
        }
        MergeMode::Concatenate => acc.extend_from_slice(declared),
    }
}
