//! Partition a trial table into fitting groups.
//!
//! Keys come out in insertion order of their first occurrence, so the output is
//! deterministic for a deterministic input order. A group only exists once a row
//! carries its key, so empty groups are never produced.

use std::collections::HashMap;
use std::hash::Hash;

use crate::domain::{GroupKey, Trial};

/// Lazy sequence of `(key, members)` pairs over a borrowed table.
///
/// Construction does one pass to record member indices per key; member slices are
/// materialized only as the iterator advances.
pub struct Groups<'a, K, T> {
    items: &'a [T],
    order: std::vec::IntoIter<(K, Vec<usize>)>,
}

impl<'a, K, T> Iterator for Groups<'a, K, T> {
    type Item = (K, Vec<&'a T>);

    fn next(&mut self) -> Option<Self::Item> {
        let (key, idx) = self.order.next()?;
        Some((key, idx.into_iter().map(|i| &self.items[i]).collect()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.order.size_hint()
    }
}

impl<K, T> ExactSizeIterator for Groups<'_, K, T> {}

/// Group `items` by an arbitrary key.
pub fn group_by<K, T, F>(items: &[T], key_fn: F) -> Groups<'_, K, T>
where
    K: Eq + Hash + Clone,
    F: Fn(&T) -> K,
{
    let mut slot: HashMap<K, usize> = HashMap::new();
    let mut order: Vec<(K, Vec<usize>)> = Vec::new();

    for (i, item) in items.iter().enumerate() {
        let key = key_fn(item);
        match slot.get(&key) {
            Some(&s) => order[s].1.push(i),
            None => {
                slot.insert(key.clone(), order.len());
                order.push((key, vec![i]));
            }
        }
    }

    Groups {
        items,
        order: order.into_iter(),
    }
}

/// Group trials by `(subject, day)`.
pub fn group_trials(trials: &[Trial]) -> Groups<'_, GroupKey, Trial> {
    group_by(trials, |t| t.key)
}

/// Owned `(subject, day)` partition with each group's trials in session order.
///
/// Trials carrying a `trial` index are ordered by it (stable for equal or missing
/// indices); otherwise input order is kept.
pub fn partition_trials(trials: &[Trial]) -> Vec<(GroupKey, Vec<Trial>)> {
    group_trials(trials)
        .map(|(key, members)| {
            let mut owned: Vec<Trial> = members.into_iter().cloned().collect();
            owned.sort_by_key(|t| t.trial);
            (key, owned)
        })
        .collect()
}
