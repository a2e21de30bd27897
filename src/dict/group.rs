//! Prefix grouping: partition sorted entries into ordered buckets by
//! headword prefix, optionally merging undersized buckets.
//!
//! The grouper does not sort; callers sort the dictionary by headword
//! first. Headwords whose case-folded first character sorts before ASCII
//! `'a'` land in a reserved `"SPECIAL"` bucket that is never merged.

use std::collections::BTreeMap;

use log::debug;

use super::store::Dictionary;

/// Reserved bucket key for headwords sorting before `'a'`.
pub const SPECIAL_GROUP_KEY: &str = "SPECIAL";

/// Computes the grouping key for a headword.
pub trait PrefixStrategy {
    fn prefix(&self, headword: &str, length: usize) -> String;
}

/// The default prefix strategy: the lowercased headword truncated to
/// `length` characters, or [`SPECIAL_GROUP_KEY`] when the first character
/// has an ordinal below `'a'` (digits, punctuation, uppercase-only symbols).
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPrefix;

impl PrefixStrategy for DefaultPrefix {
    fn prefix(&self, headword: &str, length: usize) -> String {
        let lowercased = headword.to_lowercase();
        match lowercased.chars().next() {
            None => SPECIAL_GROUP_KEY.to_string(),
            Some(first) if first < 'a' => SPECIAL_GROUP_KEY.to_string(),
            Some(_) => lowercased.chars().take(length).collect(),
        }
    }
}

/// The result of grouping: the optional SPECIAL bucket plus the ordered
/// (key, entry positions) groups. Positions index the dictionary's entries
/// sequence; their concatenation preserves the sort order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryGroups {
    pub special: Option<Vec<usize>>,
    pub groups: Vec<(String, Vec<usize>)>,
}

impl EntryGroups {
    /// Total number of grouped entry positions, SPECIAL included.
    pub fn total_entries(&self) -> usize {
        let special = self.special.as_ref().map_or(0, Vec::len);
        special + self.groups.iter().map(|(_, positions)| positions.len()).sum::<usize>()
    }
}

/// Group the dictionary's entries, in the current sort order, by prefix.
///
/// With `merge_min_size == 0` the raw buckets are returned unmerged, keyed
/// lexicographically. Otherwise buckets are accumulated into running
/// groups: a group closes once it holds at least `merge_min_size` entries,
/// or (unless `merge_across_first` is set) when the next bucket key starts
/// with a different character than the key that opened the group. The last
/// group closes at the end regardless of size.
pub fn group_entries(
    dictionary: &Dictionary,
    prefix: &dyn PrefixStrategy,
    prefix_length: usize,
    merge_min_size: usize,
    merge_across_first: bool,
) -> EntryGroups {
    let mut buckets: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for &position in dictionary.sort_order() {
        let key = prefix.prefix(&dictionary.entries()[position].headword, prefix_length);
        buckets.entry(key).or_default().push(position);
    }
    let special = buckets.remove(SPECIAL_GROUP_KEY);
    debug!(
        "Grouped {} entries into {} raw buckets ({} special)",
        dictionary.len(),
        buckets.len(),
        special.as_ref().map_or(0, Vec::len)
    );

    if merge_min_size == 0 {
        return EntryGroups {
            special,
            groups: buckets.into_iter().collect(),
        };
    }

    let mut groups = Vec::new();
    let mut open_key: Option<String> = None;
    let mut running: Vec<usize> = Vec::new();
    for (key, bucket) in buckets {
        if let Some(current) = &open_key {
            if !merge_across_first && key.chars().next() != current.chars().next() {
                groups.push((open_key.take().unwrap_or_default(), std::mem::take(&mut running)));
            }
        }
        if open_key.is_none() {
            open_key = Some(key);
        }
        running.extend(bucket);
        if running.len() >= merge_min_size {
            groups.push((open_key.take().unwrap_or_default(), std::mem::take(&mut running)));
        }
    }
    if let Some(key) = open_key {
        groups.push((key, running));
    }
    debug!("Merged into {} groups", groups.len());
    EntryGroups { special, groups }
}
