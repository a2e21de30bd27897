//! The in-memory dictionary representation.
//!
//! A `Dictionary` is a multimap: several entries may share one headword
//! (multi-sense entries are a first-class feature). A reverse lookup index
//! maps each headword to the positions of its entries, and a permutation of
//! positions records the current sort order.

use std::collections::HashMap;

use log::debug;

use super::group::{self, EntryGroups, PrefixStrategy};
use super::models::{DictionaryEntry, DictionaryMetadata, SortOptions};

/// Combines the definitions collected for one headword into a single
/// definition during [`Dictionary::merge_definitions`].
pub trait MergeStrategy {
    fn merge(&self, headword: &str, definitions: &[String]) -> String;
}

/// The in-memory dictionary: entries in insertion order, a headword index,
/// and the current sort-order permutation.
#[derive(Debug, Default)]
pub struct Dictionary {
    pub metadata: DictionaryMetadata,
    entries: Vec<DictionaryEntry>,
    /// headword -> positions of entries with that headword, insertion order
    index: HashMap<String, Vec<usize>>,
    /// Permutation of entry positions giving the current order.
    sorted: Vec<usize>,
    has_synonyms: bool,
}

impl Dictionary {
    pub fn new(metadata: DictionaryMetadata) -> Self {
        Self {
            metadata,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct headwords.
    pub fn unique_headwords(&self) -> usize {
        self.index.len()
    }

    pub fn has_unique_headwords_only(&self) -> bool {
        self.len() == self.unique_headwords()
    }

    /// True iff at least one entry owns at least one synonym.
    pub fn has_synonyms(&self) -> bool {
        self.has_synonyms
    }

    pub fn has_headword(&self, headword: &str) -> bool {
        self.index.contains_key(headword)
    }

    /// All entries, in insertion order.
    pub fn entries(&self) -> &[DictionaryEntry] {
        &self.entries
    }

    /// The current sort-order permutation over entry positions.
    pub fn sort_order(&self) -> &[usize] {
        &self.sorted
    }

    /// Iterate entries in the current sort order.
    pub fn entries_in_order(&self) -> impl Iterator<Item = &DictionaryEntry> {
        self.sorted.iter().map(|&position| &self.entries[position])
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
        self.sorted.clear();
        self.has_synonyms = false;
    }

    /// Append an entry. Duplicate headwords are allowed.
    pub fn add_entry(&mut self, headword: impl Into<String>, definition: impl Into<String>) {
        let entry = DictionaryEntry::new(headword, definition);
        let position = self.entries.len();
        self.index
            .entry(entry.headword.clone())
            .or_default()
            .push(position);
        self.entries.push(entry);
        self.sorted.push(position);
    }

    /// Attach a synonym to the entry at `position`.
    ///
    /// Silently does nothing when `position` is out of range.
    pub fn add_synonym(&mut self, synonym: impl Into<String>, position: usize) {
        if let Some(entry) = self.entries.get_mut(position) {
            entry.add_synonym(synonym);
            self.has_synonyms = true;
        }
    }

    /// The definitions of every entry sharing `headword`, in insertion
    /// order. Empty when the headword is absent.
    pub fn get_definitions(&self, headword: &str) -> Vec<&str> {
        match self.index.get(headword) {
            Some(positions) => positions
                .iter()
                .map(|&position| self.entries[position].definition.as_str())
                .collect(),
            None => Vec::new(),
        }
    }

    /// All (synonym, position) pairs, where the position is the owning
    /// entry's zero-based position in the *current sort order*.
    ///
    /// This is the index value written into a StarDict .syn record.
    pub fn synonyms_with_position(&self) -> Vec<(&str, usize)> {
        let mut pairs = Vec::new();
        if self.has_synonyms {
            for (ordered_position, &position) in self.sorted.iter().enumerate() {
                for synonym in self.entries[position].synonyms() {
                    pairs.push((synonym.as_str(), ordered_position));
                }
            }
        }
        pairs
    }

    /// Recompute the sort-order permutation.
    ///
    /// With neither `by_headword` nor `by_definition` set, resets to
    /// insertion order. Otherwise sorts by a (headword, definition,
    /// insertion position) key; the position makes the order a
    /// deterministic total order even among equal keys. `reverse` reverses
    /// the whole ordering, tie-break included.
    pub fn sort(&mut self, options: SortOptions) {
        if !options.by_headword && !options.by_definition {
            self.sorted = (0..self.entries.len()).collect();
            return;
        }
        let mut keys: Vec<(String, String, usize)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| {
                let mut first = if options.by_headword {
                    entry.headword.clone()
                } else {
                    String::new()
                };
                let mut second = if options.by_definition {
                    entry.definition.clone()
                } else {
                    String::new()
                };
                if options.ignore_case {
                    first = first.to_lowercase();
                    second = second.to_lowercase();
                }
                (first, second, position)
            })
            .collect();
        keys.sort_unstable();
        if options.reverse {
            keys.reverse();
        }
        self.sorted = keys.into_iter().map(|(_, _, position)| position).collect();
    }

    /// Merge the definitions of entries sharing a headword into one entry
    /// per distinct headword, rebuilding the store from scratch.
    ///
    /// The merged definition is `strategy.merge(headword, definitions)`
    /// when a strategy is given, else the definitions joined with
    /// `separator`. Synonyms of all contributing entries are reattached to
    /// the merged entry, in entry order then synonym order. Does nothing
    /// when every headword is already unique, or when neither a strategy
    /// nor a separator is supplied. Resets the sort order.
    pub fn merge_definitions(
        &mut self,
        strategy: Option<&dyn MergeStrategy>,
        separator: Option<&str>,
    ) {
        if self.has_unique_headwords_only() || (strategy.is_none() && separator.is_none()) {
            return;
        }
        debug!(
            "Merging definitions: {} entries, {} unique headwords",
            self.len(),
            self.unique_headwords()
        );
        let old_entries = std::mem::take(&mut self.entries);
        let old_index = std::mem::take(&mut self.index);
        self.sorted.clear();
        self.has_synonyms = false;

        // Distinct headwords in first-occurrence order.
        for (position, old_entry) in old_entries.iter().enumerate() {
            let positions = &old_index[&old_entry.headword];
            if positions[0] != position {
                continue; // headword already merged
            }
            let definitions: Vec<String> = positions
                .iter()
                .map(|&i| old_entries[i].definition.clone())
                .collect();
            let merged = match strategy {
                Some(strategy) => strategy.merge(&old_entry.headword, &definitions),
                // checked above: separator is present when strategy is not
                None => definitions.join(separator.unwrap_or_default()),
            };
            self.add_entry(old_entry.headword.clone(), merged);
            let merged_position = self.entries.len() - 1;
            for &i in positions {
                for synonym in old_entries[i].synonyms() {
                    self.add_synonym(synonym.clone(), merged_position);
                }
            }
        }
        debug!("Merged into {} entries", self.len());
    }

    /// Append one new entry per synonym, with the synonym as headword and
    /// the owning entry's definition. Original entries are untouched and
    /// the new entries own no synonyms. Resets the sort order.
    pub fn flatten_synonyms(&mut self) {
        if !self.has_synonyms {
            return;
        }
        let flattened: Vec<(String, String)> = self
            .entries
            .iter()
            .flat_map(|entry| {
                entry
                    .synonyms()
                    .iter()
                    .map(|synonym| (synonym.clone(), entry.definition.clone()))
            })
            .collect();
        debug!("Flattening {} synonyms into entries", flattened.len());
        for (headword, definition) in flattened {
            self.add_entry(headword, definition);
        }
        self.sort(SortOptions::default());
    }

    /// Partition the entries, in the current sort order, into ordered
    /// buckets by headword prefix. See the [`group`](super::group) module.
    ///
    /// The caller is expected to sort by headword first.
    pub fn group(
        &self,
        prefix: &dyn PrefixStrategy,
        prefix_length: usize,
        merge_min_size: usize,
        merge_across_first: bool,
    ) -> EntryGroups {
        group::group_entries(self, prefix, prefix_length, merge_min_size, merge_across_first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dict::models::SortOptions;

    fn sample() -> Dictionary {
        let mut dictionary = Dictionary::default();
        dictionary.add_entry("apple", "fruit");
        dictionary.add_entry("apple", "company");
        dictionary.add_entry("Banana", "fruit");
        dictionary
    }

    #[test]
    fn duplicate_headwords_are_kept_and_indexed() {
        let dictionary = sample();
        assert_eq!(dictionary.len(), 3);
        assert_eq!(dictionary.unique_headwords(), 2);
        assert!(!dictionary.has_unique_headwords_only());
        assert_eq!(dictionary.get_definitions("apple"), vec!["fruit", "company"]);
        assert_eq!(dictionary.get_definitions("missing"), Vec::<&str>::new());
    }

    #[test]
    fn sort_without_keys_resets_to_insertion_order() {
        let mut dictionary = sample();
        dictionary.sort(SortOptions::by_headword(true));
        dictionary.sort(SortOptions::default());
        assert_eq!(dictionary.sort_order(), &[0, 1, 2]);
    }

    #[test]
    fn sort_by_headword_is_case_sensitive_by_default() {
        let mut dictionary = sample();
        // "Banana" < "apple" in code point order
        dictionary.sort(SortOptions::by_headword(false));
        assert_eq!(dictionary.sort_order(), &[2, 0, 1]);
        // case folded, apple < banana
        dictionary.sort(SortOptions::by_headword(true));
        assert_eq!(dictionary.sort_order(), &[0, 1, 2]);
    }

    #[test]
    fn sort_is_idempotent() {
        let mut dictionary = sample();
        dictionary.sort(SortOptions::by_headword(true));
        let first = dictionary.sort_order().to_vec();
        dictionary.sort(SortOptions::by_headword(true));
        assert_eq!(dictionary.sort_order(), first.as_slice());
    }

    #[test]
    fn sort_reverse_flips_the_tie_break_too() {
        let mut dictionary = sample();
        dictionary.sort(SortOptions {
            by_headword: true,
            ignore_case: true,
            reverse: true,
            ..SortOptions::default()
        });
        assert_eq!(dictionary.sort_order(), &[2, 1, 0]);
    }

    #[test]
    fn sort_by_definition_orders_within_headword() {
        let mut dictionary = sample();
        dictionary.sort(SortOptions {
            by_headword: true,
            by_definition: true,
            ignore_case: true,
            ..SortOptions::default()
        });
        // apple/company < apple/fruit < banana/fruit
        assert_eq!(dictionary.sort_order(), &[1, 0, 2]);
    }

    #[test]
    fn merge_definitions_with_separator() {
        let mut dictionary = sample();
        dictionary.merge_definitions(None, Some(" | "));
        assert_eq!(dictionary.len(), 2);
        assert_eq!(dictionary.unique_headwords(), 2);
        assert!(dictionary.has_unique_headwords_only());
        assert_eq!(dictionary.get_definitions("apple"), vec!["fruit | company"]);
        assert_eq!(dictionary.get_definitions("Banana"), vec!["fruit"]);
    }

    #[test]
    fn merge_definitions_is_idempotent() {
        let mut dictionary = sample();
        dictionary.merge_definitions(None, Some(" | "));
        let first: Vec<(String, String)> = dictionary
            .entries()
            .iter()
            .map(|e| (e.headword.clone(), e.definition.clone()))
            .collect();
        dictionary.merge_definitions(None, Some(" | "));
        let second: Vec<(String, String)> = dictionary
            .entries()
            .iter()
            .map(|e| (e.headword.clone(), e.definition.clone()))
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn merge_definitions_without_separator_or_strategy_is_a_no_op() {
        let mut dictionary = sample();
        dictionary.merge_definitions(None, None);
        assert_eq!(dictionary.len(), 3);
    }

    #[test]
    fn merge_definitions_with_strategy() {
        struct Count;
        impl MergeStrategy for Count {
            fn merge(&self, headword: &str, definitions: &[String]) -> String {
                format!("{}:{}", headword, definitions.len())
            }
        }
        let mut dictionary = sample();
        dictionary.merge_definitions(Some(&Count), None);
        assert_eq!(dictionary.get_definitions("apple"), vec!["apple:2"]);
    }

    #[test]
    fn merge_definitions_reattaches_synonyms_in_order() {
        let mut dictionary = sample();
        dictionary.add_synonym("pomme", 0);
        dictionary.add_synonym("Apple Inc.", 1);
        dictionary.merge_definitions(None, Some("; "));
        let apple = dictionary
            .entries()
            .iter()
            .find(|e| e.headword == "apple")
            .unwrap();
        assert_eq!(apple.synonyms(), &["pomme", "Apple Inc."]);
    }

    #[test]
    fn add_synonym_out_of_range_is_a_no_op() {
        let mut dictionary = sample();
        dictionary.add_synonym("ghost", 99);
        assert!(!dictionary.has_synonyms());
    }

    #[test]
    fn flatten_synonyms_appends_one_entry_per_synonym() {
        let mut dictionary = sample();
        dictionary.add_synonym("pomme", 0);
        dictionary.add_synonym("apfel", 0);
        dictionary.add_synonym("banane", 2);
        dictionary.flatten_synonyms();
        assert_eq!(dictionary.len(), 6);
        assert_eq!(dictionary.get_definitions("pomme"), vec!["fruit"]);
        assert_eq!(dictionary.get_definitions("banane"), vec!["fruit"]);
        // new entries own no synonyms, originals keep theirs
        assert!(dictionary.entries()[3].synonyms().is_empty());
        assert_eq!(dictionary.entries()[0].synonyms().len(), 2);
        // sort order reset to insertion order
        assert_eq!(dictionary.sort_order(), &[0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn flatten_without_synonyms_is_a_no_op() {
        let mut dictionary = sample();
        dictionary.flatten_synonyms();
        assert_eq!(dictionary.len(), 3);
    }

    #[test]
    fn synonym_positions_follow_the_sort_order() {
        let mut dictionary = sample();
        dictionary.add_synonym("banane", 2);
        // case-sensitive sort puts "Banana" (entry 2) first
        dictionary.sort(SortOptions::by_headword(false));
        assert_eq!(dictionary.synonyms_with_position(), vec![("banane", 0)]);
    }
}
