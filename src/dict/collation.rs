//! Pluggable case-insensitive collation for the Bookeen index.

use std::cmp::Ordering;
use std::panic::RefUnwindSafe;

/// A case-insensitive comparator over decoded text values.
///
/// The Bookeen writer registers the active implementation with SQLite under
/// the name `IcuNoCase`, so the comparator must be callable from the
/// database engine (hence the `Send + Sync + RefUnwindSafe` bounds).
pub trait Collation: Send + Sync + RefUnwindSafe {
    fn collate(&self, a: &str, b: &str) -> Ordering;
}

/// The default `IcuNoCase` collation: byte-wise comparison of the UTF-8
/// encodings with ASCII letters folded to lowercase.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCollation;

impl Collation for DefaultCollation {
    fn collate(&self, a: &str, b: &str) -> Ordering {
        a.bytes()
            .map(|byte| byte.to_ascii_lowercase())
            .cmp(b.bytes().map(|byte| byte.to_ascii_lowercase()))
    }
}

/// German-aware `IcuNoCase` collation.
///
/// Compares with umlauts mapped to their base letters (and ß to ss); equal
/// base forms fall back to comparing the lowercased originals.
#[derive(Debug, Clone, Copy, Default)]
pub struct GermanCollation;

const GERMAN_REPLACEMENTS: &[(char, &str)] = &[('ä', "a"), ('ö', "o"), ('ü', "u"), ('ß', "ss")];

impl GermanCollation {
    fn fold(text: &str) -> String {
        let mut folded = String::with_capacity(text.len());
        for c in text.chars() {
            match GERMAN_REPLACEMENTS.iter().find(|(from, _)| *from == c) {
                Some((_, to)) => folded.push_str(to),
                None => folded.push(c),
            }
        }
        folded
    }
}

impl Collation for GermanCollation {
    fn collate(&self, a: &str, b: &str) -> Ordering {
        let (lower_a, lower_b) = (a.to_lowercase(), b.to_lowercase());
        let folded_a = Self::fold(&lower_a);
        let folded_b = Self::fold(&lower_b);
        match folded_a.cmp(&folded_b) {
            Ordering::Equal => lower_a.cmp(&lower_b),
            unequal => unequal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_collation_folds_ascii_case_only() {
        let c = DefaultCollation;
        assert_eq!(c.collate("Apple", "apple"), Ordering::Equal);
        assert_eq!(c.collate("apple", "banana"), Ordering::Less);
        // Non-ASCII bytes compare verbatim
        assert_eq!(c.collate("É", "é"), Ordering::Less);
    }

    #[test]
    fn german_collation_sorts_umlauts_with_base_letters() {
        let c = GermanCollation;
        assert_eq!(c.collate("Äpfel", "apfel"), Ordering::Greater); // a < ä after base fold tiebreak
        assert_eq!(c.collate("Ofen", "Öl"), Ordering::Less); // ofen < ol
        assert_eq!(c.collate("Straße", "Strasse"), Ordering::Greater);
        assert_eq!(c.collate("Müller", "Müller"), Ordering::Equal);
    }
}
