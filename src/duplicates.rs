// src/duplicates.rs
//! Duplicate detection: exact-hash grouping over fully-normalized text,
//! optional fuzzy near-duplicate pairs, and deduplication with keep
//! policies.
//!
//! Grouping is chunk-local by design: a record that duplicates one in a
//! different chunk is not detected across the boundary. That keeps workers
//! shared-nothing and memory bounded; see DESIGN.md.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

use crate::normalize::normalize_full;
use crate::source::Record;

/// Default similarity threshold for fuzzy pair reporting.
pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.95;

/// Stable content hash of the fully-normalized text. Identical across runs
/// and platforms; records with empty text share the distinct "empty" bucket
/// rather than being dropped.
pub fn hash_of(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_full(text).as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for b in digest.iter() {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// A set of records sharing a normalized-text hash. Only hashes with two or
/// more members form a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub hash: String,
    /// Raw text of the first-encountered member, in source order.
    pub canonical_text: String,
    pub member_ids: Vec<u64>,
    pub count: usize,
    pub ratings: Vec<f64>,
}

/// Reported near-duplicate pair; never merged into exact groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuzzyPair {
    pub a: u64,
    pub b: u64,
    pub similarity: f64,
}

/// Which member survives deduplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeepPolicy {
    First,
    Last,
    /// Highest-rated member wins; ties keep the earliest by source order.
    HighestRating,
}

/// Chunk-local duplicate statistics.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DuplicateStats {
    pub groups: Vec<DuplicateGroup>,
    /// Redundant records: Σ (count − 1) over groups.
    pub duplicates: usize,
    /// Distinct normalized texts.
    pub unique: usize,
}

/// Single pass building a hash → members map; any hash with ≥2 members
/// becomes a group. Groups come back in first-encounter order.
pub fn group(records: &[Record]) -> Vec<DuplicateGroup> {
    let hashes: Vec<String> = records.iter().map(|r| hash_of(&r.raw_text)).collect();
    let mut by_hash: HashMap<&str, Vec<usize>> = HashMap::new();
    let mut order: Vec<(&str, usize)> = Vec::new();

    for (i, h) in hashes.iter().enumerate() {
        let members = by_hash.entry(h.as_str()).or_default();
        if members.is_empty() {
            order.push((h.as_str(), i));
        }
        members.push(i);
    }

    order
        .into_iter()
        .filter_map(|(h, first)| {
            let members = &by_hash[h];
            if members.len() < 2 {
                return None;
            }
            Some(DuplicateGroup {
                hash: h.to_string(),
                canonical_text: records[first].raw_text.clone(),
                member_ids: members.iter().map(|&i| records[i].id).collect(),
                count: members.len(),
                ratings: members.iter().filter_map(|&i| records[i].rating).collect(),
            })
        })
        .collect()
}

/// Group + summary counts in one call; what the chunk worker records.
pub fn analyze(records: &[Record]) -> DuplicateStats {
    let groups = group(records);
    let duplicates: usize = groups.iter().map(|g| g.count - 1).sum();
    DuplicateStats {
        unique: records.len() - duplicates,
        duplicates,
        groups,
    }
}

/// Pairwise near-duplicate scan over light-normalized text. O(n²); off by
/// default in the pipeline configuration. Pairs with similarity ≥
/// `threshold` are reported, not merged.
pub fn fuzzy_pairs(records: &[Record], threshold: f64) -> Vec<FuzzyPair> {
    let threshold = if threshold > 0.0 && threshold <= 1.0 {
        threshold
    } else {
        DEFAULT_FUZZY_THRESHOLD
    };

    let mut out = Vec::new();
    for i in 0..records.len() {
        for j in (i + 1)..records.len() {
            let sim =
                strsim::normalized_levenshtein(&records[i].light_text, &records[j].light_text);
            if sim >= threshold {
                out.push(FuzzyPair {
                    a: records[i].id,
                    b: records[j].id,
                    similarity: sim,
                });
            }
        }
    }
    out
}

/// Deduplicate by exact hash under a keep policy. Returns the retained
/// records (source order preserved) and, when `track_frequency` is set, a
/// map of retained id → occurrence count (singletons get 1). Inputs are
/// not mutated.
pub fn deduplicate(
    records: &[Record],
    keep: KeepPolicy,
    track_frequency: bool,
) -> (Vec<Record>, HashMap<u64, usize>) {
    let hashes: Vec<String> = records.iter().map(|r| hash_of(&r.raw_text)).collect();
    let mut by_hash: HashMap<&str, Vec<usize>> = HashMap::new();
    for (i, h) in hashes.iter().enumerate() {
        by_hash.entry(h.as_str()).or_default().push(i);
    }

    let mut winners: Vec<usize> = by_hash
        .values()
        .map(|members| match keep {
            KeepPolicy::First => members[0],
            KeepPolicy::Last => *members.last().expect("non-empty hash bucket"),
            KeepPolicy::HighestRating => {
                let mut best = members[0];
                let mut best_rating = records[best].rating.unwrap_or(f64::NEG_INFINITY);
                for &i in &members[1..] {
                    let r = records[i].rating.unwrap_or(f64::NEG_INFINITY);
                    // Strictly greater: earliest member wins ties.
                    if r > best_rating {
                        best = i;
                        best_rating = r;
                    }
                }
                best
            }
        })
        .collect();
    winners.sort_unstable();

    let mut freq = HashMap::new();
    let retained: Vec<Record> = winners
        .iter()
        .map(|&i| {
            if track_frequency {
                freq.insert(records[i].id, by_hash[hashes[i].as_str()].len());
            }
            records[i].clone()
        })
        .collect();

    (retained, freq)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::RawRecord;

    fn recs(items: Vec<(&str, Option<f64>)>) -> Vec<Record> {
        items
            .into_iter()
            .enumerate()
            .map(|(i, (text, rating))| {
                let mut raw = RawRecord::new(text);
                raw.rating = rating;
                Record::materialize(i as u64, raw)
            })
            .collect()
    }

    #[test]
    fn hash_ignores_case_punct_and_spacing() {
        assert_eq!(hash_of("Excelente servicio"), hash_of("excelente   SERVICIO!!"));
        assert_ne!(hash_of("Excelente servicio"), hash_of("Terrible servicio"));
    }

    #[test]
    fn grouping_keeps_first_canonical_text() {
        let r = recs(vec![
            ("Excelente servicio", Some(9.0)),
            ("excelente SERVICIO", Some(9.0)),
            ("Terrible servicio", Some(2.0)),
        ]);
        let groups = group(&r);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].canonical_text, "Excelente servicio");
        assert_eq!(groups[0].count, 2);
        assert_eq!(groups[0].member_ids, vec![0, 1]);
        assert_eq!(groups[0].ratings, vec![9.0, 9.0]);
        assert_eq!(groups[0].count, groups[0].member_ids.len());
    }

    #[test]
    fn empty_texts_form_their_own_bucket() {
        let r = recs(vec![("", None), ("   ", None), ("algo", None)]);
        let stats = analyze(&r);
        assert_eq!(stats.groups.len(), 1);
        assert_eq!(stats.groups[0].count, 2);
        assert_eq!(stats.duplicates, 1);
        assert_eq!(stats.unique, 2);
    }

    #[test]
    fn fuzzy_pairs_respect_threshold() {
        let r = recs(vec![
            ("el servicio fue muy bueno hoy", None),
            ("el servicio fue muy bueno hoy!", None),
            ("pedido totalmente diferente", None),
        ]);
        let pairs = fuzzy_pairs(&r, 0.9);
        assert_eq!(pairs.len(), 1);
        assert_eq!((pairs[0].a, pairs[0].b), (0, 1));
        assert!(pairs[0].similarity >= 0.9);

        // Stricter threshold drops the near-pair.
        assert!(fuzzy_pairs(&r, 1.0).is_empty());
    }

    #[test]
    fn dedup_first_and_last_policies() {
        let r = recs(vec![
            ("mismo texto", Some(1.0)),
            ("MISMO texto", Some(5.0)),
            ("otro", None),
        ]);
        let (first, freq) = deduplicate(&r, KeepPolicy::First, true);
        assert_eq!(first.iter().map(|x| x.id).collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(freq[&0], 2);
        assert_eq!(freq[&2], 1);

        let (last, _) = deduplicate(&r, KeepPolicy::Last, false);
        assert_eq!(last.iter().map(|x| x.id).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn dedup_highest_rating_ties_keep_earliest() {
        let r = recs(vec![
            ("mismo texto", Some(4.0)),
            ("mismo texto", Some(8.0)),
            ("mismo texto", Some(8.0)),
        ]);
        let (kept, freq) = deduplicate(&r, KeepPolicy::HighestRating, true);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, 1); // 8.0 first appears at index 1
        assert_eq!(freq[&1], 3);
    }

    #[test]
    fn dedup_is_idempotent() {
        let r = recs(vec![
            ("uno", None),
            ("uno", None),
            ("dos", Some(3.0)),
            ("DOS!", Some(7.0)),
        ]);
        let (once, _) = deduplicate(&r, KeepPolicy::HighestRating, false);
        let (twice, _) = deduplicate(&once, KeepPolicy::HighestRating, false);
        assert_eq!(once, twice);
    }

    #[test]
    fn track_frequency_off_returns_empty_map() {
        let r = recs(vec![("a", None), ("a", None)]);
        let (_, freq) = deduplicate(&r, KeepPolicy::First, false);
        assert!(freq.is_empty());
    }
}
