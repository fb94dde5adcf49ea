//! Novelty Filter
//!
//! Fingerprints idea text with a case-folded, punctuation-stripped,
//! stopword-agnostic token-set Jaccard similarity, and rejects
//! near-duplicates against previously accepted candidates. Per-request
//! state only — never shared across workflow invocations (§5).

use std::collections::BTreeSet;

use sha2::{Digest, Sha256};

use crate::model::Idea;

fn tokenize(text: &str) -> BTreeSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|tok| !tok.is_empty())
        .map(str::to_string)
        .collect()
}

/// Jaccard similarity between the token sets of two texts, in `[0, 1]`.
/// Two empty token sets are defined as identical (similarity 1.0).
pub fn similarity(a: &str, b: &str) -> f64 {
    let tokens_a = tokenize(a);
    let tokens_b = tokenize(b);

    if tokens_a.is_empty() && tokens_b.is_empty() {
        return 1.0;
    }

    let intersection = tokens_a.intersection(&tokens_b).count();
    let union = tokens_a.union(&tokens_b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// A stable, order-independent fingerprint of idea text, used as `Idea.id`.
pub fn fingerprint(text: &str) -> String {
    let tokens = tokenize(text);
    let canonical = tokens.into_iter().collect::<Vec<_>>().join(" ");
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let digest = hasher.finalize();
    hex_prefix(&digest, 16)
}

fn hex_prefix(bytes: &[u8], chars: usize) -> String {
    bytes.iter().take(chars.div_ceil(2)).map(|b| format!("{b:02x}")).collect::<String>()[..chars].to_string()
}

/// Whether an improved idea counts as a "meaningful improvement" over the
/// original: score must rise by at least `score_delta_threshold` AND the
/// text must not be near-identical to the original (§4.E).
pub fn is_meaningful_improvement(
    original_text: &str,
    improved_text: &str,
    old_score: f64,
    new_score: f64,
    meaningful_similarity: f64,
    meaningful_score_delta: f64,
) -> bool {
    let score_delta = new_score - old_score;
    score_delta >= meaningful_score_delta && similarity(original_text, improved_text) <= meaningful_similarity
}

/// Filters a batch of ideas for near-duplicates. Earlier ideas always win
/// ties, giving deterministic output for a given generator ordering.
pub struct NoveltyFilter {
    threshold: f64,
    accepted: Vec<Idea>,
}

impl NoveltyFilter {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            accepted: Vec::new(),
        }
    }

    /// Accept or reject each idea in order, returning the survivors and any
    /// human-readable rejection warnings.
    pub fn filter(&mut self, ideas: Vec<Idea>) -> (Vec<Idea>, Vec<String>) {
        let mut warnings = Vec::new();

        for idea in ideas {
            let mut is_duplicate = false;
            for accepted in &self.accepted {
                let sim = similarity(&accepted.text, &idea.text);
                if sim >= self.threshold {
                    warnings.push(format!(
                        "idea {} is a near-duplicate of {} (similarity {:.2}); dropped",
                        idea.id, accepted.id, sim
                    ));
                    is_duplicate = true;
                    break;
                }
            }
            if !is_duplicate {
                self.accepted.push(idea);
            }
        }

        (std::mem::take(&mut self.accepted), warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable_and_order_independent() {
        let a = fingerprint("Vertical hydroponic farms for city rooftops");
        let b = fingerprint("city rooftops for Vertical hydroponic farms");
        assert_eq!(a, b);
    }

    #[test]
    fn similarity_is_one_for_identical_text() {
        assert!((similarity("solar water pumps", "solar water pumps") - 1.0).abs() < 1e-9);
    }

    #[test]
    fn similarity_detects_near_duplicates() {
        let sim = similarity(
            "community-owned vertical farms using recycled greywater",
            "community owned vertical farms using recycled grey water",
        );
        assert!(sim >= 0.8, "expected near-duplicate similarity, got {sim}");
    }

    #[test]
    fn filter_drops_near_duplicate_and_keeps_first() {
        let mut filter = NoveltyFilter::new(0.85);
        let ideas = vec![
            Idea::new("id-a", "solar powered water purification kiosks", 0),
            Idea::new("id-b", "solar powered water purification kiosks!", 1),
            Idea::new("id-c", "蜂巢 modular beekeeping for urban rooftops", 2),
        ];

        let (kept, warnings) = filter.filter(ideas);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].id, "id-a");
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn meaningful_improvement_requires_both_score_and_text_delta() {
        assert!(is_meaningful_improvement(
            "basic community garden",
            "tiered vertical aquaponics system with solar pumps",
            5.0,
            6.0,
            0.9,
            0.3,
        ));

        assert!(!is_meaningful_improvement(
            "basic community garden",
            "basic community garden plot",
            5.0,
            5.2,
            0.9,
            0.3,
        ));
    }
}
