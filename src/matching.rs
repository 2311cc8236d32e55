//! Advisory bounty-to-agent matching.
//!
//! Scores registry entries against a bounty's tags and wording and returns
//! a ranked candidate list. Purely advisory: nothing here mutates lifecycle
//! state; callers decide whether to invoke `match_bounty`.

use crate::bounty::Bounty;
use crate::registry::{RegistryCache, RegistryEntry, RegistrySnapshot};
use std::collections::HashSet;
use std::sync::Arc;

/// How many description words participate in keyword overlap.
const DESCRIPTION_WORD_BUDGET: usize = 20;

/// A candidate agent with its match score.
#[derive(Debug, Clone)]
pub struct MatchCandidate {
    pub entry: RegistryEntry,
    pub score: u32,
}

fn tag_set(tags: Option<&str>) -> HashSet<String> {
    tags.map(|t| {
        t.split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

fn word_set(text: &str, budget: usize) -> HashSet<String> {
    text.to_lowercase()
        .split_whitespace()
        .take(budget)
        .map(|s| s.to_string())
        .collect()
}

fn score_entry(
    entry: &RegistryEntry,
    bounty_tags: &HashSet<String>,
    bounty_words: &HashSet<String>,
) -> u32 {
    let haystack = entry.search_text();
    let entry_words: HashSet<&str> = haystack.split_whitespace().collect();

    let tag_hits = bounty_tags
        .iter()
        .filter(|tag| haystack.contains(tag.as_str()))
        .count() as u32;
    let word_hits = bounty_words
        .iter()
        .filter(|w| entry_words.contains(w.as_str()))
        .count() as u32;

    // A tag hit is a much stronger signal than incidental word overlap;
    // fewer than two shared words alone is noise.
    if tag_hits == 0 && word_hits < 2 {
        return 0;
    }
    tag_hits * 10 + word_hits
}

/// Rank snapshot entries against a bounty. Best-effort, not
/// guaranteed-optimal.
pub fn rank_candidates(
    bounty: &Bounty,
    snapshot: &RegistrySnapshot,
    limit: usize,
) -> Vec<MatchCandidate> {
    let tags = tag_set(bounty.tags.as_deref());
    let mut words = word_set(&bounty.title, usize::MAX);
    words.extend(word_set(&bounty.description, DESCRIPTION_WORD_BUDGET));

    let mut candidates: Vec<MatchCandidate> = snapshot
        .agents()
        .iter()
        .filter_map(|entry| {
            let score = score_entry(entry, &tags, &words);
            (score > 0).then(|| MatchCandidate {
                entry: entry.clone(),
                score,
            })
        })
        .collect();

    candidates.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.entry.name.cmp(&b.entry.name)));
    candidates.truncate(limit);
    candidates
}

/// Thin glue between the bounty lifecycle and the registry mirror.
#[derive(Clone)]
pub struct MatchCoordinator {
    cache: Arc<RegistryCache>,
}

impl MatchCoordinator {
    pub fn new(cache: Arc<RegistryCache>) -> Self {
        Self { cache }
    }

    /// Candidate agents for a bounty, ranked best-first, from the current
    /// snapshot.
    pub fn check_matches(&self, bounty: &Bounty, limit: usize) -> Vec<MatchCandidate> {
        Arc::clone(&self.cache).maybe_schedule_refresh();
        rank_candidates(bounty, &self.cache.snapshot(), limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounty::BountyStatus;
    use crate::types::Category;
    use chrono::Utc;

    fn bounty(title: &str, description: &str, tags: Option<&str>) -> Bounty {
        Bounty {
            id: 1,
            poster_name: "p".into(),
            poster_callback_url: None,
            poster_secret_hash: None,
            title: title.into(),
            description: description.into(),
            requirements: None,
            budget: 50.0,
            category: Category::Physical,
            tags: tags.map(String::from),
            status: BountyStatus::Open,
            claimed_by: None,
            claimer_callback_url: None,
            claimer_secret_hash: None,
            claimed_at: None,
            matched_service_id: None,
            matched_acp_agent: None,
            matched_acp_job: None,
            matched_at: None,
            acp_job_id: None,
            fulfilled_at: None,
            expires_at: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    fn entry(name: &str, description: &str, offerings: &[&str]) -> RegistryEntry {
        RegistryEntry {
            id: None,
            name: name.into(),
            wallet_address: format!("0x{}", name),
            description: description.into(),
            category: String::new(),
            online: true,
            job_offerings: offerings.iter().map(|s| s.to_string()).collect(),
            last_active: None,
        }
    }

    #[test]
    fn test_tag_hits_outrank_word_overlap() {
        let snapshot = RegistrySnapshot::build(
            vec![
                entry("WordBot", "print a bracket for your shelf", &[]),
                entry("TagBot", "specialist", &["3d-print"]),
            ],
            None,
        );
        let b = bounty("Print a bracket", "Need a bracket printed", Some("3d-print"));
        let ranked = rank_candidates(&b, &snapshot, 10);
        assert_eq!(ranked[0].entry.name, "TagBot");
        assert!(ranked[0].score >= 10);
    }

    #[test]
    fn test_single_shared_word_is_noise() {
        let snapshot = RegistrySnapshot::build(
            vec![entry("Noise", "bracket factory with unrelated offerings", &[])],
            None,
        );
        let b = bounty("Design logo", "Vector logo featuring one bracket", None);
        // Only "bracket" overlaps; a single shared word without a tag hit
        // does not make a candidate.
        assert!(rank_candidates(&b, &snapshot, 10).is_empty());
    }

    #[test]
    fn test_no_candidates_for_unrelated_bounty() {
        let snapshot = RegistrySnapshot::build(
            vec![entry("Translator", "translates documents", &["translation"])],
            None,
        );
        let b = bounty("Weld a frame", "Steel bicycle frame welding", Some("welding"));
        assert!(rank_candidates(&b, &snapshot, 10).is_empty());
    }

    #[test]
    fn test_limit_truncates_ranking() {
        let agents = (0..10)
            .map(|i| entry(&format!("Bot{}", i), "3d print widgets", &["3d-print"]))
            .collect();
        let snapshot = RegistrySnapshot::build(agents, None);
        let b = bounty("Print widgets", "widgets please", Some("3d-print"));
        assert_eq!(rank_candidates(&b, &snapshot, 3).len(), 3);
    }
}
