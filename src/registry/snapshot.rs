//! Registry snapshot: one complete generation of the mirrored directory.
//!
//! A snapshot is built fully off to the side and swapped in atomically;
//! nothing mutates it after construction. Search is a linear scan over
//! pre-lowered text, which is fine at directory sizes in the low thousands.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Category keys used by the keyword classifier.
pub const CATEGORY_PRODUCTS: &str = "products";
pub const CATEGORY_SERVICES: &str = "services";

/// Keywords marking an agent as offering a physical product.
const PRODUCT_KEYWORDS: &[&str] = &[
    "3d print",
    "laser cut",
    "fabricat",
    "cnc",
    "mill",
    "shipping",
    "physical",
    "hardware",
    "manufacture",
    "printer",
    "maker",
    "craft",
    "build",
];

/// One mirrored agent from the external directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub id: Option<u64>,
    pub name: String,
    pub wallet_address: String,
    pub description: String,
    pub category: String,
    pub online: bool,
    pub job_offerings: Vec<String>,
    pub last_active: Option<DateTime<Utc>>,
}

impl RegistryEntry {
    /// Lower-cased haystack for substring search: name, description,
    /// offerings.
    pub fn search_text(&self) -> String {
        let mut text = format!("{} {}", self.name, self.description);
        for offering in &self.job_offerings {
            text.push(' ');
            text.push_str(offering);
        }
        text.to_lowercase()
    }

    pub fn is_product(&self) -> bool {
        let text = self.search_text();
        PRODUCT_KEYWORDS.iter().any(|kw| text.contains(kw))
    }
}

/// An immutable, complete generation of the mirror.
#[derive(Debug)]
pub struct RegistrySnapshot {
    agents: Vec<RegistryEntry>,
    /// category key -> indices into `agents`, in directory order.
    categories: BTreeMap<&'static str, Vec<usize>>,
    fetched_at: Option<DateTime<Utc>>,
}

impl RegistrySnapshot {
    /// The pre-first-refresh state.
    pub fn empty() -> Self {
        Self::build(Vec::new(), None)
    }

    /// Build a snapshot, categorizing every entry up front.
    pub fn build(agents: Vec<RegistryEntry>, fetched_at: Option<DateTime<Utc>>) -> Self {
        let mut categories: BTreeMap<&'static str, Vec<usize>> = BTreeMap::new();
        categories.insert(CATEGORY_PRODUCTS, Vec::new());
        categories.insert(CATEGORY_SERVICES, Vec::new());
        for (idx, entry) in agents.iter().enumerate() {
            let key = if entry.is_product() {
                CATEGORY_PRODUCTS
            } else {
                CATEGORY_SERVICES
            };
            if let Some(bucket) = categories.get_mut(key) {
                bucket.push(idx);
            }
        }
        Self {
            agents,
            categories,
            fetched_at,
        }
    }

    pub fn agents(&self) -> &[RegistryEntry] {
        &self.agents
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.fetched_at
    }

    /// Entries in a classifier category, in directory order. Unknown
    /// categories yield an empty list.
    pub fn by_category(&self, category: &str) -> Vec<&RegistryEntry> {
        self.categories
            .get(category)
            .map(|indices| indices.iter().map(|&i| &self.agents[i]).collect())
            .unwrap_or_default()
    }

    pub fn category_count(&self, category: &str) -> usize {
        self.categories.get(category).map(|v| v.len()).unwrap_or(0)
    }

    /// Case-insensitive substring search over name/description/offerings.
    pub fn search(&self, query: &str) -> Vec<&RegistryEntry> {
        let needle = query.to_lowercase();
        self.agents
            .iter()
            .filter(|a| a.search_text().contains(&needle))
            .collect()
    }

    pub fn get_by_wallet(&self, wallet: &str) -> Option<&RegistryEntry> {
        self.agents
            .iter()
            .find(|a| a.wallet_address.eq_ignore_ascii_case(wallet))
    }
}

/// On-disk form of a snapshot. Categories are rebuilt on load rather than
/// persisted.
#[derive(Debug, Serialize, Deserialize)]
pub struct CacheFile {
    pub agents: Vec<RegistryEntry>,
    pub fetched_at: Option<DateTime<Utc>>,
}

impl CacheFile {
    pub fn from_snapshot(snapshot: &RegistrySnapshot) -> Self {
        Self {
            agents: snapshot.agents.clone(),
            fetched_at: snapshot.fetched_at,
        }
    }

    pub fn into_snapshot(self) -> RegistrySnapshot {
        RegistrySnapshot::build(self.agents, self.fetched_at)
    }
}

#[cfg(test)]
pub(crate) fn entry(name: &str, description: &str) -> RegistryEntry {
    RegistryEntry {
        id: None,
        name: name.to_string(),
        wallet_address: format!("0x{}", name),
        description: description.to_string(),
        category: String::new(),
        online: true,
        job_offerings: Vec::new(),
        last_active: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categorizer_splits_products_and_services() {
        let snapshot = RegistrySnapshot::build(
            vec![
                entry("PrintBot", "3D print anything in PLA"),
                entry("Translator", "Translates documents"),
                entry("MillWorks", "CNC mill for aluminum parts"),
            ],
            Some(Utc::now()),
        );
        assert_eq!(snapshot.category_count(CATEGORY_PRODUCTS), 2);
        assert_eq!(snapshot.category_count(CATEGORY_SERVICES), 1);
        assert_eq!(snapshot.by_category(CATEGORY_SERVICES)[0].name, "Translator");
        assert!(snapshot.by_category("unknown").is_empty());
    }

    #[test]
    fn test_search_is_case_insensitive_and_covers_offerings() {
        let mut printable = entry("PrintBot", "makes parts");
        printable.job_offerings = vec!["Resin Printing".to_string()];
        let snapshot =
            RegistrySnapshot::build(vec![printable, entry("Other", "nothing here")], None);

        let results = snapshot.search("RESIN");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "PrintBot");
        assert!(snapshot.search("absent-term").is_empty());
    }

    #[test]
    fn test_wallet_lookup_ignores_case() {
        let snapshot = RegistrySnapshot::build(vec![entry("Bot", "desc")], None);
        assert!(snapshot.get_by_wallet("0XBOT").is_some());
        assert!(snapshot.get_by_wallet("0xmissing").is_none());
    }

    #[test]
    fn test_cache_file_round_trip() {
        let snapshot = RegistrySnapshot::build(
            vec![entry("PrintBot", "3D print anything")],
            Some(Utc::now()),
        );
        let file = CacheFile::from_snapshot(&snapshot);
        let json = serde_json::to_string(&file).unwrap();
        let reloaded: CacheFile = serde_json::from_str(&json).unwrap();
        let restored = reloaded.into_snapshot();
        assert_eq!(restored.len(), 1);
        assert_eq!(restored.category_count(CATEGORY_PRODUCTS), 1);
        assert_eq!(restored.fetched_at(), snapshot.fetched_at());
    }
}
