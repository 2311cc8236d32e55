//! Core identifiers and shared enums for the marketplace.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// BountyId: durable identifier of a posted bounty
pub type BountyId = u64;

/// ServiceId: durable identifier of a listed service
pub type ServiceId = u64;

/// Listing category shared by bounties and services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Digital,
    Physical,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Digital => "digital",
            Category::Physical => "physical",
        }
    }
}

impl Default for Category {
    fn default() -> Self {
        Category::Digital
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "digital" => Ok(Category::Digital),
            "physical" => Ok(Category::Physical),
            other => Err(format!("unknown category: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_round_trip() {
        assert_eq!("digital".parse::<Category>().unwrap(), Category::Digital);
        assert_eq!("Physical".parse::<Category>().unwrap(), Category::Physical);
        assert_eq!(Category::Physical.to_string(), "physical");
        assert!("both".parse::<Category>().is_err());
    }
}
