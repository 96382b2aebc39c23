use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The fixed set of request categories a customer message can fall into.
///
/// Declaration order matters: it is the order used for probability vectors,
/// confusion matrices and for breaking ties between equally probable classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    /// Requests for general information (stock, opening hours, prices)
    #[serde(rename = "Information")]
    Information,
    /// The customer is placing an order
    #[serde(rename = "Commande")]
    Order,
    /// Complaints and dissatisfaction
    #[serde(rename = "Réclamation")]
    Complaint,
    /// Critical problems that need immediate attention
    #[serde(rename = "Urgence")]
    Urgency,
}

impl Category {
    /// Number of categories.
    pub const COUNT: usize = 4;

    /// All categories in their canonical order.
    pub const ALL: [Category; Category::COUNT] = [
        Category::Information,
        Category::Order,
        Category::Complaint,
        Category::Urgency,
    ];

    /// Position of the category in [`Category::ALL`].
    pub fn index(self) -> usize {
        match self {
            Category::Information => 0,
            Category::Order => 1,
            Category::Complaint => 2,
            Category::Urgency => 3,
        }
    }

    /// The business label used in datasets and on the wire.
    pub fn label(self) -> &'static str {
        match self {
            Category::Information => "Information",
            Category::Order => "Commande",
            Category::Complaint => "Réclamation",
            Category::Urgency => "Urgence",
        }
    }

    /// Canonical labels of every category, in order.
    pub fn labels() -> Vec<String> {
        Self::ALL.iter().map(|c| c.label().to_string()).collect()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error returned when a label is not part of the vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCategory(pub String);

impl fmt::Display for UnknownCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown category '{}'", self.0)
    }
}

impl std::error::Error for UnknownCategory {}

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Information" => Ok(Category::Information),
            "Commande" | "Order" => Ok(Category::Order),
            "Réclamation" | "Reclamation" | "Complaint" => Ok(Category::Complaint),
            "Urgence" | "Urgency" => Ok(Category::Urgency),
            other => Err(UnknownCategory(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_matches_canonical_order() {
        for (i, category) in Category::ALL.iter().enumerate() {
            assert_eq!(category.index(), i);
        }
    }

    #[test]
    fn test_parses_french_english_and_unaccented_labels() {
        assert_eq!("Réclamation".parse::<Category>(), Ok(Category::Complaint));
        assert_eq!("Reclamation".parse::<Category>(), Ok(Category::Complaint));
        assert_eq!(" Urgence ".parse::<Category>(), Ok(Category::Urgency));
        assert_eq!("Order".parse::<Category>(), Ok(Category::Order));
        assert!("urgence".parse::<Category>().is_err());
        assert!("Spam".parse::<Category>().is_err());
    }

    #[test]
    fn test_serializes_with_business_labels() {
        let json = serde_json::to_string(&Category::Complaint).unwrap();
        assert_eq!(json, "\"Réclamation\"");
        let back: Category = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Category::Complaint);
    }
}
