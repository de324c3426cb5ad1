//! Blood groups and blood products.

use crate::error::{BloodBankError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// ABO/Rh blood group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BloodType {
    /// A positive
    #[serde(rename = "A+")]
    APositive,
    /// A negative
    #[serde(rename = "A-")]
    ANegative,
    /// B positive
    #[serde(rename = "B+")]
    BPositive,
    /// B negative
    #[serde(rename = "B-")]
    BNegative,
    /// AB positive
    #[serde(rename = "AB+")]
    AbPositive,
    /// AB negative
    #[serde(rename = "AB-")]
    AbNegative,
    /// O positive
    #[serde(rename = "O+")]
    OPositive,
    /// O negative
    #[serde(rename = "O-")]
    ONegative,
}

impl BloodType {
    /// All eight groups, in display order.
    pub const ALL: [Self; 8] = [
        Self::APositive,
        Self::ANegative,
        Self::BPositive,
        Self::BNegative,
        Self::AbPositive,
        Self::AbNegative,
        Self::OPositive,
        Self::ONegative,
    ];

    /// Convert to the stored string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::APositive => "A+",
            Self::ANegative => "A-",
            Self::BPositive => "B+",
            Self::BNegative => "B-",
            Self::AbPositive => "AB+",
            Self::AbNegative => "AB-",
            Self::OPositive => "O+",
            Self::ONegative => "O-",
        }
    }

    /// Parse a blood group such as `"O+"` or `" ab- "`.
    ///
    /// # Errors
    ///
    /// Returns [`BloodBankError::Validation`] for anything that is not one of
    /// the eight ABO/Rh groups.
    pub fn parse(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| BloodBankError::Validation(format!("invalid blood type '{s}'")))
    }
}

impl FromStr for BloodType {
    type Err = BloodBankError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for BloodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maximum stored length of a product name.
pub const MAX_PRODUCT_NAME_LEN: usize = 50;

/// Shelf life used for products that are not in the table.
pub const DEFAULT_SHELF_LIFE_DAYS: i64 = 35;

/// A blood product such as "Whole Blood" or "Platelets".
///
/// Product names are free text; only the shelf-life lookup interprets them.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BloodProduct(String);

impl BloodProduct {
    /// Create a product name.
    ///
    /// # Errors
    ///
    /// Returns [`BloodBankError::Validation`] if the name is blank or longer
    /// than [`MAX_PRODUCT_NAME_LEN`].
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(BloodBankError::Validation(
                "blood product must not be empty".to_string(),
            ));
        }
        if trimmed.chars().count() > MAX_PRODUCT_NAME_LEN {
            return Err(BloodBankError::Validation(format!(
                "blood product must be at most {MAX_PRODUCT_NAME_LEN} characters"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The product name as entered.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Storage life in days, looked up case-insensitively.
    #[must_use]
    pub fn shelf_life_days(&self) -> i64 {
        match self.0.to_lowercase().as_str() {
            "whole blood" => 35,
            "red blood cells" | "packed red blood cells" => 42,
            "platelets" => 5,
            "plasma" | "fresh frozen plasma" | "cryoprecipitate" => 365,
            _ => DEFAULT_SHELF_LIFE_DAYS,
        }
    }

    /// Whether two product names denote the same product.
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl fmt::Display for BloodProduct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parses_every_group_case_insensitively() {
        for t in BloodType::ALL {
            assert_eq!(BloodType::parse(&t.as_str().to_lowercase()), Ok(t));
        }
        assert_eq!(BloodType::parse(" o+ "), Ok(BloodType::OPositive));
    }

    #[test]
    fn rejects_malformed_blood_types() {
        for bad in ["", "C+", "O", "A+-", "ABO"] {
            assert!(matches!(
                BloodType::parse(bad),
                Err(BloodBankError::Validation(_))
            ));
        }
    }

    #[test]
    fn shelf_life_table() {
        let days = |name: &str| BloodProduct::new(name).map(|p| p.shelf_life_days());
        assert_eq!(days("Whole Blood"), Ok(35));
        assert_eq!(days("Red Blood Cells"), Ok(42));
        assert_eq!(days("packed red blood cells"), Ok(42));
        assert_eq!(days("Platelets"), Ok(5));
        assert_eq!(days("Fresh Frozen Plasma"), Ok(365));
        assert_eq!(days("Cryoprecipitate"), Ok(365));
        assert_eq!(days("Granulocytes"), Ok(DEFAULT_SHELF_LIFE_DAYS));
    }

    #[test]
    fn blank_products_are_rejected() {
        assert!(BloodProduct::new("   ").is_err());
        assert!(BloodProduct::new("x".repeat(MAX_PRODUCT_NAME_LEN + 1)).is_err());
    }

    proptest! {
        #[test]
        fn serde_uses_display_form(idx in 0usize..8) {
            let t = BloodType::ALL[idx];
            let json = serde_json::to_string(&t).unwrap_or_default();
            prop_assert_eq!(json, format!("\"{}\"", t.as_str()));
        }
    }
}
