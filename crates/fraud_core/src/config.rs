//! Column layout of the transaction data

use serde::{Deserialize, Serialize};

/// Which input columns play which role in the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnConfig {
    pub user_id: String,
    pub device_id: String,
    pub signup_time: String,
    pub purchase_time: String,
    pub ip_address: String,
    /// Binary target (1 = fraud)
    pub label: String,
    /// Rows missing any of these are dropped
    pub required: Vec<String>,
    /// Raw columns converted to numbers during cleaning
    pub numeric: Vec<String>,
    /// One-hot encoded after feature derivation
    pub categorical: Vec<String>,
    /// Standardized after encoding
    pub scaled: Vec<String>,
    /// Kept in the processed table but never fed to a model
    pub identifiers: Vec<String>,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        let strings = |names: &[&str]| names.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self {
            user_id: "user_id".into(),
            device_id: "device_id".into(),
            signup_time: "signup_time".into(),
            purchase_time: "purchase_time".into(),
            ip_address: "ip_address".into(),
            label: "class".into(),
            required: strings(&[
                "user_id",
                "device_id",
                "signup_time",
                "purchase_time",
                "ip_address",
                "purchase_value",
                "age",
                "sex",
                "browser",
                "source",
                "class",
            ]),
            numeric: strings(&["purchase_value", "age", "class"]),
            categorical: strings(&["browser", "source", "sex", "country"]),
            scaled: strings(&[
                "purchase_value",
                "age",
                "time_since_signup",
                "transaction_count",
                "device_transaction_count",
            ]),
            identifiers: strings(&[
                "user_id",
                "device_id",
                "signup_time",
                "purchase_time",
                "ip_address",
            ]),
        }
    }
}

/// Borrow a list of owned names as `&str`
pub fn as_strs(names: &[String]) -> Vec<&str> {
    names.iter().map(String::as_str).collect()
}
