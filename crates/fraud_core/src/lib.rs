//! Fraudscope core: transaction cleaning and feature engineering
//!
//! Turns raw e-commerce transactions plus an IP-to-country range table into a
//! model-ready feature table.
//!
//! Modules:
//! - `table`: typed in-memory table
//! - `io`: CSV reading and atomic CSV writing
//! - `cleaning`: deduplication, completeness filtering, type correction
//! - `geo`: IP range lookup
//! - `features`: calendar, elapsed-time and velocity features
//! - `transform`: one-hot encoding and standardization with fit/apply split
//! - `matrix`: numeric feature matrix for modeling
//! - `prepare`: stage composition

pub mod cleaning;
pub mod config;
pub mod errors;
pub mod features;
pub mod geo;
pub mod io;
pub mod matrix;
pub mod prepare;
pub mod table;
pub mod transform;

pub use cleaning::{class_distribution, ClassDistribution};
pub use config::ColumnConfig;
pub use errors::{CoreError, Result};
pub use geo::{IpRange, IpRangeTable, UNKNOWN_COUNTRY};
pub use matrix::FeatureMatrix;
pub use table::{Table, Value};
pub use transform::{FittedEncoder, FittedScaler, OneHotEncoder, StandardScaler, Transformer};

/// Crate version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
