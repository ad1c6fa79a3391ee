//! Stage composition for the feature pipeline
//!
//! raw table -> clean -> resolve country -> derive features -> encode/scale.
//! Each step consumes the previous step's table; the only state that outlives
//! a call is the `Transformer` returned by `fit_transform`.

use tracing::{info, instrument};

use crate::cleaning::{coerce_numeric, drop_incomplete, normalize_timestamps, remove_duplicates};
use crate::config::{as_strs, ColumnConfig};
use crate::errors::Result;
use crate::features::{add_time_features, add_velocity_features, FeatureColumns};
use crate::geo::{resolve, IpRangeTable};
use crate::table::Table;
use crate::transform::Transformer;

fn feature_columns(columns: &ColumnConfig) -> FeatureColumns<'_> {
    FeatureColumns {
        signup_time: &columns.signup_time,
        purchase_time: &columns.purchase_time,
        user_id: &columns.user_id,
        device_id: &columns.device_id,
    }
}

/// Clean the raw transactions and derive every engineered feature
///
/// The result still holds the raw categorical and unscaled numeric columns.
#[instrument(skip_all, fields(rows = transactions.len()))]
pub fn engineer(
    transactions: Table,
    ranges: Option<&IpRangeTable>,
    columns: &ColumnConfig,
) -> Result<Table> {
    let table = remove_duplicates(transactions);
    let table = drop_incomplete(table, &as_strs(&columns.required))?;
    let table = normalize_timestamps(
        table,
        &[columns.signup_time.as_str(), columns.purchase_time.as_str()],
    )?;
    let table = coerce_numeric(table, &as_strs(&columns.numeric))?;

    let table = resolve(table, ranges, &columns.ip_address)?;

    let feature_cols = feature_columns(columns);
    let table = add_time_features(table, &feature_cols)?;
    let table = add_velocity_features(table, &feature_cols)?;

    info!(
        "Engineered table: {} rows x {} columns",
        table.len(),
        table.columns().len()
    );
    Ok(table)
}

/// Fit encoding then scaling on `table` and return the transformed table with its state
pub fn fit_transform(table: Table, columns: &ColumnConfig) -> Result<(Table, Transformer)> {
    let mut transformer = Transformer::new();
    let table = transformer.encode(table, &as_strs(&columns.categorical), true)?;
    let table = transformer.scale(table, &as_strs(&columns.scaled), true)?;
    Ok((table, transformer))
}

/// Apply an already fitted transformer without refitting
pub fn transform(table: Table, transformer: &mut Transformer, columns: &ColumnConfig) -> Result<Table> {
    let table = transformer.encode(table, &as_strs(&columns.categorical), false)?;
    transformer.scale(table, &as_strs(&columns.scaled), false)
}
