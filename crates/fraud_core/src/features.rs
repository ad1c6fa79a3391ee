//! Behavioural feature derivation
//!
//! Calendar features come straight from `purchase_time` with no timezone
//! conversion. Velocity counts are taken over the whole table, so a row's count
//! includes transactions that happened after it. That lookahead is a known
//! limitation carried into evaluation; a causal (as-of) count would change the
//! feature's meaning and is not done here.

use chrono::{Datelike, Timelike};
use std::collections::HashMap;
use tracing::{info, instrument};

use crate::errors::{CoreError, Result};
use crate::table::{Table, Value};

pub const HOUR_OF_DAY: &str = "hour_of_day";
pub const DAY_OF_WEEK: &str = "day_of_week";
pub const TIME_SINCE_SIGNUP: &str = "time_since_signup";
pub const USER_VELOCITY: &str = "transaction_count";
pub const DEVICE_VELOCITY: &str = "device_transaction_count";

/// Column names consumed by the feature stage
#[derive(Debug, Clone)]
pub struct FeatureColumns<'a> {
    pub signup_time: &'a str,
    pub purchase_time: &'a str,
    pub user_id: &'a str,
    pub device_id: &'a str,
}

impl Default for FeatureColumns<'static> {
    fn default() -> Self {
        Self {
            signup_time: "signup_time",
            purchase_time: "purchase_time",
            user_id: "user_id",
            device_id: "device_id",
        }
    }
}

fn timestamp_at(table: &Table, column: &str, idx: usize, row: usize) -> Result<chrono::NaiveDateTime> {
    table.rows()[row][idx]
        .as_timestamp()
        .ok_or_else(|| CoreError::parse(column, vec![row]))
}

/// Add `hour_of_day`, `day_of_week` (Monday = 0) and `time_since_signup` (seconds)
///
/// Negative elapsed times are kept as-is.
#[instrument(skip(table, columns), fields(rows = table.len()))]
pub fn add_time_features(table: Table, columns: &FeatureColumns<'_>) -> Result<Table> {
    let purchase_idx = table.column_index(columns.purchase_time)?;
    let signup_idx = table.column_index(columns.signup_time)?;

    let mut hours = Vec::with_capacity(table.len());
    let mut weekdays = Vec::with_capacity(table.len());
    let mut elapsed = Vec::with_capacity(table.len());
    let mut inverted = 0usize;

    for row in 0..table.len() {
        let purchase = timestamp_at(&table, columns.purchase_time, purchase_idx, row)?;
        let signup = timestamp_at(&table, columns.signup_time, signup_idx, row)?;

        hours.push(Value::Int(i64::from(purchase.hour())));
        weekdays.push(Value::Int(i64::from(purchase.weekday().num_days_from_monday())));

        let delta = purchase.signed_duration_since(signup);
        let seconds = match delta.num_microseconds() {
            Some(us) => us as f64 / 1_000_000.0,
            None => delta.num_milliseconds() as f64 / 1_000.0,
        };
        if seconds < 0.0 {
            inverted += 1;
        }
        elapsed.push(Value::Float(seconds));
    }

    if inverted > 0 {
        info!("{} rows have purchase_time before signup_time", inverted);
    }

    table
        .with_column(HOUR_OF_DAY, hours)?
        .with_column(DAY_OF_WEEK, weekdays)?
        .with_column(TIME_SINCE_SIGNUP, elapsed)
}

/// Add a column holding, for each row, how many rows share its `key_column` value
pub fn add_count_by(table: Table, key_column: &str, output_column: &str) -> Result<Table> {
    let mut counts: HashMap<&Value, i64> = HashMap::new();
    for value in table.column_values(key_column)? {
        *counts.entry(value).or_insert(0) += 1;
    }

    let values: Vec<Value> = table
        .column_values(key_column)?
        .map(|v| Value::Int(counts[v]))
        .collect();

    table.with_column(output_column, values)
}

/// Add per-user and per-device transaction counts over the full table
#[instrument(skip(table, columns), fields(rows = table.len()))]
pub fn add_velocity_features(table: Table, columns: &FeatureColumns<'_>) -> Result<Table> {
    let table = add_count_by(table, columns.user_id, USER_VELOCITY)?;
    add_count_by(table, columns.device_id, DEVICE_VELOCITY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleaning::parse_timestamp;

    fn ts(s: &str) -> Value {
        Value::Timestamp(parse_timestamp(s).unwrap())
    }

    fn table() -> Table {
        Table::from_rows(
            vec![
                "user_id".into(),
                "device_id".into(),
                "signup_time".into(),
                "purchase_time".into(),
            ],
            vec![
                vec![Value::Int(1), Value::from("D1"), ts("2015-02-24 22:55:49"), ts("2015-04-18 02:47:11")],
                vec![Value::Int(2), Value::from("D1"), ts("2015-06-07 20:39:50"), ts("2015-06-08 01:38:54")],
                vec![Value::Int(1), Value::from("D2"), ts("2015-01-01 12:00:00"), ts("2015-01-01 11:59:30")],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_time_features() {
        let out = add_time_features(table(), &FeatureColumns::default()).unwrap();
        let hours: Vec<_> = out.column_values(HOUR_OF_DAY).unwrap().cloned().collect();
        assert_eq!(hours, vec![Value::Int(2), Value::Int(1), Value::Int(11)]);

        // 2015-04-18 was a Saturday
        assert_eq!(out.rows()[0][out.column_index(DAY_OF_WEEK).unwrap()], Value::Int(5));
    }

    #[test]
    fn test_time_since_signup_exact_and_negative() {
        let out = add_time_features(table(), &FeatureColumns::default()).unwrap();
        let elapsed: Vec<f64> = out
            .column_values(TIME_SINCE_SIGNUP)
            .unwrap()
            .map(|v| v.as_f64().unwrap())
            .collect();
        assert_eq!(elapsed[0], 4506682.0);
        assert_eq!(elapsed[1], 17944.0);
        assert_eq!(elapsed[2], -30.0);
    }

    #[test]
    fn test_untyped_timestamp_is_parse_error() {
        let table = Table::from_rows(
            vec!["signup_time".into(), "purchase_time".into(), "user_id".into(), "device_id".into()],
            vec![vec![Value::from("2015-01-01"), ts("2015-01-02 00:00:00"), Value::Int(1), Value::Int(1)]],
        )
        .unwrap();
        let err = add_time_features(table, &FeatureColumns::default()).unwrap_err();
        assert!(matches!(err, CoreError::Parse { ref column, .. } if column == "signup_time"));
    }

    #[test]
    fn test_velocity_counts_full_table() {
        let out = add_velocity_features(table(), &FeatureColumns::default()).unwrap();
        let users: Vec<_> = out.column_values(USER_VELOCITY).unwrap().cloned().collect();
        let devices: Vec<_> = out.column_values(DEVICE_VELOCITY).unwrap().cloned().collect();
        assert_eq!(users, vec![Value::Int(2), Value::Int(1), Value::Int(2)]);
        assert_eq!(devices, vec![Value::Int(2), Value::Int(2), Value::Int(1)]);
    }
}
