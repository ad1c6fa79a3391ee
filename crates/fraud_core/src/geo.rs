//! IP address to country resolution
//!
//! Ranges are sorted by lower bound once at load time. Each transaction is
//! matched to the range with the greatest lower bound not above its address
//! (a backward as-of match) and the match is then checked against that range's
//! upper bound. Addresses falling into a gap between ranges resolve to
//! `UNKNOWN_COUNTRY`.

use std::net::Ipv4Addr;
use tracing::{debug, info, instrument, warn};

use crate::errors::{CoreError, Result};
use crate::table::{Table, Value};

/// Country assigned when no range contains an address
pub const UNKNOWN_COUNTRY: &str = "Unknown";

/// Address used for values that cannot be read as IPv4; no real range starts at 0
pub const UNPARSEABLE_IP: u32 = 0;

pub const LOWER_BOUND_COLUMN: &str = "lower_bound_ip_address";
pub const UPPER_BOUND_COLUMN: &str = "upper_bound_ip_address";
pub const COUNTRY_COLUMN: &str = "country";

/// One inclusive address interval
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpRange {
    pub lower: u32,
    pub upper: u32,
    pub country: String,
}

impl IpRange {
    pub fn contains(&self, ip: u32) -> bool {
        self.lower <= ip && ip <= self.upper
    }
}

/// Immutable range table, sorted ascending by lower bound
#[derive(Debug, Clone)]
pub struct IpRangeTable {
    ranges: Vec<IpRange>,
}

impl IpRangeTable {
    /// Sort and validate a set of ranges
    pub fn new(mut ranges: Vec<IpRange>) -> Result<Self> {
        if let Some(bad) = ranges.iter().find(|r| r.lower > r.upper) {
            return Err(CoreError::Configuration(format!(
                "ip range for '{}' has lower bound {} above upper bound {}",
                bad.country, bad.lower, bad.upper
            )));
        }

        ranges.sort_by_key(|r| (r.lower, r.upper));

        let overlaps = ranges
            .windows(2)
            .filter(|pair| pair[1].lower <= pair[0].upper)
            .count();
        if overlaps > 0 {
            warn!("IP range table has {} overlapping intervals", overlaps);
        }

        Ok(Self { ranges })
    }

    /// Build from a table with lower bound, upper bound and country columns
    pub fn from_table(table: &Table) -> Result<Self> {
        let lower_idx = table.column_index(LOWER_BOUND_COLUMN)?;
        let upper_idx = table.column_index(UPPER_BOUND_COLUMN)?;
        let country_idx = table.column_index(COUNTRY_COLUMN)?;

        let mut ranges = Vec::with_capacity(table.len());
        let mut bad_lower = Vec::new();
        let mut bad_upper = Vec::new();

        for (row_idx, row) in table.rows().iter().enumerate() {
            let lower = numeric_ip(&row[lower_idx]);
            let upper = numeric_ip(&row[upper_idx]);
            if lower.is_none() {
                bad_lower.push(row_idx);
            }
            if upper.is_none() {
                bad_upper.push(row_idx);
            }
            if let (Some(lower), Some(upper)) = (lower, upper) {
                let country = match &row[country_idx] {
                    Value::Null => UNKNOWN_COUNTRY.to_string(),
                    other => other.render(),
                };
                ranges.push(IpRange {
                    lower,
                    upper,
                    country,
                });
            }
        }

        if !bad_lower.is_empty() {
            return Err(CoreError::parse(LOWER_BOUND_COLUMN, bad_lower));
        }
        if !bad_upper.is_empty() {
            return Err(CoreError::parse(UPPER_BOUND_COLUMN, bad_upper));
        }

        Self::new(ranges)
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn ranges(&self) -> &[IpRange] {
        &self.ranges
    }

    /// Range with the greatest lower bound not above `ip`, if any
    pub fn asof_match(&self, ip: u32) -> Option<&IpRange> {
        let pos = self.ranges.partition_point(|r| r.lower <= ip);
        pos.checked_sub(1).map(|i| &self.ranges[i])
    }

    /// Country whose interval contains `ip`
    ///
    /// The as-of match alone over-matches addresses in gaps between ranges, so
    /// the upper bound is always checked.
    pub fn lookup(&self, ip: u32) -> Option<&str> {
        self.asof_match(ip)
            .filter(|r| ip <= r.upper)
            .map(|r| r.country.as_str())
    }
}

/// Read an address written as a plain number (integer or float text)
fn numeric_ip(value: &Value) -> Option<u32> {
    let v = match value {
        Value::Int(v) => *v as f64,
        Value::Float(v) => *v,
        Value::Text(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if v.is_finite() && v >= 0.0 && v < 4_294_967_296.0 {
        Some(v.trunc() as u32)
    } else {
        None
    }
}

/// Convert an address cell to its 32-bit integer form
///
/// Accepts dotted-quad text or an integer/float in the IPv4 range (fractions
/// are truncated). Anything else maps to `UNPARSEABLE_IP`.
pub fn ip_to_int(value: &Value) -> u32 {
    if let Value::Text(s) = value {
        if let Ok(addr) = s.trim().parse::<Ipv4Addr>() {
            return u32::from(addr);
        }
    }
    numeric_ip(value).unwrap_or(UNPARSEABLE_IP)
}

/// Attach a country to every transaction
///
/// Rewrites `ip_column` as integers and appends `country`. Output rows keep
/// their input order. A missing range table is a configuration error.
#[instrument(skip(transactions, ranges), fields(rows = transactions.len()))]
pub fn resolve(
    transactions: Table,
    ranges: Option<&IpRangeTable>,
    ip_column: &str,
) -> Result<Table> {
    let ranges = ranges.ok_or_else(|| {
        CoreError::Configuration("geolocation requested but no IP range table was loaded".into())
    })?;
    let ip_idx = transactions.column_index(ip_column)?;

    let mut unparseable = 0usize;
    let mut unmatched = 0usize;
    let mut countries = Vec::with_capacity(transactions.len());
    let mut addresses = Vec::with_capacity(transactions.len());

    for row in transactions.rows() {
        let ip = ip_to_int(&row[ip_idx]);
        if ip == UNPARSEABLE_IP {
            unparseable += 1;
        }
        let country = match ranges.lookup(ip) {
            Some(c) => c.to_string(),
            None => {
                unmatched += 1;
                UNKNOWN_COUNTRY.to_string()
            }
        };
        addresses.push(Value::Int(i64::from(ip)));
        countries.push(Value::Text(country));
    }

    if unparseable > 0 {
        debug!("{} addresses could not be parsed and were set to 0", unparseable);
    }
    info!(
        "Resolved {} of {} addresses against {} ranges ({} unknown)",
        transactions.len() - unmatched,
        transactions.len(),
        ranges.len(),
        unmatched
    );

    transactions
        .with_column(ip_column, addresses)?
        .with_column(COUNTRY_COLUMN, countries)
}
