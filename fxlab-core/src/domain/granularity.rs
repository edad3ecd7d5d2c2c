//! Candle granularity codes and bar-length parsing.
//!
//! Historical data is requested with broker granularity codes (`S5`, `M1`,
//! `H4`, `D`); live bar lengths are written as human durations (`30s`,
//! `1min`, `5m`). Both resolve to a fixed `chrono::Duration`.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GranularityError {
    #[error("unknown granularity '{0}'")]
    Unknown(String),

    #[error("bar length must be positive: '{0}'")]
    NonPositive(String),
}

/// Fixed-length candle granularities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Granularity {
    S5,
    S10,
    S15,
    S30,
    M1,
    M2,
    M5,
    M10,
    M15,
    M30,
    H1,
    H2,
    H4,
    H6,
    H8,
    H12,
    D,
}

impl Granularity {
    pub const ALL: [Granularity; 17] = [
        Granularity::S5,
        Granularity::S10,
        Granularity::S15,
        Granularity::S30,
        Granularity::M1,
        Granularity::M2,
        Granularity::M5,
        Granularity::M10,
        Granularity::M15,
        Granularity::M30,
        Granularity::H1,
        Granularity::H2,
        Granularity::H4,
        Granularity::H6,
        Granularity::H8,
        Granularity::H12,
        Granularity::D,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Granularity::S5 => "S5",
            Granularity::S10 => "S10",
            Granularity::S15 => "S15",
            Granularity::S30 => "S30",
            Granularity::M1 => "M1",
            Granularity::M2 => "M2",
            Granularity::M5 => "M5",
            Granularity::M10 => "M10",
            Granularity::M15 => "M15",
            Granularity::M30 => "M30",
            Granularity::H1 => "H1",
            Granularity::H2 => "H2",
            Granularity::H4 => "H4",
            Granularity::H6 => "H6",
            Granularity::H8 => "H8",
            Granularity::H12 => "H12",
            Granularity::D => "D",
        }
    }

    pub fn duration(self) -> Duration {
        match self {
            Granularity::S5 => Duration::seconds(5),
            Granularity::S10 => Duration::seconds(10),
            Granularity::S15 => Duration::seconds(15),
            Granularity::S30 => Duration::seconds(30),
            Granularity::M1 => Duration::minutes(1),
            Granularity::M2 => Duration::minutes(2),
            Granularity::M5 => Duration::minutes(5),
            Granularity::M10 => Duration::minutes(10),
            Granularity::M15 => Duration::minutes(15),
            Granularity::M30 => Duration::minutes(30),
            Granularity::H1 => Duration::hours(1),
            Granularity::H2 => Duration::hours(2),
            Granularity::H4 => Duration::hours(4),
            Granularity::H6 => Duration::hours(6),
            Granularity::H8 => Duration::hours(8),
            Granularity::H12 => Duration::hours(12),
            Granularity::D => Duration::days(1),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = GranularityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_uppercase();
        Granularity::ALL
            .iter()
            .copied()
            .find(|g| g.as_str() == code)
            .ok_or_else(|| GranularityError::Unknown(s.to_string()))
    }
}

impl TryFrom<String> for Granularity {
    type Error = GranularityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Granularity> for String {
    fn from(value: Granularity) -> Self {
        value.as_str().to_string()
    }
}

/// Parse a bar length: either a granularity code or `<n><unit>` with unit
/// one of `s`, `sec`, `m`, `min`, `h`, `d`.
pub fn parse_bar_length(raw: &str) -> Result<Duration, GranularityError> {
    let s = raw.trim();
    if let Ok(g) = s.parse::<Granularity>() {
        return Ok(g.duration());
    }

    let split = s
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| GranularityError::Unknown(raw.to_string()))?;
    let (digits, unit) = s.split_at(split);
    let value: i64 = digits
        .parse()
        .map_err(|_| GranularityError::Unknown(raw.to_string()))?;
    if value <= 0 {
        return Err(GranularityError::NonPositive(raw.to_string()));
    }

    let duration = match unit.trim().to_ascii_lowercase().as_str() {
        "s" | "sec" | "secs" => Duration::seconds(value),
        "m" | "min" | "mins" => Duration::minutes(value),
        "h" | "hr" | "hour" | "hours" => Duration::hours(value),
        "d" | "day" | "days" => Duration::days(value),
        _ => return Err(GranularityError::Unknown(raw.to_string())),
    };
    Ok(duration)
}
