//! Unit-to-point conversion for quota accounting.
//!
//! Every billable feature reports consumption in its natural unit (seconds
//! of audio, characters of text, images). The ledger only ever stores
//! normalized quota points, converted through a fixed table before any
//! charge is written.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// Natural unit a feature reports its consumption in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    Seconds,
    Minutes,
    Characters,
    Images,
}

impl UnitKind {
    /// Points per unit.
    fn factor(&self) -> f64 {
        match self {
            UnitKind::Seconds => 1.0,
            UnitKind::Minutes => 60.0,
            UnitKind::Characters => 0.1,
            UnitKind::Images => 10.0,
        }
    }

    /// Converts a unit count into normalized quota points.
    ///
    /// Fractional results round to the nearest point.
    pub fn to_points(&self, unit_count: f64) -> i64 {
        (unit_count * self.factor()).round() as i64
    }

    /// Returns the string representation used in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitKind::Seconds => "seconds",
            UnitKind::Minutes => "minutes",
            UnitKind::Characters => "characters",
            UnitKind::Images => "images",
        }
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for UnitKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "seconds" => Ok(UnitKind::Seconds),
            "minutes" => Ok(UnitKind::Minutes),
            "characters" => Ok(UnitKind::Characters),
            "images" => Ok(UnitKind::Images),
            other => Err(ValidationError::invalid_value(
                "unit_kind",
                format!("unknown unit '{}'", other),
            )),
        }
    }
}
