//! # Units Module
//!
//! Maps declared unit names to ground-motion kinds and SI scale factors.
//!
//! The table is built once per process with [`UnitTable::standard`] and
//! passed explicitly to the cascade. Lookups are case-insensitive and use a
//! `BTreeMap` so iteration order is deterministic.

use crate::error::{ResponseError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ground-motion representation, ordered by time derivative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroundMotion {
    Displacement,
    Velocity,
    Acceleration,
}

impl GroundMotion {
    /// Number of time derivatives relative to displacement.
    #[must_use]
    pub fn order(self) -> i32 {
        match self {
            Self::Displacement => 0,
            Self::Velocity => 1,
            Self::Acceleration => 2,
        }
    }
}

impl std::str::FromStr for GroundMotion {
    type Err = ResponseError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "dis" | "displacement" => Ok(Self::Displacement),
            "vel" | "velocity" => Ok(Self::Velocity),
            "acc" | "acceleration" => Ok(Self::Acceleration),
            other => Err(ResponseError::UnitConversion(format!(
                "unknown ground motion '{other}'"
            ))),
        }
    }
}

/// Physical quantity measured by a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    Motion(GroundMotion),
    Pressure,
    Voltage,
    Counts,
    Other,
}

/// Kind of a unit and the factor converting one of it into SI.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnitInfo {
    /// What the unit measures.
    pub kind: UnitKind,
    /// Value of one unit in SI (e.g. NM -> 1e-9).
    pub scale_to_si: f64,
}

/// Immutable unit-name lookup table.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitTable {
    entries: BTreeMap<String, UnitInfo>,
}

impl UnitTable {
    /// Units seen in seismic metadata.
    #[must_use]
    pub fn standard() -> Self {
        use GroundMotion::{Acceleration, Displacement, Velocity};

        let lengths = [("M", 1.0), ("CM", 1e-2), ("MM", 1e-3), ("UM", 1e-6), ("NM", 1e-9)];
        let mut entries = BTreeMap::new();
        for (name, scale) in lengths {
            let motion = |kind| UnitInfo {
                kind: UnitKind::Motion(kind),
                scale_to_si: scale,
            };
            entries.insert(name.to_string(), motion(Displacement));
            entries.insert(format!("{name}/S"), motion(Velocity));
            for suffix in ["/S**2", "/S/S", "/S2", "/S^2"] {
                entries.insert(format!("{name}{suffix}"), motion(Acceleration));
            }
        }
        for (name, scale) in [("PA", 1.0), ("HPA", 1e2), ("KPA", 1e3), ("MBAR", 1e2)] {
            entries.insert(
                name.to_string(),
                UnitInfo {
                    kind: UnitKind::Pressure,
                    scale_to_si: scale,
                },
            );
        }
        for (name, scale) in [("V", 1.0), ("MV", 1e-3), ("UV", 1e-6)] {
            entries.insert(
                name.to_string(),
                UnitInfo {
                    kind: UnitKind::Voltage,
                    scale_to_si: scale,
                },
            );
        }
        for name in ["COUNTS", "COUNT"] {
            entries.insert(
                name.to_string(),
                UnitInfo {
                    kind: UnitKind::Counts,
                    scale_to_si: 1.0,
                },
            );
        }
        Self { entries }
    }

    /// Look up a unit by name; unknown names are `Other` with unit scale.
    #[must_use]
    pub fn lookup(&self, name: &str) -> UnitInfo {
        self.entries
            .get(name.trim().to_ascii_uppercase().as_str())
            .copied()
            .unwrap_or(UnitInfo {
                kind: UnitKind::Other,
                scale_to_si: 1.0,
            })
    }

    /// Number of known unit names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True for a table with no units.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A planned `(jω)^order · scale` output-unit transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitConversion {
    /// Power of jω; negative integrates.
    pub order: i32,
    /// Real factor applied with it.
    pub scale: f64,
}

impl UnitConversion {
    /// No transform.
    pub const IDENTITY: Self = Self {
        order: 0,
        scale: 1.0,
    };
}

/// Derive the transform that re-expresses a response measured against
/// `input_units` as one measured against SI `target` ground motion.
///
/// A velocity response becomes a displacement response by multiplying with
/// `jω`, so the order is `order(input) - order(target)`. The SI scale
/// divides out the input unit's prefix (a response per nm/s is 1e9 times a
/// response per m/s).
pub fn derivative_order(
    table: &UnitTable,
    input_units: &str,
    target: GroundMotion,
) -> Result<UnitConversion> {
    let info = table.lookup(input_units);
    match info.kind {
        UnitKind::Motion(input) => Ok(UnitConversion {
            order: input.order() - target.order(),
            scale: 1.0 / info.scale_to_si,
        }),
        _ => Err(ResponseError::UnitConversion(format!(
            "input units '{input_units}' are not ground motion"
        ))),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        let table = UnitTable::standard();
        assert_eq!(
            table.lookup("m/s").kind,
            UnitKind::Motion(GroundMotion::Velocity)
        );
        assert_eq!(
            table.lookup(" M/S**2 ").kind,
            UnitKind::Motion(GroundMotion::Acceleration)
        );
        assert_eq!(table.lookup("Pa").kind, UnitKind::Pressure);
        assert_eq!(table.lookup("furlongs").kind, UnitKind::Other);
    }

    #[test]
    fn orders_between_representations() {
        let table = UnitTable::standard();
        let c = derivative_order(&table, "M/S", GroundMotion::Displacement).unwrap();
        assert_eq!(c.order, 1);
        let c = derivative_order(&table, "M/S", GroundMotion::Acceleration).unwrap();
        assert_eq!(c.order, -1);
        let c = derivative_order(&table, "M", GroundMotion::Acceleration).unwrap();
        assert_eq!(c.order, -2);
        let c = derivative_order(&table, "M/S/S", GroundMotion::Displacement).unwrap();
        assert_eq!(c.order, 2);
    }

    #[test]
    fn prefix_scale_is_divided_out() {
        let table = UnitTable::standard();
        let c = derivative_order(&table, "NM/S", GroundMotion::Velocity).unwrap();
        assert_eq!(c.order, 0);
        assert!((c.scale - 1e9).abs() < 1e-3);
    }

    #[test]
    fn non_motion_input_is_rejected() {
        let table = UnitTable::standard();
        assert!(derivative_order(&table, "PA", GroundMotion::Velocity).is_err());
        assert!(derivative_order(&table, "V", GroundMotion::Velocity).is_err());
    }

    #[test]
    fn ground_motion_parses_short_names() {
        assert_eq!("dis".parse::<GroundMotion>().unwrap(), GroundMotion::Displacement);
        assert_eq!("ACC".parse::<GroundMotion>().unwrap(), GroundMotion::Acceleration);
        assert!("def".parse::<GroundMotion>().is_err());
    }
}
