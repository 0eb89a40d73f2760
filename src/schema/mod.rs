//! Column vocabulary and per-indicator schema descriptors.
//!
//! Raw indicator tables draw their columns from a fixed vocabulary. Which of
//! them are present varies per indicator, so every transformed table carries
//! a [`DatapointSchema`] naming its measure and the ordered key dimensions it
//! actually has.

pub mod projection;
pub mod validate;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::EtlError;

pub use projection::project_datapoint_columns;
pub use validate::{survey_columns, validate_columns};

/// Columns permitted to appear in any raw source table
pub const PERMITTED_COLUMNS: [&str; 13] = [
    "classif1",
    "classif2",
    "collection",
    "indicator",
    "note_classif",
    "note_indicator",
    "note_source",
    "obs_status",
    "obs_value",
    "ref_area",
    "sex",
    "source",
    "time",
];

/// Columns relevant to a datapoint record, in output order
pub const DATAPOINT_COLUMNS: [&str; 7] = [
    "indicator",
    "ref_area",
    "sex",
    "classif1",
    "classif2",
    "time",
    "obs_value",
];

pub const INDICATOR_COLUMN: &str = "indicator";
pub const OBS_VALUE_COLUMN: &str = "obs_value";

/// A key dimension of a datapoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    RefArea,
    Sex,
    Classif1,
    Classif2,
    Time,
}

impl Dimension {
    pub const ALL: [Self; 5] = [
        Self::RefArea,
        Self::Sex,
        Self::Classif1,
        Self::Classif2,
        Self::Time,
    ];

    /// Column name of this dimension
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RefArea => "ref_area",
            Self::Sex => "sex",
            Self::Classif1 => "classif1",
            Self::Classif2 => "classif2",
            Self::Time => "time",
        }
    }

    /// Whether values of this dimension are normalized to identifier form
    #[must_use]
    pub const fn is_identifier(self) -> bool {
        !matches!(self, Self::Time)
    }

    /// Whether rows missing this dimension are dropped before deduplication
    #[must_use]
    pub const fn is_mandatory_classification(self) -> bool {
        matches!(self, Self::Classif1 | Self::Classif2)
    }

    #[must_use]
    pub fn from_column(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.as_str() == name)
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dimension {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_column(s)
            .ok_or_else(|| EtlError::Config(format!("'{s}' is not a datapoint dimension")))
    }
}

/// Data-quality columns used only to resolve duplicate datapoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provenance {
    Source,
    NoteSource,
    NoteClassif,
    NoteIndicator,
}

impl Provenance {
    /// Provenance columns in the order they are appended by the projector
    pub const ALL: [Self; 4] = [
        Self::Source,
        Self::NoteSource,
        Self::NoteClassif,
        Self::NoteIndicator,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::NoteSource => "note_source",
            Self::NoteClassif => "note_classif",
            Self::NoteIndicator => "note_indicator",
        }
    }

    #[must_use]
    pub fn from_column(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == name)
    }
}

/// Per-indicator schema: the measure and the ordered key dimensions present
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatapointSchema {
    /// Measure column name in identifier form
    pub measure: String,
    /// Key columns, in table column order
    pub by: SmallVec<[Dimension; 5]>,
    /// Provenance columns still attached to the table
    pub provenance: SmallVec<[Provenance; 4]>,
}

impl DatapointSchema {
    #[must_use]
    pub fn has_dimension(&self, dim: Dimension) -> bool {
        self.by.contains(&dim)
    }

    #[must_use]
    pub fn has_provenance(&self, p: Provenance) -> bool {
        self.provenance.contains(&p)
    }

    /// Key column names in order
    #[must_use]
    pub fn key_columns(&self) -> Vec<&'static str> {
        self.by.iter().map(|d| d.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_round_trip_names() {
        for dim in Dimension::ALL {
            assert_eq!(Dimension::from_column(dim.as_str()), Some(dim));
        }
        assert_eq!("ref_area".parse::<Dimension>().unwrap(), Dimension::RefArea);
        assert!("source".parse::<Dimension>().is_err());
    }

    #[test]
    fn test_identifier_dimensions() {
        assert!(Dimension::Sex.is_identifier());
        assert!(!Dimension::Time.is_identifier());
        assert!(Dimension::Classif2.is_mandatory_classification());
        assert!(!Dimension::RefArea.is_mandatory_classification());
    }
}
