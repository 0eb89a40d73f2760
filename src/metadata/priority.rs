//! Source priority tables.
//!
//! Duplicate datapoints are resolved by preferring better sources. The
//! preference is an explicit rank per value, built once from the metadata
//! table's row order and injected into the deduplicator.

use arrow::record_batch::RecordBatch;
use rustc_hash::FxHashMap;

use crate::error::{EtlError, Result};
use crate::metadata::MetadataSource;
use crate::schema::Provenance;
use crate::utils::arrow::string_column;

/// Sort key of a provenance value under a [`SourcePriority`]
///
/// Variant order is the priority order: ranked values first, then values the
/// metadata table does not list (lexically, so the order stays total), then
/// missing values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PriorityKey<'a> {
    Known(usize),
    Unknown(&'a str),
    Missing,
}

/// Rank of each value of one provenance column, 0 being the best
#[derive(Debug, Clone, Default)]
pub struct SourcePriority {
    ranks: FxHashMap<String, usize>,
}

impl SourcePriority {
    /// Build from values ordered best first; repeated values keep their first rank
    pub fn from_values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ranks = FxHashMap::default();
        for value in values {
            let next = ranks.len();
            ranks.entry(value.into()).or_insert(next);
        }
        Self { ranks }
    }

    /// Build from a metadata table, reading `column` in row order
    ///
    /// # Errors
    /// Returns a `Metadata` error when the column is absent.
    pub fn from_table(batch: &RecordBatch, column: &str) -> Result<Self> {
        let values = string_column(batch, column)?.ok_or_else(|| {
            EtlError::Metadata(format!("priority table has no '{column}' column"))
        })?;
        Ok(Self::from_values(values.iter().flatten()))
    }

    #[must_use]
    pub fn rank(&self, value: &str) -> Option<usize> {
        self.ranks.get(value).copied()
    }

    #[must_use]
    pub fn key<'a>(&self, value: Option<&'a str>) -> PriorityKey<'a> {
        match value {
            None => PriorityKey::Missing,
            Some(v) => self
                .rank(v)
                .map_or(PriorityKey::Unknown(v), PriorityKey::Known),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ranks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }
}

/// Priority tables for both ordered provenance columns
#[derive(Debug, Clone, Default)]
pub struct SourcePriorities {
    pub source: SourcePriority,
    pub note_source: SourcePriority,
}

impl SourcePriorities {
    /// Load both tables from the metadata collaborator
    pub fn load(metadata: &dyn MetadataSource) -> Result<Self> {
        let load = |p: Provenance| -> Result<SourcePriority> {
            let table = metadata.load_table(p.as_str())?;
            SourcePriority::from_table(&table, p.as_str())
        };
        Ok(Self {
            source: load(Provenance::Source)?,
            note_source: load(Provenance::NoteSource)?,
        })
    }
}
