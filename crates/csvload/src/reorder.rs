//! Field reordering
//!
//! Maps raw records from file column order into header order. The mapping is
//! resolved once per run by looking every header column up by name among the
//! source columns, so a file whose columns drift from the expected order is
//! still loaded correctly.

use std::sync::Arc;
use thiserror::Error;

use crate::header::Header;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReorderError {
    #[error("column '{column}' is not present in the source columns")]
    UnknownColumn { column: String },

    #[error("record {seq} has {len} fields, column '{column}' needs field {position}")]
    MissingField {
        seq: u64,
        column: String,
        position: usize,
        len: usize,
    },
}

/// One record's values in header order, queued for insertion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    seq: u64,
    values: Vec<String>,
}

impl Job {
    pub fn new(seq: u64, values: Vec<String>) -> Self {
        Self { seq, values }
    }

    /// 1-based position of the record among the data records of the input
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }
}

/// Header position -> source position, resolved by name
#[derive(Debug, Clone)]
pub struct FieldMap {
    header: Arc<Header>,
    positions: Vec<usize>,
    identity: bool,
}

impl FieldMap {
    pub fn resolve(header: Arc<Header>, source_columns: &[String]) -> Result<Self, ReorderError> {
        let positions = header
            .columns()
            .iter()
            .map(|column| {
                source_columns
                    .iter()
                    .position(|source| source == column)
                    .ok_or_else(|| ReorderError::UnknownColumn {
                        column: column.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let identity = positions.iter().enumerate().all(|(i, &p)| i == p);

        Ok(Self {
            header,
            positions,
            identity,
        })
    }

    /// True when every header column sits at the same position in the source
    pub fn is_identity(&self) -> bool {
        self.identity
    }

    /// Build the job for data record `seq`.
    ///
    /// Fails if the record is too short to hold a mapped column. Extra
    /// trailing fields are ignored.
    pub fn reorder(&self, seq: u64, mut record: Vec<String>) -> Result<Job, ReorderError> {
        if let Some((i, &position)) = self
            .positions
            .iter()
            .enumerate()
            .find(|(_, &position)| position >= record.len())
        {
            return Err(ReorderError::MissingField {
                seq,
                column: self.header.columns()[i].clone(),
                position,
                len: record.len(),
            });
        }

        if self.identity {
            record.truncate(self.positions.len());
            return Ok(Job::new(seq, record));
        }

        let values = self
            .positions
            .iter()
            .map(|&position| std::mem::take(&mut record[position]))
            .collect();

        Ok(Job::new(seq, values))
    }
}
