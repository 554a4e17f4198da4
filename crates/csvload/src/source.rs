//! Row sources
//!
//! A row source yields raw records in file order. The first record is the
//! header; `Ok(None)` signals end of input.

use async_trait::async_trait;
use csv_async::{AsyncReader, AsyncReaderBuilder, StringRecord};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncRead;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Failed to open '{path}': {source}. Verify the file exists and is readable.")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Decoding failed for the record at this 1-based position (header is 1)
    #[error("Failed to read record {record}: {source}")]
    Read {
        record: u64,
        #[source]
        source: csv_async::Error,
    },

    #[error("{0}")]
    Other(String),
}

/// Sequential supplier of raw field sequences
#[async_trait]
pub trait RowSource: Send {
    async fn next_record(&mut self) -> Result<Option<Vec<String>>, SourceError>;
}

/// Delimited-text source backed by `csv-async`.
///
/// The reader is flexible: records with a different field count than the
/// header are passed through so the reorderer can reject them one by one.
pub struct CsvRowSource<R> {
    reader: AsyncReader<R>,
    record: StringRecord,
    records_read: u64,
}

impl CsvRowSource<tokio::fs::File> {
    pub async fn open(path: impl AsRef<Path>, delimiter: u8) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|source| SourceError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self::from_reader(file, delimiter))
    }
}

impl<R> CsvRowSource<R>
where
    R: AsyncRead + Unpin + Send,
{
    pub fn from_reader(reader: R, delimiter: u8) -> Self {
        let reader = AsyncReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(delimiter)
            .create_reader(reader);

        Self {
            reader,
            record: StringRecord::new(),
            records_read: 0,
        }
    }

    pub fn records_read(&self) -> u64 {
        self.records_read
    }
}

#[async_trait]
impl<R> RowSource for CsvRowSource<R>
where
    R: AsyncRead + Unpin + Send,
{
    async fn next_record(&mut self) -> Result<Option<Vec<String>>, SourceError> {
        let more = self
            .reader
            .read_record(&mut self.record)
            .await
            .map_err(|source| SourceError::Read {
                record: self.records_read + 1,
                source,
            })?;

        if !more {
            return Ok(None);
        }

        self.records_read += 1;
        Ok(Some(self.record.iter().map(str::to_string).collect()))
    }
}

/// In-memory source, handy for wiring a pipeline without a file
#[derive(Debug, Default, Clone)]
pub struct VecRowSource {
    records: VecDeque<Vec<String>>,
}

impl VecRowSource {
    pub fn new(records: Vec<Vec<String>>) -> Self {
        Self {
            records: records.into(),
        }
    }
}

impl<I, S> FromIterator<I> for VecRowSource
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = I>>(iter: T) -> Self {
        Self::new(
            iter.into_iter()
                .map(|record| record.into_iter().map(Into::into).collect())
                .collect(),
        )
    }
}

#[async_trait]
impl RowSource for VecRowSource {
    async fn next_record(&mut self) -> Result<Option<Vec<String>>, SourceError> {
        Ok(self.records.pop_front())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    async fn drain<S: RowSource>(source: &mut S) -> Vec<Vec<String>> {
        let mut out = Vec::new();
        while let Some(record) = source.next_record().await.unwrap() {
            out.push(record);
        }
        out
    }

    #[tokio::test]
    async fn test_csv_source_yields_header_first() {
        let data = "GlobalRank,Domain\n1,google.com\n2,\"facebook, inc.com\"\n";
        let mut source = CsvRowSource::from_reader(data.as_bytes(), b',');

        let records = drain(&mut source).await;
        assert_eq!(records.len(), 3);
        assert_eq!(records[0], vec!["GlobalRank", "Domain"]);
        assert_eq!(records[2], vec!["2", "facebook, inc.com"]);
        assert_eq!(source.records_read(), 3);
    }

    #[tokio::test]
    async fn test_csv_source_passes_short_records_through() {
        let data = "id,name,tld\n1,a,com\n2,b\n";
        let mut source = CsvRowSource::from_reader(data.as_bytes(), b',');

        let records = drain(&mut source).await;
        assert_eq!(records[2], vec!["2", "b"]);
    }

    #[tokio::test]
    async fn test_csv_source_custom_delimiter() {
        let data = "id;name\n7;x,y\n";
        let mut source = CsvRowSource::from_reader(data.as_bytes(), b';');

        let records = drain(&mut source).await;
        assert_eq!(records[1], vec!["7", "x,y"]);
    }

    #[tokio::test]
    async fn test_csv_source_empty_input() {
        let mut source = CsvRowSource::from_reader(&b""[..], b',');
        assert!(source.next_record().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_open_missing_file() {
        let result = CsvRowSource::open("/definitely/not/here.csv", b',').await;
        assert!(matches!(result, Err(SourceError::Open { .. })));
    }

    #[tokio::test]
    async fn test_vec_source_from_iter() {
        let mut source: VecRowSource = vec![vec!["id"], vec!["1"]].into_iter().collect();
        assert_eq!(drain(&mut source).await, vec![vec!["id"], vec!["1"]]);
    }
}
