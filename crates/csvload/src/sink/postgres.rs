//! PostgreSQL sink
//!
//! Every value from the file is bound as text. When the target table's
//! column types are known, each placeholder carries an explicit cast
//! (`$1::int4`) so PostgreSQL converts the text on the way in.

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::{Postgres, Transaction};
use std::collections::HashMap;

use super::{RowSink, SinkError, SinkTransaction};

#[derive(Debug, Clone)]
pub struct PgRowSink {
    pool: PgPool,
    column_types: HashMap<String, String>,
}

impl PgRowSink {
    /// Sink for `table` (optionally `schema.table`), with column types read
    /// from `information_schema`. Fails if the table does not exist.
    pub async fn for_table(pool: PgPool, table: &str) -> Result<Self, SinkError> {
        let lowered = table.to_lowercase();
        let (schema, name) = match lowered.split_once('.') {
            Some((schema, name)) => (Some(schema), name),
            None => (None, lowered.as_str()),
        };

        let rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT column_name::text, udt_name::text
            FROM information_schema.columns
            WHERE table_name = $1
              AND table_schema = COALESCE($2, current_schema())
            ORDER BY ordinal_position
            "#,
        )
        .bind(name)
        .bind(schema)
        .fetch_all(&pool)
        .await?;

        if rows.is_empty() {
            return Err(SinkError::UnknownTable(table.to_string()));
        }

        tracing::debug!(table, columns = rows.len(), "Loaded target column types");

        Ok(Self {
            pool,
            column_types: rows.into_iter().collect(),
        })
    }
}

#[async_trait]
impl RowSink for PgRowSink {
    type Transaction = Transaction<'static, Postgres>;

    async fn begin(&self) -> Result<Self::Transaction, SinkError> {
        Ok(self.pool.begin().await?)
    }

    fn placeholder(&self, position: usize, column: &str) -> String {
        match self.column_types.get(&column.to_lowercase()) {
            Some(udt) => format!("${}::{}", position, udt),
            None => format!("${}", position),
        }
    }
}

#[async_trait]
impl SinkTransaction for Transaction<'static, Postgres> {
    async fn execute(&mut self, statement: &str, values: &[String]) -> Result<(), SinkError> {
        let mut query = sqlx::query(statement);
        for value in values {
            query = query.bind(value.as_str());
        }
        query.execute(&mut **self).await?;
        Ok(())
    }

    async fn commit(self) -> Result<(), SinkError> {
        Transaction::commit(self).await?;
        Ok(())
    }
}
