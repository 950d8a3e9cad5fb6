// Copyright 2021-2024 SecureDNA Stiftung (SecureDNA Foundation) <licensing@securedna.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-only access to the database that fixture identifiers are drawn from.

use std::path::{Path, PathBuf};

pub use rusqlite;
use rusqlite::{
    types::{FromSql, FromSqlError, FromSqlResult, ValueRef},
    OpenFlags,
};
pub use tokio_rusqlite::{self, Connection};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    #[error("couldn't open fixture db at {0:?}: {1}")]
    Initializing(PathBuf, #[source] tokio_rusqlite::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("refusing to run a statement that writes to the fixture db: {0}")]
    NotReadOnly(String),
    #[error("statement returned no columns: {0}")]
    NoColumns(String),
    #[error(transparent)]
    Query(#[from] tokio_rusqlite::Error),
}

/// Open the database at `path` without write access. The file must exist.
pub async fn open_db(path: impl AsRef<Path>) -> Result<Connection, OpenError> {
    let path = path.as_ref();

    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .await
    .map_err(|e| OpenError::Initializing(path.to_owned(), e))?;

    // fail here rather than on the first query if the file isn't a database
    conn.call(|sync_conn| {
        sync_conn.query_row("SELECT count(*) FROM sqlite_master", [], |_| Ok(()))?;
        Ok(())
    })
    .await
    .map_err(|e| OpenError::Initializing(path.to_owned(), e))?;

    Ok(conn)
}

/// Wrapper that implements FromSql for any column that has a sensible string form:
/// text as-is, integers and reals in decimal, blobs as utf-8. NULL is rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlString(pub String);

impl FromSql for SqlString {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Text(text) | ValueRef::Blob(text) => std::str::from_utf8(text)
                .map(|s| SqlString(s.to_owned()))
                .map_err(|e| FromSqlError::Other(e.into())),
            ValueRef::Integer(i) => Ok(SqlString(i.to_string())),
            ValueRef::Real(f) => Ok(SqlString(f.to_string())),
            ValueRef::Null => Err(FromSqlError::InvalidType),
        }
    }
}

impl From<SqlString> for String {
    fn from(value: SqlString) -> Self {
        value.0
    }
}

/// Run `statement` with positional string `params` and return the first column of every row,
/// in the order the statement yields them.
pub async fn select_strings(
    conn: &Connection,
    statement: String,
    params: Vec<String>,
) -> Result<Vec<String>, StoreError> {
    debug!("fixture_store: running {statement:?} with {params:?}");

    let result = conn
        .call(move |conn| {
            let mut stmt = conn.prepare(&statement)?;
            if !stmt.readonly() {
                return Ok(Err(StoreError::NotReadOnly(statement)));
            }
            if stmt.column_count() == 0 {
                return Ok(Err(StoreError::NoColumns(statement)));
            }
            let rows = stmt
                .query_map(rusqlite::params_from_iter(params.iter()), |row| {
                    row.get::<_, SqlString>(0)
                })?
                .map(|r| r.map(String::from))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Ok(rows))
        })
        .await??;

    Ok(result)
}
