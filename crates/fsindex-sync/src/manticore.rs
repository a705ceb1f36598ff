//! Manticore Search backend.
//!
//! Talks SQL over the HTTP `/sql?mode=raw` endpoint. Every write is applied
//! before the response returns, so acknowledgements are always
//! [`WriteAck::Completed`].

use crate::{BatchSyncClient, SyncError, TaskId, TaskOutcome, WriteAck};
use async_trait::async_trait;
use fsindex_indexer::{FileRecord, ScanId};
use serde_json::Value;
use std::fmt::Write as _;
use std::time::Duration;
use tracing::{debug, error};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const COLUMNS: &str = "id,root,path,basename,ext,dirpath,size,mtime,uid,gid,mode,seen_at";

/// Connection settings for a Manticore server.
#[derive(Debug, Clone)]
pub struct ManticoreOptions {
    /// Base URL, e.g. `http://manticore:9308`. A trailing `/sql` or query
    /// string is tolerated.
    pub url: String,
    /// Table name
    pub index: String,
    /// Timeout for schema and upsert calls
    pub request_timeout: Duration,
    /// Timeout for the deletion sweep, which may touch many rows
    pub sweep_timeout: Duration,
}

impl Default for ManticoreOptions {
    fn default() -> Self {
        Self {
            url: "http://manticore:9308".to_string(),
            index: "files".to_string(),
            request_timeout: Duration::from_secs(120),
            sweep_timeout: Duration::from_secs(600),
        }
    }
}

/// Batch sync client for Manticore Search.
pub struct ManticoreClient {
    http: reqwest::Client,
    sql_url: String,
    options: ManticoreOptions,
}

impl ManticoreClient {
    /// Create a client.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built.
    pub fn new(options: ManticoreOptions) -> Result<Self, SyncError> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            sql_url: sql_endpoint(&options.url),
            options,
        })
    }

    /// Run one statement and return the first result set.
    async fn execute(&self, query: &str, timeout: Duration) -> Result<Value, SyncError> {
        debug!(sql_preview = %preview(query), "executing_sql");

        let response = self
            .http
            .post(&self.sql_url)
            .timeout(timeout)
            .form(&[("query", query)])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            error!(
                status_code = status.as_u16(),
                error_body = %body,
                sql_preview = %preview(query),
                "manticore_sql_error"
            );
            return Err(SyncError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let value: Value = serde_json::from_str(&body)?;
        let first = match value {
            Value::Array(mut sets) if !sets.is_empty() => sets.swap_remove(0),
            Value::Array(_) => Value::Null,
            other => other,
        };

        if let Some(message) = first
            .get("error")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
        {
            error!(error = %message, sql_preview = %preview(query), "manticore_sql_error");
            return Err(SyncError::Engine(message.to_string()));
        }

        Ok(first)
    }
}

#[async_trait]
impl BatchSyncClient for ManticoreClient {
    fn backend(&self) -> &'static str {
        "manticore"
    }

    async fn ensure_schema(&self) -> Result<(), SyncError> {
        self.execute(&schema_sql(&self.options.index), self.options.request_timeout)
            .await?;
        Ok(())
    }

    async fn bulk_upsert(&self, records: &[FileRecord]) -> Result<WriteAck, SyncError> {
        if records.is_empty() {
            return Ok(WriteAck::Completed { affected: Some(0) });
        }
        let result = self
            .execute(
                &replace_sql(&self.options.index, records),
                self.options.request_timeout,
            )
            .await?;
        Ok(WriteAck::Completed {
            affected: affected_rows(&result),
        })
    }

    async fn delete_where(&self, root: &str, max_seen_at: ScanId) -> Result<WriteAck, SyncError> {
        let result = self
            .execute(
                &delete_sql(&self.options.index, root, max_seen_at),
                self.options.sweep_timeout,
            )
            .await?;
        Ok(WriteAck::Completed {
            affected: affected_rows(&result),
        })
    }

    async fn wait_for_completion(
        &self,
        _task: TaskId,
        _timeout: Duration,
    ) -> Result<TaskOutcome, SyncError> {
        // Writes are synchronous; there is never anything to wait for.
        Ok(TaskOutcome::Succeeded { affected: None })
    }
}

/// Normalize a configured URL to the raw-mode SQL endpoint.
pub fn sql_endpoint(url: &str) -> String {
    let base = url.split('?').next().unwrap_or(url).trim_end_matches('/');
    let base = base.strip_suffix("/sql").unwrap_or(base);
    format!("{base}/sql?mode=raw")
}

/// Escape a value for use inside a single-quoted SQL string literal.
pub fn escape_sql_string(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\0' => {}
            '\\' => escaped.push_str("\\\\"),
            '\'' => escaped.push_str("\\'"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

pub fn schema_sql(index: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {index} (\
         id bigint, \
         root string, \
         path string indexed, \
         basename text, \
         ext string, \
         dirpath string, \
         size bigint, \
         mtime bigint, \
         uid int, \
         gid int, \
         mode int, \
         seen_at bigint\
         ) min_infix_len='2'"
    )
}

pub fn replace_sql(index: &str, records: &[FileRecord]) -> String {
    let mut sql = format!("REPLACE INTO {index} ({COLUMNS}) VALUES ");
    for (i, r) in records.iter().enumerate() {
        if i > 0 {
            sql.push(',');
        }
        // Writing into a String cannot fail.
        let _ = write!(
            sql,
            "({},'{}','{}','{}','{}','{}',{},{},{},{},{},{})",
            r.id,
            escape_sql_string(&r.root),
            escape_sql_string(&r.path),
            escape_sql_string(&r.basename),
            escape_sql_string(&r.ext),
            escape_sql_string(&r.dirpath),
            r.size,
            r.mtime,
            r.uid,
            r.gid,
            r.mode,
            r.seen_at,
        );
    }
    sql
}

pub fn delete_sql(index: &str, root: &str, max_seen_at: ScanId) -> String {
    format!(
        "DELETE FROM {index} WHERE root='{}' AND seen_at < {max_seen_at}",
        escape_sql_string(root)
    )
}

/// Affected rows from a raw-mode (`total`) or JSON-mode (`data[0].deleted`)
/// result.
fn affected_rows(result: &Value) -> Option<u64> {
    result.get("total").and_then(Value::as_u64).or_else(|| {
        result
            .get("data")
            .and_then(|d| d.get(0))
            .and_then(|row| row.get("deleted"))
            .and_then(Value::as_u64)
    })
}

fn preview(sql: &str) -> &str {
    match sql.char_indices().nth(500) {
        Some((end, _)) => &sql[..end],
        None => sql,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: u64, basename: &str) -> FileRecord {
        FileRecord {
            id,
            root: "test".to_string(),
            path: format!("/data/test/{basename}"),
            basename: basename.to_string(),
            ext: "txt".to_string(),
            dirpath: "/data/test".to_string(),
            size: 100,
            mtime: 1_000_000,
            uid: 1000,
            gid: 1000,
            mode: 0o100644,
            seen_at: 123_456,
        }
    }

    #[test]
    fn test_escape_sql_string() {
        assert_eq!(escape_sql_string("test's file"), "test\\'s file");
        assert_eq!(
            escape_sql_string("Running 'nvm use x' should work"),
            "Running \\'nvm use x\\' should work"
        );
        assert_eq!(
            escape_sql_string("C:\\test\\file.txt"),
            "C:\\\\test\\\\file.txt"
        );
        assert_eq!(escape_sql_string("line1\nline2"), "line1\\nline2");
        assert_eq!(escape_sql_string("tab\there"), "tab\\there");
        assert_eq!(escape_sql_string("test\0file"), "testfile");
    }

    #[test]
    fn test_sql_endpoint_normalization() {
        assert_eq!(
            sql_endpoint("http://manticore:9308"),
            "http://manticore:9308/sql?mode=raw"
        );
        assert_eq!(
            sql_endpoint("http://manticore:9308/sql"),
            "http://manticore:9308/sql?mode=raw"
        );
        assert_eq!(
            sql_endpoint("http://localhost:9308/sql?mode=raw"),
            "http://localhost:9308/sql?mode=raw"
        );
        assert_eq!(
            sql_endpoint("http://localhost:9308/"),
            "http://localhost:9308/sql?mode=raw"
        );
    }

    #[test]
    fn test_replace_sql() {
        let sql = replace_sql("files", &[record(1, "a.txt"), record(2, "b.txt")]);

        assert!(sql.starts_with(
            "REPLACE INTO files (id,root,path,basename,ext,dirpath,size,mtime,uid,gid,mode,seen_at) VALUES "
        ));
        assert!(sql.contains(
            "(1,'test','/data/test/a.txt','a.txt','txt','/data/test',100,1000000,1000,1000,33188,123456)"
        ));
        assert!(sql.contains("),(2,"));
    }

    #[test]
    fn test_replace_sql_escapes_special_names() {
        let name = "Running 'nvm use x' should create and change the 'current' symlink";
        let sql = replace_sql("files", &[record(1, name)]);

        assert!(sql.contains("\\'nvm use x\\'"));
        assert!(sql.contains("\\'current\\'"));
        assert!(!sql.contains(" 'nvm"));
    }

    #[test]
    fn test_delete_sql() {
        assert_eq!(
            delete_sql("files", "test", 1_700_000_000),
            "DELETE FROM files WHERE root='test' AND seen_at < 1700000000"
        );
        assert_eq!(
            delete_sql("files", "o'brien", 5),
            "DELETE FROM files WHERE root='o\\'brien' AND seen_at < 5"
        );
    }

    #[test]
    fn test_schema_sql() {
        let sql = schema_sql("files");
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS files ("));
        assert!(sql.contains("path string indexed"));
        assert!(sql.contains("seen_at bigint"));
        assert!(sql.ends_with("min_infix_len='2'"));
    }

    #[test]
    fn test_affected_rows() {
        assert_eq!(affected_rows(&json!({"total": 5, "error": ""})), Some(5));
        assert_eq!(affected_rows(&json!({"data": [{"deleted": 3}]})), Some(3));
        assert_eq!(affected_rows(&json!({})), None);
    }

    #[test]
    fn test_preview_truncates() {
        let long = "x".repeat(600);
        assert_eq!(preview(&long).len(), 500);
        assert_eq!(preview("short"), "short");
    }
}
