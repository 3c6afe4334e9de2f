//! Adapter from a raw SurrealDB client to [`GraphQueryExecutor`].

use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::graph::LivenessGraph;
use crate::model::GraphQueryExecutor;
use crate::parser::SurrealResponseParser;
use crate::{RelgraphError, Result};

/// Anything that can run SurrealQL text and hand back the raw JSON body
/// (an array of per-statement results).
#[async_trait]
pub trait RawQueryClient: Send + Sync {
    async fn query(&self, sql: &str) -> Result<Value>;
}

/// Executes through a [`RawQueryClient`] and rebuilds graphs with
/// [`SurrealResponseParser`].
pub struct SurrealGraphExecutor<C> {
    client: C,
}

impl<C: RawQueryClient> SurrealGraphExecutor<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<C: RawQueryClient> GraphQueryExecutor for SurrealGraphExecutor<C> {
    async fn execute(&self, query: &str, start: i64, end: i64) -> Result<Vec<LivenessGraph>> {
        let raw = self.client.query(query).await?;
        SurrealResponseParser::new(start, end).parse(&raw)
    }
}

/// Replays a response captured earlier, whatever the query text.
pub struct RecordedResponseClient {
    path: PathBuf,
}

impl RecordedResponseClient {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl RawQueryClient for RecordedResponseClient {
    async fn query(&self, sql: &str) -> Result<Value> {
        log::debug!(
            "replaying {} for a {} byte query",
            self.path.display(),
            sql.len()
        );
        let body = tokio::fs::read_to_string(&self.path).await?;
        serde_json::from_str(&body).map_err(|e| {
            RelgraphError::Executor(format!("{}: invalid response body: {}", self.path.display(), e))
        })
    }
}
