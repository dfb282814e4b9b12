//! Query Service: the "execute analytics query" external interface (§6).
//!
//! Runs a query through the Analytics adapter, classifies the result with
//! the Visualization Classifier, and upserts the formatted response into
//! the cached query result table keyed by a content fingerprint of
//! (query, earliest, latest) scoped per user (§8 scenario 6: a second
//! identical query within the same window updates the same cache row
//! rather than creating a new one).

use std::sync::Arc;

use serde::Serialize;
use sqlx::SqlitePool;

use crate::data::error::DataError;
use crate::data::sqlite::repositories::cached_query_result::{
    fingerprint, get_cached_query_result, upsert_cached_query_result, CachedQueryResultRow,
};
use crate::domain::adapters::AnalyticsAdapter;
use crate::domain::blocks::Block;
use crate::domain::error::PipelineError;
use crate::domain::visualization::{self, ClassifyInput};

#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub fingerprint: String,
    pub columns: Vec<String>,
    pub rows: Vec<serde_json::Map<String, serde_json::Value>>,
    pub visualization: Block,
    pub preview: bool,
}

pub struct QueryService {
    pool: SqlitePool,
    analytics: Arc<dyn AnalyticsAdapter>,
}

impl QueryService {
    pub fn new(pool: SqlitePool, analytics: Arc<dyn AnalyticsAdapter>) -> Self {
        Self { pool, analytics }
    }

    /// Run `query` over `[earliest, latest)` for `user_id`, cache the
    /// formatted result, and return it alongside its visualization block.
    pub async fn execute(
        &self,
        user_id: &str,
        query: &str,
        earliest: i64,
        latest: i64,
    ) -> Result<QueryResult, PipelineError> {
        let result = self.analytics.execute(query, earliest, latest).await?;

        let input = ClassifyInput {
            query,
            fields: &result.fields,
            rows: &result.rows,
        };
        let visualization = visualization::build_visualization_block(&input, None);

        let fp = fingerprint(query, earliest, latest);
        let cached_payload = serde_json::json!({
            "columns": result.columns,
            "rows": result.rows,
            "visualization": visualization,
            "preview": result.preview,
        });
        let body = serde_json::to_string(&cached_payload)
            .map_err(|e| PipelineError::Invariant(format!("failed to serialize query result: {e}")))?;

        upsert_cached_query_result(&self.pool, &fp, user_id, query, earliest, latest, &body)
            .await
            .map_err(DataError::from)?;

        Ok(QueryResult {
            fingerprint: fp,
            columns: result.columns,
            rows: result.rows,
            visualization,
            preview: result.preview,
        })
    }

    /// Look up a previously cached result by its fingerprint, without
    /// re-running the query — backs the "cached-result id" half of §6's
    /// analytics response.
    pub async fn get_cached(
        &self,
        user_id: &str,
        fingerprint: &str,
    ) -> Result<Option<CachedQueryResultRow>, PipelineError> {
        get_cached_query_result(&self.pool, fingerprint, user_id)
            .await
            .map_err(DataError::from)
            .map_err(PipelineError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::adapters::analytics::{AnalyticsQueryResult, FakeAnalyticsAdapter};

    async fn test_pool() -> SqlitePool {
        use sqlx::sqlite::SqlitePoolOptions;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .unwrap();
        sqlx::query(crate::data::sqlite::schema::SCHEMA)
            .execute(&pool)
            .await
            .unwrap();
        pool
    }

    fn single_row_result() -> AnalyticsQueryResult {
        let mut row = serde_json::Map::new();
        row.insert("count".to_string(), serde_json::json!(42));
        AnalyticsQueryResult {
            columns: vec!["count".to_string()],
            fields: vec!["count".to_string()],
            rows: vec![row],
            preview: false,
        }
    }

    #[tokio::test]
    async fn test_execute_caches_result_under_fingerprint() {
        let pool = test_pool().await;
        let analytics: Arc<dyn AnalyticsAdapter> = Arc::new(FakeAnalyticsAdapter::new(single_row_result()));
        let service = QueryService::new(pool, analytics);

        let result = service.execute("local", "index=main | stats count", 0, 100).await.unwrap();
        assert_eq!(result.columns, vec!["count".to_string()]);

        let cached = service.get_cached("local", &result.fingerprint).await.unwrap();
        assert!(cached.is_some());
    }

    #[tokio::test]
    async fn test_repeated_identical_query_updates_same_cache_row() {
        let pool = test_pool().await;
        let analytics: Arc<dyn AnalyticsAdapter> = Arc::new(FakeAnalyticsAdapter::new(single_row_result()));
        let service = QueryService::new(pool.clone(), analytics);

        service.execute("local", "index=main | stats count", 0, 100).await.unwrap();
        service.execute("local", "index=main | stats count", 0, 100).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cached_query_results")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_execute_builds_visualization_block() {
        let pool = test_pool().await;
        let analytics: Arc<dyn AnalyticsAdapter> = Arc::new(FakeAnalyticsAdapter::new(single_row_result()));
        let service = QueryService::new(pool, analytics);

        let result = service.execute("local", "index=main | stats count", 0, 100).await.unwrap();
        assert_eq!(result.visualization.block_type, crate::domain::blocks::BlockType::Chart);
    }
}
