//! SQLite-backed chunk store.
//!
//! Embeddings live next to the text as little-endian f32 blobs; search is a
//! brute-force cosine scan, which is plenty for a statute corpus.

use std::path::PathBuf;

use async_trait::async_trait;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use super::chunk::{DocumentChunk, Metadata};
use super::store::{matches_filter, ChunkStore, MetadataFilter, ScoredChunk};
use crate::core::errors::ApiError;

pub struct SqliteChunkStore {
    pool: SqlitePool,
}

impl SqliteChunkStore {
    pub async fn with_path(db_path: PathBuf) -> Result<Self, ApiError> {
        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(ApiError::persistence)?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), ApiError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS law_chunks (
                chunk_id TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}',
                embedding BLOB,
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::persistence)?;

        Ok(())
    }

    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() || a.is_empty() {
            return 0.0;
        }

        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        let denom = norm_a * norm_b;

        if denom <= f32::EPSILON {
            0.0
        } else {
            dot / denom
        }
    }

    fn row_to_chunk(row: &SqliteRow) -> Result<DocumentChunk, ApiError> {
        let metadata_str: String = row.try_get("metadata").map_err(ApiError::persistence)?;
        let metadata = serde_json::from_str::<Metadata>(&metadata_str).unwrap_or_default();

        Ok(DocumentChunk {
            id: row.try_get("chunk_id").map_err(ApiError::persistence)?,
            content: row.try_get("content").map_err(ApiError::persistence)?,
            metadata,
        })
    }
}

#[async_trait]
impl ChunkStore for SqliteChunkStore {
    async fn insert_batch(&self, items: Vec<(DocumentChunk, Vec<f32>)>) -> Result<usize, ApiError> {
        if items.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await.map_err(ApiError::persistence)?;
        let mut written = 0;

        for (chunk, embedding) in &items {
            let blob = Self::serialize_embedding(embedding);
            let metadata_str = serde_json::to_string(&chunk.metadata).map_err(ApiError::internal)?;

            let result = sqlx::query(
                "INSERT OR IGNORE INTO law_chunks (chunk_id, content, metadata, embedding)
                 VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(&chunk.id)
            .bind(&chunk.content)
            .bind(&metadata_str)
            .bind(&blob)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::persistence)?;

            written += result.rows_affected() as usize;
        }

        tx.commit().await.map_err(ApiError::persistence)?;
        Ok(written)
    }

    async fn existing_ids(&self, ids: &[String]) -> Result<Vec<String>, ApiError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut found = Vec::new();
        // Stay well under sqlite's bound-parameter limit.
        for batch in ids.chunks(500) {
            let mut builder: QueryBuilder<Sqlite> =
                QueryBuilder::new("SELECT chunk_id FROM law_chunks WHERE chunk_id IN (");
            let mut separated = builder.separated(", ");
            for id in batch {
                separated.push_bind(id);
            }
            separated.push_unseparated(")");

            let rows = builder
                .build_query_scalar::<String>()
                .fetch_all(&self.pool)
                .await
                .map_err(ApiError::persistence)?;
            found.extend(rows);
        }
        Ok(found)
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredChunk>, ApiError> {
        let rows = sqlx::query(
            "SELECT chunk_id, content, metadata, embedding
             FROM law_chunks
             ORDER BY rowid ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::persistence)?;

        let mut scored = Vec::new();
        for row in &rows {
            let embedding_bytes: Option<Vec<u8>> =
                row.try_get("embedding").map_err(ApiError::persistence)?;
            let Some(embedding_bytes) = embedding_bytes.filter(|b| !b.is_empty()) else {
                continue;
            };

            let chunk = Self::row_to_chunk(row)?;
            if !matches_filter(&chunk, filter) {
                continue;
            }

            let stored = Self::deserialize_embedding(&embedding_bytes);
            scored.push(ScoredChunk {
                score: Self::cosine_similarity(query_embedding, &stored),
                chunk,
            });
        }

        // Stable sort: ties stay in insertion order.
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(limit.max(1));

        Ok(scored)
    }

    async fn get(&self, id: &str) -> Result<Option<DocumentChunk>, ApiError> {
        let row = sqlx::query(
            "SELECT chunk_id, content, metadata
             FROM law_chunks
             WHERE chunk_id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(ApiError::persistence)?;

        row.as_ref().map(Self::row_to_chunk).transpose()
    }

    async fn delete(&self, ids: &[String]) -> Result<usize, ApiError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await.map_err(ApiError::persistence)?;
        let mut deleted = 0;
        for id in ids {
            let result = sqlx::query("DELETE FROM law_chunks WHERE chunk_id = ?1")
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(ApiError::persistence)?;
            deleted += result.rows_affected() as usize;
        }
        tx.commit().await.map_err(ApiError::persistence)?;

        Ok(deleted)
    }

    async fn count(&self) -> Result<usize, ApiError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM law_chunks")
            .fetch_one(&self.pool)
            .await
            .map_err(ApiError::persistence)?;

        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::chunk::{ARTICLE_NUMBER, CATEGORY, LAW_NAME};

    async fn test_store() -> SqliteChunkStore {
        let tmp = std::env::temp_dir().join(format!("lawqa-index-test-{}.db", uuid::Uuid::new_v4()));
        SqliteChunkStore::with_path(tmp).await.unwrap()
    }

    fn make_chunk(law: &str, article: &str, content: &str, category: &str) -> DocumentChunk {
        let mut metadata = Metadata::new();
        metadata.insert(LAW_NAME.to_string(), law.to_string());
        metadata.insert(ARTICLE_NUMBER.to_string(), article.to_string());
        metadata.insert(CATEGORY.to_string(), category.to_string());
        DocumentChunk::new(content, metadata)
    }

    #[tokio::test]
    async fn insert_and_search() {
        let store = test_store().await;

        let chunk = make_chunk("民法典", "第一条", "为了保护民事主体的合法权益", "民法");
        let id = chunk.id.clone();
        let embedding = vec![1.0, 0.0, 0.0];

        assert_eq!(store.insert_batch(vec![(chunk, embedding.clone())]).await.unwrap(), 1);
        assert_eq!(store.count().await.unwrap(), 1);

        let results = store.search(&embedding, 10, None).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.id, id);
        assert_eq!(results[0].chunk.law_name(), "民法典");
        assert!(results[0].score > 0.99);
    }

    #[tokio::test]
    async fn duplicate_ids_are_ignored() {
        let store = test_store().await;
        let chunk = make_chunk("刑法", "第二条", "刑法的任务", "刑法");

        assert_eq!(store.insert_batch(vec![(chunk.clone(), vec![1.0])]).await.unwrap(), 1);
        assert_eq!(store.insert_batch(vec![(chunk.clone(), vec![0.5])]).await.unwrap(), 0);
        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(
            store.existing_ids(&[chunk.id.clone(), "missing".to_string()]).await.unwrap(),
            vec![chunk.id]
        );
    }

    #[tokio::test]
    async fn search_orders_by_score_and_applies_filter() {
        let store = test_store().await;
        let near = make_chunk("劳动合同法", "第十九条", "试用期", "劳动");
        let far = make_chunk("劳动合同法", "第二十条", "工资", "劳动");
        let other = make_chunk("刑法", "第三条", "罪刑法定", "刑法");

        store
            .insert_batch(vec![
                (far.clone(), vec![0.0, 1.0]),
                (near.clone(), vec![1.0, 0.1]),
                (other.clone(), vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let all = store.search(&[1.0, 0.0], 10, None).await.unwrap();
        let ids: Vec<_> = all.iter().map(|s| s.chunk.id.as_str()).collect();
        assert_eq!(ids, vec![other.id.as_str(), near.id.as_str(), far.id.as_str()]);

        let mut filter = MetadataFilter::new();
        filter.insert(CATEGORY.to_string(), "劳动".to_string());
        let filtered = store.search(&[1.0, 0.0], 10, Some(&filter)).await.unwrap();
        let ids: Vec<_> = filtered.iter().map(|s| s.chunk.id.as_str()).collect();
        assert_eq!(ids, vec![near.id.as_str(), far.id.as_str()]);

        assert_eq!(store.search(&[1.0, 0.0], 1, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_by_ids() {
        let store = test_store().await;
        let a = make_chunk("宪法", "第一条", "a", "宪法");
        let b = make_chunk("宪法", "第二条", "b", "宪法");
        store
            .insert_batch(vec![(a.clone(), vec![1.0]), (b.clone(), vec![1.0])])
            .await
            .unwrap();

        assert_eq!(store.delete(&[a.id.clone(), "nope".to_string()]).await.unwrap(), 1);
        assert!(store.get(&a.id).await.unwrap().is_none());
        assert_eq!(store.get(&b.id).await.unwrap().unwrap().content, "b");
    }
}
