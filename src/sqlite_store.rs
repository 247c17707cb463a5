//! SQLite-backed document metadata and vector storage.
//!
//! [`SqliteDocumentStore`] holds the `documents` table. [`SqliteVectorStore`]
//! keeps embeddings as little-endian `f32` blobs in `chunk_vectors` and
//! scores them with brute-force cosine similarity, restricted to the
//! caller's rows by `WHERE owner_id = ?`. Adequate for a single user's
//! corpus; large deployments should use the Pinecone store.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use memory_vault_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use memory_vault_core::models::{ChunkRecord, Document, DocumentStatus, RetrievedChunk};
use memory_vault_core::store::{DocumentStore, VectorStore};

pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

impl SqliteDocumentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn row_to_document(row: &sqlx::sqlite::SqliteRow) -> Result<Document> {
    let status: String = row.get("status");
    Ok(Document {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        file_name: row.get("file_name"),
        storage_path: row.get("storage_path"),
        content_type: row.get("content_type"),
        status: status.parse()?,
        created_at: row.get("created_at"),
    })
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn insert(&self, doc: &Document) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO documents (id, owner_id, file_name, storage_path, content_type, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&doc.id)
        .bind(&doc.owner_id)
        .bind(&doc.file_name)
        .bind(&doc.storage_path)
        .bind(&doc.content_type)
        .bind(doc.status.as_str())
        .bind(doc.created_at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to insert document {}", doc.id))?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Document>> {
        let row = sqlx::query(
            "SELECT id, owner_id, file_name, storage_path, content_type, status, created_at \
             FROM documents WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_document).transpose()
    }

    async fn list_for_owner(&self, owner_id: &str) -> Result<Vec<Document>> {
        let rows = sqlx::query(
            "SELECT id, owner_id, file_name, storage_path, content_type, status, created_at \
             FROM documents WHERE owner_id = ? ORDER BY created_at DESC, rowid DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_document).collect()
    }

    async fn set_status(&self, id: &str, status: DocumentStatus) -> Result<()> {
        let result = sqlx::query("UPDATE documents SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            bail!("document not found: {}", id);
        }
        Ok(())
    }
}

pub struct SqliteVectorStore {
    pool: SqlitePool,
    model: String,
}

impl SqliteVectorStore {
    /// `model` is recorded alongside every vector written.
    pub fn new(pool: SqlitePool, model: impl Into<String>) -> Self {
        Self {
            pool,
            model: model.into(),
        }
    }

    /// Number of stored vectors for `document_id`.
    pub async fn count_for_document(&self, document_id: &str) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM chunk_vectors WHERE document_id = ?")
                .bind(document_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn upsert(&self, records: &[ChunkRecord], vectors: &[Vec<f32>]) -> Result<()> {
        if records.len() != vectors.len() {
            bail!(
                "record/vector count mismatch: {} records, {} vectors",
                records.len(),
                vectors.len()
            );
        }

        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;
        for (record, vector) in records.iter().zip(vectors) {
            sqlx::query(
                r#"
                INSERT INTO chunk_vectors
                    (id, owner_id, document_id, chunk_index, text, hash, model, dims, embedding, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    text = excluded.text,
                    hash = excluded.hash,
                    model = excluded.model,
                    dims = excluded.dims,
                    embedding = excluded.embedding
                "#,
            )
            .bind(&record.id)
            .bind(&record.owner_id)
            .bind(&record.document_id)
            .bind(record.chunk_index)
            .bind(&record.text)
            .bind(&record.hash)
            .bind(&self.model)
            .bind(vector.len() as i64)
            .bind(vec_to_blob(vector))
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        owner_id: &str,
    ) -> Result<Vec<RetrievedChunk>> {
        // Fetch the owner's vectors and compute cosine similarity in Rust
        let rows = sqlx::query(
            "SELECT owner_id, document_id, chunk_index, text, embedding \
             FROM chunk_vectors WHERE owner_id = ?",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        let mut hits: Vec<RetrievedChunk> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                RetrievedChunk {
                    text: row.get("text"),
                    score: cosine_similarity(vector, &blob_to_vec(&blob)),
                    document_id: row.get("document_id"),
                    owner_id: row.get("owner_id"),
                    chunk_index: row.get("chunk_index"),
                }
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(top_k);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate::migrate_pool;
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use std::str::FromStr;

    async fn pool() -> SqlitePool {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .unwrap()
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap();
        migrate_pool(&pool).await.unwrap();
        pool
    }

    fn doc(id: &str, owner: &str, created_at: i64) -> Document {
        Document {
            id: id.to_string(),
            owner_id: owner.to_string(),
            file_name: format!("{id}.txt"),
            storage_path: format!("{owner}/{id}.txt"),
            content_type: "text/plain".to_string(),
            status: DocumentStatus::Uploaded,
            created_at,
        }
    }

    fn record(id: &str, owner: &str, doc: &str, idx: i64, text: &str) -> ChunkRecord {
        ChunkRecord {
            id: id.to_string(),
            owner_id: owner.to_string(),
            document_id: doc.to_string(),
            chunk_index: idx,
            text: text.to_string(),
            hash: String::new(),
        }
    }

    #[tokio::test]
    async fn documents_listed_newest_first_per_owner() {
        let store = SqliteDocumentStore::new(pool().await);
        store.insert(&doc("a", "u1", 100)).await.unwrap();
        store.insert(&doc("b", "u1", 300)).await.unwrap();
        store.insert(&doc("c", "u2", 200)).await.unwrap();
        store.insert(&doc("d", "u1", 200)).await.unwrap();

        let ids: Vec<String> = store
            .list_for_owner("u1")
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec!["b", "d", "a"]);
        assert!(store.list_for_owner("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn status_update_round_trips() {
        let store = SqliteDocumentStore::new(pool().await);
        store.insert(&doc("a", "u1", 1)).await.unwrap();
        store
            .set_status("a", DocumentStatus::Indexed)
            .await
            .unwrap();
        let fetched = store.get("a").await.unwrap().unwrap();
        assert_eq!(fetched.status, DocumentStatus::Indexed);
        assert_eq!(fetched.storage_path, "u1/a.txt");

        assert!(store.set_status("missing", DocumentStatus::Indexed).await.is_err());
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_document_id_rejected() {
        let store = SqliteDocumentStore::new(pool().await);
        store.insert(&doc("a", "u1", 1)).await.unwrap();
        assert!(store.insert(&doc("a", "u1", 2)).await.is_err());
    }

    async fn pool_with_documents(ids: &[(&str, &str)]) -> SqlitePool {
        let pool = pool().await;
        let docs = SqliteDocumentStore::new(pool.clone());
        for (id, owner) in ids {
            docs.insert(&doc(id, owner, 1)).await.unwrap();
        }
        pool
    }

    #[tokio::test]
    async fn vector_query_is_owner_scoped_and_ranked() {
        let pool = pool_with_documents(&[("d1", "u1"), ("d2", "u2")]).await;
        let store = SqliteVectorStore::new(pool, "test");
        store
            .upsert(
                &[
                    record("r1", "u1", "d1", 0, "near"),
                    record("r2", "u1", "d1", 1, "far"),
                    record("r3", "u2", "d2", 0, "foreign"),
                ],
                &[vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 0.0]],
            )
            .await
            .unwrap();

        let hits = store.query(&[1.0, 0.1], 5, "u1").await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "near");
        assert!(hits[0].score > hits[1].score);
        assert!(hits.iter().all(|h| h.owner_id == "u1"));

        let hits = store.query(&[1.0, 0.0], 1, "u1").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(store.count_for_document("d1").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn vectors_for_unknown_document_rejected() {
        let store = SqliteVectorStore::new(pool().await, "test");
        assert!(store
            .upsert(&[record("r1", "u1", "ghost", 0, "x")], &[vec![1.0]])
            .await
            .is_err());
        assert_eq!(store.count_for_document("ghost").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn mismatched_upsert_rejected() {
        let store = SqliteVectorStore::new(pool().await, "test");
        let err = store
            .upsert(&[record("r1", "u1", "d1", 0, "x")], &[])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("mismatch"));
    }
}
