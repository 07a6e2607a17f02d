//! Relational metadata store: `documents`, `chunks` (mirrors vector-store
//! rows plus the embedding blob, so chunk-text dedup lookups don't need a
//! full vector-store scan), and `video_segments`. Migrations are idempotent
//! and additive.

use std::collections::HashMap;

use rusqlite::{params, Connection, OptionalExtension};

use crate::codec;
use crate::error::{CoreError, Result};
use crate::types::{Chunk, DocStatus, Document, SegmentType, VideoSegment};

pub struct MetadataStore {
    conn: Connection,
}

impl MetadataStore {
    pub fn open(path: &std::path::Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                type TEXT NOT NULL,
                status TEXT NOT NULL,
                error TEXT,
                content_hash TEXT,
                product_id TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_documents_content_hash ON documents(content_hash);
            CREATE INDEX IF NOT EXISTS idx_documents_product_id ON documents(product_id);

            CREATE TABLE IF NOT EXISTS chunks (
                id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL,
                document_name TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                chunk_text TEXT NOT NULL,
                embedding BLOB,
                image_url TEXT,
                product_id TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL,
                FOREIGN KEY(document_id) REFERENCES documents(id)
            );
            CREATE INDEX IF NOT EXISTS idx_chunks_document_id ON chunks(document_id);
            CREATE INDEX IF NOT EXISTS idx_chunks_chunk_text ON chunks(chunk_text);

            CREATE TABLE IF NOT EXISTS video_segments (
                id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL,
                segment_type TEXT NOT NULL,
                start_time REAL NOT NULL,
                end_time REAL NOT NULL,
                content TEXT NOT NULL,
                chunk_id TEXT NOT NULL,
                FOREIGN KEY(document_id) REFERENCES documents(id)
            );
            CREATE INDEX IF NOT EXISTS idx_video_segments_document_id ON video_segments(document_id);",
        )?;

        // Additive migration: `image_url` and `product_id` were not present
        // in the original schema. Adding them unconditionally would fail on
        // a fresh database where CREATE TABLE already included them, so each
        // ALTER is guarded by a check against the live column list.
        self.add_column_if_missing("chunks", "image_url", "TEXT")?;
        self.add_column_if_missing("chunks", "product_id", "TEXT NOT NULL DEFAULT ''")?;
        self.add_column_if_missing("documents", "content_hash", "TEXT")?;
        self.add_column_if_missing("documents", "product_id", "TEXT NOT NULL DEFAULT ''")?;

        Ok(())
    }

    fn add_column_if_missing(&self, table: &str, column: &str, definition: &str) -> Result<()> {
        let mut stmt = self.conn.prepare(&format!("PRAGMA table_info({table})"))?;
        let mut rows = stmt.query([])?;
        let mut has_column = false;
        while let Some(row) = rows.next()? {
            let name: String = row.get(1)?;
            if name == column {
                has_column = true;
                break;
            }
        }
        drop(rows);
        if !has_column {
            self.conn.execute(&format!("ALTER TABLE {table} ADD COLUMN {column} {definition}"), [])?;
        }
        Ok(())
    }

    // ── documents ──────────────────────────────────────────────────────

    pub fn insert_document(&self, doc: &Document) -> Result<()> {
        self.conn.execute(
            "INSERT INTO documents (id, name, type, status, error, content_hash, product_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                doc.id,
                doc.name,
                doc.doc_type,
                doc.status.to_string(),
                doc.error,
                doc.content_hash,
                doc.product_id,
                doc.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn update_status(&self, doc_id: &str, status: DocStatus, error: Option<&str>) -> Result<()> {
        self.conn.execute(
            "UPDATE documents SET status = ?1, error = ?2 WHERE id = ?3",
            params![status.to_string(), error, doc_id],
        )?;
        Ok(())
    }

    pub fn set_content_hash(&self, doc_id: &str, content_hash: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE documents SET content_hash = ?1 WHERE id = ?2",
            params![content_hash, doc_id],
        )?;
        Ok(())
    }

    pub fn get_document(&self, doc_id: &str) -> Result<Option<Document>> {
        self.conn
            .query_row("SELECT id, name, type, status, error, content_hash, product_id, created_at FROM documents WHERE id = ?1", params![doc_id], row_to_document)
            .optional()
            .map_err(CoreError::from)
    }

    /// Any `success` document sharing this content hash — used for
    /// document-level dedup.
    pub fn find_success_by_content_hash(&self, content_hash: &str) -> Result<Option<Document>> {
        self.conn
            .query_row(
                "SELECT id, name, type, status, error, content_hash, product_id, created_at
                 FROM documents WHERE content_hash = ?1 AND status = 'success' LIMIT 1",
                params![content_hash],
                row_to_document,
            )
            .optional()
            .map_err(CoreError::from)
    }

    /// Empty `product_id` returns every document; otherwise returns
    /// documents owned by `product_id` plus the public library (`product_id
    /// = ''`).
    pub fn list_documents(&self, product_id: &str) -> Result<Vec<Document>> {
        let mut stmt = if product_id.is_empty() {
            self.conn.prepare("SELECT id, name, type, status, error, content_hash, product_id, created_at FROM documents ORDER BY created_at DESC")?
        } else {
            self.conn.prepare(
                "SELECT id, name, type, status, error, content_hash, product_id, created_at FROM documents
                 WHERE product_id = ?1 OR product_id = '' ORDER BY created_at DESC",
            )?
        };

        let rows = if product_id.is_empty() {
            stmt.query_map([], row_to_document)?
        } else {
            stmt.query_map(params![product_id], row_to_document)?
        };

        let mut docs = Vec::new();
        for row in rows {
            docs.push(row?);
        }
        Ok(docs)
    }

    pub fn delete_document_cascade(&self, doc_id: &str) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM video_segments WHERE document_id = ?1", params![doc_id])?;
        tx.execute("DELETE FROM chunks WHERE document_id = ?1", params![doc_id])?;
        tx.execute("DELETE FROM documents WHERE id = ?1", params![doc_id])?;
        tx.commit()?;
        Ok(())
    }

    // ── chunks ─────────────────────────────────────────────────────────

    pub fn insert_chunk(&self, chunk: &Chunk) -> Result<()> {
        let embedding_blob = chunk.embedding.as_ref().map(|v| codec::encode_embedding(v));
        self.conn.execute(
            "INSERT INTO chunks (id, document_id, document_name, chunk_index, chunk_text, embedding, image_url, product_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                chunk.id,
                chunk.document_id,
                chunk.document_name,
                chunk.chunk_index,
                chunk.chunk_text,
                embedding_blob,
                chunk.image_url,
                chunk.product_id,
                chrono::Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn count_chunks_for_document(&self, doc_id: &str) -> Result<i64> {
        let count: i64 = self.conn.query_row("SELECT COUNT(*) FROM chunks WHERE document_id = ?1", params![doc_id], |r| r.get(0))?;
        Ok(count)
    }

    /// Looks up embeddings for chunk texts that already exist in the store
    /// (from any document), batched in groups of 100 to respect SQLite's
    /// bound-parameter limit. Rows whose embedding column is null are
    /// skipped — they contribute nothing to the dedup map.
    pub fn lookup_embeddings_for_texts(&self, texts: &[String]) -> Result<HashMap<String, Vec<f32>>> {
        let mut found = HashMap::new();

        for batch in texts.chunks(100) {
            if batch.is_empty() {
                continue;
            }
            let placeholders = batch.iter().enumerate().map(|(i, _)| format!("?{}", i + 1)).collect::<Vec<_>>().join(",");
            let sql = format!("SELECT chunk_text, embedding FROM chunks WHERE chunk_text IN ({placeholders}) AND embedding IS NOT NULL");
            let mut stmt = self.conn.prepare(&sql)?;
            let params: Vec<&dyn rusqlite::ToSql> = batch.iter().map(|t| t as &dyn rusqlite::ToSql).collect();
            let mut rows = stmt.query(params.as_slice())?;

            while let Some(row) = rows.next()? {
                let text: String = row.get(0)?;
                let blob: Vec<u8> = row.get(1)?;
                let vector = codec::decode_embedding(&blob);
                if !vector.is_empty() {
                    found.entry(text).or_insert(vector);
                }
            }
        }

        Ok(found)
    }

    // ── video segments ────────────────────────────────────────────────

    /// Inserts all transcript segments for a document in a single
    /// transaction, matching the atomic-per-document write Phase 1
    /// requires.
    pub fn insert_transcript_segments(&self, segments: &[VideoSegment]) -> Result<()> {
        if segments.is_empty() {
            return Ok(());
        }
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO video_segments (id, document_id, segment_type, start_time, end_time, content, chunk_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for seg in segments {
                stmt.execute(params![
                    seg.id,
                    seg.document_id,
                    seg.segment_type.to_string(),
                    seg.start_time,
                    seg.end_time,
                    seg.content,
                    seg.chunk_id,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// A single keyframe segment insert; failures here are non-fatal to the
    /// phase and the caller decides whether to log and continue.
    pub fn insert_keyframe_segment(&self, segment: &VideoSegment) -> Result<()> {
        self.conn.execute(
            "INSERT INTO video_segments (id, document_id, segment_type, start_time, end_time, content, chunk_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                segment.id,
                segment.document_id,
                segment.segment_type.to_string(),
                segment.start_time,
                segment.end_time,
                segment.content,
                segment.chunk_id,
            ],
        )?;
        Ok(())
    }

    pub fn count_video_segments_for_document(&self, doc_id: &str) -> Result<i64> {
        let count: i64 = self.conn.query_row("SELECT COUNT(*) FROM video_segments WHERE document_id = ?1", params![doc_id], |r| r.get(0))?;
        Ok(count)
    }
}

fn row_to_document(row: &rusqlite::Row) -> rusqlite::Result<Document> {
    let status_str: String = row.get(3)?;
    let created_at_str: String = row.get(7)?;
    Ok(Document {
        id: row.get(0)?,
        name: row.get(1)?,
        doc_type: row.get(2)?,
        status: status_str.parse().unwrap_or(DocStatus::Failed),
        error: row.get(4)?,
        content_hash: row.get(5)?,
        product_id: row.get(6)?,
        created_at: chrono::DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&chrono::Utc))
            .unwrap_or_else(|_| chrono::Utc::now()),
    })
}

#[allow(dead_code)]
fn segment_type_from_str(s: &str) -> SegmentType {
    match s {
        "keyframe" => SegmentType::Keyframe,
        _ => SegmentType::Transcript,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DocType;

    fn sample_document(id: &str) -> Document {
        Document {
            id: id.to_string(),
            name: "a.md".to_string(),
            doc_type: DocType::Markdown.as_str().to_string(),
            status: DocStatus::Processing,
            error: None,
            content_hash: None,
            product_id: String::new(),
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn migrate_is_idempotent() {
        let store = MetadataStore::open_in_memory().unwrap();
        store.migrate().unwrap();
        store.migrate().unwrap();
    }

    #[test]
    fn insert_and_get_document_round_trips() {
        let store = MetadataStore::open_in_memory().unwrap();
        let doc = sample_document("abc");
        store.insert_document(&doc).unwrap();
        let fetched = store.get_document("abc").unwrap().unwrap();
        assert_eq!(fetched.name, "a.md");
        assert_eq!(fetched.status, DocStatus::Processing);
    }

    #[test]
    fn update_status_persists() {
        let store = MetadataStore::open_in_memory().unwrap();
        store.insert_document(&sample_document("abc")).unwrap();
        store.update_status("abc", DocStatus::Failed, Some("duplicate content")).unwrap();
        let fetched = store.get_document("abc").unwrap().unwrap();
        assert_eq!(fetched.status, DocStatus::Failed);
        assert_eq!(fetched.error.unwrap(), "duplicate content");
    }

    #[test]
    fn content_hash_dedup_lookup() {
        let store = MetadataStore::open_in_memory().unwrap();
        let mut doc = sample_document("abc");
        doc.status = DocStatus::Success;
        doc.content_hash = Some("deadbeef".to_string());
        store.insert_document(&doc).unwrap();

        let found = store.find_success_by_content_hash("deadbeef").unwrap();
        assert!(found.is_some());
        assert!(store.find_success_by_content_hash("other").unwrap().is_none());
    }

    #[test]
    fn list_documents_filters_by_product_with_public_library() {
        let store = MetadataStore::open_in_memory().unwrap();
        let mut doc_a = sample_document("a");
        doc_a.product_id = "tenant-1".to_string();
        let mut doc_b = sample_document("b");
        doc_b.product_id = String::new();
        let mut doc_c = sample_document("c");
        doc_c.product_id = "tenant-2".to_string();

        store.insert_document(&doc_a).unwrap();
        store.insert_document(&doc_b).unwrap();
        store.insert_document(&doc_c).unwrap();

        let for_tenant_1 = store.list_documents("tenant-1").unwrap();
        let ids: Vec<&str> = for_tenant_1.iter().map(|d| d.id.as_str()).collect();
        assert!(ids.contains(&"a"));
        assert!(ids.contains(&"b"));
        assert!(!ids.contains(&"c"));
    }

    #[test]
    fn chunk_text_dedup_lookup_skips_null_embeddings() {
        let store = MetadataStore::open_in_memory().unwrap();
        store.insert_document(&sample_document("abc")).unwrap();

        let with_embedding = Chunk {
            id: "c1".to_string(),
            document_id: "abc".to_string(),
            document_name: "a.md".to_string(),
            chunk_index: 0,
            chunk_text: "hello world".to_string(),
            embedding: Some(vec![1.0, 2.0, 3.0]),
            image_url: None,
            product_id: String::new(),
        };
        let without_embedding = Chunk {
            id: "c2".to_string(),
            document_id: "abc".to_string(),
            document_name: "a.md".to_string(),
            chunk_index: 1,
            chunk_text: "no vector".to_string(),
            embedding: None,
            image_url: None,
            product_id: String::new(),
        };
        store.insert_chunk(&with_embedding).unwrap();
        store.insert_chunk(&without_embedding).unwrap();

        let found = store.lookup_embeddings_for_texts(&["hello world".to_string(), "no vector".to_string()]).unwrap();
        assert_eq!(found.get("hello world").unwrap(), &vec![1.0, 2.0, 3.0]);
        assert!(!found.contains_key("no vector"));
    }

    #[test]
    fn delete_document_cascade_removes_all_related_rows() {
        let store = MetadataStore::open_in_memory().unwrap();
        store.insert_document(&sample_document("abc")).unwrap();
        store
            .insert_chunk(&Chunk {
                id: "c1".to_string(),
                document_id: "abc".to_string(),
                document_name: "a.md".to_string(),
                chunk_index: 0,
                chunk_text: "hi".to_string(),
                embedding: None,
                image_url: None,
                product_id: String::new(),
            })
            .unwrap();
        store
            .insert_keyframe_segment(&VideoSegment {
                id: "v1".to_string(),
                document_id: "abc".to_string(),
                segment_type: SegmentType::Keyframe,
                start_time: 0.0,
                end_time: 0.0,
                content: "path".to_string(),
                chunk_id: "c1".to_string(),
            })
            .unwrap();

        store.delete_document_cascade("abc").unwrap();

        assert!(store.get_document("abc").unwrap().is_none());
        assert_eq!(store.count_chunks_for_document("abc").unwrap(), 0);
        assert_eq!(store.count_video_segments_for_document("abc").unwrap(), 0);
    }
}
