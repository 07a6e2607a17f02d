//! Embedded vector store: persists per-document [`VectorChunk`] records and
//! supports delete-by-document. Treated by the Document Manager as atomic
//! per `store` call; similarity-search ranking is out of scope for the
//! ingestion core.

use std::sync::Arc;

use anyhow::Context;
use arrow_array::{FixedSizeListArray, Float32Array, Int64Array, RecordBatch, RecordBatchIterator, StringArray};
use arrow_schema::{DataType, Field, Schema};
use lancedb::{connect, Connection, Table};

use crate::error::{CoreError, Result};
use crate::types::VectorChunk;

const CHUNKS_TABLE: &str = "chunks";

/// Escapes single quotes to keep `only_if`/`delete` predicates safe against
/// chunk text or document ids that happen to contain a quote.
fn escape_sql(s: &str) -> String {
    s.replace('\'', "''")
}

pub struct VectorStore {
    conn: Connection,
    table: Option<Table>,
    embedding_dim: usize,
}

impl VectorStore {
    pub async fn open(data_dir: &str, embedding_dim: usize) -> Result<Self> {
        let conn = connect(data_dir)
            .execute()
            .await
            .map_err(|e| CoreError::Store(format!("failed to open vector store: {e}")))?;
        let table = conn.open_table(CHUNKS_TABLE).execute().await.ok();
        Ok(Self { conn, table, embedding_dim })
    }

    fn schema(&self) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("document_id", DataType::Utf8, false),
            Field::new("document_name", DataType::Utf8, false),
            Field::new("chunk_index", DataType::Int64, false),
            Field::new("chunk_text", DataType::Utf8, false),
            Field::new("image_url", DataType::Utf8, true),
            Field::new("product_id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), self.embedding_dim as i32),
                false,
            ),
        ]))
    }

    async fn get_or_create_table(&mut self) -> Result<Table> {
        if let Some(ref table) = self.table {
            return Ok(table.clone());
        }
        let schema = self.schema();
        let table = self
            .conn
            .create_empty_table(CHUNKS_TABLE, schema)
            .execute()
            .await
            .context("failed to create chunks table")
            .map_err(CoreError::Other)?;
        self.table = Some(table.clone());
        Ok(table)
    }

    /// Stores a document's chunks atomically: all rows land in one
    /// `RecordBatch` write, so a write failure leaves no partial rows.
    pub async fn store(&mut self, chunks: &[VectorChunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        let table = self.get_or_create_table().await?;

        let ids: Vec<String> = chunks.iter().map(|_| crate::sanitize::generate_doc_id()).collect();
        let id_refs: Vec<&str> = ids.iter().map(|s| s.as_str()).collect();
        let document_ids: Vec<&str> = chunks.iter().map(|c| c.document_id.as_str()).collect();
        let document_names: Vec<&str> = chunks.iter().map(|c| c.document_name.as_str()).collect();
        let chunk_indices: Vec<i64> = chunks.iter().map(|c| c.chunk_index).collect();
        let chunk_texts: Vec<&str> = chunks.iter().map(|c| c.chunk_text.as_str()).collect();
        let image_urls: Vec<Option<&str>> = chunks.iter().map(|c| c.image_url.as_deref()).collect();
        let product_ids: Vec<&str> = chunks.iter().map(|c| c.product_id.as_str()).collect();
        let flat_vectors: Vec<f32> = chunks.iter().flat_map(|c| c.vector.iter().copied()).collect();

        let schema = self.schema();
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(StringArray::from(id_refs)),
                Arc::new(StringArray::from(document_ids)),
                Arc::new(StringArray::from(document_names)),
                Arc::new(Int64Array::from(chunk_indices)),
                Arc::new(StringArray::from(chunk_texts)),
                Arc::new(StringArray::from(image_urls)),
                Arc::new(StringArray::from(product_ids)),
                Arc::new(FixedSizeListArray::new(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    self.embedding_dim as i32,
                    Arc::new(Float32Array::from(flat_vectors)),
                    None,
                )),
            ],
        )
        .map_err(|e| CoreError::Store(format!("failed to build record batch: {e}")))?;

        let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);
        table
            .add(batches)
            .execute()
            .await
            .map_err(|e| CoreError::Store(format!("failed to write chunks: {e}")))?;

        Ok(())
    }

    /// Deletes every chunk belonging to a document.
    pub async fn delete_by_document(&self, document_id: &str) -> Result<()> {
        if let Some(ref table) = self.table {
            table
                .delete(&format!("document_id = '{}'", escape_sql(document_id)))
                .await
                .map_err(|e| CoreError::Store(format!("failed to delete chunks: {e}")))?;
        }
        Ok(())
    }

}

#[cfg(test)]
mod tests {
    use super::escape_sql;

    #[test]
    fn escapes_single_quotes() {
        assert_eq!(escape_sql("it's"), "it''s");
        assert_eq!(escape_sql("a'b'c"), "a''b''c");
        assert_eq!(escape_sql("plain"), "plain");
    }
}
