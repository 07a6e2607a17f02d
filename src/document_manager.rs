//! Document Manager: the orchestrator for non-video ingestion, delete, and
//! listing. Video ingestion is dispatched from here but executed by
//! [`crate::video`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio::sync::{Mutex, RwLock};

use crate::config::{Config, VideoConfig};
use crate::embedding::EmbeddingClient;
use crate::error::{CoreError, Result};
use crate::llm::LlmClient;
use crate::metadata_store::MetadataStore;
use crate::parsers;
use crate::sanitize;
use crate::types::{
    Chunk, DocStatus, DocType, Document, DocumentInfo, FileInput, ImportStats, UrlInput, VectorChunk,
};
use crate::url_fetch::{self, UrlFetcher};
use crate::vector_store::VectorStore;

const PREVIEW_CHARS: usize = 5000;
const VIDEO_DEADLINE: std::time::Duration = std::time::Duration::from_secs(30 * 60);

pub struct DocumentManager {
    data_dir: PathBuf,
    metadata: MetadataStore,
    vector_store: Mutex<VectorStore>,
    embedding: RwLock<Arc<EmbeddingClient>>,
    llm: RwLock<Arc<LlmClient>>,
    video_config: RwLock<VideoConfig>,
    url_fetcher: UrlFetcher,
    chunking: crate::chunker::ChunkerConfig,
}

impl DocumentManager {
    pub async fn new(config: &Config) -> Result<Self> {
        let data_dir = PathBuf::from(&config.data_dir);
        std::fs::create_dir_all(data_dir.join("uploads"))?;
        std::fs::create_dir_all(data_dir.join("images"))?;

        let metadata = MetadataStore::open(&data_dir.join("metadata.sqlite"))?;
        let vector_store = VectorStore::open(data_dir.join("vectors").to_string_lossy().as_ref(), config.embedding.dimensions).await?;

        Ok(Self {
            data_dir,
            metadata,
            vector_store: Mutex::new(vector_store),
            embedding: RwLock::new(Arc::new(EmbeddingClient::new(config.embedding.clone()))),
            llm: RwLock::new(Arc::new(LlmClient::new(config.llm.clone()))),
            video_config: RwLock::new(config.video.clone()),
            url_fetcher: UrlFetcher::new(),
            chunking: crate::chunker::ChunkerConfig { chunk_size: config.chunking.chunk_size, overlap: config.chunking.overlap },
        })
    }

    /// Swaps the embedding client for a freshly configured one. Takes the
    /// write lock only for the assignment itself — never across I/O.
    pub async fn update_embedding_config(&self, config: crate::config::EmbeddingConfig) {
        let client = Arc::new(EmbeddingClient::new(config));
        *self.embedding.write().await = client;
    }

    /// Swaps the video tool configuration, e.g. after an admin updates tool
    /// paths without restarting the process.
    pub async fn update_video_config(&self, config: VideoConfig) {
        *self.video_config.write().await = config;
    }

    /// Swaps the URL fetcher, e.g. to inject a test client with custom DNS
    /// resolution. Must be called before the manager is shared, since the
    /// fetcher itself carries no interior mutability.
    pub fn set_url_fetcher(&mut self, fetcher: UrlFetcher) {
        self.url_fetcher = fetcher;
    }

    pub(crate) async fn embedding_client(&self) -> Arc<EmbeddingClient> {
        self.embedding.read().await.clone()
    }

    pub async fn llm_client(&self) -> Arc<LlmClient> {
        self.llm.read().await.clone()
    }

    pub async fn video_config(&self) -> VideoConfig {
        self.video_config.read().await.clone()
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    pub fn vector_store(&self) -> &Mutex<VectorStore> {
        &self.vector_store
    }

    pub fn chunking_config(&self) -> crate::chunker::ChunkerConfig {
        self.chunking
    }

    // ── upload_file ────────────────────────────────────────────────────

    /// Takes `Arc<Self>` because a video upload spawns a supervised
    /// background task that must outlive this call.
    pub async fn upload_file(self: &Arc<Self>, input: FileInput) -> Result<DocumentInfo> {
        let file_type = input.file_type.to_ascii_lowercase();
        let doc_type = DocType::from_lower(&file_type)
            .ok_or_else(|| CoreError::Validation(format!("unsupported file type: {file_type}")))?;

        if input.file_name.is_empty() || input.file_name.len() > sanitize::MAX_FILE_NAME_LEN {
            return Err(CoreError::Validation("file_name must be non-empty and at most 500 characters".to_string()));
        }
        if input.file_data.is_empty() {
            return Err(CoreError::Validation("file_data must not be empty".to_string()));
        }

        let sanitized_name = sanitize::sanitize_file_name(&input.file_name);
        let doc_id = sanitize::generate_doc_id();
        let now = chrono::Utc::now();

        let document = Document {
            id: doc_id.clone(),
            name: sanitized_name.clone(),
            doc_type: file_type.clone(),
            status: DocStatus::Processing,
            error: None,
            content_hash: None,
            product_id: input.product_id.clone(),
            created_at: now,
        };
        self.metadata.insert_document(&document)?;

        let upload_dir = self.data_dir.join("uploads").join(&doc_id);
        if let Err(e) = std::fs::create_dir_all(&upload_dir).and_then(|_| std::fs::write(upload_dir.join(&sanitized_name), &input.file_data)) {
            tracing::warn!(document_id = %doc_id, error = %e, "failed to persist original file bytes, continuing");
        }

        if doc_type.is_video() {
            // Video ingestion runs in a detached supervisor task: the caller
            // gets the `processing` document back immediately, and status
            // flips to success/failed once the pipeline finishes.
            let manager = Arc::clone(self);
            let supervised_doc_id = doc_id.clone();
            tokio::spawn(async move {
                manager.dispatch_video(supervised_doc_id, sanitized_name, input.file_data, input.product_id).await;
            });
            let document = self.metadata.get_document(&doc_id)?.ok_or_else(|| CoreError::Store("document vanished after video dispatch".to_string()))?;
            return Ok(DocumentInfo { document, stats: None });
        }

        let stats = match self.ingest_non_video(&doc_id, &sanitized_name, doc_type, &input.file_data, &input.product_id).await {
            Ok(stats) => stats,
            Err(e) => {
                self.fail(&doc_id, &e.to_string())?;
                let document = self.metadata.get_document(&doc_id)?.ok_or_else(|| CoreError::Store("document vanished after failure".to_string()))?;
                return Ok(DocumentInfo { document, stats: None });
            }
        };

        self.metadata.update_status(&doc_id, DocStatus::Success, None)?;
        let document = self.metadata.get_document(&doc_id)?.ok_or_else(|| CoreError::Store("document vanished after success".to_string()))?;
        Ok(DocumentInfo { document, stats: Some(stats) })
    }

    async fn ingest_non_video(&self, doc_id: &str, doc_name: &str, doc_type: DocType, data: &[u8], product_id: &str) -> Result<ImportStats> {
        let parsed = parsers::parse(doc_type, data)?;

        if parsed.text.is_empty() && parsed.images.is_empty() {
            return Err(CoreError::Parse("empty content".to_string()));
        }

        self.check_and_set_content_hash(doc_id, &parsed.text)?;

        if !parsed.text.is_empty() {
            self.chunk_embed_store(doc_id, doc_name, &parsed.text, product_id).await?;
        }

        let image_count = self.store_images(doc_id, doc_name, &parsed.images, product_id).await;

        Ok(ImportStats { text_chars: parsed.text.chars().count(), image_count })
    }

    /// Document-level dedup: a second document whose extracted text hashes
    /// the same as an existing `success` document is rejected outright.
    fn check_and_set_content_hash(&self, doc_id: &str, text: &str) -> Result<()> {
        let hash = format!("{:x}", Sha256::digest(text.as_bytes()));
        if let Some(existing) = self.metadata.find_success_by_content_hash(&hash)? {
            if existing.id != doc_id {
                return Err(CoreError::DedupConflict);
            }
        }
        self.metadata.set_content_hash(doc_id, &hash)?;
        Ok(())
    }

    async fn store_images(&self, doc_id: &str, doc_name: &str, images: &[crate::types::ParsedImage], product_id: &str) -> usize {
        let mut stored = 0usize;
        for (i, image) in images.iter().enumerate() {
            if image.data.is_empty() {
                continue;
            }
            let image_url = match self.save_image(&image.data) {
                Ok(url) => url,
                Err(e) => {
                    tracing::warn!(document_id = %doc_id, error = %e, "failed to save image, skipping");
                    continue;
                }
            };

            let embedding = match self.embedding_client().await.embed_image_url(&image_url).await {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(document_id = %doc_id, error = %e, "failed to embed image, skipping");
                    continue;
                }
            };

            let chunk_index = 1000 + i as i64;
            let chunk_text = format!("[image: {}]", image.alt);
            let chunk = Chunk {
                id: sanitize::generate_doc_id(),
                document_id: doc_id.to_string(),
                document_name: doc_name.to_string(),
                chunk_index,
                chunk_text: chunk_text.clone(),
                embedding: Some(embedding.clone()),
                image_url: Some(image_url.clone()),
                product_id: product_id.to_string(),
            };
            if let Err(e) = self.metadata.insert_chunk(&chunk) {
                tracing::warn!(document_id = %doc_id, error = %e, "failed to record image chunk metadata, skipping");
                continue;
            }

            let vector_chunk = VectorChunk {
                chunk_text,
                chunk_index,
                document_id: doc_id.to_string(),
                document_name: doc_name.to_string(),
                vector: embedding,
                image_url: Some(image_url),
                product_id: product_id.to_string(),
            };
            let mut store = self.vector_store.lock().await;
            if let Err(e) = store.store(&[vector_chunk]).await {
                tracing::warn!(document_id = %doc_id, error = %e, "failed to store image vector, skipping");
                continue;
            }

            stored += 1;
        }
        stored
    }

    pub(crate) fn save_image(&self, data: &[u8]) -> Result<String> {
        let ext = sanitize::sniff_image_extension(data);
        let hex = sanitize::generate_doc_id();
        let file_name = format!("{hex}.{ext}");
        std::fs::write(self.data_dir.join("images").join(&file_name), data)?;
        Ok(format!("/api/images/{file_name}"))
    }

    fn fail(&self, doc_id: &str, message: &str) -> Result<()> {
        self.metadata.update_status(doc_id, DocStatus::Failed, Some(message))
    }

    // ── chunk_embed_store ──────────────────────────────────────────────

    /// Chunks `text`, deduplicates against existing chunk text across the
    /// whole store, embeds only what's new, and writes both stores.
    pub async fn chunk_embed_store(&self, doc_id: &str, doc_name: &str, text: &str, product_id: &str) -> Result<usize> {
        let chunks = crate::chunker::split(text, self.chunking);
        if chunks.is_empty() {
            return Err(CoreError::Parse("empty chunking".to_string()));
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let mut embedding_map = self.metadata.lookup_embeddings_for_texts(&texts)?;

        let new_texts: Vec<String> = texts.iter().filter(|t| !embedding_map.contains_key(*t)).cloned().collect();
        if !new_texts.is_empty() {
            let client = self.embedding_client().await;
            let new_embeddings = client.embed_batch(&new_texts).await?;
            for (text, embedding) in new_texts.into_iter().zip(new_embeddings) {
                embedding_map.insert(text, embedding);
            }
        }

        let mut vector_chunks = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            let vector = embedding_map
                .get(&chunk.text)
                .cloned()
                .ok_or_else(|| CoreError::Embedding(format!("no embedding produced for chunk {}", chunk.index)))?;

            self.metadata.insert_chunk(&Chunk {
                id: sanitize::generate_doc_id(),
                document_id: doc_id.to_string(),
                document_name: doc_name.to_string(),
                chunk_index: chunk.index as i64,
                chunk_text: chunk.text.clone(),
                embedding: Some(vector.clone()),
                image_url: None,
                product_id: product_id.to_string(),
            })?;

            vector_chunks.push(VectorChunk {
                chunk_text: chunk.text.clone(),
                chunk_index: chunk.index as i64,
                document_id: doc_id.to_string(),
                document_name: doc_name.to_string(),
                vector,
                image_url: None,
                product_id: product_id.to_string(),
            });
        }

        let count = vector_chunks.len();
        let mut store = self.vector_store.lock().await;
        store.store(&vector_chunks).await?;
        Ok(count)
    }

    // ── upload_url ─────────────────────────────────────────────────────

    pub async fn upload_url(&self, input: UrlInput) -> Result<DocumentInfo> {
        // Only the initial URL is validated before any document row exists —
        // an invalid starting point never should have been attempted at all.
        // A redirect hop discovered to be SSRF-blocked happens only once the
        // fetch is underway, so it is a per-document failure, not this.
        url_fetch::validate_external_url(&input.url)?;

        let doc_id = sanitize::generate_doc_id();
        let now = chrono::Utc::now();
        let document = Document {
            id: doc_id.clone(),
            name: input.url.clone(),
            doc_type: DocType::Url.as_str().to_string(),
            status: DocStatus::Processing,
            error: None,
            content_hash: None,
            product_id: input.product_id.clone(),
            created_at: now,
        };
        self.metadata.insert_document(&document)?;

        let result = self.ingest_url(&doc_id, &input.url, &input.product_id).await;
        match result {
            Ok(stats) => {
                self.metadata.update_status(&doc_id, DocStatus::Success, None)?;
                let document = self.metadata.get_document(&doc_id)?.ok_or_else(|| CoreError::Store("document vanished after success".to_string()))?;
                Ok(DocumentInfo { document, stats: Some(stats) })
            }
            Err(e) => {
                self.fail(&doc_id, &e.to_string())?;
                let document = self.metadata.get_document(&doc_id)?.ok_or_else(|| CoreError::Store("document vanished after failure".to_string()))?;
                Ok(DocumentInfo { document, stats: None })
            }
        }
    }

    async fn ingest_url(&self, doc_id: &str, url: &str, product_id: &str) -> Result<ImportStats> {
        let page = self.url_fetcher.fetch(url).await?;

        let parsed = if url_fetch::looks_like_html(page.content_type.as_deref(), &page.body) {
            parsers::parse(DocType::Html, &page.body)?
        } else {
            let text = String::from_utf8_lossy(&page.body).to_string();
            crate::types::ParsedDocument { text, images: Vec::new() }
        };

        if parsed.text.is_empty() && parsed.images.is_empty() {
            return Err(CoreError::Parse("empty content".to_string()));
        }

        self.check_and_set_content_hash(doc_id, &parsed.text)?;

        if !parsed.text.is_empty() {
            self.chunk_embed_store(doc_id, url, &parsed.text, product_id).await?;
        }

        let image_count = self.store_images(doc_id, url, &parsed.images, product_id).await;

        Ok(ImportStats { text_chars: parsed.text.chars().count(), image_count })
    }

    /// Truncates extracted text to a caller-facing preview, matching the
    /// 5000-character cap used for URL ingestion summaries.
    pub fn preview(text: &str) -> String {
        let mut preview: String = text.chars().take(PREVIEW_CHARS).collect();
        if text.chars().count() > PREVIEW_CHARS {
            preview.push_str("…");
        }
        preview
    }

    // ── delete / list ──────────────────────────────────────────────────

    pub async fn delete_document(&self, doc_id: &str) -> Result<()> {
        if !sanitize::is_safe_doc_id(doc_id) {
            return Err(CoreError::Validation("doc_id contains an unsafe path component".to_string()));
        }

        {
            let store = self.vector_store.lock().await;
            store.delete_by_document(doc_id).await?;
        }
        self.metadata.delete_document_cascade(doc_id)?;

        let upload_dir = self.data_dir.join("uploads").join(doc_id);
        if let Err(e) = std::fs::remove_dir_all(&upload_dir) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(document_id = %doc_id, error = %e, "failed to remove uploaded file directory");
            }
        }

        Ok(())
    }

    pub fn list_documents(&self, product_id: &str) -> Result<Vec<Document>> {
        self.metadata.list_documents(product_id)
    }

    // ── video dispatch ─────────────────────────────────────────────────

    /// Spawns the supervised video pipeline and awaits it with the 30-minute
    /// deadline; the panic protection is two-layered: `tokio::spawn` isolates
    /// a panic inside the pipeline task itself (caught via `JoinError`), and
    /// this outer future is itself run from a context the caller protects in
    /// the same way.
    async fn dispatch_video(self: &Arc<Self>, doc_id: String, doc_name: String, data: Vec<u8>, product_id: String) {
        let video_config = self.video_config().await;
        let manager = Arc::clone(self);
        let task_doc_id = doc_id.clone();

        let outcome = tokio::time::timeout(
            VIDEO_DEADLINE,
            tokio::spawn(async move { crate::video::process_video(manager, task_doc_id, doc_name, data, product_id, video_config).await }),
        )
        .await;

        let final_result = match outcome {
            Ok(Ok(inner)) => inner,
            Ok(Err(join_err)) => Err(CoreError::Store(format!("video pipeline task panicked: {join_err}"))),
            Err(_) => Err(CoreError::Timeout("video processing timeout".to_string())),
        };

        match final_result {
            Ok(()) => {
                if let Err(e) = self.metadata.update_status(&doc_id, DocStatus::Success, None) {
                    tracing::error!(document_id = %doc_id, error = %e, "failed to mark video document success");
                }
            }
            Err(e) => {
                tracing::error!(document_id = %doc_id, error = %e, "video ingestion failed");
                if let Err(store_err) = self.metadata.update_status(&doc_id, DocStatus::Failed, Some(&e.to_string())) {
                    tracing::error!(document_id = %doc_id, error = %store_err, "failed to mark video document failed");
                }
            }
        }
    }

    /// Direct access used by the video pipeline to persist chunks through
    /// the same dedup/embed/store path as non-video ingestion.
    pub async fn store_vector_chunks(&self, chunks: &[VectorChunk]) -> Result<()> {
        let mut store = self.vector_store.lock().await;
        store.store(chunks).await
    }

    pub fn insert_chunk_metadata(&self, chunk: &Chunk) -> Result<()> {
        self.metadata.insert_chunk(chunk)
    }
}
