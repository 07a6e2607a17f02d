//! Cross-module scenario tests for the Document Manager and Video Pipeline:
//! upload/dedup/delete round trips, the URL fetcher's SSRF gate, and the
//! video pipeline's configuration gate and happy path.

use std::sync::Arc;
use std::time::Duration;

use tempfile::tempdir;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use ingestcore::config::{ChunkingConfig, Config, EmbeddingConfig, LlmConfig, VideoConfig};
use ingestcore::document_manager::DocumentManager;
use ingestcore::types::{Chunk, DocStatus, FileInput, Keyframe, TranscriptSegmentText, UrlInput};
use ingestcore::video::pipeline;
use ingestcore::CoreError;

const EMBED_DIM: usize = 4;

fn test_config(data_dir: &std::path::Path, embedding_endpoint: &str, llm_endpoint: &str) -> Config {
    Config {
        data_dir: data_dir.to_string_lossy().to_string(),
        embedding: EmbeddingConfig {
            endpoint: embedding_endpoint.to_string(),
            api_key: None,
            model: "test-embed".to_string(),
            batch_cap: 256,
            dimensions: EMBED_DIM,
        },
        llm: LlmConfig { endpoint: llm_endpoint.to_string(), api_key: None, model: "test-chat".to_string() },
        chunking: ChunkingConfig { chunk_size: 64, overlap: 8 },
        video: VideoConfig::default(),
        default_product_id: String::new(),
    }
}

/// Responds to a batch `/embeddings` call with one distinct vector per input
/// text, so tests can count embedding calls by counting response entries.
struct BatchEmbedResponder;

impl Respond for BatchEmbedResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
        let count = body["input"].as_array().map(|a| a.len()).unwrap_or(1);
        let data: Vec<serde_json::Value> = (0..count)
            .map(|i| serde_json::json!({"embedding": vec![(i as f32) + 1.0; EMBED_DIM], "index": i}))
            .collect();
        ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": data}))
    }
}

/// Responds to a `/embeddings/multimodal` call with a single fixed vector.
struct MultimodalEmbedResponder;

impl Respond for MultimodalEmbedResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": {"embedding": vec![0.5f32; EMBED_DIM]}}))
    }
}

/// Responds to a `/chat/completions` call with a fixed OCR transcription.
struct ChatResponder;

impl Respond for ChatResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        ResponseTemplate::new(200)
            .set_body_json(serde_json::json!({"choices": [{"message": {"content": "a frame of video"}}]}))
    }
}

async fn mock_embedding_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(wiremock::matchers::method("POST"))
        .and(wiremock::matchers::path("/embeddings"))
        .respond_with(BatchEmbedResponder)
        .mount(&server)
        .await;
    Mock::given(wiremock::matchers::method("POST"))
        .and(wiremock::matchers::path("/embeddings/multimodal"))
        .respond_with(MultimodalEmbedResponder)
        .mount(&server)
        .await;
    server
}

async fn mock_llm_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(wiremock::matchers::method("POST"))
        .and(wiremock::matchers::path("/chat/completions"))
        .respond_with(ChatResponder)
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn upload_file_round_trips_markdown_text() {
    let data_dir = tempdir().unwrap();
    let embed_server = mock_embedding_server().await;
    let config = test_config(data_dir.path(), &embed_server.uri(), "http://unused.invalid");
    let manager = Arc::new(DocumentManager::new(&config).await.unwrap());

    let info = manager
        .upload_file(FileInput {
            file_name: "notes.md".to_string(),
            file_data: b"# Title\n\nSome body text about a topic.".to_vec(),
            file_type: "markdown".to_string(),
            product_id: "acme".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(info.document.status, DocStatus::Success);
    assert_eq!(info.document.product_id, "acme");
    let stats = info.stats.unwrap();
    assert!(stats.text_chars > 0);

    let docs = manager.list_documents("acme").unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].id, info.document.id);
}

#[tokio::test]
async fn duplicate_content_is_rejected_by_document_level_dedup() {
    let data_dir = tempdir().unwrap();
    let embed_server = mock_embedding_server().await;
    let config = test_config(data_dir.path(), &embed_server.uri(), "http://unused.invalid");
    let manager = Arc::new(DocumentManager::new(&config).await.unwrap());

    let body = b"# Title\n\nIdentical content every time.".to_vec();

    let first = manager
        .upload_file(FileInput { file_name: "a.md".to_string(), file_data: body.clone(), file_type: "markdown".to_string(), product_id: "acme".to_string() })
        .await
        .unwrap();
    assert_eq!(first.document.status, DocStatus::Success);

    let second = manager
        .upload_file(FileInput { file_name: "b.md".to_string(), file_data: body, file_type: "markdown".to_string(), product_id: "acme".to_string() })
        .await
        .unwrap();
    assert_eq!(second.document.status, DocStatus::Failed);
    assert!(second.document.error.is_some());
}

#[tokio::test]
async fn upload_url_rejects_urls_resolving_to_blocked_addresses() {
    let data_dir = tempdir().unwrap();
    let config = test_config(data_dir.path(), "http://unused.invalid", "http://unused.invalid");
    let manager = Arc::new(DocumentManager::new(&config).await.unwrap());

    let result = manager.upload_url(UrlInput { url: "http://127.0.0.1:9/secret".to_string(), product_id: "acme".to_string() }).await;

    // Rejection happens before any document row is written, so this is a
    // hard error rather than a `failed`-status document.
    assert!(result.is_err());
    assert!(matches!(result.unwrap_err(), CoreError::Validation(_)));
    assert!(manager.list_documents("acme").unwrap().is_empty());
}

#[tokio::test]
async fn upload_url_records_a_failed_document_when_a_redirect_targets_a_blocked_address() {
    let data_dir = tempdir().unwrap();
    let config = test_config(data_dir.path(), "http://unused.invalid", "http://unused.invalid");
    let mut manager = DocumentManager::new(&config).await.unwrap();

    // The starting URL must pass SSRF validation (an ordinary-looking
    // public host), so its hostname is resolved straight to the mock
    // server's loopback address rather than being a literal blocked IP.
    let redirect_server = MockServer::start().await;
    Mock::given(wiremock::matchers::method("GET"))
        .and(wiremock::matchers::path("/start"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "http://10.0.0.1/"))
        .mount(&redirect_server)
        .await;

    let public_host = "public-looking.ingestcore-test.invalid";
    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .resolve(public_host, *redirect_server.address())
        .build()
        .unwrap();
    manager.set_url_fetcher(ingestcore::url_fetch::UrlFetcher::with_client(client));
    let manager = Arc::new(manager);

    let info = manager.upload_url(UrlInput { url: format!("http://{public_host}/start"), product_id: "acme".to_string() }).await.unwrap();

    assert_eq!(info.document.status, DocStatus::Failed);
    assert!(info.document.error.as_deref().unwrap_or("").contains("redirect blocked"));
    assert!(manager.list_documents("acme").unwrap().iter().any(|d| d.id == info.document.id));
}

#[tokio::test]
async fn products_are_isolated_by_list_filter() {
    let data_dir = tempdir().unwrap();
    let embed_server = mock_embedding_server().await;
    let config = test_config(data_dir.path(), &embed_server.uri(), "http://unused.invalid");
    let manager = Arc::new(DocumentManager::new(&config).await.unwrap());

    manager
        .upload_file(FileInput { file_name: "a.md".to_string(), file_data: b"# A\n\nContent for tenant A.".to_vec(), file_type: "markdown".to_string(), product_id: "tenant-a".to_string() })
        .await
        .unwrap();
    manager
        .upload_file(FileInput { file_name: "b.md".to_string(), file_data: b"# B\n\nContent for tenant B.".to_vec(), file_type: "markdown".to_string(), product_id: "tenant-b".to_string() })
        .await
        .unwrap();

    let tenant_a_docs = manager.list_documents("tenant-a").unwrap();
    assert_eq!(tenant_a_docs.len(), 1);
    assert_eq!(tenant_a_docs[0].product_id, "tenant-a");

    let tenant_b_docs = manager.list_documents("tenant-b").unwrap();
    assert_eq!(tenant_b_docs.len(), 1);
    assert_eq!(tenant_b_docs[0].product_id, "tenant-b");
}

#[tokio::test]
async fn deleting_a_document_removes_its_chunks_and_upload() {
    let data_dir = tempdir().unwrap();
    let embed_server = mock_embedding_server().await;
    let config = test_config(data_dir.path(), &embed_server.uri(), "http://unused.invalid");
    let manager = Arc::new(DocumentManager::new(&config).await.unwrap());

    let info = manager
        .upload_file(FileInput { file_name: "gone.md".to_string(), file_data: b"# Gone\n\nSoon to be deleted.".to_vec(), file_type: "markdown".to_string(), product_id: "acme".to_string() })
        .await
        .unwrap();

    let upload_dir = data_dir.path().join("uploads").join(&info.document.id);
    assert!(upload_dir.exists());

    manager.delete_document(&info.document.id).await.unwrap();

    assert!(manager.metadata().get_document(&info.document.id).unwrap().is_none());
    assert_eq!(manager.metadata().count_chunks_for_document(&info.document.id).unwrap(), 0);
    assert!(!upload_dir.exists());
}

#[tokio::test]
async fn video_upload_fails_fast_when_no_external_tools_are_configured() {
    let data_dir = tempdir().unwrap();
    let embed_server = mock_embedding_server().await;
    let config = test_config(data_dir.path(), &embed_server.uri(), "http://unused.invalid");
    let manager = Arc::new(DocumentManager::new(&config).await.unwrap());

    let info = manager
        .upload_file(FileInput { file_name: "clip.mp4".to_string(), file_data: vec![0u8; 16], file_type: "mp4".to_string(), product_id: "acme".to_string() })
        .await
        .unwrap();
    assert_eq!(info.document.status, DocStatus::Processing);

    // The pipeline runs on a detached task; poll briefly for it to settle.
    let mut final_status = None;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        let doc = manager.metadata().get_document(&info.document.id).unwrap().unwrap();
        if doc.status != DocStatus::Processing {
            final_status = Some(doc);
            break;
        }
    }

    let doc = final_status.expect("video document did not settle within the poll window");
    assert_eq!(doc.status, DocStatus::Failed);
    assert!(doc.error.as_deref().unwrap_or("").contains("video retrieval not enabled"));
}

#[tokio::test]
async fn video_pipeline_phases_store_transcript_and_keyframe_chunks() {
    let data_dir = tempdir().unwrap();
    let embed_server = mock_embedding_server().await;
    let llm_server = mock_llm_server().await;
    let config = test_config(data_dir.path(), &embed_server.uri(), &llm_server.uri());
    let manager = DocumentManager::new(&config).await.unwrap();

    let transcript = vec![
        TranscriptSegmentText { start: 0.0, end: 5.0, text: "Welcome to the demo.".to_string() },
        TranscriptSegmentText { start: 5.0, end: 10.0, text: "Here is the main feature.".to_string() },
    ];
    let keyframes = vec![
        Keyframe { timestamp: 0.0, filepath: data_dir.path().join("frame_0000.jpg"), data: vec![1, 2, 3] },
        Keyframe { timestamp: 10.0, filepath: data_dir.path().join("frame_0001.jpg"), data: vec![4, 5, 6] },
    ];

    let transcript_stored = pipeline::phase1_transcript(&manager, "doc-1", "clip.mp4", "acme", &transcript, 10.0).await.unwrap();
    assert_eq!(transcript_stored, 1);

    let keyframe_stored = pipeline::phase2_keyframes(&manager, "doc-1", "clip.mp4", "acme", &keyframes).await;
    assert_eq!(keyframe_stored, 2);

    // OCR is off by default in production but the phase function itself is
    // exercised directly here against a mocked LLM endpoint.
    let ocr_stored = pipeline::phase3_ocr(&manager, "doc-1", "clip.mp4", "acme", &keyframes, 1).await.unwrap();
    assert!(ocr_stored > 0);

    let total_chunks = manager.metadata().count_chunks_for_document("doc-1").unwrap();
    assert_eq!(total_chunks, 1 + 2 + 1);
    let total_segments = manager.metadata().count_video_segments_for_document("doc-1").unwrap();
    assert_eq!(total_segments, 1 + 2);
}

#[tokio::test]
async fn chunk_embed_store_reuses_embeddings_for_identical_text() {
    let data_dir = tempdir().unwrap();
    let embed_server = mock_embedding_server().await;
    let config = test_config(data_dir.path(), &embed_server.uri(), "http://unused.invalid");
    let manager = DocumentManager::new(&config).await.unwrap();

    let stored = manager.chunk_embed_store("doc-a", "a.md", "A short passage of reusable text.", "acme").await.unwrap();
    assert!(stored > 0);

    let requests_after_first = embed_server.received_requests().await.unwrap().iter().filter(|r| r.url.path() == "/embeddings").count();
    assert_eq!(requests_after_first, 1);

    // A second document re-using the same chunk text should succeed and
    // store the same number of chunks, reusing the cached embedding rather
    // than calling the embedding endpoint again.
    let stored_again = manager.chunk_embed_store("doc-b", "b.md", "A short passage of reusable text.", "acme").await.unwrap();
    assert_eq!(stored_again, stored);

    let requests_after_second = embed_server.received_requests().await.unwrap().iter().filter(|r| r.url.path() == "/embeddings").count();
    assert_eq!(requests_after_second, requests_after_first, "identical chunk text must not trigger a second /embeddings call");
}

#[test]
fn chunk_type_is_constructible_with_expected_fields() {
    let chunk = Chunk {
        id: "c1".to_string(),
        document_id: "d1".to_string(),
        document_name: "d.md".to_string(),
        chunk_index: 0,
        chunk_text: "text".to_string(),
        embedding: Some(vec![0.0; EMBED_DIM]),
        image_url: None,
        product_id: "acme".to_string(),
    };
    assert_eq!(chunk.chunk_index, 0);
}
