//! Video ingestion: orchestrates the external parser and the three
//! concurrent pipeline phases on top of its output.

pub mod parser;
pub mod pipeline;

use std::sync::Arc;

use crate::config::VideoConfig;
use crate::document_manager::DocumentManager;
use crate::error::{CoreError, Result};

/// Entry point spawned by the Document Manager's video dispatcher. Runs to
/// completion or is cut off by the caller's deadline; this function itself
/// has no timeout logic of its own.
pub async fn process_video(
    manager: Arc<DocumentManager>,
    doc_id: String,
    doc_name: String,
    data: Vec<u8>,
    product_id: String,
    video_config: VideoConfig,
) -> Result<()> {
    if !video_config.is_configured() {
        return Err(CoreError::Validation("video retrieval not enabled".to_string()));
    }

    let temp_path = std::env::temp_dir().join(format!("ingestcore_video_src_{}", crate::sanitize::generate_doc_id()));
    std::fs::write(&temp_path, &data)?;
    let parsed = parser::parse(&temp_path, &video_config).await;
    if let Err(e) = std::fs::remove_file(&temp_path) {
        tracing::warn!(document_id = %doc_id, error = %e, "failed to remove source video temp file");
    }
    let parsed = parsed?;

    // All three phases are spawned up front, so they run concurrently as
    // sibling tasks; only the joining below is sequential.
    let transcript_handle = spawn_phase({
        let manager = Arc::clone(&manager);
        let doc_id = doc_id.clone();
        let doc_name = doc_name.clone();
        let product_id = product_id.clone();
        let transcript = parsed.transcript.clone();
        let duration = parsed.duration;
        async move { pipeline::phase1_transcript(&manager, &doc_id, &doc_name, &product_id, &transcript, duration).await }
    });

    let keyframe_handle = spawn_phase({
        let manager = Arc::clone(&manager);
        let doc_id = doc_id.clone();
        let doc_name = doc_name.clone();
        let product_id = product_id.clone();
        let keyframes = parsed.keyframes.clone();
        async move { Ok(pipeline::phase2_keyframes(&manager, &doc_id, &doc_name, &product_id, &keyframes).await) }
    });

    let ocr_handle = video_config.ocr_enabled.then(|| {
        spawn_phase({
            let manager = Arc::clone(&manager);
            let doc_id = doc_id.clone();
            let doc_name = doc_name.clone();
            let product_id = product_id.clone();
            let keyframes = parsed.keyframes.clone();
            let ocr_max_frames = video_config.ocr_max_frames;
            async move { pipeline::phase3_ocr(&manager, &doc_id, &doc_name, &product_id, &keyframes, ocr_max_frames).await }
        })
    });

    let (transcript_stored, keyframe_stored, ocr_stored) = tokio::join!(
        join_phase("transcript", &doc_id, transcript_handle),
        join_phase("keyframe_embed", &doc_id, keyframe_handle),
        async {
            match ocr_handle {
                Some(handle) => join_phase("keyframe_ocr", &doc_id, handle).await,
                None => 0,
            }
        }
    );

    let no_keyframes = parsed.keyframes.is_empty();

    // The parser read every keyframe's bytes into memory up front so the
    // temp directory could be removed; once every phase has had its chance
    // to read them, let the allocator reclaim the buffers.
    drop(parsed);

    if transcript_stored == 0 && keyframe_stored == 0 && ocr_stored == 0 && no_keyframes {
        tracing::info!(document_id = %doc_id, "video pipeline produced no artifacts, falling back to filename chunk");
        manager.chunk_embed_store(&doc_id, &doc_name, &format!("video file: {doc_name}"), &product_id).await?;
    }

    Ok(())
}

/// Spawns one pipeline phase onto its own task so a panic inside it can't
/// take down the others. The task starts running immediately; joining it is
/// a separate step so all three phases can be spawned before any are awaited.
fn spawn_phase<F>(future: F) -> tokio::task::JoinHandle<Result<usize>>
where
    F: std::future::Future<Output = Result<usize>> + Send + 'static,
{
    tokio::spawn(future)
}

/// Awaits a spawned phase, turning a phase error or panic into zero stored
/// artifacts rather than failing the whole document.
async fn join_phase(label: &'static str, doc_id: &str, handle: tokio::task::JoinHandle<Result<usize>>) -> usize {
    match handle.await {
        Ok(Ok(count)) => count,
        Ok(Err(e)) => {
            tracing::error!(document_id = %doc_id, phase = label, error = %e, "video pipeline phase failed");
            0
        }
        Err(join_err) => {
            tracing::error!(document_id = %doc_id, phase = label, error = %join_err, "video pipeline phase panicked");
            0
        }
    }
}
