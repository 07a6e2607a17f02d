//! The three concurrent phases that turn a parsed video into stored,
//! searchable chunks: transcript text, keyframe image embeddings, and
//! keyframe OCR/scene descriptions.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::stream::{self, StreamExt};

use crate::document_manager::DocumentManager;
use crate::error::Result;
use crate::sanitize;
use crate::types::{Chunk, Keyframe, SegmentType, TranscriptSegmentText, VectorChunk, VideoSegment};

const KEYFRAME_EMBED_TIMEOUT: Duration = Duration::from_secs(60);
const KEYFRAME_OCR_TIMEOUT: Duration = Duration::from_secs(3 * 60);
const KEYFRAME_WORKERS: usize = 4;
const OCR_WORKERS: usize = 3;

const OCR_PROMPT: &str = "Transcribe any visible text and briefly describe the scene in this video frame.";

/// Phase 1: joins transcript text, chunks it, embeds, and stores it, with
/// each chunk mapped back to the transcript segment(s) it overlaps.
pub async fn phase1_transcript(
    manager: &DocumentManager,
    doc_id: &str,
    doc_name: &str,
    product_id: &str,
    transcript: &[TranscriptSegmentText],
    duration: f64,
) -> Result<usize> {
    let joined = transcript.iter().map(|s| s.text.trim()).filter(|t| !t.is_empty()).collect::<Vec<_>>().join(" ");
    if joined.is_empty() {
        return Ok(0);
    }

    let chunks = crate::chunker::split(&joined, manager.chunking_config());
    if chunks.is_empty() {
        return Ok(0);
    }

    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let embeddings = manager.embedding_client().await.embed_batch(&texts).await?;

    let mut vector_chunks = Vec::with_capacity(chunks.len());
    let mut segments = Vec::with_capacity(chunks.len());

    for (chunk, vector) in chunks.iter().zip(embeddings) {
        let chunk_index = chunk.index as i64;
        let (start, end) = time_range_for_text(&chunk.text, transcript, duration);
        let chunk_id = sanitize::generate_doc_id();

        manager.insert_chunk_metadata(&Chunk {
            id: chunk_id.clone(),
            document_id: doc_id.to_string(),
            document_name: doc_name.to_string(),
            chunk_index,
            chunk_text: chunk.text.clone(),
            embedding: Some(vector.clone()),
            image_url: None,
            product_id: product_id.to_string(),
        })?;

        vector_chunks.push(VectorChunk {
            chunk_text: chunk.text.clone(),
            chunk_index,
            document_id: doc_id.to_string(),
            document_name: doc_name.to_string(),
            vector,
            image_url: None,
            product_id: product_id.to_string(),
        });

        segments.push(VideoSegment {
            id: sanitize::generate_doc_id(),
            document_id: doc_id.to_string(),
            segment_type: SegmentType::Transcript,
            start_time: start,
            end_time: end,
            content: chunk.text.clone(),
            chunk_id,
        });
    }

    manager.store_vector_chunks(&vector_chunks).await?;
    manager.metadata().insert_transcript_segments(&segments)?;
    Ok(chunks.len())
}

/// Maps a chunk's text back to the transcript segments it overlaps by
/// substring containment in either direction (a chunk may span multiple
/// short segments, or a segment may span multiple chunks). Falls back to
/// the full video span when nothing matches.
fn time_range_for_text(chunk_text: &str, transcript: &[TranscriptSegmentText], duration: f64) -> (f64, f64) {
    let mut start = f64::MAX;
    let mut end = f64::MIN;
    let mut matched = false;

    for segment in transcript {
        if segment.text.is_empty() {
            continue;
        }
        if chunk_text.contains(segment.text.as_str()) {
            matched = true;
            start = start.min(segment.start);
            end = end.max(segment.end);
        }
    }

    if matched {
        (start, end)
    } else {
        (0.0, duration)
    }
}

/// Phase 2: embeds and stores every keyframe's image, bounded to
/// [`KEYFRAME_WORKERS`] concurrent in-flight embeddings.
pub async fn phase2_keyframes(manager: &DocumentManager, doc_id: &str, doc_name: &str, product_id: &str, keyframes: &[Keyframe]) -> usize {
    if keyframes.is_empty() {
        return 0;
    }

    let concurrency = KEYFRAME_WORKERS.min(keyframes.len());
    let results: Vec<Option<(VectorChunk, VideoSegment)>> = stream::iter(keyframes.iter().enumerate())
        .map(|(i, frame)| embed_and_store_keyframe(manager, doc_id, doc_name, product_id, i, frame))
        .buffer_unordered(concurrency)
        .collect()
        .await;

    let mut vector_chunks = Vec::new();
    for item in results.into_iter().flatten() {
        let (vector_chunk, segment) = item;
        if let Err(e) = manager.metadata().insert_keyframe_segment(&segment) {
            tracing::warn!(document_id = %doc_id, error = %e, "failed to record keyframe segment, skipping");
            continue;
        }
        vector_chunks.push(vector_chunk);
    }

    if vector_chunks.is_empty() {
        return 0;
    }
    let stored = vector_chunks.len();
    if let Err(e) = manager.store_vector_chunks(&vector_chunks).await {
        tracing::warn!(document_id = %doc_id, error = %e, "failed to store keyframe embedding vectors");
        return 0;
    }
    stored
}

async fn embed_and_store_keyframe(
    manager: &DocumentManager,
    doc_id: &str,
    doc_name: &str,
    product_id: &str,
    index: usize,
    frame: &Keyframe,
) -> Option<(VectorChunk, VideoSegment)> {
    let data_url = format!("data:image/jpeg;base64,{}", STANDARD.encode(&frame.data));

    let embedding = match tokio::time::timeout(KEYFRAME_EMBED_TIMEOUT, manager.embedding_client().await.embed_image_url(&data_url)).await {
        Ok(Ok(vector)) => vector,
        Ok(Err(e)) => {
            tracing::warn!(document_id = %doc_id, timestamp = frame.timestamp, error = %e, "keyframe embedding failed, skipping");
            return None;
        }
        Err(_) => {
            tracing::warn!(document_id = %doc_id, timestamp = frame.timestamp, "keyframe embedding timed out, skipping");
            return None;
        }
    };

    let image_url = manager.save_image(&frame.data).unwrap_or_else(|e| {
        tracing::warn!(document_id = %doc_id, error = %e, "failed to save keyframe, falling back to temp path");
        frame.filepath.to_string_lossy().to_string()
    });

    let chunk_index = 10_000 + index as i64;
    let chunk_text = format!("[video keyframe: {}s]", frame.timestamp);
    let chunk_id = sanitize::generate_doc_id();

    if let Err(e) = manager.insert_chunk_metadata(&Chunk {
        id: chunk_id.clone(),
        document_id: doc_id.to_string(),
        document_name: doc_name.to_string(),
        chunk_index,
        chunk_text: chunk_text.clone(),
        embedding: Some(embedding.clone()),
        image_url: Some(image_url.clone()),
        product_id: product_id.to_string(),
    }) {
        tracing::warn!(document_id = %doc_id, error = %e, "failed to record keyframe chunk metadata, skipping");
        return None;
    }

    let vector_chunk = VectorChunk {
        chunk_text,
        chunk_index,
        document_id: doc_id.to_string(),
        document_name: doc_name.to_string(),
        vector: embedding,
        image_url: Some(image_url.clone()),
        product_id: product_id.to_string(),
    };
    let segment = VideoSegment {
        id: sanitize::generate_doc_id(),
        document_id: doc_id.to_string(),
        segment_type: SegmentType::Keyframe,
        start_time: frame.timestamp,
        end_time: frame.timestamp,
        content: image_url,
        chunk_id,
    };

    Some((vector_chunk, segment))
}

/// Picks `ocr_max_frames` indices uniformly across `total` keyframes.
pub fn ocr_sample_indices(total: usize, ocr_max_frames: usize) -> Vec<usize> {
    if total == 0 || ocr_max_frames == 0 {
        return Vec::new();
    }
    if total <= ocr_max_frames {
        return (0..total).collect();
    }
    if ocr_max_frames == 1 {
        return vec![total / 2];
    }
    (0..ocr_max_frames).map(|j| j * (total - 1) / (ocr_max_frames - 1)).collect()
}

struct OcrResult {
    frame_index: usize,
    timestamp: f64,
    text: String,
}

/// Phase 3: runs LLM OCR/scene-description over the sampled frames, then
/// chunks and stores the concatenated, frame-ordered output.
pub async fn phase3_ocr(
    manager: &DocumentManager,
    doc_id: &str,
    doc_name: &str,
    product_id: &str,
    keyframes: &[Keyframe],
    ocr_max_frames: usize,
) -> Result<usize> {
    let indices = ocr_sample_indices(keyframes.len(), ocr_max_frames);
    if indices.is_empty() {
        return Ok(0);
    }

    let concurrency = OCR_WORKERS.min(indices.len());
    let mut results: Vec<OcrResult> = stream::iter(indices.into_iter())
        .map(|i| ocr_one_frame(manager, doc_id, &keyframes[i], i))
        .buffer_unordered(concurrency)
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .flatten()
        .collect();

    if results.is_empty() {
        return Ok(0);
    }
    results.sort_by_key(|r| r.frame_index);

    let joined = results.iter().map(|r| format!("[video {}s] {}", r.timestamp, r.text)).collect::<Vec<_>>().join("\n\n");

    let chunks = crate::chunker::split(&joined, manager.chunking_config());
    if chunks.is_empty() {
        return Ok(0);
    }

    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let embeddings = manager.embedding_client().await.embed_batch(&texts).await?;

    let mut vector_chunks = Vec::with_capacity(chunks.len());
    for (chunk, vector) in chunks.iter().zip(embeddings) {
        let chunk_index = 20_000 + chunk.index as i64;
        manager.insert_chunk_metadata(&Chunk {
            id: sanitize::generate_doc_id(),
            document_id: doc_id.to_string(),
            document_name: doc_name.to_string(),
            chunk_index,
            chunk_text: chunk.text.clone(),
            embedding: Some(vector.clone()),
            image_url: None,
            product_id: product_id.to_string(),
        })?;
        vector_chunks.push(VectorChunk {
            chunk_text: chunk.text.clone(),
            chunk_index,
            document_id: doc_id.to_string(),
            document_name: doc_name.to_string(),
            vector,
            image_url: None,
            product_id: product_id.to_string(),
        });
    }

    let stored = vector_chunks.len();
    manager.store_vector_chunks(&vector_chunks).await?;
    Ok(stored)
}

async fn ocr_one_frame(manager: &DocumentManager, doc_id: &str, frame: &Keyframe, frame_index: usize) -> Option<OcrResult> {
    let data_url = format!("data:image/jpeg;base64,{}", STANDARD.encode(&frame.data));
    let llm = manager.llm_client().await;

    match tokio::time::timeout(KEYFRAME_OCR_TIMEOUT, llm.complete_with_image(OCR_PROMPT, &data_url)).await {
        Ok(Ok(text)) => Some(OcrResult { frame_index, timestamp: frame.timestamp, text }),
        Ok(Err(e)) => {
            tracing::warn!(document_id = %doc_id, frame_index, error = %e, "keyframe OCR failed, skipping");
            None
        }
        Err(_) => {
            tracing::warn!(document_id = %doc_id, frame_index, "keyframe OCR timed out, skipping");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ocr_sampling_covers_small_sets_entirely() {
        assert_eq!(ocr_sample_indices(5, 20), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn ocr_sampling_picks_middle_frame_for_single_slot() {
        assert_eq!(ocr_sample_indices(10, 1), vec![5]);
    }

    #[test]
    fn ocr_sampling_spans_the_full_range() {
        let indices = ocr_sample_indices(100, 20);
        assert_eq!(indices.first(), Some(&0));
        assert_eq!(indices.last(), Some(&99));
        assert_eq!(indices.len(), 20);
    }

    #[test]
    fn empty_keyframes_yield_no_samples() {
        assert!(ocr_sample_indices(0, 20).is_empty());
    }

    #[test]
    fn time_range_falls_back_to_full_span_when_unmatched() {
        let transcript = vec![TranscriptSegmentText { start: 1.0, end: 2.0, text: "unrelated".to_string() }];
        let (start, end) = time_range_for_text("totally different text", &transcript, 42.0);
        assert_eq!((start, end), (0.0, 42.0));
    }

    #[test]
    fn time_range_matches_containing_segment() {
        let transcript = vec![
            TranscriptSegmentText { start: 0.0, end: 5.0, text: "hello world".to_string() },
            TranscriptSegmentText { start: 5.0, end: 10.0, text: "goodbye".to_string() },
        ];
        let (start, end) = time_range_for_text("hello world goodbye", &transcript, 100.0);
        assert_eq!((start, end), (0.0, 10.0));
    }

    #[test]
    fn time_range_falls_back_to_full_span_for_a_single_oversized_segment() {
        // A single joined ASR segment longer than any one chunk must not
        // match via "segment contains chunk" — that would collapse every
        // chunk's range to the segment's own (0.0, 0.0) timing.
        let transcript = vec![TranscriptSegmentText { start: 0.0, end: 0.0, text: "one long segment spanning the entire video transcript".to_string() }];
        let (start, end) = time_range_for_text("one long segment", &transcript, 120.0);
        assert_eq!((start, end), (0.0, 120.0));
    }
}
