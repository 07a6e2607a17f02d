//! Core data model: `Document`, `Chunk`, `VideoSegment`, and the request/result
//! shapes the Document Manager exchanges with its callers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocStatus {
    Processing,
    Success,
    Failed,
}

impl fmt::Display for DocStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DocStatus::Processing => "processing",
            DocStatus::Success => "success",
            DocStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

impl FromStr for DocStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(DocStatus::Processing),
            "success" => Ok(DocStatus::Success),
            "failed" => Ok(DocStatus::Failed),
            other => Err(format!("unknown document status: {other}")),
        }
    }
}

/// A document's declared file type. `Url` is a virtual type assigned to
/// content ingested via `upload_url` rather than `upload_file`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocType {
    Pdf,
    Word,
    Excel,
    Ppt,
    Markdown,
    Html,
    Mp4,
    Avi,
    Mkv,
    Mov,
    Webm,
    Url,
}

impl DocType {
    pub fn from_lower(s: &str) -> Option<Self> {
        Some(match s {
            "pdf" => DocType::Pdf,
            "word" => DocType::Word,
            "excel" => DocType::Excel,
            "ppt" => DocType::Ppt,
            "markdown" => DocType::Markdown,
            "html" => DocType::Html,
            "mp4" => DocType::Mp4,
            "avi" => DocType::Avi,
            "mkv" => DocType::Mkv,
            "mov" => DocType::Mov,
            "webm" => DocType::Webm,
            "url" => DocType::Url,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocType::Pdf => "pdf",
            DocType::Word => "word",
            DocType::Excel => "excel",
            DocType::Ppt => "ppt",
            DocType::Markdown => "markdown",
            DocType::Html => "html",
            DocType::Mp4 => "mp4",
            DocType::Avi => "avi",
            DocType::Mkv => "mkv",
            DocType::Mov => "mov",
            DocType::Webm => "webm",
            DocType::Url => "url",
        }
    }

    pub fn is_video(&self) -> bool {
        matches!(self, DocType::Mp4 | DocType::Avi | DocType::Mkv | DocType::Mov | DocType::Webm)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub name: String,
    pub doc_type: String,
    pub status: DocStatus,
    pub error: Option<String>,
    pub content_hash: Option<String>,
    pub product_id: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub document_name: String,
    pub chunk_index: i64,
    pub chunk_text: String,
    pub embedding: Option<Vec<f32>>,
    pub image_url: Option<String>,
    pub product_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentType {
    Transcript,
    Keyframe,
}

impl fmt::Display for SegmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentType::Transcript => write!(f, "transcript"),
            SegmentType::Keyframe => write!(f, "keyframe"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoSegment {
    pub id: String,
    pub document_id: String,
    pub segment_type: SegmentType,
    pub start_time: f64,
    pub end_time: f64,
    pub content: String,
    pub chunk_id: String,
}

/// A chunk of text paired with its embedding, ready for the vector store.
/// Built by `chunk_embed_store` and the Video Pipeline phases.
#[derive(Debug, Clone)]
pub struct VectorChunk {
    pub chunk_text: String,
    pub chunk_index: i64,
    pub document_id: String,
    pub document_name: String,
    pub vector: Vec<f32>,
    pub image_url: Option<String>,
    pub product_id: String,
}

#[derive(Debug, Clone)]
pub struct FileInput {
    pub file_name: String,
    pub file_data: Vec<u8>,
    pub file_type: String,
    pub product_id: String,
}

#[derive(Debug, Clone)]
pub struct UrlInput {
    pub url: String,
    pub product_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportStats {
    pub text_chars: usize,
    pub image_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub document: Document,
    pub stats: Option<ImportStats>,
}

/// A single ASR output unit with a time range. `start == end == 0.0` is used
/// by the video parser for a segment whose exact timing is unknown and must
/// be synthesized downstream from the full video duration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub start: f64,
    pub end: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSegmentText {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct Keyframe {
    pub timestamp: f64,
    pub filepath: std::path::PathBuf,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct ParseResult {
    pub transcript: Vec<TranscriptSegmentText>,
    pub keyframes: Vec<Keyframe>,
    pub duration: f64,
}

/// Raw image bytes extracted from a non-video document (e.g. an embedded
/// figure in a PDF or a referenced `<img>` in HTML), prior to being saved
/// under `images/` and given a stable URL.
#[derive(Debug, Clone)]
pub struct ParsedImage {
    pub data: Vec<u8>,
    pub alt: String,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedDocument {
    pub text: String,
    pub images: Vec<ParsedImage>,
}
