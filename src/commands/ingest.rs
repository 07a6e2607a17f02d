//! Ingest command handlers

use anyhow::{bail, Result};
use std::path::Path;
use std::sync::Arc;

use ingestcore::document_manager::DocumentManager;
use ingestcore::types::{DocStatus, FileInput, UrlInput};
use ingestcore::Config;

/// Maps a file extension to the format tag `DocumentManager::upload_file`
/// expects. The extension itself is never passed through to the parser.
fn file_type_for_extension(ext: &str) -> Option<&'static str> {
    Some(match ext.to_ascii_lowercase().as_str() {
        "pdf" => "pdf",
        "doc" | "docx" => "word",
        "xls" | "xlsx" => "excel",
        "ppt" | "pptx" => "ppt",
        "md" | "markdown" => "markdown",
        "html" | "htm" => "html",
        "mp4" => "mp4",
        "avi" => "avi",
        "mkv" => "mkv",
        "mov" => "mov",
        "webm" => "webm",
        _ => return None,
    })
}

pub async fn run_ingest_file(config: &Config, path: &Path, product_id: &str) -> Result<()> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let Some(file_type) = file_type_for_extension(ext) else {
        bail!("unsupported file extension: .{ext}");
    };

    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("upload").to_string();
    let file_data = std::fs::read(path)?;

    println!("Connecting to document manager...");
    let manager = Arc::new(DocumentManager::new(config).await?);

    println!("Ingesting: {}\n", path.display());
    let info = manager
        .upload_file(FileInput { file_name, file_data, file_type: file_type.to_string(), product_id: product_id.to_string() })
        .await?;

    print_result(&info);
    Ok(())
}

pub async fn run_ingest_url(config: &Config, url: &str, product_id: &str) -> Result<()> {
    println!("Connecting to document manager...");
    let manager = DocumentManager::new(config).await?;

    println!("Fetching: {url}\n");
    let info = manager.upload_url(UrlInput { url: url.to_string(), product_id: product_id.to_string() }).await?;

    print_result(&info);
    Ok(())
}

fn print_result(info: &ingestcore::DocumentInfo) {
    match info.document.status {
        DocStatus::Processing => {
            println!("Document {} is processing in the background (video pipeline).", info.document.id);
        }
        DocStatus::Success => {
            println!("Ingestion complete!");
            println!("  Document id: {}", info.document.id);
            if let Some(stats) = &info.stats {
                println!("  Text chars: {}", stats.text_chars);
                println!("  Images stored: {}", stats.image_count);
            }
        }
        DocStatus::Failed => {
            println!("Ingestion failed: {}", info.document.error.as_deref().unwrap_or("unknown error"));
        }
    }
}
