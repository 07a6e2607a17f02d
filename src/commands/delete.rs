//! Delete command handler

use anyhow::Result;

use ingestcore::document_manager::DocumentManager;
use ingestcore::Config;

pub async fn run_delete(config: &Config, doc_id: &str) -> Result<()> {
    let manager = DocumentManager::new(config).await?;
    manager.delete_document(doc_id).await?;
    println!("Deleted document: {doc_id}");
    Ok(())
}
