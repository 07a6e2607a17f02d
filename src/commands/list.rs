//! List command handler

use anyhow::Result;

use ingestcore::document_manager::DocumentManager;
use ingestcore::Config;

pub async fn run_list(config: &Config, product_id: &str) -> Result<()> {
    let manager = DocumentManager::new(config).await?;
    let documents = manager.list_documents(product_id)?;

    if documents.is_empty() {
        println!("No documents found.");
        return Ok(());
    }

    println!("Documents:\n");
    for doc in documents {
        println!("  {} [{}] {} ({})", doc.id, doc.status, doc.name, doc.doc_type);
    }

    Ok(())
}
