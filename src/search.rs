//! Scoped similarity search for `crag search`.

use anyhow::Result;

use content_rag_core::models::SOURCE_KEY;

use crate::client::RagClient;
use crate::config::Config;

pub async fn run_search(
    config: &Config,
    query: &str,
    owner: &str,
    category: Option<&str>,
    limit: Option<usize>,
) -> Result<()> {
    let client = RagClient::open(config).await?;
    let results = client.search(query, owner, category, limit).await;
    client.close().await;
    let results = results?;

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, doc) in results.iter().enumerate() {
        println!("{}. {}", i + 1, excerpt(&doc.text, 160));
        if let Some(source) = doc.metadata.get(SOURCE_KEY) {
            println!("    source: {}", source);
        }
        println!();
    }

    Ok(())
}

/// First `max_chars` characters on one line.
fn excerpt(text: &str, max_chars: usize) -> String {
    let flat = text.replace('\n', " ");
    let flat = flat.trim();
    match flat.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("\"{}…\"", &flat[..cut]),
        None => format!("\"{}\"", flat),
    }
}
