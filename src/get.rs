//! Scope listing for `crag get`.
//!
//! Prints every stored chunk of an `(owner, category)` scope as a
//! [`ContentUnit`](content_rag_core::ContentUnit), in chunk order.

use anyhow::Result;

use crate::client::RagClient;
use crate::config::Config;

pub async fn run_get(config: &Config, owner: &str, category: Option<&str>) -> Result<()> {
    let client = RagClient::open(config).await?;
    let units = client.get_content(owner, category).await;
    client.close().await;
    let units = units?;

    if units.is_empty() {
        println!("No content.");
        return Ok(());
    }

    println!("--- Content ({} chunks) ---", units.len());
    for (i, unit) in units.iter().enumerate() {
        println!("[chunk {}] {}", i, unit.id);
        println!("owner:    {}", unit.owner);
        if let Some(ref category) = unit.category {
            println!("category: {}", category);
        }
        println!("{}", unit.text);
        println!();
    }

    Ok(())
}
