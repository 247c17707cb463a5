//! CLI command implementations. Each prints its result to stdout.

use std::path::Path;

use anyhow::{Context, Result};

use memory_vault_core::models::RetrievedChunk;

use crate::app::{build_vault, guess_content_type};
use crate::auth::Authenticator;
use crate::config::Config;
use crate::gemini;

/// Characters of chunk text shown per search result.
const SNIPPET_CHARS: usize = 240;

pub async fn run_ingest(
    config: &Config,
    path: &Path,
    owner: &str,
    content_type: Option<String>,
) -> Result<()> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "upload".to_string());
    let content_type =
        content_type.unwrap_or_else(|| guess_content_type(&file_name).to_string());

    let vault = build_vault(config).await?;
    let doc = vault
        .upload(owner, &file_name, &content_type, &bytes)
        .await?;

    println!("Indexed {} ({} bytes, {})", file_name, bytes.len(), content_type);
    println!("  id:     {}", doc.id);
    println!("  path:   {}", doc.storage_path);
    println!("  status: {}", doc.status);
    Ok(())
}

fn snippet(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > SNIPPET_CHARS {
        let cut: String = flat.chars().take(SNIPPET_CHARS).collect();
        format!("{}...", cut)
    } else {
        flat
    }
}

fn print_results(results: &[RetrievedChunk]) {
    if results.is_empty() {
        println!("No results.");
        return;
    }
    for (i, r) in results.iter().enumerate() {
        println!(
            "{}. [{:.3}] document {} chunk {}",
            i + 1,
            r.score,
            r.document_id,
            r.chunk_index
        );
        println!("   {}", snippet(&r.text));
    }
}

pub async fn run_search(
    config: &Config,
    query: &str,
    owner: &str,
    limit: Option<usize>,
) -> Result<()> {
    let vault = build_vault(config).await?;
    let results = vault.search(owner, query, limit).await?;
    print_results(&results);
    Ok(())
}

pub async fn run_chat(config: &Config, query: &str, owner: &str) -> Result<()> {
    let vault = build_vault(config).await?;
    let answer = vault.chat(owner, query).await?;
    println!("{}", answer);
    Ok(())
}

pub async fn run_documents(config: &Config, owner: &str) -> Result<()> {
    let vault = build_vault(config).await?;
    let docs = vault.documents(owner).await?;
    if docs.is_empty() {
        println!("No documents.");
        return Ok(());
    }
    for doc in docs {
        let created = chrono::DateTime::from_timestamp(doc.created_at, 0)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| doc.created_at.to_string());
        println!(
            "{}  {:<8}  {}  {}",
            doc.id,
            doc.status.as_str(),
            created,
            doc.file_name
        );
    }
    Ok(())
}

pub async fn run_models(config: &Config) -> Result<()> {
    let base_url = config
        .llm
        .base_url
        .as_deref()
        .filter(|_| config.llm.provider == "gemini");
    let models = gemini::list_models(base_url, config.llm.timeout_secs).await?;
    if models.is_empty() {
        println!("No models support generateContent.");
        return Ok(());
    }
    println!("Models supporting generateContent:");
    for m in models {
        let name = m.name.trim_start_matches("models/");
        match m.display_name {
            Some(display) => println!("  {} ({})", name, display),
            None => println!("  {}", name),
        }
    }
    Ok(())
}

pub fn run_token(config: &Config, owner: &str, ttl_secs: u64) -> Result<()> {
    let auth = Authenticator::from_config(&config.auth)?;
    println!("{}", auth.issue(owner, ttl_secs)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_flattens_and_truncates() {
        assert_eq!(snippet("a\n\nb   c"), "a b c");
        let long = "x".repeat(SNIPPET_CHARS + 10);
        let s = snippet(&long);
        assert!(s.ends_with("..."));
        assert_eq!(s.chars().count(), SNIPPET_CHARS + 3);
    }
}
