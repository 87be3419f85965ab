//! queryguard entry point.
//!
//! A thin adapter around the library: loads configuration from the
//! environment, reads the schema from a JSON file, generates one query
//! for the request given on the command line, and prints it to stdout.
//! All logging goes to stderr so stdout stays clean for the query.

use anyhow::{Context, Result};
use queryguard::{Config, LlmClient, QueryGenerator, Schema};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let mut args = std::env::args().skip(1);
    let schema_path = args
        .next()
        .context("usage: queryguard <schema.json> <request...>")?;
    let request = args.collect::<Vec<_>>().join(" ");
    if request.is_empty() {
        anyhow::bail!("usage: queryguard <schema.json> <request...>");
    }

    let config = Config::from_env()?;

    let schema_json = std::fs::read_to_string(&schema_path)
        .with_context(|| format!("failed to read schema file {}", schema_path))?;
    let mut schema: Schema =
        serde_json::from_str(&schema_json).context("failed to parse schema file")?;
    schema.dialect = config.dialect;

    let mut client = LlmClient::new(
        config.provider.provider,
        config.provider.api_key.clone(),
        config.provider.model.clone(),
    );
    if let Some(base_url) = &config.provider.base_url {
        client = client.with_base_url(base_url.clone());
    }

    let generator = QueryGenerator::new(Arc::new(client), schema, config.security);

    let result = generator.generate(&request, None).await?;

    for warning in &result.warnings {
        eprintln!("warning: {}", warning);
    }
    eprintln!(
        "operation: {} | tables: {} | complexity: {:?}",
        result.metadata.operation,
        result.metadata.tables.join(", "),
        result.metadata.complexity
    );
    println!("{}", result.query);

    Ok(())
}

/// Initialize tracing subscriber with stderr output.
fn init_logging() {
    let filter = std::env::var("RUST_LOG")
        .map(EnvFilter::new)
        .unwrap_or_else(|_| EnvFilter::new("warn,queryguard=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}
