//! Offline chat-export analysis: parse an export file and print stats plus
//! candidate entities as JSON.
//!
//! Usage: `chat_import <export.txt> [import-id]`

use anyhow::{bail, Context, Result};
use rbs_ingest::{
    get_export_stats, load_config_default, parse_chat_export, EntityExtractor,
};
use serde_json::json;

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        bail!("usage: chat_import <export.txt> [import-id]");
    };
    let import_id = args.next().unwrap_or_else(|| "local".to_string());

    let content =
        std::fs::read_to_string(&path).with_context(|| format!("reading chat export {path}"))?;
    let parsed = parse_chat_export(&content);
    if !parsed.success {
        bail!("not a chat export: {}", parsed.errors.join("; "));
    }

    let config = load_config_default()?;
    let extractor = EntityExtractor::with_known_providers(config.known_providers);
    let entities = extractor.extract_from_export(&parsed, &import_id);
    let stats = get_export_stats(&parsed);

    let out = json!({
        "importId": import_id,
        "groupName": parsed.group_name,
        "stats": stats,
        "errors": parsed.errors,
        "entities": entities,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
