use std::fs;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cache::ScriptCache;
use crate::cli::StatusArgs;
use crate::commands::{default_db_path, load_database, manifest_dir, script_cache_path};
use crate::model::IngestReport;
use crate::util::read_json_value;

pub fn run(args: StatusArgs) -> Result<()> {
    let db_path = default_db_path(&args.cache_root);
    let cache_path = script_cache_path(&args.cache_root);

    info!(cache_root = %args.cache_root.display(), "status requested");

    if db_path.exists() {
        let database = load_database(&args.cache_root, None)?;
        info!(
            path = %db_path.display(),
            sections = database.sections().len(),
            rules = database.rule_count(),
            "rule database status"
        );
    } else {
        warn!(path = %db_path.display(), "rule database missing");
    }

    match latest_manifest(&args) {
        Some(path) => {
            let value = read_json_value(&path)?;
            let report: IngestReport = serde_json::from_value(value)
                .with_context(|| format!("failed to parse {}", path.display()))?;
            info!(
                run_id = %report.run_id,
                status = %report.status,
                family = %report.family,
                source = %report.source_path,
                rules = report.counts.rules_total,
                anomalies = report.anomalies.len(),
                updated_at = %report.updated_at,
                "latest ingest run"
            );
        }
        None => warn!("no ingest run manifests found"),
    }

    if cache_path.exists() {
        let cache = ScriptCache::open(&cache_path)?;
        info!(
            path = %cache_path.display(),
            scripts = cache.cached_count()?,
            "script cache status"
        );
    } else {
        warn!(path = %cache_path.display(), "script cache missing");
    }

    Ok(())
}

fn latest_manifest(args: &StatusArgs) -> Option<std::path::PathBuf> {
    let entries = fs::read_dir(manifest_dir(&args.cache_root)).ok()?;
    entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .map(|name| name.starts_with("ingest_run_") && name.ends_with(".json"))
                .unwrap_or(false)
        })
        .max()
}
