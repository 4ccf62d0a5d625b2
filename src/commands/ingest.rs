use std::fs;
use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result, anyhow, bail};
use chrono::Utc;
use tracing::{info, warn};

use crate::cli::IngestArgs;
use crate::commands::{default_db_path, manifest_dir};
use crate::extract::extract_rules;
use crate::family::FamilyConfig;
use crate::model::{IngestCounts, IngestReport};
use crate::util::{
    ensure_directory, now_utc_string, sha256_file, utc_compact_string, write_json_pretty,
};

pub fn run(args: IngestArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("run-{}", utc_compact_string(started_ts));

    let manifest_dir = manifest_dir(&args.cache_root);
    ensure_directory(&manifest_dir)?;

    let db_path = args
        .db_path
        .clone()
        .unwrap_or_else(|| default_db_path(&args.cache_root));
    let manifest_path = args.manifest_path.clone().unwrap_or_else(|| {
        manifest_dir.join(format!("ingest_run_{}.json", utc_compact_string(started_ts)))
    });

    let family = FamilyConfig::for_family(args.family);
    info!(
        input = %args.input.display(),
        family = family.id,
        run_id = %run_id,
        "starting ingest"
    );

    let source_sha256 = sha256_file(&args.input)?;
    let (raw_text, pdftotext_version) = extract_document_text(&args.input)?;

    let extraction = extract_rules(&raw_text, family)?;
    for anomaly in &extraction.anomalies {
        warn!(rule_id = %anomaly.rule_id, detail = %anomaly.detail, "extraction anomaly");
    }

    let database_value = extraction.database.to_value()?;
    write_json_pretty(&db_path, &database_value)?;

    let mut counts = IngestCounts {
        sections_total: extraction.database.sections().len(),
        rules_total: extraction.database.rule_count(),
        rules_with_audit_commands: extraction
            .database
            .rules()
            .filter(|record| !record.audit_command.is_empty())
            .count(),
        rules_with_remediation_commands: extraction
            .database
            .rules()
            .filter(|record| !record.remediation_command.is_empty())
            .count(),
        ..IngestCounts::default()
    };
    extraction.stats.apply_to(&mut counts);

    let report = IngestReport {
        manifest_version: 1,
        run_id: run_id.clone(),
        status: "completed".to_string(),
        started_at,
        updated_at: now_utc_string(),
        family: family.id.to_string(),
        source_path: args.input.display().to_string(),
        source_sha256,
        pdftotext_version,
        db_path: db_path.display().to_string(),
        counts,
        anomalies: extraction.anomalies,
    };
    write_json_pretty(&manifest_path, &report)?;

    info!(path = %db_path.display(), rules = report.counts.rules_total, "wrote rule database");
    info!(path = %manifest_path.display(), "wrote ingest run manifest");

    if report.counts.rules_total == 0 {
        warn!("no rule boundaries found; database is empty");
    }

    Ok(())
}

/// Resolves the source document into raw text. `.txt` inputs are read
/// directly; anything else goes through `pdftotext`. A document that
/// cannot be decoded into text is fatal for the whole ingestion.
fn extract_document_text(input: &Path) -> Result<(String, Option<String>)> {
    let is_plain_text = input
        .extension()
        .and_then(|extension| extension.to_str())
        .map(|extension| extension.eq_ignore_ascii_case("txt"))
        .unwrap_or(false);

    if is_plain_text {
        let raw =
            fs::read(input).with_context(|| format!("failed to read {}", input.display()))?;
        let text = String::from_utf8(raw)
            .map_err(|_| anyhow!("document is not valid UTF-8 text: {}", input.display()))?;
        return Ok((text, None));
    }

    let output = Command::new("pdftotext")
        .arg("-layout")
        .arg(input)
        .arg("-")
        .output()
        .with_context(|| format!("failed to execute pdftotext for {}", input.display()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "pdftotext returned non-zero exit status for {}: {}",
            input.display(),
            stderr.trim()
        );
    }

    let text = String::from_utf8(output.stdout)
        .map_err(|_| anyhow!("pdftotext produced non-UTF-8 output for {}", input.display()))?;
    if text.trim().is_empty() {
        bail!("no text recovered from {}", input.display());
    }

    Ok((text, pdftotext_version()))
}

fn pdftotext_version() -> Option<String> {
    // pdftotext prints its version banner on stderr.
    let output = Command::new("pdftotext").arg("-v").output().ok()?;
    String::from_utf8_lossy(&output.stderr)
        .lines()
        .next()
        .map(|line| line.trim().to_string())
}
