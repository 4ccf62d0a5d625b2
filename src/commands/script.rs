use std::fs;

use anyhow::{Context, Result, bail};
use tracing::info;

use crate::cache::ScriptCache;
use crate::cli::ScriptArgs;
use crate::commands::{load_database, script_cache_path};
use crate::family::FamilyConfig;
use crate::model::{RuleId, RuleRecord};
use crate::synth::{
    ExternalCommandSynthesizer, ScriptSynthesizer, build_prompt, trim_synthesized_script,
};
use crate::util::ensure_directory;

pub fn run(args: ScriptArgs) -> Result<()> {
    let database = load_database(&args.cache_root, args.db_path.as_ref())?;
    ensure_directory(&args.cache_root)?;
    let cache = ScriptCache::open(&script_cache_path(&args.cache_root))?;

    let family = FamilyConfig::for_family(args.family);
    let synthesizer: Option<Box<dyn ScriptSynthesizer>> = args
        .synth_command
        .clone()
        .map(|command| Box::new(ExternalCommandSynthesizer::new(command)) as Box<dyn ScriptSynthesizer>);

    let script = if args.all {
        let mut combined = String::new();
        for record in database.rules() {
            let script = generate_one(
                &cache,
                synthesizer.as_deref(),
                family,
                record,
                &args.target_os,
            )?;
            combined.push_str(&format!("# Script for {}\n{script}\n\n", record.title));
        }
        if combined.is_empty() {
            bail!("rule database is empty; nothing to generate");
        }
        combined.trim_end().to_string()
    } else {
        let Some(rule_id) = args.rule.as_deref() else {
            bail!("pass --rule <id> or --all");
        };
        let Some(record) = database.rule(rule_id) else {
            bail!("rule {rule_id} not found in rule database");
        };
        generate_one(&cache, synthesizer.as_deref(), family, record, &args.target_os)?
    };

    match &args.output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                ensure_directory(parent)?;
            }
            fs::write(path, &script)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), "wrote script");
        }
        None => println!("{script}"),
    }

    Ok(())
}

/// Serves one rule's script: cache first, synthesis on miss. Unusable
/// synthesis output (no recognizable script marker after trimming) is an
/// error and never enters the cache.
fn generate_one(
    cache: &ScriptCache,
    synthesizer: Option<&dyn ScriptSynthesizer>,
    family: &FamilyConfig,
    record: &RuleRecord,
    target_os: &str,
) -> Result<String> {
    let section_key = RuleId::parse(&record.id)
        .map(|id| id.section_key(family.section_depth))
        .unwrap_or_else(|| record.id.clone());

    cache.get_or_synthesize(&section_key, &record.id, target_os, || {
        let Some(synthesizer) = synthesizer else {
            bail!(
                "no cached script for rule {} on {} and no --synth-command configured",
                record.id,
                target_os
            );
        };

        info!(rule_id = %record.id, target_os, "synthesizing script");
        let prompt = build_prompt(record, target_os)?;
        let raw = synthesizer.synthesize(&prompt)?;
        let script = trim_synthesized_script(&raw, family.shebang_markers);
        if script.is_empty() {
            bail!(
                "synthesis returned no recognizable script for rule {}",
                record.id
            );
        }
        Ok(script)
    })
}
