use anyhow::{Context, Result, bail};
use tracing::info;

use crate::cli::{RulesArgs, SectionsArgs, ShowArgs};
use crate::commands::load_database;

pub fn run_sections(args: SectionsArgs) -> Result<()> {
    let database = load_database(&args.cache_root, args.db_path.as_ref())?;
    info!(sections = database.sections().len(), "listing sections");

    for section in database.sections() {
        println!("{}\t{} rules", section.id, section.rules.len());
    }

    Ok(())
}

pub fn run_rules(args: RulesArgs) -> Result<()> {
    let database = load_database(&args.cache_root, args.db_path.as_ref())?;
    let Some(section) = database.section(&args.section) else {
        bail!("section {} not found in rule database", args.section);
    };

    for record in &section.rules {
        println!("{}\t{}", record.id, record.title);
    }

    Ok(())
}

pub fn run_show(args: ShowArgs) -> Result<()> {
    let database = load_database(&args.cache_root, args.db_path.as_ref())?;
    let Some(record) = database.rule(&args.rule) else {
        bail!("rule {} not found in rule database", args.rule);
    };

    let mut value = serde_json::to_value(record)
        .with_context(|| format!("failed to serialize rule {}", record.id))?;
    if let Some(leaf) = value.as_object_mut() {
        leaf.insert("id".to_string(), serde_json::Value::String(record.id.clone()));
    }

    let rendered =
        serde_json::to_string_pretty(&value).context("failed to render rule record")?;
    println!("{rendered}");

    Ok(())
}
