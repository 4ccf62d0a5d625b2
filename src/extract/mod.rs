mod command;
mod fields;
mod normalize;
mod segment;

use anyhow::Result;

pub use command::{CommandExtractor, FieldKind};
pub use fields::extract_fields;
pub use normalize::{NormalizeStats, Normalizer};
pub use segment::{RuleSpan, segment};

use crate::family::{FamilyConfig, FieldSlot};
use crate::model::{Anomaly, RuleDatabase, RuleRecord};

/// Result of one document ingestion. The database is rebuilt from
/// scratch on every call; extraction anomalies degrade to partial or
/// empty fields and are reported here rather than aborting.
#[derive(Debug)]
pub struct Extraction {
    pub database: RuleDatabase,
    pub anomalies: Vec<Anomaly>,
    pub stats: NormalizeStats,
}

/// Runs the full pipeline over raw document text: normalize, segment
/// into rule spans, slice each span into labeled fields, then derive
/// command lists from the audit and remediation narratives.
pub fn extract_rules(raw: &str, family: &FamilyConfig) -> Result<Extraction> {
    let normalizer = Normalizer::new(family)?;
    let command_extractor = CommandExtractor::new(family)?;

    let (normalized, stats) = normalizer.normalize(raw);
    let (spans, anomalies) = segment(&normalized, family);

    let labels: Vec<&str> = family.labels().collect();
    let mut database = RuleDatabase::new();

    for span in &spans {
        let record = build_record(span, &labels, family, &command_extractor);
        let section_key = span.id.section_key(family.section_depth);
        database.insert(&section_key, record);
    }

    Ok(Extraction {
        database,
        anomalies,
        stats,
    })
}

fn build_record(
    span: &RuleSpan,
    labels: &[&str],
    family: &FamilyConfig,
    command_extractor: &CommandExtractor<'_>,
) -> RuleRecord {
    let mut record = RuleRecord {
        id: span.id.to_string(),
        title: span.title.clone(),
        automated: span.automated,
        ..RuleRecord::default()
    };

    for ((_, slot), (_, value)) in family
        .field_labels
        .iter()
        .zip(extract_fields(&span.text, labels))
    {
        match slot {
            FieldSlot::ProfileApplicability => record.profile_applicability = value,
            FieldSlot::Description => record.description = value,
            FieldSlot::Rationale => record.rationale = value,
            FieldSlot::Audit => record.audit = value,
            FieldSlot::Remediation => record.remediation = value,
            FieldSlot::DefaultValue => record.default_value = value,
            FieldSlot::References => record.references = value,
            FieldSlot::CisControls => record.cis_controls = value,
        }
    }

    record.audit_command = command_extractor.extract(&record.audit, FieldKind::Audit);
    record.remediation_command =
        command_extractor.extract(&record.remediation, FieldKind::Remediation);

    record
}
