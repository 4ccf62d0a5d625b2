use std::fmt;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Dotted hierarchical rule identifier, e.g. `7.1.13` or `2.3.1.2`.
/// Ordering is segment-wise numeric, so `7.1.9 < 7.1.10`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleId {
    parts: Vec<u64>,
}

impl RuleId {
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = Vec::new();
        for segment in raw.split('.') {
            if segment.is_empty() || !segment.bytes().all(|byte| byte.is_ascii_digit()) {
                return None;
            }
            parts.push(segment.parse::<u64>().ok()?);
        }
        if parts.is_empty() {
            return None;
        }
        Some(Self { parts })
    }

    pub fn depth(&self) -> usize {
        self.parts.len()
    }

    /// Grouping key formed from the first `depth` components.
    pub fn section_key(&self, depth: usize) -> String {
        let take = depth.clamp(1, self.parts.len());
        self.parts[..take]
            .iter()
            .map(u64::to_string)
            .collect::<Vec<String>>()
            .join(".")
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = self
            .parts
            .iter()
            .map(u64::to_string)
            .collect::<Vec<String>>()
            .join(".");
        formatter.write_str(&rendered)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleRecord {
    #[serde(skip)]
    pub id: String,
    pub title: String,
    pub profile_applicability: String,
    pub description: String,
    pub rationale: String,
    pub audit: String,
    pub remediation: String,
    pub default_value: String,
    pub references: String,
    pub cis_controls: String,
    pub audit_command: Vec<String>,
    pub remediation_command: Vec<String>,
    /// `Some(true)` for an `(Automated)` title marker, `Some(false)` for
    /// `(Manual)`, absent when the source carries neither.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub automated: Option<bool>,
}

/// Rules belonging to one top-level section, in document order.
#[derive(Debug, Clone)]
pub struct SectionGroup {
    pub id: String,
    pub rules: Vec<RuleRecord>,
}

/// The root artifact of ingestion. Sections and rules keep document
/// order; records are never mutated after insertion.
#[derive(Debug, Clone, Default)]
pub struct RuleDatabase {
    sections: Vec<SectionGroup>,
}

impl RuleDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, section_key: &str, record: RuleRecord) {
        match self
            .sections
            .iter_mut()
            .find(|section| section.id == section_key)
        {
            Some(section) => section.rules.push(record),
            None => self.sections.push(SectionGroup {
                id: section_key.to_string(),
                rules: vec![record],
            }),
        }
    }

    pub fn sections(&self) -> &[SectionGroup] {
        &self.sections
    }

    pub fn section(&self, key: &str) -> Option<&SectionGroup> {
        self.sections.iter().find(|section| section.id == key)
    }

    pub fn rule(&self, id: &str) -> Option<&RuleRecord> {
        self.sections
            .iter()
            .flat_map(|section| section.rules.iter())
            .find(|record| record.id == id)
    }

    pub fn rules(&self) -> impl Iterator<Item = &RuleRecord> {
        self.sections.iter().flat_map(|section| section.rules.iter())
    }

    pub fn rule_count(&self) -> usize {
        self.sections.iter().map(|section| section.rules.len()).sum()
    }

    /// Persisted form: object keyed by section id, each value holding a
    /// `sub_rules` object keyed by full rule id.
    pub fn to_value(&self) -> Result<Value> {
        let mut root = Map::new();
        for section in &self.sections {
            let mut sub_rules = Map::new();
            for record in &section.rules {
                let leaf = serde_json::to_value(record)
                    .with_context(|| format!("failed to serialize rule {}", record.id))?;
                sub_rules.insert(record.id.clone(), leaf);
            }

            let mut entry = Map::new();
            entry.insert("sub_rules".to_string(), Value::Object(sub_rules));
            root.insert(section.id.clone(), Value::Object(entry));
        }
        Ok(Value::Object(root))
    }

    pub fn from_value(value: &Value) -> Result<Self> {
        let Some(root) = value.as_object() else {
            bail!("rule database root must be a json object");
        };

        let mut database = Self::new();
        for (section_id, entry) in root {
            let sub_rules = entry
                .get("sub_rules")
                .and_then(Value::as_object)
                .with_context(|| format!("section {section_id} is missing sub_rules"))?;

            for (rule_id, leaf) in sub_rules {
                let mut record: RuleRecord = serde_json::from_value(leaf.clone())
                    .with_context(|| format!("failed to parse rule {rule_id}"))?;
                record.id = rule_id.clone();
                database.insert(section_id, record);
            }
        }

        Ok(database)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    DuplicateRuleId,
    OutOfOrderRuleId,
}

/// Recoverable extraction irregularity, recorded for operator visibility
/// but never fatal to the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anomaly {
    pub kind: AnomalyKind,
    pub rule_id: String,
    pub detail: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestCounts {
    pub sections_total: usize,
    pub rules_total: usize,
    pub rules_with_audit_commands: usize,
    pub rules_with_remediation_commands: usize,
    pub bullet_lines_stripped: usize,
    pub page_number_lines_removed: usize,
    pub header_lines_removed: usize,
    pub dehyphenation_merges: usize,
    pub blank_runs_collapsed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub manifest_version: u32,
    pub run_id: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub family: String,
    pub source_path: String,
    pub source_sha256: String,
    pub pdftotext_version: Option<String>,
    pub db_path: String,
    pub counts: IngestCounts,
    pub anomalies: Vec<Anomaly>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_id_orders_numerically_not_lexically() {
        let earlier = RuleId::parse("7.1.9").unwrap();
        let later = RuleId::parse("7.1.10").unwrap();
        assert!(earlier < later);

        let shallow = RuleId::parse("2.3").unwrap();
        let deep = RuleId::parse("2.3.1.2").unwrap();
        assert!(shallow < deep);
    }

    #[test]
    fn rule_id_rejects_non_numeric_segments() {
        assert!(RuleId::parse("7.1.a").is_none());
        assert!(RuleId::parse("7..1").is_none());
        assert!(RuleId::parse("").is_none());
        assert!(RuleId::parse("7.1.").is_none());
    }

    #[test]
    fn section_key_takes_leading_components() {
        let id = RuleId::parse("2.3.1.2").unwrap();
        assert_eq!(id.section_key(1), "2");
        assert_eq!(id.section_key(2), "2.3");
        assert_eq!(id.section_key(9), "2.3.1.2");
    }

    #[test]
    fn database_round_trips_through_persisted_form() {
        let mut database = RuleDatabase::new();
        database.insert(
            "7",
            RuleRecord {
                id: "7.1.1".to_string(),
                title: "Ensure permissions on /etc/passwd are configured".to_string(),
                audit_command: vec!["stat /etc/passwd".to_string()],
                automated: Some(true),
                ..RuleRecord::default()
            },
        );
        database.insert(
            "7",
            RuleRecord {
                id: "7.1.2".to_string(),
                title: "Ensure permissions on /etc/shadow are configured".to_string(),
                ..RuleRecord::default()
            },
        );

        let value = database.to_value().unwrap();
        let reloaded = RuleDatabase::from_value(&value).unwrap();

        assert_eq!(reloaded.sections().len(), 1);
        assert_eq!(reloaded.rule_count(), 2);
        let first = reloaded.rule("7.1.1").unwrap();
        assert_eq!(first.audit_command, vec!["stat /etc/passwd"]);
        assert_eq!(first.automated, Some(true));
        assert!(reloaded.rule("7.1.2").unwrap().automated.is_none());

        let ids: Vec<&str> = reloaded.rules().map(|record| record.id.as_str()).collect();
        assert_eq!(ids, vec!["7.1.1", "7.1.2"]);
    }
}
