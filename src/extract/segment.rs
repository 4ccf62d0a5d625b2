use std::collections::HashSet;

use tracing::warn;

use crate::family::FamilyConfig;
use crate::model::{Anomaly, AnomalyKind, RuleId};

/// One rule's slice of the normalized document: id, title line and the
/// raw text from its "Profile Applicability:" anchor up to the next
/// boundary.
#[derive(Debug, Clone)]
pub struct RuleSpan {
    pub id: RuleId,
    pub title: String,
    pub automated: Option<bool>,
    pub text: String,
}

#[derive(Debug)]
struct Boundary {
    id: RuleId,
    title: String,
    automated: Option<bool>,
    line_index: usize,
}

/// Scans normalized text for rule boundaries and slices it into per-rule
/// spans. A boundary is the full triple: an id line of an accepted depth,
/// a title on the same line, and the anchor label opening the next line.
/// Numeric-looking tokens without the anchor are not boundaries; ids
/// routinely appear inside command text and references.
pub fn segment(text: &str, family: &FamilyConfig) -> (Vec<RuleSpan>, Vec<Anomaly>) {
    let lines: Vec<&str> = text.lines().collect();
    let anchor = family.anchor_label();

    let mut boundaries = Vec::<Boundary>::new();
    for (index, line) in lines.iter().enumerate() {
        let anchored = lines
            .get(index + 1)
            .map(|next| next.trim_start().starts_with(anchor))
            .unwrap_or(false);
        if !anchored {
            continue;
        }

        if let Some(boundary) = parse_boundary_line(line, index, family) {
            boundaries.push(boundary);
        }
    }

    let mut spans = Vec::<RuleSpan>::new();
    let mut anomalies = Vec::<Anomaly>::new();
    let mut seen = HashSet::<String>::new();
    let mut last_kept: Option<RuleId> = None;

    for (position, boundary) in boundaries.iter().enumerate() {
        let span_end = boundaries
            .get(position + 1)
            .map(|next| next.line_index)
            .unwrap_or(lines.len());
        let rule_id = boundary.id.to_string();

        if !seen.insert(rule_id.clone()) {
            warn!(rule_id = %rule_id, "duplicate rule id, keeping first occurrence");
            anomalies.push(Anomaly {
                kind: AnomalyKind::DuplicateRuleId,
                rule_id,
                detail: "same id appears more than once; later occurrence discarded".to_string(),
            });
            continue;
        }

        if let Some(previous) = &last_kept {
            if boundary.id <= *previous {
                warn!(rule_id = %rule_id, previous = %previous, "rule id out of document order");
                anomalies.push(Anomaly {
                    kind: AnomalyKind::OutOfOrderRuleId,
                    rule_id: rule_id.clone(),
                    detail: format!("follows {previous} but does not compare greater"),
                });
            }
        }
        last_kept = Some(boundary.id.clone());

        spans.push(RuleSpan {
            id: boundary.id.clone(),
            title: boundary.title.clone(),
            automated: boundary.automated,
            text: lines[boundary.line_index + 1..span_end].join("\n"),
        });
    }

    (spans, anomalies)
}

fn parse_boundary_line(line: &str, line_index: usize, family: &FamilyConfig) -> Option<Boundary> {
    let trimmed = line.trim_start();
    let (token, rest) = trimmed.split_once(char::is_whitespace)?;

    let id = RuleId::parse(token)?;
    if !family.accepted_depths.contains(&id.depth()) {
        return None;
    }

    let (title, automated) = strip_automation_marker(rest.trim());
    if title.is_empty() {
        return None;
    }

    Some(Boundary {
        id,
        title,
        automated,
        line_index,
    })
}

fn strip_automation_marker(title: &str) -> (String, Option<bool>) {
    if let Some(stripped) = title.strip_suffix("(Automated)") {
        return (stripped.trim_end().to_string(), Some(true));
    }
    if let Some(stripped) = title.strip_suffix("(Manual)") {
        return (stripped.trim_end().to_string(), Some(false));
    }
    (title.to_string(), None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Family;

    fn cis() -> &'static FamilyConfig {
        FamilyConfig::for_family(Family::CisLinux)
    }

    fn span_text(id: &str, title: &str) -> String {
        format!(
            "{id} {title}\nProfile Applicability:\nLevel 1 - Server\nDescription:\nbody of {id}\n"
        )
    }

    #[test]
    fn finds_anchored_boundaries_and_slices_spans() {
        let text = format!(
            "{}{}",
            span_text("7.1.1", "Ensure permissions on /etc/passwd are configured (Automated)"),
            span_text("7.1.2", "Ensure permissions on /etc/shadow are configured (Manual)")
        );

        let (spans, anomalies) = segment(&text, cis());
        assert!(anomalies.is_empty());
        assert_eq!(spans.len(), 2);

        assert_eq!(spans[0].id.to_string(), "7.1.1");
        assert_eq!(
            spans[0].title,
            "Ensure permissions on /etc/passwd are configured"
        );
        assert_eq!(spans[0].automated, Some(true));
        assert!(spans[0].text.starts_with("Profile Applicability:"));
        assert!(spans[0].text.contains("body of 7.1.1"));
        assert!(!spans[0].text.contains("7.1.2 "));

        assert_eq!(spans[1].automated, Some(false));
        assert!(spans[1].text.contains("body of 7.1.2"));
    }

    #[test]
    fn numeric_token_without_anchor_is_not_a_boundary() {
        let text = format!(
            "{}References:\nsee item 9.9.9 for details\n1.2.3 looks like an id but has no anchor\n",
            span_text("7.1.1", "Ensure a thing")
        );

        let (spans, _) = segment(&text, cis());
        assert_eq!(spans.len(), 1);
        assert!(spans[0].text.contains("9.9.9"));
        assert!(spans[0].text.contains("1.2.3"));
    }

    #[test]
    fn rejects_ids_of_unaccepted_depth() {
        let text = "7.1 Too shallow for this family\nProfile Applicability:\nLevel 1\n";
        let (spans, _) = segment(text, cis());
        assert!(spans.is_empty());

        let (spans, _) = segment(text, FamilyConfig::for_family(Family::Flat));
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].id.to_string(), "7.1");
    }

    #[test]
    fn four_level_ids_are_accepted_for_cis_linux() {
        let text = span_text("2.3.1.2", "Ensure a nested rule is handled");
        let (spans, _) = segment(&text, cis());
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].id.to_string(), "2.3.1.2");
    }

    #[test]
    fn duplicate_id_keeps_first_occurrence() {
        let text = format!(
            "{}{}",
            span_text("7.1.1", "First copy"),
            span_text("7.1.1", "Second copy")
        );

        let (spans, anomalies) = segment(&text, cis());
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].title, "First copy");
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].kind, AnomalyKind::DuplicateRuleId);
        assert_eq!(anomalies[0].rule_id, "7.1.1");
    }

    #[test]
    fn out_of_order_id_is_kept_but_recorded() {
        let text = format!(
            "{}{}",
            span_text("7.1.2", "Later rule first"),
            span_text("7.1.1", "Earlier rule second")
        );

        let (spans, anomalies) = segment(&text, cis());
        assert_eq!(spans.len(), 2);
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].kind, AnomalyKind::OutOfOrderRuleId);
    }

    #[test]
    fn consecutive_ids_increase_numerically() {
        let text = format!(
            "{}{}{}",
            span_text("7.1.9", "Ninth"),
            span_text("7.1.10", "Tenth"),
            span_text("7.2.1", "Next subsection")
        );

        let (spans, anomalies) = segment(&text, cis());
        assert!(anomalies.is_empty());
        for pair in spans.windows(2) {
            assert!(pair[0].id < pair[1].id);
        }
    }
}
