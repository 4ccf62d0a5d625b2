/// Slices a rule span into labeled field values. `labels` is the
/// family's authoritative order; matching is literal, case-sensitive
/// substring search. Each found label's value runs to the next label
/// that actually occurs in the span (absent labels are skipped), so a
/// missing subsection never makes its neighbors bleed into each other.
/// Absent labels yield empty values, never errors.
pub fn extract_fields<'a>(span: &str, labels: &[&'a str]) -> Vec<(&'a str, String)> {
    let mut found = Vec::<(usize, usize, usize)>::new();
    let mut cursor = 0usize;

    for (slot, label) in labels.iter().enumerate() {
        if let Some(offset) = span[cursor..].find(label) {
            let start = cursor + offset;
            found.push((slot, start, start + label.len()));
            cursor = start + label.len();
        }
    }

    let mut values: Vec<(&str, String)> =
        labels.iter().map(|label| (*label, String::new())).collect();

    for (position, (slot, _, value_start)) in found.iter().enumerate() {
        let value_end = found
            .get(position + 1)
            .map(|(_, next_start, _)| *next_start)
            .unwrap_or(span.len());
        values[*slot].1 = span[*value_start..value_end].trim().to_string();
    }

    values
}

#[cfg(test)]
mod tests {
    use super::*;

    const LABELS: &[&str] = &[
        "Profile Applicability:",
        "Description:",
        "Rationale:",
        "Audit:",
        "Remediation:",
        "Default Value:",
        "References:",
        "CIS Controls:",
    ];

    fn value<'a>(fields: &'a [(&str, String)], label: &str) -> &'a str {
        &fields
            .iter()
            .find(|(candidate, _)| *candidate == label)
            .unwrap()
            .1
    }

    #[test]
    fn full_span_yields_every_field() {
        let span = "Profile Applicability:\nLevel 1 - Server\nDescription:\nThe /etc/passwd file contains user account information.\nRationale:\nAttackers could modify accounts.\nAudit:\nRun: stat /etc/passwd\nRemediation:\nRun: chmod 644 /etc/passwd\nDefault Value:\n644\nReferences:\nnone\nCIS Controls:\nv8 3.3";

        let fields = extract_fields(span, LABELS);
        assert_eq!(value(&fields, "Profile Applicability:"), "Level 1 - Server");
        assert_eq!(
            value(&fields, "Description:"),
            "The /etc/passwd file contains user account information."
        );
        assert_eq!(value(&fields, "Rationale:"), "Attackers could modify accounts.");
        assert_eq!(value(&fields, "Audit:"), "Run: stat /etc/passwd");
        assert_eq!(value(&fields, "Remediation:"), "Run: chmod 644 /etc/passwd");
        assert_eq!(value(&fields, "Default Value:"), "644");
        assert_eq!(value(&fields, "References:"), "none");
        assert_eq!(value(&fields, "CIS Controls:"), "v8 3.3");
    }

    #[test]
    fn missing_label_yields_empty_without_bleeding() {
        // No Rationale and no Default Value: Description must stop at
        // Audit, and Remediation must stop at References.
        let span = "Profile Applicability:\nLevel 1\nDescription:\nsome description\nAudit:\naudit text\nRemediation:\nremediation text\nReferences:\nref text";

        let fields = extract_fields(span, LABELS);
        assert_eq!(value(&fields, "Rationale:"), "");
        assert_eq!(value(&fields, "Default Value:"), "");
        assert_eq!(value(&fields, "Description:"), "some description");
        assert_eq!(value(&fields, "Remediation:"), "remediation text");
        assert_eq!(value(&fields, "References:"), "ref text");
        assert_eq!(value(&fields, "CIS Controls:"), "");
    }

    #[test]
    fn last_present_label_runs_to_end_of_span() {
        let span = "Profile Applicability:\nLevel 1\nAudit:\ntail text with no further labels";
        let fields = extract_fields(span, LABELS);
        assert_eq!(value(&fields, "Audit:"), "tail text with no further labels");
    }

    #[test]
    fn empty_span_yields_all_empty_values() {
        let fields = extract_fields("", LABELS);
        assert!(fields.iter().all(|(_, value)| value.is_empty()));
    }
}
