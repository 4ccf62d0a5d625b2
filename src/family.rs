use crate::cli::Family;

/// Which `RuleRecord` field a section label feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSlot {
    ProfileApplicability,
    Description,
    Rationale,
    Audit,
    Remediation,
    DefaultValue,
    References,
    CisControls,
}

/// Per-document-family pattern table. Numbering depth, label order and
/// running-header text all vary between benchmark families, so none of
/// it is inferred from the document.
#[derive(Debug)]
pub struct FamilyConfig {
    pub id: &'static str,
    /// Rule-id depths accepted as boundary candidates (`7.1.13` = 3).
    pub accepted_depths: &'static [usize],
    /// Leading id components forming the section grouping key.
    pub section_depth: usize,
    /// Field labels in the order they appear within a rule span. The
    /// first label doubles as the rule-boundary anchor.
    pub field_labels: &'static [(&'static str, FieldSlot)],
    /// Running header/footer lines to strip, matched per line.
    pub header_patterns: &'static [&'static str],
    pub bullet_glyphs: &'static [char],
    /// Bare utility names recognized as commands at line start.
    pub audit_utilities: &'static [&'static str],
    pub remediation_utilities: &'static [&'static str],
    /// Script-start markers for shebang blocks and synthesized-script
    /// trimming, in preference order.
    pub shebang_markers: &'static [&'static str],
}

const CIS_FIELD_LABELS: &[(&str, FieldSlot)] = &[
    ("Profile Applicability:", FieldSlot::ProfileApplicability),
    ("Description:", FieldSlot::Description),
    ("Rationale:", FieldSlot::Rationale),
    ("Audit:", FieldSlot::Audit),
    ("Remediation:", FieldSlot::Remediation),
    ("Default Value:", FieldSlot::DefaultValue),
    ("References:", FieldSlot::References),
    ("CIS Controls:", FieldSlot::CisControls),
];

const CIS_SHEBANG_MARKERS: &[&str] = &["#!/bin/bash", "#!/usr/bin/env bash", "#!~/bin/bash"];

static CIS_LINUX: FamilyConfig = FamilyConfig {
    id: "cis-linux",
    accepted_depths: &[3, 4],
    section_depth: 1,
    field_labels: CIS_FIELD_LABELS,
    header_patterns: &[r"^CIS .+ Benchmark$"],
    bullet_glyphs: &['•', '●'],
    audit_utilities: &[
        "stat", "find", "cat", "grep", "awk", "ls", "sysctl", "systemctl", "ss", "findmnt",
    ],
    remediation_utilities: &[
        "chmod", "chown", "find", "stat", "mkdir", "rm", "cp", "mv", "ln", "touch", "cat",
        "systemctl", "sysctl", "usermod", "sed",
    ],
    shebang_markers: CIS_SHEBANG_MARKERS,
};

static FLAT: FamilyConfig = FamilyConfig {
    id: "flat",
    accepted_depths: &[2],
    section_depth: 1,
    field_labels: CIS_FIELD_LABELS,
    header_patterns: &[r"^CIS .+ Benchmark$"],
    bullet_glyphs: &['•', '●'],
    audit_utilities: &[
        "stat", "find", "cat", "grep", "awk", "ls", "sysctl", "systemctl", "ss", "findmnt",
    ],
    remediation_utilities: &[
        "chmod", "chown", "find", "stat", "mkdir", "rm", "cp", "mv", "ln", "touch", "cat",
        "systemctl", "sysctl", "usermod", "sed",
    ],
    shebang_markers: CIS_SHEBANG_MARKERS,
};

impl FamilyConfig {
    pub fn for_family(family: Family) -> &'static Self {
        match family {
            Family::CisLinux => &CIS_LINUX,
            Family::Flat => &FLAT,
        }
    }

    /// The boundary anchor is the first expected label.
    pub fn anchor_label(&self) -> &'static str {
        self.field_labels[0].0
    }

    pub fn labels(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.field_labels.iter().map(|(label, _)| *label)
    }
}
