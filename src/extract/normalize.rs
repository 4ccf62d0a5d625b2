use anyhow::{Context, Result};
use regex::Regex;

use crate::family::FamilyConfig;
use crate::model::IngestCounts;

#[derive(Debug, Clone, Default)]
pub struct NormalizeStats {
    pub bullet_lines_stripped: usize,
    pub page_number_lines_removed: usize,
    pub header_lines_removed: usize,
    pub dehyphenation_merges: usize,
    pub blank_runs_collapsed: usize,
}

impl NormalizeStats {
    pub fn apply_to(&self, counts: &mut IngestCounts) {
        counts.bullet_lines_stripped = self.bullet_lines_stripped;
        counts.page_number_lines_removed = self.page_number_lines_removed;
        counts.header_lines_removed = self.header_lines_removed;
        counts.dehyphenation_merges = self.dehyphenation_merges;
        counts.blank_runs_collapsed = self.blank_runs_collapsed;
    }
}

/// Cleans raw extracted document text into the canonical line-oriented
/// form the segmenter scans. Passes run in a fixed order; each one must
/// tolerate finding nothing to change, and the full pipeline is
/// idempotent.
pub struct Normalizer {
    header_patterns: Vec<Regex>,
    bullet_glyphs: Vec<char>,
}

impl Normalizer {
    pub fn new(family: &FamilyConfig) -> Result<Self> {
        let header_patterns = family
            .header_patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern)
                    .with_context(|| format!("failed to compile header pattern: {pattern}"))
            })
            .collect::<Result<Vec<Regex>>>()?;

        Ok(Self {
            header_patterns,
            bullet_glyphs: family.bullet_glyphs.to_vec(),
        })
    }

    pub fn normalize(&self, raw: &str) -> (String, NormalizeStats) {
        let mut stats = NormalizeStats::default();
        let mut lines = Vec::<String>::new();

        for line in raw.lines() {
            let (line, stripped) = self.strip_leading_bullets(line);
            if stripped {
                stats.bullet_lines_stripped += 1;
            }

            if is_page_number_line(&line) {
                stats.page_number_lines_removed += 1;
                continue;
            }

            if self.is_running_header(&line) {
                stats.header_lines_removed += 1;
                continue;
            }

            lines.push(line);
        }

        let (mut lines, merges) = merge_hyphenated_lines(lines);
        stats.dehyphenation_merges += merges;

        stats.blank_runs_collapsed = drop_blank_lines(&mut lines);

        // Blank-line removal can expose a new hyphen-split pair.
        let (lines, merges) = merge_hyphenated_lines(lines);
        stats.dehyphenation_merges += merges;

        (lines.join("\n"), stats)
    }

    fn strip_leading_bullets(&self, line: &str) -> (String, bool) {
        let mut rest = line;
        let mut stripped = false;

        loop {
            let trimmed = rest.trim_start();
            match trimmed.chars().next() {
                Some(glyph) if self.bullet_glyphs.contains(&glyph) => {
                    rest = trimmed[glyph.len_utf8()..].trim_start();
                    stripped = true;
                }
                _ => break,
            }
        }

        if stripped {
            (rest.to_string(), true)
        } else {
            (line.to_string(), false)
        }
    }

    fn is_running_header(&self, line: &str) -> bool {
        let trimmed = line.trim();
        !trimmed.is_empty()
            && self
                .header_patterns
                .iter()
                .any(|pattern| pattern.is_match(trimmed))
    }
}

fn is_page_number_line(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty() && trimmed.bytes().all(|byte| byte.is_ascii_digit())
}

/// Undoes justified-text wrapping: a line ending in `word-` followed by a
/// line starting with a word character merges into one line with the
/// hyphen dropped. Merging repeats on the joined line so chains collapse
/// in a single pass.
fn merge_hyphenated_lines(lines: Vec<String>) -> (Vec<String>, usize) {
    let mut merged = Vec::<String>::with_capacity(lines.len());
    let mut merges = 0usize;
    let mut index = 0usize;

    while index < lines.len() {
        let mut current = lines[index].clone();
        index += 1;

        while index < lines.len() && should_merge_hyphenated_pair(&current, &lines[index]) {
            let left = current.trim_end();
            let left = left.strip_suffix('-').unwrap_or(left);
            current = format!("{}{}", left, lines[index]);
            merges += 1;
            index += 1;
        }

        merged.push(current);
    }

    (merged, merges)
}

fn should_merge_hyphenated_pair(current: &str, next: &str) -> bool {
    let left = current.trim_end();
    let Some(before_hyphen) = left.strip_suffix('-') else {
        return false;
    };

    let ends_in_word = before_hyphen
        .chars()
        .last()
        .map(|character| character.is_alphanumeric())
        .unwrap_or(false);
    let starts_with_word = next
        .chars()
        .next()
        .map(|character| character.is_alphanumeric())
        .unwrap_or(false);

    ends_in_word && starts_with_word
}

fn drop_blank_lines(lines: &mut Vec<String>) -> usize {
    let mut runs = 0usize;
    let mut in_run = false;

    for line in lines.iter() {
        if line.trim().is_empty() {
            if !in_run {
                runs += 1;
                in_run = true;
            }
        } else {
            in_run = false;
        }
    }

    lines.retain(|line| !line.trim().is_empty());
    runs
}
