use std::collections::HashSet;

use anyhow::{Context, Result};
use regex::Regex;

use crate::family::FamilyConfig;

/// Which narrative field the text came from. The reassembly algorithm is
/// shared; only the bare-utility allow-list differs: audit text favors
/// read-only inspection tools, remediation text mutating ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Audit,
    Remediation,
}

/// Finds executable fragments embedded in audit/remediation prose and
/// reassembles them into complete logical commands. All fragment shapes
/// are unioned in first-appearance order; exact duplicates collapse only
/// after continuation merging, since two patterns can match the same
/// half-finished line.
pub struct CommandExtractor<'a> {
    family: &'a FamilyConfig,
    backtick: Regex,
}

impl<'a> CommandExtractor<'a> {
    pub fn new(family: &'a FamilyConfig) -> Result<Self> {
        let backtick =
            Regex::new(r"`([^`\n]+)`").context("failed to compile backtick fragment regex")?;
        Ok(Self { family, backtick })
    }

    pub fn extract(&self, text: &str, kind: FieldKind) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let lines = index_lines(text);
        let mut candidates = Vec::<(usize, String)>::new();

        self.collect_fenced_blocks(&lines, &mut candidates);
        self.collect_shebang_blocks(&lines, &mut candidates);
        collect_brace_blocks(text, &mut candidates);
        self.collect_line_candidates(&lines, kind, &mut candidates);
        self.collect_backtick_fragments(text, &mut candidates);

        candidates.sort_by_key(|(offset, _)| *offset);

        let mut seen = HashSet::<String>::new();
        let mut commands = Vec::<String>::new();
        for (_, candidate) in candidates {
            let candidate = candidate.trim().to_string();
            if candidate.is_empty() {
                continue;
            }
            if seen.insert(candidate.clone()) {
                commands.push(candidate);
            }
        }

        commands
    }

    fn collect_fenced_blocks(&self, lines: &[(usize, &str)], out: &mut Vec<(usize, String)>) {
        let mut index = 0usize;
        while index < lines.len() {
            if !is_fence_line(lines[index].1) {
                index += 1;
                continue;
            }

            let Some(close) = lines[index + 1..]
                .iter()
                .position(|(_, line)| is_fence_line(line))
                .map(|relative| index + 1 + relative)
            else {
                // Unmatched opening fence: nothing to slice.
                break;
            };

            let body = lines[index + 1..close]
                .iter()
                .map(|(_, line)| *line)
                .collect::<Vec<&str>>()
                .join("\n");
            out.push((lines[index].0, body));
            index = close + 1;
        }
    }

    fn collect_shebang_blocks(&self, lines: &[(usize, &str)], out: &mut Vec<(usize, String)>) {
        for (index, (offset, line)) in lines.iter().enumerate() {
            let trimmed = line.trim_start();
            if !self
                .family
                .shebang_markers
                .iter()
                .any(|marker| trimmed.starts_with(marker))
            {
                continue;
            }

            // Block runs to the next non-indented line that follows a
            // blank line, or to end of text.
            let mut end = lines.len();
            for cursor in index + 1..lines.len() {
                let current = lines[cursor].1;
                let previous_blank = lines[cursor - 1].1.trim().is_empty();
                let non_indented = !current.is_empty()
                    && !current.starts_with(' ')
                    && !current.starts_with('\t');
                if previous_blank && non_indented {
                    end = cursor;
                    break;
                }
            }

            let body = lines[index..end]
                .iter()
                .map(|(_, block_line)| *block_line)
                .collect::<Vec<&str>>()
                .join("\n");
            out.push((*offset, body));
        }
    }

    fn collect_line_candidates(
        &self,
        lines: &[(usize, &str)],
        kind: FieldKind,
        out: &mut Vec<(usize, String)>,
    ) {
        let utilities = match kind {
            FieldKind::Audit => self.family.audit_utilities,
            FieldKind::Remediation => self.family.remediation_utilities,
        };
        let mut claimed = vec![false; lines.len()];

        for index in 0..lines.len() {
            if claimed[index] {
                continue;
            }

            let (offset, line) = lines[index];
            let Some(mut candidate) = line_candidate(line, utilities, self.family.shebang_markers)
            else {
                continue;
            };

            // Trailing backslash: the command continues on the next
            // source line, which gets claimed.
            let mut cursor = index;
            loop {
                let Some(stripped) = candidate
                    .trim_end()
                    .strip_suffix('\\')
                    .map(|head| head.trim_end().to_string())
                else {
                    break;
                };

                let Some((_, next_line)) = lines.get(cursor + 1) else {
                    candidate = stripped;
                    break;
                };
                cursor += 1;
                claimed[cursor] = true;

                let continuation = continuation_form(next_line);
                candidate = format!("{stripped} {continuation}");
            }

            out.push((offset, candidate));
        }
    }

    fn collect_backtick_fragments(&self, text: &str, out: &mut Vec<(usize, String)>) {
        for captures in self.backtick.captures_iter(text) {
            if let (Some(whole), Some(inner)) = (captures.get(0), captures.get(1)) {
                out.push((whole.start(), inner.as_str().trim().to_string()));
            }
        }
    }
}

fn index_lines(text: &str) -> Vec<(usize, &str)> {
    let mut lines = Vec::new();
    let mut offset = 0usize;
    for line in text.split('\n') {
        lines.push((offset, line));
        offset += line.len() + 1;
    }
    lines
}

fn is_fence_line(line: &str) -> bool {
    line.trim_start().starts_with("```")
}

fn collect_brace_blocks(text: &str, out: &mut Vec<(usize, String)>) {
    let bytes = text.as_bytes();
    let mut cursor = 0usize;

    while let Some(open) = find_byte(bytes, b'{', cursor) {
        let Some(close) = find_byte(bytes, b'}', open + 1) else {
            break;
        };
        out.push((open, text[open..=close].trim().to_string()));
        cursor = close + 1;
    }
}

fn find_byte(bytes: &[u8], needle: u8, from: usize) -> Option<usize> {
    bytes[from..]
        .iter()
        .position(|byte| *byte == needle)
        .map(|relative| from + relative)
}

fn line_candidate(line: &str, utilities: &[&str], shebang_markers: &[&str]) -> Option<String> {
    let trimmed = line.trim_start();

    // Shebang lines open script blocks; they are not prompt markers.
    if shebang_markers.iter().any(|marker| trimmed.starts_with(marker)) {
        return None;
    }

    if let Some(rest) = trimmed.strip_prefix('#').or_else(|| trimmed.strip_prefix('$')) {
        if rest.starts_with('!') {
            return None;
        }
        let rest = rest.trim();
        if rest.is_empty() {
            return None;
        }
        return Some(rest.to_string());
    }

    let first_token = trimmed.split_whitespace().next()?;
    if utilities.contains(&first_token) {
        return Some(trimmed.trim_end().to_string());
    }

    None
}

fn continuation_form(line: &str) -> String {
    let trimmed = line.trim();
    let unmarked = trimmed
        .strip_prefix('#')
        .or_else(|| trimmed.strip_prefix('$'))
        .filter(|rest| !rest.starts_with('!'))
        .map(str::trim)
        .unwrap_or(trimmed);
    unmarked.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Family;

    fn extractor() -> CommandExtractor<'static> {
        CommandExtractor::new(FamilyConfig::for_family(Family::CisLinux)).unwrap()
    }

    #[test]
    fn merges_backslash_continuation_across_source_lines() {
        let commands = extractor().extract("# chmod 644 \\\n/etc/passwd", FieldKind::Remediation);
        assert_eq!(commands, vec!["chmod 644 /etc/passwd"]);
    }

    #[test]
    fn continuation_consumes_marked_follow_up_lines_once() {
        let commands = extractor().extract(
            "# chown root:root \\\n# /etc/shadow /etc/gshadow",
            FieldKind::Remediation,
        );
        assert_eq!(commands, vec!["chown root:root /etc/shadow /etc/gshadow"]);
    }

    #[test]
    fn prompt_markers_are_stripped() {
        let commands = extractor().extract(
            "Run the following:\n# stat /etc/passwd\n$ sudo systemctl restart sshd",
            FieldKind::Audit,
        );
        assert_eq!(
            commands,
            vec!["stat /etc/passwd", "sudo systemctl restart sshd"]
        );
    }

    #[test]
    fn bare_utilities_depend_on_field_kind() {
        let text = "chmod 600 /boot/grub/grub.cfg\nstat /boot/grub/grub.cfg";

        let audit = extractor().extract(text, FieldKind::Audit);
        assert_eq!(audit, vec!["stat /boot/grub/grub.cfg"]);

        let remediation = extractor().extract(text, FieldKind::Remediation);
        assert_eq!(
            remediation,
            vec!["chmod 600 /boot/grub/grub.cfg", "stat /boot/grub/grub.cfg"]
        );
    }

    #[test]
    fn backtick_fragments_are_extracted_inline() {
        let commands = extractor().extract(
            "Verify with `sysctl kernel.randomize_va_space` before continuing.",
            FieldKind::Audit,
        );
        assert_eq!(commands, vec!["sysctl kernel.randomize_va_space"]);
    }

    #[test]
    fn fenced_block_is_one_candidate() {
        let text = "Run the script below:\n```\numask 027\nsystemctl mask avahi-daemon\n```\ntrailing prose";
        let commands = extractor().extract(text, FieldKind::Remediation);
        assert_eq!(commands[0], "umask 027\nsystemctl mask avahi-daemon");
        // The bare systemctl line inside the fence also matches the
        // utility shape; both survive as distinct reassembled strings.
        assert!(commands.contains(&"systemctl mask avahi-daemon".to_string()));
    }

    #[test]
    fn shebang_block_runs_to_blank_then_unindented_line() {
        let text = "#!/usr/bin/env bash\n  l_mode=$(stat -Lc '%#a' /etc/passwd)\n  echo \"$l_mode\"\n\nNote: review the output above";
        let commands = extractor().extract(text, FieldKind::Audit);
        assert_eq!(
            commands[0],
            "#!/usr/bin/env bash\n  l_mode=$(stat -Lc '%#a' /etc/passwd)\n  echo \"$l_mode\""
        );
        assert!(commands.iter().all(|command| !command.contains("Note:")));
    }

    #[test]
    fn brace_block_is_captured_with_braces() {
        let text = "Run:\n{ sysctl -w kernel.yama.ptrace_scope=1; }\nthen re-check";
        let commands = extractor().extract(text, FieldKind::Remediation);
        assert!(commands.contains(&"{ sysctl -w kernel.yama.ptrace_scope=1; }".to_string()));
    }

    #[test]
    fn duplicates_collapse_only_after_reassembly() {
        // The same command appears as a prompt line and a backtick
        // fragment; one copy survives.
        let text = "# chmod 644 /etc/passwd\nAlternatively run `chmod 644 /etc/passwd` manually.";
        let commands = extractor().extract(text, FieldKind::Remediation);
        assert_eq!(commands, vec!["chmod 644 /etc/passwd"]);
    }

    #[test]
    fn candidates_keep_first_appearance_order() {
        let text = "# find /var -perm -0002\nthen\n$ chmod 644 /etc/motd\nand `cat /etc/issue`";
        let commands = extractor().extract(text, FieldKind::Remediation);
        assert_eq!(
            commands,
            vec![
                "find /var -perm -0002",
                "chmod 644 /etc/motd",
                "cat /etc/issue"
            ]
        );
    }

    #[test]
    fn prose_without_fragments_yields_empty_sequence() {
        let commands = extractor().extract(
            "Review the list and confirm the integrity of these binaries.",
            FieldKind::Audit,
        );
        assert!(commands.is_empty());
    }
}
