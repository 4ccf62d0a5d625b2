use std::io::Write;
use std::process::{Command, Stdio};

use anyhow::{Context, Result, bail};

use crate::model::RuleRecord;

/// Boundary of the external text-generation call. Implementations own
/// transport and retry policy; the core only shapes the prompt and
/// recovers the script from whatever comes back.
pub trait ScriptSynthesizer {
    fn synthesize(&self, prompt: &str) -> Result<String>;
}

/// Pipes the prompt into a configured shell command and reads the model
/// output from its stdout.
pub struct ExternalCommandSynthesizer {
    command: String,
}

impl ExternalCommandSynthesizer {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl ScriptSynthesizer for ExternalCommandSynthesizer {
    fn synthesize(&self, prompt: &str) -> Result<String> {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to spawn synthesis command: {}", self.command))?;

        child
            .stdin
            .take()
            .context("synthesis command stdin unavailable")?
            .write_all(prompt.as_bytes())
            .context("failed to write prompt to synthesis command")?;

        let output = child
            .wait_with_output()
            .context("failed to wait for synthesis command")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "synthesis command exited with {}: {}",
                output.status,
                stderr.trim()
            );
        }

        String::from_utf8(output.stdout).context("synthesis command produced non-UTF-8 output")
    }
}

/// Builds the generation prompt from a rule's record and the target OS.
pub fn build_prompt(record: &RuleRecord, target_os: &str) -> Result<String> {
    let payload = serde_json::json!({
        (record.id.clone()): {
            "title": record.title,
            "description": record.description,
            "audit": record.audit,
            "remediation": record.remediation,
        }
    });
    let rendered =
        serde_json::to_string_pretty(&payload).context("failed to serialize prompt payload")?;

    Ok(format!(
        "You are a bash script generator for {target_os} hardening. \
Generate a bash script that implements the following security rule. \
The script must check the current state, report it, and remediate \
deviations per the rule's remediation procedure. Include error handling \
for missing files and permissions that cannot be changed, and comments \
for clarity. Strictly provide only the script, no additional text \
before or after it. Here is the JSON with the rule: {rendered}"
    ))
}

/// Recovers the script boundaries from raw model output: from the first
/// recognized shebang marker to the first closing fence after it, or to
/// end of text. An empty result means the output is unusable, not an
/// empty-but-valid script. No syntax validation happens here.
pub fn trim_synthesized_script(raw: &str, shebang_markers: &[&str]) -> String {
    let start = shebang_markers
        .iter()
        .filter_map(|marker| raw.find(marker))
        .min();
    let Some(start) = start else {
        return String::new();
    };

    let tail = &raw[start..];
    let end = tail.find("```").unwrap_or(tail.len());
    tail[..end].trim().to_string()
}
