//! Shell Transcript Handling
//!
//! Interactive switch shells echo every command after a prompt such as
//! `switch(config-zone)# `. This module strips echoes and prompts from a
//! captured transcript and finds the first line the switch flagged as an
//! error, attributing it to the command that produced it.

/// A cleaned interactive transcript
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    /// Output lines with prompts and echoed commands removed
    pub output: String,
    /// First (command, error line) pair the switch reported
    pub error: Option<(String, String)>,
}

/// Split a prompt line into the command echoed after it.
///
/// Accepts `host#`, `host# cmd` and `host(config-mode)# cmd`.
pub fn split_prompt(line: &str) -> Option<&str> {
    let idx = line.find('#')?;
    let head = &line[..idx];
    let host = match head.find('(') {
        Some(open) => {
            let mode = &head[open..];
            if !mode.ends_with(')') || mode.len() < 3 {
                return None;
            }
            &head[..open]
        }
        None => head,
    };
    let valid_host = !host.is_empty()
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !valid_host {
        return None;
    }
    Some(line[idx + 1..].trim())
}

/// True for lines NX-OS uses to reject a command
pub fn is_error_line(line: &str) -> bool {
    let line = line.trim();
    line.starts_with('%') || line.contains("Invalid command") || line.contains("ERROR")
}

/// Clean a raw interactive transcript
pub fn parse_transcript(raw: &str) -> Transcript {
    let mut transcript = Transcript::default();
    let mut last_command = String::new();
    let mut lines = Vec::new();

    for line in raw.lines() {
        let line = line.trim_end_matches('\r');
        if let Some(echo) = split_prompt(line) {
            last_command = echo.to_string();
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }
        if transcript.error.is_none() && is_error_line(line) {
            transcript.error = Some((last_command.clone(), line.trim().to_string()));
        }
        lines.push(line);
    }

    transcript.output = lines.join("\n");
    transcript
}
