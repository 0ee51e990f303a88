//! Line-oriented `KEY=value` patching for shell-style config files
//! (`/etc/default/grub`, `/etc/default/ufw`)
//!
//! This is a text patch, not a parser: a line belongs to `KEY` if it matches
//! `^#?\s*KEY=`, commented-out defaults included.

use anyhow::Result;
use regex::Regex;

fn key_pattern(key: &str) -> Result<Regex> {
    Ok(Regex::new(&format!(r"^#?[ \t]*{}=", regex::escape(key)))?)
}

/// Set `KEY="value"`, replacing every line that assigns (or comments out) `KEY`
///
/// Appends the assignment when no line matches. Returns the content unchanged
/// when the setting is already in place.
pub fn upsert_var(content: &str, key: &str, value: &str) -> Result<String> {
    let pattern = key_pattern(key)?;
    let assignment = format!("{key}=\"{value}\"");

    let mut found = false;
    let mut lines: Vec<&str> = Vec::new();
    for line in content.lines() {
        if pattern.is_match(line) {
            found = true;
            lines.push(&assignment);
        } else {
            lines.push(line);
        }
    }
    if !found {
        lines.push(&assignment);
    }

    let mut out = lines.join("\n");
    out.push('\n');
    Ok(out)
}

/// Read the active (uncommented) value of `KEY`, quotes stripped
///
/// The last assignment wins, as it does when the shell sources the file.
pub fn read_var(content: &str, key: &str) -> Option<String> {
    let prefix = format!("{key}=");
    content
        .lines()
        .map(str::trim_start)
        .filter_map(|line| line.strip_prefix(&prefix))
        .map(|value| value.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
        .last()
}
