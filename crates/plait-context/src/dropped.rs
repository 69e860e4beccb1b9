//! Normalizes host drag-and-drop payloads into vault-relative paths.
//!
//! Drops hand over a mix of `obsidian://open?vault=…&file=PATH` deep
//! links, absolute file paths, and newline-joined plain-text lists —
//! sometimes with deep links run together on one row or split across two.
//! The parser is pure so it can be unit-tested away from any DOM.

use std::collections::BTreeSet;

use url::Url;

const DEEP_LINK_SCHEME: &str = "obsidian://";
const DEEP_LINK_PREFIX: &str = "obsidian:";

/// The raw payloads a drop event carries.
#[derive(Debug, Clone, Default)]
pub struct DroppedPayload {
    /// Filesystem entries (the drop's file list).
    pub file_paths: Vec<String>,
    /// `text/uri-list` payload, if any.
    pub uri_list: Option<String>,
    /// `text/plain` payload, if any.
    pub text: Option<String>,
}

/// Deduplicated, decoded vault-relative paths from a drop payload.
/// Bare names without an extension gain `.md`.
pub fn parse_dropped_refs(payload: &DroppedPayload) -> BTreeSet<String> {
    let mut out = BTreeSet::new();

    for path in &payload.file_paths {
        if !path.is_empty() {
            out.insert(path.clone());
        }
    }

    let mut rows: Vec<String> = Vec::new();
    rows.extend(split_lines(payload.uri_list.as_deref()));
    rows.extend(split_lines(payload.text.as_deref()));

    // Re-join deep links split across two rows ("obsidian:/" + "/open?…").
    let mut merged: Vec<String> = Vec::new();
    let mut i = 0;
    while i < rows.len() {
        let row = &rows[i];
        if row.starts_with(DEEP_LINK_PREFIX)
            && !row.starts_with(DEEP_LINK_SCHEME)
            && i + 1 < rows.len()
            && rows[i + 1].starts_with('/')
        {
            merged.push(format!("{}{}", row, rows[i + 1]));
            i += 2;
        } else {
            merged.push(row.clone());
            i += 1;
        }
    }

    // Split run-together deep links missing a newline between them.
    let rows = merged.into_iter().flat_map(|row| {
        if row.starts_with(DEEP_LINK_SCHEME) {
            split_deep_link_runs(&row)
        } else {
            vec![row]
        }
    });

    for row in rows {
        if row.starts_with(DEEP_LINK_SCHEME) {
            if let Some(file) = deep_link_file(&row) {
                out.insert(with_md_default(file));
            }
            continue;
        }
        if bare_name_needs_md(&row) {
            out.insert(format!("{row}.md"));
        } else {
            out.insert(row);
        }
    }

    out
}

fn split_lines(input: Option<&str>) -> Vec<String> {
    input
        .unwrap_or_default()
        .lines()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn split_deep_link_runs(row: &str) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut rest = row;
    while let Some(pos) = rest[DEEP_LINK_SCHEME.len()..].find(DEEP_LINK_SCHEME) {
        let split_at = pos + DEEP_LINK_SCHEME.len();
        pieces.push(rest[..split_at].trim().to_string());
        rest = &rest[split_at..];
    }
    if !rest.trim().is_empty() {
        pieces.push(rest.trim().to_string());
    }
    pieces
}

fn deep_link_file(row: &str) -> Option<String> {
    if let Ok(url) = Url::parse(row) {
        if let Some((_, file)) = url.query_pairs().find(|(k, _)| k == "file") {
            if !file.is_empty() {
                return Some(file.into_owned());
            }
        }
    }
    // Malformed link: extract the file parameter by hand.
    let (_, raw) = row.split_once("file=")?;
    let raw = raw
        .split(['&', ' ', '\t'])
        .next()
        .filter(|s| !s.is_empty())?;
    url::form_urlencoded::parse(raw.as_bytes())
        .next()
        .map(|(k, _)| k.into_owned())
}

fn with_md_default(file: String) -> String {
    if has_extension(&file) {
        file
    } else {
        format!("{file}.md")
    }
}

fn has_extension(path: &str) -> bool {
    match path.rfind('.') {
        Some(pos) if pos + 1 < path.len() => !path[pos + 1..].contains(['/', '\\']),
        _ => false,
    }
}

/// Crude bare-name test: no separator or dot near the end, no extension.
fn bare_name_needs_md(row: &str) -> bool {
    let tail: Vec<char> = row.chars().rev().take(4).collect();
    !tail.iter().any(|c| matches!(c, '.' | '/' | '\\')) && !has_extension(row)
}
