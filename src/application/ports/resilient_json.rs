//! Recovery of structured data from model output that may not be strict JSON.
//!
//! Strategies run in order and the first success wins:
//! 1. strict parse of the trimmed text;
//! 2. scan for the first balanced `{...}` or `[...]` block that parses;
//! 3. lenient repair: drop code fences, straighten smart quotes, remove
//!    trailing commas, escape raw newlines inside strings and close any
//!    brackets left open by truncated output.

use serde_json::Value;

pub fn extract_json(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }

    if let Some(value) = scan_balanced(trimmed) {
        return Some(value);
    }

    lenient_parse(trimmed)
}

fn scan_balanced(text: &str) -> Option<Value> {
    let mut search_from = 0;
    while let Some(offset) = text[search_from..].find(['{', '[']) {
        let start = search_from + offset;
        if let Some(len) = balanced_len(&text[start..]) {
            if let Ok(value) = serde_json::from_str::<Value>(&text[start..start + len]) {
                return Some(value);
            }
        }
        search_from = start + 1;
    }
    None
}

/// Byte length of the bracketed value that opens `text`, if it closes.
fn balanced_len(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, ch) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(idx + ch.len_utf8());
                }
            }
            _ => {}
        }
    }

    None
}

fn lenient_parse(text: &str) -> Option<Value> {
    let cleaned = straighten_quotes(&strip_code_fences(text));
    let start = cleaned.find(['{', '['])?;
    let repaired = repair(&cleaned[start..]);
    serde_json::from_str::<Value>(&repaired).ok()
}

fn strip_code_fences(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn straighten_quotes(text: &str) -> String {
    text.replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
}

fn repair(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let mut closers: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for ch in text.chars() {
        if in_string {
            if escaped {
                escaped = false;
                out.push(ch);
            } else if ch == '\\' {
                escaped = true;
                out.push(ch);
            } else if ch == '"' {
                in_string = false;
                out.push(ch);
            } else if ch == '\n' {
                out.push_str("\\n");
            } else if ch == '\r' {
                continue;
            } else {
                out.push(ch);
            }
            continue;
        }

        match ch {
            '"' => {
                in_string = true;
                out.push(ch);
            }
            '{' => {
                closers.push('}');
                out.push(ch);
            }
            '[' => {
                closers.push(']');
                out.push(ch);
            }
            '}' | ']' => {
                drop_trailing_comma(&mut out);
                if closers.last() == Some(&ch) {
                    closers.pop();
                }
                out.push(ch);
                if closers.is_empty() {
                    return out;
                }
            }
            _ => out.push(ch),
        }
    }

    if in_string {
        if escaped {
            out.pop();
        }
        out.push('"');
    }

    let tail = out.trim_end();
    if tail.ends_with(':') {
        out.truncate(tail.len());
        out.push_str("null");
    }

    while let Some(closer) = closers.pop() {
        drop_trailing_comma(&mut out);
        out.push(closer);
    }

    out
}

fn drop_trailing_comma(out: &mut String) {
    let trimmed_len = out.trim_end().len();
    out.truncate(trimmed_len);
    if out.ends_with(',') {
        out.pop();
    }
}
