use std::sync::LazyLock;

use regex::Regex;

const MAX_VISIBLE_CHARS: usize = 100;

static SECRET_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"(?i)bearer\s+\S+", "Bearer [REDACTED]"),
        (r"(?i)(api[_-]?key|password|secret|token)=[^\s&'\x22]+", "$1=[REDACTED]"),
        (r"\bsk-[A-Za-z0-9_\-]{8,}", "[REDACTED]"),
        (r"\+?\d[\d\s().-]{7,}\d", "[PHONE]"),
    ]
    .into_iter()
    .filter_map(|(pattern, replacement)| Regex::new(pattern).ok().map(|re| (re, replacement)))
    .collect()
});

/// Shortens prompt text and redacts credentials and phone numbers so it can be logged.
pub fn sanitize_prompt(prompt: &str) -> String {
    let trimmed = prompt.trim();

    if trimmed.is_empty() {
        return String::from("[EMPTY]");
    }

    let total_chars = trimmed.chars().count();
    let visible = if total_chars > MAX_VISIBLE_CHARS {
        let head: String = trimmed.chars().take(MAX_VISIBLE_CHARS).collect();
        format!("{}... ({} chars total)", head, total_chars)
    } else {
        trimmed.to_string()
    };

    SECRET_PATTERNS
        .iter()
        .fold(visible, |text, (re, replacement)| {
            re.replace_all(&text, *replacement).into_owned()
        })
}
