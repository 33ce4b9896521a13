pub const DEFAULT_TEMPLATE: &str = "item";

/// Grav page file name: `{template}.md`, or `{template}.{lang}.md` for a
/// translated page.
pub fn page_filename(template: &str, lang: Option<&str>) -> String {
    let template = sanitize_component(template, DEFAULT_TEMPLATE);
    match lang.map(str::trim).filter(|l| !l.is_empty()) {
        Some(lang) => format!("{template}.{}.md", sanitize_component(lang, "en")),
        None => format!("{template}.md"),
    }
}

/// Make a user-supplied name safe as a single path component on every
/// platform. Falls back to `fallback` when nothing usable remains.
pub fn sanitize_component(input: &str, fallback: &str) -> String {
    let cleaned: String = input
        .chars()
        .map(|c| if is_forbidden(c) { '_' } else { c })
        .collect();
    let cleaned = cleaned.trim_matches(&['_', ' ', '.'][..]);

    // Collapse multiple underscores
    let mut compacted = String::with_capacity(cleaned.len());
    let mut prev_underscore = false;
    for c in cleaned.chars() {
        if c == '_' {
            if !prev_underscore {
                compacted.push(c);
            }
            prev_underscore = true;
        } else {
            compacted.push(c);
            prev_underscore = false;
        }
    }
    if compacted.is_empty() {
        compacted = fallback.to_string();
    }
    if is_reserved_windows_name(&compacted) {
        compacted.push('_');
    }
    compacted
}

fn is_forbidden(c: char) -> bool {
    matches!(c,
        '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'..='\u{1F}'
    )
}

fn is_reserved_windows_name(name: &str) -> bool {
    const RESERVED: &[&str] = &[
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(name))
}
