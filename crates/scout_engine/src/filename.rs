use std::path::Path;

const MAX_NAME_CHARS: usize = 50;

/// Local file name for a direct stream: the last path segment of `url`,
/// query dropped, unsafe characters removed, at most 50 characters.
/// Empty when nothing usable is left.
pub fn sanitize_filename(url: &str) -> String {
    let segment = url.rsplit('/').next().unwrap_or_default();
    let segment = segment.split('?').next().unwrap_or_default();

    let mut name: String = segment
        .chars()
        .filter(|c| !is_forbidden(*c))
        .take(MAX_NAME_CHARS)
        .collect();
    if is_reserved_windows_name(&name) {
        name.push('_');
    }
    name
}

/// Same as `sanitize_filename`, with `download` standing in for an empty result.
pub fn fallback_filename(url: &str) -> String {
    let name = sanitize_filename(url);
    if name.is_empty() {
        "download".to_string()
    } else {
        name
    }
}

/// Turns a literal path into a resolver output template.
pub fn literal_template(path: &Path) -> String {
    path.to_string_lossy().replace('%', "%%")
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
