//! Helpers for splitting, joining and checking file names.

/// Characters that are not allowed in a file name on any supported platform.
const FORBIDDEN_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Splits `photo.jpg` into (`photo`, `jpg`).
///
/// Dot files such as `.bashrc` and names without a dot have an empty extension.
pub fn split_file_name(file_name: &str) -> (String, String) {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem.to_string(), ext.to_string()),
        _ => (file_name.to_string(), String::new()),
    }
}

/// Joins a stem and an extension, omitting the dot for an empty extension.
pub fn join_file_name(name: &str, extension: &str) -> String {
    if extension.is_empty() {
        name.to_string()
    } else {
        format!("{name}.{extension}")
    }
}

/// Checks that a computed file name can be written into a folder as-is.
pub fn validate_file_name(file_name: &str) -> Result<(), String> {
    if file_name.trim().is_empty() {
        return Err("resulting file name is empty".to_string());
    }
    if file_name == "." || file_name == ".." {
        return Err(format!("'{file_name}' is not a valid file name"));
    }
    if let Some(c) = file_name.chars().find(|c| *c == '/' || *c == '\\') {
        return Err(format!("file name '{file_name}' contains path separator '{c}'"));
    }
    Ok(())
}

/// Replaces characters that cannot appear in a file name, e.g. to derive a flow file name.
pub fn sanitize_file_name(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| {
            if FORBIDDEN_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    if cleaned.is_empty() {
        "untitled".to_string()
    } else {
        cleaned
    }
}
