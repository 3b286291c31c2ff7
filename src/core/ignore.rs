use super::CoreError;
use globset::{Glob, GlobSet, GlobSetBuilder};

/// Builds a `GlobSet` from `.gitignore`-style patterns.
///
/// Patterns match anywhere below a source folder. A trailing `/` marks a
/// directory pattern, which also matches everything inside that directory.
/// Blank lines and `#` comments are skipped.
pub fn build_globset_from_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<GlobSet, CoreError> {
    let mut builder = GlobSetBuilder::new();

    for pattern in patterns {
        let trimmed = pattern.as_ref().trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        if let Some(dir_pattern) = trimmed.strip_suffix('/') {
            builder.add(Glob::new(&format!("**/{dir_pattern}"))?);
            builder.add(Glob::new(&format!("**/{dir_pattern}/**"))?);
        } else {
            builder.add(Glob::new(&format!("**/{trimmed}"))?);
        }
    }

    Ok(builder.build()?)
}
