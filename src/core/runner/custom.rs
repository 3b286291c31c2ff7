//! User-authored runners, loaded from JSON files as declarative rules.
//!
//! Each entry stores its rule base64-encoded in `func`. A filter rule is a
//! regular expression matched against the working file name; a rename rule is
//! a template producing the new working file name. Both may reference
//! parameters with `{param_id}`; rename templates additionally know `{name}`,
//! `{ext}`, `{file}`, `{size}` and, for whole-list runners, `{index}`.
//! `{{` produces a literal `{`. Braces around anything that is not an
//! identifier (such as the regex quantifier `{2,3}`) are kept as they are.

use super::{
    ParamSpec, Params, RunnerCategory, RunnerDefinition, RunnerError, RunnerKind, Scope,
    StepOutcome,
};
use crate::core::record::{FileRecord, WorkingName};
use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

pub const FILTER_RUNNERS_FILE: &str = "filter.json";
pub const RENAMER_RUNNERS_FILE: &str = "renamer.json";

const RENAME_PLACEHOLDERS: &[&str] = &["name", "ext", "file", "size", "index"];

fn enabled_by_default() -> bool {
    true
}

fn per_file() -> Scope {
    Scope::PerFile
}

/// One stored user-authored runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomRunnerEntry {
    pub label: String,
    #[serde(default = "per_file")]
    pub scope: Scope,
    #[serde(default)]
    pub params: Vec<ParamSpec>,
    /// The base64-encoded rule text.
    pub func: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

/// The content of one runner file: id → entry.
pub type CustomRunnerFile = BTreeMap<String, CustomRunnerEntry>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(String),
    Placeholder(String),
}

/// A parsed `{placeholder}` template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    tokens: Vec<Token>,
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl Template {
    pub fn parse(text: &str) -> Self {
        let mut tokens = Vec::new();
        let mut literal = String::new();
        let mut rest = text;

        while let Some(open) = rest.find('{') {
            literal.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            if let Some(stripped) = after.strip_prefix('{') {
                literal.push('{');
                rest = stripped;
                continue;
            }
            match after.find('}') {
                Some(close) if is_identifier(&after[..close]) => {
                    if !literal.is_empty() {
                        tokens.push(Token::Literal(std::mem::take(&mut literal)));
                    }
                    tokens.push(Token::Placeholder(after[..close].to_string()));
                    rest = &after[close + 1..];
                }
                _ => {
                    literal.push('{');
                    rest = after;
                }
            }
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            tokens.push(Token::Literal(literal));
        }
        Self { tokens }
    }

    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().filter_map(|t| match t {
            Token::Placeholder(name) => Some(name.as_str()),
            Token::Literal(_) => None,
        })
    }

    pub fn render<F>(&self, mut lookup: F) -> Result<String, RunnerError>
    where
        F: FnMut(&str) -> Result<String, RunnerError>,
    {
        let mut out = String::new();
        for token in &self.tokens {
            match token {
                Token::Literal(text) => out.push_str(text),
                Token::Placeholder(name) => out.push_str(&lookup(name)?),
            }
        }
        Ok(out)
    }
}

/// The compiled behaviour of a user-authored runner.
#[derive(Debug, Clone)]
pub enum CustomRule {
    Filter(Template),
    Rename(Template),
    /// The entry could not be loaded; kept so it can be displayed and edited.
    Invalid(String),
}

impl CustomRule {
    pub fn execute(
        &self,
        scope: Scope,
        batch: &[&FileRecord],
        params: &Params<'_>,
    ) -> Result<Vec<Option<StepOutcome>>, RunnerError> {
        let outcomes = batch
            .iter()
            .enumerate()
            .map(|(index, file)| self.execute_one(file, index, params));
        match scope {
            Scope::PerFile => outcomes.map(|r| r.map(Some)).collect(),
            Scope::WholeList => Ok(outcomes
                .map(|r| Some(r.unwrap_or_else(|e| StepOutcome::failed(e.to_string()))))
                .collect()),
        }
    }

    fn execute_one(
        &self,
        file: &FileRecord,
        index: usize,
        params: &Params<'_>,
    ) -> Result<StepOutcome, RunnerError> {
        match self {
            CustomRule::Filter(template) => {
                let pattern = template.render(|name| Ok(regex::escape(&params.text(name)?)))?;
                let regex = Regex::new(&pattern).map_err(|e| RunnerError::InvalidPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })?;
                let subject = file.working_file_name();
                if regex.is_match(&subject) {
                    Ok(StepOutcome::pass(format!("kept '{subject}': matches /{pattern}/")))
                } else {
                    Ok(StepOutcome::reject(format!(
                        "filtered out '{subject}': does not match /{pattern}/"
                    )))
                }
            }
            CustomRule::Rename(template) => {
                let rendered = template.render(|name| match name {
                    "name" => Ok(file.working_name.clone()),
                    "ext" => Ok(file.working_extension.clone()),
                    "file" => Ok(file.working_file_name()),
                    "size" => Ok(file.size.to_string()),
                    "index" => Ok(index.to_string()),
                    other => params.text(other),
                })?;
                StepOutcome::renamed(file, WorkingName::from_file_name(&rendered))
            }
            CustomRule::Invalid(reason) => Err(RunnerError::Rule(reason.clone())),
        }
    }
}

pub fn encode_rule(text: &str) -> String {
    STANDARD.encode(text.as_bytes())
}

pub fn decode_rule(func: &str) -> Result<String, RunnerError> {
    let bytes = STANDARD
        .decode(func.trim())
        .map_err(|e| RunnerError::Rule(format!("func is not valid base64: {e}")))?;
    String::from_utf8(bytes).map_err(|_| RunnerError::Rule("func is not valid UTF-8".to_string()))
}

/// Decodes and validates an entry's rule for the given category.
pub fn compile_rule(
    entry: &CustomRunnerEntry,
    category: RunnerCategory,
) -> Result<CustomRule, RunnerError> {
    let text = decode_rule(&entry.func)?;
    if text.trim().is_empty() {
        return Err(RunnerError::Rule("rule is empty".to_string()));
    }
    let template = Template::parse(&text);
    let param_ids: HashSet<&str> = entry.params.iter().map(|p| p.id.as_str()).collect();

    for placeholder in template.placeholders() {
        let builtin = category == RunnerCategory::Rename && RENAME_PLACEHOLDERS.contains(&placeholder);
        if !builtin && !param_ids.contains(placeholder) {
            return Err(RunnerError::Rule(format!("unknown placeholder {{{placeholder}}}")));
        }
        if builtin && placeholder == "index" && entry.scope != Scope::WholeList {
            return Err(RunnerError::Rule(
                "{index} is only available to whole-list runners".to_string(),
            ));
        }
    }

    match category {
        RunnerCategory::Filter => {
            let bound = BTreeMap::new();
            let defaults = Params::new(&entry.params, &bound);
            let pattern = template.render(|name| Ok(regex::escape(&defaults.text(name)?)))?;
            Regex::new(&pattern).map_err(|e| RunnerError::InvalidPattern {
                pattern,
                reason: e.to_string(),
            })?;
            Ok(CustomRule::Filter(template))
        }
        RunnerCategory::Rename => Ok(CustomRule::Rename(template)),
        other => Err(RunnerError::Rule(format!(
            "user-authored runners cannot be of category {other:?}"
        ))),
    }
}

/// Builds a registry definition; invalid entries are flagged, not dropped.
pub fn definition_from_entry(
    id: &str,
    entry: &CustomRunnerEntry,
    category: RunnerCategory,
) -> RunnerDefinition {
    let (kind, error) = match compile_rule(entry, category) {
        Ok(rule) => (RunnerKind::Custom(rule), None),
        Err(e) => {
            tracing::warn!("User-authored runner '{}' is invalid: {}", id, e);
            (RunnerKind::Custom(CustomRule::Invalid(e.to_string())), Some(e.to_string()))
        }
    };
    RunnerDefinition {
        id: id.to_string(),
        label: entry.label.clone(),
        category,
        scope: entry.scope,
        params: entry.params.clone(),
        desc: entry.desc.clone(),
        kind,
        enabled: entry.enabled,
        error,
    }
}

fn invalid_definition(id: &str, category: RunnerCategory, reason: String) -> RunnerDefinition {
    tracing::warn!("User-authored runner '{}' could not be read: {}", id, reason);
    RunnerDefinition {
        id: id.to_string(),
        label: id.to_string(),
        category,
        scope: Scope::PerFile,
        params: Vec::new(),
        desc: String::new(),
        kind: RunnerKind::Custom(CustomRule::Invalid(reason.clone())),
        enabled: false,
        error: Some(reason),
    }
}

/// The directory holding the runner files.
pub fn runners_directory(config_dir: &Path) -> PathBuf {
    config_dir.join("runners")
}

fn file_for(category: RunnerCategory) -> Option<&'static str> {
    match category {
        RunnerCategory::Filter => Some(FILTER_RUNNERS_FILE),
        RunnerCategory::Rename => Some(RENAMER_RUNNERS_FILE),
        _ => None,
    }
}

/// Loads all user-authored runners from `dir`. Missing files are not an error.
pub fn load_custom_runners(dir: &Path) -> Result<Vec<RunnerDefinition>> {
    let mut definitions = Vec::new();
    for category in [RunnerCategory::Filter, RunnerCategory::Rename] {
        let Some(file_name) = file_for(category) else {
            continue;
        };
        let path = dir.join(file_name);
        if !path.exists() {
            continue;
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read runner file {path:?}"))?;
        let raw: BTreeMap<String, Value> = serde_json::from_str(&content)
            .with_context(|| format!("Runner file {path:?} is not a JSON object"))?;

        for (id, value) in raw {
            let definition = match serde_json::from_value::<CustomRunnerEntry>(value) {
                Ok(entry) => definition_from_entry(&id, &entry, category),
                Err(e) => invalid_definition(&id, category, e.to_string()),
            };
            definitions.push(definition);
        }
        tracing::info!("Loaded user-authored runners from {:?}", path);
    }
    Ok(definitions)
}

/// Reads the raw entries of one runner file, e.g. for editing.
pub fn read_runner_file(dir: &Path, category: RunnerCategory) -> Result<CustomRunnerFile> {
    let file_name = file_for(category)
        .ok_or_else(|| anyhow::anyhow!("No runner file for category {category:?}"))?;
    let path = dir.join(file_name);
    if !path.exists() {
        return Ok(CustomRunnerFile::new());
    }
    let content = fs::read_to_string(&path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Writes the entries of one runner file, replacing its previous content.
pub fn save_runner_file(
    dir: &Path,
    category: RunnerCategory,
    entries: &CustomRunnerFile,
) -> Result<PathBuf> {
    let file_name = file_for(category)
        .ok_or_else(|| anyhow::anyhow!("No runner file for category {category:?}"))?;
    fs::create_dir_all(dir)?;
    let path = dir.join(file_name);
    fs::write(&path, serde_json::to_string_pretty(entries)?)?;
    tracing::info!("Saved {} user-authored runners to {:?}", entries.len(), path);
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::runner::{BoundParams, Runner};
    use tempfile::tempdir;

    fn entry(rule: &str, scope: Scope, params: Vec<ParamSpec>) -> CustomRunnerEntry {
        CustomRunnerEntry {
            label: "Custom".to_string(),
            scope,
            params,
            func: encode_rule(rule),
            desc: String::new(),
            enabled: true,
        }
    }

    #[test]
    fn test_template_parsing_keeps_regex_quantifiers() {
        let template = Template::parse(r"^\d{2,3}_{tag}{{x");
        let names: Vec<&str> = template.placeholders().collect();
        assert_eq!(names, vec!["tag"]);
        let rendered = template.render(|_| Ok("T".to_string())).unwrap();
        assert_eq!(rendered, r"^\d{2,3}_T{x");
    }

    #[test]
    fn test_rename_rule_uses_placeholders_and_params() {
        let def = definition_from_entry(
            "tag_it",
            &entry(
                "{tag}-{name}-{index}.{ext}",
                Scope::WholeList,
                vec![ParamSpec::text("tag", "Tag", "x")],
            ),
            RunnerCategory::Rename,
        );
        assert!(def.is_runnable());

        let a = FileRecord::from_name("a.txt", 1);
        let b = FileRecord::from_name("b.md", 1);
        let outcomes = def.execute(&[&a, &b], &BoundParams::new()).unwrap();
        let names: Vec<String> = outcomes
            .into_iter()
            .map(|o| o.unwrap().rename.unwrap().file_name())
            .collect();
        assert_eq!(names, vec!["x-a-0.txt", "x-b-1.md"]);
    }

    #[test]
    fn test_filter_rule_escapes_param_values() {
        let def = definition_from_entry(
            "has_tag",
            &entry("^{tag}", Scope::PerFile, vec![ParamSpec::text("tag", "Tag", "a.")]),
            RunnerCategory::Filter,
        );
        let keep = FileRecord::from_name("a.b.txt", 1);
        let drop = FileRecord::from_name("ab.txt", 1);
        let bound = BoundParams::new();
        assert!(def.execute(&[&keep], &bound).unwrap()[0].as_ref().unwrap().continues);
        assert!(!def.execute(&[&drop], &bound).unwrap()[0].as_ref().unwrap().continues);
    }

    #[test]
    fn test_invalid_rules_are_flagged() {
        let bad_base64 = CustomRunnerEntry {
            func: "%%%".to_string(),
            ..entry("", Scope::PerFile, Vec::new())
        };
        let index_per_file = entry("{name}{index}", Scope::PerFile, Vec::new());
        let unknown = entry("{nope}", Scope::PerFile, Vec::new());
        let bad_regex = entry("(", Scope::PerFile, Vec::new());

        for (e, category) in [
            (bad_base64, RunnerCategory::Rename),
            (index_per_file, RunnerCategory::Rename),
            (unknown, RunnerCategory::Rename),
            (bad_regex, RunnerCategory::Filter),
        ] {
            let def = definition_from_entry("x", &e, category);
            assert!(def.error.is_some(), "expected an error for {e:?}");
            assert!(!def.is_runnable());
        }
    }

    #[test]
    fn test_load_keeps_malformed_entries_for_display() {
        let dir = tempdir().unwrap();
        let mut file = CustomRunnerFile::new();
        file.insert("good".to_string(), entry("{name}_x.{ext}", Scope::PerFile, Vec::new()));
        save_runner_file(dir.path(), RunnerCategory::Rename, &file).unwrap();
        fs::write(
            dir.path().join(FILTER_RUNNERS_FILE),
            r#"{ "broken": { "label": 3 } }"#,
        )
        .unwrap();

        let mut defs = load_custom_runners(dir.path()).unwrap();
        defs.sort_by(|a, b| a.id.cmp(&b.id));

        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].id, "broken");
        assert!(defs[0].error.is_some());
        assert_eq!(defs[1].id, "good");
        assert!(defs[1].is_runnable());

        let reread = read_runner_file(dir.path(), RunnerCategory::Rename).unwrap();
        assert_eq!(reread, file);
    }

    #[test]
    fn test_load_from_missing_directory_is_empty() {
        let dir = tempdir().unwrap();
        let defs = load_custom_runners(&dir.path().join("absent")).unwrap();
        assert!(defs.is_empty());
    }
}
