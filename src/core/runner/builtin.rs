//! The built-in runner tables and their behaviour.

use super::{
    ParamSpec, Params, RunnerCategory, RunnerDefinition, RunnerError, Scope, StepOutcome,
};
use crate::core::record::{FileRecord, WorkingName};
use regex::{NoExpand, Regex, RegexBuilder};
use std::collections::HashSet;
use std::path::PathBuf;

/// Id of the pass-through runner new steps start with.
pub const DEFAULT_RUNNER_ID: &str = "default";

const TARGETS: &[&str] = &["file-name", "name", "extension"];

/// The closed set of built-in runner behaviours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinRunner {
    PassThrough,
    FilterContains,
    FilterRegex,
    FilterExtension,
    FilterSize,
    RenameReplace,
    RenameRegex,
    RenamePrefix,
    RenameSuffix,
    RenameCase,
    RenameExtension,
    RenameSerial,
    RenameDedupe,
    OutputPath,
}

pub fn pass_through_runners() -> Vec<RunnerDefinition> {
    vec![RunnerDefinition::builtin(
        DEFAULT_RUNNER_ID,
        RunnerCategory::PassThrough,
        Scope::PerFile,
        Vec::new(),
        "Lets every file through unchanged.",
        BuiltinRunner::PassThrough,
    )]
}

fn target_param() -> ParamSpec {
    ParamSpec::select("target", "param.target", "file-name", TARGETS)
}

pub fn filter_runners() -> Vec<RunnerDefinition> {
    use BuiltinRunner::*;
    vec![
        RunnerDefinition::builtin(
            "filter_contains",
            RunnerCategory::Filter,
            Scope::PerFile,
            vec![
                ParamSpec::text("text", "param.text", ""),
                target_param(),
                ParamSpec::flag("case_sensitive", "param.case_sensitive", false),
                ParamSpec::flag("invert", "param.invert", false),
            ],
            "Keeps files whose name contains the given text.",
            FilterContains,
        ),
        RunnerDefinition::builtin(
            "filter_regex",
            RunnerCategory::Filter,
            Scope::PerFile,
            vec![
                ParamSpec::text("pattern", "param.pattern", ""),
                target_param(),
                ParamSpec::flag("invert", "param.invert", false),
            ],
            "Keeps files whose name matches a regular expression.",
            FilterRegex,
        ),
        RunnerDefinition::builtin(
            "filter_extension",
            RunnerCategory::Filter,
            Scope::PerFile,
            vec![
                ParamSpec::text("extensions", "param.extensions", ""),
                ParamSpec::flag("invert", "param.invert", false),
            ],
            "Keeps files with one of the listed extensions (comma separated).",
            FilterExtension,
        ),
        RunnerDefinition::builtin(
            "filter_size",
            RunnerCategory::Filter,
            Scope::PerFile,
            vec![
                ParamSpec::number("min_bytes", "param.min_bytes", 0),
                ParamSpec::number("max_bytes", "param.max_bytes", 0),
            ],
            "Keeps files within a size range in bytes; a maximum of 0 means unbounded.",
            FilterSize,
        ),
    ]
}

pub fn rename_runners() -> Vec<RunnerDefinition> {
    use BuiltinRunner::*;
    vec![
        RunnerDefinition::builtin(
            "rename_replace",
            RunnerCategory::Rename,
            Scope::PerFile,
            vec![
                ParamSpec::text("find", "param.find", ""),
                ParamSpec::text("replace", "param.replace", ""),
                ParamSpec::flag("case_sensitive", "param.case_sensitive", true),
            ],
            "Replaces every occurrence of a text in the name.",
            RenameReplace,
        ),
        RunnerDefinition::builtin(
            "rename_regex",
            RunnerCategory::Rename,
            Scope::PerFile,
            vec![
                ParamSpec::text("pattern", "param.pattern", ""),
                ParamSpec::text("replace", "param.replace", ""),
            ],
            "Replaces regular expression matches in the name; $1 refers to groups.",
            RenameRegex,
        ),
        RunnerDefinition::builtin(
            "rename_prefix",
            RunnerCategory::Rename,
            Scope::PerFile,
            vec![ParamSpec::text("text", "param.text", "")],
            "Adds text in front of the name.",
            RenamePrefix,
        ),
        RunnerDefinition::builtin(
            "rename_suffix",
            RunnerCategory::Rename,
            Scope::PerFile,
            vec![ParamSpec::text("text", "param.text", "")],
            "Adds text after the name, before the extension.",
            RenameSuffix,
        ),
        RunnerDefinition::builtin(
            "rename_case",
            RunnerCategory::Rename,
            Scope::PerFile,
            vec![ParamSpec::select(
                "mode",
                "param.mode",
                "lower",
                &["lower", "upper", "title"],
            )],
            "Changes the letter case of the name.",
            RenameCase,
        ),
        RunnerDefinition::builtin(
            "rename_extension",
            RunnerCategory::Rename,
            Scope::PerFile,
            vec![ParamSpec::text("extension", "param.extension", "")],
            "Replaces the extension; an empty value removes it.",
            RenameExtension,
        ),
        RunnerDefinition::builtin(
            "rename_serial",
            RunnerCategory::Rename,
            Scope::WholeList,
            vec![
                ParamSpec::number("start", "param.start", 0),
                ParamSpec::number("step", "param.step", 1),
                ParamSpec::number("width", "param.width", 0),
                ParamSpec::select("position", "param.position", "suffix", &["suffix", "prefix"]),
                ParamSpec::text("separator", "param.separator", ""),
            ],
            "Numbers the files in their current order.",
            RenameSerial,
        ),
        RunnerDefinition::builtin(
            "rename_dedupe",
            RunnerCategory::Rename,
            Scope::WholeList,
            vec![ParamSpec::text("separator", "param.separator", "_")],
            "Appends a counter to names that already occurred earlier in the list.",
            RenameDedupe,
        ),
    ]
}

pub fn output_runners() -> Vec<RunnerDefinition> {
    vec![RunnerDefinition::builtin(
        "output_path",
        RunnerCategory::Output,
        Scope::PerFile,
        vec![ParamSpec::folder("output_path", "param.output_path")],
        "Routes the files to a destination folder; ends the flow.",
        BuiltinRunner::OutputPath,
    )]
}

/// All built-in tables in merge order.
pub fn builtin_tables() -> Vec<Vec<RunnerDefinition>> {
    vec![
        pass_through_runners(),
        filter_runners(),
        rename_runners(),
        output_runners(),
    ]
}

impl BuiltinRunner {
    pub fn execute(
        self,
        batch: &[&FileRecord],
        params: &Params<'_>,
    ) -> Result<Vec<Option<StepOutcome>>, RunnerError> {
        match self {
            BuiltinRunner::RenameSerial => serial(batch, params),
            BuiltinRunner::RenameDedupe => dedupe(batch, params),
            per_file => batch
                .iter()
                .map(|file| per_file.execute_one(file, params).map(Some))
                .collect(),
        }
    }

    fn execute_one(self, file: &FileRecord, params: &Params<'_>) -> Result<StepOutcome, RunnerError> {
        use BuiltinRunner::*;
        match self {
            PassThrough => Ok(StepOutcome::pass("passed through")),
            FilterContains => filter_contains(file, params),
            FilterRegex => filter_regex(file, params),
            FilterExtension => filter_extension(file, params),
            FilterSize => filter_size(file, params),
            RenameReplace => rename_replace(file, params),
            RenameRegex => rename_regex(file, params),
            RenamePrefix => {
                let text = params.text("text")?;
                let mut working = file.working();
                working.name = format!("{text}{}", working.name);
                StepOutcome::renamed(file, working)
            }
            RenameSuffix => {
                let text = params.text("text")?;
                let mut working = file.working();
                working.name.push_str(&text);
                StepOutcome::renamed(file, working)
            }
            RenameCase => rename_case(file, params),
            RenameExtension => {
                let extension = params.text("extension")?;
                let mut working = file.working();
                working.extension = extension.trim().trim_start_matches('.').to_string();
                StepOutcome::renamed(file, working)
            }
            OutputPath => {
                let folder = params.text("output_path")?;
                if folder.trim().is_empty() {
                    return Err(RunnerError::InvalidParam {
                        param: "output_path".to_string(),
                        reason: "no output folder selected".to_string(),
                    });
                }
                let path = PathBuf::from(folder.trim());
                let message = format!("{} -> {}", file.working_file_name(), path.display());
                Ok(StepOutcome::output(path, message))
            }
            RenameSerial | RenameDedupe => self
                .execute(&[file], params)?
                .pop()
                .flatten()
                .ok_or(RunnerError::BatchMismatch {
                    expected: 1,
                    got: 0,
                }),
        }
    }
}

/// The part of the working name a filter looks at.
fn target_text(file: &FileRecord, params: &Params<'_>) -> Result<String, RunnerError> {
    Ok(match params.choice("target")?.as_str() {
        "name" => file.working_name.clone(),
        "extension" => file.working_extension.clone(),
        _ => file.working_file_name(),
    })
}

fn verdict(keep: bool, subject: &str, detail: String) -> StepOutcome {
    if keep {
        StepOutcome::pass(format!("kept '{subject}': {detail}"))
    } else {
        StepOutcome::reject(format!("filtered out '{subject}': {detail}"))
    }
}

fn filter_contains(file: &FileRecord, params: &Params<'_>) -> Result<StepOutcome, RunnerError> {
    let needle = params.text("text")?;
    let haystack = target_text(file, params)?;
    let matched = if params.flag("case_sensitive")? {
        haystack.contains(&needle)
    } else {
        haystack.to_lowercase().contains(&needle.to_lowercase())
    };
    let keep = matched != params.flag("invert")?;
    let detail = if matched {
        format!("contains '{needle}'")
    } else {
        format!("does not contain '{needle}'")
    };
    Ok(verdict(keep, &haystack, detail))
}

fn compile(pattern: &str, case_insensitive: bool) -> Result<Regex, RunnerError> {
    RegexBuilder::new(pattern)
        .case_insensitive(case_insensitive)
        .build()
        .map_err(|e| RunnerError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })
}

fn filter_regex(file: &FileRecord, params: &Params<'_>) -> Result<StepOutcome, RunnerError> {
    let pattern = params.text("pattern")?;
    let regex = compile(&pattern, false)?;
    let haystack = target_text(file, params)?;
    let matched = regex.is_match(&haystack);
    let keep = matched != params.flag("invert")?;
    let detail = if matched {
        format!("matches /{pattern}/")
    } else {
        format!("does not match /{pattern}/")
    };
    Ok(verdict(keep, &haystack, detail))
}

fn filter_extension(file: &FileRecord, params: &Params<'_>) -> Result<StepOutcome, RunnerError> {
    let wanted: HashSet<String> = params
        .text("extensions")?
        .split(',')
        .map(|e| e.trim().trim_start_matches('.').to_lowercase())
        .filter(|e| !e.is_empty())
        .collect();
    let subject = file.working_file_name();
    if wanted.is_empty() {
        return Ok(StepOutcome::pass(format!(
            "kept '{subject}': no extensions configured"
        )));
    }
    let matched = wanted.contains(&file.working_extension.to_lowercase());
    let keep = matched != params.flag("invert")?;
    let detail = format!("extension '{}'", file.working_extension);
    Ok(verdict(keep, &subject, detail))
}

fn filter_size(file: &FileRecord, params: &Params<'_>) -> Result<StepOutcome, RunnerError> {
    let bound = |id: &str| -> Result<u64, RunnerError> {
        let value = params.number(id)?;
        u64::try_from(value).map_err(|_| RunnerError::InvalidParam {
            param: id.to_string(),
            reason: format!("{value} is negative"),
        })
    };
    let min = bound("min_bytes")?;
    let max = bound("max_bytes")?;
    let keep = file.size >= min && (max == 0 || file.size <= max);
    let detail = format!("{} bytes", file.size);
    Ok(verdict(keep, &file.working_file_name(), detail))
}

fn rename_replace(file: &FileRecord, params: &Params<'_>) -> Result<StepOutcome, RunnerError> {
    let find = params.text("find")?;
    let replace = params.text("replace")?;
    if find.is_empty() {
        return Ok(StepOutcome::pass("nothing to replace"));
    }
    let mut working = file.working();
    working.name = if params.flag("case_sensitive")? {
        working.name.replace(&find, &replace)
    } else {
        let regex = compile(&regex::escape(&find), true)?;
        regex
            .replace_all(&working.name, NoExpand(&replace))
            .into_owned()
    };
    StepOutcome::renamed(file, working)
}

fn rename_regex(file: &FileRecord, params: &Params<'_>) -> Result<StepOutcome, RunnerError> {
    let pattern = params.text("pattern")?;
    let replace = params.text("replace")?;
    let regex = compile(&pattern, false)?;
    let mut working = file.working();
    working.name = regex
        .replace_all(&working.name, replace.as_str())
        .into_owned();
    StepOutcome::renamed(file, working)
}

fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at_word_start = true;
    for c in text.chars() {
        if at_word_start {
            out.extend(c.to_uppercase());
        } else {
            out.extend(c.to_lowercase());
        }
        at_word_start = c.is_whitespace() || c == '_' || c == '-' || c == '.';
    }
    out
}

fn rename_case(file: &FileRecord, params: &Params<'_>) -> Result<StepOutcome, RunnerError> {
    let mut working = file.working();
    working.name = match params.choice("mode")?.as_str() {
        "upper" => working.name.to_uppercase(),
        "title" => title_case(&working.name),
        _ => working.name.to_lowercase(),
    };
    StepOutcome::renamed(file, working)
}

/// Turns a per-file naming error into a stalled outcome so the rest of the list proceeds.
fn isolate(result: Result<StepOutcome, RunnerError>) -> Option<StepOutcome> {
    Some(result.unwrap_or_else(|e| StepOutcome::failed(e.to_string())))
}

const MAX_SERIAL_WIDTH: usize = 32;

fn serial(batch: &[&FileRecord], params: &Params<'_>) -> Result<Vec<Option<StepOutcome>>, RunnerError> {
    let start = params.number("start")?;
    let step = params.number("step")?;
    let width = usize::try_from(params.number("width")?)
        .ok()
        .filter(|w| *w <= MAX_SERIAL_WIDTH)
        .ok_or_else(|| RunnerError::InvalidParam {
            param: "width".to_string(),
            reason: format!("width must be between 0 and {MAX_SERIAL_WIDTH}"),
        })?;
    let prefix = params.choice("position")? == "prefix";
    let separator = params.text("separator")?;

    // Every number is computed up front so an overflow fails the whole batch.
    let numbers = (0i64..)
        .take(batch.len())
        .map(|position| position.checked_mul(step).and_then(|offset| start.checked_add(offset)))
        .collect::<Option<Vec<i64>>>()
        .ok_or_else(|| RunnerError::InvalidParam {
            param: "start".to_string(),
            reason: format!("numbering from {start} by {step} leaves the 64-bit range"),
        })?;

    Ok(batch
        .iter()
        .zip(numbers)
        .map(|(file, value)| {
            let number = format!("{:0width$}", value, width = width);
            let mut working = file.working();
            working.name = if prefix {
                format!("{number}{separator}{}", working.name)
            } else {
                format!("{}{separator}{number}", working.name)
            };
            isolate(StepOutcome::renamed(file, working))
        })
        .collect())
}

fn dedupe(batch: &[&FileRecord], params: &Params<'_>) -> Result<Vec<Option<StepOutcome>>, RunnerError> {
    let separator = params.text("separator")?;
    let mut seen: HashSet<String> = HashSet::with_capacity(batch.len());

    Ok(batch
        .iter()
        .map(|file| {
            let current = file.working_file_name();
            if seen.insert(current.to_lowercase()) {
                return Some(StepOutcome::pass(format!("'{current}' is unique")));
            }
            let working = (1..)
                .map(|counter| {
                    WorkingName::new(
                        format!("{}{separator}{counter}", file.working_name),
                        file.working_extension.clone(),
                    )
                })
                .find(|candidate| !seen.contains(&candidate.file_name().to_lowercase()))
                .unwrap_or_else(|| file.working());
            seen.insert(working.file_name().to_lowercase());
            isolate(StepOutcome::renamed(file, working))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::runner::{BoundParams, ParamValue, Runner};

    fn definition(id: &str) -> RunnerDefinition {
        builtin_tables()
            .into_iter()
            .flatten()
            .find(|d| d.id == id)
            .expect("unknown built-in runner")
    }

    fn params(pairs: &[(&str, ParamValue)]) -> BoundParams {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn run_one(id: &str, file: &FileRecord, bound: BoundParams) -> StepOutcome {
        definition(id)
            .execute(&[file], &bound)
            .expect("runner failed")
            .remove(0)
            .expect("runner produced no outcome")
    }

    #[test]
    fn test_filter_contains_is_case_insensitive_by_default() {
        let file = FileRecord::from_name("Photo.JPG", 1);
        let outcome = run_one("filter_contains", &file, params(&[("text", ".jpg".into())]));
        assert!(outcome.continues);

        let outcome = run_one(
            "filter_contains",
            &file,
            params(&[("text", ".jpg".into()), ("case_sensitive", true.into())]),
        );
        assert!(!outcome.continues);
        assert!(outcome.output_path.is_none());
    }

    #[test]
    fn test_filter_contains_invert_and_target() {
        let file = FileRecord::from_name("report.txt", 1);
        let bound = params(&[
            ("text", "txt".into()),
            ("target", "name".into()),
            ("invert", true.into()),
        ]);
        assert!(run_one("filter_contains", &file, bound).continues);
    }

    #[test]
    fn test_filter_regex_reports_invalid_pattern() {
        let file = FileRecord::from_name("a.txt", 1);
        let result = definition("filter_regex").execute(&[&file], &params(&[("pattern", "(".into())]));
        assert!(matches!(result, Err(RunnerError::InvalidPattern { .. })));
    }

    #[test]
    fn test_filter_extension_and_size() {
        let jpg = FileRecord::from_name("a.JPG", 500);
        let txt = FileRecord::from_name("b.txt", 5);
        let ext = params(&[("extensions", ".jpg, png".into())]);
        assert!(run_one("filter_extension", &jpg, ext.clone()).continues);
        assert!(!run_one("filter_extension", &txt, ext).continues);

        let size = params(&[("min_bytes", 10.into()), ("max_bytes", 0.into())]);
        assert!(run_one("filter_size", &jpg, size.clone()).continues);
        assert!(!run_one("filter_size", &txt, size).continues);
    }

    #[test]
    fn test_rename_runners_change_working_name() {
        let file = FileRecord::from_name("My Holiday.jpg", 1);

        let outcome = run_one(
            "rename_replace",
            &file,
            params(&[("find", "holiday".into()), ("replace", "Trip".into()), ("case_sensitive", false.into())]),
        );
        assert_eq!(outcome.rename.unwrap().file_name(), "My Trip.jpg");

        let outcome = run_one(
            "rename_regex",
            &file,
            params(&[("pattern", r"(\w+) (\w+)".into()), ("replace", "${2}_$1".into())]),
        );
        assert_eq!(outcome.rename.unwrap().file_name(), "Holiday_My.jpg");

        let outcome = run_one("rename_case", &file, params(&[("mode", "upper".into())]));
        assert_eq!(outcome.rename.unwrap().file_name(), "MY HOLIDAY.jpg");

        let outcome = run_one("rename_extension", &file, params(&[("extension", ".jpeg".into())]));
        assert_eq!(outcome.rename.unwrap().file_name(), "My Holiday.jpeg");

        let outcome = run_one("rename_prefix", &file, params(&[("text", "2024 ".into())]));
        assert_eq!(outcome.rename.unwrap().file_name(), "2024 My Holiday.jpg");
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("hello big_world"), "Hello Big_World");
    }

    #[test]
    fn test_rename_to_empty_name_fails() {
        let file = FileRecord::from_name("a.txt", 1);
        let result = definition("rename_regex")
            .execute(&[&file], &params(&[("pattern", "^a$".into()), ("replace", "".into())]));
        assert!(matches!(result, Err(RunnerError::InvalidName(_))));
    }

    #[test]
    fn test_serial_numbers_follow_list_order() {
        let a = FileRecord::from_name("a.txt", 1);
        let b = FileRecord::from_name("b.txt", 1);
        let outcomes = definition("rename_serial")
            .execute(&[&a, &b], &params(&[("width", 3.into()), ("separator", "-".into()), ("start", 1.into())]))
            .unwrap();
        let names: Vec<String> = outcomes
            .into_iter()
            .map(|o| o.unwrap().rename.unwrap().file_name())
            .collect();
        assert_eq!(names, vec!["a-001.txt", "b-002.txt"]);
    }

    #[test]
    fn test_serial_overflow_is_an_error() {
        let a = FileRecord::from_name("a.txt", 1);
        let b = FileRecord::from_name("b.txt", 1);
        let result = definition("rename_serial").execute(&[&a, &b], &params(&[("start", i64::MAX.into())]));
        assert!(matches!(result, Err(RunnerError::InvalidParam { ref param, .. }) if param == "start"));

        let result = definition("rename_serial").execute(
            &[&a, &b],
            &params(&[("start", 0.into()), ("step", i64::MIN.into())]),
        );
        assert!(result.is_ok(), "0 and i64::MIN both fit");

        let result = definition("rename_serial").execute(
            &[&a, &b, &b],
            &params(&[("start", 0.into()), ("step", i64::MIN.into())]),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_serial_width_is_capped() {
        let a = FileRecord::from_name("a.txt", 1);
        let result = definition("rename_serial").execute(&[&a], &params(&[("width", 1_000_000_000.into())]));
        assert!(matches!(result, Err(RunnerError::InvalidParam { ref param, .. }) if param == "width"));

        let outcome = definition("rename_serial")
            .execute(&[&a], &params(&[("width", 32.into()), ("start", 7.into())]))
            .unwrap()
            .remove(0)
            .unwrap();
        let name = outcome.rename.unwrap().name;
        assert!(name.ends_with(&format!("{:032}", 7)), "{name}");
    }

    #[test]
    fn test_dedupe_appends_counter_to_repeated_names() {
        let a = FileRecord::from_name("x.txt", 1);
        let b = FileRecord::from_name("X.txt", 1);
        let c = FileRecord::from_name("x.txt", 1);
        let outcomes = definition("rename_dedupe")
            .execute(&[&a, &b, &c], &BoundParams::new())
            .unwrap();
        let names: Vec<String> = outcomes
            .into_iter()
            .zip([&a, &b, &c])
            .map(|(o, f)| {
                o.unwrap()
                    .rename
                    .map(|w| w.file_name())
                    .unwrap_or_else(|| f.working_file_name())
            })
            .collect();
        assert_eq!(names, vec!["x.txt", "X_1.txt", "x_2.txt"]);
    }

    #[test]
    fn test_output_path_requires_folder() {
        let file = FileRecord::from_name("a.txt", 1);
        assert!(definition("output_path")
            .execute(&[&file], &BoundParams::new())
            .is_err());

        let outcome = run_one("output_path", &file, params(&[("output_path", "/out".into())]));
        assert!(!outcome.continues);
        assert_eq!(outcome.output_path, Some(PathBuf::from("/out")));
    }
}
