//! The session-wide lookup table from runner id to runner definition.

use super::builtin::{builtin_tables, DEFAULT_RUNNER_ID};
use super::RunnerDefinition;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("runner id '{0}' is defined more than once")]
    DuplicateId(String),

    #[error("the default runner '{0}' is missing")]
    MissingDefault(String),
}

/// An immutable, ordered collection of runner definitions with unique ids.
#[derive(Debug, Clone)]
pub struct RunnerRegistry {
    runners: Vec<RunnerDefinition>,
    index: HashMap<String, usize>,
}

impl RunnerRegistry {
    /// Merges the built-in tables.
    pub fn builtin() -> Result<Self, RegistryError> {
        Self::from_tables(builtin_tables())
    }

    /// Merges tables in order, failing on the first duplicate id.
    pub fn from_tables(tables: Vec<Vec<RunnerDefinition>>) -> Result<Self, RegistryError> {
        let mut registry = Self {
            runners: Vec::new(),
            index: HashMap::new(),
        };
        for definition in tables.into_iter().flatten() {
            registry.insert(definition)?;
        }
        if !registry.index.contains_key(DEFAULT_RUNNER_ID) {
            return Err(RegistryError::MissingDefault(DEFAULT_RUNNER_ID.to_string()));
        }
        Ok(registry)
    }

    fn insert(&mut self, definition: RunnerDefinition) -> Result<(), RegistryError> {
        if self.index.contains_key(&definition.id) {
            return Err(RegistryError::DuplicateId(definition.id));
        }
        self.index.insert(definition.id.clone(), self.runners.len());
        self.runners.push(definition);
        Ok(())
    }

    /// Returns a new registry with user-authored runners appended.
    ///
    /// A user-authored runner whose id is already taken is rejected; its id is
    /// returned so the caller can report it.
    pub fn with_custom(&self, custom: Vec<RunnerDefinition>) -> (Self, Vec<String>) {
        let mut registry = self.clone();
        let mut rejected = Vec::new();
        for definition in custom {
            let id = definition.id.clone();
            if let Err(e) = registry.insert(definition) {
                tracing::warn!("Rejected user-authored runner: {}", e);
                rejected.push(id);
            }
        }
        (registry, rejected)
    }

    /// The registry without any user-authored runners.
    pub fn builtin_only(&self) -> Self {
        let builtin = self
            .runners
            .iter()
            .filter(|r| !r.is_custom())
            .cloned()
            .map(|r| vec![r])
            .collect();
        // Ids were unique before, so filtering cannot introduce duplicates.
        Self::from_tables(builtin).unwrap_or_else(|_| self.clone())
    }

    pub fn get(&self, id: &str) -> Option<&RunnerDefinition> {
        self.index.get(id).map(|&i| &self.runners[i])
    }

    pub fn all(&self) -> &[RunnerDefinition] {
        &self.runners
    }

    pub fn default_runner(&self) -> &RunnerDefinition {
        // Presence is checked in `from_tables`.
        &self.runners[self.index[DEFAULT_RUNNER_ID]]
    }

    pub fn len(&self) -> usize {
        self.runners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runners.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::runner::builtin::{filter_runners, pass_through_runners};
    use crate::core::runner::custom::{definition_from_entry, encode_rule, CustomRunnerEntry};
    use crate::core::runner::{RunnerCategory, Scope};
    use tracing_test::traced_test;

    #[test]
    fn test_builtin_registry_has_unique_ids_in_table_order() {
        let registry = RunnerRegistry::builtin().unwrap();
        assert_eq!(registry.all()[0].id, DEFAULT_RUNNER_ID);
        assert_eq!(registry.default_runner().id, DEFAULT_RUNNER_ID);
        assert!(registry.get("rename_serial").is_some());
        assert!(registry.get("output_path").is_some());
        assert!(registry.get("nope").is_none());
        assert_eq!(registry.len(), builtin_tables().into_iter().flatten().count());
    }

    #[test]
    fn test_duplicate_ids_fail_construction() {
        let result = RunnerRegistry::from_tables(vec![
            pass_through_runners(),
            filter_runners(),
            filter_runners(),
        ]);
        assert_eq!(
            result.unwrap_err(),
            RegistryError::DuplicateId("filter_contains".to_string())
        );
    }

    #[test]
    fn test_missing_default_fails_construction() {
        let result = RunnerRegistry::from_tables(vec![filter_runners()]);
        assert!(matches!(result, Err(RegistryError::MissingDefault(_))));
    }

    #[traced_test]
    #[test]
    fn test_custom_runner_cannot_shadow_builtin() {
        let registry = RunnerRegistry::builtin().unwrap();
        let entry = CustomRunnerEntry {
            label: "Shadow".to_string(),
            scope: Scope::PerFile,
            params: Vec::new(),
            func: encode_rule(".*"),
            desc: String::new(),
            enabled: true,
        };
        let shadow = definition_from_entry("filter_regex", &entry, RunnerCategory::Filter);
        let fresh = definition_from_entry("my_filter", &entry, RunnerCategory::Filter);

        let (merged, rejected) = registry.with_custom(vec![shadow, fresh]);

        assert_eq!(rejected, vec!["filter_regex".to_string()]);
        assert!(!merged.get("filter_regex").unwrap().is_custom());
        assert!(merged.get("my_filter").unwrap().is_custom());
        assert_eq!(merged.builtin_only().len(), registry.len());
        assert!(logs_contain("Rejected user-authored runner"));
    }
}
