use directories::ProjectDirs;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

use super::{AppConfig, ConfigError, CONFIG_VERSION};

const APP_NAME: &str = "BulkFlowRenamer";
const CONFIG_FILE: &str = "config.json";
/// Overrides the platform configuration directory, e.g. for portable installs.
pub const CONFIG_DIR_ENV: &str = "BFR_CONFIG_DIR";

/// Returns the configuration directory: `BFR_CONFIG_DIR` if set, else the
/// platform-specific one.
pub fn get_config_directory() -> Result<PathBuf, ConfigError> {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    ProjectDirs::from("com", "bulkflowrenamer", APP_NAME)
        .map(|proj_dirs| proj_dirs.config_dir().to_path_buf())
        .ok_or(ConfigError::NoConfigDirectory)
}

pub fn get_config_file_path(config_dir: &Path) -> PathBuf {
    config_dir.join(CONFIG_FILE)
}

type Version = (u64, u64, u64);

fn parse_version(text: &str) -> Option<Version> {
    let mut parts = text.trim().splitn(3, '.').map(|p| p.parse::<u64>().ok());
    Some((parts.next()??, parts.next()??, parts.next()??))
}

fn current_version() -> Version {
    parse_version(CONFIG_VERSION).unwrap_or((0, 0, 0))
}

fn defaults_object() -> Result<Map<String, Value>, ConfigError> {
    match serde_json::to_value(AppConfig::default()) {
        Ok(Value::Object(map)) => Ok(map),
        _ => Err(ConfigError::Migration {
            from: CONFIG_VERSION.to_string(),
            reason: "defaults are not a JSON object".to_string(),
        }),
    }
}

/// Brings a stored configuration object up to the running version.
///
/// A major bump rebuilds from defaults and keeps only keys that still exist.
/// A minor bump adds missing keys from the defaults. A patch bump only updates
/// the version stamp. Returns whether anything changed.
fn migrate(mut stored: Map<String, Value>, path: &Path) -> Result<(AppConfig, bool), ConfigError> {
    let found = stored
        .get("version")
        .and_then(Value::as_str)
        .unwrap_or("0.0.0")
        .to_string();
    let from = parse_version(&found).ok_or_else(|| ConfigError::Migration {
        from: found.clone(),
        reason: "version is not in major.minor.patch form".to_string(),
    })?;
    let current = current_version();

    if from.0 > current.0 {
        return Err(ConfigError::UnsupportedVersion {
            found,
            supported: CONFIG_VERSION.to_string(),
        });
    }

    let migrated = if from.0 < current.0 {
        tracing::info!("Rebuilding config from version {} for {}", found, CONFIG_VERSION);
        let mut rebuilt = defaults_object()?;
        for (key, value) in rebuilt.iter_mut() {
            if let Some(kept) = stored.remove(key) {
                *value = kept;
            }
        }
        rebuilt
    } else if from.1 != current.1 {
        tracing::info!("Merging new config keys from version {} into {}", found, CONFIG_VERSION);
        for (key, value) in defaults_object()? {
            stored.entry(key).or_insert(value);
        }
        stored
    } else {
        stored
    };

    let changed = from != current;
    let mut migrated = migrated;
    migrated.insert("version".to_string(), Value::String(CONFIG_VERSION.to_string()));

    let config = serde_json::from_value::<AppConfig>(Value::Object(migrated)).map_err(|source| {
        if changed {
            ConfigError::Migration {
                from: found.clone(),
                reason: source.to_string(),
            }
        } else {
            ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    Ok((config, changed))
}

/// Loads and, if needed, migrates the configuration stored in `config_dir`.
///
/// Nothing is silently corrected: unreadable, unparsable or too-new files are
/// reported as errors.
pub fn load_config(config_dir: &Path) -> Result<AppConfig, ConfigError> {
    let config_path = get_config_file_path(config_dir);
    if !config_path.exists() {
        return Err(ConfigError::NotFound(config_path));
    }

    let content = fs::read_to_string(&config_path).map_err(|source| ConfigError::Read {
        path: config_path.clone(),
        source,
    })?;
    let value: Value = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
        path: config_path.clone(),
        source,
    })?;
    let Value::Object(stored) = value else {
        return Err(ConfigError::Parse {
            path: config_path.clone(),
            source: serde::de::Error::custom("config is not a JSON object"),
        });
    };

    let (config, migrated) = migrate(stored, &config_path)?;
    if migrated {
        save_config(&config, config_dir)?;
        tracing::info!("Migrated config at {:?} to version {}", config_path, CONFIG_VERSION);
    } else {
        tracing::info!("Loaded config from {:?}", config_path);
    }
    Ok(config)
}

/// Like [`load_config`], but writes and returns the defaults on first launch.
pub fn load_or_create_config(config_dir: &Path) -> Result<AppConfig, ConfigError> {
    match load_config(config_dir) {
        Err(ConfigError::NotFound(path)) => {
            tracing::info!("Config file not found, creating default config at {:?}", path);
            reset_config(config_dir)
        }
        other => other,
    }
}

/// Overwrites the stored configuration with the defaults.
pub fn reset_config(config_dir: &Path) -> Result<AppConfig, ConfigError> {
    let config = AppConfig::default();
    save_config(&config, config_dir)?;
    Ok(config)
}

fn write_error(path: &Path) -> impl FnOnce(std::io::Error) -> ConfigError {
    let path = path.to_path_buf();
    move |source| ConfigError::Write { path, source }
}

/// Saves the provided configuration to the config file.
pub fn save_config(config: &AppConfig, config_dir: &Path) -> Result<(), ConfigError> {
    if !config_dir.exists() {
        fs::create_dir_all(config_dir).map_err(write_error(config_dir))?;
        tracing::info!("Created config directory: {:?}", config_dir);
    }

    let config_path = get_config_file_path(config_dir);
    let config_json = serde_json::to_string_pretty(config).map_err(|e| ConfigError::Write {
        path: config_path.clone(),
        source: std::io::Error::other(e),
    })?;
    fs::write(&config_path, config_json).map_err(write_error(&config_path))?;
    tracing::info!("Saved config to {:?}", config_path);
    Ok(())
}

// Platform-specific configuration paths for reference:
// macOS:   ~/Library/Application Support/com.bulkflowrenamer.BulkFlowRenamer/
// Linux:   ~/.config/bulkflowrenamer/
// Windows: %APPDATA%/bulkflowrenamer/BulkFlowRenamer/config/
