//! Persistent user defaults stored as TOML.
//!
//! ```toml
//! [defaults]
//! timeout = 5.0
//! format = "text"
//! time_url = "https://worldtimeapi.org/api/timezone/Etc/UTC"
//! time_field = "datetime"
//! resync_interval = 60
//! batch_size = 10
//!
//! [catalog]
//! path = "/etc/driftkit/targets.toml"
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use toml::Value;

use crate::error::DriftError;

pub const CONFIG_DIR_ENV: &str = "DRIFTKIT_CONFIG_DIR";

pub const KEYS: &[&str] = &[
    "timeout",
    "format",
    "time_url",
    "time_field",
    "resync_interval",
    "batch_size",
    "catalog",
];

const FORMATS: &[&str] = &["text", "json", "simple"];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Defaults {
    pub timeout: Option<f64>,
    pub format: Option<String>,
    pub time_url: Option<String>,
    pub time_field: Option<String>,
    pub resync_interval: Option<f64>,
    pub batch_size: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigData {
    pub defaults: Defaults,
    pub catalog_path: Option<PathBuf>,
}

#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    pub data: ConfigData,
}

impl ConfigStore {
    /// Load from the default location; a missing file yields empty defaults.
    pub fn load() -> Result<Self, DriftError> {
        Self::load_from(default_path())
    }

    pub fn load_from(path: PathBuf) -> Result<Self, DriftError> {
        if !path.exists() {
            return Ok(Self {
                path,
                data: ConfigData::default(),
            });
        }
        let content = fs::read_to_string(&path)?;
        let data = parse_config(&content)?;
        Ok(Self { path, data })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn defaults(&self) -> &Defaults {
        &self.data.defaults
    }

    pub fn save(&self) -> Result<(), DriftError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, self.to_toml_string()?)?;
        Ok(())
    }

    pub fn to_toml_string(&self) -> Result<String, DriftError> {
        let mut root = toml::map::Map::new();
        if let Some(defaults) = defaults_to_toml(&self.data.defaults) {
            root.insert("defaults".into(), Value::Table(defaults));
        }
        if let Some(path) = &self.data.catalog_path {
            let mut catalog = toml::map::Map::new();
            catalog.insert("path".into(), Value::String(path.display().to_string()));
            root.insert("catalog".into(), Value::Table(catalog));
        }
        Ok(toml::to_string_pretty(&Value::Table(root))?)
    }

    /// Set one key from its textual form, validating the value.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), DriftError> {
        let d = &mut self.data.defaults;
        match key {
            "timeout" => d.timeout = Some(parse_positive(key, value)?),
            "resync_interval" => d.resync_interval = Some(parse_positive(key, value)?),
            "batch_size" => {
                let n: usize = value
                    .parse()
                    .map_err(|_| DriftError::Config(format!("{key}: not an integer: '{value}'")))?;
                if n == 0 {
                    return Err(DriftError::Config(format!("{key} must be at least 1")));
                }
                d.batch_size = Some(n);
            }
            "format" => {
                if !FORMATS.contains(&value) {
                    return Err(DriftError::Config(format!(
                        "format must be one of {}: '{value}'",
                        FORMATS.join(", ")
                    )));
                }
                d.format = Some(value.to_string());
            }
            "time_url" => d.time_url = Some(value.to_string()),
            "time_field" => d.time_field = Some(value.to_string()),
            "catalog" => self.data.catalog_path = Some(PathBuf::from(value)),
            _ => return Err(unknown_key(key)),
        }
        Ok(())
    }

    /// Remove one key. Returns whether it was set.
    pub fn unset(&mut self, key: &str) -> Result<bool, DriftError> {
        let d = &mut self.data.defaults;
        let was_set = match key {
            "timeout" => d.timeout.take().is_some(),
            "resync_interval" => d.resync_interval.take().is_some(),
            "batch_size" => d.batch_size.take().is_some(),
            "format" => d.format.take().is_some(),
            "time_url" => d.time_url.take().is_some(),
            "time_field" => d.time_field.take().is_some(),
            "catalog" => self.data.catalog_path.take().is_some(),
            _ => return Err(unknown_key(key)),
        };
        Ok(was_set)
    }
}

fn unknown_key(key: &str) -> DriftError {
    DriftError::Config(format!("unknown key '{key}' (expected one of {})", KEYS.join(", ")))
}

fn parse_positive(key: &str, value: &str) -> Result<f64, DriftError> {
    let secs: f64 = value
        .parse()
        .map_err(|_| DriftError::Config(format!("{key} must be a positive number: '{value}'")))?;
    seconds_to_duration(key, secs)?;
    Ok(secs)
}

/// Convert a user supplied number of seconds into a non-zero [`Duration`].
pub fn seconds_to_duration(key: &str, secs: f64) -> Result<Duration, DriftError> {
    if secs.is_nan() || secs <= 0.0 {
        return Err(DriftError::Config(format!("{key} must be a positive number of seconds, got {secs}")));
    }
    match Duration::try_from_secs_f64(secs) {
        Ok(d) if !d.is_zero() => Ok(d),
        Ok(_) => Err(DriftError::Config(format!("{key} is below one nanosecond: {secs}"))),
        Err(e) => Err(DriftError::Config(format!("{key} is out of range ({secs}): {e}"))),
    }
}

pub fn default_path() -> PathBuf {
    resolve_config_dir().join("config.toml")
}

pub fn parse_config(content: &str) -> Result<ConfigData, DriftError> {
    let root: Value = content.parse::<Value>()?;
    let mut data = ConfigData::default();
    if let Some(defaults) = root.get("defaults").and_then(Value::as_table) {
        data.defaults.timeout = defaults.get("timeout").and_then(as_number);
        data.defaults.resync_interval = defaults.get("resync_interval").and_then(as_number);
        if let Some(format) = defaults.get("format").and_then(Value::as_str) {
            if !FORMATS.contains(&format) {
                return Err(DriftError::Config(format!("unsupported format '{format}'")));
            }
            data.defaults.format = Some(format.to_string());
        }
        data.defaults.time_url = defaults.get("time_url").and_then(Value::as_str).map(String::from);
        data.defaults.time_field = defaults
            .get("time_field")
            .and_then(Value::as_str)
            .map(String::from);
        if let Some(size) = defaults.get("batch_size").and_then(Value::as_integer) {
            if size < 1 {
                return Err(DriftError::Config(format!("batch_size must be at least 1, got {size}")));
            }
            data.defaults.batch_size = Some(size as usize);
        }
    }
    if let Some(path) = root
        .get("catalog")
        .and_then(Value::as_table)
        .and_then(|c| c.get("path"))
        .and_then(Value::as_str)
    {
        data.catalog_path = Some(PathBuf::from(path));
    }
    Ok(data)
}

fn as_number(value: &Value) -> Option<f64> {
    value
        .as_float()
        .or_else(|| value.as_integer().map(|i| i as f64))
}

fn defaults_to_toml(defaults: &Defaults) -> Option<toml::map::Map<String, Value>> {
    if *defaults == Defaults::default() {
        return None;
    }
    let mut table = toml::map::Map::new();
    if let Some(timeout) = defaults.timeout {
        table.insert("timeout".into(), Value::Float(timeout));
    }
    if let Some(format) = &defaults.format {
        table.insert("format".into(), Value::String(format.clone()));
    }
    if let Some(url) = &defaults.time_url {
        table.insert("time_url".into(), Value::String(url.clone()));
    }
    if let Some(field) = &defaults.time_field {
        table.insert("time_field".into(), Value::String(field.clone()));
    }
    if let Some(interval) = defaults.resync_interval {
        table.insert("resync_interval".into(), Value::Float(interval));
    }
    if let Some(size) = defaults.batch_size {
        table.insert("batch_size".into(), Value::Integer(size as i64));
    }
    Some(table)
}

fn resolve_config_dir() -> PathBuf {
    if let Some(val) = env::var_os(CONFIG_DIR_ENV) {
        let path = PathBuf::from(val);
        if path.is_absolute() {
            return path;
        }
        return env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| PathBuf::from("."));
    }
    if let Some(base) = dirs::config_dir() {
        return base.join("driftkit");
    }
    PathBuf::from(".driftkit")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_defaults_and_catalog() {
        let data = parse_config(
            r#"
            [defaults]
            timeout = 3
            format = "json"
            batch_size = 4
            resync_interval = 30.5

            [catalog]
            path = "targets.toml"
            "#,
        )
        .unwrap();
        assert_eq!(data.defaults.timeout, Some(3.0));
        assert_eq!(data.defaults.format.as_deref(), Some("json"));
        assert_eq!(data.defaults.batch_size, Some(4));
        assert_eq!(data.defaults.resync_interval, Some(30.5));
        assert_eq!(data.catalog_path, Some(PathBuf::from("targets.toml")));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(parse_config("[defaults]\nformat = \"xml\"").is_err());
        assert!(parse_config("[defaults]\nbatch_size = 0").is_err());
        assert!(parse_config("not toml ===").is_err());
    }

    #[test]
    fn save_and_reload_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut store = ConfigStore::load_from(path.clone()).unwrap();
        assert_eq!(store.data, ConfigData::default());

        store.set("timeout", "2.5").unwrap();
        store.set("format", "simple").unwrap();
        store.set("catalog", "/tmp/targets.toml").unwrap();
        store.save().unwrap();

        let reloaded = ConfigStore::load_from(path).unwrap();
        assert_eq!(reloaded.defaults().timeout, Some(2.5));
        assert_eq!(reloaded.defaults().format.as_deref(), Some("simple"));
        assert_eq!(reloaded.data.catalog_path, Some(PathBuf::from("/tmp/targets.toml")));
    }

    #[test]
    fn set_and_unset_validate_keys() {
        let mut store = ConfigStore::load_from(PathBuf::from("/nonexistent/driftkit.toml")).unwrap();
        assert!(store.set("timeout", "-1").is_err());
        assert!(store.set("batch_size", "0").is_err());
        assert!(store.set("colour", "blue").is_err());
        store.set("batch_size", "5").unwrap();
        assert!(store.unset("batch_size").unwrap());
        assert!(!store.unset("batch_size").unwrap());
        assert!(store.unset("colour").is_err());
    }

    #[test]
    fn seconds_outside_duration_range_are_config_errors() {
        assert_eq!(seconds_to_duration("timeout", 2.5).unwrap(), Duration::from_millis(2500));
        for bad in [0.0, -1.0, 1e-12, 1e300, f64::NAN, f64::INFINITY] {
            assert!(
                matches!(seconds_to_duration("timeout", bad), Err(DriftError::Config(_))),
                "{bad} accepted"
            );
        }

        let mut store = ConfigStore::load_from(PathBuf::from("/nonexistent/driftkit.toml")).unwrap();
        assert!(store.set("timeout", "1e300").is_err());
        assert!(store.set("resync_interval", "1e-12").is_err());
    }
}
