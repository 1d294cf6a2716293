use crate::error::{PickerError, Result};
use crate::output::{OutputFormat, DEFAULT_PREFIX};
use crate::pipeline::Settings;
use crate::priority::{Cap, DEFAULT_CAP};
use crate::schema::TieBreak;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub selection: SelectionConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SelectionConfig {
    #[serde(default = "default_cap")]
    pub cap: u32,
    #[serde(default)]
    pub tie_break: TieBreak,
}

fn default_cap() -> u32 {
    DEFAULT_CAP
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            cap: DEFAULT_CAP,
            tie_break: TieBreak::default(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_directory")]
    pub directory: String,
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default)]
    pub format: OutputFormat,
}

fn default_directory() -> String {
    ".".to_string()
}

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            prefix: default_prefix(),
            format: OutputFormat::default(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EngineConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_workers() -> usize {
    1
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
}

impl TomlConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// `Ok(None)` when the file is missing and was not asked for explicitly,
    /// so the caller can warn and fall back to defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P, explicit: bool) -> Result<Option<Self>> {
        let path = path.as_ref();
        if path.exists() {
            return Self::load_from_file(path).map(Some);
        }
        if explicit {
            return Err(PickerError::Config(format!(
                "Configuration file '{}' not found",
                path.display()
            )));
        }
        Ok(None)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| PickerError::Config(e.to_string()))
    }

    pub fn default_path() -> &'static str {
        "pmta-ip-picker.toml"
    }

    /// Sample configuration with every section filled in
    pub fn generate_default() -> Result<String> {
        let config = TomlConfig {
            logging: Some(LoggingConfig {
                level: "info".to_string(),
            }),
            ..Default::default()
        };
        toml::to_string_pretty(&config).map_err(|e| PickerError::Config(e.to_string()))
    }

    pub fn log_level(&self) -> Option<&str> {
        self.logging.as_ref().map(|l| l.level.as_str())
    }

    pub fn to_settings(&self) -> Result<Settings> {
        if self.output.prefix.trim().is_empty() {
            return Err(PickerError::Config("output prefix must not be empty".to_string()));
        }

        Ok(Settings {
            cap: Cap::new(self.selection.cap)?,
            tie_break: self.selection.tie_break,
            output_dir: PathBuf::from(&self.output.directory),
            prefix: self.output.prefix.clone(),
            format: self.output.format,
            workers: self.engine.workers.max(1),
            preview_rows: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = TomlConfig::parse("").unwrap();
        let settings = config.to_settings().unwrap();

        assert_eq!(settings.cap, Cap::default());
        assert_eq!(settings.tie_break, TieBreak::MoreRows);
        assert_eq!(settings.output_dir, PathBuf::from("."));
        assert_eq!(settings.prefix, "PMTA_Output");
        assert_eq!(settings.format, OutputFormat::Xlsx);
        assert_eq!(settings.workers, 1);
        assert!(config.log_level().is_none());
    }

    #[test]
    fn test_full_config() {
        let config = TomlConfig::parse(
            r#"
            [selection]
            cap = 8
            tie_break = "reject"

            [output]
            directory = "out"
            prefix = "nightly"
            format = "csv"

            [engine]
            workers = 4

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();
        let settings = config.to_settings().unwrap();

        assert_eq!(settings.cap.get(), 8);
        assert_eq!(settings.tie_break, TieBreak::Reject);
        assert_eq!(settings.output_dir, PathBuf::from("out"));
        assert_eq!(settings.prefix, "nightly");
        assert_eq!(settings.format, OutputFormat::Csv);
        assert_eq!(settings.workers, 4);
        assert_eq!(config.log_level(), Some("debug"));
    }

    #[test]
    fn test_invalid_values() {
        let config = TomlConfig::parse("[selection]\ncap = 51\n").unwrap();
        assert!(matches!(config.to_settings(), Err(PickerError::InvalidCap(51))));

        assert!(TomlConfig::parse("[selection]\ntie_break = \"random\"\n").is_err());
        assert!(TomlConfig::parse("[output]\nformat = \"pdf\"\n").is_err());

        let config = TomlConfig::parse("[output]\nprefix = \" \"\n").unwrap();
        assert!(matches!(config.to_settings(), Err(PickerError::Config(_))));
    }

    #[test]
    fn test_missing_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("typo.toml");

        assert!(TomlConfig::load_or_default(&missing, false).unwrap().is_none());
        assert!(matches!(
            TomlConfig::load_or_default(&missing, true),
            Err(PickerError::Config(_))
        ));
    }

    #[test]
    fn test_existing_config_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("picker.toml");
        std::fs::write(&path, "[selection]\ncap = 6\n").unwrap();

        let config = TomlConfig::load_or_default(&path, false).unwrap().unwrap();
        assert_eq!(config.selection.cap, 6);
        let config = TomlConfig::load_or_default(&path, true).unwrap().unwrap();
        assert_eq!(config.selection.cap, 6);
    }

    #[test]
    fn test_generated_config_round_trips() {
        let text = TomlConfig::generate_default().unwrap();
        let config = TomlConfig::parse(&text).unwrap();
        assert_eq!(config.selection.cap, 4);
        assert_eq!(config.log_level(), Some("info"));
    }
}
