use std::{
    env,
    path::{Path, PathBuf},
};

use directories::BaseDirs;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use crate::core::FieldCatalog;

const CONFIG: &str = include_str!("../.config/config.json5");

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub filters: FilterSettings,
}

/// Names and vocabulary shared by the operator catalog, compiler and controller
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    /// Payload keys with this prefix that are not catalog fields are reserved
    pub reserved_prefix: String,
    /// Reserved key carrying the serialized advanced condition list
    pub advanced_key: String,
    /// Reserved key carrying the selected tags
    pub tags_key: String,
    /// Field whose operators are restricted to like/not-like/is
    pub assignee_field: String,
    pub yes_label: String,
    pub no_label: String,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            reserved_prefix: "_".to_string(),
            advanced_key: "_conditions".to_string(),
            tags_key: "_tags".to_string(),
            assignee_field: "_assign".to_string(),
            yes_label: "Yes".to_string(),
            no_label: "No".to_string(),
        }
    }
}

impl FilterSettings {
    /// Whether a top-level payload key is reserved rather than a field filter.
    ///
    /// Catalog fields win over the prefix, so `_assign` stays an ordinary field.
    pub fn is_reserved(&self, key: &str, catalog: &FieldCatalog) -> bool {
        if key == self.advanced_key || key == self.tags_key {
            return true;
        }
        !self.reserved_prefix.is_empty() && key.starts_with(&self.reserved_prefix) && !catalog.contains(key)
    }
}

lazy_static! {
    pub static ref PROJECT_NAME: String = env!("CARGO_CRATE_NAME").to_uppercase().to_string();
    pub static ref CONFIG_FOLDER: Option<PathBuf> =
        env::var(format!("{}_CONFIG", PROJECT_NAME.clone()))
            .ok()
            .map(PathBuf::from);
}

impl Config {
    /// Load the embedded defaults, layered with the user's config file.
    ///
    /// An explicit `config_path` must exist. Otherwise the user file is
    /// optional: `config.json5` under `$DESKFILTER_CONFIG` when set, else
    /// `~/.deskfilter-config.json5`.
    pub fn from_path(config_path: Option<&PathBuf>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(CONFIG, config::FileFormat::Json5));

        builder = match config_path {
            Some(p) => builder.add_source(
                config::File::from(expand_tilde(p))
                    .format(config::FileFormat::Json5)
                    .required(true),
            ),
            None => builder.add_source(
                config::File::from(user_config_path(CONFIG_FOLDER.as_deref()))
                    .format(config::FileFormat::Json5)
                    .required(false),
            ),
        };

        builder.build()?.try_deserialize()
    }

    /// Configuration made only of the embedded defaults
    pub fn embedded() -> Result<Self, config::ConfigError> {
        json5::from_str(CONFIG).map_err(|e| config::ConfigError::Message(e.to_string()))
    }
}

fn expand_tilde(path: &Path) -> PathBuf {
    if let Some(s) = path.to_str() {
        if s.starts_with("~") {
            if let Some(base) = BaseDirs::new() { return PathBuf::from(s.replacen("~", base.home_dir().to_str().unwrap_or(""), 1)); }
        }
    }
    path.to_path_buf()
}

fn user_config_path(config_folder: Option<&Path>) -> PathBuf {
    if let Some(dir) = config_folder {
        return expand_tilde(dir).join("config.json5");
    }
    if let Some(base) = BaseDirs::new() {
        return base.home_dir().join(".deskfilter-config.json5");
    }
    PathBuf::from(".deskfilter-config.json5")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::core::{FieldDescriptor, FieldType};

    #[test]
    fn test_embedded_config_matches_defaults() {
        let cfg = Config::embedded().unwrap();
        assert_eq!(cfg.filters, FilterSettings::default());
    }

    #[test]
    fn test_user_file_overrides_single_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("filters.json5");
        std::fs::write(&path, "{ filters: { assignee_field: \"owner\" } }").unwrap();

        let cfg = Config::from_path(Some(&path)).unwrap();
        assert_eq!(cfg.filters.assignee_field, "owner");
        assert_eq!(cfg.filters.advanced_key, "_conditions");
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json5");
        assert!(Config::from_path(Some(&path)).is_err());
    }

    #[test]
    fn test_config_folder_locates_user_file() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(user_config_path(Some(dir.path())), dir.path().join("config.json5"));
        assert!(user_config_path(None).ends_with(".deskfilter-config.json5"));
    }

    #[test]
    fn test_reserved_keys() {
        let settings = FilterSettings::default();
        let catalog = FieldCatalog::new(vec![FieldDescriptor::new("_assign", FieldType::Link)]);

        assert!(settings.is_reserved("_conditions", &catalog));
        assert!(settings.is_reserved("_tags", &catalog));
        assert!(settings.is_reserved("_seen", &catalog));
        assert!(!settings.is_reserved("_assign", &catalog));
        assert!(!settings.is_reserved("status", &catalog));
    }
}
