//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/genotree/genotree.toml`
//! 3. Local config: `<document_dir>/.genotree.toml` (next to the member document)
//! 4. Environment variables: `GENOTREE_*` prefix, `__` between sections

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::application::ApplicationError;
use crate::domain::{LayoutParams, Margin, PhotoFallback};

/// Unified configuration for genotree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Settings {
    /// Canvas geometry for `layout`
    pub layout: LayoutParams,
    /// Portraits used when a member has no photo
    pub photos: PhotoFallback,
    /// Member document used when `--file` is not given
    pub default_document: Option<PathBuf>,
}

/// Raw margin for intermediate parsing (fields are Option to detect "not specified").
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawMargin {
    pub top: Option<f64>,
    pub right: Option<f64>,
    pub bottom: Option<f64>,
    pub left: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawLayout {
    pub width: Option<f64>,
    pub node_size: Option<f64>,
    pub level_gap: Option<f64>,
    pub margin: RawMargin,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawPhotos {
    pub male: Option<String>,
    pub female: Option<String>,
    pub neutral: Option<String>,
}

/// Raw settings for intermediate parsing.
///
/// Used during layered merging to tell "not specified" (`None`, inherit from
/// the layer below) from an explicit value.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub layout: RawLayout,
    pub photos: RawPhotos,
    pub default_document: Option<PathBuf>,
}

/// Get the XDG config directory for genotree.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "genotree").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("genotree.toml"))
}

/// Get the path to the local config file next to a member document.
pub fn local_config_path(document_dir: &Path) -> PathBuf {
    document_dir.join(".genotree.toml")
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}

/// Expand `~`, `$VAR` and `${VAR}`; unresolvable input is returned as is.
pub fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    shellexpand::full(raw.as_ref())
        .map(|s| PathBuf::from(s.into_owned()))
        .unwrap_or_else(|_| path.to_path_buf())
}

impl Settings {
    /// Overlay wins for every field it specifies.
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        let layout = &self.layout;
        let raw = &overlay.layout;
        let photos = &overlay.photos;
        Self {
            layout: LayoutParams {
                width: raw.width.unwrap_or(layout.width),
                node_size: raw.node_size.unwrap_or(layout.node_size),
                level_gap: raw.level_gap.unwrap_or(layout.level_gap),
                margin: Margin {
                    top: raw.margin.top.unwrap_or(layout.margin.top),
                    right: raw.margin.right.unwrap_or(layout.margin.right),
                    bottom: raw.margin.bottom.unwrap_or(layout.margin.bottom),
                    left: raw.margin.left.unwrap_or(layout.margin.left),
                },
            },
            photos: PhotoFallback {
                male: photos.male.clone().unwrap_or_else(|| self.photos.male.clone()),
                female: photos
                    .female
                    .clone()
                    .unwrap_or_else(|| self.photos.female.clone()),
                neutral: photos
                    .neutral
                    .clone()
                    .unwrap_or_else(|| self.photos.neutral.clone()),
            },
            default_document: overlay
                .default_document
                .clone()
                .or_else(|| self.default_document.clone()),
        }
    }

    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `document_dir` - Directory holding the member document, for local config
    pub fn load(document_dir: Option<&Path>) -> Result<Self, ApplicationError> {
        // 1. Start with defaults
        let mut current = Self::default();

        // 2. Global config
        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                let raw = load_raw_settings(&global_path)?;
                current = current.merge_with(&raw);
            }
        }

        // 3. Local config next to the document
        if let Some(dir) = document_dir {
            let local_path = local_config_path(dir);
            if local_path.exists() {
                let raw = load_raw_settings(&local_path)?;
                current = current.merge_with(&raw);
            }
        }

        // 4. Environment variables
        current = Self::apply_env_overrides(current)?;

        current.expand_paths();
        Ok(current)
    }

    /// Apply GENOTREE_* environment variables as explicit overrides.
    ///
    /// `GENOTREE_LAYOUT__WIDTH=900` sets `layout.width`.
    fn apply_env_overrides(mut settings: Self) -> Result<Self, ApplicationError> {
        let config = Config::builder()
            .add_source(
                Environment::with_prefix("GENOTREE")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .map_err(config_err)?;

        let float = |key: &str| config.get_float(key).ok();
        let string = |key: &str| config.get_string(key).ok();

        let layout = &mut settings.layout;
        if let Some(v) = float("layout.width") {
            layout.width = v;
        }
        if let Some(v) = float("layout.node_size") {
            layout.node_size = v;
        }
        if let Some(v) = float("layout.level_gap") {
            layout.level_gap = v;
        }
        if let Some(v) = float("layout.margin.top") {
            layout.margin.top = v;
        }
        if let Some(v) = float("layout.margin.right") {
            layout.margin.right = v;
        }
        if let Some(v) = float("layout.margin.bottom") {
            layout.margin.bottom = v;
        }
        if let Some(v) = float("layout.margin.left") {
            layout.margin.left = v;
        }
        if let Some(v) = string("photos.male") {
            settings.photos.male = v;
        }
        if let Some(v) = string("photos.female") {
            settings.photos.female = v;
        }
        if let Some(v) = string("photos.neutral") {
            settings.photos.neutral = v;
        }
        if let Some(v) = string("default_document") {
            settings.default_document = Some(PathBuf::from(v));
        }

        Ok(settings)
    }

    fn expand_paths(&mut self) {
        if let Some(doc) = &self.default_document {
            self.default_document = Some(expand_path(doc));
        }
    }

    /// Render the effective settings as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.layout.width, 1200.0);
        assert_eq!(settings.layout.level_gap, 120.0);
        assert_eq!(settings.photos.male, "img/male.png");
        assert!(settings.default_document.is_none());
    }

    #[test]
    fn test_merge_overlay_wins_only_where_specified() {
        let raw: RawSettings = toml::from_str(
            r#"
[layout]
width = 800.0
[layout.margin]
left = 10.0
"#,
        )
        .unwrap();
        let merged = Settings::default().merge_with(&raw);
        assert_eq!(merged.layout.width, 800.0);
        assert_eq!(merged.layout.margin.left, 10.0);
        assert_eq!(merged.layout.margin.top, 50.0);
        assert_eq!(merged.layout.node_size, 80.0);
    }

    #[test]
    fn test_expand_path_home() {
        let expanded = expand_path(Path::new("~/family.json"));
        assert!(!expanded.to_string_lossy().starts_with('~'));
    }

    #[test]
    fn test_settings_render_as_toml() {
        let rendered = Settings::default().to_toml().unwrap();
        assert!(rendered.contains("[layout]"));
        assert!(rendered.contains("[photos]"));
    }
}
