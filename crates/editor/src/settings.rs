//! Editor settings

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use shared::DistanceUnit;

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "cadastral", "cedit")
}

/// Projection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinateSettings {
    /// Constant line scale factor of the plane projection
    pub scale_factor: f64,
}

impl Default for CoordinateSettings {
    fn default() -> Self {
        Self { scale_factor: 1.0 }
    }
}

/// Matching tolerances
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToleranceSettings {
    /// Points closer than this (metres) are treated as the same point
    pub point_match: f64,
}

impl Default for ToleranceSettings {
    fn default() -> Self {
        Self { point_match: 0.001 }
    }
}

/// Entity types given to new features
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySettings {
    pub point: String,
    pub line: String,
    pub text: String,
    /// New lines take part in polygon topology
    pub topological_lines: bool,
}

impl Default for EntitySettings {
    fn default() -> Self {
        Self {
            point: "Survey point".into(),
            line: "Boundary".into(),
            text: "Annotation".into(),
            topological_lines: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// `tracing_subscriber` filter used when `RUST_LOG` is not set
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self { filter: "cedit=info,editor=info".into() }
    }
}

/// All editor settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EditorSettings {
    /// Display unit for distances
    #[serde(default)]
    pub units: DistanceUnit,
    #[serde(default)]
    pub coordinates: CoordinateSettings,
    #[serde(default)]
    pub tolerance: ToleranceSettings,
    #[serde(default)]
    pub entities: EntitySettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl EditorSettings {
    /// Settings file in the user's config directory
    pub fn path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join("settings.json"))
    }

    /// Load settings from file, or return default if not found
    pub fn load() -> Self {
        Self::path().and_then(|path| Self::load_from(&path)).unwrap_or_default()
    }

    /// Save settings to the user's config directory and return the file
    pub fn save(&self) -> std::io::Result<PathBuf> {
        let path = Self::path().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "no config directory for cedit")
        })?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Read settings from a specific file. `None` if missing or unreadable.
    pub fn load_from(path: &Path) -> Option<Self> {
        let json = std::fs::read_to_string(path).ok()?;
        match serde_json::from_str(&json) {
            Ok(settings) => Some(settings),
            Err(e) => {
                tracing::warn!("Ignoring unreadable settings {}: {e}", path.display());
                None
            }
        }
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }
}
