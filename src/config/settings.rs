//! Runtime settings
//!
//! Every section has sensible defaults, so a settings file only needs the
//! fields it wants to change.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::input::motion::{MotionModel, Speed};
use crate::vision::colour::ColourRange;

/// Main settings structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Which window to drive
    pub window: WindowSettings,
    /// Where fonts and templates live
    pub assets: AssetSettings,
    /// Injection host module
    pub input: InputSettings,
    /// Pointer behaviour
    pub mouse: MouseSettings,
    /// Script loop pacing
    pub script: ScriptSettings,
    /// Pause chord
    pub hotkey: HotkeySettings,
    /// Glyph sets
    pub fonts: FontSettings,
    /// Anchor thresholds for the zone map
    pub zones: ZoneSettings,
    /// Colour ranges added to the built-in ones
    pub colours: Vec<ColourRange>,
}

impl Settings {
    /// Read settings from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Write settings as pretty JSON
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Settings for running against a screenshot without a host module
    pub fn dry_run_preset() -> Self {
        Self {
            input: InputSettings {
                cleanup_modules: false,
                ..Default::default()
            },
            hotkey: HotkeySettings {
                enabled: false,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Slower, more deliberate movement and longer pauses between cycles
    pub fn cautious_preset() -> Self {
        Self {
            mouse: MouseSettings {
                model: MotionModel::Wind,
                default_speed: Speed::Slow,
            },
            script: ScriptSettings {
                min_cycle_pause_ms: 400,
                max_cycle_pause_ms: 1200,
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

/// Target window discovery
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowSettings {
    /// Exact (trimmed) top-level window title
    pub title: String,
    /// Class of the drawing surface child; `None` uses the window itself
    pub canvas_class: Option<String>,
    /// Which matching child to use, counting from 1
    pub canvas_index: usize,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            title: "RuneLite".into(),
            canvas_class: Some("SunAwtCanvas".into()),
            canvas_index: 2,
        }
    }
}

/// Asset locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetSettings {
    /// Directory holding `fonts/` and `images/`
    pub root: PathBuf,
}

impl Default for AssetSettings {
    fn default() -> Self {
        Self {
            root: PathBuf::from("resources"),
        }
    }
}

impl AssetSettings {
    pub fn fonts_dir(&self) -> PathBuf {
        self.root.join("fonts")
    }

    /// Path of a UI image such as `minimap.png`
    pub fn ui_image(&self, name: &str) -> PathBuf {
        self.root.join("images").join("ui").join(name)
    }
}

/// Injection host module
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputSettings {
    /// Directory of the host module; defaults to the executable's directory
    pub module_dir: Option<PathBuf>,
    /// Module file stem
    pub module_name: String,
    /// Delete the module files after shutdown
    pub cleanup_modules: bool,
    /// Files removed by the cleanup job, relative to the module directory
    pub cleanup_files: Vec<String>,
    /// Wait before deleting, so the host can unload the module
    pub cleanup_delay_secs: u64,
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            module_dir: None,
            module_name: "KInputCtrl64".into(),
            cleanup_modules: true,
            cleanup_files: vec!["KInputCtrl.dll".into(), "KInput.dll".into()],
            cleanup_delay_secs: 2,
        }
    }
}

impl InputSettings {
    /// Resolved module directory
    pub fn resolve_module_dir(&self) -> PathBuf {
        if let Some(dir) = &self.module_dir {
            return dir.clone();
        }
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Absolute paths of the files to clean up
    pub fn cleanup_paths(&self) -> Vec<PathBuf> {
        let dir = self.resolve_module_dir();
        self.cleanup_files.iter().map(|f| dir.join(f)).collect()
    }
}

/// Pointer behaviour
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MouseSettings {
    pub model: MotionModel,
    pub default_speed: Speed,
}

/// Script loop pacing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptSettings {
    /// Shortest pause between cycles (ms)
    pub min_cycle_pause_ms: u64,
    /// Longest pause between cycles (ms)
    pub max_cycle_pause_ms: u64,
    /// Stop cleanly after this many seconds
    pub max_runtime_secs: Option<u64>,
}

impl Default for ScriptSettings {
    fn default() -> Self {
        Self {
            min_cycle_pause_ms: 100,
            max_cycle_pause_ms: 300,
            max_runtime_secs: None,
        }
    }
}

/// Pause chord
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HotkeySettings {
    pub enabled: bool,
    /// Both keys held together pause the run
    pub chord: [char; 2],
}

impl Default for HotkeySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            chord: ['=', '-'],
        }
    }
}

/// Glyph sets
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FontSettings {
    /// Loaded during controller start-up
    pub prewarm: Vec<String>,
}

impl Default for FontSettings {
    fn default() -> Self {
        Self {
            prewarm: vec!["Plain 11".into(), "Plain 12".into(), "Bold 12".into()],
        }
    }
}

/// Anchor template thresholds (lower is stricter)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneSettings {
    pub minimap_threshold: f64,
    pub inventory_threshold: f64,
    pub chat_threshold: f64,
    pub fixed_minimap_threshold: f64,
}

impl Default for ZoneSettings {
    fn default() -> Self {
        Self {
            minimap_threshold: 0.02,
            inventory_threshold: 0.035,
            chat_threshold: 0.032,
            fixed_minimap_threshold: 0.018,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.window.title, "RuneLite");
        assert_eq!(settings.window.canvas_index, 2);
        assert_eq!(settings.script.min_cycle_pause_ms, 100);
        assert_eq!(settings.hotkey.chord, ['=', '-']);
        assert_eq!(settings.fonts.prewarm.len(), 3);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let json = r#"{ "window": { "title": "Client" }, "mouse": { "default_speed": "fast" } }"#;
        let settings: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.window.title, "Client");
        assert_eq!(settings.window.canvas_class.as_deref(), Some("SunAwtCanvas"));
        assert_eq!(settings.mouse.default_speed, Speed::Fast);
        assert_eq!(settings.zones.chat_threshold, 0.032);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings::cautious_preset();
        settings.save(&path).unwrap();

        let loaded = Settings::load(&path).unwrap();
        assert_eq!(loaded.mouse.model, MotionModel::Wind);
        assert_eq!(loaded.script.max_cycle_pause_ms, 1200);
    }

    #[test]
    fn test_dry_run_preset() {
        let settings = Settings::dry_run_preset();
        assert!(!settings.input.cleanup_modules);
        assert!(!settings.hotkey.enabled);
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let result = Settings::load(Path::new("/definitely/not/here.json"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_unwritable_path_is_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no-such-dir").join("settings.json");
        let result = Settings::default().save(&path);
        assert!(matches!(result, Err(ConfigError::Write { .. })));
    }
}
