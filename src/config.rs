//! Bridge configuration
//!
//! Construction-time options for one bridge. Every option maps 1:1 to an
//! engine init flag (see [`BridgeConfig::engine_flags`]). Hosts build it in
//! code through the builder-style setters, the diagnostic CLI loads it from
//! JSON.

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Complete bridge configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Game directory: absolute path, `file://` URI or `content://` tree URI
    pub game_root: String,
    /// Font file override (`-f`)
    #[serde(default)]
    pub font_path: Option<String>,
    /// Screenshot output directory (`--screenshot-path`)
    #[serde(default)]
    pub screenshot_path: Option<String>,
    /// High-quality audio resampling (`--audio-hq`)
    #[serde(default)]
    pub hq_audio: bool,
    /// Outline font rendering (`--render-font-outline`)
    #[serde(default)]
    pub render_outline: bool,
    /// UI language code (`--language`)
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub audio: AudioConfig,
}

/// Audio bridge tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioConfig {
    /// How often a paused `fillBuffer` re-checks the device state
    pub pause_poll_interval_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            pause_poll_interval_ms: 500,
        }
    }
}

impl AudioConfig {
    pub fn pause_poll_interval(&self) -> Duration {
        Duration::from_millis(self.pause_poll_interval_ms.max(1))
    }
}

/// Two-letter language of the current locale, `en` when unknown
pub fn default_language() -> String {
    std::env::var("LANG")
        .ok()
        .and_then(|lang| {
            let code: String = lang.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
            (code.len() >= 2).then(|| code.to_ascii_lowercase())
        })
        .filter(|code| code != "c" && code != "posix")
        .unwrap_or_else(|| "en".to_string())
}

impl BridgeConfig {
    pub fn new(game_root: impl Into<String>) -> Self {
        Self {
            game_root: game_root.into(),
            font_path: None,
            screenshot_path: None,
            hq_audio: false,
            render_outline: false,
            language: default_language(),
            audio: AudioConfig::default(),
        }
    }

    pub fn font_path(mut self, path: impl Into<String>) -> Self {
        self.font_path = Some(path.into());
        self
    }

    pub fn screenshot_path(mut self, path: impl Into<String>) -> Self {
        self.screenshot_path = Some(path.into());
        self
    }

    pub fn use_hq_audio(mut self) -> Self {
        self.hq_audio = true;
        self
    }

    pub fn use_render_outline(mut self) -> Self {
        self.render_outline = true;
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Load configuration from a JSON file
    ///
    /// # Errors
    /// Fails if the file cannot be read, is not valid JSON, or names an
    /// empty game root.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse JSON from {:?}", path))?;
        if config.game_root.trim().is_empty() {
            bail!("{:?}: game_root must not be empty", path);
        }
        log::info!("[Config] Loaded bridge configuration from {:?}", path);
        Ok(config)
    }

    /// Engine init flags
    ///
    /// # Arguments
    /// * `use_host_io` - A tree grant is active, so the engine must route
    ///   all file access through the bridge
    /// * `open_only` - Init run that only opens the game
    pub fn engine_flags(&self, use_host_io: bool, open_only: bool) -> Vec<String> {
        let mut flags = vec!["--language".to_string(), self.language.clone()];
        if use_host_io {
            flags.push("--use-java-io".to_string());
        }
        if open_only {
            flags.push("--open-only".to_string());
        }
        if self.render_outline {
            flags.push("--render-font-outline".to_string());
        }
        if self.hq_audio {
            flags.push("--audio-hq".to_string());
        }
        if let Some(font) = &self.font_path {
            flags.push("-f".to_string());
            flags.push(font.clone());
        }
        if let Some(dir) = &self.screenshot_path {
            flags.push("--screenshot-path".to_string());
            flags.push(dir.clone());
        }
        flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_minimal_flags() {
        let config = BridgeConfig::new("/games/demo").language("ja");
        assert_eq!(config.engine_flags(false, false), vec!["--language", "ja"]);
    }

    #[test]
    fn test_all_flags_in_order() {
        let config = BridgeConfig::new("/games/demo")
            .language("en")
            .font_path("/fonts/default.ttf")
            .screenshot_path("/shots")
            .use_hq_audio()
            .use_render_outline();
        assert_eq!(
            config.engine_flags(true, true),
            vec![
                "--language",
                "en",
                "--use-java-io",
                "--open-only",
                "--render-font-outline",
                "--audio-hq",
                "-f",
                "/fonts/default.ttf",
                "--screenshot-path",
                "/shots",
            ]
        );
    }

    #[test]
    fn test_load_from_file_applies_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"game_root": "/games/demo", "hq_audio": true}}"#).unwrap();

        let config = BridgeConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.game_root, "/games/demo");
        assert!(config.hq_audio);
        assert!(!config.render_outline);
        assert_eq!(config.audio.pause_poll_interval_ms, 500);
        assert_eq!(config.audio.pause_poll_interval(), Duration::from_millis(500));
        assert!(!config.language.is_empty());
    }

    #[test]
    fn test_load_from_file_errors() {
        assert!(BridgeConfig::load_from_file("/nonexistent/bridge.json").is_err());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"game_root": "  "}}"#).unwrap();
        assert!(BridgeConfig::load_from_file(file.path()).is_err());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let err = BridgeConfig::load_from_file(file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse JSON"));
    }
}
