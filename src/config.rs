//! Application configuration.
//!
//! Runtime-tunable try-on settings plus the built-in shade catalogue.
//! Config lives in a JSON file next to the working directory; a missing
//! or unreadable file falls back to defaults so a fresh checkout runs
//! with zero setup.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::tryon::canvas::Color;
use crate::tryon::smoothing::SmoothingParams;

/// A named lipstick shade from the built-in catalogue.
#[derive(Debug, Clone, Copy)]
pub struct ShadePreset {
    pub name: &'static str,
    pub hex: &'static str,
}

/// The shade catalogue offered to the user, darkest plums to bright reds.
pub const PRESET_SHADES: [ShadePreset; 13] = [
    ShadePreset { name: "Deep Plum", hex: "#5a1033" },
    ShadePreset { name: "Soft Rose", hex: "#d36c7c" },
    ShadePreset { name: "Dusty Mauve", hex: "#a66b7c" },
    ShadePreset { name: "Nude Blush", hex: "#c48a7a" },
    ShadePreset { name: "Classic Red", hex: "#b11226" },
    ShadePreset { name: "Cherry Crush", hex: "#8c0d18" },
    ShadePreset { name: "Midnight Wine", hex: "#1f0b16" },
    ShadePreset { name: "Berry Noir", hex: "#3b0f1e" },
    ShadePreset { name: "Mocha Nude", hex: "#8b5e52" },
    ShadePreset { name: "Caramel Kiss", hex: "#b77b65" },
    ShadePreset { name: "Burnt Rose", hex: "#9c4a5a" },
    ShadePreset { name: "Chocolate Plum", hex: "#4a1d2b" },
    ShadePreset { name: "Vamp Burgundy", hex: "#3a0a14" },
];

/// Parse `#rgb`, `#rrggbb` or `#rrggbbaa` into an RGBA color.
pub fn parse_hex_color(hex: &str) -> Result<Color, ConfigError> {
    let digits = hex.strip_prefix('#').unwrap_or(hex);
    let parse =
        |s: &str| u8::from_str_radix(s, 16).map_err(|_| ConfigError::BadColor(hex.to_string()));

    match digits.len() {
        3 => {
            let mut out = [0u8; 4];
            for (i, c) in digits.chars().enumerate() {
                let v = parse(&c.to_string())?;
                out[i] = v * 16 + v;
            }
            out[3] = 255;
            Ok(out)
        }
        6 => Ok([
            parse(&digits[0..2])?,
            parse(&digits[2..4])?,
            parse(&digits[4..6])?,
            255,
        ]),
        8 => Ok([
            parse(&digits[0..2])?,
            parse(&digits[2..4])?,
            parse(&digits[4..6])?,
            parse(&digits[6..8])?,
        ]),
        _ => Err(ConfigError::BadColor(hex.to_string())),
    }
}

/// Persisted application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TryOnConfig {
    /// Camera device index.
    #[serde(default)]
    pub camera_index: u32,

    /// Selected shade as a hex color string.
    #[serde(default = "default_shade")]
    pub lipstick_color: String,

    /// Fill opacity, 0-1.
    #[serde(default = "default_opacity")]
    pub lipstick_opacity: f32,

    /// Whether the eyelash overlay is drawn.
    #[serde(default)]
    pub eyelashes_enabled: bool,

    /// Mirror the display like a selfie camera.
    #[serde(default = "default_mirror")]
    pub mirror_display: bool,

    /// Landmark smoothing tuning.
    #[serde(default)]
    pub smoothing: SmoothingParams,

    /// Detection deadline per frame, milliseconds.
    #[serde(default = "default_detect_timeout_ms")]
    pub detect_timeout_ms: u64,

    /// Target display frame rate.
    #[serde(default = "default_target_fps")]
    pub target_fps: u32,
}

fn default_shade() -> String {
    PRESET_SHADES[0].hex.to_string()
}

fn default_opacity() -> f32 {
    0.4
}

fn default_mirror() -> bool {
    true
}

fn default_detect_timeout_ms() -> u64 {
    250
}

fn default_target_fps() -> u32 {
    60
}

impl Default for TryOnConfig {
    fn default() -> Self {
        Self {
            camera_index: 0,
            lipstick_color: default_shade(),
            lipstick_opacity: default_opacity(),
            eyelashes_enabled: false,
            mirror_display: default_mirror(),
            smoothing: SmoothingParams::default(),
            detect_timeout_ms: default_detect_timeout_ms(),
            target_fps: default_target_fps(),
        }
    }
}

impl TryOnConfig {
    /// Load from a JSON file, falling back to defaults when the file is
    /// missing. A present-but-broken file is an error so typos do not
    /// silently wipe someone's settings.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::info!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path).map_err(ConfigError::Io)?;
        let mut config: Self = serde_json::from_str(&contents).map_err(ConfigError::Parse)?;
        config.clamp();
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self).map_err(ConfigError::Parse)?;
        fs::write(path, json).map_err(ConfigError::Io)?;
        Ok(())
    }

    /// Keep tunables in their sane ranges.
    pub fn clamp(&mut self) {
        self.lipstick_opacity = self.lipstick_opacity.clamp(0.0, 1.0);
        self.target_fps = self.target_fps.clamp(24, 240);
        self.detect_timeout_ms = self.detect_timeout_ms.max(1);
    }

    /// The configured shade as an RGBA color.
    pub fn color(&self) -> Result<Color, ConfigError> {
        parse_hex_color(&self.lipstick_color)
    }

    /// Index of the configured shade within the catalogue, if it is one.
    pub fn shade_index(&self) -> Option<usize> {
        PRESET_SHADES
            .iter()
            .position(|shade| shade.hex.eq_ignore_ascii_case(&self.lipstick_color))
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    BadColor(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "JSON error: {}", e),
            ConfigError::BadColor(hex) => write!(f, "Invalid color: {}", hex),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TryOnConfig::default();
        assert_eq!(config.lipstick_color, "#5a1033");
        assert_eq!(config.lipstick_opacity, 0.4);
        assert!(config.mirror_display);
        assert!(!config.eyelashes_enabled);
        assert_eq!(config.shade_index(), Some(0));
    }

    #[test]
    fn test_parse_hex_forms() {
        assert_eq!(parse_hex_color("#b11226").unwrap(), [0xb1, 0x12, 0x26, 255]);
        assert_eq!(parse_hex_color("b11226").unwrap(), [0xb1, 0x12, 0x26, 255]);
        assert_eq!(parse_hex_color("#f0a").unwrap(), [0xff, 0x00, 0xaa, 255]);
        assert_eq!(
            parse_hex_color("#70090aff").unwrap(),
            [0x70, 0x09, 0x0a, 0xff]
        );
    }

    #[test]
    fn test_parse_hex_rejects_garbage() {
        assert!(parse_hex_color("#12345").is_err());
        assert!(parse_hex_color("#zzzzzz").is_err());
        assert!(parse_hex_color("").is_err());
    }

    #[test]
    fn test_all_presets_parse() {
        for shade in &PRESET_SHADES {
            assert!(parse_hex_color(shade.hex).is_ok(), "{}", shade.name);
        }
    }

    #[test]
    fn test_clamp_ranges() {
        let mut config = TryOnConfig {
            lipstick_opacity: 1.7,
            target_fps: 500,
            detect_timeout_ms: 0,
            ..Default::default()
        };
        config.clamp();
        assert_eq!(config.lipstick_opacity, 1.0);
        assert_eq!(config.target_fps, 240);
        assert_eq!(config.detect_timeout_ms, 1);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: TryOnConfig = serde_json::from_str(r#"{"lipstick_opacity": 0.8}"#).unwrap();
        assert_eq!(config.lipstick_opacity, 0.8);
        assert_eq!(config.lipstick_color, "#5a1033");
        assert!(config.mirror_display);
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = std::env::temp_dir().join("lipstick-tryon-test-config");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");

        let mut config = TryOnConfig::default();
        config.lipstick_color = "#b11226".to_string();
        config.eyelashes_enabled = true;
        config.save(&path).unwrap();

        let loaded = TryOnConfig::load(&path).unwrap();
        assert_eq!(loaded.lipstick_color, "#b11226");
        assert!(loaded.eyelashes_enabled);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_missing_file_is_defaults() {
        let config = TryOnConfig::load(Path::new("/nonexistent/config.json")).unwrap();
        assert_eq!(config.lipstick_color, "#5a1033");
    }
}
