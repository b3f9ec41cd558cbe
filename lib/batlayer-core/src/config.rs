use crate::icons::IconSet;
use crate::level::STATE_COUNT;
use crate::paths;
use crate::platform::{Position, Rgba16};
use log::trace;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Icon set size variant, matching the directory names under `icons/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IconSize {
    #[default]
    Small,
    Medium,
    Large,
}

impl IconSize {
    /// Maps `0..=2` to a size. Anything else falls back to small.
    pub fn from_index(index: u32) -> Self {
        match index {
            1 => Self::Medium,
            2 => Self::Large,
            _ => Self::Small,
        }
    }

    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
        }
    }
}

/// Where commands come from for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    /// Text tokens on stdin.
    Piped,
    /// Key presses and/or the animation ticker.
    Interactive { keys: bool, animate: bool },
    /// Nothing but signals and the timeout.
    Static,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The path the config file was loaded from
    #[serde(skip)]
    pub config_path: Option<PathBuf>,

    /// Background fill colour as 16 bit RGBA hex (e.g. "0x000F" is opaque black). "0x0000" disables it
    #[serde(
        serialize_with = "serialize_color",
        deserialize_with = "deserialize_color"
    )]
    pub background: Rgba16,
    /// Index of the display to draw on
    pub display: u32,
    /// Layer of the lowest overlay. Each level is placed one layer above the previous one
    pub layer: i32,
    /// Overlay offset from the left edge in pixels
    pub x_offset: i32,
    /// Overlay offset from the top edge in pixels
    pub y_offset: i32,
    /// Stop after this many milliseconds. 0 runs until told to stop
    pub timeout_ms: u32,
    /// Whether to poll the keyboard for commands
    pub interactive: bool,
    /// Whether to cycle through the levels on a timer
    pub animate: bool,
    /// Whether to read commands from stdin. Keys and animation are only used when this is off
    pub pipe: bool,
    /// Which icon set size to use
    pub icon_size: IconSize,
    /// Root directory holding the icon sets. Defaults to `icons/` next to the executable
    pub icon_dir: Option<PathBuf>,
    /// Image to use for the first level instead of the icon set's own file
    pub initial_image: Option<PathBuf>,
    /// How long the run loop sleeps when there is nothing to do
    pub poll_interval_ms: u32,
    /// How often the animation advances to the next level
    pub animation_interval_ms: u32,
    /// Draw into memory instead of a real display
    pub headless: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_path: None,
            background: Rgba16(0),
            display: 0,
            layer: 3000,
            x_offset: 0,
            y_offset: 0,
            timeout_ms: 0,
            interactive: true,
            animate: false,
            pipe: true,
            icon_size: IconSize::Small,
            icon_dir: None,
            initial_image: None,
            poll_interval_ms: 10,
            animation_interval_ms: 1000,
            headless: false,
        }
    }
}

/// Largest distance an overlay may be placed from the screen origin in either direction.
pub const MAX_OFFSET: i32 = 1 << 24;

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config = Self::from_yaml(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.config_path = Some(path.to_path_buf());

        trace!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Loads the given file, or the default config file if it exists, or the built in defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load(path);
        }

        match paths::default_config_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn from_yaml(contents: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_ms must be greater than 0".to_string(),
            ));
        }
        let highest_layer = i32::MAX - (STATE_COUNT as i32 - 1);
        if self.layer == i32::MIN || self.layer > highest_layer {
            return Err(ConfigError::Invalid(format!(
                "layer must be between {} and {highest_layer}",
                i32::MIN + 1
            )));
        }
        for (name, offset) in [("x_offset", self.x_offset), ("y_offset", self.y_offset)] {
            if !(-MAX_OFFSET..=MAX_OFFSET).contains(&offset) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be between -{MAX_OFFSET} and {MAX_OFFSET}"
                )));
            }
        }
        if self.animate && self.animation_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "animation_interval_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn input_mode(&self) -> InputMode {
        if self.pipe {
            InputMode::Piped
        } else if self.interactive || self.animate {
            InputMode::Interactive {
                keys: self.interactive,
                animate: self.animate,
            }
        } else {
            InputMode::Static
        }
    }

    pub fn icon_set(&self) -> IconSet {
        let root = self
            .icon_dir
            .clone()
            .unwrap_or_else(paths::default_icon_root);
        IconSet::new(root, self.icon_size)
    }

    pub fn offset(&self) -> Position {
        Position::new(self.x_offset, self.y_offset)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms as u64)
    }

    pub fn background(&self) -> Option<Rgba16> {
        (!self.background.is_transparent()).then_some(self.background)
    }
}

fn serialize_color<S: Serializer>(color: &Rgba16, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{:#06x}", color.0))
}

fn deserialize_color<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Rgba16, D::Error> {
    let value = String::deserialize(deserializer)?;
    Rgba16::parse(&value)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid 16 bit RGBA colour '{value}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.layer, 3000);
        assert_eq!(config.poll_interval_ms, 10);
        assert_eq!(config.background(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let config = Config::from_yaml("background: \"0x000F\"\nx_offset: 12\nicon_size: large\n")
            .unwrap();
        assert_eq!(config.background(), Some(Rgba16(0x000F)));
        assert_eq!(config.x_offset, 12);
        assert_eq!(config.icon_size, IconSize::Large);
        assert_eq!(config.layer, 3000);
    }

    #[test]
    fn test_bad_color_is_rejected() {
        assert!(Config::from_yaml("background: \"purple\"\n").is_err());
    }

    #[test]
    fn test_yaml_round_trip_of_color() {
        let config = Config {
            background: Rgba16(0x0F0F),
            ..Default::default()
        };
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(yaml.contains("0x0f0f"));
        assert_eq!(Config::from_yaml(&yaml).unwrap().background, Rgba16(0x0F0F));
    }

    #[test]
    fn test_zero_poll_interval_is_invalid() {
        let config = Config {
            poll_interval_ms: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_icon_size_from_index() {
        assert_eq!(IconSize::from_index(0), IconSize::Small);
        assert_eq!(IconSize::from_index(1), IconSize::Medium);
        assert_eq!(IconSize::from_index(2), IconSize::Large);
        assert_eq!(IconSize::from_index(7), IconSize::Small);
    }

    #[test]
    fn test_input_mode() {
        assert_eq!(Config::default().input_mode(), InputMode::Piped);

        let keys = Config {
            pipe: false,
            ..Default::default()
        };
        assert_eq!(
            keys.input_mode(),
            InputMode::Interactive {
                keys: true,
                animate: false
            }
        );

        let quiet = Config {
            pipe: false,
            interactive: false,
            ..Default::default()
        };
        assert_eq!(quiet.input_mode(), InputMode::Static);

        let animated = Config {
            pipe: false,
            interactive: false,
            animate: true,
            ..Default::default()
        };
        assert_eq!(
            animated.input_mode(),
            InputMode::Interactive {
                keys: false,
                animate: true
            }
        );
    }

    #[test]
    fn test_layer_range() {
        let highest = i32::MAX - (STATE_COUNT as i32 - 1);
        for layer in [i32::MIN + 1, highest, -5, 0] {
            let config = Config {
                layer,
                ..Default::default()
            };
            assert!(config.validate().is_ok(), "layer {layer} should be accepted");
        }
        for layer in [i32::MIN, highest + 1, i32::MAX] {
            let config = Config {
                layer,
                ..Default::default()
            };
            assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        }
    }

    #[test]
    fn test_offset_range() {
        let edge = Config {
            x_offset: -MAX_OFFSET,
            y_offset: MAX_OFFSET,
            ..Default::default()
        };
        assert!(edge.validate().is_ok());

        for (x, y) in [(i32::MIN, 0), (0, i32::MAX), (MAX_OFFSET + 1, 0)] {
            let config = Config {
                x_offset: x,
                y_offset: y,
                ..Default::default()
            };
            assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        }
    }

    #[test]
    fn test_missing_file() {
        let result = Config::load(Path::new("/nonexistent/batlayer.yaml"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}
