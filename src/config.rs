use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub form: FormConfig,
    #[serde(default)]
    pub carousel: CarouselConfig,
    #[serde(default)]
    pub theme: ThemeConfig,
    #[serde(default)]
    pub paging: PagingConfig,
    pub paths: PathsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Multi-step form orchestration settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormConfig {
    /// Reject a second registration of a step id that is already mounted
    #[serde(default = "default_true")]
    pub reject_duplicate_steps: bool,
    /// Treat the first registered step as current when nothing else is set
    #[serde(default = "default_true")]
    pub fall_back_to_first_step: bool,
}

fn default_true() -> bool {
    true
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            reject_duplicate_steps: true,
            fall_back_to_first_step: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarouselConfig {
    /// Delay between starting a transition and fading the new slide in
    #[serde(default = "default_fade_delay")]
    pub fade_delay_ms: u64,
    /// Duration of the cross-fade itself
    #[serde(default = "default_transition")]
    pub transition_ms: u64,
    /// Autoplay period; absent disables rotation
    #[serde(default)]
    pub rotation_interval_ms: Option<u64>,
}

fn default_fade_delay() -> u64 {
    50
}

fn default_transition() -> u64 {
    400
}

impl Default for CarouselConfig {
    fn default() -> Self {
        Self {
            fade_delay_ms: default_fade_delay(),
            transition_ms: default_transition(),
            rotation_interval_ms: None,
        }
    }
}

impl CarouselConfig {
    pub fn fade_delay(&self) -> Duration {
        Duration::from_millis(self.fade_delay_ms)
    }

    pub fn transition(&self) -> Duration {
        Duration::from_millis(self.transition_ms)
    }

    pub fn rotation_interval(&self) -> Option<Duration> {
        self.rotation_interval_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThemeConfig {
    /// Maximum number of memoized button palettes
    #[serde(default = "default_palette_capacity")]
    pub palette_cache_capacity: usize,
    /// Fraction to darken the base color by on hover (0.0 - 1.0)
    #[serde(default = "default_hover_darken")]
    pub hover_darken: f32,
    /// Fraction to darken the base color by while pressed (0.0 - 1.0)
    #[serde(default = "default_active_darken")]
    pub active_darken: f32,
}

fn default_palette_capacity() -> usize {
    64
}

fn default_hover_darken() -> f32 {
    0.1
}

fn default_active_darken() -> f32 {
    0.2
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            palette_cache_capacity: default_palette_capacity(),
            hover_darken: default_hover_darken(),
            active_darken: default_active_darken(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagingConfig {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_page_size() -> usize {
    20
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    pub state: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to log to a file under the state directory instead of stderr
    #[serde(default)]
    pub to_file: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            to_file: false,
        }
    }
}

impl Config {
    /// Path to the project-local config file
    pub fn local_config_path() -> PathBuf {
        PathBuf::from(".formflow/config.toml")
    }

    pub fn load(config_path: Option<&str>) -> Result<Self> {
        // Start with embedded defaults so formflow works without config files
        let defaults = Config::default();
        let defaults_json =
            serde_json::to_string(&defaults).context("Failed to serialize default config")?;

        let mut builder = config::Config::builder().add_source(config::File::from_str(
            &defaults_json,
            config::FileFormat::Json,
        ));

        let local_config = Self::local_config_path();
        if local_config.exists() {
            builder = builder.add_source(config::File::from(local_config));
        }

        // User config in ~/.config/formflow/ (optional global overrides)
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("formflow").join("config.toml");
            if user_config.exists() {
                builder = builder.add_source(config::File::from(user_config));
            }
        }

        // Explicit config file (CLI override)
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        }

        // Environment variables with FORMFLOW_ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("FORMFLOW")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to load configuration")?;
        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Save config to .formflow/config.toml
    pub fn save(&self) -> Result<()> {
        let config_path = Self::local_config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let toml_str =
            toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        std::fs::write(&config_path, toml_str).context("Failed to write config file")?;

        Ok(())
    }

    /// Get absolute path to state directory
    pub fn state_path(&self) -> PathBuf {
        let path = PathBuf::from(&self.paths.state);
        if path.is_absolute() {
            path
        } else {
            std::env::current_dir().unwrap_or_default().join(path)
        }
    }

    /// Get absolute path to logs directory
    pub fn logs_path(&self) -> PathBuf {
        self.state_path().join("logs")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            form: FormConfig::default(),
            carousel: CarouselConfig::default(),
            theme: ThemeConfig::default(),
            paging: PagingConfig::default(),
            paths: PathsConfig {
                state: ".formflow".to_string(), // Relative to cwd
            },
            logging: LoggingConfig::default(),
        }
    }
}
