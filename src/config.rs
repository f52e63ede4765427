use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;

use crate::loader::LoaderOptions;
use crate::sprint::{DEFAULT_AI_LABEL, DEFAULT_FULL_TIME_THRESHOLD, MetricThresholds};
use crate::utils::NumberFormatOptions;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub metrics: MetricsConfig,
    pub loader: LoaderConfig,
    pub formatting: FormattingConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct MetricsConfig {
    pub full_time_threshold: f64,
    pub ai_label: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LoaderConfig {
    pub require_platform: bool,
    pub datasets_dir: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct FormattingConfig {
    pub number_comma: bool,
    pub locale: String,
    pub decimal_places: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            full_time_threshold: DEFAULT_FULL_TIME_THRESHOLD,
            ai_label: DEFAULT_AI_LABEL.to_string(),
        }
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            require_platform: true,
            datasets_dir: "datasets".to_string(),
        }
    }
}

impl Default for FormattingConfig {
    fn default() -> Self {
        Self {
            number_comma: false,
            locale: "en".to_string(),
            decimal_places: 1,
        }
    }
}

thread_local! {
    static TEST_CONFIG_PATH: RefCell<Option<PathBuf>> = const { RefCell::new(None) };
}

#[cfg(test)]
pub fn set_test_config_path(path: PathBuf) {
    TEST_CONFIG_PATH.with(|p| *p.borrow_mut() = Some(path));
}

impl Config {
    pub fn config_path() -> Result<PathBuf> {
        #[cfg(test)]
        {
            if let Some(path) = TEST_CONFIG_PATH.with(|p| p.borrow().clone()) {
                return Ok(path);
            }
        }

        Ok(dirs::home_dir()
            .context("Could not find home directory")?
            .join(".sprintlens.toml"))
    }

    pub fn load() -> Result<Option<Config>> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&config_path).context("Failed to read config file")?;

        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;

        Ok(Some(config))
    }

    pub fn save(&self, silent: bool) -> Result<()> {
        let config_path = Self::config_path()?;
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&config_path, content).context("Failed to write config file")?;

        if !silent {
            println!("✅ Configuration saved to: {}", config_path.display());
        }

        Ok(())
    }

    pub fn metric_thresholds(&self) -> MetricThresholds {
        MetricThresholds {
            full_time_threshold: self.metrics.full_time_threshold,
            ai_label: self.metrics.ai_label.clone(),
        }
    }

    pub fn loader_options(&self) -> LoaderOptions {
        LoaderOptions {
            require_platform: self.loader.require_platform,
        }
    }

    pub fn number_format(&self) -> NumberFormatOptions {
        NumberFormatOptions {
            use_comma: self.formatting.number_comma,
            locale: self.formatting.locale.clone(),
            decimal_places: self.formatting.decimal_places,
        }
    }

    pub fn datasets_dir(&self) -> PathBuf {
        PathBuf::from(&self.loader.datasets_dir)
    }
}

// CLI helper functions
pub fn create_default_config(overwrite: bool) -> Result<()> {
    let config = Config::default();
    if !std::fs::exists(Config::config_path()?)? || overwrite {
        config.save(true)?;

        println!("📝 Created default configuration file.");
        println!("📍 Adjust it with:");
        println!("   sprintlens config set full-time-threshold 5");
        println!("or");
        println!("   {}", Config::config_path()?.display());
    } else {
        println!("Configuration already exists.  Pass `--overwrite` to overwrite.");
    }

    Ok(())
}

pub fn show_config() -> Result<()> {
    match Config::load()? {
        Some(config) => {
            println!("🔧 Current configuration:");
            println!(
                "   Full-time Threshold: {}",
                config.metrics.full_time_threshold
            );
            println!("   AI Label: {}", config.metrics.ai_label);
            println!("   Require Platform: {}", config.loader.require_platform);
            println!("   Datasets Dir: {}", config.loader.datasets_dir);
            println!("   Number Comma: {}", config.formatting.number_comma);
            println!("   Locale: {}", config.formatting.locale);
            println!("   Decimal Places: {}", config.formatting.decimal_places);
        }
        None => {
            println!("❌ No configuration file found.");
            println!("   Run 'sprintlens config init' to create one.");
        }
    }
    Ok(())
}

fn parse_bool(value: &str) -> Result<bool> {
    value
        .parse::<bool>()
        .context("Invalid boolean value. Use 'true' or 'false'")
}

pub fn set_config_value(key: &str, value: &str) -> Result<()> {
    let mut config = Config::load()?.unwrap_or_default();

    match key {
        "full-time-threshold" => {
            let threshold = value.parse::<f64>().context("Invalid number value")?;
            if !threshold.is_finite() || threshold < 0.0 {
                anyhow::bail!("Invalid number value: threshold must be a non-negative number");
            }
            config.metrics.full_time_threshold = threshold;
        }
        "ai-label" => {
            if value.trim().is_empty() {
                anyhow::bail!("AI label cannot be empty");
            }
            config.metrics.ai_label = value.trim().to_string();
        }
        "require-platform" => config.loader.require_platform = parse_bool(value)?,
        "datasets-dir" => config.loader.datasets_dir = value.to_string(),
        "number-comma" => config.formatting.number_comma = parse_bool(value)?,
        "locale" => {
            config.formatting.locale = value.to_string();
        }
        "decimal-places" => {
            let places = value.parse::<usize>().context("Invalid number value")?;
            config.formatting.decimal_places = places;
        }
        _ => anyhow::bail!("Unknown config key: {}", key),
    }

    config.save(false)?;
    Ok(())
}
