//! Run options
//!
//! Options are resolved once, in order: built-in defaults, then an optional
//! YAML or TOML config file, then explicit command-line flags. The result is
//! an immutable value handed to the simulation; nothing reads global state.

use crate::error::{ConfigError, Result};
use crate::pricing::CapacityType;
use crate::report::OutputFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Compute, general-purpose and memory-optimized families, any generation and size
pub const DEFAULT_FLEXIBILITY: &str = r"^(c|m|r)[a-z0-9-]+\.[a-z0-9]+$";
pub const DEFAULT_PRICING_MULTIPLIER: f64 = 0.5;
pub const DEFAULT_MAX_WAIT_SECS: u64 = 300;

const CONFIG_FILE_NAME: &str = ".ec2-replacement-sim.yaml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Instance type being replaced. Required, no default.
    pub replacement: Option<String>,
    /// Flexibility set pattern (regex, must match the whole type name)
    pub flexibility: String,
    pub pricing_multiplier: f64,
    pub capacity_type: CapacityType,
    /// Falls back to the AWS shared config region when unset
    pub region: Option<String>,
    pub output: OutputFormat,
    pub verbose: bool,
    /// Maximum time to wait for the initial price snapshot
    pub max_wait_secs: u64,
    /// Offline price snapshot used instead of the AWS APIs
    pub price_file: Option<PathBuf>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            replacement: None,
            flexibility: DEFAULT_FLEXIBILITY.to_string(),
            pricing_multiplier: DEFAULT_PRICING_MULTIPLIER,
            capacity_type: CapacityType::Spot,
            region: None,
            output: OutputFormat::Short,
            verbose: false,
            max_wait_secs: DEFAULT_MAX_WAIT_SECS,
            price_file: None,
        }
    }
}

/// Values given explicitly on the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub replacement: Option<String>,
    pub flexibility: Option<String>,
    pub pricing_multiplier: Option<f64>,
    pub capacity_type: Option<CapacityType>,
    pub region: Option<String>,
    pub output: Option<OutputFormat>,
    pub verbose: bool,
    pub max_wait_secs: Option<u64>,
    pub price_file: Option<PathBuf>,
}

impl Options {
    /// Load options from a config file.
    ///
    /// With no explicit path, `.ec2-replacement-sim.yaml` in the current
    /// directory and then `~/.config/ec2-replacement-sim/config.yaml` are
    /// tried, falling back to defaults. An explicit path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match Self::locate(path)? {
            Some(config_path) => Self::from_file(&config_path),
            None => Ok(Self::default()),
        }
    }

    /// Resolve which config file `load` would read, if any.
    pub fn locate(path: Option<&Path>) -> Result<Option<PathBuf>> {
        match path {
            Some(p) if !p.exists() => Err(ConfigError::NotFound(p.display().to_string()).into()),
            Some(p) => Ok(Some(p.to_path_buf())),
            None => Ok(default_config_path()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        parse_options(path, &content)
    }

    /// Apply explicit command-line values on top of these options.
    pub fn merge(mut self, overrides: Overrides) -> Self {
        if let Some(v) = overrides.replacement {
            self.replacement = Some(v);
        }
        if let Some(v) = overrides.flexibility {
            self.flexibility = v;
        }
        if let Some(v) = overrides.pricing_multiplier {
            self.pricing_multiplier = v;
        }
        if let Some(v) = overrides.capacity_type {
            self.capacity_type = v;
        }
        if let Some(v) = overrides.region {
            self.region = Some(v);
        }
        if let Some(v) = overrides.output {
            self.output = v;
        }
        if overrides.verbose {
            self.verbose = true;
        }
        if let Some(v) = overrides.max_wait_secs {
            self.max_wait_secs = v;
        }
        if let Some(v) = overrides.price_file {
            self.price_file = Some(v);
        }
        self
    }

    /// Check the options and return the replacement instance type.
    ///
    /// The multiplier is not range-checked.
    pub fn validate(&self) -> Result<&str> {
        let replacement = self
            .replacement
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .ok_or_else(|| ConfigError::MissingField("replacement".to_string()))?;

        if self.max_wait_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_wait_secs".to_string(),
                reason: "must be at least 1 second".to_string(),
            }
            .into());
        }

        if let Some(region) = &self.region {
            if region.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "region".to_string(),
                    reason: "cannot be empty".to_string(),
                }
                .into());
            }
        }

        Ok(replacement)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::to_string_pretty(self)
                .map_err(|e| ConfigError::ParseError(format!("Failed to serialize config: {}", e)))?,
            _ => serde_yaml::to_string(self)?,
        };
        std::fs::write(path, content)?;
        Ok(())
    }
}

fn default_config_path() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return Some(local);
    }
    dirs::config_dir()
        .map(|d| d.join("ec2-replacement-sim").join("config.yaml"))
        .filter(|p| p.exists())
}

fn parse_options(path: &Path, content: &str) -> Result<Options> {
    let parsed: std::result::Result<Options, String> = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => toml::from_str(content).map_err(|e| e.to_string()),
        _ => serde_yaml::from_str(content).map_err(|e| e.to_string()),
    };
    parsed.map_err(|e| {
        let mut err = format!("{}: {}", path.display(), e);
        err.push_str("\n  Common issues:");
        err.push_str("\n    - Invalid YAML/TOML syntax");
        err.push_str("\n    - Incorrect value types");
        err.push_str("\n  Tip: Run 'ec2-replacement-sim init' to create a new config file");
        ConfigError::ParseError(err).into()
    })
}

/// Write a config file holding the default options.
pub fn init_config(output: &Path) -> Result<()> {
    Options::default().save(output)?;
    println!("Created config file: {}", output.display());
    Ok(())
}
