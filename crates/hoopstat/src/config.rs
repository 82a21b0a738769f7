// Configuration loading and parsing (pipeline.toml, hof.toml).

use hoopstat_core::season::Competition;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub input: InputConfig,
    pub output: OutputConfig,
    pub hof: HofConfig,
    /// Hall-of-Fame roster from hof.toml. `None` disables HOF tagging.
    pub roster: Option<Vec<String>>,
}

// ---------------------------------------------------------------------------
// pipeline.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire pipeline.toml file.
#[derive(Debug, Clone, Deserialize)]
struct PipelineFile {
    input: InputConfig,
    output: OutputConfig,
    #[serde(default)]
    hof: HofConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InputConfig {
    /// Directory holding the raw season files, relative to the base dir.
    pub dir: String,
    pub regular_season_pattern: String,
    pub postseason_pattern: String,
}

impl InputConfig {
    pub fn pattern(&self, competition: Competition) -> &str {
        match competition {
            Competition::RegularSeason => &self.regular_season_pattern,
            Competition::Postseason => &self.postseason_pattern,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    pub dir: String,
    pub regular_season: OutputFiles,
    pub postseason: OutputFiles,
}

impl OutputConfig {
    pub fn files(&self, competition: Competition) -> &OutputFiles {
        match competition {
            Competition::RegularSeason => &self.regular_season,
            Competition::Postseason => &self.postseason,
        }
    }
}

/// File names written for one competition.
#[derive(Debug, Clone, Deserialize)]
pub struct OutputFiles {
    pub merged: String,
    pub imputed: String,
    pub career: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HofConfig {
    /// Metric columns missing in more than this fraction of rows are dropped
    /// before imputation. Absent means keep every column.
    #[serde(default)]
    pub sparse_column_threshold: Option<f64>,
    /// Also write imputed and career tables restricted to HOF players.
    #[serde(default = "default_true")]
    pub hof_only_outputs: bool,
    /// Prefix for the HOF-only output file names.
    #[serde(default = "default_hof_prefix")]
    pub output_prefix: String,
}

impl Default for HofConfig {
    fn default() -> Self {
        HofConfig {
            sparse_column_threshold: None,
            hof_only_outputs: true,
            output_prefix: default_hof_prefix(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_hof_prefix() -> String {
    "HOF_".into()
}

// ---------------------------------------------------------------------------
// hof.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
struct HofFile {
    players: Vec<String>,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/pipeline.toml` and
/// (optionally) `config/hof.toml`, relative to the given `base_dir`.
///
/// Does not copy defaults; `load_config` does.
pub(crate) fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    // --- pipeline.toml (required) ---
    let pipeline_path = config_dir.join("pipeline.toml");
    let pipeline_text = read_file(&pipeline_path)?;
    let pipeline: PipelineFile =
        toml::from_str(&pipeline_text).map_err(|e| ConfigError::ParseError {
            path: pipeline_path.clone(),
            source: e,
        })?;

    // --- hof.toml (optional) ---
    let hof_path = config_dir.join("hof.toml");
    let roster = if hof_path.exists() {
        let hof_text = read_file(&hof_path)?;
        let hof_file: HofFile = toml::from_str(&hof_text).map_err(|e| ConfigError::ParseError {
            path: hof_path.clone(),
            source: e,
        })?;
        Some(hof_file.players)
    } else {
        None
    };

    let config = Config {
        input: pipeline.input,
        output: pipeline.output,
        hof: pipeline.hof,
        roster,
    };

    validate(&config)?;

    Ok(config)
}

/// Files seeded from `defaults/`. `pipeline.toml` is required at load time,
/// `hof.toml` only when the defaults ship one.
const SEEDED_FILES: [&str; 2] = ["pipeline.toml", "hof.toml"];

/// Seed `config/` from `defaults/` and return the names of the files that
/// were written. Existing files in `config/` are left as they are.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<&'static str>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.is_dir() {
        if config_dir.is_dir() {
            return Ok(vec![]);
        }
        return Err(ConfigError::DefaultsCopyError {
            message: format!(
                "no defaults/ or config/ directory in {}; pass --base-dir",
                base_dir.display()
            ),
        });
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create {}: {e}", config_dir.display()),
    })?;

    let mut seeded = Vec::new();
    for name in SEEDED_FILES {
        let source = defaults_dir.join(name);
        if !source.is_file() {
            continue;
        }
        let target = config_dir.join(name);
        let mut dest = match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
        {
            Ok(dest) => dest,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => {
                return Err(ConfigError::DefaultsCopyError {
                    message: format!("failed to create {}: {e}", target.display()),
                })
            }
        };
        let mut src = std::fs::File::open(&source).map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to open {}: {e}", source.display()),
        })?;
        std::io::copy(&mut src, &mut dest).map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to seed {}: {e}", target.display()),
        })?;
        seeded.push(name);
    }

    Ok(seeded)
}

/// Copy missing defaults, then load config relative to `base_dir`.
pub fn load_config(base_dir: &Path) -> Result<Config, ConfigError> {
    let seeded = ensure_config_files(base_dir)?;
    if !seeded.is_empty() {
        tracing::info!("seeded config/ from defaults: {}", seeded.join(", "));
    }
    load_config_from(base_dir)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    let required: &[(&str, &str)] = &[
        ("input.dir", config.input.dir.as_str()),
        ("output.dir", config.output.dir.as_str()),
        ("output.regular_season.merged", config.output.regular_season.merged.as_str()),
        ("output.regular_season.imputed", config.output.regular_season.imputed.as_str()),
        ("output.regular_season.career", config.output.regular_season.career.as_str()),
        ("output.postseason.merged", config.output.postseason.merged.as_str()),
        ("output.postseason.imputed", config.output.postseason.imputed.as_str()),
        ("output.postseason.career", config.output.postseason.career.as_str()),
    ];
    for (name, val) in required {
        if val.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                field: name.to_string(),
                message: "must not be empty".into(),
            });
        }
    }

    // Patterns are file-name globs, matched inside input.dir
    let patterns: &[(&str, &str)] = &[
        ("input.regular_season_pattern", config.input.regular_season_pattern.as_str()),
        ("input.postseason_pattern", config.input.postseason_pattern.as_str()),
    ];
    for (name, val) in patterns {
        if val.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                field: name.to_string(),
                message: "must not be empty".into(),
            });
        }
        if let Err(e) = glob::Pattern::new(val) {
            return Err(ConfigError::ValidationError {
                field: name.to_string(),
                message: format!("invalid glob pattern: {e}"),
            });
        }
    }

    if let Some(t) = config.hof.sparse_column_threshold {
        if !(t > 0.0 && t <= 1.0) {
            return Err(ConfigError::ValidationError {
                field: "hof.sparse_column_threshold".into(),
                message: format!("must be in (0.0, 1.0], got {t}"),
            });
        }
    }

    if config.hof.hof_only_outputs && config.hof.output_prefix.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "hof.output_prefix".into(),
            message: "must not be empty when hof_only_outputs is set".into(),
        });
    }

    if let Some(roster) = &config.roster {
        if let Some(pos) = roster.iter().position(|n| n.trim().is_empty()) {
            return Err(ConfigError::ValidationError {
                field: format!("players[{pos}]"),
                message: "HOF player name must not be empty".into(),
            });
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
