use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Default location of the configuration file, relative to the project root.
pub const DEFAULT_PATH: &str = ".tdd/config.toml";

/// Configuration for an import run.
///
/// Every field has a default, so an absent or empty file yields a usable
/// configuration. Command-line flags override what is loaded here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Versions", into = "Versions")]
pub struct Config {
    /// Directory the requirement records are written to.
    pub spec_dir: PathBuf,

    /// Directory holding the segment files.
    pub segment_dir: PathBuf,

    /// The JSONL metadata file describing the segments.
    pub metadata_path: PathBuf,

    /// Model used for classification.
    pub classify_model: String,

    /// Model used for example generation.
    pub example_model: String,

    /// Per-attempt timeout for classification calls, in seconds.
    pub classify_timeout_secs: u64,

    /// Per-attempt timeout for example generation calls, in seconds.
    pub example_timeout_secs: u64,

    /// Retries after the first failed attempt of a service call.
    pub max_retries: u32,

    /// The largest number of segments sent in a single batch call.
    pub max_batch_size: usize,

    /// Whether the two halves of a split batch are processed concurrently.
    pub parallel_splits: bool,

    /// Whether segments resolving to the same identifier are consolidated
    /// instead of being reported as an error.
    pub merge_duplicates: bool,

    /// Whether duplicate examples are removed after consolidation.
    pub dedup_examples: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            spec_dir: default_spec_dir(),
            segment_dir: default_segment_dir(),
            metadata_path: default_metadata_path(),
            classify_model: default_classify_model(),
            example_model: default_example_model(),
            classify_timeout_secs: default_classify_timeout(),
            example_timeout_secs: default_example_timeout(),
            max_retries: default_max_retries(),
            max_batch_size: default_max_batch_size(),
            parallel_splits: false,
            merge_duplicates: false,
            dedup_examples: false,
        }
    }
}

impl Config {
    /// Loads the configuration from a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the TOML content is
    /// invalid.
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {e}"))?;
        toml::from_str(&content).map_err(|e| format!("Failed to parse config file: {e}"))
    }

    /// Loads the configuration if the file exists, otherwise returns the
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_or_default(path: &Path) -> Result<Self, String> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Saves the configuration to a TOML file at the given path.
    ///
    /// Missing parent directories are created.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized to TOML or if
    /// the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let content =
            toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize config: {e}"))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {e}"))?;
        }
        std::fs::write(path, content).map_err(|e| format!("Failed to write config file: {e}"))
    }
}

fn default_spec_dir() -> PathBuf {
    PathBuf::from(".tdd/specs")
}

fn default_segment_dir() -> PathBuf {
    PathBuf::from(".kire")
}

fn default_metadata_path() -> PathBuf {
    PathBuf::from(".kire/metadata.jsonl")
}

fn default_classify_model() -> String {
    "gemini-2.5-flash-lite".to_string()
}

fn default_example_model() -> String {
    "gemini-2.5-flash".to_string()
}

const fn default_classify_timeout() -> u64 {
    60
}

const fn default_example_timeout() -> u64 {
    180
}

const fn default_max_retries() -> u32 {
    2
}

const fn default_max_batch_size() -> usize {
    10
}

/// The serialized versions of the configuration.
/// This allows for future changes to the configuration format and to the domain
/// type without breaking compatibility.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum Versions {
    #[serde(rename = "1")]
    V1 {
        #[serde(default = "default_spec_dir")]
        spec_dir: PathBuf,

        #[serde(default = "default_segment_dir")]
        segment_dir: PathBuf,

        #[serde(default = "default_metadata_path")]
        metadata_path: PathBuf,

        #[serde(default = "default_classify_model")]
        classify_model: String,

        #[serde(default = "default_example_model")]
        example_model: String,

        #[serde(default = "default_classify_timeout")]
        classify_timeout_secs: u64,

        #[serde(default = "default_example_timeout")]
        example_timeout_secs: u64,

        #[serde(default = "default_max_retries")]
        max_retries: u32,

        #[serde(default = "default_max_batch_size")]
        max_batch_size: usize,

        #[serde(default)]
        parallel_splits: bool,

        #[serde(default)]
        merge_duplicates: bool,

        #[serde(default)]
        dedup_examples: bool,
    },
}

impl From<Versions> for Config {
    fn from(versions: Versions) -> Self {
        match versions {
            Versions::V1 {
                spec_dir,
                segment_dir,
                metadata_path,
                classify_model,
                example_model,
                classify_timeout_secs,
                example_timeout_secs,
                max_retries,
                max_batch_size,
                parallel_splits,
                merge_duplicates,
                dedup_examples,
            } => Self {
                spec_dir,
                segment_dir,
                metadata_path,
                classify_model,
                example_model,
                classify_timeout_secs,
                example_timeout_secs,
                max_retries,
                max_batch_size,
                parallel_splits,
                merge_duplicates,
                dedup_examples,
            },
        }
    }
}

impl From<Config> for Versions {
    fn from(config: Config) -> Self {
        Self::V1 {
            spec_dir: config.spec_dir,
            segment_dir: config.segment_dir,
            metadata_path: config.metadata_path,
            classify_model: config.classify_model,
            example_model: config.example_model,
            classify_timeout_secs: config.classify_timeout_secs,
            example_timeout_secs: config.example_timeout_secs,
            max_retries: config.max_retries,
            max_batch_size: config.max_batch_size,
            parallel_splits: config.parallel_splits,
            merge_duplicates: config.merge_duplicates,
            dedup_examples: config.dedup_examples,
        }
    }
}
