//! Comparison options
//!
//! Options come from defaults, optionally overlaid by a YAML file, then by
//! command line flags.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use ipadiff_core::{Error, Result, ResultExt};
use serde::{Deserialize, Serialize};

/// Property list keys whose values change between otherwise identical builds
pub const DEFAULT_VOLATILE_KEYS: [&str; 5] = [
    "UISupportedDevices",
    "DTAppStoreToolsBuild",
    "MinimumOSVersion",
    "BuildMachineOSBuild",
    "CFBundleVersion",
];

/// Which collaborator implementations to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolBackend {
    /// In-process parsers (goblin, plist)
    #[default]
    Native,
    /// Host tools (`file`, `plutil`)
    System,
}

impl FromStr for ToolBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "native" => Ok(ToolBackend::Native),
            "system" => Ok(ToolBackend::System),
            _ => Err(format!("Unknown tool backend: {}. Use 'native' or 'system'", s)),
        }
    }
}

impl fmt::Display for ToolBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolBackend::Native => f.write_str("native"),
            ToolBackend::System => f.write_str("system"),
        }
    }
}

/// Settings for one comparison run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffOptions {
    /// Top-level property list keys stripped before comparison
    pub volatile_plist_keys: Vec<String>,
    /// Set extension bundles aside instead of comparing them
    pub exclude_plugins: bool,
    /// Companion watch bundle directory, relative to the bundle root
    pub watch_dir: String,
    /// Extension bundle directory, relative to the bundle root
    pub plugins_dir: String,
    /// Glob the application bundle must match inside the payload
    pub bundle_pattern: String,
    /// Payload directory inside the package
    pub payload_dir: String,
    /// Time budget for each external tool invocation
    pub tool_timeout_secs: u64,
    /// Worker threads; 0 uses one per CPU
    pub jobs: usize,
    /// Byte comparator chunk size
    pub chunk_size: usize,
    /// Differences kept per file in the report
    pub report_diff_limit: usize,
    pub tools: ToolBackend,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            volatile_plist_keys: DEFAULT_VOLATILE_KEYS.iter().map(|k| k.to_string()).collect(),
            exclude_plugins: false,
            watch_dir: "Watch".to_string(),
            plugins_dir: "PlugIns".to_string(),
            bundle_pattern: "*.app".to_string(),
            payload_dir: "Payload".to_string(),
            tool_timeout_secs: 30,
            jobs: 0,
            chunk_size: 64 * 1024,
            report_diff_limit: 16,
            tools: ToolBackend::Native,
        }
    }
}

impl DiffOptions {
    /// Parse options from YAML text; missing fields keep their defaults
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let options: DiffOptions =
            serde_yaml::from_str(text).map_err(|e| Error::invalid_config(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    /// Load options from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::NotFound(path.to_path_buf()));
        }

        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text).with_context(|| format!("loading {}", path.display()))
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.tool_timeout_secs == 0 {
            return Err(Error::invalid_config("tool_timeout_secs must be greater than zero"));
        }
        if self.chunk_size == 0 {
            return Err(Error::invalid_config("chunk_size must be greater than zero"));
        }

        for (name, value) in [
            ("watch_dir", &self.watch_dir),
            ("plugins_dir", &self.plugins_dir),
            ("bundle_pattern", &self.bundle_pattern),
            ("payload_dir", &self.payload_dir),
        ] {
            if value.trim().is_empty() {
                return Err(Error::invalid_config(format!("{} must not be empty", name)));
            }
        }

        Ok(())
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    /// Worker count with `0` resolved to the number of CPUs
    pub fn worker_count(&self) -> usize {
        if self.jobs == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            self.jobs
        }
    }
}
