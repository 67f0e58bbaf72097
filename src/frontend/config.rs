//! Process-wide bridge configuration
//!
//! Settings come from, highest priority first: explicit overrides, process
//! environment variables, a `jvbridge.toml` file, and built-in defaults.

use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::errors::{BridgeError, BridgeResult};
use crate::infrastructure::logging::log_config_loaded;
use crate::performance::DEFAULT_EVALUATOR_CAPACITY;

pub const CONFIG_FILE: &str = "jvbridge.toml";

pub const ENV_EXECUTABLE: &str = "TYPY_JL_EXE";
pub const ENV_OPTIONS: &str = "TYPY_JL_OPTS";
pub const ENV_SYSIMAGE: &str = "TYPY_JL_SYSIMAGE";
pub const ENV_CAPACITY: &str = "JVBRIDGE_CACHE_CAPACITY";
pub const ENV_LOG: &str = "JVBRIDGE_LOG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    /// Locator of the foreign runtime executable
    #[serde(default = "default_executable")]
    pub executable: String,

    /// Option string passed to the foreign runtime on launch
    #[serde(default)]
    pub options: String,

    /// Precompiled image the runtime is pinned to
    #[serde(default)]
    pub sysimage: Option<PathBuf>,

    #[serde(default = "default_capacity")]
    pub evaluator_capacity: usize,

    /// Level name or filter directives
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            executable: default_executable(),
            options: String::new(),
            sysimage: None,
            evaluator_capacity: default_capacity(),
            log_level: default_log_level(),
        }
    }
}

fn default_executable() -> String {
    "julia".to_string()
}

fn default_capacity() -> usize {
    DEFAULT_EVALUATOR_CAPACITY
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Values that win over every other source
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub executable: Option<String>,
    pub options: Option<String>,
    pub sysimage: Option<PathBuf>,
    pub evaluator_capacity: Option<usize>,
    pub log_level: Option<String>,
}

impl Environment {
    pub fn load(path: &Path) -> BridgeResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            BridgeError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        let env = Self::parse(&content)?;
        log_config_loaded(&path.to_string_lossy());
        Ok(env)
    }

    /// Parse configuration from a TOML string
    pub fn parse(content: &str) -> BridgeResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// First `jvbridge.toml` in `start` or one of its parents
    pub fn discover_from(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(CONFIG_FILE))
            .find(|path| path.is_file())
    }

    /// Apply environment variables through `lookup`; empty values count
    /// as set, so `TYPY_JL_OPTS=""` clears the options
    pub fn apply_vars<F>(&mut self, lookup: F) -> BridgeResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(exe) = lookup(ENV_EXECUTABLE) {
            self.executable = exe;
        }
        if let Some(options) = lookup(ENV_OPTIONS) {
            self.options = options;
        }
        if let Some(image) = lookup(ENV_SYSIMAGE) {
            self.sysimage = (!image.is_empty()).then(|| PathBuf::from(image));
        }
        if let Some(capacity) = lookup(ENV_CAPACITY) {
            self.evaluator_capacity = capacity.trim().parse().map_err(|_| {
                BridgeError::Config(format!("{ENV_CAPACITY} must be a positive integer, got {capacity:?}"))
            })?;
        }
        if let Some(level) = lookup(ENV_LOG) {
            self.log_level = level;
        }
        Ok(())
    }

    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(exe) = &overrides.executable {
            self.executable = exe.clone();
        }
        if let Some(options) = &overrides.options {
            self.options = options.clone();
        }
        if let Some(image) = &overrides.sysimage {
            self.sysimage = Some(image.clone());
        }
        if let Some(capacity) = overrides.evaluator_capacity {
            self.evaluator_capacity = capacity;
        }
        if let Some(level) = &overrides.log_level {
            self.log_level = level.clone();
        }
    }

    /// Resolve against the process environment and working directory
    pub fn resolve(file: Option<&Path>, overrides: &Overrides) -> BridgeResult<Self> {
        let cwd = std::env::current_dir()?;
        Self::resolve_with(file, &cwd, overrides, |name| std::env::var(name).ok())
    }

    /// Resolve with an explicit search directory and variable lookup
    pub fn resolve_with<F>(
        file: Option<&Path>,
        search_from: &Path,
        overrides: &Overrides,
        lookup: F,
    ) -> BridgeResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut env = match file {
            Some(path) => Self::load(path)?,
            None => match Self::discover_from(search_from) {
                Some(path) => Self::load(&path)?,
                None => {
                    log_config_loaded("defaults");
                    Self::default()
                }
            },
        };
        env.apply_vars(lookup)?;
        env.apply_overrides(overrides);
        if env.evaluator_capacity == 0 {
            return Err(BridgeError::Config(
                "evaluator_capacity must be at least 1".to_string(),
            ));
        }
        Ok(env)
    }

    /// Option string split the way a shell would split plain words
    pub fn option_args(&self) -> Vec<String> {
        self.options.split_whitespace().map(str::to_string).collect()
    }

    /// Render as TOML
    pub fn to_toml(&self) -> BridgeResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| BridgeError::Config(format!("failed to serialize config: {e}")))
    }

    pub fn save(&self, path: &Path) -> BridgeResult<()> {
        fs::write(path, self.to_toml()?).map_err(|e| {
            BridgeError::Config(format!("failed to write {}: {e}", path.display()))
        })
    }
}

// ============================================================================
// Process-wide instance
// ============================================================================

static ENVIRONMENT: Lazy<RwLock<Option<Environment>>> = Lazy::new(|| RwLock::new(None));

/// Resolve and install the process-wide environment
pub fn init(file: Option<&Path>, overrides: &Overrides) -> BridgeResult<Environment> {
    let env = Environment::resolve(file, overrides)?;
    set(env.clone());
    Ok(env)
}

/// The installed environment, resolving it on first use
pub fn current() -> BridgeResult<Environment> {
    if let Some(env) = ENVIRONMENT.read().as_ref() {
        return Ok(env.clone());
    }
    init(None, &Overrides::default())
}

pub fn set(env: Environment) {
    *ENVIRONMENT.write() = Some(env);
}

/// Forget the installed environment; the next `current` re-reads it
pub fn reset() {
    *ENVIRONMENT.write() = None;
}

/// Modify the installed environment in place
pub fn update<F>(f: F) -> BridgeResult<Environment>
where
    F: FnOnce(&mut Environment),
{
    let mut env = current()?;
    f(&mut env);
    set(env.clone());
    Ok(env)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let env = Environment::default();
        assert_eq!(env.executable, "julia");
        assert_eq!(env.options, "");
        assert_eq!(env.sysimage, None);
        assert_eq!(env.evaluator_capacity, DEFAULT_EVALUATOR_CAPACITY);
        assert_eq!(env.log_level, "info");
    }

    #[test]
    fn test_parse_partial_file() {
        let env = Environment::parse("options = \"--threads=2\"\nevaluator_capacity = 16\n").unwrap();
        assert_eq!(env.options, "--threads=2");
        assert_eq!(env.evaluator_capacity, 16);
        assert_eq!(env.executable, "julia");

        let err = Environment::parse("evaluator_capacity = \"many\"").unwrap_err();
        assert_eq!(err.kind(), "ConfigError");
    }

    #[test]
    fn test_vars_beat_file_and_overrides_beat_vars() {
        let mut env = Environment::parse("options = \"--quiet\"").unwrap();
        env.apply_vars(vars(&[(ENV_OPTIONS, ""), (ENV_EXECUTABLE, "/opt/julia")]))
            .unwrap();
        assert_eq!(env.options, "");
        assert_eq!(env.executable, "/opt/julia");

        env.apply_overrides(&Overrides {
            executable: Some("julia-1.10".to_string()),
            ..Overrides::default()
        });
        assert_eq!(env.executable, "julia-1.10");
    }

    #[test]
    fn test_bad_capacity_var() {
        let mut env = Environment::default();
        let err = env.apply_vars(vars(&[(ENV_CAPACITY, "lots")])).unwrap_err();
        assert_eq!(err.kind(), "ConfigError");
    }

    #[test]
    fn test_option_args_and_toml() {
        let env = Environment {
            options: "  --startup-file=no  -O0 ".to_string(),
            ..Environment::default()
        };
        assert_eq!(env.option_args(), vec!["--startup-file=no", "-O0"]);
        let reparsed = Environment::parse(&env.to_toml().unwrap()).unwrap();
        assert_eq!(reparsed, env);
    }
}
