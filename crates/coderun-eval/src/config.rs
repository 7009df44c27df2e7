//! Runtime configuration for the code runner.
//!
//! [`Config`] controls the recursion limit and the default result policy.
//! Use [`Config::default()`] for the stock behaviour (200 nested calls,
//! `last_expr`, trailing-semicolon quieting on).
//!
//! # Config file: `.coderunrc`
//!
//! - **Global**: `~/.coderunrc`, applies everywhere
//! - **Local**: `.coderunrc` in the working directory or any parent, overrides global
//!
//! ```toml
//! # .coderunrc example
//! max_recursion_depth = 500
//! return_mode = "last_expr_or_assign"
//! quiet_trailing_semicolon = false
//! ```
//!
//! All fields are optional.

use crate::capture::ReturnMode;
use crate::vm::Limits;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = ".coderunrc";

/// TOML-friendly intermediate representation (all fields optional).
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    max_recursion_depth: Option<usize>,
    return_mode: Option<String>,
    quiet_trailing_semicolon: Option<bool>,
}

impl ConfigFile {
    fn parse(content: &str, origin: &str) -> Result<Self> {
        toml::from_str(content).with_context(|| format!("Failed to parse {}", origin))
    }

    /// Overlays the fields present in this file onto `config`.
    fn apply(self, config: &mut Config) -> Result<()> {
        if let Some(depth) = self.max_recursion_depth {
            config.max_recursion_depth = depth;
        }
        if let Some(mode) = self.return_mode {
            config.return_mode = mode.parse()?;
        }
        if let Some(quiet) = self.quiet_trailing_semicolon {
            config.quiet_trailing_semicolon = quiet;
        }
        Ok(())
    }
}

/// Runtime configuration.
///
/// | Setting | Default |
/// |---------|---------|
/// | `max_recursion_depth` | 200 |
/// | `return_mode` | `last_expr` |
/// | `quiet_trailing_semicolon` | `true` |
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Deepest chain of nested function calls before a `RecursionError`.
    pub max_recursion_depth: usize,
    /// Which trailing statement surfaces a value in `exec` mode.
    pub return_mode: ReturnMode,
    /// Whether a trailing `;` suppresses the surfaced value.
    pub quiet_trailing_semicolon: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_recursion_depth: Limits::DEFAULT_RECURSION_DEPTH,
            return_mode: ReturnMode::default(),
            quiet_trailing_semicolon: true,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration by merging global and local `.coderunrc` files.
    ///
    /// 1. Loads `~/.coderunrc` (global) if it exists
    /// 2. Searches for `.coderunrc` starting from `start_dir` and walking up
    /// 3. Local values override global values
    ///
    /// Returns `Config::default()` if no config files are found. A broken
    /// global file is skipped; a broken local file is an error.
    pub fn load(start_dir: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(global_path) = Self::find_global_config()
            && let Ok(global_config) = Self::from_file(&global_path)
        {
            config = global_config;
        }

        if let Some(local_path) = Self::find_local_config(start_dir) {
            let content = std::fs::read_to_string(&local_path)
                .with_context(|| format!("Failed to read config file: {}", local_path.display()))?;
            ConfigFile::parse(&content, &local_path.display().to_string())?
                .apply(&mut config)
                .with_context(|| format!("Invalid setting in {}", local_path.display()))?;
        }

        Ok(config)
    }

    /// Loads configuration from a specific file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn parse_toml(toml_str: &str) -> Result<Self> {
        let mut config = Self::default();
        ConfigFile::parse(toml_str, "config")?.apply(&mut config)?;
        Ok(config)
    }

    fn find_global_config() -> Option<PathBuf> {
        dirs::home_dir()
            .map(|home| home.join(CONFIG_FILE_NAME))
            .filter(|p| p.is_file())
    }

    /// Walks up from `start_dir` looking for `.coderunrc`.
    fn find_local_config(start_dir: impl AsRef<Path>) -> Option<PathBuf> {
        let mut dir = start_dir.as_ref().to_path_buf();
        if let Ok(abs) = dir.canonicalize() {
            dir = abs;
        }

        loop {
            let rc_file = dir.join(CONFIG_FILE_NAME);
            if rc_file.is_file() {
                return Some(rc_file);
            }
            if !dir.pop() {
                return None;
            }
        }
    }

    pub fn limits(&self) -> Limits {
        Limits::default().with_max_recursion_depth(self.max_recursion_depth)
    }

    /// Builder: set the recursion limit.
    pub fn with_max_recursion_depth(mut self, depth: usize) -> Self {
        self.max_recursion_depth = depth;
        self
    }

    /// Builder: set the result policy.
    pub fn with_return_mode(mut self, mode: ReturnMode) -> Self {
        self.return_mode = mode;
        self
    }

    /// Builder: enable or disable trailing-semicolon quieting.
    pub fn with_quiet_trailing_semicolon(mut self, quiet: bool) -> Self {
        self.quiet_trailing_semicolon = quiet;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.max_recursion_depth, 200);
        assert_eq!(cfg.return_mode, ReturnMode::LastExpr);
        assert!(cfg.quiet_trailing_semicolon);
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            max_recursion_depth = 500
            return_mode = "last_expr_or_assign"
            quiet_trailing_semicolon = false
        "#;
        let cfg = Config::parse_toml(toml).unwrap();
        assert_eq!(cfg.max_recursion_depth, 500);
        assert_eq!(cfg.return_mode, ReturnMode::LastExprOrAssign);
        assert!(!cfg.quiet_trailing_semicolon);
        assert_eq!(cfg.limits().max_recursion_depth, 500);
    }

    #[test]
    fn test_parse_partial_and_empty_config() {
        let cfg = Config::parse_toml("return_mode = \"none\"").unwrap();
        assert_eq!(cfg.return_mode, ReturnMode::None);
        assert_eq!(cfg.max_recursion_depth, 200);

        assert_eq!(Config::parse_toml("").unwrap(), Config::default());
    }

    #[test]
    fn test_unknown_return_mode_is_rejected() {
        let err = Config::parse_toml("return_mode = \"everything\"").unwrap_err();
        assert!(err.to_string().contains("invalid return_mode 'everything'"));
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        assert!(Config::parse_toml("command_timeout = 3").is_err());
    }

    #[test]
    fn test_local_config_found_in_parent() {
        let root = TempDir::new().unwrap();
        let nested = root.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        fs::write(
            root.path().join(CONFIG_FILE_NAME),
            "max_recursion_depth = 42\nquiet_trailing_semicolon = false\n",
        )
        .unwrap();

        let found = Config::find_local_config(&nested).unwrap();
        assert_eq!(found.file_name().unwrap(), CONFIG_FILE_NAME);

        let cfg = Config::load(&nested).unwrap();
        assert_eq!(cfg.max_recursion_depth, 42);
        assert!(!cfg.quiet_trailing_semicolon);
    }

    #[test]
    fn test_broken_local_config_is_an_error() {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join(CONFIG_FILE_NAME), "max_recursion_depth = \"deep\"").unwrap();
        assert!(Config::load(root.path()).is_err());
    }

    #[test]
    fn test_builder_methods() {
        let cfg = Config::new()
            .with_max_recursion_depth(10)
            .with_return_mode(ReturnMode::None)
            .with_quiet_trailing_semicolon(false);
        assert_eq!(cfg.max_recursion_depth, 10);
        assert_eq!(cfg.return_mode, ReturnMode::None);
        assert!(!cfg.quiet_trailing_semicolon);
    }
}
