//! Run configuration for codestrata.
//!
//! A configuration file is optional; every field has a default so an empty
//! file is valid.

use std::fs;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

use crate::detect::{IssueType, Thresholds};
use crate::error::{Error, Result};

/// File names searched for in the working directory, in order.
pub const DEFAULT_CONFIG_NAMES: &[&str] = &["codestrata.yaml", ".codestrata.yaml"];

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Project name for the system node; defaults to the scanned directory's name.
    pub project: Option<String>,
    /// Glob patterns for paths to leave out (e.g., "**/generated/**").
    pub excluded_paths: Vec<String>,
    /// Walk into hidden directories.
    pub include_hidden: bool,
    /// Parse and scan files on the rayon pool.
    pub parallel: bool,
    pub thresholds: Thresholds,
    /// Issue types to skip, by name (e.g., "unused_variable").
    pub disabled_issues: Vec<String>,
    pub security: SecurityConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project: None,
            excluded_paths: Vec::new(),
            include_hidden: false,
            parallel: true,
            thresholds: Thresholds::default(),
            disabled_issues: Vec::new(),
            security: SecurityConfig::default(),
        }
    }
}

/// Security scanner settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub enabled: bool,
    /// Flag high-entropy string literals as probable secrets.
    pub entropy: bool,
    /// Extra globs treated like test/example/generated files.
    pub downgrade_paths: Vec<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            entropy: true,
            downgrade_paths: Vec::new(),
        }
    }
}

impl Config {
    /// Parse configuration from YAML text. Blank or comment-only text yields
    /// the defaults.
    pub fn from_yaml(content: &str) -> std::result::Result<Self, serde_yaml::Error> {
        let blank = content
            .lines()
            .map(str::trim)
            .all(|l| l.is_empty() || l.starts_with('#'));
        if blank {
            return Ok(Self::default());
        }
        let config: Option<Config> = serde_yaml::from_str(content)?;
        Ok(config.unwrap_or_default())
    }

    /// Parse a configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_yaml(&content).map_err(|source| Error::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Find a configuration file in `dir`.
    pub fn discover(dir: &Path) -> Option<PathBuf> {
        DEFAULT_CONFIG_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|p| p.is_file())
    }

    /// Load the explicit file if given, else a discovered one, else the
    /// defaults. The configuration is validated before it is returned.
    pub fn load(explicit: Option<&Path>, dir: &Path) -> Result<(Self, Option<PathBuf>)> {
        let path = match explicit {
            Some(p) => Some(p.to_path_buf()),
            None => Self::discover(dir),
        };
        let config = match &path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        validate(&config)?;
        Ok((config, path))
    }

    /// Compiled `excluded_paths`.
    pub fn excluded_set(&self) -> Result<GlobSet> {
        build_glob_set(&self.excluded_paths)
    }

    /// Disabled issue types; unknown names are ignored here and rejected by
    /// [`validate`].
    pub fn disabled_issue_types(&self) -> Vec<IssueType> {
        self.disabled_issues
            .iter()
            .filter_map(|name| IssueType::parse(name))
            .collect()
    }
}

/// Compile a list of glob patterns into one matcher.
pub fn build_glob_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|source| Error::InvalidGlob {
            pattern: pattern.clone(),
            source,
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|source| Error::InvalidGlob {
        pattern: patterns.join(", "),
        source,
    })
}

/// Validate a configuration.
pub fn validate(config: &Config) -> Result<()> {
    build_glob_set(&config.excluded_paths)?;
    build_glob_set(&config.security.downgrade_paths)?;

    let t = &config.thresholds;
    let counts = [
        ("god_class_loc", t.god_class_loc),
        ("god_class_methods", t.god_class_methods),
        ("long_method_loc", t.long_method_loc),
        ("high_complexity", t.high_complexity as usize),
        ("deep_nesting", t.deep_nesting as usize),
        ("feature_envy_min_accesses", t.feature_envy_min_accesses),
    ];
    for (name, value) in counts {
        if value == 0 {
            return Err(Error::InvalidConfig(format!(
                "thresholds.{} must be positive",
                name
            )));
        }
    }
    if !(t.feature_envy_ratio.is_finite() && t.feature_envy_ratio > 0.0) {
        return Err(Error::InvalidConfig(
            "thresholds.feature_envy_ratio must be a positive number".to_string(),
        ));
    }

    for name in &config.disabled_issues {
        if IssueType::parse(name).is_none() {
            return Err(Error::InvalidConfig(format!(
                "unknown issue type {:?} in disabled_issues",
                name
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let yaml = r#"
project: shop
excluded_paths:
  - "**/generated/**"
parallel: false
thresholds:
  long_method_loc: 80
disabled_issues:
  - unused_variable
security:
  entropy: false
  downgrade_paths:
    - "scripts/**"
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.project.as_deref(), Some("shop"));
        assert!(!config.parallel);
        assert_eq!(config.thresholds.long_method_loc, 80);
        assert_eq!(config.thresholds.god_class_loc, 500);
        assert!(config.security.enabled);
        assert!(!config.security.entropy);
        assert_eq!(config.disabled_issue_types(), vec![IssueType::UnusedVariable]);
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_empty_config_is_default() {
        assert_eq!(Config::from_yaml("").unwrap(), Config::default());
        assert_eq!(
            Config::from_yaml("# nothing here\n\n").unwrap(),
            Config::default()
        );
    }

    #[test]
    fn test_validate_rejects_bad_glob() {
        let config = Config {
            excluded_paths: vec!["src/[".to_string()],
            ..Default::default()
        };
        assert!(matches!(validate(&config), Err(Error::InvalidGlob { .. })));
    }

    #[test]
    fn test_validate_rejects_zero_threshold() {
        let mut config = Config::default();
        config.thresholds.high_complexity = 0;
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("high_complexity"));

        let mut config = Config::default();
        config.thresholds.feature_envy_ratio = -1.0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_issue() {
        let config = Config {
            disabled_issues: vec!["spaghetti".to_string()],
            ..Default::default()
        };
        assert!(matches!(validate(&config), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_load_discovers_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".codestrata.yaml"), "include_hidden: true\n").unwrap();
        let (config, path) = Config::load(None, dir.path()).unwrap();
        assert!(config.include_hidden);
        assert_eq!(path, Some(dir.path().join(".codestrata.yaml")));

        let empty = tempfile::tempdir().unwrap();
        let (config, path) = Config::load(None, empty.path()).unwrap();
        assert_eq!(config, Config::default());
        assert!(path.is_none());
    }

    #[test]
    fn test_invalid_yaml_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("codestrata.yaml");
        fs::write(&path, "thresholds: [1, 2").unwrap();
        let err = Config::from_file(&path).unwrap_err();
        assert!(matches!(err, Error::Yaml { .. }));
        assert!(err.to_string().contains("codestrata.yaml"));
    }
}
