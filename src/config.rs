//! Global configuration (`.appsody.yaml`) and per-invocation settings.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use which::which;

use crate::errors::AppsodyError;

pub const CONFIG_FILE_NAME: &str = ".appsody.yaml";
pub const DEFAULT_IMAGES: &str = "index.docker.io";

/// On-disk global config. Unknown keys are ignored so newer files still load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    pub home: String,
    pub images: String,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            home: String::new(),
            images: DEFAULT_IMAGES.to_string(),
        }
    }
}

/// Settings shared by all subcommands for one invocation.
#[derive(Debug, Clone, Default)]
pub struct RootCommandConfig {
    pub project_dir: PathBuf,
    pub config_file: PathBuf,
    pub home: PathBuf,
    pub images: String,
    pub dryrun: bool,
    pub verbose: bool,
    pub buildah: bool,
}

impl RootCommandConfig {
    /// Resolve the config file location, create it with defaults when missing, and load it.
    /// In dry-run mode a missing file is not created.
    pub fn load(
        project_dir: PathBuf,
        config_flag: Option<&Path>,
        dryrun: bool,
        verbose: bool,
    ) -> Result<Self, AppsodyError> {
        let config_file = match config_flag {
            Some(p) => p.to_path_buf(),
            None => default_home_dir()?.join(CONFIG_FILE_NAME),
        };
        let home = config_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let global = if config_file.exists() {
            let text = fs::read_to_string(&config_file)?;
            if text.trim().is_empty() {
                GlobalConfig::default()
            } else {
                serde_yaml::from_str::<GlobalConfig>(&text)?
            }
        } else {
            let cfg = GlobalConfig {
                home: home.display().to_string(),
                ..GlobalConfig::default()
            };
            if !dryrun {
                fs::create_dir_all(&home)?;
                fs::write(&config_file, serde_yaml::to_string(&cfg)?)?;
            }
            cfg
        };

        let home = if global.home.trim().is_empty() {
            home
        } else {
            PathBuf::from(global.home.trim())
        };
        let images = if global.images.trim().is_empty() {
            DEFAULT_IMAGES.to_string()
        } else {
            global.images.trim().to_string()
        };

        Ok(Self {
            project_dir,
            config_file,
            home,
            images,
            dryrun,
            verbose,
            buildah: false,
        })
    }

    pub fn extract_root(&self) -> PathBuf {
        self.home.join("extract")
    }
}

/// `APPSODY_HOME`, else `~/.appsody`.
pub fn default_home_dir() -> Result<PathBuf, AppsodyError> {
    if let Ok(h) = env::var("APPSODY_HOME") {
        if !h.trim().is_empty() {
            return Ok(PathBuf::from(h.trim()));
        }
    }
    home::home_dir()
        .map(|h| h.join(".appsody"))
        .ok_or_else(|| AppsodyError::Config("could not determine the home directory".to_string()))
}

fn tool_path(env_key: &str, bin: &str, display: &str) -> Result<PathBuf, AppsodyError> {
    if let Ok(p) = env::var(env_key) {
        let p = p.trim();
        if !p.is_empty() {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Ok(pb);
            }
            return Err(AppsodyError::NotFound(format!(
                "{display} override {env_key}={p} does not exist."
            )));
        }
    }
    which(bin).map_err(|_| {
        AppsodyError::NotFound(format!("{display} is required but was not found in PATH."))
    })
}

/// Docker CLI path (`APPSODY_DOCKER` override, else PATH).
pub fn container_runtime_path() -> Result<PathBuf, AppsodyError> {
    tool_path("APPSODY_DOCKER", "docker", "Docker")
}

/// Buildah CLI path (`APPSODY_BUILDAH` override, else PATH).
pub fn buildah_path() -> Result<PathBuf, AppsodyError> {
    tool_path("APPSODY_BUILDAH", "buildah", "Buildah")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_creates_default_config() {
        let td = tempfile::tempdir().unwrap();
        let cfg_file = td.path().join("cfg").join(CONFIG_FILE_NAME);
        let cfg = RootCommandConfig::load(td.path().to_path_buf(), Some(&cfg_file), false, false)
            .unwrap();
        assert!(cfg_file.exists());
        assert_eq!(cfg.home, td.path().join("cfg"));
        assert_eq!(cfg.images, DEFAULT_IMAGES);
        assert_eq!(cfg.extract_root(), td.path().join("cfg").join("extract"));
        let text = fs::read_to_string(&cfg_file).unwrap();
        assert!(text.contains("images: index.docker.io"), "{text}");
    }

    #[test]
    fn test_load_dryrun_does_not_write() {
        let td = tempfile::tempdir().unwrap();
        let cfg_file = td.path().join("cfg").join(CONFIG_FILE_NAME);
        let cfg =
            RootCommandConfig::load(td.path().to_path_buf(), Some(&cfg_file), true, false).unwrap();
        assert!(cfg.dryrun);
        assert!(!cfg_file.exists());
    }

    #[test]
    fn test_load_reads_images_and_ignores_unknown_keys() {
        let td = tempfile::tempdir().unwrap();
        let cfg_file = td.path().join(CONFIG_FILE_NAME);
        fs::write(&cfg_file, "images: quay.io\noperator: appsody\n").unwrap();
        let cfg = RootCommandConfig::load(td.path().to_path_buf(), Some(&cfg_file), false, true)
            .unwrap();
        assert_eq!(cfg.images, "quay.io");
        assert!(cfg.verbose);
    }

    #[test]
    fn test_load_rejects_malformed_yaml() {
        let td = tempfile::tempdir().unwrap();
        let cfg_file = td.path().join(CONFIG_FILE_NAME);
        fs::write(&cfg_file, "images: [unclosed\n").unwrap();
        let err = RootCommandConfig::load(td.path().to_path_buf(), Some(&cfg_file), false, false)
            .unwrap_err();
        assert!(matches!(err, AppsodyError::Config(_)), "{err:?}");
    }
}
