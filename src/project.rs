//! Project configuration (`.appsody-config.yaml`) and project naming.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::errors::AppsodyError;
use crate::reference::is_valid_path_component;

pub const PROJECT_CONFIG_FILE: &str = ".appsody-config.yaml";
const MAX_PROJECT_NAME: usize = 68;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ProjectFile {
    stack: Option<String>,
    #[serde(rename = "project-name")]
    project_name: Option<String>,
}

/// A loaded project: its directory, stack image and effective name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub dir: PathBuf,
    pub stack: String,
    pub name: String,
}

impl Project {
    pub fn load(dir: &Path) -> Result<Self, AppsodyError> {
        let cfg_path = dir.join(PROJECT_CONFIG_FILE);
        if !cfg_path.is_file() {
            return Err(AppsodyError::Config(format!(
                "The current directory is not a valid appsody project ({} not found in {}). Run `appsody init <stack>` to create one.",
                PROJECT_CONFIG_FILE,
                dir.display()
            )));
        }
        let text = fs::read_to_string(&cfg_path)?;
        let file: ProjectFile = if text.trim().is_empty() {
            ProjectFile::default()
        } else {
            serde_yaml::from_str(&text)?
        };

        let stack = file
            .stack
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                AppsodyError::Config(format!(
                    "The stack is not defined in {}",
                    cfg_path.display()
                ))
            })?;

        let name = match file.project_name {
            Some(n) if !n.trim().is_empty() => {
                let n = n.trim().to_string();
                if !is_valid_project_name(&n) {
                    return Err(AppsodyError::Config(format!(
                        "Invalid project-name \"{n}\" in {}: use lowercase letters, digits, '.', '_' or '-', starting with a letter, at most {MAX_PROJECT_NAME} characters",
                        cfg_path.display()
                    )));
                }
                n
            }
            _ => default_project_name(dir),
        };

        Ok(Self {
            dir: dir.to_path_buf(),
            stack,
            name,
        })
    }

    /// `dev.local/<name>`
    pub fn default_tag(&self) -> String {
        format!("dev.local/{}", self.name)
    }
}

/// Derive a project name from the directory name.
pub fn default_project_name(dir: &Path) -> String {
    let base = fs::canonicalize(dir)
        .unwrap_or_else(|_| dir.to_path_buf())
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    convert_to_valid_project_name(&base)
}

/// Lowercase and map into the image path-component grammar: characters outside `[a-z0-9._-]`
/// become '-', separator runs other than `.`, `_`, `__` or dashes collapse to '-', leading and
/// trailing separators are dropped, `appsody-` is prefixed when the name does not start with a
/// letter, and the result is truncated.
pub fn convert_to_valid_project_name(s: &str) -> String {
    let mut name = String::new();
    let mut sep = String::new();
    for c in s.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if !sep.is_empty() {
                if !name.is_empty() {
                    name.push_str(normalize_separator(&sep));
                }
                sep.clear();
            }
            name.push(c);
        } else if c == '.' || c == '_' || c == '-' {
            sep.push(c);
        } else {
            sep.push('-');
        }
    }
    if name.is_empty() {
        return "appsody".to_string();
    }
    if !name.starts_with(|c: char| c.is_ascii_lowercase()) {
        name = format!("appsody-{name}");
    }
    name.truncate(MAX_PROJECT_NAME);
    let trimmed = name.trim_end_matches(['.', '_', '-']).len();
    name.truncate(trimmed);
    name
}

fn normalize_separator(sep: &str) -> &str {
    if sep == "." || sep == "_" || sep == "__" || sep.bytes().all(|b| b == b'-') {
        sep
    } else {
        "-"
    }
}

/// Valid when conversion leaves the name unchanged, so `dev.local/<name>` is a valid tag.
pub fn is_valid_project_name(s: &str) -> bool {
    !s.is_empty() && convert_to_valid_project_name(s) == s && is_valid_path_component(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::validate_reference;

    #[test]
    fn test_convert_to_valid_project_name() {
        assert_eq!(convert_to_valid_project_name("starter"), "starter");
        assert_eq!(convert_to_valid_project_name("My Project"), "my-project");
        assert_eq!(convert_to_valid_project_name("1app"), "appsody-1app");
        assert_eq!(convert_to_valid_project_name(""), "appsody");
        assert_eq!(convert_to_valid_project_name("a/b:c"), "a-b-c");
        let long = "x".repeat(100);
        assert_eq!(convert_to_valid_project_name(&long).len(), 68);
    }

    #[test]
    fn test_is_valid_project_name() {
        assert!(is_valid_project_name("my-app.v2"));
        assert!(!is_valid_project_name("MyApp"));
        assert!(!is_valid_project_name("9lives"));
        assert!(!is_valid_project_name(""));
        assert!(!is_valid_project_name("demo_"));
        assert!(!is_valid_project_name("a..b"));
        assert!(!is_valid_project_name("a-_b"));
    }

    #[test]
    fn test_derived_names_make_valid_tags() {
        for (dir, expected) in [
            ("demo_", "demo"),
            ("my app!", "my-app"),
            ("_private", "private"),
            ("a..b", "a-b"),
            ("a-_b", "a-b"),
            ("x__y", "x__y"),
            ("--", "appsody"),
            ("2048", "appsody-2048"),
        ] {
            let name = convert_to_valid_project_name(dir);
            assert_eq!(name, expected, "derived from {dir:?}");
            assert!(is_valid_project_name(&name), "{name}");
            assert!(validate_reference(&format!("dev.local/{name}")).is_ok(), "{name}");
        }
        let long = format!("{}_{}", "a".repeat(67), "b");
        let name = convert_to_valid_project_name(&long);
        assert_eq!(name, "a".repeat(67));
    }

    #[test]
    fn test_load_project_defaults_name_from_dir() {
        let td = tempfile::tempdir().unwrap();
        let dir = td.path().join("Starter App");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(PROJECT_CONFIG_FILE), "stack: appsody/starter:0.1\n").unwrap();
        let p = Project::load(&dir).unwrap();
        assert_eq!(p.stack, "appsody/starter:0.1");
        assert_eq!(p.name, "starter-app");
        assert_eq!(p.default_tag(), "dev.local/starter-app");
    }

    #[test]
    fn test_load_project_uses_configured_name() {
        let td = tempfile::tempdir().unwrap();
        fs::write(
            td.path().join(PROJECT_CONFIG_FILE),
            "stack: appsody/starter:0.1\nproject-name: demo\n",
        )
        .unwrap();
        let p = Project::load(td.path()).unwrap();
        assert_eq!(p.name, "demo");
    }

    #[test]
    fn test_load_project_errors() {
        let td = tempfile::tempdir().unwrap();
        let err = Project::load(td.path()).unwrap_err();
        assert!(err.to_string().contains("not a valid appsody project"), "{err}");
        assert!(
            err.to_string()
                .ends_with("Run `appsody init <stack>` to create one."),
            "{err}"
        );

        fs::write(td.path().join(PROJECT_CONFIG_FILE), "project-name: demo\n").unwrap();
        let err = Project::load(td.path()).unwrap_err();
        assert!(err.to_string().contains("stack is not defined"), "{err}");

        fs::write(
            td.path().join(PROJECT_CONFIG_FILE),
            "stack: s\nproject-name: Bad Name\n",
        )
        .unwrap();
        let err = Project::load(td.path()).unwrap_err();
        assert!(err.to_string().contains("Invalid project-name"), "{err}");
    }
}
