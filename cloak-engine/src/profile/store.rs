use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use super::Profile;

const PROFILE_EXTENSION: &str = "json";

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("Profile '{name}' not found in {directory:?}")]
    NotFound { name: String, directory: PathBuf },
    #[error("Invalid profile name: {0:?}")]
    InvalidName(String),
    #[error("Failed to read profile {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Malformed profile '{name}': {source}")]
    Malformed {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Read-only view over a directory of `<name>.json` hardware profiles.
///
/// Builds running in parallel each open their own store; nothing here writes.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    directory: PathBuf,
}

impl ProfileStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn load(&self, name: &str) -> Result<Profile, ProfileError> {
        let path = self.profile_path(name)?;
        info!("Loading hardware profile '{}' from {:?}", name, path);

        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ProfileError::NotFound {
                    name: name.to_string(),
                    directory: self.directory.clone(),
                });
            }
            Err(source) => return Err(ProfileError::Io { path, source }),
        };

        let profile = Profile::from_json_str(name, &text).map_err(|source| ProfileError::Malformed {
            name: name.to_string(),
            source,
        })?;

        debug!(
            "Profile '{}' provides categories: {:?}",
            name,
            profile.categories().collect::<Vec<_>>()
        );

        Ok(profile)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.profile_path(name)
            .map(|path| path.is_file())
            .unwrap_or(false)
    }

    /// Names of all profiles in the store, sorted.
    pub fn list(&self) -> Result<Vec<String>, ProfileError> {
        let entries = fs::read_dir(&self.directory).map_err(|source| ProfileError::Io {
            path: self.directory.clone(),
            source,
        })?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| ProfileError::Io {
                path: self.directory.clone(),
                source,
            })?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if path.extension().and_then(|ext| ext.to_str()) != Some(PROFILE_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                names.push(stem.to_string());
            }
        }

        names.sort();
        Ok(names)
    }

    fn profile_path(&self, name: &str) -> Result<PathBuf, ProfileError> {
        if name.is_empty() || name.starts_with('.') || name.contains(['/', '\\']) {
            return Err(ProfileError::InvalidName(name.to_string()));
        }
        Ok(self.directory.join(format!("{}.{}", name, PROFILE_EXTENSION)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_with(profiles: &[(&str, &str)]) -> (TempDir, ProfileStore) {
        let temp_dir = TempDir::new().unwrap();
        for (name, body) in profiles {
            fs::write(temp_dir.path().join(format!("{}.json", name)), body).unwrap();
        }
        let store = ProfileStore::new(temp_dir.path());
        (temp_dir, store)
    }

    #[test]
    fn test_load_existing_profile() {
        let (_dir, store) = store_with(&[("desktop", r#"{ "bios": [ { "vendor": "AMI" } ] }"#)]);

        let profile = store.load("desktop").unwrap();
        assert_eq!(profile.name(), "desktop");
        assert_eq!(profile.candidates("bios").len(), 1);
    }

    #[test]
    fn test_missing_profile_is_not_found() {
        let (_dir, store) = store_with(&[]);

        match store.load("laptop") {
            Err(ProfileError::NotFound { name, .. }) => assert_eq!(name, "laptop"),
            other => panic!("expected NotFound, got {:?}", other),
        }
        assert!(!store.exists("laptop"));
    }

    #[test]
    fn test_rejects_path_like_names() {
        let (_dir, store) = store_with(&[]);

        for name in ["../etc/passwd", ".hidden", "a\\b", ""] {
            assert!(matches!(store.load(name), Err(ProfileError::InvalidName(_))));
        }
    }

    #[test]
    fn test_malformed_profile() {
        let (_dir, store) = store_with(&[("broken", "{ not json")]);

        assert!(matches!(store.load("broken"), Err(ProfileError::Malformed { .. })));
    }

    #[test]
    fn test_list_profiles_sorted() {
        let (dir, store) = store_with(&[("workstation", "{}"), ("desktop", "{}")]);
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        assert_eq!(store.list().unwrap(), vec!["desktop", "workstation"]);
    }
}
