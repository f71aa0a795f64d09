//! Profile Registry - built-in and stored pivot profiles
//!
//! Stored profiles live as JSON files in a profile directory and can be
//! matched automatically against an input header.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::{builtin, builtins, PivotProfile};
use crate::error::{ProfileError, ProfileResult};
use crate::logs::log_warning;

/// Directory where profiles are stored (relative to current dir)
const DEFAULT_PROFILE_DIR: &str = ".survey-pivot/profiles";

/// Where a profile comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileSource {
    BuiltIn,
    Stored,
}

/// Registry for resolving pivot profiles
pub struct ProfileRegistry {
    /// Directory where profiles are stored
    profile_dir: PathBuf,
    /// Loaded stored profiles (name -> profile)
    profiles: BTreeMap<String, PivotProfile>,
}

impl ProfileRegistry {
    /// Create a registry over the default directory
    pub fn new() -> Self {
        Self::with_dir(DEFAULT_PROFILE_DIR)
    }

    /// Create a registry with a custom directory
    pub fn with_dir(dir: impl AsRef<Path>) -> Self {
        let mut registry = Self {
            profile_dir: PathBuf::from(dir.as_ref()),
            profiles: BTreeMap::new(),
        };
        registry.load_all();
        registry
    }

    pub fn profile_dir(&self) -> &Path {
        &self.profile_dir
    }

    /// Load every valid profile from the directory. Broken files are
    /// reported and skipped.
    fn load_all(&mut self) {
        let entries = match fs::read_dir(&self.profile_dir) {
            Ok(e) => e,
            Err(_) => return,
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.extension().is_some_and(|e| e == "json") {
                continue;
            }
            match Self::load_file(&path) {
                Ok(profile) if builtin(&profile.name).is_some() => log_warning(format!(
                    "Ignoring {}: '{}' is a built-in profile name",
                    path.display(),
                    profile.name
                )),
                Ok(profile) => {
                    self.profiles.insert(profile.name.clone(), profile);
                }
                Err(e) => log_warning(format!("Ignoring {}: {}", path.display(), e)),
            }
        }
    }

    /// Built-in profiles first, then stored ones by name.
    pub fn list(&self) -> Vec<(PivotProfile, ProfileSource)> {
        builtins()
            .into_iter()
            .map(|p| (p, ProfileSource::BuiltIn))
            .chain(
                self.profiles
                    .values()
                    .cloned()
                    .map(|p| (p, ProfileSource::Stored)),
            )
            .collect()
    }

    /// Get a profile by name
    pub fn get(&self, name: &str) -> Option<PivotProfile> {
        builtin(name).or_else(|| self.profiles.get(name).cloned())
    }

    /// Resolve a profile name, or load a profile JSON file when no profile
    /// has that name.
    pub fn resolve(&self, name_or_path: &str) -> ProfileResult<PivotProfile> {
        if let Some(profile) = self.get(name_or_path) {
            return Ok(profile);
        }
        let path = Path::new(name_or_path);
        if path.is_file() {
            return Self::load_file(path);
        }
        Err(ProfileError::NotFound(name_or_path.to_string()))
    }

    /// Read and validate one profile file.
    pub fn load_file(path: &Path) -> ProfileResult<PivotProfile> {
        let content = fs::read_to_string(path)?;
        let profile = PivotProfile::from_json(&content)?;
        profile.validate()?;
        Ok(profile)
    }

    /// Import a profile file into the directory, optionally renaming it.
    ///
    /// Returns the stored name. An existing stored profile with the same
    /// name is replaced.
    pub fn import(&mut self, path: &Path, name: Option<&str>) -> ProfileResult<String> {
        let mut profile = Self::load_file(path)?;
        if let Some(name) = name {
            profile.name = name.to_string();
            profile.validate()?;
        }
        if builtin(&profile.name).is_some() {
            return Err(ProfileError::Invalid {
                name: profile.name,
                message: "name is taken by a built-in profile".into(),
            });
        }

        fs::create_dir_all(&self.profile_dir)?;
        let file = self.profile_dir.join(format!("{}.json", slug(&profile.name)));
        fs::write(&file, profile.to_json()?)?;

        let stored = profile.name.clone();
        self.profiles.insert(stored.clone(), profile);
        Ok(stored)
    }

    /// Profiles whose required columns mostly appear in `headers`, best
    /// first. Ties go to the profile with more required columns.
    pub fn find_compatible(&self, headers: &[String]) -> Vec<(PivotProfile, f64)> {
        let mut compatible: Vec<_> = self
            .list()
            .into_iter()
            .filter_map(|(profile, _)| {
                let score = compatibility(&profile.required_columns(), headers);
                (score > 0.5).then_some((profile, score))
            })
            .collect();

        compatible.sort_by(|a, b| {
            b.1.total_cmp(&a.1).then_with(|| {
                b.0.required_columns()
                    .len()
                    .cmp(&a.0.required_columns().len())
            })
        });
        compatible
    }

    /// The best profile whose required columns are all present.
    pub fn detect(&self, headers: &[String]) -> Option<PivotProfile> {
        self.find_compatible(headers)
            .into_iter()
            .find(|(_, score)| *score >= 1.0)
            .map(|(profile, _)| profile)
    }
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Share of `required` found in `headers`. Column names are matched
/// exactly, as the reader does.
fn compatibility(required: &[&str], headers: &[String]) -> f64 {
    if required.is_empty() {
        return 0.0;
    }
    let found = required
        .iter()
        .filter(|col| headers.iter().any(|h| h == *col))
        .count();
    found as f64 / required.len() as f64
}

/// File-name slug of a profile name.
fn slug(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}
