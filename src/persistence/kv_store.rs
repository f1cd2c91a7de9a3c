//! Grouped key-value storage backing the profile settings.
//!
//! Values live in named groups (one per profile). [`TomlFileStore`] keeps every
//! group as a table in a single TOML document under the user's config
//! directory, namespaced by vendor and application.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use toml::Table;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Settings file I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode settings: {0}")]
    Encode(#[from] toml::ser::Error),
}

/// Backend for named groups of key-value pairs.
pub trait KeyValueStore {
    /// Names of all top-level groups in enumeration order.
    fn child_groups(&self) -> Vec<String>;

    /// Values stored in `name`, if the group exists.
    fn group(&self, name: &str) -> Option<&Table>;

    /// Writes `values` as the complete content of group `name`.
    fn replace_group(&mut self, name: &str, values: Table) -> Result<(), StoreError>;

    /// Drops group `name` and everything in it. Absent groups are ignored.
    fn remove_group(&mut self, name: &str) -> Result<(), StoreError>;

    fn is_writable(&self) -> bool;
}

/// File-backed store: `<config_dir>/<vendor>/<application>.toml`.
#[derive(Debug)]
pub struct TomlFileStore {
    path: PathBuf,
    groups: Table,
}

impl TomlFileStore {
    /// Default location for a vendor/application namespace.
    pub fn default_path(vendor: &str, application: &str) -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| {
            warn!("Could not determine config directory, using current directory");
            PathBuf::from(".")
        });
        path.push(vendor);
        path.push(format!("{}.toml", application));
        path
    }

    /// Opens the store at `path`, reading existing groups.
    ///
    /// A missing file yields an empty store. A file that does not parse is
    /// moved aside to `<path>.corrupt` so the next write does not destroy it.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();

        let groups = match fs::read_to_string(&path) {
            Ok(content) => match content.parse::<Table>() {
                Ok(table) => table,
                Err(e) => {
                    let backup = path.with_extension("toml.corrupt");
                    warn!(
                        "Settings file {} is unreadable ({}), moving it to {}",
                        path.display(),
                        e,
                        backup.display()
                    );
                    fs::rename(&path, &backup).map_err(|source| StoreError::Io {
                        path: path.clone(),
                        source,
                    })?;
                    Table::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No settings file at {}, starting empty", path.display());
                Table::new()
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        info!(
            "Opened settings store {} with {} profile(s)",
            path.display(),
            groups.len()
        );
        Ok(Self { path, groups })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes all groups through a temporary file and an atomic rename.
    fn persist(&self) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let content = toml::to_string_pretty(&self.groups)?;
        let tmp = self.path.with_extension("toml.tmp");
        fs::write(&tmp, content).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)?;

        debug!("Settings written to {}", self.path.display());
        Ok(())
    }
}

impl KeyValueStore for TomlFileStore {
    fn child_groups(&self) -> Vec<String> {
        self.groups
            .iter()
            .filter(|(_, value)| value.is_table())
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn group(&self, name: &str) -> Option<&Table> {
        self.groups.get(name).and_then(|value| value.as_table())
    }

    fn replace_group(&mut self, name: &str, values: Table) -> Result<(), StoreError> {
        let previous = self
            .groups
            .insert(name.to_string(), toml::Value::Table(values));

        if let Err(e) = self.persist() {
            // keep memory and disk in agreement
            match previous {
                Some(value) => self.groups.insert(name.to_string(), value),
                None => self.groups.remove(name),
            };
            return Err(e);
        }
        Ok(())
    }

    fn remove_group(&mut self, name: &str) -> Result<(), StoreError> {
        let Some(previous) = self.groups.remove(name) else {
            debug!("Group {} not present, nothing to remove", name);
            return Ok(());
        };

        if let Err(e) = self.persist() {
            self.groups.insert(name.to_string(), previous);
            return Err(e);
        }
        Ok(())
    }

    /// Checks the file itself when it exists, otherwise the closest existing
    /// ancestor directory.
    fn is_writable(&self) -> bool {
        let mut candidate: Option<&Path> = Some(&self.path);
        while let Some(path) = candidate {
            if let Ok(metadata) = fs::metadata(path) {
                return !metadata.permissions().readonly();
            }
            candidate = path.parent().filter(|p| !p.as_os_str().is_empty());
        }
        // relative path with no existing parent: the current directory
        fs::metadata(".")
            .map(|m| !m.permissions().readonly())
            .unwrap_or(false)
    }
}
