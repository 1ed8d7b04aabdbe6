use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use thiserror::Error;
use tracing::{debug, info};

use crate::driver::{DirRequirements, DEFAULT_ADAPTER_BASE};

#[derive(Error, Debug)]
pub enum LayoutError {
    #[error("Machine name cannot be empty")]
    EmptyName,
    #[error(
        "The {backend} backend needs a VM directory for the machine files \
         (it can live on tmpfs for speed)"
    )]
    MissingVmDir { backend: String },
    #[error(
        "The {backend} backend needs a data directory for the harddisk and ISO \
         files (a regular disk or SSD, not tmpfs)"
    )]
    MissingDataDir { backend: String },
    #[error("Failed to reserve a temporary ISO path: {0}")]
    TempIso(#[source] io::Error),
}

/// What the caller asks for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineSpec {
    pub name: String,
    pub vm_dir: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
    pub temp_dir: Option<PathBuf>,
    pub adapter_base: u32,
    /// Seed for machine-level identifiers such as generated MAC addresses.
    pub seed: Option<u64>,
}

impl MachineSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vm_dir: None,
            data_dir: None,
            temp_dir: None,
            adapter_base: DEFAULT_ADAPTER_BASE,
            seed: None,
        }
    }
}

/// Validated on-disk layout of a machine.
#[derive(Debug)]
pub struct MachineLayout {
    name: String,
    vm_dir: Option<PathBuf>,
    data_dir: Option<PathBuf>,
    iso_path: PathBuf,
    // removes the reserved temp ISO when the machine goes away
    _temp_iso: Option<TempPath>,
}

impl MachineLayout {
    pub fn new(
        spec: &MachineSpec,
        backend: &str,
        requirements: DirRequirements,
    ) -> Result<Self, LayoutError> {
        if spec.name.trim().is_empty() {
            return Err(LayoutError::EmptyName);
        }
        if requirements.vm_dir && spec.vm_dir.is_none() {
            return Err(LayoutError::MissingVmDir {
                backend: backend.to_string(),
            });
        }
        if requirements.data_dir && spec.data_dir.is_none() {
            return Err(LayoutError::MissingDataDir {
                backend: backend.to_string(),
            });
        }

        let (iso_path, temp_iso) = match &spec.data_dir {
            Some(data_dir) => (data_dir.join(format!("{}.iso", spec.name)), None),
            None => {
                let mut builder = tempfile::Builder::new();
                builder.prefix(&spec.name).suffix(".iso");
                let file = match &spec.temp_dir {
                    Some(dir) => builder.tempfile_in(dir),
                    None => builder.tempfile(),
                }
                .map_err(LayoutError::TempIso)?;
                let temp_path = file.into_temp_path();
                debug!("Reserved temporary ISO path {:?}", temp_path);
                (temp_path.to_path_buf(), Some(temp_path))
            }
        };

        info!(machine = %spec.name, iso = ?iso_path, "Machine layout ready");

        Ok(Self {
            name: spec.name.clone(),
            vm_dir: spec.vm_dir.clone(),
            data_dir: spec.data_dir.clone(),
            iso_path,
            _temp_iso: temp_iso,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vm_dir(&self) -> Option<&Path> {
        self.vm_dir.as_deref()
    }

    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    pub fn iso_path(&self) -> &Path {
        &self.iso_path
    }
}
