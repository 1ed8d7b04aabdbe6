//! Hypervisor capability interface
//!
//! The engine never talks to a hypervisor directly. Every backend implements
//! `VmDriver`, and the concrete backend is chosen when the machine is built.
//! Drivers only ever receive resolved literal values.

pub mod dry_run;
pub mod network;

pub use dry_run::{DriverCall, DryRunDriver};
pub use network::{AdapterCounter, NetworkAdapter, DEFAULT_ADAPTER_BASE};

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

use crate::generator::MacAddress;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    #[error("Driver rejected field {path}: {reason}")]
    FieldRejected { path: String, reason: String },
    #[error("Invalid VM state: {0}")]
    InvalidState(String),
}

pub type DriverResult<T> = Result<T, DriverError>;

/// Directories a backend needs before it can build a machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirRequirements {
    pub vm_dir: bool,
    pub data_dir: bool,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VmDriver: Send {
    /// Backend name, for logs and reports.
    fn backend(&self) -> String;

    fn requirements(&self) -> DirRequirements;

    async fn create_vm(&mut self) -> DriverResult<()>;

    /// Remove the machine and its associated files.
    async fn delete_vm(&mut self) -> DriverResult<()>;

    async fn set_ramsize(&mut self, megabytes: u64) -> DriverResult<()>;

    async fn set_os_type(&mut self, os: &str, service_pack: u32) -> DriverResult<()>;

    async fn create_hd(&mut self, size_mb: u64) -> DriverResult<()>;

    /// Attach an ISO image as the DVD drive.
    async fn attach_iso(&mut self, iso: &Path) -> DriverResult<()>;

    async fn detach_iso(&mut self) -> DriverResult<()>;

    /// Apply one resolved template field.
    async fn set_field(&mut self, path: &str, value: &str) -> DriverResult<()>;

    async fn modify_mac(&mut self, mac: MacAddress) -> DriverResult<()>;

    async fn hostonly(&mut self, mac: Option<MacAddress>, index: u32) -> DriverResult<()>;

    async fn bridged(
        &mut self,
        interface: &str,
        mac: Option<MacAddress>,
        index: u32,
    ) -> DriverResult<()>;

    async fn nat(&mut self, mac: Option<MacAddress>, index: u32) -> DriverResult<()>;

    /// Enable or disable hardware virtualization (VT-x/AMD-V).
    async fn hwvirt(&mut self, enable: bool) -> DriverResult<()>;

    async fn start_vm(&mut self, visible: bool) -> DriverResult<()>;

    async fn snapshot(&mut self, label: &str) -> DriverResult<()>;

    async fn stop_vm(&mut self) -> DriverResult<()>;

    async fn list_settings(&mut self) -> DriverResult<BTreeMap<String, String>>;
}
