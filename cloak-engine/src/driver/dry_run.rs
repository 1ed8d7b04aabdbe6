//! In-memory driver
//!
//! Records every call and keeps the settings a real backend would have
//! written, without touching a hypervisor. Used to preview a cloaked machine
//! and in tests.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{DirRequirements, DriverError, DriverResult, VmDriver};
use crate::generator::MacAddress;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum DriverCall {
    CreateVm,
    DeleteVm,
    SetRamsize { megabytes: u64 },
    SetOsType { os: String, service_pack: u32 },
    CreateHd { size_mb: u64 },
    AttachIso { iso: PathBuf },
    DetachIso,
    SetField { path: String, value: String },
    ModifyMac { mac: MacAddress },
    Hostonly { mac: Option<MacAddress>, index: u32 },
    Bridged { interface: String, mac: Option<MacAddress>, index: u32 },
    Nat { mac: Option<MacAddress>, index: u32 },
    Hwvirt { enable: bool },
    StartVm { visible: bool },
    Snapshot { label: String },
    StopVm,
}

#[derive(Debug, Default)]
pub struct DryRunDriver {
    name: String,
    requirements: DirRequirements,
    created: bool,
    running: bool,
    calls: Vec<DriverCall>,
    settings: BTreeMap<String, String>,
    rejected_paths: HashSet<String>,
}

impl DryRunDriver {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Pretend the backend needs the given directories.
    pub fn with_requirements(mut self, requirements: DirRequirements) -> Self {
        self.requirements = requirements;
        self
    }

    /// Make `set_field` fail for `path`, the way a hypervisor refuses a key it does not know.
    pub fn reject_field(mut self, path: impl Into<String>) -> Self {
        self.rejected_paths.insert(path.into());
        self
    }

    pub fn calls(&self) -> &[DriverCall] {
        &self.calls
    }

    pub fn settings(&self) -> &BTreeMap<String, String> {
        &self.settings
    }

    fn record(&mut self, call: DriverCall) {
        debug!(vm = %self.name, ?call, "dry-run");
        self.calls.push(call);
    }

    fn require_created(&self) -> DriverResult<()> {
        if self.created {
            Ok(())
        } else {
            Err(DriverError::InvalidState(format!("VM '{}' has not been created", self.name)))
        }
    }

    fn set(&mut self, key: &str, value: impl Into<String>) {
        self.settings.insert(key.to_string(), value.into());
    }

    fn adapter(&mut self, index: u32, kind: &str, mac: Option<MacAddress>) {
        self.set(&format!("nic{}", index), kind);
        if let Some(mac) = mac {
            self.set(&format!("macaddress{}", index), mac.compact());
        }
    }
}

#[async_trait]
impl VmDriver for DryRunDriver {
    fn backend(&self) -> String {
        "dry-run".to_string()
    }

    fn requirements(&self) -> DirRequirements {
        self.requirements
    }

    async fn create_vm(&mut self) -> DriverResult<()> {
        if self.created {
            return Err(DriverError::InvalidState(format!("VM '{}' already exists", self.name)));
        }
        self.record(DriverCall::CreateVm);
        self.created = true;
        let name = self.name.clone();
        self.set("name", name);
        Ok(())
    }

    async fn delete_vm(&mut self) -> DriverResult<()> {
        self.require_created()?;
        self.record(DriverCall::DeleteVm);
        self.created = false;
        self.running = false;
        self.settings.clear();
        Ok(())
    }

    async fn set_ramsize(&mut self, megabytes: u64) -> DriverResult<()> {
        self.require_created()?;
        self.record(DriverCall::SetRamsize { megabytes });
        self.set("memory", megabytes.to_string());
        Ok(())
    }

    async fn set_os_type(&mut self, os: &str, service_pack: u32) -> DriverResult<()> {
        self.require_created()?;
        self.record(DriverCall::SetOsType {
            os: os.to_string(),
            service_pack,
        });
        self.set("ostype", format!("{}_sp{}", os, service_pack));
        Ok(())
    }

    async fn create_hd(&mut self, size_mb: u64) -> DriverResult<()> {
        self.require_created()?;
        self.record(DriverCall::CreateHd { size_mb });
        self.set("hdd", size_mb.to_string());
        Ok(())
    }

    async fn attach_iso(&mut self, iso: &Path) -> DriverResult<()> {
        self.require_created()?;
        self.record(DriverCall::AttachIso {
            iso: iso.to_path_buf(),
        });
        self.set("dvd", iso.display().to_string());
        Ok(())
    }

    async fn detach_iso(&mut self) -> DriverResult<()> {
        self.require_created()?;
        self.record(DriverCall::DetachIso);
        self.settings.remove("dvd");
        Ok(())
    }

    async fn set_field(&mut self, path: &str, value: &str) -> DriverResult<()> {
        self.require_created()?;
        if self.rejected_paths.contains(path) {
            return Err(DriverError::FieldRejected {
                path: path.to_string(),
                reason: "unknown key".to_string(),
            });
        }
        self.record(DriverCall::SetField {
            path: path.to_string(),
            value: value.to_string(),
        });
        self.set(path, value);
        Ok(())
    }

    async fn modify_mac(&mut self, mac: MacAddress) -> DriverResult<()> {
        self.require_created()?;
        self.record(DriverCall::ModifyMac { mac });
        self.set("macaddress1", mac.compact());
        Ok(())
    }

    async fn hostonly(&mut self, mac: Option<MacAddress>, index: u32) -> DriverResult<()> {
        self.require_created()?;
        self.record(DriverCall::Hostonly { mac, index });
        self.adapter(index, "hostonly", mac);
        Ok(())
    }

    async fn bridged(
        &mut self,
        interface: &str,
        mac: Option<MacAddress>,
        index: u32,
    ) -> DriverResult<()> {
        self.require_created()?;
        self.record(DriverCall::Bridged {
            interface: interface.to_string(),
            mac,
            index,
        });
        self.adapter(index, "bridged", mac);
        self.set(&format!("bridgeadapter{}", index), interface);
        Ok(())
    }

    async fn nat(&mut self, mac: Option<MacAddress>, index: u32) -> DriverResult<()> {
        self.require_created()?;
        self.record(DriverCall::Nat { mac, index });
        self.adapter(index, "nat", mac);
        Ok(())
    }

    async fn hwvirt(&mut self, enable: bool) -> DriverResult<()> {
        self.require_created()?;
        self.record(DriverCall::Hwvirt { enable });
        self.set("hwvirtex", if enable { "on" } else { "off" });
        Ok(())
    }

    async fn start_vm(&mut self, visible: bool) -> DriverResult<()> {
        self.require_created()?;
        if self.running {
            return Err(DriverError::InvalidState(format!("VM '{}' is already running", self.name)));
        }
        self.record(DriverCall::StartVm { visible });
        self.running = true;
        Ok(())
    }

    async fn snapshot(&mut self, label: &str) -> DriverResult<()> {
        self.require_created()?;
        self.record(DriverCall::Snapshot {
            label: label.to_string(),
        });
        self.set("snapshot", label);
        Ok(())
    }

    async fn stop_vm(&mut self) -> DriverResult<()> {
        self.require_created()?;
        if !self.running {
            return Err(DriverError::InvalidState(format!("VM '{}' is not running", self.name)));
        }
        self.record(DriverCall::StopVm);
        self.running = false;
        Ok(())
    }

    async fn list_settings(&mut self) -> DriverResult<BTreeMap<String, String>> {
        self.require_created()?;
        Ok(self.settings.clone())
    }
}
