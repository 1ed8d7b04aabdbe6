//! Cloaked virtual machines
//!
//! `Machine` ties a backend driver to a validated layout and a per-VM
//! network adapter counter, and applies resolved field templates through the
//! driver.

pub mod layout;
pub mod report;

pub use layout::{LayoutError, MachineLayout, MachineSpec};
pub use report::{BuildReport, BuildStatus, FailureStage, FieldFailure, FieldFallback};

use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::driver::{AdapterCounter, DriverError, NetworkAdapter, VmDriver};
use crate::generator::{self, MacAddress};
use crate::profile::{ProfileError, ProfileStore};
use crate::resolver;
use crate::session::ResolutionSession;
use crate::template::FieldTemplate;

/// Problems that abort a build outright.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error("VM operation failed: {0}")]
    Driver(#[from] DriverError),
}

pub struct Machine<D: VmDriver> {
    driver: D,
    layout: MachineLayout,
    adapters: AdapterCounter,
    rng: StdRng,
}

impl<D: VmDriver> Machine<D> {
    /// Validate `spec` against what the backend needs.
    pub fn new(spec: &MachineSpec, driver: D) -> Result<Self, LayoutError> {
        let layout = MachineLayout::new(spec, &driver.backend(), driver.requirements())?;

        Ok(Self {
            driver,
            layout,
            adapters: AdapterCounter::new(spec.adapter_base),
            rng: spec
                .seed
                .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64),
        })
    }

    pub fn layout(&self) -> &MachineLayout {
        &self.layout
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn into_driver(self) -> D {
        self.driver
    }

    /// Load `profile_name` and apply `template` in a fresh session.
    ///
    /// A missing profile aborts the build; everything after that is reported
    /// per field.
    pub async fn init_fields(
        &mut self,
        store: &ProfileStore,
        profile_name: &str,
        template: &FieldTemplate,
        seed: Option<u64>,
    ) -> Result<BuildReport, BuildError> {
        let profile = store.load(profile_name)?;
        let mut session = match seed {
            Some(seed) => ResolutionSession::seeded(&profile, seed),
            None => ResolutionSession::new(&profile),
        };

        Ok(self.apply_template(&mut session, template).await)
    }

    /// Resolve `template` in `session` and push every field to the driver.
    ///
    /// Neither an unresolvable leaf nor a driver refusal stops the walk; both
    /// end up in the report.
    pub async fn apply_template(
        &mut self,
        session: &mut ResolutionSession<'_>,
        template: &FieldTemplate,
    ) -> BuildReport {
        let mut report = BuildReport::new(
            self.layout.name(),
            session.profile().name(),
            &self.driver.backend(),
        );

        info!(
            machine = %self.layout.name(),
            profile = %session.profile().name(),
            fields = template.leaf_count(),
            "Cloaking machine fields"
        );

        for item in resolver::resolve(session, template) {
            let assignment = match item {
                Ok(assignment) => assignment,
                Err(e) => {
                    warn!("{}", e);
                    report.record_failure(e.path.to_string(), FailureStage::Resolve, &e.source);
                    continue;
                }
            };

            let path = assignment.path.to_string();
            if let Some(reason) = assignment.origin.fallback() {
                report.record_fallback(path.clone(), reason);
            }

            debug!("Setting {:?} to {:?}", path, assignment.value);
            match self.driver.set_field(&path, &assignment.value).await {
                Ok(()) => report.applied += 1,
                Err(e) => {
                    warn!("Driver rejected {}: {}", path, e);
                    report.record_failure(path, FailureStage::Driver, e);
                }
            }
        }

        report.finish(session.chosen_sets().clone());

        info!(
            machine = %report.machine,
            applied = report.applied,
            fallbacks = report.fallbacks.len(),
            failures = report.failures.len(),
            status = ?report.status(),
            "Field cloaking finished"
        );

        report
    }

    /// Next free adapter slot on this machine.
    pub fn network_index(&mut self) -> u32 {
        self.adapters.next_index()
    }

    pub async fn hostonly(&mut self, mac: Option<MacAddress>) -> Result<u32, DriverError> {
        let index = self.network_index();
        self.driver.hostonly(mac, index).await?;
        Ok(index)
    }

    pub async fn bridged(
        &mut self,
        interface: &str,
        mac: Option<MacAddress>,
    ) -> Result<u32, DriverError> {
        let index = self.network_index();
        self.driver.bridged(interface, mac, index).await?;
        Ok(index)
    }

    pub async fn nat(&mut self, mac: Option<MacAddress>) -> Result<u32, DriverError> {
        let index = self.network_index();
        self.driver.nat(mac, index).await?;
        Ok(index)
    }

    /// Attach adapters in order, each on its own slot. Returns the slots used.
    pub async fn attach_adapters(
        &mut self,
        adapters: &[NetworkAdapter],
    ) -> Result<Vec<u32>, DriverError> {
        let mut indices = Vec::with_capacity(adapters.len());
        for adapter in adapters {
            let index = match adapter {
                NetworkAdapter::Hostonly { mac } => self.hostonly(*mac).await?,
                NetworkAdapter::Bridged { interface, mac } => self.bridged(interface, *mac).await?,
                NetworkAdapter::Nat { mac } => self.nat(*mac).await?,
            };
            indices.push(index);
        }
        Ok(indices)
    }

    /// Change the primary MAC address; a random one is generated when `mac` is `None`.
    pub async fn modify_mac(&mut self, mac: Option<MacAddress>) -> Result<MacAddress, DriverError> {
        let mac = mac.unwrap_or_else(|| generator::mac_address(&mut self.rng));
        self.driver.modify_mac(mac).await?;
        Ok(mac)
    }

    pub async fn attach_iso(&mut self) -> Result<(), DriverError> {
        let iso = self.layout.iso_path().to_path_buf();
        self.driver.attach_iso(&iso).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{DirRequirements, DriverCall, DryRunDriver, MockVmDriver};
    use crate::profile::{Profile, PLACEHOLDER};
    use crate::resolver::Fallback;
    use std::fs;
    use tempfile::TempDir;

    fn profile() -> Profile {
        Profile::from_json_str(
            "lab",
            r#"{
                "mobo": [
                    { "vendor": "Acme", "serial": "SERIAL:8" },
                    { "vendor": "Zenith", "serial": "SERIAL:10" }
                ],
                "bios": [ { "vendor": "AMI", "version": "SERIAL:??" } ]
            }"#,
        )
        .unwrap()
    }

    fn template() -> FieldTemplate {
        FieldTemplate::from_json_str(
            r#"{
                "Board": {
                    "Vendor": ["mobo", "vendor"],
                    "Serial": ["mobo", "serial"],
                    "Asset": null
                },
                "Bios": {
                    "Vendor": ["bios", "vendor"],
                    "Version": ["bios", "version"]
                },
                "Chassis": { "Vendor": ["chassis", "vendor"] }
            }"#,
        )
        .unwrap()
    }

    async fn created_machine(driver: DryRunDriver) -> Machine<DryRunDriver> {
        let temp_dir = std::env::temp_dir();
        let spec = MachineSpec {
            temp_dir: Some(temp_dir),
            ..MachineSpec::new("win7")
        };
        let mut machine = Machine::new(&spec, driver).unwrap();
        machine.driver_mut().create_vm().await.unwrap();
        machine
    }

    #[tokio::test]
    async fn test_apply_template_reports_everything() {
        let profile = profile();
        let template = template();
        let driver = DryRunDriver::new("win7").reject_field("Bios/Vendor");
        let mut machine = created_machine(driver).await;
        let mut session = ResolutionSession::seeded(&profile, 11);

        let report = machine.apply_template(&mut session, &template).await;

        // 6 leaves: one bad directive, one driver rejection
        assert_eq!(report.applied, 4);
        assert_eq!(report.status(), BuildStatus::SuccessWithWarnings);

        let mut failed = report.failed_paths();
        failed.sort();
        assert_eq!(failed, vec!["Bios/Vendor", "Bios/Version"]);

        let fallbacks: Vec<(&str, Fallback)> = report
            .fallbacks
            .iter()
            .map(|f| (f.path.as_str(), f.reason))
            .collect();
        assert_eq!(
            fallbacks,
            vec![
                ("Board/Asset", Fallback::TemplateDefault),
                ("Chassis/Vendor", Fallback::MissingCategory),
            ]
        );

        let settings = machine.driver().settings();
        assert_eq!(settings["Chassis/Vendor"], PLACEHOLDER);
        let expected_serial_len = if settings["Board/Vendor"] == "Acme" { 8 } else { 10 };
        assert_eq!(settings["Board/Serial"].len(), expected_serial_len);
        assert!(report.chosen.contains_key("mobo"));
    }

    #[tokio::test]
    async fn test_driver_errors_do_not_abort() {
        let profile = profile();
        let template = FieldTemplate::from_json_str(r#"{ "a": "1", "b": "2", "c": "3" }"#).unwrap();

        let temp_dir = TempDir::new().unwrap();
        let spec = MachineSpec {
            temp_dir: Some(temp_dir.path().to_path_buf()),
            ..MachineSpec::new("win7")
        };

        let mut driver = MockVmDriver::new();
        driver.expect_backend().return_const("mock".to_string());
        driver.expect_requirements().return_const(DirRequirements::default());
        driver
            .expect_set_field()
            .times(3)
            .returning(|path, _| {
                if path == "b" {
                    Err(DriverError::FieldRejected {
                        path: path.to_string(),
                        reason: "read-only".to_string(),
                    })
                } else {
                    Ok(())
                }
            });

        let mut machine = Machine::new(&spec, driver).unwrap();
        let mut session = ResolutionSession::new(&profile);
        let report = machine.apply_template(&mut session, &template).await;

        assert_eq!(report.applied, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].path, "b");
        assert_eq!(report.failures[0].stage, FailureStage::Driver);
        assert_eq!(report.backend, "mock");
    }

    #[tokio::test]
    async fn test_init_fields_missing_profile_is_fatal() {
        let store_dir = TempDir::new().unwrap();
        let store = ProfileStore::new(store_dir.path());
        let mut machine = created_machine(DryRunDriver::new("win7")).await;

        let result = machine.init_fields(&store, "nope", &template(), Some(1)).await;
        assert!(matches!(result, Err(BuildError::Profile(ProfileError::NotFound { .. }))));
    }

    #[tokio::test]
    async fn test_init_fields_is_reproducible_with_seed() {
        let store_dir = TempDir::new().unwrap();
        fs::write(
            store_dir.path().join("lab.json"),
            r#"{
                "mobo": [
                    { "vendor": "Acme", "serial": "SERIAL:8" },
                    { "vendor": "Zenith", "serial": "UUID" }
                ]
            }"#,
        )
        .unwrap();
        let store = ProfileStore::new(store_dir.path());
        let template =
            FieldTemplate::from_json_str(r#"{ "v": ["mobo", "vendor"], "s": ["mobo", "serial"] }"#)
                .unwrap();

        let mut first = created_machine(DryRunDriver::new("a")).await;
        let mut second = created_machine(DryRunDriver::new("b")).await;
        first.init_fields(&store, "lab", &template, Some(77)).await.unwrap();
        second.init_fields(&store, "lab", &template, Some(77)).await.unwrap();

        assert_eq!(first.driver().settings()["v"], second.driver().settings()["v"]);
        assert_eq!(first.driver().settings()["s"], second.driver().settings()["s"]);
    }

    #[tokio::test]
    async fn test_adapters_use_sequential_slots() {
        let spec = MachineSpec {
            adapter_base: 2,
            temp_dir: Some(std::env::temp_dir()),
            ..MachineSpec::new("win7")
        };
        let mut machine = Machine::new(&spec, DryRunDriver::new("win7")).unwrap();
        machine.driver_mut().create_vm().await.unwrap();

        let indices = machine
            .attach_adapters(&[
                NetworkAdapter::Hostonly { mac: None },
                NetworkAdapter::Nat { mac: None },
                NetworkAdapter::Bridged {
                    interface: "eth0".to_string(),
                    mac: None,
                },
            ])
            .await
            .unwrap();

        assert_eq!(indices, vec![2, 3, 4]);
        assert_eq!(machine.network_index(), 5);
        assert!(machine
            .driver()
            .calls()
            .contains(&DriverCall::Nat { mac: None, index: 3 }));
    }

    #[tokio::test]
    async fn test_modify_mac_generates_when_missing() {
        let mut machine = created_machine(DryRunDriver::new("win7")).await;

        let generated = machine.modify_mac(None).await.unwrap();
        assert_eq!(generated.octets()[0] & 0b11, 0);

        let fixed: MacAddress = "08:00:27:00:00:01".parse().unwrap();
        assert_eq!(machine.modify_mac(Some(fixed)).await.unwrap(), fixed);
        assert_eq!(machine.driver().settings()["macaddress1"], "080027000001");
    }

    #[tokio::test]
    async fn test_seeded_machines_generate_same_mac() {
        let spec = MachineSpec {
            seed: Some(2024),
            temp_dir: Some(std::env::temp_dir()),
            ..MachineSpec::new("win7")
        };

        let mut first = Machine::new(&spec, DryRunDriver::new("a")).unwrap();
        let mut second = Machine::new(&spec, DryRunDriver::new("b")).unwrap();
        first.driver_mut().create_vm().await.unwrap();
        second.driver_mut().create_vm().await.unwrap();

        let mac = first.modify_mac(None).await.unwrap();
        assert_eq!(second.modify_mac(None).await.unwrap(), mac);
        assert_ne!(first.modify_mac(None).await.unwrap(), mac);
    }

    #[test]
    fn test_layout_validated_against_driver_requirements() {
        let driver = DryRunDriver::new("win7").with_requirements(DirRequirements {
            vm_dir: true,
            data_dir: false,
        });

        let result = Machine::new(&MachineSpec::new("win7"), driver);
        assert!(matches!(result, Err(LayoutError::MissingVmDir { .. })));
    }

    #[tokio::test]
    async fn test_attach_iso_uses_layout_path() {
        let spec = MachineSpec {
            data_dir: Some("/srv/data".into()),
            ..MachineSpec::new("win7")
        };
        let mut machine = Machine::new(&spec, DryRunDriver::new("win7")).unwrap();
        machine.driver_mut().create_vm().await.unwrap();

        machine.attach_iso().await.unwrap();
        assert_eq!(machine.driver().settings()["dvd"], "/srv/data/win7.iso");
    }
}
