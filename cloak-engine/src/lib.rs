//! Hardware-fingerprint cloaking engine
//!
//! Resolves a declarative field template against a hardware profile and
//! applies the resulting values to a virtual machine through a
//! backend-agnostic driver, so every sandbox VM presents one consistent,
//! plausible, freshly fabricated hardware identity.

pub mod config;
pub mod driver;
pub mod fields;
pub mod generator;
pub mod machine;
pub mod profile;
pub mod resolver;
pub mod session;
pub mod template;

pub use driver::{DryRunDriver, VmDriver};
pub use machine::{BuildError, BuildReport, BuildStatus, Machine, MachineSpec};
pub use profile::{CandidateSet, Profile, ProfileStore, PLACEHOLDER};
pub use resolver::{Assignment, ValueOrigin};
pub use session::ResolutionSession;
pub use template::{FieldNode, FieldPath, FieldTemplate};
