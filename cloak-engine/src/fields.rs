//! Built-in field template for VirtualBox-style backends
//!
//! Covers the SMBIOS/DMI tables, the primary IDE disk identity and the ACPI
//! OEM strings, which are the values sandbox checks read first.

use crate::template::{FieldNode, FieldTemplate, TemplateError};

fn r(category: &str, attribute: &str) -> FieldNode {
    FieldNode::reference(category, attribute)
}

fn dmi_config() -> FieldNode {
    FieldNode::branch([
        ("DmiBIOSVendor", r("bios", "vendor")),
        ("DmiBIOSVersion", r("bios", "version")),
        ("DmiBIOSReleaseDate", r("bios", "release_date")),
        ("DmiBIOSReleaseMajor", r("bios", "release_major")),
        ("DmiBIOSReleaseMinor", r("bios", "release_minor")),
        ("DmiBIOSFirmwareMajor", r("bios", "firmware_major")),
        ("DmiBIOSFirmwareMinor", r("bios", "firmware_minor")),
        ("DmiSystemVendor", r("system", "vendor")),
        ("DmiSystemProduct", r("system", "product")),
        ("DmiSystemVersion", r("system", "version")),
        ("DmiSystemSerial", r("system", "serial")),
        ("DmiSystemSKU", r("system", "sku")),
        ("DmiSystemFamily", r("system", "family")),
        ("DmiSystemUuid", r("system", "uuid")),
        ("DmiBoardVendor", r("motherboard", "vendor")),
        ("DmiBoardProduct", r("motherboard", "product")),
        ("DmiBoardVersion", r("motherboard", "version")),
        ("DmiBoardSerial", r("motherboard", "serial")),
        ("DmiBoardAssetTag", r("motherboard", "asset_tag")),
        ("DmiBoardLocInChass", r("motherboard", "location")),
        ("DmiChassisVendor", r("chassis", "vendor")),
        ("DmiChassisVersion", r("chassis", "version")),
        ("DmiChassisSerial", r("chassis", "serial")),
        ("DmiChassisAssetTag", r("chassis", "asset_tag")),
        // hide the hypervisor's own OEM strings
        ("DmiOEMVBoxVer", FieldNode::literal("<EMPTY>")),
        ("DmiOEMVBoxRev", FieldNode::literal("<EMPTY>")),
    ])
}

fn ide_config() -> FieldNode {
    FieldNode::branch([(
        "PrimaryMaster",
        FieldNode::branch([
            ("SerialNumber", r("harddisk", "serial")),
            ("FirmwareRevision", r("harddisk", "revision")),
            ("ModelNumber", r("harddisk", "model")),
        ]),
    )])
}

fn acpi_config() -> FieldNode {
    FieldNode::branch([
        ("AcpiOemId", r("acpi", "oem_id")),
        ("AcpiCreatorId", r("acpi", "creator_id")),
        ("AcpiCreatorRev", r("acpi", "creator_rev")),
    ])
}

fn device(name: &str, config: FieldNode) -> (String, FieldNode) {
    (
        name.to_string(),
        FieldNode::branch([("0", FieldNode::branch([("Config", config)]))]),
    )
}

/// `VBoxInternal/Devices/<device>/0/Config/...` extradata keys.
pub fn virtualbox_template() -> Result<FieldTemplate, TemplateError> {
    FieldTemplate::from_nodes([(
        "VBoxInternal",
        FieldNode::branch([(
            "Devices",
            FieldNode::branch([
                device("pcbios", dmi_config()),
                device("piix3ide", ide_config()),
                device("acpi", acpi_config()),
            ]),
        )]),
    )])
}
