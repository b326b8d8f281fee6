use crate::models::LicenseRisk;

/// Classify a detected license type into a risk level. Empty means
/// undetected and is [`LicenseRisk::Unknown`].
pub fn classify(license_type: &str) -> LicenseRisk {
    match license_type.trim() {
        // Permissive
        "MIT"
        | "Apache-2.0"
        | "BSD-2-Clause"
        | "BSD-3-Clause"
        | "BSD-4-Clause"
        | "ISC"
        | "0BSD"
        | "Unlicense"
        | "Zlib"
        | "CC0-1.0" => LicenseRisk::Permissive,

        // Weak copyleft
        "LGPL-2.0" | "LGPL-2.1" | "LGPL-3.0" | "MPL-1.1" | "MPL-2.0" | "EPL-1.0" | "EPL-2.0" => {
            LicenseRisk::WeakCopyleft
        }

        // Strong copyleft
        "GPL-1.0" | "GPL-2.0" | "GPL-3.0" | "AGPL-3.0" => LicenseRisk::StrongCopyleft,

        other if other.to_lowercase().contains("proprietary") => LicenseRisk::Proprietary,

        _ => LicenseRisk::Unknown,
    }
}
