//! License detection and risk classification.
//!
//! - [`detector`] — finds and identifies license files in a package directory.
//! - [`risk`] — maps detected SPDX identifiers to [`LicenseRisk`](crate::models::LicenseRisk).

pub mod detector;
pub mod risk;
