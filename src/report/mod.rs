//! Report renderers for audit results.
//!
//! - [`terminal`] — colored summary box and dependency table; respects `--verbose` / `--quiet`.
//!
//! JSON output is a direct `serde_json` dump of the dependency records.

pub mod terminal;
