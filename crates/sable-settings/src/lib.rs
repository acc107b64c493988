//! # sable-settings
//!
//! Layered configuration for the sable ORM.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`SableSettings::default()`]
//! 2. **Settings file**: `$SABLE_SETTINGS` or `./sable.json`, deep-merged
//! 3. **Environment variables**: `SABLE_*` overrides

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn re_exports_work() {
        let settings = SableSettings::default();
        assert_eq!(settings.database, DbConfig::default());
        let _path = settings_path();
    }
}
