use config::{Config, Environment, File};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Environment variable selecting an optional overlay file (`<name>.yaml`).
pub const ENVIRONMENT_VAR: &str = "APP_ENVIRONMENT";

/// Resolve the `config/` directory of a crate.
///
/// Binaries are started either from the crate directory or from the
/// workspace root, so both layouts are accepted.
pub fn configuration_directory(base_path: &Path, crate_name: &str) -> PathBuf {
    if base_path.ends_with(crate_name) {
        base_path.join("config")
    } else {
        base_path.join(crate_name).join("config")
    }
}

/// Load settings from `base.yaml`, an optional environment overlay, and
/// `APP_`-prefixed environment variables (`APP_API__BASE_URL=...`).
pub fn load_configuration<T: DeserializeOwned>(
    configuration_directory: &Path,
) -> Result<T, config::ConfigError> {
    let mut builder = Config::builder()
        .add_source(File::from(configuration_directory.join("base.yaml")).required(true));

    if let Ok(environment) = std::env::var(ENVIRONMENT_VAR) {
        builder = builder.add_source(
            File::from(configuration_directory.join(format!("{}.yaml", environment)))
                .required(false),
        );
    }

    let settings = builder
        .add_source(
            Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    settings.try_deserialize::<T>()
}
