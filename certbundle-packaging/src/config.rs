// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Package build configuration. */

use {
    crate::error::{BundleError, Result},
    serde::{Deserialize, Serialize},
    std::path::Path,
};

fn default_section() -> String {
    "utils".to_string()
}

fn default_priority() -> String {
    "optional".to_string()
}

/// Metadata describing the package under construction.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PackageMetadata {
    pub name: String,
    pub version: String,
    pub architecture: String,
    #[serde(default = "default_section")]
    pub section: String,
    #[serde(default = "default_priority")]
    pub priority: String,
    pub maintainer: String,
    pub description: String,
    #[serde(default)]
    pub long_description: String,
    /// Absolute path the bundle installs under, e.g. `/opt/my-bundle`.
    pub install_path: String,
    /// File name of the rendered configuration file.
    pub config_name: String,
}

/// Top-level build configuration, usually loaded from a YAML file.
///
/// The `config` table is free form; it is passed through verbatim as
/// the `config` variable of the configuration file template.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PackageConfig {
    pub package: PackageMetadata,
    #[serde(default)]
    pub config: serde_yaml::Mapping,
}

impl PackageConfig {
    /// Load and validate a configuration from a YAML file.
    pub fn from_yaml_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        let config: Self = serde_yaml::from_reader(file)?;
        config.validate()?;

        Ok(config)
    }

    /// Validate field level requirements.
    pub fn validate(&self) -> Result<()> {
        let package = &self.package;

        for (field, value) in [
            ("package.name", &package.name),
            ("package.version", &package.version),
            ("package.architecture", &package.architecture),
            ("package.maintainer", &package.maintainer),
            ("package.install_path", &package.install_path),
            ("package.config_name", &package.config_name),
        ] {
            if value.trim().is_empty() {
                return Err(BundleError::Config(format!("{} must not be empty", field)));
            }
        }

        if !package.install_path.starts_with('/') {
            return Err(BundleError::Config(format!(
                "package.install_path must be absolute: {}",
                package.install_path
            )));
        }

        if package.config_name.contains('/') {
            return Err(BundleError::Config(format!(
                "package.config_name must be a bare file name: {}",
                package.config_name
            )));
        }

        Ok(())
    }

    /// Output file name, `<name>_<version>_<architecture>.deb`.
    pub fn deb_filename(&self) -> String {
        format!(
            "{}_{}_{}.deb",
            self.package.name, self.package.version, self.package.architecture
        )
    }
}
