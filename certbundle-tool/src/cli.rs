// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    crate::logging::stdout_logger,
    certbundle_packaging::{
        config::PackageConfig, deb::builder::PackageBuilder, error::BundleError,
        templates::TemplateRenderer,
    },
    clap::{Arg, ArgMatches, Command},
    std::path::Path,
    thiserror::Error,
};

const BUILD_ABOUT: &str = "\
Build a certificate bundle package.

Given a package configuration file and a directory of templates, this
command produces a single .deb file in the output directory, named
<name>_<version>_<architecture>.deb.

# YAML Configuration

The configuration file has a `package` section describing the package
and an optional free-form `config` section that is passed through to
the configuration file template:

package:
  name: sample-config-pkg
  version: 1.0.0
  architecture: all
  section: utils
  priority: optional
  maintainer: Packaging Team <packaging@example.com>
  description: Sample configuration bundle
  long_description: Extended description shown by package managers.
  install_path: /opt/sample-config-pkg
  config_name: app.conf
config:
  port: 8443
  log_level: info

# Templates

The template directory must provide Handlebars sources for the
configuration file and the five control files:

  config.conf.hbs
  debian/control.hbs
  debian/preinst.hbs
  debian/postinst.hbs
  debian/postrm.hbs
  debian/triggers.hbs

Rendering is strict: referencing an undefined variable fails the build.

# Certificates

Each build generates a fresh PKI into <install_path>/certs: an RSA-2048
certificate authority plus server and client certificates signed by it.
Private keys are installed with mode 0600 and never leave the package
being built.
";

#[derive(Debug, Error)]
pub enum CbtError {
    #[error("{0}")]
    Bundle(#[from] BundleError),

    #[error("I/O error: {0:?}")]
    Io(#[from] std::io::Error),

    #[error("invalid sub-command: {0}")]
    InvalidSubCommand(String),
}

pub type Result<T> = std::result::Result<T, CbtError>;

pub fn run_cli() -> Result<()> {
    let app = Command::new("Certificate Bundle Tool")
        .version("0.2")
        .author("Gregory Szorc <gregory.szorc@gmail.com>")
        .about("Build .deb packages bundling a PKI and configuration")
        .arg_required_else_help(true);

    let mut app = app.subcommand(
        Command::new("build")
            .about("Build one package from a configuration file")
            .long_about(BUILD_ABOUT)
            .arg(
                Arg::new("config")
                    .short('c')
                    .long("config")
                    .takes_value(true)
                    .default_value("config/package.yaml")
                    .allow_invalid_utf8(true)
                    .help("Path to the package configuration file"),
            )
            .arg(
                Arg::new("templates")
                    .short('t')
                    .long("templates")
                    .takes_value(true)
                    .default_value("templates")
                    .allow_invalid_utf8(true)
                    .help("Path to the templates directory"),
            )
            .arg(
                Arg::new("output-dir")
                    .short('o')
                    .long("output-dir")
                    .takes_value(true)
                    .default_value(".")
                    .allow_invalid_utf8(true)
                    .help("Directory to write the built package to"),
            ),
    );

    let matches = app.clone().get_matches();

    match matches.subcommand() {
        Some(("build", args)) => command_build(args),
        Some((command, _)) => Err(CbtError::InvalidSubCommand(command.to_string())),
        None => {
            app.print_help()?;
            Ok(())
        }
    }
}

fn command_build(args: &ArgMatches) -> Result<()> {
    let config_path = args
        .value_of_os("config")
        .expect("config argument has a default");
    let templates_path = args
        .value_of_os("templates")
        .expect("templates argument has a default");
    let output_dir = args
        .value_of_os("output-dir")
        .expect("output-dir argument has a default");

    let config = PackageConfig::from_yaml_path(Path::new(config_path))?;
    let renderer = TemplateRenderer::from_directory(Path::new(templates_path))?;

    let builder = PackageBuilder::new(config, renderer).set_output_dir(output_dir);

    let logger = stdout_logger();
    let output_path = builder.build(&logger)?;
    let size = std::fs::metadata(&output_path)?.len();

    println!("wrote {} ({} bytes)", output_path.display(), size);

    Ok(())
}
