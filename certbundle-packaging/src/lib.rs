// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Build .deb packages bundling a generated PKI and configuration.

This crate assembles self-contained Debian packages that ship a
generated certificate chain (a CA plus signed server and client
certificates) together with a rendered configuration file and the
package's maintainer scripts. It is a build-time library: one call
produces one `.deb`, with no dependency on `dpkg-deb`, `ar`, or any
other system packaging toolchain.

# Determinism

Given the same inputs and a fixed modification time (see
[deb::builder::PackageBuilder::set_mtime]), package assembly is
byte-for-byte reproducible. Both container formats in play are written
in-process: [ar] implements the outer ar container and
[deb::builder::write_tree_tar] produces the nested tar streams, so no
platform tool gets a chance to inject nondeterminism.

# A Tour of Functionality

The outer `.deb` container format is implemented in [ar].
[ar::MemberHeader] encodes the fixed 60 byte member header and
[ar::ArchiveWriter] streams members into any [std::io::Write] sink.
[deb::DebArchive] layers the `.deb` member discipline on top: exactly
`debian-binary`, `control.tar.gz`, and `data.tar.gz`, in that order.

[deb::builder::PackageBuilder] drives a whole build: it creates a
scratch [staging::StagingTree], asks a [certs::CertificateProvider] for
the PKI files, renders configuration and control files through
[templates::TemplateRenderer], produces both gzip-compressed tar
streams, and assembles the final archive. Failures abort the build at
the stage they occur in and leave no partial output behind.

Build inputs are described by [config::PackageConfig], typically loaded
from a YAML file via [config::PackageConfig::from_yaml_path].

Errors from all modules converge on [error::BundleError].
*/

pub mod ar;
pub mod certs;
pub mod config;
pub mod deb;
pub mod error;
pub mod staging;
pub mod templates;
