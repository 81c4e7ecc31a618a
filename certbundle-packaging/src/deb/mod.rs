// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Interfaces for .deb package files.

The .deb file specification lives at
<https://manpages.debian.org/unstable/dpkg-dev/deb.5.en.html>.
*/

pub mod builder;

use {
    crate::{
        ar::ArchiveWriter,
        error::{BundleError, Result},
    },
    std::io::{Read, Write},
};

/// Content of the `debian-binary` format version member.
pub const DEB_FORMAT_VERSION: &[u8] = b"2.0\n";

/// Gzip compress input data from a reader.
pub fn gzip_compress(reader: &mut impl Read) -> Result<Vec<u8>> {
    let header = libflate::gzip::HeaderBuilder::new().finish();

    let mut encoder = libflate::gzip::Encoder::with_options(
        Vec::new(),
        libflate::gzip::EncodeOptions::new().header(header),
    )?;
    std::io::copy(reader, &mut encoder)?;

    Ok(encoder.finish().into_result()?)
}

/// The three members of a binary package, in their one valid order.
///
/// Package installers read the outer ar archive positionally:
/// `debian-binary` first, then `control.tar.gz`, then `data.tar.gz`.
/// Holding the payloads as named slots instead of an ordered list makes
/// a misordered archive unrepresentable.
#[derive(Debug)]
pub struct DebArchive {
    debian_binary: Vec<u8>,
    control_tar_gz: Vec<u8>,
    data_tar_gz: Vec<u8>,
}

impl DebArchive {
    /// Assemble from the two tarball payloads.
    ///
    /// The `debian-binary` member is the fixed format version marker.
    /// Every payload must be non-empty before any archive byte can be
    /// written.
    pub fn new(control_tar_gz: Vec<u8>, data_tar_gz: Vec<u8>) -> Result<Self> {
        let archive = Self {
            debian_binary: DEB_FORMAT_VERSION.to_vec(),
            control_tar_gz,
            data_tar_gz,
        };

        for (name, payload) in archive.members() {
            if payload.is_empty() {
                return Err(BundleError::EmptyArchiveMember(name));
            }
        }

        Ok(archive)
    }

    fn members(&self) -> [(&'static str, &[u8]); 3] {
        [
            ("debian-binary", &self.debian_binary),
            ("control.tar.gz", &self.control_tar_gz),
            ("data.tar.gz", &self.data_tar_gz),
        ]
    }

    /// Serialize the archive to a writer.
    pub fn write_to(&self, writer: impl Write, mtime: u64) -> Result<()> {
        let mut ar_writer = ArchiveWriter::new(writer, mtime);

        for (name, payload) in self.members() {
            ar_writer.append_data(name, payload)?;
        }
        ar_writer.finish()?;

        Ok(())
    }
}
