// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Writing ar archives.

A `.deb` file is an archive in the common ar flavor: the 8 byte magic
`!<arch>\n` followed by members, each a fixed 60 byte header and the raw
payload. Header fields are left justified ASCII text, space padded out
to the next field boundary. Members whose payload has an odd length are
followed by a single `\n` so every header starts on an even offset.

The format is simple enough that reimplementing it beats shelling out to
a system `ar`: output is identical on every platform and each field rule
is unit testable in isolation.
*/

use {
    crate::error::{BundleError, Result},
    std::io::{Read, Write},
};

/// Magic bytes opening every archive.
pub const AR_MAGIC: &[u8; 8] = b"!<arch>\n";

/// Encoded size of a member header.
pub const HEADER_SIZE: usize = 60;

const NAME_WIDTH: usize = 16;

/// Header metadata for a single archive member.
///
/// Field values mirror what `dpkg-deb` emits: uid and gid 0 and mode
/// `100644` regardless of any source file's metadata. Names longer than
/// 16 bytes are truncated when encoded; the common ar flavor has no
/// long name mechanism and the truncation is not recoverable from the
/// archive. `.deb` member names are all well under the limit.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MemberHeader {
    pub name: String,
    pub mtime: u64,
    pub uid: u32,
    pub gid: u32,
    pub mode: u32,
    pub size: u64,
}

impl MemberHeader {
    pub fn new(name: impl ToString, size: u64, mtime: u64) -> Self {
        Self {
            name: name.to_string(),
            mtime,
            uid: 0,
            gid: 0,
            mode: 0o100644,
            size,
        }
    }

    /// Encode to the fixed 60 byte wire form.
    ///
    /// Numeric fields whose text form does not fit their fixed width
    /// fail with [BundleError::ArFieldOverflow]; the name field instead
    /// truncates.
    pub fn encode(&self) -> Result<[u8; HEADER_SIZE]> {
        let mut header = [b' '; HEADER_SIZE];

        let mut name = self.name.as_bytes();
        if name.len() > NAME_WIDTH {
            name = &name[0..NAME_WIDTH];
        }
        header[0..name.len()].copy_from_slice(name);

        put_text(&mut header[16..28], "mtime", &self.mtime.to_string())?;
        put_text(&mut header[28..34], "uid", &self.uid.to_string())?;
        put_text(&mut header[34..40], "gid", &self.gid.to_string())?;
        put_text(&mut header[40..48], "mode", &format!("{:o}", self.mode))?;
        put_text(&mut header[48..58], "size", &self.size.to_string())?;

        header[58] = b'`';
        header[59] = b'\n';

        Ok(header)
    }
}

fn put_text(slot: &mut [u8], field: &'static str, value: &str) -> Result<()> {
    let bytes = value.as_bytes();

    if bytes.len() > slot.len() {
        return Err(BundleError::ArFieldOverflow {
            field,
            value: value.to_string(),
        });
    }

    slot[0..bytes.len()].copy_from_slice(bytes);

    Ok(())
}

/// Streaming writer for an ar archive.
///
/// Members are emitted in append order. Every member shares the
/// modification time given at construction, so fixed inputs plus a
/// fixed time produce byte identical archives.
pub struct ArchiveWriter<W: Write> {
    writer: W,
    mtime: u64,
    wrote_magic: bool,
}

impl<W: Write> ArchiveWriter<W> {
    pub fn new(writer: W, mtime: u64) -> Self {
        Self {
            writer,
            mtime,
            wrote_magic: false,
        }
    }

    fn write_magic(&mut self) -> Result<()> {
        if !self.wrote_magic {
            self.writer.write_all(AR_MAGIC)?;
            self.wrote_magic = true;
        }

        Ok(())
    }

    /// Append a member from an in-memory payload.
    pub fn append_data(&mut self, name: &str, data: &[u8]) -> Result<()> {
        self.write_magic()?;

        let header = MemberHeader::new(name, data.len() as u64, self.mtime);
        self.writer.write_all(&header.encode()?)?;
        self.writer.write_all(data)?;
        self.pad(data.len() as u64)
    }

    /// Append a member from a reader of known size.
    ///
    /// The header is written up front with `size`, so a reader that
    /// yields a different number of bytes fails after the copy.
    pub fn append_reader(&mut self, name: &str, size: u64, reader: &mut impl Read) -> Result<()> {
        self.write_magic()?;

        let header = MemberHeader::new(name, size, self.mtime);
        self.writer.write_all(&header.encode()?)?;

        let copied = std::io::copy(reader, &mut self.writer)?;
        if copied != size {
            return Err(BundleError::ArMemberSizeMismatch {
                name: name.to_string(),
                expected: size,
                actual: copied,
            });
        }

        self.pad(size)
    }

    fn pad(&mut self, size: u64) -> Result<()> {
        if size % 2 != 0 {
            self.writer.write_all(b"\n")?;
        }

        Ok(())
    }

    /// Finish the archive, returning the underlying writer.
    ///
    /// An archive with no members is still valid; this makes sure the
    /// magic was written.
    pub fn finish(mut self) -> Result<W> {
        self.write_magic()?;

        Ok(self.writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_field_layout() -> Result<()> {
        let header = MemberHeader::new("debian-binary", 4, 1234567890).encode()?;

        assert_eq!(&header[0..16], b"debian-binary   ");
        assert_eq!(&header[16..28], b"1234567890  ");
        assert_eq!(&header[28..34], b"0     ");
        assert_eq!(&header[34..40], b"0     ");
        assert_eq!(&header[40..48], b"100644  ");
        assert_eq!(&header[48..58], b"4         ");
        assert_eq!(&header[58..60], b"`\n");

        Ok(())
    }

    #[test]
    fn test_name_truncated_to_16_bytes() -> Result<()> {
        let header = MemberHeader::new("a-very-long-member-name", 0, 0).encode()?;

        assert_eq!(&header[0..16], b"a-very-long-memb");

        Ok(())
    }

    #[test]
    fn test_numeric_field_overflow() {
        // 13 decimal digits cannot fit the 12 byte mtime field.
        let err = MemberHeader::new("m", 0, 1_000_000_000_000)
            .encode()
            .unwrap_err();
        assert!(matches!(
            err,
            BundleError::ArFieldOverflow { field: "mtime", .. }
        ));

        // 11 digits cannot fit the 10 byte size field.
        let err = MemberHeader::new("m", 10_000_000_000, 0)
            .encode()
            .unwrap_err();
        assert!(matches!(
            err,
            BundleError::ArFieldOverflow { field: "size", .. }
        ));
    }

    #[test]
    fn test_odd_payload_padded() -> Result<()> {
        let mut writer = ArchiveWriter::new(Vec::new(), 0);
        writer.append_data("odd", b"12345")?;
        let buffer = writer.finish()?;

        assert_eq!(buffer.len(), 8 + HEADER_SIZE + 5 + 1);
        assert_eq!(buffer[buffer.len() - 1], b'\n');

        Ok(())
    }

    #[test]
    fn test_even_payload_not_padded() -> Result<()> {
        let mut writer = ArchiveWriter::new(Vec::new(), 0);
        writer.append_data("even", b"1234")?;
        let buffer = writer.finish()?;

        assert_eq!(buffer.len(), 8 + HEADER_SIZE + 4);
        assert_eq!(&buffer[buffer.len() - 4..], b"1234");

        Ok(())
    }

    #[test]
    fn test_total_length_property() -> Result<()> {
        let members: Vec<(&str, Vec<u8>)> = vec![
            ("debian-binary", b"2.0\n".to_vec()),
            ("control.tar.gz", vec![0xff; 137]),
            ("data.tar.gz", vec![0x00; 4096]),
        ];

        let mut writer = ArchiveWriter::new(Vec::new(), 42);
        for (name, payload) in &members {
            writer.append_data(name, payload)?;
        }
        let buffer = writer.finish()?;

        let expected: usize = 8 + members
            .iter()
            .map(|(_, payload)| HEADER_SIZE + payload.len() + payload.len() % 2)
            .sum::<usize>();
        assert_eq!(buffer.len(), expected);

        Ok(())
    }

    #[test]
    fn test_fixed_mtime_is_reproducible() -> Result<()> {
        let write = || -> Result<Vec<u8>> {
            let mut writer = ArchiveWriter::new(Vec::new(), 1234567890);
            writer.append_data("first", b"hello")?;
            writer.append_data("second", b"world!")?;
            writer.finish()
        };

        assert_eq!(write()?, write()?);

        Ok(())
    }

    #[test]
    fn test_append_reader_size_mismatch() {
        let mut writer = ArchiveWriter::new(Vec::new(), 0);
        let err = writer
            .append_reader("short", 10, &mut std::io::Cursor::new(b"abc"))
            .unwrap_err();

        assert!(matches!(
            err,
            BundleError::ArMemberSizeMismatch {
                expected: 10,
                actual: 3,
                ..
            }
        ));
    }

    #[test]
    fn test_round_trip_with_ar_reader() -> Result<()> {
        let members: Vec<(&str, &[u8])> = vec![
            ("debian-binary", b"2.0\n"),
            ("control.tar.gz", b"control bytes"),
            ("data.tar.gz", b"data bytes longer than the others"),
        ];

        let mut writer = ArchiveWriter::new(Vec::new(), 1000000000);
        for (name, payload) in &members {
            writer.append_data(name, payload)?;
        }
        let buffer = writer.finish()?;

        let mut archive = ar::Archive::new(std::io::Cursor::new(buffer));

        for (name, payload) in &members {
            let mut entry = archive.next_entry().unwrap().unwrap();
            assert_eq!(entry.header().identifier(), name.as_bytes());
            assert_eq!(entry.header().mtime(), 1000000000);
            assert_eq!(entry.header().uid(), 0);
            assert_eq!(entry.header().gid(), 0);

            let mut data = vec![];
            entry.read_to_end(&mut data)?;
            assert_eq!(&data, payload);
        }

        assert!(archive.next_entry().is_none());

        Ok(())
    }
}
