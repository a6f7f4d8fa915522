//! Trailer protocol for locating the embedded archive
//!
//! A built installer is laid out as
//! `[stub bytes][archive bytes][archive length: u64 LE][SFXMAGIC]`.
//! The trailer is always the final 16 bytes, so the stub never needs to know
//! its own size.

use log::{debug, trace};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use super::constants::{LENGTH_FIELD_SIZE, MAGIC_TRAILER, TRAILER_SIZE};
use crate::exceptions::{FormatError, Result};

/// Fixed 16-byte footer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trailer {
    pub archive_len: u64,
}

/// Where the archive sits inside an installer image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveLocation {
    pub start: u64,
    pub len: u64,
    pub total: u64,
}

impl Trailer {
    pub fn new(archive_len: u64) -> Self {
        Self { archive_len }
    }

    /// Encode as length (little-endian) followed by the magic constant
    pub fn pack(&self) -> [u8; TRAILER_SIZE] {
        let mut out = [0u8; TRAILER_SIZE];
        out[..LENGTH_FIELD_SIZE].copy_from_slice(&self.archive_len.to_le_bytes());
        out[LENGTH_FIELD_SIZE..].copy_from_slice(MAGIC_TRAILER);
        out
    }

    /// Decode the final 16 bytes of an image
    pub fn unpack(bytes: &[u8]) -> std::result::Result<Self, FormatError> {
        if bytes.len() != TRAILER_SIZE {
            return Err(FormatError::TooSmall);
        }
        if &bytes[LENGTH_FIELD_SIZE..] != MAGIC_TRAILER {
            return Err(FormatError::MagicMismatch);
        }
        let mut len_bytes = [0u8; LENGTH_FIELD_SIZE];
        len_bytes.copy_from_slice(&bytes[..LENGTH_FIELD_SIZE]);
        Ok(Self {
            archive_len: u64::from_le_bytes(len_bytes),
        })
    }

    /// Validate the decoded length against the image size
    pub fn locate(&self, total: u64) -> std::result::Result<ArchiveLocation, FormatError> {
        let len = self.archive_len;
        if len == 0 || len > total {
            return Err(FormatError::InvalidLength(len));
        }
        let start = total
            .checked_sub(TRAILER_SIZE as u64)
            .and_then(|rest| rest.checked_sub(len))
            .ok_or(FormatError::InvalidStart)?;
        Ok(ArchiveLocation { start, len, total })
    }
}

/// Concatenate stub, archive and trailer into an installer image
pub fn build(stub: &[u8], archive: &[u8]) -> Vec<u8> {
    let trailer = Trailer::new(archive.len() as u64);
    let mut out = Vec::with_capacity(stub.len() + archive.len() + TRAILER_SIZE);
    out.extend_from_slice(stub);
    out.extend_from_slice(archive);
    out.extend_from_slice(&trailer.pack());
    trace!(
        "🧱 Built image: stub={} archive={} total={}",
        stub.len(),
        archive.len(),
        out.len()
    );
    out
}

/// Locate the archive inside an installer file without reading it
pub fn locate(path: &Path) -> Result<ArchiveLocation> {
    let mut file = File::open(path)?;
    locate_in(&mut file)
}

fn locate_in(file: &mut File) -> Result<ArchiveLocation> {
    let total = file.metadata()?.len();
    if total < TRAILER_SIZE as u64 {
        return Err(FormatError::TooSmall.into());
    }

    file.seek(SeekFrom::End(-(TRAILER_SIZE as i64)))?;
    let mut raw = [0u8; TRAILER_SIZE];
    file.read_exact(&mut raw)?;

    let trailer = Trailer::unpack(&raw)?;
    let location = trailer.locate(total)?;
    debug!(
        "📍 Archive located: start={:#x}, len={}, file={} bytes",
        location.start, location.len, location.total
    );
    Ok(location)
}

/// Read the embedded archive from an installer file
pub fn extract(path: &Path) -> Result<Vec<u8>> {
    trace!("🔍 Reading trailer from {path:?}");
    let mut file = File::open(path)?;
    let location = locate_in(&mut file)?;

    file.seek(SeekFrom::Start(location.start))?;
    let mut archive = vec![0u8; location.len as usize];
    file.read_exact(&mut archive)?;
    Ok(archive)
}

/// Same as [`extract`] for an image already in memory
pub fn extract_from_bytes(image: &[u8]) -> std::result::Result<&[u8], FormatError> {
    if image.len() < TRAILER_SIZE {
        return Err(FormatError::TooSmall);
    }
    let trailer = Trailer::unpack(&image[image.len() - TRAILER_SIZE..])?;
    let location = trailer.locate(image.len() as u64)?;
    let start = location.start as usize;
    Ok(&image[start..start + location.len as usize])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exceptions::SfxError;
    use std::fs;
    use tempfile::TempDir;

    fn write_image(dir: &TempDir, bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join("setup.bin");
        fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn test_pack_layout() {
        let packed = Trailer::new(0x0102).pack();
        assert_eq!(&packed[..8], &[0x02, 0x01, 0, 0, 0, 0, 0, 0]);
        assert_eq!(&packed[8..], b"SFXMAGIC");
    }

    #[test]
    fn test_extract_from_file() {
        let dir = TempDir::new().unwrap();
        let stub = vec![0xAB; 100];
        let archive = b"pretend this is gzip".to_vec();
        let path = write_image(&dir, &build(&stub, &archive));

        assert_eq!(extract(&path).unwrap(), archive);
        let location = locate(&path).unwrap();
        assert_eq!(location.start, 100);
        assert_eq!(location.len, archive.len() as u64);
    }

    #[test]
    fn test_empty_stub() {
        let image = build(&[], b"xyz");
        assert_eq!(extract_from_bytes(&image).unwrap(), b"xyz");
    }

    #[test]
    fn test_too_small() {
        let dir = TempDir::new().unwrap();
        let path = write_image(&dir, b"short");
        match extract(&path) {
            Err(SfxError::Format(FormatError::TooSmall)) => {}
            other => panic!("expected TooSmall, got {other:?}"),
        }
        assert_eq!(extract_from_bytes(b"short"), Err(FormatError::TooSmall));
    }

    #[test]
    fn test_wrong_magic() {
        let mut image = build(b"stub", b"archive");
        let last = image.len() - 1;
        image[last] = b'X';
        assert_eq!(extract_from_bytes(&image), Err(FormatError::MagicMismatch));
    }

    #[test]
    fn test_zero_length() {
        let mut image = b"stub".to_vec();
        image.extend_from_slice(&Trailer::new(0).pack());
        assert_eq!(
            extract_from_bytes(&image),
            Err(FormatError::InvalidLength(0))
        );
    }

    #[test]
    fn test_length_larger_than_file() {
        let mut image = b"stub".to_vec();
        image.extend_from_slice(&Trailer::new(10_000).pack());
        assert_eq!(
            extract_from_bytes(&image),
            Err(FormatError::InvalidLength(10_000))
        );
    }

    #[test]
    fn test_length_overlapping_trailer() {
        // Length fits in the file but not in front of the trailer
        let mut image = vec![0u8; 4];
        image.extend_from_slice(&Trailer::new(18).pack());
        assert_eq!(extract_from_bytes(&image), Err(FormatError::InvalidStart));

        let dir = TempDir::new().unwrap();
        let path = write_image(&dir, &image);
        assert!(matches!(
            extract(&path),
            Err(SfxError::Format(FormatError::InvalidStart))
        ));
    }
}
