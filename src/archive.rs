//! Unpacking of downloaded release artifacts.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use tracing::debug;
use crate::error::{Error, Result};

/// Archive formats recognised by file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    Tar,
    TarGz,
    TarBz2,
    /// A single gzip-compressed file.
    Gz,
    /// A single bzip2-compressed file.
    Bz2,
}

impl ArchiveFormat {
    pub fn detect(file_name: &str) -> Option<Self> {
        let name = file_name.to_ascii_lowercase();
        if name.ends_with(".zip") {
            Some(Self::Zip)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if name.ends_with(".tar.bz2") || name.ends_with(".tbz2") {
            Some(Self::TarBz2)
        } else if name.ends_with(".tar") {
            Some(Self::Tar)
        } else if name.ends_with(".gz") {
            Some(Self::Gz)
        } else if name.ends_with(".bz2") {
            Some(Self::Bz2)
        } else {
            None
        }
    }

    /// Compressed single file rather than a container of entries.
    pub fn is_single_file(self) -> bool {
        matches!(self, Self::Gz | Self::Bz2)
    }
}

/// Whether `file_name` is a compressed single file (`.gz`/`.bz2` without tar).
pub fn is_single_file_compressed(file_name: &str) -> bool {
    ArchiveFormat::detect(file_name).is_some_and(ArchiveFormat::is_single_file)
}

/// Unpacks `archive` into the directory `dest`, or for single-file formats
/// decompresses it to the file `dest`.
pub fn unpack(archive: &Path, dest: &Path) -> Result<()> {
    let file_name = archive
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let format = ArchiveFormat::detect(&file_name).ok_or_else(|| Error::Unpack {
        path: archive.to_path_buf(),
        source: io::Error::new(io::ErrorKind::Unsupported, "unrecognised archive format"),
    })?;
    debug!(archive = %archive.display(), dest = %dest.display(), ?format, "unpacking");

    unpack_format(archive, dest, format).map_err(|source| Error::Unpack {
        path: archive.to_path_buf(),
        source,
    })
}

fn unpack_format(archive: &Path, dest: &Path, format: ArchiveFormat) -> io::Result<()> {
    let reader = BufReader::new(File::open(archive)?);
    match format {
        ArchiveFormat::Zip => {
            std::fs::create_dir_all(dest)?;
            let mut zip = zip::ZipArchive::new(reader).map_err(io::Error::other)?;
            zip.extract(dest).map_err(io::Error::other)
        }
        ArchiveFormat::Tar => untar(reader, dest),
        ArchiveFormat::TarGz => untar(GzDecoder::new(reader), dest),
        ArchiveFormat::TarBz2 => untar(BzDecoder::new(reader), dest),
        ArchiveFormat::Gz => decompress_to(GzDecoder::new(reader), dest),
        ArchiveFormat::Bz2 => decompress_to(BzDecoder::new(reader), dest),
    }
}

fn untar<R: Read>(reader: R, dest: &Path) -> io::Result<()> {
    std::fs::create_dir_all(dest)?;
    tar::Archive::new(reader).unpack(dest)
}

fn decompress_to<R: Read>(mut reader: R, dest: &Path) -> io::Result<()> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut out = File::create(dest)?;
    io::copy(&mut reader, &mut out)?;
    Ok(())
}
