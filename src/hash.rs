//! Checksum verification of downloaded artifacts.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;
use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use crate::error::{Error, Result};

/// Supported digest algorithms, strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgo {
    Sha256,
    Sha1,
    Md5,
}

impl HashAlgo {
    /// Lookup order used when several checksums are listed.
    pub const PREFERENCE: [HashAlgo; 3] = [HashAlgo::Sha256, HashAlgo::Sha1, HashAlgo::Md5];

    pub fn name(self) -> &'static str {
        match self {
            HashAlgo::Sha256 => "sha256",
            HashAlgo::Sha1 => "sha1",
            HashAlgo::Md5 => "md5",
        }
    }

    /// Field holding this checksum in OS/arch data, e.g. `sha256sum`.
    pub fn field(self) -> &'static str {
        match self {
            HashAlgo::Sha256 => "sha256sum",
            HashAlgo::Sha1 => "sha1sum",
            HashAlgo::Md5 => "md5sum",
        }
    }
}

/// Expected checksum picked from OS/arch data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checksum {
    pub algo: HashAlgo,
    pub expected: String,
}

/// Picks the strongest checksum present, or `None` when there is nothing to verify.
pub fn select_checksum(os_arch_data: &BTreeMap<String, String>) -> Option<Checksum> {
    HashAlgo::PREFERENCE.into_iter().find_map(|algo| {
        os_arch_data
            .get(algo.field())
            .filter(|v| !v.trim().is_empty())
            .map(|expected| Checksum {
                algo,
                expected: expected.trim().to_ascii_lowercase(),
            })
    })
}

/// Lowercase hex digest of the file at `path`.
pub fn hash_file(algo: HashAlgo, path: &Path) -> io::Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let digest = match algo {
        HashAlgo::Sha256 => digest_reader::<Sha256>(&mut reader)?,
        HashAlgo::Sha1 => digest_reader::<Sha1>(&mut reader)?,
        HashAlgo::Md5 => digest_reader::<Md5>(&mut reader)?,
    };
    Ok(digest)
}

fn digest_reader<D: Digest + io::Write>(reader: &mut impl io::Read) -> io::Result<String> {
    let mut hasher = D::new();
    io::copy(reader, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Verifies `path` against the strongest checksum in `os_arch_data`.
///
/// No checksum at all is allowed and only logged. A mismatch is
/// [`Error::HashMismatch`].
pub fn verify_file(os_arch_data: &BTreeMap<String, String>, path: &Path) -> Result<()> {
    let Some(checksum) = select_checksum(os_arch_data) else {
        warn!(path = %path.display(), "no checksums found, skipping validation");
        return Ok(());
    };
    let hash = hash_file(checksum.algo, path)?;
    if hash != checksum.expected {
        return Err(Error::HashMismatch {
            algo: checksum.algo.name().to_string(),
            checksum: checksum.expected,
            hash,
        });
    }
    debug!(algo = checksum.algo.name(), %hash, "checksum verified");
    Ok(())
}
