pub use download::{download_archive, fetch_archive, Credentials, DownloadError};

mod download;

use std::io::Read;
use std::path::PathBuf;
use thiserror::Error;

/// Substring of the archive entry path which marks the database file
const DATABASE_MARKER: &str = ".mmdb";

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const USTAR_MAGIC: &[u8] = b"ustar";
const USTAR_MAGIC_OFFSET: usize = 257;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Error while reading archive: {0}")]
    Read(#[source] std::io::Error),
    #[error(r#"Error while reading archive entry "{path}": {error}"#)]
    EntryIo {
        path: PathBuf,
        error: std::io::Error,
    },
    #[error(r#"Archive has no file entry with ".mmdb" in its name"#)]
    DatabaseNotFound,
    #[cfg(not(feature = "gzip"))]
    #[error("Archive is gzip-compressed, rebuild with \"gzip\" feature to read it")]
    GzipUnsupported,
}

pub fn is_gzip(buf: &[u8]) -> bool {
    buf.starts_with(&GZIP_MAGIC)
}

/// Check for gzip or POSIX tar magic bytes
pub fn is_archive(buf: &[u8]) -> bool {
    is_gzip(buf)
        || buf
            .get(USTAR_MAGIC_OFFSET..USTAR_MAGIC_OFFSET + USTAR_MAGIC.len())
            .map_or(false, |magic| magic == USTAR_MAGIC)
}

/// Extract the first database file found in a tar or tar.gz archive
pub fn extract_database(archive: &[u8]) -> Result<Vec<u8>, ArchiveError> {
    if is_gzip(archive) {
        #[cfg(feature = "gzip")]
        return find_database(flate2::bufread::GzDecoder::new(archive));
        #[cfg(not(feature = "gzip"))]
        return Err(ArchiveError::GzipUnsupported);
    }
    find_database(archive)
}

fn find_database<R: Read>(reader: R) -> Result<Vec<u8>, ArchiveError> {
    let mut tar_archive = tar::Archive::new(reader);
    for entry in tar_archive.entries().map_err(ArchiveError::Read)? {
        let mut entry = entry.map_err(ArchiveError::Read)?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let path = entry.path().map_err(ArchiveError::Read)?.into_owned();
        if !path.to_string_lossy().contains(DATABASE_MARKER) {
            continue;
        }
        // The header size is not trusted for allocation, a truncated entry is an error
        let mut buf = vec![];
        if let Err(error) = entry.read_to_end(&mut buf) {
            return Err(ArchiveError::EntryIo { path, error });
        }
        if buf.len() as u64 != entry.size() {
            let error = std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("entry is {} bytes, header says {}", buf.len(), entry.size()),
            );
            return Err(ArchiveError::EntryIo { path, error });
        }
        log::debug!(
            r#"found database "{}" in the archive, {} bytes"#,
            path.display(),
            buf.len()
        );
        return Ok(buf);
    }
    Err(ArchiveError::DatabaseNotFound)
}
