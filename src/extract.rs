//! Archive member extraction.
//!
//! Archives act as virtual filesystems: `data.zip` can back requests for
//! `data/inner.csv`. Zip archives allow random access by member name; tar
//! archives are scanned sequentially, optionally through a gzip filter, and
//! skipped entries are drained by the entry iterator as it advances.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use zip::ZipArchive;
use zip::result::ZipError;

use crate::loader::LoadError;

/// Container format of an archive loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    Tar { gunzip: bool },
}

/// Archive extensions recognized by the resolver's fallback search, in
/// priority order.
pub(crate) const ARCHIVE_EXTENSIONS: [(&str, ArchiveFormat); 4] = [
    (".zip", ArchiveFormat::Zip),
    (".tar", ArchiveFormat::Tar { gunzip: false }),
    (".tar.gz", ArchiveFormat::Tar { gunzip: true }),
    (".tgz", ArchiveFormat::Tar { gunzip: true }),
];

/// Stream a single member of `archive` into `out`.
pub fn extract_member(
    format: ArchiveFormat,
    archive: &Path,
    member: &str,
    out: &mut dyn Write,
) -> Result<(), LoadError> {
    match format {
        ArchiveFormat::Zip => extract_zip(archive, member, out),
        ArchiveFormat::Tar { gunzip } => extract_tar(archive, member, gunzip, out),
    }
}

fn extract_zip(archive: &Path, member: &str, out: &mut dyn Write) -> Result<(), LoadError> {
    let file = File::open(archive)?;
    let mut zip = ZipArchive::new(file).map_err(|e| LoadError::Io(e.to_string()))?;
    let mut entry = match zip.by_name(member) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => return Err(LoadError::NotFound(member.to_string())),
        Err(e) => return Err(LoadError::Io(e.to_string())),
    };
    io::copy(&mut entry, out)?;
    Ok(())
}

fn extract_tar(
    archive: &Path,
    member: &str,
    gunzip: bool,
    out: &mut dyn Write,
) -> Result<(), LoadError> {
    let file = File::open(archive)?;
    let reader: Box<dyn Read> = if gunzip {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };
    let mut tar = tar::Archive::new(reader);
    for entry in tar.entries()? {
        let mut entry = entry?;
        let matches = entry
            .path()
            .map(|p| p.as_ref() == Path::new(member))
            .unwrap_or(false);
        if matches {
            io::copy(&mut entry, out)?;
            return Ok(());
        }
    }
    Err(LoadError::NotFound(member.to_string()))
}
