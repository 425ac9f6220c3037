//! Content codec: a named-file map stored as one gzip-compressed tar.
//!
//! [`write_tar_from_map`] streams entries straight into `<dest>.tmp` and then
//! renames over `dest`, so a reader never sees a half-written archive.
//! [`read_tar_to_map`] reads every regular-file entry; directory and other
//! non-file entries are skipped. Any malformed input fails the whole read.
//!
//! Entry names are stored byte for byte, never as filesystem paths: keys
//! such as `"logging//a.p"`, `"/x.p"` or `"a/../b.p"` come back unchanged.
//! Names that do not fit the 100-byte header field go through a GNU
//! long-name entry.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::{archive_err, io_err, SyncError};

/// Encode `files` as a `.tar.gz` at `dest`, replacing any previous archive.
pub fn write_tar_from_map(files: &HashMap<String, String>, dest: &Path) -> Result<(), SyncError> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }

    let tmp = PathBuf::from(format!("{}.tmp", dest.display()));
    if let Err(err) = write_archive(files, &tmp) {
        let _ = std::fs::remove_file(&tmp);
        return Err(err);
    }
    if let Err(e) = std::fs::rename(&tmp, dest) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(dest, e));
    }
    tracing::debug!("wrote archive with {} entries: {}", files.len(), dest.display());
    Ok(())
}

fn write_archive(files: &HashMap<String, String>, path: &Path) -> Result<(), SyncError> {
    let file = File::create(path).map_err(|e| io_err(path, e))?;
    let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    let mut builder = tar::Builder::new(encoder);

    let mtime = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();

    for (name, content) in files {
        append_entry(&mut builder, name, content, mtime).map_err(|e| io_err(path, e))?;
    }

    let encoder = builder.into_inner().map_err(|e| io_err(path, e))?;
    let mut writer = encoder.finish().map_err(|e| io_err(path, e))?;
    writer.flush().map_err(|e| io_err(path, e))?;
    Ok(())
}

const LONG_LINK_NAME: &[u8] = b"././@LongLink";

/// Append one regular file whose header name is exactly the bytes of `name`.
fn append_entry<W: Write>(
    builder: &mut tar::Builder<W>,
    name: &str,
    content: &str,
    mtime: u64,
) -> io::Result<()> {
    let name = name.as_bytes();
    let mut header = tar::Header::new_gnu();
    let field_len = header.as_old().name.len();

    if name.len() > field_len || name.contains(&0) {
        let mut long = tar::Header::new_gnu();
        long.as_old_mut().name[..LONG_LINK_NAME.len()].copy_from_slice(LONG_LINK_NAME);
        long.set_entry_type(tar::EntryType::GNULongName);
        long.set_size(name.len() as u64 + 1);
        long.set_mode(0o644);
        long.set_uid(0);
        long.set_gid(0);
        long.set_mtime(0);
        long.set_cksum();
        builder.append(&long, name.chain(io::repeat(0).take(1)))?;
    }

    let stored = name.len().min(field_len);
    header.as_old_mut().name[..stored].copy_from_slice(&name[..stored]);
    header.set_entry_type(tar::EntryType::Regular);
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_uid(0);
    header.set_gid(0);
    header.set_mtime(mtime);
    header.set_cksum();
    builder.append(&header, content.as_bytes())
}

/// Decode the `.tar.gz` at `src` into `entry name → content`.
pub fn read_tar_to_map(src: &Path) -> Result<HashMap<String, String>, SyncError> {
    let file = File::open(src).map_err(|e| io_err(src, e))?;
    let mut archive = tar::Archive::new(GzDecoder::new(BufReader::new(file)));

    let mut out = HashMap::new();
    for entry in archive.entries().map_err(|e| archive_err(src, e))? {
        let mut entry = entry.map_err(|e| archive_err(src, e))?;
        if !entry.header().entry_type().is_file() {
            continue;
        }

        let name = String::from_utf8(entry.path_bytes().into_owned()).map_err(|e| {
            SyncError::NonUtf8Entry {
                name: String::from_utf8_lossy(e.as_bytes()).into_owned(),
            }
        })?;

        let mut body = Vec::new();
        entry
            .read_to_end(&mut body)
            .map_err(|e| archive_err(src, e))?;
        let content =
            String::from_utf8(body).map_err(|_| SyncError::NonUtf8Entry { name: name.clone() })?;
        out.insert(name, content);
    }
    Ok(out)
}
