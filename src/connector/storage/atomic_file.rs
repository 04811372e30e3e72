use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::domain::DomainError;

/// Writes `bytes` to a temporary file next to `path`, syncs it, then renames
/// it over `path`. Readers see either the old file or the complete new one.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), DomainError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| DomainError::IoError(e.error))?;

    Ok(())
}
