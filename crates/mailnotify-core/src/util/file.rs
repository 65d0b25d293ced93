//! File helpers.

use std::io;
use std::path::{Path, PathBuf};

/// Upper bound on numbered candidates tried by [`unique_file`].
const MAX_ATTEMPTS: u32 = 10_000;

/// Find a path in `dir` named `name` that doesn't exist yet.
///
/// Tries `name`, then `stem-2.ext`, `stem-3.ext`, and so on. The file is
/// not created.
///
/// # Errors
///
/// Returns `AlreadyExists` if every candidate is taken.
pub fn unique_file(dir: &Path, name: &str) -> io::Result<PathBuf> {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return Ok(candidate);
    }

    let (stem, extension) = match name.rfind('.') {
        Some(dot) if dot > 0 => (&name[..dot], Some(&name[dot + 1..])),
        _ => (name, None),
    };

    for n in 2..MAX_ATTEMPTS {
        let file_name = match extension {
            Some(ext) => format!("{stem}-{n}.{ext}"),
            None => format!("{stem}-{n}"),
        };
        let candidate = dir.join(file_name);
        if !candidate.exists() {
            return Ok(candidate);
        }
    }

    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no free file name for {name} in {}", dir.display()),
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn free_name_is_used_as_is() {
        let dir = tempfile::tempdir().unwrap();
        let path = unique_file(dir.path(), "report.pdf").unwrap();
        assert_eq!(path, dir.path().join("report.pdf"));
    }

    #[test]
    fn taken_names_get_numbered() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("report.pdf"), b"1").unwrap();
        fs::write(dir.path().join("report-2.pdf"), b"2").unwrap();

        let path = unique_file(dir.path(), "report.pdf").unwrap();
        assert_eq!(path, dir.path().join("report-3.pdf"));
    }

    #[test]
    fn names_without_extension() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("README"), b"").unwrap();

        let path = unique_file(dir.path(), "README").unwrap();
        assert_eq!(path, dir.path().join("README-2"));
    }

    #[test]
    fn dotfiles_keep_their_name_as_stem() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".mailrc"), b"").unwrap();

        let path = unique_file(dir.path(), ".mailrc").unwrap();
        assert_eq!(path, dir.path().join(".mailrc-2"));
    }
}
