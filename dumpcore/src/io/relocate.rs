//! Moving the OS-written core file into the caller's directory.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, error, instrument, warn};

use crate::error::DumpCoreError;

/// Abstraction over core-file relocation, so pipeline tests can observe calls.
pub trait Relocator {
    /// Move `core_path` into `dest_directory`, returning the new path.
    fn relocate(&self, core_path: &Path, dest_directory: &Path) -> Result<PathBuf, DumpCoreError>;
}

/// Filesystem relocator: rename, falling back to copy + delete across devices.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsRelocator;

impl Relocator for FsRelocator {
    fn relocate(&self, core_path: &Path, dest_directory: &Path) -> Result<PathBuf, DumpCoreError> {
        move_core_file(core_path, dest_directory)
    }
}

/// Destination of `core_path` once moved into `dest_directory`.
pub fn destination_for(core_path: &Path, dest_directory: &Path) -> Option<PathBuf> {
    core_path
        .file_name()
        .map(|name| dest_directory.join(name))
}

/// Move `core_path` to `dest_directory/<basename>`, creating the directory first.
///
/// Failures are logged with both paths before being returned.
#[instrument(skip_all, fields(from = %core_path.display(), dest_dir = %dest_directory.display()))]
pub fn move_core_file(core_path: &Path, dest_directory: &Path) -> Result<PathBuf, DumpCoreError> {
    debug!("core dumped at path");
    let Some(dest) = destination_for(core_path, dest_directory) else {
        let err = io::Error::new(io::ErrorKind::InvalidInput, "core path has no file name");
        return Err(report_failure(core_path, dest_directory.to_path_buf(), err));
    };

    if let Err(err) = fs::create_dir_all(dest_directory) {
        return Err(report_failure(core_path, dest, err));
    }

    match fs::rename(core_path, &dest) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::CrossesDevices => {
            debug!("rename crosses devices, copying instead");
            if let Err(err) = copy_then_remove(core_path, &dest) {
                return Err(report_failure(core_path, dest, err));
            }
        }
        Err(err) => return Err(report_failure(core_path, dest, err)),
    }

    debug!(to = %dest.display(), "core file moved");
    Ok(dest)
}

/// Copy into a hidden sibling of `dest`, rename it into place, then drop the source.
///
/// A failed copy or rename leaves no partial file behind. If only the final
/// removal fails, the core exists at both paths and the error is still returned.
fn copy_then_remove(src: &Path, dest: &Path) -> io::Result<()> {
    let tmp = partial_path(dest);
    if let Err(err) = fs::copy(src, &tmp).and_then(|_| fs::rename(&tmp, dest)) {
        if let Err(cleanup) = fs::remove_file(&tmp) {
            debug!(err = %cleanup, "no partial copy to clean up");
        }
        return Err(err);
    }
    fs::remove_file(src).inspect_err(|err| {
        warn!(
            from = %src.display(),
            to = %dest.display(),
            err = %err,
            "core copied to destination but source could not be removed"
        );
    })
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(dest.file_name().unwrap_or_default());
    name.push(".partial");
    dest.with_file_name(name)
}

fn report_failure(from: &Path, to: PathBuf, source: io::Error) -> DumpCoreError {
    error!(
        from = %from.display(),
        to = %to.display(),
        err = %source,
        "error when moving core file"
    );
    DumpCoreError::Relocation {
        from: from.to_path_buf(),
        to,
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_core(dir: &Path, name: &str) -> PathBuf {
        fs::create_dir_all(dir).expect("create core dir");
        let path = dir.join(name);
        fs::write(&path, b"\x7fELF core").expect("write core");
        path
    }

    #[test]
    fn moves_into_new_nested_directory() {
        let temp = tempfile::tempdir().expect("tempdir");
        let core = write_core(&temp.path().join("cores"), "core.4321.node");
        let dest_dir = temp.path().join("a").join("b").join("c");

        let dest = move_core_file(&core, &dest_dir).expect("move");

        assert_eq!(dest, dest_dir.join("core.4321.node"));
        assert!(!core.exists());
        assert_eq!(fs::read(&dest).expect("read dest"), b"\x7fELF core");
    }

    #[test]
    fn existing_directory_is_reused() {
        let temp = tempfile::tempdir().expect("tempdir");
        let dest_dir = temp.path().join("dest");
        fs::create_dir_all(&dest_dir).expect("pre-create");

        let first = write_core(&temp.path().join("cores"), "core.1");
        move_core_file(&first, &dest_dir).expect("first move");
        let second = write_core(&temp.path().join("cores"), "core.2");
        move_core_file(&second, &dest_dir).expect("second move");

        assert!(dest_dir.join("core.1").exists());
        assert!(dest_dir.join("core.2").exists());
    }

    #[test]
    fn missing_source_reports_both_paths() {
        let temp = tempfile::tempdir().expect("tempdir");
        let core = temp.path().join("cores").join("core.77");
        let dest_dir = temp.path().join("dest");

        let err = move_core_file(&core, &dest_dir).unwrap_err();
        match err {
            DumpCoreError::Relocation { from, to, source } => {
                assert_eq!(from, core);
                assert_eq!(to, dest_dir.join("core.77"));
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("unexpected error: {other}"),
        }
        // Directory creation happens before the move is attempted.
        assert!(dest_dir.is_dir());
    }

    #[test]
    fn dest_directory_blocked_by_file_fails() {
        let temp = tempfile::tempdir().expect("tempdir");
        let core = write_core(&temp.path().join("cores"), "core.5");
        let blocker = temp.path().join("blocker");
        fs::write(&blocker, b"not a dir").expect("write blocker");

        let err = move_core_file(&core, &blocker.join("dest")).unwrap_err();
        assert!(matches!(err, DumpCoreError::Relocation { .. }));
        assert!(core.exists());
    }

    #[test]
    fn path_without_file_name_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = move_core_file(Path::new("/"), temp.path()).unwrap_err();
        assert!(matches!(err, DumpCoreError::Relocation { .. }));
    }

    #[test]
    fn copy_fallback_moves_file_and_cleans_up() {
        let temp = tempfile::tempdir().expect("tempdir");
        let core = write_core(&temp.path().join("cores"), "core.9");
        let dest_dir = temp.path().join("dest");
        fs::create_dir_all(&dest_dir).expect("dest dir");
        let dest = dest_dir.join("core.9");

        copy_then_remove(&core, &dest).expect("copy");

        assert!(!core.exists());
        assert!(dest.exists());
        assert!(!partial_path(&dest).exists());
    }

    #[test]
    fn failed_rename_into_place_removes_partial_copy() {
        let temp = tempfile::tempdir().expect("tempdir");
        let core = write_core(&temp.path().join("cores"), "core.9");
        let dest_dir = temp.path().join("dest");
        // A non-empty directory at the final path makes the rename fail.
        let dest = dest_dir.join("core.9");
        fs::create_dir_all(dest.join("occupied")).expect("blocking dir");

        let err = copy_then_remove(&core, &dest);

        assert!(err.is_err());
        assert!(!partial_path(&dest).exists());
        assert!(core.exists());
        assert!(dest.is_dir());
    }

    #[test]
    fn partial_path_is_hidden_sibling() {
        let dest = Path::new("/dest/core.9");
        assert_eq!(partial_path(dest), PathBuf::from("/dest/.core.9.partial"));
    }
}
