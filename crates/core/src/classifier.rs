//! Execution-shape classification of resolved modules

use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    /// Spawned as a child process
    Executable,
    /// Loaded through a unit manifest and run inside this process
    InProcess,
}

/// True iff any execute permission bit (owner, group or other) is set,
/// whatever the content.
#[cfg(unix)]
pub fn is_executable_artifact(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    match std::fs::metadata(path) {
        Ok(meta) => meta.is_file() && meta.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

#[cfg(not(unix))]
pub fn is_executable_artifact(_path: &Path) -> bool {
    false
}

pub fn classify(path: &Path) -> ModuleKind {
    if is_executable_artifact(path) {
        ModuleKind::Executable
    } else {
        ModuleKind::InProcess
    }
}

/// Look `program` up on a `PATH`-style search list, returning the first
/// executable match. Programs containing a separator are checked as given.
pub fn which(program: &str, search_paths: &std::ffi::OsStr) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return is_executable_artifact(candidate).then(|| candidate.to_path_buf());
    }

    std::env::split_paths(search_paths)
        .map(|dir| dir.join(program))
        .find(|path| is_executable_artifact(path))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn write_with_mode(dir: &Path, name: &str, contents: &str, mode: u32) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode)).unwrap();
        path
    }

    #[test]
    fn test_executable_bit_decides_regardless_of_content() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();

        let empty_exec = write_with_mode(dir, "a", "", 0o755);
        let full_exec = write_with_mode(dir, "b", "{\"exports\": [\"b\"]}", 0o700);
        let empty_plain = write_with_mode(dir, "c", "", 0o644);
        let script_plain = write_with_mode(dir, "d", "#!/bin/sh\necho hi\n", 0o644);

        assert!(is_executable_artifact(&empty_exec));
        assert!(is_executable_artifact(&full_exec));
        assert!(!is_executable_artifact(&empty_plain));
        assert!(!is_executable_artifact(&script_plain));

        assert_eq!(classify(&full_exec), ModuleKind::Executable);
        assert_eq!(classify(&script_plain), ModuleKind::InProcess);
    }

    #[test]
    fn test_group_or_other_execute_bit_counts() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();

        let group_exec = write_with_mode(dir, "g", "#!/bin/sh\n", 0o610);
        let other_exec = write_with_mode(dir, "o", "#!/bin/sh\n", 0o601);

        assert_eq!(classify(&group_exec), ModuleKind::Executable);
        assert_eq!(classify(&other_exec), ModuleKind::Executable);
    }

    #[test]
    fn test_missing_file_is_not_executable() {
        assert!(!is_executable_artifact(Path::new("/definitely/not/here")));
    }

    #[test]
    fn test_which_finds_first_executable() {
        let temp_dir = TempDir::new().unwrap();
        let first = temp_dir.path().join("first");
        let second = temp_dir.path().join("second");
        std::fs::create_dir_all(&first).unwrap();
        std::fs::create_dir_all(&second).unwrap();
        write_with_mode(&first, "adb", "", 0o644);
        let expected = write_with_mode(&second, "adb", "", 0o755);

        let search = std::env::join_paths([&first, &second]).unwrap();
        assert_eq!(which("adb", &search), Some(expected));
        assert_eq!(which("aapt", &search), None);
    }
}
