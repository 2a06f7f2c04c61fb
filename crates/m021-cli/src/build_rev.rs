//! Revision stamping helpers shared by `build.rs`.

use std::path::{Path, PathBuf};
use std::process::Command;

/// `HEAD`, the ref it points at and `packed-refs`, whichever exist.
///
/// Missing files are never watched, so a tree without `.git` is not rebuilt
/// on every invocation.
pub fn watched_git_files(git_dir: &Path) -> Vec<PathBuf> {
    let head = git_dir.join("HEAD");
    let Ok(contents) = std::fs::read_to_string(&head) else {
        return Vec::new();
    };

    let mut files = vec![head];
    if let Some(reference) = contents.trim().strip_prefix("ref: ") {
        files.push(git_dir.join(reference));
    }
    files.push(git_dir.join("packed-refs"));
    files.retain(|p| p.exists());
    files
}

/// Short hash of `HEAD`, if git is available and this is a checkout.
#[cfg_attr(test, allow(dead_code))]
pub fn git_revision() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let rev = String::from_utf8(output.stdout).ok()?.trim().to_string();
    (!rev.is_empty()).then_some(rev)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_watches_head_and_branch_ref() {
        let git = tempfile::tempdir().unwrap();
        fs::write(git.path().join("HEAD"), "ref: refs/heads/main\n").unwrap();
        fs::create_dir_all(git.path().join("refs/heads")).unwrap();
        fs::write(git.path().join("refs/heads/main"), "0123abcd\n").unwrap();

        let files = watched_git_files(git.path());
        assert_eq!(
            files,
            vec![git.path().join("HEAD"), git.path().join("refs/heads/main")]
        );
    }

    #[test]
    fn test_watches_packed_refs_when_ref_is_packed() {
        let git = tempfile::tempdir().unwrap();
        fs::write(git.path().join("HEAD"), "ref: refs/heads/main\n").unwrap();
        fs::write(git.path().join("packed-refs"), "0123abcd refs/heads/main\n").unwrap();

        let files = watched_git_files(git.path());
        assert_eq!(
            files,
            vec![git.path().join("HEAD"), git.path().join("packed-refs")]
        );
    }

    #[test]
    fn test_detached_head_watches_head_only() {
        let git = tempfile::tempdir().unwrap();
        fs::write(git.path().join("HEAD"), "0123abcd0123abcd\n").unwrap();

        assert_eq!(watched_git_files(git.path()), vec![git.path().join("HEAD")]);
    }

    #[test]
    fn test_missing_git_dir_watches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(watched_git_files(&dir.path().join(".git")).is_empty());
    }
}
