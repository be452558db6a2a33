use assert_cmd::Command;
use assert_fs::TempDir;
use bit_merge::areas::database::Database;
use rstest::fixture;
use std::path::Path;

/// A temp dir holding an empty `.git/objects`
#[fixture]
pub fn repository_dir() -> TempDir {
    let dir = TempDir::new().expect("Failed to create temp dir");
    std::fs::create_dir_all(dir.path().join(".git").join("objects"))
        .expect("Failed to create object database");
    dir
}

pub fn database(dir: &Path) -> Database {
    Database::new(dir.join(".git").join("objects").into_boxed_path())
}

pub fn run_bit_merge_command(dir: &Path, args: &[&str]) -> Command {
    let mut cmd = Command::cargo_bin("bit-merge").expect("Failed to find bit-merge binary");
    cmd.current_dir(dir)
        .env_remove("BIT_MERGE_FF")
        .env_remove("GIT_AUTHOR_NAME")
        .env_remove("GIT_AUTHOR_EMAIL")
        .env_remove("GIT_AUTHOR_DATE")
        .args(args);
    cmd
}

/// Point a branch at a commit, the way `git branch` would on disk
pub fn write_branch(dir: &Path, name: &str, oid: &str) {
    let path = dir.join(".git").join("refs").join("heads").join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create refs directory");
    }
    std::fs::write(path, format!("{}\n", oid)).expect("Failed to write branch");
}
