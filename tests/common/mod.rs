#![cfg(unix)]
#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// A stand-in for git that reports how it was invoked.
const FAKE_GIT: &str = r#"#!/bin/sh
echo "args: $*"
echo "pwd: $(pwd -P)"
echo "GITREPO_FAKE=$GITREPO_FAKE"
case "$2" in
  *fail*) echo "fatal: simulated failure" >&2; exit 3 ;;
esac
"#;

pub fn write_fake_git(dir: &Path) -> PathBuf {
    write_script(dir, "fake-git", FAKE_GIT)
}

/// Writes an executable shell script named `name` into `dir`.
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).expect("Failed to write script");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
        .expect("Failed to make script executable");
    path
}

/// Runs the binary with a clean storage environment rooted in `home`.
pub fn run_gitrepo(home: &Path, fake_git: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_gitrepo"))
        .arg("--git")
        .arg(fake_git)
        .args(args)
        .env("HOME", home)
        .env("TMPDIR", home)
        .env_remove("GITREPO_DIR")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute gitrepo")
}

pub fn stdout_of(output: &Output) -> String {
    String::from_utf8(output.stdout.clone()).expect("Failed to parse stdout")
}

pub fn stderr_of(output: &Output) -> String {
    String::from_utf8(output.stderr.clone()).expect("Failed to parse stderr")
}

/// Extracts the directory the fake git ran in.
pub fn reported_pwd(stdout: &str) -> PathBuf {
    stdout
        .lines()
        .find_map(|line| line.strip_prefix("pwd: "))
        .map(PathBuf::from)
        .expect("fake git did not report its working directory")
}
