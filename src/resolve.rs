use crate::{
    error::{AppResult, UserError},
    target::TargetRef,
};
use rand::RngCore;
use std::{
    fs, io,
    path::{Path, PathBuf},
};

/// How many random names `allocate_temp_path` tries before giving up.
pub const DEFAULT_TEMP_ATTEMPTS: u32 = 1000;

/// Creates `root/host[/port]/path` for a persistent clone and returns it.
///
/// The same root and target always map to the same directory, so repeated
/// clones of one URL land in one place. A `host:port` pair becomes two path
/// segments because `:` is not a valid path component everywhere.
#[tracing::instrument(skip_all, fields(root = %root.display(), url = %target.raw))]
pub fn resolve_persistent_path(root: &Path, target: &TargetRef) -> AppResult<PathBuf> {
    let path = persistent_path(root, target)?;
    fs::create_dir_all(&path).map_err(|source| UserError::CreateDirFailed {
        path: path.clone(),
        source,
    })?;
    tracing::debug!(path = %path.display(), "Ensured persistent clone directory exists");
    Ok(path)
}

/// Computes the persistent layout without touching the filesystem.
pub fn persistent_path(root: &Path, target: &TargetRef) -> AppResult<PathBuf> {
    let mut path = root.to_path_buf();

    if target.host.contains(':') {
        let (host, port) =
            split_host_port(&target.host).ok_or_else(|| UserError::InvalidHostPort {
                host: target.host.clone(),
            })?;
        path.push(host);
        path.push(port);
    } else if !target.host.is_empty() {
        path.push(&target.host);
    }

    let repo_path = target.path.strip_suffix(".git").unwrap_or(&target.path);
    for segment in repo_path.split('/').filter(|s| !s.is_empty()) {
        path.push(segment);
    }

    Ok(path)
}

/// Splits `host:port` or `[v6]:port` into its parts.
fn split_host_port(authority: &str) -> Option<(&str, &str)> {
    let (host, port) = match authority.strip_prefix('[') {
        Some(bracketed) => {
            let (host, rest) = bracketed.split_once(']')?;
            (host, rest.strip_prefix(':')?)
        }
        None => {
            let (host, port) = authority.rsplit_once(':')?;
            if host.contains(':') {
                return None;
            }
            (host, port)
        }
    };
    if port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((host, port))
}

/// Creates a fresh `<basename>-<n>` directory under `temp_root`.
///
/// Each attempt is a single exclusive `mkdir`; only "already exists" is
/// retried, with a new suffix drawn from `rng`.
#[tracing::instrument(
    skip(temp_root, target, rng),
    fields(temp_root = %temp_root.display(), url = %target.raw)
)]
pub fn allocate_temp_path<R>(
    temp_root: &Path,
    target: &TargetRef,
    max_attempts: u32,
    rng: &mut R,
) -> AppResult<PathBuf>
where
    R: RngCore + ?Sized,
{
    let base = target.basename();

    for attempt in 1..=max_attempts {
        let candidate = temp_root.join(format!("{base}-{}", rng.next_u32()));
        tracing::trace!(attempt, path = %candidate.display(), "Trying temporary directory");

        match fs::create_dir(&candidate) {
            Ok(()) => {
                tracing::debug!(
                    attempt,
                    path = %candidate.display(),
                    "Created temporary clone directory"
                );
                return Ok(candidate);
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(source) => {
                return Err(UserError::CreateDirFailed {
                    path: candidate,
                    source,
                }
                .into());
            }
        }
    }

    Err(UserError::TempAttemptsExhausted {
        temp_root: temp_root.to_path_buf(),
        attempts: max_attempts,
    }
    .into())
}
