use crate::{
    cli::Cli,
    error::{AppResult, UserError},
    resolve::DEFAULT_TEMP_ATTEMPTS,
};
use std::{
    env, fs,
    path::{Path, PathBuf},
};

/// Environment variable consulted for the storage root when `--dir` is absent.
pub const STORAGE_DIR_ENV: &str = "GITREPO_DIR";

/// Immutable run configuration, built once from the parsed arguments.
#[derive(Debug, Clone)]
pub struct Config {
    pub storage_root: PathBuf,
    pub temp_root: PathBuf,
    pub temporary: bool,
    pub env: Vec<(String, String)>,
    pub git: String,
    pub temp_attempts: u32,
}

impl Config {
    #[tracing::instrument(skip_all)]
    pub fn from_cli(cli: &Cli) -> AppResult<Self> {
        let dir_override = cli
            .dir
            .as_deref()
            .map(|dir| shellexpand::tilde(dir).to_string());
        let env_value = env::var(STORAGE_DIR_ENV).ok();

        let storage_root =
            resolve_storage_root(dir_override.as_deref(), env_value.as_deref(), dirs::home_dir)?;
        tracing::debug!(path = %storage_root.display(), "Using storage root");

        let env = parse_env_overrides(&split_env_list(&cli.env))?;

        Ok(Config {
            storage_root,
            temp_root: env::temp_dir(),
            temporary: cli.tmp,
            env,
            git: cli.git.clone(),
            temp_attempts: DEFAULT_TEMP_ATTEMPTS,
        })
    }
}

/// Picks the storage root from `--dir`, then `$GITREPO_DIR`, then `<home>/gitrepo`.
///
/// The root itself may be missing, but its parent must exist so that a typo
/// does not silently create a whole directory chain.
pub fn resolve_storage_root<F>(
    dir_override: Option<&str>,
    env_value: Option<&str>,
    home_dir: F,
) -> AppResult<PathBuf>
where
    F: FnOnce() -> Option<PathBuf>,
{
    let root = match (
        dir_override.filter(|dir| !dir.is_empty()),
        env_value.filter(|dir| !dir.is_empty()),
    ) {
        (Some(dir), _) | (None, Some(dir)) => PathBuf::from(dir),
        (None, None) => home_dir()
            .ok_or(UserError::HomeDirUnavailable)?
            .join("gitrepo"),
    };

    if let Some(parent) = root.parent() {
        let parent = if parent.as_os_str().is_empty() {
            Path::new(".")
        } else {
            parent
        };
        fs::metadata(parent).map_err(|source| UserError::StorageParentMissing {
            parent: parent.to_path_buf(),
            source,
        })?;
    }

    Ok(root)
}

/// Splits a comma-separated list, dropping empty entries.
pub fn split_env_list(list: &str) -> Vec<String> {
    list.split(',')
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

/// Turns `key=value` entries into pairs, splitting on the first `=`.
pub fn parse_env_overrides(entries: &[String]) -> AppResult<Vec<(String, String)>> {
    entries
        .iter()
        .map(|entry| match entry.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
            _ => Err(UserError::InvalidEnvEntry {
                entry: entry.clone(),
            }
            .into()),
        })
        .collect()
}
