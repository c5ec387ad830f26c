use std::{
    env, fs,
    path::{Path, PathBuf},
};

/// Errors for resolving the home directory
#[derive(Debug, thiserror::Error)]
pub enum HomeDirError {
    #[error("{0} environment variable is not set")]
    BaseMissing(&'static str),
    #[error("home_dir must be an absolute path (after ~ expansion): {0}")]
    AbsoluteRequired(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(target_os = "windows")]
const BASE_VARS: &[&str] = &["APPDATA"];
#[cfg(not(target_os = "windows"))]
const BASE_VARS: &[&str] = &["HOME"];

#[cfg(target_os = "windows")]
const TILDE_VARS: &[&str] = &["USERPROFILE", "HOME"];
#[cfg(not(target_os = "windows"))]
const TILDE_VARS: &[&str] = &["HOME"];

fn first_env(vars: &'static [&'static str]) -> Result<PathBuf, HomeDirError> {
    vars.iter()
        .find_map(|v| env::var_os(v))
        .map(PathBuf::from)
        .ok_or(HomeDirError::BaseMissing(vars[0]))
}

/// Resolve the host's home directory.
///
/// - `config_home` given: a leading `~` expands to the user profile
///   (`$HOME`, or `%USERPROFILE%` on Windows); the result must be absolute.
/// - `config_home` absent: `$HOME/<default_subdir>` (`%APPDATA%` on Windows).
///
/// If `create` is true, the directory is created if missing.
pub fn resolve_home_dir(
    config_home: Option<String>,
    default_subdir: &str,
    create: bool,
) -> Result<PathBuf, HomeDirError> {
    let path = match config_home {
        Some(raw) => expand_user_path(&raw, || first_env(TILDE_VARS))?,
        None => first_env(BASE_VARS)?.join(default_subdir),
    };

    if create {
        fs::create_dir_all(&path)?;
    }
    Ok(path)
}

/// `~`, `~/rest` and `~\rest` expand against `user_home`; anything else is taken as-is.
fn expand_user_path(
    raw: &str,
    user_home: impl FnOnce() -> Result<PathBuf, HomeDirError>,
) -> Result<PathBuf, HomeDirError> {
    let expanded = if raw == "~" {
        user_home()?
    } else if let Some(rest) = raw.strip_prefix("~/").or_else(|| raw.strip_prefix("~\\")) {
        user_home()?.join(rest)
    } else {
        PathBuf::from(raw)
    };

    if !Path::new(&expanded).is_absolute() {
        return Err(HomeDirError::AbsoluteRequired(
            expanded.to_string_lossy().into(),
        ));
    }
    Ok(expanded)
}
