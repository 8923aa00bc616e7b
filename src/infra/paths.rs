// src/infra/paths.rs — Path management
//
// User-level config lives under $SPECLOOP_HOME (or ~/.specloop/).
// Iteration artifacts live inside the project: <project>/.specloop/iterations/.

use std::path::{Path, PathBuf};

/// Name of the per-project state directory.
pub const PROJECT_STATE_DIR: &str = ".specloop";

/// Returns the SPECLOOP_HOME override, if set.
fn specloop_home() -> Option<PathBuf> {
    std::env::var_os("SPECLOOP_HOME").map(PathBuf::from)
}

/// Configuration directory: $SPECLOOP_HOME/ or ~/.specloop/
pub fn config_dir() -> PathBuf {
    if let Some(home) = specloop_home() {
        return home;
    }
    dirs_home().join(".specloop")
}

/// Home directory (falls back to the current directory when it cannot be determined).
pub fn dirs_home() -> PathBuf {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Config file path
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Per-project state directory: <project>/.specloop
pub fn project_state_dir(project: &Path) -> PathBuf {
    project.join(PROJECT_STATE_DIR)
}

/// Iterations root: <project>/.specloop/iterations
pub fn iterations_dir(project: &Path) -> PathBuf {
    project_state_dir(project).join("iterations")
}
