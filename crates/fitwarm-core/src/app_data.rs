//! Where fitwarm stores its own data (config).
//!
//! The FIT collection itself stays wherever the user keeps it. We only store
//! app state here.

use std::path::PathBuf;

/// Returns the directory where fitwarm stores its config.
/// On Linux: `~/.local/share/fitwarm/`.
/// Creates the directory if it doesn't exist; returns `None` if we can't determine the path.
pub fn app_data_dir() -> Option<PathBuf> {
    let dir = directories::ProjectDirs::from("uk", "fitwarm", "fitwarm")?
        .data_local_dir()
        .to_path_buf();
    std::fs::create_dir_all(&dir).ok()?;
    Some(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_data_dir_ends_with_app_name() {
        if let Some(dir) = app_data_dir() {
            assert!(dir.is_dir());
            assert!(dir.to_string_lossy().contains("fitwarm"));
        }
    }
}
