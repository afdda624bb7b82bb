//! Standard locations for mixstream configuration files

use std::path::PathBuf;

/// Directory holding mixstream configuration
///
/// Returns the platform config directory joined with `mixstream`
/// (`~/.config/mixstream` on Linux), or `./mixstream` when the platform
/// reports none.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mixstream")
}

/// Default path of a named config file inside [`config_dir`]
pub fn default_config_path(filename: &str) -> PathBuf {
    config_dir().join(filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_dir_is_app_specific() {
        assert!(config_dir().ends_with("mixstream"));
    }

    #[test]
    fn test_config_path_includes_filename() {
        let path = default_config_path("player.yaml");
        assert!(path.ends_with("mixstream/player.yaml"));
    }
}
