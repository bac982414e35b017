use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const GAME_DIR: &str = ".turnkeeper";

pub const CONFIG_FILE: &str = ".turnkeeper/config.yaml";
pub const PIPELINE_FILE: &str = ".turnkeeper/pipeline.yaml";
pub const MODERATOR_FILE: &str = ".turnkeeper/moderator.yaml";
pub const DATABASE_FILE: &str = ".turnkeeper/game.db";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn game_dir(root: &Path) -> PathBuf {
    root.join(GAME_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn pipeline_path(root: &Path) -> PathBuf {
    root.join(PIPELINE_FILE)
}

pub fn moderator_path(root: &Path) -> PathBuf {
    root.join(MODERATOR_FILE)
}

pub fn database_path(root: &Path) -> PathBuf {
    root.join(DATABASE_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_helpers() {
        let root = Path::new("/tmp/game");
        assert_eq!(
            config_path(root),
            PathBuf::from("/tmp/game/.turnkeeper/config.yaml")
        );
        assert_eq!(
            database_path(root),
            PathBuf::from("/tmp/game/.turnkeeper/game.db")
        );
        assert_eq!(game_dir(root), PathBuf::from("/tmp/game/.turnkeeper"));
    }
}
