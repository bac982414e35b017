use std::path::{Path, PathBuf};

/// Resolve the game root directory.
///
/// Priority:
/// 1. `--root` flag / `TURNKEEPER_ROOT` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for `.turnkeeper/`
/// 3. Fall back to `cwd`
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    find_game_dir(&cwd).unwrap_or(cwd)
}

fn find_game_dir(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(turnkeeper_core::paths::GAME_DIR).is_dir())
        .map(Path::to_path_buf)
}
