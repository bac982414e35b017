pub mod advance;
pub mod config;
pub mod init;
pub mod moderator;
pub mod order;
pub mod pipeline;
pub mod player;
pub mod report;
pub mod resolve;
pub mod status;
pub mod submit;

use anyhow::Context;
use std::path::Path;
use turnkeeper_core::Game;

pub(crate) fn open(root: &Path) -> anyhow::Result<Game> {
    Game::open(root).with_context(|| format!("failed to open game at {}", root.display()))
}
