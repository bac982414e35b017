use crate::output::print_json;
use anyhow::Context;
use std::path::Path;
use turnkeeper_core::{Game, Universe};

pub fn run(root: &Path, universe: &Path, game_id: &str, json: bool) -> anyhow::Result<()> {
    let universe = Universe::load(universe)
        .with_context(|| format!("failed to read universe file {}", universe.display()))?;
    let game = Game::init(root, game_id, universe).context("failed to initialize game")?;
    let world = game.store.load_world()?;

    if json {
        print_json(&serde_json::json!({
            "game_id": game.pipeline.game_id,
            "turn": game.pipeline.turn,
            "status": game.pipeline.status,
            "systems": world.systems.len(),
            "players": world.players.len(),
            "ships": world.ships.len(),
        }))?;
    } else {
        println!("Initialized game {} in {}", game.pipeline.game_id, root.display());
        println!(
            "  {} systems, {} players, {} ships",
            world.systems.len(),
            world.players.len(),
            world.ships.len()
        );
        println!("  turn {} is {}", game.pipeline.turn, game.pipeline.status);
    }
    Ok(())
}
