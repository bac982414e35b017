//! Moving a completed turn on to the next one.

use crate::error::{Result, TurnError};
use crate::game::Game;
use crate::types::{TurnId, TurnStatus};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdvanceSummary {
    pub completed: TurnId,
    pub opened: TurnId,
    /// Ships whose TU was reset to their allowance.
    pub ships_reset: usize,
}

/// Snapshot the finished turn, refill every active ship's TU, and open the
/// following turn. The snapshot is written once and never replaced; a retry
/// after a crash finds it already present and carries on.
pub fn advance(game: &mut Game) -> Result<AdvanceSummary> {
    if game.pipeline.status != TurnStatus::Completed {
        return Err(TurnError::InvalidTransition {
            from: game.pipeline.status.to_string(),
            to: TurnStatus::Open.to_string(),
            reason: "only a completed turn can advance".to_string(),
        });
    }
    let completed = game.pipeline.turn;
    let mut world = game.store.load_world()?;

    match game.store.write_snapshot(completed, &world) {
        Ok(()) => tracing::info!(turn = %completed, "snapshot written"),
        Err(TurnError::SnapshotExists(_)) => {
            tracing::debug!(turn = %completed, "snapshot already present")
        }
        Err(e) => return Err(e),
    }

    let active: Vec<_> = world
        .ships
        .keys()
        .copied()
        .filter(|&id| world.ship_is_active(id))
        .collect();
    for id in &active {
        let ship = world.ship_mut(*id)?;
        ship.tu_remaining = ship.tu_allowance;
    }
    game.store.save_world(&world)?;

    let opened = game.pipeline.open_next_turn()?;
    game.save_pipeline()?;
    tracing::info!(%completed, %opened, ships = active.len(), "turn advanced");
    Ok(AdvanceSummary {
        completed,
        opened,
        ships_reset: active.len(),
    })
}
