//! Weekly crew wages, paid once per turn before any order executes.

use crate::error::Result;
use crate::store::{GameStore, LogEntry, Outcome, Step};
use crate::types::TurnId;
use crate::world::World;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpkeepSummary {
    pub ships: usize,
    pub paid: u64,
    /// Wages owed but not covered by the owner's credits.
    pub shortfall: u64,
}

/// Charge every active ship's owner `crew_count × wage`. Credits never go
/// below zero; any shortfall is logged against the ship.
pub fn pay_wages(store: &GameStore, world: &mut World, turn: TurnId, wage: u64) -> Result<UpkeepSummary> {
    let mut summary = UpkeepSummary::default();
    let mut tick = store.next_tick(turn)?;
    let mut step = Step::default();
    let mut touched = BTreeMap::new();

    let ships: Vec<_> = world
        .ships
        .values()
        .filter(|s| world.ship_is_active(s.id))
        .map(|s| (s.id, s.owner, s.crew_count, s.tu_remaining))
        .collect();

    for (ship, owner, crew, tu) in ships {
        let owed = crew as u64 * wage;
        let player = world.player_mut(owner)?;
        let paid = owed.min(player.credits);
        player.credits -= paid;
        touched.insert(owner, player.clone());

        let mut message = format!("Paid {paid} credits in wages for {crew} crew.");
        if paid < owed {
            message.push_str(&format!(" Shortfall of {} credits.", owed - paid));
            tracing::warn!(ship, owner, shortfall = owed - paid, "wages not covered");
        }
        step.log.push(LogEntry {
            turn,
            tick,
            ship,
            order: None,
            action: "UPKEEP".to_string(),
            outcome: Outcome::Upkeep,
            tu_before: tu,
            tu_after: tu,
            message,
        });
        tick += 1;
        summary.ships += 1;
        summary.paid += paid;
        summary.shortfall += owed - paid;
    }

    step.players = touched.into_values().collect();
    store.commit_step(step)?;
    tracing::info!(%turn, ships = summary.ships, paid = summary.paid, "upkeep paid");
    Ok(summary)
}
