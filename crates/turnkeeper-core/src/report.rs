//! Per-turn reports: what each ship did, what spilled over, and what the
//! moderator was asked and answered.

use crate::error::Result;
use crate::game::Game;
use crate::moderator::{self, ModeratorStatus};
use crate::order::OrderStatus;
use crate::store::{LogEntry, Outcome};
use crate::types::{OrderId, ShipId, TurnId};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShipReport {
    pub ship: ShipId,
    pub name: String,
    pub owner: u64,
    /// In execution order.
    pub entries: Vec<LogEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverflowLine {
    pub ship: ShipId,
    pub order: OrderId,
    pub action: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArbitrationPair {
    pub action: String,
    pub ship: ShipId,
    pub requester: String,
    pub request: String,
    pub response: Option<String>,
    pub status: ModeratorStatus,
    pub sentinel: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnReport {
    pub turn: TurnId,
    pub ships: Vec<ShipReport>,
    pub overflow: Vec<OverflowLine>,
    pub arbitration: Vec<ArbitrationPair>,
}

/// Assemble the report for `turn` from the execution log, the turn's orders
/// and the moderator file.
pub fn build(game: &Game, turn: TurnId) -> Result<TurnReport> {
    let world = game.store.load_world()?;
    let orders = game.store.orders_for_turn(turn)?;

    let mut by_ship: BTreeMap<ShipId, Vec<LogEntry>> = BTreeMap::new();
    for entry in game.store.log_for_turn(turn)? {
        by_ship.entry(entry.ship).or_default().push(entry);
    }
    let ships = by_ship
        .into_iter()
        .map(|(ship, entries)| {
            let (name, owner) = world
                .ships
                .get(&ship)
                .map(|s| (s.name.clone(), s.owner))
                .unwrap_or_else(|| (format!("ship {ship}"), 0));
            ShipReport {
                ship,
                name,
                owner,
                entries,
            }
        })
        .collect();

    let overflow = orders
        .iter()
        .filter(|o| o.status == OrderStatus::Overflow)
        .map(|o| OverflowLine {
            ship: o.ship,
            order: o.id,
            action: o.kind.to_string(),
            reason: o.result.clone().unwrap_or_default(),
        })
        .collect();

    let requests: Vec<OrderId> = orders
        .iter()
        .filter(|o| o.kind.is_arbitration())
        .map(|o| o.id)
        .collect();
    let arbitration = moderator::for_orders(game.root(), &requests)?
        .into_iter()
        .map(|a| ArbitrationPair {
            action: a.id,
            ship: a.ship,
            requester: a.requester,
            request: a.request,
            response: a.response,
            status: a.status,
            sentinel: a.sentinel,
        })
        .collect();

    Ok(TurnReport {
        turn,
        ships,
        overflow,
        arbitration,
    })
}

impl fmt::Display for TurnReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Turn {}", self.turn)?;
        for ship in &self.ships {
            writeln!(f)?;
            writeln!(f, "{} ({})", ship.name, ship.ship)?;
            for e in &ship.entries {
                let mark = match e.outcome {
                    Outcome::Succeeded | Outcome::Upkeep => " ",
                    Outcome::Failed => "!",
                    Outcome::Overflow => ">",
                };
                writeln!(
                    f,
                    "  {mark} [{:>4} → {:>4}] {}: {}",
                    e.tu_before, e.tu_after, e.action, e.message
                )?;
            }
        }
        if !self.overflow.is_empty() {
            writeln!(f)?;
            writeln!(f, "Carried to next turn:")?;
            for o in &self.overflow {
                writeln!(f, "  ship {} #{} {} ({})", o.ship, o.order, o.action, o.reason)?;
            }
        }
        if !self.arbitration.is_empty() {
            writeln!(f)?;
            writeln!(f, "Moderator:")?;
            for a in &self.arbitration {
                writeln!(f, "  {} {} asked: {}", a.action, a.requester, a.request)?;
                match &a.response {
                    Some(r) => writeln!(f, "    answer: {r}")?,
                    None => writeln!(f, "    answer: (pending)")?,
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advance::advance;
    use crate::game::tests::universe;
    use crate::order::NormalizedOrder;
    use crate::resolve::{resolve, ResolveOutcome};
    use crate::submission;
    use serde_json::json;
    use tempfile::TempDir;

    fn order(cmd: &str, params: serde_json::Value) -> NormalizedOrder {
        NormalizedOrder::new(cmd, params)
    }

    #[test]
    fn overflowed_order_runs_first_next_turn() {
        let dir = TempDir::new().unwrap();
        let mut game = Game::init(dir.path(), "G1", universe()).unwrap();
        // Lantern has 120 TU: the scan no longer fits after the wait.
        submission::submit(
            &mut game,
            200,
            vec![order("WAIT", json!(110)), order("LOCATIONSCAN", json!(null))],
        )
        .unwrap();
        assert!(matches!(resolve(&mut game, false).unwrap(), ResolveOutcome::Completed(_)));

        let first = build(&game, TurnId::new(500, 1)).unwrap();
        assert_eq!(first.overflow.len(), 1);
        assert_eq!(first.overflow[0].action, "LOCATIONSCAN");
        assert!(first.overflow[0].reason.contains("Insufficient TU"));
        assert!(first.to_string().contains("Carried to next turn:"));

        advance(&mut game).unwrap();
        submission::submit(&mut game, 200, vec![order("WAIT", json!(5))]).unwrap();
        assert!(matches!(resolve(&mut game, false).unwrap(), ResolveOutcome::Completed(_)));

        let second = build(&game, TurnId::new(500, 2)).unwrap();
        let lantern = second.ships.iter().find(|s| s.ship == 200).unwrap();
        let actions: Vec<&str> = lantern
            .entries
            .iter()
            .filter(|e| e.outcome != Outcome::Upkeep)
            .map(|e| e.action.as_str())
            .collect();
        assert_eq!(actions, vec!["LOCATIONSCAN", "WAIT 5"]);
        assert!(second.overflow.is_empty());
    }

    #[test]
    fn answered_request_is_paired_in_the_report() {
        let dir = TempDir::new().unwrap();
        let mut game = Game::init(dir.path(), "G1", universe()).unwrap();
        submission::submit(&mut game, 100, vec![order("MODERATOR", json!("May I annex the moon?"))]).unwrap();

        let ResolveOutcome::Held(requests) = resolve(&mut game, false).unwrap() else {
            panic!("expected hold");
        };
        moderator::respond(dir.path(), &requests[0].action, "Not this week.").unwrap();
        game.pipeline.release("answered").unwrap();
        assert!(matches!(resolve(&mut game, false).unwrap(), ResolveOutcome::Completed(_)));

        let report = build(&game, game.pipeline.turn).unwrap();
        assert_eq!(report.arbitration.len(), 1);
        let pair = &report.arbitration[0];
        assert_eq!(pair.request, "May I annex the moon?");
        assert_eq!(pair.response.as_deref(), Some("Not this week."));
        assert_eq!(pair.status, ModeratorStatus::Resolved);

        let wayfarer = report.ships.iter().find(|s| s.ship == 100).unwrap();
        let last = wayfarer.entries.last().unwrap();
        assert_eq!(last.outcome, Outcome::Succeeded);
        assert!(last.message.contains("Response: Not this week."));
    }
}
