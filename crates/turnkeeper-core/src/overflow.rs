//! Carry-forward of orders a ship ran out of TU for.
//!
//! When the executor stops a ship, its remaining orders (the unaffordable
//! one included) are parked under the ship's id. The next turn's queue
//! phase turns them back into orders in the carried lane, ahead of new
//! submissions, keeping their original order ids.

use crate::error::Result;
use crate::order::{Lane, Order, OrderKind, OrderStatus};
use crate::store::{GameStore, Step};
use crate::types::{OrderId, ShipId, TurnId};
use crate::world::World;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const CLEARED_REASON: &str = "cleared by CLEAR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverflowEntry {
    pub order: OrderId,
    pub kind: OrderKind,
    pub reason: String,
    /// Turn the order overflowed from.
    pub from_turn: TurnId,
}

/// Park `remainder` (already in execution order) for the next turn.
pub fn carry(remainder: &[Order], reason: &str) -> Vec<OverflowEntry> {
    remainder
        .iter()
        .map(|o| OverflowEntry {
            order: o.id,
            kind: o.kind.clone(),
            reason: reason.to_string(),
            from_turn: o.turn,
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Materialized {
    /// Orders carried into the turn as pending.
    pub carried: usize,
    /// Orders discarded because the ship submitted CLEAR.
    pub cleared: usize,
    /// Ships whose overflow stays parked (owner suspended).
    pub parked: Vec<ShipId>,
}

/// Move every active ship's overflow into `turn`. Ships whose new
/// submissions contain CLEAR get their overflow written as failed instead.
/// One transaction; the overflow records are removed in the same commit.
pub fn materialize(store: &GameStore, world: &World, turn: TurnId) -> Result<Materialized> {
    let mut summary = Materialized::default();
    let mut orders = Vec::new();
    let mut drained = Vec::new();

    let clearing: BTreeSet<ShipId> = store
        .orders_for_turn(turn)?
        .into_iter()
        .filter(clears_overflow)
        .map(|o| o.ship)
        .collect();

    for (ship, entries) in store.all_overflow()? {
        if !world.ship_is_active(ship) {
            summary.parked.push(ship);
            continue;
        }
        let clear = clearing.contains(&ship);
        for (i, entry) in entries.into_iter().enumerate() {
            let mut order = Order::new(entry.order, turn, ship, Lane::Carried, i as u32 + 1, entry.kind);
            order.carried_from = Some(entry.from_turn);
            if clear {
                order.status = OrderStatus::Failed;
                order.result = Some(CLEARED_REASON.to_string());
                summary.cleared += 1;
            } else {
                summary.carried += 1;
            }
            orders.push(order);
        }
        drained.push(ship);
    }

    if !drained.is_empty() {
        store.materialize_overflow(&orders, &drained)?;
    }
    tracing::info!(
        %turn,
        carried = summary.carried,
        cleared = summary.cleared,
        parked = summary.parked.len(),
        "overflow materialized"
    );
    Ok(summary)
}

fn clears_overflow(o: &Order) -> bool {
    o.lane == Lane::Submitted && o.kind.is_clear()
}

/// Discard carried orders for ships that submitted CLEAR after their
/// overflow was already materialized. Orders already under way are left
/// alone. Returns the number of orders discarded.
pub fn clear_carried(store: &GameStore, turn: TurnId) -> Result<usize> {
    let orders = store.orders_for_turn(turn)?;
    let clearing: BTreeSet<ShipId> = orders.iter().filter(|o| clears_overflow(o)).map(|o| o.ship).collect();
    if clearing.is_empty() {
        return Ok(0);
    }

    let discarded: Vec<Order> = orders
        .into_iter()
        .filter(|o| {
            o.lane == Lane::Carried
                && o.status == OrderStatus::Pending
                && o.tu_before.is_none()
                && clearing.contains(&o.ship)
        })
        .map(|mut o| {
            o.status = OrderStatus::Failed;
            o.result = Some(CLEARED_REASON.to_string());
            o
        })
        .collect();
    let count = discarded.len();
    if count > 0 {
        store.commit_step(Step {
            orders: discarded,
            ..Step::default()
        })?;
        tracing::info!(%turn, cleared = count, "carried orders cleared");
    }
    Ok(count)
}

/// How many of `ship`'s carried orders in `turn` were discarded by CLEAR.
pub fn cleared_count(store: &GameStore, turn: TurnId, ship: ShipId) -> Result<usize> {
    Ok(store
        .orders_for_ship(turn, ship)?
        .iter()
        .filter(|o| o.lane == Lane::Carried && o.result.as_deref() == Some(CLEARED_REASON))
        .count())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::movement::Wait;
    use crate::handlers::testing::world;
    use crate::world::PlayerStatus;
    use tempfile::TempDir;

    fn parked(store: &GameStore, ship: ShipId, from: TurnId, ids: &[OrderId]) {
        let entries = ids
            .iter()
            .map(|&id| OverflowEntry {
                order: id,
                kind: OrderKind::Wait(Wait { tu: id as u32 }),
                reason: "Insufficient TU".into(),
                from_turn: from,
            })
            .collect();
        store
            .commit_step(Step {
                overflow: vec![(ship, entries)],
                ..Step::default()
            })
            .unwrap();
    }

    #[test]
    fn carried_orders_keep_ids_and_lead_the_queue() {
        let dir = TempDir::new().unwrap();
        let store = GameStore::open(&dir.path().join("game.db")).unwrap();
        let world = world();
        let last = TurnId::new(500, 1);
        let turn = last.next();
        parked(&store, 100, last, &[4, 5]);
        store
            .replace_submitted(turn, 100, vec![OrderKind::LocationScan])
            .unwrap();

        let summary = materialize(&store, &world, turn).unwrap();
        assert_eq!(summary.carried, 2);

        let orders = store.orders_for_ship(turn, 100).unwrap();
        let ids: Vec<OrderId> = orders.iter().map(|o| o.id).collect();
        // The new submission got id 1 from the counter; carried ids survive.
        assert_eq!(ids, vec![4, 5, 1]);
        assert_eq!(orders[0].carried_from, Some(last));
        assert!(store.overflow(100).unwrap().is_empty());

        // Running the phase again is a no-op.
        assert_eq!(materialize(&store, &world, turn).unwrap(), Materialized::default());
        assert_eq!(store.orders_for_ship(turn, 100).unwrap().len(), 3);
    }

    #[test]
    fn clear_discards_carried_orders() {
        let dir = TempDir::new().unwrap();
        let store = GameStore::open(&dir.path().join("game.db")).unwrap();
        let world = world();
        let turn = TurnId::new(500, 2);
        parked(&store, 100, TurnId::new(500, 1), &[4]);
        store.replace_submitted(turn, 100, vec![OrderKind::Clear]).unwrap();

        let summary = materialize(&store, &world, turn).unwrap();
        assert_eq!(summary.cleared, 1);
        let carried = &store.orders_for_ship(turn, 100).unwrap()[0];
        assert_eq!(carried.status, OrderStatus::Failed);
        assert_eq!(carried.result.as_deref(), Some(CLEARED_REASON));
    }

    #[test]
    fn late_clear_discards_materialized_orders() {
        let dir = TempDir::new().unwrap();
        let store = GameStore::open(&dir.path().join("game.db")).unwrap();
        let world = world();
        let turn = TurnId::new(500, 2);
        parked(&store, 100, TurnId::new(500, 1), &[4, 5]);
        parked(&store, 200, TurnId::new(500, 1), &[8]);
        assert_eq!(materialize(&store, &world, turn).unwrap().carried, 3);
        assert_eq!(clear_carried(&store, turn).unwrap(), 0);

        store.replace_submitted(turn, 100, vec![OrderKind::Clear]).unwrap();
        assert_eq!(clear_carried(&store, turn).unwrap(), 2);
        assert_eq!(cleared_count(&store, turn, 100).unwrap(), 2);

        let carried: Vec<Order> = store
            .orders_for_turn(turn)
            .unwrap()
            .into_iter()
            .filter(|o| o.lane == Lane::Carried)
            .collect();
        for o in &carried {
            let expected = if o.ship == 100 { OrderStatus::Failed } else { OrderStatus::Pending };
            assert_eq!(o.status, expected, "order {}", o.id);
        }
        // Nothing left to discard on a second pass.
        assert_eq!(clear_carried(&store, turn).unwrap(), 0);
    }

    #[test]
    fn suspended_ships_keep_overflow_parked() {
        let dir = TempDir::new().unwrap();
        let store = GameStore::open(&dir.path().join("game.db")).unwrap();
        let mut world = world();
        world.players.get_mut(&2).unwrap().status = PlayerStatus::Suspended;
        parked(&store, 200, TurnId::new(500, 1), &[8]);

        let summary = materialize(&store, &world, TurnId::new(500, 2)).unwrap();
        assert_eq!(summary.parked, vec![200]);
        assert_eq!(store.overflow(200).unwrap().len(), 1);
    }
}
