//! Per-ship work lists for a resolution pass.

use crate::config::CostTable;
use crate::error::Result;
use crate::order::{effective_cost, Order};
use crate::store::GameStore;
use crate::types::{ShipId, TurnId};
use crate::world::World;
use std::collections::{BTreeMap, VecDeque};

#[derive(Debug, Clone, PartialEq)]
pub struct ShipQueue {
    pub ship: ShipId,
    /// Pending orders in execution order, each annotated with `unit_cost`.
    pub orders: VecDeque<Order>,
}

/// Assemble every active ship's pending orders for `turn`: carried lane
/// first, then new submissions, each lane in sequence order. Settled orders
/// are skipped, which is what makes a resumed pass idempotent.
pub fn build(store: &GameStore, world: &World, turn: TurnId, costs: &CostTable) -> Result<Vec<ShipQueue>> {
    let mut by_ship: BTreeMap<ShipId, VecDeque<Order>> = BTreeMap::new();
    for mut order in store.orders_for_turn(turn)? {
        if order.is_settled() {
            continue;
        }
        let Some(ship) = world.ships.get(&order.ship) else {
            tracing::warn!(ship = order.ship, order = order.id, "order for unknown ship skipped");
            continue;
        };
        if !world.ship_is_active(ship.id) {
            continue;
        }
        order.unit_cost = effective_cost(order.kind.base_cost(costs), ship);
        by_ship.entry(ship.id).or_default().push_back(order);
    }
    Ok(by_ship
        .into_iter()
        .map(|(ship, orders)| ShipQueue { ship, orders })
        .collect())
}

/// Every order in the batch, in queue order.
pub fn batch(queues: &[ShipQueue]) -> Vec<Order> {
    queues.iter().flat_map(|q| q.orders.iter().cloned()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::movement::{Move, Wait};
    use crate::handlers::testing::world;
    use crate::order::{OrderKind, OrderStatus};
    use crate::store::Step;
    use crate::world::PlayerStatus;
    use tempfile::TempDir;

    #[test]
    fn build_annotates_costs_and_skips_settled_and_suspended() {
        let dir = TempDir::new().unwrap();
        let store = GameStore::open(&dir.path().join("game.db")).unwrap();
        let mut world = world();
        world.ships.get_mut(&100).unwrap().crew_count = 5;
        let turn = TurnId::new(500, 1);

        let orders = store
            .replace_submitted(
                turn,
                100,
                vec![
                    OrderKind::LocationScan,
                    OrderKind::Move(Move {
                        to: "A01".parse().unwrap(),
                    }),
                    OrderKind::Wait(Wait { tu: 7 }),
                ],
            )
            .unwrap();
        let mut done = orders[0].clone();
        done.status = OrderStatus::Succeeded;
        store
            .commit_step(Step {
                orders: vec![done],
                ..Step::default()
            })
            .unwrap();
        store.replace_submitted(turn, 200, vec![OrderKind::SystemScan]).unwrap();
        world.players.get_mut(&2).unwrap().status = PlayerStatus::Suspended;

        let queues = build(&store, &world, turn, &CostTable::default()).unwrap();
        assert_eq!(queues.len(), 1);
        let q = &queues[0];
        assert_eq!(q.ship, 100);
        let costs: Vec<u32> = q.orders.iter().map(|o| o.unit_cost).collect();
        // half crew: ceil(2 × 1.5) = 3 per step, ceil(7 × 1.5) = 11
        assert_eq!(costs, vec![3, 11]);
        assert_eq!(batch(&queues).len(), 2);
    }
}
