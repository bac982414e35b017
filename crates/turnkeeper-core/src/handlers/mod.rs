//! Effect appliers, one per order kind.
//!
//! Every handler runs in two steps: `check` validates preconditions against
//! the current world without touching it, then `apply` performs exactly one
//! atomic action and reports which records it changed. A failed check never
//! reaches `apply`, so a failed order can't spend TU or mutate anything.
//!
//! TU costs are not a handler concern: the queue builder annotates each order
//! with its efficiency-adjusted cost and the executor charges it.

pub mod comms;
pub mod movement;
pub mod navigation;
pub mod scan;
pub mod trade;

use crate::config::Config;
use crate::error::Result;
use crate::moderator::ArbitrationDesk;
use crate::order::OrderKind;
use crate::types::{OrderId, ShipId, TurnId};
use crate::world::{Ship, Touched, World};
use rand_chacha::ChaCha8Rng;

/// A precondition that didn't hold at execution time. The order is dropped
/// at zero cost and the reason lands in the execution log.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct Precondition(pub String);

impl Precondition {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// Result of one applied atomic action.
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    pub message: String,
    /// Records beyond the acting ship that must be persisted with this action.
    pub touched: Vec<Touched>,
}

impl Applied {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            touched: Vec::new(),
        }
    }

    pub fn touching(mut self, touched: Touched) -> Self {
        if !self.touched.contains(&touched) {
            self.touched.push(touched);
        }
        self
    }
}

/// Per-action context handed to handlers.
pub struct ApplyContext<'a> {
    pub turn: TurnId,
    pub order: OrderId,
    pub config: &'a Config,
    /// TU the executor charges for this atomic action.
    pub cost: u32,
    /// Efficiency-adjusted cost annotated on the order.
    pub unit_cost: u32,
    /// Seeded from (game, turn, ship, order, progress); replays identically.
    pub rng: ChaCha8Rng,
    pub desk: &'a mut ArbitrationDesk,
    /// Carried orders of this ship discarded by CLEAR this turn.
    pub cleared: usize,
}

pub trait Handler {
    /// Precondition check. Must not mutate anything.
    fn check(&self, _world: &World, _ship: &Ship, _cx: &ApplyContext<'_>) -> std::result::Result<(), Precondition> {
        Ok(())
    }

    /// Apply one atomic action. Errors here are infrastructure failures, not
    /// rule violations; rule violations belong in `check`.
    fn apply(&self, world: &mut World, ship: ShipId, cx: &mut ApplyContext<'_>) -> Result<Applied>;
}

fn handler(kind: &OrderKind) -> &dyn Handler {
    match kind {
        OrderKind::Wait(h) => h,
        OrderKind::Move(h) => h,
        OrderKind::LocationScan => &scan::LocationScan,
        OrderKind::SystemScan => &scan::SystemScan,
        OrderKind::Orbit(h) => h,
        OrderKind::Dock(h) => h,
        OrderKind::Undock => &navigation::Undock,
        OrderKind::Land(h) => h,
        OrderKind::Takeoff => &navigation::Takeoff,
        OrderKind::Buy(h) => h,
        OrderKind::Sell(h) => h,
        OrderKind::GetMarket => &trade::GetMarket,
        OrderKind::Message(h) => h,
        OrderKind::RenameShip(h) => h,
        OrderKind::Moderator(h) => h,
        OrderKind::Clear => &comms::Clear,
    }
}

pub fn check(
    kind: &OrderKind,
    world: &World,
    ship: &Ship,
    cx: &ApplyContext<'_>,
) -> std::result::Result<(), Precondition> {
    handler(kind).check(world, ship, cx)
}

pub fn apply(
    kind: &OrderKind,
    world: &mut World,
    ship: ShipId,
    cx: &mut ApplyContext<'_>,
) -> Result<Applied> {
    handler(kind).apply(world, ship, cx)
}

#[cfg(test)]
pub(crate) mod testing {
    //! Small in-memory worlds for handler tests.

    use super::*;
    use crate::types::GridPos;
    use crate::world::{Base, Body, BodyKind, Player, PlayerStatus, ShipState, StarSystem};
    use rand::SeedableRng;
    use std::collections::BTreeMap;

    pub fn pos(raw: &str) -> GridPos {
        raw.parse().unwrap()
    }

    pub fn world() -> World {
        let mut world = World::default();
        world.systems.insert(
            1,
            StarSystem {
                id: 1,
                name: "Omicron".into(),
                star: pos("M13"),
            },
        );
        world.bodies.insert(
            10,
            Body {
                id: 10,
                name: "Meridian".into(),
                kind: BodyKind::Planet,
                system: 1,
                position: pos("D04"),
            },
        );
        world.bodies.insert(
            11,
            Body {
                id: 11,
                name: "Colossus".into(),
                kind: BodyKind::GasGiant,
                system: 1,
                position: pos("T20"),
            },
        );
        let mut market = BTreeMap::new();
        market.insert("fuel".to_string(), 5);
        market.insert("ore".to_string(), 12);
        world.bases.insert(
            20,
            Base {
                id: 20,
                name: "Meridian Station".into(),
                system: 1,
                position: pos("D04"),
                market,
            },
        );
        for (id, name) in [(1, "Ann"), (2, "Bo")] {
            world.players.insert(
                id,
                Player {
                    id,
                    name: name.into(),
                    email: format!("{}@example.com", name.to_lowercase()),
                    account: format!("ACC-{id}"),
                    status: PlayerStatus::Active,
                    credits: 1_000,
                    inbox: Vec::new(),
                    contacts: BTreeMap::new(),
                },
            );
        }
        world.ships.insert(100, ship(100, 1, "D04"));
        world.ships.insert(200, ship(200, 2, "A01"));
        world
    }

    pub fn ship(id: ShipId, owner: u64, at: &str) -> Ship {
        Ship {
            id,
            name: format!("Ship {id}"),
            owner,
            system: 1,
            position: pos(at),
            state: ShipState::InSpace,
            tu_allowance: 300,
            tu_remaining: 300,
            crew_count: 10,
            crew_required: 10,
            cargo_capacity: 100,
            cargo: BTreeMap::new(),
            sensor_range: 8,
        }
    }

    pub fn desk() -> ArbitrationDesk {
        ArbitrationDesk::in_memory(Vec::new(), false, "No response from the moderator.")
    }

    pub fn cx<'a>(config: &'a Config, desk: &'a mut ArbitrationDesk) -> ApplyContext<'a> {
        ApplyContext {
            turn: TurnId::new(500, 1),
            order: 1,
            config,
            cost: 0,
            unit_cost: 0,
            rng: ChaCha8Rng::seed_from_u64(7),
            desk,
            cleared: 0,
        }
    }

    /// Run check + apply the way the executor does.
    pub fn run(
        kind: &OrderKind,
        world: &mut World,
        ship: ShipId,
        cx: &mut ApplyContext<'_>,
    ) -> std::result::Result<Applied, Precondition> {
        let snapshot = world.ship(ship).unwrap().clone();
        check(kind, world, &snapshot, cx)?;
        Ok(apply(kind, world, ship, cx).unwrap())
    }
}
