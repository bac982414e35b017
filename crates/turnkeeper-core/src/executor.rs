//! Interleaved execution of every ship's orders.
//!
//! Ships act in global order of the TU they will have spent once their next
//! atomic action completes: a ship that has spent 3 TU moves before one that
//! has spent 5, regardless of whose orders came first. Ties go to the older
//! order (lower order id), then the lower ship id.
//!
//! Each atomic action (a single scan, dock, or one square of a move) is
//! applied through its handler and committed in its own store transaction
//! before the next pop, so a crash loses at most the action in flight.

use crate::config::Config;
use crate::error::Result;
use crate::handlers::{self, ApplyContext};
use crate::moderator::ArbitrationDesk;
use crate::order::{Order, OrderStatus};
use crate::overflow;
use crate::queue::ShipQueue;
use crate::rng;
use crate::store::{GameStore, LogEntry, Outcome, Step};
use crate::types::{OrderId, ShipId, TurnId};
use crate::world::{Touched, World};
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Ready {
    /// Cumulative TU spent once the action completes.
    at: u32,
    stamp: OrderId,
    ship: ShipId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionSummary {
    /// Atomic actions applied (each move step counts once).
    pub actions: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub overflowed: usize,
}

pub struct Executor<'a> {
    store: &'a GameStore,
    config: &'a Config,
    turn: TurnId,
    world: &'a mut World,
    desk: &'a mut ArbitrationDesk,
    queues: BTreeMap<ShipId, VecDeque<Order>>,
    ready: BinaryHeap<Reverse<Ready>>,
    tick: u32,
    summary: ExecutionSummary,
}

impl<'a> Executor<'a> {
    pub fn new(
        store: &'a GameStore,
        config: &'a Config,
        turn: TurnId,
        world: &'a mut World,
        desk: &'a mut ArbitrationDesk,
    ) -> Result<Self> {
        let tick = store.next_tick(turn)?;
        Ok(Self {
            store,
            config,
            turn,
            world,
            desk,
            queues: BTreeMap::new(),
            ready: BinaryHeap::new(),
            tick,
            summary: ExecutionSummary::default(),
        })
    }

    pub fn run(mut self, queues: Vec<ShipQueue>) -> Result<ExecutionSummary> {
        for q in queues {
            let ship = q.ship;
            self.queues.insert(ship, q.orders);
            self.schedule(ship)?;
        }

        while let Some(Reverse(next)) = self.ready.pop() {
            self.step(next.ship)?;
            while self.next_cost(next.ship)? == Some(0) {
                self.step(next.ship)?;
            }
            self.schedule(next.ship)?;
        }

        tracing::info!(
            turn = %self.turn,
            actions = self.summary.actions,
            succeeded = self.summary.succeeded,
            failed = self.summary.failed,
            overflowed = self.summary.overflowed,
            "execution finished"
        );
        Ok(self.summary)
    }

    // ---------------------------------------------------------------------------
    // Scheduling
    // ---------------------------------------------------------------------------

    /// Cost of the ship's next atomic action, if it has one.
    fn next_cost(&self, ship: ShipId) -> Result<Option<u32>> {
        let Some(order) = self.queues.get(&ship).and_then(|q| q.front()) else {
            return Ok(None);
        };
        let s = self.world.ship(ship)?;
        Ok(Some(order.kind.step_cost(order.unit_cost, s)))
    }

    fn schedule(&mut self, ship: ShipId) -> Result<()> {
        let Some(cost) = self.next_cost(ship)? else {
            return Ok(());
        };
        let s = self.world.ship(ship)?;
        if cost > s.tu_remaining {
            return self.overflow(ship, cost);
        }
        let stamp = self.queues[&ship].front().map_or(0, |o| o.id);
        self.ready.push(Reverse(Ready {
            at: s.tu_spent() + cost,
            stamp,
            ship,
        }));
        Ok(())
    }

    fn next_tick(&mut self) -> u32 {
        let tick = self.tick;
        self.tick += 1;
        tick
    }

    // ---------------------------------------------------------------------------
    // Execution
    // ---------------------------------------------------------------------------

    /// Apply the ship's next atomic action and commit it.
    fn step(&mut self, ship: ShipId) -> Result<()> {
        let Some(mut order) = self.queues.get_mut(&ship).and_then(VecDeque::pop_front) else {
            return Ok(());
        };
        let before = self.world.ship(ship)?.clone();
        let cost = order.kind.step_cost(order.unit_cost, &before);
        if cost > before.tu_remaining {
            if let Some(q) = self.queues.get_mut(&ship) {
                q.push_front(order);
            }
            return self.overflow(ship, cost);
        }

        let cleared = if order.kind.is_clear() {
            overflow::cleared_count(self.store, self.turn, ship)?
        } else {
            0
        };
        let context = format!("{ship}:{}:{}", order.id, order.tu_spent);
        let mut cx = ApplyContext {
            turn: self.turn,
            order: order.id,
            config: self.config,
            cost,
            unit_cost: order.unit_cost,
            rng: rng::stream(&self.config.game_id, &self.config.seed, self.turn, &context),
            desk: &mut *self.desk,
            cleared,
        };

        // A move already under way was checked on its first step.
        if order.tu_before.is_none() {
            if let Err(reason) = handlers::check(&order.kind, self.world, &before, &cx) {
                tracing::warn!(ship, order = order.id, kind = order.kind.command(), "{reason}");
                order.status = OrderStatus::Failed;
                order.result = Some(reason.0.clone());
                let entry = self.log_entry(&order, Outcome::Failed, before.tu_remaining, before.tu_remaining, reason.0);
                self.store.commit_step(Step {
                    orders: vec![order],
                    log: vec![entry],
                    ..Step::default()
                })?;
                self.summary.failed += 1;
                return Ok(());
            }
        }

        let applied = handlers::apply(&order.kind, self.world, ship, &mut cx)?;

        let s = self.world.ship_mut(ship)?;
        s.tu_remaining -= cost;
        let tu_after = s.tu_remaining;
        let complete = order.kind.is_complete(s);
        let tu_before = *order.tu_before.get_or_insert(before.tu_remaining);
        order.tu_spent += cost;
        order.result = Some(applied.message.clone());

        let mut step = Step::default();
        step.ships.push(s.clone());
        for touched in applied.touched {
            match touched {
                Touched::Ship(id) if id != ship => step.ships.push(self.world.ship(id)?.clone()),
                Touched::Ship(_) => {}
                Touched::Player(id) => step.players.push(self.world.player(id)?.clone()),
            }
        }

        if complete {
            order.status = OrderStatus::Succeeded;
            tracing::debug!(ship, order = order.id, tu_after, "{}", applied.message);
            let entry = self.log_entry(&order, Outcome::Succeeded, tu_before, tu_after, applied.message);
            step.log.push(entry);
            self.summary.succeeded += 1;
        } else {
            tracing::debug!(ship, order = order.id, tu_after, "{}", applied.message);
            if let Some(q) = self.queues.get_mut(&ship) {
                q.push_front(order.clone());
            }
        }
        step.orders.push(order);

        // moderator.yaml first: settling an action twice is harmless
        self.desk.flush()?;
        self.store.commit_step(step)?;
        self.summary.actions += 1;
        Ok(())
    }

    /// Stop the ship: everything left in its queue, starting with the action
    /// it can't afford, is parked for next turn behind anything already
    /// parked for it.
    fn overflow(&mut self, ship: ShipId, cost: u32) -> Result<()> {
        let remaining = self.world.ship(ship)?.tu_remaining;
        let mut orders: Vec<Order> = self
            .queues
            .get_mut(&ship)
            .map(|q| q.drain(..).collect())
            .unwrap_or_default();
        if orders.is_empty() {
            return Ok(());
        }
        let reason = format!("Insufficient TU: {cost} needed, {remaining} remaining.");
        tracing::warn!(ship, orders = orders.len(), "{reason}");

        let mut entries = self.store.overflow(ship)?;
        entries.extend(overflow::carry(&orders, &reason));
        let mut step = Step::default();
        for order in &mut orders {
            order.status = OrderStatus::Overflow;
            order.result = Some(reason.clone());
            let entry = self.log_entry(order, Outcome::Overflow, remaining, remaining, reason.clone());
            step.log.push(entry);
        }
        self.summary.overflowed += orders.len();
        step.orders = orders;
        step.overflow.push((ship, entries));
        self.store.commit_step(step)
    }

    fn log_entry(&mut self, order: &Order, outcome: Outcome, tu_before: u32, tu_after: u32, message: String) -> LogEntry {
        LogEntry {
            turn: self.turn,
            tick: self.next_tick(),
            ship: order.ship,
            order: Some(order.id),
            action: order.kind.to_string(),
            outcome,
            tu_before,
            tu_after,
            message,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
