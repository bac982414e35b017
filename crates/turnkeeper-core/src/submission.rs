//! Order submission by players and order editing by the moderator.
//!
//! Submissions land in the ship's `submitted` lane and replace whatever was
//! there. Moderator edits work on single orders in either lane. Every change
//! clears the gate marker so a MODERATOR order added after a hold is gated
//! before it can execute.

use crate::error::{Result, TurnError};
use crate::game::Game;
use crate::order::{parse_batch, Lane, NormalizedOrder, Order};
use crate::types::{Phase, ShipId};

/// Replace `ship`'s submitted orders for the current turn.
pub fn submit(game: &mut Game, ship: ShipId, orders: Vec<NormalizedOrder>) -> Result<Vec<Order>> {
    game.pipeline.ensure_accepting_orders()?;
    let turn = game.pipeline.turn;

    let s = game.store.ship(ship)?;
    let owner = game.store.player(s.owner)?;
    if !owner.is_active() {
        return Err(TurnError::Validation(format!(
            "{} is suspended; ship {ship} cannot take orders",
            owner.name
        )));
    }
    if let Some(done) = game
        .store
        .orders_for_ship(turn, ship)?
        .into_iter()
        .find(|o| o.is_settled())
    {
        return Err(TurnError::OrderSettled(done.id));
    }

    let kinds = parse_batch(&orders)?;
    let stored = game.store.replace_submitted(turn, ship, kinds)?;
    invalidate_gate(game)?;
    tracing::info!(%turn, ship, orders = stored.len(), "orders submitted");
    Ok(stored)
}

/// Orders of the current turn, optionally for one ship.
pub fn list(game: &Game, ship: Option<ShipId>) -> Result<Vec<Order>> {
    let turn = game.pipeline.turn;
    match ship {
        Some(ship) => game.store.orders_for_ship(turn, ship),
        None => game.store.orders_for_turn(turn),
    }
}

/// Replace the command and parameters of one pending order, keeping its id
/// and position.
pub fn edit(game: &mut Game, ship: ShipId, lane: Lane, seq: u32, order: NormalizedOrder) -> Result<Order> {
    game.pipeline.ensure_orders_editable()?;
    let kind = order.to_kind()?;
    let mut orders = lane_orders(game, ship, lane)?;
    let idx = position(&orders, ship, lane, seq)?;
    ensure_pending(&orders[idx])?;

    orders[idx].kind = kind;
    orders[idx].unit_cost = 0;
    let edited = orders[idx].clone();
    game.store.rewrite_lane(game.pipeline.turn, ship, lane, &orders)?;
    invalidate_gate(game)?;
    tracing::info!(ship, order = edited.id, %lane, seq, "order edited");
    Ok(edited)
}

/// Remove one pending order; later orders in the lane move up.
pub fn delete(game: &mut Game, ship: ShipId, lane: Lane, seq: u32) -> Result<Order> {
    game.pipeline.ensure_orders_editable()?;
    let mut orders = lane_orders(game, ship, lane)?;
    let idx = position(&orders, ship, lane, seq)?;
    ensure_pending(&orders[idx])?;

    let removed = orders.remove(idx);
    renumber(&mut orders);
    game.store.rewrite_lane(game.pipeline.turn, ship, lane, &orders)?;
    invalidate_gate(game)?;
    tracing::info!(ship, order = removed.id, %lane, seq, "order deleted");
    Ok(removed)
}

/// Insert a new order so that it runs at `seq` (1-based); orders at and after
/// that position shift down. A `seq` past the end appends.
pub fn insert_at(game: &mut Game, ship: ShipId, lane: Lane, seq: u32, order: NormalizedOrder) -> Result<Order> {
    game.pipeline.ensure_orders_editable()?;
    game.store.ship(ship)?;
    let kind = order.to_kind()?;
    let mut orders = lane_orders(game, ship, lane)?;
    let idx = (seq.max(1) as usize - 1).min(orders.len());
    if let Some(done) = orders[idx..].iter().find(|o| o.is_settled()) {
        return Err(TurnError::OrderSettled(done.id));
    }

    let turn = game.pipeline.turn;
    let id = game.store.allocate_order_id()?;
    orders.insert(idx, Order::new(id, turn, ship, lane, 0, kind));
    renumber(&mut orders);
    let inserted = orders[idx].clone();
    game.store.rewrite_lane(turn, ship, lane, &orders)?;
    invalidate_gate(game)?;
    tracing::info!(ship, order = id, %lane, seq = inserted.seq, "order inserted");
    Ok(inserted)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn lane_orders(game: &Game, ship: ShipId, lane: Lane) -> Result<Vec<Order>> {
    Ok(game
        .store
        .orders_for_ship(game.pipeline.turn, ship)?
        .into_iter()
        .filter(|o| o.lane == lane)
        .collect())
}

fn position(orders: &[Order], ship: ShipId, lane: Lane, seq: u32) -> Result<usize> {
    orders
        .iter()
        .position(|o| o.seq == seq)
        .ok_or_else(|| TurnError::OrderNotFound {
            ship,
            lane: lane.to_string(),
            seq,
        })
}

fn ensure_pending(order: &Order) -> Result<()> {
    if order.is_settled() {
        return Err(TurnError::OrderSettled(order.id));
    }
    Ok(())
}

fn renumber(orders: &mut [Order]) {
    for (i, o) in orders.iter_mut().enumerate() {
        o.seq = i as u32 + 1;
    }
}

fn invalidate_gate(game: &mut Game) -> Result<()> {
    if game.pipeline.is_phase_done(Phase::Gate) {
        game.pipeline.clear_phase(Phase::Gate);
        game.save_pipeline()?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
