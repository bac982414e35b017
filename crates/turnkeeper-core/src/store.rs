//! Persistent game state in redb.
//!
//! # Table design
//!
//! World records (`ships`, `players`, `bases`, `bodies`, `systems`) are keyed
//! by their numeric id. Turn-scoped tables use big-endian composite keys so
//! byte order equals logical order and a single range scan answers every
//! query without post-sorting:
//!
//! ```text
//! orders     [ turn: 5 | ship: u64 | lane: u8 | seq: u32 ]   (18 bytes)
//! log        [ turn: 5 | tick: u32 ]                          (9 bytes)
//! snapshots  [ turn: 5 ]
//! ```
//!
//! `overflow` is keyed by ship id. Every value is JSON. Counters live in
//! `meta`.
//!
//! Each executed atomic action is committed through [`GameStore::commit_step`]
//! as one write transaction, so a crash never leaves an action half-applied.

use crate::error::{store_err, Result, TurnError};
use crate::order::{order_key, Lane, Order, OrderKind, ORDER_KEY_LEN};
use crate::overflow::OverflowEntry;
use crate::types::{OrderId, ShipId, TurnId};
use crate::world::{Base, Body, Player, Ship, StarSystem, World};
use redb::{Database, ReadableTable, TableDefinition, WriteTransaction};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

// ---------------------------------------------------------------------------
// Table definitions
// ---------------------------------------------------------------------------

type RecordTable = TableDefinition<'static, u64, &'static [u8]>;
type KeyedTable = TableDefinition<'static, &'static [u8], &'static [u8]>;

const SHIPS: RecordTable = TableDefinition::new("ships");
const PLAYERS: RecordTable = TableDefinition::new("players");
const BASES: RecordTable = TableDefinition::new("bases");
const BODIES: RecordTable = TableDefinition::new("bodies");
const SYSTEMS: RecordTable = TableDefinition::new("systems");
const OVERFLOW: RecordTable = TableDefinition::new("overflow");
const ORDERS: KeyedTable = TableDefinition::new("orders");
const LOG: KeyedTable = TableDefinition::new("log");
const SNAPSHOTS: KeyedTable = TableDefinition::new("snapshots");
const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

const NEXT_ORDER_ID: &str = "next_order_id";

// ---------------------------------------------------------------------------
// Key helpers
// ---------------------------------------------------------------------------

/// Inclusive `[lo, hi]` bounds covering every key that starts with `prefix`.
fn prefix_bounds<const N: usize>(prefix: &[u8]) -> ([u8; N], [u8; N]) {
    let mut lo = [0u8; N];
    let mut hi = [0xffu8; N];
    lo[..prefix.len()].copy_from_slice(prefix);
    hi[..prefix.len()].copy_from_slice(prefix);
    (lo, hi)
}

fn ship_prefix(turn: TurnId, ship: ShipId) -> [u8; 13] {
    let mut prefix = [0u8; 13];
    prefix[..5].copy_from_slice(&turn.key_bytes());
    prefix[5..].copy_from_slice(&ship.to_be_bytes());
    prefix
}

fn log_key(turn: TurnId, tick: u32) -> [u8; 9] {
    let mut key = [0u8; 9];
    key[..5].copy_from_slice(&turn.key_bytes());
    key[5..].copy_from_slice(&tick.to_be_bytes());
    key
}

// ---------------------------------------------------------------------------
// Log entries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Succeeded,
    Failed,
    Overflow,
    Upkeep,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Outcome::Succeeded => "succeeded",
            Outcome::Failed => "failed",
            Outcome::Overflow => "overflow",
            Outcome::Upkeep => "upkeep",
        };
        f.write_str(s)
    }
}

/// One line of a turn's execution log. Ticks are global across ships, so
/// sorting by tick reproduces the interleaved execution order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub turn: TurnId,
    pub tick: u32,
    pub ship: ShipId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<OrderId>,
    /// Display form of the order, e.g. `MOVE M13`.
    pub action: String,
    pub outcome: Outcome,
    pub tu_before: u32,
    pub tu_after: u32,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Step
// ---------------------------------------------------------------------------

/// Everything one atomic action changed, written in a single transaction.
#[derive(Debug, Clone, Default)]
pub struct Step {
    pub ships: Vec<Ship>,
    pub players: Vec<Player>,
    pub orders: Vec<Order>,
    pub log: Vec<LogEntry>,
    /// Replaces the ship's overflow record.
    pub overflow: Vec<(ShipId, Vec<OverflowEntry>)>,
}

// ---------------------------------------------------------------------------
// GameStore
// ---------------------------------------------------------------------------

pub struct GameStore {
    db: Database,
}

impl GameStore {
    /// Open or create the database at `path`, creating every table.
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path).map_err(store_err)?;
        let wt = db.begin_write().map_err(store_err)?;
        for def in [SHIPS, PLAYERS, BASES, BODIES, SYSTEMS, OVERFLOW] {
            wt.open_table(def).map_err(store_err)?;
        }
        for def in [ORDERS, LOG, SNAPSHOTS] {
            wt.open_table(def).map_err(store_err)?;
        }
        wt.open_table(META).map_err(store_err)?;
        wt.commit().map_err(store_err)?;
        Ok(Self { db })
    }

    // ---------------------------------------------------------------------------
    // Generic helpers
    // ---------------------------------------------------------------------------

    fn put_record<T: Serialize>(wt: &WriteTransaction, def: RecordTable, id: u64, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        let mut table = wt.open_table(def).map_err(store_err)?;
        table.insert(id, bytes.as_slice()).map_err(store_err)?;
        Ok(())
    }

    fn put_keyed<T: Serialize>(wt: &WriteTransaction, def: KeyedTable, key: &[u8], value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        let mut table = wt.open_table(def).map_err(store_err)?;
        table.insert(key, bytes.as_slice()).map_err(store_err)?;
        Ok(())
    }

    fn read_records<T: DeserializeOwned>(&self, def: RecordTable) -> Result<Vec<T>> {
        let rt = self.db.begin_read().map_err(store_err)?;
        let table = rt.open_table(def).map_err(store_err)?;
        let mut out = Vec::new();
        for entry in table.iter().map_err(store_err)? {
            let (_, v) = entry.map_err(store_err)?;
            out.push(serde_json::from_slice(v.value())?);
        }
        Ok(out)
    }

    fn read_record<T: DeserializeOwned>(&self, def: RecordTable, id: u64) -> Result<Option<T>> {
        let rt = self.db.begin_read().map_err(store_err)?;
        let table = rt.open_table(def).map_err(store_err)?;
        match table.get(id).map_err(store_err)? {
            Some(v) => Ok(Some(serde_json::from_slice(v.value())?)),
            None => Ok(None),
        }
    }

    fn read_range<T: DeserializeOwned>(&self, def: KeyedTable, lo: &[u8], hi: &[u8]) -> Result<Vec<T>> {
        let rt = self.db.begin_read().map_err(store_err)?;
        let table = rt.open_table(def).map_err(store_err)?;
        let mut out = Vec::new();
        for entry in table.range(lo..=hi).map_err(store_err)? {
            let (_, v) = entry.map_err(store_err)?;
            out.push(serde_json::from_slice(v.value())?);
        }
        Ok(out)
    }

    /// Remove every key in `[lo, hi]`; returns how many were removed.
    fn remove_range(wt: &WriteTransaction, def: KeyedTable, lo: &[u8], hi: &[u8]) -> Result<usize> {
        let mut table = wt.open_table(def).map_err(store_err)?;
        let keys: Vec<Vec<u8>> = table
            .range(lo..=hi)
            .map_err(store_err)?
            .map(|entry| entry.map(|(k, _)| k.value().to_vec()))
            .collect::<std::result::Result<_, _>>()
            .map_err(store_err)?;
        for key in &keys {
            table.remove(key.as_slice()).map_err(store_err)?;
        }
        Ok(keys.len())
    }

    fn allocate_ids(wt: &WriteTransaction, count: u64) -> Result<OrderId> {
        let mut meta = wt.open_table(META).map_err(store_err)?;
        let first = meta
            .get(NEXT_ORDER_ID)
            .map_err(store_err)?
            .map(|v| v.value())
            .unwrap_or(1);
        meta.insert(NEXT_ORDER_ID, first + count).map_err(store_err)?;
        Ok(first)
    }

    // ---------------------------------------------------------------------------
    // World
    // ---------------------------------------------------------------------------

    pub fn load_world(&self) -> Result<World> {
        let mut world = World::default();
        for s in self.read_records::<StarSystem>(SYSTEMS)? {
            world.systems.insert(s.id, s);
        }
        for b in self.read_records::<Body>(BODIES)? {
            world.bodies.insert(b.id, b);
        }
        for b in self.read_records::<Base>(BASES)? {
            world.bases.insert(b.id, b);
        }
        for p in self.read_records::<Player>(PLAYERS)? {
            world.players.insert(p.id, p);
        }
        for s in self.read_records::<Ship>(SHIPS)? {
            world.ships.insert(s.id, s);
        }
        Ok(world)
    }

    /// Write every world record in one transaction.
    pub fn save_world(&self, world: &World) -> Result<()> {
        let wt = self.db.begin_write().map_err(store_err)?;
        for s in world.systems.values() {
            Self::put_record(&wt, SYSTEMS, s.id, s)?;
        }
        for b in world.bodies.values() {
            Self::put_record(&wt, BODIES, b.id, b)?;
        }
        for b in world.bases.values() {
            Self::put_record(&wt, BASES, b.id, b)?;
        }
        for p in world.players.values() {
            Self::put_record(&wt, PLAYERS, p.id, p)?;
        }
        for s in world.ships.values() {
            Self::put_record(&wt, SHIPS, s.id, s)?;
        }
        wt.commit().map_err(store_err)?;
        Ok(())
    }

    pub fn ship(&self, id: ShipId) -> Result<Ship> {
        self.read_record(SHIPS, id)?.ok_or(TurnError::ShipNotFound(id))
    }

    pub fn player(&self, id: u64) -> Result<Player> {
        self.read_record(PLAYERS, id)?.ok_or(TurnError::PlayerNotFound(id))
    }

    pub fn put_player(&self, player: &Player) -> Result<()> {
        self.commit_step(Step {
            players: vec![player.clone()],
            ..Step::default()
        })
    }

    // ---------------------------------------------------------------------------
    // Orders
    // ---------------------------------------------------------------------------

    /// All orders of `turn`, grouped by ship, carried lane first, then by sequence.
    pub fn orders_for_turn(&self, turn: TurnId) -> Result<Vec<Order>> {
        let (lo, hi) = prefix_bounds::<ORDER_KEY_LEN>(&turn.key_bytes());
        self.read_range(ORDERS, &lo, &hi)
    }

    pub fn orders_for_ship(&self, turn: TurnId, ship: ShipId) -> Result<Vec<Order>> {
        let (lo, hi) = prefix_bounds::<ORDER_KEY_LEN>(&ship_prefix(turn, ship));
        self.read_range(ORDERS, &lo, &hi)
    }

    /// Replace the ship's submitted lane for `turn` with `kinds`, assigning
    /// fresh order ids in submission order.
    pub fn replace_submitted(&self, turn: TurnId, ship: ShipId, kinds: Vec<OrderKind>) -> Result<Vec<Order>> {
        let wt = self.db.begin_write().map_err(store_err)?;
        let mut lane_prefix = [0u8; 14];
        lane_prefix[..13].copy_from_slice(&ship_prefix(turn, ship));
        lane_prefix[13] = Lane::Submitted.key_byte();
        let (lo, hi) = prefix_bounds::<ORDER_KEY_LEN>(&lane_prefix);
        Self::remove_range(&wt, ORDERS, &lo, &hi)?;

        let first = Self::allocate_ids(&wt, kinds.len() as u64)?;
        let orders: Vec<Order> = kinds
            .into_iter()
            .enumerate()
            .map(|(i, kind)| Order::new(first + i as u64, turn, ship, Lane::Submitted, i as u32 + 1, kind))
            .collect();
        for order in &orders {
            Self::put_keyed(&wt, ORDERS, &order.key(), order)?;
        }
        wt.commit().map_err(store_err)?;
        Ok(orders)
    }

    /// Rewrite one lane of a ship's orders: every existing entry in the lane
    /// is removed, then `orders` are written under their (new) sequences.
    pub fn rewrite_lane(&self, turn: TurnId, ship: ShipId, lane: Lane, orders: &[Order]) -> Result<()> {
        let wt = self.db.begin_write().map_err(store_err)?;
        let mut lane_prefix = [0u8; 14];
        lane_prefix[..13].copy_from_slice(&ship_prefix(turn, ship));
        lane_prefix[13] = lane.key_byte();
        let (lo, hi) = prefix_bounds::<ORDER_KEY_LEN>(&lane_prefix);
        Self::remove_range(&wt, ORDERS, &lo, &hi)?;
        for order in orders {
            Self::put_keyed(&wt, ORDERS, &order.key(), order)?;
        }
        wt.commit().map_err(store_err)?;
        Ok(())
    }

    pub fn allocate_order_id(&self) -> Result<OrderId> {
        let wt = self.db.begin_write().map_err(store_err)?;
        let id = Self::allocate_ids(&wt, 1)?;
        wt.commit().map_err(store_err)?;
        Ok(id)
    }

    pub fn order(&self, turn: TurnId, ship: ShipId, lane: Lane, seq: u32) -> Result<Option<Order>> {
        let key = order_key(turn, ship, lane, seq);
        self.read_range::<Order>(ORDERS, &key, &key)
            .map(|mut found| found.pop())
    }

    // ---------------------------------------------------------------------------
    // Overflow
    // ---------------------------------------------------------------------------

    pub fn overflow(&self, ship: ShipId) -> Result<Vec<OverflowEntry>> {
        Ok(self.read_record(OVERFLOW, ship)?.unwrap_or_default())
    }

    pub fn all_overflow(&self) -> Result<BTreeMap<ShipId, Vec<OverflowEntry>>> {
        let rt = self.db.begin_read().map_err(store_err)?;
        let table = rt.open_table(OVERFLOW).map_err(store_err)?;
        let mut out = BTreeMap::new();
        for entry in table.iter().map_err(store_err)? {
            let (k, v) = entry.map_err(store_err)?;
            let entries: Vec<OverflowEntry> = serde_json::from_slice(v.value())?;
            if !entries.is_empty() {
                out.insert(k.value(), entries);
            }
        }
        Ok(out)
    }

    /// Write carried orders into the turn and drop the overflow records they
    /// came from, atomically.
    pub fn materialize_overflow(&self, orders: &[Order], ships: &[ShipId]) -> Result<()> {
        let wt = self.db.begin_write().map_err(store_err)?;
        for order in orders {
            Self::put_keyed(&wt, ORDERS, &order.key(), order)?;
        }
        {
            let mut table = wt.open_table(OVERFLOW).map_err(store_err)?;
            for ship in ships {
                table.remove(*ship).map_err(store_err)?;
            }
        }
        wt.commit().map_err(store_err)?;
        Ok(())
    }

    // ---------------------------------------------------------------------------
    // Execution
    // ---------------------------------------------------------------------------

    /// Commit one atomic action: world records, orders, log entries and
    /// overflow in a single durable transaction.
    pub fn commit_step(&self, step: Step) -> Result<()> {
        let wt = self.db.begin_write().map_err(store_err)?;
        for ship in &step.ships {
            Self::put_record(&wt, SHIPS, ship.id, ship)?;
        }
        for player in &step.players {
            Self::put_record(&wt, PLAYERS, player.id, player)?;
        }
        for order in &step.orders {
            Self::put_keyed(&wt, ORDERS, &order.key(), order)?;
        }
        for entry in &step.log {
            Self::put_keyed(&wt, LOG, &log_key(entry.turn, entry.tick), entry)?;
        }
        for (ship, entries) in &step.overflow {
            Self::put_record(&wt, OVERFLOW, *ship, entries)?;
        }
        wt.commit().map_err(store_err)?;
        Ok(())
    }

    pub fn log_for_turn(&self, turn: TurnId) -> Result<Vec<LogEntry>> {
        let (lo, hi) = prefix_bounds::<9>(&turn.key_bytes());
        self.read_range(LOG, &lo, &hi)
    }

    /// Tick for the next log entry of `turn`.
    pub fn next_tick(&self, turn: TurnId) -> Result<u32> {
        let (lo, hi) = prefix_bounds::<9>(&turn.key_bytes());
        let rt = self.db.begin_read().map_err(store_err)?;
        let table = rt.open_table(LOG).map_err(store_err)?;
        let last = table.range(lo.as_slice()..=hi.as_slice()).map_err(store_err)?.next_back();
        match last {
            Some(entry) => {
                let (_, v) = entry.map_err(store_err)?;
                let entry: LogEntry = serde_json::from_slice(v.value())?;
                Ok(entry.tick + 1)
            }
            None => Ok(1),
        }
    }

    /// Number of `turn`'s orders in each status.
    pub fn order_counts(&self, turn: TurnId) -> Result<BTreeMap<String, usize>> {
        let mut counts = BTreeMap::new();
        for order in self.orders_for_turn(turn)? {
            *counts.entry(order.status.to_string()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    // ---------------------------------------------------------------------------
    // Snapshots
    // ---------------------------------------------------------------------------

    pub fn snapshot(&self, turn: TurnId) -> Result<Option<World>> {
        let key = turn.key_bytes();
        self.read_range::<World>(SNAPSHOTS, &key, &key)
            .map(|mut found| found.pop())
    }

    /// Store the world as it stood at the end of `turn`. Snapshots are
    /// immutable: a second write for the same turn is refused.
    pub fn write_snapshot(&self, turn: TurnId, world: &World) -> Result<()> {
        let key = turn.key_bytes();
        let wt = self.db.begin_write().map_err(store_err)?;
        {
            let table = wt.open_table(SNAPSHOTS).map_err(store_err)?;
            if table.get(key.as_slice()).map_err(store_err)?.is_some() {
                return Err(TurnError::SnapshotExists(turn.to_string()));
            }
        }
        Self::put_keyed(&wt, SNAPSHOTS, &key, world)?;
        wt.commit().map_err(store_err)?;
        Ok(())
    }

    pub fn snapshot_turns(&self) -> Result<Vec<TurnId>> {
        let rt = self.db.begin_read().map_err(store_err)?;
        let table = rt.open_table(SNAPSHOTS).map_err(store_err)?;
        let mut turns = Vec::new();
        for entry in table.iter().map_err(store_err)? {
            let (k, _) = entry.map_err(store_err)?;
            let raw = k.value();
            if raw.len() == 5 {
                let mut year = [0u8; 4];
                year.copy_from_slice(&raw[..4]);
                turns.push(TurnId::new(u32::from_be_bytes(year), raw[4]));
            }
        }
        Ok(turns)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
