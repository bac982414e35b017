//! Orders: the closed set of order kinds, their normalized input form, and
//! the persisted per-order record.

use crate::config::CostTable;
use crate::error::{Result, TurnError};
use crate::handlers::comms::{Message, Moderator, RenameShip};
use crate::handlers::movement::{Move, Wait};
use crate::handlers::navigation::{Dock, Land, Orbit};
use crate::handlers::trade::{Buy, Sell};
use crate::types::{GridPos, OrderId, ShipId, TurnId};
use crate::world::Ship;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

// ---------------------------------------------------------------------------
// OrderKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderKind {
    Wait(Wait),
    Move(Move),
    LocationScan,
    SystemScan,
    Orbit(Orbit),
    Dock(Dock),
    Undock,
    Land(Land),
    Takeoff,
    Buy(Buy),
    Sell(Sell),
    GetMarket,
    Message(Message),
    RenameShip(RenameShip),
    Moderator(Moderator),
    Clear,
}

impl OrderKind {
    pub fn command(&self) -> &'static str {
        match self {
            OrderKind::Wait(_) => "WAIT",
            OrderKind::Move(_) => "MOVE",
            OrderKind::LocationScan => "LOCATIONSCAN",
            OrderKind::SystemScan => "SYSTEMSCAN",
            OrderKind::Orbit(_) => "ORBIT",
            OrderKind::Dock(_) => "DOCK",
            OrderKind::Undock => "UNDOCK",
            OrderKind::Land(_) => "LAND",
            OrderKind::Takeoff => "TAKEOFF",
            OrderKind::Buy(_) => "BUY",
            OrderKind::Sell(_) => "SELL",
            OrderKind::GetMarket => "GETMARKET",
            OrderKind::Message(_) => "MESSAGE",
            OrderKind::RenameShip(_) => "RENAMESHIP",
            OrderKind::Moderator(_) => "MODERATOR",
            OrderKind::Clear => "CLEAR",
        }
    }

    /// Base TU cost of one atomic action before efficiency penalties.
    /// For MOVE this is the per-square cost.
    pub fn base_cost(&self, costs: &CostTable) -> u32 {
        match self {
            OrderKind::Wait(w) => w.tu,
            OrderKind::Move(_) => costs.move_step,
            OrderKind::LocationScan => costs.location_scan,
            OrderKind::SystemScan => costs.system_scan,
            OrderKind::Orbit(_) => costs.orbit,
            OrderKind::Dock(_) => costs.dock,
            OrderKind::Undock => costs.undock,
            OrderKind::Land(_) => costs.land,
            OrderKind::Takeoff => costs.takeoff,
            OrderKind::Buy(_)
            | OrderKind::Sell(_)
            | OrderKind::GetMarket
            | OrderKind::Message(_)
            | OrderKind::RenameShip(_)
            | OrderKind::Moderator(_)
            | OrderKind::Clear => 0,
        }
    }

    /// TU charged for the next atomic action given the ship's current state.
    /// WAIT clamps to what is left; a MOVE to the square the ship already
    /// occupies is free.
    pub fn step_cost(&self, unit_cost: u32, ship: &Ship) -> u32 {
        match self {
            OrderKind::Wait(_) => unit_cost.min(ship.tu_remaining),
            OrderKind::Move(m) if m.arrived(ship) => 0,
            _ => unit_cost,
        }
    }

    /// Whether the order is finished once its latest atomic action applied.
    pub fn is_complete(&self, ship: &Ship) -> bool {
        match self {
            OrderKind::Move(m) => m.arrived(ship),
            _ => true,
        }
    }

    pub fn is_arbitration(&self) -> bool {
        matches!(self, OrderKind::Moderator(_))
    }

    pub fn is_clear(&self) -> bool {
        matches!(self, OrderKind::Clear)
    }

    // ---------------------------------------------------------------------------
    // Parsing
    // ---------------------------------------------------------------------------

    /// Build a typed order from its normalized `(command, params)` form.
    /// Params may be a bare scalar, a whitespace-separated string, or a map.
    pub fn parse(command: &str, params: &Value) -> Result<Self> {
        let cmd = command.trim().to_ascii_uppercase();
        let p = Params { cmd: &cmd, raw: params };
        let kind = match cmd.as_str() {
            "WAIT" => OrderKind::Wait(Wait {
                tu: p.number(&["tu", "amount"], 0)?,
            }),
            "MOVE" => OrderKind::Move(Move {
                to: p.coordinate()?,
            }),
            "LOCATIONSCAN" => OrderKind::LocationScan,
            "SYSTEMSCAN" => OrderKind::SystemScan,
            "ORBIT" => OrderKind::Orbit(Orbit {
                body: p.id(&["body", "target"])?,
            }),
            "DOCK" => OrderKind::Dock(Dock {
                base: p.id(&["base", "target"])?,
            }),
            "UNDOCK" => OrderKind::Undock,
            "LAND" => OrderKind::Land(Land {
                body: p.id(&["body", "target"])?,
            }),
            "TAKEOFF" => OrderKind::Takeoff,
            "BUY" => {
                let (item, quantity) = p.trade()?;
                OrderKind::Buy(Buy { item, quantity })
            }
            "SELL" => {
                let (item, quantity) = p.trade()?;
                OrderKind::Sell(Sell { item, quantity })
            }
            "GETMARKET" => OrderKind::GetMarket,
            "MESSAGE" => {
                let (to, text) = p.message()?;
                OrderKind::Message(Message { to, text })
            }
            "RENAMESHIP" => OrderKind::RenameShip(RenameShip {
                name: p.text(&["name"])?,
            }),
            "MODERATOR" => OrderKind::Moderator(Moderator {
                text: p.text(&["text", "message"])?,
            }),
            "CLEAR" => OrderKind::Clear,
            "" => return Err(TurnError::Validation("missing command".to_string())),
            other => return Err(TurnError::Validation(format!("unknown command '{other}'"))),
        };
        Ok(kind)
    }
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.command())?;
        match self {
            OrderKind::Wait(w) => write!(f, " {}", w.tu),
            OrderKind::Move(m) => write!(f, " {}", m.to),
            OrderKind::Orbit(o) => write!(f, " {}", o.body),
            OrderKind::Dock(d) => write!(f, " {}", d.base),
            OrderKind::Land(l) => write!(f, " {}", l.body),
            OrderKind::Buy(t) => write!(f, " {} {}", t.item, t.quantity),
            OrderKind::Sell(t) => write!(f, " {} {}", t.item, t.quantity),
            OrderKind::Message(m) => write!(f, " {} {{{}}}", m.to, m.text),
            OrderKind::RenameShip(r) => write!(f, " {{{}}}", r.name),
            OrderKind::Moderator(m) => write!(f, " {{{}}}", m.text),
            _ => Ok(()),
        }
    }
}

/// Param extraction shared by every command.
struct Params<'a> {
    cmd: &'a str,
    raw: &'a Value,
}

impl Params<'_> {
    fn invalid(&self, what: &str) -> TurnError {
        TurnError::Validation(format!("{}: {what}", self.cmd))
    }

    /// First matching key of a map, or the value itself when it is a scalar.
    fn field(&self, keys: &[&str]) -> Option<&Value> {
        match self.raw {
            Value::Object(map) => keys.iter().find_map(|k| map.get(*k)),
            Value::Null => None,
            Value::Array(items) => items.first(),
            other => Some(other),
        }
    }

    /// `index`-th whitespace token when params is a plain string.
    fn token(&self, index: usize) -> Option<&str> {
        self.raw.as_str()?.split_whitespace().nth(index)
    }

    fn number(&self, keys: &[&str], index: usize) -> Result<u32> {
        let value = match self.raw {
            Value::String(_) => self.token(index).map(|t| Value::String(t.to_string())),
            _ => self.field(keys).cloned(),
        };
        let n = match value {
            Some(Value::Number(n)) => n.as_u64(),
            Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
            _ => None,
        };
        n.and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| self.invalid(&format!("expected a non-negative whole number for '{}'", keys[0])))
    }

    fn id(&self, keys: &[&str]) -> Result<u64> {
        let n = match self.field(keys) {
            Some(Value::Number(n)) => n.as_u64(),
            Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
            _ => None,
        };
        n.ok_or_else(|| self.invalid(&format!("expected a numeric {} id", keys[0])))
    }

    fn coordinate(&self) -> Result<GridPos> {
        let raw = self
            .field(&["to", "destination", "coordinate"])
            .and_then(Value::as_str)
            .ok_or_else(|| self.invalid("expected a coordinate such as M13"))?;
        raw.parse::<GridPos>()
            .map_err(|e| self.invalid(&e.to_string()))
    }

    fn text(&self, keys: &[&str]) -> Result<String> {
        let text = self
            .field(keys)
            .and_then(Value::as_str)
            .map(|s| s.trim().trim_start_matches('{').trim_end_matches('}').trim())
            .unwrap_or_default();
        if text.is_empty() {
            return Err(self.invalid(&format!("'{}' must not be empty", keys[0])));
        }
        Ok(text.to_string())
    }

    fn trade(&self) -> Result<(String, u32)> {
        let item = match self.raw {
            Value::String(_) => self.token(0).map(str::to_string),
            _ => self
                .field(&["item"])
                .and_then(Value::as_str)
                .map(str::to_string),
        }
        .map(|i| i.to_ascii_lowercase())
        .filter(|i| !i.is_empty())
        .ok_or_else(|| self.invalid("expected an item name"))?;
        let quantity = self.number(&["quantity", "qty"], 1)?;
        if quantity == 0 {
            return Err(self.invalid("quantity must be at least 1"));
        }
        Ok((item, quantity))
    }

    fn message(&self) -> Result<(u64, String)> {
        if let Value::String(raw) = self.raw {
            let (to, text) = raw
                .trim()
                .split_once(char::is_whitespace)
                .ok_or_else(|| self.invalid("expected '<player id> {text}'"))?;
            let to = to
                .parse::<u64>()
                .map_err(|_| self.invalid("expected a numeric player id"))?;
            let nested = Params {
                cmd: self.cmd,
                raw: &Value::String(text.to_string()),
            };
            return Ok((to, nested.text(&["text"])?));
        }
        Ok((self.id(&["to", "target"])?, self.text(&["text", "message"])?))
    }
}

/// An order as handed in by the (external) order-file parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedOrder {
    pub command: String,
    #[serde(default)]
    pub params: Value,
}

impl NormalizedOrder {
    pub fn new(command: impl Into<String>, params: Value) -> Self {
        Self {
            command: command.into(),
            params,
        }
    }

    pub fn to_kind(&self) -> Result<OrderKind> {
        OrderKind::parse(&self.command, &self.params)
    }
}

/// Parse a whole submission. Every malformed entry is reported, numbered
/// from 1; nothing is accepted unless all entries parse.
pub fn parse_batch(orders: &[NormalizedOrder]) -> Result<Vec<OrderKind>> {
    let mut kinds = Vec::with_capacity(orders.len());
    let mut problems = Vec::new();
    for (i, order) in orders.iter().enumerate() {
        match order.to_kind() {
            Ok(kind) => kinds.push(kind),
            Err(TurnError::Validation(msg)) => problems.push(format!("#{}: {msg}", i + 1)),
            Err(e) => return Err(e),
        }
    }
    if problems.is_empty() {
        Ok(kinds)
    } else {
        Err(TurnError::Validation(problems.join("; ")))
    }
}

// ---------------------------------------------------------------------------
// Order record
// ---------------------------------------------------------------------------

/// Carried orders (last turn's overflow) always run ahead of new submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lane {
    Carried,
    Submitted,
}

impl Lane {
    pub fn as_str(self) -> &'static str {
        match self {
            Lane::Carried => "carried",
            Lane::Submitted => "submitted",
        }
    }

    pub fn key_byte(self) -> u8 {
        match self {
            Lane::Carried => 0,
            Lane::Submitted => 1,
        }
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Lane {
    type Err = TurnError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "carried" | "overflow" => Ok(Lane::Carried),
            "submitted" | "new" => Ok(Lane::Submitted),
            other => Err(TurnError::Validation(format!(
                "unknown lane '{other}' (expected carried or submitted)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Succeeded,
    Failed,
    Overflow,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Succeeded => "succeeded",
            OrderStatus::Failed => "failed",
            OrderStatus::Overflow => "overflow",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const ORDER_KEY_LEN: usize = 18;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Global, monotonic; also the submission stamp used to break ties.
    pub id: OrderId,
    pub turn: TurnId,
    pub ship: ShipId,
    pub lane: Lane,
    pub seq: u32,
    pub kind: OrderKind,
    pub status: OrderStatus,
    /// Efficiency-adjusted cost of one atomic action.
    #[serde(default)]
    pub unit_cost: u32,
    #[serde(default)]
    pub tu_spent: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tu_before: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carried_from: Option<TurnId>,
}

impl Order {
    pub fn new(id: OrderId, turn: TurnId, ship: ShipId, lane: Lane, seq: u32, kind: OrderKind) -> Self {
        Self {
            id,
            turn,
            ship,
            lane,
            seq,
            kind,
            status: OrderStatus::Pending,
            unit_cost: 0,
            tu_spent: 0,
            tu_before: None,
            result: None,
            carried_from: None,
        }
    }

    /// `turn(5) | ship(8) | lane(1) | seq(4)`, big-endian, so a range scan
    /// yields a ship's orders carried-first in sequence order.
    pub fn key(&self) -> [u8; ORDER_KEY_LEN] {
        order_key(self.turn, self.ship, self.lane, self.seq)
    }

    pub fn is_settled(&self) -> bool {
        self.status != OrderStatus::Pending
    }
}

pub fn order_key(turn: TurnId, ship: ShipId, lane: Lane, seq: u32) -> [u8; ORDER_KEY_LEN] {
    let mut key = [0u8; ORDER_KEY_LEN];
    key[..5].copy_from_slice(&turn.key_bytes());
    key[5..13].copy_from_slice(&ship.to_be_bytes());
    key[13] = lane.key_byte();
    key[14..].copy_from_slice(&seq.to_be_bytes());
    key
}

/// Efficiency-adjusted cost: `ceil(base × (1 + max(0, 1 − efficiency)))`,
/// computed in integers so 0.7 efficiency on 20 TU is exactly 26.
pub fn effective_cost(base: u32, ship: &Ship) -> u32 {
    let required = ship.crew_required as u64;
    if required == 0 {
        return base;
    }
    let crew = (ship.crew_count as u64).min(required);
    let scaled = base as u64 * (2 * required - crew);
    u32::try_from(scaled.div_ceil(required)).unwrap_or(u32::MAX)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
