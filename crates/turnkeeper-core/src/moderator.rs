//! Moderator arbitration: free-text requests only a human can answer.
//!
//! Layout:
//!   .turnkeeper/moderator.yaml  list of all moderator actions
//!
//! IDs are sequential: M1, M2, M3, …
//! Each action belongs to exactly one MODERATOR order (by order id), so
//! re-running the gate, or carrying the order into a later turn, never
//! creates a second action for the same request.

use crate::error::{Result, TurnError};
use crate::io;
use crate::order::{Order, OrderKind};
use crate::paths;
use crate::types::{OrderId, ShipId, TurnId};
use crate::world::World;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeratorStatus {
    Pending,
    Responded,
    Resolved,
}

impl std::fmt::Display for ModeratorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModeratorStatus::Pending => f.write_str("pending"),
            ModeratorStatus::Responded => f.write_str("responded"),
            ModeratorStatus::Resolved => f.write_str("resolved"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeratorAction {
    pub id: String,
    pub order: OrderId,
    pub turn: TurnId,
    pub ship: ShipId,
    /// Player name and account number of the ship's owner.
    pub requester: String,
    pub request: String,
    pub status: ModeratorStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    /// The response is the fixed no-response text from a forced resolve.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub sentinel: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responded_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl ModeratorAction {
    pub fn new(
        id: impl Into<String>,
        order: OrderId,
        turn: TurnId,
        ship: ShipId,
        requester: impl Into<String>,
        request: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            order,
            turn,
            ship,
            requester: requester.into(),
            request: request.into(),
            status: ModeratorStatus::Pending,
            response: None,
            sentinel: false,
            created_at: Utc::now(),
            responded_at: None,
            resolved_at: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Internal file I/O
// ---------------------------------------------------------------------------

fn load_all(root: &Path) -> Result<Vec<ModeratorAction>> {
    Ok(io::read_yaml(&paths::moderator_path(root))?.unwrap_or_default())
}

fn save_all(path: &Path, items: &[ModeratorAction]) -> Result<()> {
    let content = serde_yaml::to_string(items)?;
    io::atomic_write(path, content.as_bytes())
}

fn next_id(items: &[ModeratorAction]) -> String {
    format!("M{}", items.len() + 1)
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// List actions. `None` lists pending ones; `Some("all")` lists everything.
pub fn list(root: &Path, status_filter: Option<&str>) -> Result<Vec<ModeratorAction>> {
    let items = load_all(root)?;
    let wanted = match status_filter {
        Some("all") => return Ok(items),
        Some("responded") => ModeratorStatus::Responded,
        Some("resolved") => ModeratorStatus::Resolved,
        _ => ModeratorStatus::Pending,
    };
    Ok(items.into_iter().filter(|a| a.status == wanted).collect())
}

pub fn get(root: &Path, id: &str) -> Result<ModeratorAction> {
    load_all(root)?
        .into_iter()
        .find(|a| a.id == id)
        .ok_or_else(|| TurnError::ModeratorActionNotFound(id.to_string()))
}

/// Record (or overwrite) the moderator's response. Resolved actions are
/// closed: their response has already been delivered.
pub fn respond(root: &Path, id: &str, response: &str) -> Result<ModeratorAction> {
    let response = response.trim();
    if response.is_empty() {
        return Err(TurnError::Validation("response must not be empty".to_string()));
    }
    let mut items = load_all(root)?;
    let item = items
        .iter_mut()
        .find(|a| a.id == id)
        .ok_or_else(|| TurnError::ModeratorActionNotFound(id.to_string()))?;
    if item.status == ModeratorStatus::Resolved {
        return Err(TurnError::ModeratorActionResolved(id.to_string()));
    }
    item.status = ModeratorStatus::Responded;
    item.response = Some(response.to_string());
    item.responded_at = Some(Utc::now());
    let updated = item.clone();
    save_all(&paths::moderator_path(root), &items)?;
    tracing::info!(action = %updated.id, ship = updated.ship, "moderator responded");
    Ok(updated)
}

/// Every action whose originating order is in `orders`.
pub fn for_orders(root: &Path, orders: &[OrderId]) -> Result<Vec<ModeratorAction>> {
    Ok(load_all(root)?
        .into_iter()
        .filter(|a| orders.contains(&a.order))
        .collect())
}

// ---------------------------------------------------------------------------
// Gate
// ---------------------------------------------------------------------------

/// One unanswered request, as shown to the moderator when a turn holds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GateRequest {
    pub action: String,
    pub ship: ShipId,
    pub ship_name: String,
    pub requester: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    /// Nothing is waiting, or the resolve is forced and `unanswered`
    /// requests will receive the sentinel at execution.
    Proceed { unanswered: usize },
    Hold(Vec<GateRequest>),
}

/// Scan the batch for MODERATOR orders, create any missing actions, and
/// decide whether resolution may continue. Touches nothing but
/// `moderator.yaml`.
pub fn gate(root: &Path, world: &World, batch: &[Order], forced: bool) -> Result<GateDecision> {
    let mut items = load_all(root)?;
    let mut created = 0;

    for order in batch {
        let OrderKind::Moderator(req) = &order.kind else {
            continue;
        };
        if items.iter().any(|a| a.order == order.id) {
            continue;
        }
        let requester = world
            .ships
            .get(&order.ship)
            .and_then(|s| world.players.get(&s.owner))
            .map(|p| format!("{} ({})", p.name, p.account))
            .unwrap_or_else(|| "unknown".to_string());
        let action = ModeratorAction::new(
            next_id(&items),
            order.id,
            order.turn,
            order.ship,
            requester,
            req.text.clone(),
        );
        tracing::info!(action = %action.id, ship = order.ship, "moderator request opened");
        items.push(action);
        created += 1;
    }
    if created > 0 {
        save_all(&paths::moderator_path(root), &items)?;
    }

    let pending: Vec<GateRequest> = batch
        .iter()
        .filter_map(|o| items.iter().find(|a| a.order == o.id))
        .filter(|a| a.status == ModeratorStatus::Pending)
        .map(|a| GateRequest {
            action: a.id.clone(),
            ship: a.ship,
            ship_name: world
                .ships
                .get(&a.ship)
                .map(|s| s.name.clone())
                .unwrap_or_default(),
            requester: a.requester.clone(),
            text: a.request.clone(),
        })
        .collect();

    if pending.is_empty() || forced {
        Ok(GateDecision::Proceed {
            unanswered: pending.len(),
        })
    } else {
        tracing::warn!(pending = pending.len(), "moderator requests awaiting response");
        Ok(GateDecision::Hold(pending))
    }
}

// ---------------------------------------------------------------------------
// ArbitrationDesk
// ---------------------------------------------------------------------------

/// The executor's view of moderator actions: hands out responses as
/// MODERATOR orders execute and persists the resolutions.
#[derive(Debug)]
pub struct ArbitrationDesk {
    path: Option<PathBuf>,
    items: Vec<ModeratorAction>,
    forced: bool,
    sentinel: String,
    dirty: bool,
}

impl ArbitrationDesk {
    pub fn open(root: &Path, forced: bool, sentinel: impl Into<String>) -> Result<Self> {
        Ok(Self {
            path: Some(paths::moderator_path(root)),
            items: load_all(root)?,
            forced,
            sentinel: sentinel.into(),
            dirty: false,
        })
    }

    /// A desk that never touches disk.
    pub fn in_memory(items: Vec<ModeratorAction>, forced: bool, sentinel: impl Into<String>) -> Self {
        Self {
            path: None,
            items,
            forced,
            sentinel: sentinel.into(),
            dirty: false,
        }
    }

    pub fn items(&self) -> &[ModeratorAction] {
        &self.items
    }

    fn find(&self, order: OrderId) -> Option<&ModeratorAction> {
        self.items.iter().find(|a| a.order == order)
    }

    pub fn can_settle(&self, order: OrderId) -> bool {
        match self.find(order) {
            Some(a) if a.status == ModeratorStatus::Pending => self.forced,
            Some(_) => true,
            None => false,
        }
    }

    /// Deliver the response for `order`, marking its action resolved.
    /// Settling an already resolved action returns the stored response.
    pub fn settle(&mut self, order: OrderId) -> Result<String> {
        let forced = self.forced;
        let sentinel = self.sentinel.clone();
        let item = self
            .items
            .iter_mut()
            .find(|a| a.order == order)
            .ok_or_else(|| TurnError::ModeratorActionNotFound(format!("order {order}")))?;
        match item.status {
            ModeratorStatus::Resolved => {}
            ModeratorStatus::Responded => {
                item.status = ModeratorStatus::Resolved;
                item.resolved_at = Some(Utc::now());
                self.dirty = true;
            }
            ModeratorStatus::Pending if forced => {
                item.status = ModeratorStatus::Resolved;
                item.response = Some(sentinel);
                item.sentinel = true;
                item.resolved_at = Some(Utc::now());
                self.dirty = true;
                tracing::warn!(action = %item.id, "no moderator response; sentinel substituted");
            }
            ModeratorStatus::Pending => {
                return Err(TurnError::PendingModeration {
                    turn: item.turn.to_string(),
                    pending: 1,
                });
            }
        }
        Ok(item.response.clone().unwrap_or_default())
    }

    /// Pending actions among `orders`; blocks completion unless forced.
    pub fn pending_among(&self, orders: &[OrderId]) -> usize {
        if self.forced {
            return 0;
        }
        self.items
            .iter()
            .filter(|a| a.status == ModeratorStatus::Pending && orders.contains(&a.order))
            .count()
    }

    /// Persist resolutions made since the last flush.
    pub fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        if let Some(path) = &self.path {
            save_all(path, &self.items)?;
        }
        self.dirty = false;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
