//! Persistent world model shared by every order handler.
//!
//! The executor loads a [`World`] once per resolution, mutates it in place one
//! atomic action at a time, and writes back exactly the records each action
//! touched (see [`Touched`]).

use crate::error::{Result, TurnError};
use crate::types::{BaseId, BodyId, GridPos, PlayerId, ShipId, SystemId, TurnId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Ships
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ShipState {
    InSpace,
    Orbiting { body: BodyId },
    Docked { base: BaseId },
    Landed { body: BodyId },
    InTransit { destination: GridPos },
}

impl fmt::Display for ShipState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShipState::InSpace => f.write_str("in space"),
            ShipState::Orbiting { body } => write!(f, "orbiting {body}"),
            ShipState::Docked { base } => write!(f, "docked at {base}"),
            ShipState::Landed { body } => write!(f, "landed on {body}"),
            ShipState::InTransit { destination } => write!(f, "in transit to {destination}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ship {
    pub id: ShipId,
    pub name: String,
    pub owner: PlayerId,
    pub system: SystemId,
    pub position: GridPos,
    pub state: ShipState,
    pub tu_allowance: u32,
    pub tu_remaining: u32,
    pub crew_count: u32,
    pub crew_required: u32,
    #[serde(default)]
    pub cargo_capacity: u32,
    #[serde(default)]
    pub cargo: BTreeMap<String, u32>,
    #[serde(default = "default_sensor_range")]
    pub sensor_range: u32,
}

fn default_sensor_range() -> u32 {
    8
}

impl Ship {
    /// Crew efficiency in `[0, 1]`; a ship that needs no crew is fully efficient.
    pub fn efficiency(&self) -> f64 {
        if self.crew_required == 0 {
            return 1.0;
        }
        (self.crew_count as f64 / self.crew_required as f64).min(1.0)
    }

    /// TU already spent this turn.
    pub fn tu_spent(&self) -> u32 {
        self.tu_allowance.saturating_sub(self.tu_remaining)
    }

    pub fn cargo_used(&self) -> u32 {
        self.cargo.values().sum()
    }
}

// ---------------------------------------------------------------------------
// Players
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerStatus {
    Active,
    Suspended,
}

impl fmt::Display for PlayerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerStatus::Active => f.write_str("active"),
            PlayerStatus::Suspended => f.write_str("suspended"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboxMessage {
    pub turn: TurnId,
    pub from_player: PlayerId,
    pub from_ship: ShipId,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Star,
    Body,
    Base,
    Ship,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ObjectKind::Star => "star",
            ObjectKind::Body => "body",
            ObjectKind::Base => "base",
            ObjectKind::Ship => "ship",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub kind: ObjectKind,
    pub id: u64,
    pub name: String,
    pub system: SystemId,
    pub position: GridPos,
    pub last_seen: TurnId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub email: String,
    pub account: String,
    pub status: PlayerStatus,
    pub credits: u64,
    #[serde(default)]
    pub inbox: Vec<InboxMessage>,
    /// Keyed by `"<kind>:<id>"`.
    #[serde(default)]
    pub contacts: BTreeMap<String, Contact>,
}

impl Player {
    pub fn is_active(&self) -> bool {
        self.status == PlayerStatus::Active
    }

    pub fn record_contact(&mut self, contact: Contact) {
        let key = format!("{}:{}", contact.kind, contact.id);
        self.contacts.insert(key, contact);
    }
}

// ---------------------------------------------------------------------------
// Static content
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Base {
    pub id: BaseId,
    pub name: String,
    pub system: SystemId,
    pub position: GridPos,
    /// Item name → unit price in credits.
    #[serde(default)]
    pub market: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyKind {
    Planet,
    Moon,
    GasGiant,
    Asteroid,
}

impl BodyKind {
    /// Gas giants have no surface.
    pub fn landable(self) -> bool {
        !matches!(self, BodyKind::GasGiant)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Body {
    pub id: BodyId,
    pub name: String,
    pub kind: BodyKind,
    pub system: SystemId,
    pub position: GridPos,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StarSystem {
    pub id: SystemId,
    pub name: String,
    pub star: GridPos,
}

/// Something a scan can see.
#[derive(Debug, Clone, PartialEq)]
pub struct Sighting {
    pub kind: ObjectKind,
    pub id: u64,
    pub name: String,
    pub position: GridPos,
}

// ---------------------------------------------------------------------------
// Touched
// ---------------------------------------------------------------------------

/// A world record an action mutated and that must be persisted with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Touched {
    Ship(ShipId),
    Player(PlayerId),
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct World {
    pub systems: BTreeMap<SystemId, StarSystem>,
    pub bodies: BTreeMap<BodyId, Body>,
    pub bases: BTreeMap<BaseId, Base>,
    pub players: BTreeMap<PlayerId, Player>,
    pub ships: BTreeMap<ShipId, Ship>,
}

impl World {
    pub fn ship(&self, id: ShipId) -> Result<&Ship> {
        self.ships.get(&id).ok_or(TurnError::ShipNotFound(id))
    }

    pub fn ship_mut(&mut self, id: ShipId) -> Result<&mut Ship> {
        self.ships.get_mut(&id).ok_or(TurnError::ShipNotFound(id))
    }

    pub fn player(&self, id: PlayerId) -> Result<&Player> {
        self.players.get(&id).ok_or(TurnError::PlayerNotFound(id))
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Result<&mut Player> {
        self.players.get_mut(&id).ok_or(TurnError::PlayerNotFound(id))
    }

    /// A ship takes part in resolution only while its owner is active.
    pub fn ship_is_active(&self, id: ShipId) -> bool {
        self.ships
            .get(&id)
            .and_then(|s| self.players.get(&s.owner))
            .is_some_and(Player::is_active)
    }

    /// Everything in `system` except the ship `observer`.
    pub fn objects_in_system(&self, system: SystemId, observer: ShipId) -> Vec<Sighting> {
        let mut seen = Vec::new();
        if let Some(star) = self.systems.get(&system) {
            seen.push(Sighting {
                kind: ObjectKind::Star,
                id: star.id,
                name: star.name.clone(),
                position: star.star,
            });
        }
        seen.extend(
            self.bodies
                .values()
                .filter(|b| b.system == system)
                .map(|b| Sighting {
                    kind: ObjectKind::Body,
                    id: b.id,
                    name: b.name.clone(),
                    position: b.position,
                }),
        );
        seen.extend(
            self.bases
                .values()
                .filter(|b| b.system == system)
                .map(|b| Sighting {
                    kind: ObjectKind::Base,
                    id: b.id,
                    name: b.name.clone(),
                    position: b.position,
                }),
        );
        seen.extend(
            self.ships
                .values()
                .filter(|s| s.system == system && s.id != observer)
                .map(|s| Sighting {
                    kind: ObjectKind::Ship,
                    id: s.id,
                    name: s.name.clone(),
                    position: s.position,
                }),
        );
        seen
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
