//! Game setup and the per-command game handle.
//!
//! Layout:
//!   .turnkeeper/config.yaml     game configuration
//!   .turnkeeper/pipeline.yaml   turn pipeline state
//!   .turnkeeper/moderator.yaml  moderator actions
//!   .turnkeeper/game.db         world, orders, log, overflow, snapshots
//!
//! A [`Game`] is opened at the start of a command and passed explicitly to
//! every component call; nothing is held in globals.

use crate::config::Config;
use crate::error::{Result, TurnError};
use crate::io;
use crate::paths;
use crate::pipeline::Pipeline;
use crate::store::GameStore;
use crate::types::{GridPos, PlayerId, ShipId, SystemId};
use crate::world::{Base, Body, Player, PlayerStatus, Ship, ShipState, StarSystem, World};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Universe file
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct PlayerSeed {
    pub id: PlayerId,
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub credits: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShipSeed {
    pub id: ShipId,
    pub name: String,
    pub owner: PlayerId,
    pub system: SystemId,
    pub position: GridPos,
    #[serde(default = "in_space")]
    pub state: ShipState,
    #[serde(default)]
    pub tu_allowance: Option<u32>,
    #[serde(default)]
    pub crew_count: u32,
    #[serde(default)]
    pub crew_required: u32,
    #[serde(default)]
    pub cargo_capacity: u32,
    #[serde(default)]
    pub cargo: BTreeMap<String, u32>,
    #[serde(default)]
    pub sensor_range: Option<u32>,
}

fn in_space() -> ShipState {
    ShipState::InSpace
}

/// World content authored outside the engine.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Universe {
    #[serde(default)]
    pub systems: Vec<StarSystem>,
    #[serde(default)]
    pub bodies: Vec<Body>,
    #[serde(default)]
    pub bases: Vec<Base>,
    #[serde(default)]
    pub players: Vec<PlayerSeed>,
    #[serde(default)]
    pub ships: Vec<ShipSeed>,
}

fn unique<I: IntoIterator<Item = u64>>(what: &str, ids: I) -> Result<BTreeSet<u64>> {
    let mut seen = BTreeSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(TurnError::Universe(format!("duplicate {what} id {id}")));
        }
    }
    Ok(seen)
}

impl Universe {
    pub fn load(path: &Path) -> Result<Self> {
        io::read_yaml(path)?
            .ok_or_else(|| TurnError::Universe(format!("{} is missing or empty", path.display())))
    }

    /// Check references and build the starting world. Ships without an
    /// explicit allowance get `default_tu`; every ship starts with a full budget.
    pub fn into_world(self, default_tu: u32) -> Result<World> {
        let systems = unique("system", self.systems.iter().map(|s| s.id))?;
        unique("body", self.bodies.iter().map(|b| b.id))?;
        unique("base", self.bases.iter().map(|b| b.id))?;
        let players = unique("player", self.players.iter().map(|p| p.id))?;
        unique("ship", self.ships.iter().map(|s| s.id))?;

        for b in &self.bodies {
            if !systems.contains(&b.system) {
                return Err(TurnError::Universe(format!("body {} is in unknown system {}", b.id, b.system)));
            }
        }
        for b in &self.bases {
            if !systems.contains(&b.system) {
                return Err(TurnError::Universe(format!("base {} is in unknown system {}", b.id, b.system)));
            }
        }

        let players_by_id = self
            .players
            .into_iter()
            .map(|p| {
                let player = Player {
                    id: p.id,
                    name: p.name,
                    email: p.email,
                    account: p.account.unwrap_or_else(|| format!("{:08}", p.id)),
                    status: PlayerStatus::Active,
                    credits: p.credits,
                    inbox: Vec::new(),
                    contacts: BTreeMap::new(),
                };
                (player.id, player)
            })
            .collect();
        let mut world = World {
            systems: self.systems.into_iter().map(|s| (s.id, s)).collect(),
            bodies: self.bodies.into_iter().map(|b| (b.id, b)).collect(),
            bases: self.bases.into_iter().map(|b| (b.id, b)).collect(),
            players: players_by_id,
            ships: BTreeMap::new(),
        };

        for s in self.ships {
            if !players.contains(&s.owner) {
                return Err(TurnError::Universe(format!("ship {} has unknown owner {}", s.id, s.owner)));
            }
            if !systems.contains(&s.system) {
                return Err(TurnError::Universe(format!("ship {} is in unknown system {}", s.id, s.system)));
            }
            let allowance = s.tu_allowance.unwrap_or(default_tu);
            world.ships.insert(
                s.id,
                Ship {
                    id: s.id,
                    name: s.name,
                    owner: s.owner,
                    system: s.system,
                    position: s.position,
                    state: s.state,
                    tu_allowance: allowance,
                    tu_remaining: allowance,
                    crew_count: s.crew_count,
                    crew_required: s.crew_required,
                    cargo_capacity: s.cargo_capacity,
                    cargo: s.cargo,
                    sensor_range: s.sensor_range.unwrap_or(8),
                },
            );
        }
        Ok(world)
    }
}

// ---------------------------------------------------------------------------
// Game handle
// ---------------------------------------------------------------------------

pub struct Game {
    root: PathBuf,
    pub config: Config,
    pub pipeline: Pipeline,
    pub store: GameStore,
}

impl Game {
    pub fn open(root: &Path) -> Result<Self> {
        let config = Config::load(root)?;
        let pipeline = Pipeline::load(root)?;
        let store = GameStore::open(&paths::database_path(root))?;
        Ok(Self {
            root: root.to_path_buf(),
            config,
            pipeline,
            store,
        })
    }

    /// Create a new game under `root` from a universe description.
    pub fn init(root: &Path, game_id: &str, universe: Universe) -> Result<Self> {
        let config_path = paths::config_path(root);
        if config_path.exists() {
            return Err(TurnError::AlreadyInitialized(root.display().to_string()));
        }
        let config = Config::new(game_id);
        let world = universe.into_world(config.default_tu)?;

        io::ensure_dir(&paths::game_dir(root))?;
        let store = GameStore::open(&paths::database_path(root))?;
        store.save_world(&world)?;
        let pipeline = Pipeline::new(game_id, config.start_turn);
        pipeline.save(root)?;
        // config last: its presence marks the game as initialized
        config.save(root)?;

        tracing::info!(
            game = game_id,
            turn = %pipeline.turn,
            ships = world.ships.len(),
            players = world.players.len(),
            "game initialized"
        );
        Ok(Self {
            root: root.to_path_buf(),
            config,
            pipeline,
            store,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn save_pipeline(&self) -> Result<()> {
        self.pipeline.save(&self.root)
    }

    /// Suspend or reinstate a player. Suspended players' ships sit out
    /// resolution; their pending orders and overflow wait for reinstatement.
    pub fn set_player_status(&self, id: PlayerId, status: PlayerStatus) -> Result<Player> {
        let mut player = self.store.player(id)?;
        if player.status != status {
            player.status = status;
            self.store.put_player(&player)?;
            tracing::info!(player = id, %status, "player status changed");
        }
        Ok(player)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
