use crate::error::{Result, TurnError};
use crate::paths;
use crate::types::TurnId;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// CostTable
// ---------------------------------------------------------------------------

/// Base TU costs before crew-efficiency penalties. Trading, messaging,
/// renaming, arbitration and CLEAR are always free; WAIT costs its argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostTable {
    /// Cost of a single grid square of movement.
    #[serde(default = "default_move_step")]
    pub move_step: u32,
    #[serde(default = "default_scan")]
    pub location_scan: u32,
    #[serde(default = "default_scan")]
    pub system_scan: u32,
    #[serde(default = "default_orbit")]
    pub orbit: u32,
    #[serde(default = "default_dock")]
    pub dock: u32,
    #[serde(default = "default_undock")]
    pub undock: u32,
    #[serde(default = "default_surface")]
    pub land: u32,
    #[serde(default = "default_surface")]
    pub takeoff: u32,
}

fn default_move_step() -> u32 {
    2
}

fn default_scan() -> u32 {
    20
}

fn default_orbit() -> u32 {
    10
}

fn default_dock() -> u32 {
    30
}

fn default_undock() -> u32 {
    10
}

fn default_surface() -> u32 {
    20
}

impl Default for CostTable {
    fn default() -> Self {
        Self {
            move_step: default_move_step(),
            location_scan: default_scan(),
            system_scan: default_scan(),
            orbit: default_orbit(),
            dock: default_dock(),
            undock: default_undock(),
            land: default_surface(),
            takeoff: default_surface(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    pub game_id: String,
    /// Mixed into every random stream; changing it changes every roll.
    #[serde(default = "default_seed")]
    pub seed: String,
    #[serde(default = "default_start_turn")]
    pub start_turn: TurnId,
    /// TU allowance given to ships the universe file doesn't size explicitly.
    #[serde(default = "default_tu")]
    pub default_tu: u32,
    /// Credits paid per crew member each turn.
    #[serde(default = "default_crew_wage")]
    pub crew_wage: u64,
    /// Response text substituted for unanswered requests on a forced resolve.
    #[serde(default = "default_sentinel")]
    pub moderator_sentinel: String,
    #[serde(default)]
    pub costs: CostTable,
}

fn default_version() -> u32 {
    1
}

fn default_seed() -> String {
    "turnkeeper".to_string()
}

fn default_start_turn() -> TurnId {
    TurnId::new(500, 1)
}

fn default_tu() -> u32 {
    300
}

fn default_crew_wage() -> u64 {
    1
}

fn default_sentinel() -> String {
    "No response from the moderator.".to_string()
}

impl Config {
    pub fn new(game_id: impl Into<String>) -> Self {
        Self {
            version: default_version(),
            game_id: game_id.into(),
            seed: default_seed(),
            start_turn: default_start_turn(),
            default_tu: default_tu(),
            crew_wage: default_crew_wage(),
            moderator_sentinel: default_sentinel(),
            costs: CostTable::default(),
        }
    }

    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(TurnError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        Ok(serde_yaml::from_str(&data)?)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        crate::io::write_yaml(&paths::config_path(root), self)
    }

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.game_id.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "game_id is empty".to_string(),
            });
        }

        if self.costs.move_step == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "costs.move_step is 0: ships can cross a system for free".to_string(),
            });
        }

        if self.moderator_sentinel.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "moderator_sentinel is empty: forced requests get a blank response"
                    .to_string(),
            });
        }

        if self.default_tu == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "default_tu is 0: ships without an explicit allowance cannot act"
                    .to_string(),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
