//! Turn pipeline state machine.
//!
//! Layout:
//!   .turnkeeper/pipeline.yaml  current turn, status, phase markers, history
//!
//! Legal transitions:
//!
//! ```text
//! OPEN ──hold──▶ HELD ──release──▶ OPEN
//! OPEN ──resolve──▶ PROCESSING ──gate──▶ HELD
//! PROCESSING ──release──▶ OPEN            (crash recovery)
//! PROCESSING ──finish──▶ COMPLETED ──advance──▶ OPEN
//! any ──force──▶ PROCESSING               (operator override)
//! ```

use crate::error::{Result, TurnError};
use crate::paths;
use crate::types::{Phase, TurnId, TurnStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub turn: TurnId,
    pub from: TurnStatus,
    pub to: TurnStatus,
    pub reason: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub forced: bool,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletedTurn {
    pub turn: TurnId,
    pub completed_at: DateTime<Utc>,
}

/// Whether `from → to` is an edge of the pipeline graph (overrides excluded).
pub fn is_legal(from: TurnStatus, to: TurnStatus) -> bool {
    use TurnStatus::*;
    matches!(
        (from, to),
        (Open, Held)
            | (Held, Open)
            | (Open, Processing)
            | (Processing, Held)
            | (Processing, Open)
            | (Processing, Completed)
            | (Completed, Open)
    )
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    #[serde(default = "default_version")]
    pub version: u32,
    pub game_id: String,
    pub turn: TurnId,
    pub status: TurnStatus,
    #[serde(default)]
    pub completed_phases: Vec<Phase>,
    /// Set by an operator override; unresolved moderator requests receive
    /// the sentinel response for the rest of this turn.
    #[serde(default)]
    pub forced: bool,
    #[serde(default)]
    pub history: Vec<TransitionRecord>,
    #[serde(default)]
    pub completed_turns: Vec<CompletedTurn>,
    pub last_updated: DateTime<Utc>,
}

fn default_version() -> u32 {
    1
}

impl Pipeline {
    pub fn new(game_id: impl Into<String>, turn: TurnId) -> Self {
        Self {
            version: 1,
            game_id: game_id.into(),
            turn,
            status: TurnStatus::Open,
            completed_phases: Vec::new(),
            forced: false,
            history: Vec::new(),
            completed_turns: Vec::new(),
            last_updated: Utc::now(),
        }
    }

    // ---------------------------------------------------------------------------
    // Persistence
    // ---------------------------------------------------------------------------

    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::pipeline_path(root);
        if !path.exists() {
            return Err(TurnError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        Ok(serde_yaml::from_str(&data)?)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        crate::io::write_yaml(&paths::pipeline_path(root), self)
    }

    // ---------------------------------------------------------------------------
    // Transitions
    // ---------------------------------------------------------------------------

    pub fn can_transition_to(&self, target: TurnStatus) -> Result<()> {
        if is_legal(self.status, target) {
            return Ok(());
        }
        let reason = match (self.status, target) {
            (from, to) if from == to => format!("turn is already {to}"),
            (TurnStatus::Held, TurnStatus::Processing) => {
                "release the hold first (or force the resolution)".to_string()
            }
            (TurnStatus::Completed, _) => "advance to the next turn first".to_string(),
            (_, TurnStatus::Completed) => "only a finished resolution completes a turn".to_string(),
            _ => "not an edge of the turn pipeline".to_string(),
        };
        Err(TurnError::InvalidTransition {
            from: self.status.to_string(),
            to: target.to_string(),
            reason,
        })
    }

    pub fn transition(&mut self, target: TurnStatus, reason: impl Into<String>) -> Result<()> {
        self.can_transition_to(target)?;
        self.record(target, reason.into(), false);
        Ok(())
    }

    /// Operator override: any status → PROCESSING, bypassing guard checks.
    pub fn force_processing(&mut self, reason: impl Into<String>) {
        self.forced = true;
        self.record(TurnStatus::Processing, reason.into(), true);
    }

    fn record(&mut self, target: TurnStatus, reason: String, forced: bool) {
        let now = Utc::now();
        tracing::info!(
            turn = %self.turn,
            from = %self.status,
            to = %target,
            forced,
            "pipeline transition: {reason}"
        );
        self.history.push(TransitionRecord {
            turn: self.turn,
            from: self.status,
            to: target,
            reason,
            forced,
            at: now,
        });
        self.status = target;
        self.last_updated = now;
    }

    pub fn hold(&mut self, reason: impl Into<String>) -> Result<()> {
        self.transition(TurnStatus::Held, reason)
    }

    /// HELD → OPEN or PROCESSING → OPEN. COMPLETED turns open only via advance.
    pub fn release(&mut self, reason: impl Into<String>) -> Result<()> {
        if self.status == TurnStatus::Completed {
            return Err(TurnError::InvalidTransition {
                from: self.status.to_string(),
                to: TurnStatus::Open.to_string(),
                reason: "a completed turn is reopened by advancing".to_string(),
            });
        }
        self.transition(TurnStatus::Open, reason)
    }

    /// OPEN → PROCESSING for a normal resolution. A turn left in PROCESSING
    /// means a previous attempt was interrupted.
    pub fn begin_resolution(&mut self) -> Result<()> {
        if self.status == TurnStatus::Processing {
            return Err(TurnError::Interrupted {
                turn: self.turn.to_string(),
            });
        }
        self.transition(TurnStatus::Processing, "resolution started")
    }

    /// COMPLETED → OPEN on the following turn. Phase markers and the
    /// override flag belong to the finished turn and are cleared.
    pub fn open_next_turn(&mut self) -> Result<TurnId> {
        if self.status != TurnStatus::Completed {
            return Err(TurnError::InvalidTransition {
                from: self.status.to_string(),
                to: TurnStatus::Open.to_string(),
                reason: "only a completed turn can advance".to_string(),
            });
        }
        let finished = self.turn;
        self.completed_turns.push(CompletedTurn {
            turn: finished,
            completed_at: Utc::now(),
        });
        self.transition(TurnStatus::Open, format!("advanced from {finished}"))?;
        self.turn = finished.next();
        self.completed_phases.clear();
        self.forced = false;
        Ok(self.turn)
    }

    // ---------------------------------------------------------------------------
    // Phase markers
    // ---------------------------------------------------------------------------

    pub fn is_phase_done(&self, phase: Phase) -> bool {
        self.completed_phases.contains(&phase)
    }

    pub fn mark_phase_done(&mut self, phase: Phase) {
        if !self.is_phase_done(phase) {
            self.completed_phases.push(phase);
            self.completed_phases.sort();
        }
        self.last_updated = Utc::now();
    }

    pub fn clear_phase(&mut self, phase: Phase) {
        self.completed_phases.retain(|p| *p != phase);
        self.last_updated = Utc::now();
    }

    // ---------------------------------------------------------------------------
    // Guards
    // ---------------------------------------------------------------------------

    pub fn ensure_accepting_orders(&self) -> Result<()> {
        if self.status != TurnStatus::Open {
            return Err(TurnError::NotAcceptingOrders {
                turn: self.turn.to_string(),
                status: self.status.to_string(),
            });
        }
        Ok(())
    }

    pub fn ensure_orders_editable(&self) -> Result<()> {
        if self.status == TurnStatus::Processing {
            return Err(TurnError::OrdersLocked(self.turn.to_string()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn at(status: TurnStatus) -> Pipeline {
        let mut p = Pipeline::new("G1", TurnId::new(500, 1));
        p.status = status;
        p
    }

    #[test]
    fn only_enumerated_edges_are_legal() {
        use TurnStatus::*;
        let allowed = [
            (Open, Held),
            (Held, Open),
            (Open, Processing),
            (Processing, Held),
            (Processing, Open),
            (Processing, Completed),
            (Completed, Open),
        ];
        for &from in TurnStatus::all() {
            for &to in TurnStatus::all() {
                let expected = allowed.contains(&(from, to));
                assert_eq!(
                    at(from).can_transition_to(to).is_ok(),
                    expected,
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn force_reaches_processing_from_every_status() {
        for &from in TurnStatus::all() {
            let mut p = at(from);
            p.force_processing("operator override");
            assert_eq!(p.status, TurnStatus::Processing);
            assert!(p.forced);
            assert!(p.history.last().unwrap().forced);
        }
    }

    #[test]
    fn begin_resolution_from_processing_is_interrupted() {
        let mut p = at(TurnStatus::Processing);
        assert!(matches!(
            p.begin_resolution(),
            Err(TurnError::Interrupted { .. })
        ));
    }

    #[test]
    fn begin_resolution_from_held_is_rejected() {
        let mut p = at(TurnStatus::Held);
        assert!(matches!(
            p.begin_resolution(),
            Err(TurnError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn release_from_completed_is_rejected() {
        let mut p = at(TurnStatus::Completed);
        assert!(p.release("nope").is_err());
        assert_eq!(p.status, TurnStatus::Completed);
    }

    #[test]
    fn open_next_turn_clears_markers_and_rolls_week() {
        let mut p = at(TurnStatus::Completed);
        p.turn = TurnId::new(500, 52);
        p.mark_phase_done(Phase::Queue);
        p.forced = true;
        let next = p.open_next_turn().unwrap();
        assert_eq!(next, TurnId::new(501, 1));
        assert_eq!(p.status, TurnStatus::Open);
        assert!(p.completed_phases.is_empty());
        assert!(!p.forced);
        assert_eq!(p.completed_turns.len(), 1);
    }

    #[test]
    fn orders_only_accepted_while_open() {
        assert!(at(TurnStatus::Open).ensure_accepting_orders().is_ok());
        for status in [TurnStatus::Held, TurnStatus::Processing, TurnStatus::Completed] {
            assert!(at(status).ensure_accepting_orders().is_err());
        }
        assert!(at(TurnStatus::Held).ensure_orders_editable().is_ok());
        assert!(at(TurnStatus::Processing).ensure_orders_editable().is_err());
    }

    #[test]
    fn pipeline_roundtrip() {
        let dir = TempDir::new().unwrap();
        let mut p = Pipeline::new("G1", TurnId::new(500, 3));
        p.hold("waiting on the GM").unwrap();
        p.mark_phase_done(Phase::Gate);
        p.save(dir.path()).unwrap();

        let loaded = Pipeline::load(dir.path()).unwrap();
        assert_eq!(loaded.status, TurnStatus::Held);
        assert_eq!(loaded.turn, TurnId::new(500, 3));
        assert!(loaded.is_phase_done(Phase::Gate));
        assert_eq!(loaded.history.len(), 1);
    }

    #[test]
    fn load_missing_is_not_initialized() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            Pipeline::load(dir.path()),
            Err(TurnError::NotInitialized)
        ));
    }
}
