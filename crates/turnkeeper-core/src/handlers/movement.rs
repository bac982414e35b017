use super::{Applied, ApplyContext, Handler, Precondition};
use crate::error::Result;
use crate::types::{GridPos, ShipId};
use crate::world::{Ship, ShipState, World};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// WAIT
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wait {
    pub tu: u32,
}

impl Handler for Wait {
    fn apply(&self, _world: &mut World, _ship: ShipId, cx: &mut ApplyContext<'_>) -> Result<Applied> {
        if cx.cost < cx.unit_cost {
            Ok(Applied::message(format!(
                "Waited {} of {} TU (partial).",
                cx.cost, cx.unit_cost
            )))
        } else {
            Ok(Applied::message(format!("Waited {} TU.", cx.cost)))
        }
    }
}

// ---------------------------------------------------------------------------
// MOVE
// ---------------------------------------------------------------------------

/// Travel to a square of the current system, one Chebyshev step per
/// atomic action. The order stays pending until the ship arrives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Move {
    pub to: GridPos,
}

impl Move {
    pub fn arrived(&self, ship: &Ship) -> bool {
        ship.position == self.to
    }
}

impl Handler for Move {
    fn check(&self, _world: &World, ship: &Ship, _cx: &ApplyContext<'_>) -> std::result::Result<(), Precondition> {
        match ship.state {
            ShipState::Docked { .. } => Err(Precondition::new(
                "Cannot move while docked. UNDOCK first.",
            )),
            ShipState::Landed { .. } => Err(Precondition::new(
                "Cannot move while landed. TAKEOFF first.",
            )),
            _ => Ok(()),
        }
    }

    fn apply(&self, world: &mut World, ship: ShipId, _cx: &mut ApplyContext<'_>) -> Result<Applied> {
        let left_orbit = match world.ship(ship)?.state {
            ShipState::Orbiting { body } => world.bodies.get(&body).map(|b| b.name.clone()),
            _ => None,
        };

        let s = world.ship_mut(ship)?;
        if s.position == self.to {
            s.state = ShipState::InSpace;
            return Ok(Applied::message(format!("Already at {}.", self.to)));
        }

        s.position = s.position.step_toward(self.to);
        let mut message = match left_orbit {
            Some(name) => format!("Left orbit of {name}. "),
            None => String::new(),
        };
        if s.position == self.to {
            s.state = ShipState::InSpace;
            message.push_str(&format!("Arrived at {}.", self.to));
        } else {
            s.state = ShipState::InTransit {
                destination: self.to,
            };
            message.push_str(&format!("Moving to {}: now at {}.", self.to, s.position));
        }
        Ok(Applied::message(message))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
