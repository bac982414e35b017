//! Orbit, dock, land and their reverses.

use super::{Applied, ApplyContext, Handler, Precondition};
use crate::error::Result;
use crate::types::{BaseId, BodyId, ShipId};
use crate::world::{Contact, ObjectKind, Ship, ShipState, Touched, World};
use serde::{Deserialize, Serialize};

type Check = std::result::Result<(), Precondition>;

fn free_flying(ship: &Ship, verb: &str) -> Check {
    match ship.state {
        ShipState::Docked { .. } => Err(Precondition::new(format!(
            "Unable to {verb}: ship is docked. UNDOCK first."
        ))),
        ShipState::Landed { .. } => Err(Precondition::new(format!(
            "Unable to {verb}: ship is landed. TAKEOFF first."
        ))),
        _ => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// ORBIT
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Orbit {
    pub body: BodyId,
}

impl Handler for Orbit {
    fn check(&self, world: &World, ship: &Ship, _cx: &ApplyContext<'_>) -> Check {
        free_flying(ship, "orbit")?;
        if ship.state == (ShipState::Orbiting { body: self.body }) {
            return Err(Precondition::new(format!(
                "Unable to orbit: already orbiting {}.",
                self.body
            )));
        }
        let body = world
            .bodies
            .get(&self.body)
            .filter(|b| b.system == ship.system)
            .ok_or_else(|| {
                Precondition::new(format!(
                    "Unable to orbit: body {} is not in this system.",
                    self.body
                ))
            })?;
        if body.position != ship.position {
            return Err(Precondition::new(format!(
                "Unable to orbit: {} is at {}, ship is at {}.",
                body.name, body.position, ship.position
            )));
        }
        Ok(())
    }

    fn apply(&self, world: &mut World, ship: ShipId, _cx: &mut ApplyContext<'_>) -> Result<Applied> {
        let name = world
            .bodies
            .get(&self.body)
            .map(|b| b.name.clone())
            .unwrap_or_default();
        world.ship_mut(ship)?.state = ShipState::Orbiting { body: self.body };
        Ok(Applied::message(format!("Orbiting {name} ({}).", self.body)))
    }
}

// ---------------------------------------------------------------------------
// DOCK / UNDOCK
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dock {
    pub base: BaseId,
}

impl Handler for Dock {
    fn check(&self, world: &World, ship: &Ship, _cx: &ApplyContext<'_>) -> Check {
        free_flying(ship, "dock")?;
        let base = world
            .bases
            .get(&self.base)
            .filter(|b| b.system == ship.system)
            .ok_or_else(|| {
                Precondition::new(format!(
                    "Unable to dock: base {} is not in this system.",
                    self.base
                ))
            })?;
        if base.position != ship.position {
            return Err(Precondition::new(format!(
                "Unable to dock: {} is at {}, ship is at {}.",
                base.name, base.position, ship.position
            )));
        }
        Ok(())
    }

    /// Docking also logs every ship sharing the square as a contact.
    fn apply(&self, world: &mut World, ship: ShipId, cx: &mut ApplyContext<'_>) -> Result<Applied> {
        let (owner, system, position) = {
            let s = world.ship(ship)?;
            (s.owner, s.system, s.position)
        };
        let base_name = world
            .bases
            .get(&self.base)
            .map(|b| b.name.clone())
            .unwrap_or_default();
        let neighbours: Vec<Contact> = world
            .ships
            .values()
            .filter(|s| s.id != ship && s.system == system && s.position == position)
            .map(|s| Contact {
                kind: ObjectKind::Ship,
                id: s.id,
                name: s.name.clone(),
                system,
                position,
                last_seen: cx.turn,
            })
            .collect();

        world.ship_mut(ship)?.state = ShipState::Docked { base: self.base };

        let mut message = format!("Docked at {base_name} ({}).", self.base);
        for c in &neighbours {
            message.push_str(&format!(" Sighted {} ({}).", c.name, c.id));
        }
        let player = world.player_mut(owner)?;
        for c in neighbours {
            player.record_contact(c);
        }
        Ok(Applied::message(message).touching(Touched::Player(owner)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Undock;

impl Handler for Undock {
    fn check(&self, _world: &World, ship: &Ship, _cx: &ApplyContext<'_>) -> Check {
        match ship.state {
            ShipState::Docked { .. } => Ok(()),
            _ => Err(Precondition::new(
                "Unable to undock: ship is not docked at any base.",
            )),
        }
    }

    fn apply(&self, world: &mut World, ship: ShipId, _cx: &mut ApplyContext<'_>) -> Result<Applied> {
        let s = world.ship_mut(ship)?;
        let base = match s.state {
            ShipState::Docked { base } => base,
            _ => 0,
        };
        s.state = ShipState::InSpace;
        let name = world
            .bases
            .get(&base)
            .map(|b| b.name.clone())
            .unwrap_or_default();
        Ok(Applied::message(format!("Undocked from {name} ({base}).")))
    }
}

// ---------------------------------------------------------------------------
// LAND / TAKEOFF
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Land {
    pub body: BodyId,
}

impl Handler for Land {
    fn check(&self, world: &World, ship: &Ship, _cx: &ApplyContext<'_>) -> Check {
        if ship.state != (ShipState::Orbiting { body: self.body }) {
            return Err(Precondition::new(format!(
                "Unable to land: ship must be orbiting {} first.",
                self.body
            )));
        }
        match world.bodies.get(&self.body) {
            Some(b) if b.kind.landable() => Ok(()),
            Some(b) => Err(Precondition::new(format!(
                "Unable to land: {} has no surface.",
                b.name
            ))),
            None => Err(Precondition::new(format!(
                "Unable to land: body {} not found.",
                self.body
            ))),
        }
    }

    fn apply(&self, world: &mut World, ship: ShipId, _cx: &mut ApplyContext<'_>) -> Result<Applied> {
        world.ship_mut(ship)?.state = ShipState::Landed { body: self.body };
        let name = world
            .bodies
            .get(&self.body)
            .map(|b| b.name.clone())
            .unwrap_or_default();
        Ok(Applied::message(format!("Landed on {name} ({}).", self.body)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Takeoff;

impl Handler for Takeoff {
    fn check(&self, _world: &World, ship: &Ship, _cx: &ApplyContext<'_>) -> Check {
        match ship.state {
            ShipState::Landed { .. } => Ok(()),
            _ => Err(Precondition::new("Unable to take off: ship is not landed.")),
        }
    }

    fn apply(&self, world: &mut World, ship: ShipId, _cx: &mut ApplyContext<'_>) -> Result<Applied> {
        let s = world.ship_mut(ship)?;
        let ShipState::Landed { body } = s.state else {
            return Ok(Applied::message("Already airborne."));
        };
        s.state = ShipState::Orbiting { body };
        Ok(Applied::message(format!("Took off; orbiting {body}.")))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::handlers::testing::{cx, desk, pos, run, world};
    use crate::order::OrderKind;

    #[test]
    fn orbit_land_takeoff_cycle() {
        let config = Config::new("G1");
        let mut desk = desk();
        let mut world = world();

        run(&OrderKind::Orbit(Orbit { body: 10 }), &mut world, 100, &mut cx(&config, &mut desk)).unwrap();
        assert_eq!(world.ships[&100].state, ShipState::Orbiting { body: 10 });

        run(&OrderKind::Land(Land { body: 10 }), &mut world, 100, &mut cx(&config, &mut desk)).unwrap();
        assert_eq!(world.ships[&100].state, ShipState::Landed { body: 10 });

        run(&OrderKind::Takeoff, &mut world, 100, &mut cx(&config, &mut desk)).unwrap();
        assert_eq!(world.ships[&100].state, ShipState::Orbiting { body: 10 });
    }

    #[test]
    fn orbit_requires_same_square() {
        let config = Config::new("G1");
        let mut desk = desk();
        let mut world = world();
        let before = world.clone();
        let err = run(&OrderKind::Orbit(Orbit { body: 11 }), &mut world, 100, &mut cx(&config, &mut desk))
            .unwrap_err();
        assert!(err.0.contains("Colossus is at T20"));
        assert_eq!(world, before);
    }

    #[test]
    fn gas_giants_cannot_be_landed_on() {
        let config = Config::new("G1");
        let mut desk = desk();
        let mut world = world();
        {
            let s = world.ships.get_mut(&100).unwrap();
            s.position = pos("T20");
            s.state = ShipState::Orbiting { body: 11 };
        }
        let err = run(&OrderKind::Land(Land { body: 11 }), &mut world, 100, &mut cx(&config, &mut desk))
            .unwrap_err();
        assert!(err.0.contains("no surface"));
    }

    #[test]
    fn dock_records_neighbours_and_undock_releases() {
        let config = Config::new("G1");
        let mut desk = desk();
        let mut world = world();
        world.ships.get_mut(&200).unwrap().position = pos("D04");

        let applied = run(&OrderKind::Dock(Dock { base: 20 }), &mut world, 100, &mut cx(&config, &mut desk)).unwrap();
        assert_eq!(world.ships[&100].state, ShipState::Docked { base: 20 });
        assert!(applied.touched.contains(&Touched::Player(1)));
        assert!(world.players[&1].contacts.contains_key("ship:200"));

        let err = run(&OrderKind::Dock(Dock { base: 20 }), &mut world, 100, &mut cx(&config, &mut desk))
            .unwrap_err();
        assert!(err.0.contains("UNDOCK"));

        let applied = run(&OrderKind::Undock, &mut world, 100, &mut cx(&config, &mut desk)).unwrap();
        assert_eq!(applied.message, "Undocked from Meridian Station (20).");
        assert_eq!(world.ships[&100].state, ShipState::InSpace);
    }

    #[test]
    fn undock_when_not_docked_fails() {
        let config = Config::new("G1");
        let mut desk = desk();
        let mut world = world();
        assert!(run(&OrderKind::Undock, &mut world, 100, &mut cx(&config, &mut desk)).is_err());
        assert!(run(&OrderKind::Takeoff, &mut world, 100, &mut cx(&config, &mut desk)).is_err());
    }
}
