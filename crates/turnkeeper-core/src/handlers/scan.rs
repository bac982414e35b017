use super::{Applied, ApplyContext, Handler};
use crate::error::Result;
use crate::rng;
use crate::types::ShipId;
use crate::world::{Contact, Sighting, Touched, World};

/// Chance (percent) of picking up an object beyond half sensor range.
const FAR_DETECTION_PERCENT: u32 = 75;

fn record(world: &mut World, ship: ShipId, seen: &[Sighting], cx: &ApplyContext<'_>) -> Result<u64> {
    let (owner, system) = {
        let s = world.ship(ship)?;
        (s.owner, s.system)
    };
    let player = world.player_mut(owner)?;
    for s in seen {
        player.record_contact(Contact {
            kind: s.kind,
            id: s.id,
            name: s.name.clone(),
            system,
            position: s.position,
            last_seen: cx.turn,
        });
    }
    Ok(owner)
}

fn listing(header: String, seen: &[Sighting]) -> String {
    let mut out = header;
    for s in seen {
        out.push_str(&format!("\n  {} {} ({}) at {}", s.kind, s.name, s.id, s.position));
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationScan;

impl Handler for LocationScan {
    fn apply(&self, world: &mut World, ship: ShipId, cx: &mut ApplyContext<'_>) -> Result<Applied> {
        let (system, position, range) = {
            let s = world.ship(ship)?;
            (s.system, s.position, s.sensor_range)
        };
        let mut seen = Vec::new();
        for sighting in world.objects_in_system(system, ship) {
            let distance = position.distance(sighting.position);
            if distance > range {
                continue;
            }
            if distance * 2 > range && rng::roll_percent(&mut cx.rng) > FAR_DETECTION_PERCENT {
                continue;
            }
            seen.push(sighting);
        }
        let owner = record(world, ship, &seen, cx)?;
        let message = listing(
            format!("Location scan from {position}: {} contact(s).", seen.len()),
            &seen,
        );
        Ok(Applied::message(message).touching(Touched::Player(owner)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemScan;

impl Handler for SystemScan {
    fn apply(&self, world: &mut World, ship: ShipId, cx: &mut ApplyContext<'_>) -> Result<Applied> {
        let system = world.ship(ship)?.system;
        let seen = world.objects_in_system(system, ship);
        let owner = record(world, ship, &seen, cx)?;
        let name = world
            .systems
            .get(&system)
            .map(|s| s.name.clone())
            .unwrap_or_else(|| system.to_string());
        let message = listing(
            format!("System scan of {name}: {} object(s).", seen.len()),
            &seen,
        );
        Ok(Applied::message(message).touching(Touched::Player(owner)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::handlers::testing::{cx, desk, pos, run, world};
    use crate::order::OrderKind;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn system_scan_sees_everything_but_itself() {
        let config = Config::new("G1");
        let mut desk = desk();
        let mut world = world();
        let applied = run(&OrderKind::SystemScan, &mut world, 100, &mut cx(&config, &mut desk)).unwrap();
        // star, two bodies, one base, one other ship
        assert!(applied.message.contains("5 object(s)"));
        assert_eq!(world.players[&1].contacts.len(), 5);
        assert!(!world.players[&1].contacts.contains_key("ship:100"));
    }

    #[test]
    fn location_scan_respects_sensor_range() {
        let config = Config::new("G1");
        let mut desk = desk();
        let mut world = world();
        // D04 to T20 is 16 squares, M13 is 9: both out of range 8.
        run(&OrderKind::LocationScan, &mut world, 100, &mut cx(&config, &mut desk)).unwrap();
        let contacts = &world.players[&1].contacts;
        assert!(contacts.contains_key("body:10"));
        assert!(contacts.contains_key("base:20"));
        assert!(!contacts.contains_key("body:11"));
        assert!(!contacts.contains_key("star:1"));
    }

    #[test]
    fn location_scan_is_reproducible_for_a_seed() {
        let config = Config::new("G1");
        let mut outcomes = Vec::new();
        for _ in 0..2 {
            let mut desk = desk();
            let mut world = world();
            // A01 sits at distance 6 from E07 (beyond half range).
            world.ships.get_mut(&200).unwrap().position = pos("A01");
            world.ships.get_mut(&100).unwrap().position = pos("E07");
            let mut cx = cx(&config, &mut desk);
            cx.rng = ChaCha8Rng::seed_from_u64(42);
            let applied = run(&OrderKind::LocationScan, &mut world, 100, &mut cx).unwrap();
            outcomes.push(applied.message);
        }
        assert_eq!(outcomes[0], outcomes[1]);
    }
}
