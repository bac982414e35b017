use super::{Applied, ApplyContext, Handler, Precondition};
use crate::error::Result;
use crate::types::ShipId;
use crate::world::{Base, Ship, ShipState, Touched, World};
use serde::{Deserialize, Serialize};

type Check = std::result::Result<(), Precondition>;

fn docked_base<'w>(world: &'w World, ship: &Ship) -> std::result::Result<&'w Base, Precondition> {
    let ShipState::Docked { base } = ship.state else {
        return Err(Precondition::new("Ship must be docked at a base to trade."));
    };
    world
        .bases
        .get(&base)
        .ok_or_else(|| Precondition::new(format!("Base {base} no longer exists.")))
}

fn unit_price(base: &Base, item: &str) -> std::result::Result<u64, Precondition> {
    base.market
        .get(item)
        .copied()
        .ok_or_else(|| Precondition::new(format!("{} does not trade {item}.", base.name)))
}

// ---------------------------------------------------------------------------
// BUY / SELL
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Buy {
    pub item: String,
    pub quantity: u32,
}

impl Handler for Buy {
    fn check(&self, world: &World, ship: &Ship, _cx: &ApplyContext<'_>) -> Check {
        let base = docked_base(world, ship)?;
        let price = unit_price(base, &self.item)?;
        let total = price.saturating_mul(self.quantity as u64);
        let credits = world.players.get(&ship.owner).map_or(0, |p| p.credits);
        if credits < total {
            return Err(Precondition::new(format!(
                "Insufficient credits: {total} needed, {credits} available."
            )));
        }
        let free = ship.cargo_capacity.saturating_sub(ship.cargo_used());
        if free < self.quantity {
            return Err(Precondition::new(format!(
                "Insufficient cargo space: {} needed, {free} free.",
                self.quantity
            )));
        }
        Ok(())
    }

    fn apply(&self, world: &mut World, ship: ShipId, _cx: &mut ApplyContext<'_>) -> Result<Applied> {
        let snapshot = world.ship(ship)?.clone();
        let (price, base_name) = match docked_base(world, &snapshot) {
            Ok(base) => (base.market.get(&self.item).copied().unwrap_or(0), base.name.clone()),
            Err(_) => (0, String::new()),
        };
        let total = price * self.quantity as u64;

        let s = world.ship_mut(ship)?;
        *s.cargo.entry(self.item.clone()).or_insert(0) += self.quantity;
        let player = world.player_mut(snapshot.owner)?;
        player.credits = player.credits.saturating_sub(total);

        Ok(Applied::message(format!(
            "Bought {} {} at {base_name} for {total} credits.",
            self.quantity, self.item
        ))
        .touching(Touched::Player(snapshot.owner)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sell {
    pub item: String,
    pub quantity: u32,
}

impl Handler for Sell {
    fn check(&self, world: &World, ship: &Ship, _cx: &ApplyContext<'_>) -> Check {
        let base = docked_base(world, ship)?;
        unit_price(base, &self.item)?;
        let held = ship.cargo.get(&self.item).copied().unwrap_or(0);
        if held < self.quantity {
            return Err(Precondition::new(format!(
                "Insufficient cargo: {} {} needed, {held} held.",
                self.quantity, self.item
            )));
        }
        Ok(())
    }

    fn apply(&self, world: &mut World, ship: ShipId, _cx: &mut ApplyContext<'_>) -> Result<Applied> {
        let snapshot = world.ship(ship)?.clone();
        let (price, base_name) = match docked_base(world, &snapshot) {
            Ok(base) => (base.market.get(&self.item).copied().unwrap_or(0), base.name.clone()),
            Err(_) => (0, String::new()),
        };
        let total = price * self.quantity as u64;

        let s = world.ship_mut(ship)?;
        if let Some(held) = s.cargo.get_mut(&self.item) {
            *held = held.saturating_sub(self.quantity);
            if *held == 0 {
                s.cargo.remove(&self.item);
            }
        }
        world.player_mut(snapshot.owner)?.credits += total;

        Ok(Applied::message(format!(
            "Sold {} {} at {base_name} for {total} credits.",
            self.quantity, self.item
        ))
        .touching(Touched::Player(snapshot.owner)))
    }
}

// ---------------------------------------------------------------------------
// GETMARKET
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetMarket;

impl Handler for GetMarket {
    fn check(&self, world: &World, ship: &Ship, _cx: &ApplyContext<'_>) -> Check {
        docked_base(world, ship).map(|_| ())
    }

    fn apply(&self, world: &mut World, ship: ShipId, _cx: &mut ApplyContext<'_>) -> Result<Applied> {
        let snapshot = world.ship(ship)?.clone();
        let Ok(base) = docked_base(world, &snapshot) else {
            return Ok(Applied::message("No market available."));
        };
        let mut message = format!("Market at {}:", base.name);
        for (item, price) in &base.market {
            message.push_str(&format!("\n  {item}: {price}"));
        }
        Ok(Applied::message(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::handlers::testing::{cx, desk, run, world};
    use crate::order::OrderKind;

    fn docked() -> World {
        let mut world = world();
        world.ships.get_mut(&100).unwrap().state = ShipState::Docked { base: 20 };
        world
    }

    #[test]
    fn buy_then_sell_moves_credits_and_cargo() {
        let config = Config::new("G1");
        let mut desk = desk();
        let mut world = docked();

        let buy = OrderKind::Buy(Buy {
            item: "ore".into(),
            quantity: 10,
        });
        run(&buy, &mut world, 100, &mut cx(&config, &mut desk)).unwrap();
        assert_eq!(world.players[&1].credits, 880);
        assert_eq!(world.ships[&100].cargo["ore"], 10);

        let sell = OrderKind::Sell(Sell {
            item: "ore".into(),
            quantity: 10,
        });
        let applied = run(&sell, &mut world, 100, &mut cx(&config, &mut desk)).unwrap();
        assert!(applied.touched.contains(&Touched::Player(1)));
        assert_eq!(world.players[&1].credits, 1_000);
        assert!(world.ships[&100].cargo.is_empty());
    }

    #[test]
    fn buy_checks_credits_and_space() {
        let config = Config::new("G1");
        let mut desk = desk();
        let mut world = docked();

        let too_pricey = OrderKind::Buy(Buy {
            item: "ore".into(),
            quantity: 90,
        });
        let err = run(&too_pricey, &mut world, 100, &mut cx(&config, &mut desk)).unwrap_err();
        assert!(err.0.starts_with("Insufficient credits"));

        let too_bulky = OrderKind::Buy(Buy {
            item: "fuel".into(),
            quantity: 101,
        });
        let err = run(&too_bulky, &mut world, 100, &mut cx(&config, &mut desk)).unwrap_err();
        assert!(err.0.starts_with("Insufficient cargo space"));
        assert_eq!(world.players[&1].credits, 1_000);
    }

    #[test]
    fn trading_requires_docking_and_listed_item() {
        let config = Config::new("G1");
        let mut desk = desk();
        let mut world = world();
        let err = run(&OrderKind::GetMarket, &mut world, 100, &mut cx(&config, &mut desk)).unwrap_err();
        assert!(err.0.contains("docked"));

        let mut world = docked();
        let err = run(
            &OrderKind::Sell(Sell {
                item: "spice".into(),
                quantity: 1,
            }),
            &mut world,
            100,
            &mut cx(&config, &mut desk),
        )
        .unwrap_err();
        assert_eq!(err.0, "Meridian Station does not trade spice.");

        let listing = run(&OrderKind::GetMarket, &mut world, 100, &mut cx(&config, &mut desk)).unwrap();
        assert!(listing.message.contains("fuel: 5"));
    }
}
