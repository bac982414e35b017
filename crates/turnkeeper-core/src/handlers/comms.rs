use super::{Applied, ApplyContext, Handler, Precondition};
use crate::error::Result;
use crate::types::{PlayerId, ShipId};
use crate::world::{InboxMessage, Ship, Touched, World};
use serde::{Deserialize, Serialize};

type Check = std::result::Result<(), Precondition>;

// ---------------------------------------------------------------------------
// MESSAGE
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub to: PlayerId,
    pub text: String,
}

impl Handler for Message {
    fn check(&self, world: &World, _ship: &Ship, _cx: &ApplyContext<'_>) -> Check {
        if world.players.contains_key(&self.to) {
            Ok(())
        } else {
            Err(Precondition::new(format!(
                "Message not sent: player {} does not exist.",
                self.to
            )))
        }
    }

    fn apply(&self, world: &mut World, ship: ShipId, cx: &mut ApplyContext<'_>) -> Result<Applied> {
        let from_player = world.ship(ship)?.owner;
        let recipient = world.player_mut(self.to)?;
        recipient.inbox.push(InboxMessage {
            turn: cx.turn,
            from_player,
            from_ship: ship,
            text: self.text.clone(),
        });
        let name = recipient.name.clone();
        Ok(Applied::message(format!("Message sent to {name} ({}).", self.to))
            .touching(Touched::Player(self.to)))
    }
}

// ---------------------------------------------------------------------------
// RENAMESHIP
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameShip {
    pub name: String,
}

impl Handler for RenameShip {
    fn check(&self, _world: &World, _ship: &Ship, _cx: &ApplyContext<'_>) -> Check {
        if self.name.trim().is_empty() {
            return Err(Precondition::new("Ship name cannot be empty."));
        }
        Ok(())
    }

    fn apply(&self, world: &mut World, ship: ShipId, _cx: &mut ApplyContext<'_>) -> Result<Applied> {
        let s = world.ship_mut(ship)?;
        let old = std::mem::replace(&mut s.name, self.name.trim().to_string());
        Ok(Applied::message(format!("Renamed {old} to {}.", s.name)))
    }
}

// ---------------------------------------------------------------------------
// MODERATOR
// ---------------------------------------------------------------------------

/// Free-text request for moderator arbitration. The moderator's response
/// (or the sentinel on a forced resolve) is injected here at execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Moderator {
    pub text: String,
}

impl Handler for Moderator {
    fn check(&self, _world: &World, _ship: &Ship, cx: &ApplyContext<'_>) -> Check {
        if cx.desk.can_settle(cx.order) {
            Ok(())
        } else {
            Err(Precondition::new(
                "Moderator request has no response yet.",
            ))
        }
    }

    fn apply(&self, _world: &mut World, _ship: ShipId, cx: &mut ApplyContext<'_>) -> Result<Applied> {
        let response = cx.desk.settle(cx.order)?;
        Ok(Applied::message(format!(
            "Moderator request: {}\nResponse: {response}",
            self.text
        )))
    }
}

// ---------------------------------------------------------------------------
// CLEAR
// ---------------------------------------------------------------------------

/// Carried orders are discarded before execution starts; at execution this
/// only reports how many went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Clear;

impl Handler for Clear {
    fn apply(&self, _world: &mut World, _ship: ShipId, cx: &mut ApplyContext<'_>) -> Result<Applied> {
        Ok(match cx.cleared {
            0 => Applied::message("No overflow orders to clear."),
            n => Applied::message(format!("{n} overflow order(s) cleared.")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::handlers::testing::{cx, run, world};
    use crate::moderator::{ArbitrationDesk, ModeratorAction, ModeratorStatus};
    use crate::order::OrderKind;
    use crate::types::TurnId;

    #[test]
    fn message_lands_in_recipient_inbox() {
        let config = Config::new("G1");
        let mut desk = crate::handlers::testing::desk();
        let mut world = world();
        let kind = OrderKind::Message(Message {
            to: 2,
            text: "meet at D04".into(),
        });
        let applied = run(&kind, &mut world, 100, &mut cx(&config, &mut desk)).unwrap();
        assert_eq!(applied.touched, vec![Touched::Player(2)]);
        let inbox = &world.players[&2].inbox;
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].from_ship, 100);
        assert_eq!(inbox[0].text, "meet at D04");

        let nobody = OrderKind::Message(Message {
            to: 9,
            text: "hello?".into(),
        });
        assert!(run(&nobody, &mut world, 100, &mut cx(&config, &mut desk)).is_err());
    }

    #[test]
    fn rename_trims_the_name() {
        let config = Config::new("G1");
        let mut desk = crate::handlers::testing::desk();
        let mut world = world();
        let kind = OrderKind::RenameShip(RenameShip {
            name: "  Wayfarer ".into(),
        });
        let applied = run(&kind, &mut world, 100, &mut cx(&config, &mut desk)).unwrap();
        assert_eq!(applied.message, "Renamed Ship 100 to Wayfarer.");
        assert_eq!(world.ships[&100].name, "Wayfarer");
    }

    #[test]
    fn clear_reports_what_was_discarded() {
        let config = Config::new("G1");
        let mut desk = crate::handlers::testing::desk();
        let mut world = world();
        let applied = run(&OrderKind::Clear, &mut world, 100, &mut cx(&config, &mut desk)).unwrap();
        assert_eq!(applied.message, "No overflow orders to clear.");

        let mut context = cx(&config, &mut desk);
        context.cleared = 3;
        let applied = run(&OrderKind::Clear, &mut world, 100, &mut context).unwrap();
        assert_eq!(applied.message, "3 overflow order(s) cleared.");
    }

    fn action(status: ModeratorStatus, response: Option<&str>) -> ModeratorAction {
        let mut a = ModeratorAction::new("M1", 1, TurnId::new(500, 1), 100, "Ann (ACC-1)", "Can I mine the comet?");
        a.status = status;
        a.response = response.map(str::to_string);
        a
    }

    #[test]
    fn moderator_uses_the_response() {
        let config = Config::new("G1");
        let mut desk = ArbitrationDesk::in_memory(
            vec![action(ModeratorStatus::Responded, Some("Yes, 40 tonnes."))],
            false,
            "No response from the moderator.",
        );
        let mut world = world();
        let kind = OrderKind::Moderator(Moderator {
            text: "Can I mine the comet?".into(),
        });
        let applied = run(&kind, &mut world, 100, &mut cx(&config, &mut desk)).unwrap();
        assert!(applied.message.ends_with("Response: Yes, 40 tonnes."));
        assert_eq!(desk.items()[0].status, ModeratorStatus::Resolved);
        assert!(!desk.items()[0].sentinel);
    }

    #[test]
    fn moderator_pending_without_override_fails_check() {
        let config = Config::new("G1");
        let mut desk = ArbitrationDesk::in_memory(
            vec![action(ModeratorStatus::Pending, None)],
            false,
            "No response from the moderator.",
        );
        let mut world = world();
        let kind = OrderKind::Moderator(Moderator { text: "?".into() });
        assert!(run(&kind, &mut world, 100, &mut cx(&config, &mut desk)).is_err());
    }

    #[test]
    fn moderator_pending_under_override_gets_sentinel() {
        let config = Config::new("G1");
        let mut desk = ArbitrationDesk::in_memory(
            vec![action(ModeratorStatus::Pending, None)],
            true,
            "No response from the moderator.",
        );
        let mut world = world();
        let kind = OrderKind::Moderator(Moderator { text: "?".into() });
        let applied = run(&kind, &mut world, 100, &mut cx(&config, &mut desk)).unwrap();
        assert!(applied.message.ends_with("Response: No response from the moderator."));
        let item = &desk.items()[0];
        assert_eq!(item.status, ModeratorStatus::Resolved);
        assert!(item.sentinel);
    }
}
