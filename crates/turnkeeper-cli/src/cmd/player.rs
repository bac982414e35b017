use crate::output::{print_json, print_table};
use clap::Subcommand;
use std::path::Path;
use turnkeeper_core::world::PlayerStatus;

#[derive(Subcommand)]
pub enum PlayerSubcommand {
    /// List players
    List,

    /// Suspend a player; their ships sit out resolution
    Suspend { id: u64 },

    /// Reinstate a suspended player
    Reinstate { id: u64 },
}

pub fn run(root: &Path, subcommand: PlayerSubcommand, json: bool) -> anyhow::Result<()> {
    let game = super::open(root)?;
    let (id, status) = match subcommand {
        PlayerSubcommand::List => {
            let world = game.store.load_world()?;
            let players: Vec<_> = world.players.values().collect();
            if json {
                return print_json(&players);
            }
            print_table(
                &["ID", "NAME", "ACCOUNT", "STATUS", "CREDITS", "SHIPS"],
                players
                    .iter()
                    .map(|p| {
                        let ships = world.ships.values().filter(|s| s.owner == p.id).count();
                        vec![
                            p.id.to_string(),
                            p.name.clone(),
                            p.account.clone(),
                            p.status.to_string(),
                            p.credits.to_string(),
                            ships.to_string(),
                        ]
                    })
                    .collect(),
            );
            return Ok(());
        }
        PlayerSubcommand::Suspend { id } => (id, PlayerStatus::Suspended),
        PlayerSubcommand::Reinstate { id } => (id, PlayerStatus::Active),
    };

    let player = game.set_player_status(id, status)?;
    if json {
        print_json(&player)
    } else {
        println!("player {} ({}) is {}", player.id, player.name, player.status);
        Ok(())
    }
}
