use crate::output::{print_json, print_table, truncate};
use clap::Subcommand;
use std::path::Path;
use turnkeeper_core::moderator;

// ---------------------------------------------------------------------------
// Subcommand tree
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum ModeratorSubcommand {
    /// List moderator requests (default: pending only)
    List {
        /// Filter by status: pending | responded | resolved | all  [default: pending]
        #[arg(long, default_value = "pending")]
        status: String,
    },

    /// Show a single request
    Show {
        /// Action ID (e.g. M1)
        id: String,
    },

    /// Answer a request; the answer is delivered when the order executes
    Respond {
        /// Action ID (e.g. M1)
        id: String,

        /// Response text sent back to the player
        response: String,
    },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(root: &Path, subcommand: ModeratorSubcommand, json: bool) -> anyhow::Result<()> {
    match subcommand {
        ModeratorSubcommand::List { status } => {
            let items = moderator::list(root, Some(status.as_str()))?;
            if json {
                return print_json(&items);
            }
            if items.is_empty() {
                println!("no moderator requests (status: {status})");
                return Ok(());
            }
            print_table(
                &["ID", "TURN", "SHIP", "STATUS", "REQUESTER", "REQUEST"],
                items
                    .iter()
                    .map(|a| {
                        vec![
                            a.id.clone(),
                            a.turn.to_string(),
                            a.ship.to_string(),
                            a.status.to_string(),
                            a.requester.clone(),
                            truncate(&a.request, 50),
                        ]
                    })
                    .collect(),
            );
            Ok(())
        }

        ModeratorSubcommand::Show { id } => {
            let item = moderator::get(root, &id)?;
            if json {
                return print_json(&item);
            }
            println!("ID:        {}", item.id);
            println!("Turn:      {}", item.turn);
            println!("Ship:      {}", item.ship);
            println!("Order:     {}", item.order);
            println!("Requester: {}", item.requester);
            println!("Status:    {}", item.status);
            println!("Request:   {}", item.request);
            if let Some(r) = &item.response {
                let tag = if item.sentinel { " (no response)" } else { "" };
                println!("Response:  {r}{tag}");
            }
            println!("Created:   {}", item.created_at.format("%Y-%m-%d %H:%M UTC"));
            Ok(())
        }

        ModeratorSubcommand::Respond { id, response } => {
            let item = moderator::respond(root, &id, &response)?;
            if json {
                print_json(&item)
            } else {
                println!("recorded response to {} (ship {})", item.id, item.ship);
                Ok(())
            }
        }
    }
}
