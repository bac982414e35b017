use crate::output::{print_json, print_table, truncate};
use std::path::Path;
use turnkeeper_core::resolve::{self, ResolveOutcome};

pub fn run(root: &Path, force: bool, json: bool) -> anyhow::Result<()> {
    let mut game = super::open(root)?;
    let outcome = resolve::resolve(&mut game, force)?;

    match outcome {
        ResolveOutcome::Held(requests) => {
            if json {
                print_json(&serde_json::json!({
                    "turn": game.pipeline.turn,
                    "status": game.pipeline.status,
                    "requests": requests,
                }))?;
                return Ok(());
            }
            println!(
                "turn {} is HELD: {} moderator request(s) need a response",
                game.pipeline.turn,
                requests.len()
            );
            println!();
            print_table(
                &["ID", "SHIP", "REQUESTER", "REQUEST"],
                requests
                    .iter()
                    .map(|r| {
                        vec![
                            r.action.clone(),
                            format!("{} ({})", r.ship_name, r.ship),
                            r.requester.clone(),
                            truncate(&r.text, 60),
                        ]
                    })
                    .collect(),
            );
            println!();
            println!("Answer with 'turnkeeper moderator respond <ID> <text>', then release and resolve again.");
        }
        ResolveOutcome::Completed(summary) => {
            if json {
                print_json(&summary)?;
                return Ok(());
            }
            println!(
                "turn {} resolved{}",
                summary.turn,
                if summary.forced { " (forced)" } else { "" }
            );
            if let Some(o) = &summary.overflow {
                println!("  carried: {}  cleared: {}", o.carried, o.cleared);
            }
            if summary.late_cleared > 0 {
                println!("  cleared after the queue phase: {}", summary.late_cleared);
            }
            if let Some(u) = &summary.upkeep {
                println!("  upkeep:  {} credits from {} ships", u.paid, u.ships);
            }
            if let Some(e) = &summary.execution {
                println!(
                    "  orders:  {} succeeded, {} failed, {} overflowed ({} actions)",
                    e.succeeded, e.failed, e.overflowed, e.actions
                );
            }
            if summary.unanswered > 0 {
                println!("  {} moderator request(s) answered with the sentinel", summary.unanswered);
            }
        }
    }
    Ok(())
}
