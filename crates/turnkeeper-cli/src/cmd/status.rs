use crate::output::print_json;
use std::path::Path;
use turnkeeper_core::moderator;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let game = super::open(root)?;
    let p = &game.pipeline;
    let counts = game.store.order_counts(p.turn)?;
    let pending_requests = moderator::list(root, None)?.len();

    if json {
        print_json(&serde_json::json!({
            "game_id": p.game_id,
            "turn": p.turn,
            "status": p.status,
            "forced": p.forced,
            "completed_phases": p.completed_phases,
            "orders": counts,
            "pending_moderator_requests": pending_requests,
            "last_updated": p.last_updated,
        }))?;
        return Ok(());
    }

    println!("Game:    {}", p.game_id);
    println!("Turn:    {}", p.turn);
    println!("Status:  {}{}", p.status, if p.forced { " (forced)" } else { "" });
    let phases: Vec<&str> = p.completed_phases.iter().map(|ph| ph.as_str()).collect();
    println!(
        "Phases:  {}",
        if phases.is_empty() { "-".to_string() } else { phases.join(", ") }
    );
    if counts.is_empty() {
        println!("Orders:  none");
    } else {
        let parts: Vec<String> = counts.iter().map(|(s, n)| format!("{n} {s}")).collect();
        println!("Orders:  {}", parts.join(", "));
    }
    if pending_requests > 0 {
        println!("Moderator requests awaiting response: {pending_requests}");
    }
    println!("Updated: {}", p.last_updated.format("%Y-%m-%d %H:%M UTC"));
    Ok(())
}
