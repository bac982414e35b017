use crate::output::print_json;
use anyhow::Context;
use std::path::Path;
use turnkeeper_core::order::NormalizedOrder;
use turnkeeper_core::submission;

pub fn run(root: &Path, ship: u64, file: &Path, json: bool) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    // YAML is a superset of JSON, so one parser covers both.
    let orders: Vec<NormalizedOrder> = serde_yaml::from_str(&raw)
        .with_context(|| format!("{} is not a list of {{command, params}}", file.display()))?;

    let mut game = super::open(root)?;
    let stored = submission::submit(&mut game, ship, orders)?;
    if json {
        print_json(&stored)?;
    } else {
        println!(
            "accepted {} order(s) for ship {} in turn {}",
            stored.len(),
            ship,
            game.pipeline.turn
        );
        for o in &stored {
            println!("  {:>2}. {}", o.seq, o.kind);
        }
    }
    Ok(())
}
