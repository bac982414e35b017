use crate::output::print_json;
use std::path::Path;
use turnkeeper_core::advance;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let mut game = super::open(root)?;
    let summary = advance::advance(&mut game)?;
    if json {
        print_json(&summary)?;
    } else {
        println!(
            "turn {} archived; turn {} is OPEN ({} ships refilled)",
            summary.completed, summary.opened, summary.ships_reset
        );
    }
    Ok(())
}
