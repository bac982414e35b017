use crate::output::print_json;
use anyhow::Context;
use std::path::Path;
use turnkeeper_core::report;
use turnkeeper_core::types::TurnId;

pub fn run(root: &Path, turn: Option<&str>, json: bool) -> anyhow::Result<()> {
    let game = super::open(root)?;
    let turn: TurnId = match turn {
        Some(t) => t.parse().with_context(|| format!("bad --turn '{t}'"))?,
        None => game.pipeline.turn,
    };
    let report = report::build(&game, turn)?;
    if json {
        print_json(&report)
    } else {
        print!("{report}");
        Ok(())
    }
}
