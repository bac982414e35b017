use crate::output::print_json;
use anyhow::Context;
use std::path::Path;

pub fn hold(root: &Path, reason: &str, json: bool) -> anyhow::Result<()> {
    let mut game = super::open(root)?;
    game.pipeline.hold(reason)?;
    game.save_pipeline().context("failed to save pipeline")?;
    report(&game.pipeline, json)
}

pub fn release(root: &Path, reason: &str, json: bool) -> anyhow::Result<()> {
    let mut game = super::open(root)?;
    game.pipeline.release(reason)?;
    game.save_pipeline().context("failed to save pipeline")?;
    report(&game.pipeline, json)
}

fn report(p: &turnkeeper_core::pipeline::Pipeline, json: bool) -> anyhow::Result<()> {
    if json {
        print_json(&serde_json::json!({ "turn": p.turn, "status": p.status }))
    } else {
        println!("turn {} is {}", p.turn, p.status);
        Ok(())
    }
}
