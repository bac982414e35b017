//! One resolution pass over the current turn.
//!
//! Phases run in order and each is recorded in the pipeline once done, so an
//! interrupted pass resumes from the first unfinished phase:
//!
//!   queue      overflow from the previous turn becomes carried orders
//!   gate       MODERATOR requests are opened; unanswered ones hold the turn
//!   upkeep     crew wages
//!   execution  late CLEARs drop carried orders, then interleaved execution
//!
//! The gate runs before anything touches the world, so a held turn has no
//! mutations to undo.

use crate::error::{Result, TurnError};
use crate::executor::{ExecutionSummary, Executor};
use crate::game::Game;
use crate::moderator::{self, ArbitrationDesk, GateDecision, GateRequest};
use crate::overflow::{self, Materialized};
use crate::queue;
use crate::types::{OrderId, Phase, TurnId, TurnStatus};
use crate::upkeep::{self, UpkeepSummary};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolveSummary {
    pub turn: TurnId,
    pub forced: bool,
    /// `None` when the phase had already run in an earlier attempt.
    pub overflow: Option<Materialized>,
    /// Carried orders discarded by a CLEAR submitted after the queue phase.
    pub late_cleared: usize,
    pub upkeep: Option<UpkeepSummary>,
    pub execution: Option<ExecutionSummary>,
    /// Requests answered with the sentinel because the resolve was forced.
    pub unanswered: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResolveOutcome {
    /// The turn is HELD until these requests are answered and it is released.
    Held(Vec<GateRequest>),
    Completed(ResolveSummary),
}

/// Run (or resume) resolution of the current turn. `force` is the operator
/// override: it starts from any status and answers every unanswered
/// moderator request with the configured sentinel.
pub fn resolve(game: &mut Game, force: bool) -> Result<ResolveOutcome> {
    if force {
        game.pipeline.force_processing("forced resolution");
    } else {
        game.pipeline.begin_resolution()?;
    }
    game.save_pipeline()?;

    let turn = game.pipeline.turn;
    let forced = game.pipeline.forced;
    let mut summary = ResolveSummary {
        turn,
        forced,
        overflow: None,
        late_cleared: 0,
        upkeep: None,
        execution: None,
        unanswered: 0,
    };

    let mut world = game.store.load_world()?;

    if !game.pipeline.is_phase_done(Phase::Queue) {
        summary.overflow = Some(overflow::materialize(&game.store, &world, turn)?);
        finish_phase(game, Phase::Queue)?;
    }

    let queues = queue::build(&game.store, &world, turn, &game.config.costs)?;
    let batch = queue::batch(&queues);
    let batch_ids: Vec<OrderId> = batch.iter().map(|o| o.id).collect();

    if !game.pipeline.is_phase_done(Phase::Gate) {
        match moderator::gate(game.root(), &world, &batch, forced)? {
            GateDecision::Hold(requests) => {
                game.pipeline.hold(format!(
                    "{} moderator request(s) awaiting response",
                    requests.len()
                ))?;
                game.save_pipeline()?;
                return Ok(ResolveOutcome::Held(requests));
            }
            GateDecision::Proceed { unanswered } => {
                summary.unanswered = unanswered;
                finish_phase(game, Phase::Gate)?;
            }
        }
    }

    if !game.pipeline.is_phase_done(Phase::Upkeep) {
        summary.upkeep = Some(upkeep::pay_wages(
            &game.store,
            &mut world,
            turn,
            game.config.crew_wage,
        )?);
        finish_phase(game, Phase::Upkeep)?;
    }

    let mut desk = ArbitrationDesk::open(game.root(), forced, game.config.moderator_sentinel.as_str())?;
    if !game.pipeline.is_phase_done(Phase::Execution) {
        summary.late_cleared = overflow::clear_carried(&game.store, turn)?;
        let queues = if summary.late_cleared > 0 {
            queue::build(&game.store, &world, turn, &game.config.costs)?
        } else {
            queues
        };
        let executor = Executor::new(&game.store, &game.config, turn, &mut world, &mut desk)?;
        summary.execution = Some(executor.run(queues)?);
        finish_phase(game, Phase::Execution)?;
    }

    let pending = desk.pending_among(&batch_ids);
    if pending > 0 {
        return Err(TurnError::PendingModeration {
            turn: turn.to_string(),
            pending,
        });
    }

    game.pipeline.transition(TurnStatus::Completed, "resolution finished")?;
    game.save_pipeline()?;
    Ok(ResolveOutcome::Completed(summary))
}

fn finish_phase(game: &mut Game, phase: Phase) -> Result<()> {
    game.pipeline.mark_phase_done(phase);
    game.save_pipeline()?;
    tracing::info!(turn = %game.pipeline.turn, %phase, "phase complete");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::tests::universe;
    use crate::handlers::movement::Wait;
    use crate::moderator::ModeratorStatus;
    use crate::order::{Lane, NormalizedOrder, OrderKind, OrderStatus};
    use crate::overflow::{OverflowEntry, CLEARED_REASON};
    use crate::store::{Outcome, Step};
    use crate::world::PlayerStatus;
    use crate::submission;
    use serde_json::json;
    use tempfile::TempDir;

    fn game(dir: &TempDir) -> Game {
        Game::init(dir.path(), "G1", universe()).unwrap()
    }

    fn orders(list: &[(&str, serde_json::Value)]) -> Vec<NormalizedOrder> {
        list.iter()
            .map(|(c, p)| NormalizedOrder::new(*c, p.clone()))
            .collect()
    }

    #[test]
    fn plain_turn_completes() {
        let dir = TempDir::new().unwrap();
        let mut game = game(&dir);
        submission::submit(&mut game, 100, orders(&[("LOCATIONSCAN", json!(null))])).unwrap();

        let ResolveOutcome::Completed(summary) = resolve(&mut game, false).unwrap() else {
            panic!("expected completion");
        };
        assert_eq!(game.pipeline.status, TurnStatus::Completed);
        assert_eq!(summary.execution.unwrap().succeeded, 1);
        assert_eq!(summary.upkeep.unwrap().ships, 2);
        assert_eq!(game.pipeline.completed_phases, Phase::all().to_vec());
    }

    #[test]
    fn moderator_request_holds_without_mutating_the_world() {
        let dir = TempDir::new().unwrap();
        let mut game = game(&dir);
        submission::submit(
            &mut game,
            100,
            orders(&[("LOCATIONSCAN", json!(null)), ("MODERATOR", json!("Can I hire pirates?"))]),
        )
        .unwrap();
        let before = game.store.load_world().unwrap();

        let ResolveOutcome::Held(requests) = resolve(&mut game, false).unwrap() else {
            panic!("expected hold");
        };
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].requester, "Ann (ACC-1)");
        assert_eq!(requests[0].text, "Can I hire pirates?");
        assert_eq!(game.pipeline.status, TurnStatus::Held);
        assert_eq!(game.store.load_world().unwrap(), before);
        assert!(game.store.log_for_turn(game.pipeline.turn).unwrap().is_empty());

        // Retrying without an answer holds again and opens no duplicate.
        game.pipeline.release("retry").unwrap();
        assert!(matches!(resolve(&mut game, false).unwrap(), ResolveOutcome::Held(_)));
        assert_eq!(moderator::list(dir.path(), Some("all")).unwrap().len(), 1);

        moderator::respond(dir.path(), &requests[0].action, "Only in neutral space.").unwrap();
        game.pipeline.release("answered").unwrap();
        assert!(matches!(resolve(&mut game, false).unwrap(), ResolveOutcome::Completed(_)));

        let action = moderator::get(dir.path(), &requests[0].action).unwrap();
        assert_eq!(action.status, ModeratorStatus::Resolved);
        assert!(!action.sentinel);
    }

    #[test]
    fn forced_resolve_answers_with_the_sentinel() {
        let dir = TempDir::new().unwrap();
        let mut game = game(&dir);
        submission::submit(&mut game, 100, orders(&[("MODERATOR", json!("first"))])).unwrap();
        submission::submit(&mut game, 200, orders(&[("MODERATOR", json!("second"))])).unwrap();
        assert!(matches!(resolve(&mut game, false).unwrap(), ResolveOutcome::Held(_)));

        let ResolveOutcome::Completed(summary) = resolve(&mut game, true).unwrap() else {
            panic!("forced resolve must complete");
        };
        assert!(summary.forced);
        assert_eq!(summary.unanswered, 2);
        let actions = moderator::list(dir.path(), Some("all")).unwrap();
        assert_eq!(actions.len(), 2);
        for a in actions {
            assert!(a.sentinel);
            assert_eq!(a.response.as_deref(), Some(game.config.moderator_sentinel.as_str()));
        }
    }

    #[test]
    fn normal_resolve_refuses_an_interrupted_turn() {
        let dir = TempDir::new().unwrap();
        let mut game = game(&dir);
        game.pipeline.transition(TurnStatus::Processing, "crashed").unwrap();
        assert!(matches!(
            resolve(&mut game, false),
            Err(TurnError::Interrupted { .. })
        ));
    }

    #[test]
    fn resumed_pass_skips_finished_phases() {
        let dir = TempDir::new().unwrap();
        let mut game = game(&dir);
        submission::submit(&mut game, 100, orders(&[("WAIT", json!(5))])).unwrap();
        // Upkeep already ran in the crashed attempt.
        game.pipeline.transition(TurnStatus::Processing, "first attempt").unwrap();
        game.pipeline.mark_phase_done(Phase::Queue);
        game.pipeline.mark_phase_done(Phase::Gate);
        game.pipeline.mark_phase_done(Phase::Upkeep);
        game.pipeline.release("recover").unwrap();

        let ResolveOutcome::Completed(summary) = resolve(&mut game, false).unwrap() else {
            panic!("expected completion");
        };
        assert!(summary.upkeep.is_none());
        let log = game.store.log_for_turn(game.pipeline.turn).unwrap();
        assert!(log.iter().all(|e| e.outcome != Outcome::Upkeep));
        let order = &game.store.orders_for_ship(game.pipeline.turn, 100).unwrap()[0];
        assert_eq!(order.status, OrderStatus::Succeeded);
    }

    fn park(game: &Game, ship: u64, order: u64, tu: u32) {
        let entry = OverflowEntry {
            order,
            kind: OrderKind::Wait(Wait { tu }),
            reason: "Insufficient TU".into(),
            from_turn: TurnId::new(499, 52),
        };
        game.store
            .commit_step(Step {
                overflow: vec![(ship, vec![entry])],
                ..Step::default()
            })
            .unwrap();
    }

    #[test]
    fn clear_after_a_hold_discards_carried_orders() {
        let dir = TempDir::new().unwrap();
        let mut game = game(&dir);
        park(&game, 100, 900, 7);
        submission::submit(&mut game, 200, orders(&[("MODERATOR", json!("Dock fees?"))])).unwrap();

        let ResolveOutcome::Held(requests) = resolve(&mut game, false).unwrap() else {
            panic!("expected hold");
        };
        // The carried order is already in the turn.
        let carried = &game.store.orders_for_ship(game.pipeline.turn, 100).unwrap()[0];
        assert_eq!((carried.id, carried.status), (900, OrderStatus::Pending));

        moderator::respond(dir.path(), &requests[0].action, "Waived.").unwrap();
        game.pipeline.release("answered").unwrap();
        submission::submit(&mut game, 100, orders(&[("CLEAR", json!(null))])).unwrap();

        let ResolveOutcome::Completed(summary) = resolve(&mut game, false).unwrap() else {
            panic!("expected completion");
        };
        assert_eq!(summary.late_cleared, 1);

        let turn = game.pipeline.turn;
        let orders = game.store.orders_for_ship(turn, 100).unwrap();
        assert_eq!(orders[0].lane, Lane::Carried);
        assert_eq!(orders[0].status, OrderStatus::Failed);
        assert_eq!(orders[0].result.as_deref(), Some(CLEARED_REASON));
        assert_eq!(orders[0].tu_spent, 0);
        assert_eq!(orders[1].result.as_deref(), Some("1 overflow order(s) cleared."));

        let log = game.store.log_for_turn(turn).unwrap();
        assert!(log.iter().all(|e| e.order != Some(900)));
        assert_eq!(game.store.ship(100).unwrap().tu_remaining, 300);
    }

    #[test]
    fn reinstated_ship_keeps_parked_overflow_when_it_overflows_again() {
        let dir = TempDir::new().unwrap();
        let mut game = game(&dir);
        game.set_player_status(2, PlayerStatus::Suspended).unwrap();
        park(&game, 200, 900, 7);
        submission::submit(&mut game, 100, orders(&[("MODERATOR", json!("Tariffs?"))])).unwrap();

        let ResolveOutcome::Held(requests) = resolve(&mut game, false).unwrap() else {
            panic!("expected hold");
        };
        assert_eq!(game.store.overflow(200).unwrap().len(), 1);

        moderator::respond(dir.path(), &requests[0].action, "None.").unwrap();
        game.pipeline.release("answered").unwrap();
        game.set_player_status(2, PlayerStatus::Active).unwrap();
        // Lantern has 120 TU; the scan no longer fits after the wait.
        submission::submit(
            &mut game,
            200,
            orders(&[("WAIT", json!(110)), ("LOCATIONSCAN", json!(null))]),
        )
        .unwrap();
        assert!(matches!(resolve(&mut game, false).unwrap(), ResolveOutcome::Completed(_)));

        let parked: Vec<(u64, &'static str)> = game
            .store
            .overflow(200)
            .unwrap()
            .iter()
            .map(|e| (e.order, e.kind.command()))
            .collect();
        assert_eq!(parked.len(), 2);
        assert_eq!(parked[0], (900, "WAIT"));
        assert_eq!(parked[1].1, "LOCATIONSCAN");
    }
}
