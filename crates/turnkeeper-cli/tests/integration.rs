#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const UNIVERSE: &str = r#"
systems:
  - { id: 1, name: Omicron, star: M13 }
bodies:
  - { id: 10, name: Meridian, kind: planet, system: 1, position: D04 }
bases:
  - id: 20
    name: Meridian Station
    system: 1
    position: D04
    market: { fuel: 5, ore: 12 }
players:
  - { id: 1, name: Ann, email: ann@example.com, account: ACC-1, credits: 1000 }
  - { id: 2, name: Bo, email: bo@example.com, credits: 500 }
ships:
  - { id: 100, name: Wayfarer, owner: 1, system: 1, position: D04, crew_count: 10, crew_required: 10 }
  - { id: 200, name: Lantern, owner: 2, system: 1, position: A01, tu_allowance: 30 }
"#;

fn tk(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("turnkeeper").unwrap();
    cmd.current_dir(dir.path()).env("TURNKEEPER_ROOT", dir.path());
    cmd
}

fn init_game(dir: &TempDir) {
    let universe = dir.path().join("universe.yaml");
    std::fs::write(&universe, UNIVERSE).unwrap();
    tk(dir)
        .args(["init", "--game-id", "OMICRON101", "--universe"])
        .arg(&universe)
        .assert()
        .success();
}

fn submit(dir: &TempDir, ship: &str, body: &str) {
    let file = dir.path().join(format!("orders-{ship}.yaml"));
    std::fs::write(&file, body).unwrap();
    tk(dir)
        .args(["submit", "--ship", ship, "--file"])
        .arg(&file)
        .assert()
        .success();
}

// ---------------------------------------------------------------------------
// init / status
// ---------------------------------------------------------------------------

#[test]
fn init_creates_game_files() {
    let dir = TempDir::new().unwrap();
    init_game(&dir);
    assert!(dir.path().join(".turnkeeper/config.yaml").exists());
    assert!(dir.path().join(".turnkeeper/pipeline.yaml").exists());
    assert!(dir.path().join(".turnkeeper/game.db").exists());

    tk(&dir)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Turn:    500.1"))
        .stdout(predicate::str::contains("OPEN"));
}

#[test]
fn init_twice_fails() {
    let dir = TempDir::new().unwrap();
    init_game(&dir);
    let universe = dir.path().join("universe.yaml");
    tk(&dir)
        .args(["init", "--game-id", "OMICRON101", "--universe"])
        .arg(&universe)
        .assert()
        .failure()
        .stderr(predicate::str::contains("already initialized"));
}

#[test]
fn status_without_game_fails() {
    let dir = TempDir::new().unwrap();
    tk(&dir)
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not initialized"));
}

// ---------------------------------------------------------------------------
// submit / order
// ---------------------------------------------------------------------------

#[test]
fn submit_accepts_yaml_and_json() {
    let dir = TempDir::new().unwrap();
    init_game(&dir);
    submit(&dir, "100", "- { command: MOVE, params: B02 }\n- { command: locationscan }\n");
    submit(&dir, "200", r#"[{"command": "WAIT", "params": {"tu": 3}}]"#);

    tk(&dir)
        .args(["order", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("MOVE B02"))
        .stdout(predicate::str::contains("LOCATIONSCAN"))
        .stdout(predicate::str::contains("WAIT 3"));
}

#[test]
fn submit_rejects_unknown_commands() {
    let dir = TempDir::new().unwrap();
    init_game(&dir);
    let file = dir.path().join("bad.yaml");
    std::fs::write(&file, "- { command: FLY, params: A01 }\n").unwrap();
    tk(&dir)
        .args(["submit", "--ship", "100", "--file"])
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown command 'FLY'"));
}

#[test]
fn order_insert_and_delete() {
    let dir = TempDir::new().unwrap();
    init_game(&dir);
    submit(&dir, "100", "- { command: WAIT, params: 1 }\n- { command: WAIT, params: 2 }\n");

    tk(&dir)
        .args(["order", "insert", "100", "1", "MOVE", "C03"])
        .assert()
        .success()
        .stdout(predicate::str::contains("inserted order"));
    tk(&dir)
        .args(["order", "delete", "100", "3"])
        .assert()
        .success();

    let out = tk(&dir)
        .args(["--json", "order", "list", "--ship", "100"])
        .output()
        .unwrap();
    let orders: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    let seqs: Vec<u64> = orders
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["seq"].as_u64().unwrap())
        .collect();
    assert_eq!(seqs, vec![1, 2]);
    assert_eq!(orders[1]["kind"]["wait"]["tu"], 1);
}

// ---------------------------------------------------------------------------
// resolve / moderator / advance
// ---------------------------------------------------------------------------

#[test]
fn moderator_request_holds_then_completes() {
    let dir = TempDir::new().unwrap();
    init_game(&dir);
    submit(&dir, "100", "- { command: MODERATOR, params: \"Can I salvage the wreck?\" }\n");

    tk(&dir)
        .arg("resolve")
        .assert()
        .success()
        .stdout(predicate::str::contains("HELD"))
        .stdout(predicate::str::contains("Can I salvage the wreck?"));

    tk(&dir)
        .args(["moderator", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("M1"));

    tk(&dir)
        .args(["moderator", "respond", "M1", "Yes, for 50 credits."])
        .assert()
        .success();
    tk(&dir).arg("release").assert().success();
    tk(&dir)
        .arg("resolve")
        .assert()
        .success()
        .stdout(predicate::str::contains("turn 500.1 resolved"));

    tk(&dir)
        .arg("report")
        .assert()
        .success()
        .stdout(predicate::str::contains("Response: Yes, for 50 credits."));

    tk(&dir)
        .arg("advance")
        .assert()
        .success()
        .stdout(predicate::str::contains("turn 500.2 is OPEN"));
}

#[test]
fn forced_resolve_uses_the_sentinel() {
    let dir = TempDir::new().unwrap();
    init_game(&dir);
    submit(&dir, "100", "- { command: MODERATOR, params: first }\n");
    submit(&dir, "200", "- { command: MODERATOR, params: second }\n");
    tk(&dir).arg("resolve").assert().success();

    tk(&dir)
        .args(["resolve", "--force"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 moderator request(s) answered with the sentinel"));

    tk(&dir)
        .args(["moderator", "show", "M2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(no response)"));
}

#[test]
fn overflow_is_reported_and_carried() {
    let dir = TempDir::new().unwrap();
    init_game(&dir);
    // Lantern has 30 TU: the move (3 steps × 2) and the wait fit, the scan does not.
    submit(
        &dir,
        "200",
        "- { command: MOVE, params: D04 }\n- { command: WAIT, params: 20 }\n- { command: LOCATIONSCAN }\n",
    );
    tk(&dir).arg("resolve").assert().success();

    tk(&dir)
        .args(["report", "--turn", "500.1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Carried to next turn:"))
        .stdout(predicate::str::contains("Insufficient TU: 20 needed, 4 remaining."));

    tk(&dir).arg("advance").assert().success();
    submit(&dir, "200", "- { command: WAIT, params: 5 }\n");
    tk(&dir).arg("resolve").assert().success();

    let out = tk(&dir)
        .args(["--json", "order", "list", "--ship", "200"])
        .output()
        .unwrap();
    let orders: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(orders[0]["lane"], "carried");
    assert_eq!(orders[0]["carried_from"], "500.1");

    let out = tk(&dir)
        .args(["--json", "report", "--turn", "500.2"])
        .output()
        .unwrap();
    let report: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    let lantern = report["ships"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["ship"] == 200)
        .unwrap();
    let ran: Vec<(String, String)> = lantern["entries"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|e| e["outcome"] != "upkeep")
        .map(|e| {
            (
                e["action"].as_str().unwrap().to_string(),
                e["outcome"].as_str().unwrap().to_string(),
            )
        })
        .collect();
    assert_eq!(
        ran,
        vec![
            ("LOCATIONSCAN".to_string(), "succeeded".to_string()),
            ("WAIT 5".to_string(), "succeeded".to_string()),
        ]
    );
    assert!(report["overflow"].as_array().unwrap().is_empty());
}

#[test]
fn resolve_twice_is_rejected() {
    let dir = TempDir::new().unwrap();
    init_game(&dir);
    tk(&dir).arg("resolve").assert().success();
    tk(&dir)
        .arg("resolve")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid transition"));
}

// ---------------------------------------------------------------------------
// player / config
// ---------------------------------------------------------------------------

#[test]
fn suspended_player_cannot_submit() {
    let dir = TempDir::new().unwrap();
    init_game(&dir);
    tk(&dir).args(["player", "suspend", "2"]).assert().success();
    let file = dir.path().join("o.yaml");
    std::fs::write(&file, "- { command: WAIT, params: 1 }\n").unwrap();
    tk(&dir)
        .args(["submit", "--ship", "200", "--file"])
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("suspended"));
    tk(&dir).args(["player", "reinstate", "2"]).assert().success();
    submit(&dir, "200", "- { command: WAIT, params: 1 }\n");
}

#[test]
fn config_validate_passes_on_fresh_game() {
    let dir = TempDir::new().unwrap();
    init_game(&dir);
    tk(&dir)
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Config is valid"));
}
