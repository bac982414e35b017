use crate::output::{print_json, print_table, truncate};
use clap::Subcommand;
use std::path::Path;
use turnkeeper_core::order::{Lane, NormalizedOrder, Order};
use turnkeeper_core::submission;

// ---------------------------------------------------------------------------
// Subcommand tree
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum OrderSubcommand {
    /// List the current turn's orders
    List {
        /// Only this ship
        #[arg(long)]
        ship: Option<u64>,
    },

    /// Replace a pending order
    Edit {
        ship: u64,
        /// Sequence number within the lane
        seq: u32,
        /// Command, e.g. MOVE
        command: String,
        /// Parameters, e.g. B02
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        params: Vec<String>,
        /// carried | submitted
        #[arg(long, default_value = "submitted")]
        lane: String,
    },

    /// Delete a pending order
    Delete {
        ship: u64,
        seq: u32,
        #[arg(long, default_value = "submitted")]
        lane: String,
    },

    /// Insert an order at a sequence position, shifting later orders down
    Insert {
        ship: u64,
        seq: u32,
        command: String,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        params: Vec<String>,
        #[arg(long, default_value = "submitted")]
        lane: String,
    },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(root: &Path, subcommand: OrderSubcommand, json: bool) -> anyhow::Result<()> {
    let mut game = super::open(root)?;
    match subcommand {
        OrderSubcommand::List { ship } => {
            let orders = submission::list(&game, ship)?;
            if json {
                return print_json(&orders);
            }
            if orders.is_empty() {
                println!("no orders for turn {}", game.pipeline.turn);
                return Ok(());
            }
            print_table(
                &["SHIP", "LANE", "SEQ", "ID", "ORDER", "STATUS", "RESULT"],
                orders.iter().map(row).collect(),
            );
            Ok(())
        }

        OrderSubcommand::Edit {
            ship,
            seq,
            command,
            params,
            lane,
        } => {
            let lane: Lane = lane.parse()?;
            let order = submission::edit(&mut game, ship, lane, seq, normalized(command, params))?;
            done("edited", &order, json)
        }

        OrderSubcommand::Delete { ship, seq, lane } => {
            let lane: Lane = lane.parse()?;
            let order = submission::delete(&mut game, ship, lane, seq)?;
            done("deleted", &order, json)
        }

        OrderSubcommand::Insert {
            ship,
            seq,
            command,
            params,
            lane,
        } => {
            let lane: Lane = lane.parse()?;
            let order = submission::insert_at(&mut game, ship, lane, seq, normalized(command, params))?;
            done("inserted", &order, json)
        }
    }
}

fn normalized(command: String, params: Vec<String>) -> NormalizedOrder {
    let params = if params.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::Value::String(params.join(" "))
    };
    NormalizedOrder::new(command, params)
}

fn row(o: &Order) -> Vec<String> {
    vec![
        o.ship.to_string(),
        o.lane.to_string(),
        o.seq.to_string(),
        o.id.to_string(),
        truncate(&o.kind.to_string(), 40),
        o.status.to_string(),
        truncate(o.result.as_deref().unwrap_or(""), 50),
    ]
}

fn done(verb: &str, order: &Order, json: bool) -> anyhow::Result<()> {
    if json {
        print_json(order)
    } else {
        println!(
            "{verb} order {} (ship {} {} #{}): {}",
            order.id, order.ship, order.lane, order.seq, order.kind
        );
        Ok(())
    }
}
