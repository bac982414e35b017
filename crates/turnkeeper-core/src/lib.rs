pub mod advance;
pub mod config;
pub mod error;
pub mod executor;
pub mod game;
pub mod handlers;
pub mod io;
pub mod moderator;
pub mod order;
pub mod overflow;
pub mod paths;
pub mod pipeline;
pub mod queue;
pub mod report;
pub mod resolve;
pub mod rng;
pub mod store;
pub mod submission;
pub mod types;
pub mod upkeep;
pub mod world;

pub use error::{Result, TurnError};
pub use game::{Game, Universe};
