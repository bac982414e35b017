use thiserror::Error;

#[derive(Debug, Error)]
pub enum TurnError {
    #[error("not initialized: run 'turnkeeper init'")]
    NotInitialized,

    #[error("game already initialized at {0}")]
    AlreadyInitialized(String),

    #[error("invalid transition from {from} to {to}: {reason}")]
    InvalidTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error(
        "turn {turn} is still PROCESSING from an interrupted resolution; run 'turnkeeper release' first"
    )]
    Interrupted { turn: String },

    #[error("orders are only accepted while the turn is open (turn {turn} is {status})")]
    NotAcceptingOrders { turn: String, status: String },

    #[error("orders cannot be edited while turn {0} is processing")]
    OrdersLocked(String),

    #[error("invalid order: {0}")]
    Validation(String),

    #[error("invalid turn id '{0}': expected <year>.<week> with week 1-52")]
    InvalidTurnId(String),

    #[error("invalid coordinate '{0}': expected A01-Y25")]
    InvalidCoordinate(String),

    #[error("ship not found: {0}")]
    ShipNotFound(u64),

    #[error("player not found: {0}")]
    PlayerNotFound(u64),

    #[error("order not found: ship {ship} {lane} #{seq}")]
    OrderNotFound { ship: u64, lane: String, seq: u32 },

    #[error("order {0} has already been settled and cannot be changed")]
    OrderSettled(u64),

    #[error("moderator action not found: {0}")]
    ModeratorActionNotFound(String),

    #[error("moderator action {0} is already resolved")]
    ModeratorActionResolved(String),

    #[error("turn {turn} has {pending} pending moderator request(s)")]
    PendingModeration { turn: String, pending: usize },

    #[error("snapshot for turn {0} already exists")]
    SnapshotExists(String),

    #[error("universe file error: {0}")]
    Universe(String),

    #[error("store error: {0}")]
    Store(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TurnError>;

/// Flattens a redb error into [`TurnError::Store`].
pub(crate) fn store_err(e: impl std::fmt::Display) -> TurnError {
    TurnError::Store(e.to_string())
}
