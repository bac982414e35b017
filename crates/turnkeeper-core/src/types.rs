use crate::error::TurnError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

pub type ShipId = u64;
pub type PlayerId = u64;
pub type BaseId = u64;
pub type BodyId = u64;
pub type SystemId = u64;
pub type OrderId = u64;

pub const WEEKS_PER_YEAR: u8 = 52;

// ---------------------------------------------------------------------------
// TurnId
// ---------------------------------------------------------------------------

/// A game turn, written `year.week` (e.g. `500.1`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TurnId {
    pub year: u32,
    pub week: u8,
}

impl TurnId {
    pub fn new(year: u32, week: u8) -> Self {
        Self { year, week }
    }

    /// The following turn; week 52 rolls over to week 1 of the next year.
    pub fn next(self) -> Self {
        if self.week >= WEEKS_PER_YEAR {
            Self {
                year: self.year + 1,
                week: 1,
            }
        } else {
            Self {
                year: self.year,
                week: self.week + 1,
            }
        }
    }

    /// Big-endian key bytes; byte order equals turn order.
    pub fn key_bytes(self) -> [u8; 5] {
        let mut key = [0u8; 5];
        key[..4].copy_from_slice(&self.year.to_be_bytes());
        key[4] = self.week;
        key
    }
}

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.year, self.week)
    }
}

impl FromStr for TurnId {
    type Err = TurnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || TurnError::InvalidTurnId(s.to_string());
        let (year, week) = s.trim().split_once('.').ok_or_else(bad)?;
        let year: u32 = year.parse().map_err(|_| bad())?;
        let week: u8 = week.parse().map_err(|_| bad())?;
        if week == 0 || week > WEEKS_PER_YEAR {
            return Err(bad());
        }
        Ok(Self { year, week })
    }
}

impl Serialize for TurnId {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TurnId {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(d)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// TurnStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    Open,
    Held,
    Processing,
    Completed,
}

impl TurnStatus {
    pub fn all() -> &'static [TurnStatus] {
        &[
            TurnStatus::Open,
            TurnStatus::Held,
            TurnStatus::Processing,
            TurnStatus::Completed,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TurnStatus::Open => "OPEN",
            TurnStatus::Held => "HELD",
            TurnStatus::Processing => "PROCESSING",
            TurnStatus::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for TurnStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// Resolution phases, in execution order. Completion markers are persisted
/// so an interrupted resolution resumes from the first incomplete phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Queue,
    Gate,
    Upkeep,
    Execution,
}

impl Phase {
    pub fn all() -> &'static [Phase] {
        &[Phase::Queue, Phase::Gate, Phase::Upkeep, Phase::Execution]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Queue => "queue",
            Phase::Gate => "gate",
            Phase::Upkeep => "upkeep",
            Phase::Execution => "execution",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// GridPos
// ---------------------------------------------------------------------------

pub const GRID_SIZE: u8 = 25;

static COORD_RE: OnceLock<Regex> = OnceLock::new();

fn coord_re() -> &'static Regex {
    COORD_RE.get_or_init(|| Regex::new(r"^([A-Ya-y])(\d{2})$").expect("static regex"))
}

/// A square on a system's 25x25 grid: columns `A`-`Y`, rows `01`-`25`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridPos {
    /// Zero-based column index (`A` = 0).
    pub col: u8,
    /// One-based row.
    pub row: u8,
}

impl GridPos {
    pub fn new(col: u8, row: u8) -> Option<Self> {
        (col < GRID_SIZE && (1..=GRID_SIZE).contains(&row)).then_some(Self { col, row })
    }

    /// Chebyshev distance: diagonal moves cost the same as orthogonal ones.
    pub fn distance(self, other: GridPos) -> u32 {
        let dc = (self.col as i32 - other.col as i32).unsigned_abs();
        let dr = (self.row as i32 - other.row as i32).unsigned_abs();
        dc.max(dr)
    }

    /// One square closer to `target` (or `self` when already there).
    pub fn step_toward(self, target: GridPos) -> GridPos {
        let step = |from: u8, to: u8| match from.cmp(&to) {
            std::cmp::Ordering::Less => from + 1,
            std::cmp::Ordering::Greater => from - 1,
            std::cmp::Ordering::Equal => from,
        };
        GridPos {
            col: step(self.col, target.col),
            row: step(self.row, target.row),
        }
    }
}

impl fmt::Display for GridPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:02}", (b'A' + self.col) as char, self.row)
    }
}

impl FromStr for GridPos {
    type Err = TurnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || TurnError::InvalidCoordinate(s.to_string());
        let caps = coord_re().captures(s.trim()).ok_or_else(bad)?;
        let col = caps[1].to_ascii_uppercase().as_bytes()[0] - b'A';
        let row: u8 = caps[2].parse().map_err(|_| bad())?;
        GridPos::new(col, row).ok_or_else(bad)
    }
}

impl Serialize for GridPos {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for GridPos {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(d)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
