// Domain models shared by the sync engine and its collaborators

use std::{fmt, str::FromStr};

use serde::Deserialize;

/// Reading status as the remote store understands it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadStatus {
    New,
    Reading,
    Finished,
}

impl ReadStatus {
    /// Integer stored in the remote `read_state` column.
    pub fn wire_value(self) -> i32 {
        match self {
            ReadStatus::New => 0,
            ReadStatus::Reading => 1,
            ReadStatus::Finished => 2,
        }
    }

    pub fn from_wire(value: i64) -> Option<Self> {
        match value {
            0 => Some(ReadStatus::New),
            1 => Some(ReadStatus::Reading),
            2 => Some(ReadStatus::Finished),
            _ => None,
        }
    }
}

/// Position within the main page flow, `numerator / denominator`.
///
/// The denominator counts pages of the primary flow only, so footnote or
/// cover flows never inflate it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    numerator: u32,
    denominator: u32,
}

impl Progress {
    /// Placeholder progress for a document that was never opened.
    pub const UNOPENED: Progress = Progress {
        numerator: 0,
        denominator: 1,
    };

    pub const COMPLETE: Progress = Progress {
        numerator: 1,
        denominator: 1,
    };

    /// Returns `None` for an empty flow or a numerator past the end.
    pub fn new(numerator: u32, denominator: u32) -> Option<Self> {
        if denominator == 0 || numerator > denominator {
            return None;
        }
        Some(Progress {
            numerator,
            denominator,
        })
    }

    /// Percent-complete figure in `0.0..=1.0` expressed as `n/100`.
    pub fn from_fraction(fraction: f64) -> Self {
        let clamped = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Progress {
            numerator: (clamped * 100.0).round() as u32,
            denominator: 100,
        }
    }

    pub fn numerator(&self) -> u32 {
        self.numerator
    }

    pub fn denominator(&self) -> u32 {
        self.denominator
    }

    pub fn is_complete(&self) -> bool {
        self.numerator == self.denominator
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

impl FromStr for Progress {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (num, den) = s
            .split_once('/')
            .ok_or_else(|| format!("missing '/' in progress {s:?}"))?;
        let num: u32 = num
            .trim()
            .parse()
            .map_err(|e| format!("bad numerator in {s:?}: {e}"))?;
        let den: u32 = den
            .trim()
            .parse()
            .map_err(|e| format!("bad denominator in {s:?}: {e}"))?;
        Progress::new(num, den).ok_or_else(|| format!("out of range progress {s:?}"))
    }
}

/// Completion status recorded by the local settings store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryStatus {
    Reading,
    Complete,
    Abandoned,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CompletionSummary {
    #[serde(default)]
    pub status: Option<SummaryStatus>,
    /// 0.0 - 1.0 fraction
    #[serde(default)]
    pub percent_complete: Option<f64>,
}

/// State the engine wants the remote store to hold for one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetState {
    pub progress: Progress,
    pub status: ReadStatus,
    pub last_access: Option<i64>,
}

/// A row as read back from the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRecord {
    pub key: String,
    pub status: Option<ReadStatus>,
    pub progress: Option<String>,
    pub last_access: Option<i64>,
}
