//! Aggregation and export of run metrics.
//!
//! Workers report raw values into [`Accumulator`]s; at the end of each period the results are
//! packed into a [`Measurement`] and handed to every configured [`Destination`].

mod accumulator;
mod destination;

pub use accumulator::{
    Accumulator, AvgAccumulator, MaxAccumulator, MinAccumulator, SumAccumulator,
};
pub use destination::{ConsoleDestination, Destination, DummyDestination};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, ReportingError>;

#[derive(Debug, thiserror::Error)]
pub enum ReportingError {
    #[error("destination is not open")]
    NotOpen,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A snapshot of accumulated results at some point of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    /// Progress of the run, 0-100.
    pub percentage: u8,
    pub time_ms: u64,
    pub iteration: u64,
    pub results: BTreeMap<String, f64>,
}

impl Measurement {
    pub fn new(percentage: u8, elapsed: Duration, iteration: u64) -> Self {
        Self {
            percentage: percentage.min(100),
            time_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            iteration,
            results: BTreeMap::new(),
        }
    }

    pub fn with_result(mut self, name: impl Into<String>, value: f64) -> Self {
        self.results.insert(name.into(), value);
        self
    }

    /// Record the current value of `accumulator` under `name`.
    pub fn capture(&mut self, name: impl Into<String>, accumulator: &dyn Accumulator<f64>) {
        self.results.insert(name.into(), accumulator.result());
    }

    pub fn result(&self, name: &str) -> Option<f64> {
        self.results.get(name).copied()
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.time_ms / 1000;
        write!(
            f,
            "[{}:{:02}:{:02}][{} iterations][{}%]",
            secs / 3600,
            (secs / 60) % 60,
            secs % 60,
            self.iteration,
            self.percentage
        )?;
        for (idx, (name, value)) in self.results.iter().enumerate() {
            let sep = if idx == 0 { " " } else { "; " };
            write!(f, "{sep}{name} => {value}")?;
        }
        Ok(())
    }
}
