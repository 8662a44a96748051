use crate::{Measurement, ReportingError, Result};
use std::io::Write;

/// Receives measurements at the end of each reporting period.
///
/// Lifecycle: [`Destination::open`], any number of [`Destination::report`] calls, then
/// [`Destination::close`].
pub trait Destination: Send {
    fn open(&mut self);
    fn report(&mut self, measurement: &Measurement) -> Result<()>;
    fn close(&mut self);
}

/// Writes one line per measurement to a writer (stdout by default).
pub struct ConsoleDestination<W: Write + Send = std::io::Stdout> {
    out: W,
    open: bool,
}

impl ConsoleDestination {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> ConsoleDestination<W> {
    pub fn new(out: W) -> Self {
        Self { out, open: false }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> Destination for ConsoleDestination<W> {
    fn open(&mut self) {
        self.open = true;
    }

    fn report(&mut self, measurement: &Measurement) -> Result<()> {
        if !self.open {
            return Err(ReportingError::NotOpen);
        }
        writeln!(self.out, "{measurement}")?;
        Ok(())
    }

    fn close(&mut self) {
        if let Err(err) = self.out.flush() {
            tracing::debug!(
                target = "loadcheck.reporting",
                error = %err,
                "failed to flush console destination"
            );
        }
        self.open = false;
    }
}

/// Collects reported measurements in memory.
#[derive(Debug, Default)]
pub struct DummyDestination {
    pub property: Option<String>,
    opened: usize,
    closed: usize,
    reported: Vec<Measurement>,
}

impl DummyDestination {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reported(&self) -> &[Measurement] {
        &self.reported
    }

    pub fn open_count(&self) -> usize {
        self.opened
    }

    pub fn close_count(&self) -> usize {
        self.closed
    }
}

impl Destination for DummyDestination {
    fn open(&mut self) {
        self.opened += 1;
    }

    fn report(&mut self, measurement: &Measurement) -> Result<()> {
        tracing::trace!(target = "loadcheck.reporting", %measurement, "dummy report");
        self.reported.push(measurement.clone());
        Ok(())
    }

    fn close(&mut self) {
        self.closed += 1;
    }
}
