use std::io::Write;

use anyhow::{Context, Result};
use vlr_core::{ClusterRecord, CSV_HEADER};

/// Writes one CSV row per record and flushes it immediately, so rows already
/// emitted survive a later run failure.
pub struct RecordEmitter<W: Write> {
    out: W,
    header_pending: bool,
    emitted: usize,
}

impl<W: Write> RecordEmitter<W> {
    pub fn new(out: W) -> Self {
        Self { out, header_pending: false, emitted: 0 }
    }

    /// The header row is written lazily, right before the first record.
    pub fn with_header(out: W) -> Self {
        Self { out, header_pending: true, emitted: 0 }
    }

    pub fn emit(&mut self, record: &ClusterRecord) -> Result<()> {
        if self.header_pending {
            writeln!(self.out, "{CSV_HEADER}").context("write csv header")?;
            self.header_pending = false;
        }
        writeln!(self.out, "{}", record.to_csv_row()).context("write csv row")?;
        self.out.flush().context("flush csv row")?;
        self.emitted += 1;
        Ok(())
    }

    pub fn emitted(&self) -> usize {
        self.emitted
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
