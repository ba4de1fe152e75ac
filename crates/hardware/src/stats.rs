//! Controller statistics collection and reporting.
//!
//! This module tracks the counters the controller exposes for external reporting:
//! 1. **Access:** Requests translated, queue occupancy, row-buffer hits, and fast/slow-segment misses.
//! 2. **Row:** Distinct rows touched, remap-table queries, migrations, and re-migrations.
//! 3. **Energy:** Per-category device energy, refreshed from the channels every DRAM cycle.

use std::io::{self, Write};

use serde::Serialize;

use crate::dram::EnergyBreakdown;

/// Access counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AccessCounter {
    /// Requests that passed translation.
    pub count: u64,
    /// Sum of request-pool occupancy seen by each accepted request.
    pub queue_length: u64,
    /// Request accesses served from an already open row.
    pub row_buffer: u64,
    /// Row misses whose row sat in a fast place.
    pub fast_segment: u64,
    /// Row misses whose row sat in a slow place.
    pub slow_segment: u64,
}

/// Row and remapping counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RowCounter {
    /// Distinct rows touched.
    pub count: u64,
    /// Remap-table lookups issued on map-cache misses.
    pub query: u64,
    /// Promotions performed.
    pub migration: u64,
    /// Promotions of rows that had been promoted before.
    pub remigration: u64,
}

/// Energy counters, in picojoules.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct EnergyCounter {
    /// Activates and precharges.
    pub act_pre: u64,
    /// Column reads.
    pub read: u64,
    /// Column writes.
    pub write: u64,
    /// Refreshes.
    pub refresh: u64,
    /// Migrations.
    pub migrate: u64,
    /// Rank background.
    pub background: u64,
    /// Everything, including bus and clock energy.
    pub total: u64,
}

impl EnergyCounter {
    /// Replaces the counters with the sum of `channels`.
    pub fn refresh_from(&mut self, channels: impl IntoIterator<Item = EnergyBreakdown>) {
        *self = Self::default();
        for e in channels {
            self.act_pre += e.act_pre;
            self.read += e.read;
            self.write += e.write;
            self.refresh += e.refresh;
            self.migrate += e.migrate;
            self.background += e.background;
            self.total += e.total();
        }
    }
}

/// All controller counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MemoryCounter {
    /// Access counters.
    pub access: AccessCounter,
    /// Row and remapping counters.
    pub row: RowCounter,
    /// Energy counters.
    pub energy: EnergyCounter,
}

/// Section names for selective stats output.
///
/// Valid section identifiers: `"access"`, `"row"`, `"energy"`.
/// Pass an empty slice to `print_sections` to print all sections.
pub const STATS_SECTIONS: &[&str] = &["access", "row", "energy"];

impl MemoryCounter {
    /// Prints only the requested statistics sections to stdout.
    ///
    /// # Arguments
    ///
    /// * `sections` - Slice of section names to print, or empty for all.
    pub fn print_sections(&self, sections: &[String]) {
        let stdout = io::stdout();
        let _ = self.write_sections(&mut stdout.lock(), sections);
    }

    /// Prints all statistics sections to stdout.
    ///
    /// Equivalent to `print_sections(&[])`.
    pub fn print(&self) {
        self.print_sections(&[]);
    }

    /// Writes the requested sections to `out`.
    ///
    /// # Errors
    ///
    /// Propagates write failures from `out`.
    pub fn write_sections(&self, out: &mut impl Write, sections: &[String]) -> io::Result<()> {
        let want = |s: &str| sections.is_empty() || sections.iter().any(|x| x == s);
        let percent = |part: u64, whole: u64| {
            if whole == 0 {
                0.0
            } else {
                part as f64 / whole as f64 * 100.0
            }
        };

        writeln!(out, "==========================================================")?;
        writeln!(out, "DRAM CONTROLLER STATISTICS")?;
        writeln!(out, "==========================================================")?;
        if want("access") {
            let a = &self.access;
            let misses = a.fast_segment + a.slow_segment;
            let served = a.row_buffer + misses;
            let avg_queue = if a.count == 0 {
                0.0
            } else {
                a.queue_length as f64 / a.count as f64
            };
            writeln!(out, "ACCESS")?;
            writeln!(out, "  access.count           {}", a.count)?;
            writeln!(out, "  access.queue_avg       {avg_queue:.2}")?;
            writeln!(
                out,
                "  access.row_buffer      {} ({:.2}%)",
                a.row_buffer,
                percent(a.row_buffer, served)
            )?;
            writeln!(
                out,
                "  access.fast_segment    {} ({:.2}%)",
                a.fast_segment,
                percent(a.fast_segment, served)
            )?;
            writeln!(
                out,
                "  access.slow_segment    {} ({:.2}%)",
                a.slow_segment,
                percent(a.slow_segment, served)
            )?;
            writeln!(out, "----------------------------------------------------------")?;
        }
        if want("row") {
            let r = &self.row;
            writeln!(out, "ROW")?;
            writeln!(out, "  row.count              {}", r.count)?;
            writeln!(out, "  row.query              {}", r.query)?;
            writeln!(out, "  row.migration          {}", r.migration)?;
            writeln!(out, "  row.remigration        {}", r.remigration)?;
            writeln!(out, "----------------------------------------------------------")?;
        }
        if want("energy") {
            let e = &self.energy;
            let nj = |pj: u64| pj as f64 / 1000.0;
            writeln!(out, "ENERGY (nJ)")?;
            writeln!(out, "  energy.act_pre         {:.3}", nj(e.act_pre))?;
            writeln!(out, "  energy.read            {:.3}", nj(e.read))?;
            writeln!(out, "  energy.write           {:.3}", nj(e.write))?;
            writeln!(out, "  energy.refresh         {:.3}", nj(e.refresh))?;
            writeln!(out, "  energy.migrate         {:.3}", nj(e.migrate))?;
            writeln!(out, "  energy.background      {:.3}", nj(e.background))?;
            writeln!(out, "  energy.total           {:.3}", nj(e.total))?;
        }
        writeln!(out, "==========================================================")
    }
}
