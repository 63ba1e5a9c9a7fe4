use crate::agent::{Agent, Kind};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Number of agents in each compartment at a given tick.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Counts {
    pub tick: usize,
    pub s: usize,
    pub e: usize,
    pub i: usize,
    pub r: usize,
}

impl Counts {
    pub fn from_agents(tick: usize, agt_vec: &[Agent]) -> Self {
        let mut counts = Counts {
            tick,
            ..Default::default()
        };
        for agt in agt_vec {
            match agt.kind() {
                Kind::S => counts.s += 1,
                Kind::E => counts.e += 1,
                Kind::I => counts.i += 1,
                Kind::R => counts.r += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.s + self.e + self.i + self.r
    }

    /// Agents still carrying the disease.
    pub fn active(&self) -> usize {
        self.e + self.i
    }
}

#[derive(Serialize)]
struct TrajectoryRow {
    tick: usize,
    day: f64,
    s: usize,
    e: usize,
    i: usize,
    r: usize,
}

/// Append-only SEIR time series, one row per tick.
#[derive(Debug, Default)]
pub struct Metrics {
    rows: Vec<Counts>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collect(&mut self, tick: usize, agt_vec: &[Agent]) {
        self.rows.push(Counts::from_agents(tick, agt_vec));
    }

    #[cfg(test)]
    pub fn rows(&self) -> &[Counts] {
        &self.rows
    }

    pub fn last(&self) -> Option<&Counts> {
        self.rows.last()
    }

    /// Write the time series as CSV with columns `tick,day,s,e,i,r`.
    pub fn write_csv<P: AsRef<Path>>(&self, file: P, ticks_per_day: f64) -> Result<()> {
        let file = file.as_ref();
        let mut writer =
            csv::Writer::from_path(file).with_context(|| format!("failed to create {file:?}"))?;
        for counts in &self.rows {
            writer
                .serialize(TrajectoryRow {
                    tick: counts.tick,
                    day: counts.tick as f64 / ticks_per_day,
                    s: counts.s,
                    e: counts.e,
                    i: counts.i,
                    r: counts.r,
                })
                .context("failed to serialize row")?;
        }
        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }
}

/// Read back a time series written by [`Metrics::write_csv`].
pub fn read_csv<P: AsRef<Path>>(file: P) -> Result<Vec<Counts>> {
    let file = file.as_ref();
    let mut reader =
        csv::Reader::from_path(file).with_context(|| format!("failed to open {file:?}"))?;
    let mut rows = Vec::new();
    for row in reader.deserialize::<Counts>() {
        let counts = row.context("failed to deserialize row")?;
        rows.push(counts);
    }
    Ok(rows)
}
