use crate::config::Config;
use crate::metrics::{Counts, read_csv};
use crate::stats::{Accumulator, AccumulatorReport};
use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::{collections::BTreeMap, fs, path::Path};

/// Observable computed once per run from its trajectory.
pub trait Obs {
    fn name(&self) -> &'static str;
    fn update(&mut self, rows: &[Counts]) -> Result<()>;
    fn report(&self) -> AccumulatorReport;
}

fn last_row(rows: &[Counts]) -> Result<&Counts> {
    rows.last().context("trajectory has no rows")
}

/// Maximum number of infected agents.
pub struct PeakInfected {
    acc: Accumulator,
}

impl Obs for PeakInfected {
    fn name(&self) -> &'static str {
        "peak_infected"
    }

    fn update(&mut self, rows: &[Counts]) -> Result<()> {
        let peak = rows.iter().map(|counts| counts.i).max().context("trajectory has no rows")?;
        self.acc.add(peak as f64);
        Ok(())
    }

    fn report(&self) -> AccumulatorReport {
        self.acc.report()
    }
}

/// Day at which the number of infected agents first reaches its maximum.
pub struct PeakDay {
    acc: Accumulator,
    ticks_per_day: f64,
}

impl Obs for PeakDay {
    fn name(&self) -> &'static str {
        "peak_day"
    }

    fn update(&mut self, rows: &[Counts]) -> Result<()> {
        let mut peak = last_row(rows)?;
        for counts in rows {
            if counts.i > peak.i || (counts.i == peak.i && counts.tick < peak.tick) {
                peak = counts;
            }
        }
        self.acc.add(peak.tick as f64 / self.ticks_per_day);
        Ok(())
    }

    fn report(&self) -> AccumulatorReport {
        self.acc.report()
    }
}

/// Fraction of the population recovered at the end of the run.
pub struct AttackRate {
    acc: Accumulator,
}

impl Obs for AttackRate {
    fn name(&self) -> &'static str {
        "attack_rate"
    }

    fn update(&mut self, rows: &[Counts]) -> Result<()> {
        let last = last_row(rows)?;
        self.acc.add(last.r as f64 / last.total() as f64);
        Ok(())
    }

    fn report(&self) -> AccumulatorReport {
        self.acc.report()
    }
}

/// Day of the last tick with an exposed or infected agent.
pub struct Duration {
    acc: Accumulator,
    ticks_per_day: f64,
}

impl Obs for Duration {
    fn name(&self) -> &'static str {
        "duration"
    }

    fn update(&mut self, rows: &[Counts]) -> Result<()> {
        last_row(rows)?;
        let end = rows
            .iter()
            .rev()
            .find(|counts| counts.active() > 0)
            .map_or(0, |counts| counts.tick);
        self.acc.add(end as f64 / self.ticks_per_day);
        Ok(())
    }

    fn report(&self) -> AccumulatorReport {
        self.acc.report()
    }
}

#[derive(Serialize)]
struct AverageRow {
    tick: usize,
    day: f64,
    s: f64,
    e: f64,
    i: f64,
    r: f64,
}

/// Aggregates the trajectories of all runs of a simulation.
pub struct Analyzer {
    turtles: usize,
    ticks_per_day: f64,
    obs_ptr_vec: Vec<Box<dyn Obs>>,
    sums: Vec<[f64; 4]>,
    finals: Vec<Counts>,
}

impl Analyzer {
    pub fn new(cfg: &Config) -> Self {
        let ticks_per_day = cfg.model.ticks_per_day as f64;
        let obs_ptr_vec: Vec<Box<dyn Obs>> = vec![
            Box::new(PeakInfected {
                acc: Accumulator::new(),
            }),
            Box::new(PeakDay {
                acc: Accumulator::new(),
                ticks_per_day,
            }),
            Box::new(AttackRate {
                acc: Accumulator::new(),
            }),
            Box::new(Duration {
                acc: Accumulator::new(),
                ticks_per_day,
            }),
        ];
        Self {
            turtles: cfg.model.turtles,
            ticks_per_day,
            obs_ptr_vec,
            sums: Vec::new(),
            finals: Vec::new(),
        }
    }

    pub fn add_file<P: AsRef<Path>>(&mut self, file: P) -> Result<()> {
        let rows = read_csv(file).context("failed to read trajectory")?;
        self.add_trajectory(&rows)
    }

    pub fn add_trajectory(&mut self, rows: &[Counts]) -> Result<()> {
        if rows.iter().any(|counts| counts.total() != self.turtles) {
            bail!("trajectory does not conserve {} turtles", self.turtles);
        }

        for obs in &mut self.obs_ptr_vec {
            obs.update(rows)
                .with_context(|| format!("failed to update {}", obs.name()))?;
        }

        // Shorter runs are extended with their final state in the average.
        let last = *last_row(rows)?;
        let n_ticks_old = self.sums.len();
        if rows.len() > n_ticks_old {
            self.sums.resize(rows.len(), [0.0; 4]);
            for tick in n_ticks_old..rows.len() {
                for counts in &self.finals {
                    add_counts(&mut self.sums[tick], counts);
                }
            }
        }
        for (tick, sum) in self.sums.iter_mut().enumerate() {
            add_counts(sum, rows.get(tick).unwrap_or(&last));
        }
        self.finals.push(last);

        Ok(())
    }

    pub fn save_results<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let reports: BTreeMap<_, _> = self
            .obs_ptr_vec
            .iter()
            .map(|obs| (obs.name(), obs.report()))
            .collect();
        let contents = toml::to_string(&reports).context("failed to serialize results")?;
        fs::write(file, contents).with_context(|| format!("failed to write {file:?}"))?;
        Ok(())
    }

    pub fn save_average<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let mut writer =
            csv::Writer::from_path(file).with_context(|| format!("failed to create {file:?}"))?;
        for (tick, row) in self.average().into_iter().enumerate() {
            writer
                .serialize(AverageRow {
                    tick,
                    day: tick as f64 / self.ticks_per_day,
                    s: row[0],
                    e: row[1],
                    i: row[2],
                    r: row[3],
                })
                .context("failed to serialize row")?;
        }
        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }

    /// Tick-wise mean of `[s, e, i, r]` over all runs.
    fn average(&self) -> Vec<[f64; 4]> {
        let n_runs = self.finals.len() as f64;
        self.sums
            .iter()
            .map(|sum| sum.map(|val| val / n_runs))
            .collect()
    }
}

fn add_counts(sum: &mut [f64; 4], counts: &Counts) {
    sum[0] += counts.s as f64;
    sum[1] += counts.e as f64;
    sum[2] += counts.i as f64;
    sum[3] += counts.r as f64;
}
