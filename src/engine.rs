use crate::config::{Config, TopologyConfig};
use crate::model::Model;
use crate::topology::{Grid, Network, Topology};
use anyhow::{Context, Result};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use serde::Serialize;
use std::path::Path;

/// Per-agent parameters, durations in days.
#[derive(Serialize)]
struct AgentParams {
    id: usize,
    ti: f64,
    tr: f64,
    p: f64,
}

/// Simulation engine.
///
/// Holds the configuration and the model of a single run, and provides methods to
/// initialize, run and save it.
pub struct Engine {
    cfg: Config,
    model: Model<ChaCha12Rng>,
}

impl Engine {
    /// Create a new `Engine` for run `run_idx` with a random initial state.
    ///
    /// With a configured seed every run uses its own stream of the same generator.
    pub fn generate_initial_condition(cfg: Config, run_idx: usize) -> Result<Self> {
        let mut rng = match cfg.seed {
            Some(seed) => {
                let mut rng = ChaCha12Rng::seed_from_u64(seed);
                rng.set_stream(run_idx as u64);
                rng
            }
            None => ChaCha12Rng::try_from_os_rng()?,
        };

        let topology: Box<dyn Topology> = match cfg.topology {
            TopologyConfig::Grid { width, height } => {
                Box::new(Grid::new(width, height).context("failed to construct grid")?)
            }
            TopologyConfig::ErdosRenyi { prob } => {
                Box::new(Network::erdos_renyi(&mut rng, cfg.model.turtles, prob))
            }
        };

        let model = Model::new(cfg.model.clone(), topology, cfg.output.prt_lvl, rng)
            .context("failed to construct model")?;
        log::info!(
            "mean number of contacts = {}, transmission probability = {:.3e}",
            model.nc(),
            model.p()
        );

        Ok(Self { cfg, model })
    }

    /// Step the model up to the configured horizon.
    pub fn perform_simulation(&mut self) -> Result<()> {
        let n_steps = self.cfg.output.n_steps;
        for i_step in 0..n_steps {
            if self.cfg.output.stop_when_extinct && self.model.is_extinct() {
                log::info!("no exposed or infected turtles left at tick {}", self.model.tick());
                break;
            }

            self.model.step().context("failed to perform step")?;

            if (i_step + 1) % self.cfg.output.steps_per_print == 0 {
                let progress = 100.0 * (i_step + 1) as f64 / n_steps as f64;
                if let Some(counts) = self.model.metrics().last() {
                    log::info!(
                        "completed {progress:06.2}% (S = {}, E = {}, I = {}, R = {})",
                        counts.s,
                        counts.e,
                        counts.i,
                        counts.r
                    );
                }
            }
        }
        Ok(())
    }

    pub fn model(&self) -> &Model<ChaCha12Rng> {
        &self.model
    }

    /// Save the SEIR time series.
    pub fn save_trajectory<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let ticks_per_day = self.model.params().ticks_per_day as f64;
        self.model.metrics().write_csv(file, ticks_per_day)
    }

    /// Save the incubation time, recovery time and transmission probability of every agent.
    pub fn save_parameters<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let ticks_per_day = self.model.params().ticks_per_day as f64;
        let mut writer =
            csv::Writer::from_path(file).with_context(|| format!("failed to create {file:?}"))?;
        for agt in self.model.agents() {
            writer
                .serialize(AgentParams {
                    id: agt.id(),
                    ti: agt.ti() / ticks_per_day,
                    tr: agt.tr() / ticks_per_day,
                    p: agt.p(),
                })
                .context("failed to serialize agent parameters")?;
        }
        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OutputConfig, Params};
    use crate::dist::{DurationDist, TransmissionDist};
    use crate::model::PrtLvl;

    fn config(topology: TopologyConfig) -> Config {
        Config {
            seed: Some(42),
            model: Params {
                turtles: 300,
                i0: 5,
                r0: 3.5,
                ti: 2.0,
                tr: 3.0,
                ticks_per_day: 2,
                ti_dist: DurationDist::Exponential,
                tr_dist: DurationDist::Gamma,
                p_dist: TransmissionDist::Poisson,
            },
            topology,
            output: OutputConfig {
                n_steps: 400,
                stop_when_extinct: true,
                steps_per_print: 100,
                prt_lvl: PrtLvl::Mute,
            },
        }
    }

    fn run(cfg: Config, run_idx: usize) -> Engine {
        let mut engine = Engine::generate_initial_condition(cfg, run_idx).unwrap();
        engine.perform_simulation().unwrap();
        engine
    }

    #[test]
    fn seeded_runs_depend_only_on_run_index() {
        let grid = TopologyConfig::Grid {
            width: 15,
            height: 15,
        };
        let rows = |run_idx| run(config(grid.clone()), run_idx).model().metrics().rows().to_vec();

        assert_eq!(rows(0), rows(0));
        assert_ne!(rows(0), rows(1));
    }

    #[test]
    fn stops_when_extinct() {
        let engine = run(config(TopologyConfig::ErdosRenyi { prob: 0.03 }), 0);
        let rows = engine.model().metrics().rows();
        let last = rows.last().unwrap();
        if rows.len() <= 400 {
            assert_eq!(last.active(), 0);
        }
        assert!(rows[..rows.len() - 1].iter().all(|counts| counts.active() > 0));
    }
}
