use crate::analysis::Analyzer;
use crate::config::Config;
use crate::engine::Engine;
use anyhow::{Context, Result};
use glob::glob;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Simulation directory holding `config.toml` and one `run-NNNN` directory per run.
pub struct Manager {
    sim_dir: PathBuf,
    cfg: Config,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(sim_dir: P) -> Result<Self> {
        let sim_dir = sim_dir.as_ref().to_path_buf();

        let cfg =
            Config::from_file(sim_dir.join("config.toml")).context("failed to construct cfg")?;
        log::info!("{cfg:#?}");

        Ok(Self { sim_dir, cfg })
    }

    pub fn create_run(&self) -> Result<()> {
        let run_idx = self.count_run_dirs().context("failed to count run dirs")?;

        let run_dir = self.run_dir(run_idx);
        fs::create_dir_all(&run_dir).with_context(|| format!("failed to create {run_dir:?}"))?;
        log::info!("created {run_dir:?}");

        let mut engine = Engine::generate_initial_condition(self.cfg.clone(), run_idx)
            .context("failed to generate initial condition")?;

        engine
            .perform_simulation()
            .context("failed to perform simulation")?;

        let model = engine.model();
        if let Some(counts) = model.metrics().last() {
            log::info!(
                "finished run {run_idx} at tick {} with {} recovered turtles",
                model.tick(),
                counts.r
            );
        }

        engine
            .save_trajectory(self.trajectory_file(run_idx))
            .context("failed to save trajectory")?;

        engine
            .save_parameters(self.parameters_file(run_idx))
            .context("failed to save parameters")?;

        Ok(())
    }

    pub fn analyze_sim(&self) -> Result<()> {
        let n_runs = self.count_run_dirs().context("failed to count run dirs")?;

        let mut analyzer = Analyzer::new(&self.cfg);
        for run_idx in 0..n_runs {
            let trajectory_file = self.trajectory_file(run_idx);
            analyzer
                .add_file(&trajectory_file)
                .with_context(|| format!("failed to add {trajectory_file:?}"))?;
        }
        log::info!("analyzed {n_runs} runs");

        analyzer
            .save_results(self.results_file())
            .context("failed to save results")?;

        analyzer
            .save_average(self.average_file())
            .context("failed to save average")?;

        Ok(())
    }

    pub fn clean_sim(&self) -> Result<()> {
        let n_runs = self.count_run_dirs().context("failed to count run dirs")?;
        for run_idx in 0..n_runs {
            let run_dir = self.run_dir(run_idx);
            fs::remove_dir_all(&run_dir)
                .with_context(|| format!("failed to remove {run_dir:?}"))?;
        }

        for file in [self.results_file(), self.average_file()] {
            if file.exists() {
                fs::remove_file(&file).with_context(|| format!("failed to remove {file:?}"))?;
            }
        }
        log::info!("removed {n_runs} runs");

        Ok(())
    }

    fn count_run_dirs(&self) -> Result<usize> {
        let pattern = self.sim_dir.join("run-*");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let count = glob(pattern)
            .context("failed to glob run dirs")?
            .filter_map(Result::ok)
            .filter(|p| p.is_dir())
            .count();
        Ok(count)
    }

    fn run_dir(&self, run_idx: usize) -> PathBuf {
        self.sim_dir.join(format!("run-{run_idx:04}"))
    }

    fn trajectory_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("trajectory.csv")
    }

    fn parameters_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("parameters.csv")
    }

    fn results_file(&self) -> PathBuf {
        self.sim_dir.join("results.toml")
    }

    fn average_file(&self) -> PathBuf {
        self.sim_dir.join("average.csv")
    }
}
