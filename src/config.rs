use crate::dist::{DurationDist, TransmissionDist};
use crate::model::PrtLvl;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Simulation configuration.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Seed of the random number generator (drawn from the OS if absent).
    #[serde(default)]
    pub seed: Option<u64>,

    /// Epidemiological parameters.
    pub model: Params,

    /// Space the agents live in.
    pub topology: TopologyConfig,

    /// Run length and reporting.
    pub output: OutputConfig,
}

/// Global epidemiological parameters, fixed for the whole run.
///
/// Durations are given in days and converted to ticks with `ticks_per_day`.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Params {
    /// Number of agents.
    pub turtles: usize,
    /// Initial number of infected agents.
    pub i0: usize,
    /// Basic reproduction number.
    pub r0: f64,
    /// Mean incubation time.
    pub ti: f64,
    /// Mean infectious duration.
    pub tr: f64,
    /// Number of ticks per simulated day.
    pub ticks_per_day: usize,

    pub ti_dist: DurationDist,
    pub tr_dist: DurationDist,
    pub p_dist: TransmissionDist,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TopologyConfig {
    /// Toroidal grid of `width x height` cells.
    Grid { width: usize, height: usize },
    /// Erdős–Rényi network with one node per agent.
    ErdosRenyi { prob: f64 },
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Maximum number of steps per run.
    pub n_steps: usize,
    /// Stop as soon as no agent is exposed or infected.
    #[serde(default)]
    pub stop_when_extinct: bool,
    /// Number of steps between progress messages.
    pub steps_per_print: usize,
    #[serde(default)]
    pub prt_lvl: PrtLvl,
}

impl Config {
    /// Load a [`Config`] from a file.
    ///
    /// The file must be TOML-encoded and contain a serialized [`Config`].
    /// Performs validation on all parameters before returning.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;

        let config: Config = toml::from_str(&contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        self.model
            .validate()
            .context("invalid model parameters")?;

        match self.topology {
            TopologyConfig::Grid { width, height } => {
                check_num(width, 1..10_000).context("invalid grid width")?;
                check_num(height, 1..10_000).context("invalid grid height")?;
                check_num(width * height, 1..=1_000_000).context("invalid number of grid cells")?;
            }
            TopologyConfig::ErdosRenyi { prob } => {
                check_num(prob, 0.0..=1.0).context("invalid edge probability")?;
            }
        }

        check_num(self.output.n_steps, 1..1_000_000).context("invalid number of steps")?;
        check_num(self.output.steps_per_print, 1..1_000_000)
            .context("invalid number of steps per print")?;

        Ok(())
    }
}

impl Params {
    pub fn validate(&self) -> Result<()> {
        check_num(self.turtles, 1..10_000_000).context("invalid number of turtles")?;
        check_num(self.i0, 0..=self.turtles).context("invalid initial number of infected")?;
        check_num(self.r0, 0.0..100.0).context("invalid basic reproduction number")?;
        check_num(self.ti, f64::MIN_POSITIVE..1000.0).context("invalid incubation time")?;
        check_num(self.tr, f64::MIN_POSITIVE..1000.0).context("invalid recovery time")?;
        check_num(self.ticks_per_day, 1..1000).context("invalid number of ticks per day")?;
        Ok(())
    }
}

pub fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}
