use crate::agent::{Agent, Kind};
use crate::config::Params;
use crate::dist::{sample_duration, sample_transmission_count, throw_dice};
use crate::metrics::Metrics;
use crate::topology::{Mode, Topology};
use anyhow::{Context, Result, bail};
use rand::prelude::*;
use serde::{Deserialize, Serialize};

/// Verbosity of the model messages.
#[derive(
    Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PrtLvl {
    Mute,
    #[default]
    Concise,
    Detailed,
    Verbose,
}

/// Number of created agents reported at the concise level.
const N_AGT_REPORTED: usize = 5;

/// SEIR agent-based model.
///
/// Owns the agents, the space they live in, the tick counter, the metrics collector
/// and the random number generator. Every [`Model::step`] activates all agents once,
/// in a new random order, and changes are visible to the agents activated later in
/// the same tick.
pub struct Model<R: Rng> {
    params: Params,
    prt_lvl: PrtLvl,
    topology: Box<dyn Topology>,
    agt_vec: Vec<Agent>,
    order: Vec<usize>,
    tick: usize,
    nc: f64,
    p: f64,
    metrics: Metrics,
    rng: R,
}

impl<R: Rng> Model<R> {
    /// Build the initial population on `topology`.
    ///
    /// In network mode agent `i` sits on node `i`, so the network must have exactly
    /// `turtles` nodes.
    pub fn new(
        params: Params,
        topology: Box<dyn Topology>,
        prt_lvl: PrtLvl,
        mut rng: R,
    ) -> Result<Self> {
        params.validate().context("invalid model parameters")?;

        let mode = topology.mode();
        let n_sites = topology.n_sites();
        if mode == Mode::Network && n_sites != params.turtles {
            bail!(
                "network must have one node per turtle, but has {n_sites} nodes for {} turtles",
                params.turtles
            );
        }

        let nc = topology.mean_contacts(params.turtles);
        if nc.is_nan() || nc <= 0.0 {
            bail!("mean number of contacts must be positive, but is {nc}");
        }

        let tpd = params.ticks_per_day as f64;
        let p = params.r0 / (nc * params.tr * tpd);
        let k = params.p_dist.dispersion();

        if prt_lvl >= PrtLvl::Concise {
            log::info!(
                "turtles = {}, i0 = {}, ticks_per_day = {}, ti_dist = {:?}, tr_dist = {:?}, p_dist = {:?}",
                params.turtles,
                params.i0,
                params.ticks_per_day,
                params.ti_dist,
                params.tr_dist,
                params.p_dist
            );
            log::info!(
                "ti = {}, tr = {}, k = {k:?}, r0 = {}",
                params.ti,
                params.tr,
                params.r0
            );
        }

        // Random permutation of the initial labels.
        let mut kind_vec = vec![Kind::S; params.turtles - params.i0];
        kind_vec.extend(vec![Kind::I; params.i0]);
        kind_vec.shuffle(&mut rng);

        let mut agt_vec = Vec::with_capacity(params.turtles);
        for (id, kind) in kind_vec.into_iter().enumerate() {
            let site = match mode {
                Mode::Grid => rng.random_range(0..n_sites),
                Mode::Network => id,
            };

            let ti = sample_duration(&mut rng, params.ti_dist, params.ti)
                .context("failed to sample incubation time")?;
            let tr = sample_duration(&mut rng, params.tr_dist, params.tr)
                .context("failed to sample recovery time")?;
            let p_agt = match k {
                None => p,
                Some(k) => {
                    let r0_agt = sample_transmission_count(&mut rng, params.r0, k)
                        .context("failed to sample reproduction number")?;
                    r0_agt / (nc * params.tr * tpd)
                }
            };

            if prt_lvl >= PrtLvl::Concise && id < N_AGT_REPORTED {
                log::info!("created {kind} turtle {id} with ti = {ti}, tr = {tr}, p = {p_agt:.3e}");
            }

            agt_vec.push(Agent::new(id, site, mode, kind, ti * tpd, tr * tpd, p_agt));
        }

        let model = Self::assemble(params, prt_lvl, topology, agt_vec, nc, p, rng);

        if prt_lvl >= PrtLvl::Concise {
            if let Some(measured) = model.topology.measured_contacts() {
                log::info!("measured mean number of contacts = {measured}");
            }
        }

        Ok(model)
    }

    fn assemble(
        params: Params,
        prt_lvl: PrtLvl,
        mut topology: Box<dyn Topology>,
        agt_vec: Vec<Agent>,
        nc: f64,
        p: f64,
        rng: R,
    ) -> Self {
        for agt in &agt_vec {
            topology.place(agt.id(), agt.site());
        }

        let order = (0..agt_vec.len()).collect();

        let mut metrics = Metrics::new();
        metrics.collect(0, &agt_vec);

        Self {
            params,
            prt_lvl,
            topology,
            agt_vec,
            order,
            tick: 0,
            nc,
            p,
            metrics,
            rng,
        }
    }

    /// Advance the model by one tick.
    pub fn step(&mut self) -> Result<()> {
        self.tick += 1;

        self.order.shuffle(&mut self.rng);
        for idx in 0..self.order.len() {
            let i_agt = self.order[idx];
            self.step_agent(i_agt)
                .with_context(|| format!("failed to step agent {i_agt}"))?;
        }

        self.metrics.collect(self.tick, &self.agt_vec);

        Ok(())
    }

    fn step_agent(&mut self, i_agt: usize) -> Result<()> {
        let tick = self.tick;
        let agt = &mut self.agt_vec[i_agt];

        let kind_old = agt.kind();
        let since = agt.infection_tick();
        let infectious = agt.progress(tick);
        let kind_new = agt.kind();

        if kind_new != kind_old && self.prt_lvl >= PrtLvl::Detailed {
            log::debug!(
                "tick {tick}: turtle {i_agt} turned {kind_old} into {kind_new} after {} ticks",
                tick.saturating_sub(since)
            );
        }

        if infectious {
            self.infect(i_agt);
        }

        if self.agt_vec[i_agt].is_mobile() {
            self.random_move(i_agt)?;
        }

        Ok(())
    }

    /// Try to expose every susceptible agent in the neighborhood of `i_agt`.
    fn infect(&mut self, i_agt: usize) {
        let tick = self.tick;
        let site = self.agt_vec[i_agt].site();
        let p = self.agt_vec[i_agt].p();

        let topology = &self.topology;
        for &nbr in topology.neighbors_of(site) {
            for &j_agt in topology.occupants_at(nbr) {
                let target = &mut self.agt_vec[j_agt];
                if target.kind() != Kind::S {
                    continue;
                }

                if self.prt_lvl >= PrtLvl::Verbose {
                    log::trace!("tick {tick}: turtle {i_agt} throws dice on turtle {j_agt}");
                }

                if throw_dice(&mut self.rng, p) {
                    target.expose(tick);

                    if self.prt_lvl >= PrtLvl::Detailed {
                        log::debug!("tick {tick}: turtle {i_agt} exposed turtle {j_agt}");
                    }
                }
            }
        }
    }

    /// Move `i_agt` to a random cell of its neighborhood (possibly its own).
    fn random_move(&mut self, i_agt: usize) -> Result<()> {
        let from = self.agt_vec[i_agt].site();
        let &to = self
            .topology
            .neighbors_of(from)
            .choose(&mut self.rng)
            .context("site has no neighbors")?;

        self.topology.move_agent(i_agt, from, to)?;
        self.agt_vec[i_agt].set_site(to);

        Ok(())
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn tick(&self) -> usize {
        self.tick
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agt_vec
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Mean number of contacts.
    pub fn nc(&self) -> f64 {
        self.nc
    }

    /// Transmission probability of the fixed case.
    pub fn p(&self) -> f64 {
        self.p
    }

    /// No agent is exposed or infected anymore.
    pub fn is_extinct(&self) -> bool {
        self.metrics
            .last()
            .is_none_or(|counts| counts.active() == 0)
    }
}
