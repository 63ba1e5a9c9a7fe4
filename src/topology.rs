//! Spaces the agents live in.
//!
//! Both the toroidal grid and the contact network are indexed by a flat site id, so
//! agents carry a single `usize` position regardless of the mode.

use crate::dist::throw_dice;
use anyhow::{Result, bail};
use rand::prelude::*;

/// How agents relate to their sites.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Mode {
    /// Agents random-walk on a toroidal grid.
    Grid,
    /// Agents sit on a fixed network node.
    Network,
}

/// Neighbor enumeration and site occupancy.
pub trait Topology {
    fn mode(&self) -> Mode;

    fn n_sites(&self) -> usize;

    /// Sites an agent on `site` makes contact with.
    fn neighbors_of(&self, site: usize) -> &[usize];

    /// Agents currently on `site`.
    fn occupants_at(&self, site: usize) -> &[usize];

    fn place(&mut self, agt: usize, site: usize);

    fn move_agent(&mut self, agt: usize, from: usize, to: usize) -> Result<()>;

    /// Mean number of contacts per agent used to calibrate the transmission probability.
    fn mean_contacts(&self, n_agt: usize) -> f64;

    /// Mean number of contacts actually observed with the current occupancy.
    fn measured_contacts(&self) -> Option<f64> {
        None
    }
}

fn remove_occupant(occupants: &mut Vec<usize>, agt: usize, site: usize) -> Result<()> {
    match occupants.iter().position(|&occ| occ == agt) {
        Some(idx) => {
            occupants.swap_remove(idx);
            Ok(())
        }
        None => bail!("agent {agt} is not on site {site}"),
    }
}

/// Toroidal grid with Moore neighborhoods that include the center cell.
pub struct Grid {
    width: usize,
    height: usize,
    nbr_vec: Vec<Vec<usize>>,
    occ_vec: Vec<Vec<usize>>,
}

impl Grid {
    pub fn new(width: usize, height: usize) -> Result<Self> {
        if width == 0 || height == 0 {
            bail!("grid dimensions must be positive, but are {width} x {height}");
        }

        let n_sites = width * height;
        let mut nbr_vec = Vec::with_capacity(n_sites);
        for site in 0..n_sites {
            let (x, y) = (site % width, site / width);
            let mut nbrs = Vec::with_capacity(9);
            for dy in [height - 1, 0, 1] {
                for dx in [width - 1, 0, 1] {
                    let nbr = (x + dx) % width + ((y + dy) % height) * width;
                    // Narrow grids wrap onto the same cell more than once.
                    if !nbrs.contains(&nbr) {
                        nbrs.push(nbr);
                    }
                }
            }
            nbr_vec.push(nbrs);
        }

        Ok(Self {
            width,
            height,
            nbr_vec,
            occ_vec: vec![Vec::new(); n_sites],
        })
    }

    #[cfg(test)]
    pub fn site(&self, x: usize, y: usize) -> usize {
        (x % self.width) + (y % self.height) * self.width
    }
}

impl Topology for Grid {
    fn mode(&self) -> Mode {
        Mode::Grid
    }

    fn n_sites(&self) -> usize {
        self.width * self.height
    }

    fn neighbors_of(&self, site: usize) -> &[usize] {
        &self.nbr_vec[site]
    }

    fn occupants_at(&self, site: usize) -> &[usize] {
        &self.occ_vec[site]
    }

    fn place(&mut self, agt: usize, site: usize) {
        self.occ_vec[site].push(agt);
    }

    fn move_agent(&mut self, agt: usize, from: usize, to: usize) -> Result<()> {
        remove_occupant(&mut self.occ_vec[from], agt, from)?;
        self.occ_vec[to].push(agt);
        Ok(())
    }

    fn mean_contacts(&self, n_agt: usize) -> f64 {
        9.0 * n_agt as f64 / self.n_sites() as f64
    }

    fn measured_contacts(&self) -> Option<f64> {
        // Agents in the neighborhood of each occupied cell, own cell included.
        let counts: Vec<usize> = (0..self.n_sites())
            .filter(|&site| !self.occ_vec[site].is_empty())
            .map(|site| {
                self.nbr_vec[site]
                    .iter()
                    .map(|&nbr| self.occ_vec[nbr].len())
                    .sum()
            })
            .collect();
        if counts.is_empty() {
            return Some(0.0);
        }
        Some(counts.iter().sum::<usize>() as f64 / counts.len() as f64)
    }
}

/// Static undirected contact graph stored as adjacency lists.
pub struct Network {
    adj_vec: Vec<Vec<usize>>,
    occ_vec: Vec<Vec<usize>>,
}

impl Network {
    /// Build a network from an edge list over `n_nodes` nodes.
    ///
    /// Self loops and repeated edges are ignored.
    #[cfg(test)]
    pub fn from_edges(n_nodes: usize, edges: &[(usize, usize)]) -> Result<Self> {
        let mut adj_vec = vec![Vec::new(); n_nodes];
        for &(a, b) in edges {
            if a >= n_nodes || b >= n_nodes {
                bail!("edge ({a}, {b}) is out of range for {n_nodes} nodes");
            }
            if a == b || adj_vec[a].contains(&b) {
                continue;
            }
            adj_vec[a].push(b);
            adj_vec[b].push(a);
        }
        Ok(Self {
            adj_vec,
            occ_vec: vec![Vec::new(); n_nodes],
        })
    }

    /// Erdős–Rényi random graph: every pair of nodes is linked with probability `prob`.
    pub fn erdos_renyi<R: Rng + ?Sized>(rng: &mut R, n_nodes: usize, prob: f64) -> Self {
        let mut adj_vec = vec![Vec::new(); n_nodes];
        for a in 0..n_nodes {
            for b in (a + 1)..n_nodes {
                if throw_dice(rng, prob) {
                    adj_vec[a].push(b);
                    adj_vec[b].push(a);
                }
            }
        }
        Self {
            adj_vec,
            occ_vec: vec![Vec::new(); n_nodes],
        }
    }

    #[cfg(test)]
    pub fn degree(&self, node: usize) -> usize {
        self.adj_vec[node].len()
    }

    pub fn mean_degree(&self) -> f64 {
        if self.adj_vec.is_empty() {
            return 0.0;
        }
        let sum: usize = self.adj_vec.iter().map(Vec::len).sum();
        sum as f64 / self.adj_vec.len() as f64
    }
}

impl Topology for Network {
    fn mode(&self) -> Mode {
        Mode::Network
    }

    fn n_sites(&self) -> usize {
        self.adj_vec.len()
    }

    fn neighbors_of(&self, site: usize) -> &[usize] {
        &self.adj_vec[site]
    }

    fn occupants_at(&self, site: usize) -> &[usize] {
        &self.occ_vec[site]
    }

    fn place(&mut self, agt: usize, site: usize) {
        self.occ_vec[site].push(agt);
    }

    fn move_agent(&mut self, agt: usize, _from: usize, _to: usize) -> Result<()> {
        bail!("agent {agt} cannot move on a network");
    }

    fn mean_contacts(&self, _n_agt: usize) -> f64 {
        self.mean_degree()
    }
}
