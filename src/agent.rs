use crate::topology::Mode;
use std::fmt;

/// Epidemiological compartment of an agent.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Kind {
    S,
    E,
    I,
    R,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Kind::S => "S",
            Kind::E => "E",
            Kind::I => "I",
            Kind::R => "R",
        };
        f.write_str(label)
    }
}

/// Agent of the simulation (a "turtle").
///
/// Durations `ti` and `tr` are in ticks. `infection_tick` holds the tick at which the
/// agent entered E, and is overwritten with the tick at which it entered I.
#[derive(Debug, Clone)]
pub struct Agent {
    id: usize,
    site: usize,
    mode: Mode,
    kind: Kind,
    ti: f64,
    tr: f64,
    p: f64,
    infection_tick: usize,
}

impl Agent {
    pub fn new(id: usize, site: usize, mode: Mode, kind: Kind, ti: f64, tr: f64, p: f64) -> Self {
        Self {
            id,
            site,
            mode,
            kind,
            ti,
            tr,
            p,
            infection_tick: 0,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn site(&self) -> usize {
        self.site
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn ti(&self) -> f64 {
        self.ti
    }

    pub fn tr(&self) -> f64 {
        self.tr
    }

    pub fn p(&self) -> f64 {
        self.p
    }

    pub fn infection_tick(&self) -> usize {
        self.infection_tick
    }

    pub fn is_mobile(&self) -> bool {
        self.mode == Mode::Grid
    }

    pub fn set_site(&mut self, site: usize) {
        self.site = site;
    }

    /// Advance the agent's own timers at `tick`.
    ///
    /// Returns `true` when the agent was infectious at the start of this tick and
    /// must therefore attempt to infect its neighbors. An agent that turns from E to I
    /// only starts infecting on the next tick.
    pub fn progress(&mut self, tick: usize) -> bool {
        let elapsed = tick.saturating_sub(self.infection_tick) as f64;
        match self.kind {
            Kind::E => {
                if elapsed > self.ti {
                    self.kind = Kind::I;
                    self.infection_tick = tick;
                }
                false
            }
            Kind::I => {
                if elapsed > self.tr {
                    self.kind = Kind::R;
                }
                true
            }
            Kind::S | Kind::R => false,
        }
    }

    /// Expose a susceptible agent at `tick`. Other kinds are left untouched.
    pub fn expose(&mut self, tick: usize) -> bool {
        if self.kind != Kind::S {
            return false;
        }
        self.kind = Kind::E;
        self.infection_tick = tick;
        true
    }
}
