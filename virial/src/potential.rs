//! Spherical pair potentials and their Mayer functions

use cluster::ChannelBond;

use crate::config::PotentialConfig;

/// Pair potential seen through its Mayer function `f = exp(-βu) - 1`.
pub trait MayerFunction {
    /// Pair energy at squared separation `r2`; infinite inside a hard core.
    fn energy(&self, r2: f64) -> f64;

    /// Length scale of the potential.
    fn sigma(&self) -> f64;

    fn mayer(&self, r2: f64, beta: f64) -> f64 {
        let u = self.energy(r2);
        if u == f64::INFINITY {
            -1.0
        } else {
            (-beta * u).exp_m1()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HardSphere {
    pub sigma: f64,
}

impl MayerFunction for HardSphere {
    fn energy(&self, r2: f64) -> f64 {
        if r2 < self.sigma * self.sigma {
            f64::INFINITY
        } else {
            0.0
        }
    }

    fn sigma(&self) -> f64 {
        self.sigma
    }
}

/// Hard core of diameter `sigma` inside an attractive well of depth `epsilon`
/// reaching out to `lambda * sigma`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SquareWell {
    pub sigma: f64,
    pub lambda: f64,
    pub epsilon: f64,
}

impl SquareWell {
    /// Channel variable `Y = exp(βε) - 1` the well bonds are expanded in.
    pub fn well_variable(&self, beta: f64) -> f64 {
        (beta * self.epsilon).exp_m1()
    }

    /// Boltzmann factor of a pair as a polynomial in `Y`.
    pub fn channel_bond(&self, r2: f64, len: usize) -> ChannelBond {
        let well = self.lambda * self.sigma;
        if r2 < self.sigma * self.sigma {
            ChannelBond::overlap(len)
        } else if r2 < well * well {
            ChannelBond::well(len)
        } else {
            ChannelBond::ideal(len)
        }
    }
}

impl MayerFunction for SquareWell {
    fn energy(&self, r2: f64) -> f64 {
        let well = self.lambda * self.sigma;
        if r2 < self.sigma * self.sigma {
            f64::INFINITY
        } else if r2 < well * well {
            -self.epsilon
        } else {
            0.0
        }
    }

    fn sigma(&self) -> f64 {
        self.sigma
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LennardJones {
    pub epsilon: f64,
    pub sigma: f64,
}

impl LennardJones {
    pub fn new(epsilon: f64, sigma: f64) -> Self {
        LennardJones { epsilon, sigma }
    }

    fn lj_potential(&self, r2: f64) -> f64 {
        let inv_r2 = self.sigma * self.sigma / r2;
        let inv_r6 = inv_r2 * inv_r2 * inv_r2;
        4.0 * self.epsilon * (inv_r6 * inv_r6 - inv_r6)
    }
}

impl MayerFunction for LennardJones {
    fn energy(&self, r2: f64) -> f64 {
        if r2 == 0.0 {
            f64::INFINITY
        } else {
            self.lj_potential(r2)
        }
    }

    fn sigma(&self) -> f64 {
        self.sigma
    }
}

/// Potential selected in the configuration file
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Potential {
    HardSphere(HardSphere),
    SquareWell(SquareWell),
    LennardJones(LennardJones),
}

impl Potential {
    pub fn from_config(config: &PotentialConfig) -> Self {
        match *config {
            PotentialConfig::HardSphere { sigma } => Potential::HardSphere(HardSphere { sigma }),
            PotentialConfig::SquareWell {
                sigma,
                lambda,
                epsilon,
            } => Potential::SquareWell(SquareWell {
                sigma,
                lambda,
                epsilon,
            }),
            PotentialConfig::LennardJones { sigma, epsilon } => Potential::LennardJones(LennardJones::new(epsilon, sigma)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Potential::HardSphere(_) => "hard sphere",
            Potential::SquareWell(_) => "square well",
            Potential::LennardJones(_) => "Lennard-Jones",
        }
    }
}

impl MayerFunction for Potential {
    fn energy(&self, r2: f64) -> f64 {
        match self {
            Potential::HardSphere(p) => p.energy(r2),
            Potential::SquareWell(p) => p.energy(r2),
            Potential::LennardJones(p) => p.energy(r2),
        }
    }

    fn sigma(&self) -> f64 {
        match self {
            Potential::HardSphere(p) => p.sigma(),
            Potential::SquareWell(p) => p.sigma(),
            Potential::LennardJones(p) => p.sigma(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_hard_sphere_mayer_function() {
        let hs = HardSphere { sigma: 1.0 };
        assert_eq!(hs.mayer(0.81, 1.0), -1.0);
        assert_eq!(hs.mayer(1.21, 1.0), 0.0);
    }

    #[test]
    fn test_square_well_regions() {
        let sw = SquareWell {
            sigma: 1.0,
            lambda: 1.5,
            epsilon: 0.5,
        };
        let beta = 2.0;
        assert_eq!(sw.mayer(0.5, beta), -1.0);
        assert_relative_eq!(sw.mayer(1.44, beta), sw.well_variable(beta));
        assert_eq!(sw.mayer(4.0, beta), 0.0);
        assert_eq!(sw.channel_bond(1.44, 3).channels(), &[1.0, 1.0, 0.0]);
        assert_eq!(sw.channel_bond(0.5, 3).channels(), &[0.0, 0.0, 0.0]);
        assert_eq!(sw.channel_bond(4.0, 3).channels(), &[1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_lj_minimum() {
        let lj = LennardJones::new(1.0, 1.0);
        let r_min2 = 2f64.powf(1.0 / 3.0);
        assert_relative_eq!(lj.energy(r_min2), -1.0, epsilon = 1e-12);
        assert_relative_eq!(lj.mayer(r_min2, 1.0), 1f64.exp() - 1.0, epsilon = 1e-12);
        assert_eq!(lj.mayer(0.0, 1.0), -1.0);
        assert_relative_eq!(lj.mayer(0.01, 1.0), -1.0);
    }

    #[test]
    fn test_potential_from_config() {
        let potential = Potential::from_config(&PotentialConfig::LennardJones {
            sigma: 2.0,
            epsilon: 0.5,
        });
        assert_eq!(potential, Potential::LennardJones(LennardJones::new(0.5, 2.0)));
        assert_eq!(potential.sigma(), 2.0);
        assert_eq!(potential.name(), "Lennard-Jones");
    }
}
