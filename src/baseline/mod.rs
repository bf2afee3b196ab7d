/////////////////////////////////////////////////////////////////////////////////////
//
// Epinet model
//
// baseline module
//
// stochastic SIR counter used as a sanity-check baseline.  It shares no
// state with the graph/opinion machinery: just three per-day binomial
// draws over aggregate compartment counts.
//
////////////////////////////////////////////////////////////////////////////////////

use rand::Rng;
use rand_distr::{Binomial, Distribution};

use crate::error::ModelError;

/// Parameters for a baseline run.
#[derive(Debug, Copy, Clone)]
pub struct BaselineParms {
    pub population: u64,
    pub initial_infected: u64,
    pub initial_recovered: u64,
    /// daily transmission pressure
    pub beta: f64,
    /// daily recovery rate
    pub gamma: f64,
    pub days: usize,
}

impl BaselineParms {
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.days == 0 {
            return Err(ModelError::InvalidConfiguration(String::from(
                "baseline day count must be positive",
            )));
        }
        if self.initial_infected + self.initial_recovered > self.population {
            return Err(ModelError::InvalidConfiguration(format!(
                "baseline seeds {} + {} exceed population {}",
                self.initial_infected, self.initial_recovered, self.population
            )));
        }
        if !self.beta.is_finite() || self.beta < 0.0 || !self.gamma.is_finite() || self.gamma < 0.0 {
            return Err(ModelError::InvalidConfiguration(format!(
                "baseline rates beta = {}, gamma = {} must be non-negative",
                self.beta, self.gamma
            )));
        }
        Ok(())
    }
}

/// Daily S/I/R compartment counts for one run.
#[derive(Debug, Clone)]
pub struct SirSeries {
    pub susceptible: Vec<u64>,
    pub infected: Vec<u64>,
    pub recovered: Vec<u64>,
}

impl SirSeries {
    pub fn peak_infected(&self) -> u64 {
        self.infected.iter().copied().max().unwrap_or(0)
    }
}

/// Run one stochastic SIR trajectory.
///
/// Each day draws new infections as Binomial(S, 1 - exp(-beta * I / N))
/// and new recoveries as Binomial(I, 1 - exp(-gamma)).  A day with no
/// infected copies the previous day forward.
pub fn stochastic_sir<R: Rng>(parms: &BaselineParms, rng: &mut R) -> Result<SirSeries, ModelError> {
    parms.validate()?;

    let n = parms.population;
    let days = parms.days;
    let mut s = vec![0u64; days];
    let mut i = vec![0u64; days];
    let mut r = vec![0u64; days];
    s[0] = n - parms.initial_infected - parms.initial_recovered;
    i[0] = parms.initial_infected;
    r[0] = parms.initial_recovered;

    let p_rec = 1.0 - (-parms.gamma).exp();

    for t in 1..days {
        if i[t - 1] == 0 {
            s[t] = s[t - 1];
            i[t] = 0;
            r[t] = r[t - 1];
            continue;
        }

        let p_inf = 1.0 - (-parms.beta * i[t - 1] as f64 / n as f64).exp();

        let new_inf = Binomial::new(s[t - 1], p_inf)
            .map_err(|e| ModelError::InvalidConfiguration(format!("binomial: {:?}", e)))?
            .sample(rng);
        let new_rec = Binomial::new(i[t - 1], p_rec)
            .map_err(|e| ModelError::InvalidConfiguration(format!("binomial: {:?}", e)))?
            .sample(rng);

        s[t] = s[t - 1] - new_inf;
        i[t] = i[t - 1] + new_inf - new_rec;
        r[t] = r[t - 1] + new_rec;
    }

    Ok(SirSeries {
        susceptible: s,
        infected: i,
        recovered: r,
    })
}
