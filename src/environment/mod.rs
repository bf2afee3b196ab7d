/////////////////////////////////////////////////////////////////////////////////////
//
// Epinet model
//
// environment module
//
// owns the per-node mutable state (risk, opinion, infection, vaccination)
// and advances the coupled epidemic/opinion/vaccination system one tick at
// a time.
//
////////////////////////////////////////////////////////////////////////////////////

use rand::Rng;
use serde::Serialize;
use tracing::debug;

use crate::error::ModelError;
use crate::network::{Edge, Position};
use crate::opinion::DeGrootModel;
use crate::utilities::clamp01;

// trust weight ranges used when deriving the matrix from adjacency
const NEIGHBOR_TRUST: (f64, f64) = (0.1, 1.0);
const SELF_TRUST: (f64, f64) = (0.2, 0.8);

// per-node initialization ranges
const INNATE_RISK: (f64, f64) = (0.2, 0.8);
const INITIAL_OPINION: (f64, f64) = (0.0, 0.1);

// Node -----------------------------------------------------------------------------------------

/// Per-agent record.  `infected` and `vaccinated` are monotonic: once set
/// they are never cleared for the rest of the run.
#[derive(Debug, Copy, Clone, Serialize)]
pub struct Node {
    pub innate_risk: f64,
    pub opinion_risk: f64,
    pub infected: bool,
    pub vaccinated: bool,
}

// Parameters -----------------------------------------------------------------------------------

/// Tunable rates, injected at construction so differently-configured
/// environments can coexist.
#[derive(Debug, Copy, Clone)]
pub struct SimParms {
    pub base_infection_p: f64,
    pub vaccination_protection: f64,
    pub base_vax_rate: f64,
    pub opinion_decay: f64,
    pub opinion_increase_per_neighbor: f64,
}

impl Default for SimParms {
    fn default() -> SimParms {
        SimParms {
            base_infection_p: 0.1,
            vaccination_protection: 0.95,
            base_vax_rate: 0.05,
            opinion_decay: 0.98,
            opinion_increase_per_neighbor: 0.1,
        }
    }
}

impl SimParms {
    pub fn validate(&self) -> Result<(), ModelError> {
        let fields = [
            ("base_infection_p", self.base_infection_p),
            ("vaccination_protection", self.vaccination_protection),
            ("base_vax_rate", self.base_vax_rate),
            ("opinion_decay", self.opinion_decay),
            ("opinion_increase_per_neighbor", self.opinion_increase_per_neighbor),
        ];
        for &(name, value) in &fields {
            if !value.is_finite() || value < 0.0 || value > 1.0 {
                return Err(ModelError::InvalidConfiguration(format!(
                    "{} = {} outside [0, 1]",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

// Environment ----------------------------------------------------------------------------------

/// The simulation environment: graph, layout, node records and the opinion
/// model, advanced by `step`.
pub struct Environment {
    edges: Vec<Edge>,
    positions: Vec<Position>,
    adj: Vec<Vec<usize>>,
    nodes: Vec<Node>,
    degroot: DeGrootModel,
    parms: SimParms,
}

impl Environment {
    /// Build the environment from a generated network.  Initializes every
    /// node, marks one uniformly random patient zero, derives the trust
    /// matrix from adjacency and seeds the opinion model with the initial
    /// per-node opinions.
    pub fn new<R: Rng>(
        edges: Vec<Edge>,
        positions: Vec<Position>,
        parms: SimParms,
        rng: &mut R,
    ) -> Result<Environment, ModelError> {
        parms.validate()?;

        let num_nodes = positions.len();
        if num_nodes == 0 {
            return Err(ModelError::InvalidConfiguration(String::from(
                "environment needs at least one node",
            )));
        }
        for &(u, v) in &edges {
            if u >= num_nodes || v >= num_nodes || u == v {
                return Err(ModelError::InvalidConfiguration(format!(
                    "edge ({}, {}) invalid for {} nodes",
                    u, v, num_nodes
                )));
            }
        }

        let mut adj: Vec<Vec<usize>> = vec![Vec::new(); num_nodes];
        for &(u, v) in &edges {
            adj[u].push(v);
            adj[v].push(u);
        }

        let mut nodes: Vec<Node> = Vec::with_capacity(num_nodes);
        for _ in 0..num_nodes {
            nodes.push(Node {
                innate_risk: rng.gen_range(INNATE_RISK.0, INNATE_RISK.1),
                opinion_risk: rng.gen_range(INITIAL_OPINION.0, INITIAL_OPINION.1),
                infected: false,
                vaccinated: false,
            });
        }

        let patient_zero = rng.gen_range(0, num_nodes);
        nodes[patient_zero].infected = true;

        let trust_matrix = create_trust_matrix(&adj, rng);
        let initial_opinions: Vec<f64> = nodes.iter().map(|n| n.opinion_risk).collect();
        let degroot = DeGrootModel::with_trust(initial_opinions, trust_matrix);

        debug!(nodes = num_nodes, edges = edges.len(), patient_zero, "environment created");

        Ok(Environment {
            edges,
            positions,
            adj,
            nodes,
            degroot,
            parms,
        })
    }

    /// One tick.  Sub-step order is load-bearing: environmental feedback
    /// writes the opinions that social learning reads, and vaccination
    /// reads the opinions social learning wrote.  Transmission is judged
    /// against start-of-tick infection state; queued infections land only
    /// after the full edge scan.
    ///
    /// Returns the directed edges along which a new infection occurred.
    pub fn step<R: Rng>(&mut self, rng: &mut R) -> Vec<Edge> {
        // 1. environmental opinion feedback
        self.update_perceived_risk();

        // 2. social learning: copy in, propagate, copy out
        for (i, node) in self.nodes.iter().enumerate() {
            self.degroot.set_opinion(i, node.opinion_risk);
        }
        self.degroot.step();
        for (i, node) in self.nodes.iter_mut().enumerate() {
            node.opinion_risk = self.degroot.get_opinion(i);
        }

        // 3. vaccination decisions
        self.vaccinate(rng);

        // 4. transmission over every edge, both directions independently
        let mut new_infections: Vec<usize> = Vec::new();
        let mut infected_edges: Vec<Edge> = Vec::new();

        for &(u, v) in &self.edges {
            let u_inf = self.nodes[u].infected;
            let v_inf = self.nodes[v].infected;

            if u_inf && !v_inf {
                let p = self.transmission_p(v);
                if rng.gen::<f64>() < p {
                    new_infections.push(v);
                    infected_edges.push((u, v));
                }
            }

            if v_inf && !u_inf {
                let p = self.transmission_p(u);
                if rng.gen::<f64>() < p {
                    new_infections.push(u);
                    infected_edges.push((v, u));
                }
            }
        }

        // 5. apply queued infections (idempotent on duplicates)
        for i in new_infections {
            self.nodes[i].infected = true;
        }

        // 6. numeric sanitation
        for node in self.nodes.iter_mut() {
            node.opinion_risk = clamp01(node.opinion_risk);
        }

        infected_edges
    }

    // fear fades absent visible threat, rises with local infection pressure
    fn update_perceived_risk(&mut self) {
        for i in 0..self.nodes.len() {
            let infected_neighbors = self.adj[i]
                .iter()
                .filter(|&&nbr| self.nodes[nbr].infected)
                .count();

            let node = &mut self.nodes[i];
            if infected_neighbors == 0 {
                node.opinion_risk *= self.parms.opinion_decay;
            } else {
                node.opinion_risk +=
                    self.parms.opinion_increase_per_neighbor * infected_neighbors as f64;
            }
            node.opinion_risk = clamp01(node.opinion_risk);
        }
    }

    // higher perceived risk, higher chance of vaccinating this tick
    fn vaccinate<R: Rng>(&mut self, rng: &mut R) {
        for node in self.nodes.iter_mut() {
            if !node.vaccinated {
                let p_vax = self.parms.base_vax_rate * node.opinion_risk;
                if rng.gen::<f64>() < p_vax {
                    node.vaccinated = true;
                }
            }
        }
    }

    // probability that the susceptible node dst catches it from an
    // infected neighbor this tick
    fn transmission_p(&self, dst: usize) -> f64 {
        let node = &self.nodes[dst];
        let mut risk = node.innate_risk;
        if node.vaccinated {
            risk *= 1.0 - self.parms.vaccination_protection;
        }
        self.parms.base_infection_p * risk
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn infected_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.infected).count()
    }

    pub fn vaccinated_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.vaccinated).count()
    }

    pub fn mean_opinion(&self) -> f64 {
        crate::utilities::mean(&self.nodes.iter().map(|n| n.opinion_risk).collect::<Vec<f64>>())
    }
}

// derive the raw trust matrix from adjacency: random positive weight on
// each neighbor plus a random self-weight; neighborless nodes trust only
// themselves.  Row normalization happens inside the opinion model.
fn create_trust_matrix<R: Rng>(adj: &[Vec<usize>], rng: &mut R) -> Vec<Vec<f64>> {
    let n = adj.len();
    let mut matrix = vec![vec![0.0; n]; n];

    for i in 0..n {
        if adj[i].is_empty() {
            matrix[i][i] = 1.0;
            continue;
        }
        for &nbr in &adj[i] {
            matrix[i][nbr] = rng.gen_range(NEIGHBOR_TRUST.0, NEIGHBOR_TRUST.1);
        }
        matrix[i][i] = rng.gen_range(SELF_TRUST.0, SELF_TRUST.1);
    }

    matrix
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng(seed: u64) -> StdRng {
        StdRng::seed_from_u64(seed)
    }

    fn quiet_parms() -> SimParms {
        // no vaccination, no transmission: isolates the opinion machinery
        SimParms {
            base_infection_p: 0.0,
            base_vax_rate: 0.0,
            ..SimParms::default()
        }
    }

    #[test]
    fn exactly_one_patient_zero_after_construction() {
        for &n in &[1usize, 2, 30] {
            let positions = vec![(0.0, 0.0); n];
            let edges: Vec<Edge> = (1..n).map(|i| (i - 1, i)).collect();
            let env =
                Environment::new(edges, positions, SimParms::default(), &mut rng(n as u64)).unwrap();
            assert_eq!(env.infected_count(), 1, "n = {}", n);
            assert_eq!(env.vaccinated_count(), 0, "n = {}", n);
        }
    }

    #[test]
    fn invalid_parms_rejected() {
        let bad = SimParms {
            base_infection_p: 1.5,
            ..SimParms::default()
        };
        let result = Environment::new(vec![], vec![(0.0, 0.0)], bad, &mut rng(1));
        assert!(matches!(result, Err(ModelError::InvalidConfiguration(_))));
    }

    #[test]
    fn out_of_range_edges_rejected() {
        let positions = vec![(0.0, 0.0); 2];
        let result = Environment::new(vec![(0, 5)], positions.clone(), SimParms::default(), &mut rng(1));
        assert!(matches!(result, Err(ModelError::InvalidConfiguration(_))));
        let result = Environment::new(vec![(1, 1)], positions, SimParms::default(), &mut rng(1));
        assert!(matches!(result, Err(ModelError::InvalidConfiguration(_))));
    }

    #[test]
    fn empty_environment_rejected() {
        let result = Environment::new(vec![], vec![], SimParms::default(), &mut rng(1));
        assert!(matches!(result, Err(ModelError::InvalidConfiguration(_))));
    }

    #[test]
    fn trust_matrix_rows_sum_to_one() {
        let positions = vec![(0.0, 0.0); 6];
        let edges = vec![(0, 1), (1, 2), (2, 3), (3, 4), (4, 0)];
        let env = Environment::new(edges, positions, SimParms::default(), &mut rng(7)).unwrap();
        for row in env.degroot.trust_matrix() {
            let sum: f64 = row.iter().sum();
            assert!((sum - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn isolated_node_gets_identity_trust_row() {
        // node 2 has no neighbors
        let positions = vec![(0.0, 0.0); 3];
        let env =
            Environment::new(vec![(0, 1)], positions, SimParms::default(), &mut rng(11)).unwrap();
        let row = &env.degroot.trust_matrix()[2];
        assert_eq!(row.as_slice(), &[0.0, 0.0, 1.0]);
    }

    #[test]
    fn transmission_probability_formula() {
        let positions = vec![(0.0, 0.0); 2];
        let parms = SimParms {
            base_infection_p: 0.1,
            vaccination_protection: 0.8,
            ..SimParms::default()
        };
        let mut env = Environment::new(vec![(0, 1)], positions, parms, &mut rng(3)).unwrap();

        env.nodes[1].innate_risk = 0.5;
        env.nodes[1].vaccinated = false;
        assert!((env.transmission_p(1) - 0.05).abs() < 1e-12);

        env.nodes[1].vaccinated = true;
        assert!((env.transmission_p(1) - 0.01).abs() < 1e-12);
    }

    #[test]
    fn certain_transmission_infects_the_neighbor() {
        let positions = vec![(0.0, 0.0); 2];
        let parms = SimParms {
            base_infection_p: 1.0,
            base_vax_rate: 0.0,
            ..SimParms::default()
        };
        let mut env = Environment::new(vec![(0, 1)], positions, parms, &mut rng(5)).unwrap();

        // pin the scenario regardless of which node drew patient zero
        env.nodes[0].infected = true;
        env.nodes[1].infected = false;
        env.nodes[1].innate_risk = 1.0;
        env.nodes[1].vaccinated = false;

        let infected_edges = env.step(&mut rng(6));
        assert!(env.nodes[1].infected);
        assert!(infected_edges.contains(&(0, 1)));
    }

    #[test]
    fn feedback_raises_fear_near_infection_and_decays_it_otherwise() {
        let positions = vec![(0.0, 0.0); 2];
        let mut env =
            Environment::new(vec![(0, 1)], positions, quiet_parms(), &mut rng(9)).unwrap();

        env.nodes[0].infected = true;
        env.nodes[1].infected = false;
        env.nodes[0].opinion_risk = 0.5;
        env.nodes[1].opinion_risk = 0.5;

        env.update_perceived_risk();

        // node 1 sees one infected neighbor; node 0 sees none
        assert!((env.nodes[1].opinion_risk - 0.6).abs() < 1e-12);
        assert!((env.nodes[0].opinion_risk - 0.49).abs() < 1e-12);
    }

    #[test]
    fn feedback_clamps_to_unit_interval() {
        let positions = vec![(0.0, 0.0); 3];
        let edges = vec![(0, 1), (0, 2)];
        let mut env = Environment::new(edges, positions, quiet_parms(), &mut rng(13)).unwrap();

        env.nodes[1].infected = true;
        env.nodes[2].infected = true;
        env.nodes[0].opinion_risk = 0.95;

        env.update_perceived_risk();
        assert_eq!(env.nodes[0].opinion_risk, 1.0); // 0.95 + 0.2 clamped
    }

    #[test]
    fn certain_vaccination_with_full_fear() {
        let positions = vec![(0.0, 0.0); 2];
        let parms = SimParms {
            base_infection_p: 0.0,
            base_vax_rate: 1.0,
            opinion_decay: 1.0,
            ..SimParms::default()
        };
        let mut env = Environment::new(vec![(0, 1)], positions, parms, &mut rng(17)).unwrap();
        for node in env.nodes.iter_mut() {
            node.opinion_risk = 1.0;
            node.infected = false;
        }

        env.step(&mut rng(18));
        assert_eq!(env.vaccinated_count(), 2);
    }

    #[test]
    fn infection_and_vaccination_are_monotonic_and_opinions_stay_in_range() {
        let positions = vec![(0.0, 0.0); 20];
        let edges: Vec<Edge> = (0..20).map(|i| (i, (i + 1) % 20)).collect();
        let parms = SimParms {
            base_infection_p: 0.6,
            base_vax_rate: 0.3,
            ..SimParms::default()
        };
        let mut env = Environment::new(edges, positions, parms, &mut rng(21)).unwrap();
        let mut step_rng = rng(22);

        let mut was_infected = vec![false; 20];
        let mut was_vaccinated = vec![false; 20];

        for _ in 0..50 {
            env.step(&mut step_rng);
            for (i, node) in env.nodes().iter().enumerate() {
                if was_infected[i] {
                    assert!(node.infected, "infection flag was cleared");
                }
                if was_vaccinated[i] {
                    assert!(node.vaccinated, "vaccination flag was cleared");
                }
                was_infected[i] = node.infected;
                was_vaccinated[i] = node.vaccinated;
                assert!(node.opinion_risk >= 0.0 && node.opinion_risk <= 1.0);
            }
        }
    }

    #[test]
    fn step_sanitizes_non_finite_opinions() {
        let positions = vec![(0.0, 0.0); 3];
        let edges = vec![(0, 1), (1, 2)];
        let mut env = Environment::new(edges, positions, quiet_parms(), &mut rng(23)).unwrap();

        env.nodes[0].opinion_risk = f64::NAN;
        env.nodes[1].opinion_risk = f64::INFINITY;

        env.step(&mut rng(24));
        for node in env.nodes() {
            assert!(node.opinion_risk.is_finite());
            assert!(node.opinion_risk >= 0.0 && node.opinion_risk <= 1.0);
        }
    }

    #[test]
    fn no_transmission_within_the_tick_it_was_caught() {
        // chain 0-1-2 with certain transmission: the wave advances one hop
        // per tick because trials are judged against start-of-tick state
        let positions = vec![(0.0, 0.0); 3];
        let edges = vec![(0, 1), (1, 2)];
        let parms = SimParms {
            base_infection_p: 1.0,
            base_vax_rate: 0.0,
            ..SimParms::default()
        };
        let mut env = Environment::new(edges, positions, parms, &mut rng(31)).unwrap();
        for node in env.nodes.iter_mut() {
            node.infected = false;
            node.innate_risk = 1.0;
            node.vaccinated = false;
        }
        env.nodes[0].infected = true;

        env.step(&mut rng(32));
        assert!(env.nodes[1].infected);
        assert!(!env.nodes[2].infected);

        env.step(&mut rng(33));
        assert!(env.nodes[2].infected);
    }
}
