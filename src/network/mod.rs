/////////////////////////////////////////////////////////////////////////////////////
//
// Epinet model
//
// network module
//
// builds the graph the epidemic spreads over, plus a 2-D layout for each
// node.  The layout is only consumed by renderers; the edge list is
// consumed by everything else.
//
////////////////////////////////////////////////////////////////////////////////////

use rand::Rng;
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::error::ModelError;

pub type Edge = (usize, usize);
pub type Position = (f64, f64);

// spring layout geometry - fixed, not tunable through the parameter file
const LAYOUT_ITERATIONS: usize = 200;
const REPULSION: f64 = 50_000.0;
const SPRING_REST_LENGTH: f64 = 40.0;
const STEP_SIZE: f64 = 0.03;
const DISTANCE_FLOOR: f64 = 0.01;

const INIT_X: (f64, f64) = (50.0, 750.0);
const INIT_Y: (f64, f64) = (50.0, 550.0);
const CLAMP_X: (f64, f64) = (20.0, 780.0);
const CLAMP_Y: (f64, f64) = (20.0, 580.0);
const RESEED_X: (f64, f64) = (100.0, 700.0);
const RESEED_Y: (f64, f64) = (100.0, 500.0);

const CIRCLE_RADIUS: f64 = 250.0;
const CIRCLE_CENTER: (f64, f64) = (400.0, 300.0);

pub const DEFAULT_EDGE_P: f64 = 0.1;

// Topology ------------------------------------------------------------------------------------

/// The generative mode for the network.
#[derive(Hash, Debug, Copy, Clone, Eq, PartialEq)]
pub enum Topology {
    FullyConnected,
    SmallWorld,
    Random,
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl FromStr for Topology {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Topology, ModelError> {
        match s {
            "fully_connected" => Ok(Topology::FullyConnected),
            "small_world" => Ok(Topology::SmallWorld),
            "random" => Ok(Topology::Random),
            _ => Err(ModelError::InvalidConfiguration(format!(
                "unknown topology mode '{}'",
                s
            ))),
        }
    }
}

// NetworkGenerator ----------------------------------------------------------------------------

/// Produces an undirected edge list and a per-node 2-D layout.
pub struct NetworkGenerator {
    n: usize,
    mode: Topology,
    k: usize,
    rewire_p: f64,
    edge_p: f64,
}

impl NetworkGenerator {
    /// `k` is the small-world lattice degree (rounded up to even at
    /// generation time) and `rewire_p` the per-edge rewiring probability;
    /// both are ignored by the other modes.
    pub fn new(n: usize, mode: Topology, k: usize, rewire_p: f64) -> Result<NetworkGenerator, ModelError> {
        if n == 0 {
            return Err(ModelError::InvalidConfiguration(String::from(
                "node count must be positive",
            )));
        }
        if rewire_p < 0.0 || rewire_p > 1.0 {
            return Err(ModelError::InvalidConfiguration(format!(
                "rewire probability {} outside [0, 1]",
                rewire_p
            )));
        }
        Ok(NetworkGenerator {
            n,
            mode,
            k,
            rewire_p,
            edge_p: DEFAULT_EDGE_P,
        })
    }

    /// Override the independent edge probability used by `Topology::Random`.
    pub fn with_edge_p(mut self, edge_p: f64) -> Result<NetworkGenerator, ModelError> {
        if edge_p < 0.0 || edge_p > 1.0 {
            return Err(ModelError::InvalidConfiguration(format!(
                "edge probability {} outside [0, 1]",
                edge_p
            )));
        }
        self.edge_p = edge_p;
        Ok(self)
    }

    /// Generate the network under the configured mode.
    pub fn generate<R: Rng>(&self, rng: &mut R) -> (Vec<Edge>, Vec<Position>) {
        let (edges, positions) = match self.mode {
            Topology::FullyConnected => self.generate_fully_connected(),
            Topology::SmallWorld => self.generate_small_world(rng),
            Topology::Random => self.generate_random(rng),
        };
        debug!(
            mode = %self.mode,
            nodes = self.n,
            edges = edges.len(),
            "network generated"
        );
        (edges, positions)
    }

    // an edge for every unordered pair; nodes evenly spaced on a circle
    fn generate_fully_connected(&self) -> (Vec<Edge>, Vec<Position>) {
        let mut edges: Vec<Edge> = Vec::with_capacity(self.n * (self.n - 1) / 2);
        for i in 0..self.n {
            for j in (i + 1)..self.n {
                edges.push((i, j));
            }
        }
        let positions = self.circle_layout();
        (edges, positions)
    }

    // each pair independently included with probability edge_p
    fn generate_random<R: Rng>(&self, rng: &mut R) -> (Vec<Edge>, Vec<Position>) {
        let mut edges: Vec<Edge> = Vec::new();
        for i in 0..self.n {
            for j in (i + 1)..self.n {
                if rng.gen::<f64>() < self.edge_p {
                    edges.push((i, j));
                }
            }
        }
        let positions = self.spring_layout(&edges, rng);
        (edges, positions)
    }

    // Watts-Strogatz style: ring lattice, then independent per-edge rewiring.
    //
    // The layout is computed from the pre-rewire lattice while the caller
    // receives the post-rewire edge list, so layout and returned topology
    // can disagree.  That mismatch is intentional and must stay.
    fn generate_small_world<R: Rng>(&self, rng: &mut R) -> (Vec<Edge>, Vec<Position>) {
        let mut deg = self.k;
        if deg % 2 == 1 {
            deg += 1;
        }

        let mut lattice: Vec<Edge> = Vec::with_capacity(self.n * deg / 2);
        for i in 0..self.n {
            for j in 1..=(deg / 2) {
                let neighbor = (i + j) % self.n;
                // degenerate lattices (n <= k/2) would self-loop here
                if neighbor != i {
                    lattice.push((i, neighbor));
                }
            }
        }

        let mut edges: Vec<Edge> = Vec::with_capacity(lattice.len());
        for &(u, v) in &lattice {
            if self.n > 1 && rng.gen::<f64>() < self.rewire_p {
                let mut new_v = rng.gen_range(0, self.n);
                while new_v == u {
                    new_v = rng.gen_range(0, self.n);
                }
                edges.push((u, new_v));
            } else {
                edges.push((u, v));
            }
        }

        let positions = self.spring_layout(&lattice, rng);
        (edges, positions)
    }

    // Force-directed placement: Coulomb-like repulsion between every node
    // pair plus a spring along every edge pulling connected nodes toward
    // the rest length.  Fixed iteration count, no convergence criterion.
    fn spring_layout<R: Rng>(&self, edges: &[Edge], rng: &mut R) -> Vec<Position> {
        let mut positions: Vec<Position> = (0..self.n)
            .map(|_| {
                (
                    rng.gen_range(INIT_X.0, INIT_X.1),
                    rng.gen_range(INIT_Y.0, INIT_Y.1),
                )
            })
            .collect();

        for _ in 0..LAYOUT_ITERATIONS {
            let mut forces: Vec<(f64, f64)> = vec![(0.0, 0.0); self.n];

            for i in 0..self.n {
                let (xi, yi) = positions[i];
                for j in (i + 1)..self.n {
                    let (xj, yj) = positions[j];
                    let dx = xi - xj;
                    let dy = yi - yj;
                    let dist2 = dx * dx + dy * dy + DISTANCE_FLOOR;
                    let dist = dist2.sqrt();

                    let force = REPULSION / dist2;
                    let fx = force * (dx / dist);
                    let fy = force * (dy / dist);

                    forces[i].0 += fx;
                    forces[i].1 += fy;
                    forces[j].0 -= fx;
                    forces[j].1 -= fy;
                }
            }

            for &(u, v) in edges {
                let (xu, yu) = positions[u];
                let (xv, yv) = positions[v];
                let dx = xu - xv;
                let dy = yu - yv;
                let dist = (dx * dx + dy * dy).sqrt() + DISTANCE_FLOOR;

                let force = dist - SPRING_REST_LENGTH;
                let fx = force * (dx / dist);
                let fy = force * (dy / dist);

                forces[u].0 -= fx;
                forces[u].1 -= fy;
                forces[v].0 += fx;
                forces[v].1 += fy;
            }

            for i in 0..self.n {
                let mut x = positions[i].0 + STEP_SIZE * forces[i].0;
                let mut y = positions[i].1 + STEP_SIZE * forces[i].1;

                // numerical-stability safeguard, not an error
                if !x.is_finite() || !y.is_finite() {
                    x = rng.gen_range(RESEED_X.0, RESEED_X.1);
                    y = rng.gen_range(RESEED_Y.0, RESEED_Y.1);
                }

                positions[i].0 = x.max(CLAMP_X.0).min(CLAMP_X.1);
                positions[i].1 = y.max(CLAMP_Y.0).min(CLAMP_Y.1);
            }
        }

        positions
    }

    fn circle_layout(&self) -> Vec<Position> {
        let (cx, cy) = CIRCLE_CENTER;
        (0..self.n)
            .map(|i| {
                let angle = 2.0 * PI * i as f64 / self.n as f64;
                (cx + CIRCLE_RADIUS * angle.cos(), cy + CIRCLE_RADIUS * angle.sin())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng(seed: u64) -> StdRng {
        StdRng::seed_from_u64(seed)
    }

    #[test]
    fn unknown_mode_is_invalid_configuration() {
        let err = "ring_of_fire".parse::<Topology>().unwrap_err();
        match err {
            ModelError::InvalidConfiguration(msg) => assert!(msg.contains("ring_of_fire")),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn known_modes_parse() {
        assert_eq!("fully_connected".parse::<Topology>().unwrap(), Topology::FullyConnected);
        assert_eq!("small_world".parse::<Topology>().unwrap(), Topology::SmallWorld);
        assert_eq!("random".parse::<Topology>().unwrap(), Topology::Random);
    }

    #[test]
    fn zero_nodes_rejected() {
        assert!(NetworkGenerator::new(0, Topology::Random, 4, 0.1).is_err());
    }

    #[test]
    fn out_of_range_rewire_p_rejected() {
        assert!(NetworkGenerator::new(10, Topology::SmallWorld, 4, 1.5).is_err());
        assert!(NetworkGenerator::new(10, Topology::SmallWorld, 4, -0.1).is_err());
    }

    #[test]
    fn fully_connected_five_nodes_has_ten_edges() {
        let gen = NetworkGenerator::new(5, Topology::FullyConnected, 4, 0.1).unwrap();
        let (edges, positions) = gen.generate(&mut rng(1));
        assert_eq!(edges.len(), 10);
        assert_eq!(positions.len(), 5);
    }

    #[test]
    fn small_world_lattice_has_n_times_half_k_edges() {
        // n=10, k=4, no rewiring: the base lattice of 20 half-edges comes
        // straight through
        let gen = NetworkGenerator::new(10, Topology::SmallWorld, 4, 0.0).unwrap();
        let (edges, _) = gen.generate(&mut rng(2));
        assert_eq!(edges.len(), 20);
        for &(u, v) in &edges {
            assert_ne!(u, v);
        }
    }

    #[test]
    fn odd_k_rounds_up_to_even() {
        let gen = NetworkGenerator::new(10, Topology::SmallWorld, 3, 0.0).unwrap();
        let (edges, _) = gen.generate(&mut rng(3));
        assert_eq!(edges.len(), 20); // same lattice as k=4
    }

    #[test]
    fn rewiring_never_creates_self_loops() {
        let gen = NetworkGenerator::new(12, Topology::SmallWorld, 4, 1.0).unwrap();
        let (edges, _) = gen.generate(&mut rng(4));
        assert_eq!(edges.len(), 24);
        for &(u, v) in &edges {
            assert_ne!(u, v);
        }
    }

    #[test]
    fn single_node_network_is_edgeless() {
        let gen = NetworkGenerator::new(1, Topology::SmallWorld, 4, 0.5).unwrap();
        let (edges, positions) = gen.generate(&mut rng(5));
        assert!(edges.is_empty());
        assert_eq!(positions.len(), 1);
    }

    #[test]
    fn random_mode_respects_edge_probability_extremes() {
        let gen = NetworkGenerator::new(8, Topology::Random, 4, 0.1)
            .unwrap()
            .with_edge_p(0.0)
            .unwrap();
        let (edges, _) = gen.generate(&mut rng(6));
        assert!(edges.is_empty());

        let gen = NetworkGenerator::new(8, Topology::Random, 4, 0.1)
            .unwrap()
            .with_edge_p(1.0)
            .unwrap();
        let (edges, _) = gen.generate(&mut rng(7));
        assert_eq!(edges.len(), 28);
    }

    #[test]
    fn circle_layout_is_deterministic_and_on_the_circle() {
        let gen = NetworkGenerator::new(4, Topology::FullyConnected, 4, 0.1).unwrap();
        let (_, positions) = gen.generate(&mut rng(8));
        let (_, positions2) = gen.generate(&mut rng(99));
        assert_eq!(positions, positions2); // no randomness in the circle layout
        for &(x, y) in &positions {
            let r = ((x - 400.0).powi(2) + (y - 300.0).powi(2)).sqrt();
            assert!((r - 250.0).abs() < 1e-9);
        }
    }

    #[test]
    fn spring_layout_positions_are_finite_and_bounded() {
        let gen = NetworkGenerator::new(30, Topology::Random, 4, 0.1).unwrap();
        let (_, positions) = gen.generate(&mut rng(9));
        for &(x, y) in &positions {
            assert!(x.is_finite() && y.is_finite());
            assert!(x >= 20.0 && x <= 780.0);
            assert!(y >= 20.0 && y <= 580.0);
        }
    }

    #[test]
    fn edges_are_within_node_range() {
        for seed in 0..5 {
            let gen = NetworkGenerator::new(15, Topology::SmallWorld, 4, 0.3).unwrap();
            let (edges, _) = gen.generate(&mut rng(seed));
            for &(u, v) in &edges {
                assert!(u < 15 && v < 15);
            }
        }
    }
}
