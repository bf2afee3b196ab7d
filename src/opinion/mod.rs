/////////////////////////////////////////////////////////////////////////////////////
//
// Epinet model
//
// opinion module
//
// DeGroot social learning: each agent's belief becomes a trust-weighted
// average of its neighbors' (and its own) prior beliefs.
//
////////////////////////////////////////////////////////////////////////////////////

/// Linear opinion propagation over a row-stochastic trust matrix.
///
/// The model holds a plain numeric vector - never references into the
/// environment's node records.  Callers copy opinions in before stepping
/// and copy the result back out.
#[derive(Debug, Clone)]
pub struct DeGrootModel {
    opinions: Vec<f64>,
    trust: Vec<Vec<f64>>,
}

impl DeGrootModel {
    /// Identity trust: every agent trusts only itself, so opinions are a
    /// fixed point of `step`.  A valid degenerate configuration, not an
    /// error.
    pub fn new(initial_opinions: Vec<f64>) -> DeGrootModel {
        let n = initial_opinions.len();
        let trust = identity_matrix(n);
        DeGrootModel {
            opinions: initial_opinions,
            trust,
        }
    }

    /// Build from an explicit trust matrix.  Rows are normalized to sum to
    /// 1; a row summing to 0 is replaced by the identity row (self-trust
    /// only).
    pub fn with_trust(initial_opinions: Vec<f64>, trust_matrix: Vec<Vec<f64>>) -> DeGrootModel {
        let n = initial_opinions.len();
        assert_eq!(
            trust_matrix.len(),
            n,
            "trust matrix has {} rows for {} agents",
            trust_matrix.len(),
            n
        );
        for row in &trust_matrix {
            assert_eq!(row.len(), n, "trust matrix row length {} != {}", row.len(), n);
        }

        DeGrootModel {
            opinions: initial_opinions,
            trust: normalize_rows(trust_matrix),
        }
    }

    /// One propagation step: replaces the opinion vector with
    /// `W * opinion` and returns a view of the new vector.  Deterministic
    /// given current state.
    pub fn step(&mut self) -> &[f64] {
        let n = self.opinions.len();
        let mut next = vec![0.0; n];
        for i in 0..n {
            let row = &self.trust[i];
            let mut acc = 0.0;
            for j in 0..n {
                acc += row[j] * self.opinions[j];
            }
            next[i] = acc;
        }
        self.opinions = next;
        &self.opinions
    }

    pub fn set_opinion(&mut self, i: usize, value: f64) {
        self.opinions[i] = value;
    }

    pub fn get_opinion(&self, i: usize) -> f64 {
        self.opinions[i]
    }

    pub fn opinions(&self) -> &[f64] {
        &self.opinions
    }

    pub fn trust_matrix(&self) -> &[Vec<f64>] {
        &self.trust
    }
}

fn identity_matrix(n: usize) -> Vec<Vec<f64>> {
    let mut m = vec![vec![0.0; n]; n];
    for i in 0..n {
        m[i][i] = 1.0;
    }
    m
}

fn normalize_rows(mut trust: Vec<Vec<f64>>) -> Vec<Vec<f64>> {
    for (i, row) in trust.iter_mut().enumerate() {
        let sum: f64 = row.iter().sum();
        if sum == 0.0 {
            for (j, w) in row.iter_mut().enumerate() {
                *w = if j == i { 1.0 } else { 0.0 };
            }
        } else {
            for w in row.iter_mut() {
                *w /= sum;
            }
        }
    }
    trust
}
