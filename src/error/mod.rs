/////////////////////////////////////////////////////////////////////////////////////
//
// Epinet model
//
// error module
//
// the model-wide error type
//
////////////////////////////////////////////////////////////////////////////////////

use thiserror::Error;

/// Errors surfaced by model construction and the data management layer.
///
/// Anything numeric that goes wrong mid-simulation (non-finite opinion
/// values and the like) is recovered by clamping, not reported here.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Rejected at construction time: unknown topology mode, non-positive
    /// node count, out-of-range probability or a malformed parameter file.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}
