/////////////////////////////////////////////////////////////////////////////////////
//
// Epinet model
//
// Simulates an epidemic spreading over a network together with a DeGroot
// social-learning process among the same agents.  Perceived risk drives
// vaccination decisions and vaccination status modulates transmission.
//
////////////////////////////////////////////////////////////////////////////////////

pub mod baseline;
pub mod data_management;
pub mod environment;
pub mod error;
pub mod network;
pub mod opinion;
pub mod stats;
pub mod utilities;

pub use environment::{Environment, Node, SimParms};
pub use error::ModelError;
pub use network::{NetworkGenerator, Topology};
pub use opinion::DeGrootModel;
