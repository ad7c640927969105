pub mod body;
pub mod c_api;
pub mod config;
pub mod error;
pub mod simulation;
pub mod utils;
pub mod vector;

pub use body::{Body, Color};
pub use config::SimulationConfig;
pub use error::{BodyError, ConfigError, SimulationError};
pub use simulation::{BodyId, BodyReport, ForwardPreview, PreviewPath, Simulation};
pub use vector::Vector;
