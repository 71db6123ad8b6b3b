pub mod block;
pub mod config;
pub mod error;
pub mod stimulus;
pub mod trial;

pub use block::{Block, Position, Side};
pub use config::ExperimentRunConfig;
pub use error::ConfigError;
pub use stimulus::{CategoryId, Stimulus, StimulusCategory, StimulusId};
pub use trial::{Classification, Display, LEFT_KEY, RIGHT_KEY, ResponseRecord, side_for_key};
