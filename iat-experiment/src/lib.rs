pub mod classifier;
pub mod config;
pub mod error;
pub mod log;
pub mod run;
pub mod selector;
pub mod state;
pub mod submit;

pub use classifier::classify;
pub use config::{ExperimentDefinition, load_definition};
pub use error::{LoadError, SelectionError, SequencerError, SubmissionError};
pub use log::{CompletedRun, ResponseLog};
pub use run::{Run, begin_run};
pub use selector::{FixedDraws, RandomSource, select_stimulus};
pub use state::{Effect, RunPhase, RunState, Sequencer};
pub use submit::{JsonFileSink, MemorySink, Receipt, ResponseSink};
