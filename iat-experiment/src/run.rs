use iat_core::{Display, ExperimentRunConfig};
use iat_timing::Clock;
use tracing::{info, warn};

use crate::error::{SequencerError, SubmissionError};
use crate::selector::RandomSource;
use crate::state::{Effect, RunPhase, Sequencer};
use crate::submit::{Receipt, ResponseSink};

type Listener = Box<dyn FnMut() + Send>;

/// A live run wired to its collaborators.
///
/// The handle carries out the effects the sequencer cannot: it calls the
/// incorrect-response listener, tracks whether input is bound, and hands the
/// finished log to the sink exactly once.
pub struct Run<C, R, S>
where
    C: Clock,
    R: RandomSource,
    S: ResponseSink,
{
    sequencer: Sequencer<C, R>,
    sink: S,
    on_incorrect: Option<Listener>,
    input_bound: bool,
    submission: Option<Result<Receipt, SubmissionError>>,
}

/// Starts a run. Configuration problems surface here and nowhere later.
///
/// Returns the handle with the effects of entering the first trial, i.e. the
/// first display.
pub fn begin_run<C, R, S>(
    config: ExperimentRunConfig,
    clock: C,
    rng: R,
    sink: S,
) -> Result<(Run<C, R, S>, Vec<Effect>), SequencerError>
where
    C: Clock,
    R: RandomSource,
    S: ResponseSink,
{
    let (sequencer, effects) = Sequencer::begin(config, clock, rng)?;
    let mut run = Run {
        sequencer,
        sink,
        on_incorrect: None,
        input_bound: true,
        submission: None,
    };
    run.dispatch(&effects);
    Ok((run, effects))
}

impl<C, R, S> Run<C, R, S>
where
    C: Clock,
    R: RandomSource,
    S: ResponseSink,
{
    /// Registers a callback for incorrect answers. Only fires when the run
    /// checks answers with error notifications enabled.
    pub fn on_incorrect_response(&mut self, listener: impl FnMut() + Send + 'static) {
        self.on_incorrect = Some(Box::new(listener));
    }

    pub fn handle_input(&mut self, key: u32, at_ms: u64) -> Result<Vec<Effect>, SequencerError> {
        if !self.input_bound {
            return Ok(Vec::new());
        }
        let effects = self.sequencer.handle_input(key, at_ms)?;
        self.dispatch(&effects);
        Ok(effects)
    }

    pub fn cancel(&mut self) -> Vec<Effect> {
        let effects = self.sequencer.cancel();
        self.dispatch(&effects);
        effects
    }

    fn dispatch(&mut self, effects: &[Effect]) {
        for effect in effects {
            match effect {
                Effect::IncorrectResponse => {
                    if let Some(listener) = self.on_incorrect.as_mut() {
                        listener();
                    }
                }
                Effect::ReleaseInput => self.input_bound = false,
                Effect::Submit(run) => {
                    let outcome = self.sink.submit(run);
                    match &outcome {
                        Ok(receipt) => info!(message = %receipt.message, "responses submitted"),
                        Err(e) => warn!(
                            participant = %run.participant,
                            "response submission failed: {e}"
                        ),
                    }
                    self.submission = Some(outcome);
                }
                Effect::Display(_) | Effect::Recorded(_) => {}
            }
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.sequencer.phase()
    }

    pub fn display(&self) -> &Display {
        self.sequencer.display()
    }

    pub fn sequencer(&self) -> &Sequencer<C, R> {
        &self.sequencer
    }

    pub fn is_input_bound(&self) -> bool {
        self.input_bound
    }

    /// Outcome of handing the log to the sink, once the run has finished.
    /// A failure here is a reporting problem; the run itself stays finished.
    pub fn submission(&self) -> Option<&Result<Receipt, SubmissionError>> {
        self.submission.as_ref()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}
