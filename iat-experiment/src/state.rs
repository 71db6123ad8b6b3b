use iat_core::{
    Block, Classification, Display, ExperimentRunConfig, Position, ResponseRecord, Stimulus,
};
use iat_timing::Clock;
use tracing::{debug, info};

use crate::classifier::classify;
use crate::error::SequencerError;
use crate::log::{CompletedRun, ResponseLog};
use crate::selector::{RandomSource, select_stimulus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// Stimulus shown, awaiting the first answer.
    Presenting,
    /// A wrong answer was given; the same stimulus stays up until corrected.
    CorrectingError,
    Finished,
    Cancelled,
}

impl RunPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunPhase::Finished | RunPhase::Cancelled)
    }
}

/// Side effects of a transition, for the caller to carry out in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Display(Display),
    Recorded(ResponseRecord),
    IncorrectResponse,
    /// Input capture must be unbound; no further input will be accepted.
    ReleaseInput,
    Submit(CompletedRun),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Event {
    Input { key: u32, at_ms: u64 },
    Cancel,
}

/// Mutable state of a live run. Dropped once the run ends.
#[derive(Debug, Clone)]
pub struct RunState {
    pub block_index: usize,
    /// 1-based trial number within the current block.
    pub trial: u32,
    pub stimulus: Stimulus,
    pub fixing_error: bool,
    pub error_latency_ms: u64,
    pub displayed_at_ms: u64,
    pub begin_time_ms: u64,
    pub log: ResponseLog,
}

pub struct Sequencer<C, R>
where
    C: Clock,
    R: RandomSource,
{
    config: ExperimentRunConfig,
    clock: C,
    rng: R,
    phase: RunPhase,
    state: Option<RunState>,
    display: Display,
    counterbalanced: bool,
}

impl<C, R> Sequencer<C, R>
where
    C: Clock,
    R: RandomSource,
{
    /// Validates `config`, shows the first stimulus and enters `Presenting`.
    ///
    /// Returns the sequencer together with the initial display effect.
    pub fn begin(
        mut config: ExperimentRunConfig,
        clock: C,
        mut rng: R,
    ) -> Result<(Self, Vec<Effect>), SequencerError> {
        config.validate()?;

        let counterbalanced = config.can_balance() && rng.below(2) == 1;
        if counterbalanced {
            config.swap_balanced_blocks();
        }

        let mut sequencer = Self {
            config,
            clock,
            rng,
            phase: RunPhase::Presenting,
            state: None,
            display: Display::default(),
            counterbalanced,
        };

        let (stimulus, display) = sequencer.draw(0)?;
        let shown = sequencer.clock.now_ms();
        sequencer.state = Some(RunState {
            block_index: 0,
            trial: 1,
            stimulus,
            fixing_error: false,
            error_latency_ms: 0,
            displayed_at_ms: shown,
            begin_time_ms: shown,
            log: ResponseLog::default(),
        });
        sequencer.display = display.clone();

        info!(
            experiment = sequencer.config.experiment,
            participant = %sequencer.config.participant,
            blocks = sequencer.config.blocks.len(),
            trials = sequencer.config.total_trials(),
            counterbalanced,
            "run started"
        );

        Ok((sequencer, vec![Effect::Display(display)]))
    }

    /// Feeds one key press, stamped by the presentation layer.
    pub fn handle_input(&mut self, key: u32, at_ms: u64) -> Result<Vec<Effect>, SequencerError> {
        self.transition(Event::Input { key, at_ms })
    }

    /// Abandons the run: input is released, state is discarded, nothing is
    /// submitted.
    pub fn cancel(&mut self) -> Vec<Effect> {
        // Cancelling never draws a stimulus, so it cannot fail.
        self.transition(Event::Cancel).unwrap_or_default()
    }

    fn transition(&mut self, event: Event) -> Result<Vec<Effect>, SequencerError> {
        let mut effects = Vec::new();

        match (self.phase, event) {
            (phase, _) if phase.is_terminal() => {}

            (_, Event::Cancel) => {
                self.phase = RunPhase::Cancelled;
                self.state = None;
                effects.push(Effect::ReleaseInput);
                info!(participant = %self.config.participant, "run cancelled");
            }

            (phase, Event::Input { key, at_ms }) => {
                let Some(state) = self.state.as_mut() else {
                    return Ok(effects);
                };
                // A press older than the current display belongs to a
                // stimulus that has already been replaced.
                if at_ms < state.displayed_at_ms {
                    debug!(key, at_ms, shown = state.displayed_at_ms, "stale input dropped");
                    return Ok(effects);
                }

                let block = &self.config.blocks[state.block_index];
                match classify(key, block, &state.stimulus, self.config.check_answers) {
                    Classification::Ignored => {
                        debug!(key, "unrecognized key ignored");
                    }
                    Classification::Incorrect => {
                        if phase == RunPhase::Presenting {
                            state.error_latency_ms = at_ms - state.displayed_at_ms;
                            state.fixing_error = true;
                            self.phase = RunPhase::CorrectingError;
                            // Same stimulus and timestamp, re-announced for correction.
                            effects.push(Effect::Display(self.display.clone()));
                        }
                        debug!(
                            key,
                            stimulus = state.stimulus.id,
                            latency_ms = state.error_latency_ms,
                            "incorrect response"
                        );
                        if self.config.notifies_errors() {
                            effects.push(Effect::IncorrectResponse);
                        }
                    }
                    Classification::Correct => {
                        let response_time_ms = if state.fixing_error {
                            state.error_latency_ms
                        } else {
                            at_ms - state.displayed_at_ms
                        };
                        let record = ResponseRecord {
                            stimulus: state.stimulus.id,
                            response: key,
                            response_time_ms,
                            time_shown_ms: state.displayed_at_ms,
                        };
                        debug!(
                            block = state.block_index,
                            trial = state.trial,
                            stimulus = record.stimulus,
                            response_time_ms,
                            "response recorded"
                        );
                        state.log.append(record.clone());
                        state.fixing_error = false;
                        state.error_latency_ms = 0;
                        effects.push(Effect::Recorded(record));
                        self.advance(&mut effects)?;
                    }
                }
            }
        }

        Ok(effects)
    }

    /// Moves to the next trial, the next block, or the end of the run.
    fn advance(&mut self, effects: &mut Vec<Effect>) -> Result<(), SequencerError> {
        let Some(state) = self.state.as_mut() else {
            return Ok(());
        };

        state.trial += 1;
        if state.trial > self.config.blocks[state.block_index].trials {
            state.trial = 1;
            state.block_index += 1;
        }
        let block_index = state.block_index;

        if block_index >= self.config.blocks.len() {
            self.finish(effects);
            return Ok(());
        }

        let (stimulus, display) = self.draw(block_index)?;
        let shown = self.clock.now_ms();
        if let Some(state) = self.state.as_mut() {
            state.stimulus = stimulus;
            state.displayed_at_ms = shown;
        }
        self.phase = RunPhase::Presenting;
        self.display = display.clone();
        effects.push(Effect::Display(display));
        Ok(())
    }

    fn finish(&mut self, effects: &mut Vec<Effect>) {
        self.phase = RunPhase::Finished;
        effects.push(Effect::ReleaseInput);

        if let Some(state) = self.state.take() {
            info!(
                experiment = self.config.experiment,
                participant = %self.config.participant,
                responses = state.log.len(),
                "run finished"
            );
            effects.push(Effect::Submit(CompletedRun {
                experiment: self.config.experiment,
                participant: self.config.participant.clone(),
                begin_time_ms: state.begin_time_ms,
                counterbalanced: self.counterbalanced,
                responses: state.log,
            }));
        }
    }

    /// Picks a stimulus for `block_index` and builds its display.
    fn draw(&mut self, block_index: usize) -> Result<(Stimulus, Display), SequencerError> {
        let block = &self.config.blocks[block_index];
        let active = self.config.active_categories(block);
        let stimulus = select_stimulus(&active, &mut self.rng)
            .map_err(|source| SequencerError::Selection {
                block: block.id,
                source,
            })?
            .clone();

        let mut display = Display {
            word: stimulus.word.clone(),
            ..Display::default()
        };
        for position in Position::ALL {
            let label = block
                .category_at(position)
                .and_then(|id| self.config.category(id))
                .map(|c| c.name.clone());
            display.set_label(position, label);
        }

        Ok((stimulus, display))
    }

    /// Returns the current phase
    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Returns live run state; `None` once the run has ended
    pub fn state(&self) -> Option<&RunState> {
        self.state.as_ref()
    }

    /// Returns the most recent display
    pub fn display(&self) -> &Display {
        &self.display
    }

    pub fn config(&self) -> &ExperimentRunConfig {
        &self.config
    }

    pub fn current_block(&self) -> Option<&Block> {
        self.state
            .as_ref()
            .and_then(|s| self.config.blocks.get(s.block_index))
    }

    pub fn is_counterbalanced(&self) -> bool {
        self.counterbalanced
    }

    /// (block number, block count, trial number, trials in block), all 1-based
    pub fn progress(&self) -> Option<(usize, usize, u32, u32)> {
        let state = self.state.as_ref()?;
        let block = self.config.blocks.get(state.block_index)?;
        Some((
            state.block_index + 1,
            self.config.blocks.len(),
            state.trial,
            block.trials,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::FixedDraws;
    use iat_core::{LEFT_KEY, RIGHT_KEY, StimulusCategory};
    use iat_timing::ManualClock;

    fn config(trials: u32) -> ExperimentRunConfig {
        ExperimentRunConfig::new(3, "p-7")
            .with_category(StimulusCategory::new(1, "Flowers").with_word(10, "rose"))
            .with_category(StimulusCategory::new(2, "Insects").with_word(20, "wasp"))
            .with_block(
                Block::new(1, trials, "flowers vs insects")
                    .with(Position::LeftTop, 1)
                    .with(Position::RightTop, 2),
            )
            .checking(true, true)
    }

    fn start(
        config: ExperimentRunConfig,
        draws: Vec<usize>,
    ) -> (Sequencer<ManualClock, FixedDraws>, ManualClock, Vec<Effect>) {
        let clock = ManualClock::new(1_000);
        let (seq, effects) =
            Sequencer::begin(config, clock.clone(), FixedDraws::new(draws)).unwrap();
        (seq, clock, effects)
    }

    #[test]
    fn begin_emits_first_display_and_stamps_start() {
        let (seq, _, effects) = start(config(2), vec![0]);
        assert_eq!(seq.phase(), RunPhase::Presenting);
        let state = seq.state().unwrap();
        assert_eq!(state.trial, 1);
        assert_eq!(state.begin_time_ms, 1_000);
        assert_eq!(state.displayed_at_ms, 1_000);
        match &effects[..] {
            [Effect::Display(d)] => {
                assert_eq!(d.word, "rose");
                assert_eq!(d.left_top.as_deref(), Some("Flowers"));
                assert_eq!(d.right_top.as_deref(), Some("Insects"));
                assert_eq!(d.left_bottom, None);
            }
            other => panic!("unexpected effects {other:?}"),
        }
    }

    #[test]
    fn invalid_config_fails_to_begin() {
        let mut bad = config(2);
        bad.blocks[0].trials = 0;
        let result = Sequencer::begin(bad, ManualClock::new(0), FixedDraws::new([0]));
        assert!(matches!(result, Err(SequencerError::Config(_))));
    }

    #[test]
    fn incorrect_answer_enters_correction_and_notifies() {
        let (mut seq, clock, _) = start(config(1), vec![0]);
        let shown = seq.display().clone();
        let effects = seq.handle_input(RIGHT_KEY, clock.advance(200)).unwrap();
        assert_eq!(effects, vec![Effect::Display(shown), Effect::IncorrectResponse]);
        assert_eq!(seq.phase(), RunPhase::CorrectingError);
        let state = seq.state().unwrap();
        assert!(state.fixing_error);
        assert_eq!(state.error_latency_ms, 200);
        assert_eq!(state.displayed_at_ms, 1_000);
        assert!(state.log.is_empty());
    }

    #[test]
    fn repeated_error_only_notifies() {
        let (mut seq, clock, _) = start(config(1), vec![0]);
        seq.handle_input(RIGHT_KEY, clock.advance(200)).unwrap();
        let effects = seq.handle_input(RIGHT_KEY, clock.advance(200)).unwrap();
        assert_eq!(effects, vec![Effect::IncorrectResponse]);
        assert_eq!(seq.phase(), RunPhase::CorrectingError);
    }

    #[test]
    fn repeated_errors_keep_first_latency() {
        let (mut seq, clock, _) = start(config(1), vec![0]);
        seq.handle_input(RIGHT_KEY, clock.advance(200)).unwrap();
        seq.handle_input(RIGHT_KEY, clock.advance(400)).unwrap();
        assert_eq!(seq.state().unwrap().error_latency_ms, 200);
        let effects = seq.handle_input(LEFT_KEY, clock.advance(300)).unwrap();
        let recorded: Vec<u64> = effects
            .iter()
            .filter_map(|e| match e {
                Effect::Recorded(r) => Some(r.response_time_ms),
                _ => None,
            })
            .collect();
        assert_eq!(recorded, vec![200]);
    }

    #[test]
    fn notifications_off_still_corrects() {
        let (mut seq, clock, _) = start(config(1).checking(true, false), vec![0]);
        let effects = seq.handle_input(RIGHT_KEY, clock.advance(150)).unwrap();
        assert!(matches!(&effects[..], [Effect::Display(d)] if d.word == "rose"));
        assert_eq!(seq.phase(), RunPhase::CorrectingError);
    }

    #[test]
    fn stale_input_is_dropped() {
        let (mut seq, clock, _) = start(config(2), vec![0, 1]);
        seq.handle_input(LEFT_KEY, clock.advance(300)).unwrap();
        // Pressed before the second stimulus went up.
        let effects = seq.handle_input(RIGHT_KEY, 1_100).unwrap();
        assert!(effects.is_empty());
        assert_eq!(seq.state().unwrap().log.len(), 1);
        assert_eq!(seq.state().unwrap().trial, 2);
    }

    #[test]
    fn last_answer_finishes_and_submits() {
        let (mut seq, clock, _) = start(config(1), vec![0]);
        let effects = seq.handle_input(LEFT_KEY, clock.advance(420)).unwrap();
        assert_eq!(seq.phase(), RunPhase::Finished);
        assert!(seq.state().is_none());
        assert!(matches!(effects[0], Effect::Recorded(_)));
        assert_eq!(effects[1], Effect::ReleaseInput);
        match &effects[2] {
            Effect::Submit(run) => {
                assert_eq!(run.participant, "p-7");
                assert_eq!(run.experiment, 3);
                assert_eq!(run.begin_time_ms, 1_000);
                assert_eq!(run.responses.len(), 1);
                assert_eq!(run.responses.records()[0].response_time_ms, 420);
            }
            other => panic!("expected submission, got {other:?}"),
        }
    }

    #[test]
    fn finished_run_ignores_further_input() {
        let (mut seq, clock, _) = start(config(1), vec![0]);
        seq.handle_input(LEFT_KEY, clock.advance(100)).unwrap();
        let effects = seq.handle_input(LEFT_KEY, clock.advance(100)).unwrap();
        assert!(effects.is_empty());
        assert!(seq.cancel().is_empty());
        assert_eq!(seq.phase(), RunPhase::Finished);
    }

    #[test]
    fn cancel_releases_input_without_submitting() {
        let (mut seq, clock, _) = start(config(3), vec![0]);
        seq.handle_input(LEFT_KEY, clock.advance(100)).unwrap();
        let effects = seq.cancel();
        assert_eq!(effects, vec![Effect::ReleaseInput]);
        assert_eq!(seq.phase(), RunPhase::Cancelled);
        assert!(seq.state().is_none());
        assert!(seq.handle_input(LEFT_KEY, clock.advance(100)).unwrap().is_empty());
    }

    #[test]
    fn progress_rolls_over_blocks() {
        let cfg = config(2).with_block(
            Block::new(2, 1, "reversed")
                .with(Position::LeftTop, 2)
                .with(Position::RightTop, 1),
        );
        // rose, rose, wasp
        let (mut seq, clock, _) = start(cfg, vec![0, 0, 0]);
        assert_eq!(seq.progress(), Some((1, 2, 1, 2)));
        seq.handle_input(LEFT_KEY, clock.advance(100)).unwrap();
        assert_eq!(seq.progress(), Some((1, 2, 2, 2)));
        seq.handle_input(LEFT_KEY, clock.advance(100)).unwrap();
        assert_eq!(seq.progress(), Some((2, 2, 1, 1)));
        assert_eq!(seq.display().left_top.as_deref(), Some("Insects"));
        assert_eq!(seq.display().word, "wasp");
    }
}
