use iat_core::{Block, Classification, Stimulus, side_for_key};

/// Scores a raw key press against the stimulus on screen.
///
/// Keys other than the two arrows are `Ignored`. With answer checking off
/// every arrow press is `Correct`.
pub fn classify(key: u32, block: &Block, stimulus: &Stimulus, check_answers: bool) -> Classification {
    let Some(side) = side_for_key(key) else {
        return Classification::Ignored;
    };
    if !check_answers || block.accepts(side, stimulus.category) {
        Classification::Correct
    } else {
        Classification::Incorrect
    }
}
