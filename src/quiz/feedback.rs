/// Correctness feedback a screen fires when an answer is scored and clears
/// when it moves on to the next round or question.
pub trait Feedback {
    fn trigger_correct(&mut self, amount: u32);
    fn trigger_incorrect(&mut self);
    fn reset(&mut self);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FeedbackSignal {
    #[default]
    Idle,
    Correct { points: u32 },
    Incorrect,
}

/// Feedback owned by a single screen: the "+N" flash and the answer confetti.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameFeedback {
    signal: FeedbackSignal,
}

impl GameFeedback {
    #[cfg(test)]
    pub fn signal(&self) -> FeedbackSignal {
        self.signal
    }

    pub fn flash_points(&self) -> Option<u32> {
        match self.signal {
            FeedbackSignal::Correct { points } => Some(points),
            _ => None,
        }
    }

    pub fn show_answer_confetti(&self) -> bool {
        matches!(self.signal, FeedbackSignal::Correct { .. })
    }
}

impl Feedback for GameFeedback {
    fn trigger_correct(&mut self, amount: u32) {
        self.signal = FeedbackSignal::Correct { points: amount };
    }

    fn trigger_incorrect(&mut self) {
        self.signal = FeedbackSignal::Incorrect;
    }

    fn reset(&mut self) {
        self.signal = FeedbackSignal::Idle;
    }
}
