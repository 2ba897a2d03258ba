//! Stall detection for outstanding submissions.
//!
//! The monitor is a pure state machine over the heartbeat observed by each
//! drain tick. It decides when to ask the user and what their answer means;
//! the session manager carries out the restart.
//!
//! ```text
//!            heartbeat set                age >= threshold
//!   Idle ─────────────────────▶ Armed ───────────────────▶ Prompting
//!    ▲                            ▲                          │   │
//!    │                            │ cool-down over           │   │ terminate
//!    │                            └──────── Snoozed ◀────────┘   │ (restart)
//!    │                                 keep waiting              │
//!    └────────────────── heartbeat cleared / restart ◀───────────┘
//! ```

use std::time::{Duration, Instant};

use crate::host::StallPrompt;

/// The user's answer to the stall prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptAnswer {
    /// Abort the running code and start a fresh session.
    Terminate,
    /// Let it run; ask again after another threshold period.
    KeepWaiting,
}

/// What a monitor tick decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StallAction {
    /// Nothing to do.
    #[default]
    None,
    /// The prompt was opened and awaits an answer.
    Prompted {
        /// Heartbeat age when the prompt opened.
        elapsed: Duration,
    },
    /// The user asked to wait; the prompt will not reopen before `until`.
    Snoozed {
        /// End of the cool-down.
        until: Instant,
    },
    /// The user confirmed; the session must be restarted.
    Restart {
        /// Heartbeat age when the answer arrived.
        elapsed: Duration,
    },
    /// The submission finished while the prompt was open.
    Recovered,
}

/// Observable state of the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StallState {
    Idle,
    Armed,
    Prompting,
    Snoozed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Armed { since: Instant },
    Prompting { since: Instant },
    Snoozed { since: Instant, until: Instant },
}

/// Heartbeat watchdog driven by the drain tick.
#[derive(Debug, Clone)]
pub struct StallMonitor {
    threshold: Duration,
    phase: Phase,
}

impl StallMonitor {
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            phase: Phase::Idle,
        }
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    pub fn state(&self) -> StallState {
        match self.phase {
            Phase::Idle => StallState::Idle,
            Phase::Armed { .. } => StallState::Armed,
            Phase::Prompting { .. } => StallState::Prompting,
            Phase::Snoozed { .. } => StallState::Snoozed,
        }
    }

    /// Forget any outstanding stall; used after a restart.
    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
    }

    /// Advance the monitor with the heartbeat observed at `now`.
    pub fn tick(&mut self, now: Instant, heartbeat: Option<Instant>, prompt: &mut dyn StallPrompt) -> StallAction {
        let Some(since) = heartbeat else {
            return self.settle(prompt);
        };

        // A different heartbeat means the submission being watched finished
        // and a newer one is outstanding.
        if self.watched() != Some(since) {
            let was_prompting = matches!(self.phase, Phase::Prompting { .. });
            if was_prompting {
                prompt.dismiss();
            }
            self.phase = Phase::Armed { since };
        }

        let elapsed = now.saturating_duration_since(since);
        match self.phase {
            Phase::Idle => StallAction::None,
            Phase::Armed { since } => self.check_age(since, elapsed, now, prompt),
            Phase::Prompting { since } => match prompt.poll() {
                Some(answer) => self.answer(answer, since, elapsed, now),
                None => StallAction::None,
            },
            Phase::Snoozed { since, until } => {
                if now < until {
                    return StallAction::None;
                }
                self.phase = Phase::Armed { since };
                self.check_age(since, elapsed, now, prompt)
            }
        }
    }

    fn watched(&self) -> Option<Instant> {
        match self.phase {
            Phase::Idle => None,
            Phase::Armed { since } | Phase::Prompting { since } | Phase::Snoozed { since, .. } => Some(since),
        }
    }

    fn settle(&mut self, prompt: &mut dyn StallPrompt) -> StallAction {
        let previous = std::mem::replace(&mut self.phase, Phase::Idle);
        match previous {
            Phase::Prompting { .. } => {
                tracing::info!("Stalled submission finished while prompting");
                prompt.dismiss();
                StallAction::Recovered
            }
            _ => StallAction::None,
        }
    }

    fn check_age(&mut self, since: Instant, elapsed: Duration, now: Instant, prompt: &mut dyn StallPrompt) -> StallAction {
        if elapsed < self.threshold {
            return StallAction::None;
        }

        tracing::warn!(
            elapsed_secs = elapsed.as_secs(),
            threshold_secs = self.threshold.as_secs(),
            "Submission still running, asking whether to terminate"
        );
        self.phase = Phase::Prompting { since };
        match prompt.open(elapsed) {
            Some(answer) => self.answer(answer, since, elapsed, now),
            None => StallAction::Prompted { elapsed },
        }
    }

    fn answer(&mut self, answer: PromptAnswer, since: Instant, elapsed: Duration, now: Instant) -> StallAction {
        match answer {
            PromptAnswer::Terminate => {
                tracing::warn!(elapsed_secs = elapsed.as_secs(), "Terminating stalled submission");
                self.phase = Phase::Idle;
                StallAction::Restart { elapsed }
            }
            PromptAnswer::KeepWaiting => {
                let until = now + self.threshold;
                tracing::info!(elapsed_secs = elapsed.as_secs(), "Keeping stalled submission alive");
                self.phase = Phase::Snoozed { since, until };
                StallAction::Snoozed { until }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;

    /// Prompt with scripted answers for `open` and `poll`.
    #[derive(Default)]
    struct FakePrompt {
        on_open: Option<PromptAnswer>,
        polls: VecDeque<Option<PromptAnswer>>,
        opened: usize,
        dismissed: usize,
    }

    impl StallPrompt for FakePrompt {
        fn open(&mut self, _elapsed: Duration) -> Option<PromptAnswer> {
            self.opened += 1;
            self.on_open
        }

        fn poll(&mut self) -> Option<PromptAnswer> {
            self.polls.pop_front().flatten()
        }

        fn dismiss(&mut self) {
            self.dismissed += 1;
        }
    }

    const THRESHOLD: Duration = Duration::from_secs(30);

    #[test]
    fn test_idle_without_heartbeat() {
        let mut monitor = StallMonitor::new(THRESHOLD);
        let mut prompt = FakePrompt::default();

        assert_eq!(monitor.tick(Instant::now(), None, &mut prompt), StallAction::None);
        assert_eq!(monitor.state(), StallState::Idle);
        assert_eq!(prompt.opened, 0);
    }

    #[test]
    fn test_armed_below_threshold() {
        let mut monitor = StallMonitor::new(THRESHOLD);
        let mut prompt = FakePrompt::default();
        let start = Instant::now();

        let action = monitor.tick(start + Duration::from_secs(29), Some(start), &mut prompt);
        assert_eq!(action, StallAction::None);
        assert_eq!(monitor.state(), StallState::Armed);
        assert_eq!(prompt.opened, 0);
    }

    #[test]
    fn test_modal_confirmation_restarts() {
        let mut monitor = StallMonitor::new(THRESHOLD);
        let mut prompt = FakePrompt {
            on_open: Some(PromptAnswer::Terminate),
            ..FakePrompt::default()
        };
        let start = Instant::now();

        let action = monitor.tick(start + THRESHOLD, Some(start), &mut prompt);
        assert_eq!(action, StallAction::Restart { elapsed: THRESHOLD });
        assert_eq!(monitor.state(), StallState::Idle);
    }

    #[test]
    fn test_prompt_opens_once_and_is_polled() {
        let mut monitor = StallMonitor::new(THRESHOLD);
        let mut prompt = FakePrompt {
            polls: VecDeque::from([None, None, Some(PromptAnswer::Terminate)]),
            ..FakePrompt::default()
        };
        let start = Instant::now();

        let first = monitor.tick(start + THRESHOLD, Some(start), &mut prompt);
        assert_eq!(first, StallAction::Prompted { elapsed: THRESHOLD });

        for offset in 1..=2 {
            let tick = start + THRESHOLD + Duration::from_millis(50 * offset);
            assert_eq!(monitor.tick(tick, Some(start), &mut prompt), StallAction::None);
        }
        let late = start + THRESHOLD + Duration::from_millis(150);
        assert!(matches!(
            monitor.tick(late, Some(start), &mut prompt),
            StallAction::Restart { .. }
        ));
        assert_eq!(prompt.opened, 1);
    }

    #[test]
    fn test_decline_snoozes_for_one_threshold() {
        let mut monitor = StallMonitor::new(THRESHOLD);
        let mut prompt = FakePrompt {
            on_open: Some(PromptAnswer::KeepWaiting),
            ..FakePrompt::default()
        };
        let start = Instant::now();
        let asked = start + THRESHOLD;

        let action = monitor.tick(asked, Some(start), &mut prompt);
        assert_eq!(action, StallAction::Snoozed { until: asked + THRESHOLD });
        assert_eq!(monitor.state(), StallState::Snoozed);

        let during = asked + THRESHOLD - Duration::from_millis(1);
        assert_eq!(monitor.tick(during, Some(start), &mut prompt), StallAction::None);
        assert_eq!(prompt.opened, 1);

        monitor.tick(asked + THRESHOLD, Some(start), &mut prompt);
        assert_eq!(prompt.opened, 2);
    }

    #[test]
    fn test_completion_while_prompting_recovers() {
        let mut monitor = StallMonitor::new(THRESHOLD);
        let mut prompt = FakePrompt {
            polls: VecDeque::from([None, Some(PromptAnswer::Terminate)]),
            ..FakePrompt::default()
        };
        let start = Instant::now();

        monitor.tick(start + THRESHOLD, Some(start), &mut prompt);
        assert_eq!(monitor.state(), StallState::Prompting);

        let action = monitor.tick(start + THRESHOLD, None, &mut prompt);
        assert_eq!(action, StallAction::Recovered);
        assert_eq!(prompt.dismissed, 1);

        // A late answer has nothing left to act on.
        assert_eq!(monitor.tick(start + THRESHOLD, None, &mut prompt), StallAction::None);
    }

    #[test]
    fn test_newer_heartbeat_rearms() {
        let mut monitor = StallMonitor::new(THRESHOLD);
        let mut prompt = FakePrompt::default();
        let first = Instant::now();

        monitor.tick(first + THRESHOLD, Some(first), &mut prompt);
        assert_eq!(monitor.state(), StallState::Prompting);

        let second = first + THRESHOLD + Duration::from_secs(1);
        let action = monitor.tick(second, Some(second), &mut prompt);
        assert_eq!(action, StallAction::None);
        assert_eq!(monitor.state(), StallState::Armed);
        assert_eq!(prompt.dismissed, 1);
    }

    #[test]
    fn test_heartbeat_from_the_future_is_not_stalled() {
        let mut monitor = StallMonitor::new(THRESHOLD);
        let mut prompt = FakePrompt::default();
        let now = Instant::now();

        let action = monitor.tick(now, Some(now + Duration::from_secs(5)), &mut prompt);
        assert_eq!(action, StallAction::None);
    }
}
