//! Player state machine.
//!
//! The state lives in an `AtomicU8`. The capture and tick threads read it
//! freely; it only changes through the transition methods below, and
//! entering `Learning` is a compare-and-set so at most one improvisation
//! runs at a time.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum PlayerState {
    /// Built but not started.
    #[default]
    Idle = 0,
    /// Capturing and emitting; ready to improvise.
    Listening = 1,
    /// Rebuilding the model from history.
    Learning = 2,
    /// Producing a lick from the learned model.
    Generating = 3,
}

impl PlayerState {
    fn from_u8(val: u8) -> Self {
        match val {
            1 => PlayerState::Listening,
            2 => PlayerState::Learning,
            3 => PlayerState::Generating,
            _ => PlayerState::Idle,
        }
    }

    /// Whether an improvisation pass is in flight.
    pub fn is_improvising(self) -> bool {
        matches!(self, PlayerState::Learning | PlayerState::Generating)
    }
}

#[derive(Debug, Default)]
pub(crate) struct StateMachine {
    state: AtomicU8,
    learned: AtomicBool,
}

impl StateMachine {
    pub(crate) fn get(&self) -> PlayerState {
        PlayerState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn has_learned(&self) -> bool {
        self.learned.load(Ordering::Acquire)
    }

    /// Idle → Listening. Leaves any other state alone.
    pub(crate) fn start_listening(&self) {
        let _ = self.state.compare_exchange(
            PlayerState::Idle as u8,
            PlayerState::Listening as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// Listening → Idle, unless an improvisation is still running.
    pub(crate) fn stop_listening(&self) {
        let _ = self.state.compare_exchange(
            PlayerState::Listening as u8,
            PlayerState::Idle as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// Enters `Learning` from `Idle` or `Listening`. Returns the state to
    /// restore afterwards, or `None` if a pass is already in flight.
    pub(crate) fn begin_improvisation(&self) -> Option<PlayerState> {
        self.begin(PlayerState::Learning)
    }

    /// Enters `Generating` directly, for a lick from an already learned model.
    pub(crate) fn begin_generation(&self) -> Option<PlayerState> {
        self.begin(PlayerState::Generating)
    }

    fn begin(&self, target: PlayerState) -> Option<PlayerState> {
        [PlayerState::Listening, PlayerState::Idle]
            .into_iter()
            .find(|from| {
                self.state
                    .compare_exchange(
                        *from as u8,
                        target as u8,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    )
                    .is_ok()
            })
    }

    /// Learning → Generating. Records that a model is available.
    pub(crate) fn learned(&self) {
        self.learned.store(true, Ordering::Release);
        let _ = self.state.compare_exchange(
            PlayerState::Learning as u8,
            PlayerState::Generating as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// Marks a model as available without a learn pass, for an injected
    /// improviser that was trained beforehand.
    pub(crate) fn assume_learned(&self) {
        self.learned.store(true, Ordering::Release);
    }

    pub(crate) fn end_improvisation(&self, resume: PlayerState) {
        self.state.store(resume as u8, Ordering::Release);
    }
}
