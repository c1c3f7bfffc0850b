//! Notifications raised by players
//!
//! Players never call back into user code. Transitions are queued on the
//! player and drained by the caller on its own thread, typically right
//! after `update`.

use crate::player::PlaybackState;

/// Something observable happened to a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerEvent {
    /// The player entered a new state
    StateChanged(PlaybackState),
    /// A `play` call started a new channel
    PlaybackStarted,
    /// A song finished, either naturally or through `stop`
    SongEnded,
}

impl PlayerEvent {
    /// State carried by a `StateChanged` event.
    pub fn state(&self) -> Option<PlaybackState> {
        match self {
            PlayerEvent::StateChanged(state) => Some(*state),
            _ => None,
        }
    }
}
