use std::sync::Arc;

use crate::backend::AudioBackend;
use crate::events::PlayerEvent;
use crate::resource::SoundEffect;
use crate::settings::{OutputSettings, SoundCategory};
use crate::Result;

use super::{ChannelPlayer, PlayParams};

/// Player for sample-based sound effects that need to be controlled while
/// they play.
///
/// For one-shots use [`SoundEffect::play`] instead.
#[derive(Debug)]
pub struct SoundEffectPlayer<B: AudioBackend> {
    player: ChannelPlayer<B>,
}

impl<B: AudioBackend> SoundEffectPlayer<B> {
    /// Create a stopped sound effect player.
    pub fn new(backend: Arc<B>, settings: Arc<OutputSettings>) -> Self {
        Self {
            player: ChannelPlayer::new(backend, settings, SoundCategory::SoundEffect),
        }
    }

    /// Start playing `effect`, replacing whatever was playing.
    pub fn play(&mut self, effect: &SoundEffect<B>, params: PlayParams) -> Result<bool> {
        self.player.play(effect, params)
    }

    /// Take every queued event.
    pub fn drain_events(&mut self) -> impl Iterator<Item = PlayerEvent> + '_ {
        self.player.drain_events()
    }

    /// Underlying channel player.
    pub fn channel_player(&self) -> &ChannelPlayer<B> {
        &self.player
    }
}

delegate_playback_control!(SoundEffectPlayer);
