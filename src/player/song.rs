use std::sync::Arc;

use crate::backend::AudioBackend;
use crate::events::PlayerEvent;
use crate::resource::Song;
use crate::settings::{OutputSettings, SoundCategory};
use crate::Result;

use super::{ChannelPlayer, PlayParams};

/// Player for streamed songs.
///
/// Songs play on stream channels and raise [`PlayerEvent::SongEnded`] when
/// they finish or are stopped.
#[derive(Debug)]
pub struct SongPlayer<B: AudioBackend> {
    player: ChannelPlayer<B>,
}

impl<B: AudioBackend> SongPlayer<B> {
    /// Create a stopped song player.
    pub fn new(backend: Arc<B>, settings: Arc<OutputSettings>) -> Self {
        Self {
            player: ChannelPlayer::new(backend, settings, SoundCategory::Song),
        }
    }

    /// Start playing `song`, replacing whatever was playing.
    pub fn play(&mut self, song: &Song<B>, params: PlayParams) -> Result<bool> {
        self.player.play(song, params)
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

delegate_playback_control!(SongPlayer);
