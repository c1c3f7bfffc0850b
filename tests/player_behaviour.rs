//! Behaviour of song and sound effect players on the software mixer.

use std::sync::Arc;
use std::time::Duration;

use approx::assert_relative_eq;
use parking_lot::Mutex;
use sedulous_audio::{
    AudioBackend, AudioConfig, AudioError, AudioSubsystem, ChannelActivity, ChannelAttribute,
    ChannelFlags, ChannelHandle, ClipData, DeviceId, NativeError, NativeResult, PlayParams,
    PlaybackControl, PlaybackState, PlayerEvent, SlideParameter, SoftwareMixer, SourceHandle,
    SyncContext, SyncHandle, SyncProc, SyncTrigger,
};

const RATE: u32 = 1_000;

fn subsystem(max_channels: usize) -> AudioSubsystem<SoftwareMixer> {
    AudioSubsystem::software(
        AudioConfig::default()
            .sample_rate(RATE)
            .max_channels(max_channels),
    )
    .unwrap()
}

fn tone(seconds: u64) -> ClipData {
    ClipData::new(vec![0.25; (seconds * RATE as u64) as usize], RATE, 1).unwrap()
}

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

fn events(player: &mut dyn PlaybackControl) -> Vec<PlayerEvent> {
    std::iter::from_fn(|| player.poll_event()).collect()
}

#[test]
fn play_clamps_parameters() {
    let audio = subsystem(4);
    let song = audio.load_song(tone(2)).unwrap();
    let mut player = audio.create_song_player();

    assert!(player
        .play(&song, PlayParams::default().volume(1.5).pitch(-4.0).pan(9.0))
        .unwrap());
    assert_eq!(player.volume(), 1.0);
    assert_eq!(player.pitch(), -1.0);
    assert_eq!(player.pan(), 1.0);
    assert_eq!(player.state().unwrap(), PlaybackState::Playing);
    assert!(!player.is_looping().unwrap());

    player.set_volume(-3.0).unwrap();
    player.set_pitch(2.0).unwrap();
    player.set_pan(-2.0).unwrap();
    assert_eq!(player.volume(), 0.0);
    assert_eq!(player.pitch(), 1.0);
    assert_eq!(player.pan(), -1.0);

    let channel = player.channel_player().channel().unwrap();
    assert_eq!(
        audio
            .backend()
            .attribute(channel, ChannelAttribute::Pitch)
            .unwrap(),
        1.0
    );
}

#[test]
fn repeated_stop_notifies_once() {
    let audio = subsystem(4);
    let song = audio.load_song(tone(2)).unwrap();
    let mut player = audio.create_song_player();
    player.play(&song, PlayParams::default()).unwrap();
    events(&mut player);

    assert!(player.stop().unwrap());
    assert!(!player.stop().unwrap());
    assert!(!player.stop().unwrap());
    assert_eq!(
        events(&mut player),
        vec![
            PlayerEvent::StateChanged(PlaybackState::Stopped),
            PlayerEvent::SongEnded
        ]
    );
    assert_eq!(audio.backend().channel_count(), 0);
}

#[test]
fn zero_length_loop_is_rejected_before_allocation() {
    let audio = subsystem(4);
    let effect = audio.load_sound_effect(tone(4)).unwrap();
    let mut player = audio.create_sound_effect_player();

    let err = player
        .play(
            &effect,
            PlayParams::default().loop_region(Duration::from_secs(2), Some(Duration::ZERO)),
        )
        .unwrap_err();
    assert!(matches!(err, AudioError::InvalidArgument(_)));
    assert_eq!(player.state().unwrap(), PlaybackState::Stopped);
    assert_eq!(audio.backend().channel_count(), 0);
    assert!(events(&mut player).is_empty());
}

#[test]
fn volume_slide_reaches_target_exactly() {
    let audio = subsystem(4);
    let song = audio.load_song(tone(4)).unwrap();
    let mut player = audio.create_song_player();
    player.play(&song, PlayParams::default().volume(0.2)).unwrap();

    player.slide_volume(0.8, ms(1_000)).unwrap();
    player.update(ms(500)).unwrap();
    assert_relative_eq!(player.volume(), 0.5, epsilon = 1e-6);
    assert!(player.is_sliding(SlideParameter::Volume));

    player.update(ms(250)).unwrap();
    player.update(ms(250)).unwrap();
    assert_eq!(player.volume(), 0.8);
    assert!(!player.is_sliding(SlideParameter::Volume));

    let channel = player.channel_player().channel().unwrap();
    assert_relative_eq!(
        audio
            .backend()
            .attribute(channel, ChannelAttribute::Volume)
            .unwrap(),
        0.8
    );
}

#[test]
fn zero_duration_slide_completes_on_next_update() {
    let audio = subsystem(4);
    let song = audio.load_song(tone(4)).unwrap();
    let mut player = audio.create_song_player();
    player.play(&song, PlayParams::default()).unwrap();

    player.slide_pan(-0.5, Duration::ZERO).unwrap();
    assert_eq!(player.pan(), 0.0);
    player.update(ms(16)).unwrap();
    assert_eq!(player.pan(), -0.5);
    assert!(!player.is_sliding(SlideParameter::Pan));
}

#[test]
fn direct_set_cancels_slide() {
    let audio = subsystem(4);
    let song = audio.load_song(tone(4)).unwrap();
    let mut player = audio.create_song_player();
    player.play(&song, PlayParams::default()).unwrap();

    player.slide_volume(0.0, ms(1_000)).unwrap();
    player.update(ms(100)).unwrap();
    player.set_volume(0.3).unwrap();
    assert!(!player.is_sliding(SlideParameter::Volume));

    player.update(ms(500)).unwrap();
    player.update(ms(500)).unwrap();
    assert_eq!(player.volume(), 0.3);
}

#[test]
fn slides_run_in_parallel() {
    let audio = subsystem(4);
    let song = audio.load_song(tone(4)).unwrap();
    let mut player = audio.create_song_player();
    player.play(&song, PlayParams::default()).unwrap();

    player.slide_pitch(1.0, ms(200)).unwrap();
    player.slide_pan(1.0, ms(400)).unwrap();
    player.update(ms(200)).unwrap();
    assert_eq!(player.pitch(), 1.0);
    assert_relative_eq!(player.pan(), 0.5, epsilon = 1e-6);
}

#[test]
fn invalidated_handle_during_slide_stops_quietly() {
    let audio = subsystem(4);
    let song = audio.load_song(tone(4)).unwrap();
    let mut player = audio.create_song_player();
    player.play(&song, PlayParams::default()).unwrap();
    player.slide_volume(0.0, ms(1_000)).unwrap();
    events(&mut player);

    audio.backend().lose_device();
    player.update(ms(100)).unwrap();
    assert_eq!(player.state().unwrap(), PlaybackState::Stopped);
    assert!(!player.is_sliding(SlideParameter::Volume));
    assert_eq!(
        events(&mut player),
        vec![PlayerEvent::StateChanged(PlaybackState::Stopped)]
    );

    // Stopped now, so setters are refused and stop has nothing to do.
    assert!(matches!(
        player.set_volume(0.5),
        Err(AudioError::InvalidOperation(_))
    ));
    assert!(!player.stop().unwrap());
}

#[test]
fn transport_round_trip_notifies_each_transition() {
    let audio = subsystem(4);
    let effect = audio.load_sound_effect(tone(4)).unwrap();
    let mut player = audio.create_sound_effect_player();

    assert_eq!(player.state().unwrap(), PlaybackState::Stopped);
    assert!(player.play(&effect, PlayParams::default()).unwrap());
    assert_eq!(player.state().unwrap(), PlaybackState::Playing);
    assert!(player.pause().unwrap());
    assert_eq!(player.state().unwrap(), PlaybackState::Paused);
    assert!(!player.pause().unwrap());
    assert!(player.resume().unwrap());
    assert_eq!(player.state().unwrap(), PlaybackState::Playing);
    assert!(!player.resume().unwrap());
    assert!(player.stop().unwrap());
    assert_eq!(player.state().unwrap(), PlaybackState::Stopped);

    let states: Vec<_> = events(&mut player)
        .iter()
        .filter_map(PlayerEvent::state)
        .collect();
    assert_eq!(
        states,
        vec![
            PlaybackState::Playing,
            PlaybackState::Paused,
            PlaybackState::Playing,
            PlaybackState::Stopped
        ]
    );
}

#[test]
fn sound_effect_stop_does_not_report_song_end() {
    let audio = subsystem(4);
    let effect = audio.load_sound_effect(tone(1)).unwrap();
    let mut player = audio.create_sound_effect_player();
    player.play(&effect, PlayParams::default()).unwrap();
    player.stop().unwrap();
    assert!(!events(&mut player).contains(&PlayerEvent::SongEnded));
}

#[test]
fn loud_song_scenario() {
    let audio = subsystem(4);
    let song = audio.load_song(tone(3)).unwrap();
    let mut player = audio.create_song_player();

    player
        .play(&song, PlayParams::default().volume(1.5).looping(false))
        .unwrap();
    assert_eq!(player.volume(), 1.0);
    assert_eq!(player.state().unwrap(), PlaybackState::Playing);
    assert!(!player.is_looping().unwrap());
    assert_eq!(
        events(&mut player),
        vec![
            PlayerEvent::StateChanged(PlaybackState::Playing),
            PlayerEvent::PlaybackStarted
        ]
    );
}

#[test]
fn loop_region_seeks_back_to_start() {
    let audio = subsystem(4);
    let effect = audio.load_sound_effect(tone(10)).unwrap();
    let mut player = audio.create_sound_effect_player();
    player
        .play(
            &effect,
            PlayParams::default().loop_region(Duration::from_secs(2), Some(Duration::from_secs(3))),
        )
        .unwrap();
    assert!(player.is_looping().unwrap());

    audio.backend().advance(Duration::from_secs(5));
    assert_relative_eq!(player.position().unwrap().as_secs_f64(), 2.0, epsilon = 0.01);

    audio.backend().advance(Duration::from_millis(1_500));
    assert_relative_eq!(player.position().unwrap().as_secs_f64(), 3.5, epsilon = 0.01);
    player.update(ms(16)).unwrap();
    assert_eq!(player.state().unwrap(), PlaybackState::Playing);
}

#[test]
fn disabling_loop_lets_region_play_out() {
    let audio = subsystem(4);
    let song = audio.load_song(tone(4)).unwrap();
    let mut player = audio.create_song_player();
    player
        .play(
            &song,
            PlayParams::default().loop_region(Duration::from_secs(1), Some(Duration::from_secs(1))),
        )
        .unwrap();
    events(&mut player);

    player.set_looping(false).unwrap();
    assert!(!player.is_looping().unwrap());

    audio.backend().advance(Duration::from_secs(5));
    player.update(ms(16)).unwrap();
    assert_eq!(player.state().unwrap(), PlaybackState::Stopped);
    assert_eq!(
        events(&mut player),
        vec![
            PlayerEvent::StateChanged(PlaybackState::Stopped),
            PlayerEvent::SongEnded
        ]
    );
}

#[test]
fn whole_clip_loop_never_ends() {
    let audio = subsystem(4);
    let song = audio.load_song(tone(1)).unwrap();
    let mut player = audio.create_song_player();
    player.play(&song, PlayParams::default().looping(true)).unwrap();

    audio.backend().advance(Duration::from_millis(2_500));
    player.update(ms(16)).unwrap();
    assert!(player.is_playing().unwrap());
    assert_relative_eq!(player.position().unwrap().as_secs_f64(), 0.5, epsilon = 0.01);
}

#[test]
fn natural_end_is_reported_on_update() {
    let audio = subsystem(4);
    let song = audio.load_song(tone(1)).unwrap();
    let mut player = audio.create_song_player();
    player.play(&song, PlayParams::default()).unwrap();
    events(&mut player);

    audio.backend().advance(Duration::from_millis(1_500));
    assert_eq!(player.state().unwrap(), PlaybackState::Stopped);
    player.update(ms(16)).unwrap();
    assert_eq!(
        events(&mut player),
        vec![
            PlayerEvent::StateChanged(PlaybackState::Stopped),
            PlayerEvent::SongEnded
        ]
    );
    assert_eq!(audio.backend().channel_count(), 0);
    assert!(!player.stop().unwrap());
}

#[test]
fn seeking_is_range_checked() {
    let audio = subsystem(4);
    let song = audio.load_song(tone(2)).unwrap();
    let mut player = audio.create_song_player();

    assert!(matches!(
        player.set_position(Duration::from_secs(1)),
        Err(AudioError::InvalidOperation(_))
    ));

    player.play(&song, PlayParams::default()).unwrap();
    assert_eq!(player.duration(), Duration::from_secs(2));
    player.set_position(Duration::from_millis(1_250)).unwrap();
    assert_relative_eq!(player.position().unwrap().as_secs_f64(), 1.25, epsilon = 0.001);
    player.set_position(Duration::from_secs(2)).unwrap();

    assert!(matches!(
        player.set_position(Duration::from_secs(3)),
        Err(AudioError::OutOfRange { .. })
    ));
}

#[test]
fn exhausted_pool_skips_playback() {
    let audio = subsystem(1);
    let song = audio.load_song(tone(2)).unwrap();
    let mut first = audio.create_song_player();
    let mut second = audio.create_song_player();

    assert!(first.play(&song, PlayParams::default()).unwrap());
    assert!(!second.play(&song, PlayParams::default()).unwrap());
    assert_eq!(second.state().unwrap(), PlaybackState::Stopped);
    assert!(events(&mut second).is_empty());
}

#[test]
fn replaying_stops_previous_channel() {
    let audio = subsystem(4);
    let song = audio.load_song(tone(2)).unwrap();
    let mut player = audio.create_song_player();
    player.play(&song, PlayParams::default()).unwrap();
    player.play(&song, PlayParams::default()).unwrap();

    assert_eq!(audio.backend().channel_count(), 1);
    assert_eq!(
        events(&mut player),
        vec![
            PlayerEvent::StateChanged(PlaybackState::Playing),
            PlayerEvent::PlaybackStarted,
            PlayerEvent::StateChanged(PlaybackState::Stopped),
            PlayerEvent::SongEnded,
            PlayerEvent::StateChanged(PlaybackState::Playing),
            PlayerEvent::PlaybackStarted,
        ]
    );
}

#[test]
fn disposed_source_cannot_play_and_stops_its_channels() {
    let audio = subsystem(4);
    let mut song = audio.load_song(tone(2)).unwrap();
    let mut player = audio.create_song_player();
    player.play(&song, PlayParams::default()).unwrap();

    song.dispose().unwrap();
    player.update(ms(16)).unwrap();
    assert_eq!(player.state().unwrap(), PlaybackState::Stopped);
    assert!(matches!(
        player.play(&song, PlayParams::default()),
        Err(AudioError::Disposed)
    ));
}

#[test]
fn dropped_player_leaves_mixer_consistent() {
    let audio = subsystem(4);
    let effect = audio.load_sound_effect(tone(4)).unwrap();
    let mut player = audio.create_sound_effect_player();
    player
        .play(
            &effect,
            PlayParams::default().loop_region(Duration::from_secs(1), Some(Duration::from_secs(1))),
        )
        .unwrap();
    drop(player);

    assert_eq!(audio.backend().channel_count(), 0);
    audio.backend().advance(Duration::from_secs(3));
}

#[test]
fn players_work_as_trait_objects() {
    let audio = subsystem(4);
    let song = audio.load_song(tone(2)).unwrap();
    let effect = audio.load_sound_effect(tone(2)).unwrap();
    let mut song_player = audio.create_song_player();
    let mut effect_player = audio.create_sound_effect_player();
    song_player.play(&song, PlayParams::default()).unwrap();
    effect_player.play(&effect, PlayParams::default()).unwrap();

    let mut players: Vec<Box<dyn PlaybackControl>> =
        vec![Box::new(song_player), Box::new(effect_player)];
    for player in players.iter_mut() {
        player.pause().unwrap();
        assert_eq!(player.state().unwrap(), PlaybackState::Paused);
    }
    drop(players);
    assert_eq!(audio.backend().channel_count(), 0);
}

#[test]
fn reenabling_loop_does_not_restore_region() {
    let audio = subsystem(4);
    let song = audio.load_song(tone(10)).unwrap();
    let mut player = audio.create_song_player();
    player
        .play(
            &song,
            PlayParams::default().loop_region(Duration::from_secs(2), Some(Duration::from_secs(3))),
        )
        .unwrap();

    player.set_looping(false).unwrap();
    player.set_looping(true).unwrap();
    assert!(player.is_looping().unwrap());

    audio.backend().advance(Duration::from_secs(6));
    player.update(ms(16)).unwrap();
    assert_relative_eq!(
        player.position().unwrap().as_secs_f64(),
        6.0,
        epsilon = 0.01
    );
    assert!(player.is_playing().unwrap());
}

// ----------------------------------------------------------------------------
// Instrumented backend
// ----------------------------------------------------------------------------

/// Software mixer that records attribute writes and can fail loop seeks.
struct Instrumented {
    mixer: SoftwareMixer,
    attributes: Mutex<Vec<(ChannelAttribute, f32)>>,
    seek_error: Option<NativeError>,
}

impl Instrumented {
    fn new(seek_error: Option<NativeError>) -> Arc<Self> {
        Arc::new(Self {
            mixer: SoftwareMixer::new(RATE, 4),
            attributes: Mutex::new(Vec::new()),
            seek_error,
        })
    }
}

/// Sync context whose seeks always fail.
struct FailingSeek<'a> {
    inner: &'a mut dyn SyncContext,
    error: NativeError,
}

impl SyncContext for FailingSeek<'_> {
    fn channel(&self) -> ChannelHandle {
        self.inner.channel()
    }

    fn position(&self) -> u64 {
        self.inner.position()
    }

    fn set_position(&mut self, _position: u64) -> NativeResult<()> {
        Err(self.error)
    }
}

impl AudioBackend for Instrumented {
    fn name(&self) -> &str {
        "instrumented"
    }

    fn create_source(&self, clip: ClipData) -> NativeResult<SourceHandle> {
        self.mixer.create_source(clip)
    }

    fn release_source(&self, source: SourceHandle) -> NativeResult<()> {
        self.mixer.release_source(source)
    }

    fn source_duration(&self, source: SourceHandle) -> NativeResult<Duration> {
        self.mixer.source_duration(source)
    }

    fn allocate_channel(
        &self,
        source: SourceHandle,
        flags: ChannelFlags,
    ) -> NativeResult<Option<ChannelHandle>> {
        self.mixer.allocate_channel(source, flags)
    }

    fn free_channel(&self, channel: ChannelHandle) -> NativeResult<()> {
        self.mixer.free_channel(channel)
    }

    fn play(&self, channel: ChannelHandle, restart: bool) -> NativeResult<()> {
        self.mixer.play(channel, restart)
    }

    fn pause(&self, channel: ChannelHandle) -> NativeResult<()> {
        self.mixer.pause(channel)
    }

    fn activity(&self, channel: ChannelHandle) -> NativeResult<ChannelActivity> {
        self.mixer.activity(channel)
    }

    fn set_attribute(
        &self,
        channel: ChannelHandle,
        attribute: ChannelAttribute,
        value: f32,
    ) -> NativeResult<()> {
        self.attributes.lock().push((attribute, value));
        self.mixer.set_attribute(channel, attribute, value)
    }

    fn attribute(&self, channel: ChannelHandle, attribute: ChannelAttribute) -> NativeResult<f32> {
        self.mixer.attribute(channel, attribute)
    }

    fn position(&self, channel: ChannelHandle) -> NativeResult<u64> {
        self.mixer.position(channel)
    }

    fn set_position(&self, channel: ChannelHandle, position: u64) -> NativeResult<()> {
        self.mixer.set_position(channel, position)
    }

    fn length(&self, channel: ChannelHandle) -> NativeResult<u64> {
        self.mixer.length(channel)
    }

    fn time_to_position(&self, channel: ChannelHandle, time: Duration) -> NativeResult<u64> {
        self.mixer.time_to_position(channel, time)
    }

    fn position_to_time(&self, channel: ChannelHandle, position: u64) -> NativeResult<Duration> {
        self.mixer.position_to_time(channel, position)
    }

    fn set_looping(&self, channel: ChannelHandle, looping: bool) -> NativeResult<()> {
        self.mixer.set_looping(channel, looping)
    }

    fn is_looping(&self, channel: ChannelHandle) -> NativeResult<bool> {
        self.mixer.is_looping(channel)
    }

    fn register_sync(
        &self,
        channel: ChannelHandle,
        trigger: SyncTrigger,
        callback: SyncProc,
    ) -> NativeResult<SyncHandle> {
        let callback = match (self.seek_error, trigger) {
            (Some(error), SyncTrigger::Position(_)) => {
                let failing: SyncProc = Arc::new(move |ctx: &mut dyn SyncContext| {
                    callback(&mut FailingSeek { inner: ctx, error });
                });
                failing
            }
            _ => callback,
        };
        self.mixer.register_sync(channel, trigger, callback)
    }

    fn remove_sync(&self, channel: ChannelHandle, sync: SyncHandle) -> NativeResult<()> {
        self.mixer.remove_sync(channel, sync)
    }

    fn rebind_channel(&self, channel: ChannelHandle, device: DeviceId) -> NativeResult<()> {
        self.mixer.rebind_channel(channel, device)
    }
}

fn instrumented(seek_error: Option<NativeError>) -> AudioSubsystem<Instrumented> {
    AudioSubsystem::new(Instrumented::new(seek_error), AudioConfig::default()).unwrap()
}

#[test]
fn one_shot_clamps_native_parameters() {
    let audio = instrumented(None);
    let effect = audio.load_sound_effect(tone(1)).unwrap();
    assert!(effect.play(3.0, 5.0, -7.0).unwrap());

    assert_eq!(
        *audio.backend().attributes.lock(),
        vec![
            (ChannelAttribute::Volume, 1.0),
            (ChannelAttribute::Pitch, 1.0),
            (ChannelAttribute::Pan, -1.0),
        ]
    );
}

#[test]
fn failed_loop_seek_surfaces_from_update() {
    let audio = instrumented(Some(NativeError::Code(41)));
    let song = audio.load_song(tone(10)).unwrap();
    let mut player = audio.create_song_player();
    player
        .play(
            &song,
            PlayParams::default().loop_region(Duration::from_secs(2), Some(Duration::from_secs(3))),
        )
        .unwrap();

    audio.backend().mixer.advance(Duration::from_secs(6));
    assert!(matches!(
        player.update(ms(16)),
        Err(AudioError::Backend { code: 41, .. })
    ));
    player.update(ms(16)).unwrap();
}

#[test]
fn stop_discards_pending_loop_fault() {
    let audio = instrumented(Some(NativeError::Code(41)));
    let song = audio.load_song(tone(10)).unwrap();
    let mut player = audio.create_song_player();
    let params =
        PlayParams::default().loop_region(Duration::from_secs(2), Some(Duration::from_secs(3)));
    player.play(&song, params).unwrap();

    audio.backend().mixer.advance(Duration::from_secs(6));
    assert!(player.stop().unwrap());

    assert!(player.play(&song, PlayParams::default()).unwrap());
    player.update(ms(16)).unwrap();
    assert!(player.is_playing().unwrap());
}
