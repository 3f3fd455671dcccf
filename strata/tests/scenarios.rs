//! End-to-end behaviour of the orchestrator against the in-memory backend.

use std::sync::Arc;
use std::time::Duration;
use strata::backend::MemoryBackend;
use strata::{
    AudioClip, ChannelCategory, DispatchRegistry, EffectPack, LoopPack, LoopRequest, LoopState,
    MusicDesc, MusicPack, MusicRequest, MusicState, OutputGroup, PackBase, Placement, Retrigger,
    Strata, StrataDesc, StrataEvent, Vec3,
};

const FRAME: Duration = Duration::from_millis(10);

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn orchestrator(backend: &MemoryBackend) -> Strata {
    init_logs();
    Strata::new(StrataDesc::default().with_rng_seed(7), backend.clone(), backend.clone()).unwrap()
}

fn run_for(strata: &Strata, total: Duration) {
    let frames = (total.as_millis() / FRAME.as_millis()) as usize;
    for _ in 0..frames {
        strata.tick(FRAME);
    }
}

fn music(name: &str, secs: u64) -> Arc<MusicPack> {
    Arc::new(MusicPack::new(
        PackBase::new(name).with_clip(AudioClip::shared(name, Duration::from_secs(secs))),
    ))
}

fn loop_pack(volume: f32) -> Arc<LoopPack> {
    Arc::new(LoopPack::new(
        PackBase::new("Ambience")
            .with_clip(AudioClip::shared("wind", Duration::from_secs(10)))
            .with_clip(AudioClip::shared("rain", Duration::from_secs(12)))
            .with_clip(AudioClip::shared("storm", Duration::from_secs(8)))
            .with_volume(volume),
    ))
}

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-4
}

#[test]
fn test_music_crossfade_uses_two_channels() {
    let backend = MemoryBackend::new();
    let strata = orchestrator(&backend);

    let first = strata.try_play_music(&music("A", 60), MusicRequest::default()).unwrap();
    run_for(&strata, Duration::from_secs(2));
    assert_eq!(strata.channel_volume(first), Some(1.0));

    let second = strata.try_play_music(&music("B", 60), MusicRequest::default()).unwrap();
    assert_ne!(first.id, second.id);
    assert_eq!(strata.music_channel(), Some(second));
    assert_eq!(strata.channel_count(ChannelCategory::Music), 2);

    run_for(&strata, Duration::from_millis(500));
    let outgoing = strata.channel_volume(first).unwrap();
    let incoming = strata.channel_volume(second).unwrap();
    assert!(outgoing > 0.0 && outgoing < 1.0);
    assert!(incoming > 0.0 && incoming < 1.0);

    run_for(&strata, Duration::from_millis(550));
    assert!(!strata.is_channel_current(first));
    assert_eq!(strata.channel_volume(second), Some(1.0));
    assert_eq!(strata.music_state(), MusicState::Playing);

    let events = strata.poll_events();
    assert!(events.iter().any(|event| matches!(
        event,
        StrataEvent::ChannelReleased { category: ChannelCategory::Music, channel } if *channel == first.id
    )));
    assert!(!events.iter().any(|event| matches!(event, StrataEvent::MusicStopped { .. })));
}

#[test]
fn test_loop_fade_starts_from_current_volume() {
    let backend = MemoryBackend::new();
    let strata = orchestrator(&backend);
    let handle = strata
        .start_loop(
            &loop_pack(0.8),
            LoopRequest::default().with_fade_in(Duration::from_millis(500)),
        )
        .unwrap();

    run_for(&strata, Duration::from_millis(100));
    let midway = handle.current_volume();
    assert!(midway > 0.0 && midway < 0.8);

    handle.fade_to_volume(0.5, Duration::from_secs(2));
    assert!(approx(handle.target_volume(), 0.4));
    assert!(approx(handle.current_volume(), midway));

    strata.tick(FRAME);
    assert!((handle.current_volume() - midway).abs() < 0.01);

    run_for(&strata, Duration::from_secs(1));
    let ramping = handle.current_volume();
    assert!(ramping > midway && ramping < 0.4);

    run_for(&strata, Duration::from_millis(1050));
    assert!(approx(handle.current_volume(), 0.4));
    assert_eq!(handle.state(), LoopState::Active);
    assert!(handle.is_active());
}

#[test]
fn test_fade_to_zero_keeps_loop_alive() {
    let backend = MemoryBackend::new();
    let strata = orchestrator(&backend);
    let handle = strata.start_loop(&loop_pack(1.0), LoopRequest::default()).unwrap();

    handle.fade_to_volume(0.0, Duration::from_millis(200));
    run_for(&strata, Duration::from_millis(300));
    assert_eq!(handle.current_volume(), 0.0);
    assert!(handle.is_active());

    handle.fade_to_volume(1.0, Duration::from_millis(200));
    run_for(&strata, Duration::from_millis(300));
    assert_eq!(handle.current_volume(), 1.0);
}

#[test]
fn test_stopped_loop_ignores_volume() {
    let backend = MemoryBackend::new();
    let strata = orchestrator(&backend);
    let handle = strata.start_loop(&loop_pack(1.0), LoopRequest::default()).unwrap();
    run_for(&strata, Duration::from_secs(1));

    handle.stop_immediate();
    handle.set_volume(1.0);
    handle.fade_to_volume(1.0, Duration::from_secs(1));
    handle.change_clip(1, None);

    assert_eq!(handle.state(), LoopState::Inactive);
    assert!(!handle.is_active());
    assert_eq!(handle.current_volume(), 0.0);
    assert_eq!(backend.playing_count(ChannelCategory::Loop), 0);

    let stops = strata
        .poll_events()
        .into_iter()
        .filter(|event| matches!(event, StrataEvent::LoopStopped { .. }))
        .count();
    assert_eq!(stops, 1);
}

#[test]
fn test_stopping_loop_ignores_volume_but_can_be_cut() {
    let backend = MemoryBackend::new();
    let strata = orchestrator(&backend);
    let handle = strata.start_loop(&loop_pack(1.0), LoopRequest::default()).unwrap();
    run_for(&strata, Duration::from_secs(1));

    handle.stop(Some(Duration::from_secs(1)));
    run_for(&strata, Duration::from_millis(300));
    let fading = handle.current_volume();
    handle.set_volume(1.0);
    assert_eq!(handle.current_volume(), fading);
    assert_eq!(handle.state(), LoopState::Stopping);

    handle.stop_immediate();
    assert_eq!(handle.state(), LoopState::Inactive);
    assert_eq!(strata.active_loop_count(), 0);
}

#[test]
fn test_non_looping_music_holds_tail_then_stops() {
    let backend = MemoryBackend::new();
    let strata = orchestrator(&backend);
    let pack = Arc::new(
        MusicPack::new(
            PackBase::new("Sting").with_clip(AudioClip::shared("sting", Duration::from_secs(3))),
        )
        .with_looping(false)
        .with_tail(Duration::from_secs(2)),
    );

    let lease = strata
        .try_play_music(&pack, MusicRequest::default().with_blend_in(Duration::from_millis(500)))
        .unwrap();
    run_for(&strata, Duration::from_millis(2900));
    assert_eq!(strata.music_state(), MusicState::Playing);

    run_for(&strata, Duration::from_millis(200));
    assert_eq!(strata.music_state(), MusicState::Decaying);
    assert_eq!(strata.music_retrigger_count(), 0);

    run_for(&strata, Duration::from_millis(1700));
    assert!(strata.is_channel_current(lease));
    assert_eq!(strata.channel_volume(lease), Some(1.0));
    let voice = strata.channel_voice(lease).unwrap();
    assert_eq!(backend.voice(voice).unwrap().play_count, 1);

    run_for(&strata, Duration::from_millis(400));
    assert!(!strata.is_channel_current(lease));
    assert_eq!(strata.music_state(), MusicState::Idle);

    let events = strata.poll_events();
    assert!(events.iter().any(|event| matches!(event, StrataEvent::MusicDecaying { .. })));
    assert!(events.iter().any(|event| matches!(event, StrataEvent::MusicStopped { .. })));
    assert!(!events.iter().any(|event| matches!(event, StrataEvent::MusicRetriggered { .. })));
}

#[test]
fn test_looping_music_retriggers_on_fresh_channel() {
    let backend = MemoryBackend::new();
    let strata = orchestrator(&backend);
    let pack = Arc::new(
        MusicPack::new(
            PackBase::new("Theme").with_clip(AudioClip::shared("theme", Duration::from_secs(4))),
        )
        .with_retrigger(Retrigger::Divided(2.0)),
    );

    let first = strata.try_play_music(&pack, MusicRequest::default()).unwrap();
    run_for(&strata, Duration::from_millis(1900));
    assert_eq!(strata.music_retrigger_count(), 0);

    run_for(&strata, Duration::from_millis(200));
    assert_eq!(strata.music_retrigger_count(), 1);
    assert_eq!(strata.music_state(), MusicState::Looping);
    let second = strata.music_channel().unwrap();
    assert_ne!(first, second);

    run_for(&strata, Duration::from_millis(1100));
    assert!(!strata.is_channel_current(first));
}

#[test]
fn test_tail_blend_out_overlaps_tracks() {
    let backend = MemoryBackend::new();
    let strata = orchestrator(&backend);
    let hall = Arc::new(
        MusicPack::new(PackBase::new("Hall").with_clip(AudioClip::shared("hall", Duration::from_secs(60))))
            .with_tail(Duration::from_secs(2)),
    );
    let first = strata.try_play_music(&hall, MusicRequest::default()).unwrap();
    run_for(&strata, Duration::from_secs(2));

    let second = strata
        .try_play_music(&music("Next", 60), MusicRequest::default().with_tail_blend_out())
        .unwrap();
    assert_ne!(first.id, second.id);

    run_for(&strata, Duration::from_millis(1500));
    assert!(strata.is_channel_current(first));
    assert_eq!(strata.channel_volume(first), Some(1.0));
    assert_eq!(strata.channel_volume(second), Some(1.0));

    run_for(&strata, Duration::from_millis(600));
    assert!(!strata.is_channel_current(first));
    assert_eq!(strata.music_channel(), Some(second));
}

#[test]
fn test_default_blend_applies_to_requests_and_stop() {
    let backend = MemoryBackend::new();
    init_logs();
    let desc = StrataDesc::default()
        .with_rng_seed(7)
        .with_music(MusicDesc::default().with_default_blend(Duration::from_millis(200)));
    let strata = Strata::new(desc, backend.clone(), backend.clone()).unwrap();

    let lease = strata.try_play_music(&music("Quick", 30), MusicRequest::default()).unwrap();
    run_for(&strata, Duration::from_millis(250));
    assert_eq!(strata.channel_volume(lease), Some(1.0));

    strata.stop_music(None);
    run_for(&strata, Duration::from_millis(250));
    assert_eq!(strata.music_state(), MusicState::Idle);
    assert!(!strata.is_channel_current(lease));
}

#[test]
fn test_random_starts_pick_from_pack() {
    let backend = MemoryBackend::new();
    let strata = orchestrator(&backend);
    let themes = Arc::new(MusicPack::new(PackBase::new("Themes").with_clips([
        AudioClip::shared("day", Duration::from_secs(30)),
        AudioClip::shared("night", Duration::from_secs(30)),
    ])));

    let lease = strata.try_play_random_music(&themes, MusicRequest::default()).unwrap();
    let voice = backend.voice(strata.channel_voice(lease).unwrap()).unwrap();
    let name = voice.clip.unwrap().name().to_string();
    assert!(name == "day" || name == "night");

    let pack = loop_pack(1.0);
    let handle = strata.try_start_random_loop(&pack, LoopRequest::clip(42)).unwrap();
    assert!(handle.clip_index().unwrap() < 3);
    assert!(handle.is_active());

    let empty = Arc::new(LoopPack::new(PackBase::new("Silence")));
    assert!(strata.start_random_loop(&empty, LoopRequest::default()).is_none());
    assert_eq!(strata.active_loop_count(), 1);
}

#[test]
fn test_output_groups_reach_voices() {
    let backend = MemoryBackend::new();
    init_logs();
    let desc = StrataDesc::default()
        .with_rng_seed(7)
        .with_music(MusicDesc::default().with_output_group(OutputGroup::new("music")));
    let strata = Strata::new(desc, backend.clone(), backend.clone()).unwrap();
    let group_of = |lease| backend.voice(strata.channel_voice(lease).unwrap()).unwrap().output_group;

    let theme = strata.try_play_music(&music("Theme", 30), MusicRequest::default()).unwrap();
    assert_eq!(group_of(theme), Some(OutputGroup::new("music")));

    let ambience = Arc::new(LoopPack::new(
        PackBase::new("Birds")
            .with_clip(AudioClip::shared("birds", Duration::from_secs(9)))
            .with_output_group(OutputGroup::new("ambience")),
    ));
    let handle = strata.try_start_loop(&ambience, LoopRequest::default()).unwrap();
    let loop_voice = backend
        .voices()
        .into_iter()
        .find(|voice| voice.category == ChannelCategory::Loop)
        .unwrap();
    assert_eq!(loop_voice.output_group, Some(OutputGroup::new("ambience")));
    assert!(handle.is_active());

    let plain = strata
        .try_play_effect(
            &EffectPack::new(PackBase::new("Ui").with_clip(AudioClip::shared("ok", Duration::from_millis(80)))),
            0,
            Placement::None,
        )
        .unwrap();
    assert_eq!(group_of(plain), None);
}

#[test]
fn test_stop_music_releases_and_cancels_retrigger() {
    let backend = MemoryBackend::new();
    let strata = orchestrator(&backend);
    let lease = strata.try_play_music(&music("Theme", 2), MusicRequest::default()).unwrap();
    run_for(&strata, Duration::from_millis(500));

    strata.stop_music(Some(Duration::from_millis(500)));
    assert_eq!(strata.music_state(), MusicState::Stopping);
    assert_eq!(strata.music_time_remaining(), Duration::ZERO);

    run_for(&strata, Duration::from_secs(3));
    assert_eq!(strata.music_state(), MusicState::Idle);
    assert!(!strata.is_channel_current(lease));
    assert_eq!(strata.music_retrigger_count(), 0);
}

#[test]
fn test_effect_pool_grows_only_on_deficit() {
    let backend = MemoryBackend::new();
    let strata = orchestrator(&backend);
    let pack = EffectPack::new(
        PackBase::new("Hits").with_clip(AudioClip::shared("hit", Duration::from_secs(1))),
    );

    for _ in 0..3 {
        strata.play_effect(&pack, 0, Placement::None);
    }
    assert_eq!(strata.channel_count(ChannelCategory::Effect), 3);
    assert_eq!(strata.idle_channel_count(ChannelCategory::Effect), 0);

    run_for(&strata, Duration::from_millis(1100));
    assert_eq!(strata.idle_channel_count(ChannelCategory::Effect), 3);

    strata.play_effect_at(&pack, 0, Vec3::new(1.0, 0.0, 0.0));
    strata.play_random_effect(&pack, Placement::None);
    assert_eq!(strata.channel_count(ChannelCategory::Effect), 3);
    assert_eq!(backend.voice_count(ChannelCategory::Effect), 3);
    assert_eq!(backend.playing_count(ChannelCategory::Effect), 2);
}

#[test]
fn test_effect_bad_index_plays_nothing() {
    let backend = MemoryBackend::new();
    let strata = orchestrator(&backend);
    let pack = EffectPack::new(
        PackBase::new("Hits").with_clip(AudioClip::shared("hit", Duration::from_secs(1))),
    );

    assert!(strata.try_play_effect(&pack, 4, Placement::None).is_err());
    strata.play_random_effect(&EffectPack::new(PackBase::new("Empty")), Placement::None);
    assert_eq!(strata.channel_count(ChannelCategory::Effect), 0);
}

#[test]
fn test_set_volume_supersedes_running_fade() {
    let backend = MemoryBackend::new();
    let strata = orchestrator(&backend);
    let handle = strata
        .start_loop(&loop_pack(0.5), LoopRequest::default().with_fade_in(Duration::from_secs(2)))
        .unwrap();

    run_for(&strata, Duration::from_millis(200));
    handle.set_volume(0.6);
    run_for(&strata, Duration::from_secs(3));
    assert!(approx(handle.current_volume(), 0.3));
    assert!(approx(handle.target_volume(), 0.3));
}

#[test]
fn test_change_clip_crossfades_and_ignores_current() {
    let backend = MemoryBackend::new();
    let strata = orchestrator(&backend);
    let handle = strata
        .start_loop(&loop_pack(1.0), LoopRequest::default().with_fade_in(Duration::ZERO))
        .unwrap();
    strata.poll_events();

    handle.change_clip(0, None);
    assert!(strata.poll_events().is_empty());

    handle.change_clip(2, Some(Duration::from_millis(200)));
    assert_eq!(handle.clip_index(), Some(0));

    run_for(&strata, Duration::from_millis(110));
    assert_eq!(handle.clip_index(), Some(2));
    assert!(handle.current_volume() < 1.0);

    run_for(&strata, Duration::from_millis(150));
    assert_eq!(handle.current_volume(), 1.0);
    let events = strata.poll_events();
    assert!(events.iter().any(|event| matches!(
        event,
        StrataEvent::LoopClipChanged { clip_index: 2, .. }
    )));

    handle.change_to_random_clip(Some(Duration::ZERO));
    assert_ne!(handle.clip_index(), Some(2));
}

#[test]
fn test_finished_loops_are_reclaimed_once() {
    let backend = MemoryBackend::new();
    let strata = orchestrator(&backend);
    let pack = loop_pack(1.0);
    let kept = strata.start_loop(&pack, LoopRequest::default()).unwrap();
    let dropped = strata.start_loop(&pack, LoopRequest::clip(1)).unwrap();
    assert_eq!(strata.active_loop_count(), 2);

    dropped.stop(Some(Duration::from_millis(200)));
    run_for(&strata, Duration::from_millis(300));
    assert_eq!(strata.active_loop_count(), 1);
    assert_eq!(strata.active_loops(), vec![kept.clone()]);
    assert_eq!(strata.active_loop_count(), 1);

    let reclaimed = strata
        .poll_events()
        .into_iter()
        .filter(|event| matches!(event, StrataEvent::LoopReclaimed { .. }))
        .count();
    assert_eq!(reclaimed, 1);
}

#[test]
fn test_stop_all_loops() {
    let backend = MemoryBackend::new();
    let strata = orchestrator(&backend);
    let pack = loop_pack(1.0);
    let handles: Vec<_> = (0..3)
        .filter_map(|index| strata.start_loop(&pack, LoopRequest::clip(index)))
        .collect();

    strata.stop_all_loops(Duration::from_millis(300));
    assert!(handles.iter().all(|handle| handle.state() == LoopState::Stopping));

    run_for(&strata, Duration::from_millis(400));
    assert!(handles.iter().all(|handle| handle.state() == LoopState::Inactive));
    assert_eq!(backend.playing_count(ChannelCategory::Loop), 0);
}

#[test]
fn test_stop_all_loops_immediate() {
    let backend = MemoryBackend::new();
    let strata = orchestrator(&backend);
    let pack = loop_pack(1.0);
    let handles: Vec<_> = (0..3)
        .filter_map(|index| strata.start_loop(&pack, LoopRequest::clip(index)))
        .collect();
    run_for(&strata, Duration::from_millis(100));
    handles[0].stop(None);

    strata.stop_all_loops_immediate();
    assert!(handles.iter().all(|handle| !handle.is_active()));
    assert!(handles.iter().all(|handle| handle.state() == LoopState::Inactive));
    assert_eq!(backend.playing_count(ChannelCategory::Loop), 0);
    assert_eq!(
        strata.idle_channel_count(ChannelCategory::Loop),
        strata.channel_count(ChannelCategory::Loop)
    );
    assert_eq!(strata.active_loop_count(), 0);

    let reclaimed = strata
        .poll_events()
        .into_iter()
        .filter(|event| matches!(event, StrataEvent::LoopReclaimed { .. }))
        .count();
    assert_eq!(reclaimed, 3);
}

#[test]
fn test_pause_and_resume_keep_loop_active() {
    let backend = MemoryBackend::new();
    let strata = orchestrator(&backend);
    let handle = strata.start_loop(&loop_pack(1.0), LoopRequest::default()).unwrap();

    handle.pause();
    assert!(handle.is_active());
    assert_eq!(strata.active_loop_count(), 1);
    assert_eq!(backend.playing_count(ChannelCategory::Loop), 0);

    handle.resume();
    assert_eq!(backend.playing_count(ChannelCategory::Loop), 1);
}

#[test]
fn test_update_position_moves_world_placed_loop() {
    let backend = MemoryBackend::new();
    let strata = orchestrator(&backend);
    let handle = strata
        .start_loop(
            &loop_pack(1.0),
            LoopRequest::default().with_placement(Placement::at(Vec3::new(1.0, 2.0, 3.0))),
        )
        .unwrap();

    handle.update_position(Vec3::new(-4.0, 0.0, 8.0));
    let voice = backend
        .voices()
        .into_iter()
        .find(|voice| voice.category == ChannelCategory::Loop)
        .unwrap();
    assert_eq!(voice.world_position, Vec3::new(-4.0, 0.0, 8.0));
    assert!(voice.spatial.blend > 0.0);
}

#[test]
fn test_handle_outliving_orchestrator_is_inert() {
    let backend = MemoryBackend::new();
    let strata = orchestrator(&backend);
    let handle = strata.start_loop(&loop_pack(1.0), LoopRequest::default()).unwrap();
    drop(strata);

    assert!(!handle.is_active());
    assert_eq!(handle.state(), LoopState::Inactive);
    assert_eq!(handle.current_volume(), 0.0);
    handle.set_volume(0.5);
    handle.stop(None);
    assert_eq!(backend.destroyed().len(), 1);
}

#[test]
fn test_registry_dispatches_to_latest() {
    let registry = DispatchRegistry::new();
    assert!(!registry.is_available());

    let backend = MemoryBackend::new();
    let first = orchestrator(&backend);
    let second = orchestrator(&MemoryBackend::new());
    first.activate(&registry);
    second.activate(&registry);

    first.deactivate(&registry);
    assert_eq!(registry.current().map(|strata| strata.id()), Some(second.id()));

    registry.play_music(&music("Menu", 30), MusicRequest::default());
    assert_eq!(second.music_state(), MusicState::Playing);
    assert_eq!(first.music_state(), MusicState::Idle);

    drop(second);
    assert!(registry.current().is_none());
    assert!(registry.start_loop(&loop_pack(1.0), LoopRequest::default()).is_none());
}

#[test]
fn test_registry_resolver_discovers_orchestrator() {
    let backend = MemoryBackend::new();
    let strata = orchestrator(&backend);
    let weak = strata.downgrade();
    let registry = DispatchRegistry::with_resolver(move || weak.upgrade());

    let found = registry.current().unwrap();
    assert_eq!(found.id(), strata.id());

    registry.play_effect(
        &EffectPack::new(PackBase::new("Ui").with_clip(AudioClip::shared("ok", Duration::from_millis(80)))),
        0,
        Placement::None,
    );
    assert_eq!(strata.channel_count(ChannelCategory::Effect), 1);
}
