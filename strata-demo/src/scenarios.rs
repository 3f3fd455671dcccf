use anyhow::{Context, Result, bail};
use std::sync::Arc;
use std::time::Duration;
use strata::backend::MemoryBackend;
use strata::{
    AudioClip, ChannelCategory, DispatchRegistry, EffectPack, LoopPack, LoopRequest, MusicPack,
    MusicRequest, NodeRef, PackBase, Strata, StrataDesc, Vec3,
};

const FRAME: Duration = Duration::from_millis(16);

type Scenario = fn() -> Result<()>;

const SCENARIOS: &[(&str, Scenario)] = &[
    ("music", music_crossfade),
    ("sting", non_looping_music),
    ("effects", effect_bursts),
    ("loops", loop_layers),
    ("registry", registry_dispatch),
];

pub fn run(selected: &[String]) -> Result<()> {
    for name in selected {
        if !SCENARIOS.iter().any(|(known, _)| known == name) {
            let known: Vec<&str> = SCENARIOS.iter().map(|(known, _)| *known).collect();
            bail!("unknown scenario '{}', expected one of {:?}", name, known);
        }
    }

    for (name, scenario) in SCENARIOS {
        if !selected.is_empty() && !selected.iter().any(|wanted| wanted == name) {
            continue;
        }
        log::info!("=== Running '{}' scenario ===", name);
        scenario().with_context(|| format!("scenario '{}' failed", name))?;
    }
    Ok(())
}

fn orchestrator(backend: &MemoryBackend) -> Result<Strata> {
    let desc = StrataDesc::default().with_rng_seed(42);
    Ok(Strata::new(desc, backend.clone(), backend.clone())?)
}

/// Ticks for `duration` of simulated time, logging every event on the way.
fn play_for(strata: &Strata, duration: Duration) {
    let mut elapsed = Duration::ZERO;
    while elapsed < duration {
        strata.tick(FRAME);
        elapsed += FRAME;
        for event in strata.poll_events() {
            log::info!("[{:>6.2}s] {:?}", elapsed.as_secs_f64(), event);
        }
    }
}

fn clip(name: &str, millis: u64) -> Arc<AudioClip> {
    AudioClip::shared(name, Duration::from_millis(millis))
}

fn music_crossfade() -> Result<()> {
    let backend = MemoryBackend::new();
    let strata = orchestrator(&backend)?;

    let explore = Arc::new(MusicPack::new(
        PackBase::new("Explore").with_clip(clip("explore", 8_000)),
    ));
    let battle = Arc::new(
        MusicPack::new(PackBase::new("Battle").with_clip(clip("battle", 6_000)).with_volume(0.9)),
    );

    strata.try_play_music(&explore, MusicRequest::default())?;
    play_for(&strata, Duration::from_secs(3));

    log::info!("Switching to battle music");
    strata.try_play_music(&battle, MusicRequest::default().with_blend(Duration::from_secs(2)))?;
    play_for(&strata, Duration::from_secs(8));

    log::info!(
        "Music is {:?} after {} retriggers, {} music channels allocated",
        strata.music_state(),
        strata.music_retrigger_count(),
        strata.channel_count(ChannelCategory::Music)
    );

    strata.stop_music(Some(Duration::from_secs(1)));
    play_for(&strata, Duration::from_millis(1_500));
    Ok(())
}

fn non_looping_music() -> Result<()> {
    let backend = MemoryBackend::new();
    let strata = orchestrator(&backend)?;

    let sting = Arc::new(
        MusicPack::new(PackBase::new("Victory").with_clip(clip("victory", 3_000)))
            .with_looping(false)
            .with_tail(Duration::from_secs(2)),
    );
    strata.try_play_music(&sting, MusicRequest::default().with_blend_in(Duration::from_millis(250)))?;
    log::info!("Silent in {:.2}s", strata.music_time_remaining().as_secs_f64());
    play_for(&strata, Duration::from_secs(6));
    Ok(())
}

fn effect_bursts() -> Result<()> {
    let backend = MemoryBackend::new();
    let strata = orchestrator(&backend)?;

    let steps = EffectPack::new(
        PackBase::new("Footsteps")
            .with_clips([clip("step-1", 300), clip("step-2", 280), clip("step-3", 320)])
            .with_pitch_range(0.9, 1.1),
    );

    for burst in 0..4 {
        for step in 0..3 {
            let position = Vec3::new(burst as f32, 0.0, step as f32);
            strata.play_random_effect_at(&steps, position);
        }
        strata.play_random_effect_on(&steps, NodeRef(7));
        play_for(&strata, Duration::from_millis(400));
        log::info!(
            "Burst {}: {} effect channels, {} idle",
            burst,
            strata.channel_count(ChannelCategory::Effect),
            strata.idle_channel_count(ChannelCategory::Effect)
        );
    }
    Ok(())
}

fn loop_layers() -> Result<()> {
    let backend = MemoryBackend::new();
    let strata = orchestrator(&backend)?;

    let ambience = Arc::new(LoopPack::new(
        PackBase::new("Ambience")
            .with_clips([clip("wind", 10_000), clip("rain", 12_000), clip("storm", 9_000)])
            .with_volume(0.8),
    ));
    let engine = Arc::new(
        LoopPack::new(PackBase::new("Engine").with_clip(clip("idle", 2_000)))
            .with_fade_out(Duration::from_millis(250)),
    );

    let weather = strata
        .try_start_random_loop(&ambience, LoopRequest::from_pack(&ambience))
        .context("weather loop")?;
    let motor = strata
        .try_start_loop(
            &engine,
            LoopRequest::default().with_placement(strata::Placement::at(Vec3::new(0.0, 0.0, -5.0))),
        )
        .context("engine loop")?;
    play_for(&strata, Duration::from_secs(1));

    weather.fade_to_volume(0.5, Duration::from_secs(2));
    play_for(&strata, Duration::from_millis(500));
    weather.change_clip(1, Some(Duration::from_millis(400)));
    play_for(&strata, Duration::from_secs(2));
    log::info!(
        "Weather on clip {:?} at volume {:.2}",
        weather.clip_index(),
        weather.current_volume()
    );

    for step in 0..5 {
        motor.update_position(Vec3::new(0.0, 0.0, -5.0 + step as f32));
        play_for(&strata, Duration::from_millis(200));
    }
    motor.stop(None);
    play_for(&strata, Duration::from_millis(500));

    weather.change_to_random_clip(None);
    play_for(&strata, Duration::from_millis(500));
    log::info!("{} loops still active", strata.active_loop_count());

    strata.stop_all_loops(Duration::from_secs(1));
    play_for(&strata, Duration::from_millis(1_200));
    log::info!("{} loops still active", strata.active_loop_count());
    Ok(())
}

fn registry_dispatch() -> Result<()> {
    let registry = DispatchRegistry::new();
    let menu = Arc::new(MusicPack::new(
        PackBase::new("Menu").with_clips([clip("menu-calm", 20_000), clip("menu-bright", 18_000)]),
    ));

    // Nothing registered yet: the call is dropped with a warning
    registry.play_music(&menu, MusicRequest::default());

    let backend = MemoryBackend::new();
    let strata = orchestrator(&backend)?;
    strata.activate(&registry);
    registry.play_random_music(&menu, MusicRequest::default());
    play_for(&strata, Duration::from_millis(500));
    registry.stop_music(None);
    play_for(&strata, Duration::from_millis(1_100));

    strata.deactivate(&registry);
    log::info!("Registry available after deactivate: {}", registry.is_available());
    Ok(())
}
