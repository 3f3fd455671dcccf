use crate::backend::{AttachmentBackend, RenderBackend, VoiceId};
use crate::channel::{ChannelCategory, ChannelLease, ChannelPool};
use crate::config::{NodeRef, Placement, StrataDesc};
use crate::context::PlaybackContext;
use crate::effects::EffectPlayer;
use crate::error::{Result, StrataError};
use crate::events::StrataEvent;
use crate::fade::{FadeOutcome, FadeScheduler};
use crate::loops::{LoopHandle, LoopId, LoopManager, LoopRequest, LoopState};
use crate::math::Vec3;
use crate::music::{MusicController, MusicRequest, MusicState};
use crate::pack::{EffectPack, LoopPack, MusicPack};
use crate::registry::DispatchRegistry;
use crossbeam_channel::{Receiver, Sender};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Zero-length fades can chain (a cross-fade's second half); this bounds the chain.
const MAX_SETTLE_ROUNDS: usize = 16;

pub(crate) struct Subsystems<'a> {
    pub music: &'a mut MusicController,
    pub effects: &'a EffectPlayer,
    pub loops: &'a mut LoopManager,
}

pub(crate) struct Core {
    id: Uuid,
    desc: StrataDesc,
    render: Box<dyn RenderBackend>,
    attachment: Box<dyn AttachmentBackend>,
    pool: ChannelPool,
    fades: FadeScheduler,
    music: MusicController,
    effects: EffectPlayer,
    loops: LoopManager,
    rng: StdRng,
    pending: Vec<FadeOutcome>,
    event_sender: Sender<StrataEvent>,
    event_receiver: Receiver<StrataEvent>,
}

impl Core {
    fn split(&mut self) -> (Subsystems<'_>, PlaybackContext<'_>) {
        let Core {
            render,
            attachment,
            pool,
            fades,
            music,
            effects,
            loops,
            rng,
            pending,
            event_sender,
            ..
        } = self;
        (
            Subsystems {
                music,
                effects,
                loops,
            },
            PlaybackContext {
                render: &mut **render,
                attachment: &mut **attachment,
                pool,
                fades,
                rng,
                pending,
                events: event_sender,
            },
        )
    }

    /// Runs `f` against the subsystems, then routes any fade outcomes it produced.
    pub(crate) fn run<R>(
        &mut self,
        f: impl FnOnce(&mut Subsystems<'_>, &mut PlaybackContext<'_>) -> R,
    ) -> R {
        let result = {
            let (mut subsystems, mut ctx) = self.split();
            f(&mut subsystems, &mut ctx)
        };
        self.settle();
        result
    }

    fn settle(&mut self) {
        for _ in 0..MAX_SETTLE_ROUNDS {
            if self.pending.is_empty() {
                return;
            }
            let outcomes = std::mem::take(&mut self.pending);
            let (subsystems, mut ctx) = self.split();
            for outcome in &outcomes {
                if let FadeOutcome::Released(lease) = outcome {
                    if let Some(channel) = ctx.pool.channel(lease.id) {
                        ctx.emit(StrataEvent::ChannelReleased {
                            category: channel.category(),
                            channel: lease.id,
                        });
                    }
                }
                subsystems.music.on_fade_outcome(&mut ctx, outcome);
                subsystems.loops.on_fade_outcome(&mut ctx, outcome);
            }
        }
        if !self.pending.is_empty() {
            log::warn!(
                "{} fade outcomes still pending after {} rounds",
                self.pending.len(),
                MAX_SETTLE_ROUNDS
            );
        }
    }

    fn tick(&mut self, dt: Duration) {
        self.render.begin_frame(dt);
        self.run(|_, ctx| {
            let finished = ctx.fades.tick(dt, ctx.pool, ctx.render);
            ctx.pending.extend(finished);
        });
        self.run(|subsystems, ctx| subsystems.music.tick(ctx));
        self.run(|subsystems, ctx| subsystems.loops.tick(ctx, dt));
    }

    pub(crate) fn loop_is_active(&self, id: LoopId) -> bool {
        self.loops.is_active(&self.pool, &*self.render, id)
    }

    pub(crate) fn loop_state(&self, id: LoopId) -> LoopState {
        self.loops.state(id)
    }

    pub(crate) fn loop_current_volume(&self, id: LoopId) -> f32 {
        self.loops.current_volume(&self.pool, id)
    }

    pub(crate) fn loop_target_volume(&self, id: LoopId) -> f32 {
        self.loops.target_volume(id)
    }

    pub(crate) fn loop_clip_index(&self, id: LoopId) -> Option<usize> {
        self.loops.clip_index(id)
    }
}

impl Drop for Core {
    fn drop(&mut self) {
        log::debug!(
            "Strata {} shutting down, destroying {} channels",
            self.id,
            self.pool.len()
        );
        self.pool.teardown(&mut *self.render);
    }
}

/// The layered audio orchestrator.
///
/// `Strata` owns the channel pool, the fade scheduler, the music controller,
/// the effect player and the loop manager, plus the two backend collaborators.
/// It is single-threaded: clones share one core, and nothing here is `Send`.
/// Drive it by calling [`tick`](Self::tick) once per frame with the real,
/// unscaled frame time.
///
/// Methods that start playback come in two flavours: `try_*` returns the
/// [`StrataError`], the plain form logs it and does nothing.
#[derive(Clone)]
pub struct Strata {
    id: Uuid,
    core: Rc<RefCell<Core>>,
}

impl fmt::Debug for Strata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Strata").field("id", &self.id).finish()
    }
}

impl Strata {
    pub fn new<R, A>(desc: StrataDesc, render: R, attachment: A) -> Result<Self>
    where
        R: RenderBackend + 'static,
        A: AttachmentBackend + 'static,
    {
        desc.validate()?;

        let id = Uuid::new_v4();
        let (event_sender, event_receiver) = crossbeam_channel::unbounded();
        let rng = match desc.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let autoplay = desc
            .music
            .default_pack
            .clone()
            .filter(|_| desc.music.play_on_start);

        let core = Core {
            id,
            music: MusicController::new(&desc.music),
            effects: EffectPlayer::new(&desc.effects),
            loops: LoopManager::new(&desc.loops),
            desc,
            render: Box::new(render),
            attachment: Box::new(attachment),
            pool: ChannelPool::new(),
            fades: FadeScheduler::new(),
            rng,
            pending: Vec::new(),
            event_sender,
            event_receiver,
        };
        let strata = Self {
            id,
            core: Rc::new(RefCell::new(core)),
        };
        log::info!("Strata orchestrator {} created", id);

        if let Some(pack) = autoplay {
            strata.play_music(&pack, MusicRequest::default());
        }
        Ok(strata)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn desc(&self) -> Option<StrataDesc> {
        self.read(|core| core.desc.clone())
    }

    pub fn downgrade(&self) -> WeakStrata {
        WeakStrata {
            id: self.id,
            core: Rc::downgrade(&self.core),
        }
    }

    fn write<T>(&self, f: impl FnOnce(&mut Core) -> T) -> Option<T> {
        match self.core.try_borrow_mut() {
            Ok(mut core) => Some(f(&mut core)),
            Err(_) => {
                log::warn!("Strata {} re-entered from a backend callback; call ignored", self.id);
                None
            }
        }
    }

    fn read<T>(&self, f: impl FnOnce(&Core) -> T) -> Option<T> {
        match self.core.try_borrow() {
            Ok(core) => Some(f(&core)),
            Err(_) => {
                log::warn!("Strata {} re-entered from a backend callback; query ignored", self.id);
                None
            }
        }
    }

    fn busy(&self) -> StrataError {
        StrataError::Backend(format!("orchestrator {} is busy", self.id))
    }

    fn report(&self, operation: &str, err: &StrataError) {
        match err {
            StrataError::StaleChannel(_) => log::debug!("{}: {}", operation, err),
            _ => log::warn!("{}: {}", operation, err),
        }
    }

    /// Advances fades, fires a due music wake and sweeps finished loops.
    pub fn tick(&self, dt: Duration) {
        self.write(|core| core.tick(dt));
    }

    /// Drains every event emitted since the last call.
    pub fn poll_events(&self) -> Vec<StrataEvent> {
        self.read(|core| core.event_receiver.try_iter().collect())
            .unwrap_or_default()
    }

    // Music

    pub fn try_play_music(
        &self,
        pack: &Arc<MusicPack>,
        request: MusicRequest,
    ) -> Result<ChannelLease> {
        self.write(|core| {
            core.run(|subsystems, ctx| {
                subsystems
                    .music
                    .play_track(ctx, Arc::clone(pack), &request)
            })
        })
        .unwrap_or_else(|| Err(self.busy()))
    }

    pub fn play_music(&self, pack: &Arc<MusicPack>, request: MusicRequest) {
        if let Err(err) = self.try_play_music(pack, request) {
            self.report("play_music", &err);
        }
    }

    /// Like [`try_play_music`](Self::try_play_music) with a random clip of `pack`.
    pub fn try_play_random_music(
        &self,
        pack: &Arc<MusicPack>,
        request: MusicRequest,
    ) -> Result<ChannelLease> {
        self.write(|core| {
            core.run(|subsystems, ctx| {
                subsystems
                    .music
                    .play_random_track(ctx, Arc::clone(pack), &request)
            })
        })
        .unwrap_or_else(|| Err(self.busy()))
    }

    pub fn play_random_music(&self, pack: &Arc<MusicPack>, request: MusicRequest) {
        if let Err(err) = self.try_play_random_music(pack, request) {
            self.report("play_random_music", &err);
        }
    }

    /// Fades the current track out; `None` uses [`MusicDesc::default_blend`](crate::MusicDesc::default_blend).
    pub fn stop_music(&self, fade_out: Option<Duration>) {
        self.write(|core| core.run(|subsystems, ctx| subsystems.music.stop_track(ctx, fade_out)));
    }

    pub fn music_state(&self) -> MusicState {
        self.read(|core| core.music.state())
            .unwrap_or(MusicState::Idle)
    }

    pub fn music_channel(&self) -> Option<ChannelLease> {
        self.read(|core| core.music.current_channel()).flatten()
    }

    /// Time until the current track restarts, or until it goes silent when
    /// its pack does not loop.
    pub fn music_time_remaining(&self) -> Duration {
        self.read(|core| core.music.time_remaining(core.render.dsp_time()))
            .unwrap_or_default()
    }

    pub fn music_retrigger_count(&self) -> u32 {
        self.read(|core| core.music.retrigger_count())
            .unwrap_or_default()
    }

    // Effects

    pub fn try_play_effect(
        &self,
        pack: &EffectPack,
        index: usize,
        placement: Placement,
    ) -> Result<ChannelLease> {
        self.write(|core| {
            core.run(|subsystems, ctx| subsystems.effects.play(ctx, pack, index, placement))
        })
        .unwrap_or_else(|| Err(self.busy()))
    }

    pub fn play_effect(&self, pack: &EffectPack, index: usize, placement: Placement) {
        if let Err(err) = self.try_play_effect(pack, index, placement) {
            self.report("play_effect", &err);
        }
    }

    pub fn try_play_random_effect(
        &self,
        pack: &EffectPack,
        placement: Placement,
    ) -> Result<ChannelLease> {
        self.write(|core| {
            core.run(|subsystems, ctx| subsystems.effects.play_random(ctx, pack, placement))
        })
        .unwrap_or_else(|| Err(self.busy()))
    }

    pub fn play_random_effect(&self, pack: &EffectPack, placement: Placement) {
        if let Err(err) = self.try_play_random_effect(pack, placement) {
            self.report("play_random_effect", &err);
        }
    }

    pub fn play_effect_at(&self, pack: &EffectPack, index: usize, position: Vec3) {
        self.play_effect(pack, index, Placement::at(position));
    }

    pub fn play_effect_on(&self, pack: &EffectPack, index: usize, node: NodeRef) {
        self.play_effect(pack, index, Placement::attached(node));
    }

    pub fn play_random_effect_at(&self, pack: &EffectPack, position: Vec3) {
        self.play_random_effect(pack, Placement::at(position));
    }

    pub fn play_random_effect_on(&self, pack: &EffectPack, node: NodeRef) {
        self.play_random_effect(pack, Placement::attached(node));
    }

    // Loops

    pub fn try_start_loop(&self, pack: &Arc<LoopPack>, request: LoopRequest) -> Result<LoopHandle> {
        let id = self
            .write(|core| {
                core.run(|subsystems, ctx| {
                    subsystems.loops.start(ctx, Arc::clone(pack), &request)
                })
            })
            .unwrap_or_else(|| Err(self.busy()))?;
        Ok(LoopHandle::new(id, Rc::downgrade(&self.core)))
    }

    pub fn start_loop(&self, pack: &Arc<LoopPack>, request: LoopRequest) -> Option<LoopHandle> {
        self.try_start_loop(pack, request)
            .map_err(|err| self.report("start_loop", &err))
            .ok()
    }

    /// Like [`try_start_loop`](Self::try_start_loop) with a random clip of `pack`.
    pub fn try_start_random_loop(
        &self,
        pack: &Arc<LoopPack>,
        request: LoopRequest,
    ) -> Result<LoopHandle> {
        let id = self
            .write(|core| {
                core.run(|subsystems, ctx| {
                    subsystems
                        .loops
                        .start_random(ctx, Arc::clone(pack), &request)
                })
            })
            .unwrap_or_else(|| Err(self.busy()))?;
        Ok(LoopHandle::new(id, Rc::downgrade(&self.core)))
    }

    pub fn start_random_loop(
        &self,
        pack: &Arc<LoopPack>,
        request: LoopRequest,
    ) -> Option<LoopHandle> {
        self.try_start_random_loop(pack, request)
            .map_err(|err| self.report("start_random_loop", &err))
            .ok()
    }

    pub fn stop_all_loops(&self, fade_out: Duration) {
        self.write(|core| core.run(|subsystems, ctx| subsystems.loops.stop_all(ctx, fade_out)));
    }

    pub fn stop_all_loops_immediate(&self) {
        self.write(|core| core.run(|subsystems, ctx| subsystems.loops.stop_all_immediate(ctx)));
    }

    /// Sweeps finished loops, then counts the rest.
    pub fn active_loop_count(&self) -> usize {
        self.write(|core| core.run(|subsystems, ctx| subsystems.loops.active_count(ctx)))
            .unwrap_or_default()
    }

    /// Sweeps finished loops, then returns a handle to each remaining one.
    pub fn active_loops(&self) -> Vec<LoopHandle> {
        self.write(|core| core.run(|subsystems, ctx| subsystems.loops.active_ids(ctx)))
            .unwrap_or_default()
            .into_iter()
            .map(|id| LoopHandle::new(id, Rc::downgrade(&self.core)))
            .collect()
    }

    // Channels

    pub fn channel_count(&self, category: ChannelCategory) -> usize {
        self.read(|core| core.pool.len_of(category))
            .unwrap_or_default()
    }

    pub fn idle_channel_count(&self, category: ChannelCategory) -> usize {
        self.read(|core| core.pool.idle_count(category, &*core.render))
            .unwrap_or_default()
    }

    /// Volume of a channel while `lease` still owns it.
    pub fn channel_volume(&self, lease: ChannelLease) -> Option<f32> {
        self.read(|core| core.pool.get(lease).map(|channel| channel.volume()))
            .flatten()
    }

    pub fn channel_voice(&self, lease: ChannelLease) -> Option<VoiceId> {
        self.read(|core| core.pool.get(lease).map(|channel| channel.voice()))
            .flatten()
    }

    pub fn is_channel_current(&self, lease: ChannelLease) -> bool {
        self.read(|core| core.pool.is_current(lease))
            .unwrap_or(false)
    }

    // Dispatch

    /// Makes this orchestrator the one `registry` dispatches to.
    pub fn activate(&self, registry: &DispatchRegistry) {
        registry.register(self);
    }

    /// Clears `registry` if it still points at this orchestrator.
    pub fn deactivate(&self, registry: &DispatchRegistry) {
        registry.unregister(self);
    }
}

/// Non-owning reference to a [`Strata`].
#[derive(Clone)]
pub struct WeakStrata {
    id: Uuid,
    core: Weak<RefCell<Core>>,
}

impl fmt::Debug for WeakStrata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakStrata").field("id", &self.id).finish()
    }
}

impl WeakStrata {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn upgrade(&self) -> Option<Strata> {
        self.core.upgrade().map(|core| Strata { id: self.id, core })
    }

    pub fn is_alive(&self) -> bool {
        self.core.strong_count() > 0
    }
}
