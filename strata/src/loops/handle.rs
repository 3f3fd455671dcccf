use super::{LoopId, LoopState};
use crate::math::Vec3;
use crate::orchestrator::Core;
use std::cell::RefCell;
use std::fmt;
use std::rc::Weak;
use std::time::Duration;

/// Caller-held controller for one running loop.
///
/// Handles are cheap to clone and hold only a weak reference to the
/// orchestrator. Every method is a no-op once the loop has stopped, its
/// channel was reclaimed, or the orchestrator was dropped; queries then
/// report an inactive, silent loop.
#[derive(Clone)]
pub struct LoopHandle {
    id: LoopId,
    core: Weak<RefCell<Core>>,
}

impl fmt::Debug for LoopHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopHandle").field("id", &self.id).finish()
    }
}

impl PartialEq for LoopHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.core.ptr_eq(&other.core)
    }
}

impl LoopHandle {
    pub(crate) fn new(id: LoopId, core: Weak<RefCell<Core>>) -> Self {
        Self { id, core }
    }

    pub fn id(&self) -> LoopId {
        self.id
    }

    fn read<T>(&self, f: impl FnOnce(&Core) -> T) -> Option<T> {
        let cell = self.core.upgrade()?;
        let core = cell.try_borrow().ok()?;
        Some(f(&core))
    }

    fn write<T>(&self, f: impl FnOnce(&mut Core) -> T) -> Option<T> {
        let cell = self.core.upgrade()?;
        let Ok(mut core) = cell.try_borrow_mut() else {
            log::warn!("{}: orchestrator is busy; call ignored", self.id);
            return None;
        };
        Some(f(&mut core))
    }

    /// Playing (or paused) and not yet stopped.
    pub fn is_active(&self) -> bool {
        self.read(|core| core.loop_is_active(self.id))
            .unwrap_or(false)
    }

    pub fn state(&self) -> LoopState {
        self.read(|core| core.loop_state(self.id))
            .unwrap_or(LoopState::Inactive)
    }

    pub fn current_volume(&self) -> f32 {
        self.read(|core| core.loop_current_volume(self.id))
            .unwrap_or(0.0)
    }

    /// Volume the last `set_volume` / `fade_to_volume` aimed for, pack volume applied
    pub fn target_volume(&self) -> f32 {
        self.read(|core| core.loop_target_volume(self.id))
            .unwrap_or(0.0)
    }

    pub fn clip_index(&self) -> Option<usize> {
        self.read(|core| core.loop_clip_index(self.id)).flatten()
    }

    /// Sets the volume (0..1, scaled by the pack volume) at once.
    pub fn set_volume(&self, volume: f32) {
        let id = self.id;
        self.write(|core| core.run(|subsystems, ctx| subsystems.loops.set_volume(ctx, id, volume)));
    }

    pub fn fade_to_volume(&self, volume: f32, duration: Duration) {
        let id = self.id;
        self.write(|core| {
            core.run(|subsystems, ctx| subsystems.loops.fade_to_volume(ctx, id, volume, duration))
        });
    }

    /// Cross-fades to clip `index`. `None` uses the pack's cross-fade time.
    pub fn change_clip(&self, index: usize, crossfade: Option<Duration>) {
        let id = self.id;
        self.write(|core| {
            core.run(|subsystems, ctx| subsystems.loops.change_clip(ctx, id, index, crossfade))
        });
    }

    pub fn change_to_random_clip(&self, crossfade: Option<Duration>) {
        let id = self.id;
        self.write(|core| {
            core.run(|subsystems, ctx| subsystems.loops.change_to_random_clip(ctx, id, crossfade))
        });
    }

    /// Fades out and frees the channel. `None` uses the pack's fade-out.
    pub fn stop(&self, fade_out: Option<Duration>) {
        let id = self.id;
        self.write(|core| core.run(|subsystems, ctx| subsystems.loops.stop(ctx, id, fade_out)));
    }

    pub fn stop_immediate(&self) {
        let id = self.id;
        self.write(|core| core.run(|subsystems, ctx| subsystems.loops.stop_immediate(ctx, id)));
    }

    pub fn pause(&self) {
        let id = self.id;
        self.write(|core| core.run(|subsystems, ctx| subsystems.loops.pause(ctx, id)));
    }

    pub fn resume(&self) {
        let id = self.id;
        self.write(|core| core.run(|subsystems, ctx| subsystems.loops.resume(ctx, id)));
    }

    pub fn update_position(&self, position: Vec3) {
        let id = self.id;
        self.write(|core| {
            core.run(|subsystems, ctx| subsystems.loops.update_position(ctx, id, position))
        });
    }
}
