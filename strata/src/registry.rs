//! Explicit lookup of "the current orchestrator".
//!
//! Code that has no direct reference to a [`Strata`] (UI widgets, scripted
//! triggers) can go through a [`DispatchRegistry`] the application creates
//! and passes around. The registry only holds a weak reference; the last
//! orchestrator to [`activate`](Strata::activate) wins, and only that same
//! orchestrator can clear it again.

use crate::config::Placement;
use crate::loops::{LoopHandle, LoopRequest};
use crate::music::MusicRequest;
use crate::orchestrator::{Strata, WeakStrata};
use crate::pack::{EffectPack, LoopPack, MusicPack};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

type Resolver = Box<dyn Fn() -> Option<Strata>>;

#[derive(Default)]
pub struct DispatchRegistry {
    current: RefCell<Option<WeakStrata>>,
    resolver: RefCell<Option<Resolver>>,
    warned_missing: Cell<bool>,
}

impl fmt::Debug for DispatchRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchRegistry")
            .field("current", &self.current.borrow())
            .field("has_resolver", &self.resolver.borrow().is_some())
            .finish()
    }
}

impl DispatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry that falls back to `resolver` when nothing is registered.
    pub fn with_resolver(resolver: impl Fn() -> Option<Strata> + 'static) -> Self {
        let registry = Self::new();
        registry.set_resolver(resolver);
        registry
    }

    pub fn set_resolver(&self, resolver: impl Fn() -> Option<Strata> + 'static) {
        *self.resolver.borrow_mut() = Some(Box::new(resolver));
    }

    pub fn register(&self, strata: &Strata) {
        let mut current = self.current.borrow_mut();
        if let Some(previous) = current.as_ref() {
            if previous.id() != strata.id() && previous.is_alive() {
                log::warn!(
                    "Replacing registered orchestrator {} with {}",
                    previous.id(),
                    strata.id()
                );
            }
        }
        *current = Some(strata.downgrade());
        self.warned_missing.set(false);
        log::debug!("Orchestrator {} registered", strata.id());
    }

    /// Clears the registry, but only if `strata` is the one registered.
    pub fn unregister(&self, strata: &Strata) {
        let mut current = self.current.borrow_mut();
        if current
            .as_ref()
            .is_some_and(|registered| registered.id() == strata.id())
        {
            *current = None;
            log::debug!("Orchestrator {} unregistered", strata.id());
        }
    }

    /// The registered orchestrator, discovered through the resolver if needed.
    ///
    /// `None` is logged once until something gets registered again.
    pub fn current(&self) -> Option<Strata> {
        let registered = self
            .current
            .borrow()
            .as_ref()
            .and_then(WeakStrata::upgrade);
        if registered.is_some() {
            return registered;
        }
        self.discover()
    }

    /// Forgets the current entry and runs discovery again.
    pub fn refresh(&self) -> Option<Strata> {
        *self.current.borrow_mut() = None;
        self.discover()
    }

    pub fn is_available(&self) -> bool {
        self.current().is_some()
    }

    fn discover(&self) -> Option<Strata> {
        let found = self
            .resolver
            .borrow()
            .as_ref()
            .and_then(|resolver| resolver());
        match found {
            Some(strata) => {
                log::debug!("Discovered orchestrator {}", strata.id());
                self.register(&strata);
                Some(strata)
            }
            None => {
                if !self.warned_missing.replace(true) {
                    log::warn!("No orchestrator registered; audio calls will be ignored");
                }
                None
            }
        }
    }

    pub fn play_music(&self, pack: &Arc<MusicPack>, request: MusicRequest) {
        if let Some(strata) = self.current() {
            strata.play_music(pack, request);
        }
    }

    pub fn play_random_music(&self, pack: &Arc<MusicPack>, request: MusicRequest) {
        if let Some(strata) = self.current() {
            strata.play_random_music(pack, request);
        }
    }

    pub fn stop_music(&self, fade_out: Option<Duration>) {
        if let Some(strata) = self.current() {
            strata.stop_music(fade_out);
        }
    }

    pub fn play_effect(&self, pack: &EffectPack, index: usize, placement: Placement) {
        if let Some(strata) = self.current() {
            strata.play_effect(pack, index, placement);
        }
    }

    pub fn play_random_effect(&self, pack: &EffectPack, placement: Placement) {
        if let Some(strata) = self.current() {
            strata.play_random_effect(pack, placement);
        }
    }

    pub fn start_loop(&self, pack: &Arc<LoopPack>, request: LoopRequest) -> Option<LoopHandle> {
        self.current()?.start_loop(pack, request)
    }

    pub fn start_random_loop(
        &self,
        pack: &Arc<LoopPack>,
        request: LoopRequest,
    ) -> Option<LoopHandle> {
        self.current()?.start_random_loop(pack, request)
    }

    pub fn stop_all_loops(&self, fade_out: Duration) {
        if let Some(strata) = self.current() {
            strata.stop_all_loops(fade_out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::config::StrataDesc;
    use crate::music::MusicState;
    use crate::pack::{AudioClip, PackBase};
    use std::rc::Rc;

    fn strata() -> Strata {
        let backend = MemoryBackend::new();
        Strata::new(StrataDesc::default(), backend.clone(), backend).unwrap()
    }

    #[test]
    fn test_last_activation_wins() {
        let registry = DispatchRegistry::new();
        let first = strata();
        let second = strata();

        first.activate(&registry);
        second.activate(&registry);
        assert_eq!(registry.current().map(|s| s.id()), Some(second.id()));

        // Only the registered orchestrator can clear the entry
        first.deactivate(&registry);
        assert_eq!(registry.current().map(|s| s.id()), Some(second.id()));
        second.deactivate(&registry);
        assert!(!registry.is_available());
    }

    #[test]
    fn test_dropped_orchestrator_is_not_returned() {
        let registry = DispatchRegistry::new();
        {
            let strata = strata();
            strata.activate(&registry);
            assert!(registry.is_available());
        }
        assert!(registry.current().is_none());
    }

    #[test]
    fn test_resolver_discovers_lazily() {
        let owned = strata();
        let id = owned.id();
        let slot = Rc::new(RefCell::new(Some(owned)));
        let lookup = Rc::clone(&slot);
        let registry = DispatchRegistry::with_resolver(move || lookup.borrow().clone());

        assert_eq!(registry.current().map(|s| s.id()), Some(id));
        slot.borrow_mut().take();
        assert!(registry.refresh().is_none());
    }

    #[test]
    fn test_passthrough_noops_without_orchestrator() {
        let registry = DispatchRegistry::new();
        let pack = Arc::new(LoopPack::new(
            PackBase::new("Hum").with_clip(AudioClip::shared("hum", Duration::from_secs(2))),
        ));
        assert!(registry.start_loop(&pack, LoopRequest::default()).is_none());
        registry.stop_all_loops(Duration::from_secs(1));
    }

    #[test]
    fn test_passthrough_reaches_orchestrator() {
        let registry = DispatchRegistry::new();
        let strata = strata();
        strata.activate(&registry);

        let pack = Arc::new(MusicPack::new(
            PackBase::new("Theme").with_clip(AudioClip::shared("theme", Duration::from_secs(20))),
        ));
        registry.play_music(&pack, MusicRequest::default());
        assert_eq!(strata.music_state(), MusicState::Playing);
    }

    #[test]
    fn test_random_passthroughs_reach_orchestrator() {
        let registry = DispatchRegistry::new();
        let strata = strata();
        strata.activate(&registry);

        let theme = Arc::new(MusicPack::new(PackBase::new("Themes").with_clips([
            AudioClip::shared("day", Duration::from_secs(20)),
            AudioClip::shared("night", Duration::from_secs(20)),
        ])));
        registry.play_random_music(&theme, MusicRequest::default());
        assert_eq!(strata.music_state(), MusicState::Playing);

        let hum = Arc::new(LoopPack::new(PackBase::new("Hum").with_clips([
            AudioClip::shared("low", Duration::from_secs(2)),
            AudioClip::shared("high", Duration::from_secs(2)),
        ])));
        let handle = registry
            .start_random_loop(&hum, LoopRequest::default())
            .unwrap();
        assert!(handle.is_active());
        assert!(handle.clip_index().unwrap() < 2);

        registry.stop_music(None);
        assert_eq!(strata.music_state(), MusicState::Stopping);
    }
}
