//! Render unit contract and the id-keyed registry of factories.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::device::GpuBackend;
use crate::error::RenderError;
use crate::pending::{Pending, PendingPoll};

/// One demo instance bound to one canvas.
///
/// `tick` advances by `delta_seconds` (always `>= 0`) and submits exactly one
/// frame of GPU work. `dispose` releases what the unit allocated and nothing
/// else; it is called at most once and the unit is never ticked afterwards.
pub trait RenderUnit {
    fn tick(&mut self, delta_seconds: f32) -> Result<(), RenderError>;

    fn dispose(&mut self) {}
}

pub type UnitResult = Result<Box<dyn RenderUnit>, RenderError>;

/// Builds independent render units against a device, a canvas context and
/// the presentation format.
pub trait RenderUnitFactory<B: GpuBackend> {
    fn create(
        &self,
        device: &B::Device,
        context: &B::Context,
        format: B::Format,
    ) -> Pending<UnitResult>;
}

impl<B, F> RenderUnitFactory<B> for F
where
    B: GpuBackend,
    F: Fn(&B::Device, &B::Context, B::Format) -> Pending<UnitResult>,
{
    fn create(
        &self,
        device: &B::Device,
        context: &B::Context,
        format: B::Format,
    ) -> Pending<UnitResult> {
        self(device, context, format)
    }
}

/// Maps demo ids to factories with a mandatory fallback.
///
/// Unknown ids never fail: [`RenderUnitRegistry::load`] hands back the
/// default factory so a renamed or mistyped id still renders something.
///
/// The registry also keeps creations whose canvas was torn down before they
/// resolved. They outlive the manager that started them and are disposed,
/// never ticked, by [`reap_abandoned`](Self::reap_abandoned).
pub struct RenderUnitRegistry<B: GpuBackend> {
    default_id: String,
    factories: BTreeMap<String, Rc<dyn RenderUnitFactory<B>>>,
    abandoned: RefCell<Vec<Pending<UnitResult>>>,
}

impl<B: GpuBackend> RenderUnitRegistry<B> {
    pub fn new(default_id: impl Into<String>, default: impl RenderUnitFactory<B> + 'static) -> Self {
        let default_id = default_id.into();
        let mut factories: BTreeMap<String, Rc<dyn RenderUnitFactory<B>>> = BTreeMap::new();
        factories.insert(default_id.clone(), Rc::new(default));
        Self {
            default_id,
            factories,
            abandoned: RefCell::new(Vec::new()),
        }
    }

    /// Registers `factory` under `id`, replacing any previous entry.
    pub fn register(
        &mut self,
        id: impl Into<String>,
        factory: impl RenderUnitFactory<B> + 'static,
    ) -> &mut Self {
        self.factories.insert(id.into(), Rc::new(factory));
        self
    }

    pub fn default_id(&self) -> &str {
        &self.default_id
    }

    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// The id whose factory [`load`](Self::load) returns for `id`.
    pub fn resolve_id<'a>(&'a self, id: &'a str) -> &'a str {
        if self.contains(id) {
            id
        } else {
            &self.default_id
        }
    }

    pub fn load(&self, id: &str) -> Rc<dyn RenderUnitFactory<B>> {
        if let Some(factory) = self.factories.get(id) {
            return factory.clone();
        }
        tracing::debug!(
            requested = id,
            fallback = %self.default_id,
            "unknown demo id; using default render unit"
        );
        self.factories
            .get(&self.default_id)
            .cloned()
            .unwrap_or_else(|| unreachable!("default factory is inserted at construction"))
    }

    /// Takes over a creation nobody will tick.
    pub fn abandon(&self, pending: Pending<UnitResult>) {
        self.abandoned.borrow_mut().push(pending);
    }

    pub fn has_abandoned(&self) -> bool {
        !self.abandoned.borrow().is_empty()
    }

    /// Disposes abandoned units that have arrived. Returns how many.
    pub fn reap_abandoned(&self) -> usize {
        let mut disposed = 0;
        self.abandoned
            .borrow_mut()
            .retain_mut(|pending| match pending.poll() {
                PendingPoll::Waiting => true,
                PendingPoll::Ready(Ok(mut unit)) => {
                    unit.dispose();
                    disposed += 1;
                    false
                }
                PendingPoll::Ready(Err(_)) | PendingPoll::Closed => false,
            });
        if disposed > 0 {
            tracing::debug!(disposed, "disposed render units that arrived after teardown");
        }
        disposed
    }
}

impl<B: GpuBackend> fmt::Debug for RenderUnitRegistry<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderUnitRegistry")
            .field("default_id", &self.default_id)
            .field("ids", &self.factories.keys().collect::<Vec<_>>())
            .field("abandoned", &self.abandoned.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::device::LossNotifier;
    use crate::error::CapabilityError;
    use crate::pending::PendingPoll;

    struct NullBackend;

    impl GpuBackend for NullBackend {
        type Device = ();
        type Format = ();
        type Context = Rc<RefCell<Vec<&'static str>>>;

        fn is_supported(&self) -> bool {
            true
        }

        fn request_device(&self, _loss: LossNotifier) -> Pending<Result<(), CapabilityError>> {
            Pending::ready(Ok(()))
        }

        fn preferred_format(&self) {}
    }

    struct Named(&'static str, Rc<RefCell<Vec<&'static str>>>);

    impl RenderUnit for Named {
        fn tick(&mut self, _delta_seconds: f32) -> Result<(), RenderError> {
            self.1.borrow_mut().push(self.0);
            Ok(())
        }
    }

    fn factory(name: &'static str) -> impl RenderUnitFactory<NullBackend> {
        move |_: &(), log: &Rc<RefCell<Vec<&'static str>>>, _: ()| -> Pending<UnitResult> {
            Pending::ready(Ok(Box::new(Named(name, log.clone()))))
        }
    }

    fn tick_loaded(registry: &RenderUnitRegistry<NullBackend>, id: &str) -> Vec<&'static str> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut pending = registry.load(id).create(&(), &log, ());
        let PendingPoll::Ready(Ok(mut unit)) = pending.poll() else {
            panic!("factory should resolve immediately");
        };
        unit.tick(0.0).unwrap();
        let ticks = log.borrow().clone();
        ticks
    }

    #[test]
    fn known_ids_resolve_to_their_factory() {
        let mut registry = RenderUnitRegistry::new("triangle", factory("triangle"));
        registry.register("clear", factory("clear"));
        assert_eq!(tick_loaded(&registry, "clear"), vec!["clear"]);
        assert_eq!(registry.resolve_id("clear"), "clear");
    }

    #[test]
    fn unknown_ids_fall_back_to_default() {
        let mut registry = RenderUnitRegistry::new("triangle", factory("triangle"));
        registry.register("clear", factory("clear"));
        assert_eq!(tick_loaded(&registry, "no-such-demo"), vec!["triangle"]);
        assert_eq!(tick_loaded(&registry, ""), vec!["triangle"]);
        assert_eq!(registry.resolve_id("no-such-demo"), "triangle");
    }

    #[test]
    fn abandoned_units_are_disposed_when_they_arrive() {
        struct Disposed(Rc<RefCell<Vec<&'static str>>>);

        impl RenderUnit for Disposed {
            fn tick(&mut self, _delta_seconds: f32) -> Result<(), RenderError> {
                self.0.borrow_mut().push("tick");
                Ok(())
            }

            fn dispose(&mut self) {
                self.0.borrow_mut().push("dispose");
            }
        }

        let registry = RenderUnitRegistry::new("triangle", factory("triangle"));
        let log = Rc::new(RefCell::new(Vec::new()));
        let (resolver, pending) = Pending::<UnitResult>::channel();
        let (failing, failed) = Pending::<UnitResult>::channel();
        registry.abandon(pending);
        registry.abandon(failed);

        assert_eq!(registry.reap_abandoned(), 0);
        assert!(registry.has_abandoned());

        assert!(resolver.resolve(Ok(Box::new(Disposed(log.clone())))));
        failing.resolve(Err(RenderError::Allocation("oom".into())));
        assert_eq!(registry.reap_abandoned(), 1);
        assert!(!registry.has_abandoned());
        assert_eq!(*log.borrow(), vec!["dispose"]);
    }

    #[test]
    fn each_create_yields_an_independent_unit() {
        let registry = RenderUnitRegistry::new("triangle", factory("triangle"));
        let log = Rc::new(RefCell::new(Vec::new()));
        let factory = registry.load("triangle");
        let mut a = factory.create(&(), &log, ());
        let mut b = factory.create(&(), &log, ());
        let (PendingPoll::Ready(Ok(mut a)), PendingPoll::Ready(Ok(mut b))) = (a.poll(), b.poll())
        else {
            panic!("factories should resolve immediately");
        };
        a.tick(0.0).unwrap();
        b.tick(0.0).unwrap();
        a.dispose();
        assert_eq!(log.borrow().len(), 2);
        assert_eq!(registry.ids().count(), 1);
    }
}
