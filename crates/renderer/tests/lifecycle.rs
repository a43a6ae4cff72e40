use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::{Duration, Instant};

use renderer::{
    AlphaMode, Canvas, CapabilityError, CssSize, DeviceProvider, FrameScheduler, FrameTicket,
    GpuBackend, LifecycleState, LossNotifier, Pending, PixelSize, RenderError, RenderUnit,
    RenderUnitFactory, RenderUnitRegistry, Resolver, Status, SurfaceFault, SurfaceManager,
    SurfaceOptions, UnitResult,
};

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Configure { size: PixelSize, device: u32 },
    Unconfigure,
    Created(&'static str),
    Tick { unit: &'static str, millis: u32 },
    Dispose(&'static str),
}

type Log = Rc<RefCell<Vec<Event>>>;

#[derive(Default)]
struct BackendState {
    unsupported: Cell<bool>,
    deferred: Cell<bool>,
    issued: Cell<u32>,
    pending: RefCell<Vec<Resolver<Result<u32, CapabilityError>>>>,
    notifiers: RefCell<Vec<LossNotifier>>,
}

#[derive(Clone, Default)]
struct FakeBackend(Rc<BackendState>);

impl FakeBackend {
    fn next_device(&self) -> u32 {
        let id = self.0.issued.get() + 1;
        self.0.issued.set(id);
        id
    }

    fn requests(&self) -> usize {
        self.0.notifiers.borrow().len()
    }

    fn resolve(&self, result: Result<u32, CapabilityError>) {
        let resolver = self.0.pending.borrow_mut().remove(0);
        resolver.resolve(result);
    }

    fn lose_latest_device(&self) {
        if let Some(notifier) = self.0.notifiers.borrow().last() {
            notifier.notify("test loss");
        }
    }
}

impl GpuBackend for FakeBackend {
    type Device = u32;
    type Format = &'static str;
    type Context = Log;

    fn is_supported(&self) -> bool {
        !self.0.unsupported.get()
    }

    fn request_device(&self, loss: LossNotifier) -> Pending<Result<u32, CapabilityError>> {
        self.0.notifiers.borrow_mut().push(loss);
        if self.0.deferred.get() {
            let (resolver, pending) = Pending::channel();
            self.0.pending.borrow_mut().push(resolver);
            return pending;
        }
        Pending::ready(Ok(self.next_device()))
    }

    fn preferred_format(&self) -> &'static str {
        "bgra8unorm"
    }
}

struct FakeCanvas {
    css: CssSize,
    dpr: f64,
    pixels: PixelSize,
    log: Log,
}

impl Canvas<FakeBackend> for FakeCanvas {
    fn css_size(&self) -> CssSize {
        self.css
    }

    fn device_pixel_ratio(&self) -> f64 {
        self.dpr
    }

    fn pixel_size(&self) -> PixelSize {
        self.pixels
    }

    fn set_pixel_size(&mut self, size: PixelSize) {
        self.pixels = size;
    }

    fn context(&self) -> Log {
        self.log.clone()
    }

    fn configure(
        &mut self,
        device: &u32,
        _format: &'static str,
        _alpha: AlphaMode,
    ) -> Result<(), RenderError> {
        self.log.borrow_mut().push(Event::Configure {
            size: self.pixels,
            device: *device,
        });
        Ok(())
    }

    fn unconfigure(&mut self) {
        self.log.borrow_mut().push(Event::Unconfigure);
    }
}

#[derive(Debug, Default)]
struct FakeScheduler {
    requested: usize,
    cancelled: usize,
    outstanding: Option<FrameTicket>,
}

impl FrameScheduler for FakeScheduler {
    fn request_frame(&mut self, ticket: FrameTicket) {
        assert!(
            self.outstanding.is_none(),
            "requested {ticket} while {:?} is still outstanding",
            self.outstanding
        );
        self.requested += 1;
        self.outstanding = Some(ticket);
    }

    fn cancel_frame(&mut self, ticket: FrameTicket) {
        self.cancelled += 1;
        if self.outstanding == Some(ticket) {
            self.outstanding = None;
        }
    }
}

#[derive(Clone, Default)]
struct Faults(Rc<RefCell<VecDeque<RenderError>>>);

impl Faults {
    fn push(&self, err: RenderError) {
        self.0.borrow_mut().push_back(err);
    }
}

struct FakeUnit {
    name: &'static str,
    log: Log,
    faults: Faults,
}

impl RenderUnit for FakeUnit {
    fn tick(&mut self, delta_seconds: f32) -> Result<(), RenderError> {
        assert!(delta_seconds >= 0.0);
        self.log.borrow_mut().push(Event::Tick {
            unit: self.name,
            millis: (delta_seconds * 1000.0).round() as u32,
        });
        match self.faults.0.borrow_mut().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn dispose(&mut self) {
        self.log.borrow_mut().push(Event::Dispose(self.name));
    }
}

type Parked = Rc<RefCell<Vec<(Resolver<UnitResult>, Box<dyn RenderUnit>)>>>;

struct FakeFactory {
    name: &'static str,
    faults: Faults,
    defer: Rc<Cell<bool>>,
    parked: Parked,
}

impl RenderUnitFactory<FakeBackend> for FakeFactory {
    fn create(&self, _device: &u32, context: &Log, _format: &'static str) -> Pending<UnitResult> {
        context.borrow_mut().push(Event::Created(self.name));
        let unit: Box<dyn RenderUnit> = Box::new(FakeUnit {
            name: self.name,
            log: context.clone(),
            faults: self.faults.clone(),
        });
        if self.defer.get() {
            let (resolver, pending) = Pending::channel();
            self.parked.borrow_mut().push((resolver, unit));
            return pending;
        }
        Pending::ready(Ok(unit))
    }
}

type Manager = SurfaceManager<FakeBackend, FakeCanvas, FakeScheduler>;

struct Harness {
    backend: FakeBackend,
    provider: Rc<DeviceProvider<FakeBackend>>,
    registry: Rc<RenderUnitRegistry<FakeBackend>>,
    log: Log,
    faults: Faults,
    defer_units: Rc<Cell<bool>>,
    parked: Parked,
    start: Instant,
}

impl Harness {
    fn new() -> Self {
        let backend = FakeBackend::default();
        let faults = Faults::default();
        let defer_units = Rc::new(Cell::new(false));
        let parked = Parked::default();
        let factory = |name: &'static str| FakeFactory {
            name,
            faults: faults.clone(),
            defer: defer_units.clone(),
            parked: parked.clone(),
        };
        let mut registry = RenderUnitRegistry::new("a", factory("a"));
        registry.register("b", factory("b"));

        Self {
            provider: Rc::new(DeviceProvider::new(backend.clone())),
            registry: Rc::new(registry),
            backend,
            log: Log::default(),
            faults,
            defer_units,
            parked,
            start: Instant::now(),
        }
    }

    fn at(&self, millis: u64) -> Instant {
        self.start + Duration::from_millis(millis)
    }

    fn manager(&self, demo: &str, preview: bool) -> Manager {
        let canvas = FakeCanvas {
            css: CssSize::new(800.0, 450.0),
            dpr: 2.0,
            pixels: PixelSize::default(),
            log: self.log.clone(),
        };
        SurfaceManager::new(
            self.provider.clone(),
            self.registry.clone(),
            canvas,
            FakeScheduler::default(),
            SurfaceOptions::default(),
            demo,
            preview,
            self.start,
        )
    }

    fn events(&self) -> Vec<Event> {
        self.log.borrow().clone()
    }

    fn count(&self, matches: impl Fn(&Event) -> bool) -> usize {
        self.log.borrow().iter().filter(|event| matches(event)).count()
    }

    fn ticks(&self, name: &str) -> usize {
        self.count(|event| matches!(event, Event::Tick { unit, .. } if *unit == name))
    }

    fn created(&self, name: &str) -> usize {
        self.count(|event| matches!(event, Event::Created(unit) if *unit == name))
    }

    fn configures(&self) -> usize {
        self.count(|event| matches!(event, Event::Configure { .. }))
    }

    fn last_tick_millis(&self) -> Option<u32> {
        self.log.borrow().iter().rev().find_map(|event| match event {
            Event::Tick { millis, .. } => Some(*millis),
            _ => None,
        })
    }

    fn release_units(&self) {
        for (resolver, unit) in self.parked.borrow_mut().drain(..) {
            resolver.resolve(Ok(unit));
        }
    }
}

/// Delivers the outstanding frame callback, if any.
fn fire(manager: &mut Manager, now: Instant) -> bool {
    match manager.scheduler_mut().outstanding.take() {
        Some(ticket) => {
            manager.on_frame(ticket, now);
            true
        }
        None => false,
    }
}

fn visible_preview(harness: &Harness, demo: &str) -> Manager {
    let mut manager = harness.manager(demo, true);
    manager.set_visible(true, harness.start);
    manager
}

#[test]
fn full_canvas_runs_continuously_once_mounted() {
    let harness = Harness::new();
    let mut manager = harness.manager("a", false);
    manager.mount(harness.at(0));

    assert_eq!(manager.state(), LifecycleState::Running);
    assert_eq!(manager.status(), Status::Rendering);
    assert!(manager.is_continuous());
    assert_eq!(manager.scheduler().requested, 1);

    assert!(fire(&mut manager, harness.at(16)));
    assert!(fire(&mut manager, harness.at(33)));
    assert_eq!(harness.ticks("a"), 2);
    assert_eq!(manager.scheduler().requested, 3);
    assert_eq!(harness.last_tick_millis(), Some(17));
}

#[test]
fn configuration_is_idempotent_for_unchanged_size_and_device() {
    let harness = Harness::new();
    let mut manager = harness.manager("a", false);
    manager.mount(harness.at(0));
    assert_eq!(harness.configures(), 1);

    manager.handle_resize(harness.at(5));
    manager.poll(harness.at(6));
    assert!(fire(&mut manager, harness.at(16)));
    assert_eq!(harness.configures(), 1);

    manager.canvas_mut().css = CssSize::new(400.0, 300.0);
    manager.handle_resize(harness.at(20));
    assert_eq!(harness.configures(), 2);
    assert_eq!(manager.canvas().pixel_size(), PixelSize::new(800, 600));
    assert!(manager.is_continuous());
}

#[test]
fn hidden_preview_does_not_acquire_until_visible() {
    let harness = Harness::new();
    let mut manager = harness.manager("a", true);
    manager.mount(harness.at(0));

    assert_eq!(manager.state(), LifecycleState::Idle);
    assert_eq!(manager.status(), Status::Waiting);
    assert_eq!(harness.backend.requests(), 0);

    manager.set_visible(true, harness.at(10));
    assert_eq!(manager.state(), LifecycleState::Running);
    assert_eq!(manager.status(), Status::Preview);
    assert_eq!(harness.ticks("a"), 1);
    assert_eq!(manager.scheduler().requested, 0);
}

#[test]
fn visibility_flapping_reuses_one_render_unit() {
    let harness = Harness::new();
    let mut manager = visible_preview(&harness, "a");
    manager.mount(harness.at(0));
    assert_eq!(harness.ticks("a"), 1);

    manager.set_visible(false, harness.at(10));
    assert_eq!(manager.state(), LifecycleState::Paused);
    assert_eq!(manager.status(), Status::Paused);

    manager.set_visible(true, harness.at(20));
    assert_eq!(manager.state(), LifecycleState::Running);
    assert_eq!(harness.ticks("a"), 2);

    manager.set_hovered(true, harness.at(30));
    assert_eq!(manager.scheduler().requested, 1);
    manager.set_visible(false, harness.at(40));
    assert_eq!(manager.scheduler().outstanding, None);
    manager.set_visible(true, harness.at(50));
    assert_eq!(manager.scheduler().requested, 2);
    assert!(manager.scheduler().outstanding.is_some());

    assert_eq!(harness.created("a"), 1);
    assert_eq!(harness.count(|event| matches!(event, Event::Dispose(_))), 0);
}

#[test]
fn never_more_than_one_frame_outstanding() {
    let harness = Harness::new();
    let mut manager = visible_preview(&harness, "a");
    manager.mount(harness.at(0));

    manager.set_hovered(true, harness.at(1));
    manager.set_hovered(true, harness.at(2));
    let first = manager.pending_frame().expect("hover schedules a frame");
    assert!(fire(&mut manager, harness.at(16)));
    manager.on_frame(first, harness.at(17));

    manager.set_hovered(false, harness.at(20));
    manager.set_hovered(true, harness.at(21));
    manager.handle_resize(harness.at(22));
    let before_switch = manager.pending_frame().expect("hovered preview is continuous");

    manager.set_demo("b", harness.at(30));
    manager.on_frame(before_switch, harness.at(31));
    manager.set_visible(false, harness.at(40));
    manager.set_visible(true, harness.at(41));
    manager.set_preview(false, harness.at(50));
    assert!(fire(&mut manager, harness.at(60)));

    manager.unmount();
    assert_eq!(manager.scheduler().outstanding, None);

    // One single-shot tick at mount plus the one delivered frame.
    assert_eq!(harness.ticks("a"), 2);
    assert_eq!(harness.ticks("b"), 1);
}

#[test]
fn teardown_during_device_acquisition_discards_the_result() {
    let harness = Harness::new();
    harness.backend.0.deferred.set(true);
    let mut manager = harness.manager("a", false);

    manager.mount(harness.at(0));
    assert_eq!(manager.state(), LifecycleState::Acquiring);
    assert!(manager.is_settling());
    manager.unmount();

    harness.backend.resolve(Ok(7));
    manager.poll(harness.at(10));

    assert_eq!(manager.state(), LifecycleState::Idle);
    assert_eq!(harness.events(), Vec::<Event>::new());
    assert_eq!(manager.scheduler().requested, 0);
}

#[test]
fn unit_arriving_after_teardown_is_disposed_untouched() {
    let harness = Harness::new();
    harness.defer_units.set(true);
    let mut manager = harness.manager("a", false);

    manager.mount(harness.at(0));
    assert_eq!(manager.state(), LifecycleState::Configuring);
    manager.unmount();
    assert!(manager.is_settling());

    harness.release_units();
    manager.poll(harness.at(10));
    assert!(!manager.is_settling());

    assert_eq!(
        harness.events(),
        vec![
            Event::Configure {
                size: PixelSize::new(1600, 900),
                device: 1,
            },
            Event::Created("a"),
            Event::Unconfigure,
            Event::Dispose("a"),
        ]
    );
}

#[test]
fn deferred_unit_starts_running_once_polled() {
    let harness = Harness::new();
    harness.defer_units.set(true);
    let mut manager = harness.manager("a", false);
    manager.mount(harness.at(0));
    manager.poll(harness.at(5));
    assert_eq!(manager.state(), LifecycleState::Configuring);

    harness.release_units();
    manager.poll(harness.at(10));
    assert_eq!(manager.state(), LifecycleState::Running);
    assert_eq!(manager.status(), Status::Rendering);
    assert_eq!(harness.configures(), 1);
}

#[test]
fn single_shot_preview_ticks_once_per_entry() {
    let harness = Harness::new();
    let mut manager = visible_preview(&harness, "a");

    manager.mount(harness.at(100));
    assert_eq!(harness.ticks("a"), 1);
    assert_eq!(harness.last_tick_millis(), Some(100));

    manager.canvas_mut().css = CssSize::new(640.0, 360.0);
    manager.handle_resize(harness.at(200));
    assert_eq!(harness.ticks("a"), 2);
    assert_eq!(manager.canvas().pixel_size(), PixelSize::new(960, 540));

    manager.handle_resize(harness.at(300));
    assert_eq!(harness.ticks("a"), 3);

    manager.set_demo("b", harness.at(400));
    assert_eq!(harness.ticks("a"), 3);
    assert_eq!(harness.ticks("b"), 1);
    assert_eq!(manager.scheduler().requested, 0);
}

#[test]
fn hover_end_stops_without_ticking() {
    let harness = Harness::new();
    let mut manager = visible_preview(&harness, "a");
    manager.mount(harness.at(0));

    manager.set_hovered(true, harness.at(10));
    assert!(fire(&mut manager, harness.at(26)));
    manager.set_hovered(false, harness.at(30));

    assert_eq!(harness.ticks("a"), 2);
    assert!(!manager.is_continuous());
    assert_eq!(manager.scheduler().outstanding, None);
    assert_eq!(manager.scheduler().cancelled, 1);
}

#[test]
fn backing_size_follows_mode_limits() {
    let harness = Harness::new();

    let mut full = harness.manager("a", false);
    full.mount(harness.at(0));
    assert_eq!(full.canvas().pixel_size(), PixelSize::new(1600, 900));

    let mut preview = visible_preview(&harness, "a");
    preview.mount(harness.at(0));
    assert_eq!(preview.canvas().pixel_size(), PixelSize::new(960, 675));
}

#[test]
fn demo_switch_disposes_before_creating_replacement() {
    let harness = Harness::new();
    let mut manager = harness.manager("a", false);
    manager.mount(harness.at(0));
    assert!(fire(&mut manager, harness.at(16)));
    let stale = manager.pending_frame().expect("continuous canvas has a frame queued");

    manager.set_demo("b", harness.at(20));
    manager.on_frame(stale, harness.at(21));
    assert!(fire(&mut manager, harness.at(32)));

    let events = harness.events();
    let disposed = events
        .iter()
        .position(|event| *event == Event::Dispose("a"))
        .expect("outgoing unit disposed");
    let created = events
        .iter()
        .position(|event| *event == Event::Created("b"))
        .expect("incoming unit created");
    assert!(disposed < created);
    assert!(!events[disposed..]
        .iter()
        .any(|event| matches!(event, Event::Tick { unit: "a", .. })));
    assert_eq!(harness.ticks("b"), 1);
    assert_eq!(manager.demo_id(), "b");
}

#[test]
fn unknown_demo_falls_back_to_default_unit() {
    let harness = Harness::new();
    let mut manager = harness.manager("does-not-exist", false);
    manager.mount(harness.at(0));

    assert_eq!(manager.status(), Status::Rendering);
    assert_eq!(harness.created("a"), 1);
}

#[test]
fn device_loss_before_tick_stops_the_canvas() {
    let harness = Harness::new();
    let mut manager = harness.manager("a", false);
    manager.mount(harness.at(0));

    harness.backend.lose_latest_device();
    assert!(fire(&mut manager, harness.at(16)));

    assert_eq!(manager.status(), Status::DeviceLost);
    assert!(!manager.status().is_rendering());
    assert_eq!(manager.state(), LifecycleState::Error);
    assert_eq!(harness.ticks("a"), 0);
    assert_eq!(manager.scheduler().outstanding, None);
}

#[test]
fn device_loss_is_noticed_while_polling_and_remount_reacquires() {
    let harness = Harness::new();
    let mut manager = harness.manager("a", false);
    manager.mount(harness.at(0));

    harness.backend.lose_latest_device();
    manager.poll(harness.at(5));
    assert_eq!(manager.status(), Status::DeviceLost);

    manager.unmount();
    manager.mount(harness.at(100));
    assert_eq!(harness.backend.requests(), 2);
    assert_eq!(manager.status(), Status::Rendering);
    assert!(harness.events().contains(&Event::Configure {
        size: PixelSize::new(1600, 900),
        device: 2,
    }));
    assert_eq!(
        harness.count(|event| *event == Event::Dispose("a")),
        1,
        "the unit bound to the lost device is disposed on unmount"
    );
}

#[test]
fn device_loss_reported_by_unit_is_contained() {
    let harness = Harness::new();
    let mut manager = harness.manager("a", false);
    manager.mount(harness.at(0));

    harness.faults.push(RenderError::DeviceLost);
    assert!(fire(&mut manager, harness.at(16)));
    assert!(!fire(&mut manager, harness.at(32)));

    assert_eq!(manager.status(), Status::DeviceLost);
    assert_eq!(harness.ticks("a"), 1);
}

#[test]
fn outdated_surface_reconfigures_and_keeps_running() {
    let harness = Harness::new();
    let mut manager = harness.manager("a", false);
    manager.mount(harness.at(0));

    harness.faults.push(RenderError::from(SurfaceFault::Outdated));
    assert!(fire(&mut manager, harness.at(16)));
    assert_eq!(harness.configures(), 2);

    harness.faults.push(RenderError::from(SurfaceFault::Timeout));
    assert!(fire(&mut manager, harness.at(32)));
    assert_eq!(harness.configures(), 2);
    assert_eq!(manager.status(), Status::Rendering);
    assert!(manager.pending_frame().is_some());
}

#[test]
fn fatal_tick_error_stops_driving() {
    let harness = Harness::new();
    let mut manager = harness.manager("a", false);
    manager.mount(harness.at(0));

    harness
        .faults
        .push(RenderError::Allocation("buffer too large".into()));
    assert!(fire(&mut manager, harness.at(16)));

    assert_eq!(manager.status(), Status::Failed);
    assert_eq!(manager.state(), LifecycleState::Error);
    assert_eq!(manager.scheduler().outstanding, None);
}

#[test]
fn unsupported_platform_reports_without_requesting() {
    let harness = Harness::new();
    harness.backend.0.unsupported.set(true);
    let mut manager = harness.manager("a", false);
    manager.mount(harness.at(0));

    assert_eq!(manager.status(), Status::Unsupported);
    assert_eq!(manager.status().as_str(), "unsupported");
    assert_eq!(manager.state(), LifecycleState::Error);
    assert_eq!(harness.backend.requests(), 0);
}

#[test]
fn missing_adapter_is_reported_then_retried_on_demo_change() {
    let harness = Harness::new();
    harness.backend.0.deferred.set(true);
    let mut manager = harness.manager("a", false);
    manager.mount(harness.at(0));

    harness.backend.resolve(Err(CapabilityError::NoAdapter));
    manager.poll(harness.at(5));
    assert_eq!(manager.status(), Status::NoAdapter);
    assert_eq!(manager.status().to_string(), "no adapter");

    manager.set_demo("b", harness.at(10));
    assert_eq!(harness.backend.requests(), 2);
    harness.backend.resolve(Ok(3));
    manager.poll(harness.at(15));
    assert_eq!(manager.status(), Status::Rendering);
    assert_eq!(harness.created("b"), 1);
}

#[test]
fn shared_provider_negotiates_once_for_many_canvases() {
    let harness = Harness::new();
    harness.backend.0.deferred.set(true);
    let mut first = harness.manager("a", false);
    let mut second = harness.manager("b", false);
    first.mount(harness.at(0));
    second.mount(harness.at(0));
    assert_eq!(harness.backend.requests(), 1);

    harness.backend.resolve(Ok(1));
    first.poll(harness.at(5));
    second.poll(harness.at(5));
    assert_eq!(first.status(), Status::Rendering);
    assert_eq!(second.status(), Status::Rendering);
}

#[test]
fn resumed_preview_tick_is_clamped() {
    let harness = Harness::new();
    let mut manager = visible_preview(&harness, "a");
    manager.mount(harness.at(0));
    assert_eq!(harness.last_tick_millis(), Some(0));

    manager.set_visible(false, harness.at(10));
    manager.set_visible(true, harness.at(60_000));
    assert_eq!(harness.last_tick_millis(), Some(250));
}

#[test]
fn dropping_a_mounted_manager_tears_it_down() {
    let harness = Harness::new();
    let mut manager = harness.manager("a", false);
    manager.mount(harness.at(0));
    drop(manager);

    let events = harness.events();
    assert_eq!(
        &events[events.len() - 2..],
        &[Event::Dispose("a"), Event::Unconfigure]
    );
}

#[test]
fn lost_full_canvas_reacquires_on_next_poll() {
    let harness = Harness::new();
    let mut manager = harness.manager("a", false);
    manager.mount(harness.at(0));

    harness.backend.lose_latest_device();
    manager.poll(harness.at(5));
    assert_eq!(manager.status(), Status::DeviceLost);
    assert!(manager.is_settling(), "host keeps polling until the canvas recovers");

    manager.poll(harness.at(10));
    assert_eq!(harness.backend.requests(), 2);
    assert_eq!(manager.state(), LifecycleState::Running);
    assert_eq!(manager.status(), Status::Rendering);
    assert!(!manager.is_settling());
    assert_eq!(harness.count(|event| *event == Event::Dispose("a")), 1);
    assert_eq!(harness.created("a"), 2);
    assert!(harness.events().contains(&Event::Configure {
        size: PixelSize::new(1600, 900),
        device: 2,
    }));
    assert!(manager.scheduler().outstanding.is_some());
}

#[test]
fn lost_preview_reacquires_when_shown_again() {
    let harness = Harness::new();
    let mut manager = visible_preview(&harness, "a");
    manager.mount(harness.at(0));
    assert_eq!(harness.ticks("a"), 1);

    harness.backend.lose_latest_device();
    manager.poll(harness.at(5));
    manager.poll(harness.at(10));
    assert_eq!(manager.status(), Status::DeviceLost);
    assert_eq!(harness.backend.requests(), 1);

    manager.set_visible(false, harness.at(20));
    assert_eq!(manager.state(), LifecycleState::Error);
    manager.set_visible(true, harness.at(30));

    assert_eq!(harness.backend.requests(), 2);
    assert_eq!(manager.status(), Status::Preview);
    assert_eq!(harness.count(|event| *event == Event::Dispose("a")), 1);
    assert_eq!(harness.ticks("a"), 2);
}

#[test]
fn lost_preview_reacquires_on_hover() {
    let harness = Harness::new();
    let mut manager = visible_preview(&harness, "a");
    manager.mount(harness.at(0));

    harness.backend.lose_latest_device();
    manager.poll(harness.at(5));
    assert_eq!(manager.status(), Status::DeviceLost);

    manager.set_hovered(true, harness.at(10));
    assert_eq!(harness.backend.requests(), 2);
    assert!(manager.is_continuous());
    assert!(fire(&mut manager, harness.at(26)));
    assert_eq!(manager.status(), Status::Preview);
    assert_eq!(harness.count(|event| *event == Event::Dispose("a")), 1);
}

#[test]
fn unit_arriving_after_manager_is_dropped_is_still_disposed() {
    let harness = Harness::new();
    harness.defer_units.set(true);
    let mut manager = harness.manager("a", false);
    manager.mount(harness.at(0));
    assert_eq!(manager.state(), LifecycleState::Configuring);
    drop(manager);

    harness.release_units();
    assert!(harness.registry.has_abandoned());

    // Any surviving canvas reaps on its next poll.
    let mut next = harness.manager("b", true);
    next.poll(harness.at(10));

    assert!(!harness.registry.has_abandoned());
    assert_eq!(harness.count(|event| *event == Event::Dispose("a")), 1);
    assert_eq!(harness.ticks("a"), 0);
}
