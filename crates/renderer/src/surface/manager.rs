use std::mem;
use std::rc::Rc;
use std::task::Poll;
use std::time::{Duration, Instant};

use crate::canvas::{AlphaMode, Canvas, PixelSize};
use crate::device::{DeviceHandle, DeviceId, DeviceProvider, GpuBackend};
use crate::error::{CapabilityError, RenderError, TickDisposition};
use crate::frame::{FrameScheduler, FrameTicket};
use crate::pending::{Pending, PendingPoll};
use crate::unit::{RenderUnit, RenderUnitRegistry, UnitResult};

use super::clock::{TickClock, DEFAULT_MAX_TICK_DELTA};
use super::sizing::{backing_size, SizingLimits};
use super::status::{LifecycleState, Status};

/// Knobs the manager honours.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceOptions {
    pub preview: SizingLimits,
    pub full: SizingLimits,
    pub max_tick_delta: Duration,
}

impl Default for SurfaceOptions {
    fn default() -> Self {
        Self {
            preview: SizingLimits::PREVIEW,
            full: SizingLimits::FULL,
            max_tick_delta: DEFAULT_MAX_TICK_DELTA,
        }
    }
}

struct Session<D> {
    device: DeviceHandle<D>,
    unit: Box<dyn RenderUnit>,
}

enum Drive {
    Continuous { frame: Option<FrameTicket> },
    SingleShot,
}

enum Phase<D> {
    Idle,
    Acquiring,
    Instantiating {
        device: DeviceHandle<D>,
        pending: Pending<UnitResult>,
    },
    Running {
        session: Session<D>,
        drive: Drive,
    },
    Paused {
        session: Session<D>,
    },
    Disposing,
    Failed {
        session: Option<Session<D>>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Configured {
    size: PixelSize,
    device: DeviceId,
}

/// Drives one canvas: device acquisition, surface configuration, render unit
/// lifetime and tick scheduling.
///
/// All inputs are explicit method calls carrying the current time. Async
/// work (device negotiation, render unit creation) is advanced by
/// [`poll`](Self::poll); frame callbacks arrive through
/// [`on_frame`](Self::on_frame). Whatever the sequence of inputs, at most one
/// frame request is outstanding and a unit is never ticked once its teardown
/// began.
pub struct SurfaceManager<B, C, S>
where
    B: GpuBackend,
    C: Canvas<B>,
    S: FrameScheduler,
{
    provider: Rc<DeviceProvider<B>>,
    registry: Rc<RenderUnitRegistry<B>>,
    canvas: C,
    scheduler: S,
    options: SurfaceOptions,
    demo_id: String,
    preview: bool,
    mounted: bool,
    visible: bool,
    hovered: bool,
    generation: u64,
    serial: u64,
    phase: Phase<B::Device>,
    configured: Option<Configured>,
    clock: TickClock,
    status: Status,
}

impl<B, C, S> SurfaceManager<B, C, S>
where
    B: GpuBackend,
    C: Canvas<B>,
    S: FrameScheduler,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        provider: Rc<DeviceProvider<B>>,
        registry: Rc<RenderUnitRegistry<B>>,
        canvas: C,
        scheduler: S,
        options: SurfaceOptions,
        demo_id: impl Into<String>,
        preview: bool,
        now: Instant,
    ) -> Self {
        Self {
            provider,
            registry,
            canvas,
            scheduler,
            options,
            demo_id: demo_id.into(),
            preview,
            mounted: false,
            visible: false,
            hovered: false,
            generation: 0,
            serial: 0,
            phase: Phase::Idle,
            configured: None,
            clock: TickClock::new(now, options.max_tick_delta),
            status: Status::Waiting,
        }
    }

    pub fn state(&self) -> LifecycleState {
        match &self.phase {
            Phase::Idle => LifecycleState::Idle,
            Phase::Acquiring => LifecycleState::Acquiring,
            Phase::Instantiating { .. } => LifecycleState::Configuring,
            Phase::Running { .. } => LifecycleState::Running,
            Phase::Paused { .. } => LifecycleState::Paused,
            Phase::Disposing => LifecycleState::Disposing,
            Phase::Failed { .. } => LifecycleState::Error,
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn demo_id(&self) -> &str {
        &self.demo_id
    }

    pub fn is_preview(&self) -> bool {
        self.preview
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The frame request currently outstanding, if any.
    pub fn pending_frame(&self) -> Option<FrameTicket> {
        match &self.phase {
            Phase::Running {
                drive: Drive::Continuous { frame },
                ..
            } => *frame,
            _ => None,
        }
    }

    pub fn is_continuous(&self) -> bool {
        matches!(
            &self.phase,
            Phase::Running {
                drive: Drive::Continuous { .. },
                ..
            }
        )
    }

    /// Whether async work is in flight and the host should keep polling.
    pub fn is_settling(&self) -> bool {
        matches!(
            &self.phase,
            Phase::Acquiring | Phase::Instantiating { .. }
        ) || self.awaits_recovery()
            || self.registry.has_abandoned()
    }

    pub fn canvas(&self) -> &C {
        &self.canvas
    }

    pub fn canvas_mut(&mut self) -> &mut C {
        &mut self.canvas
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    pub fn mount(&mut self, now: Instant) {
        if self.mounted {
            return;
        }
        self.mounted = true;
        self.generation += 1;
        tracing::debug!(demo = %self.demo_id, preview = self.preview, generation = self.generation, "canvas mounted");
        self.start(now);
    }

    /// Tears everything down. Work still in flight is discarded when it lands.
    pub fn unmount(&mut self) {
        if !self.mounted {
            return;
        }
        self.teardown();
        self.mounted = false;
        self.generation += 1;
        if self.configured.take().is_some() {
            self.canvas.unconfigure();
        }
        tracing::debug!(demo = %self.demo_id, "canvas unmounted");
    }

    /// Visibility only gates previews; full canvases always count as visible.
    pub fn set_visible(&mut self, visible: bool, now: Instant) {
        if self.visible == visible {
            return;
        }
        self.visible = visible;
        if !self.preview || !self.mounted {
            return;
        }
        tracing::trace!(demo = %self.demo_id, visible, "visibility changed");

        if visible {
            if self.is_device_lost() {
                self.recover(now);
                return;
            }
            match mem::replace(&mut self.phase, Phase::Idle) {
                Phase::Paused { session } => self.enter_running(session, now),
                Phase::Idle => self.start(now),
                other => self.phase = other,
            }
        } else {
            self.cancel_frame();
            match mem::replace(&mut self.phase, Phase::Idle) {
                Phase::Running { session, .. } => {
                    self.phase = Phase::Paused { session };
                    self.status = Status::Paused;
                }
                other => self.phase = other,
            }
        }
    }

    /// Hover switches a running preview between single-shot and continuous
    /// driving without recreating its render unit.
    pub fn set_hovered(&mut self, hovered: bool, now: Instant) {
        if self.hovered == hovered {
            return;
        }
        self.hovered = hovered;
        if !self.preview {
            return;
        }
        tracing::trace!(demo = %self.demo_id, hovered, "hover changed");

        if hovered {
            if self.is_device_lost() && self.should_run() {
                self.recover(now);
                return;
            }
            if let Phase::Running { drive, .. } = &mut self.phase {
                if matches!(drive, Drive::SingleShot) {
                    *drive = Drive::Continuous { frame: None };
                }
            }
            self.schedule_frame();
        } else {
            self.cancel_frame();
            if let Phase::Running { drive, .. } = &mut self.phase {
                *drive = Drive::SingleShot;
            }
        }
    }

    pub fn set_demo(&mut self, demo_id: &str, now: Instant) {
        if self.demo_id == demo_id {
            return;
        }
        tracing::debug!(from = %self.demo_id, to = demo_id, "switching demo");
        self.demo_id = demo_id.to_string();
        self.restart(now);
    }

    pub fn set_preview(&mut self, preview: bool, now: Instant) {
        if self.preview == preview {
            return;
        }
        self.preview = preview;
        self.restart(now);
    }

    /// Window or layout resize. Continuous canvases reconfigure in place;
    /// single-shot previews reconfigure and render one frame.
    pub fn handle_resize(&mut self, now: Instant) {
        match &self.phase {
            Phase::Running {
                drive: Drive::Continuous { .. },
                ..
            } => {
                self.reconfigure(false);
            }
            Phase::Running {
                drive: Drive::SingleShot,
                ..
            } => {
                if self.reconfigure(false) {
                    self.tick(now);
                }
            }
            _ => {}
        }
    }

    /// Advances device acquisition, render unit creation and creations left
    /// behind by earlier teardowns. A full canvas whose device was lost
    /// starts over with a fresh device.
    pub fn poll(&mut self, now: Instant) {
        self.registry.reap_abandoned();

        if self.awaits_recovery() {
            self.recover(now);
            return;
        }
        match &self.phase {
            Phase::Acquiring => {
                if let Poll::Ready(result) = self.provider.poll_acquisition() {
                    self.on_device(result, now);
                }
            }
            Phase::Instantiating { .. } => self.poll_instantiation(now),
            Phase::Running { session, .. } => {
                if !self.provider.is_current(&session.device) {
                    self.on_device_lost();
                }
            }
            _ => {}
        }
    }

    /// Host frame callback. Tickets other than the outstanding one are stale
    /// and dropped without touching the unit.
    pub fn on_frame(&mut self, ticket: FrameTicket, now: Instant) {
        match &mut self.phase {
            Phase::Running {
                drive: Drive::Continuous { frame },
                ..
            } if *frame == Some(ticket) => {
                *frame = None;
            }
            _ => {
                tracing::trace!(%ticket, "discarding stale frame callback");
                return;
            }
        }
        self.tick(now);
        self.schedule_frame();
    }

    fn is_device_lost(&self) -> bool {
        matches!(self.phase, Phase::Failed { .. }) && self.status == Status::DeviceLost
    }

    /// Previews recover on their next visibility or hover change instead.
    fn awaits_recovery(&self) -> bool {
        !self.preview && self.mounted && self.is_device_lost()
    }

    /// Disposes the unit bound to the lost device and acquires again.
    fn recover(&mut self, now: Instant) {
        tracing::info!(demo = %self.demo_id, "re-acquiring GPU device after loss");
        self.restart(now);
    }

    fn should_run(&self) -> bool {
        self.mounted && (self.visible || !self.preview)
    }

    fn wants_continuous(&self) -> bool {
        !self.preview || self.hovered
    }

    fn sizing_limits(&self) -> SizingLimits {
        if self.preview {
            self.options.preview
        } else {
            self.options.full
        }
    }

    fn start(&mut self, now: Instant) {
        debug_assert!(matches!(self.phase, Phase::Idle));
        if !self.should_run() {
            self.status = Status::Waiting;
            return;
        }
        self.phase = Phase::Acquiring;
        self.status = Status::Waiting;
        if let Poll::Ready(result) = self.provider.acquire_device() {
            self.on_device(result, now);
        }
    }

    fn restart(&mut self, now: Instant) {
        if !self.mounted {
            return;
        }
        self.teardown();
        self.generation += 1;
        self.start(now);
    }

    fn on_device(&mut self, result: Result<DeviceHandle<B::Device>, CapabilityError>, now: Instant) {
        let device = match result {
            Ok(device) => device,
            Err(err) => {
                tracing::warn!(demo = %self.demo_id, error = %err, "GPU unavailable for canvas");
                self.phase = Phase::Failed { session: None };
                self.status = Status::from(&err);
                return;
            }
        };

        if !self.should_run() {
            // Hidden while negotiating; the provider keeps the device cached.
            self.phase = Phase::Idle;
            self.status = Status::Waiting;
            return;
        }

        if let Err(err) = self.configure(&device, false) {
            tracing::error!(demo = %self.demo_id, error = %err, "failed to configure canvas");
            self.phase = Phase::Failed { session: None };
            self.status = Status::Failed;
            return;
        }

        let factory = self.registry.load(&self.demo_id);
        let context = self.canvas.context();
        let format = self.provider.preferred_format();
        tracing::debug!(
            demo = %self.demo_id,
            resolved = self.registry.resolve_id(&self.demo_id),
            device = %device.id(),
            "creating render unit"
        );
        let pending = factory.create(device.device(), &context, format);
        self.phase = Phase::Instantiating { device, pending };
        self.poll_instantiation(now);
    }

    fn poll_instantiation(&mut self, now: Instant) {
        let Phase::Instantiating { pending, .. } = &mut self.phase else {
            return;
        };
        let result = match pending.poll() {
            PendingPoll::Waiting => return,
            PendingPoll::Ready(result) => result,
            PendingPoll::Closed => Err(RenderError::Allocation(
                "render unit creation was abandoned".into(),
            )),
        };
        let Phase::Instantiating { device, .. } = mem::replace(&mut self.phase, Phase::Idle) else {
            return;
        };

        match result {
            Ok(unit) => {
                tracing::debug!(demo = %self.demo_id, "render unit ready");
                self.enter_running(Session { device, unit }, now);
            }
            Err(err) => {
                tracing::error!(demo = %self.demo_id, error = %err, "failed to create render unit");
                self.phase = Phase::Failed { session: None };
                self.status = Status::Failed;
            }
        }
    }

    fn enter_running(&mut self, session: Session<B::Device>, now: Instant) {
        if !self.should_run() {
            self.phase = Phase::Paused { session };
            self.status = Status::Paused;
            return;
        }
        if !self.provider.is_current(&session.device) {
            self.phase = Phase::Failed {
                session: Some(session),
            };
            self.on_device_lost();
            return;
        }
        if let Err(err) = self.configure(&session.device, false) {
            tracing::error!(demo = %self.demo_id, error = %err, "failed to configure canvas");
            self.phase = Phase::Failed {
                session: Some(session),
            };
            self.status = Status::Failed;
            return;
        }

        self.status = if self.preview {
            Status::Preview
        } else {
            Status::Rendering
        };
        if self.wants_continuous() {
            self.phase = Phase::Running {
                session,
                drive: Drive::Continuous { frame: None },
            };
            self.schedule_frame();
        } else {
            self.phase = Phase::Running {
                session,
                drive: Drive::SingleShot,
            };
            self.tick(now);
        }
    }

    /// Sizes the pixel buffer and binds the presentation context. Skips the
    /// context call when neither size nor device changed, unless forced.
    fn configure(
        &mut self,
        device: &DeviceHandle<B::Device>,
        force: bool,
    ) -> Result<(), RenderError> {
        let target = backing_size(
            self.canvas.css_size(),
            self.canvas.device_pixel_ratio(),
            self.sizing_limits(),
        );
        let resized = self.canvas.pixel_size() != target;
        if resized {
            self.canvas.set_pixel_size(target);
        }

        let wanted = Configured {
            size: target,
            device: device.id(),
        };
        if !force && !resized && self.configured == Some(wanted) {
            return Ok(());
        }

        self.configured = None;
        self.canvas
            .configure(device.device(), self.provider.preferred_format(), AlphaMode::Opaque)?;
        self.configured = Some(wanted);
        tracing::debug!(demo = %self.demo_id, size = %target, device = %device.id(), "canvas configured");
        Ok(())
    }

    /// Returns whether the manager is still running afterwards.
    fn reconfigure(&mut self, force: bool) -> bool {
        let Phase::Running { session, .. } = &self.phase else {
            return false;
        };
        let device = session.device.clone();
        match self.configure(&device, force) {
            Ok(()) => true,
            Err(err) => {
                tracing::error!(demo = %self.demo_id, error = %err, "failed to reconfigure canvas");
                self.fail_running(Status::Failed);
                false
            }
        }
    }

    fn tick(&mut self, now: Instant) {
        let dt = self.clock.delta(now);
        let Phase::Running { session, .. } = &mut self.phase else {
            return;
        };
        if !self.provider.is_current(&session.device) {
            self.on_device_lost();
            return;
        }

        let Err(err) = session.unit.tick(dt) else {
            return;
        };
        if matches!(err, RenderError::DeviceLost) {
            self.on_device_lost();
            return;
        }
        match err.disposition() {
            TickDisposition::Reconfigure => {
                tracing::debug!(demo = %self.demo_id, error = %err, "surface needs reconfiguration");
                self.reconfigure(true);
            }
            TickDisposition::SkipFrame => {
                tracing::debug!(demo = %self.demo_id, error = %err, "skipping frame");
            }
            TickDisposition::Fatal => {
                tracing::error!(demo = %self.demo_id, error = %err, "render unit failed");
                self.fail_running(Status::Failed);
            }
        }
    }

    fn schedule_frame(&mut self) {
        let Phase::Running {
            drive: Drive::Continuous { frame },
            ..
        } = &mut self.phase
        else {
            return;
        };
        if frame.is_some() {
            return;
        }
        self.serial += 1;
        let ticket = FrameTicket::new(self.generation, self.serial);
        *frame = Some(ticket);
        self.scheduler.request_frame(ticket);
    }

    fn cancel_frame(&mut self) {
        if let Phase::Running {
            drive: Drive::Continuous { frame },
            ..
        } = &mut self.phase
        {
            if let Some(ticket) = frame.take() {
                self.scheduler.cancel_frame(ticket);
            }
        }
    }

    fn on_device_lost(&mut self) {
        tracing::warn!(demo = %self.demo_id, "GPU device lost; canvas stopped");
        self.fail_running(Status::DeviceLost);
    }

    /// Stops driving but keeps the unit until teardown.
    fn fail_running(&mut self, status: Status) {
        self.cancel_frame();
        let session = match mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Running { session, .. } | Phase::Paused { session } => Some(session),
            Phase::Failed { session } => session,
            other => {
                self.phase = other;
                return;
            }
        };
        self.phase = Phase::Failed { session };
        self.status = status;
    }

    fn teardown(&mut self) {
        self.cancel_frame();
        let outgoing = mem::replace(&mut self.phase, Phase::Disposing);
        match outgoing {
            Phase::Running { session, .. }
            | Phase::Paused { session }
            | Phase::Failed {
                session: Some(session),
            } => {
                let Session { mut unit, .. } = session;
                unit.dispose();
                tracing::debug!(demo = %self.demo_id, "render unit disposed");
            }
            Phase::Instantiating { pending, .. } => {
                tracing::debug!(demo = %self.demo_id, "abandoning render unit creation in flight");
                self.registry.abandon(pending);
            }
            Phase::Idle | Phase::Acquiring | Phase::Disposing | Phase::Failed { session: None } => {}
        }
        self.phase = Phase::Idle;
        self.status = Status::Waiting;
    }
}

impl<B, C, S> Drop for SurfaceManager<B, C, S>
where
    B: GpuBackend,
    C: Canvas<B>,
    S: FrameScheduler,
{
    fn drop(&mut self) {
        self.unmount();
    }
}
