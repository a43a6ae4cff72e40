//! Shared GPU device acquisition.
//!
//! [`DeviceProvider`] is created once per page and handed to every canvas
//! through an `Rc`. It negotiates at most one device at a time, caches it,
//! and drops the cached handle as soon as the platform reports it lost.
//! Holders of an older handle find out through [`DeviceProvider::is_current`].

use std::cell::{Cell, OnceCell, RefCell};
use std::fmt;
use std::task::Poll;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::error::CapabilityError;
use crate::pending::{Pending, PendingPoll};

/// Platform hooks the provider and the surface manager are generic over.
///
/// The native implementation is [`crate::gpu::WgpuBackend`]; tests plug in
/// fakes.
pub trait GpuBackend: 'static {
    type Device: Clone + 'static;
    type Format: Copy + fmt::Debug + PartialEq + 'static;
    /// Per-canvas presentation context handed to render units.
    type Context: Clone + 'static;

    /// Whether the platform exposes any GPU capability at all.
    fn is_supported(&self) -> bool;

    /// Starts adapter then device negotiation. The backend must forward any
    /// later loss of the returned device to `loss`.
    fn request_device(&self, loss: LossNotifier) -> Pending<Result<Self::Device, CapabilityError>>;

    fn preferred_format(&self) -> Self::Format;
}

/// Identifies one successfully negotiated device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(u64);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "device#{}", self.0)
    }
}

/// Cloneable reference to the shared device.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceHandle<D> {
    id: DeviceId,
    device: D,
}

impl<D> DeviceHandle<D> {
    pub fn id(&self) -> DeviceId {
        self.id
    }

    pub fn device(&self) -> &D {
        &self.device
    }
}

#[derive(Debug)]
struct DeviceLoss {
    device: DeviceId,
    reason: String,
}

/// Reports device loss back to the provider. Safe to move into platform
/// callbacks on any thread.
#[derive(Debug, Clone)]
pub struct LossNotifier {
    device: DeviceId,
    tx: Sender<DeviceLoss>,
}

impl LossNotifier {
    pub fn device_id(&self) -> DeviceId {
        self.device
    }

    pub fn notify(&self, reason: impl Into<String>) {
        let loss = DeviceLoss {
            device: self.device,
            reason: reason.into(),
        };
        // The provider may already be gone during shutdown.
        let _ = self.tx.send(loss);
    }
}

enum ProviderState<D> {
    Empty,
    Acquiring {
        id: DeviceId,
        pending: Pending<Result<D, CapabilityError>>,
    },
    Ready(DeviceHandle<D>),
    Failed(CapabilityError),
}

pub struct DeviceProvider<B: GpuBackend> {
    backend: B,
    state: RefCell<ProviderState<B::Device>>,
    format: OnceCell<B::Format>,
    next_id: Cell<u64>,
    loss_tx: Sender<DeviceLoss>,
    loss_rx: Receiver<DeviceLoss>,
}

impl<B: GpuBackend> DeviceProvider<B> {
    pub fn new(backend: B) -> Self {
        let (loss_tx, loss_rx) = unbounded();
        Self {
            backend,
            state: RefCell::new(ProviderState::Empty),
            format: OnceCell::new(),
            next_id: Cell::new(1),
            loss_tx,
            loss_rx,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns the cached device, joins the acquisition in flight, or starts
    /// a new one. A previous failure is not cached across calls: invoking this
    /// again after an error makes a fresh attempt.
    pub fn acquire_device(&self) -> Poll<Result<DeviceHandle<B::Device>, CapabilityError>> {
        self.drain_losses();
        let restart = matches!(
            &*self.state.borrow(),
            ProviderState::Empty | ProviderState::Failed(_)
        );
        if restart {
            self.start_acquisition();
        }
        self.poll_acquisition()
    }

    /// Advances the acquisition without starting a new attempt after failure.
    pub fn poll_acquisition(&self) -> Poll<Result<DeviceHandle<B::Device>, CapabilityError>> {
        self.drain_losses();
        if matches!(&*self.state.borrow(), ProviderState::Empty) {
            // Lost between the caller starting and polling; negotiate again.
            self.start_acquisition();
        }

        let mut state = self.state.borrow_mut();
        let settled = match &mut *state {
            ProviderState::Acquiring { id, pending } => match pending.poll() {
                PendingPoll::Waiting => return Poll::Pending,
                PendingPoll::Ready(Ok(device)) => {
                    tracing::debug!(id = %*id, "GPU device ready");
                    Some(ProviderState::Ready(DeviceHandle { id: *id, device }))
                }
                PendingPoll::Ready(Err(err)) => {
                    tracing::warn!(id = %*id, error = %err, "GPU device acquisition failed");
                    Some(ProviderState::Failed(err))
                }
                PendingPoll::Closed => {
                    let err =
                        CapabilityError::DeviceRequest("device request was abandoned".into());
                    tracing::warn!(id = %*id, error = %err, "GPU device acquisition failed");
                    Some(ProviderState::Failed(err))
                }
            },
            _ => None,
        };
        if let Some(next) = settled {
            *state = next;
        }

        match &*state {
            ProviderState::Ready(handle) => Poll::Ready(Ok(handle.clone())),
            ProviderState::Failed(err) => Poll::Ready(Err(err.clone())),
            ProviderState::Empty | ProviderState::Acquiring { .. } => Poll::Pending,
        }
    }

    /// Whether `handle` still refers to the live cached device.
    pub fn is_current(&self, handle: &DeviceHandle<B::Device>) -> bool {
        self.drain_losses();
        matches!(&*self.state.borrow(), ProviderState::Ready(current) if current.id == handle.id)
    }

    pub fn current_device(&self) -> Option<DeviceHandle<B::Device>> {
        self.drain_losses();
        match &*self.state.borrow() {
            ProviderState::Ready(handle) => Some(handle.clone()),
            _ => None,
        }
    }

    /// Queried from the backend once and reused for the life of the provider.
    pub fn preferred_format(&self) -> B::Format {
        *self.format.get_or_init(|| {
            let format = self.backend.preferred_format();
            tracing::debug!(?format, "resolved preferred presentation format");
            format
        })
    }

    fn start_acquisition(&self) {
        let id = DeviceId(self.next_id.get());
        self.next_id.set(id.0 + 1);

        if !self.backend.is_supported() {
            tracing::warn!("GPU rendering is unavailable on this platform");
            *self.state.borrow_mut() = ProviderState::Failed(CapabilityError::Unsupported);
            return;
        }

        tracing::debug!(%id, "requesting GPU adapter and device");
        let notifier = LossNotifier {
            device: id,
            tx: self.loss_tx.clone(),
        };
        let pending = self.backend.request_device(notifier);
        *self.state.borrow_mut() = ProviderState::Acquiring { id, pending };
    }

    fn drain_losses(&self) {
        while let Ok(loss) = self.loss_rx.try_recv() {
            let mut state = self.state.borrow_mut();
            let retire = match &*state {
                ProviderState::Ready(handle) => handle.id == loss.device,
                ProviderState::Acquiring { id, .. } => *id == loss.device,
                ProviderState::Empty | ProviderState::Failed(_) => false,
            };
            if retire {
                tracing::warn!(device = %loss.device, reason = %loss.reason, "GPU device lost");
                *state = ProviderState::Empty;
            } else {
                tracing::debug!(device = %loss.device, "ignoring loss report for a retired device");
            }
        }
    }
}
