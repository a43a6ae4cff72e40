use std::fmt;

/// Identifies one requested frame callback.
///
/// A ticket is only honoured if it is the one the manager is currently
/// waiting on; anything older is dropped on arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameTicket {
    generation: u64,
    serial: u64,
}

impl FrameTicket {
    pub(crate) fn new(generation: u64, serial: u64) -> Self {
        Self { generation, serial }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn serial(&self) -> u64 {
        self.serial
    }
}

impl fmt::Display for FrameTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame {}/{}", self.generation, self.serial)
    }
}

/// Host side of per-display-refresh callbacks.
///
/// The host hands the ticket back through
/// [`SurfaceManager::on_frame`](crate::SurfaceManager::on_frame) when the
/// frame fires. Cancelling is best effort; late deliveries are discarded by
/// the manager regardless.
pub trait FrameScheduler {
    fn request_frame(&mut self, ticket: FrameTicket);

    fn cancel_frame(&mut self, ticket: FrameTicket);
}
