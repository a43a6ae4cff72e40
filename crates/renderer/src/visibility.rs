//! Viewport intersection tracking for preview canvases.
//!
//! [`ViewportObserver`] plays the role of an intersection observer: it knows
//! the viewport and every observed target rectangle and reports which targets
//! crossed the visibility threshold after each update. [`VisibilityGate`] is
//! the per-canvas registration; dropping it disconnects the target.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::mem;
use std::rc::{Rc, Weak};

/// Fraction of a target that must intersect the viewport to count as visible.
pub const DEFAULT_THRESHOLD: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = (self.x + self.width).min(other.x + other.width);
        let bottom = (self.y + self.height).min(other.y + other.height);
        if right <= left || bottom <= top {
            return None;
        }
        Some(Rect::new(left, top, right - left, bottom - top))
    }

    /// Share of `self` covered by `viewport`, in `[0, 1]`.
    pub fn intersection_ratio(&self, viewport: &Rect) -> f64 {
        let area = self.area();
        if area <= 0.0 {
            return 0.0;
        }
        self.intersection(viewport)
            .map(|overlap| (overlap.area() / area).clamp(0.0, 1.0))
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibilityChange {
    pub target: TargetId,
    pub visible: bool,
}

#[derive(Debug)]
struct Target {
    bounds: Rect,
    occluded: bool,
    visible: bool,
}

/// Ids whose gates were dropped while the observer was borrowed.
type Detached = Rc<RefCell<Vec<TargetId>>>;

#[derive(Debug)]
pub struct ViewportObserver {
    viewport: Rect,
    threshold: f64,
    targets: BTreeMap<TargetId, Target>,
    next_id: u64,
    detached: Detached,
}

impl ViewportObserver {
    pub fn new(viewport: Rect) -> Self {
        Self::with_threshold(viewport, DEFAULT_THRESHOLD)
    }

    pub fn with_threshold(viewport: Rect, threshold: f64) -> Self {
        Self {
            viewport,
            threshold: threshold.clamp(0.0, 1.0),
            targets: BTreeMap::new(),
            next_id: 1,
            detached: Detached::default(),
        }
    }

    pub fn viewport(&self) -> Rect {
        self.viewport
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn observed(&self) -> usize {
        let detached = self.detached.borrow();
        self.targets
            .keys()
            .filter(|id| !detached.contains(id))
            .count()
    }

    /// Starts observing `bounds`, returning the id and initial visibility.
    pub fn observe(&mut self, bounds: Rect) -> (TargetId, bool) {
        self.sweep();
        let id = TargetId(self.next_id);
        self.next_id += 1;
        let visible = self.evaluate(&bounds, false);
        self.targets.insert(
            id,
            Target {
                bounds,
                occluded: false,
                visible,
            },
        );
        (id, visible)
    }

    pub fn unobserve(&mut self, id: TargetId) -> bool {
        self.sweep();
        self.targets.remove(&id).is_some()
    }

    pub fn is_visible(&self, id: TargetId) -> bool {
        !self.detached.borrow().contains(&id)
            && self.targets.get(&id).is_some_and(|target| target.visible)
    }

    pub fn set_viewport(&mut self, viewport: Rect) -> Vec<VisibilityChange> {
        self.sweep();
        self.viewport = viewport;
        let ids: Vec<TargetId> = self.targets.keys().copied().collect();
        ids.into_iter()
            .filter_map(|id| self.refresh(id))
            .collect()
    }

    pub fn set_bounds(&mut self, id: TargetId, bounds: Rect) -> Option<VisibilityChange> {
        self.sweep();
        self.targets.get_mut(&id)?.bounds = bounds;
        self.refresh(id)
    }

    pub fn set_occluded(&mut self, id: TargetId, occluded: bool) -> Option<VisibilityChange> {
        self.sweep();
        self.targets.get_mut(&id)?.occluded = occluded;
        self.refresh(id)
    }

    /// Drops targets whose gates went away while the observer was borrowed.
    fn sweep(&mut self) {
        let detached = mem::take(&mut *self.detached.borrow_mut());
        for id in detached {
            self.targets.remove(&id);
            tracing::trace!(?id, "removed detached visibility target");
        }
    }

    fn refresh(&mut self, id: TargetId) -> Option<VisibilityChange> {
        let (bounds, occluded) = {
            let target = self.targets.get(&id)?;
            (target.bounds, target.occluded)
        };
        let visible = self.evaluate(&bounds, occluded);
        let target = self.targets.get_mut(&id)?;
        if target.visible == visible {
            return None;
        }
        target.visible = visible;
        Some(VisibilityChange {
            target: id,
            visible,
        })
    }

    fn evaluate(&self, bounds: &Rect, occluded: bool) -> bool {
        if occluded {
            return false;
        }
        let ratio = bounds.intersection_ratio(&self.viewport);
        ratio > 0.0 && ratio >= self.threshold
    }
}

/// One canvas's registration with a shared [`ViewportObserver`].
#[derive(Debug)]
pub struct VisibilityGate {
    observer: Weak<RefCell<ViewportObserver>>,
    detached: Detached,
    id: TargetId,
}

impl VisibilityGate {
    pub fn attach(observer: &Rc<RefCell<ViewportObserver>>, bounds: Rect) -> Self {
        let mut inner = observer.borrow_mut();
        let (id, visible) = inner.observe(bounds);
        let detached = inner.detached.clone();
        drop(inner);
        tracing::trace!(?id, visible, "visibility gate attached");
        Self {
            observer: Rc::downgrade(observer),
            detached,
            id,
        }
    }

    pub fn id(&self) -> TargetId {
        self.id
    }

    pub fn is_visible(&self) -> bool {
        self.observer.upgrade().is_some_and(|observer| {
            let observer = observer.borrow();
            observer.is_visible(self.id)
        })
    }

    /// Returns the new visibility if it changed.
    pub fn update_bounds(&self, bounds: Rect) -> Option<bool> {
        let observer = self.observer.upgrade()?;
        let change = observer.borrow_mut().set_bounds(self.id, bounds);
        change.map(|change| change.visible)
    }

    /// Returns the new visibility if it changed.
    pub fn set_occluded(&self, occluded: bool) -> Option<bool> {
        let observer = self.observer.upgrade()?;
        let change = observer.borrow_mut().set_occluded(self.id, occluded);
        change.map(|change| change.visible)
    }

    pub fn disconnect(self) {}
}

impl Drop for VisibilityGate {
    fn drop(&mut self) {
        let Some(observer) = self.observer.upgrade() else {
            return;
        };
        match observer.try_borrow_mut() {
            Ok(mut observer) => {
                observer.unobserve(self.id);
            }
            Err(_) => {
                tracing::debug!(id = ?self.id, "observer busy; deferring visibility target removal");
                self.detached.borrow_mut().push(self.id);
            }
        };
    }
}
