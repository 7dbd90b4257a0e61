//! Progress reporting for flattening.
//!
//! A run over `n` components is reported as `n * STEPS_PER_COMPONENT` steps.
//! Each component gets a [`Slot`] and its solver maps iterations into it.
//!
//! ```
//! use squisher::algo::progress::Progress;
//!
//! let progress = Progress::new(|current, total, message| {
//!     eprintln!("[{}/{}] {}", current, total, message);
//! });
//! progress.slot(1, 4).iteration(50, 100, "relaxing springs");
//! progress.finish(4);
//! ```

/// Steps reported per component.
pub const STEPS_PER_COMPONENT: usize = 1000;

type Callback = dyn Fn(usize, usize, &str) + Send + Sync;

/// A callback receiving `(current, total, message)` updates.
pub struct Progress {
    callback: Box<Callback>,
}

impl Progress {
    /// Create a progress reporter with the given callback.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(usize, usize, &str) + Send + Sync + 'static,
    {
        Self {
            callback: Box::new(callback),
        }
    }

    /// A reporter that discards all updates.
    pub fn none() -> Self {
        Self::new(|_, _, _| {})
    }

    /// Report raw progress.
    #[inline]
    pub fn report(&self, current: usize, total: usize, message: &str) {
        (self.callback)(current, total, message);
    }

    /// The share of the run belonging to component `index` of `count`.
    pub fn slot(&self, index: usize, count: usize) -> Slot<'_> {
        Slot {
            progress: self,
            index,
            count,
        }
    }

    /// Report the end of a run over `count` components.
    pub fn finish(&self, count: usize) {
        let total = count.max(1) * STEPS_PER_COMPONENT;
        self.report(total, total, "flattening complete");
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::none()
    }
}

impl std::fmt::Debug for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Progress").finish_non_exhaustive()
    }
}

/// One component's share of a [`Progress`].
#[derive(Debug, Clone, Copy)]
pub struct Slot<'a> {
    progress: &'a Progress,
    index: usize,
    count: usize,
}

impl Slot<'_> {
    /// Report iteration `done` of at most `cap`.
    ///
    /// Never reaches the end of the slot; [`Progress::finish`] does that.
    #[inline]
    pub fn iteration(&self, done: usize, cap: usize, message: &str) {
        if cap == 0 || self.count == 0 {
            return;
        }
        let within = (done.min(cap - 1) * STEPS_PER_COMPONENT) / cap;
        self.progress.report(
            self.index * STEPS_PER_COMPONENT + within,
            self.count * STEPS_PER_COMPONENT,
            message,
        );
    }
}
