use std::cell::Cell;
use std::rc::Rc;

use super::signal::Subscription;

/// Shared flag flipped once at teardown.
///
/// Asynchronous completions hold a clone and check it before touching any
/// viewer state.
#[derive(Debug, Clone, Default)]
pub struct DisposedFlag(Rc<Cell<bool>>);

impl DisposedFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.0.set(true);
    }

    pub fn is_set(&self) -> bool {
        self.0.get()
    }
}

struct Entry {
    label: String,
    release: Box<dyn FnOnce()>,
}

/// Release callbacks recorded in acquisition order and run in reverse
pub struct DisposableSet {
    entries: Vec<Entry>,
    disposed: bool,
}

impl DisposableSet {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            disposed: false,
        }
    }

    /// Record a release step. Adding to an already disposed set runs the
    /// release immediately so nothing acquired late can leak.
    pub fn push(&mut self, label: impl Into<String>, release: impl FnOnce() + 'static) {
        let label = label.into();
        if self.disposed {
            log::debug!("releasing {} (set already disposed)", label);
            release();
            return;
        }
        self.entries.push(Entry {
            label,
            release: Box::new(release),
        });
    }

    pub fn push_subscription(&mut self, label: impl Into<String>, subscription: Subscription) {
        self.push(label, move || subscription.unsubscribe());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Run every release in reverse order. Returns how many ran; a second
    /// call runs nothing.
    pub fn dispose(&mut self) -> usize {
        if self.disposed {
            return 0;
        }
        self.disposed = true;

        let mut released = 0;
        while let Some(entry) = self.entries.pop() {
            log::debug!("releasing {}", entry.label);
            (entry.release)();
            released += 1;
        }
        released
    }
}

impl Default for DisposableSet {
    fn default() -> Self {
        Self::new()
    }
}
