use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{AssetKind, AssetLoadError};

/// Load state of one asset
#[derive(Debug)]
pub enum AssetHandle<T> {
    Pending,
    Ready(Rc<T>),
    Failed(AssetLoadError),
}

impl<T> AssetHandle<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, AssetHandle::Pending)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, AssetHandle::Ready(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, AssetHandle::Failed(_))
    }

    pub fn ready(&self) -> Option<&Rc<T>> {
        match self {
            AssetHandle::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&AssetLoadError> {
        match self {
            AssetHandle::Failed(err) => Some(err),
            _ => None,
        }
    }
}

impl<T> Clone for AssetHandle<T> {
    fn clone(&self) -> Self {
        match self {
            AssetHandle::Pending => AssetHandle::Pending,
            AssetHandle::Ready(value) => AssetHandle::Ready(value.clone()),
            AssetHandle::Failed(err) => AssetHandle::Failed(err.clone()),
        }
    }
}

/// Shared cell holding an [`AssetHandle`]; settles at most once
pub struct AssetSlot<T> {
    kind: AssetKind,
    url: String,
    state: Rc<RefCell<AssetHandle<T>>>,
}

impl<T> AssetSlot<T> {
    pub fn pending(kind: AssetKind, url: impl Into<String>) -> Self {
        Self {
            kind,
            url: url.into(),
            state: Rc::new(RefCell::new(AssetHandle::Pending)),
        }
    }

    pub fn kind(&self) -> AssetKind {
        self.kind
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn handle(&self) -> AssetHandle<T> {
        self.state.borrow().clone()
    }

    pub fn is_pending(&self) -> bool {
        self.state.borrow().is_pending()
    }

    /// Move from Pending to Ready or Failed. Returns false (and leaves the
    /// slot untouched) if it already settled.
    pub fn resolve(&self, result: Result<Rc<T>, AssetLoadError>) -> bool {
        let mut state = self.state.borrow_mut();
        if !state.is_pending() {
            log::warn!("{} asset {} already settled; ignoring second result", self.kind, self.url);
            return false;
        }

        *state = match result {
            Ok(value) => AssetHandle::Ready(value),
            Err(err) => AssetHandle::Failed(err),
        };
        true
    }
}

impl<T> Clone for AssetSlot<T> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            url: self.url.clone(),
            state: self.state.clone(),
        }
    }
}

/// Bytes received so far for one asset
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadProgress {
    pub kind: AssetKind,
    pub loaded: u64,
    pub total: Option<u64>,
}

impl LoadProgress {
    pub fn new(kind: AssetKind, loaded: u64, total: Option<u64>) -> Self {
        Self {
            kind,
            loaded,
            total,
        }
    }

    /// Completed fraction in [0, 1], if the total size is known
    pub fn fraction(&self) -> Option<f32> {
        match self.total {
            Some(0) => Some(1.0),
            Some(total) => Some((self.loaded as f64 / total as f64).min(1.0) as f32),
            None => None,
        }
    }
}
