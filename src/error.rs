use std::fmt;

use thiserror::Error;

/// Which asset a load error or progress event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Model,
    Environment,
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetKind::Model => write!(f, "model"),
            AssetKind::Environment => write!(f, "environment"),
        }
    }
}

/// Network or decode failure for one asset. Recoverable: the viewer keeps
/// running with whatever else loaded.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("failed to load {kind} from {url}: {message}")]
pub struct AssetLoadError {
    pub kind: AssetKind,
    pub url: String,
    pub message: String,
}

impl AssetLoadError {
    pub fn new(kind: AssetKind, url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            url: url.into(),
            message: message.into(),
        }
    }

    /// Flatten an anyhow chain into a single message
    pub fn from_anyhow(kind: AssetKind, url: impl Into<String>, err: &anyhow::Error) -> Self {
        Self::new(kind, url, format!("{:#}", err))
    }
}

/// The immersive capability query itself failed (treated as unsupported)
#[derive(Debug, Clone, PartialEq, Error)]
#[error("immersive capability probe failed: {0}")]
pub struct CapabilityProbeError(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionTransition {
    Start,
    End,
}

impl fmt::Display for SessionTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionTransition::Start => write!(f, "start"),
            SessionTransition::End => write!(f, "end"),
        }
    }
}

/// Starting or ending an immersive session failed; the viewer stays in its prior mode
#[derive(Debug, Clone, PartialEq, Error)]
#[error("immersive session {transition} failed: {message}")]
pub struct SessionTransitionError {
    pub transition: SessionTransition,
    pub message: String,
}

impl SessionTransitionError {
    pub fn new(transition: SessionTransition, message: impl Into<String>) -> Self {
        Self {
            transition,
            message: message.into(),
        }
    }
}

/// Invalid configuration, rejected when the viewer is constructed
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid configuration: {0}")]
pub struct ConfigurationError(pub String);

impl ConfigurationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ViewerError {
    #[error(transparent)]
    AssetLoad(#[from] AssetLoadError),
    #[error(transparent)]
    CapabilityProbe(#[from] CapabilityProbeError),
    #[error(transparent)]
    SessionTransition(#[from] SessionTransitionError),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}
