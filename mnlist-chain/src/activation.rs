//! Activation gating.
//!
//! The registry only processes blocks once the deployment that enables it
//! is active. Whether it is active at a height is decided elsewhere (by
//! version-bits signalling on a real chain); the manager just asks.

/// Answers whether the deterministic registry is active at a height.
pub trait ActivationOracle: Send + Sync {
    /// Check if blocks at `height` are processed by the registry.
    fn is_active(&self, height: u32) -> bool;
}

/// Activation at a fixed height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedActivation {
    height: Option<u32>,
}

impl FixedActivation {
    /// Active from `height` on.
    pub fn at(height: u32) -> Self {
        Self { height: Some(height) }
    }

    /// Active from genesis.
    pub fn always() -> Self {
        Self::at(0)
    }

    /// Never active.
    pub fn never() -> Self {
        Self { height: None }
    }

    /// Activation height, if any.
    pub fn height(&self) -> Option<u32> {
        self.height
    }
}

impl ActivationOracle for FixedActivation {
    fn is_active(&self, height: u32) -> bool {
        self.height.is_some_and(|h| height >= h)
    }
}

impl<F> ActivationOracle for F
where
    F: Fn(u32) -> bool + Send + Sync,
{
    fn is_active(&self, height: u32) -> bool {
        self(height)
    }
}
