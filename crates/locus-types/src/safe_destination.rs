//! Safe-destination strategy port.
//!
//! Teleport callers ask a [`SafeDestination`] to adjust a target position
//! before moving an owner there. [`DefaultSafeDestination`] is always
//! available; hosts may install an external provider through
//! [`SafeDestinations::with_provider`], and any provider failure falls back
//! to the default.

/// An external provider could not compute a safe position.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("safe destination provider failed: {0}")]
pub struct SafeDestinationError(pub String);

/// Strategy that turns a requested target into a position safe to occupy.
pub trait SafeDestination: Send + Sync {
    /// Find a safe position near `target` in `world`.
    fn find_safe_location(
        &self,
        world: &str,
        target: crate::Coordinates,
    ) -> Result<crate::Coordinates, SafeDestinationError>;
}

/// Fallback strategy: the requested target is used as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSafeDestination;

impl SafeDestination for DefaultSafeDestination {
    fn find_safe_location(
        &self,
        _world: &str,
        target: crate::Coordinates,
    ) -> Result<crate::Coordinates, SafeDestinationError> {
        Ok(target)
    }
}

/// The registered strategy, with the default as a safety net.
#[derive(Default)]
pub struct SafeDestinations {
    provider: Option<Box<dyn SafeDestination>>,
}

impl SafeDestinations {
    /// Use only the default strategy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an external provider that overrides the default.
    #[must_use]
    pub fn with_provider(mut self, provider: impl SafeDestination + 'static) -> Self {
        self.provider = Some(Box::new(provider));
        self
    }

    /// Whether an external provider is registered.
    pub const fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    /// Resolve a safe position, never failing.
    pub fn resolve(&self, world: &str, target: crate::Coordinates) -> crate::Coordinates {
        let Some(provider) = &self.provider else {
            return target;
        };
        match provider.find_safe_location(world, target) {
            Ok(safe) => safe,
            Err(e) => {
                tracing::debug!(world, error = %e, "Safe destination provider failed, using default");
                DefaultSafeDestination
                    .find_safe_location(world, target)
                    .unwrap_or(target)
            }
        }
    }
}
