//! Per-component runtime context.
//!
//! Every component receives a [`VcuContext`] in its constructor instead of
//! reaching for process-wide statics. The context carries the validated
//! vehicle configuration and the tracing span the component logs under.

use std::sync::Arc;

use tracing::{Span, info_span};
use vcu_common::vehicle::config::VehicleConfig;

/// Shared configuration plus the component's tracing span.
#[derive(Debug, Clone)]
pub struct VcuContext {
    config: Arc<VehicleConfig>,
    span: Span,
}

impl VcuContext {
    /// Root context. The configuration must already be validated.
    pub fn new(config: VehicleConfig) -> Self {
        Self {
            config: Arc::new(config),
            span: info_span!("vcu"),
        }
    }

    /// Child context for one component, logging under `vcu:module{component}`.
    pub fn module(&self, name: &'static str) -> Self {
        Self {
            config: Arc::clone(&self.config),
            span: info_span!(parent: &self.span, "module", component = name),
        }
    }

    #[inline]
    pub fn config(&self) -> &VehicleConfig {
        &self.config
    }

    #[inline]
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Supervisory tick period [ms].
    #[inline]
    pub fn tick_period_ms(&self) -> u32 {
        self.config.vcu.tick_period_ms
    }
}

impl Default for VcuContext {
    fn default() -> Self {
        Self::new(VehicleConfig::default())
    }
}
