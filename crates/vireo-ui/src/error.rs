//! Layer error types.

use crate::layer::LayerState;
use thiserror::Error;
use vireo_gpu::GpuError;

/// Errors returned by [`crate::UiLayer`].
#[derive(Error, Debug)]
pub enum LayerError {
    /// An operation was called in a state that does not allow it.
    #[error("{operation} called while the layer is {state:?}")]
    InvalidTransition {
        /// The rejected operation.
        operation: &'static str,
        /// State the layer was in.
        state: LayerState,
    },

    /// Bringing up the GPU target or the UI backend failed.
    #[error(transparent)]
    Gpu(#[from] GpuError),

    /// A frame stage failed unrecoverably.
    #[error("{stage} failed: {source}")]
    Frame {
        /// The failing stage.
        stage: &'static str,
        /// The underlying GPU error.
        #[source]
        source: GpuError,
    },
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, LayerError>;
