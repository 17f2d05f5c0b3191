// SPDX-License-Identifier: CEPL-1.0
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Everything the frame lifecycle cannot recover from.
///
/// Stale or suboptimal surfaces never show up here: those are absorbed by
/// rebuilding the swap chain.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("begin_frame called while a frame is already in progress")]
    FrameAlreadyInProgress,

    #[error("no frame in progress")]
    NoFrameInProgress,

    #[error("command buffer does not belong to the frame in progress")]
    CommandBufferMismatch,

    #[error("swap chain image or depth format changed ({previous} -> {current})")]
    FormatDrift { previous: String, current: String },

    #[error("swap chain returned image {index} but only {count} command buffers exist")]
    ImageIndexOutOfRange { index: u32, count: usize },

    #[error("no swap chain (an earlier recreation failed)")]
    NoSwapChain,

    /// The window was closed while the renderer waited for it to regain
    /// a drawable area.
    #[error("window closed while waiting for a drawable surface")]
    WindowClosed,

    #[error("{context}: {source}")]
    Backend {
        context: &'static str,
        #[source]
        source: BoxError,
    },
}

impl RenderError {
    /// Wraps a backend failure with the operation that produced it.
    pub fn backend<E>(context: &'static str, source: E) -> Self
    where
        E: Into<BoxError>,
    {
        RenderError::Backend {
            context,
            source: source.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_error_keeps_context_and_source() {
        let err = RenderError::backend("acquire_next_image", "device lost");
        assert_eq!(err.to_string(), "acquire_next_image: device lost");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn format_drift_names_both_formats() {
        let err = RenderError::FormatDrift {
            previous: "B8G8R8A8_SRGB".into(),
            current: "R8G8B8A8_SRGB".into(),
        };
        assert!(err.to_string().contains("B8G8R8A8_SRGB -> R8G8B8A8_SRGB"));
    }
}
