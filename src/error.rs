use thiserror::Error;

/// Errors surfaced by the tile renderers, the handle pool and the metatile cache.
///
/// The type is `Clone` because a single failed render pass is delivered to
/// every caller that was coalesced onto it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// Missing or invalid style, or an invalid option.
    ///
    /// Parser messages coming from the engine are carried verbatim.
    #[error("{0}")]
    Validation(String),

    /// Requested format is outside the renderer's allow-list
    #[error("Format '{0}' not allowed")]
    FormatNotAllowed(String),

    /// `x` or `y` is outside `[0, 2^z)`
    #[error("required parameter {param} is out of range of possible values based on z value")]
    CoordinateRange { param: &'static str },

    /// Zoom level beyond what a tile coordinate can address
    #[error("required parameter z is out of range of possible values (0-{max})")]
    ZoomRange { z: u32, max: u32 },

    /// The pool has begun draining (or is closed) and rejects new work
    #[error("pool is draining and cannot accept work")]
    PoolDraining,

    /// The engine failed while rendering a metatile
    #[error("render failed: {0}")]
    Render(String),

    /// A sliced tile could not be encoded
    #[error("failed to encode {format} tile: {message}")]
    Encode {
        format: &'static str,
        message: String,
    },

    /// A style file could not be read
    #[error("failed to load style from {path}: {message}")]
    StyleLoad { path: String, message: String },
}

impl RenderError {
    /// Whether the error was caused by the request itself rather than by the
    /// renderer or the engine.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            RenderError::FormatNotAllowed(_)
                | RenderError::CoordinateRange { .. }
                | RenderError::ZoomRange { .. }
        )
    }
}
