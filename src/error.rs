use thiserror::Error;

// why a pixel buffer descriptor was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BufferIssue {
    #[error("width or height is zero")]
    ZeroDimension,
    #[error("buffer has no backing data")]
    EmptyData,
    #[error("row stride {stride} is smaller than the row size {row_bytes}")]
    StrideTooSmall { stride: usize, row_bytes: usize },
    #[error("row stride {stride} is not a multiple of the channel size {channel_bytes}")]
    StrideMisaligned { stride: usize, channel_bytes: usize },
    #[error("buffer holds {actual} bytes, {required} required")]
    InsufficientData { actual: usize, required: usize },
    #[error("sample count {samples} does not describe a {width}x{height} image")]
    ChannelCountMismatch {
        samples: usize,
        width: usize,
        height: usize,
    },
}

/// Every failure the core can report.
///
/// The core never writes partial output: when an operation returns `Err`
/// the caller's output buffer holds whatever it held before the call (or
/// unspecified contents for the low-level float entry points).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PixmaskError {
    #[error("invalid buffer: {0}")]
    InvalidBuffer(#[from] BufferIssue),

    #[error("unsupported pixel format code {0}")]
    UnsupportedFormat(u32),

    #[error("dimension mismatch: expected {expected_width}x{expected_height}, got {width}x{height}")]
    DimensionMismatch {
        expected_width: usize,
        expected_height: usize,
        width: usize,
        height: usize,
    },

    #[error("width and height must be even, got {width}x{height}")]
    OddDimensions { width: usize, height: usize },

    #[error("resize target {width}x{height} is degenerate")]
    DegenerateResize { width: usize, height: usize },

    #[error("scale factors must be finite and positive, got ({scale_x}, {scale_y})")]
    InvalidScale { scale_x: f32, scale_y: f32 },

    #[error("stage `{stage}` failed: {reason}")]
    StageFailed { stage: &'static str, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to load configuration: {0}")]
    Config(String),
}

impl PixmaskError {
    pub(crate) fn stage(stage: &'static str, source: PixmaskError) -> Self {
        match source {
            // keep the nested stage name rather than wrapping twice
            PixmaskError::StageFailed { .. } => source,
            other => PixmaskError::StageFailed {
                stage,
                reason: other.to_string(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, PixmaskError>;
