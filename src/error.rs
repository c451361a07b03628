use thiserror::Error;

/// Per-page and whole-run status taxonomy.
///
/// Workers record one of these on each task; the coordinator reports the
/// first non-[`Ok`](ConvertStatus::Ok) status seen in page order as the
/// overall result of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvertStatus {
    Ok,
    Generic,
    OutOfMemory,
    ImageOpen,
    PageSave,
    Merge,
    ThreadCreation,
    PoolStart,
}

impl ConvertStatus {
    pub fn is_ok(self) -> bool {
        self == ConvertStatus::Ok
    }

    /// Human-readable status string for progress/telemetry reporting.
    pub fn message(self) -> &'static str {
        match self {
            ConvertStatus::Ok => "OK",
            ConvertStatus::Generic => "Conversion failed",
            ConvertStatus::OutOfMemory => "Out of memory",
            ConvertStatus::ImageOpen => "Cannot open page image",
            ConvertStatus::PageSave => "Cannot save converted page",
            ConvertStatus::Merge => "Cannot merge page into document",
            ConvertStatus::ThreadCreation => "Cannot create worker thread",
            ConvertStatus::PoolStart => "Cannot start worker pool",
        }
    }
}

impl std::fmt::Display for ConvertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

#[derive(Debug, Error)]
pub enum ScanbindError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Image decode error: {0}")]
    ImageDecodeError(String),

    #[error("Encode error: {0}")]
    EncodeError(String),

    #[error("Merge error: {0}")]
    MergeError(String),

    #[error("Finalize error: {0}")]
    FinalizeError(String),

    #[error("Pipeline failed: {}", .0.message())]
    PipelineError(ConvertStatus),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Generates factory methods for [`ScanbindError`] variants that wrap a `String`.
macro_rules! error_constructors {
    ($(
        $(#[doc = $doc:expr])*
        $method:ident => $variant:ident
    ),* $(,)?) => {
        impl ScanbindError {
            $(
                $(#[doc = $doc])*
                pub fn $method(msg: impl Into<String>) -> Self {
                    Self::$variant(msg.into())
                }
            )*
        }
    };
}

error_constructors! {
    /// Create a configuration error.
    config => ConfigError,
    /// Create an image decode error.
    image_decode => ImageDecodeError,
    /// Create a page encode error.
    encode => EncodeError,
    /// Create a page merge error.
    merge => MergeError,
    /// Create a finalize error.
    finalize => FinalizeError,
}

impl From<image::ImageError> for ScanbindError {
    fn from(e: image::ImageError) -> Self {
        Self::ImageDecodeError(e.to_string())
    }
}

impl From<serde_yml::Error> for ScanbindError {
    fn from(e: serde_yml::Error) -> Self {
        Self::ConfigError(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ScanbindError>;
