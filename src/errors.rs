// SPDX-License-Identifier: MPL-2.0

//! Error types for the capture pipeline and its boundary hardware

use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Result of a single frame source operation
pub type SourceResult<T> = Result<T, SourceError>;

/// Result of a frame layout or conversion operation
pub type FrameResult<T> = Result<T, FrameError>;

/// Result of an LED or buzzer operation
pub type HardwareResult<T> = Result<T, HardwareError>;

/// Top-level error returned by the binary's commands
#[derive(Debug, Clone)]
pub enum AppError {
    Source(SourceError),
    Frame(FrameError),
    Loop(LoopError),
    Hardware(HardwareError),
    Storage(StorageError),
    Config(ConfigError),
    /// Terminal or runtime I/O
    Io(String),
    /// Generic error with message
    Other(String),
}

/// Frame source errors
///
/// `Unavailable` is only returned while constructing a source. Once a source
/// is running, `read()` distinguishes between a skipped tick (`Transient`)
/// and the two terminal conditions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Backend could not be constructed (missing device, file, feature)
    Unavailable(String),
    /// No frame this tick; the next read may succeed
    Transient(String),
    /// Pre-recorded sequence is exhausted
    EndOfStream,
    /// Device lost or source released
    Fatal(String),
}

impl SourceError {
    /// Whether the capture loop has to end after this error
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SourceError::EndOfStream | SourceError::Fatal(_) | SourceError::Unavailable(_)
        )
    }
}

/// Pixel buffer layout and conversion errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Width or height is zero
    EmptyFrame,
    /// Row stride smaller than one row of pixels
    StrideTooSmall { stride: usize, min: usize },
    /// Buffer length does not match stride × height
    LengthMismatch { expected: usize, actual: usize },
    /// Conversion could not be performed
    Conversion(String),
}

/// Capture loop lifecycle errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopError {
    /// `start()` called on a loop that is not idle
    AlreadyStarted,
    /// The capture thread could not be spawned
    Spawn(String),
}

/// LED and buzzer errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HardwareError {
    /// Requested value outside the accepted range
    OutOfRange { value: u32, min: u32, max: u32 },
    /// Control file could not be read or written
    Io(String),
}

/// Snapshot storage errors
#[derive(Debug, Clone)]
pub enum StorageError {
    /// Directory could not be created or listed
    Io(String),
    /// Image encoding failed
    Encoding(String),
}

/// Configuration loading and validation errors
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Config file could not be read
    Read(String),
    /// Config file is not valid JSON for this schema
    Parse(String),
    /// A value is outside its accepted range
    Invalid { field: &'static str, reason: String },
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Source(e) => write!(f, "Source error: {}", e),
            AppError::Frame(e) => write!(f, "Frame error: {}", e),
            AppError::Loop(e) => write!(f, "Capture loop error: {}", e),
            AppError::Hardware(e) => write!(f, "Hardware error: {}", e),
            AppError::Storage(e) => write!(f, "Storage error: {}", e),
            AppError::Config(e) => write!(f, "Configuration error: {}", e),
            AppError::Io(msg) => write!(f, "I/O error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::Unavailable(msg) => write!(f, "Source unavailable: {}", msg),
            SourceError::Transient(msg) => write!(f, "No frame available: {}", msg),
            SourceError::EndOfStream => write!(f, "End of stream"),
            SourceError::Fatal(msg) => write!(f, "Source failed: {}", msg),
        }
    }
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::EmptyFrame => write!(f, "Frame has zero width or height"),
            FrameError::StrideTooSmall { stride, min } => {
                write!(f, "Stride {} is smaller than row size {}", stride, min)
            }
            FrameError::LengthMismatch { expected, actual } => {
                write!(f, "Buffer holds {} bytes, expected {}", actual, expected)
            }
            FrameError::Conversion(msg) => write!(f, "Conversion failed: {}", msg),
        }
    }
}

impl fmt::Display for LoopError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopError::AlreadyStarted => write!(f, "Capture loop already started"),
            LoopError::Spawn(msg) => write!(f, "Failed to spawn capture thread: {}", msg),
        }
    }
}

impl fmt::Display for HardwareError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HardwareError::OutOfRange { value, min, max } => {
                write!(f, "Value {} outside {}..={}", value, min, max)
            }
            HardwareError::Io(msg) => write!(f, "I/O failed: {}", msg),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Io(msg) => write!(f, "I/O failed: {}", msg),
            StorageError::Encoding(msg) => write!(f, "Encoding failed: {}", msg),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read(msg) => write!(f, "Cannot read config: {}", msg),
            ConfigError::Parse(msg) => write!(f, "Cannot parse config: {}", msg),
            ConfigError::Invalid { field, reason } => write!(f, "Invalid {}: {}", field, reason),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for SourceError {}
impl std::error::Error for FrameError {}
impl std::error::Error for LoopError {}
impl std::error::Error for HardwareError {}
impl std::error::Error for StorageError {}
impl std::error::Error for ConfigError {}

// Conversions from sub-errors to AppError
impl From<SourceError> for AppError {
    fn from(err: SourceError) -> Self {
        AppError::Source(err)
    }
}

impl From<FrameError> for AppError {
    fn from(err: FrameError) -> Self {
        AppError::Frame(err)
    }
}

impl From<LoopError> for AppError {
    fn from(err: LoopError) -> Self {
        AppError::Loop(err)
    }
}

impl From<HardwareError> for AppError {
    fn from(err: HardwareError) -> Self {
        AppError::Hardware(err)
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::Storage(err)
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<ctrlc::Error> for AppError {
    fn from(err: ctrlc::Error) -> Self {
        AppError::Other(format!("Cannot install Ctrl+C handler: {}", err))
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

// Conversions for I/O errors
impl From<std::io::Error> for HardwareError {
    fn from(err: std::io::Error) -> Self {
        HardwareError::Io(err.to_string())
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

impl From<image::ImageError> for StorageError {
    fn from(err: image::ImageError) -> Self {
        StorageError::Encoding(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_source_errors() {
        assert!(SourceError::EndOfStream.is_terminal());
        assert!(SourceError::Fatal("gone".into()).is_terminal());
        assert!(SourceError::Unavailable("no device".into()).is_terminal());
        assert!(!SourceError::Transient("busy".into()).is_terminal());
    }

    #[test]
    fn out_of_range_message_names_bounds() {
        let err = HardwareError::OutOfRange {
            value: 150,
            min: 0,
            max: 100,
        };
        assert_eq!(err.to_string(), "Value 150 outside 0..=100");
    }

    #[test]
    fn io_errors_surface_as_app_errors() {
        fn fails() -> AppResult<()> {
            Err(std::io::Error::other("terminal gone"))?;
            Ok(())
        }
        let err = fails().unwrap_err();
        assert!(matches!(err, AppError::Io(_)));
        assert_eq!(err.to_string(), "I/O error: terminal gone");
    }

    #[test]
    fn app_error_wraps_sub_errors() {
        let err: AppError = LoopError::AlreadyStarted.into();
        assert!(matches!(err, AppError::Loop(LoopError::AlreadyStarted)));
        assert_eq!(
            err.to_string(),
            "Capture loop error: Capture loop already started"
        );
    }
}
