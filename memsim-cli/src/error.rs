//! CLI-facing error taxonomy. Wraps [`memsim_core::CoreError`] so every
//! failure the driver can produce — bad CLI input, a malformed command or
//! descriptor file, a short read, or a core-level fault — is one type with
//! one exit-code mapping.

use std::path::PathBuf;

/// Errors the CLI driver can report.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// A core operation (translation, cache/TLB access) failed.
    #[error(transparent)]
    Core(#[from] memsim_core::CoreError),

    /// A file could not be opened or read.
    #[error("i/o error reading {path}: {source}")]
    Io {
        /// The file that could not be read.
        path: PathBuf,
        /// The underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// A command or descriptor file line did not match the expected format.
    #[error("parse error at {path} line {line}: {reason}")]
    Parse {
        /// The file being parsed.
        path: PathBuf,
        /// 1-based line number.
        line: usize,
        /// Human-readable reason.
        reason: String,
    },

    /// A loaded page file was not exactly 4096 bytes.
    #[error("page file {path} is {actual} bytes, expected 4096")]
    WrongPageSize {
        /// The offending page file.
        path: PathBuf,
        /// Its actual size in bytes.
        actual: u64,
    },
}

impl CliError {
    /// The process exit code this error should produce, distinguishing
    /// `BadParameter` / `Io` / `Mem` / `Size` kinds of failure.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Core(memsim_core::CoreError::BadParameter(_)) => 2,
            Self::Core(memsim_core::CoreError::Mem(_)) => 3,
            Self::Core(memsim_core::CoreError::Size) => 4,
            Self::Core(memsim_core::CoreError::OutOfBounds { .. }) => 2,
            Self::Io { .. } | Self::WrongPageSize { .. } => 5,
            Self::Parse { .. } => 2,
        }
    }
}

/// Convenience alias used throughout `memsim-cli`.
pub type CliResult<T> = Result<T, CliError>;
