//! Error types for netlink operations.

use std::io;

/// Result type for netlink operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during netlink operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error from socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Kernel returned an error code.
    #[error("kernel error: {message} (errno {errno})")]
    Kernel {
        /// The errno value from the kernel.
        errno: i32,
        /// Human-readable error message.
        message: String,
    },

    /// Kernel error with operation context.
    #[error("{operation}: {message} (errno {errno})")]
    KernelWithContext {
        /// The operation that failed.
        operation: String,
        /// The errno value from the kernel.
        errno: i32,
        /// Human-readable error message.
        message: String,
    },

    /// A transport step (dial, send, receive, close) failed.
    #[error("{operation}: {source}")]
    Transport {
        /// The transport step that failed.
        operation: &'static str,
        /// The error reported by the transport.
        #[source]
        source: Box<Error>,
    },

    /// Message was truncated.
    #[error("message truncated: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Expected message length.
        expected: usize,
        /// Actual bytes received.
        actual: usize,
    },

    /// Invalid message format.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Invalid attribute format.
    #[error("invalid attribute: {0}")]
    InvalidAttribute(String),

    /// Reply carried a different message type than the one expected.
    #[error("unexpected header type: got {got:#06x}, want {want:#06x}")]
    UnexpectedHeader {
        /// Message type found in the reply.
        got: u16,
        /// Message type the decoder expected.
        want: u16,
    },

    /// A reply referenced a stateful object type with no registered decoder.
    #[error("unsupported object type: {0}")]
    UnknownObjectType(u32),

    /// A required attribute was absent from a reply.
    #[error("malformed stateful object: missing {0} attribute")]
    MissingAttribute(&'static str),

    /// An object could not be encoded.
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    /// Operation not supported.
    #[error("operation not supported: {0}")]
    NotSupported(String),
}

/// Errors raised while encoding attributes.
///
/// Kept separate from [`Error`] so that a batch builder can record the first
/// failure and still hand a copy back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    /// A field required on the wire was left empty.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// A string field cannot be represented as a netlink string.
    #[error("invalid {field}: {reason}")]
    InvalidString {
        /// The offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// An attribute does not fit the 16-bit length field.
    #[error("attribute {kind} too large: {len} bytes")]
    AttributeTooLarge {
        /// Attribute type.
        kind: u16,
        /// Total attribute length including the header.
        len: usize,
    },
}

impl Error {
    /// Create a kernel error from an errno value.
    pub fn from_errno(errno: i32) -> Self {
        let message = io::Error::from_raw_os_error(-errno).to_string();
        Self::Kernel {
            errno: -errno,
            message,
        }
    }

    /// Create a kernel error with operation context.
    pub fn from_errno_with_context(errno: i32, operation: impl Into<String>) -> Self {
        let message = io::Error::from_raw_os_error(-errno).to_string();
        Self::KernelWithContext {
            operation: operation.into(),
            errno: -errno,
            message,
        }
    }

    /// Wrap an error reported by a transport step.
    pub fn transport(operation: &'static str, source: Error) -> Self {
        Self::Transport {
            operation,
            source: Box::new(source),
        }
    }

    /// Add context to this error.
    ///
    /// Wraps kernel errors with operation context. Other errors are returned unchanged.
    pub fn with_context(self, operation: impl Into<String>) -> Self {
        match self {
            Self::Kernel { errno, message } => Self::KernelWithContext {
                operation: operation.into(),
                errno,
                message,
            },
            other => other,
        }
    }

    /// Check if this is a "not found" error (ENOENT, ENODEV, etc.).
    pub fn is_not_found(&self) -> bool {
        matches!(self.errno(), Some(libc::ENOENT | libc::ENODEV))
    }

    /// Check if this is a permission error (EPERM, EACCES).
    pub fn is_permission_denied(&self) -> bool {
        matches!(self.errno(), Some(libc::EPERM | libc::EACCES))
    }

    /// Check if this is a "already exists" error (EEXIST).
    pub fn is_already_exists(&self) -> bool {
        self.errno() == Some(libc::EEXIST)
    }

    /// Check if this is a "device busy" error (EBUSY).
    pub fn is_busy(&self) -> bool {
        self.errno() == Some(libc::EBUSY)
    }

    /// Get the errno value if this is a kernel error.
    ///
    /// Looks through [`Error::Transport`] wrappers.
    pub fn errno(&self) -> Option<i32> {
        match self {
            Self::Kernel { errno, .. } | Self::KernelWithContext { errno, .. } => Some(*errno),
            Self::Transport { source, .. } => source.errno(),
            _ => None,
        }
    }

    /// Check if this error came from a malformed or unexpected reply.
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            Self::Truncated { .. }
                | Self::InvalidMessage(_)
                | Self::InvalidAttribute(_)
                | Self::UnexpectedHeader { .. }
                | Self::UnknownObjectType(_)
                | Self::MissingAttribute(_)
        )
    }
}
