//! Error types for the pyrite driver
//!
//! Everything in [`GlError`] is the hard-fatal tier: an invariant violation
//! that indicates caller misuse or upstream corruption. There is no recovery
//! path and no retry. The soft tier (a recognized but unwired feature) never
//! becomes an error; it is logged once per call site and the operation is a
//! no-op; see `soft_unimplemented!` in the `logging` module.

use thiserror::Error;

/// Hard-fatal driver errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GlError {
    #[error("invalid enum for {context}: 0x{value:04X}")]
    InvalidEnum { context: &'static str, value: u32 },

    #[error("invalid object handle: {0}")]
    InvalidHandle(u32),

    #[error("object {0} is not a {1}")]
    WrongObjectKind(u32, &'static str),

    #[error("matrix stack overflow at depth {0}")]
    StackOverflow(usize),

    #[error("matrix stack underflow")]
    StackUnderflow,

    #[error("non-finite matrix element at index {0}")]
    NonFiniteMatrix(usize),

    #[error("texture dimension {0} is not a power of two")]
    NonPowerOfTwo(u32),

    #[error("zero-length allocation")]
    ZeroAllocation,

    #[error("upload of {len} bytes at offset {offset} exceeds store of {size} bytes")]
    UploadOutOfBounds { offset: usize, len: usize, size: usize },

    #[error("array read of {needed} bytes exceeds store of {size} bytes")]
    ArrayOutOfBounds { needed: usize, size: usize },

    #[error("push buffer overflow ({0} words)")]
    PushOverflow(usize),

    #[error("more enabled clip planes than free texture units")]
    ClipPlaneOverflow,

    #[error("value {0} outside [0, 1]")]
    ColorOutOfRange(f32),

    #[error("unsupported: {0}")]
    Unsupported(&'static str),
}

/// Result type alias for driver operations
pub type Result<T> = std::result::Result<T, GlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GlError::InvalidEnum { context: "blend factor", value: 0x300 };
        assert_eq!(format!("{}", err), "invalid enum for blend factor: 0x0300");

        let err = GlError::NonPowerOfTwo(33);
        assert_eq!(format!("{}", err), "texture dimension 33 is not a power of two");
    }

    #[test]
    fn test_bounds_error_fields() {
        let err = GlError::UploadOutOfBounds { offset: 8, len: 16, size: 20 };
        assert_eq!(
            format!("{}", err),
            "upload of 16 bytes at offset 8 exceeds store of 20 bytes"
        );
    }
}
