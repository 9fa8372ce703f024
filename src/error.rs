use std::fmt;
use std::io;

use crate::ifd::Value;
use crate::tags::Tag;

/// Result of any decoding/encoding/buffer operation in this crate.
pub type TiffResult<T> = Result<T, TiffError>;

/// Error taxonomy for the TIFF/SVS codec and the writer's 32-bit overflow guard.
///
/// Each variant is something a caller needs to branch on (e.g. retry in
/// BigTIFF mode, or call `clear()` on a `MapBuffer`), not arbitrary
/// implementation detail.
#[derive(Debug)]
#[non_exhaustive]
pub enum TiffError {
    /// Unreadable/unwritable bytes; propagated verbatim.
    IoError(io::Error),

    /// Header magic wrong, IFD cycle detected, a tag payload that cannot even
    /// be clamped to fit the file, or a non-monotone IFD count.
    InvalidFile(InvalidFileReason),

    /// Bit-depth mix, 31-bit overflow on image/tile sizes, or an unsupported
    /// compression/photometric combination on write.
    UnsupportedIfd { tag: Option<Tag>, reason: String },

    /// No codec registered for the given compression code.
    UnsupportedCompression(u16),

    /// A codec refused the given pixel layout (e.g. JPEG on 16-bit samples).
    UnsupportedPixelLayout(String),

    /// Classic (non-Big) TIFF output would cross the 4 GB safety margin.
    TiffTooLarge,

    /// The disjoint-set would exceed `MAX_OBJECTS`; caller must `clear()`.
    ResourceExhausted,

    /// Negative `fromX`/`fromY`, an out-of-range size, or an unknown
    /// special-image kind.
    InvalidArgument(String),

    /// The `.meta` JSON sidecar was malformed. Recovered locally: callers
    /// should treat this as "no metadata" after logging.
    ConfigError(String),
}

#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum InvalidFileReason {
    SignatureNotFound,
    SignatureInvalid,
    ImageFileDirectoryNotFound,
    CycleInOffsets,
    TruncatedTagPayload { tag: u16 },
    NonMonotoneIfdCount,
    InconsistentSizes,
    InvalidDimensions(u32, u32),
    RequiredTagMissing(Tag),
    RequiredTagEmpty(Tag),
    ByteExpected(Value),
    UnsignedIntegerExpected(Value),
    SignedIntegerExpected(Value),
    StripTileTagConflict,
}

impl fmt::Display for TiffError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TiffError::IoError(e) => write!(f, "I/O error: {e}"),
            TiffError::InvalidFile(reason) => write!(f, "invalid TIFF file: {reason:?}"),
            TiffError::UnsupportedIfd { tag, reason } => match tag {
                Some(tag) => write!(f, "unsupported IFD content at tag {tag:?}: {reason}"),
                None => write!(f, "unsupported IFD content: {reason}"),
            },
            TiffError::UnsupportedCompression(code) => {
                write!(f, "no codec registered for compression code {code}")
            }
            TiffError::UnsupportedPixelLayout(reason) => {
                write!(f, "codec cannot handle this pixel layout: {reason}")
            }
            TiffError::TiffTooLarge => write!(
                f,
                "classic TIFF output would exceed the 4 GiB safety margin; retry with BigTIFF"
            ),
            TiffError::ResourceExhausted => {
                write!(f, "disjoint-set object count exceeded MAX_OBJECTS")
            }
            TiffError::InvalidArgument(reason) => write!(f, "invalid argument: {reason}"),
            TiffError::ConfigError(reason) => write!(f, "malformed sidecar metadata: {reason}"),
        }
    }
}

impl std::error::Error for TiffError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TiffError::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for TiffError {
    fn from(err: io::Error) -> TiffError {
        TiffError::IoError(err)
    }
}

impl From<std::num::TryFromIntError> for TiffError {
    fn from(_err: std::num::TryFromIntError) -> TiffError {
        TiffError::InvalidArgument("value did not fit the target integer width".into())
    }
}

impl From<InvalidFileReason> for TiffError {
    fn from(reason: InvalidFileReason) -> TiffError {
        TiffError::InvalidFile(reason)
    }
}
