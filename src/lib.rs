//! Pyramidal TIFF/BigTIFF/SVS codec with a frame-stitching map buffer for
//! whole-slide imaging.
//!
//! TIFF (Tagged Image File Format) is a versatile image format that supports
//! lossless and lossy compression, tiled and striped layouts, and chained
//! image file directories. This crate additionally understands Aperio's SVS
//! dialect (special images, multi-level pyramids) and provides a map buffer
//! for stitching labeled-object tiles read off a pyramid into one coherent
//! large-area index.
//!
//! # Related Links
//! * <https://web.archive.org/web/20210108073850/https://www.adobe.io/open/standards/TIFF.html> - The TIFF specification

mod bytecast;
pub mod codec;
pub mod disjoint_set;
mod error;
pub mod ifd;
pub mod label_set;
pub mod mapbuffer;
mod predictor;
pub mod reader;
pub mod scanplanner;
pub mod svs;
pub mod tags;
pub mod tiff_kind;
pub mod tile;
pub mod writer;

pub use self::codec::{Codec, CodecOptions, CodecRegistry};
pub use self::disjoint_set::DisjointSet;
pub use self::error::{InvalidFileReason, TiffError, TiffResult};
pub use self::ifd::{Ifd, SampleType, Value};
pub use self::label_set::LabelSet;
pub use self::mapbuffer::{BufferHandle, BufferRegistry, Frame, FrameMatrix, MapBuffer, MapBufferConfig, Retained};
pub use self::reader::TiffReader;
pub use self::scanplanner::{ScanFrame, ScanPlanner, ScanningSequence};
pub use self::svs::{
    classify, ActualLevel, Classification, Pyramid, PyramidSource, SpecialImageKind, VirtualLevel,
    MIN_PYRAMID_LEVEL_SIDE,
};
pub use self::tags::{CompressionMethod, PhotometricInterpretation, Tag, Type};
pub use self::tiff_kind::{TiffKind, TiffKindBig, TiffKindStandard};
pub use self::tile::{Tile, TiffMap};
pub use self::writer::{ByteSink, TiffWriter};
