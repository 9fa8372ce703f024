//! Aperio/SVS dialect support: special-image classification and the
//! multi-level pyramid source built on top of it.

pub mod classifier;
pub mod pyramid;

pub use classifier::{classify, Classification, SpecialImageKind};
pub use pyramid::{ActualLevel, Pyramid, PyramidSource, Rect, VirtualLevel, MIN_PYRAMID_LEVEL_SIDE};
