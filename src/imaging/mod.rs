//! Image engine: statically linked, no system libraries.
//!
//! | Step | Crate / function |
//! |---|---|
//! | **Probe** | `image` decoder headers, `avif-parse` for AVIF |
//! | **Decode** | `image` (JPEG, PNG, TIFF, WebP), `rav1d` (AVIF) |
//! | **Geometry** | resize / extract / rotate / flip on `DynamicImage` |
//! | **Encode** | `jpeg-encoder` (JPEG), `webp` (WebP), `image` (PNG, TIFF), rav1e (AVIF) |
//! | **Density** | JFIF, PNG `pHYs` and TIFF resolution headers |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for fit-mode and rotation math and canvas limits (unit testable)
//! - **Parameters**: Data structures describing transform steps and pipelines
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]

mod avif;
pub mod backend;
pub mod calculations;
mod density;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, ImageBackend, ImageInfo};
pub use params::{Color, EncodeStep, FitMode, ImageFormat, Pipeline, Quality, TransformStep};
pub use rust_backend::RustBackend;
