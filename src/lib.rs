
//! Read and write pik files, a progressive still image format
//! with lossy block transform coding and optional lossless refinement.
//!
//! Encode a linear image with `image::write::pixels_to_pik`
//! and decode it with `image::read::pik_to_pixels`.

#![forbid(unsafe_code)]
#![forbid(
    clippy::all,
    clippy::restriction,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
)]

#![warn(
    rust_2018_idioms,
    unused_extern_crates,
    missing_docs,
    missing_debug_implementations,
)]


pub mod io;
pub mod math;
pub mod error;
pub mod block;
pub mod compression;
pub mod meta;
pub mod image;
pub mod oracle;
pub mod pass;


/// Export the most important items from `pik`.
pub mod prelude {

    // main exports
    pub use crate::image::read::{pik_to_pixels, read_preview};
    pub use crate::image::write::pixels_to_pik;

    // core data types
    pub use crate::image::params::{CompressParams, DecompressParams, Override};
    pub use crate::image::{CodecInOut, Image3, Image3F, Plane, PlaneF, Rect};
    pub use crate::block::parallel::WorkerPool;
    pub use crate::pass::{PassInfo, PassScope, PikInfo};
    pub use crate::oracle::{Comparator, Comparison, DetailSaliency, SaliencyExtractor, SquaredErrorComparator};
    pub use crate::math::Vec2;

    // secondary data types
    pub use crate::meta;
    pub use crate::error::{self, Error, Result};

    // re-export external stuff
    pub use half::f16;
}
