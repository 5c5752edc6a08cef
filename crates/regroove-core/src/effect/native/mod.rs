//! Native Rust effect units of the output chain

mod compressor;
mod delay;
mod eq;
mod filter;
mod overdrive;

pub use compressor::CompressorEffect;
pub use delay::DelayEffect;
pub use eq::EqEffect;
pub use filter::ResonantFilterEffect;
pub use overdrive::{soft_clip, OverdriveEffect};
