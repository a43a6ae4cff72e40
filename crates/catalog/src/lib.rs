//! Demo descriptors and the gallery's TOML configuration.
//!
//! The descriptor table is static reference data: each entry names a demo id
//! understood by the render unit registry plus the text shown next to its
//! canvas. [`GalleryConfig`] carries the knobs the surface manager honours
//! (preview/full pixel ratio caps, preview width cap, visibility threshold,
//! tick delta clamp) and may replace the descriptor table entirely.

mod config;
mod descriptor;

pub use config::{ConfigError, FullSettings, GalleryConfig, PreviewSettings, TimingSettings};
pub use descriptor::{builtin_demos, DemoDescriptor, DEFAULT_DEMO_ID};
