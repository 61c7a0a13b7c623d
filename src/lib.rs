// THEORY:
// This file is the main entry point for the `resurface` library crate.
// It follows the standard Rust convention of using `lib.rs` to define the public
// API that will be exposed to external consumers (like an interactive editor
// front-end or a preview service).
//
// The primary goal is to export the `RenderPipeline` and `RenderQueue` with
// their associated data structures (`RenderConfig`, `CompositeRequest`,
// `CompositeResult`, etc.) as the clean, high-level interface for the entire
// compositing engine. The per-stage internals (`core_modules`) stay public for
// callers that need the individual building blocks (coordinate mapping for
// interactive drawing, mask rasterization for hit-testing) but the pipeline
// types are the intended front door.

pub mod core_modules;
pub mod error;
pub mod parallel_pipeline;
pub mod pipeline;
