// -- Lint policy ---------------------------------------------------------
// This is the single source of truth for crate-wide lints.

// Broad lint groups
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::nursery)]
// Documentation
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]
#![deny(rustdoc::bare_urls)]
// No panicking in library code (tests opt out in clippy.toml)
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
// No debug/print artifacts
#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
// Import hygiene
#![deny(clippy::wildcard_imports)]
// Complexity limits (thresholds in clippy.toml)
#![deny(clippy::cognitive_complexity)]
#![deny(clippy::too_many_lines)]
#![deny(clippy::excessive_nesting)]
// Function signature hygiene
#![deny(clippy::too_many_arguments)]
#![deny(clippy::fn_params_excessive_bools)]
// Clone / pass-by-value hygiene
#![deny(clippy::needless_pass_by_value)]
#![deny(clippy::implicit_clone)]
// String hygiene
#![deny(clippy::inefficient_to_string)]
#![deny(clippy::redundant_closure_for_method_calls)]
#![deny(clippy::manual_string_new)]
#![deny(clippy::str_to_string)]
// Cargo lints (warn, not deny since cargo lints can be noisy)
#![warn(clippy::cargo)]
// Unused / redundant code
#![deny(unused_results)]
#![deny(unused_qualifications)]
// Cast hygiene
#![deny(trivial_casts)]
#![deny(trivial_numeric_casts)]

//! Render-target and texture resource manager for a real-time visual
//! engine, built on wgpu.
//!
//! A [`texture::Texture`] is either an off-screen render target of some
//! [`texture::BufferKind`] that drawing can be captured into, or an image
//! uploaded from a bitmap. Images are shared through a refcounted
//! [`texture::TextureCache`] keyed by asset path and may be decoded on a
//! worker thread; the result is picked up the next time the texture is
//! bound.
//!
//! # Key entry points
//!
//! - [`texture::TextureContext`] - graphics context, cache and decoder
//! - [`texture::Texture`] - render targets, uploads, loads and capture
//! - [`gpu::device::GraphicsDevice`] - the graphics API boundary, with
//!   [`gpu::wgpu_device::WgpuDevice`] and [`gpu::headless::HeadlessDevice`]
//! - [`transport`] - play/stop/rewind commands driving engine time
//! - [`frame_loop::FrameLoop`] - per-frame driver used by the viewer
//! - [`options::Options`] - TOML-backed runtime configuration

#[cfg(feature = "binary")]
pub mod cli;
pub mod decode;
pub mod error;
pub mod frame_loop;
pub mod gpu;
pub mod options;
pub mod present;
pub mod texture;
pub mod transport;
pub mod util;
#[cfg(feature = "viewer")]
pub mod viewer;
