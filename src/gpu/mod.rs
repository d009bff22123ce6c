//! Graphics API boundary and its implementations.
//!
//! [`device::GraphicsDevice`] is the GL-shaped object model the texture
//! code talks to; [`context::GraphicsContext`] adds the CPU-side state
//! (matrix stacks, bindings, viewport) around a device.

/// Matrix stacks, bindings and viewport around a device.
pub mod context;
/// The device trait, ids and formats.
pub mod device;
/// CPU-only device for tests and headless runs.
pub mod headless;
/// Helpers for the full-screen presentation pipeline.
pub mod pipeline_helpers;
/// wgpu device, surface, and queue initialization.
pub mod render_context;
/// [`device::GraphicsDevice`] over wgpu.
pub mod wgpu_device;
