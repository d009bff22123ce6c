//! Small helpers shared by the frame loop and viewer.

/// Frame delta timer and smoothed FPS.
pub mod frame_timing;
