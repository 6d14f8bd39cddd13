//! Lipstick Try-On - real-time AR makeup preview
//!
//! Captures camera input, runs face-mesh landmark detection, and renders
//! a lipstick (and optional eyelash) overlay tracked to the face, blitted
//! to a native window.

pub mod app;
pub mod camera;
pub mod config;
pub mod ml;
pub mod tryon;

pub use app::App;
