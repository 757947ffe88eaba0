// src/dashboard/mod.rs
mod board;
mod navigation;

pub use board::{transitions, StatusBoard, StatusReport, Transition};
pub use navigation::{resolve as resolve_navigation, Navigation};
