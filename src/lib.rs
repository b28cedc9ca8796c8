//! som-explorer: interactive dashboard for a self-organizing map.
//!
//! Panels turn the map's per-cell state into heatmaps and RGB composites,
//! share one scaling convention and one hover inspector, and keep rendering
//! while a background worker trains the same map.

pub mod compositor;
pub mod dashboard;
pub mod grid_view;
pub mod input;
pub mod inspector;
pub mod logging;
pub mod model;
pub mod scale;
pub mod text;
pub mod theme;
pub mod theme_watcher;
pub mod training;
pub mod widgets;
