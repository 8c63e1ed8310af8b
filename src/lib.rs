//! Patch-based spot healing for RGBA rasters.
//!
//! A heal searches a square neighbourhood of the pointer for the flattest
//! same-size patch and blends it into the spot with a radial Gaussian
//! weight. [`components::tools::HealTool`] drives heals from pointer
//! events; [`ops::inpaint::heal_at`] is the single-shot entry point. Any
//! raster can be healed once it implements [`canvas::PixelBuffer`].

#![allow(clippy::needless_range_loop)]

pub mod logger;

pub mod canvas;
pub mod cli;
pub mod components;
pub mod io;
pub mod ops;

pub use canvas::{PatchWindow, PixelBuffer, Region};
pub use components::tools::{BrushState, CursorType, HealTool, StrokeEvent};
pub use ops::inpaint::{BlendFalloff, HealOutcome, SkipReason, heal_at};
pub use ops::patch_match::{PatchScore, compute_patch_score, find_best_patch};
