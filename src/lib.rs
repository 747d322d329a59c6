//! Interactive terminal globe of office locations and their achievements,
//! drawn with Braille Unicode.

pub mod achievements;
pub mod app;
pub mod braille;
pub mod camera;
pub mod config;
pub mod data;
pub mod error;
pub mod geo;
pub mod input;
pub mod lighting;
pub mod logging;
pub mod map;
pub mod ui;
