pub mod geometry;
pub mod globe;
pub mod labels;
pub mod markers;
pub mod projection;
mod spatial;
