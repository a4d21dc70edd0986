pub mod alerts;
pub mod gate;
pub mod render;
pub mod reporting;
