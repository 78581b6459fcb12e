pub mod canvas;
pub mod histogram;
pub mod slider;
