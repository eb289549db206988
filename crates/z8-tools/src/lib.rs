pub mod model;

pub use model::{load_raw_bin, Image, Segment};
