//! Model-point input data and CSV loading

mod point;
pub mod loader;

pub use point::ModelPoint;
pub use loader::{load_model_points, load_model_points_from_reader};
