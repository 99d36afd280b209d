pub mod derived;
pub mod models;
pub mod normalize;
