pub mod artifact;
pub mod index;
