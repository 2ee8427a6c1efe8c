pub mod cascade;
pub mod embedding;
pub mod interaction;
pub mod reader;
