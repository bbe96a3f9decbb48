pub mod engine;
pub mod governor;
