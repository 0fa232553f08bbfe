pub mod agent;
pub mod constants;
pub mod error;
pub mod runtime;
pub mod utils;
