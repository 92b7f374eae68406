pub mod analyzers;
pub mod config;
pub mod errors;
pub mod fetch;
pub mod output;
pub mod record;
pub mod stations;
pub mod tools;
