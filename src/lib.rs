pub mod app;
pub mod collector;
pub mod config;
pub mod error;
pub mod job_queue;
pub mod models;
pub mod pipeline;
pub mod shutdown;
pub mod telemetry;
pub mod validation;
pub mod worker;
