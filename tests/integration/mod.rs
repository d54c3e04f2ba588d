//! Integration tests with mock HTTP server

pub mod mock_server;
mod async_jobs;
mod submission;
