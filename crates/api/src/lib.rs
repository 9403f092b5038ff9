//! HTTP API of the workbench: router, shared services and JSON mapping.

pub mod app;
