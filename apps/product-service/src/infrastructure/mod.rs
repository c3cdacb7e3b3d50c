//! Infrastructure Layer
//!
//! This module contains the adapters for the `ProductRepository` port and
//! the HTTP driver. Following hexagonal architecture:
//!
//! - **Driven Adapters (Outbound)**: Implement the repository port
//!   - `persistence/`: SQLite (`SQLx`) and embedded document store adapters
//!
//! - **Driver Adapters (Inbound)**: Expose the application to the outside world
//!   - `http/`: REST API controllers
//!
//! - **Composition**
//!   - `config/`: Opens the configured store and wires the service

pub mod config;
pub mod http;
pub mod persistence;
