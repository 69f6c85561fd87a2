//! LogHarbor - real-time log distribution
//!
//! Consumes structured log events from a durable queue, persists each to
//! a searchable index and fans them out live to connected viewers.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod logging;
pub mod ports;
