//! Status Service
//!
//! Single entry point for request handlers: decoded status, raw records,
//! water heater view, service status and the control operations for the
//! receiver and the data logger.

mod config;
mod error;
mod service;
mod status;
mod water_heater;

pub use config::ServiceConfig;
pub use error::ServiceError;
pub use service::StatusService;
pub use status::{RawDataEntry, ServiceStatus};
pub use water_heater::{WaterHeaterStatus, WATER_HEATER_OPERATIONS};
