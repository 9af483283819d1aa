pub mod client;
pub mod labels;

pub use client::{HttpTelemetryClient, SafetyEvent, TelemetryApi, TimeWindow, Trip, VehicleStats};
