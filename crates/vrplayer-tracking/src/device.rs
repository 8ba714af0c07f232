use crate::types::{DeviceInfo, EyeMatrices};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("Tracking library not available: {0}")]
    Library(String),
    #[error("Failed to probe tracking devices: {0}")]
    Probe(String),
    #[error("No tracking device connected")]
    NoDevice,
    #[error("Failed to open tracking device: {0}")]
    Open(String),
    #[error("Device query {query} failed with status {status}")]
    Query { query: &'static str, status: i32 },
}

/// A tracking device driver as the pose sampler sees it.
///
/// Implementations are moved onto the sampler thread and only touched
/// from there; dropping the value releases the device.
pub trait TrackingDevice: Send {
    /// Static device information, read when the device was opened.
    fn info(&self) -> &DeviceInfo;

    /// Advance the driver's internal state. Must run at the device's
    /// minimum refresh rate or its filters go stale.
    fn update(&mut self);

    /// Read the current per-eye matrices in driver convention.
    fn read_matrices(&mut self) -> Result<EyeMatrices, DeviceError>;
}
