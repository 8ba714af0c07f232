pub mod device;
pub mod openhmd;
pub mod sampler;
pub mod store;
pub mod types;

use anyhow::Result;
use openhmd::OpenHmdDevice;
use sampler::PoseSampler;
use std::sync::Arc;
use std::time::Duration;
use store::PoseStore;
use types::{DeviceCalibration, DeviceGeometry, PoseSnapshot};
use vrplayer_config::TrackingConfig;

/// Head tracking as seen by the render thread.
///
/// Opens the first OpenHMD device, samples it on a background thread and
/// exposes the latest pose. Without a device it keeps returning the
/// identity pose.
pub struct HeadTracker {
    store: Arc<PoseStore>,
    sampler: Option<PoseSampler>,
}

impl HeadTracker {
    /// Open the first available headset and start sampling it.
    pub fn open(max_update_interval: Duration) -> Result<Self> {
        let device = OpenHmdDevice::open_first()?;
        let store = Arc::new(PoseStore::new());
        let sampler = PoseSampler::spawn(device, store.clone(), max_update_interval)?;
        Ok(Self {
            store,
            sampler: Some(sampler),
        })
    }

    /// A tracker without a device, for running with no headset attached.
    pub fn untracked() -> Self {
        Self {
            store: Arc::new(PoseStore::new()),
            sampler: None,
        }
    }

    pub fn is_tracking(&self) -> bool {
        self.sampler.is_some()
    }

    /// Latest pose (non-blocking beyond a short lock).
    pub fn pose(&self) -> PoseSnapshot {
        self.store.fetch_latest()
    }

    /// Native panel resolution, if a device is open.
    pub fn native_resolution(&self) -> Option<DeviceGeometry> {
        self.sampler
            .as_ref()
            .map(|s| s.info().geometry)
            .filter(|g| g.horizontal_pixels > 0 && g.vertical_pixels > 0)
    }

    pub fn calibration(&self) -> Option<DeviceCalibration> {
        self.sampler.as_ref().map(|s| s.info().calibration)
    }

    /// Horizontal shift applied to each eye's geometry.
    pub fn eye_separation(&self, config: &TrackingConfig) -> f32 {
        eye_separation(config, self.calibration().as_ref())
    }
}

/// Zero unless parallax is enabled; then the configured separation, or
/// half the device IPD.
pub fn eye_separation(config: &TrackingConfig, calibration: Option<&DeviceCalibration>) -> f32 {
    if !config.eye_parallax {
        return 0.0;
    }
    config
        .eye_separation
        .or_else(|| calibration.map(|c| c.ipd / 2.0))
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untracked_reports_identity_and_no_geometry() {
        let tracker = HeadTracker::untracked();
        assert!(!tracker.is_tracking());
        assert_eq!(tracker.pose(), PoseSnapshot::IDENTITY);
        assert_eq!(tracker.native_resolution(), None);
        assert_eq!(tracker.calibration(), None);
    }

    #[test]
    fn parallax_disabled_means_no_separation() {
        let config = TrackingConfig {
            eye_separation: Some(0.05),
            ..TrackingConfig::default()
        };
        let calibration = DeviceCalibration {
            ipd: 0.064,
            ..DeviceCalibration::default()
        };
        assert_eq!(eye_separation(&config, Some(&calibration)), 0.0);
    }

    #[test]
    fn separation_prefers_config_then_half_ipd() {
        let calibration = DeviceCalibration {
            ipd: 0.064,
            ..DeviceCalibration::default()
        };
        let mut config = TrackingConfig {
            eye_parallax: true,
            eye_separation: Some(0.05),
            ..TrackingConfig::default()
        };
        assert_eq!(eye_separation(&config, Some(&calibration)), 0.05);

        config.eye_separation = None;
        assert_eq!(eye_separation(&config, Some(&calibration)), 0.032);
        assert_eq!(eye_separation(&config, None), 0.0);
        assert_eq!(HeadTracker::untracked().eye_separation(&config), 0.0);
    }
}
