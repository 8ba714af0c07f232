use crate::device::TrackingDevice;
use crate::store::{PoseStore, WaitOutcome};
use crate::types::{DeviceInfo, PoseSnapshot};
use anyhow::Result;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Background pose producer.
///
/// Owns the tracking device on a dedicated thread. Each iteration ticks
/// the driver, reads the eye matrices and publishes a snapshot, then
/// sleeps until the render thread consumes it or `max_interval` passes.
pub struct PoseSampler {
    store: Arc<PoseStore>,
    info: DeviceInfo,
    thread: Option<JoinHandle<()>>,
}

impl PoseSampler {
    pub fn spawn<D>(device: D, store: Arc<PoseStore>, max_interval: Duration) -> Result<Self>
    where
        D: TrackingDevice + 'static,
    {
        let info = device.info().clone();
        let thread_store = store.clone();

        let thread = std::thread::Builder::new()
            .name("pose-sampler".into())
            .spawn(move || sample_loop(device, &thread_store, max_interval))?;

        info!(
            vendor = %info.vendor,
            product = %info.product,
            interval_ms = max_interval.as_millis() as u64,
            "Pose sampler started"
        );

        Ok(Self {
            store,
            info,
            thread: Some(thread),
        })
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }
}

impl Drop for PoseSampler {
    fn drop(&mut self) {
        self.store.shutdown();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Pose sampler thread panicked");
            }
        }
    }
}

fn sample_loop<D: TrackingDevice>(mut device: D, store: &PoseStore, max_interval: Duration) {
    let mut updates: u64 = 0;
    let mut failed_reads: u64 = 0;
    let mut timeouts: u64 = 0;

    while !store.is_shutdown() {
        device.update();
        updates += 1;

        match device.read_matrices() {
            Ok(raw) => {
                store.publish(PoseSnapshot::from_device(&raw));
            }
            Err(e) => {
                failed_reads += 1;
                if failed_reads == 1 {
                    warn!(?e, "Failed to read eye matrices, keeping previous pose");
                } else {
                    debug!(?e, failed_reads, "Eye matrix read failed");
                }
            }
        }

        match store.wait_for_consumption(max_interval) {
            WaitOutcome::Shutdown => break,
            WaitOutcome::Consumed => {}
            WaitOutcome::TimedOut => timeouts += 1,
        }

        if updates % 1000 == 0 {
            debug!(updates, timeouts, failed_reads, "Pose sampler stats");
        }
    }

    // The device handle goes away only after the loop has exited.
    drop(device);
    info!(updates, "Pose sampler stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceError;
    use crate::types::{DeviceCalibration, DeviceGeometry, Eye, EyeMatrices};
    use glam::{Mat4, Vec3};
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::thread;

    struct ScriptedDevice {
        info: DeviceInfo,
        updates: Arc<AtomicU64>,
        released: Arc<AtomicBool>,
        fail_every_other: bool,
    }

    impl ScriptedDevice {
        fn new() -> (Self, Arc<AtomicU64>, Arc<AtomicBool>) {
            let updates = Arc::new(AtomicU64::new(0));
            let released = Arc::new(AtomicBool::new(false));
            let device = Self {
                info: DeviceInfo {
                    vendor: "Test".into(),
                    product: "Scripted HMD".into(),
                    geometry: DeviceGeometry {
                        horizontal_pixels: 2160,
                        vertical_pixels: 1200,
                    },
                    calibration: DeviceCalibration::default(),
                },
                updates: updates.clone(),
                released: released.clone(),
                fail_every_other: false,
            };
            (device, updates, released)
        }
    }

    impl TrackingDevice for ScriptedDevice {
        fn info(&self) -> &DeviceInfo {
            &self.info
        }

        fn update(&mut self) {
            self.updates.fetch_add(1, Ordering::SeqCst);
        }

        fn read_matrices(&mut self) -> Result<EyeMatrices, DeviceError> {
            let n = self.updates.load(Ordering::SeqCst);
            if self.fail_every_other && n % 2 == 0 {
                return Err(DeviceError::Query {
                    query: "left modelview",
                    status: -1,
                });
            }
            let view = Mat4::from_translation(Vec3::new(n as f32, 0.0, 0.0));
            Ok(EyeMatrices {
                left_view: view,
                right_view: view,
                left_projection: Mat4::IDENTITY,
                right_projection: Mat4::IDENTITY,
            })
        }
    }

    /// Reads once, then fails every read.
    struct FailAfterFirst {
        inner: ScriptedDevice,
        reads: u64,
    }

    impl TrackingDevice for FailAfterFirst {
        fn info(&self) -> &DeviceInfo {
            self.inner.info()
        }

        fn update(&mut self) {
            self.inner.update();
        }

        fn read_matrices(&mut self) -> Result<EyeMatrices, DeviceError> {
            self.reads += 1;
            if self.reads > 1 {
                return Err(DeviceError::Query {
                    query: "left modelview",
                    status: -1,
                });
            }
            self.inner.read_matrices()
        }
    }

    impl Drop for ScriptedDevice {
        fn drop(&mut self) {
            self.released.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn refreshes_without_consumer() {
        let (device, updates, _) = ScriptedDevice::new();
        let store = Arc::new(PoseStore::new());
        let sampler =
            PoseSampler::spawn(device, store.clone(), Duration::from_millis(10)).unwrap();

        thread::sleep(Duration::from_millis(150));
        // The bounded timeout alone keeps the device ticking.
        assert!(updates.load(Ordering::SeqCst) >= 3);
        assert!(store.fetch_latest().generation >= 3);
        drop(sampler);
    }

    #[test]
    fn consumption_drives_updates() {
        let (device, updates, _) = ScriptedDevice::new();
        let store = Arc::new(PoseStore::new());
        let _sampler =
            PoseSampler::spawn(device, store.clone(), Duration::from_secs(30)).unwrap();

        thread::sleep(Duration::from_millis(30));
        assert_eq!(updates.load(Ordering::SeqCst), 1);

        for _ in 0..5 {
            store.fetch_latest();
            thread::sleep(Duration::from_millis(10));
        }
        assert!(updates.load(Ordering::SeqCst) >= 5);
    }

    #[test]
    fn published_views_are_inverted() {
        let (device, _, _) = ScriptedDevice::new();
        let store = Arc::new(PoseStore::new());
        let _sampler =
            PoseSampler::spawn(device, store.clone(), Duration::from_millis(5)).unwrap();

        thread::sleep(Duration::from_millis(30));
        let snapshot = store.fetch_latest();
        let translation = snapshot.view(Eye::Left).w_axis.x;
        assert!(translation < 0.0);
        assert_eq!(snapshot.view(Eye::Left), snapshot.view(Eye::Right));
    }

    #[test]
    fn failed_reads_are_skipped() {
        let (mut device, updates, _) = ScriptedDevice::new();
        device.fail_every_other = true;
        let store = Arc::new(PoseStore::new());
        let sampler =
            PoseSampler::spawn(device, store.clone(), Duration::from_millis(5)).unwrap();

        thread::sleep(Duration::from_millis(60));
        drop(sampler);

        let ticks = updates.load(Ordering::SeqCst);
        let published = store.fetch_latest().generation;
        assert!(published < ticks);
        assert!(published * 2 + 2 >= ticks);
    }

    #[test]
    fn failing_reads_still_wait_for_consumer() {
        let (inner, updates, _) = ScriptedDevice::new();
        let device = FailAfterFirst { inner, reads: 0 };
        let store = Arc::new(PoseStore::new());
        let sampler =
            PoseSampler::spawn(device, store.clone(), Duration::from_secs(30)).unwrap();

        thread::sleep(Duration::from_millis(20));
        store.fetch_latest();
        thread::sleep(Duration::from_millis(100));

        // One fetch buys exactly one more tick; the failed read does not
        // leave the consumption signal set.
        let ticks = updates.load(Ordering::SeqCst);
        assert_eq!(ticks, 2, "sampler ticked {ticks} times");
        assert_eq!(store.fetch_latest().generation, 1);
        drop(sampler);
    }

    #[test]
    fn drop_stops_thread_and_releases_device() {
        let (device, updates, released) = ScriptedDevice::new();
        let store = Arc::new(PoseStore::new());
        let sampler =
            PoseSampler::spawn(device, store.clone(), Duration::from_secs(30)).unwrap();
        assert_eq!(sampler.info().geometry.horizontal_pixels, 2160);

        thread::sleep(Duration::from_millis(10));
        drop(sampler);

        assert!(released.load(Ordering::SeqCst));
        let after_drop = updates.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(updates.load(Ordering::SeqCst), after_drop);
    }
}
