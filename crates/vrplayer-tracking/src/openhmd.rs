//! OpenHMD backend.
//!
//! The library is loaded at runtime so the player still starts (with an
//! untracked pose) on machines without OpenHMD installed.

use crate::device::{DeviceError, TrackingDevice};
use crate::types::{DeviceCalibration, DeviceGeometry, DeviceInfo, EyeMatrices};
use glam::Mat4;
use libloading::Library;
use std::ffi::{c_char, c_float, c_int, c_void, CStr};
use tracing::{debug, info, warn};

#[cfg(target_os = "linux")]
const LIBRARY_NAMES: &[&str] = &["libopenhmd.so.0", "libopenhmd.so"];
#[cfg(target_os = "macos")]
const LIBRARY_NAMES: &[&str] = &["libopenhmd.0.dylib", "libopenhmd.dylib"];
#[cfg(target_os = "windows")]
const LIBRARY_NAMES: &[&str] = &["openhmd.dll", "libopenhmd.dll"];
#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
const LIBRARY_NAMES: &[&str] = &["libopenhmd.so"];

// ohmd_string_value
const OHMD_VENDOR: c_int = 0;
const OHMD_PRODUCT: c_int = 1;

// ohmd_int_value
const OHMD_SCREEN_HORIZONTAL_RESOLUTION: c_int = 0;
const OHMD_SCREEN_VERTICAL_RESOLUTION: c_int = 1;

// ohmd_float_value
const OHMD_LEFT_EYE_GL_MODELVIEW_MATRIX: c_int = 2;
const OHMD_RIGHT_EYE_GL_MODELVIEW_MATRIX: c_int = 3;
const OHMD_LEFT_EYE_GL_PROJECTION_MATRIX: c_int = 4;
const OHMD_RIGHT_EYE_GL_PROJECTION_MATRIX: c_int = 5;
const OHMD_SCREEN_HORIZONTAL_SIZE: c_int = 7;
const OHMD_SCREEN_VERTICAL_SIZE: c_int = 8;
const OHMD_LENS_HORIZONTAL_SEPARATION: c_int = 9;
const OHMD_LENS_VERTICAL_POSITION: c_int = 10;
const OHMD_EYE_IPD: c_int = 15;
const OHMD_UNIVERSAL_DISTORTION_K: c_int = 20;
const OHMD_UNIVERSAL_ABERRATION_K: c_int = 21;

// ohmd_int_settings
const OHMD_IDS_AUTOMATIC_UPDATE: c_int = 0;

type CtxCreate = unsafe extern "C" fn() -> *mut c_void;
type CtxDestroy = unsafe extern "C" fn(*mut c_void);
type CtxGetError = unsafe extern "C" fn(*mut c_void) -> *const c_char;
type CtxUpdate = unsafe extern "C" fn(*mut c_void);
type CtxProbe = unsafe extern "C" fn(*mut c_void) -> c_int;
type ListGets = unsafe extern "C" fn(*mut c_void, c_int, c_int) -> *const c_char;
type ListOpenDeviceS = unsafe extern "C" fn(*mut c_void, c_int, *mut c_void) -> *mut c_void;
type DeviceSettingsCreate = unsafe extern "C" fn(*mut c_void) -> *mut c_void;
type DeviceSettingsSeti = unsafe extern "C" fn(*mut c_void, c_int, *const c_int) -> c_int;
type DeviceSettingsDestroy = unsafe extern "C" fn(*mut c_void);
type CloseDevice = unsafe extern "C" fn(*mut c_void) -> c_int;
type DeviceGetf = unsafe extern "C" fn(*mut c_void, c_int, *mut c_float) -> c_int;
type DeviceGeti = unsafe extern "C" fn(*mut c_void, c_int, *mut c_int) -> c_int;

/// Entry points of the OpenHMD shared library.
struct OpenHmdLibrary {
    ctx_create: CtxCreate,
    ctx_destroy: CtxDestroy,
    ctx_get_error: CtxGetError,
    ctx_update: CtxUpdate,
    ctx_probe: CtxProbe,
    list_gets: ListGets,
    list_open_device_s: ListOpenDeviceS,
    device_settings_create: DeviceSettingsCreate,
    device_settings_seti: DeviceSettingsSeti,
    device_settings_destroy: DeviceSettingsDestroy,
    close_device: CloseDevice,
    device_getf: DeviceGetf,
    device_geti: DeviceGeti,
    // Keeps the function pointers above valid.
    _lib: Library,
}

impl OpenHmdLibrary {
    fn load() -> Result<Self, DeviceError> {
        let mut last_error = String::from("no candidate library names");
        for name in LIBRARY_NAMES {
            match unsafe { Library::new(name) } {
                Ok(lib) => {
                    debug!(name, "Loaded OpenHMD");
                    return unsafe { Self::resolve(lib) }
                        .map_err(|e| DeviceError::Library(e.to_string()));
                }
                Err(e) => last_error = e.to_string(),
            }
        }
        Err(DeviceError::Library(last_error))
    }

    unsafe fn resolve(lib: Library) -> Result<Self, libloading::Error> {
        let ctx_create = *lib.get::<CtxCreate>(b"ohmd_ctx_create\0")?;
        let ctx_destroy = *lib.get::<CtxDestroy>(b"ohmd_ctx_destroy\0")?;
        let ctx_get_error = *lib.get::<CtxGetError>(b"ohmd_ctx_get_error\0")?;
        let ctx_update = *lib.get::<CtxUpdate>(b"ohmd_ctx_update\0")?;
        let ctx_probe = *lib.get::<CtxProbe>(b"ohmd_ctx_probe\0")?;
        let list_gets = *lib.get::<ListGets>(b"ohmd_list_gets\0")?;
        let list_open_device_s = *lib.get::<ListOpenDeviceS>(b"ohmd_list_open_device_s\0")?;
        let device_settings_create =
            *lib.get::<DeviceSettingsCreate>(b"ohmd_device_settings_create\0")?;
        let device_settings_seti = *lib.get::<DeviceSettingsSeti>(b"ohmd_device_settings_seti\0")?;
        let device_settings_destroy =
            *lib.get::<DeviceSettingsDestroy>(b"ohmd_device_settings_destroy\0")?;
        let close_device = *lib.get::<CloseDevice>(b"ohmd_close_device\0")?;
        let device_getf = *lib.get::<DeviceGetf>(b"ohmd_device_getf\0")?;
        let device_geti = *lib.get::<DeviceGeti>(b"ohmd_device_geti\0")?;

        Ok(Self {
            ctx_create,
            ctx_destroy,
            ctx_get_error,
            ctx_update,
            ctx_probe,
            list_gets,
            list_open_device_s,
            device_settings_create,
            device_settings_seti,
            device_settings_destroy,
            close_device,
            device_getf,
            device_geti,
            _lib: lib,
        })
    }
}

/// Owns an `ohmd_context` and the device opened from it.
pub struct OpenHmdDevice {
    lib: OpenHmdLibrary,
    ctx: *mut c_void,
    device: *mut c_void,
    info: DeviceInfo,
}

// The context and device pointers are only used by whichever thread owns
// this value; OpenHMD has no thread affinity.
unsafe impl Send for OpenHmdDevice {}

impl OpenHmdDevice {
    /// Probe for headsets and open the first one, with the driver's own
    /// update thread enabled.
    pub fn open_first() -> Result<Self, DeviceError> {
        let lib = OpenHmdLibrary::load()?;

        let ctx = unsafe { (lib.ctx_create)() };
        if ctx.is_null() {
            return Err(DeviceError::Open("ohmd_ctx_create returned null".into()));
        }

        let count = unsafe { (lib.ctx_probe)(ctx) };
        if count < 0 {
            let message = unsafe { context_error(&lib, ctx) };
            unsafe { (lib.ctx_destroy)(ctx) };
            return Err(DeviceError::Probe(message));
        }
        if count == 0 {
            unsafe { (lib.ctx_destroy)(ctx) };
            return Err(DeviceError::NoDevice);
        }

        let device = unsafe {
            let settings = (lib.device_settings_create)(ctx);
            let auto_update: c_int = 1;
            (lib.device_settings_seti)(settings, OHMD_IDS_AUTOMATIC_UPDATE, &auto_update);
            let device = (lib.list_open_device_s)(ctx, 0, settings);
            (lib.device_settings_destroy)(settings);
            device
        };
        if device.is_null() {
            let message = unsafe { context_error(&lib, ctx) };
            unsafe { (lib.ctx_destroy)(ctx) };
            return Err(DeviceError::Open(message));
        }

        let mut opened = Self {
            lib,
            ctx,
            device,
            info: DeviceInfo {
                vendor: String::new(),
                product: String::new(),
                geometry: DeviceGeometry {
                    horizontal_pixels: 0,
                    vertical_pixels: 0,
                },
                calibration: DeviceCalibration::default(),
            },
        };
        opened.info = opened.query_info()?;

        info!(
            vendor = %opened.info.vendor,
            product = %opened.info.product,
            width = opened.info.geometry.horizontal_pixels,
            height = opened.info.geometry.vertical_pixels,
            ipd = opened.info.calibration.ipd,
            "Opened tracking device"
        );
        debug!(calibration = ?opened.info.calibration, "Device calibration");

        Ok(opened)
    }

    fn query_info(&self) -> Result<DeviceInfo, DeviceError> {
        let vendor = unsafe { list_string(&self.lib, self.ctx, OHMD_VENDOR) };
        let product = unsafe { list_string(&self.lib, self.ctx, OHMD_PRODUCT) };

        let geometry = DeviceGeometry {
            horizontal_pixels: self.get_int(OHMD_SCREEN_HORIZONTAL_RESOLUTION, "screen width")?
                .max(0) as u32,
            vertical_pixels: self.get_int(OHMD_SCREEN_VERTICAL_RESOLUTION, "screen height")?
                .max(0) as u32,
        };

        let calibration = self.query_calibration().unwrap_or_else(|e| {
            warn!(?e, "Device calibration unavailable, parallax falls back to defaults");
            DeviceCalibration::default()
        });

        Ok(DeviceInfo {
            vendor,
            product,
            geometry,
            calibration,
        })
    }

    fn query_calibration(&self) -> Result<DeviceCalibration, DeviceError> {
        Ok(DeviceCalibration {
            ipd: self.get_float(OHMD_EYE_IPD, "ipd")?,
            screen_size: [
                self.get_float(OHMD_SCREEN_HORIZONTAL_SIZE, "screen size")?,
                self.get_float(OHMD_SCREEN_VERTICAL_SIZE, "screen size")?,
            ],
            lens_separation: self.get_float(OHMD_LENS_HORIZONTAL_SEPARATION, "lens separation")?,
            lens_vertical_position: self.get_float(OHMD_LENS_VERTICAL_POSITION, "lens position")?,
            distortion_k: self.get_floats(OHMD_UNIVERSAL_DISTORTION_K, "distortion")?,
            aberration_k: self.get_floats(OHMD_UNIVERSAL_ABERRATION_K, "aberration")?,
        })
    }

    fn get_int(&self, key: c_int, query: &'static str) -> Result<i32, DeviceError> {
        let mut value: c_int = 0;
        let status = unsafe { (self.lib.device_geti)(self.device, key, &mut value) };
        if status < 0 {
            return Err(DeviceError::Query { query, status });
        }
        Ok(value)
    }

    fn get_float(&self, key: c_int, query: &'static str) -> Result<f32, DeviceError> {
        let [value] = self.get_floats::<1>(key, query)?;
        Ok(value)
    }

    /// `N` must be at least the number of floats OpenHMD writes for `key`.
    fn get_floats<const N: usize>(
        &self,
        key: c_int,
        query: &'static str,
    ) -> Result<[f32; N], DeviceError> {
        let mut out = [0.0f32; N];
        let status = unsafe { (self.lib.device_getf)(self.device, key, out.as_mut_ptr()) };
        if status < 0 {
            return Err(DeviceError::Query { query, status });
        }
        Ok(out)
    }

    fn get_matrix(&self, key: c_int, query: &'static str) -> Result<Mat4, DeviceError> {
        let values = self.get_floats::<16>(key, query)?;
        // Taken row-wise, so the inverse published by the sampler keeps
        // the modelview's rotation and drops its eye translation into w.
        Ok(Mat4::from_cols_array(&values).transpose())
    }
}

impl TrackingDevice for OpenHmdDevice {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn update(&mut self) {
        unsafe { (self.lib.ctx_update)(self.ctx) };
    }

    fn read_matrices(&mut self) -> Result<EyeMatrices, DeviceError> {
        Ok(EyeMatrices {
            left_view: self.get_matrix(OHMD_LEFT_EYE_GL_MODELVIEW_MATRIX, "left modelview")?,
            right_view: self.get_matrix(OHMD_RIGHT_EYE_GL_MODELVIEW_MATRIX, "right modelview")?,
            left_projection: self
                .get_matrix(OHMD_LEFT_EYE_GL_PROJECTION_MATRIX, "left projection")?,
            right_projection: self
                .get_matrix(OHMD_RIGHT_EYE_GL_PROJECTION_MATRIX, "right projection")?,
        })
    }
}

impl Drop for OpenHmdDevice {
    fn drop(&mut self) {
        unsafe {
            (self.lib.close_device)(self.device);
            (self.lib.ctx_destroy)(self.ctx);
        }
        debug!("Closed tracking device");
    }
}

unsafe fn context_error(lib: &OpenHmdLibrary, ctx: *mut c_void) -> String {
    let ptr = (lib.ctx_get_error)(ctx);
    if ptr.is_null() {
        return "unknown error".into();
    }
    CStr::from_ptr(ptr).to_string_lossy().into_owned()
}

unsafe fn list_string(lib: &OpenHmdLibrary, ctx: *mut c_void, key: c_int) -> String {
    let ptr = (lib.list_gets)(ctx, 0, key);
    if ptr.is_null() {
        return String::new();
    }
    CStr::from_ptr(ptr).to_string_lossy().into_owned()
}
