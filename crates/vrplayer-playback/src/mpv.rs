//! libmpv backend.
//!
//! Uses the software render API: mpv scales and converts the current frame
//! into a caller-owned RGBX buffer, which the renderer uploads as a texture.

use crate::{
    EngineCallbacks, EngineError, EngineEvent, EngineOptions, FrameTarget, PlaybackEngine, Property,
};
use libloading::Library;
use std::ffi::{c_char, c_double, c_int, c_void, CStr, CString};
use std::path::Path;
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

#[cfg(target_os = "linux")]
const LIBRARY_NAMES: &[&str] = &["libmpv.so.2", "libmpv.so.1", "libmpv.so"];
#[cfg(target_os = "macos")]
const LIBRARY_NAMES: &[&str] = &["libmpv.2.dylib", "libmpv.dylib"];
#[cfg(target_os = "windows")]
const LIBRARY_NAMES: &[&str] = &["libmpv-2.dll", "mpv-2.dll", "mpv-1.dll"];
#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
const LIBRARY_NAMES: &[&str] = &["libmpv.so"];

// mpv_event_id
const MPV_EVENT_NONE: c_int = 0;
const MPV_EVENT_SHUTDOWN: c_int = 1;
const MPV_EVENT_END_FILE: c_int = 7;
const MPV_EVENT_PROPERTY_CHANGE: c_int = 22;

// mpv_format
const MPV_FORMAT_DOUBLE: c_int = 5;

// mpv_render_param_type
const MPV_RENDER_PARAM_INVALID: c_int = 0;
const MPV_RENDER_PARAM_API_TYPE: c_int = 1;
const MPV_RENDER_PARAM_SW_SIZE: c_int = 17;
const MPV_RENDER_PARAM_SW_FORMAT: c_int = 18;
const MPV_RENDER_PARAM_SW_STRIDE: c_int = 19;
const MPV_RENDER_PARAM_SW_POINTER: c_int = 20;

// mpv_render_update_flag
const MPV_RENDER_UPDATE_FRAME: u64 = 1;

const MPV_RENDER_API_TYPE_SW: &[u8] = b"sw\0";
const SW_FORMAT_RGB0: &[u8] = b"rgb0\0";

#[repr(C)]
struct MpvEvent {
    event_id: c_int,
    error: c_int,
    reply_userdata: u64,
    data: *mut c_void,
}

#[repr(C)]
struct MpvEventProperty {
    name: *const c_char,
    format: c_int,
    data: *mut c_void,
}

#[repr(C)]
struct MpvRenderParam {
    kind: c_int,
    data: *mut c_void,
}

type Callback = unsafe extern "C" fn(*mut c_void);

type Create = unsafe extern "C" fn() -> *mut c_void;
type Initialize = unsafe extern "C" fn(*mut c_void) -> c_int;
type TerminateDestroy = unsafe extern "C" fn(*mut c_void);
type SetOptionString = unsafe extern "C" fn(*mut c_void, *const c_char, *const c_char) -> c_int;
type Command = unsafe extern "C" fn(*mut c_void, *mut *const c_char) -> c_int;
type ObserveProperty = unsafe extern "C" fn(*mut c_void, u64, *const c_char, c_int) -> c_int;
type WaitEvent = unsafe extern "C" fn(*mut c_void, c_double) -> *mut MpvEvent;
type SetWakeupCallback = unsafe extern "C" fn(*mut c_void, Option<Callback>, *mut c_void);
type ErrorString = unsafe extern "C" fn(c_int) -> *const c_char;
type RenderContextCreate =
    unsafe extern "C" fn(*mut *mut c_void, *mut c_void, *mut MpvRenderParam) -> c_int;
type RenderContextSetUpdateCallback =
    unsafe extern "C" fn(*mut c_void, Option<Callback>, *mut c_void);
type RenderContextUpdate = unsafe extern "C" fn(*mut c_void) -> u64;
type RenderContextRender = unsafe extern "C" fn(*mut c_void, *mut MpvRenderParam) -> c_int;
type RenderContextFree = unsafe extern "C" fn(*mut c_void);

struct MpvLibrary {
    create: Create,
    initialize: Initialize,
    terminate_destroy: TerminateDestroy,
    set_option_string: SetOptionString,
    command: Command,
    observe_property: ObserveProperty,
    wait_event: WaitEvent,
    set_wakeup_callback: SetWakeupCallback,
    error_string: ErrorString,
    render_context_create: RenderContextCreate,
    render_context_set_update_callback: RenderContextSetUpdateCallback,
    render_context_update: RenderContextUpdate,
    render_context_render: RenderContextRender,
    render_context_free: RenderContextFree,
    _lib: Library,
}

impl MpvLibrary {
    fn load() -> Result<Self, EngineError> {
        let mut last_error = String::from("no candidate library names");
        for name in LIBRARY_NAMES {
            match unsafe { Library::new(name) } {
                Ok(lib) => {
                    debug!(name, "Loaded libmpv");
                    return unsafe { Self::resolve(lib) }
                        .map_err(|e| EngineError::Library(e.to_string()));
                }
                Err(e) => last_error = e.to_string(),
            }
        }
        Err(EngineError::Library(last_error))
    }

    unsafe fn resolve(lib: Library) -> Result<Self, libloading::Error> {
        let create = *lib.get::<Create>(b"mpv_create\0")?;
        let initialize = *lib.get::<Initialize>(b"mpv_initialize\0")?;
        let terminate_destroy = *lib.get::<TerminateDestroy>(b"mpv_terminate_destroy\0")?;
        let set_option_string = *lib.get::<SetOptionString>(b"mpv_set_option_string\0")?;
        let command = *lib.get::<Command>(b"mpv_command\0")?;
        let observe_property = *lib.get::<ObserveProperty>(b"mpv_observe_property\0")?;
        let wait_event = *lib.get::<WaitEvent>(b"mpv_wait_event\0")?;
        let set_wakeup_callback = *lib.get::<SetWakeupCallback>(b"mpv_set_wakeup_callback\0")?;
        let error_string = *lib.get::<ErrorString>(b"mpv_error_string\0")?;
        let render_context_create =
            *lib.get::<RenderContextCreate>(b"mpv_render_context_create\0")?;
        let render_context_set_update_callback = *lib
            .get::<RenderContextSetUpdateCallback>(b"mpv_render_context_set_update_callback\0")?;
        let render_context_update =
            *lib.get::<RenderContextUpdate>(b"mpv_render_context_update\0")?;
        let render_context_render =
            *lib.get::<RenderContextRender>(b"mpv_render_context_render\0")?;
        let render_context_free = *lib.get::<RenderContextFree>(b"mpv_render_context_free\0")?;

        Ok(Self {
            create,
            initialize,
            terminate_destroy,
            set_option_string,
            command,
            observe_property,
            wait_event,
            set_wakeup_callback,
            error_string,
            render_context_create,
            render_context_set_update_callback,
            render_context_update,
            render_context_render,
            render_context_free,
            _lib: lib,
        })
    }

    fn describe(&self, status: c_int) -> String {
        let message = unsafe { (self.error_string)(status) };
        if message.is_null() {
            return format!("error {status}");
        }
        unsafe { CStr::from_ptr(message) }.to_string_lossy().into_owned()
    }
}

/// State reachable from mpv's callback threads.
struct Shared {
    callbacks: EngineCallbacks,
    update_requested: AtomicBool,
}

unsafe extern "C" fn on_wakeup(data: *mut c_void) {
    let shared = &*(data as *const Shared);
    (shared.callbacks.on_wakeup)();
}

unsafe extern "C" fn on_render_update(data: *mut c_void) {
    let shared = &*(data as *const Shared);
    shared.update_requested.store(true, Ordering::Release);
    (shared.callbacks.on_frame)();
}

/// An initialized mpv instance with a software render context.
pub struct MpvEngine {
    lib: MpvLibrary,
    handle: *mut c_void,
    render: *mut c_void,
    // Pointed to by both registered callbacks; outlives `handle`/`render`.
    shared: Box<Shared>,
    frame_pending: bool,
    shut_down: bool,
}

impl MpvEngine {
    pub fn new(options: &EngineOptions, callbacks: EngineCallbacks) -> Result<Self, EngineError> {
        let lib = MpvLibrary::load()?;

        let handle = unsafe { (lib.create)() };
        if handle.is_null() {
            return Err(EngineError::Create);
        }

        let mut engine = Self {
            lib,
            handle,
            render: ptr::null_mut(),
            shared: Box::new(Shared {
                callbacks,
                update_requested: AtomicBool::new(false),
            }),
            frame_pending: false,
            shut_down: false,
        };

        for (name, value) in options.option_pairs() {
            engine.set_option(name, &value)?;
        }

        let status = unsafe { (engine.lib.initialize)(engine.handle) };
        if status < 0 {
            return Err(EngineError::Initialize(engine.lib.describe(status)));
        }

        for (index, property) in Property::ALL.iter().enumerate() {
            let name = to_cstring(property.name())?;
            let status = unsafe {
                (engine.lib.observe_property)(
                    engine.handle,
                    index as u64,
                    name.as_ptr(),
                    MPV_FORMAT_DOUBLE,
                )
            };
            if status < 0 {
                warn!(
                    property = property.name(),
                    error = %engine.lib.describe(status),
                    "Failed to observe property"
                );
            }
        }

        let shared_ptr = &*engine.shared as *const Shared as *mut c_void;
        unsafe { (engine.lib.set_wakeup_callback)(engine.handle, Some(on_wakeup), shared_ptr) };

        let mut params = [
            MpvRenderParam {
                kind: MPV_RENDER_PARAM_API_TYPE,
                data: MPV_RENDER_API_TYPE_SW.as_ptr() as *mut c_void,
            },
            MpvRenderParam {
                kind: MPV_RENDER_PARAM_INVALID,
                data: ptr::null_mut(),
            },
        ];
        let mut render = ptr::null_mut();
        let status = unsafe {
            (engine.lib.render_context_create)(&mut render, engine.handle, params.as_mut_ptr())
        };
        if status < 0 || render.is_null() {
            return Err(EngineError::RenderContext(engine.lib.describe(status)));
        }
        engine.render = render;
        unsafe {
            (engine.lib.render_context_set_update_callback)(
                engine.render,
                Some(on_render_update),
                shared_ptr,
            )
        };

        info!(hwdec = %options.hwdec, "Playback engine initialized");
        Ok(engine)
    }

    fn set_option(&mut self, name: &str, value: &str) -> Result<(), EngineError> {
        let c_name = to_cstring(name)?;
        let c_value = to_cstring(value)?;
        let status =
            unsafe { (self.lib.set_option_string)(self.handle, c_name.as_ptr(), c_value.as_ptr()) };
        if status < 0 {
            return Err(EngineError::SetOption {
                name: name.to_string(),
                message: self.lib.describe(status),
            });
        }
        debug!(name, value, "Set engine option");
        Ok(())
    }

    fn command(&mut self, args: &[&str]) -> Result<(), EngineError> {
        let owned = args
            .iter()
            .map(|a| to_cstring(a))
            .collect::<Result<Vec<_>, _>>()?;
        let mut argv: Vec<*const c_char> = owned.iter().map(|a| a.as_ptr()).collect();
        argv.push(ptr::null());

        let status = unsafe { (self.lib.command)(self.handle, argv.as_mut_ptr()) };
        if status < 0 {
            return Err(EngineError::Command {
                command: args.join(" "),
                message: self.lib.describe(status),
            });
        }
        Ok(())
    }
}

impl PlaybackEngine for MpvEngine {
    fn load_file(&mut self, path: &Path) -> Result<(), EngineError> {
        let path = path
            .to_str()
            .ok_or_else(|| EngineError::InvalidArgument(path.display().to_string()))?;
        self.command(&["loadfile", path])?;
        info!(path, "Loading video");
        Ok(())
    }

    fn frame_pending(&mut self) -> bool {
        if self.shared.update_requested.swap(false, Ordering::AcqRel) {
            let flags = unsafe { (self.lib.render_context_update)(self.render) };
            if flags & MPV_RENDER_UPDATE_FRAME != 0 {
                self.frame_pending = true;
            }
        }
        self.frame_pending
    }

    fn render_frame(&mut self, target: &mut FrameTarget) -> Result<(), EngineError> {
        let mut size: [c_int; 2] = [target.width() as c_int, target.height() as c_int];
        let mut stride: usize = target.stride() as usize;

        let mut params = [
            MpvRenderParam {
                kind: MPV_RENDER_PARAM_SW_SIZE,
                data: size.as_mut_ptr() as *mut c_void,
            },
            MpvRenderParam {
                kind: MPV_RENDER_PARAM_SW_FORMAT,
                data: SW_FORMAT_RGB0.as_ptr() as *mut c_void,
            },
            MpvRenderParam {
                kind: MPV_RENDER_PARAM_SW_STRIDE,
                data: &mut stride as *mut usize as *mut c_void,
            },
            MpvRenderParam {
                kind: MPV_RENDER_PARAM_SW_POINTER,
                data: target.pixels_mut().as_mut_ptr() as *mut c_void,
            },
            MpvRenderParam {
                kind: MPV_RENDER_PARAM_INVALID,
                data: ptr::null_mut(),
            },
        ];

        let status = unsafe { (self.lib.render_context_render)(self.render, params.as_mut_ptr()) };
        if status < 0 {
            return Err(EngineError::Render(self.lib.describe(status)));
        }
        self.frame_pending = false;
        Ok(())
    }

    fn key_press(&mut self, name: &str) -> Result<(), EngineError> {
        debug!(key = name, "Forwarding key to engine");
        self.command(&["keypress", name])
    }

    fn drain_events(&mut self) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        // mpv keeps reporting SHUTDOWN once it happened.
        while !self.shut_down {
            let event = unsafe { &*(self.lib.wait_event)(self.handle, 0.0) };
            match event.event_id {
                MPV_EVENT_NONE => break,
                MPV_EVENT_SHUTDOWN => {
                    self.shut_down = true;
                    events.push(EngineEvent::Shutdown);
                }
                MPV_EVENT_END_FILE => events.push(EngineEvent::EndOfFile),
                MPV_EVENT_PROPERTY_CHANGE => {
                    if let Some(change) = unsafe { property_change(event) } {
                        events.push(change);
                    }
                }
                _ => {}
            }
        }
        events
    }
}

impl Drop for MpvEngine {
    fn drop(&mut self) {
        unsafe {
            if !self.render.is_null() {
                (self.lib.render_context_free)(self.render);
            }
            (self.lib.terminate_destroy)(self.handle);
        }
        debug!("Playback engine destroyed");
    }
}

/// Decode a property-change event. Unset properties carry no data.
unsafe fn property_change(event: &MpvEvent) -> Option<EngineEvent> {
    if event.data.is_null() {
        return None;
    }
    let property = Property::ALL.get(event.reply_userdata as usize).copied()?;
    let change = &*(event.data as *const MpvEventProperty);
    if change.format != MPV_FORMAT_DOUBLE || change.data.is_null() {
        return None;
    }
    let value = *(change.data as *const f64);
    Some(EngineEvent::PropertyChanged(property, value))
}

fn to_cstring(s: &str) -> Result<CString, EngineError> {
    CString::new(s).map_err(|_| EngineError::InvalidArgument(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_change_uses_reply_userdata_index() {
        let mut value: f64 = 12.5;
        let mut change = MpvEventProperty {
            name: b"duration\0".as_ptr() as *const c_char,
            format: MPV_FORMAT_DOUBLE,
            data: &mut value as *mut f64 as *mut c_void,
        };
        let event = MpvEvent {
            event_id: MPV_EVENT_PROPERTY_CHANGE,
            error: 0,
            reply_userdata: 1,
            data: &mut change as *mut MpvEventProperty as *mut c_void,
        };

        let decoded = unsafe { property_change(&event) };
        assert_eq!(
            decoded,
            Some(EngineEvent::PropertyChanged(Property::Duration, 12.5))
        );
    }

    #[test]
    fn unset_property_is_ignored() {
        let mut change = MpvEventProperty {
            name: b"width\0".as_ptr() as *const c_char,
            format: 0,
            data: ptr::null_mut(),
        };
        let event = MpvEvent {
            event_id: MPV_EVENT_PROPERTY_CHANGE,
            error: 0,
            reply_userdata: 2,
            data: &mut change as *mut MpvEventProperty as *mut c_void,
        };
        assert_eq!(unsafe { property_change(&event) }, None);
    }

    #[test]
    fn unknown_userdata_is_ignored() {
        let mut value: f64 = 1.0;
        let mut change = MpvEventProperty {
            name: b"volume\0".as_ptr() as *const c_char,
            format: MPV_FORMAT_DOUBLE,
            data: &mut value as *mut f64 as *mut c_void,
        };
        let event = MpvEvent {
            event_id: MPV_EVENT_PROPERTY_CHANGE,
            error: 0,
            reply_userdata: 99,
            data: &mut change as *mut MpvEventProperty as *mut c_void,
        };
        assert_eq!(unsafe { property_change(&event) }, None);
    }

    #[test]
    fn interior_nul_is_rejected() {
        assert!(matches!(
            to_cstring("a\0b"),
            Err(EngineError::InvalidArgument(_))
        ));
    }
}
