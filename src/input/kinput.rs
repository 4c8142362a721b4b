//! Native injection host bindings (Windows)
//!
//! The host module exports a flat C API keyed by target pid. Booleans cross
//! the boundary as 32-bit integers.

use std::ffi::c_void;
use std::path::{Path, PathBuf};

use windows::core::{PCSTR, PCWSTR};
use windows::Win32::Foundation::{FreeLibrary, HMODULE};
use windows::Win32::System::LibraryLoader::{GetProcAddress, LoadLibraryW};

use super::injector::{InputChannel, KeyEvent, MouseEvent, WheelEvent};
use super::InputError;

type CreateFn = unsafe extern "C" fn(i32) -> i32;
type DeleteFn = unsafe extern "C" fn(i32) -> i32;
type FocusFn = unsafe extern "C" fn(i32, i32) -> i32;
type KeyFn = unsafe extern "C" fn(i32, i32, i64, i32, i32, u16, i32) -> i32;
type MouseFn = unsafe extern "C" fn(i32, i32, i64, i32, i32, i32, i32, i32, i32) -> i32;
type WheelFn =
    unsafe extern "C" fn(i32, i32, i64, i32, i32, i32, i32, i32, i32, i32, i32) -> i32;

/// Loaded host module
pub struct KInputChannel {
    module: HMODULE,
    create: CreateFn,
    delete: DeleteFn,
    focus: FocusFn,
    key: KeyFn,
    mouse: MouseFn,
    wheel: WheelFn,
}

// Plain function pointers into a module that stays mapped until drop.
unsafe impl Send for KInputChannel {}
unsafe impl Sync for KInputChannel {}

fn wide(path: &Path) -> Vec<u16> {
    use std::os::windows::ffi::OsStrExt;
    path.as_os_str().encode_wide().chain(Some(0)).collect()
}

unsafe fn symbol(module: HMODULE, name: &'static [u8]) -> Result<*const c_void, InputError> {
    match GetProcAddress(module, PCSTR(name.as_ptr())) {
        Some(f) => Ok(f as *const c_void),
        None => Err(InputError::LibraryLoad(format!(
            "missing export {}",
            String::from_utf8_lossy(&name[..name.len() - 1])
        ))),
    }
}

impl KInputChannel {
    /// Load `<dir>/<name>.dll`
    pub fn load(dir: &Path, name: &str) -> Result<Self, InputError> {
        let path: PathBuf = dir.join(format!("{}.dll", name));
        if !path.exists() {
            return Err(InputError::LibraryLoad(format!(
                "{} not found",
                path.display()
            )));
        }
        let wide_path = wide(&path);
        unsafe {
            let module = LoadLibraryW(PCWSTR(wide_path.as_ptr()))
                .map_err(|e| InputError::LibraryLoad(format!("{}: {}", path.display(), e)))?;

            let loaded = (|| -> Result<Self, InputError> {
                Ok(Self {
                    module,
                    create: std::mem::transmute::<*const c_void, CreateFn>(symbol(module, b"KInput_Create\0")?),
                    delete: std::mem::transmute::<*const c_void, DeleteFn>(symbol(module, b"KInput_Delete\0")?),
                    focus: std::mem::transmute::<*const c_void, FocusFn>(symbol(module, b"KInput_FocusEvent\0")?),
                    key: std::mem::transmute::<*const c_void, KeyFn>(symbol(module, b"KInput_KeyEvent\0")?),
                    mouse: std::mem::transmute::<*const c_void, MouseFn>(symbol(module, b"KInput_MouseEvent\0")?),
                    wheel: std::mem::transmute::<*const c_void, WheelFn>(symbol(module, b"KInput_MouseWheelEvent\0")?),
                })
            })();

            match &loaded {
                Ok(_) => log::info!("Loaded input host module {}", path.display()),
                Err(_) => {
                    let _ = FreeLibrary(module);
                }
            }
            loaded
        }
    }
}

impl Drop for KInputChannel {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = FreeLibrary(self.module) {
                log::warn!("Failed to unload input host module: {}", e);
            }
        }
    }
}

impl InputChannel for KInputChannel {
    fn create(&self, pid: u32) -> bool {
        unsafe { (self.create)(pid as i32) != 0 }
    }

    fn delete(&self, pid: u32) -> bool {
        unsafe { (self.delete)(pid as i32) != 0 }
    }

    fn focus_event(&self, pid: u32, id: i32) -> bool {
        unsafe { (self.focus)(pid as i32, id) != 0 }
    }

    fn key_event(&self, pid: u32, e: KeyEvent) -> bool {
        unsafe {
            (self.key)(
                pid as i32,
                e.id,
                e.when,
                e.modifiers,
                e.key_code,
                e.key_char,
                e.key_location,
            ) != 0
        }
    }

    fn mouse_event(&self, pid: u32, e: MouseEvent) -> bool {
        unsafe {
            (self.mouse)(
                pid as i32,
                e.id,
                e.when,
                e.modifiers,
                e.x,
                e.y,
                e.click_count,
                e.popup_trigger as i32,
                e.button,
            ) != 0
        }
    }

    fn wheel_event(&self, pid: u32, e: WheelEvent) -> bool {
        unsafe {
            (self.wheel)(
                pid as i32,
                e.id,
                e.when,
                e.modifiers,
                e.x,
                e.y,
                e.click_count,
                e.popup_trigger as i32,
                e.scroll_type,
                e.scroll_amount,
                e.wheel_rotation,
            ) != 0
        }
    }
}
