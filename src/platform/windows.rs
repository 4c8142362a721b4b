//! Win32 window system

use std::ffi::c_void;

use image::RgbImage;
use windows::Win32::Foundation::{BOOL, FALSE, HWND, LPARAM, POINT, RECT, TRUE};
use windows::Win32::Graphics::Gdi::{
    BitBlt, ClientToScreen, CreateCompatibleBitmap, CreateCompatibleDC, DeleteDC, DeleteObject,
    GetDC, GetDIBits, GetMonitorInfoW, MonitorFromWindow, ReleaseDC, SelectObject, BITMAPINFO,
    BITMAPINFOHEADER, BI_RGB, DIB_RGB_COLORS, HBITMAP, HDC, HGDIOBJ, MONITORINFO,
    MONITOR_DEFAULTTONEAREST, SRCCOPY,
};
use windows::Win32::UI::WindowsAndMessaging::{
    EnumChildWindows, EnumWindows, GetClassNameW, GetClientRect, GetWindowTextW,
    GetWindowThreadProcessId, SetForegroundWindow, ShowWindow, SW_RESTORE,
};

use super::{PlatformError, WindowId, WindowSystem};
use crate::geometry::Rect;

fn hwnd(id: WindowId) -> HWND {
    HWND(id.0)
}

fn utf16_to_string(buffer: &[u16], len: i32) -> String {
    let len = len.max(0) as usize;
    String::from_utf16_lossy(&buffer[..len.min(buffer.len())])
}

fn window_text(window: HWND) -> String {
    let mut buffer = [0u16; 512];
    let len = unsafe { GetWindowTextW(window, &mut buffer) };
    utf16_to_string(&buffer, len)
}

fn class_name(window: HWND) -> String {
    let mut buffer = [0u16; 256];
    let len = unsafe { GetClassNameW(window, &mut buffer) };
    utf16_to_string(&buffer, len)
}

struct TitleSearch {
    title: String,
    found: Option<HWND>,
}

unsafe extern "system" fn visit_top_level(window: HWND, lparam: LPARAM) -> BOOL {
    let search = &mut *(lparam.0 as *mut TitleSearch);
    if window_text(window).trim() == search.title {
        search.found = Some(window);
        return FALSE;
    }
    TRUE
}

struct ClassSearch {
    class: String,
    remaining: usize,
    found: Option<HWND>,
}

unsafe extern "system" fn visit_child(window: HWND, lparam: LPARAM) -> BOOL {
    let search = &mut *(lparam.0 as *mut ClassSearch);
    if class_name(window) == search.class {
        search.remaining -= 1;
        if search.remaining == 0 {
            search.found = Some(window);
            return FALSE;
        }
    }
    TRUE
}

/// Device contexts and bitmap for one capture, released on drop
struct GdiCapture {
    window: HWND,
    window_dc: HDC,
    memory_dc: HDC,
    bitmap: HBITMAP,
    previous: HGDIOBJ,
}

impl GdiCapture {
    unsafe fn new(window: HWND, width: i32, height: i32) -> Result<Self, PlatformError> {
        let window_dc = GetDC(window);
        if window_dc.is_invalid() {
            return Err(PlatformError::Os("GetDC failed".into()));
        }
        let memory_dc = CreateCompatibleDC(window_dc);
        let bitmap = CreateCompatibleBitmap(window_dc, width, height);
        let previous = SelectObject(memory_dc, bitmap);
        let capture = Self {
            window,
            window_dc,
            memory_dc,
            bitmap,
            previous,
        };
        if memory_dc.is_invalid() || bitmap.is_invalid() {
            return Err(PlatformError::Os("could not allocate capture bitmap".into()));
        }
        Ok(capture)
    }
}

impl Drop for GdiCapture {
    fn drop(&mut self) {
        unsafe {
            if !self.memory_dc.is_invalid() {
                SelectObject(self.memory_dc, self.previous);
                let _ = DeleteDC(self.memory_dc);
            }
            if !self.bitmap.is_invalid() {
                let _ = DeleteObject(self.bitmap);
            }
            ReleaseDC(self.window, self.window_dc);
        }
    }
}

/// Real Win32 windows
#[derive(Debug, Default)]
pub struct Win32Desktop;

impl Win32Desktop {
    pub fn new() -> Self {
        Self
    }
}

impl WindowSystem for Win32Desktop {
    fn find_window(&self, title: &str) -> Result<Option<WindowId>, PlatformError> {
        let mut search = TitleSearch {
            title: title.to_string(),
            found: None,
        };
        unsafe {
            // Stopping early makes EnumWindows report an error; ignore it
            let _ = EnumWindows(
                Some(visit_top_level),
                LPARAM(&mut search as *mut TitleSearch as isize),
            );
        }
        Ok(search.found.map(|h| WindowId(h.0)))
    }

    fn find_child(
        &self,
        parent: WindowId,
        class: &str,
        index: usize,
    ) -> Result<Option<WindowId>, PlatformError> {
        if index == 0 {
            return Ok(None);
        }
        let mut search = ClassSearch {
            class: class.to_string(),
            remaining: index,
            found: None,
        };
        unsafe {
            let _ = EnumChildWindows(
                hwnd(parent),
                Some(visit_child),
                LPARAM(&mut search as *mut ClassSearch as isize),
            );
        }
        Ok(search.found.map(|h| WindowId(h.0)))
    }

    fn pid(&self, window: WindowId) -> Result<u32, PlatformError> {
        let mut pid = 0u32;
        let thread = unsafe { GetWindowThreadProcessId(hwnd(window), Some(&mut pid)) };
        if thread == 0 || pid == 0 {
            return Err(PlatformError::InvalidHandle(window));
        }
        Ok(pid)
    }

    fn client_bounds(&self, window: WindowId) -> Result<Rect, PlatformError> {
        let mut rect = RECT::default();
        let mut origin = POINT { x: 0, y: 0 };
        unsafe {
            GetClientRect(hwnd(window), &mut rect)
                .map_err(|e| PlatformError::Os(format!("GetClientRect: {}", e)))?;
            if !ClientToScreen(hwnd(window), &mut origin).as_bool() {
                return Err(PlatformError::Os("ClientToScreen failed".into()));
            }
        }
        Ok(Rect::new(
            origin.x,
            origin.y,
            rect.right - rect.left,
            rect.bottom - rect.top,
        ))
    }

    fn focus(&self, window: WindowId) -> Result<(), PlatformError> {
        unsafe {
            let _ = ShowWindow(hwnd(window), SW_RESTORE);
            if !SetForegroundWindow(hwnd(window)).as_bool() {
                log::warn!("SetForegroundWindow refused for {:?}", window);
            }
        }
        Ok(())
    }

    fn monitor_bounds(&self, window: WindowId) -> Result<Rect, PlatformError> {
        let mut info = MONITORINFO {
            cbSize: std::mem::size_of::<MONITORINFO>() as u32,
            ..Default::default()
        };
        unsafe {
            let monitor = MonitorFromWindow(hwnd(window), MONITOR_DEFAULTTONEAREST);
            if !GetMonitorInfoW(monitor, &mut info).as_bool() {
                return Err(PlatformError::Os("GetMonitorInfoW failed".into()));
            }
        }
        let r = info.rcMonitor;
        Ok(Rect::new(r.left, r.top, r.right - r.left, r.bottom - r.top))
    }

    fn capture_client(&self, window: WindowId) -> Result<RgbImage, PlatformError> {
        let bounds = self.client_bounds(window)?;
        let (width, height) = (bounds.width, bounds.height);
        if width <= 0 || height <= 0 {
            return Err(PlatformError::Os(format!(
                "client area of {:?} is empty",
                window
            )));
        }

        let mut bgra = vec![0u8; width as usize * height as usize * 4];
        unsafe {
            let capture = GdiCapture::new(hwnd(window), width, height)?;
            BitBlt(
                capture.memory_dc,
                0,
                0,
                width,
                height,
                capture.window_dc,
                0,
                0,
                SRCCOPY,
            )
            .map_err(|e| PlatformError::Os(format!("BitBlt: {}", e)))?;

            let mut info = BITMAPINFO {
                bmiHeader: BITMAPINFOHEADER {
                    biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
                    biWidth: width,
                    // Negative height asks for a top-down raster
                    biHeight: -height,
                    biPlanes: 1,
                    biBitCount: 32,
                    biCompression: BI_RGB.0,
                    ..Default::default()
                },
                ..Default::default()
            };
            let lines = GetDIBits(
                capture.memory_dc,
                capture.bitmap,
                0,
                height as u32,
                Some(bgra.as_mut_ptr() as *mut c_void),
                &mut info,
                DIB_RGB_COLORS,
            );
            if lines == 0 {
                return Err(PlatformError::Os("GetDIBits copied no lines".into()));
            }
        }

        let rgb: Vec<u8> = bgra
            .chunks_exact(4)
            .flat_map(|px| [px[2], px[1], px[0]])
            .collect();
        RgbImage::from_raw(width as u32, height as u32, rgb)
            .ok_or_else(|| PlatformError::Os("capture buffer size mismatch".into()))
    }
}
