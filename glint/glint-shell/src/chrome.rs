//! Custom-titlebar chrome. Stripping the native titlebar is a per-platform
//! affair; the trait reports whether the running platform supports it so
//! callers can fall back to native decorations.

use crate::error::ShellError;

/// Thickness of the synthesized resize frame, in physical pixels.
pub const RESIZE_BORDER: i32 = 8;

/// Resize region of a window frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameRegion {
    Left,
    Right,
    Top,
    Bottom,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

/// Classify a screen point against the window rectangle `(left, top, right,
/// bottom)`. Points inside the frame band map to a resize region; interior
/// and outside points return `None` and fall through to normal handling.
pub fn hit_test(
    point: (i32, i32),
    rect: (i32, i32, i32, i32),
    border: i32,
) -> Option<FrameRegion> {
    let (x, y) = point;
    let (left, top, right, bottom) = rect;
    if x < left || x >= right || y < top || y >= bottom {
        return None;
    }
    if y >= bottom - border {
        if x <= left + border {
            return Some(FrameRegion::BottomLeft);
        }
        if x >= right - border {
            return Some(FrameRegion::BottomRight);
        }
        return Some(FrameRegion::Bottom);
    }
    if y <= top + border {
        if x <= left + border {
            return Some(FrameRegion::TopLeft);
        }
        if x >= right - border {
            return Some(FrameRegion::TopRight);
        }
        return Some(FrameRegion::Top);
    }
    if x <= left + border {
        return Some(FrameRegion::Left);
    }
    if x >= right - border {
        return Some(FrameRegion::Right);
    }
    None
}

/// Installs custom titlebar chrome on a native window.
pub trait PlatformChrome: std::fmt::Debug {
    /// Strip the native titlebar and synthesize resize handling for
    /// `window`. Returns whether the platform supports custom titlebars;
    /// `false` leaves the native decorations untouched.
    fn install(&mut self, window: &winit::window::Window) -> Result<bool, ShellError>;
}

/// Fallback for platforms without a chrome implementation.
#[derive(Debug, Default)]
pub struct NoChrome;

impl PlatformChrome for NoChrome {
    fn install(&mut self, _window: &winit::window::Window) -> Result<bool, ShellError> {
        log::warn!("custom titlebars are not supported on this platform");
        Ok(false)
    }
}

#[cfg(windows)]
pub use win32::Win32Chrome;

/// Chrome implementation for the current platform.
#[cfg(windows)]
pub fn platform_chrome() -> Box<dyn PlatformChrome> {
    Box::new(win32::Win32Chrome::default())
}

/// Chrome implementation for the current platform.
#[cfg(not(windows))]
pub fn platform_chrome() -> Box<dyn PlatformChrome> {
    Box::new(NoChrome)
}

#[cfg(windows)]
mod win32 {
    use std::ffi::c_void;
    use std::sync::Mutex;

    use raw_window_handle::{HasWindowHandle, RawWindowHandle};
    use windows::Win32::Foundation::{HWND, LPARAM, LRESULT, RECT, WPARAM};
    use windows::Win32::UI::WindowsAndMessaging::{
        CallWindowProcW, DefWindowProcW, GetWindowLongPtrW, GetWindowRect, SetWindowLongPtrW,
        SetWindowPos, GWLP_WNDPROC, GWL_STYLE, HTBOTTOM, HTBOTTOMLEFT, HTBOTTOMRIGHT, HTLEFT,
        HTRIGHT, HTTOP, HTTOPLEFT, HTTOPRIGHT, NCCALCSIZE_PARAMS, SWP_FRAMECHANGED, SWP_NOMOVE,
        SWP_NOSIZE, SWP_NOZORDER, WM_NCACTIVATE, WM_NCCALCSIZE, WM_NCHITTEST, WM_NCPAINT,
        WNDPROC, WS_CAPTION, WS_THICKFRAME,
    };

    use super::{hit_test, FrameRegion, PlatformChrome, RESIZE_BORDER};
    use crate::error::ShellError;

    /// Original window procedures keyed by HWND. Entries live for the
    /// process; the subclass procedure needs them on every forwarded
    /// message.
    static ORIGINAL_PROCS: Mutex<Vec<(isize, isize)>> = Mutex::new(Vec::new());

    fn remember_original(hwnd: HWND, proc_addr: isize) {
        let mut procs = ORIGINAL_PROCS.lock().unwrap_or_else(|e| e.into_inner());
        let key = hwnd.0 as isize;
        if let Some(entry) = procs.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = proc_addr;
        } else {
            procs.push((key, proc_addr));
        }
    }

    fn lookup_original(hwnd: HWND) -> Option<isize> {
        let procs = ORIGINAL_PROCS.lock().unwrap_or_else(|e| e.into_inner());
        let key = hwnd.0 as isize;
        procs.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
    }

    /// Win32 chrome: drops WS_CAPTION, keeps the thick resize frame and
    /// subclasses the window procedure to take over nonclient handling.
    #[derive(Debug, Default)]
    pub struct Win32Chrome;

    impl PlatformChrome for Win32Chrome {
        fn install(&mut self, window: &winit::window::Window) -> Result<bool, ShellError> {
            let handle = window
                .window_handle()
                .map_err(|e| ShellError::Chrome(format!("window handle: {e}")))?;
            let RawWindowHandle::Win32(win32) = handle.as_raw() else {
                return Err(ShellError::Chrome("not a Win32 window".to_string()));
            };
            let hwnd = HWND(win32.hwnd.get() as *mut c_void);
            unsafe {
                let style = GetWindowLongPtrW(hwnd, GWL_STYLE);
                let style = (style | WS_THICKFRAME.0 as isize) & !(WS_CAPTION.0 as isize);
                SetWindowLongPtrW(hwnd, GWL_STYLE, style);

                let original =
                    SetWindowLongPtrW(hwnd, GWLP_WNDPROC, subclass_proc as usize as isize);
                if original == 0 {
                    return Err(ShellError::Chrome(
                        "SetWindowLongPtrW(GWLP_WNDPROC) failed".to_string(),
                    ));
                }
                remember_original(hwnd, original);

                SetWindowPos(
                    hwnd,
                    None,
                    0,
                    0,
                    0,
                    0,
                    SWP_FRAMECHANGED | SWP_NOMOVE | SWP_NOSIZE | SWP_NOZORDER,
                )
                .map_err(|e| ShellError::Chrome(format!("SetWindowPos: {e}")))?;
            }
            Ok(true)
        }
    }

    unsafe extern "system" fn subclass_proc(
        hwnd: HWND,
        msg: u32,
        wparam: WPARAM,
        lparam: LPARAM,
    ) -> LRESULT {
        match msg {
            WM_NCCALCSIZE if wparam.0 != 0 && lparam.0 != 0 => {
                // Claim the frame as client area, inset by one pixel per
                // side so the resize border keeps a hover target.
                let params = &mut *(lparam.0 as *mut NCCALCSIZE_PARAMS);
                let rect = &mut params.rgrc[0];
                rect.left += 1;
                rect.top += 1;
                rect.right -= 1;
                rect.bottom -= 1;
                LRESULT(0)
            }
            WM_NCPAINT => LRESULT(0),
            WM_NCACTIVATE => LRESULT(1),
            WM_NCHITTEST => {
                let x = (lparam.0 & 0xffff) as u16 as i16 as i32;
                let y = ((lparam.0 >> 16) & 0xffff) as u16 as i16 as i32;
                let mut rect = RECT::default();
                if GetWindowRect(hwnd, &mut rect).is_ok() {
                    let region = hit_test(
                        (x, y),
                        (rect.left, rect.top, rect.right, rect.bottom),
                        RESIZE_BORDER,
                    );
                    if let Some(region) = region {
                        return LRESULT(hit_code(region) as isize);
                    }
                }
                forward(hwnd, msg, wparam, lparam)
            }
            _ => forward(hwnd, msg, wparam, lparam),
        }
    }

    fn hit_code(region: FrameRegion) -> u32 {
        match region {
            FrameRegion::Left => HTLEFT,
            FrameRegion::Right => HTRIGHT,
            FrameRegion::Top => HTTOP,
            FrameRegion::Bottom => HTBOTTOM,
            FrameRegion::TopLeft => HTTOPLEFT,
            FrameRegion::TopRight => HTTOPRIGHT,
            FrameRegion::BottomLeft => HTBOTTOMLEFT,
            FrameRegion::BottomRight => HTBOTTOMRIGHT,
        }
    }

    unsafe fn forward(hwnd: HWND, msg: u32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
        match lookup_original(hwnd) {
            Some(proc_addr) => {
                let original: WNDPROC = std::mem::transmute(proc_addr);
                CallWindowProcW(original, hwnd, msg, wparam, lparam)
            }
            None => DefWindowProcW(hwnd, msg, wparam, lparam),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECT: (i32, i32, i32, i32) = (100, 100, 900, 700);

    #[test]
    fn interior_points_are_not_frame() {
        assert_eq!(hit_test((500, 400), RECT, RESIZE_BORDER), None);
        assert_eq!(hit_test((120, 400), RECT, RESIZE_BORDER), None);
    }

    #[test]
    fn points_outside_the_window_are_not_frame() {
        assert_eq!(hit_test((99, 400), RECT, RESIZE_BORDER), None);
        assert_eq!(hit_test((500, 720), RECT, RESIZE_BORDER), None);
    }

    #[test]
    fn edges_resolve_to_their_side() {
        assert_eq!(hit_test((104, 400), RECT, RESIZE_BORDER), Some(FrameRegion::Left));
        assert_eq!(hit_test((896, 400), RECT, RESIZE_BORDER), Some(FrameRegion::Right));
        assert_eq!(hit_test((500, 104), RECT, RESIZE_BORDER), Some(FrameRegion::Top));
        assert_eq!(hit_test((500, 696), RECT, RESIZE_BORDER), Some(FrameRegion::Bottom));
    }

    #[test]
    fn corners_win_over_edges() {
        assert_eq!(
            hit_test((104, 104), RECT, RESIZE_BORDER),
            Some(FrameRegion::TopLeft)
        );
        assert_eq!(
            hit_test((896, 104), RECT, RESIZE_BORDER),
            Some(FrameRegion::TopRight)
        );
        assert_eq!(
            hit_test((104, 696), RECT, RESIZE_BORDER),
            Some(FrameRegion::BottomLeft)
        );
        assert_eq!(
            hit_test((896, 696), RECT, RESIZE_BORDER),
            Some(FrameRegion::BottomRight)
        );
    }

    #[test]
    fn border_width_controls_the_band() {
        assert_eq!(hit_test((120, 400), RECT, 25), Some(FrameRegion::Left));
        assert_eq!(hit_test((120, 400), RECT, 8), None);
    }
}
