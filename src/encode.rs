use image::{ImageEncoder, RgbaImage};
use windows::Win32::Foundation::HWND;
use windows::Win32::Graphics::Gdi::{
    CreateCompatibleDC, CreateDIBSection, DeleteDC, DeleteObject, GetDC, GetObjectW, ReleaseDC,
    SelectObject, BITMAP, BITMAPINFO, BITMAPINFOHEADER, BI_RGB, DIB_RGB_COLORS,
};
use windows::Win32::UI::WindowsAndMessaging::{DrawIconEx, GetIconInfo, DI_NORMAL, ICONINFO};

use crate::error::{Error, Result};
use crate::icon::OwnedIcon;

/// Result of one round of the size-query/fill protocol.
#[derive(Debug, PartialEq, Eq)]
pub enum EncodeOutcome {
    /// No buffer was supplied; this many bytes are needed.
    SizeRequired(usize),
    /// The buffer was filled with this many bytes.
    Written(usize),
}

/// Renders an icon into PNG bytes. Consumes the icon; the handle is destroyed
/// on every exit path, success or not.
pub fn render_png(icon: OwnedIcon) -> Result<Vec<u8>> {
    let image = icon_to_rgba(&icon)
        .ok_or_else(|| Error::Encode("icon could not be rasterized".into()))?;
    encode_rgba(&image)
}

/// One round of the two-phase negotiation. `None` for the buffer is the size
/// query; an undersized buffer yields `None` here and no bytes are written,
/// never a truncated image.
pub fn negotiate(png: &[u8], buffer: Option<&mut [u8]>) -> Option<EncodeOutcome> {
    match buffer {
        None => Some(EncodeOutcome::SizeRequired(png.len())),
        Some(out) if out.len() < png.len() => None,
        Some(out) => {
            out[..png.len()].copy_from_slice(png);
            Some(EncodeOutcome::Written(png.len()))
        }
    }
}

fn encode_rgba(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut png = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut png);
    encoder
        .write_image(
            image,
            image.width(),
            image.height(),
            image::ExtendedColorType::Rgba8,
        )
        .map_err(|e| Error::Encode(e.to_string()))?;
    Ok(png)
}

/// Draws the icon at its native size into a zero-initialized top-down 32-bit
/// DIB and lifts the pixels out as RGBA.
fn icon_to_rgba(icon: &OwnedIcon) -> Option<RgbaImage> {
    let (width, height) = icon_dimensions(icon)?;
    unsafe {
        let hdc_screen = GetDC(HWND::default());
        let hdc = CreateCompatibleDC(hdc_screen);

        let bmi = BITMAPINFO {
            bmiHeader: BITMAPINFOHEADER {
                biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
                biWidth: width as i32,
                biHeight: -(height as i32), // top-down
                biPlanes: 1,
                biBitCount: 32,
                biCompression: BI_RGB.0,
                ..Default::default()
            },
            ..Default::default()
        };

        let mut bits: *mut std::ffi::c_void = std::ptr::null_mut();
        let hbm = match CreateDIBSection(hdc, &bmi, DIB_RGB_COLORS, &mut bits, None, 0) {
            Ok(hbm) if !bits.is_null() => hbm,
            _ => {
                DeleteDC(hdc);
                ReleaseDC(HWND::default(), hdc_screen);
                return None;
            }
        };
        let old = SelectObject(hdc, hbm);

        let byte_count = (width * height * 4) as usize;
        std::ptr::write_bytes(bits as *mut u8, 0, byte_count);
        let drawn = DrawIconEx(
            hdc,
            0,
            0,
            icon.as_raw(),
            width as i32,
            height as i32,
            0,
            None,
            DI_NORMAL,
        );

        let mut pixels = vec![0u8; byte_count];
        if drawn.is_ok() {
            std::ptr::copy_nonoverlapping(bits as *const u8, pixels.as_mut_ptr(), byte_count);
        }

        SelectObject(hdc, old);
        DeleteObject(hbm);
        DeleteDC(hdc);
        ReleaseDC(HWND::default(), hdc_screen);

        if drawn.is_err() {
            return None;
        }
        // BGRA -> RGBA
        for px in pixels.chunks_exact_mut(4) {
            px.swap(0, 2);
        }
        RgbaImage::from_raw(width, height, pixels)
    }
}

fn icon_dimensions(icon: &OwnedIcon) -> Option<(u32, u32)> {
    unsafe {
        let mut info = ICONINFO::default();
        GetIconInfo(icon.as_raw(), &mut info).ok()?;

        let mut bitmap = BITMAP::default();
        let measured = if info.hbmColor.is_invalid() {
            0
        } else {
            GetObjectW(
                info.hbmColor,
                std::mem::size_of::<BITMAP>() as i32,
                Some(&mut bitmap as *mut _ as *mut _),
            )
        };
        // The ICONINFO bitmaps are copies we must release.
        if !info.hbmColor.is_invalid() {
            DeleteObject(info.hbmColor);
        }
        if !info.hbmMask.is_invalid() {
            DeleteObject(info.hbmMask);
        }

        if measured == 0 || bitmap.bmWidth <= 0 || bitmap.bmHeight <= 0 {
            return None;
        }
        Some((bitmap.bmWidth as u32, bitmap.bmHeight as u32))
    }
}
