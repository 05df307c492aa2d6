//! Rendering pairing codes as QR images.

use image::{ImageBuffer, Luma};
use qrcode::{Color, EcLevel, QrCode};
use tokobot_core::error::TokoError;

/// Pixels per QR module in the PNG.
const MODULE_PX: u32 = 10;
/// Blank modules around the code.
const QUIET_ZONE: u32 = 2;

fn encode(code: &str) -> Result<QrCode, TokoError> {
    QrCode::with_error_correction_level(code.as_bytes(), EcLevel::L)
        .map_err(|e| TokoError::Channel(format!("QR generation failed: {e}")))
}

/// Render `code` as a PNG, black on white.
pub fn generate_qr_image(code: &str) -> Result<Vec<u8>, TokoError> {
    let qr = encode(code)?;
    let modules = qr.width() as u32;
    let side = (modules + QUIET_ZONE * 2) * MODULE_PX;

    let img = ImageBuffer::from_fn(side, side, |x, y| {
        let (mx, my) = (x / MODULE_PX, y / MODULE_PX);
        let inside = (QUIET_ZONE..QUIET_ZONE + modules).contains(&mx)
            && (QUIET_ZONE..QUIET_ZONE + modules).contains(&my);
        if inside && qr[((mx - QUIET_ZONE) as usize, (my - QUIET_ZONE) as usize)] == Color::Dark {
            Luma([0u8])
        } else {
            Luma([255u8])
        }
    });

    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png)
        .map_err(|e| TokoError::Channel(format!("PNG encoding failed: {e}")))?;
    Ok(buf.into_inner())
}

/// Render `code` for a terminal, two module rows per text line.
pub fn generate_qr_terminal(code: &str) -> Result<String, TokoError> {
    let qr = encode(code)?;
    let width = qr.width();
    let colors = qr.into_colors();
    let dark = |row: usize, col: usize| row < width && colors[row * width + col] == Color::Dark;

    let mut out = String::with_capacity((width + 1) * width.div_ceil(2));
    for row in (0..width).step_by(2) {
        for col in 0..width {
            out.push(match (dark(row, col), dark(row + 1, col)) {
                (true, true) => '█',
                (true, false) => '▀',
                (false, true) => '▄',
                (false, false) => ' ',
            });
        }
        out.push('\n');
    }
    Ok(out)
}
