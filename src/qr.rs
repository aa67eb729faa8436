use qrcode::{Color, EcLevel, QrCode};
use thiserror::Error;

/// Greyscale frame at the camera's native resolution. Scratch space:
/// a decode attempt reads only the frame it was handed, nothing is
/// retained between frames.
#[derive(Debug, Clone)]
pub struct RasterBuffer {
    width: usize,
    height: usize,
    luma: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum RasterError {
    #[error("luma length {len} does not match {width}x{height}")]
    SizeMismatch {
        width: usize,
        height: usize,
        len: usize,
    },
    #[error("frame dimensions must be non-zero")]
    EmptyFrame,
}

impl RasterBuffer {
    pub fn new(width: usize, height: usize, luma: Vec<u8>) -> Result<Self, RasterError> {
        if width == 0 || height == 0 {
            return Err(RasterError::EmptyFrame);
        }
        if luma.len() != width * height {
            return Err(RasterError::SizeMismatch {
                width,
                height,
                len: luma.len(),
            });
        }
        Ok(RasterBuffer {
            width,
            height,
            luma,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn luma(&self) -> &[u8] {
        &self.luma
    }

    fn sample(&self, x: usize, y: usize) -> u8 {
        self.luma[y * self.width + x]
    }
}

/// Decode boundary of the scan loop: given a frame, the text content
/// of a detected code, if any. A miss is the steady state of the
/// loop, not a failure.
pub trait FrameDecoder {
    fn decode(&self, frame: &RasterBuffer) -> Option<String>;
}

/// Production decoder over the camera luminance plane.
#[derive(Debug, Default)]
pub struct QrFrameDecoder;

impl FrameDecoder for QrFrameDecoder {
    fn decode(&self, frame: &RasterBuffer) -> Option<String> {
        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
            frame.width(),
            frame.height(),
            |x, y| frame.sample(x, y),
        );
        for grid in prepared.detect_grids() {
            if let Ok((_meta, content)) = grid.decode() {
                return Some(content);
            }
        }
        None
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to build QR matrix: {0}")]
    Encoding(String),
}

/// Terminal-style rendering of an encoded code. Light modules are
/// drawn as blocks; reads correctly on dark UI themes.
pub fn render_ascii(code: &str) -> Result<String, RenderError> {
    let qr = QrCode::with_error_correction_level(code.as_bytes(), EcLevel::M)
        .map_err(|e| RenderError::Encoding(e.to_string()))?;
    Ok(qr
        .render()
        .dark_color(' ')
        .light_color('\u{2588}')
        .quiet_zone(false)
        .module_dimensions(2, 1)
        .build())
}

/// Luminance raster of an encoded code: `scale` pixels per module,
/// `quiet_zone` modules of light border, dark = 0, light = 255. Same
/// convention the decoder reads, so a rendered token survives the
/// full camera round trip.
pub fn render_raster(
    code: &str,
    scale: usize,
    quiet_zone: usize,
) -> Result<RasterBuffer, RenderError> {
    let qr = QrCode::with_error_correction_level(code.as_bytes(), EcLevel::M)
        .map_err(|e| RenderError::Encoding(e.to_string()))?;
    let modules = qr.width();
    let colors = qr.to_colors();
    let side = (modules + 2 * quiet_zone) * scale;
    let mut luma = vec![255u8; side * side];
    for my in 0..modules {
        for mx in 0..modules {
            if colors[my * modules + mx] != Color::Dark {
                continue;
            }
            let x0 = (mx + quiet_zone) * scale;
            let y0 = (my + quiet_zone) * scale;
            for y in y0..y0 + scale {
                let row = y * side;
                luma[row + x0..row + x0 + scale].fill(0);
            }
        }
    }
    RasterBuffer::new(side, side, luma).map_err(|e| RenderError::Encoding(e.to_string()))
}
