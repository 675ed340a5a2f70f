//! QR codes for event pages and the selfie upload page.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{ImageFormat, Luma};
use qrcode::QrCode;
use std::io::Cursor;
use thiserror::Error;

const QR_MIN_DIMENSION: u32 = 200;

#[derive(Error, Debug)]
pub enum QrError {
    #[error("QR encoding failed: {0}")]
    Encode(#[from] qrcode::types::QrError),
    #[error("PNG encoding failed: {0}")]
    Image(#[from] image::ImageError),
}

/// Render `payload` as a PNG-encoded QR code.
pub fn render_png(payload: &str) -> Result<Vec<u8>, QrError> {
    let code = QrCode::new(payload.as_bytes())?;
    let img = code
        .render::<Luma<u8>>()
        .min_dimensions(QR_MIN_DIMENSION, QR_MIN_DIMENSION)
        .build();

    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png)?;
    Ok(out.into_inner())
}

/// `data:image/png;base64,...` for inline display or download.
pub fn data_url(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(png))
}

/// Page an attendee opens to view an event.
pub fn event_link(origin: &str, event_id: &str) -> String {
    format!("{}/event/{event_id}", origin.trim_end_matches('/'))
}

/// Page an attendee opens to upload a selfie.
pub fn selfie_link(origin: &str) -> String {
    format!("{}/upload_selfie", origin.trim_end_matches('/'))
}

pub fn event_qr_file_name(event_id: &str) -> String {
    format!("event-{event_id}-qr.png")
}
