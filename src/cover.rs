//! Cover art: fetch a thumbnail, pick a square region of it, encode the result as JPEG.
//!
//! Crop geometry is kept free of any UI notion. A front end reports where the user pressed and
//! released in *display* coordinates; [`Viewport`] maps those back onto the source image and
//! [`CropRect`] turns them into a square that always lies inside the image.

use std::io::{Cursor, Read};
use std::time::Duration;

use image::ImageFormat;
use reqwest::blocking::Client;
use tracing::debug;

use crate::{Error, Result};

/// Thumbnails larger than this are refused.
const MAX_THUMBNAIL_BYTES: u64 = 16 * 1024 * 1024;

/// Download a thumbnail image into memory.
pub fn fetch_thumbnail(url: &str) -> Result<Vec<u8>> {
    let client = Client::builder()
        .user_agent(concat!("tracksplit/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| Error::Cover(format!("failed to build HTTP client: {e}")))?;

    let resp = client
        .get(url)
        .send()
        .map_err(|e| Error::Cover(format!("request failed: {url}: {e}")))?
        .error_for_status()
        .map_err(|e| Error::Cover(format!("thumbnail download failed: {e}")))?;

    let mut bytes = Vec::new();
    resp.take(MAX_THUMBNAIL_BYTES + 1)
        .read_to_end(&mut bytes)
        .map_err(|e| Error::Cover(format!("failed reading thumbnail body: {e}")))?;

    if bytes.len() as u64 > MAX_THUMBNAIL_BYTES {
        return Err(Error::Cover(format!(
            "thumbnail exceeds {MAX_THUMBNAIL_BYTES} bytes"
        )));
    }
    debug!(url, bytes = bytes.len(), "thumbnail fetched");
    Ok(bytes)
}

/// A square region in source-image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub size: u32,
}

impl CropRect {
    /// The largest square centered in a `width` x `height` image.
    pub fn centered_square(width: u32, height: u32) -> Self {
        let size = width.min(height);
        Self {
            x: (width - size) / 2,
            y: (height - size) / 2,
            size,
        }
    }

    /// Square spanned by a drag from `from` to `to` (source coordinates, either direction).
    ///
    /// The side is the larger of the two drag extents, anchored at the press point and grown
    /// toward the release point, then shrunk and shifted until it fits the image. Returns
    /// `None` for a drag that doesn't cover at least one pixel in each direction.
    pub fn square_from_drag(
        from: (u32, u32),
        to: (u32, u32),
        width: u32,
        height: u32,
    ) -> Option<Self> {
        let dx = from.0.abs_diff(to.0);
        let dy = from.1.abs_diff(to.1);
        if dx == 0 || dy == 0 || width == 0 || height == 0 {
            return None;
        }

        let size = dx.max(dy).min(width).min(height);

        let x = if to.0 >= from.0 {
            from.0
        } else {
            from.0.saturating_sub(size)
        };
        let y = if to.1 >= from.1 {
            from.1
        } else {
            from.1.saturating_sub(size)
        };

        Some(Self {
            x: x.min(width - size),
            y: y.min(height - size),
            size,
        })
    }

    pub fn fits(&self, width: u32, height: u32) -> bool {
        self.size > 0
            && self.x.checked_add(self.size).is_some_and(|r| r <= width)
            && self.y.checked_add(self.size).is_some_and(|b| b <= height)
    }
}

/// An image of `source` size shown scaled-to-fit inside a `display` area, centered, with
/// letterbox bars on whichever axis has slack.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub source: (u32, u32),
    pub display: (u32, u32),
}

impl Viewport {
    pub fn new(source: (u32, u32), display: (u32, u32)) -> Self {
        Self { source, display }
    }

    fn scale(&self) -> f64 {
        let sx = f64::from(self.display.0) / f64::from(self.source.0.max(1));
        let sy = f64::from(self.display.1) / f64::from(self.source.1.max(1));
        sx.min(sy)
    }

    /// Top-left corner of the drawn image inside the display area.
    pub fn offset(&self) -> (f64, f64) {
        let scale = self.scale();
        (
            (f64::from(self.display.0) - f64::from(self.source.0) * scale) / 2.0,
            (f64::from(self.display.1) - f64::from(self.source.1) * scale) / 2.0,
        )
    }

    /// Map a display-space point to the source pixel under it. Points on the letterbox bars
    /// clamp to the nearest edge pixel.
    pub fn to_source(&self, x: f64, y: f64) -> (u32, u32) {
        let scale = self.scale();
        if scale <= 0.0 || self.source.0 == 0 || self.source.1 == 0 {
            return (0, 0);
        }
        let (ox, oy) = self.offset();
        let map = |v: f64, offset: f64, limit: u32| -> u32 {
            let s = ((v - offset) / scale).floor();
            s.clamp(0.0, f64::from(limit - 1)) as u32
        };
        (map(x, ox, self.source.0), map(y, oy, self.source.1))
    }
}

/// Decode `bytes`, crop to `rect` (or the centered square when `None`), re-encode as JPEG.
pub fn crop_to_jpeg(bytes: &[u8], rect: Option<CropRect>) -> Result<Vec<u8>> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| Error::Cover(format!("unreadable image: {e}")))?;

    let (width, height) = (img.width(), img.height());
    let rect = rect.unwrap_or_else(|| CropRect::centered_square(width, height));
    if !rect.fits(width, height) {
        return Err(Error::Cover(format!(
            "crop {}x{} at ({}, {}) does not fit a {width}x{height} image",
            rect.size, rect.size, rect.x, rect.y
        )));
    }

    // JPEG has no alpha channel.
    let cropped = img.crop_imm(rect.x, rect.y, rect.size, rect.size).into_rgb8();

    let mut out = Cursor::new(Vec::new());
    cropped
        .write_to(&mut out, ImageFormat::Jpeg)
        .map_err(|e| Error::Cover(format!("JPEG encode failed: {e}")))?;
    Ok(out.into_inner())
}
