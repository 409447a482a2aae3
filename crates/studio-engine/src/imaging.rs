use std::io::Cursor;

use image::{ImageFormat, ImageReader, Rgb, RgbImage};
use sha2::{Digest, Sha256};
use studio_contracts::conversation::ImageBlob;

/// Pixel size read from the image header, or `None` when undecodable.
pub fn dimensions(image: &ImageBlob) -> Option<(u32, u32)> {
    ImageReader::new(Cursor::new(image.data.as_slice()))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

pub(crate) fn color_from_seed(parts: &[&[u8]]) -> (u8, u8, u8) {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    let digest = hasher.finalize();
    (digest[0], digest[1], digest[2])
}

/// Solid-colour PNG held in memory.
pub(crate) fn solid_png(width: u32, height: u32, rgb: (u8, u8, u8)) -> image::ImageResult<ImageBlob> {
    let (r, g, b) = rgb;
    let image = RgbImage::from_pixel(width.max(1), height.max(1), Rgb([r, g, b]));
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(ImageBlob::new(bytes, "image/png"))
}
