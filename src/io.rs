use image::codecs::png::PngEncoder;
use image::{ImageFormat, ImageResult, RgbaImage};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

// ============================================================================
// PNG CODEC: snapshot encoding and export
// ============================================================================

/// Encode an RGBA image as PNG bytes in memory.
pub fn encode_png(image: &RgbaImage) -> ImageResult<Vec<u8>> {
    let mut bytes = Vec::new();
    write_png_to(image, &mut bytes)?;
    Ok(bytes)
}

/// Decode PNG bytes back into an RGBA image.
pub fn decode_png(bytes: &[u8]) -> ImageResult<RgbaImage> {
    Ok(image::load_from_memory_with_format(bytes, ImageFormat::Png)?.to_rgba8())
}

/// Write an RGBA image to `path` as PNG.
pub fn write_png(image: &RgbaImage, path: &Path) -> ImageResult<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_png_to(image, &mut writer)
}

fn write_png_to<W: std::io::Write>(image: &RgbaImage, writer: W) -> ImageResult<()> {
    let encoder = PngEncoder::new(writer);
    #[allow(deprecated)]
    encoder.encode(
        image.as_raw(),
        image.width(),
        image.height(),
        image::ColorType::Rgba8,
    )
}
