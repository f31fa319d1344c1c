use ab_glyph::{Font, FontArc, GlyphId, PxScale, ScaleFont, point};
use image::Rgba;

use crate::canvas::Surface;

/// Family tried first for text placement; any sans-serif face is the fallback.
pub const DEFAULT_FONT_FAMILY: &str = "Arial";

/// Load a font from the system by family name, falling back to the
/// platform's default sans-serif. Returns `None` if neither can be found.
pub fn load_system_font(family: &str) -> Option<FontArc> {
    use font_kit::family_name::FamilyName;
    use font_kit::properties::Properties;
    use font_kit::source::SystemSource;

    let source = SystemSource::new();
    let handle = source
        .select_best_match(
            &[FamilyName::Title(family.to_string()), FamilyName::SansSerif],
            &Properties::new(),
        )
        .ok()?;

    let font_data = handle.load().ok()?;
    let bytes: Vec<u8> = (*font_data.copy_font_data()?).clone();
    FontArc::try_from_vec(bytes).ok()
}

pub fn load_default_font() -> Option<FontArc> {
    let font = load_system_font(DEFAULT_FONT_FAMILY);
    if font.is_none() {
        log_warn!("No system font available; text placement is disabled");
    }
    font
}

/// Pixel scale for a CSS-style font size (the em square, not the line height).
fn px_scale(font: &FontArc, font_size: f32) -> PxScale {
    match font.units_per_em() {
        Some(upem) if upem > 0.0 => PxScale::from(font_size * font.height_unscaled() / upem),
        _ => PxScale::from(font_size),
    }
}

/// Lay out a single line from x = 0, returning `(glyph, x)` pairs with
/// kerning applied.
pub fn layout_line(font: &FontArc, text: &str, font_size: f32) -> Vec<(GlyphId, f32)> {
    let scaled = font.as_scaled(px_scale(font, font_size));
    let mut glyphs = Vec::with_capacity(text.len());
    let mut cursor_x = 0.0f32;
    let mut last: Option<GlyphId> = None;

    for ch in text.chars() {
        let id = scaled.glyph_id(ch);
        if let Some(prev) = last {
            cursor_x += scaled.kern(prev, id);
        }
        glyphs.push((id, cursor_x));
        cursor_x += scaled.h_advance(id);
        last = Some(id);
    }
    glyphs
}

/// Largest pixel size text is rasterized at. Glyphs are rasterized whole
/// before clipping, so this bounds the per-glyph buffer.
pub const MAX_FONT_SIZE: f32 = 2048.0;

/// Draw a single line of `text` with its baseline starting at
/// (`origin_x`, `baseline_y`). Coverage from overlapping glyphs is merged
/// with max so each pixel is blended once. Only the part of the text that
/// lands on `surface` is rasterized.
pub fn draw_text(
    surface: &mut Surface,
    font: &FontArc,
    text: &str,
    font_size: f32,
    origin_x: f32,
    baseline_y: f32,
    color: Rgba<u8>,
) {
    let font_size = if font_size > MAX_FONT_SIZE {
        log_warn!("Text size {} clamped to {}", font_size, MAX_FONT_SIZE);
        MAX_FONT_SIZE
    } else {
        font_size
    };
    let scale = px_scale(font, font_size);
    let (surf_w, surf_h) = (surface.width() as f32, surface.height() as f32);

    // Glyphs entirely off the surface are never rasterized.
    let outlined: Vec<_> = layout_line(font, text, font_size)
        .into_iter()
        .filter_map(|(id, x)| {
            font.outline_glyph(id.with_scale_and_position(scale, point(origin_x + x, baseline_y)))
        })
        .filter(|g| {
            let b = g.px_bounds();
            b.max.x > 0.0 && b.max.y > 0.0 && b.min.x < surf_w && b.min.y < surf_h
        })
        .collect();
    if outlined.is_empty() {
        return;
    }

    let mut min_x = f32::MAX;
    let mut min_y = f32::MAX;
    let mut max_x = f32::MIN;
    let mut max_y = f32::MIN;
    for g in &outlined {
        let b = g.px_bounds();
        min_x = min_x.min(b.min.x);
        min_y = min_y.min(b.min.y);
        max_x = max_x.max(b.max.x);
        max_y = max_y.max(b.max.y);
    }
    // Coverage buffer covers the text bounds clipped to the surface.
    let off_x = (min_x.floor() as i64).max(0);
    let off_y = (min_y.floor() as i64).max(0);
    let end_x = (max_x.ceil() as i64).min(surface.width() as i64);
    let end_y = (max_y.ceil() as i64).min(surface.height() as i64);
    if end_x <= off_x || end_y <= off_y {
        return;
    }
    let buf_w = (end_x - off_x) as u32;
    let buf_h = (end_y - off_y) as u32;

    let mut coverage = vec![0.0f32; buf_w as usize * buf_h as usize];
    for g in &outlined {
        let b = g.px_bounds();
        let gx = b.min.x as i64 - off_x;
        let gy = b.min.y as i64 - off_y;
        g.draw(|px, py, cov| {
            let ix = gx + px as i64;
            let iy = gy + py as i64;
            if ix >= 0 && iy >= 0 && (ix as u32) < buf_w && (iy as u32) < buf_h {
                let idx = iy as usize * buf_w as usize + ix as usize;
                coverage[idx] = coverage[idx].max(cov);
            }
        });
    }

    let mut glyph_layer = Surface::new(buf_w, buf_h);
    for (i, cov) in coverage.iter().enumerate() {
        if *cov <= 0.001 {
            continue;
        }
        let a = (color[3] as f32 * cov.min(1.0)).round() as u8;
        glyph_layer.put_pixel(
            i as u32 % buf_w,
            i as u32 / buf_w,
            Rgba([color[0], color[1], color[2], a]),
        );
    }
    glyph_layer.draw_onto(surface, off_x, off_y);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::TRANSPARENT;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

    fn painted(surface: &Surface) -> usize {
        (surface.width() * surface.height()) as usize - surface.count_pixels(TRANSPARENT)
    }

    #[test]
    fn text_is_drawn_above_baseline_in_color() {
        let Some(font) = load_default_font() else { return };
        let mut surface = Surface::new(80, 40);
        draw_text(&mut surface, &font, "HI", 20.0, 5.0, 30.0, RED);

        assert!(surface.count_pixels(RED) > 0);
        // Cap height sits above the baseline; nothing is drawn left of the origin.
        for y in 0..40 {
            for x in 0..4 {
                assert_eq!(surface.get_pixel(x, y), TRANSPARENT, "({}, {})", x, y);
            }
        }
        for y in 32..40 {
            for x in 0..80 {
                assert_eq!(surface.get_pixel(x, y), TRANSPARENT, "({}, {})", x, y);
            }
        }
    }

    #[test]
    fn huge_text_is_clipped_to_surface() {
        let Some(font) = load_default_font() else { return };
        let mut surface = Surface::new(16, 16);
        draw_text(&mut surface, &font, "WWWW", 400_000.0, 0.0, 15.0, RED);
        assert!(painted(&surface) <= 256);
    }

    #[test]
    fn text_off_surface_draws_nothing() {
        let Some(font) = load_default_font() else { return };
        let mut surface = Surface::new(16, 16);
        draw_text(&mut surface, &font, "abc", 12.0, 500.0, 500.0, RED);
        draw_text(&mut surface, &font, "abc", 12.0, -500.0, 8.0, RED);
        assert_eq!(painted(&surface), 0);
    }
}
