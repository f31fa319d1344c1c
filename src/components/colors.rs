use image::Rgba;

// ============================================================================
// HEX CONVERSION (the color input control speaks `#rrggbb`)
// ============================================================================

/// `#rrggbb`, lowercase, each channel zero-padded to two digits.
pub fn rgb_to_hex(r: u8, g: u8, b: u8) -> String {
    format!("#{:02x}{:02x}{:02x}", r, g, b)
}

pub fn color_to_hex(color: Rgba<u8>) -> String {
    rgb_to_hex(color[0], color[1], color[2])
}

/// Parse `#rrggbb`, `rrggbb` or `#rgb` into an opaque color.
pub fn hex_to_color(hex: &str) -> Option<Rgba<u8>> {
    let digits = hex.trim().trim_start_matches('#');
    if !digits.is_ascii() {
        return None;
    }
    let channel = |s: &str| u8::from_str_radix(s, 16).ok();
    match digits.len() {
        6 => Some(Rgba([
            channel(&digits[0..2])?,
            channel(&digits[2..4])?,
            channel(&digits[4..6])?,
            255,
        ])),
        3 => {
            let mut out = [0u8, 0, 0, 255];
            for (i, c) in digits.chars().enumerate() {
                let v = c.to_digit(16)? as u8;
                out[i] = v * 17;
            }
            Some(Rgba(out))
        }
        _ => None,
    }
}

/// `hsl(hue, 100%, 50%)`: a fully saturated hue.
pub fn hue_to_rgb(hue_deg: f32) -> Rgba<u8> {
    let h = hue_deg.rem_euclid(360.0) / 60.0;
    let x = 1.0 - ((h % 2.0) - 1.0).abs();
    let (r, g, b) = match h as u32 {
        0 => (1.0, x, 0.0),
        1 => (x, 1.0, 0.0),
        2 => (0.0, 1.0, x),
        3 => (0.0, x, 1.0),
        4 => (x, 0.0, 1.0),
        _ => (1.0, 0.0, x),
    };
    let to_u8 = |v: f32| (v * 255.0).round().clamp(0.0, 255.0) as u8;
    Rgba([to_u8(r), to_u8(g), to_u8(b), 255])
}

// ============================================================================
// COLOR WHEEL: hue ring with a white center
// ============================================================================

/// A hue ring of the given diameter. The ring spans from 70% of the radius
/// to the rim; inside it is white and outside it there is no color.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColorWheel {
    pub diameter: f32,
}

impl ColorWheel {
    pub const INNER_RATIO: f32 = 0.7;

    pub fn new(diameter: f32) -> Self {
        Self { diameter }
    }

    /// Color under the point (`x`, `y`) in wheel-local coordinates, with the
    /// hue angle growing clockwise from the +x axis in whole degrees.
    pub fn color_at(&self, x: f32, y: f32) -> Option<Rgba<u8>> {
        let radius = self.diameter * 0.5;
        let dx = x - radius;
        let dy = y - radius;
        let dist = (dx * dx + dy * dy).sqrt();

        if dist > radius {
            return None;
        }
        if dist <= radius * Self::INNER_RATIO {
            return Some(Rgba([255, 255, 255, 255]));
        }
        let angle = dy.atan2(dx).to_degrees().rem_euclid(360.0).floor();
        Some(hue_to_rgb(angle))
    }

    /// Rasterize the wheel, e.g. for display as a texture.
    pub fn render(&self) -> image::RgbaImage {
        let size = self.diameter.max(1.0).round() as u32;
        image::RgbaImage::from_fn(size, size, |x, y| {
            self.color_at(x as f32 + 0.5, y as f32 + 0.5)
                .unwrap_or(Rgba([0, 0, 0, 0]))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_is_zero_padded() {
        assert_eq!(rgb_to_hex(0, 10, 255), "#000aff");
        assert_eq!(rgb_to_hex(1, 2, 3), "#010203");
    }

    #[test]
    fn hex_parses_long_and_short_forms() {
        assert_eq!(hex_to_color("#ff8000"), Some(Rgba([255, 128, 0, 255])));
        assert_eq!(hex_to_color("00ff00"), Some(Rgba([0, 255, 0, 255])));
        assert_eq!(hex_to_color("#f0a"), Some(Rgba([255, 0, 170, 255])));
        assert_eq!(hex_to_color("#12345"), None);
        assert_eq!(hex_to_color("#gg0000"), None);
    }

    #[test]
    fn hues_at_primary_angles() {
        assert_eq!(hue_to_rgb(0.0), Rgba([255, 0, 0, 255]));
        assert_eq!(hue_to_rgb(120.0), Rgba([0, 255, 0, 255]));
        assert_eq!(hue_to_rgb(240.0), Rgba([0, 0, 255, 255]));
        assert_eq!(hue_to_rgb(360.0), Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn wheel_regions() {
        let wheel = ColorWheel::new(100.0);
        // Center is white.
        assert_eq!(wheel.color_at(50.0, 50.0), Some(Rgba([255, 255, 255, 255])));
        // On the ring at angle 0 (to the right of center).
        assert_eq!(wheel.color_at(95.0, 50.0), Some(Rgba([255, 0, 0, 255])));
        // Below center is 90 degrees clockwise.
        assert_eq!(wheel.color_at(50.0, 95.0), Some(hue_to_rgb(90.0)));
        // Corner lies outside the ring.
        assert_eq!(wheel.color_at(1.0, 1.0), None);
    }

    #[test]
    fn rendered_wheel_has_transparent_corners() {
        let img = ColorWheel::new(20.0).render();
        assert_eq!(img.dimensions(), (20, 20));
        assert_eq!(img.get_pixel(0, 0)[3], 0);
        assert_eq!(*img.get_pixel(10, 10), Rgba([255, 255, 255, 255]));
    }
}
