use image::{Rgba, RgbaImage};

/// Fully transparent pixel, returned for out-of-bounds reads.
pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Largest surface we agree to allocate (about 256 megapixels).
const MAX_PIXELS: u64 = 256_000_000;

// ============================================================================
// BLENDING
// ============================================================================

/// Source-over of `top` (scaled by `coverage`) onto `base`, straight alpha.
pub fn blend_over(base: Rgba<u8>, top: Rgba<u8>, coverage: f32) -> Rgba<u8> {
    let coverage = coverage.clamp(0.0, 1.0);

    if top[3] == 0 || coverage <= 0.0 {
        return base;
    }
    if top[3] == 255 && coverage >= 1.0 {
        return top;
    }

    let top_a = (top[3] as f32 / 255.0) * coverage;
    let base_a = base[3] as f32 / 255.0;
    let out_a = top_a + base_a * (1.0 - top_a);
    if out_a <= 0.0 {
        return TRANSPARENT;
    }

    let channel = |t: u8, b: u8| -> u8 {
        let t = t as f32 / 255.0;
        let b = b as f32 / 255.0;
        let c = (t * top_a + b * base_a * (1.0 - top_a)) / out_a;
        (c * 255.0).round().clamp(0.0, 255.0) as u8
    };

    Rgba([
        channel(top[0], base[0]),
        channel(top[1], base[1]),
        channel(top[2], base[2]),
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}

// ============================================================================
// SURFACE
// ============================================================================

/// An owned 8-bit RGBA raster. Every layer owns one, and so does the
/// compositor for the visible result.
#[derive(Clone, Debug, PartialEq)]
pub struct Surface {
    pixels: RgbaImage,
}

impl Surface {
    /// Create a fully transparent surface.
    pub fn new(width: u32, height: u32) -> Self {
        let (width, height) = {
            let total = (width as u64) * (height as u64);
            if total > MAX_PIXELS || width == 0 || height == 0 {
                log_warn!(
                    "Surface::new: dimensions {}x{} rejected, clamped to 1x1",
                    width,
                    height
                );
                (1, 1)
            } else {
                (width, height)
            }
        };
        Self {
            pixels: RgbaImage::new(width, height),
        }
    }

    pub fn new_filled(width: u32, height: u32, color: Rgba<u8>) -> Self {
        let mut surface = Self::new(width, height);
        if color[3] > 0 {
            surface.fill(color);
        }
        surface
    }

    pub fn from_rgba_image(pixels: RgbaImage) -> Self {
        Self { pixels }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn as_rgba_image(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn to_rgba_image(&self) -> RgbaImage {
        self.pixels.clone()
    }

    pub(crate) fn raw_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    pub fn get_pixel(&self, x: u32, y: u32) -> Rgba<u8> {
        if x >= self.width() || y >= self.height() {
            return TRANSPARENT;
        }
        *self.pixels.get_pixel(x, y)
    }

    pub fn put_pixel(&mut self, x: u32, y: u32, pixel: Rgba<u8>) {
        if x >= self.width() || y >= self.height() {
            return;
        }
        self.pixels.put_pixel(x, y, pixel);
    }

    /// Source-over a single pixel. Out-of-bounds coordinates are ignored.
    pub fn blend_pixel(&mut self, x: i64, y: i64, color: Rgba<u8>, coverage: f32) {
        if x < 0 || y < 0 || x >= self.width() as i64 || y >= self.height() as i64 {
            return;
        }
        let px = self.pixels.get_pixel_mut(x as u32, y as u32);
        *px = blend_over(*px, color, coverage);
    }

    /// Set every pixel to `color` (no blending).
    pub fn fill(&mut self, color: Rgba<u8>) {
        for px in self.pixels.pixels_mut() {
            *px = color;
        }
    }

    /// Make the whole surface transparent.
    pub fn clear(&mut self) {
        self.fill(TRANSPARENT);
    }

    /// Make a rectangle transparent. The rectangle is clipped to the
    /// surface; a fully outside rectangle is a no-op.
    pub fn clear_rect(&mut self, x: i64, y: i64, w: u32, h: u32) {
        let x0 = x.max(0);
        let y0 = y.max(0);
        let x1 = x.saturating_add(w as i64).min(self.width() as i64);
        let y1 = y.saturating_add(h as i64).min(self.height() as i64);
        for py in y0..y1 {
            for px in x0..x1 {
                self.pixels.put_pixel(px as u32, py as u32, TRANSPARENT);
            }
        }
    }

    /// Stroke a round-capped segment between two points in canvas
    /// coordinates. Pointer coordinates address pixel corners, so the
    /// centerline runs through pixel centers. Each covered pixel is blended
    /// once per segment.
    pub fn stroke_segment(&mut self, from: (f32, f32), to: (f32, f32), width: f32, color: Rgba<u8>) {
        let radius = (width.max(1.0)) * 0.5;
        let (x0, y0) = (from.0 + 0.5, from.1 + 0.5);
        let (x1, y1) = (to.0 + 0.5, to.1 + 0.5);

        let min_x = (x0.min(x1) - radius).floor().max(0.0) as i64;
        let min_y = (y0.min(y1) - radius).floor().max(0.0) as i64;
        let max_x = ((x0.max(x1) + radius).ceil() as i64).min(self.width() as i64);
        let max_y = ((y0.max(y1) + radius).ceil() as i64).min(self.height() as i64);
        if min_x >= max_x || min_y >= max_y {
            return;
        }

        let dx = x1 - x0;
        let dy = y1 - y0;
        let len_sq = dx * dx + dy * dy;
        let r_sq = radius * radius;

        for py in min_y..max_y {
            for px in min_x..max_x {
                let cx = px as f32 + 0.5;
                let cy = py as f32 + 0.5;
                // Distance from the pixel center to the closest point of the segment.
                let t = if len_sq > 0.0 {
                    (((cx - x0) * dx + (cy - y0) * dy) / len_sq).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                let nx = x0 + dx * t - cx;
                let ny = y0 + dy * t - cy;
                if nx * nx + ny * ny <= r_sq {
                    self.blend_pixel(px, py, color, 1.0);
                }
            }
        }
    }

    /// Source-over this surface onto `dst` with its top-left corner at
    /// (`dx`, `dy`).
    pub fn draw_onto(&self, dst: &mut Surface, dx: i64, dy: i64) {
        for (x, y, px) in self.pixels.enumerate_pixels() {
            if px[3] == 0 {
                continue;
            }
            dst.blend_pixel(x as i64 + dx, y as i64 + dy, *px, 1.0);
        }
    }

    /// Count of pixels equal to `color`. Mostly useful for diagnostics and tests.
    pub fn count_pixels(&self, color: Rgba<u8>) -> usize {
        self.pixels.pixels().filter(|p| **p == color).count()
    }

    pub fn memory_bytes(&self) -> usize {
        self.pixels.as_raw().len()
    }
}

// ============================================================================
// LAYERS
// ============================================================================

pub struct Layer {
    pub name: String,
    pub pixels: Surface,
}

impl Layer {
    pub fn new(name: String, width: u32, height: u32) -> Self {
        Self {
            name,
            pixels: Surface::new(width, height),
        }
    }
}

/// Ordered layer stack (index 0 is drawn first) plus the active layer.
pub struct LayerStore {
    pub layers: Vec<Layer>,
    pub active_layer_index: usize,
    pub width: u32,
    pub height: u32,
}

impl LayerStore {
    /// A store with a single blank layer, "Layer 1".
    pub fn new(width: u32, height: u32) -> Self {
        let probe = Surface::new(width, height);
        let (width, height) = probe.dimensions();
        let mut store = Self {
            layers: Vec::new(),
            active_layer_index: 0,
            width,
            height,
        };
        store.add_layer();
        store
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Append a transparent layer and make it active. Returns its index.
    pub fn add_layer(&mut self) -> usize {
        let name = format!("Layer {}", self.layers.len() + 1);
        self.layers.push(Layer::new(name, self.width, self.height));
        self.active_layer_index = self.layers.len() - 1;
        log_info!("Added {}", self.layers[self.active_layer_index].name);
        self.active_layer_index
    }

    /// Remove the active layer. The last remaining layer is never removed;
    /// returns whether anything changed.
    pub fn delete_layer(&mut self) -> bool {
        if self.layers.len() <= 1 {
            log_warn!("Cannot delete last layer");
            return false;
        }
        let removed = self.layers.remove(self.active_layer_index);
        self.active_layer_index = self.active_layer_index.saturating_sub(1);
        log_info!("Deleted {}", removed.name);
        true
    }

    /// Swap `index` with the layer before it (toward the back of the render
    /// order) and activate it at its new position.
    pub fn move_layer_up(&mut self, index: usize) -> bool {
        if index == 0 || index >= self.layers.len() {
            return false;
        }
        self.layers.swap(index, index - 1);
        self.active_layer_index = index - 1;
        true
    }

    /// Swap `index` with the layer after it and activate it at its new
    /// position.
    pub fn move_layer_down(&mut self, index: usize) -> bool {
        if index + 1 >= self.layers.len() {
            return false;
        }
        self.layers.swap(index, index + 1);
        self.active_layer_index = index + 1;
        true
    }

    /// Make `index` the active layer.
    ///
    /// # Panics
    /// If `index` is out of range; callers must only pass indices they read
    /// from this store.
    pub fn select_layer(&mut self, index: usize) {
        assert!(
            index < self.layers.len(),
            "select_layer: index {} out of range ({} layers)",
            index,
            self.layers.len()
        );
        self.active_layer_index = index;
    }

    pub fn active_layer(&self) -> &Layer {
        &self.layers[self.active_layer_index]
    }

    pub fn active_layer_mut(&mut self) -> &mut Layer {
        &mut self.layers[self.active_layer_index]
    }

    /// `(name, is_active)` for each layer in render order.
    pub fn entries(&self) -> Vec<(String, bool)> {
        self.layers
            .iter()
            .enumerate()
            .map(|(i, l)| (l.name.clone(), i == self.active_layer_index))
            .collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.layers.iter().map(|l| l.name.as_str()).collect()
    }
}
