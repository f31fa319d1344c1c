use image::Rgba;
use rayon::prelude::*;

use crate::canvas::{LayerStore, Surface, blend_over};

/// Flattens the layer stack onto the visible surface.
///
/// There is no caching: every [`Compositor::render`] clears the output and
/// redraws all layers back to front, so identical layers always produce an
/// identical result.
pub struct Compositor {
    output: Surface,
    render_count: u64,
}

impl Compositor {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            output: Surface::new(width, height),
            render_count: 0,
        }
    }

    pub fn render(&mut self, store: &LayerStore) {
        if self.output.dimensions() != (store.width, store.height) {
            self.output = Surface::new(store.width, store.height);
        }

        let row_bytes = store.width as usize * 4;
        let layers = &store.layers;

        // Rows are independent, so each one is composited on its own.
        self.output
            .raw_mut()
            .par_chunks_mut(row_bytes)
            .enumerate()
            .for_each(|(y, row)| {
                row.fill(0);
                for layer in layers {
                    let src = layer.pixels.as_rgba_image();
                    for x in 0..store.width {
                        let top = *src.get_pixel(x, y as u32);
                        if top[3] == 0 {
                            continue;
                        }
                        let off = x as usize * 4;
                        let base = Rgba([row[off], row[off + 1], row[off + 2], row[off + 3]]);
                        let out = blend_over(base, top, 1.0);
                        row[off..off + 4].copy_from_slice(&out.0);
                    }
                }
            });

        self.render_count += 1;
    }

    /// Pixel of the last composite.
    pub fn sample(&self, x: u32, y: u32) -> Rgba<u8> {
        self.output.get_pixel(x, y)
    }

    pub fn output(&self) -> &Surface {
        &self.output
    }

    /// How many times [`Compositor::render`] has run.
    pub fn render_count(&self) -> u64 {
        self.render_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::TRANSPARENT;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);

    #[test]
    fn top_opaque_layer_wins() {
        let mut store = LayerStore::new(6, 4);
        store.layers[0].pixels.fill(RED);
        store.add_layer();
        store.layers[1].pixels.fill(BLUE);

        let mut comp = Compositor::new(6, 4);
        comp.render(&store);
        assert_eq!(comp.output().count_pixels(BLUE), 24);
    }

    #[test]
    fn transparent_top_shows_bottom() {
        let mut store = LayerStore::new(4, 4);
        store.layers[0].pixels.fill(RED);
        store.add_layer();
        store.layers[1].pixels.put_pixel(1, 1, BLUE);

        let mut comp = Compositor::new(4, 4);
        comp.render(&store);
        assert_eq!(comp.sample(1, 1), BLUE);
        assert_eq!(comp.sample(0, 0), RED);
    }

    #[test]
    fn render_clears_previous_output() {
        let mut store = LayerStore::new(4, 4);
        store.layers[0].pixels.fill(RED);
        let mut comp = Compositor::new(4, 4);
        comp.render(&store);
        store.layers[0].pixels.clear();
        comp.render(&store);
        assert_eq!(comp.output().count_pixels(TRANSPARENT), 16);
        assert_eq!(comp.render_count(), 2);
    }

    #[test]
    fn render_is_deterministic() {
        let mut store = LayerStore::new(5, 5);
        store.layers[0].pixels.fill(Rgba([10, 200, 30, 90]));
        store.add_layer();
        store.layers[1]
            .pixels
            .stroke_segment((0.0, 0.0), (4.0, 4.0), 2.0, Rgba([200, 10, 10, 140]));

        let mut a = Compositor::new(5, 5);
        let mut b = Compositor::new(5, 5);
        a.render(&store);
        b.render(&store);
        assert_eq!(a.output(), b.output());
    }
}
