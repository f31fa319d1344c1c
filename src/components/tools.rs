use ab_glyph::FontArc;
use image::Rgba;

use crate::canvas::{LayerStore, Surface};
use crate::components::colors::{color_to_hex, hex_to_color};
use crate::components::history::HistoryManager;
use crate::ops::text;

/// Width of the pencil, in pixels, independent of the brush size.
pub const PENCIL_WIDTH: f32 = 1.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Tool {
    #[default]
    Pencil,
    Brush,
    Eraser,
    Bucket,
    ColorPicker,
    Select,
    Transform,
    Hand,
    Text,
}

impl Tool {
    pub fn all() -> &'static [Tool] {
        &[
            Tool::Pencil,
            Tool::Brush,
            Tool::Eraser,
            Tool::Bucket,
            Tool::ColorPicker,
            Tool::Select,
            Tool::Transform,
            Tool::Hand,
            Tool::Text,
        ]
    }

    /// Stable identifier, as used by scripts and toolbar buttons.
    pub fn id(&self) -> &'static str {
        match self {
            Tool::Pencil => "pencil",
            Tool::Brush => "brush",
            Tool::Eraser => "eraser",
            Tool::Bucket => "bucket",
            Tool::ColorPicker => "colorPicker",
            Tool::Select => "select",
            Tool::Transform => "transform",
            Tool::Hand => "hand",
            Tool::Text => "text",
        }
    }

    /// Inverse of [`Tool::id`]; also accepts `color_picker` / `picker`.
    pub fn from_id(id: &str) -> Option<Tool> {
        match id {
            "pencil" => Some(Tool::Pencil),
            "brush" => Some(Tool::Brush),
            "eraser" => Some(Tool::Eraser),
            "bucket" => Some(Tool::Bucket),
            "colorPicker" | "color_picker" | "picker" => Some(Tool::ColorPicker),
            "select" => Some(Tool::Select),
            "transform" => Some(Tool::Transform),
            "hand" => Some(Tool::Hand),
            "text" => Some(Tool::Text),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Tool::Pencil => "Pencil",
            Tool::Brush => "Brush",
            Tool::Eraser => "Eraser",
            Tool::Bucket => "Fill Bucket",
            Tool::ColorPicker => "Color Picker",
            Tool::Select => "Select",
            Tool::Transform => "Transform",
            Tool::Hand => "Hand",
            Tool::Text => "Text",
        }
    }

    /// Reserved tools: selectable, but they never touch the canvas.
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Tool::Select | Tool::Transform | Tool::Hand)
    }
}

#[derive(Clone, Debug)]
pub struct ToolProperties {
    /// Brush width, eraser square side, and half the text size.
    pub size: u32,
    pub color: Rgba<u8>,
}

impl Default for ToolProperties {
    fn default() -> Self {
        Self {
            size: 5,
            color: Rgba([0, 0, 0, 255]),
        }
    }
}

/// Outstanding request for the text tool's string.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextRequest {
    pub x: f32,
    pub y: f32,
}

/// What the caller should do after a pointer event.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ToolResponse {
    /// Nothing visible changed.
    None,
    /// Pixels changed; re-render the composite.
    Redraw,
    /// The text tool is waiting for the user's string.
    TextRequested(TextRequest),
}

/// Tool selection plus the per-gesture state of the pointer handlers.
pub struct ToolsPanel {
    pub active_tool: Tool,
    pub properties: ToolProperties,
    /// Set when Text is selected; the next click places text.
    pub text_mode_pending: bool,
    /// Hex shown by the color input control, kept in sync with the color.
    pub color_input: String,
    drawing: bool,
    last_point: Option<(f32, f32)>,
    pending_text: Option<TextRequest>,
    font: Option<FontArc>,
    font_lookup_done: bool,
}

impl Default for ToolsPanel {
    fn default() -> Self {
        Self::new(ToolProperties::default())
    }
}

impl ToolsPanel {
    pub fn new(properties: ToolProperties) -> Self {
        let color_input = color_to_hex(properties.color);
        Self {
            active_tool: Tool::default(),
            properties,
            text_mode_pending: false,
            color_input,
            drawing: false,
            last_point: None,
            pending_text: None,
            font: None,
            font_lookup_done: false,
        }
    }

    pub fn select_tool(&mut self, tool: Tool) {
        self.active_tool = tool;
        if tool == Tool::Text {
            self.text_mode_pending = true;
        }
    }

    pub fn is_drawing(&self) -> bool {
        self.drawing
    }

    pub fn pending_text(&self) -> Option<TextRequest> {
        self.pending_text
    }

    pub fn set_color(&mut self, color: Rgba<u8>) {
        self.properties.color = color;
        self.color_input = color_to_hex(color);
    }

    /// Apply a value typed into the color input. Invalid hex is ignored.
    pub fn set_color_hex(&mut self, hex: &str) -> bool {
        match hex_to_color(hex) {
            Some(c) => {
                self.set_color(c);
                true
            }
            None => {
                log_warn!("Ignoring invalid color '{}'", hex);
                false
            }
        }
    }

    pub fn set_size(&mut self, size: u32) {
        self.properties.size = size.max(1);
    }

    /// Use `font` for text placement instead of looking one up on the system.
    pub fn set_font(&mut self, font: Option<FontArc>) {
        self.font = font;
        self.font_lookup_done = true;
    }

    fn font(&mut self) -> Option<&FontArc> {
        if !self.font_lookup_done {
            self.font = text::load_default_font();
            self.font_lookup_done = true;
        }
        self.font.as_ref()
    }

    // ------------------------------------------------------------------
    // Pointer handling
    // ------------------------------------------------------------------

    pub fn pointer_down(
        &mut self,
        store: &mut LayerStore,
        history: &mut HistoryManager,
        composite: &Surface,
        x: f32,
        y: f32,
    ) -> ToolResponse {
        if self.pending_text.is_some() {
            return ToolResponse::None;
        }

        match self.active_tool {
            Tool::Pencil | Tool::Brush | Tool::Eraser => {
                history.snapshot(store);
                self.drawing = true;
                self.last_point = Some((x, y));
                ToolResponse::None
            }
            Tool::Bucket => {
                history.snapshot(store);
                let color = self.properties.color;
                store.active_layer_mut().pixels.fill(color);
                self.end_gesture();
                ToolResponse::Redraw
            }
            Tool::ColorPicker => {
                if x < 0.0 || y < 0.0 {
                    return ToolResponse::None;
                }
                let (px, py) = (x as u32, y as u32);
                if px >= composite.width() || py >= composite.height() {
                    return ToolResponse::None;
                }
                let sampled = composite.get_pixel(px, py);
                self.set_color(Rgba([sampled[0], sampled[1], sampled[2], 255]));
                ToolResponse::None
            }
            Tool::Text => {
                if !self.text_mode_pending {
                    return ToolResponse::None;
                }
                history.snapshot(store);
                let request = TextRequest { x, y };
                self.pending_text = Some(request);
                ToolResponse::TextRequested(request)
            }
            Tool::Select | Tool::Transform | Tool::Hand => ToolResponse::None,
        }
    }

    pub fn pointer_move(&mut self, store: &mut LayerStore, x: f32, y: f32) -> ToolResponse {
        if !self.drawing {
            return ToolResponse::None;
        }

        match self.active_tool {
            Tool::Pencil | Tool::Brush => {
                let width = if self.active_tool == Tool::Brush {
                    self.properties.size as f32
                } else {
                    PENCIL_WIDTH
                };
                let from = self.last_point.unwrap_or((x, y));
                let color = self.properties.color;
                store
                    .active_layer_mut()
                    .pixels
                    .stroke_segment(from, (x, y), width, color);
                self.last_point = Some((x, y));
                ToolResponse::Redraw
            }
            Tool::Eraser => {
                let size = self.properties.size;
                store
                    .active_layer_mut()
                    .pixels
                    .clear_rect(x.floor() as i64, y.floor() as i64, size, size);
                ToolResponse::Redraw
            }
            _ => ToolResponse::None,
        }
    }

    pub fn pointer_up(&mut self) {
        self.end_gesture();
    }

    fn end_gesture(&mut self) {
        self.drawing = false;
        self.last_point = None;
    }

    /// Resolve an outstanding text request. `None` or an empty string
    /// cancels; either way text mode is disarmed.
    pub fn submit_text(&mut self, store: &mut LayerStore, input: Option<&str>) -> ToolResponse {
        let Some(request) = self.pending_text.take() else {
            return ToolResponse::None;
        };
        self.text_mode_pending = false;

        let Some(text) = input.filter(|s| !s.is_empty()) else {
            return ToolResponse::Redraw;
        };

        let size = self.properties.size as f32 * 2.0;
        let color = self.properties.color;
        match self.font().cloned() {
            Some(font) => {
                text::draw_text(
                    &mut store.active_layer_mut().pixels,
                    &font,
                    text,
                    size,
                    request.x,
                    request.y,
                    color,
                );
            }
            None => {
                log_warn!("Text '{}' not placed: no font", text);
            }
        }
        ToolResponse::Redraw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::TRANSPARENT;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);

    struct Rig {
        store: LayerStore,
        history: HistoryManager,
        composite: Surface,
        tools: ToolsPanel,
    }

    fn rig() -> Rig {
        let mut tools = ToolsPanel::default();
        tools.set_font(None);
        Rig {
            store: LayerStore::new(20, 20),
            history: HistoryManager::default(),
            composite: Surface::new(20, 20),
            tools,
        }
    }

    impl Rig {
        fn down(&mut self, x: f32, y: f32) -> ToolResponse {
            self.tools
                .pointer_down(&mut self.store, &mut self.history, &self.composite, x, y)
        }
    }

    #[test]
    fn tool_ids_round_trip() {
        for tool in Tool::all() {
            assert_eq!(Tool::from_id(tool.id()), Some(*tool));
        }
        assert_eq!(Tool::from_id("lasso"), None);
    }

    #[test]
    fn selecting_text_arms_text_mode() {
        let mut tools = ToolsPanel::default();
        tools.select_tool(Tool::Brush);
        assert!(!tools.text_mode_pending);
        tools.select_tool(Tool::Text);
        assert!(tools.text_mode_pending);
        assert_eq!(tools.active_tool, Tool::Text);
    }

    #[test]
    fn brush_strokes_on_move_with_brush_size() {
        let mut r = rig();
        r.tools.select_tool(Tool::Brush);
        r.tools.set_color(RED);
        r.tools.set_size(5);
        assert_eq!(r.down(5.0, 10.0), ToolResponse::None);
        assert_eq!(r.history.undo_len(), 1);
        assert_eq!(r.store.layers[0].pixels.count_pixels(RED), 0);

        assert_eq!(r.tools.pointer_move(&mut r.store, 15.0, 10.0), ToolResponse::Redraw);
        let px = &r.store.layers[0].pixels;
        assert_eq!(px.get_pixel(10, 10), RED);
        assert_eq!(px.get_pixel(10, 12), RED);
        assert_eq!(px.get_pixel(10, 14), TRANSPARENT);
    }

    #[test]
    fn pencil_is_one_pixel_wide() {
        let mut r = rig();
        r.tools.set_size(9);
        r.down(2.0, 3.0);
        r.tools.pointer_move(&mut r.store, 12.0, 3.0);
        let px = &r.store.layers[0].pixels;
        assert_eq!(px.count_pixels(Rgba([0, 0, 0, 255])), 11);
        assert_eq!(px.get_pixel(7, 4), TRANSPARENT);
    }

    #[test]
    fn move_without_down_does_nothing() {
        let mut r = rig();
        assert_eq!(r.tools.pointer_move(&mut r.store, 3.0, 3.0), ToolResponse::None);
        r.down(1.0, 1.0);
        r.tools.pointer_up();
        assert_eq!(r.tools.pointer_move(&mut r.store, 3.0, 3.0), ToolResponse::None);
        assert_eq!(r.store.layers[0].pixels.count_pixels(TRANSPARENT), 400);
    }

    #[test]
    fn eraser_clears_square_anchored_at_point() {
        let mut r = rig();
        r.store.layers[0].pixels.fill(BLUE);
        r.tools.select_tool(Tool::Eraser);
        r.tools.set_size(4);
        r.down(6.0, 7.0);
        assert_eq!(r.store.layers[0].pixels.count_pixels(TRANSPARENT), 0);

        r.tools.pointer_move(&mut r.store, 6.0, 7.0);
        let px = &r.store.layers[0].pixels;
        assert_eq!(px.count_pixels(TRANSPARENT), 16);
        for y in 0..20 {
            for x in 0..20 {
                let inside = (6..10).contains(&x) && (7..11).contains(&y);
                assert_eq!(px.get_pixel(x, y) == TRANSPARENT, inside, "({}, {})", x, y);
            }
        }
    }

    #[test]
    fn eraser_far_off_canvas_is_ignored() {
        let mut r = rig();
        r.store.layers[0].pixels.fill(BLUE);
        r.tools.select_tool(Tool::Eraser);
        r.down(0.0, 0.0);
        for (x, y) in [(1.0e30, 0.0), (0.0, 1.0e30), (f32::MAX, f32::MAX), (-1.0e30, -1.0e30)] {
            assert_eq!(r.tools.pointer_move(&mut r.store, x, y), ToolResponse::Redraw);
        }
        assert_eq!(r.store.layers[0].pixels.count_pixels(BLUE), 400);
    }

    #[test]
    fn bucket_fills_active_layer_only() {
        let mut r = rig();
        r.store.add_layer();
        r.store.select_layer(0);
        r.tools.select_tool(Tool::Bucket);
        r.tools.set_color(RED);

        assert_eq!(r.down(3.0, 3.0), ToolResponse::Redraw);
        assert!(!r.tools.is_drawing());
        assert_eq!(r.store.layers[0].pixels.count_pixels(RED), 400);
        assert_eq!(r.store.layers[1].pixels.count_pixels(TRANSPARENT), 400);
        assert_eq!(r.history.undo_len(), 1);
    }

    #[test]
    fn color_picker_reads_composite_without_snapshot() {
        let mut r = rig();
        r.composite.put_pixel(4, 5, Rgba([12, 34, 56, 200]));
        r.tools.select_tool(Tool::ColorPicker);

        assert_eq!(r.down(4.7, 5.2), ToolResponse::None);
        assert_eq!(r.tools.properties.color, Rgba([12, 34, 56, 255]));
        assert_eq!(r.tools.color_input, "#0c2238");
        assert_eq!(r.history.undo_len(), 0);
        assert!(!r.tools.is_drawing());
    }

    #[test]
    fn color_picker_ignores_points_off_canvas() {
        let mut r = rig();
        r.tools.select_tool(Tool::ColorPicker);
        r.tools.set_color(RED);
        r.down(-1.0, 3.0);
        r.down(25.0, 3.0);
        assert_eq!(r.tools.properties.color, RED);
    }

    #[test]
    fn placeholder_tools_do_nothing() {
        let mut r = rig();
        for tool in [Tool::Select, Tool::Transform, Tool::Hand] {
            r.tools.select_tool(tool);
            assert!(tool.is_placeholder());
            assert_eq!(r.down(2.0, 2.0), ToolResponse::None);
            assert_eq!(r.tools.pointer_move(&mut r.store, 8.0, 8.0), ToolResponse::None);
            r.tools.pointer_up();
        }
        assert_eq!(r.history.undo_len(), 0);
        assert_eq!(r.store.layers[0].pixels.count_pixels(TRANSPARENT), 400);
    }

    #[test]
    fn text_requires_armed_mode() {
        let mut r = rig();
        r.tools.select_tool(Tool::Text);
        r.tools.text_mode_pending = false;
        assert_eq!(r.down(2.0, 2.0), ToolResponse::None);
        assert_eq!(r.history.undo_len(), 0);
    }

    #[test]
    fn text_cancel_disarms_and_keeps_snapshot() {
        let mut r = rig();
        r.tools.select_tool(Tool::Text);
        let resp = r.down(3.0, 15.0);
        assert_eq!(resp, ToolResponse::TextRequested(TextRequest { x: 3.0, y: 15.0 }));
        assert_eq!(r.history.undo_len(), 1);

        // Pointer input is ignored while the prompt is open.
        assert_eq!(r.down(9.0, 9.0), ToolResponse::None);

        assert_eq!(r.tools.submit_text(&mut r.store, None), ToolResponse::Redraw);
        assert!(!r.tools.text_mode_pending);
        assert!(r.tools.pending_text().is_none());
        assert_eq!(r.store.layers[0].pixels.count_pixels(TRANSPARENT), 400);

        // Next click with text still selected is inert.
        assert_eq!(r.down(3.0, 15.0), ToolResponse::None);
    }

    #[test]
    fn empty_text_draws_nothing() {
        let mut r = rig();
        r.tools.select_tool(Tool::Text);
        r.down(3.0, 15.0);
        r.tools.submit_text(&mut r.store, Some(""));
        assert!(!r.tools.text_mode_pending);
        assert_eq!(r.store.layers[0].pixels.count_pixels(TRANSPARENT), 400);
    }

    #[test]
    fn submit_without_request_is_ignored() {
        let mut r = rig();
        assert_eq!(r.tools.submit_text(&mut r.store, Some("hi")), ToolResponse::None);
    }

    #[test]
    fn invalid_hex_keeps_color() {
        let mut tools = ToolsPanel::default();
        tools.set_color(BLUE);
        assert!(!tools.set_color_hex("nope"));
        assert_eq!(tools.properties.color, BLUE);
        assert!(tools.set_color_hex("#ff0000"));
        assert_eq!(tools.properties.color, RED);
        assert_eq!(tools.color_input, "#ff0000");
    }
}
