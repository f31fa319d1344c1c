use image::Rgba;
use uuid::Uuid;

use crate::canvas::LayerStore;
use crate::components::history::{DEFAULT_MAX_HISTORY, HistoryManager, RestoreStatus};
use crate::components::tools::{Tool, ToolProperties, ToolResponse, ToolsPanel};
use crate::compositor::Compositor;
use crate::settings::AppSettings;

pub use crate::components::tools::TextRequest;

/// Starting parameters for a [`Session`].
#[derive(Clone, Debug, PartialEq)]
pub struct SessionConfig {
    pub width: u32,
    pub height: u32,
    pub max_history: usize,
    pub brush_size: u32,
    pub brush_color: Rgba<u8>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            max_history: DEFAULT_MAX_HISTORY,
            brush_size: 5,
            brush_color: Rgba([0, 0, 0, 255]),
        }
    }
}

impl SessionConfig {
    pub fn from_settings(settings: &AppSettings) -> Self {
        Self {
            width: settings.canvas_width,
            height: settings.canvas_height,
            max_history: settings.max_undo_steps,
            brush_size: settings.brush_size,
            brush_color: settings.brush_color,
        }
    }
}

/// One open drawing: the layers, their composite, undo/redo history and the
/// tool state. Every user action goes through here.
pub struct Session {
    pub id: Uuid,
    /// Display name, "Untitled-N".
    pub name: String,
    pub canvas: LayerStore,
    pub compositor: Compositor,
    pub history: HistoryManager,
    pub tools: ToolsPanel,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self::new_untitled(1, config)
    }

    pub fn new_untitled(untitled_counter: usize, config: SessionConfig) -> Self {
        let canvas = LayerStore::new(config.width, config.height);
        let mut compositor = Compositor::new(canvas.width, canvas.height);
        compositor.render(&canvas);

        let tools = ToolsPanel::new(ToolProperties {
            size: config.brush_size.max(1),
            color: config.brush_color,
        });

        log_info!(
            "New session {}x{} (history {})",
            canvas.width,
            canvas.height,
            config.max_history
        );

        Self {
            id: Uuid::new_v4(),
            name: format!("Untitled-{}", untitled_counter),
            canvas,
            compositor,
            history: HistoryManager::new(config.max_history),
            tools,
        }
    }

    pub fn render(&mut self) {
        self.compositor.render(&self.canvas);
    }

    pub fn width(&self) -> u32 {
        self.canvas.width
    }

    pub fn height(&self) -> u32 {
        self.canvas.height
    }

    // ------------------------------------------------------------------
    // Layers
    // ------------------------------------------------------------------

    pub fn add_layer(&mut self) -> usize {
        let index = self.canvas.add_layer();
        self.render();
        index
    }

    pub fn delete_layer(&mut self) -> bool {
        let deleted = self.canvas.delete_layer();
        if deleted {
            self.render();
        }
        deleted
    }

    pub fn move_layer_up(&mut self, index: usize) -> bool {
        let moved = self.canvas.move_layer_up(index);
        if moved {
            self.render();
        }
        moved
    }

    pub fn move_layer_down(&mut self, index: usize) -> bool {
        let moved = self.canvas.move_layer_down(index);
        if moved {
            self.render();
        }
        moved
    }

    /// Panics if `index` is out of range.
    pub fn select_layer(&mut self, index: usize) {
        self.canvas.select_layer(index);
    }

    // ------------------------------------------------------------------
    // Tools
    // ------------------------------------------------------------------

    pub fn select_tool(&mut self, tool: Tool) {
        self.tools.select_tool(tool);
    }

    pub fn set_brush_size(&mut self, size: u32) {
        self.tools.set_size(size);
    }

    pub fn set_brush_color(&mut self, color: Rgba<u8>) {
        self.tools.set_color(color);
    }

    pub fn set_brush_color_hex(&mut self, hex: &str) -> bool {
        self.tools.set_color_hex(hex)
    }

    /// The text prompt the front end should show, if any.
    pub fn pending_text(&self) -> Option<TextRequest> {
        self.tools.pending_text()
    }

    pub fn pointer_down(&mut self, x: f32, y: f32) -> ToolResponse {
        self.settle_restore();
        let response = self.tools.pointer_down(
            &mut self.canvas,
            &mut self.history,
            self.compositor.output(),
            x,
            y,
        );
        self.apply(response)
    }

    pub fn pointer_move(&mut self, x: f32, y: f32) -> ToolResponse {
        self.settle_restore();
        let response = self.tools.pointer_move(&mut self.canvas, x, y);
        self.apply(response)
    }

    pub fn pointer_up(&mut self) {
        self.settle_restore();
        self.tools.pointer_up();
    }

    /// Answer the outstanding text prompt. `None` cancels.
    pub fn submit_text(&mut self, input: Option<&str>) -> ToolResponse {
        let response = self.tools.submit_text(&mut self.canvas, input);
        self.apply(response)
    }

    fn apply(&mut self, response: ToolResponse) -> ToolResponse {
        if response == ToolResponse::Redraw {
            self.render();
        }
        response
    }

    /// Keyboard shortcuts: Ctrl+Z undoes, Ctrl+R redoes (lowercase keys
    /// only). Returns whether the key was handled.
    pub fn key_down(&mut self, ctrl: bool, key: char) -> bool {
        if !ctrl {
            return false;
        }
        match key {
            'z' => {
                self.undo();
                true
            }
            'r' => {
                self.redo();
                true
            }
            _ => false,
        }
    }

    // ------------------------------------------------------------------
    // History
    // ------------------------------------------------------------------

    /// Start restoring the previous state. The layers arrive asynchronously;
    /// call [`Session::poll_restore`] each frame or [`Session::finish_restore`].
    pub fn undo(&mut self) -> bool {
        self.settle_restore();
        self.history.undo(&mut self.canvas)
    }

    pub fn redo(&mut self) -> bool {
        self.settle_restore();
        self.history.redo(&mut self.canvas)
    }

    /// Apply whatever layers have been decoded. Renders once, when the last
    /// one lands.
    pub fn poll_restore(&mut self) -> RestoreStatus {
        let status = self.history.poll_restore(&mut self.canvas);
        if status == RestoreStatus::Complete {
            self.render();
        }
        status
    }

    pub fn finish_restore(&mut self) -> RestoreStatus {
        let status = self.history.finish_restore(&mut self.canvas);
        if status == RestoreStatus::Complete {
            self.render();
        }
        status
    }

    fn settle_restore(&mut self) {
        if self.history.is_restoring() {
            self.finish_restore();
        }
    }
}
