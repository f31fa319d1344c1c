use eframe::egui;
use egui::{Color32, ColorImage, Rect, Sense, TextureHandle, TextureOptions, pos2, vec2};

use layerpaint::components::colors::{ColorWheel, color_to_hex};
use layerpaint::settings::AppSettings;
use layerpaint::{RestoreStatus, Session, SessionConfig, Tool, log_info};

const WHEEL_DIAMETER: f32 = 150.0;
const MAX_BRUSH_SIZE: u32 = 100;

/// Native front end: toolbar, color controls, layer list and the canvas
/// view. All drawing state lives in the [`Session`].
pub struct LayerPaintApp {
    session: Session,
    settings: AppSettings,
    canvas_texture: Option<TextureHandle>,
    /// Compositor render count the texture was last uploaded at.
    uploaded_render: u64,
    wheel: ColorWheel,
    wheel_texture: Option<TextureHandle>,
    /// Contents of the hex color field while it is being edited.
    color_text: String,
    /// Contents of the text prompt.
    text_input: String,
    pointer_held: bool,
    last_pointer: Option<egui::Pos2>,
}

impl LayerPaintApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, settings: AppSettings) -> Self {
        let session = Session::new(SessionConfig::from_settings(&settings));
        log_info!("Session {} opened", session.id);
        let color_text = session.tools.color_input.clone();
        Self {
            session,
            settings,
            canvas_texture: None,
            uploaded_render: 0,
            wheel: ColorWheel::new(WHEEL_DIAMETER),
            wheel_texture: None,
            color_text,
            text_input: String::new(),
            pointer_held: false,
            last_pointer: None,
        }
    }

    /// Store the brush as the default for the next launch.
    fn persist_brush(&mut self) {
        self.settings.brush_size = self.session.tools.properties.size;
        self.settings.brush_color = self.session.tools.properties.color;
        self.settings.save();
    }

    fn sync_canvas_texture(&mut self, ctx: &egui::Context) {
        let render = self.session.compositor.render_count();
        if self.canvas_texture.is_some() && render == self.uploaded_render {
            return;
        }
        let output = self.session.compositor.output();
        let (w, h) = output.dimensions();
        let image = ColorImage::from_rgba_unmultiplied(
            [w as usize, h as usize],
            output.as_rgba_image().as_raw(),
        );
        match self.canvas_texture.as_mut() {
            Some(tex) => tex.set(image, TextureOptions::NEAREST),
            None => {
                self.canvas_texture = Some(ctx.load_texture("canvas", image, TextureOptions::NEAREST));
            }
        }
        self.uploaded_render = render;
    }

    fn handle_shortcuts(&mut self, ctx: &egui::Context) {
        if self.session.pending_text().is_some() {
            return;
        }
        let (ctrl, shift, undo, redo) = ctx.input(|i| {
            (
                i.modifiers.ctrl,
                i.modifiers.shift,
                i.key_pressed(egui::Key::Z),
                i.key_pressed(egui::Key::R),
            )
        });
        if undo {
            self.session.key_down(ctrl, if shift { 'Z' } else { 'z' });
        }
        if redo {
            self.session.key_down(ctrl, if shift { 'R' } else { 'r' });
        }
    }

    // ------------------------------------------------------------------
    // Panels
    // ------------------------------------------------------------------

    fn show_toolbar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal_wrapped(|ui| {
            for tool in Tool::all() {
                let selected = self.session.tools.active_tool == *tool;
                if ui.selectable_label(selected, tool.label()).clicked() {
                    self.session.select_tool(*tool);
                }
            }

            ui.separator();

            let mut size = self.session.tools.properties.size;
            let slider = ui.add(egui::Slider::new(&mut size, 1..=MAX_BRUSH_SIZE).text("Size"));
            if slider.changed() {
                self.session.set_brush_size(size);
            }
            if slider.drag_released() {
                self.persist_brush();
            }

            ui.separator();

            let field = ui.add(egui::TextEdit::singleline(&mut self.color_text).desired_width(70.0));
            if field.lost_focus() {
                let text = self.color_text.clone();
                if self.session.set_brush_color_hex(&text) {
                    self.persist_brush();
                }
                self.color_text = self.session.tools.color_input.clone();
            } else if !field.has_focus() {
                self.color_text = self.session.tools.color_input.clone();
            }

            let c = self.session.tools.properties.color;
            let mut swatch = Color32::from_rgb(c[0], c[1], c[2]);
            if ui.color_edit_button_srgba(&mut swatch).changed() {
                self.session
                    .set_brush_color(image::Rgba([swatch.r(), swatch.g(), swatch.b(), 255]));
                self.color_text = self.session.tools.color_input.clone();
            }
        });
    }

    fn show_color_wheel(&mut self, ui: &mut egui::Ui) {
        let tex = self.wheel_texture.get_or_insert_with(|| {
            let img = self.wheel.render();
            let (w, h) = img.dimensions();
            let image = ColorImage::from_rgba_unmultiplied([w as usize, h as usize], img.as_raw());
            ui.ctx().load_texture("color_wheel", image, TextureOptions::LINEAR)
        });
        let (resp, painter) =
            ui.allocate_painter(vec2(WHEEL_DIAMETER, WHEEL_DIAMETER), Sense::click());
        painter.image(
            tex.id(),
            resp.rect,
            Rect::from_min_max(pos2(0.0, 0.0), pos2(1.0, 1.0)),
            Color32::WHITE,
        );

        if resp.clicked()
            && let Some(pos) = resp.interact_pointer_pos()
        {
            let local = pos - resp.rect.min;
            if let Some(color) = self.wheel.color_at(local.x, local.y) {
                self.session.set_brush_color(color);
                self.color_text = color_to_hex(color);
                self.persist_brush();
            }
        }
    }

    fn show_layers(&mut self, ui: &mut egui::Ui) {
        ui.heading("Layers");

        let mut select = None;
        let mut up = None;
        let mut down = None;
        for (i, (name, active)) in self.session.canvas.entries().into_iter().enumerate() {
            ui.horizontal(|ui| {
                if ui.selectable_label(active, name).clicked() {
                    select = Some(i);
                }
                if ui.small_button("Up").clicked() {
                    up = Some(i);
                }
                if ui.small_button("Down").clicked() {
                    down = Some(i);
                }
            });
        }

        ui.horizontal(|ui| {
            if ui.button("Add Layer").clicked() {
                self.session.add_layer();
            }
            if ui.button("Delete Layer").clicked() {
                self.session.delete_layer();
            }
        });

        if let Some(i) = select {
            self.session.select_layer(i);
        }
        if let Some(i) = up {
            self.session.move_layer_up(i);
        }
        if let Some(i) = down {
            self.session.move_layer_down(i);
        }
    }

    fn show_canvas(&mut self, ui: &mut egui::Ui) {
        let size = vec2(self.session.width() as f32, self.session.height() as f32);
        let (resp, painter) = ui.allocate_painter(size, Sense::click_and_drag());
        painter.rect_filled(resp.rect, 0.0, Color32::WHITE);
        if let Some(tex) = &self.canvas_texture {
            painter.image(
                tex.id(),
                resp.rect,
                Rect::from_min_max(pos2(0.0, 0.0), pos2(1.0, 1.0)),
                Color32::WHITE,
            );
        }

        if self.session.pending_text().is_some() {
            return;
        }

        let (pressed, released, pos) = ui.input(|i| {
            (
                i.pointer.primary_pressed(),
                i.pointer.primary_released(),
                i.pointer.interact_pos(),
            )
        });
        let to_canvas = |p: egui::Pos2| {
            let local = p - resp.rect.min;
            (local.x, local.y)
        };

        if pressed
            && resp.hovered()
            && let Some(p) = pos
        {
            let (x, y) = to_canvas(p);
            self.session.pointer_down(x, y);
            self.pointer_held = true;
            self.last_pointer = Some(p);
            if let Some(request) = self.session.pending_text() {
                log_info!("Text requested at ({}, {})", request.x, request.y);
                self.text_input.clear();
                self.session.pointer_up();
                self.pointer_held = false;
                self.last_pointer = None;
            }
        } else if self.pointer_held
            && let Some(p) = pos
            && self.last_pointer != Some(p)
        {
            let (x, y) = to_canvas(p);
            self.session.pointer_move(x, y);
            self.last_pointer = Some(p);
        }

        if released && self.pointer_held {
            self.session.pointer_up();
            self.pointer_held = false;
            self.last_pointer = None;
        }
    }

    fn show_text_prompt(&mut self, ctx: &egui::Context) {
        if self.session.pending_text().is_none() {
            return;
        }
        let mut submit = None;
        egui::Window::new("Enter text")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                let field = ui.text_edit_singleline(&mut self.text_input);
                field.request_focus();
                ui.add_space(8.0);
                ui.horizontal(|ui| {
                    let enter = field.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
                    if ui.button("OK").clicked() || enter {
                        submit = Some(Some(self.text_input.clone()));
                    }
                    if ui.button("Cancel").clicked() {
                        submit = Some(None);
                    }
                });
            });
        if let Some(text) = submit {
            self.session.submit_text(text.as_deref());
            self.text_input.clear();
        }
    }
}

impl eframe::App for LayerPaintApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if let RestoreStatus::Pending { .. } = self.session.poll_restore() {
            ctx.request_repaint();
        }
        self.handle_shortcuts(ctx);

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            self.show_toolbar(ui);
        });

        egui::SidePanel::right("layers_panel")
            .resizable(false)
            .default_width(WHEEL_DIAMETER + 40.0)
            .show(ctx, |ui| {
                self.show_color_wheel(ui);
                ui.separator();
                self.show_layers(ui);
            });

        self.show_text_prompt(ctx);
        self.sync_canvas_texture(ctx);

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::both().show(ui, |ui| {
                self.show_canvas(ui);
            });
        });

        ctx.send_viewport_cmd(egui::ViewportCommand::Title(format!(
            "LayerPaint - {}",
            self.session.name
        )));
    }
}
