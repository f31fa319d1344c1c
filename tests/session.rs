use image::Rgba;
use layerpaint::canvas::TRANSPARENT;
use layerpaint::components::tools::ToolResponse;
use layerpaint::ops::text;
use layerpaint::{RestoreStatus, Session, SessionConfig, Tool};

const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);
const GREEN: Rgba<u8> = Rgba([0, 255, 0, 255]);

fn session(width: u32, height: u32) -> Session {
    let mut s = Session::new(SessionConfig {
        width,
        height,
        ..SessionConfig::default()
    });
    // Never hit the system font lookup from tests.
    s.tools.set_font(None);
    s
}

fn composite(s: &Session) -> image::RgbaImage {
    s.compositor.output().to_rgba_image()
}

fn stroke(s: &mut Session, tool: Tool, points: &[(f32, f32)]) {
    s.select_tool(tool);
    let (x, y) = points[0];
    s.pointer_down(x, y);
    for &(x, y) in &points[1..] {
        s.pointer_move(x, y);
    }
    s.pointer_up();
}

fn click(s: &mut Session, tool: Tool, x: f32, y: f32) {
    s.select_tool(tool);
    s.pointer_down(x, y);
    s.pointer_up();
}

fn undo(s: &mut Session) -> bool {
    let started = s.undo();
    s.finish_restore();
    started
}

fn redo(s: &mut Session) -> bool {
    let started = s.redo();
    s.finish_restore();
    started
}

/// A mix of every canvas-changing tool across two layers.
fn mixed_actions(s: &mut Session) -> usize {
    s.set_brush_color(RED);
    s.set_brush_size(4);
    stroke(s, Tool::Brush, &[(2.0, 2.0), (20.0, 10.0), (25.0, 18.0)]);
    stroke(s, Tool::Pencil, &[(0.0, 19.0), (29.0, 0.0)]);
    s.select_layer(1);
    s.set_brush_color(BLUE);
    click(s, Tool::Bucket, 5.0, 5.0);
    stroke(s, Tool::Eraser, &[(10.0, 10.0), (14.0, 10.0)]);
    s.select_layer(0);
    s.set_brush_color(GREEN);
    click(s, Tool::Bucket, 0.0, 0.0);
    5
}

#[test]
fn n_actions_then_n_undos_restore_initial_composite() {
    let mut s = session(30, 20);
    s.add_layer();
    let initial = composite(&s);

    let n = mixed_actions(&mut s);
    assert_ne!(composite(&s), initial);
    assert_eq!(s.history.undo_len(), n);

    for _ in 0..n {
        assert!(undo(&mut s));
    }
    assert_eq!(composite(&s), initial);
    assert!(!undo(&mut s));
}

#[test]
fn undo_then_redo_reproduces_state() {
    let mut s = session(30, 20);
    s.add_layer();
    mixed_actions(&mut s);
    let before_undo = composite(&s);
    let layers_before: Vec<_> = s.canvas.layers.iter().map(|l| l.pixels.clone()).collect();

    assert!(undo(&mut s));
    assert_ne!(composite(&s), before_undo);
    assert!(redo(&mut s));

    assert_eq!(composite(&s), before_undo);
    for (layer, expected) in s.canvas.layers.iter().zip(&layers_before) {
        assert_eq!(&layer.pixels, expected);
    }
}

#[test]
fn undo_depth_is_bounded() {
    let mut s = session(8, 8);
    for i in 0..75u8 {
        s.set_brush_color(Rgba([i, 0, 0, 255]));
        click(&mut s, Tool::Bucket, 0.0, 0.0);
        assert!(s.history.undo_len() <= 50);
    }
    assert_eq!(s.history.undo_len(), 50);

    let mut undone = 0;
    while undo(&mut s) {
        undone += 1;
    }
    assert_eq!(undone, 50);
    // The oldest surviving snapshot holds the 25th fill.
    assert_eq!(s.compositor.sample(0, 0), Rgba([24, 0, 0, 255]));
}

#[test]
fn new_action_clears_redo() {
    let mut s = session(10, 10);
    click(&mut s, Tool::Bucket, 0.0, 0.0);
    click(&mut s, Tool::Bucket, 0.0, 0.0);
    undo(&mut s);
    undo(&mut s);
    assert_eq!(s.history.redo_len(), 2);

    stroke(&mut s, Tool::Pencil, &[(1.0, 1.0), (3.0, 3.0)]);
    assert_eq!(s.history.redo_len(), 0);
    assert!(!redo(&mut s));
}

#[test]
fn delete_last_layer_is_noop() {
    let mut s = session(10, 10);
    click(&mut s, Tool::Bucket, 0.0, 0.0);
    let before = composite(&s);
    assert!(!s.delete_layer());
    assert_eq!(s.canvas.len(), 1);
    assert_eq!(s.canvas.active_layer_index, 0);
    assert_eq!(composite(&s), before);
}

#[test]
fn top_layer_wins_where_opaque() {
    let mut s = session(12, 9);
    s.set_brush_color(RED);
    click(&mut s, Tool::Bucket, 0.0, 0.0);
    s.add_layer();
    s.set_brush_color(BLUE);
    click(&mut s, Tool::Bucket, 0.0, 0.0);

    let out = s.compositor.output();
    assert_eq!(out.count_pixels(BLUE), 12 * 9);
}

#[test]
fn bucket_fills_only_active_layer() {
    let mut s = session(16, 16);
    s.add_layer();
    s.add_layer();
    s.select_layer(1);
    s.set_brush_color(GREEN);
    click(&mut s, Tool::Bucket, 7.0, 7.0);

    assert_eq!(s.canvas.layers[1].pixels.count_pixels(GREEN), 256);
    assert_eq!(s.canvas.layers[0].pixels.count_pixels(TRANSPARENT), 256);
    assert_eq!(s.canvas.layers[2].pixels.count_pixels(TRANSPARENT), 256);
}

#[test]
fn eraser_clears_exact_square() {
    let mut s = session(20, 20);
    s.set_brush_color(RED);
    click(&mut s, Tool::Bucket, 0.0, 0.0);
    s.set_brush_size(5);
    s.select_tool(Tool::Eraser);
    s.pointer_down(3.0, 4.0);
    s.pointer_move(3.0, 4.0);
    s.pointer_up();

    let px = &s.canvas.layers[0].pixels;
    for y in 0..20 {
        for x in 0..20 {
            let inside = (3..8).contains(&x) && (4..9).contains(&y);
            let expected = if inside { TRANSPARENT } else { RED };
            assert_eq!(px.get_pixel(x, y), expected, "pixel ({}, {})", x, y);
        }
    }
}

#[test]
fn move_edges_are_noops() {
    let mut s = session(4, 4);
    s.add_layer();
    s.add_layer();
    s.select_layer(1);
    let names: Vec<String> = s.canvas.layers.iter().map(|l| l.name.clone()).collect();

    assert!(!s.move_layer_up(0));
    assert!(!s.move_layer_down(2));
    let after: Vec<String> = s.canvas.layers.iter().map(|l| l.name.clone()).collect();
    assert_eq!(after, names);
    assert_eq!(s.canvas.active_layer_index, 1);
}

#[test]
fn restore_renders_once_when_every_layer_lands() {
    let mut s = session(24, 24);
    s.add_layer();
    s.add_layer();
    click(&mut s, Tool::Bucket, 0.0, 0.0);
    let renders = s.compositor.render_count();

    assert!(s.undo());
    let mut completes = 0;
    loop {
        match s.poll_restore() {
            RestoreStatus::Pending { done, total } => {
                assert!(done < total);
                assert_eq!(total, 3);
                std::thread::yield_now();
            }
            RestoreStatus::Complete => completes += 1,
            RestoreStatus::Idle => break,
        }
    }
    assert_eq!(completes, 1);
    assert_eq!(s.compositor.render_count(), renders + 1);
    assert_eq!(s.compositor.output().count_pixels(TRANSPARENT), 24 * 24);
}

#[test]
fn color_picker_samples_composite_without_snapshot() {
    let mut s = session(10, 10);
    s.set_brush_color(RED);
    click(&mut s, Tool::Bucket, 0.0, 0.0);
    // Active layer is empty; only the composite shows red.
    s.add_layer();
    s.set_brush_color(BLUE);
    let undo_before = s.history.undo_len();

    click(&mut s, Tool::ColorPicker, 4.0, 4.0);
    assert_eq!(s.tools.properties.color, RED);
    assert_eq!(s.tools.color_input, "#ff0000");
    assert_eq!(s.history.undo_len(), undo_before);
}

#[test]
fn text_cancel_keeps_snapshot_and_draws_nothing() {
    let mut s = session(40, 20);
    s.select_tool(Tool::Text);
    let before = composite(&s);

    let resp = s.pointer_down(5.0, 15.0);
    assert!(matches!(resp, ToolResponse::TextRequested(_)));
    assert!(s.pending_text().is_some());
    assert_eq!(s.history.undo_len(), 1);

    s.submit_text(None);
    assert!(!s.tools.text_mode_pending);
    assert!(s.pending_text().is_none());
    assert_eq!(composite(&s), before);
    assert_eq!(s.history.undo_len(), 1);
}

#[test]
fn submitted_text_paints_active_layer_near_pointer() {
    let Some(font) = text::load_default_font() else {
        return;
    };
    let mut s = session(120, 60);
    s.tools.set_font(Some(font));
    s.add_layer();
    s.set_brush_color(BLUE);
    s.set_brush_size(10);
    s.select_tool(Tool::Text);

    let resp = s.pointer_down(10.0, 40.0);
    assert!(matches!(resp, ToolResponse::TextRequested(_)));
    assert_eq!(s.submit_text(Some("HI")), ToolResponse::Redraw);
    assert!(!s.tools.text_mode_pending);
    assert!(s.pending_text().is_none());

    let px = &s.canvas.layers[1].pixels;
    let mut painted = Vec::new();
    for y in 0..60 {
        for x in 0..120 {
            let p = px.get_pixel(x, y);
            if p[3] > 0 {
                assert_eq!((p[0], p[1], p[2]), (0, 0, 255), "pixel ({}, {})", x, y);
                painted.push((x, y));
            }
        }
    }
    assert!(!painted.is_empty());
    // Glyphs sit on the baseline, starting at the pointer.
    for &(x, y) in &painted {
        assert!(x >= 9, "pixel ({}, {}) left of origin", x, y);
        assert!(y <= 42, "pixel ({}, {}) below baseline", x, y);
        assert!(y >= 40 - 30, "pixel ({}, {}) too far above baseline", x, y);
    }
    assert!(px.get_pixel(0, 0)[3] == 0);
    assert_eq!(s.canvas.layers[0].pixels.count_pixels(TRANSPARENT), 120 * 60);
    assert_eq!(s.history.undo_len(), 1);
    assert!(s.compositor.output().count_pixels(BLUE) > 0);

    // One snapshot covers the placement.
    assert!(undo(&mut s));
    assert_eq!(s.canvas.layers[1].pixels.count_pixels(TRANSPARENT), 120 * 60);
}

#[test]
fn ctrl_shortcuts_drive_history() {
    let mut s = session(6, 6);
    s.set_brush_color(RED);
    click(&mut s, Tool::Bucket, 0.0, 0.0);

    assert!(s.key_down(true, 'z'));
    s.finish_restore();
    assert_eq!(s.compositor.sample(2, 2), TRANSPARENT);

    assert!(s.key_down(true, 'r'));
    s.finish_restore();
    assert_eq!(s.compositor.sample(2, 2), RED);

    assert!(!s.key_down(false, 'z'));
    assert_eq!(s.compositor.sample(2, 2), RED);
}
