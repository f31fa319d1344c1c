// ============================================================================
// LayerPaint Scripting: Rhai scripts that drive a session headlessly
// ============================================================================
//
// A script calls host functions such as `tool("brush")`, `down(10, 10)` or
// `undo()`. Running it only records those calls; the recorded commands are
// then replayed in order on a session, exactly as the GUI would issue them.

use image::Rgba;
use rhai::{AST, Engine, EvalAltResult, ImmutableString, Position, Scope};
use std::sync::{Arc, Mutex};

use crate::components::colors::hex_to_color;
use crate::components::tools::Tool;
use crate::project::{Session, SessionConfig};

// ============================================================================
// Error type
// ============================================================================

#[derive(Debug, Clone)]
pub struct ScriptError {
    pub message: String,
    pub line: Option<usize>,
    pub column: Option<usize>,
}

impl ScriptError {
    fn at(message: String, pos: Position) -> Self {
        let nonzero = |v: Option<usize>| v.filter(|n| *n > 0);
        Self {
            message,
            line: nonzero(pos.line()),
            column: nonzero(pos.position()),
        }
    }

    fn replay(message: String) -> Self {
        Self {
            message,
            line: None,
            column: None,
        }
    }
}

impl std::fmt::Display for ScriptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let (Some(line), Some(col)) = (self.line, self.column) {
            write!(f, "Line {}, Col {}: {}", line, col, self.message)
        } else if let Some(line) = self.line {
            write!(f, "Line {}: {}", line, self.message)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for ScriptError {}

impl From<rhai::ParseError> for ScriptError {
    fn from(e: rhai::ParseError) -> Self {
        let pos = e.position();
        Self::at(e.to_string(), pos)
    }
}

impl From<Box<EvalAltResult>> for ScriptError {
    fn from(e: Box<EvalAltResult>) -> Self {
        let pos = e.position();
        Self::at(e.to_string(), pos)
    }
}

// ============================================================================
// Recorded commands
// ============================================================================

/// One session action recorded from a script.
#[derive(Clone, Debug, PartialEq)]
pub enum ScriptCommand {
    SelectTool(Tool),
    PointerDown(f32, f32),
    PointerMove(f32, f32),
    PointerUp,
    /// Answer to the text prompt; `None` cancels it.
    SubmitText(Option<String>),
    SetColor(Rgba<u8>),
    SetSize(u32),
    AddLayer,
    DeleteLayer,
    MoveLayerUp(usize),
    MoveLayerDown(usize),
    SelectLayer(usize),
    Undo,
    Redo,
    Key { ctrl: bool, key: char },
}

#[derive(Debug, Default, Clone)]
pub struct ScriptRecording {
    pub commands: Vec<ScriptCommand>,
    pub console_output: Vec<String>,
}

type SharedContext = Arc<Mutex<ScriptRecording>>;

fn push(ctx: &SharedContext, command: ScriptCommand) {
    let mut lock = ctx.lock().unwrap_or_else(|e| e.into_inner());
    lock.commands.push(command);
}

fn to_index(v: i64, what: &str) -> Result<usize, Box<EvalAltResult>> {
    usize::try_from(v).map_err(|_| format!("{}: index {} is negative", what, v).into())
}

// ============================================================================
// Engine construction with sandbox + API registration
// ============================================================================

fn create_engine(ctx: SharedContext) -> Engine {
    let mut engine = Engine::new();

    // Sandbox limits
    engine.set_max_operations(50_000_000);
    engine.set_max_call_levels(64);
    engine.set_max_expr_depths(64, 64);
    engine.set_max_string_size(10_000);
    engine.set_max_array_size(10_000);
    engine.set_max_map_size(1_000);

    register_tool_api(&mut engine, ctx.clone());
    register_pointer_api(&mut engine, ctx.clone());
    register_layer_api(&mut engine, ctx.clone());
    register_history_api(&mut engine, ctx.clone());

    let c = ctx.clone();
    engine.on_print(move |msg| {
        let mut lock = c.lock().unwrap_or_else(|e| e.into_inner());
        lock.console_output.push(msg.to_string());
    });

    engine
}

fn register_tool_api(engine: &mut Engine, ctx: SharedContext) {
    let c = ctx.clone();
    engine.register_fn(
        "tool",
        move |name: ImmutableString| -> Result<(), Box<EvalAltResult>> {
            let tool = Tool::from_id(name.as_str())
                .ok_or_else(|| format!("Unknown tool '{}'", name))?;
            push(&c, ScriptCommand::SelectTool(tool));
            Ok(())
        },
    );

    let c = ctx.clone();
    engine.register_fn(
        "color",
        move |hex: ImmutableString| -> Result<(), Box<EvalAltResult>> {
            let color =
                hex_to_color(hex.as_str()).ok_or_else(|| format!("Invalid color '{}'", hex))?;
            push(&c, ScriptCommand::SetColor(color));
            Ok(())
        },
    );

    let c = ctx.clone();
    engine.register_fn("size", move |n: i64| {
        push(&c, ScriptCommand::SetSize(n.clamp(1, u32::MAX as i64) as u32));
    });

    let c = ctx.clone();
    engine.register_fn("text", move |s: ImmutableString| {
        push(&c, ScriptCommand::SubmitText(Some(s.to_string())));
    });

    let c = ctx.clone();
    engine.register_fn("cancel_text", move || {
        push(&c, ScriptCommand::SubmitText(None));
    });
}

fn register_pointer_api(engine: &mut Engine, ctx: SharedContext) {
    // Coordinates may be written as integers or floats.
    let c = ctx.clone();
    engine.register_fn("down", move |x: i64, y: i64| {
        push(&c, ScriptCommand::PointerDown(x as f32, y as f32));
    });
    let c = ctx.clone();
    engine.register_fn("down", move |x: f64, y: f64| {
        push(&c, ScriptCommand::PointerDown(x as f32, y as f32));
    });

    let c = ctx.clone();
    engine.register_fn("move_to", move |x: i64, y: i64| {
        push(&c, ScriptCommand::PointerMove(x as f32, y as f32));
    });
    let c = ctx.clone();
    engine.register_fn("move_to", move |x: f64, y: f64| {
        push(&c, ScriptCommand::PointerMove(x as f32, y as f32));
    });

    let c = ctx.clone();
    engine.register_fn("up", move || {
        push(&c, ScriptCommand::PointerUp);
    });

    let c = ctx.clone();
    engine.register_fn(
        "key",
        move |ctrl: bool, k: ImmutableString| -> Result<(), Box<EvalAltResult>> {
            let key = k.chars().next().ok_or("key: empty key name")?;
            push(&c, ScriptCommand::Key { ctrl, key });
            Ok(())
        },
    );
}

fn register_layer_api(engine: &mut Engine, ctx: SharedContext) {
    let c = ctx.clone();
    engine.register_fn("add_layer", move || {
        push(&c, ScriptCommand::AddLayer);
    });

    let c = ctx.clone();
    engine.register_fn("delete_layer", move || {
        push(&c, ScriptCommand::DeleteLayer);
    });

    let c = ctx.clone();
    engine.register_fn(
        "move_up",
        move |i: i64| -> Result<(), Box<EvalAltResult>> {
            push(&c, ScriptCommand::MoveLayerUp(to_index(i, "move_up")?));
            Ok(())
        },
    );

    let c = ctx.clone();
    engine.register_fn(
        "move_down",
        move |i: i64| -> Result<(), Box<EvalAltResult>> {
            push(&c, ScriptCommand::MoveLayerDown(to_index(i, "move_down")?));
            Ok(())
        },
    );

    let c = ctx.clone();
    engine.register_fn(
        "select_layer",
        move |i: i64| -> Result<(), Box<EvalAltResult>> {
            push(&c, ScriptCommand::SelectLayer(to_index(i, "select_layer")?));
            Ok(())
        },
    );
}

fn register_history_api(engine: &mut Engine, ctx: SharedContext) {
    let c = ctx.clone();
    engine.register_fn("undo", move || {
        push(&c, ScriptCommand::Undo);
    });

    let c = ctx.clone();
    engine.register_fn("redo", move || {
        push(&c, ScriptCommand::Redo);
    });
}

// ============================================================================
// Public execution API
// ============================================================================

/// Compile a script and return the AST, or a ScriptError.
pub fn compile_script(source: &str) -> Result<AST, ScriptError> {
    let engine = Engine::new();
    Ok(engine.compile(source)?)
}

/// Run a script and collect the commands it issues, without touching a
/// session.
pub fn record_script(source: &str) -> Result<ScriptRecording, ScriptError> {
    let ctx: SharedContext = Arc::new(Mutex::new(ScriptRecording::default()));
    let engine = create_engine(ctx.clone());
    let mut scope = Scope::new();

    let ast = engine.compile(source)?;
    engine.run_ast_with_scope(&mut scope, &ast)?;

    let lock = ctx.lock().unwrap_or_else(|e| e.into_inner());
    Ok(lock.clone())
}

/// Apply recorded commands to `session` in order. Restores started by undo
/// and redo are finished before the next command runs.
pub fn replay(session: &mut Session, commands: &[ScriptCommand]) -> Result<(), ScriptError> {
    for (step, command) in commands.iter().enumerate() {
        match command {
            ScriptCommand::SelectTool(tool) => session.select_tool(*tool),
            ScriptCommand::PointerDown(x, y) => {
                session.pointer_down(*x, *y);
            }
            ScriptCommand::PointerMove(x, y) => {
                session.pointer_move(*x, *y);
            }
            ScriptCommand::PointerUp => session.pointer_up(),
            ScriptCommand::SubmitText(text) => {
                if session.pending_text().is_none() {
                    log_warn!("Script step {}: no text prompt is open", step + 1);
                }
                session.submit_text(text.as_deref());
            }
            ScriptCommand::SetColor(color) => session.set_brush_color(*color),
            ScriptCommand::SetSize(size) => session.set_brush_size(*size),
            ScriptCommand::AddLayer => {
                session.add_layer();
            }
            ScriptCommand::DeleteLayer => {
                session.delete_layer();
            }
            ScriptCommand::MoveLayerUp(i) => {
                session.move_layer_up(*i);
            }
            ScriptCommand::MoveLayerDown(i) => {
                session.move_layer_down(*i);
            }
            ScriptCommand::SelectLayer(i) => {
                if *i >= session.canvas.len() {
                    return Err(ScriptError::replay(format!(
                        "select_layer({}): only {} layer(s) exist (step {})",
                        i,
                        session.canvas.len(),
                        step + 1
                    )));
                }
                session.select_layer(*i);
            }
            ScriptCommand::Undo => {
                session.undo();
            }
            ScriptCommand::Redo => {
                session.redo();
            }
            ScriptCommand::Key { ctrl, key } => {
                session.key_down(*ctrl, *key);
            }
        }
        session.finish_restore();
    }
    Ok(())
}

/// Record `source`, replay it on a fresh session built from `config`, and
/// return the session together with anything the script printed.
pub fn execute_script_sync(
    source: &str,
    config: SessionConfig,
) -> Result<(Session, Vec<String>), ScriptError> {
    let recording = record_script(source)?;
    let mut session = Session::new(config);
    replay(&mut session, &recording.commands)?;
    Ok((session, recording.console_output))
}
