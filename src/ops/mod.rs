pub mod scripting;
pub mod text;
