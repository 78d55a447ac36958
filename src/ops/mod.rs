pub mod adjustments;
pub mod brush;
pub mod builtin_font;
pub mod canvas_ops;
pub mod filters;
pub mod text;
pub mod transform;
