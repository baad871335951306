//! Secret-capturing template rendering.

pub mod delimiters;
mod helpers;
mod materialize;
pub mod renderer;

pub use materialize::materialize;
pub use renderer::TemplateRenderer;
