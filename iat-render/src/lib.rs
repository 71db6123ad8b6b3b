pub mod render;

pub use render::{FrameStats, Layout, Scene, SkiaRenderer, render_text_pixmap};
