use ab_glyph::{Font, FontArc, Glyph, PxScale, ScaleFont, point};
use anyhow::{Result, anyhow, bail};
use iat_cache::{get_text, intern_all, intern_text};
use iat_core::{Display, Position};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tiny_skia::{Color, Pixmap, PixmapPaint, PremultipliedColorU8, Transform};

const LABEL_PX: f32 = 32.0;
const WORD_PX: f32 = 56.0;
const NOTICE_PX: f32 = 40.0;

const INCORRECT_TEXT: &str = "Incorrect";
const COMPLETE_TEXT: &str = "Thank you! The test is complete.";

/// What to paint this frame.
#[derive(Debug, Clone, Copy)]
pub enum Scene<'a> {
    Trial {
        display: &'a Display,
        /// An incorrect-response notification is showing.
        incorrect: bool,
    },
    Complete,
    Blank,
}

/// Anchor points (text centers) for a canvas size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Layout {
    pub width: f32,
    pub height: f32,
}

impl Layout {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width as f32,
            height: height as f32,
        }
    }

    /// Left labels sit in the left column, right labels in the right one;
    /// bottom labels stack under top labels.
    pub fn label(&self, position: Position) -> (f32, f32) {
        let x = match position {
            Position::LeftTop | Position::LeftBottom => self.width * 0.15,
            Position::RightTop | Position::RightBottom => self.width * 0.85,
        };
        let y = match position {
            Position::LeftTop | Position::RightTop => self.height * 0.10,
            Position::LeftBottom | Position::RightBottom => self.height * 0.18,
        };
        (x, y)
    }

    pub fn word(&self) -> (f32, f32) {
        (self.width * 0.5, self.height * 0.5)
    }

    pub fn notice(&self) -> (f32, f32) {
        (self.width * 0.5, self.height * 0.65)
    }
}

/// Rasterized text keyed by interner ID and pixel size.
struct TextCache {
    font: FontArc,
    map: HashMap<(usize, u32), Arc<Pixmap>>,
}

impl TextCache {
    fn new(font: FontArc) -> Self {
        Self {
            font,
            map: HashMap::new(),
        }
    }

    fn get_or_render(&mut self, intern_id: usize, size_px: f32, color: Color) -> Option<Arc<Pixmap>> {
        let key = (intern_id, size_px.to_bits());
        if let Some(p) = self.map.get(&key) {
            return Some(Arc::clone(p));
        }
        let text = get_text(intern_id)?;
        let pm = Arc::new(render_text_pixmap(&text, size_px, &self.font, color)?);
        self.map.insert(key, Arc::clone(&pm));
        Some(pm)
    }
}

/// Lays out and rasterizes `text` onto a tight transparent pixmap.
///
/// Returns `None` for text without any visible glyph.
pub fn render_text_pixmap(text: &str, font_size: f32, font: &FontArc, color: Color) -> Option<Pixmap> {
    let scale = PxScale::from(font_size);
    let sf = font.as_scaled(scale);

    // Layout with baseline at ascent
    let mut pen_x = 0.0f32;
    let mut glyphs = Vec::<Glyph>::new();
    for ch in text.chars() {
        let id = font.glyph_id(ch);
        if let Some(prev) = glyphs.last() {
            pen_x += sf.kern(prev.id, id);
        }
        glyphs.push(Glyph {
            id,
            scale,
            position: point(pen_x, sf.ascent()),
        });
        pen_x += sf.h_advance(id);
    }

    let outlined: Vec<_> = glyphs
        .into_iter()
        .filter_map(|g| font.outline_glyph(g))
        .collect();
    if outlined.is_empty() {
        return None;
    }

    let (mut min_x, mut min_y) = (f32::INFINITY, f32::INFINITY);
    let (mut max_x, mut max_y) = (f32::NEG_INFINITY, f32::NEG_INFINITY);
    for out in &outlined {
        let b = out.px_bounds();
        min_x = min_x.min(b.min.x);
        min_y = min_y.min(b.min.y);
        max_x = max_x.max(b.max.x);
        max_y = max_y.max(b.max.y);
    }

    let w = (max_x.ceil() - min_x.floor()).max(1.0) as u32;
    let h = (max_y.ceil() - min_y.floor()).max(1.0) as u32;
    let mut pm = Pixmap::new(w, h)?;
    let stride = w as usize;
    let dst = pm.pixels_mut();

    let cu = color.to_color_u8();
    for out in &outlined {
        let b = out.px_bounds();
        out.draw(|x, y, cov| {
            if cov <= f32::EPSILON {
                return;
            }
            let ix = (x as f32 + b.min.x - min_x).floor() as i32;
            let iy = (y as f32 + b.min.y - min_y).floor() as i32;
            if ix < 0 || iy < 0 || ix >= w as i32 || iy >= h as i32 {
                return;
            }
            let i = iy as usize * stride + ix as usize;

            // Premultiplied source over destination
            let a = (cov * cu.alpha() as f32 / 255.0).clamp(0.0, 1.0);
            let sa = (a * 255.0) as u8;
            let inv = 1.0 - a;
            let bg = dst[i];
            let blend = |s: u8, d: u8| ((s as f32 * a) as u8).saturating_add((d as f32 * inv) as u8);
            if let Some(px) = PremultipliedColorU8::from_rgba(
                blend(cu.red(), bg.red()),
                blend(cu.green(), bg.green()),
                blend(cu.blue(), bg.blue()),
                sa.saturating_add((bg.alpha() as f32 * inv) as u8),
            ) {
                dst[i] = px;
            }
        });
    }

    Some(pm)
}

pub struct FrameStats {
    pub draw: Duration,
    pub copy: Duration,
    pub blits: usize,
}

pub struct SkiaRenderer {
    layout: Layout,
    canvas: Pixmap,
    text_cache: TextCache,
    background: Color,
}

impl SkiaRenderer {
    pub fn new(width: u32, height: u32, font: FontArc) -> Result<Self> {
        let canvas = Pixmap::new(width, height)
            .ok_or_else(|| anyhow!("cannot allocate a {width}x{height} canvas"))?;
        let mut renderer = Self {
            layout: Layout::new(width, height),
            canvas,
            text_cache: TextCache::new(font),
            background: Color::from_rgba8(0, 0, 0, 255),
        };
        renderer
            .text_cache
            .get_or_render(intern_text(INCORRECT_TEXT), NOTICE_PX, notice_color());
        renderer
            .text_cache
            .get_or_render(intern_text(COMPLETE_TEXT), LABEL_PX, text_color());
        Ok(renderer)
    }

    /// Interns and rasterizes category labels and stimulus words ahead of
    /// the first frame that needs them. Returns the number of cached texts.
    pub fn prewarm<'a>(
        &mut self,
        labels: impl IntoIterator<Item = &'a str>,
        words: impl IntoIterator<Item = &'a str>,
    ) -> usize {
        for id in intern_all(labels) {
            self.text_cache.get_or_render(id, LABEL_PX, text_color());
        }
        for id in intern_all(words) {
            self.text_cache.get_or_render(id, WORD_PX, text_color());
        }
        self.text_cache.map.len()
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.canvas = Pixmap::new(width, height)
            .ok_or_else(|| anyhow!("cannot allocate a {width}x{height} canvas"))?;
        self.layout = Layout::new(width, height);
        Ok(())
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Paints `scene` and copies the result into an RGBA frame buffer of the
    /// same size as the canvas.
    pub fn render_frame(&mut self, scene: &Scene<'_>, frame_buffer: &mut [u8]) -> Result<FrameStats> {
        if frame_buffer.len() != self.canvas.data().len() {
            bail!(
                "frame buffer holds {} bytes, canvas needs {}",
                frame_buffer.len(),
                self.canvas.data().len()
            );
        }

        let t_draw = Instant::now();
        self.canvas.fill(self.background);
        let mut blits = 0;
        match scene {
            Scene::Trial { display, incorrect } => {
                for position in Position::ALL {
                    if let Some(label) = display.label(position) {
                        let at = self.layout.label(position);
                        blits += self.blit_text(label, LABEL_PX, text_color(), at) as usize;
                    }
                }
                let at = self.layout.word();
                blits += self.blit_text(&display.word, WORD_PX, text_color(), at) as usize;
                if *incorrect {
                    let at = self.layout.notice();
                    blits += self.blit_text(INCORRECT_TEXT, NOTICE_PX, notice_color(), at) as usize;
                }
            }
            Scene::Complete => {
                let at = self.layout.word();
                blits += self.blit_text(COMPLETE_TEXT, LABEL_PX, text_color(), at) as usize;
            }
            Scene::Blank => {}
        }
        let draw = t_draw.elapsed();

        let t_copy = Instant::now();
        // The canvas is opaque, so premultiplied and straight RGBA agree.
        frame_buffer.copy_from_slice(self.canvas.data());

        Ok(FrameStats {
            draw,
            copy: t_copy.elapsed(),
            blits,
        })
    }

    /// Draws `text` centered on `center`. Returns false when nothing was drawn.
    fn blit_text(&mut self, text: &str, size_px: f32, color: Color, center: (f32, f32)) -> bool {
        let id = intern_text(text);
        let Some(pm) = self.text_cache.get_or_render(id, size_px, color) else {
            return false;
        };
        let x = (center.0 - pm.width() as f32 * 0.5) as i32;
        let y = (center.1 - pm.height() as f32 * 0.5) as i32;
        self.canvas.draw_pixmap(
            x,
            y,
            Pixmap::as_ref(&pm),
            &PixmapPaint::default(),
            Transform::identity(),
            None,
        );
        true
    }
}

fn text_color() -> Color {
    Color::from_rgba8(255, 255, 255, 255)
}

fn notice_color() -> Color {
    Color::from_rgba8(230, 40, 40, 255)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn left_and_right_labels_sit_in_opposite_columns() {
        let layout = Layout::new(1280, 720);
        let (lx, _) = layout.label(Position::LeftTop);
        let (rx, _) = layout.label(Position::RightBottom);
        assert!(lx < layout.word().0);
        assert!(rx > layout.word().0);
    }

    #[test]
    fn bottom_labels_stack_under_top_labels() {
        let layout = Layout::new(800, 600);
        for (top, bottom) in [
            (Position::LeftTop, Position::LeftBottom),
            (Position::RightTop, Position::RightBottom),
        ] {
            let (tx, ty) = layout.label(top);
            let (bx, by) = layout.label(bottom);
            assert_eq!(tx, bx);
            assert!(by > ty);
        }
    }

    #[test]
    fn notice_sits_below_the_word() {
        let layout = Layout::new(800, 600);
        assert!(layout.notice().1 > layout.word().1);
        assert_eq!(layout.notice().0, layout.word().0);
    }
}
