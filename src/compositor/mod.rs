//! Burns a two-line caption into an image, classic meme style.
//!
//! Both lines share one font size, the largest (stepping down from a fraction of
//! the image height) at which every line fits inside the max line width. The top
//! line hangs from the top edge, the bottom line sits on the bottom edge, and
//! each is drawn white over a solid black outline.

mod typeface;

use std::sync::Arc;

use image::{DynamicImage, Rgba, RgbaImage};
use tracing::debug;

use crate::caption::Caption;
use crate::constants::{DEFAULT_FONT_FAMILY, OUTLINE_REFERENCE_HEIGHT};

pub use typeface::{BlockTypeface, OutlineTypeface, RenderError, Typeface, resolve_typeface};

const FILL: Rgba<u8> = Rgba([255, 255, 255, 255]);
const OUTLINE: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Geometry knobs for caption rendering.
#[derive(Clone, Debug, PartialEq)]
pub struct ComposeOptions {
    /// Font family name or path to a font file.
    pub font_family: String,
    /// Outline thickness in pixels on a 1024px tall image; scales with height.
    pub outline: u32,
    /// Starting font size is `height / font_size_divisor`.
    pub font_size_divisor: u32,
    /// Gap between a line and its edge, as a fraction of height.
    pub padding_fraction: f32,
    /// Widest a line may render, as a fraction of width.
    pub max_line_width_fraction: f32,
    /// How much the font size drops per fitting attempt.
    pub font_size_step: u32,
    /// Fitting stops here, overflowing lines are drawn anyway.
    pub min_font_size: u32,
}

impl Default for ComposeOptions {
    fn default() -> Self {
        Self {
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            outline: 2,
            font_size_divisor: 11,
            padding_fraction: 0.03,
            max_line_width_fraction: 0.95,
            font_size_step: 2,
            min_font_size: 10,
        }
    }
}

/// Where one line lands on the canvas.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LinePlacement {
    /// Text as drawn (upper-cased).
    pub text: String,
    /// Left edge, negative when the line overflows.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Measured width.
    pub width: u32,
    /// Measured height.
    pub height: u32,
}

/// Computed font size and line placements for one caption on one canvas.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CaptionLayout {
    /// Shared font size for both lines.
    pub font_size: u32,
    /// Top line, if it has text.
    pub top: Option<LinePlacement>,
    /// Bottom line, if it has text.
    pub bottom: Option<LinePlacement>,
}

impl CaptionLayout {
    /// Placed lines in draw order.
    pub fn lines(&self) -> impl Iterator<Item = &LinePlacement> {
        self.top.iter().chain(self.bottom.iter())
    }
}

/// Caption renderer with a resolved typeface.
#[derive(Clone)]
pub struct Compositor {
    typeface: Arc<dyn Typeface>,
    options: ComposeOptions,
}

impl std::fmt::Debug for Compositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compositor")
            .field("typeface", &self.typeface.name())
            .field("options", &self.options)
            .finish()
    }
}

impl Compositor {
    /// Resolve `options.font_family` and build a compositor. Falls back to
    /// the built-in font rather than failing.
    pub fn new(options: ComposeOptions) -> Self {
        let typeface = resolve_typeface(&options.font_family);
        Self { typeface, options }
    }

    /// Build a compositor around an already loaded typeface.
    pub fn with_typeface(typeface: Arc<dyn Typeface>, options: ComposeOptions) -> Self {
        Self { typeface, options }
    }

    /// The typeface captions are drawn with.
    pub fn typeface(&self) -> &dyn Typeface {
        self.typeface.as_ref()
    }

    /// Parse raw provider text and burn it into a copy of `image`.
    pub fn compose(&self, image: &DynamicImage, caption_text: &str) -> DynamicImage {
        self.compose_caption(image, &Caption::parse(caption_text))
    }

    /// Burn `caption` into a copy of `image`.
    ///
    /// The result always has the input's dimensions. An empty caption returns
    /// the input untouched, anything else comes back as opaque RGB.
    pub fn compose_caption(&self, image: &DynamicImage, caption: &Caption) -> DynamicImage {
        if caption.is_empty() {
            return image.clone();
        }

        let (width, height) = (image.width(), image.height());
        let layout = self.layout(caption, width, height);
        let outline = self.outline_px(height);
        debug!(
            "Captioning {width}x{height} image at {}px, outline {outline}px, font {}",
            layout.font_size,
            self.typeface.name()
        );

        let mut canvas = image.to_rgba8();
        for line in layout.lines() {
            self.draw_outlined(&mut canvas, line, layout.font_size, outline);
        }

        DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(canvas).into_rgb8())
    }

    /// Font size and line positions for `caption` on a `width` x `height` canvas.
    pub fn layout(&self, caption: &Caption, width: u32, height: u32) -> CaptionLayout {
        let (top, bottom) = caption.render_lines();
        let lines: Vec<&str> = top.iter().chain(bottom.iter()).map(String::as_str).collect();
        let font_size = self.fit_font_size(&lines, width, height);
        let padding = (height as f32 * self.options.padding_fraction).round() as i32;

        let place = |text: String, anchor_bottom: bool| {
            let (text_width, text_height) = self.typeface.text_size(&text, font_size as f32);
            let x = (width as i32 - text_width as i32) / 2;
            let y = if anchor_bottom {
                height as i32 - text_height as i32 - padding
            } else {
                padding
            };
            LinePlacement {
                text,
                x,
                y,
                width: text_width,
                height: text_height,
            }
        };

        CaptionLayout {
            font_size,
            top: top.map(|text| place(text, false)),
            bottom: bottom.map(|text| place(text, true)),
        }
    }

    /// Largest size, stepping down from `height / divisor`, at which every line
    /// fits the max line width. Never goes below the floor; lines that still
    /// overflow there are accepted.
    pub fn fit_font_size(&self, lines: &[&str], width: u32, height: u32) -> u32 {
        let floor = self.options.min_font_size.max(1);
        let step = self.options.font_size_step.max(1);
        let max_width = width as f32 * self.options.max_line_width_fraction;

        let fits = |size: u32| {
            lines
                .iter()
                .filter(|line| !line.is_empty())
                .all(|line| self.typeface.text_size(line, size as f32).0 as f32 <= max_width)
        };

        let mut size = (height / self.options.font_size_divisor.max(1)).max(floor);
        while size > floor && !fits(size) {
            size = size.saturating_sub(step).max(floor);
        }
        size
    }

    /// Outline thickness for an image `height` pixels tall.
    pub fn outline_px(&self, height: u32) -> i32 {
        let scaled = self.options.outline as f32 * height as f32 / OUTLINE_REFERENCE_HEIGHT;
        (scaled.round() as i32).max(1)
    }

    fn draw_outlined(&self, canvas: &mut RgbaImage, line: &LinePlacement, size: u32, outline: i32) {
        let size = size as f32;
        for dx in -outline..=outline {
            for dy in -outline..=outline {
                if dx == 0 && dy == 0 {
                    continue;
                }
                self.typeface
                    .draw_text(canvas, OUTLINE, line.x + dx, line.y + dy, size, &line.text);
            }
        }
        self.typeface
            .draw_text(canvas, FILL, line.x, line.y, size, &line.text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn block_compositor() -> Compositor {
        Compositor::with_typeface(Arc::new(BlockTypeface), ComposeOptions::default())
    }

    fn gray(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([128, 128, 128])))
    }

    /// A compositor on a real font file, or `None` on hosts without one.
    fn outline_compositor() -> Option<Compositor> {
        let typeface = resolve_typeface(DEFAULT_FONT_FAMILY);
        if typeface.name() == BlockTypeface.name() {
            return None;
        }
        Some(Compositor::with_typeface(typeface, ComposeOptions::default()))
    }

    /// First and last rows that differ from the plain gray background.
    fn inked_rows(image: &RgbImage) -> Option<(u32, u32)> {
        let rows: Vec<u32> = (0..image.height())
            .filter(|&y| (0..image.width()).any(|x| image.get_pixel(x, y).0 != [128, 128, 128]))
            .collect();
        Some((*rows.first()?, *rows.last()?))
    }

    #[test]
    fn outline_font_lines_fit_and_centre() {
        let Some(compositor) = outline_compositor() else {
            return;
        };
        let (width, height) = (800, 600);
        let caption = Caption::new(
            "when the build passes locally",
            "but fails in ci for reasons nobody can explain",
        );

        let layout = compositor.layout(&caption, width, height);
        let padding = (height as f32 * 0.03).round() as i32;
        assert!(layout.font_size > 10);
        for line in layout.lines() {
            assert!(line.width as f32 <= width as f32 * 0.95, "{line:?}");
            assert_eq!(line.x, (width as i32 - line.width as i32) / 2);
            assert!(line.height > 0);
        }
        let top = layout.top.as_ref().unwrap();
        let bottom = layout.bottom.as_ref().unwrap();
        assert_eq!(top.y, padding);
        assert_eq!(bottom.y + bottom.height as i32, height as i32 - padding);

        let composed = compositor.compose_caption(&gray(width, height), &caption);
        assert_eq!((composed.width(), composed.height()), (width, height));
    }

    #[test]
    fn outline_font_padding_applies_to_visible_text() {
        let Some(compositor) = outline_compositor() else {
            return;
        };
        let (width, height) = (1024, 1024);
        let padding = (height as f32 * 0.03).round() as u32;
        let outline = compositor.outline_px(height) as u32;

        let composed = compositor
            .compose(&gray(width, height), "top text---bottom text")
            .to_rgb8();
        let (first, last) = inked_rows(&composed).unwrap();

        // The outline sits `outline` px outside the fill, allow a pixel of rounding.
        assert!(
            (padding - outline - 1..=padding + 1).contains(&first),
            "first inked row {first}, padding {padding}"
        );
        let last_allowed = height - padding - 1 + outline;
        assert!(
            (last_allowed - outline - 2..=last_allowed + 1).contains(&last),
            "last inked row {last}, padding {padding}"
        );
    }

    #[test]
    fn compose_keeps_dimensions() {
        let compositor = block_compositor();
        for (width, height) in [(400, 300), (37, 512), (1024, 1024), (1, 1)] {
            let out = compositor.compose(&gray(width, height), "top text---bottom text");
            assert_eq!((out.width(), out.height()), (width, height));
        }
    }

    #[test]
    fn empty_caption_is_pixel_identical() {
        let compositor = block_compositor();
        let input = gray(120, 80);
        let out = compositor.compose_caption(&input, &Caption::default());
        assert_eq!(out, input);
        assert_eq!(compositor.compose(&input, "  \n "), input);
    }

    #[test]
    fn draws_white_fill_over_black_outline() {
        let compositor = block_compositor();
        let out = compositor.compose(&gray(400, 300), "hi---there").to_rgb8();

        let white = out.pixels().filter(|p| **p == Rgb([255, 255, 255])).count();
        let black = out.pixels().filter(|p| **p == Rgb([0, 0, 0])).count();
        assert!(white > 0, "no fill drawn");
        assert!(black > 0, "no outline drawn");

        // the top line lives in the top half, bottom line in the bottom half
        let white_rows: Vec<u32> = out
            .enumerate_pixels()
            .filter(|(_, _, p)| **p == Rgb([255, 255, 255]))
            .map(|(_, y, _)| y)
            .collect();
        assert!(white_rows.iter().any(|y| *y < 150));
        assert!(white_rows.iter().any(|y| *y >= 150));
    }

    #[test]
    fn outline_covers_corners() {
        // one lit cell at a known spot: every neighbour within the outline square must be black
        let compositor = Compositor::with_typeface(
            Arc::new(BlockTypeface),
            ComposeOptions {
                outline: 4,
                ..ComposeOptions::default()
            },
        );
        let out = compositor.compose(&gray(200, 1024), ".").to_rgb8();
        let layout = compositor.layout(&Caption::new(".", ""), 200, 1024);
        let top = layout.top.expect("top line");
        let white: Vec<(u32, u32)> = out
            .enumerate_pixels()
            .filter(|(_, _, p)| **p == Rgb([255, 255, 255]))
            .map(|(x, y, _)| (x, y))
            .collect();
        assert!(!white.is_empty());
        let min_x = white.iter().map(|(x, _)| *x).min().unwrap_or_default();
        let min_y = white.iter().map(|(_, y)| *y).min().unwrap_or_default();
        assert!(min_x as i32 >= top.x && min_y as i32 >= top.y);
        let corner = out.get_pixel(min_x - 4, min_y - 4);
        assert_eq!(*corner, Rgb([0, 0, 0]));
    }

    #[test]
    fn layout_anchors_top_and_bottom() {
        let compositor = block_compositor();
        let (width, height) = (600, 400);
        let layout = compositor.layout(&Caption::new("setup", "punchline"), width, height);
        let padding = 12;

        let top = layout.top.expect("top line");
        assert_eq!(top.y, padding);
        assert_eq!(top.x, (width as i32 - top.width as i32) / 2);
        assert_eq!(top.text, "SETUP");

        let bottom = layout.bottom.expect("bottom line");
        assert_eq!(bottom.y + bottom.height as i32 + padding, height as i32);
        assert_eq!(bottom.x, (width as i32 - bottom.width as i32) / 2);
        assert_eq!(bottom.text, "PUNCHLINE");
    }

    #[test]
    fn empty_line_is_not_placed() {
        let compositor = block_compositor();
        let layout = compositor.layout(&Caption::new("", "only bottom"), 300, 300);
        assert!(layout.top.is_none());
        assert!(layout.bottom.is_some());
        assert_eq!(layout.lines().count(), 1);
    }

    #[test]
    fn short_text_gets_the_starting_size() {
        let compositor = block_compositor();
        assert_eq!(compositor.fit_font_size(&["OK"], 1100, 1100), 100);
    }

    #[test]
    fn font_fit_is_monotonic_in_text_length() {
        let compositor = block_compositor();
        let mut previous = u32::MAX;
        for len in 1..80 {
            let text = "W".repeat(len);
            let size = compositor.fit_font_size(&[text.as_str()], 600, 440);
            assert!(size <= previous, "size grew from {previous} to {size} at {len}");
            previous = size;
        }
    }

    #[test]
    fn binding_line_decides_the_shared_size() {
        let compositor = block_compositor();
        let short = compositor.fit_font_size(&["HI"], 400, 440);
        let both = compositor.fit_font_size(&["HI", "A MUCH LONGER PUNCHLINE HERE"], 400, 440);
        let long = compositor.fit_font_size(&["A MUCH LONGER PUNCHLINE HERE"], 400, 440);
        assert!(both < short);
        assert_eq!(both, long);
        let max_width = 400.0 * 0.95;
        assert!(BlockTypeface.text_size("A MUCH LONGER PUNCHLINE HERE", both as f32).0 as f32 <= max_width);
    }

    #[test]
    fn overflow_stops_at_the_floor() {
        let compositor = block_compositor();
        let text = "THIS LINE IS FAR TOO LONG FOR SUCH A NARROW IMAGE";
        assert_eq!(compositor.fit_font_size(&[text], 40, 400), 10);

        let out = compositor.compose(&gray(40, 400), text);
        assert_eq!((out.width(), out.height()), (40, 400));
        let layout = compositor.layout(&Caption::new(text, ""), 40, 400);
        assert!(layout.top.expect("top").x < 0);
    }

    #[test]
    fn tiny_images_use_the_floor() {
        let compositor = block_compositor();
        assert_eq!(compositor.fit_font_size(&["A"], 500, 50), 10);
    }

    #[test]
    fn outline_scales_with_height() {
        let compositor = block_compositor();
        assert_eq!(compositor.outline_px(1024), 2);
        assert_eq!(compositor.outline_px(2048), 4);
        assert_eq!(compositor.outline_px(300), 1);
        assert_eq!(compositor.outline_px(0), 1);
    }

    #[test]
    fn compose_does_not_touch_the_input() {
        let compositor = block_compositor();
        let original = gray(320, 240);
        let captioned = compositor.compose(&original, "meeting---could have been an email");
        let recomposed = compositor.compose(&original, "");
        assert_ne!(captioned, recomposed);
        assert_eq!(recomposed, original);
    }

    #[test]
    fn compose_flattens_alpha() {
        let compositor = block_compositor();
        let input = DynamicImage::ImageRgba8(RgbaImage::from_pixel(100, 100, Rgba([10, 20, 30, 40])));
        let out = compositor.compose(&input, "alpha");
        assert!(matches!(out, DynamicImage::ImageRgb8(_)));
    }
}
