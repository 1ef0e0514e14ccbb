//! Fonts for caption rendering.
//!
//! Captions prefer a real outline font (Impact, or whatever family is asked
//! for) and fall back through common bold sans faces to a built-in 8x8 bitmap
//! font, so there is always something to draw with.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ab_glyph::{Font, FontVec, PxScale, ScaleFont, point};
use font8x8::{BASIC_FONTS, UnicodeFonts};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use tracing::{debug, info, warn};

/// Directories searched for a font family by file name.
const FONT_DIRS: &[&str] = &[
    "/usr/share/fonts/truetype/msttcorefonts",
    "/usr/share/fonts/truetype",
    "/usr/share/fonts/TTF",
    "/usr/local/share/fonts",
    "/Library/Fonts",
    "/System/Library/Fonts/Supplemental",
    "C:\\Windows\\Fonts",
];

/// Bold faces close enough to Impact when the family itself is missing.
const FALLBACK_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    "/System/Library/Fonts/Supplemental/Arial Bold.ttf",
    "C:\\Windows\\Fonts\\arialbd.ttf",
];

const FONT_EXTENSIONS: &[&str] = &["ttf", "TTF", "otf"];

/// A font file couldn't be used.
#[derive(Debug)]
pub enum RenderError {
    /// Reading the font file failed.
    Io(PathBuf, std::io::Error),
    /// The file isn't a font ab_glyph understands.
    InvalidFont(PathBuf),
}

impl std::fmt::Display for RenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(path, err) => write!(f, "Failed to read font {}: {err}", path.display()),
            Self::InvalidFont(path) => write!(f, "Failed to parse font file: {}", path.display()),
        }
    }
}

impl std::error::Error for RenderError {}

/// Something that can measure and draw a line of text at a pixel size.
pub trait Typeface: Send + Sync {
    /// Human readable name, for logs.
    fn name(&self) -> &str;

    /// Rendered `(width, height)` of `text` at `size`.
    fn text_size(&self, text: &str, size: f32) -> (u32, u32);

    /// Draw `text` with its top-left corner at `(x, y)`. Out-of-bounds pixels are clipped.
    fn draw_text(
        &self,
        canvas: &mut RgbaImage,
        color: Rgba<u8>,
        x: i32,
        y: i32,
        size: f32,
        text: &str,
    );
}

/// A TrueType/OpenType font loaded from disk.
pub struct OutlineTypeface {
    name: String,
    font: FontVec,
}

impl OutlineTypeface {
    /// Load a font file.
    pub fn from_path(path: &Path) -> Result<Self, RenderError> {
        let data = std::fs::read(path).map_err(|err| RenderError::Io(path.to_path_buf(), err))?;
        let font = FontVec::try_from_vec(data)
            .map_err(|_| RenderError::InvalidFont(path.to_path_buf()))?;
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("font")
            .to_string();
        Ok(Self { name, font })
    }

    /// Top and bottom of the inked rows of `text`, relative to the origin
    /// `draw_text_mut` is given. Glyphs sit on a baseline one ascent down, so
    /// the ink starts below the origin by a font-dependent amount.
    fn ink_rows(&self, text: &str, size: f32) -> Option<(f32, f32)> {
        let scale = PxScale::from(size);
        let font = self.font.as_scaled(scale);
        let mut caret = 0.0;
        let mut rows: Option<(f32, f32)> = None;
        for ch in text.chars() {
            let id = font.glyph_id(ch);
            let glyph = id.with_scale_and_position(scale, point(caret, font.ascent()));
            caret += font.h_advance(id);
            if let Some(outlined) = font.outline_glyph(glyph) {
                let bounds = outlined.px_bounds();
                rows = Some(match rows {
                    Some((top, bottom)) => (top.min(bounds.min.y), bottom.max(bounds.max.y)),
                    None => (bounds.min.y, bounds.max.y),
                });
            }
        }
        rows
    }
}

impl Typeface for OutlineTypeface {
    fn name(&self) -> &str {
        &self.name
    }

    /// Advance width, and the height of the ink rather than the line box.
    fn text_size(&self, text: &str, size: f32) -> (u32, u32) {
        let (width, _) = text_size(PxScale::from(size), &self.font, text);
        let height = self
            .ink_rows(text, size)
            .map(|(top, bottom)| (bottom.round() - top.round()).max(0.0) as u32)
            .unwrap_or(0);
        (width, height)
    }

    fn draw_text(
        &self,
        canvas: &mut RgbaImage,
        color: Rgba<u8>,
        x: i32,
        y: i32,
        size: f32,
        text: &str,
    ) {
        // Shift up so the first inked row lands on `y`.
        let ink_top = self
            .ink_rows(text, size)
            .map(|(top, _)| top.round() as i32)
            .unwrap_or(0);
        draw_text_mut(canvas, color, x, y - ink_top, PxScale::from(size), &self.font, text);
    }
}

/// The built-in 8x8 bitmap font, scaled up in whole pixels.
///
/// Chunky, but it needs no files and measures deterministically.
#[derive(Clone, Copy, Debug, Default)]
pub struct BlockTypeface;

impl BlockTypeface {
    const GLYPH_PX: u32 = 8;

    fn cell(size: f32) -> u32 {
        ((size / Self::GLYPH_PX as f32).round() as u32).max(1)
    }
}

impl Typeface for BlockTypeface {
    fn name(&self) -> &str {
        "built-in 8x8"
    }

    fn text_size(&self, text: &str, size: f32) -> (u32, u32) {
        let advance = Self::GLYPH_PX * Self::cell(size);
        let chars = text.chars().count() as u32;
        (chars * advance, advance)
    }

    fn draw_text(
        &self,
        canvas: &mut RgbaImage,
        color: Rgba<u8>,
        x: i32,
        y: i32,
        size: f32,
        text: &str,
    ) {
        let cell = Self::cell(size);
        let advance = (Self::GLYPH_PX * cell) as i32;
        for (index, ch) in text.chars().enumerate() {
            let Some(glyph) = BASIC_FONTS.get(ch).or_else(|| BASIC_FONTS.get('?')) else {
                continue;
            };
            let origin_x = x + index as i32 * advance;
            for (row, bits) in glyph.iter().enumerate() {
                for col in 0..Self::GLYPH_PX {
                    if *bits & (1u8 << col) == 0 {
                        continue;
                    }
                    let rect = Rect::at(
                        origin_x + (col * cell) as i32,
                        y + row as i32 * cell as i32,
                    )
                    .of_size(cell, cell);
                    draw_filled_rect_mut(canvas, rect, color);
                }
            }
        }
    }
}

/// Paths to try for `family`, most specific first.
fn font_candidates(family: &str) -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    let as_path = PathBuf::from(family);
    if as_path.extension().is_some() || as_path.components().count() > 1 {
        candidates.push(as_path);
    }

    let names = [family.to_string(), family.to_ascii_lowercase()];
    for dir in FONT_DIRS {
        for name in &names {
            for ext in FONT_EXTENSIONS {
                candidates.push(Path::new(dir).join(format!("{name}.{ext}")));
            }
        }
    }

    candidates.extend(FALLBACK_FONTS.iter().map(PathBuf::from));
    candidates
}

/// Find the best available typeface for `family`.
///
/// `family` can be a font file path or a family name. This never fails: when
/// nothing on disk loads, the built-in bitmap font is returned.
pub fn resolve_typeface(family: &str) -> Arc<dyn Typeface> {
    for candidate in font_candidates(family) {
        if !candidate.is_file() {
            continue;
        }
        match OutlineTypeface::from_path(&candidate) {
            Ok(face) => {
                info!("Loaded caption font: {}", candidate.display());
                return Arc::new(face);
            }
            Err(err) => warn!("{err}"),
        }
    }

    debug!("Searched {} font locations", FONT_DIRS.len());
    warn!("No usable font found for '{family}', falling back to the built-in bitmap font");
    Arc::new(BlockTypeface)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_font_measures_whole_cells() {
        assert_eq!(BlockTypeface.text_size("AB", 16.0), (32, 16));
        assert_eq!(BlockTypeface.text_size("", 16.0), (0, 16));
        // never smaller than one pixel per cell
        assert_eq!(BlockTypeface.text_size("A", 1.0), (8, 8));
    }

    #[test]
    fn block_font_draws_inside_its_measured_box() {
        let mut canvas = RgbaImage::from_pixel(64, 32, Rgba([0, 0, 0, 255]));
        let white = Rgba([255, 255, 255, 255]);
        BlockTypeface.draw_text(&mut canvas, white, 4, 4, 16.0, "H");

        let lit: Vec<(u32, u32)> = canvas
            .enumerate_pixels()
            .filter(|(_, _, pixel)| **pixel == white)
            .map(|(x, y, _)| (x, y))
            .collect();
        assert!(!lit.is_empty());
        assert!(lit.iter().all(|(x, y)| (4..20).contains(x) && (4..20).contains(y)));
    }

    #[test]
    fn block_font_clips_off_canvas() {
        let mut canvas = RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 255]));
        BlockTypeface.draw_text(&mut canvas, Rgba([255, 0, 0, 255]), -20, -20, 64.0, "WIDE TEXT");
    }

    #[test]
    fn invalid_font_file_is_a_render_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.ttf");
        std::fs::write(&path, b"definitely not a font").expect("write");

        let err = OutlineTypeface::from_path(&path)
            .err()
            .expect("garbage should not parse");
        assert!(matches!(err, RenderError::InvalidFont(_)));
    }

    #[test]
    fn missing_font_still_resolves() {
        let face = resolve_typeface("/nonexistent/NoSuchFont.ttf");
        assert!(!face.name().is_empty());
        let (width, height) = face.text_size("HELLO", 24.0);
        assert!(width > 0);
        assert!(height > 0);
    }

    #[test]
    fn explicit_path_is_tried_first() {
        let candidates = font_candidates("fonts/Custom.ttf");
        assert_eq!(candidates[0], PathBuf::from("fonts/Custom.ttf"));
        let named = font_candidates("Impact");
        assert!(named.iter().all(|path| path != Path::new("Impact")));
    }
}
