//! Two-line meme captions parsed out of provider text.

use serde::{Deserialize, Serialize};

use crate::constants::CAPTION_DELIMITER;

/// Setup and punchline. Casing is kept as the provider returned it,
/// upper-casing only happens when the caption is drawn.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Caption {
    /// Line anchored to the top edge.
    pub top: String,
    /// Line anchored to the bottom edge.
    pub bottom: String,
}

impl Caption {
    /// Build a caption from two lines, trimming both.
    pub fn new(top: &str, bottom: &str) -> Self {
        Self {
            top: top.trim().to_string(),
            bottom: bottom.trim().to_string(),
        }
    }

    /// Parse raw provider text.
    ///
    /// `top---bottom` splits at the first delimiter. Without a delimiter the
    /// first two non-empty lines are used, and a single line leaves `bottom` empty.
    pub fn parse(raw: &str) -> Self {
        if let Some((top, bottom)) = raw.split_once(CAPTION_DELIMITER) {
            return Self::new(top, bottom);
        }

        let mut lines = raw.lines().map(str::trim).filter(|line| !line.is_empty());
        let top = lines.next().unwrap_or_default();
        let bottom = lines.next().unwrap_or_default();
        Self::new(top, bottom)
    }

    /// True when neither line has anything to draw.
    pub fn is_empty(&self) -> bool {
        self.top.is_empty() && self.bottom.is_empty()
    }

    /// Non-empty lines in draw order, upper-cased for rendering.
    pub fn render_lines(&self) -> (Option<String>, Option<String>) {
        let upper = |line: &str| (!line.is_empty()).then(|| line.to_uppercase());
        (upper(&self.top), upper(&self.bottom))
    }
}
