//! Prompt templates sent to the providers.

use crate::caption::Caption;
use crate::constants::CAPTION_DELIMITER;
use crate::pipeline::MemeRequest;

/// Longest line we ask the text model for.
const MAX_LINE_CHARS: usize = 50;

/// Prompt for the two-line caption.
pub fn caption_prompt(request: &MemeRequest) -> String {
    format!(
        r#"Create a {mood}, relatable workplace meme text based on this situation: "{situation}"

Generate a meme in this format:
- Top text (setup)
- Bottom text (punchline)

Make it witty, relatable for office workers, and appropriate for workplace sharing.
Keep each line under {MAX_LINE_CHARS} characters for better readability.

Format your response as a single line, with the top text and the bottom text separated by {CAPTION_DELIMITER}:
[top text]{CAPTION_DELIMITER}[bottom text]"#,
        mood = request.mood,
        situation = request.situation,
    )
}

/// Prompt for the base image, with the caption as context.
pub fn image_prompt(request: &MemeRequest, caption: &Caption) -> String {
    format!(
        r#"Create a workplace meme image for this situation: "{situation}"

The image should be:
- Professional yet {mood} office/workplace themed
- In a {style} style
- Suitable for adding text overlay later, with room at the top and bottom
- Clean and simple composition
- Appropriate for workplace sharing
- Free of any written words or captions

Meme text context: {top} / {bottom}"#,
        situation = request.situation,
        mood = request.mood,
        style = request.style,
        top = caption.top,
        bottom = caption.bottom,
    )
}
