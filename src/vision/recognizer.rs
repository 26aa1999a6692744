//! Recognition backend seam
//!
//! Backends consume an encoded image byte stream plus a language set and
//! return recognized fragments in detection order. Bounding geometry stays
//! inside the backend; nothing downstream needs it.

use anyhow::Result;

/// One span of text found in the image.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    /// Recognized text for this region.
    pub text: String,
    /// Recognition confidence (0.0 - 1.0).
    pub confidence: f32,
}

impl Fragment {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }
}

/// A text recognition backend.
pub trait Recognizer: Send {
    /// Backend identifier for logs and status display.
    fn name(&self) -> &'static str;

    /// Run recognition over a PNG byte stream. Fragments come back in
    /// detection order: top-to-bottom, then left-to-right.
    fn recognize(&mut self, png: &[u8], languages: &[String]) -> Result<Vec<Fragment>>;
}
