//! Grapheme-aware text helpers for fixed-width terminal columns.

use unicode_segmentation::UnicodeSegmentation;

/// Cut `text` to at most `width` graphemes, marking the cut with `…`.
pub fn truncate(text: &str, width: usize) -> String {
    let graphemes: Vec<&str> = text.graphemes(true).collect();
    if graphemes.len() <= width {
        return text.to_string();
    }
    if width == 0 {
        return String::new();
    }
    let mut out: String = graphemes[..width - 1].concat();
    out.push('…');
    out
}

/// Truncate then pad with spaces to exactly `width` graphemes.
pub fn fit(text: &str, width: usize) -> String {
    let mut out = truncate(text, width);
    let len = out.graphemes(true).count();
    out.extend(std::iter::repeat_n(' ', width.saturating_sub(len)));
    out
}

/// First line of a possibly multi-line text.
pub fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("").trim()
}
