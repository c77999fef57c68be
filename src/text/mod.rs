//! Plain-text helpers shared by the reading view, the translation
//! backends and the speech segmenter.

use std::sync::OnceLock;

use regex::Regex;

fn tag_pattern() -> &'static Regex {
    static TAG_PATTERN: OnceLock<Regex> = OnceLock::new();
    TAG_PATTERN.get_or_init(|| Regex::new(r"<[^>]+>").expect("tag pattern is valid"))
}

/// Remove HTML tags, keeping text content and whitespace untouched.
/// No entity decoding is performed.
pub fn strip_html(input: &str) -> String {
    tag_pattern().replace_all(input, "").into_owned()
}

/// Split into segments of at most `max_chars` characters. Every segment
/// except possibly the last is exactly `max_chars` long, and the
/// concatenation of all segments reproduces the input. Counts chars,
/// not bytes, so multi-byte text never splits inside a code point.
pub fn chunk_text(input: &str, max_chars: usize) -> Vec<String> {
    if max_chars == 0 {
        return Vec::new();
    }

    let chars: Vec<char> = input.chars().collect();
    chars
        .chunks(max_chars)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

/// Truncate to at most `max_chars` characters without splitting a
/// multi-byte character.
pub fn truncate_chars(input: &str, max_chars: usize) -> &str {
    match input.char_indices().nth(max_chars) {
        Some((index, _)) => &input[..index],
        None => input,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tags_keeping_text() {
        assert_eq!(strip_html("<p>Hello <b>World</b></p>"), "Hello World");
    }

    #[test]
    fn strip_leaves_plain_text_unchanged() {
        assert_eq!(strip_html("no markup here"), "no markup here");
        assert_eq!(strip_html(""), "");
    }

    #[test]
    fn strip_handles_attributes_and_self_closing_tags() {
        let html = r#"<div class="body">line<br/>break</div>"#;
        assert_eq!(strip_html(html), "linebreak");
    }

    #[test]
    fn chunks_are_full_length_then_remainder() {
        let text = "a".repeat(450);
        let chunks = chunk_text(&text, 200);
        let lengths: Vec<usize> = chunks.iter().map(|c| c.chars().count()).collect();
        assert_eq!(lengths, vec![200, 200, 50]);
    }

    #[test]
    fn chunk_concatenation_reproduces_input() {
        let text = "The quick brown fox 跳过了 lazy dog. ".repeat(13);
        let chunks = chunk_text(&text, 50);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn chunking_counts_chars_not_bytes() {
        // Three bytes per character; byte-based slicing would panic.
        let text = "汉".repeat(7);
        let chunks = chunk_text(&text, 3);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], "汉汉汉");
        assert_eq!(chunks[2], "汉");
    }

    #[test]
    fn exact_multiple_has_no_short_tail() {
        let chunks = chunk_text(&"b".repeat(400), 200);
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.chars().count() == 200));
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        assert!(chunk_text("", 200).is_empty());
    }

    #[test]
    fn zero_width_yields_no_chunks() {
        assert!(chunk_text("anything", 0).is_empty());
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("short", 100), "short");
        assert_eq!(truncate_chars("汉字文本", 3), "汉字文");
    }
}
