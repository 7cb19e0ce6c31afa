//! Placeholder text for posts without usable media.

/// Default maximum placeholder length, in characters.
pub const DEFAULT_PLACEHOLDER_LEN: usize = 120;

const ELLIPSIS: char = '…';
const BREAK_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?'];

/// Pick the placeholder text for a post: body, else title, else the topic.
pub fn placeholder_text(body: Option<&str>, title: &str, topic: &str, max_chars: usize) -> String {
    let source = body
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .or_else(|| Some(title.trim()).filter(|t| !t.is_empty()));
    match source {
        Some(text) => truncate_at_boundary(text, max_chars),
        None => truncate_at_boundary(&format!("from r/{topic}"), max_chars),
    }
}

/// Collapse whitespace and shorten `text` to at most `max_chars` characters.
///
/// Longer text is cut at the last space or punctuation mark in the second
/// half of the allowance and ends with `…`. Without such a boundary the cut
/// falls mid-word.
pub fn truncate_at_boundary(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let chars: Vec<char> = collapsed.chars().collect();
    if chars.len() <= max_chars {
        return collapsed;
    }
    if max_chars == 0 {
        return String::new();
    }

    let window = &chars[..max_chars - 1];
    let floor = max_chars / 2;
    let cut = window
        .iter()
        .rposition(|c| *c == ' ' || BREAK_PUNCTUATION.contains(c))
        .filter(|&pos| pos >= floor)
        .unwrap_or(window.len());

    let mut out: String = window[..cut].iter().collect();
    let trimmed_len = out.trim_end().len();
    out.truncate(trimmed_len);
    out.push(ELLIPSIS);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_only_collapsed() {
        assert_eq!(truncate_at_boundary("  a \n\t b  ", 120), "a b");
    }

    #[test]
    fn long_text_breaks_on_word_boundary() {
        let text = "word ".repeat(50);
        let out = truncate_at_boundary(&text, 120);
        assert!(out.chars().count() <= 120);
        assert!(out.ends_with("word…"));
    }

    #[test]
    fn unbroken_text_is_cut_mid_word() {
        let text = "x".repeat(300);
        let out = truncate_at_boundary(&text, 120);
        assert_eq!(out.chars().count(), 120);
        assert!(out.ends_with('…'));
    }

    #[test]
    fn counts_characters_not_bytes() {
        let text = "ü".repeat(200);
        let out = truncate_at_boundary(&text, 10);
        assert_eq!(out.chars().count(), 10);
    }

    #[test]
    fn falls_back_from_body_to_title_to_topic() {
        assert_eq!(placeholder_text(Some("body"), "title", "aww", 120), "body");
        assert_eq!(placeholder_text(Some("   "), "title", "aww", 120), "title");
        assert_eq!(placeholder_text(None, "", "aww", 120), "from r/aww");
    }
}
