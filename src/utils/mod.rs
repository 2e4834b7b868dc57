//! Common utilities and helper functions

pub mod retry;

/// Truncate text to at most `max_chars` characters, appending `...` when cut
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{kept}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("a much longer message", 10), "a much ...");
    }

    #[test]
    fn test_truncate_multibyte() {
        let text = "플레이리스트를 찾을 수 없습니다";
        let out = truncate_text(text, 8);
        assert_eq!(out.chars().count(), 8);
        assert!(out.ends_with("..."));
    }
}
