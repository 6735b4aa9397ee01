use practice_core::model::QualityRating;

/// Where keyboard focus is when a key arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputFocus {
    #[default]
    Page,
    /// A text field or text area; digits are typed, not ratings.
    TextEntry,
}

/// Rating selected by pressing `1`..`4` outside text entry.
#[must_use]
pub fn rating_for_key(key: &str, focus: InputFocus) -> Option<QualityRating> {
    if focus == InputFocus::TextEntry {
        return None;
    }
    match key {
        "1" | "2" | "3" | "4" => key.parse().ok().and_then(|v| QualityRating::from_u8(v).ok()),
        _ => None,
    }
}

/// Ctrl+Enter / Cmd+Enter saves from anywhere, text fields included.
#[must_use]
pub fn is_save_shortcut(key: &str, ctrl_or_meta: bool) -> bool {
    ctrl_or_meta && key == "Enter"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digit_keys_pick_ratings() {
        assert_eq!(rating_for_key("1", InputFocus::Page), Some(QualityRating::VeryHard));
        assert_eq!(rating_for_key("4", InputFocus::Page), Some(QualityRating::Excellent));
        assert_eq!(rating_for_key("5", InputFocus::Page), None);
        assert_eq!(rating_for_key("0", InputFocus::Page), None);
        assert_eq!(rating_for_key("a", InputFocus::Page), None);
    }

    #[test]
    fn text_entry_swallows_digits() {
        assert_eq!(rating_for_key("2", InputFocus::TextEntry), None);
    }

    #[test]
    fn save_shortcut_needs_modifier() {
        assert!(is_save_shortcut("Enter", true));
        assert!(!is_save_shortcut("Enter", false));
        assert!(!is_save_shortcut("s", true));
    }
}
