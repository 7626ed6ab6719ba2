//! Read-time estimation for Article content.

/// Words per minute assumed for a reader.
pub const WORDS_PER_MINUTE: usize = 200;

/// Estimated read time of `text` in seconds: `ceil(words / 200 * 60)`.
///
/// Words are whitespace-separated tokens.
///
/// # Examples
///
/// ```
/// # use kiwiscript_core::reading_time::read_time_seconds;
/// assert_eq!(read_time_seconds(""), 0);
/// assert_eq!(read_time_seconds("one"), 1);
/// assert_eq!(read_time_seconds(&"word ".repeat(200)), 60);
/// ```
#[must_use]
pub fn read_time_seconds(text: &str) -> i32 {
    let words = text.split_whitespace().count();
    let seconds = words.saturating_mul(60).div_ceil(WORDS_PER_MINUTE);
    i32::try_from(seconds).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn rounds_up_partial_seconds() {
        // 7 words -> 2.1s -> 3s
        assert_eq!(read_time_seconds("a b c d e f g"), 3);
        assert_eq!(read_time_seconds("  spaced\n\tout   words "), 1);
    }

    proptest! {
        #[test]
        fn never_under_estimates(words in 0usize..5_000) {
            let text = "kiwi ".repeat(words);
            let seconds = usize::try_from(read_time_seconds(&text)).unwrap_or(0);
            prop_assert!(seconds * WORDS_PER_MINUTE >= words * 60);
            prop_assert!(seconds * WORDS_PER_MINUTE < words * 60 + WORDS_PER_MINUTE);
        }
    }
}
