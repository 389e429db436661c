//! Content transforms applied to chat/event/redemption text before it is
//! queued for synthesis (§4.2 step 5, §9 open question on `read_full_urls`).

use std::sync::OnceLock;

use regex::Regex;

fn url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"https?://\S+").expect("url pattern is a valid regex literal")
    })
}

/// Replace URLs with a spoken placeholder unless the channel's
/// `read_full_urls` flag is set, in which case the text passes through
/// unchanged.
pub fn substitute_urls(text: &str, read_full_urls: bool) -> String {
    if read_full_urls {
        return text.to_string();
    }
    url_pattern().replace_all(text, "a link").into_owned()
}
