//! Custom hostname validation.

use std::sync::LazyLock;

use regex::Regex;

pub const INVALID_CNAME: &str = "Invalid cname";

static CNAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^(\*\.)?[a-zA-Z0-9][\w-]*(\.[a-zA-Z0-9][\w-]*)*$").expect("valid regex")
});

/// The empty string is valid and means "no cname".
pub fn is_valid(cname: &str) -> bool {
    cname.is_empty() || CNAME_RE.is_match(cname)
}
