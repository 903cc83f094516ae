use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref TERM_RE: Regex = Regex::new(r"[\p{L}\p{N}']+").expect("valid regex");
}

/// Split text into lowercase terms: maximal runs of letters, digits and apostrophes.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    TERM_RE.find_iter(&lowered).map(|m| m.as_str().to_string()).collect()
}
