use std::sync::LazyLock;

use regex::Regex;

static WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9a-zA-Z']+").expect("token pattern is a valid regex"));

///Splits text into lowercase tokens.
///A token is a maximal run of ASCII letters, digits and apostrophes; everything else is a separator.
///Apostrophes are token characters wherever they appear, so `'quoted'` stays `'quoted'` and
///does not merge with `quoted`.
/// # Example
/// ```
/// use text_lab::tokenize;
/// let tokens = tokenize("Don't PANIC, 42 times!");
/// assert_eq!(tokens, vec!["don't", "panic", "42", "times"]);
/// ```
pub fn tokenize(text: &str) -> Vec<String> {
    WORD_RE
        .find_iter(text)
        .map(|m| m.as_str().to_ascii_lowercase())
        .collect()
}

///Adjacent token pairs joined by a single space.
/// # Example
/// ```
/// use text_lab::tokenize::bigrams;
/// let tokens = vec!["a".to_string(), "b".to_string(), "c".to_string()];
/// assert_eq!(bigrams(&tokens), vec!["a b", "b c"]);
/// ```
pub fn bigrams(tokens: &[String]) -> Vec<String> {
    tokens
        .windows(2)
        .map(|pair| format!("{} {}", pair[0], pair[1]))
        .collect()
}
