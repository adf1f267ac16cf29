use std::collections::BTreeSet;

/// Lowercase alphanumeric words of `text`, in order of appearance.
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
}

pub fn keyword_set(text: &str) -> BTreeSet<String> {
    tokenize(text).collect()
}
