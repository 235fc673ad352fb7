use regex::Regex;
use std::sync::OnceLock;

/// Stock openings and closings that carry no information about the complaint.
pub const BOILERPLATE_PHRASES: [&str; 3] = [
    "i am writing to file a complaint",
    "this is to complain about",
    "please investigate",
];

static BOILERPLATE: OnceLock<Regex> = OnceLock::new();

fn boilerplate_pattern() -> &'static Regex {
    BOILERPLATE.get_or_init(|| {
        let alternatives: Vec<String> = BOILERPLATE_PHRASES
            .iter()
            .map(|p| regex::escape(p))
            .collect();
        let pattern = format!("(?i){}", alternatives.join("|"));
        Regex::new(&pattern).expect("escaped phrases form a valid pattern")
    })
}

pub fn lowercase_text(text: &str) -> String {
    text.to_lowercase()
}

/// Keeps ASCII letters, digits and whitespace.
pub fn remove_special_characters(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
        .collect()
}

/// Removes every boilerplate phrase, ignoring case.
pub fn remove_boilerplate(text: &str) -> String {
    boilerplate_pattern().replace_all(text, "").into_owned()
}

/// Full cleaning pass: lowercase, strip punctuation, then drop boilerplate.
///
/// Punctuation goes first so phrases such as "Please investigate!" still match.
pub fn clean_text(text: &str) -> String {
    remove_boilerplate(&remove_special_characters(&lowercase_text(text)))
}
