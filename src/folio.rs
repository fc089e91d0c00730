//! Folio naming: slugs, storage paths and display titles.
//!
//! An uploaded file `My Portfolio.pdf` becomes the slug
//! `my-portfolio-k3x9q2`, stored at `public/my-portfolio-k3x9q2.pdf`, with its
//! extracted content at `public/my-portfolio-k3x9q2.pdf.extracted.json`.

use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;

/// Prefix under which uploaded documents are stored.
pub const DOCUMENT_PREFIX: &str = "public/";

/// Suffix appended to a document path to locate its extracted content.
pub const EXTRACTED_SUFFIX: &str = ".extracted.json";

/// Length of the random id appended to slugs.
pub const SLUG_ID_LEN: usize = 6;

const SLUG_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static TRAILING_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)[-_][a-z0-9]{6}$").unwrap());
static SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-_]+").unwrap());

/// Random `[a-z0-9]` id of [`SLUG_ID_LEN`] characters.
pub fn new_slug_id() -> String {
    let mut rng = rand::thread_rng();
    (0..SLUG_ID_LEN)
        .map(|_| SLUG_ALPHABET[rng.gen_range(0..SLUG_ALPHABET.len())] as char)
        .collect()
}

/// Slug stem for a file name: extension dropped, lower-cased, whitespace runs
/// replaced by `-`.
pub fn slug_stem(file_name: &str) -> String {
    let stem = match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file_name,
    };
    WHITESPACE
        .replace_all(stem.trim(), "-")
        .to_lowercase()
}

/// Fresh slug for an uploaded file.
pub fn slug_for_file_name(file_name: &str) -> String {
    format!("{}-{}", slug_stem(file_name), new_slug_id())
}

/// Storage path of the document behind `slug`.
pub fn document_path(slug: &str) -> String {
    format!("{DOCUMENT_PREFIX}{slug}.pdf")
}

/// Storage path of the extracted content for `document_path`.
pub fn extracted_content_path(document_path: &str) -> String {
    format!("{document_path}{EXTRACTED_SUFFIX}")
}

/// Human title for a slug: the trailing id is dropped, separators become
/// spaces, and each word is capitalised.
pub fn slug_to_title(slug: &str) -> String {
    let without_id = TRAILING_ID.replace(slug, "");
    SEPARATORS
        .replace_all(&without_id, " ")
        .split_whitespace()
        .map(capitalise)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalise(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
