#[allow(clippy::module_inception)]
mod tokenizer;

pub use tokenizer::{has_wildcards, wildcard_match, Tokenizer};
