use regex::bytes::Regex;
use std::sync::LazyLock;

macro_rules! regex {
    ($name:ident, $regex:expr) => {
        pub(crate) static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($regex).unwrap());
    };
}

pub(crate) const STREAM_KEYWORD: &[u8] = b"stream";
pub(crate) const END_STREAM_KEYWORD: &[u8] = b"endstream";
pub(crate) const OBJ_KEYWORD: &[u8] = b"obj";
/// How far back from a `stream` keyword to look for its dictionary.
pub(crate) const DICTIONARY_LOOKBEHIND: usize = 2048;
/// Inflated size cap for one content stream.
pub(crate) const MAX_INFLATED_STREAM_BYTES: u64 = 16 * 1024 * 1024;
/// Inflated size cap across all streams of one document: twice the upload limit.
pub(crate) const MAX_INFLATED_TOTAL_BYTES: u64 = 100 * 1024 * 1024;
/// `TJ` adjustments beyond this (in thousandths of an em) read as a word gap.
pub(crate) const TJ_WORD_GAP: f64 = 200.0;

// First entry of a `/Filter` name or array.
regex!(FILTER_REGEX, r"/Filter\s*\[?\s*/([A-Za-z0-9]+)");
// Page objects, but not the `/Pages` tree nodes.
regex!(PAGE_TYPE_REGEX, r"/Type\s*/Page(?-u:\b)");
