//! Text helpers used around the store: chunking, snippets, language hint
//!
//! All lengths are counted in characters, not bytes, so Japanese text is
//! split at the same positions as English text of the same length.

use chunkvault_core::Language;

/// Sentence delimiters tried in order when choosing a chunk boundary
const SENTENCE_DELIMITERS: [&str; 7] = ["。", ".", "！", "!", "？", "?", "\n\n"];

/// A chunk only ends early at a delimiter past this fraction of the window
const MIN_BREAK_FRACTION: f64 = 0.6;

/// A snippet only ends at a sentence boundary past this fraction of the limit
const MIN_SNIPPET_FRACTION: f64 = 0.7;

/// Split `text` into overlapping chunks of at most `max_size` characters.
///
/// When a window does not reach the end of the text, it is cut after the
/// last sentence delimiter that lies past 60% of the window. The next chunk
/// starts `overlap` characters before the cut. Chunks are trimmed; empty
/// chunks are dropped.
pub fn chunk_text(text: &str, max_size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if max_size == 0 {
        return Vec::new();
    }
    if chars.len() <= max_size {
        let trimmed = text.trim();
        return if trimmed.is_empty() {
            Vec::new()
        } else {
            vec![trimmed.to_string()]
        };
    }

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let mut end = (start + max_size).min(chars.len());
        if end < chars.len() {
            if let Some(cut) = sentence_break(&chars[start..end], max_size) {
                end = start + cut + 1;
            }
        }

        let chunk: String = chars[start..end].iter().collect();
        let chunk = chunk.trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }

        start = if end < chars.len() {
            end.saturating_sub(overlap).max(start + 1)
        } else {
            end
        };
    }
    chunks
}

/// Position of the first delimiter (in priority order) whose last occurrence
/// lies past the minimum break point
fn sentence_break(window: &[char], max_size: usize) -> Option<usize> {
    let threshold = max_size as f64 * MIN_BREAK_FRACTION;
    SENTENCE_DELIMITERS.iter().find_map(|delim| {
        let pattern: Vec<char> = delim.chars().collect();
        rfind_chars(window, &pattern).filter(|&pos| pos as f64 > threshold)
    })
}

fn rfind_chars(haystack: &[char], needle: &[char]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    (0..=haystack.len() - needle.len())
        .rev()
        .find(|&i| haystack[i..].starts_with(needle))
}

/// Shorten `text` to at most `max_len` characters for display.
///
/// Ends at the last sentence boundary (`。`, else `.`) when it lies past 70%
/// of the limit; otherwise cuts at the limit and appends `...`.
pub fn create_snippet(text: &str, max_len: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_len {
        return text.to_string();
    }

    let truncated = &chars[..max_len];
    let last_period = truncated
        .iter()
        .rposition(|&c| c == '。')
        .or_else(|| truncated.iter().rposition(|&c| c == '.'));

    match last_period {
        Some(pos) if pos as f64 > max_len as f64 * MIN_SNIPPET_FRACTION => {
            truncated[..=pos].iter().collect()
        }
        _ => {
            let mut snippet: String = truncated.iter().collect();
            snippet.push_str("...");
            snippet
        }
    }
}

/// Script-based language hint: Japanese if the text contains kana or kanji.
///
/// Texts with fewer than 3 non-whitespace characters are English.
pub fn detect_language(text: &str) -> Language {
    if text.chars().filter(|c| !c.is_whitespace()).count() < 3 {
        return Language::English;
    }
    if text.chars().any(is_japanese_char) {
        Language::Japanese
    } else {
        Language::English
    }
}

/// Hiragana, katakana or CJK unified ideograph
pub(crate) fn is_japanese_char(c: char) -> bool {
    matches!(c, '\u{3040}'..='\u{309F}' | '\u{30A0}'..='\u{30FF}' | '\u{4E00}'..='\u{9FFF}')
}
