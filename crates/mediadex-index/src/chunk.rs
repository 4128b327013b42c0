//! Splits document text into index nodes.

/// A slice of a document with its character offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub start: usize,
    pub end: usize,
}

/// Split `text` into chunks of at most `chunk_size` characters, breaking on
/// whitespace when possible. Offsets are character positions in `text`.
pub fn split_text(text: &str, chunk_size: usize) -> Vec<Chunk> {
    let chars: Vec<char> = text.chars().collect();
    let size = chunk_size.max(1);
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        while start < chars.len() && chars[start].is_whitespace() {
            start += 1;
        }
        if start >= chars.len() {
            break;
        }

        let mut end = (start + size).min(chars.len());
        if end < chars.len() {
            if let Some(ws) = (start + 1..end).rev().find(|&i| chars[i].is_whitespace()) {
                end = ws;
            }
        }

        let mut stop = end;
        while stop > start && chars[stop - 1].is_whitespace() {
            stop -= 1;
        }

        chunks.push(Chunk {
            text: chars[start..stop].iter().collect(),
            start,
            end: stop,
        });
        start = end;
    }

    chunks
}

/// First `max_chars` characters of `text`.
pub fn preview(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = split_text("hello world", 100);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "hello world");
        assert_eq!((chunks[0].start, chunks[0].end), (0, 11));
    }

    #[test]
    fn test_breaks_on_whitespace() {
        let chunks = split_text("alpha beta gamma delta", 12);
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["alpha beta", "gamma delta"]);
        assert_eq!(chunks[1].start, 11);
    }

    #[test]
    fn test_hard_split_without_whitespace() {
        let chunks = split_text("abcdefghij", 4);
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_whitespace_only_is_empty() {
        assert!(split_text("   \n\t ", 10).is_empty());
        assert!(split_text("", 10).is_empty());
    }

    #[test]
    fn test_offsets_are_chars_not_bytes() {
        let text = "ação rápida";
        let chunks = split_text(text, 100);
        assert_eq!(chunks[0].end, text.chars().count());
    }

    #[test]
    fn test_preview_counts_chars() {
        assert_eq!(preview("ééééé", 3), "ééé");
        assert_eq!(preview("ab", 200), "ab");
    }
}
