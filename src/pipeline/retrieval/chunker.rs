use super::types::{Chunk, Chunker};

/// Boundary units from largest to smallest: paragraph, line, sentence, word.
pub const DEFAULT_SEPARATORS: &[&str] = &["\n\n", "\n", ". ", " "];

/// Byte range into the document being chunked, with its length in chars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Span {
    start: usize,
    end: usize,
    chars: usize,
}

impl Span {
    fn new(text: &str, start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            chars: text[start..end].chars().count(),
        }
    }
}

/// Recursive boundary-aware splitter.
///
/// Sizes are in characters. Splits on the largest boundary unit present,
/// merges neighbouring pieces back up to `chunk_size`, and only descends to
/// a smaller unit for a piece that is still too large. Separators stay
/// attached to the piece they end, so every chunk is an exact substring of
/// the input. Consecutive chunks share up to `overlap` characters of
/// trailing pieces.
pub struct RecursiveChunker {
    chunk_size: usize,
    overlap: usize,
}

impl RecursiveChunker {
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            overlap: overlap.min(chunk_size.saturating_sub(1)),
        }
    }

    fn split_span(&self, text: &str, span: Span, separators: &[&str], out: &mut Vec<Span>) {
        let slice = &text[span.start..span.end];

        let Some(pos) = separators.iter().position(|s| slice.contains(*s)) else {
            // No boundary left: cut on character boundaries
            out.extend(self.merge(&hard_split(slice, span.start, self.chunk_size)));
            return;
        };

        let pieces = split_keeping_separator(slice, separators[pos], span.start);
        let finer = &separators[pos + 1..];

        let mut fitting: Vec<Span> = Vec::new();
        for piece in pieces {
            if piece.chars <= self.chunk_size {
                fitting.push(piece);
                continue;
            }
            if !fitting.is_empty() {
                out.extend(self.merge(&fitting));
                fitting.clear();
            }
            self.split_span(text, piece, finer, out);
        }
        if !fitting.is_empty() {
            out.extend(self.merge(&fitting));
        }
    }

    /// Greedily pack adjacent pieces into spans of at most `chunk_size`
    /// chars, carrying trailing pieces forward as overlap.
    fn merge(&self, pieces: &[Span]) -> Vec<Span> {
        let mut merged = Vec::new();
        let mut window: std::collections::VecDeque<Span> = std::collections::VecDeque::new();
        let mut total = 0;

        for piece in pieces {
            if total + piece.chars > self.chunk_size {
                if let (Some(first), Some(last)) = (window.front(), window.back()) {
                    merged.push(Span {
                        start: first.start,
                        end: last.end,
                        chars: total,
                    });
                }
                while total > self.overlap || (total > 0 && total + piece.chars > self.chunk_size) {
                    match window.pop_front() {
                        Some(dropped) => total -= dropped.chars,
                        None => break,
                    }
                }
            }
            window.push_back(*piece);
            total += piece.chars;
        }

        if let (Some(first), Some(last)) = (window.front(), window.back()) {
            merged.push(Span {
                start: first.start,
                end: last.end,
                chars: total,
            });
        }
        merged
    }
}

impl Default for RecursiveChunker {
    fn default() -> Self {
        Self::new(500, 50)
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, text: &str) -> Vec<Chunk> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let mut spans = Vec::new();
        self.split_span(text, Span::new(text, 0, text.len()), DEFAULT_SEPARATORS, &mut spans);

        spans
            .into_iter()
            .filter_map(|span| trim_span(text, span))
            .enumerate()
            .map(|(index, span)| Chunk {
                index,
                text: text[span.start..span.end].to_string(),
                byte_offset: span.start,
            })
            .collect()
    }
}

/// Split on `sep`, keeping each separator at the end of the piece before it.
fn split_keeping_separator(slice: &str, sep: &str, base: usize) -> Vec<Span> {
    let piece = |start: usize, end: usize| Span {
        start: base + start,
        end: base + end,
        chars: slice[start..end].chars().count(),
    };

    let mut pieces = Vec::new();
    let mut last = 0;
    for (idx, matched) in slice.match_indices(sep) {
        let end = idx + matched.len();
        if end > last {
            pieces.push(piece(last, end));
        }
        last = end;
    }
    if last < slice.len() {
        pieces.push(piece(last, slice.len()));
    }
    pieces
}

/// Cut into pieces of at most `size` chars.
fn hard_split(slice: &str, base: usize, size: usize) -> Vec<Span> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut count = 0;
    for (idx, _) in slice.char_indices() {
        if count == size {
            pieces.push(Span {
                start: base + start,
                end: base + idx,
                chars: count,
            });
            start = idx;
            count = 0;
        }
        count += 1;
    }
    if count > 0 {
        pieces.push(Span {
            start: base + start,
            end: base + slice.len(),
            chars: count,
        });
    }
    pieces
}

fn trim_span(text: &str, span: Span) -> Option<Span> {
    let slice = &text[span.start..span.end];
    let leading = slice.len() - slice.trim_start().len();
    let trimmed = slice.trim();
    if trimmed.is_empty() {
        return None;
    }
    let start = span.start + leading;
    Some(Span::new(text, start, start + trimmed.len()))
}
