//! Paragraph- and sentence-aware text chunking with soft overlap.
//!
//! All sizes are counted in chars, never bytes.

/// Split `text` into ordered, non-empty chunks of roughly `target_size` chars.
///
/// Paragraphs are packed greedily. A paragraph that alone exceeds the target
/// is packed sentence by sentence, and a sentence that still exceeds it is
/// hard-split into `target_size` slices overlapping by `overlap` chars.
/// Afterwards each chunk receives the tail of its predecessor as a prefix
/// (see [`apply_overlap`]).
pub fn chunk(text: &str, target_size: usize, overlap: usize) -> Vec<String> {
    let normalized = normalize_whitespace(text);
    if normalized.is_empty() {
        return Vec::new();
    }

    let target = target_size.max(1);
    if char_len(&normalized) <= target {
        return vec![normalized];
    }

    let base = pack(&normalized, target, overlap);
    let chunks = apply_overlap(&base, overlap);

    tracing::trace!(
        "Chunked {} chars into {} chunks (target: {}, overlap: {})",
        char_len(&normalized),
        chunks.len(),
        target,
        overlap
    );

    chunks
}

/// Split `text` into windows of at most `max_chars` chars, consecutive
/// windows sharing `overlap` chars.
///
/// Unlike [`chunk`], nothing is prepended afterwards, so every piece fits a
/// hard input limit.
pub fn split_to_limit(text: &str, max_chars: usize, overlap: usize) -> Vec<String> {
    let normalized = normalize_whitespace(text);
    if normalized.is_empty() {
        return Vec::new();
    }

    let max_chars = max_chars.max(1);
    if char_len(&normalized) <= max_chars {
        return vec![normalized];
    }

    hard_split(&normalized, max_chars, overlap.min(max_chars - 1))
}

/// Collapse runs of spaces/tabs to one space and runs of line breaks to one
/// newline. Newlines are kept as paragraph separators.
pub fn normalize_whitespace(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// First pass: chunk boundaries without any overlap.
pub(crate) fn pack(normalized: &str, target: usize, overlap: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for paragraph in normalized.split('\n') {
        if char_len(paragraph) > target {
            flush(&mut chunks, &mut current);
            chunks.extend(pack_sentences(paragraph, target, overlap));
            continue;
        }
        push_piece(&mut chunks, &mut current, paragraph, "\n", target);
    }

    flush(&mut chunks, &mut current);
    chunks
}

fn pack_sentences(paragraph: &str, target: usize, overlap: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for sentence in split_sentences(paragraph) {
        if char_len(sentence) > target {
            flush(&mut chunks, &mut current);
            chunks.extend(hard_split(sentence, target, overlap));
            continue;
        }
        push_piece(&mut chunks, &mut current, sentence, " ", target);
    }

    flush(&mut chunks, &mut current);
    chunks
}

/// Fixed-width slices with `overlap` chars shared between neighbours.
fn hard_split(sentence: &str, target: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = sentence.chars().collect();
    let step = target.saturating_sub(overlap).max(1);
    let mut slices = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + target).min(chars.len());
        let slice: String = chars[start..end].iter().collect();
        let slice = slice.trim();
        if !slice.is_empty() {
            slices.push(slice.to_string());
        }
        if end == chars.len() {
            break;
        }
        start += step;
    }

    slices
}

/// Split on `.`, `!` or `?` followed by whitespace. Terminators stay with
/// their sentence.
fn split_sentences(paragraph: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = paragraph.char_indices().peekable();

    while let Some((idx, ch)) = chars.next() {
        if !matches!(ch, '.' | '!' | '?') {
            continue;
        }
        if let Some(&(next_idx, next)) = chars.peek() {
            if next.is_whitespace() {
                let end = idx + ch.len_utf8();
                sentences.push(&paragraph[start..end]);
                start = next_idx;
            }
        }
    }

    if start < paragraph.len() {
        sentences.push(&paragraph[start..]);
    }

    sentences
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

fn push_piece(chunks: &mut Vec<String>, current: &mut String, piece: &str, sep: &str, target: usize) {
    if current.is_empty() {
        current.push_str(piece);
    } else if char_len(current) + char_len(sep) + char_len(piece) <= target {
        current.push_str(sep);
        current.push_str(piece);
    } else {
        flush(chunks, current);
        current.push_str(piece);
    }
}

fn flush(chunks: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
    current.clear();
}

/// Second pass: prefix every chunk after the first with the tail of the
/// previous (un-overlapped) chunk.
///
/// Only predecessors longer than `overlap` contribute. The prefix is skipped
/// when the chunk already starts with it.
pub(crate) fn apply_overlap(base: &[String], overlap: usize) -> Vec<String> {
    let mut result = Vec::with_capacity(base.len());

    for (i, current) in base.iter().enumerate() {
        if i == 0 || overlap == 0 {
            result.push(current.clone());
            continue;
        }

        match overlap_tail(&base[i - 1], overlap) {
            Some(tail) if !current.starts_with(tail) => {
                result.push(format!("{} {}", tail, current));
            }
            _ => result.push(current.clone()),
        }
    }

    result
}

/// Suffix of `prev` carried into the next chunk.
///
/// Takes the last `overlap` chars, then moves the start forward to just after
/// the last sentence end inside that window. Without a usable sentence end
/// the start moves to the next word boundary instead.
fn overlap_tail(prev: &str, overlap: usize) -> Option<&str> {
    let len = char_len(prev);
    if len <= overlap {
        return None;
    }

    let window_start = prev
        .char_indices()
        .nth(len - overlap)
        .map(|(idx, _)| idx)
        .unwrap_or(0);
    let window = &prev[window_start..];

    let sentence_cut = window
        .char_indices()
        .zip(window.chars().skip(1))
        .filter(|((_, ch), next)| matches!(ch, '.' | '!' | '?') && next.is_whitespace())
        .map(|((idx, ch), _)| idx + ch.len_utf8())
        .map(|cut| window[cut..].trim_start())
        .filter(|rest| !rest.is_empty())
        .last();

    let tail = match sentence_cut {
        Some(rest) => rest,
        None => match window.find(char::is_whitespace) {
            Some(ws) if !window[ws..].trim().is_empty() => window[ws..].trim_start(),
            _ => window,
        },
    };

    let tail = tail.trim_start();
    if tail.is_empty() {
        None
    } else {
        Some(tail)
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
