//! Streaming text chunker
//!
//! Accumulates incremental text deltas and decides where to release a chunk
//! for speech synthesis. The first chunk uses tighter thresholds so audio
//! starts as soon as a speakable fragment exists; later chunks wait for
//! punctuation boundaries to keep prosody natural.
//!
//! Lengths and positions are counted in Unicode scalar values, so a chunk
//! boundary can never split a multi-byte character.

/// One unit of text released for synthesis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub text: String,
    /// True only for the first chunk released since construction or
    /// [`TextBuffer::clear`].
    pub is_first: bool,
}

/// Sentence terminators: a boundary when immediately followed by whitespace.
const SENTENCE_MARKS: [char; 3] = ['.', '!', '?'];

/// Clause separators: a weaker boundary, honored only once the buffer is
/// long enough to stand alone as a spoken phrase.
const CLAUSE_MARKS: [char; 3] = [',', ':', ';'];

/// Stateful flush-decision engine for streamed text.
///
/// Feed deltas with [`add`](TextBuffer::add); each call may return the
/// buffered text as one chunk. Call [`force_flush`](TextBuffer::force_flush)
/// at end of stream to drain the remainder, and
/// [`clear`](TextBuffer::clear) between spoken sessions.
#[derive(Debug)]
pub struct TextBuffer {
    buffer: String,
    first_chunk: bool,
}

impl TextBuffer {
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            first_chunk: true,
        }
    }

    /// Append a delta and release the buffer as a chunk if a boundary was
    /// reached.
    pub fn add(&mut self, fragment: &str) -> Option<TextChunk> {
        self.buffer.push_str(fragment);
        if self.should_flush() {
            Some(self.flush())
        } else {
            None
        }
    }

    /// Release the current buffer verbatim and clear it.
    ///
    /// The first non-empty flush clears the first-chunk flag.
    pub fn flush(&mut self) -> TextChunk {
        let text = std::mem::take(&mut self.buffer);
        let is_first = self.first_chunk;
        if !text.is_empty() {
            self.first_chunk = false;
        }
        TextChunk { text, is_first }
    }

    /// Drain whatever remains at end of stream.
    ///
    /// An already-empty buffer yields a chunk with an empty string and no
    /// other effect.
    pub fn force_flush(&mut self) -> TextChunk {
        self.flush()
    }

    /// Discard buffered text without emitting and restore first-chunk
    /// behavior for the next session.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.first_chunk = true;
    }

    /// Buffered length in characters.
    pub fn len(&self) -> usize {
        self.buffer.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    fn should_flush(&self) -> bool {
        let len = self.len();
        let (max_chars, min_chars) = if self.first_chunk { (20, 5) } else { (40, 20) };

        if len >= max_chars {
            return true;
        }

        if len >= min_chars {
            if has_mark_before_whitespace(&self.buffer, &SENTENCE_MARKS) {
                return true;
            }
            if len >= 20 && has_mark_before_whitespace(&self.buffer, &CLAUSE_MARKS) {
                return true;
            }
        }

        // First chunk only: release early on any word boundary so speech
        // starts before the first punctuation arrives.
        if self.first_chunk && len >= 5 {
            if len >= 8 {
                return true;
            }
            if self
                .buffer
                .chars()
                .enumerate()
                .any(|(i, c)| i > 3 && c == ' ')
            {
                return true;
            }
        }

        false
    }
}

impl Default for TextBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// True if any of `marks` occurs immediately followed by whitespace.
fn has_mark_before_whitespace(text: &str, marks: &[char]) -> bool {
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if marks.contains(&c) {
            if let Some(next) = chars.peek() {
                if next.is_whitespace() {
                    return true;
                }
            }
        }
    }
    false
}
