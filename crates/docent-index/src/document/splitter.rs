use super::types::{Chunk, Page};
use crate::error::IndexError;

#[derive(Debug, Clone)]
pub struct SplitterConfig {
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks of one page.
    pub chunk_overlap: usize,
    pub sentence_aware: bool,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1024,
            chunk_overlap: 64,
            sentence_aware: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TextSplitter {
    config: SplitterConfig,
}

impl TextSplitter {
    /// # Errors
    ///
    /// Returns [`IndexError::Config`] if `chunk_size` is zero or `chunk_overlap`
    /// is not smaller than `chunk_size`.
    pub fn new(config: SplitterConfig) -> Result<Self, IndexError> {
        if config.chunk_size == 0 {
            return Err(IndexError::Config("chunk_size must be greater than 0".into()));
        }
        if config.chunk_overlap >= config.chunk_size {
            return Err(IndexError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                config.chunk_overlap, config.chunk_size
            )));
        }
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &SplitterConfig {
        &self.config
    }

    /// Lazily split a page. The iterator can be cloned to restart from its
    /// current position.
    #[must_use]
    pub fn chunks<'a>(&self, page: &'a Page) -> Chunks<'a> {
        let text = page.content.as_str();
        let mut chars = Vec::with_capacity(text.len());
        let mut offsets = Vec::with_capacity(text.len() + 1);
        for (offset, c) in text.char_indices() {
            chars.push(c);
            offsets.push(offset);
        }
        offsets.push(text.len());

        Chunks {
            page,
            chars,
            offsets,
            size: self.config.chunk_size,
            overlap: self.config.chunk_overlap,
            sentence_aware: self.config.sentence_aware,
            start: 0,
            index: 0,
            done: text.trim().is_empty(),
        }
    }

    #[must_use]
    pub fn split(&self, page: &Page) -> Vec<Chunk> {
        self.chunks(page).collect()
    }
}

/// Iterator over the chunks of one page.
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    page: &'a Page,
    chars: Vec<char>,
    /// Byte offset of each char, plus the text length as the last element.
    offsets: Vec<usize>,
    size: usize,
    overlap: usize,
    sentence_aware: bool,
    start: usize,
    index: usize,
    done: bool,
}

impl Chunks<'_> {
    /// End (exclusive) of the chunk starting at `self.start` when the rest of
    /// the page does not fit. Always in `(start + overlap, start + size]`.
    fn find_cut(&self) -> usize {
        let hard = self.start + self.size;
        if !self.sentence_aware {
            return hard;
        }
        let lowest = self.start + self.overlap + 1;
        let c = &self.chars;

        let paragraph = (lowest.max(self.start + 2)..=hard)
            .rev()
            .find(|&p| c[p - 1] == '\n' && c[p - 2] == '\n');
        if let Some(p) = paragraph {
            return p;
        }

        let sentence = (lowest.max(self.start + 2)..=hard)
            .rev()
            .find(|&p| c[p - 1].is_whitespace() && matches!(c[p - 2], '.' | '?' | '!'));
        if let Some(p) = sentence {
            return p;
        }

        (lowest..=hard)
            .rev()
            .find(|&p| c[p - 1].is_whitespace())
            .unwrap_or(hard)
    }
}

impl Iterator for Chunks<'_> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.done {
            return None;
        }

        let total = self.chars.len();
        let end = if total - self.start <= self.size {
            self.done = true;
            total
        } else {
            self.find_cut()
        };

        let chunk = Chunk {
            content: self.page.content[self.offsets[self.start]..self.offsets[end]].to_owned(),
            metadata: self.page.metadata.clone(),
            chunk_index: self.index,
        };
        self.index += 1;
        if !self.done {
            self.start = end - self.overlap;
        }
        Some(chunk)
    }
}
