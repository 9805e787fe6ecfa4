//! Chunking: group the block sequence into word-bounded translation units.
//!
//! Rules, applied per block in order:
//!
//! 1. A major heading closes the current chunk (if non-empty) and starts a
//!    new one.
//! 2. The block is appended; images add no words.
//! 3. If the running word count reached the threshold and the block just
//!    appended is neither a heading nor an image, the chunk closes.
//!
//! Rule 3 never fires on a heading, so a chunk never ends with a heading
//! whose body has not been attached yet.

use crate::error::TranslateError;
use crate::model::{Block, BlockKind, Chunk};

/// Incremental chunk builder. Feed blocks with [`push`](Self::push), then
/// collect the tail with [`finish`](Self::finish).
#[derive(Debug)]
pub struct ChunkBuilder {
    max_words: usize,
    current: Vec<Block>,
    words: usize,
}

impl ChunkBuilder {
    pub fn new(max_words: usize) -> Self {
        Self {
            max_words,
            current: Vec::new(),
            words: 0,
        }
    }

    /// Add a block. Returns at most one completed chunk: rules 1 and 3 can
    /// not both close a chunk for the same block, because a major heading
    /// never triggers rule 3.
    pub fn push(&mut self, block: Block) -> Option<Chunk> {
        let mut closed = None;
        if block.kind == BlockKind::HeadingMajor && !self.current.is_empty() {
            closed = self.take();
        }

        let kind = block.kind;
        self.words += block.word_count();
        self.current.push(block);

        if self.words >= self.max_words && !kind.is_heading() && kind != BlockKind::Image {
            debug_assert!(closed.is_none());
            closed = self.take();
        }
        closed
    }

    /// The final partial chunk, if any blocks remain.
    pub fn finish(mut self) -> Option<Chunk> {
        self.take()
    }

    fn take(&mut self) -> Option<Chunk> {
        self.words = 0;
        if self.current.is_empty() {
            None
        } else {
            Some(Chunk::new(std::mem::take(&mut self.current)))
        }
    }
}

/// Lazy chunk sequence over a block iterator.
pub struct Chunker<I> {
    blocks: I,
    builder: Option<ChunkBuilder>,
}

impl<I: Iterator<Item = Block>> Chunker<I> {
    pub fn new(blocks: I, max_words: usize) -> Self {
        Self {
            blocks,
            builder: Some(ChunkBuilder::new(max_words)),
        }
    }
}

impl<I: Iterator<Item = Block>> Iterator for Chunker<I> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        let builder = self.builder.as_mut()?;
        for block in self.blocks.by_ref() {
            if let Some(chunk) = builder.push(block) {
                return Some(chunk);
            }
        }
        self.builder.take().and_then(ChunkBuilder::finish)
    }
}

/// Chunk a fallible block sequence, stopping at the first error.
pub fn chunk_blocks<I>(blocks: I, max_words: usize) -> Result<Vec<Chunk>, TranslateError>
where
    I: IntoIterator<Item = Result<Block, TranslateError>>,
{
    let mut builder = ChunkBuilder::new(max_words);
    let mut chunks = Vec::new();
    for block in blocks {
        chunks.extend(builder.push(block?));
    }
    chunks.extend(builder.finish());
    Ok(chunks)
}
