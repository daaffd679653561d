//! Word buffers: borrowed module views and the pooled growable writer.
//!
//! Readers never copy; they wrap a word slice that something else owns and
//! split it into the 5-word header and the instruction body. The writer owns
//! its backing store, borrowed from a lock-free pool so that repeated
//! compilations reuse the same allocations. Dropping a writer returns its
//! store to the pool on every exit path.

use crossbeam::queue::ArrayQueue;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::format::{pack_word0, ModuleHeader, Op, HEADER_WORDS, MAGIC};
use super::ModuleError;

/// Default capacity (in words) of a pooled backing store.
pub const DEFAULT_STORE_WORDS: usize = 1024;

fn check_header(words: &[u32]) -> Result<(), ModuleError> {
    if words.len() < HEADER_WORDS {
        return Err(ModuleError::MalformedHeader {
            reason: format!(
                "module has {} words, a header alone is {}",
                words.len(),
                HEADER_WORDS
            ),
        });
    }
    if words[0] != MAGIC {
        return Err(ModuleError::MalformedHeader {
            reason: format!("bad magic {:#010x}, expected {:#010x}", words[0], MAGIC),
        });
    }
    Ok(())
}

/// Read-only view over an existing word sequence.
#[derive(Debug, Clone, Copy)]
pub struct ModuleBuffer<'a> {
    words: &'a [u32],
}

impl<'a> ModuleBuffer<'a> {
    /// Wrap a word slice, validating the header.
    pub fn new(words: &'a [u32]) -> Result<Self, ModuleError> {
        check_header(words)?;
        Ok(Self { words })
    }

    pub fn header(&self) -> ModuleHeader {
        ModuleHeader::from_words(self.words)
    }

    /// Instruction words after the header.
    pub fn body(&self) -> &'a [u32] {
        &self.words[HEADER_WORDS..]
    }

    pub fn words(&self) -> &'a [u32] {
        self.words
    }

    pub fn bound(&self) -> u32 {
        self.words[3]
    }
}

/// Mutable view over an existing word sequence, for in-place passes.
#[derive(Debug)]
pub struct ModuleBufferMut<'a> {
    words: &'a mut [u32],
}

impl<'a> ModuleBufferMut<'a> {
    pub fn new(words: &'a mut [u32]) -> Result<Self, ModuleError> {
        check_header(words)?;
        Ok(Self { words })
    }

    pub fn header(&self) -> ModuleHeader {
        ModuleHeader::from_words(self.words)
    }

    pub fn set_bound(&mut self, bound: u32) {
        self.words[3] = bound;
    }

    pub fn body_mut(&mut self) -> &mut [u32] {
        &mut self.words[HEADER_WORDS..]
    }

    pub fn words(&self) -> &[u32] {
        self.words
    }
}

/// Internal pool state
struct WordPoolInner {
    /// Free list of cleared backing stores
    free_list: ArrayQueue<Vec<u32>>,
    /// Capacity pre-reserved for fresh stores
    store_words: usize,
    /// Number of stores currently held by writers
    in_use: AtomicUsize,
}

impl WordPoolInner {
    fn acquire(self: &Arc<Self>) -> Vec<u32> {
        self.in_use.fetch_add(1, Ordering::Relaxed);
        self.free_list
            .pop()
            .unwrap_or_else(|| Vec::with_capacity(self.store_words))
    }

    fn release(&self, mut store: Vec<u32>) {
        store.clear();
        let _ = self.free_list.push(store);
        self.in_use.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Pool of writer backing stores.
///
/// Unlike a fixed arena, exhaustion never fails an acquire: an empty free
/// list just allocates a fresh store, and surplus stores are dropped when
/// they come back to a full list.
pub struct WordPool {
    inner: Arc<WordPoolInner>,
}

impl WordPool {
    /// Create a pool that retains up to `count` idle stores.
    pub fn new(count: usize) -> Self {
        Self::with_store_words(count, DEFAULT_STORE_WORDS)
    }

    /// Create a pool with a custom initial store capacity.
    pub fn with_store_words(count: usize, store_words: usize) -> Self {
        Self {
            inner: Arc::new(WordPoolInner {
                free_list: ArrayQueue::new(count.max(1)),
                store_words,
                in_use: AtomicUsize::new(0),
            }),
        }
    }

    /// Acquire a writer backed by this pool.
    pub fn acquire(&self) -> ModuleWriter {
        ModuleWriter {
            words: self.inner.acquire(),
            pool: Some(Arc::clone(&self.inner)),
        }
    }

    /// Number of stores currently held by writers.
    pub fn in_use(&self) -> usize {
        self.inner.in_use.load(Ordering::Relaxed)
    }

    /// Number of idle stores ready for reuse.
    pub fn idle(&self) -> usize {
        self.inner.free_list.len()
    }
}

impl Default for WordPool {
    fn default() -> Self {
        Self::new(16)
    }
}

/// Growable word writer. Appends amortize to O(1); the store doubles as it
/// fills, so a long emission never reallocates per word.
pub struct ModuleWriter {
    words: Vec<u32>,
    pool: Option<Arc<WordPoolInner>>,
}

impl ModuleWriter {
    /// Create a writer with its own unpooled store.
    pub fn new() -> Self {
        Self {
            words: Vec::with_capacity(DEFAULT_STORE_WORDS),
            pool: None,
        }
    }

    pub fn push(&mut self, word: u32) {
        self.words.push(word);
    }

    pub fn extend(&mut self, words: &[u32]) {
        self.words.extend_from_slice(words);
    }

    /// Append one encoded instruction: word 0 is packed from the opcode and
    /// the total word count, then result type, result id and operands in
    /// declaration order.
    pub fn instruction(
        &mut self,
        op: Op,
        result_type: Option<u32>,
        result: Option<u32>,
        operands: &[u32],
    ) {
        let word_count =
            1 + result_type.is_some() as usize + result.is_some() as usize + operands.len();
        debug_assert!(word_count <= u16::MAX as usize);
        self.words.push(pack_word0(op as u16, word_count as u16));
        if let Some(ty) = result_type {
            self.words.push(ty);
        }
        if let Some(id) = result {
            self.words.push(id);
        }
        self.words.extend_from_slice(operands);
    }

    /// Write the 5-word module header with a placeholder bound; pair with
    /// [`finish`](Self::finish) once the final bound is known.
    pub fn begin_module(&mut self) {
        self.words.extend_from_slice(&ModuleHeader::new(0).to_words());
    }

    /// Patch the header bound and hand back the finished words.
    pub fn finish(&mut self, bound: u32) -> &[u32] {
        debug_assert!(self.words.len() >= HEADER_WORDS);
        self.words[3] = bound;
        &self.words
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Take ownership of the words, detaching them from the pool.
    pub fn into_words(mut self) -> Vec<u32> {
        self.pool = None;
        std::mem::take(&mut self.words)
    }
}

impl Default for ModuleWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ModuleWriter {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.release(std::mem::take(&mut self.words));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::format::unpack_word0;

    #[test]
    fn test_header_validation() {
        let short = [MAGIC, 0, 0];
        assert!(matches!(
            ModuleBuffer::new(&short),
            Err(ModuleError::MalformedHeader { .. })
        ));

        let bad_magic = [0xDEAD_BEEF, 0x0001_0000, 0, 10, 0];
        assert!(matches!(
            ModuleBuffer::new(&bad_magic),
            Err(ModuleError::MalformedHeader { .. })
        ));

        let ok = [MAGIC, 0x0001_0000, 0, 10, 0];
        let buf = ModuleBuffer::new(&ok).unwrap();
        assert_eq!(buf.bound(), 10);
        assert!(buf.body().is_empty());
    }

    #[test]
    fn test_mutable_bound_patch() {
        let mut words = vec![MAGIC, 0x0001_0000, 0, 10, 0];
        let mut buf = ModuleBufferMut::new(&mut words).unwrap();
        buf.set_bound(42);
        assert_eq!(buf.header().bound, 42);
    }

    #[test]
    fn test_writer_instruction_packing() {
        let mut writer = ModuleWriter::new();
        writer.instruction(Op::IAdd, Some(1), Some(2), &[3, 4]);
        let words = writer.words();
        let (opcode, word_count) = unpack_word0(words[0]);
        assert_eq!(opcode, Op::IAdd as u16);
        assert_eq!(word_count, 5);
        assert_eq!(&words[1..], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_writer_finish_patches_bound() {
        let mut writer = ModuleWriter::new();
        writer.begin_module();
        writer.instruction(Op::Capability, None, None, &[1]);
        let words = writer.finish(99);
        assert_eq!(words[0], MAGIC);
        assert_eq!(words[3], 99);
        ModuleBuffer::new(words).unwrap();
    }

    #[test]
    fn test_pool_reuse() {
        let pool = WordPool::new(4);
        assert_eq!(pool.idle(), 0);

        let mut writer = pool.acquire();
        assert_eq!(pool.in_use(), 1);
        writer.push(7);
        drop(writer);

        assert_eq!(pool.in_use(), 0);
        assert_eq!(pool.idle(), 1);

        // The recycled store comes back empty.
        let writer = pool.acquire();
        assert!(writer.is_empty());
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn test_pool_never_fails_acquire() {
        let pool = WordPool::new(1);
        let a = pool.acquire();
        let b = pool.acquire();
        assert_eq!(pool.in_use(), 2);
        drop(a);
        drop(b);
        // One store is retained, the surplus is dropped.
        assert_eq!(pool.idle(), 1);
    }
}
