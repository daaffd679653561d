//! Instruction enumeration over module bodies.
//!
//! Four ways to walk the same words:
//!
//! - [`SequentialIter`]: front to back, one pass, zero allocation.
//! - [`OrderedIter`]: canonical layout order. Finds the lowest layout
//!   section present, drains it front to back (stable within the section),
//!   then rescans for the next nonempty section, up to
//!   [`MAX_SECTION`](super::format::MAX_SECTION). O(n * sections) by
//!   construction; module prefixes are small enough that the rescan is
//!   cheaper than sorting a side table.
//! - [`FunctionIter`]: from a given `OpFunction` offset through the matching
//!   `OpFunctionEnd`.
//! - [`SequentialIterMut`] / [`FunctionIterMut`]: exclusive-borrow variants
//!   yielding mutable instruction views for in-place passes such as id
//!   renumbering. Taking the iterator borrows the buffer mutably, so no
//!   reader can observe a half-edited module.
//!
//! Malformed instructions (zero word count, span past the end of the
//! buffer) are reported lazily, when the enumerator reaches them, and fuse
//! the iterator.

use super::format::{unpack_word0, LayoutSection, Op, StorageClass};
use super::schema::schema;
use super::{ModuleBuffer, ModuleError};

/// Borrowed view of one instruction.
#[derive(Debug, Clone, Copy)]
pub struct Instr<'a> {
    /// Word offset within the enumerated body.
    pub offset: usize,
    /// Opcode as encoded; kept even when outside the known subset.
    pub raw_opcode: u16,
    /// Decoded opcode, None when unknown.
    pub opcode: Option<Op>,
    pub word_count: u16,
    words: &'a [u32],
}

fn decode_word0(body: &[u32], offset: usize) -> Result<(u16, u16), ModuleError> {
    let (raw_opcode, word_count) = unpack_word0(body[offset]);
    if word_count == 0 {
        return Err(ModuleError::MalformedInstruction {
            offset,
            reason: "zero word count".into(),
        });
    }
    if offset + word_count as usize > body.len() {
        return Err(ModuleError::MalformedInstruction {
            offset,
            reason: format!(
                "word count {} runs past the end of the buffer",
                word_count
            ),
        });
    }
    Ok((raw_opcode, word_count))
}

impl<'a> Instr<'a> {
    fn decode(body: &'a [u32], offset: usize) -> Result<Self, ModuleError> {
        let (raw_opcode, word_count) = decode_word0(body, offset)?;
        Ok(Self {
            offset,
            raw_opcode,
            opcode: Op::from_u16(raw_opcode),
            word_count,
            words: &body[offset..offset + word_count as usize],
        })
    }

    /// The full instruction span, word 0 included.
    pub fn words(&self) -> &'a [u32] {
        self.words
    }

    /// None when the opcode declares no result type, or when the encoded
    /// word count is too short to hold it.
    pub fn result_type(&self) -> Option<u32> {
        let s = self.opcode.and_then(schema)?;
        if !s.has_result_type {
            return None;
        }
        self.words.get(1).copied()
    }

    /// None when the opcode declares no result id, or when the encoded
    /// word count is too short to hold it.
    pub fn result_id(&self) -> Option<u32> {
        let s = self.opcode.and_then(schema)?;
        if !s.has_result {
            return None;
        }
        self.words.get(1 + s.has_result_type as usize).copied()
    }

    /// Operand words after the result ids. For opcodes without a schema the
    /// whole tail after word 0 is treated as operands.
    pub fn operands(&self) -> &'a [u32] {
        let skip = match self.opcode.and_then(schema) {
            Some(s) => 1 + s.has_result_type as usize + s.has_result as usize,
            None => 1,
        };
        &self.words[skip.min(self.words.len())..]
    }

    /// Layout sort key: section in the high byte, storage-class tiebreak for
    /// global variables in the low byte. Unknown opcodes sort with function
    /// bodies so a reorder never hoists them above the module prefix.
    pub fn sort_key(&self) -> u16 {
        let section = match self.opcode {
            Some(op) => op.section(),
            None => LayoutSection::Functions,
        };
        if self.opcode == Some(Op::Variable) && section == LayoutSection::Globals {
            let storage = self.operands().first().copied().unwrap_or(0);
            if StorageClass::from_u32(storage) == Some(StorageClass::Function) {
                return (LayoutSection::Functions as u16) << 8;
            }
            return ((LayoutSection::Globals as u16) << 8) | ((storage as u16 + 1) & 0xFF);
        }
        (section as u16) << 8
    }
}

impl<'a> ModuleBuffer<'a> {
    /// Enumerate the body front to back.
    pub fn instructions(&self) -> SequentialIter<'a> {
        SequentialIter::new(self.body())
    }

    /// Enumerate the body in canonical layout order.
    pub fn instructions_ordered(&self) -> OrderedIter<'a> {
        OrderedIter::new(self.body())
    }

    /// Enumerate one function, starting at `offset` (an `OpFunction`)
    /// within the body.
    pub fn function_at(&self, offset: usize) -> FunctionIter<'a> {
        FunctionIter::new(self.body(), offset)
    }
}

/// Front-to-back instruction walk.
pub struct SequentialIter<'a> {
    body: &'a [u32],
    cursor: usize,
    done: bool,
}

impl<'a> SequentialIter<'a> {
    pub fn new(body: &'a [u32]) -> Self {
        Self {
            body,
            cursor: 0,
            done: false,
        }
    }
}

impl<'a> Iterator for SequentialIter<'a> {
    type Item = Result<Instr<'a>, ModuleError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.cursor >= self.body.len() {
            return None;
        }
        match Instr::decode(self.body, self.cursor) {
            Ok(instr) => {
                self.cursor += instr.word_count as usize;
                Some(Ok(instr))
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

/// Canonical-layout instruction walk.
///
/// Stability: two instructions with the same sort key are yielded in their
/// original relative order, because each section is drained by a single
/// forward scan.
pub struct OrderedIter<'a> {
    body: &'a [u32],
    current_key: Option<u16>,
    cursor: usize,
    done: bool,
}

impl<'a> OrderedIter<'a> {
    pub fn new(body: &'a [u32]) -> Self {
        Self {
            body,
            current_key: None,
            cursor: 0,
            done: false,
        }
    }

    /// Smallest sort key strictly greater than `above` present in the body.
    fn next_key(&self, above: Option<u16>) -> Result<Option<u16>, ModuleError> {
        let mut best: Option<u16> = None;
        let mut cursor = 0;
        while cursor < self.body.len() {
            let instr = Instr::decode(self.body, cursor)?;
            let key = instr.sort_key();
            if above.map_or(true, |a| key > a) && best.map_or(true, |b| key < b) {
                best = Some(key);
            }
            cursor += instr.word_count as usize;
        }
        Ok(best)
    }
}

impl<'a> Iterator for OrderedIter<'a> {
    type Item = Result<Instr<'a>, ModuleError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            let key = match self.current_key {
                Some(key) => key,
                None => match self.next_key(None) {
                    Ok(Some(key)) => {
                        self.current_key = Some(key);
                        key
                    }
                    Ok(None) => {
                        self.done = true;
                        return None;
                    }
                    Err(err) => {
                        self.done = true;
                        return Some(Err(err));
                    }
                },
            };

            // Drain the current section with a forward scan.
            while self.cursor < self.body.len() {
                let instr = match Instr::decode(self.body, self.cursor) {
                    Ok(instr) => instr,
                    Err(err) => {
                        self.done = true;
                        return Some(Err(err));
                    }
                };
                self.cursor += instr.word_count as usize;
                if instr.sort_key() == key {
                    return Some(Ok(instr));
                }
            }

            // Section exhausted; rescan for the next one.
            match self.next_key(Some(key)) {
                Ok(Some(next)) => {
                    self.current_key = Some(next);
                    self.cursor = 0;
                }
                Ok(None) => {
                    self.done = true;
                    return None;
                }
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            }
        }
    }
}

/// Walk of a single function body, `OpFunction` through `OpFunctionEnd`.
pub struct FunctionIter<'a> {
    body: &'a [u32],
    cursor: usize,
    done: bool,
}

impl<'a> FunctionIter<'a> {
    pub fn new(body: &'a [u32], start: usize) -> Self {
        Self {
            body,
            cursor: start,
            done: false,
        }
    }
}

impl<'a> Iterator for FunctionIter<'a> {
    type Item = Result<Instr<'a>, ModuleError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.cursor >= self.body.len() {
            return None;
        }
        match Instr::decode(self.body, self.cursor) {
            Ok(instr) => {
                self.cursor += instr.word_count as usize;
                if instr.opcode == Some(Op::FunctionEnd) {
                    self.done = true;
                }
                Some(Ok(instr))
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

/// Mutable view of one instruction.
#[derive(Debug)]
pub struct InstrMut<'a> {
    /// Word offset within the enumerated body.
    pub offset: usize,
    pub raw_opcode: u16,
    pub opcode: Option<Op>,
    pub word_count: u16,
    words: &'a mut [u32],
}

impl<'a> InstrMut<'a> {
    pub fn words(&self) -> &[u32] {
        self.words
    }

    /// The full instruction span for in-place edits. Word 0 is included;
    /// rewriting it changes what later passes see, not this one.
    pub fn words_mut(&mut self) -> &mut [u32] {
        self.words
    }

    /// None when the opcode declares no result id, or when the encoded
    /// word count is too short to hold it.
    pub fn result_id(&self) -> Option<u32> {
        let s = self.opcode.and_then(schema)?;
        if !s.has_result {
            return None;
        }
        self.words.get(1 + s.has_result_type as usize).copied()
    }

    /// Rewrite the result id, if this opcode declares one and the encoded
    /// word count holds it.
    pub fn set_result_id(&mut self, id: u32) {
        if let Some(s) = self.opcode.and_then(schema) {
            if s.has_result {
                if let Some(slot) = self.words.get_mut(1 + s.has_result_type as usize) {
                    *slot = id;
                }
            }
        }
    }
}

fn next_mut<'a>(
    rest: &mut &'a mut [u32],
    offset: &mut usize,
    done: &mut bool,
) -> Option<Result<InstrMut<'a>, ModuleError>> {
    if *done || rest.is_empty() {
        return None;
    }
    let taken = std::mem::take(rest);
    let (raw_opcode, word_count) = match decode_word0(taken, 0) {
        Ok(decoded) => decoded,
        Err(mut err) => {
            // Rebase the error offset onto the full body.
            if let ModuleError::MalformedInstruction {
                offset: ref mut o, ..
            } = err
            {
                *o = *offset;
            }
            *done = true;
            return Some(Err(err));
        }
    };
    let (head, tail) = taken.split_at_mut(word_count as usize);
    *rest = tail;
    let at = *offset;
    *offset += word_count as usize;
    Some(Ok(InstrMut {
        offset: at,
        raw_opcode,
        opcode: Op::from_u16(raw_opcode),
        word_count,
        words: head,
    }))
}

/// Mutable front-to-back walk. Splits the body into disjoint spans, so each
/// yielded instruction owns its words for the iterator's lifetime.
pub struct SequentialIterMut<'a> {
    rest: &'a mut [u32],
    offset: usize,
    done: bool,
}

impl<'a> SequentialIterMut<'a> {
    pub fn new(body: &'a mut [u32]) -> Self {
        Self {
            rest: body,
            offset: 0,
            done: false,
        }
    }
}

impl<'a> Iterator for SequentialIterMut<'a> {
    type Item = Result<InstrMut<'a>, ModuleError>;

    fn next(&mut self) -> Option<Self::Item> {
        next_mut(&mut self.rest, &mut self.offset, &mut self.done)
    }
}

/// Mutable walk of a single function body.
pub struct FunctionIterMut<'a> {
    rest: &'a mut [u32],
    offset: usize,
    done: bool,
}

impl<'a> FunctionIterMut<'a> {
    /// `start` is the word offset of the `OpFunction` within `body`.
    pub fn new(body: &'a mut [u32], start: usize) -> Self {
        let start = start.min(body.len());
        Self {
            rest: &mut body[start..],
            offset: start,
            done: false,
        }
    }
}

impl<'a> Iterator for FunctionIterMut<'a> {
    type Item = Result<InstrMut<'a>, ModuleError>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = next_mut(&mut self.rest, &mut self.offset, &mut self.done);
        if let Some(Ok(ref instr)) = item {
            if instr.opcode == Some(Op::FunctionEnd) {
                self.done = true;
            }
        }
        item
    }
}
