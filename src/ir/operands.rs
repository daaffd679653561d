//! Operand enumeration: walking one instruction's words against its grammar.
//!
//! The iterator keeps two cursors, one into the schema slots and one into
//! the operand words, and advances them together. String operands are
//! scanned for their terminating word, pair kinds eat two words at once,
//! optional slots consume only when words remain, and a trailing
//! zero-or-more slot is revisited until the words run out.
//!
//! `OpDecorate`/`OpMemberDecorate` append a data-dependent tail: once the
//! decoration enumerant is decoded, the slots that follow come from
//! [`decoration_operands`](super::schema::decoration_operands). An unknown
//! enumerant is a malformed operand, because without it the remaining words
//! cannot be classified.
//!
//! Each yielded operand is a named span of the original words. Failures are
//! lazy: operands before the malformed one are yielded normally.

use super::format::{Decoration, Op};
use super::reader::Instr;
use super::schema::{schema, EnumClass, OperandKind, OperandSlot, Quantifier};
use super::ModuleError;

/// One decoded operand: a named span of instruction words.
#[derive(Debug, Clone, Copy)]
pub struct Operand<'a> {
    pub name: &'static str,
    pub kind: OperandKind,
    /// Word offset within the instruction, word 0 included.
    pub offset: usize,
    words: &'a [u32],
}

/// Decoded payload of an operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperandValue {
    Id(u32),
    Literal(u32),
    Enum(u32),
    String(String),
    Pair(u32, u32),
}

impl<'a> Operand<'a> {
    /// The raw word span. Concatenating the spans of every operand
    /// reproduces the instruction's operand words byte for byte.
    pub fn words(&self) -> &'a [u32] {
        self.words
    }

    pub fn value(&self) -> OperandValue {
        match self.kind {
            OperandKind::IdRef => OperandValue::Id(self.words[0]),
            OperandKind::LiteralInt => OperandValue::Literal(self.words[0]),
            OperandKind::ValueEnum(_) => OperandValue::Enum(self.words[0]),
            OperandKind::LiteralString => OperandValue::String(decode_string(self.words)),
            OperandKind::PairIdRefLiteral
            | OperandKind::PairLiteralIdRef
            | OperandKind::PairIdRefIdRef => OperandValue::Pair(self.words[0], self.words[1]),
        }
    }
}

/// Unpack a NUL-terminated string from its words, 4 bytes per word,
/// low byte first.
pub fn decode_string(words: &[u32]) -> String {
    let mut bytes = Vec::with_capacity(words.len() * 4);
    'outer: for word in words {
        for shift in [0, 8, 16, 24] {
            let byte = ((word >> shift) & 0xFF) as u8;
            if byte == 0 {
                break 'outer;
            }
            bytes.push(byte);
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Pack a string into NUL-terminated words. The terminator always fits: a
/// string filling its last word exactly gets one extra all-zero word.
pub fn encode_string(s: &str) -> Vec<u32> {
    let bytes = s.as_bytes();
    let mut words = Vec::with_capacity(bytes.len() / 4 + 1);
    for chunk in bytes.chunks(4) {
        let mut word = 0u32;
        for (i, &b) in chunk.iter().enumerate() {
            word |= (b as u32) << (i * 8);
        }
        words.push(word);
    }
    if bytes.len() % 4 == 0 {
        words.push(0);
    }
    words
}

impl<'a> Instr<'a> {
    /// Walk this instruction's operands against its grammar. None when the
    /// opcode is outside the known subset.
    pub fn operand_iter(&self) -> Option<OperandIter<'a>> {
        let op = self.opcode?;
        let s = schema(op)?;
        let skip = 1 + s.has_result_type as usize + s.has_result as usize;
        Some(OperandIter {
            op,
            slots: s.operands,
            words: self.operands(),
            base: skip,
            slot_index: 0,
            cursor: 0,
            done: false,
        })
    }
}

/// Lazy operand walk over one instruction.
pub struct OperandIter<'a> {
    op: Op,
    slots: &'static [OperandSlot],
    words: &'a [u32],
    /// Word offset of the first operand within the instruction.
    base: usize,
    slot_index: usize,
    cursor: usize,
    done: bool,
}

impl<'a> OperandIter<'a> {
    fn fail(&mut self, reason: String) -> Option<Result<Operand<'a>, ModuleError>> {
        self.done = true;
        Some(Err(ModuleError::MalformedOperand {
            offset: self.base + self.cursor,
            reason,
        }))
    }

    /// Consume one operand of `slot`'s kind at the cursor.
    fn take(&mut self, slot: &OperandSlot) -> Result<Operand<'a>, String> {
        let start = self.cursor;
        let width = match slot.kind.width() {
            Some(width) => {
                if start + width > self.words.len() {
                    return Err(format!(
                        "operand '{}' needs {} words, {} remain",
                        slot.name,
                        width,
                        self.words.len() - start
                    ));
                }
                width
            }
            None => {
                // String: include the first word holding a NUL byte.
                let mut end = start;
                loop {
                    if end >= self.words.len() {
                        return Err(format!("string operand '{}' never terminates", slot.name));
                    }
                    let word = self.words[end];
                    end += 1;
                    if word.to_le_bytes().contains(&0) {
                        break;
                    }
                }
                end - start
            }
        };
        self.cursor = start + width;
        Ok(Operand {
            name: slot.name,
            kind: slot.kind,
            offset: self.base + start,
            words: &self.words[start..start + width],
        })
    }

    /// Swap in the decoration-dependent tail once the enumerant is known.
    fn enter_decoration(&mut self, value: u32) -> Result<(), String> {
        let decoration = Decoration::from_u32(value)
            .ok_or_else(|| format!("unknown decoration enumerant {}", value))?;
        self.slots = super::schema::decoration_operands(decoration);
        self.slot_index = 0;
        Ok(())
    }
}

impl<'a> Iterator for OperandIter<'a> {
    type Item = Result<Operand<'a>, ModuleError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            let Some(slot) = self.slots.get(self.slot_index).copied() else {
                if self.cursor < self.words.len() {
                    let left = self.words.len() - self.cursor;
                    return self.fail(format!("{} words left over after the last operand", left));
                }
                self.done = true;
                return None;
            };

            match slot.quantifier {
                Quantifier::One => {
                    let operand = match self.take(&slot) {
                        Ok(operand) => operand,
                        Err(reason) => return self.fail(reason),
                    };
                    self.slot_index += 1;
                    if decorates(self.op, &slot) {
                        if let Err(reason) = self.enter_decoration(operand.words()[0]) {
                            return self.fail(reason);
                        }
                    }
                    return Some(Ok(operand));
                }
                Quantifier::ZeroOrOne => {
                    if self.cursor >= self.words.len() {
                        self.slot_index += 1;
                        continue;
                    }
                    let operand = match self.take(&slot) {
                        Ok(operand) => operand,
                        Err(reason) => return self.fail(reason),
                    };
                    self.slot_index += 1;
                    return Some(Ok(operand));
                }
                Quantifier::ZeroOrMore => {
                    if self.cursor >= self.words.len() {
                        self.done = true;
                        return None;
                    }
                    // Stay on this slot; it repeats until the words run out.
                    let operand = match self.take(&slot) {
                        Ok(operand) => operand,
                        Err(reason) => return self.fail(reason),
                    };
                    return Some(Ok(operand));
                }
            }
        }
    }
}

/// Is this slot the decoration enumerant that re-shapes the tail?
fn decorates(op: Op, slot: &OperandSlot) -> bool {
    matches!(op, Op::Decorate | Op::MemberDecorate)
        && slot.kind == OperandKind::ValueEnum(EnumClass::Decoration)
}
