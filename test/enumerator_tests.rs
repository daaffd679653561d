//! Integration tests for module enumeration
//!
//! Covers the four enumeration orders over real module layouts: sequential,
//! layout-ordered, function-bounded, and the exclusive-borrow variants.

use spvir::ir::{ModuleBuffer, ModuleBufferMut, ModuleError, ModuleWriter, Op, SequentialIterMut};

fn module(build: impl FnOnce(&mut ModuleWriter)) -> Vec<u32> {
    let mut writer = ModuleWriter::new();
    writer.begin_module();
    build(&mut writer);
    writer.finish(100).to_vec()
}

/// A small but representative layout: one capability, a decoration, types,
/// one global, and a function with two instructions inside it.
fn compute_module() -> Vec<u32> {
    module(|w| {
        w.instruction(Op::Capability, None, None, &[1]);
        w.instruction(Op::Decorate, None, None, &[6, 33, 0]);
        w.instruction(Op::TypeVoid, None, Some(2), &[]);
        w.instruction(Op::TypeFunction, None, Some(3), &[2]);
        w.instruction(Op::Variable, Some(4), Some(6), &[2]);
        w.instruction(Op::Function, Some(2), Some(5), &[0, 3]);
        w.instruction(Op::Label, None, Some(7), &[]);
        w.instruction(Op::Return, None, None, &[]);
        w.instruction(Op::FunctionEnd, None, None, &[]);
    })
}

// ============================================================================
// Sequential enumeration
// ============================================================================

#[test]
fn test_word_counts_sum_to_the_body_length() {
    let words = compute_module();
    let buffer = ModuleBuffer::new(&words).unwrap();
    let total: usize = buffer
        .instructions()
        .map(|r| r.unwrap().word_count as usize)
        .sum();
    assert_eq!(total, buffer.body().len());
}

#[test]
fn test_offsets_are_cumulative_word_counts() {
    let words = compute_module();
    let buffer = ModuleBuffer::new(&words).unwrap();
    let mut expected = 0;
    for instr in buffer.instructions() {
        let instr = instr.unwrap();
        assert_eq!(instr.offset, expected);
        expected += instr.word_count as usize;
    }
}

#[test]
fn test_truncated_instruction_surfaces_as_an_error() {
    let mut words = compute_module();
    // Inflate the last instruction's word count past the end.
    let last = words.len() - 1;
    words[last] = (9 << 16) | (words[last] & 0xFFFF);
    let buffer = ModuleBuffer::new(&words).unwrap();
    let tail = buffer.instructions().last().unwrap();
    assert!(matches!(
        tail,
        Err(ModuleError::MalformedInstruction { .. })
    ));
}

// ============================================================================
// Layout-ordered enumeration
// ============================================================================

fn reorder(words: &[u32]) -> Vec<u32> {
    let buffer = ModuleBuffer::new(words).unwrap();
    let mut writer = ModuleWriter::new();
    writer.begin_module();
    for instr in buffer.instructions_ordered() {
        writer.extend(instr.unwrap().words());
    }
    writer.finish(buffer.bound()).to_vec()
}

#[test]
fn test_ordering_an_ordered_module_is_the_identity() {
    let words = compute_module();
    assert_eq!(reorder(&words), words);
}

#[test]
fn test_ordering_is_idempotent() {
    // Deliberately scrambled: function first, capability last.
    let scrambled = module(|w| {
        w.instruction(Op::Function, Some(2), Some(5), &[0, 3]);
        w.instruction(Op::Label, None, Some(7), &[]);
        w.instruction(Op::FunctionEnd, None, None, &[]);
        w.instruction(Op::TypeVoid, None, Some(2), &[]);
        w.instruction(Op::Decorate, None, None, &[6, 33, 0]);
        w.instruction(Op::Capability, None, None, &[1]);
    });
    let once = reorder(&scrambled);
    let twice = reorder(&once);
    assert_eq!(once, twice);

    let buffer = ModuleBuffer::new(&once).unwrap();
    let first = buffer.instructions().next().unwrap().unwrap();
    assert_eq!(first.opcode, Some(Op::Capability));
}

#[test]
fn test_ordering_preserves_relative_order_within_a_group() {
    let words = module(|w| {
        w.instruction(Op::Name, None, None, &[1, 0x61]);
        w.instruction(Op::Capability, None, None, &[1]);
        w.instruction(Op::Name, None, None, &[2, 0x62]);
        w.instruction(Op::Name, None, None, &[3, 0x63]);
    });
    let buffer = ModuleBuffer::new(&words).unwrap();
    let targets: Vec<u32> = buffer
        .instructions_ordered()
        .map(|r| r.unwrap())
        .filter(|i| i.opcode == Some(Op::Name))
        .map(|i| i.operands()[0])
        .collect();
    assert_eq!(targets, vec![1, 2, 3]);
}

#[test]
fn test_global_variables_are_subordered_by_storage_class() {
    // StorageBuffer (12), Uniform (2), UniformConstant (0) globals plus a
    // Function-storage variable that must stay with function bodies.
    let words = module(|w| {
        w.instruction(Op::Variable, Some(9), Some(20), &[12]);
        w.instruction(Op::Variable, Some(9), Some(21), &[2]);
        w.instruction(Op::Variable, Some(9), Some(23), &[7]);
        w.instruction(Op::Variable, Some(9), Some(22), &[0]);
    });
    let buffer = ModuleBuffer::new(&words).unwrap();
    let ids: Vec<u32> = buffer
        .instructions_ordered()
        .map(|r| r.unwrap().result_id().unwrap())
        .collect();
    assert_eq!(ids, vec![22, 21, 20, 23]);
}

#[test]
fn test_ordering_and_sequential_agree_on_instruction_count() {
    let words = compute_module();
    let buffer = ModuleBuffer::new(&words).unwrap();
    assert_eq!(
        buffer.instructions().count(),
        buffer.instructions_ordered().count()
    );
}

// ============================================================================
// Function-bounded enumeration
// ============================================================================

#[test]
fn test_function_enumeration_stops_at_function_end() {
    let words = compute_module();
    let buffer = ModuleBuffer::new(&words).unwrap();

    // Locate the OpFunction by a sequential scan, then enumerate from it.
    let start = buffer
        .instructions()
        .map(|r| r.unwrap())
        .find(|i| i.opcode == Some(Op::Function))
        .unwrap()
        .offset;
    let ops: Vec<Op> = buffer
        .function_at(start)
        .map(|r| r.unwrap().opcode.unwrap())
        .collect();
    assert_eq!(
        ops,
        vec![Op::Function, Op::Label, Op::Return, Op::FunctionEnd]
    );
}

#[test]
fn test_function_enumeration_from_the_end_of_the_body_is_empty() {
    let words = compute_module();
    let buffer = ModuleBuffer::new(&words).unwrap();
    assert_eq!(buffer.function_at(buffer.body().len()).count(), 0);
}

// ============================================================================
// Mutable enumeration
// ============================================================================

#[test]
fn test_mutable_walk_renumbers_results_in_place() {
    let mut words = compute_module();
    {
        let mut buffer = ModuleBufferMut::new(&mut words).unwrap();
        let mut next = 100;
        for instr in SequentialIterMut::new(buffer.body_mut()) {
            let mut instr = instr.unwrap();
            if instr.result_id().is_some() {
                instr.set_result_id(next);
                next += 1;
            }
        }
        buffer.set_bound(next);
    }
    let buffer = ModuleBuffer::new(&words).unwrap();
    let ids: Vec<u32> = buffer
        .instructions()
        .filter_map(|r| r.unwrap().result_id())
        .collect();
    assert_eq!(ids, vec![100, 101, 102, 103, 104]);
    assert_eq!(buffer.bound(), 105);
}

#[test]
fn test_bound_is_patched_in_the_underlying_words() {
    let mut words = compute_module();
    {
        let mut buffer = ModuleBufferMut::new(&mut words).unwrap();
        buffer.set_bound(777);
    }
    assert_eq!(words[3], 777);
}

// ============================================================================
// Header validation
// ============================================================================

#[test]
fn test_short_and_mismagicked_buffers_are_rejected_up_front() {
    assert!(matches!(
        ModuleBuffer::new(&[1, 2, 3]),
        Err(ModuleError::MalformedHeader { .. })
    ));
    let mut words = compute_module();
    words[0] = 0xDEAD_BEEF;
    assert!(matches!(
        ModuleBuffer::new(&words),
        Err(ModuleError::MalformedHeader { .. })
    ));
}
