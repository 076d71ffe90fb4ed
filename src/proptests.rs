//! Universal invariants from the testable-properties list, exercised with
//! `proptest` over randomly generated balanced programs.

use proptest::prelude::*;

use crate::ir::Cmd;
use crate::lower::lower;
use crate::oracle::naive_run;
use crate::vm::{InputSource, OutputSink, RunState, Vm};

const STEP_BUDGET: usize = 20_000;

struct SliceInput<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> InputSource for SliceInput<'a> {
    fn next_byte(&mut self) -> Option<i64> {
        let b = *self.bytes.get(self.pos)?;
        self.pos += 1;
        Some(b as i64)
    }
}

#[derive(Default)]
struct VecOutput(Vec<u8>);

impl OutputSink for VecOutput {
    fn put_byte(&mut self, byte: i64) {
        self.0.push(byte as u8);
    }
}

/// A balanced-bracket BF program, recursively generated so every `[` always
/// has a matching `]`.
#[derive(Clone, Debug)]
enum Instr {
    Leaf(u8),
    Loop(Vec<Instr>),
}

fn instr_strategy() -> impl Strategy<Value = Instr> {
    let leaf = prop_oneof![
        Just(b'>'),
        Just(b'<'),
        Just(b'+'),
        Just(b'-'),
        Just(b'.'),
        Just(b','),
    ]
    .prop_map(Instr::Leaf);

    leaf.prop_recursive(3, 40, 6, |inner| {
        prop::collection::vec(inner, 0..6).prop_map(Instr::Loop)
    })
}

fn program_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(instr_strategy(), 0..10).prop_map(|instrs| {
        let mut out = Vec::new();
        flatten(&instrs, &mut out);
        out
    })
}

fn flatten(instrs: &[Instr], out: &mut Vec<u8>) {
    for instr in instrs {
        match instr {
            Instr::Leaf(b) => out.push(*b),
            Instr::Loop(body) => {
                out.push(b'[');
                flatten(body, out);
                out.push(b']');
            }
        }
    }
}

fn run_optimized(source: &[u8], input: &[u8], budget: u64) -> (Vec<u8>, RunState) {
    let (prog, _) = lower(source).expect("generator only produces balanced programs");
    let mut vm: Vm<u8> = Vm::new(prog, 65_536, Vec::new());
    let mut in_src = SliceInput { bytes: input, pos: 0 };
    let mut out = VecOutput::default();
    let state = vm.run(Some(budget), &mut in_src, &mut out);
    (out.0, state)
}

fn is_balanced(source: &[u8]) -> bool {
    let mut depth = 0i32;
    for &b in source {
        match b {
            b'[' => depth += 1,
            b']' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

proptest! {
    #[test]
    fn semantic_equivalence(program in program_strategy(), input in prop::collection::vec(any::<u8>(), 0..16)) {
        let (expected, oracle_completed) = naive_run(&program, &input, STEP_BUDGET);
        let (actual, vm_state) = run_optimized(&program, &input, STEP_BUDGET as u64);
        let vm_completed = matches!(vm_state, RunState::Halted);

        prop_assume!(oracle_completed && vm_completed);
        prop_assert_eq!(expected, actual);
    }

    #[test]
    fn bracket_balance_matches_lowering_success(program in program_strategy()) {
        prop_assert!(lower(&program).is_ok());
        prop_assert!(is_balanced(&program));
    }

    #[test]
    fn unbalanced_close_is_always_rejected(prefix in program_strategy()) {
        let mut source = prefix;
        source.push(b']');
        prop_assert!(lower(&source).is_err());
    }

    #[test]
    fn ir_jump_closure_holds(program in program_strategy()) {
        let (prog, _) = lower(&program).unwrap();
        for i in 0..prog.len() {
            let op = *prog.get(i).unwrap();
            if op.cmd == Cmd::Fwd {
                let target = i as i32 + op.val;
                prop_assert!(target >= 0 && (target as usize) < prog.len());
                let target_op = prog.get(target as usize).unwrap();
                prop_assert_eq!(target_op.cmd, Cmd::Rew);
                prop_assert_eq!(target_op.val, -op.val);
            }
        }
    }

    #[test]
    fn budget_idempotence(program in program_strategy(), input in prop::collection::vec(any::<u8>(), 0..8)) {
        let (unbudgeted, unbudgeted_state) = run_optimized(&program, &input, STEP_BUDGET as u64);
        prop_assume!(matches!(unbudgeted_state, RunState::Halted));

        let (prog, _) = lower(&program).unwrap();
        let mut vm: Vm<u8> = Vm::new(prog, 65_536, Vec::new());
        let mut in_src = SliceInput { bytes: &input, pos: 0 };
        let mut out = VecOutput::default();
        loop {
            match vm.run(Some(1), &mut in_src, &mut out) {
                RunState::Running => continue,
                RunState::Halted => break,
                RunState::Err(_) => break,
            }
        }

        prop_assert_eq!(unbudgeted, out.0);
    }
}
