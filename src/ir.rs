//! The intermediate representation produced by lowering and consumed by the VM.
//!
//! An [`Op`] is a single tagged record with the four fields described by the
//! opcode table: `cmd`, `val`, `off` and `buf`. Field overloading is
//! deliberate — it keeps the record small and cache-friendly instead of
//! growing a per-opcode struct hierarchy. See each [`Cmd`] variant's doc
//! comment for what `val`/`off`/`buf` mean for that op.

use serde::{Deserialize, Serialize};

/// The closed set of IR opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cmd {
    /// No effect.
    Noop,
    /// `tape[sp] += val`.
    Val,
    /// Write `tape[sp]` to output.
    Put,
    /// `tape[sp] <- next input byte`.
    Get,
    /// If `tape[sp] == 0`, jump by `val` (to one past the matching `Rew`).
    /// Then `tape[sp] += buf`.
    Fwd,
    /// If `tape[sp] != 0`, jump by `val` (to one past the matching `Fwd`).
    /// Then `tape[sp] += buf`.
    Rew,
    /// Scan: set `sp` to the nearest cell at stride `val` from the current
    /// `sp` whose value is zero.
    PtrS,
    /// `tape[sp + buf] += val * tape[sp]`.
    ValMul,
    /// `tape[sp + buf] += val * tape[sp]; tape[sp] = 0`.
    ValMz,
    /// `tape[sp] = val`.
    ValZero,
    /// `tape[sp + buf] *= val * tape[sp]`.
    MulMul,
    /// Halt.
    Eop,
}

/// A single IR instruction.
///
/// `off` is applied to `sp` after the op's primary effect, for every op —
/// this fuses a trailing pointer move into whatever op precedes it, so a
/// dedicated "move" op is never needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Op {
    pub cmd: Cmd,
    pub val: i32,
    pub off: i16,
    pub buf: i16,
}

impl Op {
    pub const fn new(cmd: Cmd, val: i32, off: i16, buf: i16) -> Op {
        Op { cmd, val, off, buf }
    }

    pub const fn noop() -> Op {
        Op::new(Cmd::Noop, 0, 0, 0)
    }

    pub const fn eop() -> Op {
        Op::new(Cmd::Eop, 0, 0, 0)
    }
}

/// A lowered program: a flat, index-addressed sequence of [`Op`]s terminated
/// by [`Cmd::Eop`].
///
/// The IR is built once during lowering and read many times during
/// execution. All jump targets between ops are plain integer indices into
/// this array — there is deliberately no node-linked structure, since the
/// jump-patching arithmetic in the lowerer and the loop optimizer both
/// depend on index arithmetic staying valid.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Program {
    ops: Vec<Op>,
}

/// Size in bytes of one [`Op`]'s binary encoding: 1 (cmd tag) + 4 (val) + 2
/// (off) + 2 (buf).
const RECORD_LEN: usize = 9;

impl Program {
    pub fn new() -> Program {
        Program { ops: Vec::new() }
    }

    pub fn with_capacity(cap: usize) -> Program {
        Program { ops: Vec::with_capacity(cap) }
    }

    pub fn push(&mut self, op: Op) -> usize {
        let idx = self.ops.len();
        self.ops.push(op);
        idx
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn as_slice(&self) -> &[Op] {
        &self.ops
    }

    pub fn as_mut_slice(&mut self) -> &mut [Op] {
        &mut self.ops
    }

    pub fn get(&self, idx: usize) -> Option<&Op> {
        self.ops.get(idx)
    }

    /// Serializes the IR to a compact binary representation: a little-endian
    /// `u32` op count, followed by one fixed-size record per op.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + self.ops.len() * RECORD_LEN);
        out.extend_from_slice(&(self.ops.len() as u32).to_le_bytes());
        for op in &self.ops {
            out.push(cmd_tag(op.cmd));
            out.extend_from_slice(&op.val.to_le_bytes());
            out.extend_from_slice(&op.off.to_le_bytes());
            out.extend_from_slice(&op.buf.to_le_bytes());
        }
        out
    }

    /// Deserializes a [`Program`] previously produced by [`Program::to_bytes`].
    /// Returns `None` if `bytes` is truncated or contains an unrecognized tag.
    pub fn from_bytes(bytes: &[u8]) -> Option<Program> {
        if bytes.len() < 4 {
            return None;
        }
        let count = u32::from_le_bytes(bytes[0..4].try_into().ok()?) as usize;
        let mut ops = Vec::with_capacity(count);
        let mut cursor = 4usize;
        for _ in 0..count {
            let record = bytes.get(cursor..cursor + RECORD_LEN)?;
            let cmd = tag_cmd(record[0])?;
            let val = i32::from_le_bytes(record[1..5].try_into().ok()?);
            let off = i16::from_le_bytes(record[5..7].try_into().ok()?);
            let buf = i16::from_le_bytes(record[7..9].try_into().ok()?);
            ops.push(Op::new(cmd, val, off, buf));
            cursor += RECORD_LEN;
        }
        Some(Program { ops })
    }
}

fn cmd_tag(cmd: Cmd) -> u8 {
    match cmd {
        Cmd::Noop => 0,
        Cmd::Val => 1,
        Cmd::Put => 2,
        Cmd::Get => 3,
        Cmd::Fwd => 4,
        Cmd::Rew => 5,
        Cmd::PtrS => 6,
        Cmd::ValMul => 7,
        Cmd::ValMz => 8,
        Cmd::ValZero => 9,
        Cmd::MulMul => 10,
        Cmd::Eop => 11,
    }
}

fn tag_cmd(tag: u8) -> Option<Cmd> {
    Some(match tag {
        0 => Cmd::Noop,
        1 => Cmd::Val,
        2 => Cmd::Put,
        3 => Cmd::Get,
        4 => Cmd::Fwd,
        5 => Cmd::Rew,
        6 => Cmd::PtrS,
        7 => Cmd::ValMul,
        8 => Cmd::ValMz,
        9 => Cmd::ValZero,
        10 => Cmd::MulMul,
        11 => Cmd::Eop,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_through_bytes() {
        let mut p = Program::new();
        p.push(Op::new(Cmd::Val, 3, 1, 0));
        p.push(Op::new(Cmd::Fwd, 5, 0, -2));
        p.push(Op::new(Cmd::ValMul, -7, 0, 3));
        p.push(Op::eop());

        let bytes = p.to_bytes();
        let back = Program::from_bytes(&bytes).unwrap();
        assert_eq!(p, back);
    }

    #[test]
    fn rejects_truncated_bytes() {
        let mut p = Program::new();
        p.push(Op::new(Cmd::Val, 1, 0, 0));
        let mut bytes = p.to_bytes();
        bytes.truncate(bytes.len() - 1);
        assert_eq!(Program::from_bytes(&bytes), None);
    }
}
