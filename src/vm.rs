//! The tape VM: a switch-dispatched interpreter for lowered IR.

use crate::cell::{cell_from_i32, cell_to_i64, Cell};
use crate::error::ExecError;
use crate::ir::{Cmd, Op, Program};

/// Supplies input bytes to a running [`Vm`]. Returns `None` to signal
/// end-of-input; implementations are free to return a sentinel value
/// instead (e.g. `-1`) if that better matches their caller's convention —
/// whatever is returned is stored verbatim into the cell.
pub trait InputSource {
    fn next_byte(&mut self) -> Option<i64>;
}

/// Receives output bytes from a running [`Vm`].
pub trait OutputSink {
    fn put_byte(&mut self, byte: i64);
}

/// The result of a (possibly budgeted) call to [`Vm::run`].
#[derive(Debug)]
pub enum RunState {
    /// The budget was exhausted; `pc`/`sp` are preserved for re-entry.
    Running,
    /// The program reached `Eop`.
    Halted,
    /// Execution failed.
    Err(ExecError),
}

/// A tape VM generic over its cell type.
pub struct Vm<C: Cell> {
    tape: Vec<C>,
    program: Program,
    pc: usize,
    sp: usize,
    input_buf: std::collections::VecDeque<u8>,
    halted: bool,
}

impl<C: Cell> Vm<C> {
    /// Creates a VM for `program` with a tape of `tape_size` cells, seeded
    /// with `input_buf` (the bytes captured after the `!` input delimiter),
    /// consumed before the `InputSource` callback is ever invoked.
    pub fn new(program: Program, tape_size: usize, input_buf: Vec<u8>) -> Vm<C> {
        Vm {
            tape: vec![C::default(); tape_size],
            program,
            pc: 0,
            sp: 0,
            input_buf: input_buf.into(),
            halted: false,
        }
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn sp(&self) -> usize {
        self.sp
    }

    pub fn tape(&self) -> &[C] {
        &self.tape
    }

    pub fn halted(&self) -> bool {
        self.halted
    }

    /// Runs at most `budget` instructions (or to completion if `budget` is
    /// `None`), then returns. A caller re-enters by calling `run` again
    /// until it returns anything other than `RunState::Running`.
    pub fn run(&mut self, budget: Option<u64>, input: &mut dyn InputSource, output: &mut dyn OutputSink) -> RunState {
        if self.halted {
            return RunState::Halted;
        }

        let mut executed: u64 = 0;
        loop {
            if let Some(b) = budget {
                if executed >= b {
                    return RunState::Running;
                }
            }

            let op = match self.program.get(self.pc) {
                Some(&op) => op,
                None => {
                    self.halted = true;
                    return RunState::Halted;
                }
            };

            match self.step(op, input, output) {
                Ok(true) => {
                    self.halted = true;
                    return RunState::Halted;
                }
                Ok(false) => {}
                Err(e) => {
                    self.halted = true;
                    return RunState::Err(e);
                }
            }

            executed += 1;
        }
    }

    /// Executes one IR instruction. Returns `Ok(true)` on `Eop`.
    fn step(&mut self, op: Op, input: &mut dyn InputSource, output: &mut dyn OutputSink) -> Result<bool, ExecError> {
        match op.cmd {
            Cmd::Noop => {
                self.move_sp(op.off)?;
                self.pc += 1;
            }
            Cmd::Val => {
                self.tape[self.sp] = self.tape[self.sp].wrapping_add(&cell_from_i32(op.val));
                self.move_sp(op.off)?;
                self.pc += 1;
            }
            Cmd::Put => {
                output.put_byte(cell_to_i64(self.tape[self.sp]));
                self.move_sp(op.off)?;
                self.pc += 1;
            }
            Cmd::Get => {
                if let Some(byte) = self.next_input_byte(input) {
                    self.tape[self.sp] = cell_from_i32(byte as i32);
                }
                self.move_sp(op.off)?;
                self.pc += 1;
            }
            Cmd::Fwd => {
                if self.tape[self.sp] == C::zero() {
                    self.pc = self.jump_target(op.val);
                } else {
                    self.tape[self.sp] = self.tape[self.sp].wrapping_add(&cell_from_i32(op.buf as i32));
                    self.move_sp(op.off)?;
                    self.pc += 1;
                }
            }
            Cmd::Rew => {
                if self.tape[self.sp] != C::zero() {
                    self.pc = self.jump_target(op.val);
                } else {
                    self.tape[self.sp] = self.tape[self.sp].wrapping_add(&cell_from_i32(op.buf as i32));
                    self.move_sp(op.off)?;
                    self.pc += 1;
                }
            }
            Cmd::PtrS => {
                self.scan(op.val)?;
                self.move_sp(op.off)?;
                self.pc += 1;
            }
            Cmd::ValMul => {
                let src = self.tape[self.sp];
                let target = self.target_index(op.buf)?;
                self.tape[target] = self.tape[target].wrapping_add(&cell_from_i32::<C>(op.val).wrapping_mul(&src));
                self.move_sp(op.off)?;
                self.pc += 1;
            }
            Cmd::ValMz => {
                let src = self.tape[self.sp];
                let target = self.target_index(op.buf)?;
                self.tape[target] = self.tape[target].wrapping_add(&cell_from_i32::<C>(op.val).wrapping_mul(&src));
                self.tape[self.sp] = C::zero();
                self.move_sp(op.off)?;
                self.pc += 1;
            }
            Cmd::ValZero => {
                self.tape[self.sp] = cell_from_i32(op.val);
                self.move_sp(op.off)?;
                self.pc += 1;
            }
            Cmd::MulMul => {
                let src = self.tape[self.sp];
                let target = self.target_index(op.buf)?;
                self.tape[target] = self.tape[target].wrapping_mul(&cell_from_i32::<C>(op.val).wrapping_mul(&src));
                self.move_sp(op.off)?;
                self.pc += 1;
            }
            Cmd::Eop => {
                output.put_byte(b'\n' as i64);
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn next_input_byte(&mut self, input: &mut dyn InputSource) -> Option<i64> {
        if let Some(b) = self.input_buf.pop_front() {
            return Some(b as i64);
        }
        input.next_byte()
    }

    fn jump_target(&self, disp: i32) -> usize {
        (self.pc as i64 + disp as i64) as usize
    }

    fn move_sp(&mut self, off: i16) -> Result<(), ExecError> {
        if off == 0 {
            return Ok(());
        }
        let next = self.sp as i64 + off as i64;
        self.bounds_check(next)?;
        self.sp = next as usize;
        Ok(())
    }

    fn target_index(&self, buf: i16) -> Result<usize, ExecError> {
        let next = self.sp as i64 + buf as i64;
        self.bounds_check(next)?;
        Ok(next as usize)
    }

    fn scan(&mut self, stride: i32) -> Result<(), ExecError> {
        while self.tape[self.sp] != C::zero() {
            let next = self.sp as i64 + stride as i64;
            self.bounds_check(next)?;
            self.sp = next as usize;
        }
        Ok(())
    }

    fn bounds_check(&self, sp: i64) -> Result<(), ExecError> {
        if sp < 0 || sp as usize >= self.tape.len() {
            return Err(ExecError::OutOfBounds { pc: self.pc, sp });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lower::lower;

    struct VecInput(std::collections::VecDeque<u8>);
    impl InputSource for VecInput {
        fn next_byte(&mut self) -> Option<i64> {
            self.0.pop_front().map(|b| b as i64)
        }
    }

    #[derive(Default)]
    struct VecOutput(Vec<u8>);
    impl OutputSink for VecOutput {
        fn put_byte(&mut self, byte: i64) {
            self.0.push(byte as u8);
        }
    }

    fn run_to_completion(source: &[u8], stdin: &[u8]) -> Vec<u8> {
        let (prog, _) = lower(source).unwrap();
        let mut vm: Vm<u8> = Vm::new(prog, 65_536, Vec::new());
        let mut input = VecInput(stdin.iter().copied().collect());
        let mut output = VecOutput::default();
        match vm.run(None, &mut input, &mut output) {
            RunState::Halted => output.0,
            other => panic!("expected halt, got {other:?}"),
        }
    }

    #[test]
    fn empty_program_emits_newline() {
        assert_eq!(run_to_completion(b"", b""), b"\n");
    }

    #[test]
    fn prints_a_byte() {
        assert_eq!(run_to_completion(b"+++.", b""), b"\x03\n");
    }

    #[test]
    fn echoes_input() {
        assert_eq!(run_to_completion(b",.", b"A"), b"A\n");
    }

    #[test]
    fn multiply_loop_produces_expected_value() {
        assert_eq!(run_to_completion(b"++[>+++<-]>.", b""), b"\x06\n");
    }

    #[test]
    fn scan_idiom_lands_on_first_zero_cell() {
        let (prog, _) = lower(b"+>+>+>+>+<<<<[>]").unwrap();
        let mut vm: Vm<u8> = Vm::new(prog, 65_536, Vec::new());
        let mut input = VecInput(Default::default());
        let mut output = VecOutput::default();
        match vm.run(None, &mut input, &mut output) {
            RunState::Halted => {}
            other => panic!("expected halt, got {other:?}"),
        }
        assert_eq!(vm.sp(), 5);
        for (i, &v) in vm.tape()[0..5].iter().enumerate() {
            assert_eq!(v, 1, "cell {i} should be untouched by the scan");
        }
    }

    #[test]
    fn out_of_bounds_pointer_is_reported() {
        let (prog, _) = lower(b"<").unwrap();
        let mut vm: Vm<u8> = Vm::new(prog, 4, Vec::new());
        let mut input = VecInput(Default::default());
        let mut output = VecOutput::default();
        match vm.run(None, &mut input, &mut output) {
            RunState::Err(ExecError::OutOfBounds { .. }) => {}
            other => panic!("expected out-of-bounds error, got {other:?}"),
        }
    }

    #[test]
    fn budgeted_execution_resumes_to_the_same_result() {
        let (prog, _) = lower(b"+++++.").unwrap();
        let mut vm: Vm<u8> = Vm::new(prog, 65_536, Vec::new());
        let mut input = VecInput(Default::default());
        let mut output = VecOutput::default();

        loop {
            match vm.run(Some(1), &mut input, &mut output) {
                RunState::Running => continue,
                RunState::Halted => break,
                RunState::Err(e) => panic!("unexpected error {e:?}"),
            }
        }

        assert_eq!(output.0, b"\x05\n");
    }
}
