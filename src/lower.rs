//! The IR emitter: lowers raw BF source bytes into a [`Program`].

use crate::error::LowerError;
use crate::ir::{Cmd, Op, Program};
use crate::lexer::{scan_run, skip_noise};
use crate::optimizer::optimize_loop;

/// Lowers `source` into IR, returning the program and the byte offset at
/// which scanning stopped (end of source, or the `!` input delimiter).
pub fn lower(source: &[u8]) -> Result<(Program, usize), LowerError> {
    let mut prog = Program::with_capacity(source.len());
    let mut loop_stack: Vec<(usize, i32)> = Vec::new();
    let mut virtual_sp: i32 = 0;
    let mut pos = 0usize;

    loop {
        pos = skip_noise(source, pos);
        let byte = match source.get(pos) {
            Some(&b) if b != b'!' => b,
            _ => break,
        };

        match byte {
            b'+' | b'-' => {
                let (next, val) = scan_run(source, pos, b'+', b'-');
                pos = skip_noise(source, next);
                let (next, off) = scan_run(source, pos, b'>', b'<');
                pos = next;
                let cmd = if val == 0 { Cmd::Noop } else { Cmd::Val };
                prog.push(Op::new(cmd, val, off as i16, 0));
                virtual_sp += off;
            }
            b'>' | b'<' => {
                let (next, off) = scan_run(source, pos, b'>', b'<');
                pos = next;
                prog.push(Op::new(Cmd::Noop, 0, off as i16, 0));
                virtual_sp += off;
            }
            b'.' => {
                pos = skip_noise(source, pos + 1);
                let (next, off) = scan_run(source, pos, b'>', b'<');
                pos = next;
                prog.push(Op::new(Cmd::Put, 0, off as i16, 0));
                virtual_sp += off;
            }
            b',' => {
                pos = skip_noise(source, pos + 1);
                let (next, off) = scan_run(source, pos, b'>', b'<');
                pos = next;
                prog.push(Op::new(Cmd::Get, 0, off as i16, 0));
                virtual_sp += off;
            }
            b'[' => {
                pos += 1;

                let probe = skip_noise(source, pos);
                let (after_run, stride) = scan_run(source, probe, b'>', b'<');
                let after_run_noise = skip_noise(source, after_run);
                if stride != 0 && source.get(after_run_noise) == Some(&b']') {
                    pos = skip_noise(source, after_run_noise + 1);
                    let (next, off) = scan_run(source, pos, b'>', b'<');
                    pos = next;
                    prog.push(Op::new(Cmd::PtrS, stride, off as i16, 0));
                    virtual_sp += off;
                    continue;
                }

                pos = skip_noise(source, pos);
                let (next, buf) = scan_run(source, pos, b'+', b'-');
                pos = skip_noise(source, next);
                let (next, off) = scan_run(source, pos, b'>', b'<');
                pos = next;

                loop_stack.push((prog.len(), virtual_sp));
                prog.push(Op::new(Cmd::Fwd, 0, off as i16, buf as i16));
                virtual_sp += off;
            }
            b']' => {
                pos += 1;

                pos = skip_noise(source, pos);
                let (next, buf) = scan_run(source, pos, b'+', b'-');
                pos = skip_noise(source, next);
                let (next, off) = scan_run(source, pos, b'>', b'<');
                pos = next;

                let (fwd_idx, _sp_at_open) = loop_stack
                    .pop()
                    .ok_or(LowerError::UnbalancedClose { at: pos })?;

                let rew_idx = prog.len();
                let disp = (rew_idx - fwd_idx) as i32;
                prog.as_mut_slice()[fwd_idx].val = disp;
                prog.push(Op::new(Cmd::Rew, -disp, off as i16, buf as i16));
                virtual_sp += off;

                optimize_loop(&mut prog, fwd_idx);
            }
            _ => unreachable!("skip_noise only stops at token bytes, '!', or end of source"),
        }
    }

    if let Some(&(fwd_idx, _)) = loop_stack.first() {
        return Err(LowerError::UnclosedOpen { at: fwd_idx });
    }

    prog.push(Op::eop());
    Ok((prog, pos))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_program_is_just_eop() {
        let (prog, pos) = lower(b"").unwrap();
        assert_eq!(prog.len(), 1);
        assert_eq!(prog.get(0).unwrap().cmd, Cmd::Eop);
        assert_eq!(pos, 0);
    }

    #[test]
    fn stops_scanning_at_bang_and_reports_offset() {
        let (_, pos) = lower(b"+++!hello").unwrap();
        assert_eq!(pos, 3);
    }

    #[test]
    fn comments_are_skipped() {
        let (prog, _) = lower(b"+ % a comment\n +").unwrap();
        // the comment doesn't fuse the two runs, but it also isn't decoded
        // as a stray token: we see two separate single-'+' ops.
        assert_eq!(prog.len(), 3);
        assert_eq!(prog.get(0).unwrap().cmd, Cmd::Val);
        assert_eq!(prog.get(0).unwrap().val, 1);
        assert_eq!(prog.get(1).unwrap().cmd, Cmd::Val);
        assert_eq!(prog.get(1).unwrap().val, 1);
    }

    #[test]
    fn unbalanced_close_is_reported() {
        match lower(b"+]") {
            Err(LowerError::UnbalancedClose { at }) => assert_eq!(at, 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unclosed_open_is_reported() {
        match lower(b"[+") {
            Err(LowerError::UnclosedOpen { .. }) => {}
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn scan_idiom_emits_ptr_s() {
        let (prog, _) = lower(b"[>]").unwrap();
        assert_eq!(prog.len(), 2);
        assert_eq!(prog.get(0).unwrap().cmd, Cmd::PtrS);
        assert_eq!(prog.get(0).unwrap().val, 1);
    }

    #[test]
    fn fwd_rew_jump_targets_are_closed() {
        let (prog, _) = lower(b"[.-]").unwrap();
        let fwd = prog.get(0).unwrap();
        assert_eq!(fwd.cmd, Cmd::Fwd);
        let target = (0i32 + fwd.val) as usize;
        let rew = prog.get(target).unwrap();
        assert_eq!(rew.cmd, Cmd::Rew);
        assert_eq!(rew.val, -fwd.val);
    }
}
