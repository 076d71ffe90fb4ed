//! IR pretty-printing and the metrics line. CLI-only collaborators — none of
//! this is part of the library's public surface.

use colored::Colorize;

use bfopt::ir::{Op, Program};

/// The eight significant bytes, duplicated from the lexer's own notion of a
/// token since that module isn't part of the library's public surface.
fn is_token(b: u8) -> bool {
    matches!(b, b'>' | b'<' | b'+' | b'-' | b'.' | b',' | b'[' | b']')
}

/// Prints one line per op, in the form `<index>: <CMD> val=.. off=.. buf=..`.
pub fn print_ir_human(prog: &Program) {
    for (i, op) in prog.as_slice().iter().enumerate() {
        println!("{i:>5}: {}", format_op(op));
    }
}

fn format_op(op: &Op) -> String {
    format!(
        "{:<8} val={:<8} off={:<6} buf={:<6}",
        format!("{:?}", op.cmd).to_uppercase(),
        op.val,
        op.off,
        op.buf
    )
}

/// Prints the IR as a JSON array, one object per op.
pub fn print_ir_json(prog: &Program) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(prog)?);
    Ok(())
}

/// Prints the single metrics line: original token count, IR op count, and
/// the byte size of the source form vs. the serialized IR form.
pub fn print_metrics(source: &[u8], prog: &Program) {
    let token_count = source.iter().copied().filter(|&b| is_token(b)).count();
    let op_count = prog.len();
    let source_bytes = source.len();
    let ir_bytes = prog.to_bytes().len();

    println!(
        "{} tokens={} ops={} source_bytes={} ir_bytes={}",
        "metrics:".cyan(),
        token_count,
        op_count,
        source_bytes,
        ir_bytes,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use bfopt::lower::lower;

    #[test]
    fn metrics_counts_tokens_and_ops() {
        let (prog, _) = lower(b"+++.").unwrap();
        assert_eq!(prog.len(), 3);
        let tokens = b"+++.".iter().filter(|&&b| is_token(b)).count();
        assert_eq!(tokens, 4);
    }

    #[test]
    fn human_dump_does_not_panic() {
        let (prog, _) = lower(b"++[>+++<-]>.").unwrap();
        print_ir_human(&prog);
    }
}
