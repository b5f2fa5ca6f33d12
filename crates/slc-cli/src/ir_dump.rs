//! A textual IR dump for `--print-ir`: one `funcN:` block per function,
//! instructions indented, labels printed as `LN:` immediately before the
//! instruction they target.

use std::collections::HashMap;
use std::fmt::Write as _;

use slc_ir::{BinOp, ConstValue, Inst, Program, UnOp};

pub fn dump(program: &Program) -> String {
    let mut out = String::new();
    for (i, func) in program.funcs.values().enumerate() {
        let _ = writeln!(out, "func{i}:");
        let targets = func.label_targets();
        let mut pos2labels: HashMap<usize, Vec<usize>> = HashMap::new();
        for (label, &pos) in targets.iter().enumerate() {
            pos2labels.entry(pos).or_default().push(label);
        }
        for (pos, inst) in func.code.iter().enumerate() {
            if let Some(labels) = pos2labels.get(&pos) {
                for label in labels {
                    let _ = writeln!(out, "L{label}:");
                }
            }
            let _ = writeln!(out, "    {}", format_inst(inst));
        }
        out.push('\n');
    }
    out
}

fn binop_word(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::Mod => "%",
        BinOp::And => "and",
        BinOp::Or => "or",
        BinOp::Eq => "eq",
        BinOp::Ne => "ne",
        BinOp::Lt => "lt",
        BinOp::Le => "le",
        BinOp::Gt => "gt",
        BinOp::Ge => "ge",
    }
}

fn unop_word(op: UnOp) -> &'static str {
    match op {
        UnOp::Neg => "-",
        UnOp::Not => "not",
    }
}

fn format_inst(inst: &Inst) -> String {
    match inst {
        Inst::Const { value, dst } => match value {
            ConstValue::Int(v) => format!("const {v} {dst}"),
            ConstValue::Byte(v) => format!("const {v} {dst}"),
            ConstValue::Str(s) => format!("const {} {dst}", serde_json_escape(s)),
        },
        Inst::Mov { src, dst } => format!("mov {src} {dst}"),
        Inst::BinOp { op, a1, a2, dst } => format!("binop {} {a1} {a2} {dst}", binop_word(*op)),
        Inst::BinOp8 { op, a1, a2, dst } => format!("binop8 {} {a1} {a2} {dst}", binop_word(*op)),
        Inst::UnOp { op, a1, dst } => format!("unop {} {a1} {dst}", unop_word(*op)),
        Inst::UnOp8 { op, a1, dst } => format!("unop8 {} {a1} {dst}", unop_word(*op)),
        Inst::Jmpf { cond, label } => format!("jmpf {cond} L{}", label.index()),
        Inst::Jmp { label } => format!("jmp L{}", label.index()),
        Inst::Ret { a1 } => format!("ret {}", a1.unwrap_or(-1)),
        Inst::Call { func, arg_start, level_cur, level_new } => {
            format!("call {} {arg_start} {level_cur} {level_new}", func.index())
        }
        Inst::GetEnv { level_var, var, dst } => format!("get_env {level_var} {var} {dst}"),
        Inst::SetEnv { level_var, var, src } => format!("set_env {level_var} {var} {src}"),
        Inst::RefVar { var, dst } => format!("ref_var {var} {dst}"),
        Inst::RefEnv { level_var, var, dst } => format!("ref_env {level_var} {var} {dst}"),
        Inst::Lea { a1, a2, scale, dst } => format!("lea {a1} {a2} {scale} {dst}"),
        Inst::Peek { var, dst } => format!("peek {var} {dst}"),
        Inst::Peek8 { var, dst } => format!("peek8 {var} {dst}"),
        Inst::Poke { ptr, val } => format!("poke {ptr} {val}"),
        Inst::Poke8 { ptr, val } => format!("poke8 {ptr} {val}"),
        Inst::Cast8 { var } => format!("cast8 {var}"),
        Inst::Syscall { dst, num, args } => {
            let args = args.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(" ");
            if args.is_empty() {
                format!("syscall {dst} {num}")
            } else {
                format!("syscall {dst} {num} {args}")
            }
        }
        Inst::Debug => "debug".to_string(),
    }
}

/// Minimal JSON string escaping for a `const` string literal; avoids a
/// `serde_json` dependency for a single debug-printing use site.
fn serde_json_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dumps_a_trivial_constant() {
        let program = slc_compile::compile_source("1").unwrap();
        let text = dump(&program);
        assert!(text.starts_with("func0:\n"));
        assert!(text.contains("const 1 0"));
        assert!(text.contains("ret 0"));
    }

    #[test]
    fn labels_are_printed_before_their_target_instruction() {
        let program = slc_compile::compile_source("(if 1 2 3)").unwrap();
        let text = dump(&program);
        assert!(text.contains("L0:") || text.contains("L1:"));
    }
}
