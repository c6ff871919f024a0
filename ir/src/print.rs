use core::fmt;

use crate::{Callee, Edge, Expr, Function, Inst, InstData, SwitchCase};

/// Displays a single statement in the context of its function
pub struct DisplayInst<'a> {
    func: &'a Function,
    inst: Inst,
}

impl Function {
    pub fn display_inst(&self, inst: Inst) -> DisplayInst<'_> {
        DisplayInst { func: self, inst }
    }

    fn fmt_edge_dest(&self, f: &mut fmt::Formatter<'_>, edge: Edge) -> fmt::Result {
        write!(f, "{}", self.edge_dest(edge))
    }
}

impl fmt::Display for DisplayInst<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let func = self.func;
        match func.inst(self.inst) {
            InstData::Phi { dest, args } => {
                write!(f, "{dest} = phi")?;
                for (i, (edge, arg)) in args.iter().enumerate() {
                    let sep = if i == 0 { " " } else { ", " };
                    write!(f, "{sep}[{}: {arg}]", func.edge_source(*edge))?;
                }
                write!(f, " : {}", func.value_type(*dest))
            }
            InstData::Assign { dest, expr } => {
                write!(f, "{dest} = ")?;
                match expr {
                    Expr::Copy(a) => write!(f, "copy {a}")?,
                    Expr::Unary(op, a) => write!(f, "{} {a}", op.as_str())?,
                    Expr::Binary(op, a, b) => write!(f, "{} {a}, {b}", op.as_str())?,
                    Expr::Compare(pred, a, b) => write!(f, "icmp {pred} {a}, {b}")?,
                    Expr::Select(c, a, b) => write!(f, "select {c}, {a}, {b}")?,
                    Expr::Convert(a) => write!(f, "convert {a}")?,
                }
                write!(f, " : {}", func.value_type(*dest))
            }
            InstData::Assert {
                dest,
                src,
                pred,
                bound,
            } => write!(f, "{dest} = assert {src} {pred} {bound} : {}", func.value_type(*dest)),
            InstData::Call { dests, callee, args } => {
                for (i, dest) in dests.iter().enumerate() {
                    let sep = if i == 0 { "" } else { ", " };
                    write!(f, "{sep}{dest}")?;
                }
                if !dests.is_empty() {
                    f.write_str(" = ")?;
                }
                match callee {
                    Callee::External { name, pure: true } => write!(f, "call pure @{name}(")?,
                    Callee::External { name, pure: false } => write!(f, "call @{name}(")?,
                    Callee::Internal(callee) => write!(f, "call {}(", callee.as_str())?,
                }
                for (i, arg) in args.iter().enumerate() {
                    let sep = if i == 0 { "" } else { ", " };
                    write!(f, "{sep}{arg}")?;
                }
                f.write_str(")")
            }
            InstData::Jump { edge } => {
                f.write_str("jump ")?;
                func.fmt_edge_dest(f, *edge)
            }
            InstData::CondBranch {
                pred,
                lhs,
                rhs,
                then_edge,
                else_edge,
            } => {
                write!(f, "br {pred} {lhs}, {rhs}, ")?;
                func.fmt_edge_dest(f, *then_edge)?;
                f.write_str(", ")?;
                func.fmt_edge_dest(f, *else_edge)
            }
            InstData::Switch {
                selector,
                cases,
                default,
            } => {
                write!(f, "switch {selector} [")?;
                for (i, SwitchCase { lo, hi, edge }) in cases.iter().enumerate() {
                    let sep = if i == 0 { "" } else { ", " };
                    if lo == hi {
                        write!(f, "{sep}{lo}: ")?;
                    } else {
                        write!(f, "{sep}{lo}..={hi}: ")?;
                    }
                    func.fmt_edge_dest(f, *edge)?;
                }
                f.write_str("], default ")?;
                func.fmt_edge_dest(f, *default)
            }
            InstData::Return { value: Some(value) } => write!(f, "ret {value}"),
            InstData::Return { value: None } => f.write_str("ret"),
            InstData::Unreachable => f.write_str("unreachable"),
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "function @{}(", self.name())?;
        for (i, param) in self.params().iter().enumerate() {
            let sep = if i == 0 { "" } else { ", " };
            write!(f, "{sep}{param}: {}", self.value_type(*param))?;
        }
        f.write_str(")")?;
        if let Some(ty) = self.result_type() {
            write!(f, " -> {ty}")?;
        }
        f.write_str(" {\n")?;
        for block in self.blocks() {
            writeln!(f, "{block}:")?;
            for inst in self.block_insts(block) {
                writeln!(f, "    {}", self.display_inst(inst))?;
            }
        }
        f.write_str("}\n")
    }
}
