use core::fmt::Write;

use super::context::{Block, Context, Operation, Value};
use crate::{FxHashMap, FxHashSet};

/// Printer state for the generic textual form of the IR.
///
/// The form is deterministic: values are numbered in definition order, name
/// hints are kept (uniquified) when present, attributes print in sorted
/// order. The driver's reader accepts exactly this form back.
struct IrPrinter<'a> {
    ctx: &'a Context,
    names: FxHashMap<Value, String>,
    taken: FxHashSet<String>,
    next_id: usize,
    out: String,
}

impl<'a> IrPrinter<'a> {
    fn new(ctx: &'a Context) -> Self {
        Self {
            ctx,
            names: FxHashMap::default(),
            taken: FxHashSet::default(),
            next_id: 0,
            out: String::new(),
        }
    }

    fn value_name(&mut self, value: Value) -> String {
        if let Some(name) = self.names.get(&value) {
            return name.clone();
        }
        let name = match self.ctx.name_hint(value) {
            Some(hint) => {
                let base: String = hint
                    .chars()
                    .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
                    .collect();
                let mut candidate = base.clone();
                let mut counter = 0usize;
                while !self.taken.insert(candidate.clone()) {
                    candidate = format!("{base}_{counter}");
                    counter += 1;
                }
                candidate
            }
            None => {
                let mut candidate = format!("{}", self.next_id);
                self.next_id += 1;
                while !self.taken.insert(candidate.clone()) {
                    candidate = format!("{}", self.next_id);
                    self.next_id += 1;
                }
                candidate
            }
        };
        self.names.insert(value, name.clone());
        name
    }

    fn print_op(&mut self, op: Operation, indent: usize) {
        for _ in 0..indent {
            self.out.push_str("  ");
        }
        let results = self.ctx.op_results(op).to_vec();
        if !results.is_empty() {
            for (i, &result) in results.iter().enumerate() {
                if i > 0 {
                    self.out.push_str(", ");
                }
                let name = self.value_name(result);
                let _ = write!(self.out, "%{name}");
            }
            self.out.push_str(" = ");
        }
        let _ = write!(self.out, "{}", self.ctx.op_name(op));

        let operands = self.ctx.op_operands(op).to_vec();
        for (i, &operand) in operands.iter().enumerate() {
            self.out.push_str(if i == 0 { " " } else { ", " });
            let name = self.value_name(operand);
            let _ = write!(self.out, "%{name}");
        }

        let attrs = self.ctx.op_attrs(op);
        if !attrs.is_empty() {
            self.out.push_str(" {");
            for (i, (name, value)) in attrs.iter().enumerate() {
                if i > 0 {
                    self.out.push_str(", ");
                }
                let _ = write!(self.out, "{name} = {value}");
            }
            self.out.push('}');
        }

        if !results.is_empty() {
            self.out.push_str(" : ");
            for (i, &result) in results.iter().enumerate() {
                if i > 0 {
                    self.out.push_str(", ");
                }
                let _ = write!(self.out, "{}", self.ctx.value_type(result));
            }
        }

        for &region in self.ctx.op_regions(op) {
            if self.ctx.region(region).erased {
                continue;
            }
            self.out.push_str(" {\n");
            for &block in self.ctx.region_blocks(region) {
                self.print_block(block, indent + 1);
            }
            for _ in 0..indent {
                self.out.push_str("  ");
            }
            self.out.push('}');
        }
        self.out.push('\n');
    }

    fn print_block(&mut self, block: Block, indent: usize) {
        if self.ctx.block(block).erased {
            return;
        }
        let args = self.ctx.block_args(block).to_vec();
        if !args.is_empty() {
            for _ in 0..indent - 1 {
                self.out.push_str("  ");
            }
            self.out.push('^');
            self.out.push('(');
            for (i, &arg) in args.iter().enumerate() {
                if i > 0 {
                    self.out.push_str(", ");
                }
                let name = self.value_name(arg);
                let _ = write!(self.out, "%{name}: {}", self.ctx.value_type(arg));
            }
            self.out.push_str("):\n");
        }
        for &op in self.ctx.block_ops(block).to_vec().iter() {
            self.print_op(op, indent);
        }
    }
}

impl Context {
    /// Render the IR rooted at `op` in its generic textual form.
    pub fn print_ir(&self, op: Operation) -> String {
        let mut printer = IrPrinter::new(self);
        printer.print_op(op, 0);
        printer.out
    }
}
