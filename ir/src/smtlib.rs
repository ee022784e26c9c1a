//! The SMT-LIB textual printer.
//!
//! The printer walks the top-level operations of a lowered module in order.
//! `smt.declare_const` and `smt.synth.constant` become `declare-const`
//! lines, `smt.define_fun` becomes a `define-fun`, `smt.assert` and
//! `smt.check_sat` become the corresponding top-level forms. Intermediate
//! results are let-bound in SSA order under the form that consumes them,
//! named from their hint or `tmp_<n>`.
//!
//! Printing of individual expressions dispatches through the operation
//! definition: `SimpleSMTLibOp` definitions print as
//! `(<mnemonic> <operands...>)`, `SMTLibOp` definitions supply their own
//! printing function.

use core::fmt::Write;

use veriop_session::diagnostics::Unsupported;

use crate::{Context, FxHashMap, FxHashSet, Operation, Report, SmallStr, Type, Value};

/// Value-to-name binding state threaded through one printing session.
#[derive(Default)]
pub struct SmtConversionCtx {
    names: FxHashMap<Value, SmallStr>,
    taken: FxHashSet<SmallStr>,
    next_tmp: usize,
}

impl SmtConversionCtx {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, value: Value) -> Option<&str> {
        self.names.get(&value).map(|name| name.as_str())
    }

    /// Bind `value` to its name hint (sanitized and uniquified) or a fresh
    /// `tmp_<n>` name.
    pub fn bind(&mut self, ctx: &Context, value: Value) -> SmallStr {
        if let Some(name) = self.names.get(&value) {
            return name.clone();
        }
        let base: SmallStr = match ctx.name_hint(value) {
            Some(hint) => sanitize(hint),
            None => SmallStr::default(),
        };
        let name = if base.is_empty() {
            loop {
                let candidate: SmallStr = format!("tmp_{}", self.next_tmp).into();
                self.next_tmp += 1;
                if self.taken.insert(candidate.clone()) {
                    break candidate;
                }
            }
        } else {
            self.uniquify(base)
        };
        self.names.insert(value, name.clone());
        name
    }

    /// Bind `value` to an externally chosen name (e.g. a function symbol).
    pub fn bind_named(&mut self, value: Value, name: &str) -> SmallStr {
        let name = self.uniquify(sanitize(name));
        self.names.insert(value, name.clone());
        name
    }

    /// Forget a let-scoped binding once its enclosing form is closed. The
    /// name stays reserved so later bindings cannot collide with it.
    fn unbind(&mut self, value: Value) {
        self.names.remove(&value);
    }

    fn uniquify(&mut self, base: SmallStr) -> SmallStr {
        if self.taken.insert(base.clone()) {
            return base;
        }
        let mut counter = 0usize;
        loop {
            let candidate: SmallStr = format!("{base}_{counter}").into();
            counter += 1;
            if self.taken.insert(candidate.clone()) {
                break candidate;
            }
        }
    }

    /// Print `value` as an SMT-LIB expression: its bound name when it has
    /// one, otherwise the expression of its producing op, inline.
    pub fn print_value(
        &mut self,
        ctx: &Context,
        value: Value,
        out: &mut String,
    ) -> Result<(), Report> {
        if let Some(name) = self.lookup(value) {
            out.push_str(name);
            return Ok(());
        }
        let op = ctx.defining_op(value).ok_or_else(|| {
            Unsupported::new("cannot print an unbound block argument as an SMT-LIB expression")
        })?;
        self.print_op_expr(ctx, op, out)
    }

    /// Print the expression form of `op`.
    pub fn print_op_expr(
        &mut self,
        ctx: &Context,
        op: Operation,
        out: &mut String,
    ) -> Result<(), Report> {
        let info = ctx.op_name(op).info();
        if let Some(print) = info.print_smtlib {
            return print(ctx, op, self, out);
        }
        if let Some(mnemonic) = info.smtlib_name {
            out.push('(');
            out.push_str(mnemonic);
            for &operand in ctx.op_operands(op).to_vec().iter() {
                out.push(' ');
                self.print_value(ctx, operand, out)?;
            }
            out.push(')');
            return Ok(());
        }
        Err(Unsupported::new(format!(
            "operation '{}' has no SMT-LIB printing",
            ctx.op_name(op)
        )))
    }
}

fn sanitize(name: &str) -> SmallStr {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Print the SMT-LIB sort of `ty`. Fails for types that have no solver-side
/// sort (source integers, effect states, PDL handles).
pub fn print_sort(ty: &Type, out: &mut String) -> Result<(), Report> {
    match ty {
        Type::Bool => out.push_str("Bool"),
        Type::BitVec(w) => {
            let _ = write!(out, "(_ BitVec {w})");
        }
        Type::Pair(a, b) => {
            out.push_str("(Pair ");
            print_sort(a, out)?;
            out.push(' ');
            print_sort(b, out)?;
            out.push(')');
        }
        Type::Array(k, v) => {
            out.push_str("(Array ");
            print_sort(k, out)?;
            out.push(' ');
            print_sort(v, out)?;
            out.push(')');
        }
        Type::Memory => out.push_str("Memory"),
        Type::MemBlock => out.push_str("Block"),
        Type::BlockId => out.push_str("BlockID"),
        Type::Sort(name) => out.push_str(name),
        other => {
            return Err(Unsupported::new(format!(
                "type {other} has no SMT-LIB sort"
            )));
        }
    }
    Ok(())
}

/// The uninterpreted sorts a type mentions, for the preamble.
fn collect_sorts(ty: &Type, pair_used: &mut bool, uninterpreted: &mut Vec<SmallStr>) {
    match ty {
        Type::Pair(a, b) => {
            *pair_used = true;
            collect_sorts(a, pair_used, uninterpreted);
            collect_sorts(b, pair_used, uninterpreted);
        }
        Type::Array(k, v) => {
            collect_sorts(k, pair_used, uninterpreted);
            collect_sorts(v, pair_used, uninterpreted);
        }
        Type::Memory => push_unique(uninterpreted, "Memory"),
        Type::MemBlock => push_unique(uninterpreted, "Block"),
        Type::BlockId => push_unique(uninterpreted, "BlockID"),
        Type::Sort(name) => push_unique(uninterpreted, name),
        Type::Func(args, result) => {
            for arg in args {
                collect_sorts(arg, pair_used, uninterpreted);
            }
            collect_sorts(result, pair_used, uninterpreted);
        }
        _ => {}
    }
}

fn push_unique(sorts: &mut Vec<SmallStr>, name: &str) {
    if !sorts.iter().any(|s| s == name) {
        sorts.push(name.into());
    }
}

/// Print a lowered module as an SMT-LIB script.
pub fn print_to_smtlib(ctx: &Context, module: Operation) -> Result<String, Report> {
    let mut smt = SmtConversionCtx::new();
    let mut out = String::new();

    // Preamble: the pair datatype and any uninterpreted sorts, once each.
    let mut pair_used = false;
    let mut uninterpreted: Vec<SmallStr> = Vec::new();
    ctx.walk_preorder(module, &mut |op| {
        for &result in ctx.op_results(op) {
            collect_sorts(ctx.value_type(result), &mut pair_used, &mut uninterpreted);
        }
        for &region in ctx.op_regions(op) {
            for &block in ctx.region_blocks(region) {
                for &arg in ctx.block_args(block) {
                    collect_sorts(ctx.value_type(arg), &mut pair_used, &mut uninterpreted);
                }
            }
        }
    });
    if pair_used {
        out.push_str(
            "(declare-datatypes ((Pair 2)) ((par (X Y) ((pair (first X) (second Y))))))\n",
        );
    }
    uninterpreted.sort();
    for sort in &uninterpreted {
        let _ = writeln!(out, "(declare-sort {sort} 0)");
    }

    let body = ctx.entry_block(module).ok_or_else(|| {
        Unsupported::new("cannot print a module without a body to SMT-LIB")
    })?;

    for &op in ctx.block_ops(body).to_vec().iter() {
        let name = ctx.op_name(op);
        if name.is("smt.declare_const") || name.is("smt.synth.constant") {
            let result = ctx.op_result(op, 0);
            let bound = smt.bind(ctx, result);
            out.push_str("(declare-const ");
            out.push_str(&bound);
            out.push(' ');
            print_sort(ctx.value_type(result), &mut out)?;
            out.push_str(")\n");
        } else if name.is("smt.define_fun") {
            print_define_fun(ctx, op, &mut smt, &mut out)?;
        } else if name.is("smt.assert") {
            out.push_str("(assert ");
            print_with_lets(ctx, ctx.op_operand(op, 0), &mut smt, &mut out)?;
            out.push_str(")\n");
        } else if name.is("smt.check_sat") {
            out.push_str("(check-sat)\n");
        } else if ctx.op_name(op).has_trait(crate::TraitSet::PURE) {
            // Pure intermediates print inline, let-bound under their
            // consuming top-level form.
            continue;
        } else {
            return Err(Unsupported::new(format!(
                "op '{}' cannot appear at the top level of an SMT-LIB script",
                ctx.op_name(op)
            )));
        }
    }

    Ok(out)
}

/// Print `value` with every unbound transitive dependency let-bound first,
/// in SSA order.
fn print_with_lets(
    ctx: &Context,
    value: Value,
    smt: &mut SmtConversionCtx,
    out: &mut String,
) -> Result<(), Report> {
    let mut ordered: Vec<Operation> = Vec::new();
    let mut seen: FxHashSet<Operation> = FxHashSet::default();
    collect_deps(ctx, value, smt, &mut ordered, &mut seen)?;

    for &op in &ordered {
        if ctx.op_results(op).len() != 1 {
            return Err(Unsupported::new(format!(
                "op '{}' with {} results cannot be let-bound",
                ctx.op_name(op),
                ctx.op_results(op).len()
            )));
        }
        let mut expr = String::new();
        smt.print_op_expr(ctx, op, &mut expr)?;
        let bound = smt.bind(ctx, ctx.op_result(op, 0));
        let _ = write!(out, "(let (({bound} {expr})) ");
    }
    smt.print_value(ctx, value, out)?;
    for _ in &ordered {
        out.push(')');
    }
    // The let bindings are scoped to this form.
    for &op in &ordered {
        smt.unbind(ctx.op_result(op, 0));
    }
    Ok(())
}

fn collect_deps(
    ctx: &Context,
    value: Value,
    smt: &SmtConversionCtx,
    ordered: &mut Vec<Operation>,
    seen: &mut FxHashSet<Operation>,
) -> Result<(), Report> {
    if smt.lookup(value).is_some() {
        return Ok(());
    }
    let Some(op) = ctx.defining_op(value) else {
        return Err(Unsupported::new(
            "SMT-LIB expression depends on an unbound block argument",
        ));
    };
    if seen.contains(&op) {
        return Ok(());
    }
    for &operand in ctx.op_operands(op).to_vec().iter() {
        collect_deps(ctx, operand, smt, ordered, seen)?;
    }
    if seen.insert(op) {
        ordered.push(op);
    }
    Ok(())
}

fn print_define_fun(
    ctx: &Context,
    op: Operation,
    smt: &mut SmtConversionCtx,
    out: &mut String,
) -> Result<(), Report> {
    let result = ctx.op_result(op, 0);
    let fun_name = match ctx.op_attrs(op).get("sym_name").and_then(|a| a.as_str()) {
        Some(name) => smt.bind_named(result, name),
        None => smt.bind(ctx, result),
    };

    let body = ctx
        .entry_block(op)
        .ok_or_else(|| Unsupported::new("'smt.define_fun' without a body"))?;

    out.push_str("(define-fun ");
    out.push_str(&fun_name);
    out.push_str(" (");
    for (i, &arg) in ctx.block_args(body).to_vec().iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let arg_name = smt.bind(ctx, arg);
        out.push('(');
        out.push_str(&arg_name);
        out.push(' ');
        print_sort(ctx.value_type(arg), out)?;
        out.push(')');
    }
    out.push_str(") ");

    let (_, ret_ty) = ctx
        .value_type(result)
        .as_func()
        .ok_or_else(|| Unsupported::new("'smt.define_fun' result is not function-typed"))?;
    print_sort(ret_ty, out)?;
    out.push(' ');

    // Body: every non-terminator result is let-bound in block order; the
    // innermost expression is the returned value.
    let ops = ctx.block_ops(body).to_vec();
    let Some((&terminator, body_ops)) = ops.split_last() else {
        return Err(Unsupported::new("'smt.define_fun' with an empty body"));
    };
    if !ctx.op_name(terminator).is("smt.return") {
        return Err(Unsupported::new(
            "'smt.define_fun' body must end in 'smt.return'",
        ));
    }

    let mut lets = 0usize;
    for &body_op in body_ops {
        if ctx.op_results(body_op).len() != 1 {
            return Err(Unsupported::new(format!(
                "op '{}' with {} results cannot be let-bound",
                ctx.op_name(body_op),
                ctx.op_results(body_op).len()
            )));
        }
        let mut expr = String::new();
        smt.print_op_expr(ctx, body_op, &mut expr)?;
        let bound = smt.bind(ctx, ctx.op_result(body_op, 0));
        let _ = write!(out, "(let (({bound} {expr})) ");
        lets += 1;
    }
    smt.print_value(ctx, ctx.op_operand(terminator, 0), out)?;
    for _ in 0..lets {
        out.push(')');
    }
    out.push_str(")\n");
    // Arguments and body bindings are scoped to the definition; only the
    // function's own name stays visible.
    for &arg in ctx.block_args(body).to_vec().iter() {
        smt.unbind(arg);
    }
    for &body_op in body_ops {
        smt.unbind(ctx.op_result(body_op, 0));
    }
    Ok(())
}
