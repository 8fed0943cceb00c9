/// The "JIT": a same-dialect bytecode rewriter installed once per function
/// body rather than a machine-code backend. Grounded on the teacher's
/// `axm::optimizer` pass pipeline (`fold_constants` -> `peephole` ->
/// `remove_dead_code` -> `compact_nops`), adapted to this machine's
/// stack-based instruction set and absolute jump-target addressing — our
/// `compact_nops` only needs an old-index -> new-index table, not the
/// teacher's relative-offset recomputation.
use std::collections::HashSet;

use crate::bytecode::{BinSub, CodeObj, Instruction, Op, UnSub, Value};
use crate::decimal::BigFloat;

#[derive(Debug, Clone, Copy)]
pub struct OptConfig {
    pub constant_folding: bool,
    pub peephole: bool,
    pub dead_code: bool,
    pub superinstructions: bool,
}

impl Default for OptConfig {
    fn default() -> Self {
        OptConfig { constant_folding: true, peephole: true, dead_code: true, superinstructions: true }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptStats {
    pub folded: usize,
    pub peepholed: usize,
    pub dead_removed: usize,
    pub superinstructions_installed: usize,
    pub empty_loops_removed: usize,
}

/// Rewrites `code`'s instruction stream under `cfg`, returning a summary of
/// what each pass changed. Operates on a clone of the compiler's output —
/// callers keep the original `CodeObj` as the de-opt fallback.
pub fn optimize(code: &CodeObj, cfg: &OptConfig) -> (CodeObj, OptStats) {
    let mut out = code.clone();
    let mut stats = OptStats::default();
    if cfg.constant_folding {
        stats.folded += fold_constants(&mut out);
    }
    if cfg.peephole {
        // Folding and peepholing can each expose more of the other; a
        // function small enough to be worth JIT-ing is small enough to
        // just run both to a fixed point.
        loop {
            let folded = if cfg.constant_folding { fold_constants(&mut out) } else { 0 };
            let peepholed = peephole(&mut out);
            stats.folded += folded;
            stats.peepholed += peepholed;
            if folded == 0 && peepholed == 0 {
                break;
            }
        }
    }
    if cfg.superinstructions {
        stats.superinstructions_installed += install_compare_and_swap(&mut out);
    }
    if cfg.dead_code {
        stats.empty_loops_removed += remove_empty_loops(&mut out);
        stats.dead_removed += remove_dead_code(&mut out);
    }
    compact_nops(&mut out);
    (out, stats)
}

fn is_jump(op: Op) -> bool {
    matches!(op, Op::PopJumpIfFalse | Op::PopJumpIfTrue | Op::JumpForward | Op::JumpBackward | Op::BreakLoop | Op::ContinueLoop)
}

fn is_unconditional_terminator(op: Op) -> bool {
    matches!(op, Op::ReturnValue | Op::JumpForward | Op::JumpBackward | Op::BreakLoop | Op::ContinueLoop)
}

// -- constant folding --------------------------------------------------------

fn const_of(v: &Value) -> Option<Value> {
    match v {
        Value::Code(_) => None,
        other => Some(other.clone()),
    }
}

fn is_float_value(v: &Value) -> bool {
    matches!(v, Value::Float(_))
}

fn as_bigfloat(v: &Value) -> Option<BigFloat> {
    match v {
        Value::Float(f) => Some(f.clone()),
        Value::Int(n) => Some(BigFloat::from_i64(*n)),
        _ => None,
    }
}

fn structural_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::None, Value::None) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Float(x), Value::Float(y)) => x.cmp_tolerant(y) == std::cmp::Ordering::Equal,
        _ => false,
    }
}

/// Evaluates a binary op over two compile-time constants the same way
/// `Vm::binary_op` would at runtime, including its "degrade to 0/none
/// instead of erroring" rules — folding must be invisible to a program that
/// never observes debug logging.
fn fold_binary(op: BinSub, l: &Value, r: &Value) -> Option<Value> {
    use std::cmp::Ordering;
    match op {
        BinSub::And => return Some(Value::Bool(truthy(l) && truthy(r))),
        BinSub::Or => return Some(Value::Bool(truthy(l) || truthy(r))),
        _ => {}
    }
    let float_mode = is_float_value(l) || is_float_value(r);
    match op {
        BinSub::Eq | BinSub::Ne | BinSub::Lt | BinSub::Le | BinSub::Gt | BinSub::Ge => {
            let ordering = if float_mode {
                match (as_bigfloat(l), as_bigfloat(r)) {
                    (Some(a), Some(b)) => Some(a.cmp_tolerant(&b)),
                    _ => None,
                }
            } else {
                match (l, r) {
                    (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
                    (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
                    _ => None,
                }
            };
            let result = match (op, ordering) {
                (BinSub::Eq, Some(Ordering::Equal)) => true,
                (BinSub::Eq, Some(_)) => false,
                (BinSub::Eq, None) => structural_eq(l, r),
                (BinSub::Ne, Some(Ordering::Equal)) => false,
                (BinSub::Ne, Some(_)) => true,
                (BinSub::Ne, None) => !structural_eq(l, r),
                (BinSub::Lt, Some(o)) => o == Ordering::Less,
                (BinSub::Le, Some(o)) => o != Ordering::Greater,
                (BinSub::Gt, Some(o)) => o == Ordering::Greater,
                (BinSub::Ge, Some(o)) => o != Ordering::Less,
                (_, None) => false,
                _ => unreachable!(),
            };
            return Some(Value::Bool(result));
        }
        _ => {}
    }
    if float_mode {
        let (a, b) = (as_bigfloat(l)?, as_bigfloat(r)?);
        let result = match op {
            BinSub::Add => a.add(&b),
            BinSub::Sub => a.sub(&b),
            BinSub::Mul => a.mul(&b),
            BinSub::Div => a.div(&b),
            BinSub::Rem => a.rem(&b),
            _ => unreachable!(),
        };
        Some(Value::Float(result))
    } else {
        let (Value::Int(a), Value::Int(b)) = (l, r) else { return None };
        let result = match op {
            BinSub::Add => a.wrapping_add(*b),
            BinSub::Sub => a.wrapping_sub(*b),
            BinSub::Mul => a.wrapping_mul(*b),
            BinSub::Div => if *b == 0 { 0 } else { a.wrapping_div(*b) },
            BinSub::Rem => if *b == 0 { 0 } else { a.wrapping_rem(*b) },
            _ => unreachable!(),
        };
        Some(Value::Int(result))
    }
}

fn truthy(v: &Value) -> bool {
    match v {
        Value::Int(n) => *n != 0,
        Value::Bool(b) => *b,
        Value::None => false,
        Value::Float(f) => f.is_truthy(),
        Value::Code(_) => true,
    }
}

/// `+x`/`-x` are only reachable at this operand type by a type-checked
/// program, so folding them never needs the "non-numeric operand" fallback
/// the interpreter carries for defense in depth.
fn fold_unary(op: UnSub, v: &Value) -> Option<Value> {
    match op {
        UnSub::Not => Some(Value::Bool(!truthy(v))),
        UnSub::Pos => match v {
            Value::Int(n) => Some(Value::Int(*n)),
            Value::Float(f) => Some(Value::Float(f.clone())),
            _ => None,
        },
        UnSub::Neg => match v {
            Value::Int(n) => Some(Value::Int(n.wrapping_neg())),
            Value::Float(f) => Some(Value::Float(f.neg())),
            _ => None,
        },
    }
}

/// Folds `LoadConst a; LoadConst b; BinaryOp` and `LoadConst a; UnaryOp`
/// triples/pairs into a single `LoadConst` of the computed result, leaving
/// Nops behind for `compact_nops` to remove.
fn fold_constants(code: &mut CodeObj) -> usize {
    let mut folded = 0;
    let len = code.code.len();
    let mut i = 0;
    while i < len {
        if code.code[i].op == Op::LoadConst && i + 1 < len && code.code[i + 1].op == Op::UnaryOp {
            let Some(v) = const_of(&code.constants[code.code[i].arg as usize]) else { i += 1; continue };
            let sub = UnSub::from_u8(code.code[i + 1].arg as u8).unwrap();
            if let Some(result) = fold_unary(sub, &v) {
                let idx = code.add_constant(result);
                code.code[i] = Instruction::new(Op::LoadConst, idx);
                code.code[i + 1] = Instruction::new(Op::Nop, 0);
                folded += 1;
                i += 2;
                continue;
            }
        }
        if code.code[i].op == Op::LoadConst
            && i + 2 < len
            && code.code[i + 1].op == Op::LoadConst
            && code.code[i + 2].op == Op::BinaryOp
        {
            let Some(l) = const_of(&code.constants[code.code[i].arg as usize]) else { i += 1; continue };
            let Some(r) = const_of(&code.constants[code.code[i + 1].arg as usize]) else { i += 1; continue };
            let sub = BinSub::from_u8(code.code[i + 2].arg as u8).unwrap();
            if let Some(result) = fold_binary(sub, &l, &r) {
                let idx = code.add_constant(result);
                code.code[i] = Instruction::new(Op::LoadConst, idx);
                code.code[i + 1] = Instruction::new(Op::Nop, 0);
                code.code[i + 2] = Instruction::new(Op::Nop, 0);
                folded += 1;
                i += 3;
                continue;
            }
        }
        i += 1;
    }
    folded
}

// -- peephole ----------------------------------------------------------------

/// Two- and one-instruction windows that are always safe to simplify
/// regardless of what surrounds them.
fn peephole(code: &mut CodeObj) -> usize {
    let mut changed = 0;
    let len = code.code.len();
    for i in 0..len {
        let this = code.code[i];
        // A jump whose target is the very next instruction is a no-op under
        // our absolute addressing.
        if is_jump(this.op) && this.op != Op::PopJumpIfFalse && this.op != Op::PopJumpIfTrue && this.arg as usize == i + 1 {
            code.code[i] = Instruction::new(Op::Nop, 0);
            changed += 1;
            continue;
        }
        if i + 1 >= len {
            continue;
        }
        let next = code.code[i + 1];
        // LoadFast x; StoreFast x is a net-zero refcount roundtrip: the
        // incref from the load cancels the decref StoreFast does on the
        // slot's old value, because that old value is the same object.
        if this.op == Op::LoadFast && next.op == Op::StoreFast && this.arg == next.arg {
            code.code[i] = Instruction::new(Op::Nop, 0);
            code.code[i + 1] = Instruction::new(Op::Nop, 0);
            changed += 1;
            continue;
        }
        if this.op == Op::UnaryOp
            && next.op == Op::UnaryOp
            && this.arg as u8 == UnSub::Neg as u8
            && next.arg as u8 == UnSub::Neg as u8
        {
            code.code[i] = Instruction::new(Op::Nop, 0);
            code.code[i + 1] = Instruction::new(Op::Nop, 0);
            changed += 1;
            continue;
        }
        // LoadConst(bool); PopJumpIf{False,True} with a known condition
        // collapses to either an unconditional jump or a fallthrough.
        if this.op == Op::LoadConst {
            if let Value::Bool(b) = &code.constants[this.arg as usize] {
                let b = *b;
                match next.op {
                    Op::PopJumpIfFalse => {
                        code.code[i] = Instruction::new(Op::Nop, 0);
                        code.code[i + 1] = if b {
                            Instruction::new(Op::Nop, 0)
                        } else {
                            Instruction::new(Op::JumpForward, next.arg)
                        };
                        changed += 1;
                        continue;
                    }
                    Op::PopJumpIfTrue => {
                        code.code[i] = Instruction::new(Op::Nop, 0);
                        code.code[i + 1] = if b {
                            Instruction::new(Op::JumpForward, next.arg)
                        } else {
                            Instruction::new(Op::Nop, 0)
                        };
                        changed += 1;
                        continue;
                    }
                    _ => {}
                }
            }
        }
    }
    changed
}

// -- superinstructions --------------------------------------------------------

/// Recognizes the sorting inner-loop idiom `if (a[j] > a[j+1]) { ... swap
/// ... }` and replaces the compare-and-branch header with the
/// `CompareAndSwap` super-instruction, provided the conditional body is
/// straight-line code with no nested control flow and no jump targets land
/// inside it. This is a shape heuristic, not a general data-flow prover —
/// code that computes the same swap a different way is simply left for the
/// other passes.
///
/// The header this matches is exactly what the compiler emits for
/// `a[j] > a[j + 1]`: `LOAD_FAST arr; LOAD_FAST j; LOAD_SUBSCR; LOAD_FAST
/// arr; LOAD_FAST j; LOAD_CONST 1; BINARY_OP ADD; LOAD_SUBSCR; BINARY_OP GT;
/// POP_JUMP_IF_FALSE` — ten instructions, the middle `LOAD_CONST 1;
/// BINARY_OP ADD` pair computing the `j + 1` index. It's replaced by the
/// six-instruction kernel `LOAD_FAST arr; LOAD_FAST j; LOAD_FAST j;
/// LOAD_CONST 1; BINARY_OP ADD; COMPARE_AND_SWAP`, which pushes `arr`, `j`,
/// `j+1` for the super-instruction to pop.
fn install_compare_and_swap(code: &mut CodeObj) -> usize {
    let mut installed = 0;
    let len = code.code.len();
    let mut i = 0;
    while i + 9 < len {
        let w = &code.code[i..i + 10];
        let const_one = w[5].op == Op::LoadConst
            && matches!(code.constants.get(w[5].arg as usize), Some(Value::Int(1)));
        let header_matches = w[0].op == Op::LoadFast
            && w[1].op == Op::LoadFast
            && w[2].op == Op::LoadSubscr
            && w[3].op == Op::LoadFast && w[3].arg == w[0].arg
            && w[4].op == Op::LoadFast && w[4].arg == w[1].arg
            && const_one
            && w[6].op == Op::BinaryOp && w[6].arg as u8 == BinSub::Add as u8
            && w[7].op == Op::LoadSubscr
            && w[8].op == Op::BinaryOp && w[8].arg as u8 == BinSub::Gt as u8
            && w[9].op == Op::PopJumpIfFalse;
        if !header_matches {
            i += 1;
            continue;
        }
        let array_local = w[0].arg;
        let j_local = w[1].arg;
        let const_one_idx = w[5].arg;
        let target = w[9].arg as usize;
        let body_start = i + 10;
        let body_ok = target > body_start
            && target <= len
            && code.code[body_start..target].iter().all(|instr| {
                !is_jump(instr.op) && !matches!(instr.op, Op::ReturnValue | Op::CallFunction | Op::MakeFunction)
            });
        if !body_ok {
            i += 1;
            continue;
        }
        // No jump anywhere in the function may target the interior of the
        // block we're about to collapse — that would orphan the jump.
        let no_interior_targets = code.code.iter().enumerate().all(|(k, instr)| {
            if !is_jump(instr.op) || k == i + 9 {
                return true;
            }
            let t = instr.arg as usize;
            !(t > i && t < target)
        });
        if !no_interior_targets {
            i += 1;
            continue;
        }
        code.code[i] = Instruction::new(Op::LoadFast, array_local);
        code.code[i + 1] = Instruction::new(Op::LoadFast, j_local);
        code.code[i + 2] = Instruction::new(Op::LoadFast, j_local);
        code.code[i + 3] = Instruction::new(Op::LoadConst, const_one_idx);
        code.code[i + 4] = Instruction::new(Op::BinaryOp, BinSub::Add as u32);
        code.code[i + 5] = Instruction::new(Op::CompareAndSwap, 0);
        for k in (i + 6)..target {
            code.code[k] = Instruction::new(Op::Nop, 0);
        }
        installed += 1;
        i = target;
    }
    installed
}

// -- loop-boundary dead code ---------------------------------------------------

/// Removes whole `LOOP_START .. LOOP_END` spans that have no observable
/// effect: no call, no store to a global/array/return, and no local it
/// writes is ever read outside the span. A loop that only recomputes values
/// nothing reads is as dead as straight-line code nothing reads.
fn remove_empty_loops(code: &mut CodeObj) -> usize {
    let mut removed = 0;
    let len = code.code.len();
    let mut i = 0;
    while i < len {
        if code.code[i].op != Op::LoopStart {
            i += 1;
            continue;
        }
        let mut depth = 1i32;
        let mut end = None;
        let mut j = i + 1;
        while j < len {
            match code.code[j].op {
                Op::LoopStart => depth += 1,
                Op::LoopEnd => {
                    depth -= 1;
                    if depth == 0 {
                        end = Some(j);
                        break;
                    }
                }
                _ => {}
            }
            j += 1;
        }
        let Some(end) = end else {
            i += 1;
            continue;
        };
        let body = &code.code[i + 1..end];
        let mut writes_local: HashSet<u32> = HashSet::new();
        let mut safe = true;
        for instr in body {
            match instr.op {
                Op::CallFunction | Op::StoreGlobal | Op::StoreSubscr | Op::ReturnValue | Op::CompareAndSwap => {
                    safe = false;
                }
                Op::StoreFast => {
                    writes_local.insert(instr.arg);
                }
                _ => {}
            }
        }
        if safe {
            let used_outside = code.code.iter().enumerate().any(|(k, instr)| {
                (k <= i || k > end) && instr.op == Op::LoadFast && writes_local.contains(&instr.arg)
            });
            if !used_outside {
                for k in i..=end {
                    code.code[k] = Instruction::new(Op::Nop, 0);
                }
                removed += 1;
            }
        }
        i = end + 1;
    }
    removed
}

// -- dead code elimination ----------------------------------------------------

/// Replaces instructions unreachable from entry with `Nop`. Reachability
/// follows fallthrough (unless the instruction unconditionally diverts
/// control) plus every jump target.
fn remove_dead_code(code: &mut CodeObj) -> usize {
    let len = code.code.len();
    if len == 0 {
        return 0;
    }
    let mut reachable = vec![false; len];
    let mut stack = vec![0usize];
    while let Some(pc) = stack.pop() {
        if pc >= len || reachable[pc] {
            continue;
        }
        reachable[pc] = true;
        let instr = code.code[pc];
        if is_jump(instr.op) {
            stack.push(instr.arg as usize);
        }
        if !is_unconditional_terminator(instr.op) {
            stack.push(pc + 1);
        }
    }
    let mut removed = 0;
    for (pc, instr) in code.code.iter_mut().enumerate() {
        if !reachable[pc] && instr.op != Op::Nop {
            *instr = Instruction::new(Op::Nop, 0);
            removed += 1;
        }
    }
    removed
}

// -- nop compaction ------------------------------------------------------------

/// Removes `Nop`s and rewrites every jump target through an
/// old-index -> new-index table built from a running count of surviving
/// instructions. A target that pointed at a removed `Nop` lands on whatever
/// instruction now occupies that position in the compacted stream.
fn compact_nops(code: &mut CodeObj) {
    let len = code.code.len();
    let mut map = vec![0u32; len + 1];
    let mut next = 0u32;
    for i in 0..len {
        map[i] = next;
        if code.code[i].op != Op::Nop {
            next += 1;
        }
    }
    map[len] = next;
    let mut new_code = Vec::with_capacity(next as usize);
    for instr in code.code.iter() {
        if instr.op == Op::Nop {
            continue;
        }
        let arg = if is_jump(instr.op) { map[instr.arg.min(len as u32) as usize] } else { instr.arg };
        new_code.push(Instruction::new(instr.op, arg));
    }
    code.code = new_code;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::CodeObj;

    fn prog(ops: Vec<(Op, u32)>) -> CodeObj {
        let mut c = CodeObj::new("t", 0);
        for (op, arg) in ops {
            c.emit(op, arg);
        }
        c
    }

    #[test]
    fn folds_constant_arithmetic() {
        let mut c = CodeObj::new("t", 0);
        let a = c.add_constant(Value::Int(2));
        let b = c.add_constant(Value::Int(3));
        c.emit(Op::LoadConst, a);
        c.emit(Op::LoadConst, b);
        c.emit(Op::BinaryOp, BinSub::Add as u32);
        c.emit(Op::ReturnValue, 0);
        let (out, stats) = optimize(&c, &OptConfig::default());
        assert_eq!(stats.folded, 1);
        assert_eq!(out.code.len(), 2);
        assert_eq!(out.code[0].op, Op::LoadConst);
        assert_eq!(out.constants[out.code[0].arg as usize], Value::Int(5));
        assert_eq!(out.code[1].op, Op::ReturnValue);
    }

    #[test]
    fn removes_dead_code_after_return() {
        let mut c = CodeObj::new("t", 0);
        let z = c.add_constant(Value::Int(0));
        c.emit(Op::LoadConst, z);
        c.emit(Op::ReturnValue, 0);
        c.emit(Op::LoadConst, z); // unreachable
        c.emit(Op::Pop, 0);
        let (out, stats) = optimize(&c, &OptConfig::default());
        assert_eq!(stats.dead_removed, 2);
        assert_eq!(out.code.len(), 2);
    }

    #[test]
    fn constant_condition_jump_collapses() {
        // LoadConst(true); PopJumpIfFalse(3); LoadConst(1); ReturnValue
        let mut c = CodeObj::new("t", 0);
        let t = c.add_constant(Value::Bool(true));
        let one = c.add_constant(Value::Int(1));
        c.emit(Op::LoadConst, t);
        c.emit(Op::PopJumpIfFalse, 3);
        c.emit(Op::LoadConst, one);
        c.emit(Op::ReturnValue, 0);
        let (out, _) = optimize(&c, &OptConfig::default());
        // condition always true -> never jumps -> LoadConst(1); ReturnValue survive
        assert_eq!(out.code.len(), 2);
        assert_eq!(out.constants[out.code[0].arg as usize], Value::Int(1));
    }

    #[test]
    fn compacts_nops_and_remaps_jump_targets() {
        let mut c = prog(vec![
            (Op::Nop, 0),
            (Op::JumpForward, 3),
            (Op::Nop, 0),
            (Op::ReturnValue, 0),
        ]);
        c.constants.push(Value::None);
        compact_nops(&mut c);
        assert_eq!(c.code.len(), 2);
        assert_eq!(c.code[0].op, Op::JumpForward);
        assert_eq!(c.code[0].arg, 1);
        assert_eq!(c.code[1].op, Op::ReturnValue);
    }

    #[test]
    fn installs_compare_and_swap_for_sorting_body() {
        // a[j] > a[j + 1] -> swap: t = a[j]; a[j] = a[j+1]; a[j+1] = t
        // Exactly the sequence `compiler.rs` emits for that expression.
        let mut c = CodeObj::new("t", 0);
        let one = c.add_constant(Value::Int(1));
        const ARR: u32 = 0;
        const J: u32 = 1;
        const T: u32 = 2;
        c.emit(Op::LoadFast, ARR);
        c.emit(Op::LoadFast, J);
        c.emit(Op::LoadSubscr, 0);
        c.emit(Op::LoadFast, ARR);
        c.emit(Op::LoadFast, J);
        c.emit(Op::LoadConst, one);
        c.emit(Op::BinaryOp, BinSub::Add as u32);
        c.emit(Op::LoadSubscr, 0);
        c.emit(Op::BinaryOp, BinSub::Gt as u32);
        c.emit(Op::PopJumpIfFalse, 19); // header is 10 instrs (0..10), body is 10..19
        c.emit(Op::LoadFast, ARR);
        c.emit(Op::LoadFast, J);
        c.emit(Op::LoadSubscr, 0);
        c.emit(Op::StoreFast, T);
        c.emit(Op::LoadFast, ARR);
        c.emit(Op::LoadFast, J);
        c.emit(Op::LoadConst, one);
        c.emit(Op::BinaryOp, BinSub::Add as u32);
        c.emit(Op::LoadSubscr, 0);
        assert_eq!(c.code.len(), 19);
        c.emit(Op::ReturnValue, 0);
        let installed = install_compare_and_swap(&mut c);
        assert_eq!(installed, 1);
        assert_eq!(c.code[0].op, Op::LoadFast);
        assert_eq!(c.code[0].arg, ARR);
        assert_eq!(c.code[1].op, Op::LoadFast);
        assert_eq!(c.code[1].arg, J);
        assert_eq!(c.code[2].op, Op::LoadFast);
        assert_eq!(c.code[2].arg, J);
        assert_eq!(c.code[3].op, Op::LoadConst);
        assert_eq!(c.constants[c.code[3].arg as usize], Value::Int(1));
        assert_eq!(c.code[4].op, Op::BinaryOp);
        assert_eq!(c.code[4].arg as u8, BinSub::Add as u8);
        assert_eq!(c.code[5].op, Op::CompareAndSwap);
        for nop in &c.code[6..19] {
            assert_eq!(nop.op, Op::Nop);
        }
    }

    #[test]
    fn removes_loop_whose_local_writes_are_never_read() {
        // for (int i = 0; i < 10; i += 1) { int t = i + 1; }  -- t unused outside
        let mut c = CodeObj::new("t", 1);
        c.local_count = 2;
        const I: u32 = 0;
        const T: u32 = 1;
        c.emit(Op::LoopStart, 0);
        c.emit(Op::LoadFast, I);
        c.emit(Op::BinaryOp, BinSub::Add as u32);
        c.emit(Op::StoreFast, T);
        c.emit(Op::JumpBackward, 1);
        c.emit(Op::LoopEnd, 0);
        c.emit(Op::PushNull, 0);
        c.emit(Op::ReturnValue, 0);
        let removed = remove_empty_loops(&mut c);
        assert_eq!(removed, 1);
        for nop in &c.code[0..6] {
            assert_eq!(nop.op, Op::Nop);
        }
        assert_eq!(c.code[6].op, Op::PushNull);
    }

    #[test]
    fn keeps_loop_whose_local_is_read_after_it() {
        let mut c = CodeObj::new("t", 1);
        c.local_count = 1;
        const I: u32 = 0;
        c.emit(Op::LoopStart, 0);
        c.emit(Op::LoadFast, I);
        c.emit(Op::StoreFast, I);
        c.emit(Op::JumpBackward, 1);
        c.emit(Op::LoopEnd, 0);
        c.emit(Op::LoadFast, I);
        c.emit(Op::ReturnValue, 0);
        let removed = remove_empty_loops(&mut c);
        assert_eq!(removed, 0);
        assert_eq!(c.code[0].op, Op::LoopStart);
    }
}
