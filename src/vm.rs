/// Stack-based bytecode interpreter.
///
/// Frames live on a `Vec` rather than recursing through native Rust calls —
/// a deeply-recursive language program (e.g. naive `fib`) therefore only
/// grows this `Vec`, not the Rust call stack, mirroring the teacher's own
/// `VmCore`'s frame-stack dispatch loop (`vm_core.rs`) even though the
/// value/heap model underneath is entirely new. Runtime type and bounds
/// errors never unwind: they log (when `debug` is set) and evaluate to
/// `None`, matching the language's "degrade, don't crash" error policy.
use std::rc::Rc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::bytecode::{BinSub, CodeObj, Op, UnSub, Value};
use crate::decimal::BigFloat;
use crate::heap::{Heap, NativeId, ObjRef, ObjectData};
use crate::intrinsics;
use crate::optimizer::{self, OptConfig};

#[derive(Debug, Clone)]
pub struct VmConfig {
    pub debug: bool,
    pub jit_enabled: bool,
    pub rng_seed: Option<u64>,
}

impl Default for VmConfig {
    fn default() -> Self {
        VmConfig { debug: false, jit_enabled: true, rng_seed: None }
    }
}

struct Frame {
    code: Rc<CodeObj>,
    ip: usize,
    locals: Vec<ObjRef>,
    stack: Vec<ObjRef>,
}

impl Frame {
    fn new(code: Rc<CodeObj>, none: ObjRef) -> Self {
        let local_count = code.local_count.max(code.arg_count);
        Frame { code, ip: 0, locals: vec![none; local_count], stack: Vec::new() }
    }
}

pub struct Vm {
    pub heap: Heap,
    globals: Vec<ObjRef>,
    frames: Vec<Frame>,
    rng: StdRng,
    pub config: VmConfig,
}

impl Vm {
    pub fn new(global_count: usize, config: VmConfig) -> Self {
        let mut heap = Heap::new();
        let none = heap.none();
        let mut globals = vec![none; global_count];
        // Builtin reservation: print=0, input=1, randint=2, sqrt=3. Order is
        // load-bearing — intrinsics.rs's NativeId values must match.
        for (slot, id) in [0u8, 1, 2, 3].into_iter().enumerate() {
            globals[slot] = heap.alloc_native(NativeId(id));
        }
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Vm { heap, globals, frames: Vec::new(), rng, config }
    }

    fn dprint(&self, msg: impl AsRef<str>) {
        if self.config.debug {
            eprintln!("[vm] {}", msg.as_ref());
        }
    }

    /// Runs `code` as the top-level module frame to completion, returning
    /// its final value (the caller is responsible for decreffing it).
    pub fn run(&mut self, code: Rc<CodeObj>) -> ObjRef {
        let none = self.heap.none();
        self.frames.push(Frame::new(code, none));
        loop {
            let idx = self.frames.len() - 1;
            let ip = self.frames[idx].ip;
            if ip >= self.frames[idx].code.code.len() {
                // Fell off the end without an explicit return (shouldn't
                // happen — the compiler always appends one) — treat as
                // `return none;`.
                let v = self.heap.none();
                if let Some(result) = self.do_return(v) {
                    return result;
                }
                continue;
            }
            let instr = self.frames[idx].code.code[ip];
            self.frames[idx].ip = ip + 1;
            if let Some(result) = self.step(idx, instr) {
                return result;
            }
        }
    }

    /// Executes one instruction. Returns `Some(value)` only when the whole
    /// program has finished (the outermost frame just returned).
    fn step(&mut self, idx: usize, instr: crate::bytecode::Instruction) -> Option<ObjRef> {
        match instr.op {
            Op::LoadConst => {
                let v = match &self.frames[idx].code.constants[instr.arg as usize] {
                    Value::Int(n) => self.heap.alloc_int(*n),
                    Value::Bool(b) => self.heap.bool_ref(*b),
                    Value::None => self.heap.none(),
                    Value::Float(f) => self.heap.alloc_float(f.clone()),
                    Value::Code(rc) => self.heap.alloc_code_marker(rc.clone()),
                };
                self.frames[idx].stack.push(v);
                None
            }
            Op::LoadFast => {
                let v = self.frames[idx].locals[instr.arg as usize];
                self.heap.incref(v);
                self.frames[idx].stack.push(v);
                None
            }
            Op::StoreFast => {
                let v = self.frames[idx].stack.pop().expect("stack underflow: STORE_FAST");
                let slot = instr.arg as usize;
                let old = self.frames[idx].locals[slot];
                self.heap.decref(old);
                self.frames[idx].locals[slot] = v;
                None
            }
            Op::LoadGlobal => {
                let slot = (instr.arg >> 1) as usize;
                let v = self.globals[slot];
                self.heap.incref(v);
                self.frames[idx].stack.push(v);
                None
            }
            Op::StoreGlobal => {
                let v = self.frames[idx].stack.pop().expect("stack underflow: STORE_GLOBAL");
                let slot = instr.arg as usize;
                let old = self.globals[slot];
                self.heap.decref(old);
                self.globals[slot] = v;
                None
            }
            Op::BinaryOp => {
                let right = self.frames[idx].stack.pop().expect("stack underflow: BINARY_OP rhs");
                let left = self.frames[idx].stack.pop().expect("stack underflow: BINARY_OP lhs");
                let sub = BinSub::from_u8(instr.arg as u8).expect("invalid BINARY_OP sub-code");
                let result = self.binary_op(sub, left, right);
                self.heap.decref(left);
                self.heap.decref(right);
                self.frames[idx].stack.push(result);
                None
            }
            Op::UnaryOp => {
                let operand = self.frames[idx].stack.pop().expect("stack underflow: UNARY_OP");
                let sub = UnSub::from_u8(instr.arg as u8).expect("invalid UNARY_OP sub-code");
                let result = self.unary_op(sub, operand);
                self.heap.decref(operand);
                self.frames[idx].stack.push(result);
                None
            }
            Op::PopJumpIfFalse => {
                let v = self.frames[idx].stack.pop().expect("stack underflow: POP_JUMP_IF_FALSE");
                let truthy = self.heap.truthy(v);
                self.heap.decref(v);
                if !truthy {
                    self.frames[idx].ip = instr.arg as usize;
                }
                None
            }
            Op::PopJumpIfTrue => {
                let v = self.frames[idx].stack.pop().expect("stack underflow: POP_JUMP_IF_TRUE");
                let truthy = self.heap.truthy(v);
                self.heap.decref(v);
                if truthy {
                    self.frames[idx].ip = instr.arg as usize;
                }
                None
            }
            Op::JumpForward | Op::JumpBackward | Op::BreakLoop | Op::ContinueLoop => {
                self.frames[idx].ip = instr.arg as usize;
                None
            }
            Op::ReturnValue => {
                let v = self.frames[idx].stack.pop().expect("stack underflow: RETURN_VALUE");
                self.do_return(v)
            }
            Op::Nop => None,
            Op::PushNull => {
                let v = self.heap.none();
                self.frames[idx].stack.push(v);
                None
            }
            Op::CallFunction => self.call_function(idx, instr.arg as usize),
            Op::MakeFunction => {
                let marker = self.frames[idx].stack.pop().expect("stack underflow: MAKE_FUNCTION");
                let code = match self.heap.data(marker) {
                    ObjectData::CodeMarker(rc) => rc.clone(),
                    other => unreachable!("MAKE_FUNCTION expects a code marker, found {:?}", other),
                };
                self.heap.decref(marker);
                let f = self.heap.alloc_function(code.clone());
                // Rewrite eagerly at MAKE_FUNCTION time rather than waiting
                // for a call-count threshold: functions in this language are
                // declared once at module load and never redefined, so
                // there's no benefit to deferring past the point the body
                // first becomes observable.
                if self.config.jit_enabled {
                    let (optimized, stats) = optimizer::optimize(&code, &OptConfig::default());
                    if stats.folded > 0 || stats.peepholed > 0 || stats.dead_removed > 0 || stats.superinstructions_installed > 0 {
                        self.dprint(format!(
                            "jit: rewrote {} (folded={} peephole={} dead={} super={})",
                            code.name, stats.folded, stats.peepholed, stats.dead_removed, stats.superinstructions_installed
                        ));
                    }
                    if let ObjectData::Function { jit_code, .. } = self.heap.data_mut(f) {
                        *jit_code = Some(Rc::new(optimized));
                    }
                }
                self.frames[idx].stack.push(f);
                None
            }
            Op::BuildArray => {
                let n = instr.arg as usize;
                let len = self.frames[idx].stack.len();
                let items: Vec<ObjRef> = self.frames[idx].stack.split_off(len - n);
                let arr = self.heap.alloc_array(items);
                self.frames[idx].stack.push(arr);
                None
            }
            Op::LoadSubscr => {
                let index = self.frames[idx].stack.pop().expect("stack underflow: LOAD_SUBSCR index");
                let array = self.frames[idx].stack.pop().expect("stack underflow: LOAD_SUBSCR array");
                let result = self.load_subscr(array, index);
                self.heap.decref(array);
                self.heap.decref(index);
                self.frames[idx].stack.push(result);
                None
            }
            Op::StoreSubscr => {
                let value = self.frames[idx].stack.pop().expect("stack underflow: STORE_SUBSCR value");
                let index = self.frames[idx].stack.pop().expect("stack underflow: STORE_SUBSCR index");
                let array = self.frames[idx].stack.pop().expect("stack underflow: STORE_SUBSCR array");
                self.store_subscr(array, index, value);
                self.heap.decref(array);
                self.heap.decref(index);
                None
            }
            Op::Pop => {
                let v = self.frames[idx].stack.pop().expect("stack underflow: POP");
                self.heap.decref(v);
                None
            }
            Op::CompareAndSwap => {
                self.compare_and_swap(idx);
                None
            }
            Op::LoopStart | Op::LoopEnd => None,
        }
    }

    /// Pops the current frame, decrefs its locals, and either hands the
    /// return value to the caller's stack or — if this was the outermost
    /// frame — finishes the program.
    fn do_return(&mut self, value: ObjRef) -> Option<ObjRef> {
        let frame = self.frames.pop().expect("RETURN_VALUE with no active frame");
        for local in frame.locals {
            self.heap.decref(local);
        }
        for leftover in frame.stack {
            self.heap.decref(leftover);
        }
        if self.frames.is_empty() {
            Some(value)
        } else {
            let idx = self.frames.len() - 1;
            self.frames[idx].stack.push(value);
            None
        }
    }

    fn call_function(&mut self, idx: usize, argc: usize) -> Option<ObjRef> {
        let len = self.frames[idx].stack.len();
        let args: Vec<ObjRef> = self.frames[idx].stack.split_off(len - argc);
        // Reserved slot pushed by `PUSH_NULL` just after the callee; popped
        // and decreffed here, before the callee itself comes off the stack.
        let null_slot = self.frames[idx].stack.pop().expect("stack underflow: CALL_FUNCTION null slot");
        self.heap.decref(null_slot);
        let callee = self.frames[idx].stack.pop().expect("stack underflow: CALL_FUNCTION callee");
        match self.heap.data(callee).clone() {
            ObjectData::Function { code, jit_code, .. } => {
                if let ObjectData::Function { call_count, .. } = self.heap.data_mut(callee) {
                    *call_count += 1;
                }
                let body = jit_code.unwrap_or(code);
                self.heap.decref(callee);
                let mut frame = Frame::new(body, self.heap.none());
                for (i, a) in args.into_iter().enumerate() {
                    if i < frame.locals.len() {
                        frame.locals[i] = a;
                    } else {
                        self.heap.decref(a);
                    }
                }
                self.frames.push(frame);
                None
            }
            ObjectData::Native(id) => {
                self.heap.decref(callee);
                let result = intrinsics::call_native(self, id, args);
                self.frames[idx].stack.push(result);
                None
            }
            other => {
                self.dprint(format!("call on non-callable value of type {:?}", other));
                for a in args {
                    self.heap.decref(a);
                }
                self.heap.decref(callee);
                let none = self.heap.none();
                self.frames[idx].stack.push(none);
                None
            }
        }
    }

    fn load_subscr(&mut self, array: ObjRef, index: ObjRef) -> ObjRef {
        let i = match self.heap.data(index) {
            ObjectData::Int(n) => *n,
            _ => {
                self.dprint("array index is not an int; evaluating to none");
                return self.heap.none();
            }
        };
        let items = match self.heap.data(array) {
            ObjectData::Array(items) => items.clone(),
            _ => {
                self.dprint("subscript on a non-array value; evaluating to none");
                return self.heap.none();
            }
        };
        if i < 0 || i as usize >= items.len() {
            self.dprint(format!("array index {} out of bounds (len {})", i, items.len()));
            return self.heap.none();
        }
        let v = items[i as usize];
        self.heap.incref(v);
        v
    }

    fn store_subscr(&mut self, array: ObjRef, index: ObjRef, value: ObjRef) {
        let i = match self.heap.data(index) {
            ObjectData::Int(n) => *n,
            _ => {
                self.dprint("array index is not an int; assignment ignored");
                self.heap.decref(value);
                return;
            }
        };
        let len = match self.heap.data(array) {
            ObjectData::Array(items) => items.len(),
            _ => {
                self.dprint("subscript-assign on a non-array value; ignored");
                self.heap.decref(value);
                return;
            }
        };
        if i < 0 || i as usize >= len {
            self.dprint(format!("array index {} out of bounds (len {})", i, len));
            self.heap.decref(value);
            return;
        }
        let old = if let ObjectData::Array(items) = self.heap.data_mut(array) {
            std::mem::replace(&mut items[i as usize], value)
        } else {
            unreachable!()
        };
        self.heap.decref(old);
    }

    // -- arithmetic ----------------------------------------------------------

    fn as_float(&self, r: ObjRef) -> Option<BigFloat> {
        match self.heap.data(r) {
            ObjectData::Float(f) => Some(f.clone()),
            ObjectData::Int(n) => Some(BigFloat::from_i64(*n)),
            _ => None,
        }
    }

    fn is_float(&self, r: ObjRef) -> bool {
        matches!(self.heap.data(r), ObjectData::Float(_))
    }

    fn binary_op(&mut self, op: BinSub, left: ObjRef, right: ObjRef) -> ObjRef {
        use ObjectData::*;
        match op {
            BinSub::And => {
                let v = self.heap.truthy(left) && self.heap.truthy(right);
                return self.heap.bool_ref(v);
            }
            BinSub::Or => {
                let v = self.heap.truthy(left) || self.heap.truthy(right);
                return self.heap.bool_ref(v);
            }
            _ => {}
        }
        let float_mode = self.is_float(left) || self.is_float(right);
        match op {
            BinSub::Eq | BinSub::Ne | BinSub::Lt | BinSub::Le | BinSub::Gt | BinSub::Ge => {
                return self.compare_op(op, left, right, float_mode);
            }
            _ => {}
        }
        if float_mode {
            let (Some(a), Some(b)) = (self.as_float(left), self.as_float(right)) else {
                self.dprint("arithmetic on a non-numeric value; evaluating to none");
                return self.heap.none();
            };
            let result = match op {
                BinSub::Add => a.add(&b),
                BinSub::Sub => a.sub(&b),
                BinSub::Mul => a.mul(&b),
                BinSub::Div => a.div(&b),
                BinSub::Rem => a.rem(&b),
                _ => unreachable!(),
            };
            self.heap.alloc_float(result)
        } else {
            let (a, b) = match (self.heap.data(left), self.heap.data(right)) {
                (Int(a), Int(b)) => (*a, *b),
                _ => {
                    self.dprint("arithmetic on a non-numeric value; evaluating to none");
                    return self.heap.none();
                }
            };
            let result = match op {
                BinSub::Add => a.wrapping_add(b),
                BinSub::Sub => a.wrapping_sub(b),
                BinSub::Mul => a.wrapping_mul(b),
                BinSub::Div => {
                    if b == 0 {
                        self.dprint("integer division by zero; evaluating to 0");
                        0
                    } else {
                        a.wrapping_div(b)
                    }
                }
                BinSub::Rem => {
                    if b == 0 {
                        self.dprint("integer remainder by zero; evaluating to 0");
                        0
                    } else {
                        a.wrapping_rem(b)
                    }
                }
                _ => unreachable!(),
            };
            self.heap.alloc_int(result)
        }
    }

    fn compare_op(&mut self, op: BinSub, left: ObjRef, right: ObjRef, float_mode: bool) -> ObjRef {
        use std::cmp::Ordering;
        let ordering = if float_mode {
            match (self.as_float(left), self.as_float(right)) {
                (Some(a), Some(b)) => Some(a.cmp_tolerant(&b)),
                _ => None,
            }
        } else {
            match (self.heap.data(left), self.heap.data(right)) {
                (ObjectData::Int(a), ObjectData::Int(b)) => Some(a.cmp(b)),
                (ObjectData::Bool(a), ObjectData::Bool(b)) => Some(a.cmp(b)),
                _ => None,
            }
        };
        let result = match (op, ordering) {
            (BinSub::Eq, Some(Ordering::Equal)) => true,
            (BinSub::Eq, Some(_)) => false,
            (BinSub::Eq, None) => self.structural_eq(left, right),
            (BinSub::Ne, Some(Ordering::Equal)) => false,
            (BinSub::Ne, Some(_)) => true,
            (BinSub::Ne, None) => !self.structural_eq(left, right),
            (BinSub::Lt, Some(o)) => o == Ordering::Less,
            (BinSub::Le, Some(o)) => o != Ordering::Greater,
            (BinSub::Gt, Some(o)) => o == Ordering::Greater,
            (BinSub::Ge, Some(o)) => o != Ordering::Less,
            (_, None) => {
                self.dprint("ordering comparison on non-numeric values; evaluating to false");
                false
            }
            _ => unreachable!(),
        };
        self.heap.bool_ref(result)
    }

    fn structural_eq(&self, left: ObjRef, right: ObjRef) -> bool {
        match (self.heap.data(left), self.heap.data(right)) {
            (ObjectData::None, ObjectData::None) => true,
            (ObjectData::Bool(a), ObjectData::Bool(b)) => a == b,
            (ObjectData::Int(a), ObjectData::Int(b)) => a == b,
            (ObjectData::Float(a), ObjectData::Float(b)) => a.cmp_tolerant(b) == std::cmp::Ordering::Equal,
            _ => false,
        }
    }

    fn unary_op(&mut self, op: UnSub, operand: ObjRef) -> ObjRef {
        match op {
            UnSub::Not => {
                let v = !self.heap.truthy(operand);
                self.heap.bool_ref(v)
            }
            UnSub::Pos => match self.heap.data(operand) {
                ObjectData::Int(n) => self.heap.alloc_int(*n),
                ObjectData::Float(f) => self.heap.alloc_float(f.clone()),
                _ => {
                    self.dprint("unary '+' on a non-numeric value; evaluating to none");
                    self.heap.none()
                }
            },
            UnSub::Neg => match self.heap.data(operand) {
                ObjectData::Int(n) => self.heap.alloc_int(n.wrapping_neg()),
                ObjectData::Float(f) => self.heap.alloc_float(f.neg()),
                _ => {
                    self.dprint("unary '-' on a non-numeric value; evaluating to none");
                    self.heap.none()
                }
            },
        }
    }

    pub fn next_random(&mut self, lo: i64, hi: i64) -> i64 {
        if hi < lo {
            return lo;
        }
        self.rng.gen_range(lo..=hi)
    }

    /// The JIT-only super-instruction from the optimizer's compare-and-swap
    /// pattern: the kernel that produces it pushes `arr`, `j`, `j+1` (top to
    /// bottom: `j+1`, `j`, `arr`), so this op pops exactly those three stack
    /// operands like any other instruction, compares `arr[j]` and `arr[j+1]`,
    /// and swaps them in place if `arr[j] > arr[j+1]` — replacing ten plain
    /// instructions with one when the optimizer recognizes a sorting
    /// pattern's inner comparison.
    fn compare_and_swap(&mut self, idx: usize) {
        let j_plus_1_ref = self.frames[idx].stack.pop().expect("stack underflow: COMPARE_AND_SWAP j+1");
        let j_ref = self.frames[idx].stack.pop().expect("stack underflow: COMPARE_AND_SWAP j");
        let array_ref = self.frames[idx].stack.pop().expect("stack underflow: COMPARE_AND_SWAP array");

        (|| {
            let j = match self.heap.data(j_ref) {
                ObjectData::Int(n) => *n,
                _ => return,
            };
            let j1 = match self.heap.data(j_plus_1_ref) {
                ObjectData::Int(n) => *n,
                _ => return,
            };
            let items = match self.heap.data(array_ref) {
                ObjectData::Array(items) => items.clone(),
                _ => return,
            };
            if j < 0 || j1 < 0 || j as usize >= items.len() || j1 as usize >= items.len() {
                return;
            }
            let (aj, aj1) = (items[j as usize], items[j1 as usize]);
            if self.compare_gt(aj, aj1) {
                if let ObjectData::Array(items) = self.heap.data_mut(array_ref) {
                    items.swap(j as usize, j1 as usize);
                }
            }
        })();

        self.heap.decref(array_ref);
        self.heap.decref(j_ref);
        self.heap.decref(j_plus_1_ref);
    }

    /// Shared ordering used by `COMPARE_AND_SWAP`: the same float/int/bool
    /// rules as `compare_op`'s `Gt` arm, without needing a live `BinSub`.
    fn compare_gt(&self, left: ObjRef, right: ObjRef) -> bool {
        use std::cmp::Ordering;
        let float_mode = self.is_float(left) || self.is_float(right);
        let ordering = if float_mode {
            match (self.as_float(left), self.as_float(right)) {
                (Some(a), Some(b)) => Some(a.cmp_tolerant(&b)),
                _ => None,
            }
        } else {
            match (self.heap.data(left), self.heap.data(right)) {
                (ObjectData::Int(a), ObjectData::Int(b)) => Some(a.cmp(b)),
                (ObjectData::Bool(a), ObjectData::Bool(b)) => Some(a.cmp(b)),
                _ => None,
            }
        };
        ordering == Some(Ordering::Greater)
    }
}
