/// The refcounted runtime object model.
///
/// Every runtime value lives in a `Heap` slab and is addressed by an
/// `ObjRef` handle (an index, not a pointer) — this keeps the manual
/// reference-counting the language demands entirely in safe Rust, the way a
/// slab/arena would in any idiomatic Rust interpreter, while still exposing
/// explicit `incref`/`decref` as first-class operations the VM calls the
/// same way a C host would. `None`, `True`, and `False` are immortal
/// singletons allocated once and never freed; `incref`/`decref` on them are
/// no-ops.
use std::fmt;
use std::rc::Rc;

use crate::bytecode::CodeObj;
use crate::decimal::BigFloat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjRef(u32);

const NONE_SLOT: u32 = 0;
const TRUE_SLOT: u32 = 1;
const FALSE_SLOT: u32 = 2;

#[derive(Debug, Clone)]
pub enum ObjectData {
    Int(i64),
    Bool(bool),
    None,
    Float(BigFloat),
    Array(Vec<ObjRef>),
    Function {
        code: Rc<CodeObj>,
        /// Number of times this function has been called; the JIT consults
        /// this to decide whether to install an optimized body.
        call_count: u64,
        jit_code: Option<Rc<CodeObj>>,
    },
    Native(NativeId),
    /// A bare code object awaiting `MAKE_FUNCTION`. Never observed by
    /// language code — `LoadConst` produces these only as the direct input
    /// to the very next instruction, keeping `CodeObj` itself free of any
    /// reference back to the `Function` it eventually backs.
    CodeMarker(Rc<CodeObj>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeId(pub u8);

struct Slot {
    refcount: u32,
    data: ObjectData,
}

pub struct Heap {
    slots: Vec<Option<Slot>>,
    free_list: Vec<u32>,
}

impl Heap {
    pub fn new() -> Self {
        let mut h = Heap { slots: Vec::new(), free_list: Vec::new() };
        let none = h.push_slot(ObjectData::None, u32::MAX);
        let tru = h.push_slot(ObjectData::Bool(true), u32::MAX);
        let fal = h.push_slot(ObjectData::Bool(false), u32::MAX);
        debug_assert_eq!(none.0, NONE_SLOT);
        debug_assert_eq!(tru.0, TRUE_SLOT);
        debug_assert_eq!(fal.0, FALSE_SLOT);
        h
    }

    fn push_slot(&mut self, data: ObjectData, refcount: u32) -> ObjRef {
        if let Some(idx) = self.free_list.pop() {
            self.slots[idx as usize] = Some(Slot { refcount, data });
            ObjRef(idx)
        } else {
            self.slots.push(Some(Slot { refcount, data }));
            ObjRef((self.slots.len() - 1) as u32)
        }
    }

    pub fn none(&self) -> ObjRef {
        ObjRef(NONE_SLOT)
    }

    pub fn bool_ref(&self, b: bool) -> ObjRef {
        if b { ObjRef(TRUE_SLOT) } else { ObjRef(FALSE_SLOT) }
    }

    fn is_immortal(r: ObjRef) -> bool {
        r.0 == NONE_SLOT || r.0 == TRUE_SLOT || r.0 == FALSE_SLOT
    }

    pub fn alloc_int(&mut self, v: i64) -> ObjRef {
        self.push_slot(ObjectData::Int(v), 1)
    }

    pub fn alloc_float(&mut self, v: BigFloat) -> ObjRef {
        self.push_slot(ObjectData::Float(v), 1)
    }

    /// Adopts ownership of `items`' references — the caller must not also
    /// decref them, matching `BUILD_ARRAY` popping N owned stack slots
    /// straight into the new array.
    pub fn alloc_array(&mut self, items: Vec<ObjRef>) -> ObjRef {
        self.push_slot(ObjectData::Array(items), 1)
    }

    pub fn alloc_function(&mut self, code: Rc<CodeObj>) -> ObjRef {
        self.push_slot(ObjectData::Function { code, call_count: 0, jit_code: None }, 1)
    }

    pub fn alloc_native(&mut self, id: NativeId) -> ObjRef {
        self.push_slot(ObjectData::Native(id), 1)
    }

    pub fn alloc_code_marker(&mut self, code: Rc<CodeObj>) -> ObjRef {
        self.push_slot(ObjectData::CodeMarker(code), 1)
    }

    pub fn incref(&mut self, r: ObjRef) {
        if Self::is_immortal(r) {
            return;
        }
        if let Some(slot) = self.slots[r.0 as usize].as_mut() {
            slot.refcount += 1;
        }
    }

    pub fn decref(&mut self, r: ObjRef) {
        if Self::is_immortal(r) {
            return;
        }
        let should_free = if let Some(slot) = self.slots[r.0 as usize].as_mut() {
            slot.refcount -= 1;
            slot.refcount == 0
        } else {
            false
        };
        if should_free {
            self.free(r);
        }
    }

    fn free(&mut self, r: ObjRef) {
        let data = self.slots[r.0 as usize].take().map(|s| s.data);
        if let Some(ObjectData::Array(items)) = data {
            for item in items {
                self.decref(item);
            }
        }
        self.free_list.push(r.0);
    }

    pub fn data(&self, r: ObjRef) -> &ObjectData {
        &self.slots[r.0 as usize].as_ref().expect("dangling object reference").data
    }

    pub fn data_mut(&mut self, r: ObjRef) -> &mut ObjectData {
        &mut self.slots[r.0 as usize].as_mut().expect("dangling object reference").data
    }

    pub fn refcount(&self, r: ObjRef) -> u32 {
        self.slots[r.0 as usize].as_ref().map(|s| s.refcount).unwrap_or(0)
    }

    /// Number of live (non-singleton) allocations — used by tests to verify
    /// refcount conservation across a VM run.
    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count().saturating_sub(3)
    }

    pub fn type_name(&self, r: ObjRef) -> &'static str {
        match self.data(r) {
            ObjectData::Int(_) => "int",
            ObjectData::Bool(_) => "bool",
            ObjectData::None => "none",
            ObjectData::Float(_) => "float",
            ObjectData::Array(_) => "array",
            ObjectData::Function { .. } => "function",
            ObjectData::Native(_) => "native",
            ObjectData::CodeMarker(_) => "code",
        }
    }

    pub fn truthy(&self, r: ObjRef) -> bool {
        match self.data(r) {
            ObjectData::Int(n) => *n != 0,
            ObjectData::Bool(b) => *b,
            ObjectData::None => false,
            ObjectData::Float(f) => f.is_truthy(),
            ObjectData::Array(_) => true,
            ObjectData::Function { .. } | ObjectData::Native(_) | ObjectData::CodeMarker(_) => true,
        }
    }

    pub fn display(&self, r: ObjRef) -> String {
        match self.data(r) {
            ObjectData::Int(n) => n.to_string(),
            ObjectData::Bool(b) => b.to_string(),
            ObjectData::None => "None".to_string(),
            ObjectData::Float(f) => f.to_string(),
            ObjectData::Array(items) => {
                let parts: Vec<String> = items.iter().map(|it| self.display(*it)).collect();
                format!("[{}]", parts.join(", "))
            }
            ObjectData::Function { code, .. } => format!("<function {}>", code.name),
            ObjectData::Native(id) => format!("<native #{}>", id.0),
            ObjectData::CodeMarker(code) => format!("<code {}>", code.name),
        }
    }
}

impl fmt::Debug for Heap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Heap(live={})", self.live_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn singletons_are_immortal() {
        let mut h = Heap::new();
        let n = h.none();
        for _ in 0..5 {
            h.decref(n);
        }
        assert_eq!(h.type_name(n), "none");
    }

    #[test]
    fn array_free_decrefs_children() {
        let mut h = Heap::new();
        let a = h.alloc_int(1);
        let b = h.alloc_int(2);
        let arr = h.alloc_array(vec![a, b]);
        assert_eq!(h.live_count(), 3);
        h.decref(arr);
        assert_eq!(h.live_count(), 0);
    }

    #[test]
    fn incref_keeps_object_alive_across_one_decref() {
        let mut h = Heap::new();
        let a = h.alloc_int(7);
        h.incref(a);
        h.decref(a);
        assert_eq!(h.live_count(), 1);
        h.decref(a);
        assert_eq!(h.live_count(), 0);
    }
}
