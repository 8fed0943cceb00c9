/// Native functions bound to the four reserved global slots.
///
/// Each native receives its arguments as a `Vec<ObjRef>` of owned
/// references (popped straight off the caller's operand stack by
/// `Vm::call_function`) and is responsible for decreffing them once it is
/// done — nothing else in the dispatch loop does that on a native's behalf,
/// mirroring the "caller hands off ownership, callee settles it" convention
/// `vm.rs` uses for user-function calls.
use std::io::{BufRead, Write};

use crate::decimal::BigFloat;
use crate::heap::{NativeId, ObjRef, ObjectData};
use crate::vm::Vm;

const MAX_INPUT_BYTES: usize = 4096;

pub fn call_native(vm: &mut Vm, id: NativeId, args: Vec<ObjRef>) -> ObjRef {
    match id.0 {
        0 => print_fn(vm, args),
        1 => input_fn(vm, args),
        2 => randint_fn(vm, args),
        3 => sqrt_fn(vm, args),
        other => {
            for a in args {
                vm.heap.decref(a);
            }
            if vm.config.debug {
                eprintln!("[vm] call to unknown native id {}", other);
            }
            vm.heap.none()
        }
    }
}

fn print_fn(vm: &mut Vm, args: Vec<ObjRef>) -> ObjRef {
    let parts: Vec<String> = args.iter().map(|a| vm.heap.display(*a)).collect();
    for a in args {
        vm.heap.decref(a);
    }
    let stdout = std::io::stdout();
    let mut lock = stdout.lock();
    let _ = writeln!(lock, "{}", parts.join(" "));
    let _ = lock.flush();
    vm.heap.none()
}

fn input_fn(vm: &mut Vm, args: Vec<ObjRef>) -> ObjRef {
    if let Some(prompt) = args.first() {
        print!("{} ", vm.heap.display(*prompt));
        let _ = std::io::stdout().flush();
    }
    for a in args {
        vm.heap.decref(a);
    }
    let mut line = String::new();
    let stdin = std::io::stdin();
    let read = stdin.lock().read_line(&mut line);
    let value = match read {
        Ok(_) => {
            let trimmed = line.trim();
            let truncated = &trimmed[..trimmed.len().min(MAX_INPUT_BYTES)];
            truncated.parse::<i64>().unwrap_or(0)
        }
        Err(_) => 0,
    };
    vm.heap.alloc_int(value)
}

fn randint_fn(vm: &mut Vm, args: Vec<ObjRef>) -> ObjRef {
    if args.len() != 2 {
        for a in args {
            vm.heap.decref(a);
        }
        return vm.heap.none();
    }
    let (lo, hi) = match (vm.heap.data(args[0]), vm.heap.data(args[1])) {
        (ObjectData::Int(a), ObjectData::Int(b)) => (*a, *b),
        _ => {
            for a in args {
                vm.heap.decref(a);
            }
            return vm.heap.none();
        }
    };
    for a in args {
        vm.heap.decref(a);
    }
    if lo > hi {
        return vm.heap.none();
    }
    let n = vm.next_random(lo, hi);
    vm.heap.alloc_int(n)
}

fn sqrt_fn(vm: &mut Vm, args: Vec<ObjRef>) -> ObjRef {
    let input = match args.first() {
        Some(r) => match vm.heap.data(*r) {
            ObjectData::Int(n) => Some(BigFloat::from_i64(*n)),
            ObjectData::Bool(b) => Some(BigFloat::from_i64(if *b { 1 } else { 0 })),
            ObjectData::Float(f) => Some(f.clone()),
            _ => None,
        },
        None => None,
    };
    for a in args {
        vm.heap.decref(a);
    }
    let result = match input {
        Some(f) => f.sqrt(),
        None => BigFloat::nan(),
    };
    vm.heap.alloc_float(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::VmConfig;

    #[test]
    fn sqrt_of_int_returns_float() {
        let mut vm = Vm::new(4, VmConfig { rng_seed: Some(1), ..VmConfig::default() });
        let four = vm.heap.alloc_int(4);
        let r = call_native(&mut vm, NativeId(3), vec![four]);
        match vm.heap.data(r) {
            ObjectData::Float(f) => assert_eq!(f.to_string(), "2"),
            other => panic!("expected float, got {:?}", other),
        }
    }

    #[test]
    fn randint_respects_bounds() {
        let mut vm = Vm::new(4, VmConfig { rng_seed: Some(42), ..VmConfig::default() });
        for _ in 0..20 {
            let lo = vm.heap.alloc_int(3);
            let hi = vm.heap.alloc_int(7);
            let r = call_native(&mut vm, NativeId(2), vec![lo, hi]);
            match vm.heap.data(r) {
                ObjectData::Int(n) => assert!(*n >= 3 && *n <= 7),
                other => panic!("expected int, got {:?}", other),
            }
            vm.heap.decref(r);
        }
    }

    #[test]
    fn randint_with_inverted_bounds_is_none() {
        let mut vm = Vm::new(4, VmConfig { rng_seed: Some(7), ..VmConfig::default() });
        let lo = vm.heap.alloc_int(9);
        let hi = vm.heap.alloc_int(2);
        let r = call_native(&mut vm, NativeId(2), vec![lo, hi]);
        assert_eq!(vm.heap.type_name(r), "none");
    }
}
