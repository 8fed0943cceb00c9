/// AST → bytecode compiler.
///
/// Globals and locals are resolved by name at compile time (`GlobalTable` /
/// a per-function `locals: Vec<String>`, mirroring the teacher's
/// `RegAlloc`/`GlobalTable` split in `compiler.rs`). A `collect_declarations`
/// pre-pass walks the module once before emitting any code so a function can
/// call another function declared later in the file, and reserves the first
/// four global slots for the built-ins in a fixed order — the VM and
/// `intrinsics.rs` both depend on that order, so it must never change.
use std::rc::Rc;

use crate::ast::*;
use crate::bytecode::{BinSub, CodeObj, Op, UnSub, Value};
use crate::decimal::BigFloat;
use crate::errors::CompileError;

pub const BUILTIN_NAMES: [&str; 4] = ["print", "input", "randint", "sqrt"];

pub struct GlobalTable {
    names: Vec<String>,
}

impl GlobalTable {
    pub fn with_builtins() -> Self {
        GlobalTable { names: BUILTIN_NAMES.iter().map(|s| s.to_string()).collect() }
    }

    pub fn get(&self, name: &str) -> Option<u32> {
        self.names.iter().position(|n| n == name).map(|i| i as u32)
    }

    pub fn get_or_add(&mut self, name: &str) -> u32 {
        if let Some(idx) = self.get(name) {
            return idx;
        }
        self.names.push(name.to_string());
        (self.names.len() - 1) as u32
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }
}

struct LoopCtx {
    break_jumps: Vec<usize>,
    continue_jumps: Vec<usize>,
}

/// One `Compiler` instance per function body (and one for the module's
/// top-level statements), matching the spec's requirement that nested
/// function declarations compile through their own nested compiler rather
/// than sharing local-variable state with their enclosing scope.
pub struct Compiler<'g> {
    code: CodeObj,
    locals: Vec<String>,
    globals: &'g mut GlobalTable,
    loop_stack: Vec<LoopCtx>,
}

impl<'g> Compiler<'g> {
    fn new(name: &str, arg_count: usize, globals: &'g mut GlobalTable) -> Self {
        Compiler { code: CodeObj::new(name, arg_count), locals: Vec::new(), globals, loop_stack: Vec::new() }
    }

    fn resolve_local(&self, name: &str) -> Option<u32> {
        self.locals.iter().position(|n| n == name).map(|i| i as u32)
    }

    fn declare_local(&mut self, name: &str) -> u32 {
        if let Some(idx) = self.resolve_local(name) {
            return idx;
        }
        self.locals.push(name.to_string());
        self.code.local_count = self.locals.len();
        (self.locals.len() - 1) as u32
    }

    fn emit_load_name(&mut self, name: &str, span: crate::errors::Span) -> Result<(), CompileError> {
        if let Some(idx) = self.resolve_local(name) {
            self.code.emit(Op::LoadFast, idx);
            return Ok(());
        }
        if let Some(idx) = self.globals.get(name) {
            self.code.emit(Op::LoadGlobal, idx << 1);
            return Ok(());
        }
        Err(CompileError::UndefinedVariable { name: name.to_string(), span })
    }

    fn emit_store_name(&mut self, name: &str) {
        if let Some(idx) = self.resolve_local(name) {
            self.code.emit(Op::StoreFast, idx);
        } else {
            let idx = self.globals.get_or_add(name);
            self.code.emit(Op::StoreGlobal, idx);
        }
    }

    // -- expressions -------------------------------------------------------

    fn compile_expr(&mut self, expr: &Expr) -> Result<(), CompileError> {
        match expr {
            Expr::IntLit(v, _) => {
                let idx = self.code.add_constant(Value::Int(*v));
                self.code.emit(Op::LoadConst, idx);
            }
            Expr::FloatLit(v, _) => {
                let idx = self.code.add_constant(Value::Float(v.clone()));
                self.code.emit(Op::LoadConst, idx);
            }
            Expr::BoolLit(v, _) => {
                let idx = self.code.add_constant(Value::Bool(*v));
                self.code.emit(Op::LoadConst, idx);
            }
            Expr::NoneLit(_) => {
                self.code.emit(Op::PushNull, 0);
            }
            Expr::Identifier(name, span) => {
                self.emit_load_name(name, *span)?;
            }
            Expr::ArrayLit(items, _) => {
                for item in items {
                    self.compile_expr(item)?;
                }
                self.code.emit(Op::BuildArray, items.len() as u32);
            }
            Expr::Binary { op, left, right, .. } => {
                self.compile_expr(left)?;
                self.compile_expr(right)?;
                self.code.emit(Op::BinaryOp, BinSub::from_ast(*op) as u32);
            }
            Expr::Unary { op, operand, .. } => {
                self.compile_expr(operand)?;
                self.code.emit(Op::UnaryOp, UnSub::from_ast(*op) as u32);
            }
            Expr::Call { callee, args, span } => {
                self.emit_load_name(callee, *span)?;
                // Reserved slot the VM pops (and decrefs) between the args
                // and the callee; see `call_function` in vm.rs.
                self.code.emit(Op::PushNull, 0);
                for arg in args {
                    self.compile_expr(arg)?;
                }
                self.code.emit(Op::CallFunction, args.len() as u32);
            }
            Expr::Index { array, index, .. } => {
                self.compile_expr(array)?;
                self.compile_expr(index)?;
                self.code.emit(Op::LoadSubscr, 0);
            }
        }
        Ok(())
    }

    // -- statements ----------------------------------------------------------

    fn compile_stmt(&mut self, stmt: &Stmt) -> Result<(), CompileError> {
        match stmt {
            Stmt::ExprStmt(expr) => {
                self.compile_expr(expr)?;
                self.code.emit(Op::Pop, 0);
            }
            Stmt::VarDecl { name, init, .. } => {
                match init {
                    Some(e) => self.compile_expr(e)?,
                    None => {
                        self.code.emit(Op::PushNull, 0);
                    }
                }
                self.declare_local_or_global(name);
                self.emit_store_name(name);
            }
            Stmt::ArrayDecl { name, size, init, .. } => {
                match init {
                    Some(e) => self.compile_expr(e)?,
                    None => {
                        // `BUILD_ARRAY` only knows how to pop a compile-time
                        // fixed element count, so a bare `int[5] a;` only
                        // gets its declared length when that length is
                        // itself a literal; anything else degrades to an
                        // empty array rather than needing a dynamic-size
                        // opcode the bytecode model doesn't have.
                        let n = match size {
                            Some(Expr::IntLit(n, _)) if *n >= 0 => *n as u32,
                            _ => 0,
                        };
                        for _ in 0..n {
                            self.code.emit(Op::PushNull, 0);
                        }
                        self.code.emit(Op::BuildArray, n);
                    }
                }
                self.declare_local_or_global(name);
                self.emit_store_name(name);
            }
            Stmt::Assign { target, value, .. } => match target {
                AssignTarget::Name(name) => {
                    self.compile_expr(value)?;
                    self.emit_store_name(name);
                }
                AssignTarget::Index { array, index } => {
                    self.compile_expr(array)?;
                    self.compile_expr(index)?;
                    self.compile_expr(value)?;
                    self.code.emit(Op::StoreSubscr, 0);
                }
            },
            Stmt::If { branches, else_body, .. } => {
                let mut end_jumps = Vec::new();
                for (i, (cond, body)) in branches.iter().enumerate() {
                    self.compile_expr(cond)?;
                    let jf = self.code.emit(Op::PopJumpIfFalse, 0);
                    for s in body {
                        self.compile_stmt(s)?;
                    }
                    if i + 1 < branches.len() || else_body.is_some() {
                        end_jumps.push(self.code.emit(Op::JumpForward, 0));
                    }
                    let after = self.code.code.len() as u32;
                    self.patch_jump(jf, after);
                }
                if let Some(body) = else_body {
                    for s in body {
                        self.compile_stmt(s)?;
                    }
                }
                let end = self.code.code.len() as u32;
                for j in end_jumps {
                    self.patch_jump(j, end);
                }
            }
            Stmt::While { cond, body, .. } => {
                self.code.emit(Op::LoopStart, 0);
                let loop_start = self.code.code.len();
                self.compile_expr(cond)?;
                let jf = self.code.emit(Op::PopJumpIfFalse, 0);
                self.loop_stack.push(LoopCtx { break_jumps: Vec::new(), continue_jumps: Vec::new() });
                for s in body {
                    self.compile_stmt(s)?;
                }
                self.code.emit(Op::JumpBackward, loop_start as u32);
                let loop_end = self.code.emit(Op::LoopEnd, 0) as u32;
                self.patch_jump(jf, loop_end);
                let ctx = self.loop_stack.pop().unwrap();
                for j in ctx.break_jumps {
                    self.patch_jump(j, loop_end);
                }
                // `continue` in a `while` jumps straight back to the condition.
                for j in ctx.continue_jumps {
                    self.patch_jump(j, loop_start as u32);
                }
            }
            Stmt::For { init, cond, incr, body, .. } => {
                if let Some(init) = init {
                    self.compile_stmt(init)?;
                }
                self.code.emit(Op::LoopStart, 0);
                let loop_start = self.code.code.len();
                let jf = if let Some(cond) = cond {
                    self.compile_expr(cond)?;
                    Some(self.code.emit(Op::PopJumpIfFalse, 0))
                } else {
                    None
                };
                self.loop_stack.push(LoopCtx { break_jumps: Vec::new(), continue_jumps: Vec::new() });
                for s in body {
                    self.compile_stmt(s)?;
                }
                let incr_addr = self.code.code.len() as u32;
                if let Some(incr) = incr {
                    self.compile_stmt(incr)?;
                }
                self.code.emit(Op::JumpBackward, loop_start as u32);
                let loop_end = self.code.emit(Op::LoopEnd, 0) as u32;
                if let Some(jf) = jf {
                    self.patch_jump(jf, loop_end);
                }
                let ctx = self.loop_stack.pop().unwrap();
                for j in ctx.break_jumps {
                    self.patch_jump(j, loop_end);
                }
                // `continue` in a `for` must still run the increment clause.
                for j in ctx.continue_jumps {
                    self.patch_jump(j, incr_addr);
                }
            }
            Stmt::Break(span) => {
                if self.loop_stack.is_empty() {
                    return Err(CompileError::BreakOutsideLoop { span: *span });
                }
                let j = self.code.emit(Op::BreakLoop, 0);
                self.loop_stack.last_mut().unwrap().break_jumps.push(j);
            }
            Stmt::Continue(span) => {
                if self.loop_stack.is_empty() {
                    return Err(CompileError::ContinueOutsideLoop { span: *span });
                }
                let j = self.code.emit(Op::ContinueLoop, 0);
                self.loop_stack.last_mut().unwrap().continue_jumps.push(j);
            }
            Stmt::Return(value, _) => {
                match value {
                    Some(e) => self.compile_expr(e)?,
                    None => {
                        self.code.emit(Op::PushNull, 0);
                    }
                }
                self.code.emit(Op::ReturnValue, 0);
            }
            Stmt::FunctionDecl { .. } => {
                // Nested function declarations inside a function body are
                // not part of this language's surface grammar; only
                // module-level function declarations reach `compile_module`.
                unreachable!("nested function declarations are rejected by the parser's statement grammar")
            }
        }
        Ok(())
    }

    fn declare_local_or_global(&mut self, name: &str) {
        if self.code.arg_count > 0 || !self.locals.is_empty() || self.is_function_scope() {
            self.declare_local(name);
        } else {
            self.globals.get_or_add(name);
        }
    }

    fn is_function_scope(&self) -> bool {
        self.code.name != "<module>"
    }

    /// All jump-family opcodes (`JumpForward`, `JumpBackward`,
    /// `PopJumpIfFalse/True`, `BreakLoop`, `ContinueLoop`) carry an
    /// *absolute* target instruction index rather than a relative offset —
    /// this keeps patching direction-agnostic and makes the optimizer's
    /// dead-code pass a simple old-index → new-index remap.
    fn patch_jump(&mut self, instr_idx: usize, target: u32) {
        self.code.code[instr_idx].arg = target & 0x00FF_FFFF;
    }
}

/// Walks the module once, registering every top-level name (vars, arrays,
/// functions) as a global before any statement is compiled, so forward
/// references between functions resolve.
fn collect_declarations(module: &Module, globals: &mut GlobalTable) {
    for stmt in module {
        match stmt {
            Stmt::VarDecl { name, .. } | Stmt::ArrayDecl { name, .. } | Stmt::FunctionDecl { name, .. } => {
                globals.get_or_add(name);
            }
            _ => {}
        }
    }
}

pub struct CompiledProgram {
    pub module_code: Rc<CodeObj>,
    pub globals: GlobalTable,
}

pub fn compile_module(module: &Module, debug: bool) -> Result<CompiledProgram, CompileError> {
    let mut globals = GlobalTable::with_builtins();
    collect_declarations(module, &mut globals);

    let mut top = Compiler::new("<module>", 0, &mut globals);
    for stmt in module {
        match stmt {
            Stmt::FunctionDecl { name, params, body, .. } => {
                let func_code = compile_function(name, params, body, top.globals)?;
                let idx = top.code.add_constant(Value::Code(Rc::new(func_code)));
                top.code.emit(Op::LoadConst, idx);
                top.code.emit(Op::MakeFunction, 0);
                top.emit_store_name(name);
            }
            other => top.compile_stmt(other)?,
        }
    }

    let main_slot = top.globals.get("main");
    if let Some(slot) = main_slot {
        top.code.emit(Op::LoadGlobal, slot << 1);
        top.code.emit(Op::PushNull, 0);
        top.code.emit(Op::CallFunction, 0);
        top.code.emit(Op::ReturnValue, 0);
    } else {
        top.code.emit(Op::PushNull, 0);
        top.code.emit(Op::ReturnValue, 0);
    }

    let code = top.code;
    if debug {
        eprintln!("{}", code.disassemble());
    }
    Ok(CompiledProgram { module_code: Rc::new(code), globals })
}

fn compile_function(
    name: &str,
    params: &[(String, TypeVar)],
    body: &[Stmt],
    globals: &mut GlobalTable,
) -> Result<CodeObj, CompileError> {
    let mut compiler = Compiler::new(name, params.len(), globals);
    for (pname, _) in params {
        compiler.declare_local(pname);
    }
    for stmt in body {
        compiler.compile_stmt(stmt)?;
    }
    // Every path falls off the end with an implicit `return none;`.
    compiler.code.emit(Op::PushNull, 0);
    compiler.code.emit(Op::ReturnValue, 0);
    Ok(compiler.code)
}

#[allow(dead_code)]
fn float_zero() -> BigFloat {
    BigFloat::zero()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;

    fn compile(src: &str) -> CompiledProgram {
        let tokens = Lexer::new(src).tokenize().unwrap();
        let module = Parser::new(tokens).parse_module().unwrap();
        compile_module(&module, false).unwrap()
    }

    #[test]
    fn builtins_occupy_first_four_global_slots() {
        let prog = compile("int main() { return 0; }");
        assert_eq!(prog.globals.get("print"), Some(0));
        assert_eq!(prog.globals.get("input"), Some(1));
        assert_eq!(prog.globals.get("randint"), Some(2));
        assert_eq!(prog.globals.get("sqrt"), Some(3));
    }

    #[test]
    fn forward_reference_between_functions_resolves() {
        let prog = compile("int a() { return b(); } int b() { return 1; } int main() { return a(); }");
        assert!(prog.globals.get("a").is_some());
        assert!(prog.globals.get("b").is_some());
    }

    #[test]
    fn break_outside_loop_is_a_compile_error() {
        let tokens = Lexer::new("int main() { break; return 0; }").tokenize().unwrap();
        let module = Parser::new(tokens).parse_module().unwrap();
        assert!(matches!(compile_module(&module, false), Err(CompileError::BreakOutsideLoop { .. })));
    }
}
