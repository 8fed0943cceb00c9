/// glint: lexer, parser, bytecode compiler, refcounted-object VM, and a
/// peephole JIT rewriter for a small statically-typed imperative language.
///
/// Module layout mirrors a conventional front-end/back-end split (matching
/// the teacher's `axm` crate): `lexer` -> `parser` -> `ast` feed
/// `compiler`, which emits `bytecode::CodeObj`s that `vm` executes against
/// `heap`-managed objects, with `optimizer` rewriting function bodies in
/// between and `decimal` backing the `float` type throughout.
pub mod ast;
pub mod bytecode;
pub mod compiler;
pub mod decimal;
pub mod diagnostics;
pub mod errors;
pub mod heap;
pub mod intrinsics;
pub mod lexer;
pub mod optimizer;
pub mod parser;
pub mod vm;

use std::rc::Rc;

use compiler::CompiledProgram;
use errors::FrontendError;
use lexer::Lexer;
use parser::Parser;
use vm::{Vm, VmConfig};

/// Lexes, parses, and compiles `source` into a ready-to-run program.
/// Fails closed on the first front-end error — this is the only phase of
/// the pipeline that can fail; once bytecode exists, the VM never aborts.
pub fn compile_source(source: &str, debug: bool) -> Result<CompiledProgram, FrontendError> {
    let tokens = Lexer::new(source).tokenize()?;
    let module = Parser::new(tokens).parse_module()?;
    let program = compiler::compile_module(&module, debug)?;
    if program.globals.get("main").is_none() {
        return Err(FrontendError::NoMain);
    }
    Ok(program)
}

/// Runs a compiled program to completion and returns the display string of
/// its `main` return value (the CLI prints this; tests can inspect it
/// directly). Runtime errors never reach this signature — they degrade to
/// `none` inside the VM per the language's error-handling design.
pub fn run_program(program: &CompiledProgram, config: VmConfig) -> String {
    let mut vm = Vm::new(program.globals.len(), config);
    let result = vm.run(Rc::clone(&program.module_code));
    let s = vm.heap.display(result);
    vm.heap.decref(result);
    s
}

/// Convenience entry point combining [`compile_source`] and [`run_program`]
/// for callers (tests, `main.rs`) that don't need the intermediate
/// [`CompiledProgram`].
pub fn run_source(source: &str, config: VmConfig) -> Result<String, FrontendError> {
    let program = compile_source(source, config.debug)?;
    Ok(run_program(&program, config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_a_complete_program_end_to_end() {
        let out = run_source("int main() { return 2 + 3 * 4; }", VmConfig::default()).unwrap();
        assert_eq!(out, "14");
    }

    #[test]
    fn missing_main_is_a_frontend_error() {
        let err = compile_source("int helper() { return 1; }", false).unwrap_err();
        assert!(matches!(err, FrontendError::NoMain));
    }

    #[test]
    fn lex_errors_surface_through_compile_source() {
        let err = compile_source("int main() { return 1 @ 2; }", false).unwrap_err();
        assert!(matches!(err, FrontendError::Lex(_)));
    }
}
