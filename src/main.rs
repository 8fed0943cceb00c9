/// glint CLI
///
/// `glint [--debug|-d] <source_file>` lexes, parses, compiles, and executes
/// a script, printing the display form of `main`'s return value.
use clap::Parser as ClapParser;
use glint::diagnostics::DiagnosticEngine;
use glint::errors::FrontendError;
use glint::vm::VmConfig;
use miette::Result;
use std::path::PathBuf;

// 64 MB stack — handles deeply-recursive glint programs without overflow.
const STACK_SIZE: usize = 64 * 1024 * 1024;

#[derive(ClapParser)]
#[command(
    name = "glint",
    version = "0.1.0",
    about = "The glint language toolchain",
    long_about = "glint — run scripts for a small statically-typed imperative language."
)]
struct Cli {
    /// Print diagnostic logging from the VM (degraded operations, JIT rewrites)
    #[arg(short, long)]
    debug: bool,
    path: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let result = std::thread::Builder::new()
        .name("glint-worker".into())
        .stack_size(STACK_SIZE)
        .spawn(move || std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| run(cli))))
        .expect("failed to spawn glint worker thread")
        .join();

    match result {
        Ok(Ok(inner)) => inner,
        Ok(Err(panic_payload)) | Err(panic_payload) => {
            let msg = if let Some(s) = panic_payload.downcast_ref::<&str>() {
                format!("internal error (panic): {}", s)
            } else if let Some(s) = panic_payload.downcast_ref::<String>() {
                format!("internal error (panic): {}", s)
            } else {
                "internal error: unexpected panic in glint runtime".to_string()
            };
            eprintln!("glint crashed: {}", msg);
            Err(miette::miette!("{}", msg))
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let Cli { debug, path } = cli;

    let source = std::fs::read_to_string(&path)
        .map_err(|e| miette::miette!("cannot read '{}': {}", path.display(), e))?;

    let config = VmConfig { debug, ..VmConfig::default() };

    let program = match glint::compile_source(&source, debug) {
        Ok(p) => p,
        Err(e) => {
            let engine = DiagnosticEngine::new(path.display().to_string(), &source);
            let diag = engine.from_frontend(&e);
            engine.emit(diag);
            return Err(match e {
                FrontendError::Io { .. } => miette::miette!("{}", e),
                other => miette::miette!("{}", other),
            });
        }
    };

    let out = glint::run_program(&program, config);
    println!("Proccess finished with return: {}", out);

    Ok(())
}
