/// End-to-end tests driving the full lex -> parse -> compile -> run pipeline
/// through complete programs, mirroring the teacher's whole-program
/// integration style rather than unit-level checks of a single stage.
use glint::vm::VmConfig;
use glint::{compile_source, run_program, run_source};

fn run(src: &str) -> String {
    run_source(src, VmConfig::default()).expect("program should run")
}

fn run_with(src: &str, config: VmConfig) -> String {
    run_source(src, config).expect("program should run")
}

#[test]
fn returns_a_constant_expression() {
    assert_eq!(run("int main() { return 2 + 3; }"), "5");
}

#[test]
fn for_loop_accumulates_a_sum() {
    let src = r#"
        int main() {
            int s = 0;
            for (int i = 0; i < 10; i = i + 1) {
                s = s + i;
            }
            return s;
        }
    "#;
    assert_eq!(run(src), "45");
}

#[test]
fn recursive_fibonacci() {
    let src = r#"
        int fib(int n) {
            if (n < 2) { return n; }
            return fib(n - 1) + fib(n - 2);
        }
        int main() { return fib(10); }
    "#;
    assert_eq!(run(src), "55");
}

const BUBBLE_SORT_SRC: &str = r#"
    int main() {
        int[5] a = [3, 1, 4, 1, 5];
        int i;
        int j;
        for (i = 0; i < 4; i = i + 1) {
            for (j = 0; j < 4 - i; j = j + 1) {
                if (a[j] > a[j + 1]) {
                    int t = a[j];
                    a[j] = a[j + 1];
                    a[j + 1] = t;
                }
            }
        }
        return a[0] * 10 + a[4];
    }
"#;

#[test]
fn bubble_sort_produces_ascending_array() {
    // sorted = [1, 1, 3, 4, 5]; first*10 + last encodes both ends in one int.
    assert_eq!(run(BUBBLE_SORT_SRC), "15");
}

#[test]
fn bubble_sort_is_identical_with_and_without_jit() {
    let jit_on = run_with(BUBBLE_SORT_SRC, VmConfig { jit_enabled: true, ..VmConfig::default() });
    let jit_off = run_with(BUBBLE_SORT_SRC, VmConfig { jit_enabled: false, ..VmConfig::default() });
    assert_eq!(jit_on, jit_off);
    assert_eq!(jit_on, "15");
}

#[test]
fn sqrt_of_two_matches_known_digits() {
    let out = run("float main() { return sqrt(2); }");
    assert!(out.starts_with("1.4142135623"), "got {}", out);
}

#[test]
fn operator_precedence_matches_arithmetic_convention() {
    let src = r#"
        int main() {
            int r = 1 + 2 * 3;
            return r;
        }
    "#;
    assert_eq!(run(src), "7");
}

#[test]
fn integer_division_by_zero_degrades_to_zero_instead_of_trapping() {
    let src = r#"
        int main() {
            int z = 0;
            return 10 / z;
        }
    "#;
    assert_eq!(run(src), "0");
}

#[test]
fn out_of_range_array_access_degrades_to_none() {
    let src = r#"
        int main() {
            int[3] a = [1, 2, 3];
            return a[10];
        }
    "#;
    assert_eq!(run(src), "None");
}

#[test]
fn while_loop_with_break_and_continue() {
    let src = r#"
        int main() {
            int i = 0;
            int total = 0;
            while (i < 10) {
                i = i + 1;
                if (i == 5) { continue; }
                if (i == 9) { break; }
                total = total + i;
            }
            return total;
        }
    "#;
    // 1+2+3+4 + 6+7+8 = 31
    assert_eq!(run(src), "31");
}

#[test]
fn undefined_main_is_rejected_before_the_vm_ever_runs() {
    let err = compile_source("int helper() { return 1; }", false).unwrap_err();
    assert!(matches!(err, glint::errors::FrontendError::NoMain));
}

#[test]
fn reused_program_can_run_multiple_times_with_independent_output() {
    let program = compile_source(
        r#"
        int counter_like() { return 41; }
        int main() { return counter_like() + 1; }
        "#,
        false,
    )
    .unwrap();
    let first = run_program(&program, VmConfig::default());
    let second = run_program(&program, VmConfig::default());
    assert_eq!(first, "42");
    assert_eq!(second, "42");
}
