use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use klox::interpreter::Interpreter;
use klox::parser::Parser;
use klox::reporter::Reporter;
use klox::resolver::Resolver;
use klox::scanner::Scanner;
use klox::token::Token;

/// Write sink that hands captured output back to the test.
#[derive(Clone, Default)]
struct SharedBuf(Rc<RefCell<Vec<u8>>>);

impl SharedBuf {
    fn contents(&self) -> String {
        String::from_utf8(self.0.borrow().clone()).expect("interpreter output is UTF-8")
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn run(source: &str) -> (String, bool, bool) {
    let buf = SharedBuf::default();
    let mut interpreter = Interpreter::with_output(Box::new(buf.clone()));
    let mut reporter = Reporter::new();

    klox::run(source, &mut interpreter, &mut reporter);

    (
        buf.contents(),
        reporter.had_error(),
        reporter.had_runtime_error(),
    )
}

fn run_ok(source: &str) -> String {
    let (output, had_error, had_runtime_error) = run(source);
    assert!(!had_error, "static error in: {source}");
    assert!(!had_runtime_error, "runtime error in: {source}");
    output
}

/// Drive the pipeline by hand so the runtime error value itself is
/// observable, message and all.
fn runtime_error(source: &str) -> String {
    let mut reporter = Reporter::new();

    let tokens: Vec<Token> = Scanner::new(source).filter_map(Result::ok).collect();

    let mut parser = Parser::new(tokens, &mut reporter);
    let statements = parser.parse();
    assert!(!reporter.had_error(), "source must parse cleanly: {source}");

    let mut interpreter = Interpreter::with_output(Box::new(io::sink()));
    Resolver::new(&mut interpreter, &mut reporter).resolve(&statements);
    assert!(!reporter.had_error(), "source must resolve cleanly: {source}");

    interpreter
        .interpret(&statements)
        .expect_err("expected a runtime error")
        .to_string()
}

// ─────────────────────────────────────────────────────────────────────────
// End-to-end scenarios
// ─────────────────────────────────────────────────────────────────────────

#[test]
fn arithmetic_precedence() {
    assert_eq!(run_ok("print 1 + 2 * 3;"), "7\n");
}

#[test]
fn block_shadowing() {
    assert_eq!(
        run_ok("var a = 1; { var a = 2; print a; } print a;"),
        "2\n1\n"
    );
}

#[test]
fn closure_captures_definition_environment() {
    let source = "
        fun make(x) {
            fun get() {
                return x;
            }
            return get;
        }
        var g = make(42);
        print g();
    ";
    assert_eq!(run_ok(source), "42\n");
}

#[test]
fn while_with_continue() {
    let source = "
        var i = 0;
        while (i < 3) {
            if (i == 1) {
                i = i + 1;
                continue;
            }
            print i;
            i = i + 1;
        }
    ";
    assert_eq!(run_ok(source), "0\n2\n");
}

#[test]
fn recursive_fibonacci() {
    let source = "
        fun fib(n) {
            if (n < 2) return n;
            return fib(n - 1) + fib(n - 2);
        }
        print fib(10);
    ";
    assert_eq!(run_ok(source), "55\n");
}

#[test]
fn string_plus_number_concatenates() {
    assert_eq!(run_ok("print \"hi \" + 3;"), "hi 3\n");
}

// ─────────────────────────────────────────────────────────────────────────
// Truthiness, equality, stringification
// ─────────────────────────────────────────────────────────────────────────

#[test]
fn only_nil_and_false_are_falsey() {
    assert_eq!(run_ok("print !nil;"), "true\n");
    assert_eq!(run_ok("print !false;"), "true\n");
    assert_eq!(run_ok("print !0;"), "false\n");
    assert_eq!(run_ok("print !\"\";"), "false\n");
}

#[test]
fn equality_semantics() {
    assert_eq!(run_ok("print nil == nil;"), "true\n");
    assert_eq!(run_ok("print nil == false;"), "false\n");
    assert_eq!(run_ok("print 1 == \"1\";"), "false\n");
    assert_eq!(run_ok("print \"a\" == \"a\";"), "true\n");
    assert_eq!(run_ok("print 1 != 2;"), "true\n");
}

#[test]
fn functions_compare_by_identity() {
    assert_eq!(run_ok("fun f() {} print f == f;"), "true\n");
    assert_eq!(run_ok("fun f() {} fun g() {} print f == g;"), "false\n");
}

#[test]
fn integral_numbers_print_without_decimal_point() {
    assert_eq!(run_ok("print 3.0;"), "3\n");
    assert_eq!(run_ok("print 100;"), "100\n");
    assert_eq!(run_ok("print 1.5;"), "1.5\n");
    assert_eq!(run_ok("print 10 / 4;"), "2.5\n");
}

#[test]
fn callables_stringify() {
    assert_eq!(run_ok("fun foo() {} print foo;"), "<fn foo>\n");
    assert_eq!(run_ok("print clock;"), "<native fn>\n");
}

#[test]
fn string_concatenation_stringifies_right_operand() {
    assert_eq!(run_ok("print \"a\" + 1;"), "a1\n");
    assert_eq!(run_ok("print \"a\" + 1.5;"), "a1.5\n");
    assert_eq!(run_ok("print \"v=\" + nil;"), "v=nil\n");
    assert_eq!(run_ok("print \"b\" + true;"), "btrue\n");
}

#[test]
fn grouping_is_transparent() {
    assert_eq!(run_ok("print (1 + 2);"), run_ok("print 1 + 2;"));
}

// ─────────────────────────────────────────────────────────────────────────
// Operators and control flow
// ─────────────────────────────────────────────────────────────────────────

#[test]
fn logical_operators_return_operand_values() {
    assert_eq!(run_ok("print nil or \"yes\";"), "yes\n");
    assert_eq!(run_ok("print nil and 2;"), "nil\n");
    assert_eq!(run_ok("print 0 or 2;"), "0\n");
    assert_eq!(run_ok("print 1 and 2;"), "2\n");
}

#[test]
fn logical_operators_short_circuit() {
    let source = "
        var a = 1;
        true or (a = 2);
        false and (a = 3);
        print a;
    ";
    assert_eq!(run_ok(source), "1\n");
}

#[test]
fn ternary_picks_branch_by_truthiness() {
    assert_eq!(run_ok("print true ? 1 : 2;"), "1\n");
    assert_eq!(run_ok("print false ? 1 : 2;"), "2\n");
    assert_eq!(run_ok("print nil ? \"t\" : \"e\";"), "e\n");
}

#[test]
fn chained_ternary_right_associates() {
    assert_eq!(run_ok("print false ? 1 : true ? 2 : 3;"), "2\n");
}

#[test]
fn if_else_branches() {
    assert_eq!(run_ok("if (1 < 2) print \"a\"; else print \"b\";"), "a\n");
    assert_eq!(run_ok("if (1 > 2) print \"a\"; else print \"b\";"), "b\n");
}

#[test]
fn for_loop_counts() {
    assert_eq!(
        run_ok("for (var i = 0; i < 3; i = i + 1) print i;"),
        "0\n1\n2\n"
    );
}

#[test]
fn break_exits_the_loop() {
    let source = "
        var i = 0;
        while (true) {
            if (i == 2) break;
            print i;
            i = i + 1;
        }
    ";
    assert_eq!(run_ok(source), "0\n1\n");
}

#[test]
fn break_exits_innermost_loop_only() {
    let source = "
        for (var i = 0; i < 2; i = i + 1) {
            for (var j = 0; j < 10; j = j + 1) {
                if (j == 1) break;
                print i;
            }
        }
    ";
    assert_eq!(run_ok(source), "0\n1\n");
}

#[test]
fn unary_operators() {
    assert_eq!(run_ok("print -3;"), "-3\n");
    assert_eq!(run_ok("print --3;"), "3\n");
    assert_eq!(run_ok("print !!nil;"), "false\n");
}

// ─────────────────────────────────────────────────────────────────────────
// Functions and closures
// ─────────────────────────────────────────────────────────────────────────

#[test]
fn function_without_return_yields_nil() {
    assert_eq!(run_ok("fun f() {} print f();"), "nil\n");
}

#[test]
fn bare_return_yields_nil() {
    assert_eq!(run_ok("fun f() { return; print \"dead\"; } print f();"), "nil\n");
}

#[test]
fn counter_closure_keeps_private_state() {
    let source = "
        fun makeCounter() {
            var i = 0;
            fun count() {
                i = i + 1;
                print i;
            }
            return count;
        }
        var counter = makeCounter();
        counter();
        counter();
    ";
    assert_eq!(run_ok(source), "1\n2\n");
}

#[test]
fn closure_binding_is_fixed_at_resolution() {
    // The later shadowing declaration must not rebind the closed-over name.
    let source = "
        var a = \"global\";
        {
            fun show() {
                print a;
            }
            show();
            var a = \"block\";
            show();
        }
    ";
    assert_eq!(run_ok(source), "global\nglobal\n");
}

#[test]
fn arguments_evaluate_left_to_right() {
    let source = "
        var trace = \"\";
        fun tag(x) {
            trace = trace + x;
            return x;
        }
        fun pair(a, b) {}
        pair(tag(\"a\"), tag(\"b\"));
        print trace;
    ";
    assert_eq!(run_ok(source), "ab\n");
}

#[test]
fn clock_returns_a_number() {
    assert_eq!(run_ok("print clock() > 0;"), "true\n");
}

// ─────────────────────────────────────────────────────────────────────────
// Runtime errors
// ─────────────────────────────────────────────────────────────────────────

#[test]
fn adding_number_and_string_fails() {
    assert_eq!(
        runtime_error("print 1 + \"a\";"),
        "[line 1] Operands must be two strings or two numbers."
    );
}

#[test]
fn unary_minus_requires_a_number() {
    assert_eq!(
        runtime_error("print -\"a\";"),
        "[line 1] Operand must be a number."
    );
}

#[test]
fn comparison_requires_numbers() {
    assert_eq!(
        runtime_error("print 1 < \"a\";"),
        "[line 1] Operands must be numbers."
    );
}

#[test]
fn division_by_zero_fails() {
    assert_eq!(
        runtime_error("print 5 / 0;"),
        "[line 1] It looks like you tried division by 0. Yeah better don't try this at home."
    );
}

#[test]
fn undefined_variable_read_fails() {
    assert_eq!(
        runtime_error("print x;"),
        "[line 1] Undefined variable 'x'."
    );
}

#[test]
fn assignment_does_not_create_bindings() {
    assert_eq!(runtime_error("x = 1;"), "[line 1] Undefined variable 'x'.");
}

#[test]
fn arity_mismatch_fails() {
    assert_eq!(
        runtime_error("fun pair(a, b) {} pair(1);"),
        "[line 1] Expected 2 arguments but got 1."
    );
}

#[test]
fn calling_a_non_callable_fails() {
    assert_eq!(
        runtime_error("var x = 1; x();"),
        "[line 1] Can only call functions and classes."
    );
}

#[test]
fn runtime_error_reports_the_offending_line() {
    assert_eq!(
        runtime_error("var a = 1;\nprint -\"a\";"),
        "[line 2] Operand must be a number."
    );
}

// ─────────────────────────────────────────────────────────────────────────
// Pipeline behavior
// ─────────────────────────────────────────────────────────────────────────

#[test]
fn parse_errors_abort_before_execution() {
    let (output, had_error, _) = run("print 1;\nprint ;");
    assert!(had_error);
    assert_eq!(output, "");
}

#[test]
fn static_errors_abort_before_execution() {
    let (output, had_error, _) = run("{ var a = a; } print 1;");
    assert!(had_error);
    assert_eq!(output, "");
}

#[test]
fn runtime_error_sets_only_the_runtime_flag() {
    let (_, had_error, had_runtime_error) = run("print 1 + \"a\";");
    assert!(!had_error);
    assert!(had_runtime_error);
}

#[test]
fn runtime_error_stops_the_run() {
    let (output, _, had_runtime_error) = run("print 1; print 1 + \"a\"; print 2;");
    assert!(had_runtime_error);
    assert_eq!(output, "1\n");
}

#[test]
fn interpreter_state_survives_a_failed_statement() {
    // One session, several inputs, as in the REPL: the environment current
    // before a failing statement is current again after it.
    let buf = SharedBuf::default();
    let mut interpreter = Interpreter::with_output(Box::new(buf.clone()));
    let mut reporter = Reporter::new();

    klox::run("var a = 1;", &mut interpreter, &mut reporter);
    klox::run("{ var b = 2; print 1 + \"x\"; }", &mut interpreter, &mut reporter);
    assert!(reporter.had_runtime_error());
    reporter.reset();

    klox::run("print a;", &mut interpreter, &mut reporter);
    assert!(!reporter.had_runtime_error());
    assert_eq!(buf.contents(), "1\n");
}

#[test]
fn repl_echo_prints_expression_values() {
    let buf = SharedBuf::default();
    let mut interpreter = Interpreter::with_output(Box::new(buf.clone()));
    interpreter.set_repl_echo(true);
    let mut reporter = Reporter::new();

    klox::run("1 + 2;", &mut interpreter, &mut reporter);

    assert_eq!(buf.contents(), "3\n");
}

#[test]
fn statements_without_echo_stay_silent() {
    assert_eq!(run_ok("1 + 2;"), "");
}
