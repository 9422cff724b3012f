use klox::ast::{Expr, LiteralValue, Stmt};
use klox::parser::Parser;
use klox::reporter::Reporter;
use klox::scanner::Scanner;
use klox::token::{Token, TokenType};

fn parse(source: &str) -> (Vec<Stmt>, bool) {
    let mut reporter = Reporter::new();

    let tokens: Vec<Token> = Scanner::new(source).filter_map(Result::ok).collect();

    let mut parser = Parser::new(tokens, &mut reporter);
    let statements = parser.parse();

    let had_error = reporter.had_error();
    (statements, had_error)
}

fn parse_ok(source: &str) -> Vec<Stmt> {
    let (statements, had_error) = parse(source);
    assert!(!had_error, "unexpected parse error in: {source}");
    statements
}

fn single_expression(source: &str) -> Expr {
    let mut statements = parse_ok(source);
    assert_eq!(statements.len(), 1);
    match statements.remove(0) {
        Stmt::Expression(expr) => expr,
        other => panic!("expected expression statement, got {:?}", other),
    }
}

#[test]
fn multiplication_binds_tighter_than_addition() {
    let expr = single_expression("1 + 2 * 3;");

    match expr {
        Expr::Binary {
            operator, right, ..
        } => {
            assert_eq!(operator.token_type, TokenType::PLUS);
            assert!(matches!(
                *right,
                Expr::Binary { ref operator, .. } if operator.token_type == TokenType::STAR
            ));
        }
        other => panic!("expected binary expression, got {:?}", other),
    }
}

#[test]
fn comparison_binds_tighter_than_equality() {
    let expr = single_expression("1 == 2 < 3;");

    match expr {
        Expr::Binary { operator, .. } => {
            assert_eq!(operator.token_type, TokenType::EQUAL_EQUAL);
        }
        other => panic!("expected binary expression, got {:?}", other),
    }
}

#[test]
fn or_is_left_associative() {
    let expr = single_expression("a or b or c;");

    // (a or b) or c
    match expr {
        Expr::Logical { left, right, .. } => {
            assert!(matches!(*left, Expr::Logical { .. }));
            assert!(matches!(*right, Expr::Variable { .. }));
        }
        other => panic!("expected logical expression, got {:?}", other),
    }
}

#[test]
fn and_binds_tighter_than_or() {
    let expr = single_expression("a or b and c;");

    match expr {
        Expr::Logical {
            operator, right, ..
        } => {
            assert_eq!(operator.token_type, TokenType::OR);
            assert!(matches!(
                *right,
                Expr::Logical { ref operator, .. } if operator.token_type == TokenType::AND
            ));
        }
        other => panic!("expected logical expression, got {:?}", other),
    }
}

#[test]
fn ternary_is_right_associative() {
    let expr = single_expression("a ? 1 : b ? 2 : 3;");

    match expr {
        Expr::Ternary { else_branch, .. } => {
            assert!(matches!(*else_branch, Expr::Ternary { .. }));
        }
        other => panic!("expected ternary expression, got {:?}", other),
    }
}

#[test]
fn assignment_is_right_associative() {
    let expr = single_expression("a = b = 1;");

    match expr {
        Expr::Assign { value, .. } => {
            assert!(matches!(*value, Expr::Assign { .. }));
        }
        other => panic!("expected assignment, got {:?}", other),
    }
}

#[test]
fn unary_is_right_associative() {
    let expr = single_expression("--1;");

    match expr {
        Expr::Unary { right, .. } => {
            assert!(matches!(*right, Expr::Unary { .. }));
        }
        other => panic!("expected unary expression, got {:?}", other),
    }
}

#[test]
fn call_with_arguments() {
    let expr = single_expression("f(1, 2, g());");

    match expr {
        Expr::Call { arguments, .. } => {
            assert_eq!(arguments.len(), 3);
            assert!(matches!(arguments[2], Expr::Call { .. }));
        }
        other => panic!("expected call expression, got {:?}", other),
    }
}

#[test]
fn variable_nodes_get_distinct_ids() {
    let expr = single_expression("a + a;");

    match expr {
        Expr::Binary { left, right, .. } => match (*left, *right) {
            (Expr::Variable { id: left_id, .. }, Expr::Variable { id: right_id, .. }) => {
                assert_ne!(left_id, right_id);
            }
            other => panic!("expected two variables, got {:?}", other),
        },
        other => panic!("expected binary expression, got {:?}", other),
    }
}

#[test]
fn function_declaration_shape() {
    let statements = parse_ok("fun add(a, b) { return a + b; }");

    assert_eq!(statements.len(), 1);
    match &statements[0] {
        Stmt::Function { name, params, body } => {
            assert_eq!(name.lexeme, "add");
            assert_eq!(params.len(), 2);
            assert_eq!(body.len(), 1);
            assert!(matches!(body[0], Stmt::Return { .. }));
        }
        other => panic!("expected function declaration, got {:?}", other),
    }
}

#[test]
fn for_desugars_to_while() {
    let statements = parse_ok("for (var i = 0; i < 3; i = i + 1) print i;");

    assert_eq!(statements.len(), 1);
    match &statements[0] {
        Stmt::Block(stmts) => {
            assert_eq!(stmts.len(), 2);
            assert!(matches!(stmts[0], Stmt::Var { .. }));

            match &stmts[1] {
                Stmt::While { body, .. } => match body.as_ref() {
                    Stmt::Block(inner) => {
                        assert_eq!(inner.len(), 2);
                        assert!(matches!(inner[0], Stmt::Print(_)));
                        assert!(matches!(inner[1], Stmt::Expression(Expr::Assign { .. })));
                    }
                    other => panic!("expected block body, got {:?}", other),
                },
                other => panic!("expected while loop, got {:?}", other),
            }
        }
        other => panic!("expected block, got {:?}", other),
    }
}

#[test]
fn for_without_clauses_loops_on_true() {
    let statements = parse_ok("for (;;) break;");

    assert_eq!(statements.len(), 1);
    match &statements[0] {
        Stmt::While { condition, body } => {
            assert!(matches!(condition, Expr::Literal(LiteralValue::True)));
            assert!(matches!(body.as_ref(), Stmt::Break(_)));
        }
        other => panic!("expected while loop, got {:?}", other),
    }
}

#[test]
fn invalid_assignment_target_is_reported() {
    let (_, had_error) = parse("1 = 2;");
    assert!(had_error);
}

#[test]
fn invalid_assignment_target_does_not_stop_the_parse() {
    let (statements, had_error) = parse("1 = 2; print 3;");
    assert!(had_error);
    // The second statement still parses.
    assert!(statements.iter().any(|s| matches!(s, Stmt::Print(_))));
}

#[test]
fn missing_left_operand_is_reported() {
    let (statements, had_error) = parse("== 2;");
    assert!(had_error);
    assert!(statements.is_empty());
}

#[test]
fn missing_ternary_condition_is_reported() {
    let (_, had_error) = parse("? 1 : 2;");
    assert!(had_error);
}

#[test]
fn parser_synchronizes_at_statement_boundary() {
    let (statements, had_error) = parse("var = 1; print 42;");

    assert!(had_error);
    assert_eq!(statements.len(), 1);
    assert!(matches!(statements[0], Stmt::Print(_)));
}

#[test]
fn break_outside_loop_is_reported() {
    let (_, had_error) = parse("break;");
    assert!(had_error);
}

#[test]
fn continue_outside_loop_is_reported() {
    let (_, had_error) = parse("continue;");
    assert!(had_error);
}

#[test]
fn break_inside_loop_is_fine() {
    let (_, had_error) = parse("while (true) { break; }");
    assert!(!had_error);
}

#[test]
fn function_body_does_not_inherit_loop_context() {
    let (_, had_error) = parse("while (true) { fun f() { break; } }");
    assert!(had_error);
}

#[test]
fn unterminated_block_is_reported_at_end() {
    let (_, had_error) = parse("{ print 1;");
    assert!(had_error);
}
