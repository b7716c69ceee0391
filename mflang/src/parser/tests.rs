//! Parser tests

use super::*;
use crate::lexer::tokenize;

fn parse_source(source: &str) -> Program {
    parse(tokenize(source).unwrap()).unwrap()
}

fn parse_err(source: &str) -> CompileError {
    parse(tokenize(source).unwrap()).unwrap_err()
}

#[test]
fn test_parse_empty_program() {
    let program = parse_source("");
    assert!(program.statements.is_empty());
}

#[test]
fn test_parse_var_decl() {
    let program = parse_source("var x = 42;");
    match &program.statements[0] {
        Stmt::Var(decl) => {
            assert_eq!(decl.name, "x");
            assert!(decl.type_annotation.is_none());
            assert!(matches!(
                decl.value.node,
                Expr::Literal(Literal::Int(42))
            ));
        }
        other => panic!("expected var, got {other:?}"),
    }
}

#[test]
fn test_parse_var_decl_with_type() {
    let program = parse_source("var x: int = 42");
    match &program.statements[0] {
        Stmt::Var(decl) => assert_eq!(decl.type_annotation.as_deref(), Some("int")),
        other => panic!("expected var, got {other:?}"),
    }
}

#[test]
fn test_parse_generic_type_annotation() {
    let program = parse_source("var m: Map<string, List<int>> = new Map()");
    match &program.statements[0] {
        Stmt::Var(decl) => assert_eq!(
            decl.type_annotation.as_deref(),
            Some("Map<string, List<int>>")
        ),
        other => panic!("expected var, got {other:?}"),
    }
}

#[test]
fn test_parse_bracket_generic_annotation() {
    let program = parse_source("var xs: List[int] = new List()");
    match &program.statements[0] {
        Stmt::Var(decl) => assert_eq!(decl.type_annotation.as_deref(), Some("List<int>")),
        other => panic!("expected var, got {other:?}"),
    }
}

#[test]
fn test_parse_intent() {
    let program = parse_source("intent add(a: int, b: int): int { return a + b }");
    match &program.statements[0] {
        Stmt::Intent(decl) => {
            assert_eq!(decl.name, "add");
            assert_eq!(decl.params.len(), 2);
            assert_eq!(decl.params[0].type_annotation.as_deref(), Some("int"));
            assert_eq!(decl.return_type.as_deref(), Some("int"));
            assert!(!decl.is_async);
            assert_eq!(decl.body.len(), 1);
        }
        other => panic!("expected intent, got {other:?}"),
    }
}

#[test]
fn test_parse_async_intent() {
    let program = parse_source("async intent fetch(url) { return url }");
    match &program.statements[0] {
        Stmt::Intent(decl) => assert!(decl.is_async),
        other => panic!("expected intent, got {other:?}"),
    }
}

#[test]
fn test_parse_param_defaults() {
    let program = parse_source("intent greet(name = \"friend\", bang: bool = true) { }");
    match &program.statements[0] {
        Stmt::Intent(decl) => {
            assert!(decl.params[0].default.is_some());
            assert_eq!(decl.params[1].type_annotation.as_deref(), Some("bool"));
            assert!(decl.params[1].default.is_some());
        }
        other => panic!("expected intent, got {other:?}"),
    }
}

#[test]
fn test_parse_class() {
    let program = parse_source(
        "abstract class Shape { var name: string = \"shape\" private secret = 1 static count = 0 intent area(): float { return 0.0 } static intent make() { } }",
    );
    match &program.statements[0] {
        Stmt::Class(decl) => {
            assert_eq!(decl.name, "Shape");
            assert!(decl.is_abstract);
            let fields: Vec<_> = decl
                .members
                .iter()
                .filter_map(|m| match m {
                    Member::Field(f) => Some(f),
                    _ => None,
                })
                .collect();
            let methods: Vec<_> = decl
                .members
                .iter()
                .filter_map(|m| match m {
                    Member::Method(m) => Some(m),
                    _ => None,
                })
                .collect();
            assert_eq!(fields.len(), 3);
            assert!(fields[1].is_private);
            assert!(fields[2].is_static);
            assert_eq!(methods.len(), 2);
            assert!(methods[1].is_static);
        }
        other => panic!("expected class, got {other:?}"),
    }
}

#[test]
fn test_parse_class_extends_implements() {
    let program = parse_source("class Dog extends Animal implements Walker, Barker { }");
    match &program.statements[0] {
        Stmt::Class(decl) => {
            assert_eq!(decl.extends.as_deref(), Some("Animal"));
            assert_eq!(decl.implements, vec!["Walker", "Barker"]);
        }
        other => panic!("expected class, got {other:?}"),
    }
}

#[test]
fn test_parse_generic_class_params() {
    let program = parse_source("class Box<T> { var value = null }");
    match &program.statements[0] {
        Stmt::Class(decl) => assert_eq!(decl.generic_params, vec!["T"]),
        other => panic!("expected class, got {other:?}"),
    }
}

#[test]
fn test_parse_interface() {
    let program = parse_source("interface Named { intent getName(): string }");
    match &program.statements[0] {
        Stmt::Interface(decl) => {
            assert_eq!(decl.name, "Named");
            assert_eq!(decl.methods.len(), 1);
            assert_eq!(decl.methods[0].name, "getName");
            assert_eq!(decl.methods[0].return_type.as_deref(), Some("string"));
        }
        other => panic!("expected interface, got {other:?}"),
    }
}

#[test]
fn test_parse_if_else_chain() {
    let program = parse_source("if (x > 0) { } else if (x < 0) { } else { }");
    match &program.statements[0] {
        Stmt::If(node) => {
            let else_branch = node.else_branch.as_ref().unwrap();
            assert!(matches!(else_branch[0], Stmt::If(_)));
        }
        other => panic!("expected if, got {other:?}"),
    }
}

#[test]
fn test_parse_single_statement_branch() {
    let program = parse_source("if (ok) print(1)");
    match &program.statements[0] {
        Stmt::If(node) => assert_eq!(node.then_branch.len(), 1),
        other => panic!("expected if, got {other:?}"),
    }
}

#[test]
fn test_parse_traditional_for() {
    let program = parse_source("for (var i = 0; i < 10; i = i + 1) { print(i) }");
    match &program.statements[0] {
        Stmt::For(node) => {
            assert!(matches!(node.init.as_deref(), Some(Stmt::Var(_))));
            assert!(node.condition.is_some());
            assert!(matches!(node.update.as_deref(), Some(Stmt::Assign(_))));
        }
        other => panic!("expected for, got {other:?}"),
    }
}

#[test]
fn test_parse_for_in_and_of() {
    let program = parse_source("for (var k in m) { } for (var v of m) { }");
    assert!(matches!(&program.statements[0], Stmt::ForIn(n) if n.variable == "k"));
    assert!(matches!(&program.statements[1], Stmt::ForOf(n) if n.variable == "v"));
}

#[test]
fn test_parse_try_catch_finally() {
    let program = parse_source(
        "try { risky() } catch (ValidationError e) { } catch (err) { } finally { cleanup() }",
    );
    match &program.statements[0] {
        Stmt::Try(node) => {
            assert_eq!(node.catch_clauses.len(), 2);
            assert_eq!(
                node.catch_clauses[0].exception_type.as_deref(),
                Some("ValidationError")
            );
            assert_eq!(node.catch_clauses[0].exception_var.as_deref(), Some("e"));
            // a single identifier binds the variable, not the type
            assert_eq!(node.catch_clauses[1].exception_type, None);
            assert_eq!(node.catch_clauses[1].exception_var.as_deref(), Some("err"));
            assert!(node.finally_block.is_some());
        }
        other => panic!("expected try, got {other:?}"),
    }
}

#[test]
fn test_parse_try_requires_catch_or_finally() {
    let err = parse_err("try { work() }");
    assert!(err.message().contains("catch"));
}

#[test]
fn test_parse_dotted_catch_type() {
    let program = parse_source("try { f() } catch (core.errors.IOError) { }");
    match &program.statements[0] {
        Stmt::Try(node) => {
            assert_eq!(
                node.catch_clauses[0].exception_type.as_deref(),
                Some("core.errors.IOError")
            );
            assert_eq!(node.catch_clauses[0].exception_var, None);
        }
        other => panic!("expected try, got {other:?}"),
    }
}

#[test]
fn test_parse_bare_throw() {
    let program = parse_source("try { f() } catch (e) { throw; }");
    match &program.statements[0] {
        Stmt::Try(node) => match &node.catch_clauses[0].body[0] {
            Stmt::Throw(t) => assert!(t.expression.is_none()),
            other => panic!("expected throw, got {other:?}"),
        },
        other => panic!("expected try, got {other:?}"),
    }
}

#[test]
fn test_parse_import() {
    let program = parse_source("import app.services.auth;");
    match &program.statements[0] {
        Stmt::Import(decl) => assert_eq!(decl.name, "app.services.auth"),
        other => panic!("expected import, got {other:?}"),
    }
}

#[test]
fn test_parse_dataset_and_model() {
    let program =
        parse_source("dataset load users(\"users.csv\") model train clf(dataset = \"users\")");
    match &program.statements[0] {
        Stmt::Dataset(op) => {
            assert_eq!(op.operation, "load");
            assert_eq!(op.target, "users");
            assert_eq!(op.params[0], ("source".to_string(), "users.csv".to_string()));
        }
        other => panic!("expected dataset, got {other:?}"),
    }
    match &program.statements[1] {
        Stmt::Model(op) => {
            assert_eq!(op.operation, "train");
            assert_eq!(op.model_name, "clf");
            assert_eq!(op.params[0], ("dataset".to_string(), "users".to_string()));
        }
        other => panic!("expected model, got {other:?}"),
    }
}

#[test]
fn test_parse_precedence() {
    let program = parse_source("var x = 1 + 2 * 3");
    match &program.statements[0] {
        Stmt::Var(decl) => match &decl.value.node {
            Expr::Binary { op, right, .. } => {
                assert_eq!(*op, BinOp::Add);
                assert!(matches!(right.node, Expr::Binary { op: BinOp::Mul, .. }));
            }
            other => panic!("expected binary, got {other:?}"),
        },
        other => panic!("expected var, got {other:?}"),
    }
}

#[test]
fn test_parse_logical_operators() {
    let program = parse_source("var x = a and b or not c");
    match &program.statements[0] {
        Stmt::Var(decl) => {
            assert!(matches!(
                decl.value.node,
                Expr::Binary { op: BinOp::Or, .. }
            ));
        }
        other => panic!("expected var, got {other:?}"),
    }
}

#[test]
fn test_parse_call_chain() {
    let program = parse_source("var x = obj.method(1, 2).field[0]");
    match &program.statements[0] {
        Stmt::Var(decl) => assert!(matches!(decl.value.node, Expr::Index { .. })),
        other => panic!("expected var, got {other:?}"),
    }
}

#[test]
fn test_parse_property_assignment() {
    let program = parse_source("this.total = this.total + 1");
    match &program.statements[0] {
        Stmt::Assign(assign) => {
            assert!(matches!(assign.target.node, Expr::Property { .. }));
        }
        other => panic!("expected assignment, got {other:?}"),
    }
}

#[test]
fn test_parse_new_expression() {
    let program = parse_source("var p = new Point(1, 2)");
    match &program.statements[0] {
        Stmt::Var(decl) => match &decl.value.node {
            Expr::New { class_name, args } => {
                assert_eq!(class_name, "Point");
                assert_eq!(args.len(), 2);
            }
            other => panic!("expected new, got {other:?}"),
        },
        other => panic!("expected var, got {other:?}"),
    }
}

#[test]
fn test_parse_lambda() {
    let program = parse_source("var f = fn(x: int): int { return x * x }");
    match &program.statements[0] {
        Stmt::Var(decl) => match &decl.value.node {
            Expr::Lambda(lambda) => {
                assert_eq!(lambda.name, "<lambda>");
                assert_eq!(lambda.params.len(), 1);
                assert_eq!(lambda.return_type.as_deref(), Some("int"));
            }
            other => panic!("expected lambda, got {other:?}"),
        },
        other => panic!("expected var, got {other:?}"),
    }
}

#[test]
fn test_parse_object_and_array_literals() {
    let program = parse_source("var cfg = {name: \"app\", \"port\": 8080, tags: [1, 2]}");
    match &program.statements[0] {
        Stmt::Var(decl) => match &decl.value.node {
            Expr::Object(entries) => {
                assert_eq!(entries.len(), 3);
                assert_eq!(entries[0].0, "name");
                assert_eq!(entries[1].0, "port");
                assert!(matches!(entries[2].1.node, Expr::Array(_)));
            }
            other => panic!("expected object literal, got {other:?}"),
        },
        other => panic!("expected var, got {other:?}"),
    }
}

#[test]
fn test_parse_await() {
    let program = parse_source("var x = await task");
    match &program.statements[0] {
        Stmt::Var(decl) => assert!(matches!(decl.value.node, Expr::Await(_))),
        other => panic!("expected var, got {other:?}"),
    }
}

#[test]
fn test_parse_super_call_and_method() {
    let program = parse_source("class B extends A { intent constructor() { super(1) super.init() } }");
    match &program.statements[0] {
        Stmt::Class(decl) => {
            let method = decl
                .members
                .iter()
                .find_map(|m| match m {
                    Member::Method(m) => Some(m),
                    _ => None,
                })
                .unwrap();
            assert_eq!(method.intent.body.len(), 2);
        }
        other => panic!("expected class, got {other:?}"),
    }
}

#[test]
fn test_parse_expression_entry_point() {
    let expr = parse_expression(tokenize("1 + 2").unwrap()).unwrap();
    assert!(matches!(expr.node, Expr::Binary { op: BinOp::Add, .. }));
}

#[test]
fn test_parse_error_reports_span() {
    let err = parse_err("var = 5");
    assert!(err.span().is_some());
}

#[test]
fn test_parse_unterminated_block() {
    let err = parse_err("intent f() { var x = 1");
    assert!(err.message().contains("unterminated"));
}
