//! Static type checking
//!
//! A two-pass, non-executing analysis. Pass one collects intent, interface
//! and class-method signatures (following imports one level, parsing but
//! never executing them); pass two walks statements with a scope stack and
//! flags declaration, return and call-site mismatches; class/interface
//! conformance is validated after the walk. Unknown types always match —
//! the checker is fail-open on intentionally dynamic code.

pub mod matching;

use self::matching::type_matches;
use crate::ast::*;
use crate::lexer::tokenize;
use crate::parser::parse;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// A checker finding: a human-readable message and a best-effort source
/// span for position mapping.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub message: String,
    pub span: Option<Span>,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

type Signature = (Vec<Option<String>>, Option<String>);

/// Required interface method: name, parameter types, return type, span
type InterfaceMethod = (String, Vec<Option<String>>, Option<String>, Span);

/// The static type checker
pub struct TypeChecker {
    errors: Vec<Diagnostic>,
    /// Lexical scope stack: name → inferred/declared type
    scopes: Vec<HashMap<String, Option<String>>>,
    /// Intent signatures, including `Class.method` keys
    func_signatures: HashMap<String, Signature>,
    /// Interface name → required method signatures
    interfaces: HashMap<String, Vec<InterfaceMethod>>,
    /// Enclosing intent names and declared return types, innermost last
    return_types: Vec<(String, Option<String>)>,
    /// Directory imports resolve against
    base_dir: Option<PathBuf>,
}

impl TypeChecker {
    pub fn new() -> Self {
        TypeChecker {
            errors: Vec::new(),
            scopes: vec![HashMap::new()],
            func_signatures: HashMap::new(),
            interfaces: HashMap::new(),
            return_types: Vec::new(),
            base_dir: None,
        }
    }

    pub fn with_base_dir(base_dir: &Path) -> Self {
        let mut checker = Self::new();
        checker.base_dir = Some(base_dir.to_path_buf());
        checker
    }

    pub fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }

    pub fn take_errors(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.errors)
    }

    fn report(&mut self, message: String, span: Span) {
        self.errors.push(Diagnostic {
            message,
            span: Some(span),
        });
    }

    /// Run the full analysis over a program.
    pub fn check(&mut self, program: &Program) {
        self.errors.clear();

        self.collect_import_signatures(program);

        // First pass: collect signatures
        for stmt in &program.statements {
            match stmt {
                Stmt::Intent(decl) => {
                    self.func_signatures
                        .insert(decl.name.clone(), signature_of(decl));
                }
                Stmt::Interface(decl) => {
                    let methods = decl
                        .methods
                        .iter()
                        .map(|m| {
                            (
                                m.name.clone(),
                                m.params.iter().map(|p| p.type_annotation.clone()).collect(),
                                m.return_type.clone(),
                                m.span,
                            )
                        })
                        .collect();
                    self.interfaces.insert(decl.name.clone(), methods);
                }
                Stmt::Class(decl) => {
                    for member in &decl.members {
                        if let Member::Method(method) = member {
                            self.func_signatures.insert(
                                format!("{}.{}", decl.name, method.intent.name),
                                signature_of(&method.intent),
                            );
                        }
                    }
                }
                _ => {}
            }
        }

        // Second pass: walk statements
        for stmt in &program.statements {
            self.check_statement(stmt);
        }

        // Interface conformance, after the whole walk
        for stmt in &program.statements {
            if let Stmt::Class(decl) = stmt {
                self.check_class_interfaces(decl);
            }
        }
    }

    /// Follow imports one level: parse each imported file and collect its
    /// top-level intent signatures. Failures are ignored — the checker
    /// never aborts on unresolved modules.
    fn collect_import_signatures(&mut self, program: &Program) {
        for stmt in &program.statements {
            let decl = match stmt {
                Stmt::Import(decl) => decl,
                _ => continue,
            };
            let rel: PathBuf = decl.name.split('.').collect::<Vec<_>>().join("/").into();
            let rel = rel.with_extension("mp");

            let mut candidates = Vec::new();
            if let Some(base) = &self.base_dir {
                candidates.push(base.join(&rel));
            }
            candidates.push(rel);

            for candidate in candidates {
                if !candidate.exists() {
                    continue;
                }
                let source = match std::fs::read_to_string(&candidate) {
                    Ok(source) => source,
                    Err(_) => break,
                };
                let program = match tokenize(&source).and_then(parse) {
                    Ok(program) => program,
                    Err(_) => break,
                };
                for stmt in &program.statements {
                    if let Stmt::Intent(decl) = stmt {
                        self.func_signatures
                            .insert(decl.name.clone(), signature_of(decl));
                    }
                }
                break;
            }
        }
    }

    fn check_statement(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Var(decl) => self.check_var_decl(decl),
            Stmt::Intent(decl) => self.check_intent_decl(decl),
            Stmt::Class(decl) => self.check_class_body(decl),
            Stmt::Assign(assign) => {
                let value_type = self.infer(&assign.value);
                if let Expr::Identifier(name) = &assign.target.node {
                    for scope in self.scopes.iter_mut().rev() {
                        if scope.contains_key(name) {
                            scope.insert(name.clone(), value_type);
                            break;
                        }
                    }
                }
            }
            Stmt::If(node) => {
                self.infer(&node.condition);
                self.check_block(&node.then_branch);
                if let Some(else_branch) = &node.else_branch {
                    self.check_block(else_branch);
                }
            }
            Stmt::While(node) => {
                self.infer(&node.condition);
                self.check_block(&node.body);
            }
            Stmt::For(node) => {
                self.scopes.push(HashMap::new());
                if let Some(init) = &node.init {
                    self.check_statement(init);
                }
                if let Some(condition) = &node.condition {
                    self.infer(condition);
                }
                for stmt in &node.body {
                    self.check_statement(stmt);
                }
                if let Some(update) = &node.update {
                    self.check_statement(update);
                }
                self.scopes.pop();
            }
            Stmt::ForIn(node) => self.check_loop_body(
                &node.variable,
                &node.type_annotation,
                &node.iterable,
                &node.body,
            ),
            Stmt::ForOf(node) => self.check_loop_body(
                &node.variable,
                &node.type_annotation,
                &node.iterable,
                &node.body,
            ),
            Stmt::Try(node) => {
                self.check_block(&node.try_block);
                for clause in &node.catch_clauses {
                    self.scopes.push(HashMap::new());
                    if let Some(var) = &clause.exception_var {
                        self.scopes
                            .last_mut()
                            .expect("scope stack is never empty")
                            .insert(var.clone(), clause.exception_type.clone());
                    }
                    for stmt in &clause.body {
                        self.check_statement(stmt);
                    }
                    self.scopes.pop();
                }
                if let Some(finally_block) = &node.finally_block {
                    self.check_block(finally_block);
                }
            }
            Stmt::Throw(node) => {
                if let Some(expr) = &node.expression {
                    self.infer(expr);
                }
            }
            Stmt::Return(node) => self.check_return(node),
            Stmt::Expr(expr) => {
                // inference reports call-site mismatches as it goes
                self.infer(expr);
            }
            Stmt::Interface(_) | Stmt::Import(_) | Stmt::Dataset(_) | Stmt::Model(_) => {}
        }
    }

    fn check_block(&mut self, statements: &[Stmt]) {
        self.scopes.push(HashMap::new());
        for stmt in statements {
            self.check_statement(stmt);
        }
        self.scopes.pop();
    }

    fn check_loop_body(
        &mut self,
        variable: &str,
        annotation: &Option<String>,
        iterable: &Spanned<Expr>,
        body: &[Stmt],
    ) {
        self.infer(iterable);
        self.scopes.push(HashMap::new());
        self.scopes
            .last_mut()
            .expect("scope stack is never empty")
            .insert(variable.to_string(), annotation.clone());
        for stmt in body {
            self.check_statement(stmt);
        }
        self.scopes.pop();
    }

    fn check_return(&mut self, ret: &ReturnStmt) {
        let (intent_name, expected) = match self.return_types.last() {
            Some((name, Some(expected))) => (name.clone(), expected.clone()),
            _ => return,
        };
        if let Some(value) = &ret.value {
            if let Some(inferred) = self.infer(value) {
                if !type_matches(Some(&expected), Some(&inferred)) {
                    self.report(
                        format!(
                            "return type mismatch in intent '{intent_name}': annotated '{expected}' but returning expression of type '{inferred}'"
                        ),
                        ret.span,
                    );
                }
            }
        }
    }

    fn check_var_decl(&mut self, decl: &VarDecl) {
        let value_type = self.infer(&decl.value);
        let stored = decl
            .type_annotation
            .clone()
            .or_else(|| value_type.clone());
        self.scopes
            .last_mut()
            .expect("scope stack is never empty")
            .insert(decl.name.clone(), stored);

        let annotation = match &decl.type_annotation {
            Some(annotation) => annotation,
            None => return,
        };
        if let Some(value_type) = &value_type {
            if !type_matches(Some(annotation), Some(value_type)) {
                self.report(
                    format!(
                        "type mismatch for variable '{}': annotated '{annotation}' but assigned expression of type '{value_type}'",
                        decl.name
                    ),
                    decl.span,
                );
            }
        }
    }

    fn check_intent_decl(&mut self, decl: &IntentDecl) {
        self.scopes.push(HashMap::new());
        for param in &decl.params {
            self.scopes
                .last_mut()
                .expect("scope stack is never empty")
                .insert(param.name.clone(), param.type_annotation.clone());
        }

        self.return_types
            .push((decl.name.clone(), decl.return_type.clone()));
        for stmt in &decl.body {
            self.check_statement(stmt);
        }
        self.return_types.pop();

        self.scopes.pop();
    }

    /// Walk a class body: field defaults against their annotations, method
    /// bodies with `this` in scope.
    fn check_class_body(&mut self, decl: &ClassDecl) {
        for member in &decl.members {
            match member {
                Member::Field(field) => {
                    let annotation = match &field.type_annotation {
                        Some(annotation) => annotation.clone(),
                        None => continue,
                    };
                    if let Some(value) = &field.value {
                        if let Some(inferred) = self.infer(value) {
                            if !type_matches(Some(&annotation), Some(&inferred)) {
                                self.report(
                                    format!(
                                        "type mismatch for field '{}' of class '{}': annotated '{annotation}' but assigned expression of type '{inferred}'",
                                        field.name, decl.name
                                    ),
                                    field.span,
                                );
                            }
                        }
                    }
                }
                Member::Method(method) => {
                    self.scopes.push(HashMap::new());
                    self.scopes
                        .last_mut()
                        .expect("scope stack is never empty")
                        .insert("this".to_string(), None);
                    self.check_intent_decl(&method.intent);
                    self.scopes.pop();
                }
            }
        }
    }

    fn check_class_interfaces(&mut self, decl: &ClassDecl) {
        for iface in &decl.implements {
            let required = match self.interfaces.get(iface) {
                Some(required) => required.clone(),
                None => {
                    self.report(
                        format!(
                            "class '{}' implements unknown interface '{iface}'",
                            decl.name
                        ),
                        decl.span,
                    );
                    continue;
                }
            };

            for (method_name, param_types, return_type, _) in &required {
                let key = format!("{}.{method_name}", decl.name);
                let (class_params, class_return) = match self.func_signatures.get(&key) {
                    Some(signature) => signature.clone(),
                    None => {
                        self.report(
                            format!(
                                "class '{}' does not implement method '{method_name}' required by interface '{iface}'",
                                decl.name
                            ),
                            decl.span,
                        );
                        continue;
                    }
                };

                if class_params.len() != param_types.len() {
                    self.report(
                        format!(
                            "method '{method_name}' in class '{}' has incompatible parameter count vs interface '{iface}'",
                            decl.name
                        ),
                        decl.span,
                    );
                    continue;
                }

                for (i, expected) in param_types.iter().enumerate() {
                    if let (Some(expected), Some(found)) = (expected, &class_params[i]) {
                        if !type_matches(Some(expected), Some(found)) {
                            self.report(
                                format!(
                                    "parameter type mismatch in method '{method_name}' of class '{}' for param {i}: expected '{expected}' but found '{found}'",
                                    decl.name
                                ),
                                decl.span,
                            );
                            break;
                        }
                    }
                }

                if let (Some(expected), Some(found)) = (return_type, &class_return) {
                    if !type_matches(Some(expected), Some(found)) {
                        self.report(
                            format!(
                                "return type mismatch in method '{method_name}' of class '{}': interface '{iface}' expects '{expected}' but found '{found}'",
                                decl.name
                            ),
                            decl.span,
                        );
                    }
                }
            }
        }
    }

    fn lookup_scope(&self, name: &str) -> Option<Option<String>> {
        for scope in self.scopes.iter().rev() {
            if let Some(entry) = scope.get(name) {
                return Some(entry.clone());
            }
        }
        None
    }

    /// Shallow expression type inference. `None` means unknown, which
    /// matches everything downstream.
    fn infer(&mut self, expr: &Spanned<Expr>) -> Option<String> {
        match &expr.node {
            Expr::Literal(literal) => Some(
                match literal {
                    Literal::Int(_) => "int",
                    Literal::Float(_) => "float",
                    Literal::Str(_) => "string",
                    Literal::Bool(_) => "bool",
                }
                .to_string(),
            ),
            Expr::Null => Some("null".to_string()),
            Expr::Identifier(name) => {
                if let Some(entry) = self.lookup_scope(name) {
                    return entry;
                }
                if self.func_signatures.contains_key(name) {
                    return Some("intent".to_string());
                }
                None
            }
            Expr::Binary { op, left, right } => {
                let left_type = self.infer(left);
                let right_type = self.infer(right);
                if op.is_arithmetic() {
                    let left_type = left_type.as_deref();
                    let right_type = right_type.as_deref();
                    if *op == BinOp::Add
                        && (left_type == Some("string") || right_type == Some("string"))
                    {
                        return Some("string".to_string());
                    }
                    if matches!(left_type, Some("int") | Some("float"))
                        && matches!(right_type, Some("int") | Some("float"))
                    {
                        if left_type == Some("float") || right_type == Some("float") {
                            return Some("float".to_string());
                        }
                        return Some("int".to_string());
                    }
                    return None;
                }
                if op.is_comparison() || op.is_logical() {
                    return Some("bool".to_string());
                }
                None
            }
            Expr::Unary { operand, .. } => self.infer(operand),
            Expr::Call { callee, args } => {
                // infer arguments first so nested calls are checked too
                let arg_types: Vec<Option<String>> =
                    args.iter().map(|arg| self.infer(arg)).collect();

                let name = match &callee.node {
                    Expr::Identifier(name) => name.clone(),
                    _ => return None,
                };
                let (param_types, return_type) = match self.func_signatures.get(&name) {
                    Some(signature) => signature.clone(),
                    None => return None,
                };

                if args.len() > param_types.len() {
                    self.report(
                        format!(
                            "too many arguments in call to '{name}': expected {} but got {}",
                            param_types.len(),
                            args.len()
                        ),
                        expr.span,
                    );
                }

                for (i, inferred) in arg_types.iter().enumerate() {
                    let expected = param_types.get(i).and_then(|t| t.as_deref());
                    if let (Some(expected), Some(inferred)) = (expected, inferred.as_deref()) {
                        if !type_matches(Some(expected), Some(inferred)) {
                            self.report(
                                format!(
                                    "argument type mismatch in call to '{name}': param {i} expected '{expected}' but got '{inferred}'"
                                ),
                                args[i].span,
                            );
                        }
                    }
                }
                return_type
            }
            Expr::Property { object, .. } => {
                self.infer(object);
                None
            }
            Expr::Index { object, index } => {
                self.infer(object);
                self.infer(index);
                None
            }
            // literals construct the same containers the runtime builds, so
            // both layers see the same base type names
            Expr::Object(entries) => {
                for (_, value) in entries {
                    self.infer(value);
                }
                Some("Map".to_string())
            }
            Expr::Array(items) => {
                for item in items {
                    self.infer(item);
                }
                Some("List".to_string())
            }
            Expr::New { class_name, args } => {
                for arg in args {
                    self.infer(arg);
                }
                Some(class_name.clone())
            }
            Expr::This | Expr::Super => None,
            Expr::Await(inner) => {
                self.infer(inner);
                None
            }
            Expr::Lambda(_) => Some("intent".to_string()),
        }
    }
}

impl Default for TypeChecker {
    fn default() -> Self {
        Self::new()
    }
}

fn signature_of(decl: &IntentDecl) -> Signature {
    (
        decl.params
            .iter()
            .map(|p| p.type_annotation.clone())
            .collect(),
        decl.return_type.clone(),
    )
}

/// Check a source string, for editor tooling: lex/parse failures come back
/// as a single diagnostic, otherwise the full analysis runs.
pub fn check(source: &str) -> Vec<Diagnostic> {
    let tokens = match tokenize(source) {
        Ok(tokens) => tokens,
        Err(err) => {
            return vec![Diagnostic {
                message: err.to_string(),
                span: err.span(),
            }]
        }
    };
    let program = match parse(tokens) {
        Ok(program) => program,
        Err(err) => {
            return vec![Diagnostic {
                message: err.to_string(),
                span: err.span(),
            }]
        }
    };
    let mut checker = TypeChecker::new();
    checker.check(&program);
    checker.take_errors()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diagnostics(source: &str) -> Vec<Diagnostic> {
        check(source)
    }

    fn clean(source: &str) -> bool {
        diagnostics(source).is_empty()
    }

    #[test]
    fn test_literal_declaration_ok() {
        assert!(clean("var x: int = 5"));
        assert!(clean("var s: string = \"hi\""));
        assert!(clean("var b: bool = true"));
    }

    #[test]
    fn test_literal_declaration_mismatch() {
        let errors = diagnostics("var x: int = \"nope\"");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("variable 'x'"));
        assert!(errors[0].span.is_some());
    }

    #[test]
    fn test_float_annotation_accepts_int_literal() {
        assert!(clean("var y: float = 5"));
        assert!(!clean("var x: int = 5.0"));
    }

    #[test]
    fn test_unannotated_is_fail_open() {
        assert!(clean("var x = whatever_this_is"));
    }

    #[test]
    fn test_arithmetic_inference() {
        assert!(clean("var x: int = 1 + 2 * 3"));
        assert!(clean("var y: float = 1 + 2.5"));
        assert!(!clean("var z: int = 1 + 2.5"));
        assert!(clean("var s: string = \"n=\" + 1"));
        assert!(clean("var b: bool = 1 < 2"));
    }

    #[test]
    fn test_identifier_type_flows_through_scope() {
        assert!(!clean("var a = 1 var b: string = a"));
        assert!(clean("var a = 1 var b: int = a"));
    }

    #[test]
    fn test_assignment_updates_recorded_type() {
        // after re-assignment the identifier's inferred type changes
        assert!(!clean("var a = 1 a = \"text\" var b: int = a"));
    }

    #[test]
    fn test_return_type_checked() {
        assert!(clean("intent f(): int { return 1 }"));
        let errors = diagnostics("intent f(): int { return \"no\" }");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("return type mismatch"));
    }

    #[test]
    fn test_return_widening_ok() {
        assert!(clean("intent f(): float { return 1 }"));
        assert!(!clean("intent f(): int { return 1.5 }"));
    }

    #[test]
    fn test_call_argument_type_checked() {
        let source = "intent f(x: int) { } f(\"text\")";
        let errors = diagnostics(source);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("param 0"));
    }

    #[test]
    fn test_call_arity_checked() {
        let errors = diagnostics("intent f(x: int) { } f(1, 2)");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("too many arguments"));
    }

    #[test]
    fn test_call_with_unknown_arg_is_fail_open() {
        assert!(clean("intent f(x: int) { } f(mystery)"));
    }

    #[test]
    fn test_call_return_feeds_declaration() {
        assert!(!clean("intent f(): string { return \"s\" } var x: int = f()"));
        assert!(clean("intent f(): int { return 1 } var x: int = f()"));
    }

    #[test]
    fn test_unknown_callee_is_fail_open() {
        assert!(clean("var x: int = not_declared(1, 2, 3)"));
    }

    #[test]
    fn test_interface_conformance_ok() {
        assert!(clean(
            "interface Named { intent getName(): string } class User implements Named { intent getName(): string { return \"u\" } }"
        ));
    }

    #[test]
    fn test_interface_missing_method() {
        let errors = diagnostics(
            "interface Named { intent getName(): string } class User implements Named { }",
        );
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("does not implement"));
    }

    #[test]
    fn test_interface_return_type_mismatch() {
        let errors = diagnostics(
            "interface Named { intent getName(): string } class User implements Named { intent getName(): int { return 1 } }",
        );
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("return type mismatch"));
        assert!(errors[0].message.contains("getName"));
    }

    #[test]
    fn test_interface_param_type_mismatch() {
        let errors = diagnostics(
            "interface Greeter { intent greet(name: string) } class Bot implements Greeter { intent greet(name: int) { } }",
        );
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("parameter type mismatch"));
    }

    #[test]
    fn test_interface_arity_mismatch() {
        let errors = diagnostics(
            "interface Greeter { intent greet(name: string) } class Bot implements Greeter { intent greet() { } }",
        );
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("parameter count"));
    }

    #[test]
    fn test_unknown_interface() {
        let errors = diagnostics("class User implements Ghost { }");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("unknown interface"));
    }

    #[test]
    fn test_each_interface_reported_individually() {
        let errors = diagnostics(
            "interface A { intent a() } interface B { intent b() } class C implements A, B { }",
        );
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_class_method_signature_collected() {
        // method signatures are keyed Class.method and used for
        // conformance, not call checking
        assert!(clean(
            "class Calc { intent add(a: int, b: int): int { return a + b } }"
        ));
    }

    #[test]
    fn test_new_expression_infers_class_name() {
        assert!(clean("class Dog { } var d: Dog = new Dog()"));
        assert!(!clean("class Dog { } class Cat { } var d: Dog = new Cat()"));
        assert!(clean("var xs: List<int> = new List()"));
    }

    #[test]
    fn test_syntax_error_is_single_diagnostic() {
        let errors = diagnostics("var = 5");
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_optional_and_union_annotations() {
        assert!(clean("var x: Optional<int> = null"));
        assert!(clean("var x: Optional<int> = 5"));
        assert!(!clean("var x: Optional<int> = \"s\""));
        assert!(clean("var y: Union<int, string> = \"s\""));
        assert!(!clean("var y: Union<int, string> = true"));
    }

    #[test]
    fn test_container_literal_inference() {
        assert!(clean("var xs: List<int> = [1, 2]"));
        assert!(clean("var m: Map<string, int> = {a: 1}"));
        assert!(!clean("var x: int = [1]"));
        assert!(!clean("var s: string = {a: 1}"));
    }

    #[test]
    fn test_return_checked_inside_nested_blocks() {
        let errors = diagnostics(
            "intent f(x: int): int { if (x > 0) { return \"no\" } return x }",
        );
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("return type mismatch"));
        assert!(clean("intent f(x: int): int { while (x > 0) { return x } return 0 }"));
    }

    #[test]
    fn test_declarations_checked_inside_blocks() {
        assert!(!clean("if (true) { var x: int = \"no\" }"));
        assert!(!clean("try { } finally { var x: int = 5.0 }"));
        assert!(!clean("for (var i = 0; i < 3; i = i + 1) { var s: string = i }"));
    }

    #[test]
    fn test_loop_variable_annotation_in_scope() {
        assert!(!clean("for (var n: int of [1, 2]) { var s: string = n }"));
        assert!(clean("for (var n: int of [1, 2]) { var m: int = n }"));
    }

    #[test]
    fn test_class_method_body_checked() {
        let errors = diagnostics(
            "class Calc { intent half(x: int): int { return x / 2 } intent bad(): int { return \"no\" } }",
        );
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("bad"));
    }

    #[test]
    fn test_class_field_default_checked() {
        let errors = diagnostics("class P { var x: int = \"no\" }");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("field 'x'"));
        assert!(clean("class P { var x: float = 1 }"));
    }
}
