//! The type-matching algorithm shared by runtime enforcement and the
//! static checker. Both layers funnel into [`expr_matches`]; the runtime
//! derives the actual side from a concrete value, the checker from an
//! inferred type string.

use crate::interp::Value;

/// A parsed type annotation: a base name plus generic arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeExpr {
    pub base: String,
    pub args: Vec<TypeExpr>,
}

impl TypeExpr {
    pub fn simple(base: impl Into<String>) -> Self {
        TypeExpr {
            base: base.into(),
            args: Vec::new(),
        }
    }
}

impl std::fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.base)?;
        if !self.args.is_empty() {
            write!(f, "<")?;
            for (i, arg) in self.args.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{arg}")?;
            }
            write!(f, ">")?;
        }
        Ok(())
    }
}

/// Split `a, b<c, d>, e` into top-level comma-separated pieces, tracking
/// angle-bracket depth.
fn split_generic_args(args: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    for ch in args.chars() {
        match ch {
            '<' => {
                depth += 1;
                current.push(ch);
            }
            '>' => {
                depth -= 1;
                current.push(ch);
            }
            ',' if depth == 0 => {
                result.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    if !current.trim().is_empty() {
        result.push(current.trim().to_string());
    }
    result
}

/// Parse an annotation string (`Base<Args...>`) into a [`TypeExpr`].
pub fn parse_annotation(annotation: &str) -> TypeExpr {
    let annotation = annotation.trim();
    match annotation.split_once('<') {
        None => TypeExpr::simple(annotation),
        Some((base, rest)) => {
            let rest = rest.strip_suffix('>').unwrap_or(rest);
            TypeExpr {
                base: base.trim().to_string(),
                args: split_generic_args(rest)
                    .iter()
                    .map(|arg| parse_annotation(arg))
                    .collect(),
            }
        }
    }
}

/// Canonical spelling of aliased type names. The specialized sequence
/// containers share the List representation at runtime.
fn normalize(name: &str) -> &str {
    match name {
        "str" | "String" => "string",
        "Int" => "int",
        "Float" => "float",
        "HashMap" => "Map",
        "EmbedList" | "Matrix" => "List",
        other => other,
    }
}

fn is_any(expr: &TypeExpr) -> bool {
    expr.base.is_empty() || expr.base.eq_ignore_ascii_case("any")
}

/// The shared matcher. `expected` comes from a declared annotation;
/// `actual` is either a value's derived type expression (runtime) or an
/// inferred static type (checker). `any` on either side matches.
pub fn expr_matches(expected: &TypeExpr, actual: &TypeExpr) -> bool {
    if is_any(expected) || is_any(actual) {
        return true;
    }

    // Optional<T...> accepts null or any inner type
    if expected.base == "Optional" {
        if actual.base == "null" {
            return true;
        }
        if expected.args.is_empty() {
            return true;
        }
        if actual.base == "Optional" {
            if actual.args.is_empty() {
                return true;
            }
            let limit = expected.args.len().min(actual.args.len());
            return (0..limit).any(|i| expr_matches(&expected.args[i], &actual.args[i]));
        }
        return expected
            .args
            .iter()
            .any(|inner| expr_matches(inner, actual));
    }

    // Union<T...> accepts any inner type
    if expected.base == "Union" {
        return expected
            .args
            .iter()
            .any(|inner| expr_matches(inner, actual));
    }
    if actual.base == "Union" {
        return actual.args.iter().any(|inner| expr_matches(expected, inner));
    }

    // Generic expected type: base names must agree; argument-level matching
    // only when the actual side exposes arguments too
    if !expected.args.is_empty() {
        if normalize(&expected.base) != normalize(&actual.base) {
            return false;
        }
        if actual.args.is_empty() {
            return true;
        }
        let limit = expected.args.len().min(actual.args.len());
        return (0..limit).all(|i| expr_matches(&expected.args[i], &actual.args[i]));
    }

    // Scalars: exact match with the single int -> float widening
    let expected_norm = normalize(&expected.base);
    let actual_norm = normalize(&actual.base);
    if expected_norm == actual_norm {
        return true;
    }
    expected_norm == "float" && actual_norm == "int"
}

/// Static front-end: match two annotation/inferred-type strings. `None`
/// (unknown) always matches — the checker is fail-open.
pub fn type_matches(expected: Option<&str>, actual: Option<&str>) -> bool {
    let (expected, actual) = match (expected, actual) {
        (Some(e), Some(a)) => (e.trim(), a.trim()),
        _ => return true,
    };
    if expected.is_empty() || actual.is_empty() {
        return true;
    }
    expr_matches(&parse_annotation(expected), &parse_annotation(actual))
}

/// Derive the type expression of a concrete runtime value, including the
/// type arguments its container was constructed with.
pub fn value_type_expr(value: &Value) -> TypeExpr {
    let (base, args) = value.type_expr();
    TypeExpr {
        base,
        args: args.iter().map(|arg| parse_annotation(arg)).collect(),
    }
}

/// Runtime front-end: does `value` satisfy the annotation? An absent or
/// empty annotation matches everything.
pub fn value_matches(value: &Value, annotated: Option<&str>) -> bool {
    let annotated = match annotated {
        Some(a) if !a.trim().is_empty() => a.trim(),
        _ => return true,
    };
    expr_matches(&parse_annotation(annotated), &value_type_expr(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::ListObject;
    use std::sync::Arc;

    #[test]
    fn test_parse_simple() {
        let expr = parse_annotation("int");
        assert_eq!(expr.base, "int");
        assert!(expr.args.is_empty());
    }

    #[test]
    fn test_parse_generic() {
        let expr = parse_annotation("Map<string, List<int>>");
        assert_eq!(expr.base, "Map");
        assert_eq!(expr.args.len(), 2);
        assert_eq!(expr.args[0].base, "string");
        assert_eq!(expr.args[1].base, "List");
        assert_eq!(expr.args[1].args[0].base, "int");
    }

    #[test]
    fn test_scalar_reflexive() {
        for ty in ["int", "float", "string", "bool", "null"] {
            assert!(type_matches(Some(ty), Some(ty)), "{ty} should match itself");
        }
    }

    #[test]
    fn test_float_accepts_int_not_reverse() {
        assert!(type_matches(Some("float"), Some("int")));
        assert!(!type_matches(Some("int"), Some("float")));
    }

    #[test]
    fn test_any_matches_everything() {
        assert!(type_matches(Some("any"), Some("string")));
        assert!(type_matches(Some("Any"), Some("List<int>")));
        assert!(type_matches(Some("int"), Some("any")));
    }

    #[test]
    fn test_unknown_fail_open() {
        assert!(type_matches(None, Some("int")));
        assert!(type_matches(Some("int"), None));
        assert!(type_matches(Some(""), Some("int")));
    }

    #[test]
    fn test_optional() {
        assert!(type_matches(Some("Optional<int>"), Some("null")));
        assert!(type_matches(Some("Optional<int>"), Some("int")));
        assert!(!type_matches(Some("Optional<int>"), Some("string")));
        assert!(type_matches(Some("Optional<int, string>"), Some("string")));
        // bare Optional matches anything
        assert!(type_matches(Some("Optional"), Some("string")));
    }

    #[test]
    fn test_union() {
        assert!(type_matches(Some("Union<int, string>"), Some("int")));
        assert!(type_matches(Some("Union<int, string>"), Some("string")));
        assert!(!type_matches(Some("Union<int, string>"), Some("bool")));
        // union on the actual side
        assert!(type_matches(Some("int"), Some("Union<int, string>")));
    }

    #[test]
    fn test_generic_base_and_args() {
        assert!(type_matches(Some("List<int>"), Some("List<int>")));
        assert!(!type_matches(Some("List<int>"), Some("List<string>")));
        // actual without args: base-name match suffices
        assert!(type_matches(Some("List<int>"), Some("List")));
        assert!(!type_matches(Some("List<int>"), Some("Map")));
        // float widening applies inside generic args
        assert!(type_matches(Some("List<float>"), Some("List<int>")));
    }

    #[test]
    fn test_alias_normalization() {
        assert!(type_matches(Some("string"), Some("str")));
        assert!(type_matches(Some("String"), Some("string")));
        assert!(type_matches(Some("Map<string, int>"), Some("HashMap<string, int>")));
        assert!(type_matches(Some("EmbedList<float>"), Some("List<float>")));
        assert!(type_matches(Some("Matrix<int>"), Some("List<int>")));
    }

    #[test]
    fn test_value_matches_scalars() {
        assert!(value_matches(&Value::Int(5), Some("int")));
        assert!(value_matches(&Value::Int(5), Some("float")));
        assert!(!value_matches(&Value::Float(5.0), Some("int")));
        assert!(value_matches(&Value::string("x"), Some("string")));
        assert!(!value_matches(&Value::string("x"), Some("int")));
        assert!(value_matches(&Value::Null, Some("Optional<int>")));
        assert!(!value_matches(&Value::Null, Some("int")));
    }

    #[test]
    fn test_value_matches_no_annotation() {
        assert!(value_matches(&Value::Int(5), None));
        assert!(value_matches(&Value::Null, Some("  ")));
    }

    #[test]
    fn test_value_matches_list_args() {
        let ints = Value::List(Arc::new(ListObject::new("int")));
        assert!(value_matches(&ints, Some("List<int>")));
        assert!(value_matches(&ints, Some("List<float>")));
        assert!(value_matches(&ints, Some("List")));
        assert!(!value_matches(&ints, Some("List<string>")));
        assert!(!value_matches(&ints, Some("Set<int>")));

        let anything = Value::List(Arc::new(ListObject::new("any")));
        assert!(value_matches(&anything, Some("List<int>")));
    }

    #[test]
    fn test_display_round_trip() {
        let expr = parse_annotation("Map<string, List<int>>");
        assert_eq!(format!("{expr}"), "Map<string, List<int>>");
    }
}
