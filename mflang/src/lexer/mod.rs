//! Lexer implementation using logos

mod token;

pub use token::Token;

use crate::ast::Span;
use crate::error::{CompileError, Result};
use logos::Logos;

/// Tokenize source code
pub fn tokenize(source: &str) -> Result<Vec<(Token, Span)>> {
    let mut tokens = Vec::new();
    let mut lexer = Token::lexer(source);

    while let Some(result) = lexer.next() {
        let span = Span::new(lexer.span().start, lexer.span().end);
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(_) => {
                return Err(CompileError::lexer(
                    format!("unexpected character: {:?}", lexer.slice()),
                    span,
                ));
            }
        }
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_empty() {
        let tokens = tokenize("").unwrap();
        assert!(tokens.is_empty());
    }

    #[test]
    fn test_tokenize_keywords() {
        let tokens = tokenize("var intent if else true false").unwrap();
        let kinds: Vec<_> = tokens.iter().map(|(t, _)| t.clone()).collect();
        assert_eq!(
            kinds,
            vec![
                Token::Var,
                Token::Intent,
                Token::If,
                Token::Else,
                Token::True,
                Token::False
            ]
        );
    }

    #[test]
    fn test_tokenize_class_keywords() {
        let tokens = tokenize("abstract class extends implements interface").unwrap();
        let kinds: Vec<_> = tokens.iter().map(|(t, _)| t.clone()).collect();
        assert_eq!(
            kinds,
            vec![
                Token::Abstract,
                Token::Class,
                Token::Extends,
                Token::Implements,
                Token::Interface
            ]
        );
    }

    #[test]
    fn test_tokenize_integer_literal() {
        let tokens = tokenize("42").unwrap();
        assert_eq!(tokens.len(), 1);
        assert!(matches!(&tokens[0].0, Token::IntLit(n) if *n == 42));
    }

    #[test]
    fn test_tokenize_float_literal() {
        let tokens = tokenize("1.5").unwrap();
        assert_eq!(tokens.len(), 1);
        assert!(matches!(&tokens[0].0, Token::FloatLit(n) if (*n - 1.5).abs() < f64::EPSILON));
    }

    #[test]
    fn test_tokenize_string_literal_double() {
        let tokens = tokenize(r#""hello world""#).unwrap();
        assert_eq!(tokens.len(), 1);
        assert!(matches!(&tokens[0].0, Token::StringLit(s) if s == "hello world"));
    }

    #[test]
    fn test_tokenize_string_literal_single() {
        let tokens = tokenize("'hello'").unwrap();
        assert_eq!(tokens.len(), 1);
        assert!(matches!(&tokens[0].0, Token::StringLit(s) if s == "hello"));
    }

    #[test]
    fn test_tokenize_string_escapes() {
        let tokens = tokenize(r#""a\nb\tc""#).unwrap();
        assert!(matches!(&tokens[0].0, Token::StringLit(s) if s == "a\nb\tc"));
    }

    #[test]
    fn test_tokenize_operators() {
        let tokens = tokenize("+ - * / %").unwrap();
        let kinds: Vec<_> = tokens.iter().map(|(t, _)| t.clone()).collect();
        assert_eq!(
            kinds,
            vec![
                Token::Plus,
                Token::Minus,
                Token::Star,
                Token::Slash,
                Token::Percent
            ]
        );
    }

    #[test]
    fn test_tokenize_comparison_operators() {
        let tokens = tokenize("== != < > <= >=").unwrap();
        let kinds: Vec<_> = tokens.iter().map(|(t, _)| t.clone()).collect();
        assert_eq!(
            kinds,
            vec![
                Token::EqEq,
                Token::NotEq,
                Token::Less,
                Token::Greater,
                Token::LessEq,
                Token::GreaterEq
            ]
        );
    }

    #[test]
    fn test_tokenize_comment_skipped() {
        let tokens = tokenize("var x # this is ignored\nvar y").unwrap();
        let kinds: Vec<_> = tokens.iter().map(|(t, _)| t.clone()).collect();
        assert_eq!(
            kinds,
            vec![
                Token::Var,
                Token::Ident("x".to_string()),
                Token::Var,
                Token::Ident("y".to_string())
            ]
        );
    }

    #[test]
    fn test_tokenize_none_is_null() {
        let tokens = tokenize("None null").unwrap();
        let kinds: Vec<_> = tokens.iter().map(|(t, _)| t.clone()).collect();
        assert_eq!(kinds, vec![Token::Null, Token::Null]);
    }

    #[test]
    fn test_tokenize_spans() {
        let tokens = tokenize("var x").unwrap();
        assert_eq!(tokens[0].1, Span::new(0, 3));
        assert_eq!(tokens[1].1, Span::new(4, 5));
    }

    #[test]
    fn test_tokenize_dotted_name() {
        let tokens = tokenize("mf.collections.List").unwrap();
        assert_eq!(tokens.len(), 5);
        assert!(matches!(&tokens[0].0, Token::Ident(s) if s == "mf"));
        assert_eq!(tokens[1].0, Token::Dot);
    }

    #[test]
    fn test_tokenize_unexpected_character() {
        let result = tokenize("var x = @");
        assert!(result.is_err());
    }
}
