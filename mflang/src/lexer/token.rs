//! Token definitions

use logos::Logos;

fn unescape(inner: &str, quote: char) -> String {
    let mut result = String::new();
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('t') => result.push('\t'),
                Some('r') => result.push('\r'),
                Some('\\') => result.push('\\'),
                Some(q) if q == quote => result.push(q),
                Some(other) => {
                    result.push('\\');
                    result.push(other);
                }
                None => result.push('\\'),
            }
        } else {
            result.push(c);
        }
    }
    result
}

/// MF Token
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r]+")]
#[logos(skip r"#[^\n]*")]
pub enum Token {
    // Keywords
    #[token("var")]
    Var,
    #[token("intent")]
    Intent,
    #[token("fn")]
    Fn,
    #[token("async")]
    Async,
    #[token("await")]
    Await,
    #[token("class")]
    Class,
    #[token("extends")]
    Extends,
    #[token("implements")]
    Implements,
    #[token("interface")]
    Interface,
    #[token("abstract")]
    Abstract,
    #[token("static")]
    Static,
    #[token("private")]
    Private,
    #[token("public")]
    Public,
    #[token("new")]
    New,
    #[token("this")]
    This,
    #[token("super")]
    Super,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("while")]
    While,
    #[token("for")]
    For,
    #[token("in")]
    In,
    #[token("of")]
    Of,
    #[token("return")]
    Return,
    #[token("try")]
    Try,
    #[token("catch")]
    Catch,
    #[token("finally")]
    Finally,
    #[token("throw")]
    Throw,
    #[token("import")]
    Import,
    #[token("dataset")]
    Dataset,
    #[token("model")]
    Model,
    #[token("and")]
    And,
    #[token("or")]
    Or,
    #[token("not")]
    Not,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("null")]
    #[token("None")]
    Null,

    // Literals
    #[regex(r"[0-9]+\.[0-9]+", |lex| lex.slice().parse::<f64>().ok(), priority = 3)]
    FloatLit(f64),

    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok(), priority = 2)]
    IntLit(i64),

    #[regex(r#""([^"\\]|\\.)*""#, |lex| {
        let s = lex.slice();
        unescape(&s[1..s.len()-1], '"')
    })]
    #[regex(r"'([^'\\]|\\.)*'", |lex| {
        let s = lex.slice();
        unescape(&s[1..s.len()-1], '\'')
    })]
    StringLit(String),

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string(), priority = 1)]
    Ident(String),

    // Operators
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<=")]
    LessEq,
    #[token(">=")]
    GreaterEq,
    #[token("<")]
    Less,
    #[token(">")]
    Greater,
    #[token("=")]
    Assign,
    #[token("!")]
    Bang,

    // Delimiters
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(";")]
    Semicolon,
    #[token(":")]
    Colon,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::IntLit(n) => write!(f, "{n}"),
            Token::FloatLit(n) => write!(f, "{n}"),
            Token::StringLit(s) => write!(f, "\"{s}\""),
            Token::Ident(s) => write!(f, "{s}"),
            Token::Var => write!(f, "var"),
            Token::Intent => write!(f, "intent"),
            Token::Fn => write!(f, "fn"),
            Token::Async => write!(f, "async"),
            Token::Await => write!(f, "await"),
            Token::Class => write!(f, "class"),
            Token::Extends => write!(f, "extends"),
            Token::Implements => write!(f, "implements"),
            Token::Interface => write!(f, "interface"),
            Token::Abstract => write!(f, "abstract"),
            Token::Static => write!(f, "static"),
            Token::Private => write!(f, "private"),
            Token::Public => write!(f, "public"),
            Token::New => write!(f, "new"),
            Token::This => write!(f, "this"),
            Token::Super => write!(f, "super"),
            Token::If => write!(f, "if"),
            Token::Else => write!(f, "else"),
            Token::While => write!(f, "while"),
            Token::For => write!(f, "for"),
            Token::In => write!(f, "in"),
            Token::Of => write!(f, "of"),
            Token::Return => write!(f, "return"),
            Token::Try => write!(f, "try"),
            Token::Catch => write!(f, "catch"),
            Token::Finally => write!(f, "finally"),
            Token::Throw => write!(f, "throw"),
            Token::Import => write!(f, "import"),
            Token::Dataset => write!(f, "dataset"),
            Token::Model => write!(f, "model"),
            Token::And => write!(f, "and"),
            Token::Or => write!(f, "or"),
            Token::Not => write!(f, "not"),
            Token::True => write!(f, "true"),
            Token::False => write!(f, "false"),
            Token::Null => write!(f, "null"),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Percent => write!(f, "%"),
            Token::EqEq => write!(f, "=="),
            Token::NotEq => write!(f, "!="),
            Token::LessEq => write!(f, "<="),
            Token::GreaterEq => write!(f, ">="),
            Token::Less => write!(f, "<"),
            Token::Greater => write!(f, ">"),
            Token::Assign => write!(f, "="),
            Token::Bang => write!(f, "!"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::Semicolon => write!(f, ";"),
            Token::Colon => write!(f, ":"),
            Token::Comma => write!(f, ","),
            Token::Dot => write!(f, "."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_literals() {
        assert_eq!(format!("{}", Token::IntLit(42)), "42");
        assert_eq!(format!("{}", Token::FloatLit(1.5)), "1.5");
        assert_eq!(
            format!("{}", Token::StringLit("hello".to_string())),
            "\"hello\""
        );
        assert_eq!(format!("{}", Token::Ident("foo".to_string())), "foo");
    }

    #[test]
    fn test_token_eq() {
        assert_eq!(Token::IntLit(42), Token::IntLit(42));
        assert_ne!(Token::IntLit(42), Token::IntLit(43));
        assert_eq!(
            Token::StringLit("a".to_string()),
            Token::StringLit("a".to_string())
        );
        assert_ne!(Token::Ident("x".to_string()), Token::Ident("y".to_string()));
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape(r"a\nb", '"'), "a\nb");
        assert_eq!(unescape(r"tab\there", '"'), "tab\there");
        assert_eq!(unescape(r"back\\slash", '"'), "back\\slash");
        assert_eq!(unescape(r#"say \"hi\""#, '"'), "say \"hi\"");
        assert_eq!(unescape(r"it\'s", '\''), "it's");
        // Unknown escapes are kept verbatim
        assert_eq!(unescape(r"\q", '"'), "\\q");
    }
}
