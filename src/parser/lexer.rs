//! Lexer for the template language using logos
//!
//! Text is split into literal runs, `{name}` references, `{file:` include
//! openers, and whole `{% ... %}` tags. A shell-style `${NAME}` stays literal
//! text so include paths can expand it later. Tag bodies are lexed again by
//! [`TagToken`] and folded into a [`Tag`] while scanning, so a malformed tag is
//! a lexing error at its own span.

use logos::Logos;

use crate::error::ParseError;
use crate::parser::ast::{Condition, Span};

/// A `{% ... %}` control tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tag {
    If(Condition),
    Elif(Condition),
    Else,
    Endif,
}

#[derive(Logos, Debug, Clone, PartialEq)]
pub enum Token {
    #[regex(r"\{%([^%]|%[^}])*%\}", |lex| parse_tag(lex.slice()))]
    Tag(Tag),

    #[token("{file:")]
    IncludeOpen,

    #[regex(r"\{[a-zA-Z_][a-zA-Z0-9_]*\}", |lex| {
        let s = lex.slice();
        s[1..s.len()-1].to_string()
    })]
    Var(String),

    // Braces that are not part of a construct are literal text
    #[token("{")]
    BraceOpen,
    #[token("}")]
    BraceClose,

    // `$` always ends a run so `${NAME}` lexes whole; the parser rejoins runs
    #[regex(r"[^{}$]+", |lex| lex.slice().to_string())]
    #[regex(r"\$\{[a-zA-Z_][a-zA-Z0-9_]*\}", |lex| lex.slice().to_string())]
    #[token("$", |lex| lex.slice().to_string())]
    Text(String),
}

/// Tokens inside a `{% ... %}` tag
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r]+")]
pub enum TagToken {
    #[token("if")]
    If,
    #[token("elif")]
    Elif,
    #[token("else")]
    Else,
    #[token("endif")]
    Endif,
    #[token("nonempty")]
    NonEmpty,
    #[token("eq")]
    Eq,

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string(), priority = 1)]
    Ident(String),

    #[regex(r#""([^"\\]|\\.)*""#, |lex| unescape(&lex.slice()[1..lex.slice().len()-1]))]
    String(String),
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Parse the body of a `{% ... %}` tag
fn parse_tag(slice: &str) -> Option<Tag> {
    let body = &slice[2..slice.len() - 2];
    let tokens = TagToken::lexer(body)
        .collect::<Result<Vec<_>, _>>()
        .ok()?;

    let condition = |rest: &[TagToken]| match rest {
        [TagToken::Ident(name), TagToken::NonEmpty] => Some(Condition::NonEmpty(name.clone())),
        [TagToken::Ident(name), TagToken::Eq, TagToken::String(literal)] => {
            Some(Condition::Equals {
                name: name.clone(),
                literal: literal.clone(),
            })
        }
        _ => None,
    };

    match tokens.as_slice() {
        [TagToken::If, rest @ ..] => condition(rest).map(Tag::If),
        [TagToken::Elif, rest @ ..] => condition(rest).map(Tag::Elif),
        [TagToken::Else] => Some(Tag::Else),
        [TagToken::Endif] => Some(Tag::Endif),
        _ => None,
    }
}

/// Lex template text into tokens with spans
///
/// Unlike a plain token stream, unrecognized input is an error: the only
/// input logos rejects here is a `{% ... %}` tag it cannot read.
pub fn lex(input: &str) -> Result<Vec<(Token, Span)>, ParseError> {
    Token::lexer(input)
        .spanned()
        .map(|(tok, span)| match tok {
            Ok(tok) => Ok((tok, span)),
            Err(()) => Err(ParseError::Syntax {
                message: format!("unrecognized template tag `{}`", &input[span.clone()]),
                span,
                expected: vec![
                    "{% if <name> nonempty %}".to_string(),
                    "{% if <name> eq \"<text>\" %}".to_string(),
                    "{% elif ... %}".to_string(),
                    "{% else %}".to_string(),
                    "{% endif %}".to_string(),
                ],
            }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token> {
        lex(input)
            .expect("Should lex")
            .into_iter()
            .map(|(t, _)| t)
            .collect()
    }

    #[test]
    fn test_text_and_variables() {
        assert_eq!(
            tokens("echo {greeting} world"),
            vec![
                Token::Text("echo ".to_string()),
                Token::Var("greeting".to_string()),
                Token::Text(" world".to_string()),
            ]
        );
    }

    #[test]
    fn test_whitespace_is_preserved() {
        assert_eq!(
            tokens("  a\n\tb "),
            vec![Token::Text("  a\n\tb ".to_string())]
        );
    }

    #[test]
    fn test_stray_braces_are_literal() {
        assert_eq!(
            tokens(r#"{"k": 1}"#),
            vec![
                Token::BraceOpen,
                Token::Text(r#""k": 1"#.to_string()),
                Token::BraceClose,
            ]
        );
    }

    #[test]
    fn test_conditional_tags() {
        assert_eq!(
            tokens(r#"{% if x nonempty %}{% elif mode eq "fast" %}{% else %}{%endif%}"#),
            vec![
                Token::Tag(Tag::If(Condition::NonEmpty("x".to_string()))),
                Token::Tag(Tag::Elif(Condition::Equals {
                    name: "mode".to_string(),
                    literal: "fast".to_string(),
                })),
                Token::Tag(Tag::Else),
                Token::Tag(Tag::Endif),
            ]
        );
    }

    #[test]
    fn test_include_with_nested_reference() {
        assert_eq!(
            tokens("{file:{BASE}/$ENV/file.txt}"),
            vec![
                Token::IncludeOpen,
                Token::Var("BASE".to_string()),
                Token::Text("/".to_string()),
                Token::Text("$".to_string()),
                Token::Text("ENV/file.txt".to_string()),
                Token::BraceClose,
            ]
        );
    }

    #[test]
    fn test_braced_shell_reference_is_text() {
        assert_eq!(
            tokens("{file:${HOME}/x.txt}"),
            vec![
                Token::IncludeOpen,
                Token::Text("${HOME}".to_string()),
                Token::Text("/x.txt".to_string()),
                Token::BraceClose,
            ]
        );
        assert_eq!(
            tokens("echo $"),
            vec![Token::Text("echo ".to_string()), Token::Text("$".to_string())]
        );
    }

    #[test]
    fn test_string_literal_escapes() {
        assert_eq!(
            tokens(r#"{% if v eq "a \"b\"" %}"#),
            vec![Token::Tag(Tag::If(Condition::Equals {
                name: "v".to_string(),
                literal: "a \"b\"".to_string(),
            }))]
        );
    }

    #[test]
    fn test_malformed_tag_is_an_error() {
        let err = lex("ok {% unless x %} done").expect_err("Should reject");
        match err {
            ParseError::Syntax { span, .. } => assert_eq!(span, 3..17),
        }
    }
}
