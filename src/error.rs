//! Error types for template parsing

use ariadne::{Color, Label, Report, ReportKind, Source};
use thiserror::Error;

use crate::parser::lexer::{Tag, Token};

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Parse error at {span:?}: {message}")]
    Syntax {
        span: Span,
        message: String,
        expected: Vec<String>,
    },
}

impl ParseError {
    /// Human-readable message without position
    pub fn message(&self) -> &str {
        match self {
            ParseError::Syntax { message, .. } => message,
        }
    }

    /// Format the error with source context using ariadne
    pub fn format(&self, source: &str, filename: &str) -> String {
        let mut buf = Vec::new();
        match self {
            ParseError::Syntax {
                span,
                message,
                expected,
            } => {
                let expected_str = if expected.is_empty() {
                    String::new()
                } else {
                    format!("\nExpected: {}", expected.join(", "))
                };

                let written = Report::build(ReportKind::Error, filename, span.start)
                    .with_message(message)
                    .with_label(
                        Label::new((filename, span.clone()))
                            .with_message(format!("{}{}", message, expected_str))
                            .with_color(Color::Red),
                    )
                    .finish()
                    .write((filename, Source::from(source)), &mut buf);

                if written.is_err() {
                    return self.to_string();
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }
}

impl<'a> From<chumsky::error::Rich<'a, Token>> for ParseError {
    fn from(err: chumsky::error::Rich<'a, Token>) -> Self {
        use chumsky::error::{RichPattern, RichReason};

        let found_token = err.found().cloned();
        let expects_endif = err.expected().any(|e| match e {
            RichPattern::Token(tok) => is_endif(tok),
            _ => false,
        });

        let message = match (&found_token, err.reason()) {
            (None, _) if expects_endif => {
                "unterminated conditional: missing {% endif %}".to_string()
            }
            (Some(Token::Tag(tag)), _) if !matches!(tag, Tag::If(_)) => {
                format!("{} without a matching {{% if %}}", format_token(&Token::Tag(tag.clone())))
            }
            (_, RichReason::Custom(msg)) => msg.to_string(),
            (found, _) => match found {
                Some(tok) => format!("Unexpected {}", format_token(tok)),
                None => "Unexpected end of input".to_string(),
            },
        };

        let expected: Vec<String> = err
            .expected()
            .filter_map(|e| match e {
                RichPattern::Token(tok) => Some(format_token(tok)),
                RichPattern::Label(label) => Some(label.to_string()),
                RichPattern::EndOfInput => Some("end of input".to_string()),
                _ => None,
            })
            .collect();

        ParseError::Syntax {
            span: err.span().into_range(),
            message,
            expected,
        }
    }
}

fn is_endif(tok: &Token) -> bool {
    matches!(tok, Token::Tag(Tag::Endif))
}

/// Format a token for human-readable error messages
fn format_token(tok: &Token) -> String {
    match tok {
        Token::Tag(Tag::If(_)) => "'{% if %}'".to_string(),
        Token::Tag(Tag::Elif(_)) => "'{% elif %}'".to_string(),
        Token::Tag(Tag::Else) => "'{% else %}'".to_string(),
        Token::Tag(Tag::Endif) => "'{% endif %}'".to_string(),
        Token::IncludeOpen => "'{file:'".to_string(),
        Token::Var(name) => format!("reference '{{{}}}'", name),
        Token::BraceOpen => "'{'".to_string(),
        Token::BraceClose => "'}'".to_string(),
        Token::Text(s) => format!("text \"{}\"", s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_includes_message() {
        let err = ParseError::Syntax {
            span: 0..5,
            message: "unterminated conditional: missing {% endif %}".to_string(),
            expected: vec![],
        };
        let report = err.format("{% if a nonempty %}x", "command");
        assert!(report.contains("unterminated conditional"));
        assert!(report.contains("command"));
    }

    #[test]
    fn test_format_token_names() {
        assert_eq!(format_token(&Token::Tag(Tag::Endif)), "'{% endif %}'");
        assert_eq!(format_token(&Token::Var("x".into())), "reference '{x}'");
    }
}
