//! Parser implementation using chumsky

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;

use crate::parser::ast::*;
use crate::parser::lexer::{lex, Tag, Token};

/// Parse template text into an AST
pub fn parse(input: &str) -> Result<Template, Vec<crate::ParseError>> {
    let len = input.len();

    let tokens = lex(input).map_err(|e| vec![e])?;
    let token_iter = tokens.into_iter().map(|(tok, span)| (tok, span.into()));

    // Turn the token iterator into a stream that chumsky can use
    let token_stream = Stream::from_iter(token_iter)
        // Split (Token, SimpleSpan) into token and span parts
        .map((len..len).into(), |(t, s): (_, _)| (t, s));

    template_parser()
        .parse(token_stream)
        .into_result()
        .map(|nodes| Template { nodes })
        .map_err(|errs| errs.into_iter().map(|e| e.into()).collect())
}

/// Join adjacent literal parts of an include path
fn join_literals(parts: Vec<PathPart>) -> Vec<PathPart> {
    let mut out: Vec<PathPart> = Vec::with_capacity(parts.len());
    for part in parts {
        if let PathPart::Literal(text) = &part {
            if let Some(PathPart::Literal(prev)) = out.last_mut() {
                prev.push_str(text);
                continue;
            }
        }
        out.push(part);
    }
    out
}

/// Rebuild the source text of an include from its parts
fn raw_include(path: &[PathPart]) -> String {
    let mut raw = String::from("{file:");
    for part in path {
        match part {
            PathPart::Literal(text) => raw.push_str(text),
            PathPart::Var(name) => {
                raw.push('{');
                raw.push_str(name);
                raw.push('}');
            }
        }
    }
    raw.push('}');
    raw
}

fn template_parser<'a, I>() -> impl Parser<'a, I, Vec<Node>, extra::Err<Rich<'a, Token>>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = SimpleSpan>,
{
    let path_part = select! {
        Token::Text(s) => PathPart::Literal(s),
        Token::Var(name) => PathPart::Var(name),
    };

    // {file:<path>} where the path may contain {name} references
    let include = just(Token::IncludeOpen)
        .ignore_then(path_part.repeated().at_least(1).collect::<Vec<_>>())
        .then_ignore(just(Token::BraceClose))
        .map(join_literals)
        .map(|path| {
            Node::Include(Include {
                raw: raw_include(&path),
                path,
            })
        });

    let variable = select! {
        Token::Var(name) => Node::Var(name),
    };

    let literal = select! {
        Token::Text(s) => Node::Literal(s),
        Token::BraceOpen => Node::Literal("{".to_string()),
        Token::BraceClose => Node::Literal("}".to_string()),
    };

    let if_tag = select! {
        Token::Tag(Tag::If(condition)) => condition,
    };
    let elif_tag = select! {
        Token::Tag(Tag::Elif(condition)) => condition,
    };

    // Recursive node-sequence parser: conditional bodies are sequences too
    let nodes = recursive(|nodes| {
        let conditional = if_tag
            .then(nodes.clone())
            .then(elif_tag.then(nodes.clone()).repeated().collect::<Vec<_>>())
            .then(
                just(Token::Tag(Tag::Else))
                    .ignore_then(nodes.clone())
                    .or_not(),
            )
            .then_ignore(just(Token::Tag(Tag::Endif)))
            .map(|(((condition, body), elifs), otherwise)| {
                let mut branches = vec![Branch { condition, body }];
                branches.extend(
                    elifs
                        .into_iter()
                        .map(|(condition, body)| Branch { condition, body }),
                );
                Node::Conditional(Conditional {
                    branches,
                    otherwise,
                })
            });

        choice((conditional, include, variable, literal))
            .repeated()
            .collect::<Vec<_>>()
            .map(coalesce)
            .boxed()
    });

    nodes.then_ignore(end())
}
