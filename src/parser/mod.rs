//! Parser for the template language
//!
//! Templates are text with three kinds of constructs: `{name}` references,
//! `{% if %}` / `{% elif %}` / `{% else %}` / `{% endif %}` conditionals, and
//! `{file:<path>}` includes. Any other brace is plain text.

pub mod ast;
mod grammar;
pub mod lexer;

pub use ast::*;
pub use grammar::parse;
