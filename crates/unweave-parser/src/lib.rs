//! JavaScript parser and arena AST for the unweave bundle reconstructor.

pub mod node;
pub mod parser;

pub use node::{ImportKind, Node, NodeArena, NodeIndex, NodeKind, VarKind};
pub use parser::{ParserState, parse};
