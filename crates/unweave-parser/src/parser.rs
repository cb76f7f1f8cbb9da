//! Recursive-descent / precedence-climbing parser for the JavaScript
//! subset bundles use.
//!
//! The parser is error-tolerant: problems are collected as diagnostics and
//! a best-effort tree is still produced. Callers decide whether a
//! non-empty diagnostic list is fatal.

use crate::node::{ImportKind, NodeArena, NodeIndex, NodeKind, VarKind};
use tracing::debug;
use unweave_common::Diagnostic;
use unweave_scanner::{Scanner, SyntaxKind, Token};

pub struct ParserState<'a> {
    scanner: Scanner<'a>,
    token: Token,
    pub arena: NodeArena,
    pub diagnostics: Vec<Diagnostic>,
    file_name: String,
}

impl<'a> ParserState<'a> {
    pub fn new(file_name: &str, source: &'a str) -> ParserState<'a> {
        let mut scanner = Scanner::new(file_name, source);
        let token = scanner.scan();
        ParserState {
            scanner,
            token,
            arena: NodeArena::new(file_name),
            diagnostics: Vec::new(),
            file_name: file_name.to_string(),
        }
    }

    fn bump(&mut self) -> Token {
        let next = self.scanner.scan();
        std::mem::replace(&mut self.token, next)
    }

    fn at(&self, kind: SyntaxKind) -> bool {
        self.token.kind == kind
    }

    fn eat(&mut self, kind: SyntaxKind) -> bool {
        if self.at(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn error_at_token(&mut self, message: impl Into<String>) {
        let tok = &self.token;
        self.diagnostics.push(Diagnostic::error(
            &self.file_name,
            tok.pos,
            tok.end.saturating_sub(tok.pos),
            message,
        ));
    }

    fn expect(&mut self, kind: SyntaxKind) -> Token {
        if self.at(kind) {
            return self.bump();
        }
        self.error_at_token(format!("Expected {kind:?}, found '{}'", self.token.text));
        self.token.clone()
    }

    /// Automatic semicolon insertion: a real `;`, or a `}` / EOF / line
    /// break standing in for one.
    fn eat_semicolon(&mut self) {
        if self.eat(SyntaxKind::Semicolon) {
            return;
        }
        if self.at(SyntaxKind::CloseBrace)
            || self.at(SyntaxKind::EndOfFile)
            || self.token.preceded_by_newline
        {
            return;
        }
        self.error_at_token(format!("Expected ';', found '{}'", self.token.text));
    }

    /// Keywords that are valid property names after `.` or as object keys.
    fn at_ident_like(&self) -> bool {
        use SyntaxKind::*;
        matches!(
            self.token.kind,
            Identifier
                | DefaultKeyword
                | FromKeyword
                | AsKeyword
                | NewKeyword
                | DeleteKeyword
                | TypeofKeyword
                | InKeyword
                | VoidKeyword
        )
    }

    fn parse_ident(&mut self) -> NodeIndex {
        if self.at_ident_like() {
            let tok = self.bump();
            self.arena
                .alloc(NodeKind::Ident { name: tok.text }, tok.pos, tok.end)
        } else {
            self.error_at_token(format!("Expected identifier, found '{}'", self.token.text));
            let pos = self.token.pos;
            self.arena.alloc(
                NodeKind::Ident {
                    name: String::from("__missing"),
                },
                pos,
                pos,
            )
        }
    }

    // ==================== Program & statements ====================

    pub fn parse_program(&mut self) -> NodeIndex {
        let mut statements = Vec::new();
        while !self.at(SyntaxKind::EndOfFile) {
            let before = self.token.pos;
            let stmt = self.parse_statement();
            statements.push(stmt);
            // Guarantee progress on malformed input.
            if self.token.pos == before && !self.at(SyntaxKind::EndOfFile) {
                self.error_at_token(format!("Unexpected token '{}'", self.token.text));
                self.bump();
            }
        }
        debug!(
            statements = statements.len(),
            diagnostics = self.diagnostics.len(),
            "parsed program"
        );
        let end = self.token.end;
        self.arena.alloc(NodeKind::Program { statements }, 0, end)
    }

    fn parse_statement(&mut self) -> NodeIndex {
        use SyntaxKind::*;
        match self.token.kind {
            OpenBrace => self.parse_block(),
            Semicolon => {
                let tok = self.bump();
                self.arena.alloc(NodeKind::Empty, tok.pos, tok.end)
            }
            VarKeyword | LetKeyword | ConstKeyword => {
                let stmt = self.parse_var_statement();
                self.eat_semicolon();
                stmt
            }
            FunctionKeyword => self.parse_function(false, false),
            ReturnKeyword => {
                let tok = self.bump();
                let argument = if self.at(Semicolon)
                    || self.at(CloseBrace)
                    || self.at(EndOfFile)
                    || self.token.preceded_by_newline
                {
                    NodeIndex::NONE
                } else {
                    self.parse_expression()
                };
                self.eat_semicolon();
                self.arena
                    .alloc(NodeKind::Return { argument }, tok.pos, tok.end)
            }
            IfKeyword => self.parse_if(),
            WhileKeyword => {
                let tok = self.bump();
                self.expect(OpenParen);
                let condition = self.parse_expression();
                self.expect(CloseParen);
                let body = self.parse_statement();
                self.arena
                    .alloc(NodeKind::While { condition, body }, tok.pos, tok.end)
            }
            ForKeyword => self.parse_for(),
            BreakKeyword => {
                let tok = self.bump();
                self.eat_semicolon();
                self.arena.alloc(NodeKind::Break, tok.pos, tok.end)
            }
            ContinueKeyword => {
                let tok = self.bump();
                self.eat_semicolon();
                self.arena.alloc(NodeKind::Continue, tok.pos, tok.end)
            }
            ImportKeyword => self.parse_import(),
            ExportKeyword => self.parse_export(),
            _ => {
                let pos = self.token.pos;
                let expression = self.parse_expression();
                self.eat_semicolon();
                let end = self.arena.get(expression).map_or(pos, |n| n.end);
                self.arena
                    .alloc(NodeKind::ExprStatement { expression }, pos, end)
            }
        }
    }

    fn parse_block(&mut self) -> NodeIndex {
        let open = self.expect(SyntaxKind::OpenBrace);
        let mut statements = Vec::new();
        while !self.at(SyntaxKind::CloseBrace) && !self.at(SyntaxKind::EndOfFile) {
            let before = self.token.pos;
            statements.push(self.parse_statement());
            if self.token.pos == before
                && !self.at(SyntaxKind::CloseBrace)
                && !self.at(SyntaxKind::EndOfFile)
            {
                self.error_at_token(format!("Unexpected token '{}'", self.token.text));
                self.bump();
            }
        }
        let close = self.expect(SyntaxKind::CloseBrace);
        self.arena
            .alloc(NodeKind::Block { statements }, open.pos, close.end)
    }

    fn parse_var_statement(&mut self) -> NodeIndex {
        let tok = self.bump();
        let kind = match tok.kind {
            SyntaxKind::LetKeyword => VarKind::Let,
            SyntaxKind::ConstKeyword => VarKind::Const,
            _ => VarKind::Var,
        };
        let mut declarations = Vec::new();
        loop {
            let name = self.parse_ident();
            let init = if self.eat(SyntaxKind::Equals) {
                self.parse_assignment()
            } else {
                NodeIndex::NONE
            };
            let pos = self.arena.get(name).map_or(tok.pos, |n| n.pos);
            let end = self
                .arena
                .get(if init.is_some() { init } else { name })
                .map_or(tok.end, |n| n.end);
            declarations.push(
                self.arena
                    .alloc(NodeKind::VarDeclarator { name, init }, pos, end),
            );
            if !self.eat(SyntaxKind::Comma) {
                break;
            }
        }
        self.arena
            .alloc(NodeKind::VarStatement { kind, declarations }, tok.pos, tok.end)
    }

    /// `function name(params) { body }` — declaration or expression form.
    fn parse_function(&mut self, is_expression: bool, name_optional: bool) -> NodeIndex {
        let tok = self.expect(SyntaxKind::FunctionKeyword);
        let name = if self.at_ident_like() {
            self.parse_ident()
        } else if is_expression || name_optional {
            NodeIndex::NONE
        } else {
            self.error_at_token("Function declaration requires a name");
            NodeIndex::NONE
        };
        let params = self.parse_params();
        let body = self.parse_block();
        self.arena.alloc(
            NodeKind::Function {
                name,
                params,
                body,
                is_arrow: false,
                is_expression,
            },
            tok.pos,
            tok.end,
        )
    }

    fn parse_params(&mut self) -> Vec<NodeIndex> {
        self.expect(SyntaxKind::OpenParen);
        let mut params = Vec::new();
        while !self.at(SyntaxKind::CloseParen) && !self.at(SyntaxKind::EndOfFile) {
            params.push(self.parse_ident());
            if !self.eat(SyntaxKind::Comma) {
                break;
            }
        }
        self.expect(SyntaxKind::CloseParen);
        params
    }

    fn parse_if(&mut self) -> NodeIndex {
        let tok = self.expect(SyntaxKind::IfKeyword);
        self.expect(SyntaxKind::OpenParen);
        let condition = self.parse_expression();
        self.expect(SyntaxKind::CloseParen);
        let then_branch = self.parse_statement();
        let else_branch = if self.eat(SyntaxKind::ElseKeyword) {
            self.parse_statement()
        } else {
            NodeIndex::NONE
        };
        self.arena.alloc(
            NodeKind::If {
                condition,
                then_branch,
                else_branch,
            },
            tok.pos,
            tok.end,
        )
    }

    fn parse_for(&mut self) -> NodeIndex {
        let tok = self.expect(SyntaxKind::ForKeyword);
        self.expect(SyntaxKind::OpenParen);
        let init = if self.at(SyntaxKind::Semicolon) {
            self.bump();
            NodeIndex::NONE
        } else if matches!(
            self.token.kind,
            SyntaxKind::VarKeyword | SyntaxKind::LetKeyword | SyntaxKind::ConstKeyword
        ) {
            let stmt = self.parse_var_statement();
            self.expect(SyntaxKind::Semicolon);
            stmt
        } else {
            let expression = self.parse_expression();
            self.expect(SyntaxKind::Semicolon);
            let pos = self.arena.get(expression).map_or(tok.pos, |n| n.pos);
            let end = self.arena.get(expression).map_or(tok.end, |n| n.end);
            self.arena
                .alloc(NodeKind::ExprStatement { expression }, pos, end)
        };
        let test = if self.at(SyntaxKind::Semicolon) {
            NodeIndex::NONE
        } else {
            self.parse_expression()
        };
        self.expect(SyntaxKind::Semicolon);
        let update = if self.at(SyntaxKind::CloseParen) {
            NodeIndex::NONE
        } else {
            self.parse_expression()
        };
        self.expect(SyntaxKind::CloseParen);
        let body = self.parse_statement();
        self.arena.alloc(
            NodeKind::For {
                init,
                test,
                update,
                body,
            },
            tok.pos,
            tok.end,
        )
    }

    // ==================== Module items ====================

    fn parse_import(&mut self) -> NodeIndex {
        let tok = self.expect(SyntaxKind::ImportKeyword);
        let mut specifiers = Vec::new();
        if self.at(SyntaxKind::StringLiteral) {
            // Side-effect import: `import 'id';`
            let source_tok = self.bump();
            let source = self.arena.alloc(
                NodeKind::Str {
                    value: source_tok.text,
                },
                source_tok.pos,
                source_tok.end,
            );
            self.eat_semicolon();
            return self
                .arena
                .alloc(NodeKind::ImportDecl { specifiers, source }, tok.pos, tok.end);
        }
        if self.at_ident_like() {
            let local = self.parse_ident();
            specifiers.push(self.arena.synth(NodeKind::ImportSpecifier {
                kind: ImportKind::Default,
                imported: NodeIndex::NONE,
                local,
            }));
            self.eat(SyntaxKind::Comma);
        }
        if self.at(SyntaxKind::Asterisk) {
            self.bump();
            self.expect(SyntaxKind::AsKeyword);
            let local = self.parse_ident();
            specifiers.push(self.arena.synth(NodeKind::ImportSpecifier {
                kind: ImportKind::Namespace,
                imported: NodeIndex::NONE,
                local,
            }));
        } else if self.eat(SyntaxKind::OpenBrace) {
            while !self.at(SyntaxKind::CloseBrace) && !self.at(SyntaxKind::EndOfFile) {
                let imported = self.parse_ident();
                let local = if self.eat(SyntaxKind::AsKeyword) {
                    self.parse_ident()
                } else {
                    let name = self.arena.ident_name(imported).unwrap_or("").to_string();
                    self.arena.make_ident(&name)
                };
                specifiers.push(self.arena.synth(NodeKind::ImportSpecifier {
                    kind: ImportKind::Named,
                    imported,
                    local,
                }));
                if !self.eat(SyntaxKind::Comma) {
                    break;
                }
            }
            self.expect(SyntaxKind::CloseBrace);
        }
        self.expect(SyntaxKind::FromKeyword);
        let source_tok = self.expect(SyntaxKind::StringLiteral);
        let source = self.arena.alloc(
            NodeKind::Str {
                value: source_tok.text,
            },
            source_tok.pos,
            source_tok.end,
        );
        self.eat_semicolon();
        self.arena
            .alloc(NodeKind::ImportDecl { specifiers, source }, tok.pos, tok.end)
    }

    fn parse_export(&mut self) -> NodeIndex {
        let tok = self.expect(SyntaxKind::ExportKeyword);
        if self.eat(SyntaxKind::DefaultKeyword) {
            let declaration = if self.at(SyntaxKind::FunctionKeyword) {
                self.parse_function(true, true)
            } else {
                let expr = self.parse_assignment();
                self.eat_semicolon();
                expr
            };
            return self
                .arena
                .alloc(NodeKind::ExportDefault { declaration }, tok.pos, tok.end);
        }
        if self.at(SyntaxKind::Asterisk) {
            // `export * as ns from 'id';`
            self.bump();
            self.expect(SyntaxKind::AsKeyword);
            let exported = self.parse_ident();
            let spec = self.arena.synth(NodeKind::ExportSpecifier {
                local: NodeIndex::NONE,
                exported,
                namespace: true,
            });
            self.expect(SyntaxKind::FromKeyword);
            let source_tok = self.expect(SyntaxKind::StringLiteral);
            let source = self.arena.alloc(
                NodeKind::Str {
                    value: source_tok.text,
                },
                source_tok.pos,
                source_tok.end,
            );
            self.eat_semicolon();
            return self.arena.alloc(
                NodeKind::ExportNamed {
                    declaration: NodeIndex::NONE,
                    specifiers: vec![spec],
                    source,
                },
                tok.pos,
                tok.end,
            );
        }
        if self.eat(SyntaxKind::OpenBrace) {
            let mut specifiers = Vec::new();
            while !self.at(SyntaxKind::CloseBrace) && !self.at(SyntaxKind::EndOfFile) {
                let local = self.parse_ident();
                let exported = if self.eat(SyntaxKind::AsKeyword) {
                    self.parse_ident()
                } else {
                    let name = self.arena.ident_name(local).unwrap_or("").to_string();
                    self.arena.make_ident(&name)
                };
                specifiers.push(self.arena.synth(NodeKind::ExportSpecifier {
                    local,
                    exported,
                    namespace: false,
                }));
                if !self.eat(SyntaxKind::Comma) {
                    break;
                }
            }
            self.expect(SyntaxKind::CloseBrace);
            let source = if self.eat(SyntaxKind::FromKeyword) {
                let source_tok = self.expect(SyntaxKind::StringLiteral);
                self.arena.alloc(
                    NodeKind::Str {
                        value: source_tok.text,
                    },
                    source_tok.pos,
                    source_tok.end,
                )
            } else {
                NodeIndex::NONE
            };
            self.eat_semicolon();
            return self.arena.alloc(
                NodeKind::ExportNamed {
                    declaration: NodeIndex::NONE,
                    specifiers,
                    source,
                },
                tok.pos,
                tok.end,
            );
        }
        // `export var x = 1;` / `export function f() {}`
        let declaration = match self.token.kind {
            SyntaxKind::VarKeyword | SyntaxKind::LetKeyword | SyntaxKind::ConstKeyword => {
                let stmt = self.parse_var_statement();
                self.eat_semicolon();
                stmt
            }
            SyntaxKind::FunctionKeyword => self.parse_function(false, false),
            _ => {
                self.error_at_token("Expected declaration after 'export'");
                NodeIndex::NONE
            }
        };
        self.arena.alloc(
            NodeKind::ExportNamed {
                declaration,
                specifiers: Vec::new(),
                source: NodeIndex::NONE,
            },
            tok.pos,
            tok.end,
        )
    }

    // ==================== Expressions ====================

    /// Full expression including the comma operator.
    pub fn parse_expression(&mut self) -> NodeIndex {
        let first = self.parse_assignment();
        if !self.at(SyntaxKind::Comma) {
            return first;
        }
        let mut expressions = vec![first];
        while self.eat(SyntaxKind::Comma) {
            expressions.push(self.parse_assignment());
        }
        let pos = self.arena.get(expressions[0]).map_or(0, |n| n.pos);
        let end = self
            .arena
            .get(*expressions.last().unwrap_or(&NodeIndex::NONE))
            .map_or(pos, |n| n.end);
        self.arena.alloc(NodeKind::Sequence { expressions }, pos, end)
    }

    fn assignment_op(kind: SyntaxKind) -> Option<&'static str> {
        use SyntaxKind::*;
        Some(match kind {
            Equals => "=",
            PlusEquals => "+=",
            MinusEquals => "-=",
            AsteriskEquals => "*=",
            SlashEquals => "/=",
            PercentEquals => "%=",
            AmpersandEquals => "&=",
            BarEquals => "|=",
            CaretEquals => "^=",
            LessLessEquals => "<<=",
            GreaterGreaterEquals => ">>=",
            GreaterGreaterGreaterEquals => ">>>=",
            AmpersandAmpersandEquals => "&&=",
            BarBarEquals => "||=",
            QuestionQuestionEquals => "??=",
            AsteriskAsteriskEquals => "**=",
            _ => return None,
        })
    }

    pub fn parse_assignment(&mut self) -> NodeIndex {
        if let Some(arrow) = self.try_parse_arrow() {
            return arrow;
        }
        let left = self.parse_conditional();
        if let Some(op) = Self::assignment_op(self.token.kind) {
            self.bump();
            let right = self.parse_assignment();
            let pos = self.arena.get(left).map_or(0, |n| n.pos);
            let end = self.arena.get(right).map_or(pos, |n| n.end);
            return self.arena.alloc(NodeKind::Assign { op, left, right }, pos, end);
        }
        left
    }

    /// Speculative arrow-function parse: `x => ...` or `(a, b) => ...`.
    fn try_parse_arrow(&mut self) -> Option<NodeIndex> {
        let is_arrow = match self.token.kind {
            SyntaxKind::Identifier => {
                // Peek one token past the identifier.
                let mut lookahead = self.scanner.clone();
                lookahead.scan().kind == SyntaxKind::Arrow
            }
            SyntaxKind::OpenParen => {
                let mut lookahead = self.scanner.clone();
                let mut depth = 1usize;
                loop {
                    let tok = lookahead.scan();
                    match tok.kind {
                        SyntaxKind::OpenParen => depth += 1,
                        SyntaxKind::CloseParen => {
                            depth -= 1;
                            if depth == 0 {
                                break lookahead.scan().kind == SyntaxKind::Arrow;
                            }
                        }
                        SyntaxKind::EndOfFile => break false,
                        _ => {}
                    }
                }
            }
            _ => false,
        };
        if !is_arrow {
            return None;
        }

        let pos = self.token.pos;
        let params = if self.at(SyntaxKind::Identifier) {
            vec![self.parse_ident()]
        } else {
            self.parse_params()
        };
        self.expect(SyntaxKind::Arrow);
        let body = if self.at(SyntaxKind::OpenBrace) {
            self.parse_block()
        } else {
            self.parse_assignment()
        };
        let end = self.arena.get(body).map_or(pos, |n| n.end);
        Some(self.arena.alloc(
            NodeKind::Function {
                name: NodeIndex::NONE,
                params,
                body,
                is_arrow: true,
                is_expression: true,
            },
            pos,
            end,
        ))
    }

    fn parse_conditional(&mut self) -> NodeIndex {
        let condition = self.parse_binary(1);
        if !self.eat(SyntaxKind::Question) {
            return condition;
        }
        let when_true = self.parse_assignment();
        self.expect(SyntaxKind::Colon);
        let when_false = self.parse_assignment();
        let pos = self.arena.get(condition).map_or(0, |n| n.pos);
        let end = self.arena.get(when_false).map_or(pos, |n| n.end);
        self.arena.alloc(
            NodeKind::Conditional {
                condition,
                when_true,
                when_false,
            },
            pos,
            end,
        )
    }

    fn binary_op(kind: SyntaxKind) -> Option<(&'static str, u8)> {
        use SyntaxKind::*;
        Some(match kind {
            QuestionQuestion => ("??", 1),
            BarBar => ("||", 2),
            AmpersandAmpersand => ("&&", 3),
            Bar => ("|", 4),
            Caret => ("^", 5),
            Ampersand => ("&", 6),
            EqualsEquals => ("==", 7),
            ExclamationEquals => ("!=", 7),
            EqualsEqualsEquals => ("===", 7),
            ExclamationEqualsEquals => ("!==", 7),
            Less => ("<", 8),
            Greater => (">", 8),
            LessEquals => ("<=", 8),
            GreaterEquals => (">=", 8),
            InKeyword => ("in", 8),
            InstanceofKeyword => ("instanceof", 8),
            LessLess => ("<<", 9),
            GreaterGreater => (">>", 9),
            GreaterGreaterGreater => (">>>", 9),
            Plus => ("+", 10),
            Minus => ("-", 10),
            Asterisk => ("*", 11),
            Slash => ("/", 11),
            Percent => ("%", 11),
            AsteriskAsterisk => ("**", 12),
            _ => return None,
        })
    }

    fn parse_binary(&mut self, min_precedence: u8) -> NodeIndex {
        let mut left = self.parse_unary();
        while let Some((op, precedence)) = Self::binary_op(self.token.kind) {
            if precedence < min_precedence {
                break;
            }
            self.bump();
            let right = self.parse_binary(precedence + 1);
            let pos = self.arena.get(left).map_or(0, |n| n.pos);
            let end = self.arena.get(right).map_or(pos, |n| n.end);
            left = self.arena.alloc(NodeKind::Binary { op, left, right }, pos, end);
        }
        left
    }

    fn parse_unary(&mut self) -> NodeIndex {
        use SyntaxKind::*;
        let op = match self.token.kind {
            Exclamation => Some("!"),
            Tilde => Some("~"),
            Plus => Some("+"),
            Minus => Some("-"),
            PlusPlus => Some("++"),
            MinusMinus => Some("--"),
            TypeofKeyword => Some("typeof"),
            VoidKeyword => Some("void"),
            DeleteKeyword => Some("delete"),
            _ => None,
        };
        if let Some(op) = op {
            let tok = self.bump();
            let operand = self.parse_unary();
            let end = self.arena.get(operand).map_or(tok.end, |n| n.end);
            return self.arena.alloc(
                NodeKind::Unary {
                    op,
                    operand,
                    prefix: true,
                },
                tok.pos,
                end,
            );
        }
        let operand = self.parse_call_or_member();
        if matches!(self.token.kind, PlusPlus | MinusMinus) && !self.token.preceded_by_newline {
            let op = if self.token.kind == PlusPlus { "++" } else { "--" };
            let tok = self.bump();
            let pos = self.arena.get(operand).map_or(tok.pos, |n| n.pos);
            return self.arena.alloc(
                NodeKind::Unary {
                    op,
                    operand,
                    prefix: false,
                },
                pos,
                tok.end,
            );
        }
        operand
    }

    fn parse_call_or_member(&mut self) -> NodeIndex {
        let mut expr = if self.at(SyntaxKind::NewKeyword) {
            let tok = self.bump();
            let callee = self.parse_member_only();
            let arguments = if self.at(SyntaxKind::OpenParen) {
                self.parse_arguments()
            } else {
                Vec::new()
            };
            self.arena.alloc(
                NodeKind::Call {
                    callee,
                    arguments,
                    is_new: true,
                },
                tok.pos,
                tok.end,
            )
        } else {
            self.parse_primary()
        };

        loop {
            match self.token.kind {
                SyntaxKind::Dot => {
                    self.bump();
                    let property = self.parse_ident();
                    let pos = self.arena.get(expr).map_or(0, |n| n.pos);
                    let end = self.arena.get(property).map_or(pos, |n| n.end);
                    expr = self.arena.alloc(
                        NodeKind::Member {
                            object: expr,
                            property,
                            computed: false,
                        },
                        pos,
                        end,
                    );
                }
                SyntaxKind::OpenBracket => {
                    self.bump();
                    let property = self.parse_expression();
                    let close = self.expect(SyntaxKind::CloseBracket);
                    let pos = self.arena.get(expr).map_or(0, |n| n.pos);
                    expr = self.arena.alloc(
                        NodeKind::Member {
                            object: expr,
                            property,
                            computed: true,
                        },
                        pos,
                        close.end,
                    );
                }
                SyntaxKind::OpenParen => {
                    let arguments = self.parse_arguments();
                    let pos = self.arena.get(expr).map_or(0, |n| n.pos);
                    expr = self.arena.alloc(
                        NodeKind::Call {
                            callee: expr,
                            arguments,
                            is_new: false,
                        },
                        pos,
                        self.token.pos,
                    );
                }
                _ => break,
            }
        }
        expr
    }

    /// Member chain without call suffixes, for `new X.Y(...)` callees.
    fn parse_member_only(&mut self) -> NodeIndex {
        let mut expr = self.parse_primary();
        while self.at(SyntaxKind::Dot) {
            self.bump();
            let property = self.parse_ident();
            let pos = self.arena.get(expr).map_or(0, |n| n.pos);
            let end = self.arena.get(property).map_or(pos, |n| n.end);
            expr = self.arena.alloc(
                NodeKind::Member {
                    object: expr,
                    property,
                    computed: false,
                },
                pos,
                end,
            );
        }
        expr
    }

    fn parse_arguments(&mut self) -> Vec<NodeIndex> {
        self.expect(SyntaxKind::OpenParen);
        let mut arguments = Vec::new();
        while !self.at(SyntaxKind::CloseParen) && !self.at(SyntaxKind::EndOfFile) {
            arguments.push(self.parse_assignment());
            if !self.eat(SyntaxKind::Comma) {
                break;
            }
        }
        self.expect(SyntaxKind::CloseParen);
        arguments
    }

    fn parse_primary(&mut self) -> NodeIndex {
        use SyntaxKind::*;
        match self.token.kind {
            NumericLiteral => {
                let tok = self.bump();
                self.arena
                    .alloc(NodeKind::Number { text: tok.text }, tok.pos, tok.end)
            }
            StringLiteral => {
                let tok = self.bump();
                self.arena
                    .alloc(NodeKind::Str { value: tok.text }, tok.pos, tok.end)
            }
            TrueKeyword | FalseKeyword => {
                let tok = self.bump();
                self.arena.alloc(
                    NodeKind::Bool {
                        value: tok.kind == TrueKeyword,
                    },
                    tok.pos,
                    tok.end,
                )
            }
            NullKeyword => {
                let tok = self.bump();
                self.arena.alloc(NodeKind::Null, tok.pos, tok.end)
            }
            ThisKeyword => {
                let tok = self.bump();
                self.arena.alloc(NodeKind::This, tok.pos, tok.end)
            }
            FunctionKeyword => self.parse_function(true, true),
            OpenParen => {
                let tok = self.bump();
                let expression = self.parse_expression();
                let close = self.expect(CloseParen);
                self.arena
                    .alloc(NodeKind::Paren { expression }, tok.pos, close.end)
            }
            OpenBracket => {
                let tok = self.bump();
                let mut elements = Vec::new();
                while !self.at(CloseBracket) && !self.at(EndOfFile) {
                    elements.push(self.parse_assignment());
                    if !self.eat(Comma) {
                        break;
                    }
                }
                let close = self.expect(CloseBracket);
                self.arena
                    .alloc(NodeKind::Array { elements }, tok.pos, close.end)
            }
            OpenBrace => self.parse_object_literal(),
            _ if self.at_ident_like() => self.parse_ident(),
            _ => {
                self.error_at_token(format!(
                    "Expected expression, found '{}'",
                    self.token.text
                ));
                let pos = self.token.pos;
                self.arena.alloc(
                    NodeKind::Ident {
                        name: String::from("__missing"),
                    },
                    pos,
                    pos,
                )
            }
        }
    }

    fn parse_object_literal(&mut self) -> NodeIndex {
        use SyntaxKind::*;
        let open = self.expect(OpenBrace);
        let mut properties = Vec::new();
        while !self.at(CloseBrace) && !self.at(EndOfFile) {
            let computed = self.at(OpenBracket);
            let key = if computed {
                self.bump();
                let key = self.parse_assignment();
                self.expect(CloseBracket);
                key
            } else {
                match self.token.kind {
                    NumericLiteral => {
                        let tok = self.bump();
                        self.arena
                            .alloc(NodeKind::Number { text: tok.text }, tok.pos, tok.end)
                    }
                    StringLiteral => {
                        let tok = self.bump();
                        self.arena
                            .alloc(NodeKind::Str { value: tok.text }, tok.pos, tok.end)
                    }
                    _ => self.parse_ident(),
                }
            };
            let (value, shorthand) = if self.eat(Colon) {
                (self.parse_assignment(), false)
            } else if self.at(OpenParen) {
                // Method shorthand: `{ foo() { ... } }`
                let params = self.parse_params();
                let body = self.parse_block();
                let func = self.arena.synth(NodeKind::Function {
                    name: NodeIndex::NONE,
                    params,
                    body,
                    is_arrow: false,
                    is_expression: true,
                });
                (func, false)
            } else {
                // Shorthand `{ foo }` — value shares the key name.
                let name = self.arena.ident_name(key).unwrap_or("").to_string();
                (self.arena.make_ident(&name), true)
            };
            let pos = self.arena.get(key).map_or(open.pos, |n| n.pos);
            let end = self.arena.get(value).map_or(pos, |n| n.end);
            properties.push(self.arena.alloc(
                NodeKind::Property {
                    key,
                    value,
                    computed,
                    shorthand,
                },
                pos,
                end,
            ));
            if !self.eat(Comma) {
                break;
            }
        }
        let close = self.expect(CloseBrace);
        self.arena
            .alloc(NodeKind::Object { properties }, open.pos, close.end)
    }
}

/// Parse a full program, merging scanner diagnostics into the parser's.
pub fn parse(file_name: &str, source: &str) -> (NodeArena, NodeIndex, Vec<Diagnostic>) {
    let mut parser = ParserState::new(file_name, source);
    let root = parser.parse_program();
    let mut diagnostics = std::mem::take(&mut parser.scanner.diagnostics);
    diagnostics.append(&mut parser.diagnostics);
    (parser.arena, root, diagnostics)
}
