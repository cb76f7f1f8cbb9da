//! Renders a (possibly mutated) arena AST back to JavaScript source text.
//!
//! Output is deterministic: two-space indentation, semicolons everywhere,
//! double-quoted strings. Explicit `Paren` nodes from the source are kept;
//! additional parentheses are inserted only where precedence requires them.

use unweave_common::limits::CODE_PREVIEW_MAX;
use unweave_parser::{ImportKind, NodeArena, NodeIndex, NodeKind, VarKind};

// Expression precedence levels, loosest to tightest.
const PREC_SEQUENCE: u8 = 1;
const PREC_ASSIGN: u8 = 2;
const PREC_CONDITIONAL: u8 = 3;
const PREC_UNARY: u8 = 16;
const PREC_POSTFIX: u8 = 17;
const PREC_CALL: u8 = 18;
const PREC_PRIMARY: u8 = 20;

fn binary_precedence(op: &str) -> u8 {
    match op {
        "??" => 4,
        "||" => 5,
        "&&" => 6,
        "|" => 7,
        "^" => 8,
        "&" => 9,
        "==" | "!=" | "===" | "!==" => 10,
        "<" | ">" | "<=" | ">=" | "in" | "instanceof" => 11,
        "<<" | ">>" | ">>>" => 12,
        "+" | "-" => 13,
        "*" | "/" | "%" => 14,
        "**" => 15,
        _ => 10,
    }
}

pub struct Emitter<'a> {
    arena: &'a NodeArena,
    out: String,
    indent: usize,
}

impl<'a> Emitter<'a> {
    pub fn new(arena: &'a NodeArena) -> Emitter<'a> {
        Emitter {
            arena,
            out: String::new(),
            indent: 0,
        }
    }

    /// Render a whole program.
    pub fn emit_program(mut self, root: NodeIndex) -> String {
        if let Some(NodeKind::Program { statements }) = self.arena.kind(root) {
            for &stmt in statements.clone().iter() {
                self.emit_statement(stmt);
            }
        }
        self.out
    }

    /// Render a single expression subtree.
    pub fn emit_expression_to_string(mut self, idx: NodeIndex) -> String {
        self.emit_expression(idx, 0);
        self.out
    }

    fn write(&mut self, text: &str) {
        self.out.push_str(text);
    }

    fn write_indent(&mut self) {
        for _ in 0..self.indent {
            self.out.push_str("  ");
        }
    }

    fn precedence(&self, idx: NodeIndex) -> u8 {
        match self.arena.kind(idx) {
            Some(NodeKind::Sequence { .. }) => PREC_SEQUENCE,
            Some(NodeKind::Assign { .. }) => PREC_ASSIGN,
            Some(NodeKind::Conditional { .. }) => PREC_CONDITIONAL,
            Some(NodeKind::Function { is_arrow: true, .. }) => PREC_ASSIGN,
            Some(NodeKind::Binary { op, .. }) => binary_precedence(op),
            Some(NodeKind::Unary { prefix: true, .. }) => PREC_UNARY,
            Some(NodeKind::Unary { prefix: false, .. }) => PREC_POSTFIX,
            Some(NodeKind::Call { .. }) | Some(NodeKind::Member { .. }) => PREC_CALL,
            _ => PREC_PRIMARY,
        }
    }

    /// Leftmost token of this expression opens with `function` or `{`,
    /// which would be misparsed at the start of an expression statement.
    fn needs_statement_parens(&self, idx: NodeIndex) -> bool {
        match self.arena.kind(idx) {
            Some(NodeKind::Function {
                is_arrow: false, ..
            }) => true,
            Some(NodeKind::Object { .. }) => true,
            Some(NodeKind::Member { object, .. }) => self.needs_statement_parens(*object),
            Some(NodeKind::Call {
                callee,
                is_new: false,
                ..
            }) => self.needs_statement_parens(*callee),
            Some(NodeKind::Assign { left, .. }) | Some(NodeKind::Binary { left, .. }) => {
                self.needs_statement_parens(*left)
            }
            Some(NodeKind::Conditional { condition, .. }) => {
                self.needs_statement_parens(*condition)
            }
            Some(NodeKind::Sequence { expressions }) => expressions
                .first()
                .is_some_and(|&e| self.needs_statement_parens(e)),
            Some(NodeKind::Unary { prefix: false, operand, .. }) => {
                self.needs_statement_parens(*operand)
            }
            _ => false,
        }
    }

    fn emit_string_literal(&mut self, value: &str) {
        self.out.push('"');
        for ch in value.chars() {
            match ch {
                '"' => self.out.push_str("\\\""),
                '\\' => self.out.push_str("\\\\"),
                '\n' => self.out.push_str("\\n"),
                '\t' => self.out.push_str("\\t"),
                '\r' => self.out.push_str("\\r"),
                '\0' => self.out.push_str("\\0"),
                _ => self.out.push(ch),
            }
        }
        self.out.push('"');
    }

    fn emit_expression(&mut self, idx: NodeIndex, min_precedence: u8) {
        let Some(kind) = self.arena.kind(idx).cloned() else {
            return;
        };
        let precedence = self.precedence(idx);
        let parens = precedence < min_precedence;
        if parens {
            self.write("(");
        }
        match kind {
            NodeKind::Ident { name } => self.write(&name),
            NodeKind::Number { text } => self.write(&text),
            NodeKind::Str { value } => self.emit_string_literal(&value),
            NodeKind::Bool { value } => self.write(if value { "true" } else { "false" }),
            NodeKind::Null => self.write("null"),
            NodeKind::This => self.write("this"),
            NodeKind::Paren { expression } => {
                self.write("(");
                self.emit_expression(expression, 0);
                self.write(")");
            }
            NodeKind::Sequence { expressions } => {
                for (i, &expr) in expressions.iter().enumerate() {
                    if i > 0 {
                        self.write(", ");
                    }
                    self.emit_expression(expr, PREC_ASSIGN);
                }
            }
            NodeKind::Assign { op, left, right } => {
                self.emit_expression(left, PREC_CALL);
                self.write(" ");
                self.write(op);
                self.write(" ");
                self.emit_expression(right, PREC_ASSIGN);
            }
            NodeKind::Conditional {
                condition,
                when_true,
                when_false,
            } => {
                self.emit_expression(condition, PREC_CONDITIONAL + 1);
                self.write(" ? ");
                self.emit_expression(when_true, PREC_ASSIGN);
                self.write(" : ");
                self.emit_expression(when_false, PREC_ASSIGN);
            }
            NodeKind::Binary { op, left, right } => {
                let precedence = binary_precedence(op);
                self.emit_expression(left, precedence);
                self.write(" ");
                self.write(op);
                self.write(" ");
                self.emit_expression(right, precedence + 1);
            }
            NodeKind::Unary {
                op,
                operand,
                prefix,
            } => {
                if prefix {
                    self.write(op);
                    if op.chars().next().is_some_and(|c| c.is_ascii_alphabetic()) {
                        self.write(" ");
                    } else if self.same_leading_sign(operand, op) {
                        self.write(" ");
                    }
                    self.emit_expression(operand, PREC_UNARY);
                } else {
                    self.emit_expression(operand, PREC_POSTFIX);
                    self.write(op);
                }
            }
            NodeKind::Member {
                object,
                property,
                computed,
            } => {
                let object_needs_parens =
                    matches!(self.arena.kind(object), Some(NodeKind::Number { .. }));
                if object_needs_parens {
                    self.write("(");
                    self.emit_expression(object, 0);
                    self.write(")");
                } else {
                    self.emit_expression(object, PREC_CALL);
                }
                if computed {
                    self.write("[");
                    self.emit_expression(property, 0);
                    self.write("]");
                } else {
                    self.write(".");
                    self.emit_expression(property, PREC_PRIMARY);
                }
            }
            NodeKind::Call {
                callee,
                arguments,
                is_new,
            } => {
                if is_new {
                    self.write("new ");
                }
                let callee_needs_parens = !is_new
                    && matches!(
                        self.arena.kind(callee),
                        Some(NodeKind::Function { .. })
                    );
                if callee_needs_parens {
                    self.write("(");
                    self.emit_expression(callee, 0);
                    self.write(")");
                } else {
                    self.emit_expression(callee, PREC_CALL);
                }
                self.write("(");
                for (i, &arg) in arguments.iter().enumerate() {
                    if i > 0 {
                        self.write(", ");
                    }
                    self.emit_expression(arg, PREC_ASSIGN);
                }
                self.write(")");
            }
            NodeKind::Array { elements } => {
                self.write("[");
                for (i, &element) in elements.iter().enumerate() {
                    if i > 0 {
                        self.write(", ");
                    }
                    self.emit_expression(element, PREC_ASSIGN);
                }
                self.write("]");
            }
            NodeKind::Object { properties } => {
                if properties.is_empty() {
                    self.write("{}");
                } else {
                    self.write("{ ");
                    for (i, &property) in properties.iter().enumerate() {
                        if i > 0 {
                            self.write(", ");
                        }
                        self.emit_expression(property, 0);
                    }
                    self.write(" }");
                }
            }
            NodeKind::Property {
                key,
                value,
                computed,
                shorthand,
            } => {
                if computed {
                    self.write("[");
                    self.emit_expression(key, PREC_ASSIGN);
                    self.write("]");
                } else {
                    self.emit_expression(key, PREC_PRIMARY);
                }
                if shorthand {
                    // Key and value share a name; nothing more to print.
                } else {
                    self.write(": ");
                    self.emit_expression(value, PREC_ASSIGN);
                }
            }
            NodeKind::Function {
                name,
                params,
                body,
                is_arrow,
                ..
            } => {
                if is_arrow {
                    self.write("(");
                    self.emit_params(&params);
                    self.write(") => ");
                    if matches!(self.arena.kind(body), Some(NodeKind::Block { .. })) {
                        self.emit_block_inline(body);
                    } else {
                        self.emit_expression(body, PREC_ASSIGN);
                    }
                } else {
                    self.write("function ");
                    if name.is_some() {
                        self.emit_expression(name, PREC_PRIMARY);
                    }
                    self.write("(");
                    self.emit_params(&params);
                    self.write(") ");
                    self.emit_block_inline(body);
                }
            }
            _ => {
                // Statement node in expression position: nothing to print.
            }
        }
        if parens {
            self.write(")");
        }
    }

    /// `-(-x)` and `+(+x)` must not collapse into `--x` / `++x`.
    fn same_leading_sign(&self, operand: NodeIndex, op: &str) -> bool {
        if op != "-" && op != "+" && op != "--" && op != "++" {
            return false;
        }
        match self.arena.kind(operand) {
            Some(NodeKind::Unary {
                op: inner,
                prefix: true,
                ..
            }) => inner.starts_with(op.chars().next().unwrap_or(' ')),
            _ => false,
        }
    }

    fn emit_params(&mut self, params: &[NodeIndex]) {
        for (i, &param) in params.iter().enumerate() {
            if i > 0 {
                self.write(", ");
            }
            self.emit_expression(param, PREC_PRIMARY);
        }
    }

    fn emit_block_inline(&mut self, body: NodeIndex) {
        let Some(NodeKind::Block { statements }) = self.arena.kind(body).cloned() else {
            self.write("{}");
            return;
        };
        if statements.is_empty() {
            self.write("{}");
            return;
        }
        self.write("{\n");
        self.indent += 1;
        for stmt in statements {
            self.emit_statement(stmt);
        }
        self.indent -= 1;
        self.write_indent();
        self.write("}");
    }

    fn emit_var_statement(&mut self, kind: VarKind, declarations: &[NodeIndex]) {
        self.write(kind.keyword());
        self.write(" ");
        for (i, &declarator) in declarations.iter().enumerate() {
            if i > 0 {
                self.write(", ");
            }
            if let Some(NodeKind::VarDeclarator { name, init }) =
                self.arena.kind(declarator).cloned()
            {
                self.emit_expression(name, PREC_PRIMARY);
                if init.is_some() {
                    self.write(" = ");
                    self.emit_expression(init, PREC_ASSIGN);
                }
            }
        }
    }

    fn emit_statement(&mut self, idx: NodeIndex) {
        let Some(kind) = self.arena.kind(idx).cloned() else {
            return;
        };
        self.write_indent();
        match kind {
            NodeKind::ExprStatement { expression } => {
                if self.needs_statement_parens(expression) {
                    self.write("(");
                    self.emit_expression(expression, 0);
                    self.write(")");
                } else {
                    self.emit_expression(expression, 0);
                }
                self.write(";\n");
            }
            NodeKind::VarStatement { kind, declarations } => {
                self.emit_var_statement(kind, &declarations);
                self.write(";\n");
            }
            NodeKind::Function { .. } => {
                self.emit_expression(idx, 0);
                self.write("\n");
            }
            NodeKind::Return { argument } => {
                if argument.is_some() {
                    self.write("return ");
                    self.emit_expression(argument, 0);
                } else {
                    self.write("return");
                }
                self.write(";\n");
            }
            NodeKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.write("if (");
                self.emit_expression(condition, 0);
                self.write(") ");
                self.emit_nested_statement(then_branch);
                if else_branch.is_some() {
                    self.write_indent();
                    self.write("else ");
                    self.emit_nested_statement(else_branch);
                }
            }
            NodeKind::While { condition, body } => {
                self.write("while (");
                self.emit_expression(condition, 0);
                self.write(") ");
                self.emit_nested_statement(body);
            }
            NodeKind::For {
                init,
                test,
                update,
                body,
            } => {
                self.write("for (");
                match self.arena.kind(init).cloned() {
                    Some(NodeKind::VarStatement { kind, declarations }) => {
                        self.emit_var_statement(kind, &declarations);
                    }
                    Some(NodeKind::ExprStatement { expression }) => {
                        self.emit_expression(expression, 0);
                    }
                    _ => {}
                }
                self.write("; ");
                if test.is_some() {
                    self.emit_expression(test, 0);
                }
                self.write("; ");
                if update.is_some() {
                    self.emit_expression(update, 0);
                }
                self.write(") ");
                self.emit_nested_statement(body);
            }
            NodeKind::Block { .. } => {
                self.emit_block_inline(idx);
                self.write("\n");
            }
            NodeKind::Break => self.write("break;\n"),
            NodeKind::Continue => self.write("continue;\n"),
            NodeKind::Empty => self.write(";\n"),
            NodeKind::CommentStmt { text } => {
                self.write("/* ");
                self.write(&text);
                self.write(" */\n");
            }
            NodeKind::ImportDecl { specifiers, source } => {
                self.emit_import(&specifiers, source);
            }
            NodeKind::ExportNamed {
                declaration,
                specifiers,
                source,
            } => {
                self.emit_export_named(declaration, &specifiers, source);
            }
            NodeKind::ExportDefault { declaration } => {
                self.write("export default ");
                self.emit_expression(declaration, 0);
                if matches!(
                    self.arena.kind(declaration),
                    Some(NodeKind::Function { is_arrow: false, .. })
                ) {
                    self.write("\n");
                } else {
                    self.write(";\n");
                }
            }
            _ => {
                // Expression node in statement position.
                self.emit_expression(idx, 0);
                self.write(";\n");
            }
        }
    }

    fn emit_nested_statement(&mut self, idx: NodeIndex) {
        if matches!(self.arena.kind(idx), Some(NodeKind::Block { .. })) {
            self.emit_block_inline(idx);
            self.write("\n");
        } else {
            self.write("\n");
            self.indent += 1;
            self.emit_statement(idx);
            self.indent -= 1;
        }
    }

    fn emit_import(&mut self, specifiers: &[NodeIndex], source: NodeIndex) {
        self.write("import ");
        if specifiers.is_empty() {
            if let Some(NodeKind::Str { value }) = self.arena.kind(source).cloned() {
                self.emit_string_literal(&value);
            }
            self.write(";\n");
            return;
        }
        let mut first = true;
        let mut named_open = false;
        for &spec in specifiers {
            let Some(NodeKind::ImportSpecifier {
                kind,
                imported,
                local,
            }) = self.arena.kind(spec).cloned()
            else {
                continue;
            };
            match kind {
                ImportKind::Default => {
                    if !first {
                        self.write(", ");
                    }
                    self.emit_expression(local, PREC_PRIMARY);
                }
                ImportKind::Namespace => {
                    if !first {
                        self.write(", ");
                    }
                    self.write("* as ");
                    self.emit_expression(local, PREC_PRIMARY);
                }
                ImportKind::Named => {
                    if !named_open {
                        if !first {
                            self.write(", ");
                        }
                        self.write("{ ");
                        named_open = true;
                    } else {
                        self.write(", ");
                    }
                    let imported_name = self.arena.ident_name(imported).unwrap_or_default().to_string();
                    let local_name = self.arena.ident_name(local).unwrap_or_default().to_string();
                    if imported_name == local_name {
                        self.write(&local_name);
                    } else {
                        self.write(&imported_name);
                        self.write(" as ");
                        self.write(&local_name);
                    }
                }
            }
            first = false;
        }
        if named_open {
            self.write(" }");
        }
        self.write(" from ");
        if let Some(NodeKind::Str { value }) = self.arena.kind(source).cloned() {
            self.emit_string_literal(&value);
        }
        self.write(";\n");
    }

    fn emit_export_named(
        &mut self,
        declaration: NodeIndex,
        specifiers: &[NodeIndex],
        source: NodeIndex,
    ) {
        self.write("export ");
        if declaration.is_some() {
            match self.arena.kind(declaration).cloned() {
                Some(NodeKind::VarStatement { kind, declarations }) => {
                    self.emit_var_statement(kind, &declarations);
                    self.write(";\n");
                }
                Some(NodeKind::Function { .. }) => {
                    self.emit_expression(declaration, 0);
                    self.write("\n");
                }
                _ => {
                    self.emit_expression(declaration, 0);
                    self.write(";\n");
                }
            }
            return;
        }
        // Specifier form: `export * as ns from 'id';` gets its own
        // declaration, named specifiers share one brace group.
        let namespace = specifiers.iter().find_map(|&spec| {
            match self.arena.kind(spec) {
                Some(NodeKind::ExportSpecifier {
                    exported,
                    namespace: true,
                    ..
                }) => Some(*exported),
                _ => None,
            }
        });
        if let Some(exported) = namespace {
            self.write("* as ");
            self.emit_expression(exported, PREC_PRIMARY);
        } else {
            self.write("{ ");
            let mut first = true;
            for &spec in specifiers {
                let Some(NodeKind::ExportSpecifier {
                    local, exported, ..
                }) = self.arena.kind(spec).cloned()
                else {
                    continue;
                };
                if !first {
                    self.write(", ");
                }
                let local_name = self.arena.ident_name(local).unwrap_or_default().to_string();
                let exported_name = self.arena.ident_name(exported).unwrap_or_default().to_string();
                if local_name == exported_name {
                    self.write(&local_name);
                } else {
                    self.write(&local_name);
                    self.write(" as ");
                    self.write(&exported_name);
                }
                first = false;
            }
            self.write(" }");
        }
        if source.is_some() {
            self.write(" from ");
            if let Some(NodeKind::Str { value }) = self.arena.kind(source).cloned() {
                self.emit_string_literal(&value);
            }
        }
        self.write(";\n");
    }
}

/// Render a finished program.
pub fn emit(arena: &NodeArena, root: NodeIndex) -> String {
    Emitter::new(arena).emit_program(root)
}

/// Render one expression subtree.
pub fn emit_expression(arena: &NodeArena, idx: NodeIndex) -> String {
    Emitter::new(arena).emit_expression_to_string(idx)
}

/// Compact single-line preview for diagnostics, truncated past
/// `CODE_PREVIEW_MAX` characters.
pub fn code_preview(arena: &NodeArena, idx: NodeIndex) -> String {
    let rendered = emit_expression(arena, idx);
    let compact: String = rendered.split_whitespace().collect::<Vec<_>>().join(" ");
    if compact.len() > CODE_PREVIEW_MAX {
        let head: String = compact.chars().take(70).collect();
        let tail: String = compact
            .chars()
            .rev()
            .take(30)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("{head} … {tail}")
    } else {
        compact
    }
}
