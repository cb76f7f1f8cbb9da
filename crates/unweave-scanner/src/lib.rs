//! JavaScript token scanner.
//!
//! Scans the JavaScript subset that bundle scaffolding and module bodies
//! use: identifiers, numeric/string literals, punctuation, and the
//! statement/expression keywords. Template literals and regex literals are
//! out of scope; they surface as `Unknown` tokens and become parse
//! diagnostics upstream.

use unweave_common::Diagnostic;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SyntaxKind {
    EndOfFile,
    Unknown,

    Identifier,
    NumericLiteral,
    StringLiteral,

    // Punctuation
    OpenParen,
    CloseParen,
    OpenBrace,
    CloseBrace,
    OpenBracket,
    CloseBracket,
    Semicolon,
    Comma,
    Dot,
    Colon,
    Question,
    Arrow,

    // Operators
    Equals,
    PlusEquals,
    MinusEquals,
    AsteriskEquals,
    SlashEquals,
    PercentEquals,
    AmpersandEquals,
    BarEquals,
    CaretEquals,
    LessLessEquals,
    GreaterGreaterEquals,
    GreaterGreaterGreaterEquals,
    AmpersandAmpersandEquals,
    BarBarEquals,
    QuestionQuestionEquals,
    AsteriskAsteriskEquals,

    Plus,
    Minus,
    Asterisk,
    AsteriskAsterisk,
    Slash,
    Percent,
    PlusPlus,
    MinusMinus,
    Ampersand,
    Bar,
    Caret,
    Tilde,
    Exclamation,
    LessLess,
    GreaterGreater,
    GreaterGreaterGreater,
    Less,
    Greater,
    LessEquals,
    GreaterEquals,
    EqualsEquals,
    ExclamationEquals,
    EqualsEqualsEquals,
    ExclamationEqualsEquals,
    AmpersandAmpersand,
    BarBar,
    QuestionQuestion,

    // Keywords
    VarKeyword,
    LetKeyword,
    ConstKeyword,
    FunctionKeyword,
    ReturnKeyword,
    IfKeyword,
    ElseKeyword,
    WhileKeyword,
    ForKeyword,
    BreakKeyword,
    ContinueKeyword,
    NewKeyword,
    TypeofKeyword,
    VoidKeyword,
    DeleteKeyword,
    InKeyword,
    InstanceofKeyword,
    ThisKeyword,
    TrueKeyword,
    FalseKeyword,
    NullKeyword,
    ImportKeyword,
    ExportKeyword,
    DefaultKeyword,
    FromKeyword,
    AsKeyword,
}

fn keyword_kind(text: &str) -> Option<SyntaxKind> {
    use SyntaxKind::*;
    Some(match text {
        "var" => VarKeyword,
        "let" => LetKeyword,
        "const" => ConstKeyword,
        "function" => FunctionKeyword,
        "return" => ReturnKeyword,
        "if" => IfKeyword,
        "else" => ElseKeyword,
        "while" => WhileKeyword,
        "for" => ForKeyword,
        "break" => BreakKeyword,
        "continue" => ContinueKeyword,
        "new" => NewKeyword,
        "typeof" => TypeofKeyword,
        "void" => VoidKeyword,
        "delete" => DeleteKeyword,
        "in" => InKeyword,
        "instanceof" => InstanceofKeyword,
        "this" => ThisKeyword,
        "true" => TrueKeyword,
        "false" => FalseKeyword,
        "null" => NullKeyword,
        "import" => ImportKeyword,
        "export" => ExportKeyword,
        "default" => DefaultKeyword,
        "from" => FromKeyword,
        "as" => AsKeyword,
        _ => return None,
    })
}

/// One scanned token. `text` carries the identifier name, the raw numeric
/// text, or the decoded string value.
#[derive(Clone, Debug)]
pub struct Token {
    pub kind: SyntaxKind,
    pub text: String,
    pub pos: u32,
    pub end: u32,
    /// A line terminator precedes this token (used for semicolon insertion).
    pub preceded_by_newline: bool,
}

impl Token {
    fn eof(pos: u32) -> Token {
        Token {
            kind: SyntaxKind::EndOfFile,
            text: String::new(),
            pos,
            end: pos,
            preceded_by_newline: false,
        }
    }
}

/// Hand-written scanner over the source bytes. Cloneable so the parser can
/// look ahead speculatively (arrow-function detection).
#[derive(Clone)]
pub struct Scanner<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
    pub diagnostics: Vec<Diagnostic>,
    file_name: String,
}

impl<'a> Scanner<'a> {
    pub fn new(file_name: &str, source: &'a str) -> Scanner<'a> {
        Scanner {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            diagnostics: Vec::new(),
            file_name: file_name.to_string(),
        }
    }

    fn peek_byte(&self, offset: usize) -> u8 {
        *self.bytes.get(self.pos + offset).unwrap_or(&0)
    }

    /// Skip whitespace and comments, reporting whether a newline was crossed.
    fn skip_trivia(&mut self) -> bool {
        let mut newline = false;
        loop {
            match self.peek_byte(0) {
                b' ' | b'\t' | b'\r' => self.pos += 1,
                b'\n' => {
                    newline = true;
                    self.pos += 1;
                }
                b'/' if self.peek_byte(1) == b'/' => {
                    while self.pos < self.bytes.len() && self.peek_byte(0) != b'\n' {
                        self.pos += 1;
                    }
                }
                b'/' if self.peek_byte(1) == b'*' => {
                    self.pos += 2;
                    while self.pos < self.bytes.len() {
                        if self.peek_byte(0) == b'*' && self.peek_byte(1) == b'/' {
                            self.pos += 2;
                            break;
                        }
                        if self.peek_byte(0) == b'\n' {
                            newline = true;
                        }
                        self.pos += 1;
                    }
                }
                _ => return newline,
            }
        }
    }

    fn is_ident_start(b: u8) -> bool {
        b.is_ascii_alphabetic() || b == b'_' || b == b'$' || b >= 0x80
    }

    fn is_ident_part(b: u8) -> bool {
        Self::is_ident_start(b) || b.is_ascii_digit()
    }

    fn scan_string(&mut self, quote: u8, start: usize, newline: bool) -> Token {
        self.pos += 1;
        let mut value = String::new();
        while self.pos < self.bytes.len() && self.peek_byte(0) != quote {
            let b = self.peek_byte(0);
            if b == b'\\' {
                self.pos += 1;
                let esc = self.peek_byte(0);
                match esc {
                    b'n' => value.push('\n'),
                    b't' => value.push('\t'),
                    b'r' => value.push('\r'),
                    b'0' => value.push('\0'),
                    _ => value.push(esc as char),
                }
                self.pos += 1;
            } else {
                let ch_start = self.pos;
                let mut len = 1;
                while ch_start + len <= self.bytes.len()
                    && !self.source.is_char_boundary(ch_start + len)
                {
                    len += 1;
                }
                value.push_str(&self.source[ch_start..ch_start + len]);
                self.pos += len;
            }
        }
        if self.pos >= self.bytes.len() {
            self.diagnostics.push(Diagnostic::error(
                &self.file_name,
                start as u32,
                (self.pos - start) as u32,
                "Unterminated string literal",
            ));
        } else {
            self.pos += 1;
        }
        Token {
            kind: SyntaxKind::StringLiteral,
            text: value,
            pos: start as u32,
            end: self.pos as u32,
            preceded_by_newline: newline,
        }
    }

    fn scan_number(&mut self, start: usize, newline: bool) -> Token {
        if self.peek_byte(0) == b'0' && matches!(self.peek_byte(1), b'x' | b'X') {
            self.pos += 2;
            while self.peek_byte(0).is_ascii_hexdigit() {
                self.pos += 1;
            }
        } else {
            while self.peek_byte(0).is_ascii_digit() {
                self.pos += 1;
            }
            if self.peek_byte(0) == b'.' && self.peek_byte(1).is_ascii_digit() {
                self.pos += 1;
                while self.peek_byte(0).is_ascii_digit() {
                    self.pos += 1;
                }
            }
            if matches!(self.peek_byte(0), b'e' | b'E') {
                let mut ahead = 1;
                if matches!(self.peek_byte(1), b'+' | b'-') {
                    ahead = 2;
                }
                if self.peek_byte(ahead).is_ascii_digit() {
                    self.pos += ahead;
                    while self.peek_byte(0).is_ascii_digit() {
                        self.pos += 1;
                    }
                }
            }
        }
        Token {
            kind: SyntaxKind::NumericLiteral,
            text: self.source[start..self.pos].to_string(),
            pos: start as u32,
            end: self.pos as u32,
            preceded_by_newline: newline,
        }
    }

    /// Scan the next token.
    pub fn scan(&mut self) -> Token {
        use SyntaxKind::*;
        let newline = self.skip_trivia();
        let start = self.pos;
        if self.pos >= self.bytes.len() {
            let mut tok = Token::eof(start as u32);
            tok.preceded_by_newline = newline;
            return tok;
        }
        let b = self.peek_byte(0);

        if Self::is_ident_start(b) {
            while self.pos < self.bytes.len() && Self::is_ident_part(self.peek_byte(0)) {
                self.pos += 1;
            }
            let text = &self.source[start..self.pos];
            let kind = keyword_kind(text).unwrap_or(Identifier);
            return Token {
                kind,
                text: text.to_string(),
                pos: start as u32,
                end: self.pos as u32,
                preceded_by_newline: newline,
            };
        }
        if b.is_ascii_digit() {
            return self.scan_number(start, newline);
        }
        if b == b'"' || b == b'\'' {
            return self.scan_string(b, start, newline);
        }

        // Longest-match punctuation.
        let table: &[(&str, SyntaxKind)] = &[
            (">>>=", GreaterGreaterGreaterEquals),
            ("===", EqualsEqualsEquals),
            ("!==", ExclamationEqualsEquals),
            ("**=", AsteriskAsteriskEquals),
            ("**", AsteriskAsterisk),
            ("<<=", LessLessEquals),
            (">>=", GreaterGreaterEquals),
            (">>>", GreaterGreaterGreater),
            ("&&=", AmpersandAmpersandEquals),
            ("||=", BarBarEquals),
            ("??=", QuestionQuestionEquals),
            ("=>", Arrow),
            ("==", EqualsEquals),
            ("!=", ExclamationEquals),
            ("<=", LessEquals),
            (">=", GreaterEquals),
            ("&&", AmpersandAmpersand),
            ("||", BarBar),
            ("??", QuestionQuestion),
            ("++", PlusPlus),
            ("--", MinusMinus),
            ("+=", PlusEquals),
            ("-=", MinusEquals),
            ("*=", AsteriskEquals),
            ("/=", SlashEquals),
            ("%=", PercentEquals),
            ("&=", AmpersandEquals),
            ("|=", BarEquals),
            ("^=", CaretEquals),
            ("<<", LessLess),
            (">>", GreaterGreater),
            ("(", OpenParen),
            (")", CloseParen),
            ("{", OpenBrace),
            ("}", CloseBrace),
            ("[", OpenBracket),
            ("]", CloseBracket),
            (";", Semicolon),
            (",", Comma),
            (".", Dot),
            (":", Colon),
            ("?", Question),
            ("=", Equals),
            ("+", Plus),
            ("-", Minus),
            ("*", Asterisk),
            ("/", Slash),
            ("%", Percent),
            ("&", Ampersand),
            ("|", Bar),
            ("^", Caret),
            ("~", Tilde),
            ("!", Exclamation),
            ("<", Less),
            (">", Greater),
        ];
        for (text, kind) in table {
            if self.source[start..].starts_with(text) {
                self.pos += text.len();
                return Token {
                    kind: *kind,
                    text: (*text).to_string(),
                    pos: start as u32,
                    end: self.pos as u32,
                    preceded_by_newline: newline,
                };
            }
        }

        self.pos += 1;
        self.diagnostics.push(Diagnostic::error(
            &self.file_name,
            start as u32,
            1,
            format!("Unexpected character '{}'", b as char),
        ));
        Token {
            kind: Unknown,
            text: (b as char).to_string(),
            pos: start as u32,
            end: self.pos as u32,
            preceded_by_newline: newline,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<SyntaxKind> {
        let mut scanner = Scanner::new("test.js", source);
        let mut out = Vec::new();
        loop {
            let tok = scanner.scan();
            if tok.kind == SyntaxKind::EndOfFile {
                break;
            }
            out.push(tok.kind);
        }
        out
    }

    #[test]
    fn test_scan_var_statement() {
        use SyntaxKind::*;
        assert_eq!(
            kinds("var a = 1;"),
            vec![VarKeyword, Identifier, Equals, NumericLiteral, Semicolon]
        );
    }

    #[test]
    fn test_scan_member_call() {
        use SyntaxKind::*;
        assert_eq!(
            kinds("console.log(\"hi\")"),
            vec![Identifier, Dot, Identifier, OpenParen, StringLiteral, CloseParen]
        );
    }

    #[test]
    fn test_string_escapes() {
        let mut scanner = Scanner::new("test.js", "'a\\nb'");
        let tok = scanner.scan();
        assert_eq!(tok.kind, SyntaxKind::StringLiteral);
        assert_eq!(tok.text, "a\nb");
    }

    #[test]
    fn test_newline_flag() {
        let mut scanner = Scanner::new("test.js", "a\nb");
        let a = scanner.scan();
        let b = scanner.scan();
        assert!(!a.preceded_by_newline);
        assert!(b.preceded_by_newline, "newline should be recorded on 'b'");
    }

    #[test]
    fn test_comments_are_trivia() {
        use SyntaxKind::*;
        assert_eq!(
            kinds("a /* mid */ . // trailing\n b"),
            vec![Identifier, Dot, Identifier]
        );
    }

    #[test]
    fn test_longest_match_operators() {
        use SyntaxKind::*;
        assert_eq!(kinds("a===b"), vec![Identifier, EqualsEqualsEquals, Identifier]);
        assert_eq!(kinds("a>>>=b"), vec![Identifier, GreaterGreaterGreaterEquals, Identifier]);
        assert_eq!(kinds("a**=b"), vec![Identifier, AsteriskAsteriskEquals, Identifier]);
        assert_eq!(kinds("a**b"), vec![Identifier, AsteriskAsterisk, Identifier]);
    }
}
