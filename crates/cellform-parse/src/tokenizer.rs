//! Formula tokenizer.
//!
//! Turns a formula string into a [`TokenTree`]: a nested, pre-semantic token
//! structure in which every `(...)` / `{...}` becomes a group node and
//! function argument lists are already split on separators. No semantic
//! meaning is assigned here; that is the AST builder's job.

use std::fmt::{self, Display};

use cellform_common::FormulaErrorKind;

const TOKEN_ENDERS: &str = ",;}) +-*/^&=><%\n";

const fn build_token_enders() -> [bool; 256] {
    let mut tbl = [false; 256];
    let bytes = TOKEN_ENDERS.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        tbl[bytes[i] as usize] = true;
        i += 1;
    }
    tbl
}
static TOKEN_ENDERS_TABLE: [bool; 256] = build_token_enders();

#[inline(always)]
fn is_token_ender(c: u8) -> bool {
    TOKEN_ENDERS_TABLE[c as usize]
}

/// Represents operator associativity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Associativity {
    Left,
    Right,
}

/// Lexing failure. Fatal for the formula: no partial tree is produced.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LexError {
    #[error("unmatched opening parenthesis or brace at byte {0}")]
    UnmatchedOpen(usize),
    #[error("no matching opener for closer at byte {0}")]
    UnmatchedClose(usize),
    #[error("mismatched ( and {{ pair at byte {0}")]
    MismatchedPair(usize),
    #[error("unterminated string literal starting at byte {0}")]
    UnterminatedString(usize),
    #[error("invalid error literal at byte {0}")]
    InvalidErrorLiteral(usize),
    #[error("separator outside a function call at byte {0}")]
    StraySeparator(usize),
    #[error("formula contains no tokens")]
    Empty,
}

/// The kind of a leaf token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Number,
    Text,
    Logical,
    ErrorLit,
    /// Identifier-like operand: cell/range reference, name, …
    Ident,
    OpPrefix,
    OpInfix,
    OpPostfix,
}

/// A leaf token with its byte span in the source formula.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token {
    pub value: String,
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
}

impl Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{:?} value: {}>", self.kind, self.value)
    }
}

impl Token {
    pub fn new(value: impl Into<String>, kind: TokenKind, start: usize, end: usize) -> Self {
        Token {
            value: value.into(),
            kind,
            start,
            end,
        }
    }

    /// Classify an accumulated operand slice.
    fn make_operand(source: &str, start: usize, end: usize) -> Self {
        let value = &source[start..end];
        let kind = if value.starts_with('"') {
            TokenKind::Text
        } else if value.eq_ignore_ascii_case("TRUE") || value.eq_ignore_ascii_case("FALSE") {
            TokenKind::Logical
        } else if value.parse::<f64>().is_ok() {
            TokenKind::Number
        } else {
            TokenKind::Ident
        };
        Token::new(value, kind, start, end)
    }

    pub fn is_operator(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::OpPrefix | TokenKind::OpInfix | TokenKind::OpPostfix
        )
    }

    /// Binding strength used when nesting tokens into the AST. Higher binds
    /// tighter; prefix operators share the 'u' entry.
    pub fn precedence(&self) -> Option<(u8, Associativity)> {
        let op = if self.kind == TokenKind::OpPrefix {
            "u"
        } else {
            self.value.as_str()
        };

        match op {
            ":" => Some((8, Associativity::Left)),
            "u" => Some((7, Associativity::Right)),
            "%" => Some((6, Associativity::Left)),
            "^" => Some((5, Associativity::Left)),
            "*" | "/" => Some((4, Associativity::Left)),
            "+" | "-" => Some((3, Associativity::Left)),
            "&" => Some((2, Associativity::Left)),
            "=" | "<" | ">" | "<=" | ">=" | "<>" => Some((1, Associativity::Left)),
            _ => None,
        }
    }
}

/// What kind of group a `(...)` / `{...}` token is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    /// Plain parenthesised subexpression.
    Paren,
    /// Function call: `HEAD(...)`.
    Call,
    /// Array literal: `{...}`.
    Array,
}

/// An ordered sequence of sibling token nodes.
pub type TokenSeq = Vec<TokenNode>;

/// A group token: a nested `(...)` or `{...}` with its children.
///
/// `rows[0]` holds the comma-separated argument sequences; arrays additionally
/// split rows on `;`. Paren groups always have exactly one row with one
/// sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenGroup {
    pub kind: GroupKind,
    /// The call head for `Call` groups, including any prefix markers written
    /// immediately before it (`-@SUM`). `None` for paren and array groups.
    pub head: Option<Token>,
    pub rows: Vec<Vec<TokenSeq>>,
}

impl TokenGroup {
    /// The comma-separated argument sequences (first row).
    pub fn args(&self) -> &[TokenSeq] {
        self.rows.first().map(|r| r.as_slice()).unwrap_or(&[])
    }
}

/// One node of the token tree: a raw leaf token or a nested group.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenNode {
    Leaf(Token),
    Group(TokenGroup),
}

/// The tokenizer output: the ordered top-level token sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenTree {
    pub items: TokenSeq,
}

impl TokenTree {
    /// Reconstruct a canonical (whitespace-free) rendition of the formula.
    pub fn render(&self) -> String {
        format!("={}", render_seq(&self.items))
    }
}

fn render_seq(seq: &[TokenNode]) -> String {
    let mut out = String::new();
    for node in seq {
        match node {
            TokenNode::Leaf(t) => out.push_str(&t.value),
            TokenNode::Group(g) => {
                if let Some(head) = &g.head {
                    out.push_str(&head.value);
                }
                let (open, close) = if g.kind == GroupKind::Array {
                    ('{', '}')
                } else {
                    ('(', ')')
                };
                out.push(open);
                let rows: Vec<String> = g
                    .rows
                    .iter()
                    .map(|row| {
                        row.iter()
                            .map(|arg| render_seq(arg))
                            .collect::<Vec<_>>()
                            .join(",")
                    })
                    .collect();
                out.push_str(&rows.join(";"));
                out.push(close);
            }
        }
    }
    out
}

/// Tokenize a formula string into a [`TokenTree`].
///
/// A string that does not start with `=` is treated as a bare literal, the
/// way a cell holds one.
pub fn tokenize(formula: &str) -> Result<TokenTree, LexError> {
    Tokenizer::new(formula).run()
}

struct Frame {
    kind: GroupKind,
    head: Option<Token>,
    rows: Vec<Vec<TokenSeq>>,
    current_row: Vec<TokenSeq>,
    current: TokenSeq,
    open_pos: usize,
}

impl Frame {
    fn root() -> Self {
        Frame {
            kind: GroupKind::Paren,
            head: None,
            rows: Vec::new(),
            current_row: Vec::new(),
            current: Vec::new(),
            open_pos: 0,
        }
    }

    fn group(kind: GroupKind, head: Option<Token>, open_pos: usize) -> Self {
        Frame {
            kind,
            head,
            rows: Vec::new(),
            current_row: Vec::new(),
            current: Vec::new(),
            open_pos,
        }
    }

    fn finish(mut self) -> TokenGroup {
        self.current_row.push(std::mem::take(&mut self.current));
        self.rows.push(std::mem::take(&mut self.current_row));
        TokenGroup {
            kind: self.kind,
            head: self.head,
            rows: self.rows,
        }
    }
}

struct Tokenizer<'f> {
    formula: &'f str,
    frames: Vec<Frame>,
    offset: usize,      // Byte offset in formula
    token_start: usize, // Start of current accumulated token
    token_end: usize,   // End of current accumulated token
}

impl<'f> Tokenizer<'f> {
    fn new(formula: &'f str) -> Self {
        Tokenizer {
            formula,
            frames: vec![Frame::root()],
            offset: 0,
            token_start: 0,
            token_end: 0,
        }
    }

    #[inline]
    fn byte_at(&self, pos: usize) -> u8 {
        self.formula.as_bytes()[pos]
    }

    #[inline]
    fn has_token(&self) -> bool {
        self.token_end > self.token_start
    }

    #[inline]
    fn start_token(&mut self) {
        self.token_start = self.offset;
        self.token_end = self.offset;
    }

    #[inline]
    fn extend_token(&mut self) {
        self.token_end = self.offset;
    }

    fn push_node(&mut self, node: TokenNode) {
        self.frames
            .last_mut()
            .expect("frame stack never empty")
            .current
            .push(node);
    }

    /// Convert the accumulated slice to an operand token, if any.
    fn save_token(&mut self) {
        if self.has_token() {
            let token = Token::make_operand(self.formula, self.token_start, self.token_end);
            self.push_node(TokenNode::Leaf(token));
        }
    }

    fn run(mut self) -> Result<TokenTree, LexError> {
        if self.formula.is_empty() {
            return Err(LexError::Empty);
        }

        // A cell content without a leading '=' is a single bare literal.
        // Anything that is not a number or a logical reads as text.
        if self.byte_at(0) != b'=' {
            let mut token = Token::make_operand(self.formula, 0, self.formula.len());
            if token.kind == TokenKind::Ident {
                token.kind = TokenKind::Text;
            }
            return Ok(TokenTree {
                items: vec![TokenNode::Leaf(token)],
            });
        }

        self.offset = 1;
        self.start_token();

        while self.offset < self.formula.len() {
            if self.check_scientific_notation() {
                continue;
            }

            let curr_byte = self.byte_at(self.offset);

            if is_token_ender(curr_byte) && self.has_token() {
                self.save_token();
                self.start_token();
            }

            match curr_byte {
                b'"' | b'\'' => self.parse_string()?,
                b'#' => self.parse_error_literal()?,
                b' ' | b'\n' => self.parse_whitespace(),
                b'+' | b'-' | b'*' | b'/' | b'^' | b'&' | b'=' | b'>' | b'<' | b'%' => {
                    self.parse_operator()
                }
                b'(' | b'{' => self.parse_opener(),
                b')' | b'}' => self.parse_closer()?,
                b',' | b';' => self.parse_separator()?,
                _ => {
                    if !self.has_token() {
                        self.start_token();
                    }
                    self.offset += 1;
                    self.extend_token();
                }
            }
        }

        if self.has_token() {
            self.save_token();
        }

        if self.frames.len() > 1 {
            let pos = self.frames.last().map(|f| f.open_pos).unwrap_or(0);
            return Err(LexError::UnmatchedOpen(pos));
        }

        let root = self.frames.pop().expect("root frame");
        if root.current.is_empty() {
            return Err(LexError::Empty);
        }
        Ok(TokenTree {
            items: root.current,
        })
    }

    /// If the current token looks like a number in scientific notation,
    /// consume the '+' or '-' as part of the number.
    fn check_scientific_notation(&mut self) -> bool {
        if self.offset < self.formula.len() {
            let curr_byte = self.byte_at(self.offset);
            if (curr_byte == b'+' || curr_byte == b'-') && self.is_scientific_notation_base() {
                self.offset += 1;
                self.extend_token();
                return true;
            }
        }
        false
    }

    /// Is the accumulated token the base of a scientific-notation number
    /// (e.g. "1.23E" or "9e")?
    fn is_scientific_notation_base(&self) -> bool {
        if !self.has_token() {
            return false;
        }
        let slice = &self.formula.as_bytes()[self.token_start..self.token_end];
        if slice.len() < 2 {
            return false;
        }
        let last = slice[slice.len() - 1];
        if !(last == b'E' || last == b'e') {
            return false;
        }
        if !slice[0].is_ascii_digit() {
            return false;
        }
        let mut dot_seen = false;
        for &ch in &slice[1..slice.len() - 1] {
            match ch {
                b'0'..=b'9' => {}
                b'.' if !dot_seen => dot_seen = true,
                _ => return false,
            }
        }
        true
    }

    /// Parse a double-quoted string literal or a single-quoted sheet name.
    ///
    /// Delimiters inside quotes are ignored; doubling the delimiter escapes
    /// it. Single-quoted text folds into the current token so a qualified
    /// reference like `'My Sheet'!A1` stays one operand.
    fn parse_string(&mut self) -> Result<(), LexError> {
        let delim = self.byte_at(self.offset);
        let string_start = self.offset;

        if delim == b'"' && self.has_token() {
            self.save_token();
            self.start_token();
        }
        if delim == b'\'' && !self.has_token() {
            self.start_token();
        }

        self.offset += 1; // Skip opening delimiter

        while self.offset < self.formula.len() {
            if self.byte_at(self.offset) == delim {
                self.offset += 1;
                if self.offset < self.formula.len() && self.byte_at(self.offset) == delim {
                    self.offset += 1; // Escaped delimiter
                } else {
                    if delim == b'"' {
                        let token = Token::new(
                            &self.formula[string_start..self.offset],
                            TokenKind::Text,
                            string_start,
                            self.offset,
                        );
                        self.push_node(TokenNode::Leaf(token));
                        self.start_token();
                    } else {
                        // Quoted sheet name stays part of the current token.
                        self.extend_token();
                    }
                    return Ok(());
                }
            } else {
                self.offset += 1;
            }
        }

        Err(LexError::UnterminatedString(string_start))
    }

    /// Parse an error literal starting with '#'.
    fn parse_error_literal(&mut self) -> Result<(), LexError> {
        if self.has_token() {
            self.save_token();
            self.start_token();
        }

        let rest = &self.formula[self.offset..];
        // Longest match first so '#N/A' does not shadow a longer code.
        let mut best: Option<usize> = None;
        for len in (2..=rest.len().min(12)).rev() {
            if !rest.is_char_boundary(len) {
                continue;
            }
            if FormulaErrorKind::parse(&rest[..len]).is_some() {
                best = Some(len);
                break;
            }
        }

        match best {
            Some(len) => {
                let token = Token::new(
                    &rest[..len],
                    TokenKind::ErrorLit,
                    self.offset,
                    self.offset + len,
                );
                self.push_node(TokenNode::Leaf(token));
                self.offset += len;
                self.start_token();
                Ok(())
            }
            None => Err(LexError::InvalidErrorLiteral(self.offset)),
        }
    }

    /// Whitespace separates tokens but is not preserved in the tree.
    fn parse_whitespace(&mut self) {
        self.save_token();
        while self.offset < self.formula.len() {
            match self.byte_at(self.offset) {
                b' ' | b'\n' => self.offset += 1,
                _ => break,
            }
        }
        self.start_token();
    }

    /// True when a '+' or '-' at the current position is a prefix operator:
    /// nothing before it in the current sequence, or another operator.
    fn plus_minus_is_prefix(&self) -> bool {
        match self.frames.last().and_then(|f| f.current.last()) {
            None => true,
            Some(TokenNode::Leaf(t)) => {
                matches!(t.kind, TokenKind::OpPrefix | TokenKind::OpInfix)
            }
            Some(TokenNode::Group(_)) => false,
        }
    }

    fn parse_operator(&mut self) {
        self.save_token();

        // Two-character comparison operators.
        if self.offset + 1 < self.formula.len() {
            let two = &self.formula.as_bytes()[self.offset..self.offset + 2];
            if two == b">=" || two == b"<=" || two == b"<>" {
                let token = Token::new(
                    &self.formula[self.offset..self.offset + 2],
                    TokenKind::OpInfix,
                    self.offset,
                    self.offset + 2,
                );
                self.push_node(TokenNode::Leaf(token));
                self.offset += 2;
                self.start_token();
                return;
            }
        }

        let curr_byte = self.byte_at(self.offset);
        let kind = match curr_byte {
            b'%' => TokenKind::OpPostfix,
            b'+' | b'-' => {
                if self.plus_minus_is_prefix() {
                    TokenKind::OpPrefix
                } else {
                    TokenKind::OpInfix
                }
            }
            _ => TokenKind::OpInfix,
        };

        let token = Token::new(
            &self.formula[self.offset..self.offset + 1],
            kind,
            self.offset,
            self.offset + 1,
        );
        self.push_node(TokenNode::Leaf(token));
        self.offset += 1;
        self.start_token();
    }

    fn parse_opener(&mut self) {
        let curr_byte = self.byte_at(self.offset);

        if curr_byte == b'{' {
            self.save_token();
            self.frames
                .push(Frame::group(GroupKind::Array, None, self.offset));
        } else {
            let frame = match self.take_call_head() {
                Some(head) => Frame::group(GroupKind::Call, Some(head), self.offset),
                None => Frame::group(GroupKind::Paren, None, self.offset),
            };
            self.frames.push(frame);
        }

        self.offset += 1;
        self.start_token();
    }

    /// The call head for a `(` at the current offset, if there is one: the
    /// accumulated token, or an identifier leaf that whitespace already
    /// separated from the opener (`SUM (1)` names a call too). A unary minus
    /// written immediately before the head folds into it so the call factory
    /// sees the prefix markers verbatim.
    fn take_call_head(&mut self) -> Option<Token> {
        let mut head = if self.has_token() {
            Token::new(
                &self.formula[self.token_start..self.token_end],
                TokenKind::Ident,
                self.token_start,
                self.token_end,
            )
        } else {
            let frame = self.frames.last_mut()?;
            match frame.current.last() {
                Some(TokenNode::Leaf(t)) if t.kind == TokenKind::Ident => {
                    match frame.current.pop() {
                        Some(TokenNode::Leaf(t)) => t,
                        _ => return None,
                    }
                }
                _ => return None,
            }
        };

        let frame = self.frames.last_mut()?;
        if let Some(TokenNode::Leaf(prev)) = frame.current.last() {
            if prev.kind == TokenKind::OpPrefix && prev.value == "-" && prev.end == head.start {
                let minus = match frame.current.pop() {
                    Some(TokenNode::Leaf(t)) => t,
                    _ => return None,
                };
                head.value = format!("-{}", head.value);
                head.start = minus.start;
            }
        }
        Some(head)
    }

    fn parse_closer(&mut self) -> Result<(), LexError> {
        self.save_token();

        let curr_byte = self.byte_at(self.offset);
        if self.frames.len() == 1 {
            return Err(LexError::UnmatchedClose(self.offset));
        }

        let frame = self.frames.pop().expect("checked above");
        let matches = match frame.kind {
            GroupKind::Array => curr_byte == b'}',
            GroupKind::Paren | GroupKind::Call => curr_byte == b')',
        };
        if !matches {
            return Err(LexError::MismatchedPair(self.offset));
        }

        let group = frame.finish();
        self.push_node(TokenNode::Group(group));
        self.offset += 1;
        self.start_token();
        Ok(())
    }

    fn parse_separator(&mut self) -> Result<(), LexError> {
        self.save_token();

        let curr_byte = self.byte_at(self.offset);
        let depth = self.frames.len();
        let kind = self.frames.last().map(|f| f.kind);
        match (curr_byte, kind) {
            (b',', Some(GroupKind::Call | GroupKind::Array)) if depth > 1 => {
                let frame = self.frames.last_mut().expect("checked above");
                let arg = std::mem::take(&mut frame.current);
                frame.current_row.push(arg);
            }
            (b';', Some(GroupKind::Array)) if depth > 1 => {
                let frame = self.frames.last_mut().expect("checked above");
                let arg = std::mem::take(&mut frame.current);
                frame.current_row.push(arg);
                let row = std::mem::take(&mut frame.current_row);
                frame.rows.push(row);
            }
            _ => return Err(LexError::StraySeparator(self.offset)),
        }

        self.offset += 1;
        self.start_token();
        Ok(())
    }
}
