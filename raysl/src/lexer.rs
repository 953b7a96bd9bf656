use crate::error::{SourceError, SourceLocation};

/// Column width a `\t` advances by, kept fixed so diagnostics stay stable
/// regardless of the reader's own terminal settings.
const TAB_WIDTH: u32 = 8;

/// The closed set of all-uppercase command words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Set,
    Unset,
    Spawn,
    Using,
    Dump,
    Rotate,
    Translate,
    Scale,
    Unite,
    Intersect,
    Diff,
    Fuse,
    Load,
    Time,
}

impl Command {
    fn from_word(word: &str) -> Option<Command> {
        Some(match word {
            "SET" => Command::Set,
            "UNSET" => Command::Unset,
            "SPAWN" => Command::Spawn,
            "USING" => Command::Using,
            "DUMP" => Command::Dump,
            "ROTATE" => Command::Rotate,
            "TRANSLATE" => Command::Translate,
            "SCALE" => Command::Scale,
            "UNITE" => Command::Unite,
            "INTERSECT" => Command::Intersect,
            "DIFF" => Command::Diff,
            "FUSE" => Command::Fuse,
            "LOAD" => Command::Load,
            "TIME" => Command::Time,
            _ => return None,
        })
    }
}

/// The closed set of mixed-case literal type names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LiteralType {
    Color,
    Point,
    List,
    Transformation,
    Material,
    Brdf,
    Pigment,
    Shape,
    Light,
    Image,
    Renderer,
    Camera,
    Pcg,
    Tracer,
}

impl LiteralType {
    fn from_word(word: &str) -> Option<LiteralType> {
        Some(match word {
            "Color" => LiteralType::Color,
            "Point" => LiteralType::Point,
            "List" => LiteralType::List,
            "Transformation" => LiteralType::Transformation,
            "Material" => LiteralType::Material,
            "Brdf" => LiteralType::Brdf,
            "Pigment" => LiteralType::Pigment,
            "Shape" => LiteralType::Shape,
            "Light" => LiteralType::Light,
            "Image" => LiteralType::Image,
            "Renderer" => LiteralType::Renderer,
            "Camera" => LiteralType::Camera,
            "Pcg" => LiteralType::Pcg,
            "Tracer" => LiteralType::Tracer,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            LiteralType::Color => "Color",
            LiteralType::Point => "Point",
            LiteralType::List => "List",
            LiteralType::Transformation => "Transformation",
            LiteralType::Material => "Material",
            LiteralType::Brdf => "Brdf",
            LiteralType::Pigment => "Pigment",
            LiteralType::Shape => "Shape",
            LiteralType::Light => "Light",
            LiteralType::Image => "Image",
            LiteralType::Renderer => "Renderer",
            LiteralType::Camera => "Camera",
            LiteralType::Pcg => "Pcg",
            LiteralType::Tracer => "Tracer",
        }
    }
}

/// The set of single-character symbols the lexer recognizes outside of
/// math expressions.
const SYMBOLS: &[char] = &['<', '>', '{', '}', '[', ']', '(', ')', ',', '*', '/', '+', '-', '^', '='];

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Keyword(String),
    Command(Command),
    LiteralType(LiteralType),
    Identifier(String),
    Number(f64),
    Str(String),
    Symbol(char),
    MathExpr(String),
    Stop,
}

impl TokenKind {
    /// Human-readable description used in "expected X, found Y" messages.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Keyword(k) => format!(".{k}"),
            TokenKind::Command(_) => "a command".to_string(),
            TokenKind::LiteralType(t) => format!("type {}", t.name()),
            TokenKind::Identifier(n) => format!("identifier {n:?}"),
            TokenKind::Number(n) => format!("number {n}"),
            TokenKind::Str(s) => format!("string {s:?}"),
            TokenKind::Symbol(c) => format!("symbol {c:?}"),
            TokenKind::MathExpr(_) => "a math expression".to_string(),
            TokenKind::Stop => "end of file".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub loc: SourceLocation,
}

/// Turns a source string into a lazy sequence of located tokens. Supports
/// exactly one token of push-back, the amount the recursive-descent parser
/// needs for its one-token look-ahead.
pub struct Lexer {
    source_name: String,
    chars: Vec<char>,
    pos: usize,
    line: u32,
    col: u32,
    pushed_back: Option<Token>,
}

impl Lexer {
    pub fn new(source: &str, source_name: impl Into<String>) -> Self {
        Lexer {
            source_name: source_name.into(),
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
            pushed_back: None,
        }
    }

    fn loc(&self) -> SourceLocation {
        SourceLocation::new(self.source_name.clone(), self.line, self.col)
    }

    fn peek_char(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance_char(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += 1;
        match c {
            '\n' => {
                self.line += 1;
                self.col = 1;
            }
            '\t' => self.col += TAB_WIDTH,
            _ => self.col += 1,
        }
        Some(c)
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek_char() {
                Some(c) if c.is_whitespace() => {
                    self.advance_char();
                }
                Some('#') => {
                    while let Some(c) = self.peek_char() {
                        if c == '\n' {
                            break;
                        }
                        self.advance_char();
                    }
                }
                _ => break,
            }
        }
    }

    pub fn unread_token(&mut self, token: Token) {
        debug_assert!(self.pushed_back.is_none(), "only one token of push-back is supported");
        self.pushed_back = Some(token);
    }

    pub fn next_token(&mut self) -> Result<Token, SourceError> {
        if let Some(t) = self.pushed_back.take() {
            return Ok(t);
        }

        self.skip_whitespace_and_comments();
        let loc = self.loc();

        let c = match self.peek_char() {
            None => return Ok(Token { kind: TokenKind::Stop, loc }),
            Some(c) => c,
        };

        if c == '.' {
            return self.read_keyword(loc);
        }
        if c.is_ascii_digit() {
            return self.read_number(loc);
        }
        if c == '"' {
            return self.read_string(loc);
        }
        if c == '$' {
            return self.read_math_expr(loc);
        }
        if c.is_ascii_uppercase() {
            return self.read_command_or_type(loc);
        }
        if c.is_ascii_lowercase() || c == '_' {
            return self.read_identifier(loc);
        }
        if SYMBOLS.contains(&c) {
            self.advance_char();
            return Ok(Token { kind: TokenKind::Symbol(c), loc });
        }

        self.advance_char();
        Err(SourceError::BadCharacter { loc, found: c })
    }

    fn read_keyword(&mut self, loc: SourceLocation) -> Result<Token, SourceError> {
        self.advance_char(); // consume '.'

        match self.peek_char() {
            Some(c) if c.is_ascii_digit() => {
                // `.1` would tokenize as a keyword but a dotted-decimal
                // number requires a leading digit, so this is a lexical
                // error rather than a valid keyword.
                Err(SourceError::InvalidNumber { loc, text: format!(".{c}") })
            }
            Some(c) if c.is_alphabetic() || c == '_' => {
                let mut name = String::new();
                while let Some(c) = self.peek_char() {
                    if c.is_alphanumeric() || c == '_' {
                        name.push(c);
                        self.advance_char();
                    } else {
                        break;
                    }
                }
                Ok(Token { kind: TokenKind::Keyword(name), loc })
            }
            _ => Err(SourceError::BadCharacter { loc, found: '.' }),
        }
    }

    fn read_number(&mut self, loc: SourceLocation) -> Result<Token, SourceError> {
        let mut text = String::new();

        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() {
                text.push(c);
                self.advance_char();
            } else {
                break;
            }
        }

        if self.peek_char() == Some('.') {
            // Only a dotted-decimal if followed by a digit; otherwise the
            // `.` belongs to a following keyword/symbol and is left alone.
            if matches!(self.peek_char_at(1), Some(c) if c.is_ascii_digit()) {
                text.push('.');
                self.advance_char();
                while let Some(c) = self.peek_char() {
                    if c.is_ascii_digit() {
                        text.push(c);
                        self.advance_char();
                    } else {
                        break;
                    }
                }
            }
        }

        if matches!(self.peek_char(), Some('e') | Some('E')) {
            let save_pos = self.pos;
            let save_line = self.line;
            let save_col = self.col;

            let mut exp_text = String::new();
            exp_text.push(self.advance_char().unwrap());
            if matches!(self.peek_char(), Some('+') | Some('-')) {
                exp_text.push(self.advance_char().unwrap());
            }

            let mut has_digits = false;
            while let Some(c) = self.peek_char() {
                if c.is_ascii_digit() {
                    exp_text.push(c);
                    has_digits = true;
                    self.advance_char();
                } else {
                    break;
                }
            }

            if has_digits {
                text.push_str(&exp_text);
            } else {
                // Not actually a scientific-notation suffix; rewind.
                self.pos = save_pos;
                self.line = save_line;
                self.col = save_col;
            }
        }

        text.parse::<f64>()
            .map(|n| Token { kind: TokenKind::Number(n), loc: loc.clone() })
            .map_err(|_| SourceError::InvalidNumber { loc, text })
    }

    fn read_string(&mut self, loc: SourceLocation) -> Result<Token, SourceError> {
        self.advance_char(); // consume opening quote
        let mut s = String::new();

        loop {
            match self.advance_char() {
                None => return Err(SourceError::UnfinishedExpression { loc }),
                Some('"') => break,
                Some('\\') => match self.advance_char() {
                    None => return Err(SourceError::UnfinishedExpression { loc }),
                    Some('n') => s.push('\n'),
                    Some('t') => s.push('\t'),
                    Some('r') => s.push('\r'),
                    Some('"') => s.push('"'),
                    Some('\\') => s.push('\\'),
                    Some(other) => s.push(other),
                },
                Some(c) => s.push(c),
            }
        }

        Ok(Token { kind: TokenKind::Str(s), loc })
    }

    fn read_math_expr(&mut self, loc: SourceLocation) -> Result<Token, SourceError> {
        self.advance_char(); // consume opening '$'
        let mut s = String::new();

        loop {
            match self.advance_char() {
                None => return Err(SourceError::UnfinishedExpression { loc }),
                Some('$') => break,
                Some(c) => s.push(c),
            }
        }

        Ok(Token { kind: TokenKind::MathExpr(s), loc })
    }

    fn read_command_or_type(&mut self, loc: SourceLocation) -> Result<Token, SourceError> {
        let mut word = String::new();
        while let Some(c) = self.peek_char() {
            if c.is_alphanumeric() || c == '_' {
                word.push(c);
                self.advance_char();
            } else {
                break;
            }
        }

        let is_all_uppercase = word.chars().filter(|c| c.is_alphabetic()).all(|c| c.is_uppercase());

        if is_all_uppercase {
            return Command::from_word(&word)
                .map(|cmd| Token { kind: TokenKind::Command(cmd), loc: loc.clone() })
                .ok_or(SourceError::InvalidCommand { loc, name: word });
        }

        LiteralType::from_word(&word)
            .map(|t| Token { kind: TokenKind::LiteralType(t), loc: loc.clone() })
            .ok_or(SourceError::InvalidType { loc, name: word })
    }

    fn read_identifier(&mut self, loc: SourceLocation) -> Result<Token, SourceError> {
        let mut name = String::new();
        while let Some(c) = self.peek_char() {
            if c.is_alphanumeric() || c == '_' {
                name.push(c);
                self.advance_char();
            } else {
                break;
            }
        }

        Ok(Token { kind: TokenKind::Identifier(name), loc })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(src, "test");
        let mut out = Vec::new();
        loop {
            let tok = lexer.next_token().unwrap();
            let stop = tok.kind == TokenKind::Stop;
            out.push(tok.kind);
            if stop {
                break;
            }
        }
        out
    }

    #[test]
    fn test_commands_and_identifiers() {
        let ks = kinds("SET a 9");
        assert_eq!(
            ks,
            vec![
                TokenKind::Command(Command::Set),
                TokenKind::Identifier("a".to_string()),
                TokenKind::Number(9.0),
                TokenKind::Stop,
            ]
        );
    }

    #[test]
    fn test_unknown_all_caps_is_invalid_command() {
        let mut lexer = Lexer::new("BOGUS", "test");
        assert!(matches!(lexer.next_token(), Err(SourceError::InvalidCommand { .. })));
    }

    #[test]
    fn test_unknown_mixed_case_is_invalid_type() {
        let mut lexer = Lexer::new("Bogus", "test");
        assert!(matches!(lexer.next_token(), Err(SourceError::InvalidType { .. })));
    }

    #[test]
    fn test_keyword() {
        assert_eq!(kinds(".X"), vec![TokenKind::Keyword("X".to_string()), TokenKind::Stop]);
    }

    #[test]
    fn test_dotted_number_requires_leading_digit() {
        let mut lexer = Lexer::new(".1", "test");
        assert!(matches!(lexer.next_token(), Err(SourceError::InvalidNumber { .. })));
    }

    #[test]
    fn test_number_forms() {
        assert_eq!(kinds("3"), vec![TokenKind::Number(3.0), TokenKind::Stop]);
        assert_eq!(kinds("3.5"), vec![TokenKind::Number(3.5), TokenKind::Stop]);
        assert_eq!(kinds("1e3"), vec![TokenKind::Number(1000.0), TokenKind::Stop]);
        assert_eq!(kinds("1.5e-2"), vec![TokenKind::Number(0.015), TokenKind::Stop]);
    }

    #[test]
    fn test_string_with_escapes() {
        assert_eq!(kinds(r#""a\nb""#), vec![TokenKind::Str("a\nb".to_string()), TokenKind::Stop]);
    }

    #[test]
    fn test_unfinished_string_is_an_error() {
        let mut lexer = Lexer::new("\"abc", "test");
        assert!(matches!(lexer.next_token(), Err(SourceError::UnfinishedExpression { .. })));
    }

    #[test]
    fn test_math_expr_captures_raw_body() {
        assert_eq!(kinds("$1 + 2a$"), vec![TokenKind::MathExpr("1 + 2a".to_string()), TokenKind::Stop]);
    }

    #[test]
    fn test_unfinished_math_expr_is_an_error() {
        let mut lexer = Lexer::new("$1 + 2", "test");
        assert!(matches!(lexer.next_token(), Err(SourceError::UnfinishedExpression { .. })));
    }

    #[test]
    fn test_comment_is_skipped() {
        assert_eq!(kinds("# a comment\n9"), vec![TokenKind::Number(9.0), TokenKind::Stop]);
    }

    #[test]
    fn test_unreads_exactly_one_token() {
        let mut lexer = Lexer::new("SET a", "test");
        let t1 = lexer.next_token().unwrap();
        lexer.unread_token(t1.clone());
        let t2 = lexer.next_token().unwrap();
        assert_eq!(t1, t2);
    }

    #[test]
    fn test_bad_character_is_an_error() {
        let mut lexer = Lexer::new("@", "test");
        assert!(matches!(lexer.next_token(), Err(SourceError::BadCharacter { .. })));
    }
}
