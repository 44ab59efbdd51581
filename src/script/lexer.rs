//! The Shastina-like tokenizer and header parser. Recognizes the leading
//! `%sparkle; %bufcount <N>; %matcount <M>;` metacommand block, then
//! tokenizes the body into quoted strings, numeric literals, operator
//! words, and a terminating EOF marker, tracking line numbers throughout
//! for diagnostics.
use super::ScriptError;

pub const MAX_TOKEN_LEN: usize = 255;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Str(String),
    Int(i32),
    Float(f64),
    Word(String),
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub line: u64,
}

/// The parsed header: declared register counts, and the byte offset into
/// the source where the body begins.
pub struct Header {
    pub bufc: u32,
    pub matc: u32,
}

struct Chars<'a> {
    input: &'a [u8],
    pos: usize,
    line: u64,
}

impl<'a> Chars<'a> {
    fn new(input: &'a str) -> Self {
        Chars { input: input.as_bytes(), pos: 0, line: 1 }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        if c == b'\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_ascii_whitespace()) {
            self.bump();
        }
    }

    fn err(&self, msg: impl Into<String>) -> ScriptError {
        ScriptError::new(self.line, msg.into())
    }
}

/// Parse the leading `%sparkle; %bufcount <N>; %matcount <M>;` block and
/// return the declared register counts plus a cursor positioned at the
/// first body token.
pub fn parse_header(input: &str) -> Result<(Header, Tokenizer<'_>), ScriptError> {
    let mut chars = Chars::new(input);
    expect_metacommand(&mut chars, "sparkle", None)?;
    let bufc = expect_metacommand(&mut chars, "bufcount", Some(()))?
        .expect("bufcount value requested");
    let matc = expect_metacommand(&mut chars, "matcount", Some(()))?
        .expect("matcount value requested");
    Ok((Header { bufc, matc }, Tokenizer { chars }))
}

fn expect_metacommand(
    chars: &mut Chars<'_>,
    name: &str,
    want_value: Option<()>,
) -> Result<Option<u32>, ScriptError> {
    chars.skip_ws();
    if chars.peek() != Some(b'%') {
        return Err(chars.err(format!("expected metacommand %{}", name)));
    }
    chars.bump();
    let start = chars.pos;
    while matches!(chars.peek(), Some(c) if c.is_ascii_alphanumeric() || c == b'_') {
        chars.bump();
    }
    let word = std::str::from_utf8(&chars.input[start..chars.pos]).unwrap();
    if word != name {
        return Err(chars.err(format!("expected metacommand %{}, found %{}", name, word)));
    }
    chars.skip_ws();
    let value = if want_value.is_some() {
        let vstart = chars.pos;
        while matches!(chars.peek(), Some(c) if c.is_ascii_digit()) {
            chars.bump();
        }
        if vstart == chars.pos {
            return Err(chars.err(format!("expected an integer value for %{}", name)));
        }
        let text = std::str::from_utf8(&chars.input[vstart..chars.pos]).unwrap();
        Some(text.parse::<u32>().map_err(|_| chars.err(format!("invalid integer for %{}", name)))?)
    } else {
        None
    };
    chars.skip_ws();
    if chars.peek() != Some(b';') {
        return Err(chars.err(format!("expected ';' after %{}", name)));
    }
    chars.bump();
    Ok(value)
}

pub struct Tokenizer<'a> {
    chars: Chars<'a>,
}

impl<'a> Tokenizer<'a> {
    /// Read the next body token, returning `Token::Eof` at the terminating
    /// `%eof;` marker or the physical end of input.
    pub fn next_token(&mut self) -> Result<SpannedToken, ScriptError> {
        self.chars.skip_ws();
        let line = self.chars.line;
        match self.chars.peek() {
            None => Ok(SpannedToken { token: Token::Eof, line }),
            Some(b'%') => {
                self.consume_eof_marker()?;
                Ok(SpannedToken { token: Token::Eof, line })
            }
            Some(b'"') => self.read_string(line),
            Some(c) if c.is_ascii_digit() || c == b'-' || c == b'+' => self.read_number(line),
            Some(_) => self.read_word(line),
        }
    }

    fn consume_eof_marker(&mut self) -> Result<(), ScriptError> {
        let line = self.chars.line;
        self.chars.bump(); // '%'
        let start = self.chars.pos;
        while matches!(self.chars.peek(), Some(c) if c.is_ascii_alphanumeric() || c == b'_') {
            self.chars.bump();
        }
        let word = std::str::from_utf8(&self.chars.input[start..self.chars.pos]).unwrap();
        if word != "eof" {
            return Err(ScriptError::new(line, format!("unexpected metacommand %{}", word)));
        }
        self.chars.skip_ws();
        if self.chars.peek() == Some(b';') {
            self.chars.bump();
        }
        Ok(())
    }

    fn read_string(&mut self, line: u64) -> Result<SpannedToken, ScriptError> {
        self.chars.bump(); // opening quote
        let mut out = String::new();
        loop {
            match self.chars.bump() {
                None => return Err(self.chars.err("unterminated string literal")),
                Some(b'"') => break,
                Some(b'\\') => match self.chars.bump() {
                    Some(b'\\') => out.push('\\'),
                    Some(b'"') => out.push('"'),
                    _ => return Err(ScriptError::new(line, "illegal escape in string literal".to_string())),
                },
                Some(c) => {
                    if !(0x20..=0x7e).contains(&c) {
                        return Err(ScriptError::new(
                            line,
                            "string contains illegal (non-printable, non-ASCII) character".to_string(),
                        ));
                    }
                    out.push(c as char);
                }
            }
            if out.len() > MAX_TOKEN_LEN {
                return Err(ScriptError::new(line, "string literal exceeds 255 characters".to_string()));
            }
        }
        Ok(SpannedToken { token: Token::Str(out), line })
    }

    fn read_number(&mut self, line: u64) -> Result<SpannedToken, ScriptError> {
        let start = self.chars.pos;
        let mut is_float = false;
        if matches!(self.chars.peek(), Some(b'-') | Some(b'+')) {
            self.chars.bump();
        }
        while let Some(c) = self.chars.peek() {
            match c {
                b'0'..=b'9' => {
                    self.chars.bump();
                }
                b'.' | b'e' | b'E' => {
                    is_float = true;
                    self.chars.bump();
                    if matches!(self.chars.peek(), Some(b'-') | Some(b'+')) {
                        self.chars.bump();
                    }
                }
                _ => break,
            }
        }
        let text = std::str::from_utf8(&self.chars.input[start..self.chars.pos]).unwrap();
        if is_float {
            let v = text.parse::<f64>().map_err(|_| ScriptError::new(line, format!("invalid float literal '{}'", text)))?;
            if !v.is_finite() {
                return Err(ScriptError::new(line, format!("non-finite float literal '{}'", text)));
            }
            Ok(SpannedToken { token: Token::Float(v), line })
        } else {
            let v = text.parse::<i32>().map_err(|_| ScriptError::new(line, format!("invalid integer literal '{}'", text)))?;
            Ok(SpannedToken { token: Token::Int(v), line })
        }
    }

    fn read_word(&mut self, line: u64) -> Result<SpannedToken, ScriptError> {
        let start = self.chars.pos;
        while let Some(c) = self.chars.peek() {
            if c.is_ascii_whitespace() || c == b'"' {
                break;
            }
            self.chars.bump();
        }
        if start == self.chars.pos {
            return Err(self.chars.err("unexpected character"));
        }
        let text = std::str::from_utf8(&self.chars.input[start..self.chars.pos]).unwrap();
        if text.len() > MAX_TOKEN_LEN {
            return Err(ScriptError::new(line, "operator name exceeds 255 characters".to_string()));
        }
        Ok(SpannedToken { token: Token::Word(text.to_string()), line })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_header() {
        let src = "%sparkle; %bufcount 3; %matcount 2;\n%eof;";
        let (header, _) = parse_header(src).unwrap();
        assert_eq!(header.bufc, 3);
        assert_eq!(header.matc, 2);
    }

    #[test]
    fn tokenizes_body() {
        let src = "%sparkle; %bufcount 1; %matcount 1;\n0 4 4 3 reset \"out.png\" 0.5 1e3 %eof;";
        let (_, mut tok) = parse_header(src).unwrap();
        let mut tokens = Vec::new();
        loop {
            let t = tok.next_token().unwrap();
            let is_eof = matches!(t.token, Token::Eof);
            tokens.push(t.token);
            if is_eof {
                break;
            }
        }
        assert_eq!(
            tokens,
            vec![
                Token::Int(0),
                Token::Int(4),
                Token::Int(4),
                Token::Int(3),
                Token::Word("reset".to_string()),
                Token::Str("out.png".to_string()),
                Token::Float(0.5),
                Token::Float(1e3),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn rejects_bad_escape() {
        let src = "%sparkle; %bufcount 1; %matcount 1;\n\"bad\\nescape\" %eof;";
        let (_, mut tok) = parse_header(src).unwrap();
        assert!(tok.next_token().is_err());
    }
}
