//! Tokenizer for eQASM source text.
//!
//! The source is lower-cased before lexing, so mnemonics, register sigils
//! and hex digits are case-insensitive. Blanks (space, tab, carriage return)
//! and `#` comments are discarded; newlines are kept as tokens because the
//! grammar is line oriented. The first character that starts no token ends
//! lexing with a `LexError`.

use crate::LexError;
use cactus_common::isa::CmpFlag;
use core::fmt;
use nom::{
    IResult,
    branch::alt,
    bytes::complete::{is_a, tag, take_till, take_while},
    character::complete::{char, digit1, hex_digit1, one_of, satisfy},
    combinator::{map, opt, recognize, value},
    multi::many0_count,
    sequence::{pair, preceded},
};

/// Reserved words: instruction mnemonics, pseudo-instructions, `qnop` and `bs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Nop,
    Stop,
    Qwait,
    Qwaitr,
    Smis,
    Smit,
    Not,
    Cmp,
    Br,
    Fbr,
    Fmr,
    Ldi,
    Ldui,
    Add,
    Sub,
    And,
    Or,
    Xor,
    Mul,
    Div,
    Rem,
    Lw,
    Lb,
    Lbu,
    Sw,
    Sb,
    FcvtWS,
    FcvtSW,
    Flw,
    Fsw,
    FaddS,
    FsubS,
    FmulS,
    FdivS,
    FeqS,
    FltS,
    FleS,
    Addi,
    Bra,
    Goto,
    Brn,
    Beq,
    Bne,
    Blt,
    Ble,
    Bgt,
    Bge,
    Bltu,
    Bleu,
    Bgtu,
    Bgeu,
    Qnop,
    Bs,
}

const KEYWORDS: [(&str, Keyword); 53] = [
    ("nop", Keyword::Nop),
    ("stop", Keyword::Stop),
    ("qwait", Keyword::Qwait),
    ("qwaitr", Keyword::Qwaitr),
    ("smis", Keyword::Smis),
    ("smit", Keyword::Smit),
    ("not", Keyword::Not),
    ("cmp", Keyword::Cmp),
    ("br", Keyword::Br),
    ("fbr", Keyword::Fbr),
    ("fmr", Keyword::Fmr),
    ("ldi", Keyword::Ldi),
    ("ldui", Keyword::Ldui),
    ("add", Keyword::Add),
    ("sub", Keyword::Sub),
    ("and", Keyword::And),
    ("or", Keyword::Or),
    ("xor", Keyword::Xor),
    ("mul", Keyword::Mul),
    ("div", Keyword::Div),
    ("rem", Keyword::Rem),
    ("lw", Keyword::Lw),
    ("lb", Keyword::Lb),
    ("lbu", Keyword::Lbu),
    ("sw", Keyword::Sw),
    ("sb", Keyword::Sb),
    ("fcvt.w.s", Keyword::FcvtWS),
    ("fcvt.s.w", Keyword::FcvtSW),
    ("flw", Keyword::Flw),
    ("fsw", Keyword::Fsw),
    ("fadd.s", Keyword::FaddS),
    ("fsub.s", Keyword::FsubS),
    ("fmul.s", Keyword::FmulS),
    ("fdiv.s", Keyword::FdivS),
    ("feq.s", Keyword::FeqS),
    ("flt.s", Keyword::FltS),
    ("fle.s", Keyword::FleS),
    ("addi", Keyword::Addi),
    ("bra", Keyword::Bra),
    ("goto", Keyword::Goto),
    ("brn", Keyword::Brn),
    ("beq", Keyword::Beq),
    ("bne", Keyword::Bne),
    ("blt", Keyword::Blt),
    ("ble", Keyword::Ble),
    ("bgt", Keyword::Bgt),
    ("bge", Keyword::Bge),
    ("bltu", Keyword::Bltu),
    ("bleu", Keyword::Bleu),
    ("bgtu", Keyword::Bgtu),
    ("bgeu", Keyword::Bgeu),
    ("qnop", Keyword::Qnop),
    ("bs", Keyword::Bs),
];

impl Keyword {
    pub fn from_word(word: &str) -> Option<Self> {
        KEYWORDS.iter().find(|(w, _)| *w == word).map(|&(_, k)| k)
    }

    pub fn as_str(self) -> &'static str {
        KEYWORDS
            .iter()
            .find(|&&(_, k)| k == self)
            .map_or("?", |&(w, _)| w)
    }
}

/// A lexical token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Decimal, `0x` hex or `0b` binary literal.
    Int(i64),
    /// `r<N>`
    RReg(usize),
    /// `s<N>`
    SReg(usize),
    /// `t<N>`
    TReg(usize),
    /// `q<N>`
    QReg(usize),
    /// `f<N>`
    FReg(usize),
    Keyword(Keyword),
    /// Condition flag name (`always`, `eq`, `ltu`, ...).
    Flag(CmpFlag),
    /// Label or quantum gate name.
    Ident(String),
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Bar,
    Newline,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Int(v) => write!(f, "{}", v),
            Token::RReg(n) => write!(f, "r{}", n),
            Token::SReg(n) => write!(f, "s{}", n),
            Token::TReg(n) => write!(f, "t{}", n),
            Token::QReg(n) => write!(f, "q{}", n),
            Token::FReg(n) => write!(f, "f{}", n),
            Token::Keyword(k) => f.write_str(k.as_str()),
            Token::Flag(flag) => f.write_str(flag.name()),
            Token::Ident(name) => f.write_str(name),
            Token::LParen => f.write_str("'('"),
            Token::RParen => f.write_str("')'"),
            Token::LBrace => f.write_str("'{'"),
            Token::RBrace => f.write_str("'}'"),
            Token::Comma => f.write_str("','"),
            Token::Colon => f.write_str("':'"),
            Token::Bar => f.write_str("'|'"),
            Token::Newline => f.write_str("end of line"),
        }
    }
}

/// A token with the 1-based line and column where it starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpannedToken {
    pub token: Token,
    pub line: usize,
    pub col: usize,
}

/// Raw token text before classification.
#[derive(Debug, Clone, Copy)]
enum Lexeme<'a> {
    Hex(&'a str),
    Bin(&'a str),
    Dec(&'a str),
    Word(&'a str),
    Punct(char),
    Newline,
}

fn blank(input: &str) -> IResult<&str, usize> {
    many0_count(alt((
        is_a(" \t\r"),
        recognize(pair(char('#'), take_till(|c| c == '\n'))),
    )))(input)
}

fn word(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(|c| c.is_ascii_lowercase() || c == '_'),
        take_while(|c: char| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '.'),
    ))(input)
}

fn lexeme(input: &str) -> IResult<&str, Lexeme<'_>> {
    alt((
        map(preceded(tag("0x"), hex_digit1), Lexeme::Hex),
        map(preceded(tag("0b"), is_a("01")), Lexeme::Bin),
        map(recognize(pair(opt(char('-')), digit1)), Lexeme::Dec),
        map(word, Lexeme::Word),
        map(one_of("(){},:|"), Lexeme::Punct),
        value(Lexeme::Newline, char('\n')),
    ))(input)
}

/// Splits `r12` style words into sigil and index.
fn register(word: &str) -> Option<(char, &str)> {
    let mut chars = word.chars();
    let sigil = chars.next().filter(|c| "rstqf".contains(*c))?;
    let digits = chars.as_str();
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        Some((sigil, digits))
    } else {
        None
    }
}

fn classify(lexeme: Lexeme<'_>, line: usize, col: usize) -> Result<Token, LexError> {
    let overflow = |text: &str| LexError::IntegerOverflow {
        text: text.to_string(),
        line,
        col,
    };
    let token = match lexeme {
        Lexeme::Hex(digits) => {
            Token::Int(i64::from_str_radix(digits, 16).map_err(|_| overflow(digits))?)
        }
        Lexeme::Bin(digits) => {
            Token::Int(i64::from_str_radix(digits, 2).map_err(|_| overflow(digits))?)
        }
        Lexeme::Dec(text) => Token::Int(text.parse().map_err(|_| overflow(text))?),
        Lexeme::Word(w) => {
            if let Some((sigil, digits)) = register(w) {
                let n: usize = digits.parse().map_err(|_| overflow(w))?;
                match sigil {
                    'r' => Token::RReg(n),
                    's' => Token::SReg(n),
                    't' => Token::TReg(n),
                    'q' => Token::QReg(n),
                    _ => Token::FReg(n),
                }
            } else if let Some(k) = Keyword::from_word(w) {
                Token::Keyword(k)
            } else if let Some(flag) = CmpFlag::from_name(w) {
                Token::Flag(flag)
            } else {
                Token::Ident(w.to_string())
            }
        }
        Lexeme::Punct('(') => Token::LParen,
        Lexeme::Punct(')') => Token::RParen,
        Lexeme::Punct('{') => Token::LBrace,
        Lexeme::Punct('}') => Token::RBrace,
        Lexeme::Punct(',') => Token::Comma,
        Lexeme::Punct(':') => Token::Colon,
        Lexeme::Punct(_) => Token::Bar,
        Lexeme::Newline => Token::Newline,
    };
    Ok(token)
}

/// Iterator over the tokens of one source text.
///
/// Yields `Err` at most once, after which it is exhausted. `restart`
/// rewinds to the beginning of the text.
#[derive(Debug, Clone)]
pub struct Lexer {
    src: String,
    pos: usize,
    line: usize,
    line_start: usize,
    done: bool,
}

impl Lexer {
    /// Creates a lexer over the lower-cased `source`.
    pub fn new(source: &str) -> Self {
        Self {
            src: source.to_lowercase(),
            pos: 0,
            line: 1,
            line_start: 0,
            done: false,
        }
    }

    pub fn restart(&mut self) {
        self.pos = 0;
        self.line = 1;
        self.line_start = 0;
        self.done = false;
    }

    /// Line of the next token, 1-based.
    pub fn line(&self) -> usize {
        self.line
    }
}

impl Iterator for Lexer {
    type Item = Result<SpannedToken, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let rest = &self.src[self.pos..];
        let rest = blank(rest).map_or(rest, |(after, _)| after);
        let start = self.src.len() - rest.len();
        if rest.is_empty() {
            self.pos = start;
            self.done = true;
            return None;
        }

        let (line, col) = (self.line, start - self.line_start + 1);
        let lexed = match lexeme(rest) {
            Ok((after, lx)) => classify(lx, line, col).map(|t| (t, rest.len() - after.len())),
            Err(_) => Err(LexError::IllegalCharacter {
                ch: rest.chars().next().unwrap_or('\0'),
                line,
                col,
            }),
        };

        match lexed {
            Ok((token, len)) => {
                log::debug!("lex {}:{}: {:?}", line, col, token);
                self.pos = start + len;
                if token == Token::Newline {
                    self.line += 1;
                    self.line_start = self.pos;
                }
                Some(Ok(SpannedToken { token, line, col }))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Lexes the whole of `source`, stopping at the first illegal character.
pub fn tokenize(source: &str) -> Result<Vec<SpannedToken>, LexError> {
    Lexer::new(source).collect()
}
