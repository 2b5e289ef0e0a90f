//! Recursive-descent parser for eQASM.
//!
//! A program is a sequence of lines. Each line holds any number of label
//! declarations (`name:`) followed by at most one statement. Statements
//! are classical instructions, pseudo-instructions that expand to one or
//! two classical instructions, or quantum bundles:
//!
//! ```text
//! [bs] N[,] op (| op)*        op := qnop | gate s<N> | gate t<N>
//! ```
//!
//! Labels attach to the first instruction emitted after them. Branch
//! targets are not resolved here; `Processor::upload_program` rejects
//! programs that branch to a missing label.

use crate::lexer::{Keyword, SpannedToken, Token, tokenize};
use crate::{LexError, SyntaxError};
use cactus_common::isa::{
    AluOp, CmpFlag, FcmpOp, FpuOp, Instruction, LoadOp, Operation, QuantumOp, StoreOp,
};
use std::collections::BTreeMap;

/// Result of parsing one source text.
#[derive(Debug, Clone, Default)]
pub struct ParseOutcome {
    /// Instructions in program order, labels attached.
    ///
    /// Only complete when `success()` holds; lines with errors are missing.
    pub instructions: Vec<Instruction>,

    /// Instruction index of every declared label.
    pub labels: BTreeMap<String, usize>,

    /// Syntax diagnostics in source order.
    pub errors: Vec<SyntaxError>,
}

impl ParseOutcome {
    /// True when no line produced a diagnostic. A failed parse must not be
    /// uploaded.
    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Parses eQASM source text.
///
/// # Arguments
///
/// * `source` - Program text, any letter case
///
/// # Returns
///
/// The instructions, label table and syntax diagnostics, or the lexical
/// error that aborted the parse.
pub fn parse(source: &str) -> Result<ParseOutcome, LexError> {
    let tokens = tokenize(source)?;
    let outcome = Parser::new(tokens).run();
    log::info!(
        "parsed {} instructions, {} labels, {} errors",
        outcome.instructions.len(),
        outcome.labels.len(),
        outcome.errors.len()
    );
    Ok(outcome)
}

type PResult<T> = Result<T, SyntaxError>;

/// Parser state for one invocation. Owns its accumulators.
struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
    instructions: Vec<Instruction>,
    labels: BTreeMap<String, usize>,
    /// Labels waiting for the next emitted instruction, with their lines.
    pending: Vec<(String, usize)>,
    errors: Vec<SyntaxError>,
}

impl Parser {
    fn new(tokens: Vec<SpannedToken>) -> Self {
        Self {
            tokens,
            pos: 0,
            instructions: Vec::new(),
            labels: BTreeMap::new(),
            pending: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn run(mut self) -> ParseOutcome {
        while self.pos < self.tokens.len() {
            if let Err(e) = self.line() {
                log::warn!("syntax error: {}", e);
                self.errors.push(e);
                self.skip_line();
            }
        }

        for (label, line) in std::mem::take(&mut self.pending) {
            let e = SyntaxError {
                line,
                found: String::from("end of input"),
                message: format!("label '{}' is not followed by an instruction", label),
            };
            log::warn!("syntax error: {}", e);
            self.errors.push(e);
        }

        ParseOutcome {
            instructions: self.instructions,
            labels: self.labels,
            errors: self.errors,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|t| &t.token)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|t| &t.token)
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn current_line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(1, |t| t.line)
    }

    fn unexpected(&self, expected: &str) -> SyntaxError {
        SyntaxError {
            line: self.current_line(),
            found: self
                .peek()
                .map_or_else(|| String::from("end of input"), |t| t.to_string()),
            message: format!("expected {}", expected),
        }
    }

    /// Consumes the next token if it equals `token`.
    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token, expected: &str) -> PResult<()> {
        if self.eat(&token) {
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn comma(&mut self) -> PResult<()> {
        self.expect(Token::Comma, "','")
    }

    /// Consumes the next token when `select` accepts it.
    fn take<T>(&mut self, expected: &str, select: impl Fn(&Token) -> Option<T>) -> PResult<T> {
        match self.peek().and_then(select) {
            Some(v) => {
                self.advance();
                Ok(v)
            }
            None => Err(self.unexpected(expected)),
        }
    }

    fn skip_line(&mut self) {
        while let Some(token) = self.peek() {
            let newline = *token == Token::Newline;
            self.advance();
            if newline {
                break;
            }
        }
    }

    /// Consumes a newline, or accepts end of input.
    fn eat_line_end(&mut self) -> bool {
        self.peek().is_none() || self.eat(&Token::Newline)
    }

    fn line(&mut self) -> PResult<()> {
        loop {
            let name = match (self.peek(), self.peek_at(1)) {
                (Some(Token::Ident(name)), Some(Token::Colon)) => name.clone(),
                _ => break,
            };
            self.declare_label(name)?;
            self.pos += 2;
        }

        if self.eat_line_end() {
            return Ok(());
        }

        let ops = self.statement()?;
        if !self.eat_line_end() {
            return Err(self.unexpected("end of line"));
        }
        self.emit(ops);
        Ok(())
    }

    fn declare_label(&mut self, name: String) -> PResult<()> {
        if self.labels.contains_key(&name) || self.pending.iter().any(|(l, _)| *l == name) {
            return Err(SyntaxError {
                line: self.current_line(),
                found: name.clone(),
                message: format!("label '{}' is already defined", name),
            });
        }
        log::debug!("found label: {}", name);
        self.pending.push((name, self.current_line()));
        Ok(())
    }

    fn emit(&mut self, ops: Vec<Operation>) {
        let index = self.instructions.len();
        let mut labels: Vec<String> = Vec::with_capacity(self.pending.len());
        for (label, _) in self.pending.drain(..) {
            self.labels.insert(label.clone(), index);
            labels.push(label);
        }

        for op in ops {
            let insn = Instruction {
                labels: std::mem::take(&mut labels),
                op,
            };
            log::debug!("insn added: {}", insn);
            self.instructions.push(insn);
        }
    }

    fn statement(&mut self) -> PResult<Vec<Operation>> {
        match self.peek() {
            Some(Token::Keyword(Keyword::Bs | Keyword::Qnop))
            | Some(Token::Int(_))
            | Some(Token::Ident(_)) => Ok(vec![self.bundle()?]),
            Some(&Token::Keyword(kw)) => {
                self.advance();
                self.classical(kw)
            }
            _ => Err(self.unexpected("an instruction")),
        }
    }

    fn classical(&mut self, kw: Keyword) -> PResult<Vec<Operation>> {
        let op = match kw {
            Keyword::Nop => Operation::Nop,
            Keyword::Stop => Operation::Stop,
            Keyword::Qwait => Operation::Qwait {
                imm: self.immediate(0, u32::MAX as i64, "qwait")? as u32,
            },
            Keyword::Qwaitr => Operation::Qwaitr { rs: self.rreg()? },
            Keyword::Smis => {
                let si = self.sreg()?;
                self.comma()?;
                Operation::Smis {
                    si,
                    qubits: self.qubit_mask()?,
                }
            }
            Keyword::Smit => {
                let ti = self.treg()?;
                self.comma()?;
                Operation::Smit {
                    ti,
                    pairs: self.pair_mask()?,
                }
            }
            Keyword::Not => {
                let rd = self.rreg()?;
                self.comma()?;
                Operation::Not {
                    rd,
                    rt: self.rreg()?,
                }
            }
            Keyword::Cmp => {
                let rs = self.rreg()?;
                self.comma()?;
                Operation::Cmp {
                    rs,
                    rt: self.rreg()?,
                }
            }
            Keyword::Br => {
                let flag = self.flag()?;
                self.comma()?;
                Operation::Br {
                    flag,
                    target: self.label_ref()?,
                }
            }
            Keyword::Fbr => {
                let flag = self.flag()?;
                self.comma()?;
                Operation::Fbr {
                    flag,
                    rd: self.rreg()?,
                }
            }
            Keyword::Fmr => {
                let rd = self.rreg()?;
                self.comma()?;
                Operation::Fmr {
                    rd,
                    qs: self.qreg()?,
                }
            }
            Keyword::Ldi => {
                let rd = self.rreg()?;
                self.comma()?;
                Operation::Ldi {
                    rd,
                    imm: self.word_immediate()?,
                }
            }
            Keyword::Ldui => {
                let rd = self.rreg()?;
                self.comma()?;
                let rs = if let Some(&Token::RReg(rs)) = self.peek() {
                    self.advance();
                    self.comma()?;
                    rs
                } else {
                    rd
                };
                let imm = self.immediate(0, (1 << 15) - 1, "ldui")? as u32;
                Operation::Ldui { rd, rs, imm }
            }
            Keyword::Add => self.alu(AluOp::Add)?,
            Keyword::Sub => self.alu(AluOp::Sub)?,
            Keyword::And => self.alu(AluOp::And)?,
            Keyword::Or => self.alu(AluOp::Or)?,
            Keyword::Xor => self.alu(AluOp::Xor)?,
            Keyword::Mul => self.alu(AluOp::Mul)?,
            Keyword::Div => self.alu(AluOp::Div)?,
            Keyword::Rem => self.alu(AluOp::Rem)?,
            Keyword::Lw => self.load(LoadOp::Lw)?,
            Keyword::Lb => self.load(LoadOp::Lb)?,
            Keyword::Lbu => self.load(LoadOp::Lbu)?,
            Keyword::Sw => self.store(StoreOp::Sw)?,
            Keyword::Sb => self.store(StoreOp::Sb)?,
            Keyword::FcvtWS => {
                let rd = self.rreg()?;
                self.comma()?;
                Operation::FcvtWS {
                    rd,
                    fs: self.freg()?,
                }
            }
            Keyword::FcvtSW => {
                let fd = self.freg()?;
                self.comma()?;
                Operation::FcvtSW {
                    fd,
                    rs: self.rreg()?,
                }
            }
            Keyword::Flw => {
                let fd = self.freg()?;
                self.comma()?;
                let (offset, rt) = self.address()?;
                Operation::Flw { fd, rt, offset }
            }
            Keyword::Fsw => {
                let fs = self.freg()?;
                self.comma()?;
                let (offset, rt) = self.address()?;
                Operation::Fsw { fs, rt, offset }
            }
            Keyword::FaddS => self.fpu(FpuOp::Add)?,
            Keyword::FsubS => self.fpu(FpuOp::Sub)?,
            Keyword::FmulS => self.fpu(FpuOp::Mul)?,
            Keyword::FdivS => self.fpu(FpuOp::Div)?,
            Keyword::FeqS => self.fcmp(FcmpOp::Eq)?,
            Keyword::FltS => self.fcmp(FcmpOp::Lt)?,
            Keyword::FleS => self.fcmp(FcmpOp::Le)?,

            // pseudo-instructions
            Keyword::Addi => {
                let rd = self.rreg()?;
                self.comma()?;
                let rs = self.rreg()?;
                self.comma()?;
                let imm = self.word_immediate()?;
                return Ok(vec![
                    Operation::Ldi { rd, imm },
                    Operation::Alu {
                        op: AluOp::Add,
                        rd,
                        rs,
                        rt: rd,
                    },
                ]);
            }
            Keyword::Bra | Keyword::Goto => Operation::Br {
                flag: CmpFlag::Always,
                target: self.label_ref()?,
            },
            Keyword::Brn => Operation::Br {
                flag: CmpFlag::Never,
                target: self.label_ref()?,
            },
            Keyword::Beq => return self.compare_and_branch(CmpFlag::Eq),
            Keyword::Bne => return self.compare_and_branch(CmpFlag::Ne),
            Keyword::Blt => return self.compare_and_branch(CmpFlag::Lt),
            Keyword::Ble => return self.compare_and_branch(CmpFlag::Le),
            Keyword::Bgt => return self.compare_and_branch(CmpFlag::Gt),
            Keyword::Bge => return self.compare_and_branch(CmpFlag::Ge),
            Keyword::Bltu => return self.compare_and_branch(CmpFlag::Ltu),
            Keyword::Bleu => return self.compare_and_branch(CmpFlag::Leu),
            Keyword::Bgtu => return self.compare_and_branch(CmpFlag::Gtu),
            Keyword::Bgeu => return self.compare_and_branch(CmpFlag::Geu),

            Keyword::Qnop | Keyword::Bs => {
                self.pos -= 1;
                return Err(self.unexpected("a classical instruction"));
            }
        };
        Ok(vec![op])
    }

    fn compare_and_branch(&mut self, flag: CmpFlag) -> PResult<Vec<Operation>> {
        let rs = self.rreg()?;
        self.comma()?;
        let rt = self.rreg()?;
        self.comma()?;
        let target = self.label_ref()?;
        Ok(vec![Operation::Cmp { rs, rt }, Operation::Br { flag, target }])
    }

    fn alu(&mut self, op: AluOp) -> PResult<Operation> {
        let (rd, rs, rt) = self.three(Self::rreg, Self::rreg)?;
        Ok(Operation::Alu { op, rd, rs, rt })
    }

    fn fpu(&mut self, op: FpuOp) -> PResult<Operation> {
        let (fd, fs, ft) = self.three(Self::freg, Self::freg)?;
        Ok(Operation::Fpu { op, fd, fs, ft })
    }

    fn fcmp(&mut self, op: FcmpOp) -> PResult<Operation> {
        let (rd, fs, ft) = self.three(Self::rreg, Self::freg)?;
        Ok(Operation::Fcmp { op, rd, fs, ft })
    }

    /// `dst, src, src` operand list.
    fn three(
        &mut self,
        dst: fn(&mut Self) -> PResult<usize>,
        src: fn(&mut Self) -> PResult<usize>,
    ) -> PResult<(usize, usize, usize)> {
        let d = dst(self)?;
        self.comma()?;
        let a = src(self)?;
        self.comma()?;
        let b = src(self)?;
        Ok((d, a, b))
    }

    fn load(&mut self, op: LoadOp) -> PResult<Operation> {
        let rd = self.rreg()?;
        self.comma()?;
        let (offset, rt) = self.address()?;
        Ok(Operation::Load { op, rd, rt, offset })
    }

    fn store(&mut self, op: StoreOp) -> PResult<Operation> {
        let rs = self.rreg()?;
        self.comma()?;
        let (offset, rt) = self.address()?;
        Ok(Operation::Store { op, rs, rt, offset })
    }

    /// `imm(rt)`, or the legacy `rt(imm)` spelling.
    fn address(&mut self) -> PResult<(i32, usize)> {
        if let Some(&Token::RReg(rt)) = self.peek() {
            self.advance();
            self.expect(Token::LParen, "'('")?;
            let offset = self.offset()?;
            self.expect(Token::RParen, "')'")?;
            return Ok((offset, rt));
        }
        let offset = self.offset()?;
        self.expect(Token::LParen, "'('")?;
        let rt = self.rreg()?;
        self.expect(Token::RParen, "')'")?;
        Ok((offset, rt))
    }

    fn offset(&mut self) -> PResult<i32> {
        Ok(self.immediate(i32::MIN as i64, i32::MAX as i64, "offset")? as i32)
    }

    /// 32-bit immediate: signed, or an unsigned bit pattern up to `2^32 - 1`.
    fn word_immediate(&mut self) -> PResult<i32> {
        Ok(self.immediate(i32::MIN as i64, u32::MAX as i64, "32-bit immediate")? as i32)
    }

    fn immediate(&mut self, min: i64, max: i64, what: &str) -> PResult<i64> {
        let line = self.current_line();
        let v = self.take("an integer", |t| match t {
            Token::Int(v) => Some(*v),
            _ => None,
        })?;
        if v < min || v > max {
            return Err(SyntaxError {
                line,
                found: v.to_string(),
                message: format!("{} must lie in [{}, {}]", what, min, max),
            });
        }
        Ok(v)
    }

    fn index(&mut self, what: &str) -> PResult<usize> {
        Ok(self.immediate(0, i64::MAX, what)? as usize)
    }

    fn rreg(&mut self) -> PResult<usize> {
        self.take("a general purpose register", |t| match t {
            Token::RReg(n) => Some(*n),
            _ => None,
        })
    }

    fn freg(&mut self) -> PResult<usize> {
        self.take("a floating point register", |t| match t {
            Token::FReg(n) => Some(*n),
            _ => None,
        })
    }

    fn sreg(&mut self) -> PResult<usize> {
        self.take("a single-qubit target register", |t| match t {
            Token::SReg(n) => Some(*n),
            _ => None,
        })
    }

    fn treg(&mut self) -> PResult<usize> {
        self.take("a two-qubit target register", |t| match t {
            Token::TReg(n) => Some(*n),
            _ => None,
        })
    }

    fn qreg(&mut self) -> PResult<usize> {
        self.take("a qubit", |t| match t {
            Token::QReg(n) => Some(*n),
            _ => None,
        })
    }

    fn flag(&mut self) -> PResult<CmpFlag> {
        self.take("a condition flag", |t| match t {
            Token::Flag(f) => Some(*f),
            _ => None,
        })
    }

    fn label_ref(&mut self) -> PResult<String> {
        self.take("a label", |t| match t {
            Token::Ident(name) => Some(name.clone()),
            _ => None,
        })
    }

    /// `{q, q, ...}`
    fn qubit_mask(&mut self) -> PResult<Vec<usize>> {
        self.expect(Token::LBrace, "'{'")?;
        let mut qubits = vec![self.index("qubit")?];
        while self.eat(&Token::Comma) {
            qubits.push(self.index("qubit")?);
        }
        self.expect(Token::RBrace, "'}'")?;
        Ok(qubits)
    }

    /// `{(a, b), (c, d), ...}`
    fn pair_mask(&mut self) -> PResult<Vec<(usize, usize)>> {
        self.expect(Token::LBrace, "'{'")?;
        let mut pairs = vec![self.qubit_pair()?];
        while self.eat(&Token::Comma) {
            pairs.push(self.qubit_pair()?);
        }
        self.expect(Token::RBrace, "'}'")?;
        Ok(pairs)
    }

    fn qubit_pair(&mut self) -> PResult<(usize, usize)> {
        self.expect(Token::LParen, "'('")?;
        let a = self.index("qubit")?;
        self.comma()?;
        let b = self.index("qubit")?;
        self.expect(Token::RParen, "')'")?;
        Ok((a, b))
    }

    fn bundle(&mut self) -> PResult<Operation> {
        let mut pi = 1;
        let prefixed = self.eat(&Token::Keyword(Keyword::Bs));
        if prefixed || matches!(self.peek(), Some(Token::Int(_))) {
            pi = self.immediate(0, u32::MAX as i64, "bundle parallelism")? as u32;
            self.eat(&Token::Comma);
        }

        let mut ops = vec![self.micro_op()?];
        while self.eat(&Token::Bar) {
            ops.push(self.micro_op()?);
        }
        Ok(Operation::Bundle { pi, ops })
    }

    fn micro_op(&mut self) -> PResult<QuantumOp> {
        if self.eat(&Token::Keyword(Keyword::Qnop)) {
            return Ok(QuantumOp::qnop());
        }
        let gate = self.take("a quantum operation", |t| match t {
            Token::Ident(name) => Some(name.clone()),
            _ => None,
        })?;
        match self.peek() {
            Some(&Token::SReg(si)) => {
                self.advance();
                Ok(QuantumOp::single(gate, si))
            }
            Some(&Token::TReg(ti)) => {
                self.advance();
                Ok(QuantumOp::pair(gate, ti))
            }
            _ => Err(self.unexpected("a target register")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cactus_common::isa::QubitTarget;

    fn ops(src: &str) -> Vec<Operation> {
        let outcome = parse(src).unwrap();
        assert!(outcome.success(), "{:?}", outcome.errors);
        outcome.instructions.into_iter().map(|i| i.op).collect()
    }

    #[test]
    fn classical_forms() {
        assert_eq!(
            ops("ldi r1, -5\nldui r2, r1, 0x7f88\nldui r3, 3\nadd r4, r1, r2\nnot r5, r4\ncmp r1, r2\n"),
            vec![
                Operation::Ldi { rd: 1, imm: -5 },
                Operation::Ldui { rd: 2, rs: 1, imm: 0x7f88 },
                Operation::Ldui { rd: 3, rs: 3, imm: 3 },
                Operation::Alu { op: AluOp::Add, rd: 4, rs: 1, rt: 2 },
                Operation::Not { rd: 5, rt: 4 },
                Operation::Cmp { rs: 1, rt: 2 },
            ]
        );
    }

    #[test]
    fn memory_operands() {
        assert_eq!(
            ops("lw r1, 8(r2)\nlbu r3, r2(-1)\nsb r4, 0x10(r0)\nflw f1, 4(r2)\nfsw f2, -4(r3)"),
            vec![
                Operation::Load { op: LoadOp::Lw, rd: 1, rt: 2, offset: 8 },
                Operation::Load { op: LoadOp::Lbu, rd: 3, rt: 2, offset: -1 },
                Operation::Store { op: StoreOp::Sb, rs: 4, rt: 0, offset: 16 },
                Operation::Flw { fd: 1, rt: 2, offset: 4 },
                Operation::Fsw { fs: 2, rt: 3, offset: -4 },
            ]
        );
    }

    #[test]
    fn float_forms() {
        assert_eq!(
            ops("fcvt.s.w f1, r2\nFADD.S f3, f1, f2\nfle.s r4, f1, f3\nfcvt.w.s r5, f3"),
            vec![
                Operation::FcvtSW { fd: 1, rs: 2 },
                Operation::Fpu { op: FpuOp::Add, fd: 3, fs: 1, ft: 2 },
                Operation::Fcmp { op: FcmpOp::Le, rd: 4, fs: 1, ft: 3 },
                Operation::FcvtWS { rd: 5, fs: 3 },
            ]
        );
    }

    #[test]
    fn ldi_accepts_unsigned_bit_patterns() {
        assert_eq!(ops("ldi r1, 0xffffffff"), vec![Operation::Ldi { rd: 1, imm: -1 }]);

        let outcome = parse("ldi r1, 0x100000000\nldui r1, 0x8000\nqwait -1\n").unwrap();
        assert_eq!(outcome.errors.len(), 3);
        assert!(outcome.instructions.is_empty());
    }

    #[test]
    fn masks() {
        assert_eq!(
            ops("smis s2, {0, 1, 6}\nsmit t7, {(0, 1), (2, 3)}"),
            vec![
                Operation::Smis { si: 2, qubits: vec![0, 1, 6] },
                Operation::Smit { ti: 7, pairs: vec![(0, 1), (2, 3)] },
            ]
        );
    }

    #[test]
    fn bundle_prefixes() {
        for src in ["bs 2, h s0 | cz t1", "bs 2 h s0 | cz t1", "2, h s0|cz t1", "2 h s0 | cz t1"] {
            assert_eq!(
                ops(src),
                vec![Operation::Bundle {
                    pi: 2,
                    ops: vec![QuantumOp::single("h", 0), QuantumOp::pair("cz", 1)],
                }],
                "{}",
                src
            );
        }

        let bundle = ops("measure s3 | qnop");
        assert_eq!(
            bundle,
            vec![Operation::Bundle {
                pi: 1,
                ops: vec![QuantumOp::single("measure", 3), QuantumOp::qnop()],
            }]
        );
        if let Operation::Bundle { ops, .. } = &bundle[0] {
            assert_eq!(ops[1].target, QubitTarget::None);
        }
    }

    #[test]
    fn pseudo_instructions_expand() {
        let outcome = parse("top: addi r1, r2, 7\nblt r1, r3, top\nbra top\ngoto top\nbrn top").unwrap();
        assert!(outcome.success());
        let insns = outcome.instructions;
        assert_eq!(insns.len(), 7);
        assert_eq!(insns[0].labels, vec!["top".to_string()]);
        assert_eq!(insns[0].op, Operation::Ldi { rd: 1, imm: 7 });
        assert_eq!(
            insns[1],
            Instruction::new(Operation::Alu { op: AluOp::Add, rd: 1, rs: 2, rt: 1 })
        );
        assert_eq!(insns[2].op, Operation::Cmp { rs: 1, rt: 3 });
        assert_eq!(
            insns[3].op,
            Operation::Br { flag: CmpFlag::Lt, target: "top".into() }
        );
        assert_eq!(
            insns[4].op,
            Operation::Br { flag: CmpFlag::Always, target: "top".into() }
        );
        assert_eq!(insns[5].op, insns[4].op);
        assert_eq!(
            insns[6].op,
            Operation::Br { flag: CmpFlag::Never, target: "top".into() }
        );
    }

    #[test]
    fn labels_attach_to_next_instruction() {
        let outcome = parse("start:\n\n  # comment\nfirst: second: nop\nstop\nend: stop").unwrap();
        assert!(outcome.success());
        assert_eq!(outcome.labels.get("start"), Some(&0));
        assert_eq!(outcome.labels.get("first"), Some(&0));
        assert_eq!(outcome.labels.get("second"), Some(&0));
        assert_eq!(outcome.labels.get("end"), Some(&2));
        assert_eq!(outcome.instructions[0].labels, vec!["start", "first", "second"]);
        assert!(outcome.instructions[1].labels.is_empty());
    }

    #[test]
    fn duplicate_and_dangling_labels_are_diagnosed() {
        let outcome = parse("a: nop\na: stop\nb:").unwrap();
        assert!(!outcome.success());
        assert_eq!(outcome.errors.len(), 2);
        assert_eq!(outcome.errors[0].line, 2);
        assert!(outcome.errors[0].message.contains("already defined"));
        assert_eq!(outcome.errors[1].line, 3);
        assert_eq!(outcome.labels.get("a"), Some(&0));
    }

    #[test]
    fn recovery_continues_after_a_bad_line() {
        let outcome = parse("ldi r1, 1\nadd r2, r1\nldi r3, 3\nfoo bar baz\nstop").unwrap();
        assert!(!outcome.success());
        assert_eq!(outcome.errors.len(), 2);
        assert_eq!(outcome.errors[0].line, 2);
        assert_eq!(outcome.errors[0].found, "end of line");
        assert_eq!(outcome.errors[1].line, 4);
        assert_eq!(
            outcome.instructions.iter().map(|i| &i.op).collect::<Vec<_>>(),
            vec![
                &Operation::Ldi { rd: 1, imm: 1 },
                &Operation::Ldi { rd: 3, imm: 3 },
                &Operation::Stop
            ]
        );
    }

    #[test]
    fn trailing_newline_is_optional() {
        assert_eq!(ops("nop\nstop"), ops("nop\nstop\n"));
    }

    #[test]
    fn lex_errors_abort() {
        assert!(matches!(
            parse("nop\nldi r1, 1 ; comment"),
            Err(LexError::IllegalCharacter { ch: ';', line: 2, .. })
        ));
    }

    #[test]
    fn listing_parses_back_to_the_same_program() {
        let src = "\
            smis s0, {0, 2}
            smit t1, {(0, 1)}
            loop: ldi r1, 0xff115577
            ldui r2, r1, 3
            lw r3, -4(r1)
            sb r3, 2(r0)
            fcvt.s.w f1, r3
            fdiv.s f2, f1, f1
            feq.s r4, f1, f2
            fbr geu, r5
            fmr r6, q3
            qwait 10
            qwaitr r6
            bs 3, x s0 | cz t1 | qnop
            br ltu, loop
            stop
        ";
        let first = parse(src).unwrap();
        assert!(first.success());
        let listing: String = first
            .instructions
            .iter()
            .map(|i| format!("{}\n", i))
            .collect();
        let second = parse(&listing).unwrap();
        assert!(second.success(), "{:?}", second.errors);
        assert_eq!(first.instructions, second.instructions);
        assert_eq!(first.labels, second.labels);
    }
}
