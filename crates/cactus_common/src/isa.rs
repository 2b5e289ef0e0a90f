use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

/// Condition flags recomputed by `CMP` and consulted by `BR` and `FBR`.
///
/// The discriminants give the position of each flag inside the flag vector.
/// `Always` and `Never` are ordinary entries of that vector: they are never
/// rewritten by a comparison and keep their reset values of true and false.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmpFlag {
    Always = 0,
    Never = 1,
    Eq = 2,
    Ne = 3,
    Ltu = 4,
    Geu = 5,
    Leu = 6,
    Gtu = 7,
    Lt = 8,
    Ge = 9,
    Le = 10,
    Gt = 11,
}

impl CmpFlag {
    /// Number of flags in the condition-flag vector.
    pub const COUNT: usize = 12;

    /// All flags, ordered by their position in the flag vector.
    pub const ALL: [CmpFlag; Self::COUNT] = [
        CmpFlag::Always,
        CmpFlag::Never,
        CmpFlag::Eq,
        CmpFlag::Ne,
        CmpFlag::Ltu,
        CmpFlag::Geu,
        CmpFlag::Leu,
        CmpFlag::Gtu,
        CmpFlag::Lt,
        CmpFlag::Ge,
        CmpFlag::Le,
        CmpFlag::Gt,
    ];

    #[inline(always)]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Assembly spelling of the flag.
    pub fn name(self) -> &'static str {
        match self {
            CmpFlag::Always => "always",
            CmpFlag::Never => "never",
            CmpFlag::Eq => "eq",
            CmpFlag::Ne => "ne",
            CmpFlag::Ltu => "ltu",
            CmpFlag::Geu => "geu",
            CmpFlag::Leu => "leu",
            CmpFlag::Gtu => "gtu",
            CmpFlag::Lt => "lt",
            CmpFlag::Ge => "ge",
            CmpFlag::Le => "le",
            CmpFlag::Gt => "gt",
        }
    }

    /// Looks a flag up by its lower-case assembly spelling.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.name() == name)
    }
}

impl fmt::Display for CmpFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Three-register integer operations (`rd <- rs op rt`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOp {
    Add,
    Sub,
    And,
    Or,
    Xor,
    Mul,
    Div,
    Rem,
}

impl AluOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            AluOp::Add => "ADD",
            AluOp::Sub => "SUB",
            AluOp::And => "AND",
            AluOp::Or => "OR",
            AluOp::Xor => "XOR",
            AluOp::Mul => "MUL",
            AluOp::Div => "DIV",
            AluOp::Rem => "REM",
        }
    }
}

/// Integer loads from data memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOp {
    /// Load a little-endian word.
    Lw,
    /// Load a byte and sign-extend it.
    Lb,
    /// Load a byte and zero-extend it.
    Lbu,
}

impl LoadOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            LoadOp::Lw => "LW",
            LoadOp::Lb => "LB",
            LoadOp::Lbu => "LBU",
        }
    }
}

/// Integer stores to data memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    /// Store the full register as a little-endian word.
    Sw,
    /// Store the low byte of the register.
    Sb,
}

impl StoreOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            StoreOp::Sw => "SW",
            StoreOp::Sb => "SB",
        }
    }
}

/// Single-precision arithmetic (`fd <- fs op ft`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FpuOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl FpuOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            FpuOp::Add => "FADD.S",
            FpuOp::Sub => "FSUB.S",
            FpuOp::Mul => "FMUL.S",
            FpuOp::Div => "FDIV.S",
        }
    }
}

/// Single-precision comparisons writing 0/1 into a GPR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FcmpOp {
    Eq,
    Lt,
    Le,
}

impl FcmpOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            FcmpOp::Eq => "FEQ.S",
            FcmpOp::Lt => "FLT.S",
            FcmpOp::Le => "FLE.S",
        }
    }
}

/// Target register referenced by a quantum micro-operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QubitTarget {
    /// `QNOP` addresses no qubit.
    None,
    /// Single-qubit target register `s<N>`.
    Single(usize),
    /// Two-qubit target register `t<N>`.
    Pair(usize),
}

/// One micro-operation inside a quantum bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantumOp {
    /// Gate name as written in the source (lower case), or `qnop`.
    pub name: String,
    pub target: QubitTarget,
}

impl QuantumOp {
    pub fn qnop() -> Self {
        Self {
            name: String::from("qnop"),
            target: QubitTarget::None,
        }
    }

    pub fn single(name: impl Into<String>, si: usize) -> Self {
        Self {
            name: name.into(),
            target: QubitTarget::Single(si),
        }
    }

    pub fn pair(name: impl Into<String>, ti: usize) -> Self {
        Self {
            name: name.into(),
            target: QubitTarget::Pair(ti),
        }
    }

    /// True for the gate names that request a measurement.
    pub fn is_measurement(&self) -> bool {
        matches!(self.name.as_str(), "measure" | "measz")
    }
}

impl fmt::Display for QuantumOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.target {
            QubitTarget::None => f.write_str("QNOP"),
            QubitTarget::Single(si) => write!(f, "{} s{}", self.name, si),
            QubitTarget::Pair(ti) => write!(f, "{} t{}", self.name, ti),
        }
    }
}

/// Operation performed by one instruction, with exactly the operands it needs.
///
/// Register operands are plain indices into the relevant register file;
/// range checks happen when the processor executes the instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Nop,
    Stop,
    /// Timing only; architecturally a no-op.
    Qwait { imm: u32 },
    /// Timing only; architecturally a no-op.
    Qwaitr { rs: usize },
    Smis { si: usize, qubits: Vec<usize> },
    Smit { ti: usize, pairs: Vec<(usize, usize)> },
    Not { rd: usize, rt: usize },
    Cmp { rs: usize, rt: usize },
    Br { flag: CmpFlag, target: String },
    Fbr { flag: CmpFlag, rd: usize },
    Fmr { rd: usize, qs: usize },
    Ldi { rd: usize, imm: i32 },
    /// `rd <- imm[14:0] : rs[16:0]`.
    Ldui { rd: usize, rs: usize, imm: u32 },
    Alu { op: AluOp, rd: usize, rs: usize, rt: usize },
    Load { op: LoadOp, rd: usize, rt: usize, offset: i32 },
    Store { op: StoreOp, rs: usize, rt: usize, offset: i32 },
    /// `rd <- (i32) fs`.
    FcvtWS { rd: usize, fs: usize },
    /// `fd <- (f32) rs`.
    FcvtSW { fd: usize, rs: usize },
    Flw { fd: usize, rt: usize, offset: i32 },
    Fsw { fs: usize, rt: usize, offset: i32 },
    Fpu { op: FpuOp, fd: usize, fs: usize, ft: usize },
    Fcmp { op: FcmpOp, rd: usize, fs: usize, ft: usize },
    /// A quantum bundle: micro-operations issued in the same cycle.
    Bundle { pi: u32, ops: Vec<QuantumOp> },
}

/// An assembled instruction together with the labels that name it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub labels: Vec<String>,
    pub op: Operation,
}

impl Instruction {
    pub fn new(op: Operation) -> Self {
        Self {
            labels: Vec::new(),
            op,
        }
    }

    pub fn labelled(label: impl Into<String>, op: Operation) -> Self {
        let mut labels = Vec::with_capacity(1);
        labels.push(label.into());
        Self { labels, op }
    }

    /// Label this instruction branches to, if it is a `BR`.
    pub fn branch_target(&self) -> Option<&str> {
        match &self.op {
            Operation::Br { target, .. } => Some(target.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Nop => f.write_str("NOP"),
            Operation::Stop => f.write_str("STOP"),
            Operation::Qwait { imm } => write!(f, "QWAIT {}", imm),
            Operation::Qwaitr { rs } => write!(f, "QWAITR r{}", rs),
            Operation::Smis { si, qubits } => {
                write!(f, "SMIS s{}, {{", si)?;
                for (i, q) in qubits.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", q)?;
                }
                f.write_str("}")
            }
            Operation::Smit { ti, pairs } => {
                write!(f, "SMIT t{}, {{", ti)?;
                for (i, (a, b)) in pairs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "({}, {})", a, b)?;
                }
                f.write_str("}")
            }
            Operation::Not { rd, rt } => write!(f, "NOT r{}, r{}", rd, rt),
            Operation::Cmp { rs, rt } => write!(f, "CMP r{}, r{}", rs, rt),
            Operation::Br { flag, target } => write!(f, "BR {}, {}", flag, target),
            Operation::Fbr { flag, rd } => write!(f, "FBR {}, r{}", flag, rd),
            Operation::Fmr { rd, qs } => write!(f, "FMR r{}, q{}", rd, qs),
            Operation::Ldi { rd, imm } => write!(f, "LDI r{}, {}", rd, imm),
            Operation::Ldui { rd, rs, imm } => write!(f, "LDUI r{}, r{}, {}", rd, rs, imm),
            Operation::Alu { op, rd, rs, rt } => {
                write!(f, "{} r{}, r{}, r{}", op.mnemonic(), rd, rs, rt)
            }
            Operation::Load { op, rd, rt, offset } => {
                write!(f, "{} r{}, {}(r{})", op.mnemonic(), rd, offset, rt)
            }
            Operation::Store { op, rs, rt, offset } => {
                write!(f, "{} r{}, {}(r{})", op.mnemonic(), rs, offset, rt)
            }
            Operation::FcvtWS { rd, fs } => write!(f, "FCVT.W.S r{}, f{}", rd, fs),
            Operation::FcvtSW { fd, rs } => write!(f, "FCVT.S.W f{}, r{}", fd, rs),
            Operation::Flw { fd, rt, offset } => write!(f, "FLW f{}, {}(r{})", fd, offset, rt),
            Operation::Fsw { fs, rt, offset } => write!(f, "FSW f{}, {}(r{})", fs, offset, rt),
            Operation::Fpu { op, fd, fs, ft } => {
                write!(f, "{} f{}, f{}, f{}", op.mnemonic(), fd, fs, ft)
            }
            Operation::Fcmp { op, rd, fs, ft } => {
                write!(f, "{} r{}, f{}, f{}", op.mnemonic(), rd, fs, ft)
            }
            Operation::Bundle { pi, ops } => {
                write!(f, "BS {}, ", pi)?;
                for (i, op) in ops.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" | ")?;
                    }
                    write!(f, "{}", op)?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for label in &self.labels {
            write!(f, "{}: ", label)?;
        }
        write!(f, "{}", self.op)
    }
}
