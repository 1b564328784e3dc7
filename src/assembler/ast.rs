//! This AST describes a parsed ICWS '94 Redcode file (no preprocessor, no macros).
//!
//! A program is an ordered list of instructions. Load order is source order,
//! so the first instruction lands at relative address zero.
//! Comments are prefixed with semicolons (;) and are single-line only.
//! Instructions are delimited by newlines.
//!
//! Example source file:
//!
//! ```text
//! ;redcode
//! ;name     Dwarf
//!         ORG     start
//! step    EQU     4
//! target  DAT.F   #0,     #0
//! start   ADD.AB  #step,  target
//!         MOV.AB  #0,     @target
//!         JMP.A   start
//!         END
//! ```
//!
//! Expressions are kept as trees. Labels are only bound to addresses once the
//! whole program is loaded, so nothing here evaluates them.

use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

use serde::{Serialize, Serializer};

/// The closed vocabularies serialize as their source spelling.
macro_rules! serialize_as_display {
    ($($ty:ty),*) => {$(
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
                s.collect_str(self)
            }
        }
    )*};
}

serialize_as_display!(Opcode, Modifier, AddressingMode, Operator);

/// The seventeen ICWS '94 mnemonics.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Opcode {
    DAT,
    MOV,
    ADD,
    SUB,
    MUL,
    DIV,
    MOD,
    JMP,
    JMZ,
    JMN,
    DJN,
    CMP,
    SLT,
    SPL,
    ORG,
    EQU,
    END,
}

impl Opcode {
    pub const ALL: [Opcode; 17] = [
        Opcode::DAT, Opcode::MOV, Opcode::ADD, Opcode::SUB, Opcode::MUL,
        Opcode::DIV, Opcode::MOD, Opcode::JMP, Opcode::JMZ, Opcode::JMN,
        Opcode::DJN, Opcode::CMP, Opcode::SLT, Opcode::SPL, Opcode::ORG,
        Opcode::EQU, Opcode::END,
    ];

    pub fn as_str(&self) -> &'static str {
        use Opcode::*;
        match self {
            DAT => "DAT",
            MOV => "MOV",
            ADD => "ADD",
            SUB => "SUB",
            MUL => "MUL",
            DIV => "DIV",
            MOD => "MOD",
            JMP => "JMP",
            JMZ => "JMZ",
            JMN => "JMN",
            DJN => "DJN",
            CMP => "CMP",
            SLT => "SLT",
            SPL => "SPL",
            ORG => "ORG",
            EQU => "EQU",
            END => "END",
        }
    }

    /// Pseudo-opcodes steer the assembler and never occupy a core cell.
    pub fn is_pseudo(&self) -> bool {
        matches!(self, Opcode::ORG | Opcode::EQU | Opcode::END)
    }

    /// Minimum and maximum number of operands the opcode accepts.
    pub fn arity(&self) -> (usize, usize) {
        use Opcode::*;
        match self {
            DAT | JMP | SPL => (1, 2),
            MOV | ADD | SUB | MUL | DIV | MOD |
            JMZ | JMN | DJN | CMP | SLT => (2, 2),
            ORG | EQU => (1, 1),
            END => (0, 1),
        }
    }

    /// Resolves the modifier of an instruction written without one.
    ///
    /// Only the addressing modes matter, never the operand values. A missing
    /// mode is direct addressing. Pseudo-opcodes have no modifier at all.
    pub fn default_modifier(
        &self,
        a_mode: Option<AddressingMode>,
        b_mode: Option<AddressingMode>,
    ) -> Option<Modifier> {
        use Opcode::*;
        let a_immediate = a_mode == Some(AddressingMode::Immediate);
        let b_immediate = b_mode == Some(AddressingMode::Immediate);

        match self {
            DAT => Some(Modifier::F),
            MOV | CMP => Some(if a_immediate {
                Modifier::AB
            } else if b_immediate {
                Modifier::B
            } else {
                Modifier::I
            }),
            ADD | SUB | MUL | DIV | MOD => Some(if a_immediate {
                Modifier::AB
            } else if b_immediate {
                Modifier::B
            } else {
                Modifier::F
            }),
            SLT => Some(if a_immediate { Modifier::AB } else { Modifier::B }),
            JMP | JMZ | JMN | DJN | SPL => Some(Modifier::B),
            ORG | EQU | END => None,
        }
    }
}

impl FromStr for Opcode {
    type Err = String;

    /// Mnemonics are upper-case only.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Opcode::ALL
            .iter()
            .copied()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| format!("wrong opcode {:?}", s))
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Selects which fields of the operands an opcode acts on.
/// An unresolved modifier is represented as `Option::None` on the operation.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Modifier {
    A,
    B,
    AB,
    BA,
    F,
    X,
    I,
}

impl Modifier {
    pub const ALL: [Modifier; 7] = [
        Modifier::A, Modifier::B, Modifier::AB, Modifier::BA,
        Modifier::F, Modifier::X, Modifier::I,
    ];

    pub fn as_str(&self) -> &'static str {
        use Modifier::*;
        match self {
            A  => "A",
            B  => "B",
            AB => "AB",
            BA => "BA",
            F  => "F",
            X  => "X",
            I  => "I",
        }
    }
}

impl FromStr for Modifier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Modifier::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| format!("wrong opcode modifier {:?}", s))
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum AddressingMode {
    /// `#`
    Immediate,
    /// `$`, also the mode of an operand written without a prefix.
    Direct,
    /// `@`
    Indirect,
    /// `<`
    PreDecrement,
    /// `>`
    PostIncrement,
}

impl AddressingMode {
    pub fn from_char(c: char) -> Option<Self> {
        use AddressingMode::*;
        match c {
            '#' => Some(Immediate),
            '$' => Some(Direct),
            '@' => Some(Indirect),
            '<' => Some(PreDecrement),
            '>' => Some(PostIncrement),
            _ => None,
        }
    }

    pub fn as_char(&self) -> char {
        use AddressingMode::*;
        match self {
            Immediate     => '#',
            Direct        => '$',
            Indirect      => '@',
            PreDecrement  => '<',
            PostIncrement => '>',
        }
    }
}

impl fmt::Display for AddressingMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Binary operators of an operand expression. They all bind equally and
/// associate to the left.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl Operator {
    pub fn from_char(c: char) -> Option<Self> {
        use Operator::*;
        match c {
            '+' => Some(Add),
            '-' => Some(Sub),
            '*' => Some(Mul),
            '/' => Some(Div),
            '%' => Some(Mod),
            _ => None,
        }
    }

    pub fn as_char(&self) -> char {
        use Operator::*;
        match self {
            Add => '+',
            Sub => '-',
            Mul => '*',
            Div => '/',
            Mod => '%',
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// An unevaluated operand expression.
#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Expr {
    Label(String),
    Number(i64),
    Binary(Box<Expr>, Operator, Box<Expr>),
}

impl Expr {
    pub fn binary(lhs: Expr, op: Operator, rhs: Expr) -> Self {
        Expr::Binary(Box::new(lhs), op, Box::new(rhs))
    }

    /// Every label the expression refers to, left to right.
    pub fn labels(&self) -> Vec<&str> {
        match self {
            Expr::Label(name) => vec![name.as_str()],
            Expr::Number(_) => vec![],
            Expr::Binary(lhs, _, rhs) => {
                let mut out = lhs.labels();
                out.extend(rhs.labels());
                out
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Expr::Label(name) => write!(f, "{}", name),
            Expr::Number(n) => write!(f, "{}", n),
            // Chains lean left, so only a right-hand subtree needs grouping.
            Expr::Binary(lhs, op, rhs) => match rhs.as_ref() {
                Expr::Binary(..) => write!(f, "{} {} ({})", lhs, op, rhs),
                _ => write!(f, "{} {} {}", lhs, op, rhs),
            },
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct Operand {
    pub mode: Option<AddressingMode>,
    pub expr: Expr,
}

impl Operand {
    /// The effective addressing mode; no prefix means direct.
    pub fn effective_mode(&self) -> AddressingMode {
        self.mode.unwrap_or(AddressingMode::Direct)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(mode) = self.mode {
            write!(f, "{}", mode)?;
        }
        write!(f, "{}", self.expr)
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize)]
pub struct Operation {
    pub opcode: Opcode,
    pub modifier: Option<Modifier>,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.opcode)?;
        if let Some(modifier) = self.modifier {
            write!(f, ".{}", modifier)?;
        }
        Ok(())
    }
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct Instruction {
    pub labels: Vec<String>,
    pub operation: Operation,
    pub operands: Vec<Operand>,
}

impl Instruction {
    /// Fills in the modifier from the operand modes when the source left it out.
    /// An explicit modifier is never touched.
    pub fn resolve_modifier(&mut self) {
        if self.operation.modifier.is_some() {
            return;
        }
        let a_mode = self.operands.get(0).map(Operand::effective_mode);
        let b_mode = self.operands.get(1).map(Operand::effective_mode);
        self.operation.modifier = self.operation.opcode.default_modifier(a_mode, b_mode);
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if !self.labels.is_empty() {
            write!(f, "{} ", self.labels.join(", "))?;
        }
        write!(f, "{}", self.operation)?;
        for (idx, operand) in self.operands.iter().enumerate() {
            if idx == 0 {
                write!(f, " {}", operand)?;
            } else {
                write!(f, ", {}", operand)?;
            }
        }
        Ok(())
    }
}

/// The result of one parse. Dereferences to the instructions in load order;
/// the END line, if any, is kept apart since it closes the program.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize)]
pub struct Program {
    pub instructions: Vec<Instruction>,
    pub end: Option<Instruction>,
}

impl Deref for Program {
    type Target = [Instruction];

    fn deref(&self) -> &Self::Target {
        &self.instructions
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for ins in self.instructions.iter().chain(self.end.iter()) {
            writeln!(f, "{}", ins)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn operand(mode: Option<AddressingMode>, expr: Expr) -> Operand {
        Operand { mode, expr }
    }

    fn instruction(opcode: Opcode, operands: Vec<Operand>) -> Instruction {
        Instruction {
            labels: vec![],
            operation: Operation { opcode, modifier: None },
            operands,
        }
    }

    #[test]
    fn test_opcode_from_str() {
        for op in Opcode::ALL.iter() {
            assert_eq!(op.as_str().parse::<Opcode>(), Ok(*op));
        }
        assert!("mov".parse::<Opcode>().is_err());
        assert!("WRONG".parse::<Opcode>().is_err());
        assert!("".parse::<Opcode>().is_err());
    }

    #[test]
    fn test_modifier_from_str() {
        for m in Modifier::ALL.iter() {
            assert_eq!(m.as_str().parse::<Modifier>(), Ok(*m));
        }
        assert!("ab".parse::<Modifier>().is_err());
        assert!("C".parse::<Modifier>().is_err());
    }

    #[test]
    fn test_default_modifier_table() {
        use AddressingMode::*;
        use Modifier as M;
        let modes = [None, Some(Immediate), Some(Direct), Some(Indirect), Some(PreDecrement), Some(PostIncrement)];

        for a in modes.iter() {
            for b in modes.iter() {
                let (a, b) = (*a, *b);
                let a_imm = a == Some(Immediate);
                let b_imm = b == Some(Immediate);

                assert_eq!(Opcode::DAT.default_modifier(a, b), Some(M::F));
                for op in [Opcode::MOV, Opcode::CMP].iter() {
                    let want = if a_imm { M::AB } else if b_imm { M::B } else { M::I };
                    assert_eq!(op.default_modifier(a, b), Some(want));
                }
                for op in [Opcode::ADD, Opcode::SUB, Opcode::MUL, Opcode::DIV, Opcode::MOD].iter() {
                    let want = if a_imm { M::AB } else if b_imm { M::B } else { M::F };
                    assert_eq!(op.default_modifier(a, b), Some(want));
                }
                let want = if a_imm { M::AB } else { M::B };
                assert_eq!(Opcode::SLT.default_modifier(a, b), Some(want));
                for op in [Opcode::JMP, Opcode::JMZ, Opcode::JMN, Opcode::DJN, Opcode::SPL].iter() {
                    assert_eq!(op.default_modifier(a, b), Some(M::B));
                }
                for op in [Opcode::ORG, Opcode::EQU, Opcode::END].iter() {
                    assert_eq!(op.default_modifier(a, b), None);
                }
            }
        }
    }

    #[test]
    fn test_resolve_modifier() {
        let mut ins = instruction(Opcode::MOV, vec![
            operand(Some(AddressingMode::Immediate), Expr::Number(0)),
            operand(None, Expr::Label("target".to_string())),
        ]);
        ins.resolve_modifier();
        assert_eq!(ins.operation.modifier, Some(Modifier::AB));

        let mut ins = instruction(Opcode::MOV, vec![
            operand(None, Expr::Number(0)),
            operand(None, Expr::Label("target".to_string())),
        ]);
        ins.resolve_modifier();
        assert_eq!(ins.operation.modifier, Some(Modifier::I));

        let mut ins = instruction(Opcode::ADD, vec![
            operand(Some(AddressingMode::Immediate), Expr::Label("step".to_string())),
            operand(None, Expr::Label("target".to_string())),
        ]);
        ins.operation.modifier = Some(Modifier::BA);
        ins.resolve_modifier();
        assert_eq!(ins.operation.modifier, Some(Modifier::BA));

        let mut ins = instruction(Opcode::ORG, vec![operand(None, Expr::Label("start".to_string()))]);
        ins.resolve_modifier();
        assert_eq!(ins.operation.modifier, None);
    }

    #[test]
    fn test_expr_display() {
        let a = || Expr::Label("a".to_string());
        let b = || Expr::Label("b".to_string());
        let c = || Expr::Label("c".to_string());

        let left = Expr::binary(Expr::binary(a(), Operator::Add, b()), Operator::Mul, c());
        assert_eq!(left.to_string(), "a + b * c");

        let right = Expr::binary(a(), Operator::Mul, Expr::binary(b(), Operator::Add, c()));
        assert_eq!(right.to_string(), "a * (b + c)");

        let neg = Expr::binary(a(), Operator::Sub, Expr::Number(-5));
        assert_eq!(neg.to_string(), "a - -5");
        assert_eq!(right.labels(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_instruction_display() {
        let ins = Instruction {
            labels: vec!["foo".to_string(), "fii".to_string()],
            operation: Operation { opcode: Opcode::JMP, modifier: Some(Modifier::A) },
            operands: vec![operand(None, Expr::Label("start".to_string()))],
        };
        assert_eq!(ins.to_string(), "foo, fii JMP.A start");

        let ins = Instruction {
            labels: vec![],
            operation: Operation { opcode: Opcode::MOV, modifier: Some(Modifier::AB) },
            operands: vec![
                operand(Some(AddressingMode::Immediate), Expr::Number(0)),
                operand(Some(AddressingMode::Indirect), Expr::Label("target".to_string())),
            ],
        };
        assert_eq!(ins.to_string(), "MOV.AB #0, @target");

        let end = instruction(Opcode::END, vec![]);
        assert_eq!(end.to_string(), "END");
    }

    #[test]
    fn test_serialize() {
        let ins = Instruction {
            labels: vec!["start".to_string()],
            operation: Operation { opcode: Opcode::ADD, modifier: Some(Modifier::AB) },
            operands: vec![
                operand(Some(AddressingMode::Immediate), Expr::Number(4)),
                operand(None, Expr::Label("target".to_string())),
            ],
        };
        let json = serde_json::to_value(&ins).unwrap();
        assert_eq!(json["operation"]["opcode"], "ADD");
        assert_eq!(json["operation"]["modifier"], "AB");
        assert_eq!(json["operands"][0]["mode"], "#");
        assert_eq!(json["operands"][0]["expr"]["number"], 4);
        assert!(json["operands"][1]["mode"].is_null());
        assert_eq!(json["operands"][1]["expr"]["label"], "target");
    }
}
