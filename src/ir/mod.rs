//! Representación intermedia.
//!
//! Código de tres direcciones: cada instrucción tiene a lo sumo un
//! operador y asigna a lo sumo un destino. Las instrucciones son
//! valores estructurados; su forma textual solo existe para
//! mostrarse al usuario y en comentarios del ensamblador.

use std::{
    fmt::{self, Display},
    rc::Rc,
};

pub mod generate;
pub mod optimize;

/// Destino de una asignación.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Name {
    Var(Rc<str>),
    Temp(u32),
}

impl Name {
    pub fn is_temp(&self) -> bool {
        matches!(self, Name::Temp(_))
    }
}

impl Display for Name {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Name::Var(name) => fmt.write_str(name),
            Name::Temp(number) => write!(fmt, "t{}", number),
        }
    }
}

/// Operando de una instrucción.
///
/// Los literales decimales y de texto conservan su lexema original.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Operand {
    Name(Name),
    Int(i64),
    Decimal(Rc<str>),
    Text(Rc<str>),
}

impl Operand {
    pub fn name(&self) -> Option<&Name> {
        match self {
            Operand::Name(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_literal(&self) -> bool {
        !matches!(self, Operand::Name(_))
    }
}

impl From<Name> for Operand {
    fn from(name: Name) -> Self {
        Operand::Name(name)
    }
}

impl Display for Operand {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Name(name) => name.fmt(fmt),
            Operand::Int(int) => write!(fmt, "{}", int),
            Operand::Decimal(lexeme) | Operand::Text(lexeme) => fmt.write_str(lexeme),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl Display for BinOp {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let string = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
        };

        fmt.write_str(string)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RelOp {
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

impl RelOp {
    /// Operador cuyo resultado es siempre el opuesto.
    pub fn negate(self) -> RelOp {
        use RelOp::*;

        match self {
            Equal => NotEqual,
            NotEqual => Equal,
            Less => GreaterOrEqual,
            GreaterOrEqual => Less,
            Greater => LessOrEqual,
            LessOrEqual => Greater,
        }
    }

    pub fn evaluate<T: PartialOrd>(self, lhs: T, rhs: T) -> bool {
        use RelOp::*;

        match self {
            Equal => lhs == rhs,
            NotEqual => lhs != rhs,
            Less => lhs < rhs,
            LessOrEqual => lhs <= rhs,
            Greater => lhs > rhs,
            GreaterOrEqual => lhs >= rhs,
        }
    }
}

impl Display for RelOp {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use RelOp::*;

        let string = match self {
            Equal => "==",
            NotEqual => "!=",
            Less => "<",
            LessOrEqual => "<=",
            Greater => ">",
            GreaterOrEqual => ">=",
        };

        fmt.write_str(string)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Label {
    Generated(u32),
    Function(Rc<str>),
}

impl Display for Label {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Generated(number) => write!(fmt, "L{}", number),
            Label::Function(name) => fmt.write_str(name),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Instruction {
    Copy {
        dest: Name,
        source: Operand,
    },

    Binary {
        dest: Name,
        lhs: Operand,
        op: BinOp,
        rhs: Operand,
    },

    SetLabel(Label),

    JumpIf {
        lhs: Operand,
        op: RelOp,
        rhs: Operand,
        target: Label,
    },

    Jump(Label),

    Call {
        function: Rc<str>,
        arguments: Vec<Operand>,
    },

    Return(Option<Operand>),
}

impl Instruction {
    /// Nombre que esta instrucción define, si alguno.
    pub fn dest(&self) -> Option<&Name> {
        match self {
            Instruction::Copy { dest, .. } | Instruction::Binary { dest, .. } => Some(dest),
            _ => None,
        }
    }

    /// Operandos leídos por esta instrucción.
    pub fn operands(&self) -> impl Iterator<Item = &Operand> {
        use Instruction::*;

        let (first, second, rest): (_, _, &[Operand]) = match self {
            Copy { source, .. } => (Some(source), None, &[]),
            Binary { lhs, rhs, .. } | JumpIf { lhs, rhs, .. } => (Some(lhs), Some(rhs), &[]),
            Call { arguments, .. } => (None, None, arguments),
            Return(value) => (value.as_ref(), None, &[]),
            SetLabel(_) | Jump(_) => (None, None, &[]),
        };

        first.into_iter().chain(second).chain(rest.iter())
    }

    /// Aplica `map` a cada operando leído por esta instrucción.
    pub fn map_operands<F>(&mut self, mut map: F)
    where
        F: FnMut(&mut Operand),
    {
        use Instruction::*;

        match self {
            Copy { source, .. } => map(source),
            Binary { lhs, rhs, .. } | JumpIf { lhs, rhs, .. } => {
                map(lhs);
                map(rhs);
            }

            Call { arguments, .. } => arguments.iter_mut().for_each(map),
            Return(Some(value)) => map(value),
            Return(None) | SetLabel(_) | Jump(_) => (),
        }
    }

    /// Determina si la instrucción lee `name`.
    pub fn reads(&self, name: &Name) -> bool {
        self.operands().any(|operand| operand.name() == Some(name))
    }

    /// Etiqueta a la que puede saltar esta instrucción.
    pub fn target(&self) -> Option<&Label> {
        match self {
            Instruction::Jump(target) | Instruction::JumpIf { target, .. } => Some(target),
            _ => None,
        }
    }

    pub fn target_mut(&mut self) -> Option<&mut Label> {
        match self {
            Instruction::Jump(target) | Instruction::JumpIf { target, .. } => Some(target),
            _ => None,
        }
    }

    /// Etiquetas y llamadas terminan un bloque básico.
    pub fn is_barrier(&self) -> bool {
        matches!(self, Instruction::SetLabel(_) | Instruction::Call { .. })
    }
}

impl Display for Instruction {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Instruction::*;

        match self {
            Copy { dest, source } => write!(fmt, "{} := {}", dest, source),
            Binary { dest, lhs, op, rhs } => write!(fmt, "{} := {} {} {}", dest, lhs, op, rhs),
            SetLabel(label) => write!(fmt, "{}:", label),
            JumpIf {
                lhs,
                op,
                rhs,
                target,
            } => write!(fmt, "if {} {} {} goto {}", lhs, op, rhs, target),

            Jump(target) => write!(fmt, "goto {}", target),

            Call {
                function,
                arguments,
            } => {
                write!(fmt, "call {}(", function)?;
                for (index, argument) in arguments.iter().enumerate() {
                    let separator = if index > 0 { ", " } else { "" };
                    write!(fmt, "{}{}", separator, argument)?;
                }

                fmt.write_str(")")
            }

            Return(Some(value)) => write!(fmt, "return {}", value),
            Return(None) => fmt.write_str("return"),
        }
    }
}

/// Todos los nombres de un programa, en orden de primera aparición.
pub fn names(code: &[Instruction]) -> impl Iterator<Item = &Name> {
    code.iter().flat_map(|instruction| {
        instruction
            .dest()
            .into_iter()
            .chain(instruction.operands().filter_map(Operand::name))
    })
}

pub fn render(code: &[Instruction]) -> Vec<String> {
    code.iter().map(Instruction::to_string).collect()
}
