//! Selección de instrucciones SimpSIM.

use super::{Context, Reg, EPILOGUE};
use crate::ir::{BinOp, Instruction, Label, Name, Operand, RelOp};

const MUL: &str = "mul_sub";
const DIV: &str = "div_sub";

/// Máscara del bit de signo.
const SIGN: &str = "0x80";

impl Context<'_> {
    pub(super) fn instruction(&mut self, instruction: &Instruction) {
        use Instruction::*;

        match instruction {
            Copy { dest, source } => {
                let dest = self.reg(dest);
                self.load_into(dest, source);
            }

            Binary { dest, lhs, op, rhs } => self.binary(dest, lhs, *op, rhs),

            SetLabel(label) => {
                self.push(format!("{}:", label));
                if self.function_end.as_ref() == Some(label) {
                    self.function_end = None;
                }
            }

            JumpIf {
                lhs,
                op,
                rhs,
                target,
            } => self.jump_if(lhs, *op, rhs, target),

            Jump(target) => emit!(self, "jmp", "{}", target),

            // Los argumentos solo aparecen en el comentario de la instrucción
            Call { function, .. } => emit!(self, "call", "{}", function),

            // Dentro de una función se vuelve a quien llama
            Return(value) => {
                if let Some(value) = value {
                    self.load_into(Reg::RESULT, value);
                }

                if self.function_end.is_some() {
                    emit!(self, "ret");
                } else {
                    emit!(self, "jmp", "{}", EPILOGUE);
                }
            }
        }
    }

    pub(super) fn subroutines(&mut self) {
        if self.uses_mul {
            // RF := RD * RE, por sumas repetidas
            self.push(String::new());
            self.push(format!("{}:", MUL));
            emit!(self, "load", "{}, 0", Reg::RESULT);
            emit!(self, "load", "{}, 0", Reg::COMPARE);
            emit!(self, "load", "{}, 0xFF", Reg::SCRATCH_RHS);
            self.push(String::from("mul_loop:"));
            emit!(self, "jmpEQ", "{}={}, mul_end", Reg::OPERAND_RHS, Reg::COMPARE);
            emit!(self, "addi", "{0}, {0}, {1}", Reg::RESULT, Reg::OPERAND_LHS);
            emit!(self, "addi", "{0}, {0}, {1}", Reg::OPERAND_RHS, Reg::SCRATCH_RHS);
            emit!(self, "jmp", "mul_loop");
            self.push(String::from("mul_end:"));
            emit!(self, "ret");
        }

        if self.uses_div {
            // RF := RD / RE, por restas repetidas; cero si RE es cero
            self.push(String::new());
            self.push(format!("{}:", DIV));
            emit!(self, "load", "{}, 0", Reg::RESULT);
            emit!(self, "load", "{}, 0", Reg::COMPARE);
            emit!(self, "jmpEQ", "{}={}, div_end", Reg::OPERAND_RHS, Reg::COMPARE);
            self.negate_reg(Reg::OPERAND_RHS, Reg::SCRATCH_RHS);
            self.push(String::from("div_loop:"));
            emit!(self, "addi", "{}, {}, {}", Reg::SCRATCH_LHS, Reg::OPERAND_LHS, Reg::SCRATCH_RHS);
            emit!(self, "load", "{}, {}", Reg::COMPARE, SIGN);
            emit!(self, "and", "{0}, {0}, {1}", Reg::SCRATCH_LHS, Reg::COMPARE);
            emit!(self, "jmpEQ", "{}={}, div_end", Reg::SCRATCH_LHS, Reg::COMPARE);
            emit!(self, "addi", "{0}, {0}, {1}", Reg::OPERAND_LHS, Reg::SCRATCH_RHS);
            emit!(self, "load", "{}, 1", Reg::COMPARE);
            emit!(self, "addi", "{0}, {0}, {1}", Reg::RESULT, Reg::COMPARE);
            emit!(self, "jmp", "div_loop");
            self.push(String::from("div_end:"));
            emit!(self, "ret");
        }

        self.push(String::new());
    }

    fn binary(&mut self, dest: &Name, lhs: &Operand, op: BinOp, rhs: &Operand) {
        let dest = self.reg(dest);

        match op {
            BinOp::Add => {
                let lhs = self.operand(lhs, Reg::SCRATCH_LHS);
                let rhs = self.operand(rhs, Reg::SCRATCH_RHS);
                emit!(self, "addi", "{}, {}, {}", dest, lhs, rhs);
            }

            BinOp::Sub => {
                self.negate(rhs, Reg::SCRATCH_RHS);
                let lhs = self.operand(lhs, Reg::SCRATCH_LHS);
                emit!(self, "addi", "{}, {}, {}", dest, lhs, Reg::SCRATCH_RHS);
            }

            BinOp::Mul | BinOp::Div => {
                if let (Operand::Int(lhs), Operand::Int(rhs)) = (lhs, rhs) {
                    let value = match op {
                        BinOp::Mul => lhs.wrapping_mul(*rhs),
                        _ => lhs.checked_div(*rhs).unwrap_or(0),
                    };

                    emit!(self, "load", "{}, {}", dest, immediate(value));
                    return;
                }

                self.load_into(Reg::OPERAND_LHS, lhs);
                self.load_into(Reg::OPERAND_RHS, rhs);

                let subroutine = if op == BinOp::Mul {
                    self.uses_mul = true;
                    MUL
                } else {
                    self.uses_div = true;
                    DIV
                };

                emit!(self, "call", "{}", subroutine);
                emit!(self, "move", "{}, {}", dest, Reg::RESULT);
            }
        }
    }

    fn jump_if(&mut self, lhs: &Operand, op: RelOp, rhs: &Operand, target: &Label) {
        // RC := lhs - rhs, se compara contra cero o contra el signo
        let diff = Reg::SCRATCH_RHS;
        self.negate(rhs, diff);

        let lhs = self.operand(lhs, Reg::SCRATCH_LHS);
        emit!(self, "addi", "{0}, {1}, {0}", diff, lhs);

        match op {
            RelOp::Equal => {
                emit!(self, "load", "{}, 0", Reg::COMPARE);
                emit!(self, "jmpEQ", "{}={}, {}", diff, Reg::COMPARE, target);
            }

            RelOp::NotEqual => {
                emit!(self, "load", "{}, 0", Reg::COMPARE);
                self.jump_unless("jmpEQ", "=", diff, target);
            }

            RelOp::LessOrEqual => {
                emit!(self, "load", "{}, 0", Reg::COMPARE);
                emit!(self, "jmpLE", "{}<={}, {}", diff, Reg::COMPARE, target);
            }

            RelOp::Greater => {
                emit!(self, "load", "{}, 0", Reg::COMPARE);
                self.jump_unless("jmpLE", "<=", diff, target);
            }

            RelOp::Less => {
                self.sign(diff);
                emit!(self, "jmpEQ", "{}={}, {}", diff, Reg::COMPARE, target);
            }

            RelOp::GreaterOrEqual => {
                self.sign(diff);
                self.jump_unless("jmpEQ", "=", diff, target);
            }
        }
    }

    /// Salta a `target` solo si la comparación primitiva no se cumple.
    fn jump_unless(&mut self, jump: &str, relation: &str, reg: Reg, target: &Label) {
        let skip = format!("skip_{}", self.next_skip);
        self.next_skip += 1;

        emit!(self, jump, "{}{}{}, {}", reg, relation, Reg::COMPARE, skip);
        emit!(self, "jmp", "{}", target);
        self.push(format!("{}:", skip));
    }

    /// Deja en `reg` solo su bit de signo, y la máscara en `R0`.
    fn sign(&mut self, reg: Reg) {
        emit!(self, "load", "{}, {}", Reg::COMPARE, SIGN);
        emit!(self, "and", "{0}, {0}, {1}", reg, Reg::COMPARE);
    }

    /// Carga `-operand` en `into`.
    fn negate(&mut self, operand: &Operand, into: Reg) {
        match constant(operand) {
            Some(value) => emit!(self, "load", "{}, {}", into, immediate(value.wrapping_neg())),
            None => {
                let reg = self.operand(operand, into);
                self.negate_reg(reg, into);
            }
        }
    }

    /// Complemento a dos. Usa `RB` como temporal.
    fn negate_reg(&mut self, reg: Reg, into: Reg) {
        emit!(self, "load", "{}, 0xFF", into);
        emit!(self, "xor", "{}, {}, {}", into, reg, into);
        emit!(self, "load", "{}, 1", Reg::SCRATCH_LHS);
        emit!(self, "addi", "{0}, {0}, {1}", into, Reg::SCRATCH_LHS);
    }

    /// Registro que contiene el valor de un operando.
    ///
    /// Los literales se cargan primero en `scratch`.
    fn operand(&mut self, operand: &Operand, scratch: Reg) -> Reg {
        match operand {
            Operand::Name(name) => self.reg(name),
            _ => {
                self.load_into(scratch, operand);
                scratch
            }
        }
    }

    fn load_into(&mut self, dest: Reg, source: &Operand) {
        match source {
            Operand::Name(name) => {
                let source = self.reg(name);
                if source != dest {
                    emit!(self, "move", "{}, {}", dest, source);
                }
            }

            Operand::Text(lexeme) => {
                log::warn!("text literal {} has no register representation, loading 0", lexeme);
                emit!(self, "load", "{}, 0", dest);
            }

            _ => {
                let value = constant(source).unwrap_or(0);
                emit!(self, "load", "{}, {}", dest, immediate(value));
            }
        }
    }
}

/// Valor entero de un literal; los decimales se truncan.
fn constant(operand: &Operand) -> Option<i64> {
    match operand {
        Operand::Int(int) => Some(*int),
        Operand::Decimal(lexeme) => {
            let value = lexeme.parse::<f64>().ok()?.trunc() as i64;
            log::warn!("decimal literal {} truncated to {}", lexeme, value);
            Some(value)
        }

        _ => None,
    }
}

/// Inmediato de 8 bits, en hexadecimal si es negativo.
fn immediate(value: i64) -> String {
    match value {
        0..=255 => value.to_string(),
        -128..=-1 => format!("0x{:02X}", value as u8),
        _ => {
            log::warn!("constant {} does not fit in 8 bits, truncated", value);
            format!("0x{:02X}", value as u8)
        }
    }
}
