//! Traducción de código de tres direcciones a ensamblador SimpSIM.
//!
//! SimpSIM es una máquina de 16 registros de 8 bits sin resta,
//! multiplicación, división ni comparaciones de orden. La traducción
//! sintetiza estas operaciones con sumas, complemento a dos, máscaras
//! del bit de signo y dos subrutinas que se emiten a lo sumo una vez
//! por programa.
//!
//! # Convenciones de registros
//! - `R0`: operando de comparación de `jmpEQ` y `jmpLE`.
//! - `R1..RA`: nombres del programa, ver [`regs`].
//! - `RB`, `RC`: temporales de traducción.
//! - `RD`, `RE`: operandos de subrutinas.
//! - `RF`: resultado de subrutinas y valor de retorno.

use crate::ir::{Instruction, Label, Name};

pub mod regs;
mod simpsim;

pub use regs::{Reg, RegisterMap};

/// Etiqueta final del programa.
pub const EPILOGUE: &str = "fim_programa";

/// Resultado de una traducción.
pub struct Translation {
    pub assembly: Vec<String>,
    pub registers: RegisterMap,
    pub summary: String,
}

pub fn translate(code: &[Instruction]) -> Translation {
    let registers = RegisterMap::assign(code);

    let mut context = Context {
        registers: &registers,
        output: Vec::new(),
        next_skip: 1,
        uses_mul: false,
        uses_div: false,
        function_end: None,
    };

    context.header();
    for (index, instruction) in code.iter().enumerate() {
        // Una función se presenta como `goto fin; f: cuerpo; fin:`
        if let Instruction::SetLabel(Label::Function(function)) = instruction {
            context.function_end = match index.checked_sub(1).map(|previous| &code[previous]) {
                Some(Instruction::Jump(end)) => Some(end.clone()),
                _ => {
                    log::warn!("function `{}` is not skipped over, its returns halt", function);
                    None
                }
            };
        }

        context.push(format!("; {}", instruction));
        context.instruction(instruction);
    }

    emit!(context, "jmp", "{}", EPILOGUE);
    context.subroutines();

    context.push(format!("{}:", EPILOGUE));
    emit!(context, "halt");

    let assembly = context.output;
    let summary = format!(
        "Translation finished: {} names mapped to registers",
        registers.len()
    );

    log::debug!("codegen: {} lines, {}", assembly.len(), summary);

    Translation {
        assembly,
        registers,
        summary,
    }
}

struct Context<'a> {
    registers: &'a RegisterMap,
    output: Vec<String>,
    next_skip: u32,
    uses_mul: bool,
    uses_div: bool,

    /// Etiqueta que cierra la función en curso, si la hay.
    function_end: Option<Label>,
}

impl Context<'_> {
    fn push(&mut self, line: String) {
        self.output.push(line);
    }

    fn header(&mut self) {
        self.push(String::from("; SimpSIM assembly"));
        self.push(format!("; {}: comparison register", Reg::COMPARE));

        let registers = self.registers;
        for (name, reg) in registers.iter() {
            let kind = if name.is_temp() { "temporary" } else { "variable" };
            self.push(format!("; {}: {} ({})", reg, name, kind));
        }

        if registers.is_shared() {
            self.push(String::from("; warning: register pool exhausted, some registers are shared"));
        }

        self.push(format!(
            "; {}, {}: scratch, {}, {}: subroutine operands, {}: result",
            Reg::SCRATCH_LHS,
            Reg::SCRATCH_RHS,
            Reg::OPERAND_LHS,
            Reg::OPERAND_RHS,
            Reg::RESULT
        ));

        self.push(String::new());
    }

    fn reg(&self, name: &Name) -> Reg {
        // Todo nombre del programa fue asignado por `RegisterMap::assign()`
        self.registers.get(name).unwrap_or_else(|| {
            debug_assert!(false, "`{}` has no register", name);
            log::warn!("`{}` has no register, using {}", name, Reg::SCRATCH_LHS);
            Reg::SCRATCH_LHS
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BinOp, Label, Operand, RelOp};
    use std::rc::Rc;

    fn var(name: &str) -> Operand {
        Operand::Name(Name::Var(Rc::from(name)))
    }

    fn binary(dest: u32, lhs: Operand, op: BinOp, rhs: Operand) -> Instruction {
        Instruction::Binary {
            dest: Name::Temp(dest),
            lhs,
            op,
            rhs,
        }
    }

    fn jump_if(op: RelOp) -> Vec<Instruction> {
        vec![
            Instruction::JumpIf {
                lhs: var("a"),
                op,
                rhs: var("b"),
                target: Label::Generated(1),
            },
            Instruction::SetLabel(Label::Generated(1)),
        ]
    }

    fn contains(translation: &Translation, line: &str) -> bool {
        translation.assembly.iter().any(|candidate| candidate == line)
    }

    #[test]
    fn addition_and_return() {
        let code = vec![
            binary(1, Operand::Int(5), BinOp::Add, Operand::Int(10)),
            Instruction::Return(Some(Operand::Name(Name::Temp(1)))),
        ];

        let translation = translate(&code);
        assert!(contains(&translation, "\tload    RB, 5"));
        assert!(contains(&translation, "\tload    RC, 10"));
        assert!(contains(&translation, "\taddi    R1, RB, RC"));
        assert!(contains(&translation, "\tmove    RF, R1"));
        assert!(contains(&translation, "; R1: t1 (temporary)"));
        assert!(contains(&translation, "; t1 := 5 + 10"));

        assert_eq!(translation.assembly.last().map(String::as_str), Some("\thalt"));
        assert_eq!(
            translation.summary,
            "Translation finished: 1 names mapped to registers"
        );
    }

    #[test]
    fn register_map_is_stable() {
        let code = vec![
            binary(1, var("x"), BinOp::Sub, var("y")),
            binary(2, Name::Temp(1).into(), BinOp::Mul, var("x")),
            Instruction::Return(Some(Name::Temp(2).into())),
        ];

        let first = translate(&code);
        let second = translate(&code);

        assert_eq!(first.registers, second.registers);
        assert_eq!(first.assembly, second.assembly);
    }

    #[test]
    fn subtraction_uses_twos_complement() {
        let translation = translate(&[binary(1, var("a"), BinOp::Sub, var("b"))]);
        assert!(contains(&translation, "\tload    RC, 0xFF"));
        assert!(contains(&translation, "\txor     RC, R3, RC"));
        assert!(contains(&translation, "\taddi    R1, R2, RC"));

        let translation = translate(&[binary(1, var("a"), BinOp::Sub, Operand::Int(3))]);
        assert!(contains(&translation, "\tload    RC, 0xFD"));
    }

    #[test]
    fn subroutines_are_emitted_once() {
        let code = vec![
            binary(1, var("a"), BinOp::Mul, var("b")),
            binary(2, Name::Temp(1).into(), BinOp::Mul, var("a")),
            binary(3, Name::Temp(2).into(), BinOp::Div, var("b")),
        ];

        let translation = translate(&code);
        let count = |line: &str| translation.assembly.iter().filter(|l| *l == line).count();

        assert_eq!(count("\tcall    mul_sub"), 2);
        assert_eq!(count("mul_sub:"), 1);
        assert_eq!(count("div_sub:"), 1);
        assert_eq!(count("\tret"), 2);
    }

    #[test]
    fn constant_products_are_folded() {
        let code = vec![
            binary(1, Operand::Int(3), BinOp::Mul, Operand::Int(4)),
            binary(2, Operand::Int(3), BinOp::Div, Operand::Int(0)),
        ];

        let translation = translate(&code);
        assert!(contains(&translation, "\tload    R1, 12"));
        assert!(contains(&translation, "\tload    R2, 0"));
        assert!(!contains(&translation, "mul_sub:"));
        assert!(!contains(&translation, "div_sub:"));
    }

    #[test]
    fn function_returns_to_caller() {
        let code = vec![
            Instruction::Jump(Label::Generated(1)),
            Instruction::SetLabel(Label::Function(Rc::from("f"))),
            Instruction::Copy {
                dest: Name::Var(Rc::from("g")),
                source: Operand::Int(1),
            },
            Instruction::Return(None),
            Instruction::SetLabel(Label::Generated(1)),
            Instruction::Call {
                function: Rc::from("f"),
                arguments: vec![],
            },
            Instruction::Return(Some(var("g"))),
        ];

        let assembly = translate(&code).assembly;
        let position = |line: &str| assembly.iter().position(|candidate| candidate == line);

        let body = position("f:").unwrap();
        let end = position("L1:").unwrap();
        let ret = position("\tret").unwrap();
        assert!(body < ret && ret < end);

        // Fuera de la función, `return` termina el programa
        assert!(position("\tmove    RF, R1").unwrap() > end);
        assert_eq!(
            assembly.iter().filter(|line| *line == "\tjmp     fim_programa").count(),
            2
        );
    }

    #[test]
    #[should_panic]
    #[cfg(debug_assertions)]
    fn unmapped_names_are_a_bug() {
        let registers = RegisterMap::default();
        let context = Context {
            registers: &registers,
            output: Vec::new(),
            next_skip: 1,
            uses_mul: false,
            uses_div: false,
            function_end: None,
        };

        context.reg(&Name::Temp(1));
    }

    #[test]
    fn comparisons() {
        let translation = translate(&jump_if(RelOp::Less));
        assert!(contains(&translation, "\tload    R0, 0x80"));
        assert!(contains(&translation, "\tand     RC, RC, R0"));
        assert!(contains(&translation, "\tjmpEQ   RC=R0, L1"));

        let translation = translate(&jump_if(RelOp::LessOrEqual));
        assert!(contains(&translation, "\tjmpLE   RC<=R0, L1"));

        let translation = translate(&jump_if(RelOp::NotEqual));
        assert!(contains(&translation, "\tjmpEQ   RC=R0, skip_1"));
        assert!(contains(&translation, "\tjmp     L1"));
        assert!(contains(&translation, "skip_1:"));
    }
}
