//! Optimización de código de tres direcciones.
//!
//! Una batería ordenada de pases de reescritura se aplica en rondas
//! hasta que una ronda completa no cambia nada, con un máximo de
//! [`MAX_ROUNDS`] rondas. Cada pase preserva la semántica del
//! programa; ninguno garantiza un resultado óptimo.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    str::FromStr,
};

use bitflags::bitflags;
use thiserror::Error;

use super::{BinOp, Instruction, Label, Name, Operand, RelOp};

/// Límite de rondas de optimización.
pub const MAX_ROUNDS: usize = 10;

bitflags! {
    /// Pases de optimización habilitados.
    pub struct Passes: u32 {
        /// Reutiliza el resultado de `a op b` ya calculado.
        const COMMON_SUBEXPRESSIONS = 0x01;

        /// Elimina temporales que nunca se leen.
        const DEAD_CODE = 0x02;

        /// Propaga copias y constantes dentro de un bloque básico.
        const COPY_PROPAGATION = 0x04;

        /// Elimina saltos a la instrucción siguiente y etiquetas sin uso.
        const JUMPS = 0x08;

        /// Identidades algebraicas con `0` y `1`.
        const ALGEBRAIC = 0x10;

        /// Evalúa condiciones conocidas en tiempo de compilación.
        const CONSTANT_CONDITIONS = 0x20;

        /// Instrucciones repetidas, autoasignaciones y etiquetas contiguas.
        const REDUNDANT = 0x40;
    }
}

impl Default for Passes {
    fn default() -> Self {
        Passes::all()
    }
}

#[derive(Error, Debug)]
#[error("Unknown optimizer pass `{0}`, expected one of: cse, dce, copy, jumps, algebra, conditions, redundant, all")]
pub struct UnknownPass(String);

impl FromStr for Passes {
    type Err = UnknownPass;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let passes = match name {
            "cse" => Passes::COMMON_SUBEXPRESSIONS,
            "dce" => Passes::DEAD_CODE,
            "copy" => Passes::COPY_PROPAGATION,
            "jumps" => Passes::JUMPS,
            "algebra" => Passes::ALGEBRAIC,
            "conditions" => Passes::CONSTANT_CONDITIONS,
            "redundant" => Passes::REDUNDANT,
            "all" => Passes::all(),
            _ => return Err(UnknownPass(name.to_owned())),
        };

        Ok(passes)
    }
}

/// Resultado de una optimización.
pub struct Optimization {
    pub code: Vec<Instruction>,

    /// Número de rondas que modificaron el código.
    pub changes: usize,

    /// Texto original de cada posición que ya no coincide.
    pub original_by_index: BTreeMap<usize, String>,
}

type Pass = fn(&mut Vec<Instruction>);

const PIPELINE: [(Passes, Pass); 7] = [
    (Passes::COMMON_SUBEXPRESSIONS, common_subexpressions),
    (Passes::DEAD_CODE, dead_code),
    (Passes::COPY_PROPAGATION, copy_propagation),
    (Passes::JUMPS, jumps),
    (Passes::ALGEBRAIC, algebraic),
    (Passes::CONSTANT_CONDITIONS, constant_conditions),
    (Passes::REDUNDANT, redundant),
];

pub fn optimize(original: Vec<Instruction>, passes: Passes) -> Optimization {
    let mut code = original.clone();
    let mut changes = 0;

    for round in 1..=MAX_ROUNDS {
        let before = code.clone();
        for (_, pass) in PIPELINE.iter().filter(|(flag, _)| passes.contains(*flag)) {
            pass(&mut code);
        }

        if code == before {
            break;
        }

        changes += 1;
        log::debug!(
            "optimize: round {} left {} of {} instructions",
            round,
            code.len(),
            before.len()
        );
    }

    let original_by_index = original
        .iter()
        .enumerate()
        .filter(|(index, instruction)| code.get(*index) != Some(instruction))
        .map(|(index, instruction)| (index, instruction.to_string()))
        .collect();

    Optimization {
        code,
        changes,
        original_by_index,
    }
}

fn common_subexpressions(code: &mut Vec<Instruction>) {
    let mut available: HashMap<(Operand, BinOp, Operand), Name> = HashMap::new();

    for instruction in code.iter_mut() {
        if instruction.is_barrier() {
            available.clear();
            continue;
        }

        let key = match instruction {
            Instruction::Binary { lhs, op, rhs, .. } => Some((lhs.clone(), *op, rhs.clone())),
            _ => None,
        };

        let dest = match instruction.dest() {
            Some(dest) => dest.clone(),
            None => continue,
        };

        let previous = key
            .as_ref()
            .and_then(|key| available.get(key))
            .filter(|previous| **previous != dest)
            .cloned();

        // Redefinir `dest` invalida todo lo que lo lee o lo contiene
        available.retain(|(lhs, _, rhs), held| {
            *held != dest && lhs.name() != Some(&dest) && rhs.name() != Some(&dest)
        });

        match (key, previous) {
            (Some(_), Some(previous)) => {
                log::trace!("cse: `{}` reuses `{}`", instruction, previous);
                *instruction = Instruction::Copy {
                    dest,
                    source: previous.into(),
                };
            }

            (Some(key), None) if key.0.name() != Some(&dest) && key.2.name() != Some(&dest) => {
                available.insert(key, dest);
            }

            _ => (),
        }
    }
}

fn dead_code(code: &mut Vec<Instruction>) {
    loop {
        let read: HashSet<Name> = code
            .iter()
            .flat_map(Instruction::operands)
            .filter_map(Operand::name)
            .cloned()
            .collect();

        let before = code.len();
        code.retain(|instruction| match instruction.dest() {
            Some(dest) if dest.is_temp() && !read.contains(dest) => {
                log::trace!("dce: removed `{}`", instruction);
                false
            }

            _ => true,
        });

        if code.len() == before {
            break;
        }
    }
}

fn copy_propagation(code: &mut Vec<Instruction>) {
    let mut index = 0;
    while index < code.len() {
        if coalesce(code, index) {
            continue;
        }

        let (dest, source) = match &code[index] {
            Instruction::Copy { dest, source } if source.name() != Some(dest) => {
                (dest.clone(), source.clone())
            }

            _ => {
                index += 1;
                continue;
            }
        };

        for instruction in &mut code[index + 1..] {
            if let Instruction::SetLabel(_) = instruction {
                break;
            }

            instruction.map_operands(|operand| {
                if operand.name() == Some(&dest) {
                    *operand = source.clone();
                }
            });

            // Una llamada lee sus argumentos, pero puede modificar globales
            if instruction.is_barrier() {
                break;
            }

            match instruction.dest() {
                Some(redefined) if *redefined == dest || Some(redefined) == source.name() => break,
                _ => (),
            }
        }

        if code.iter().any(|instruction| instruction.reads(&dest)) {
            index += 1;
        } else {
            log::trace!("copy: removed `{}`", code[index]);
            code.remove(index);
        }
    }
}

/// `t := e; x := t` se reduce a `x := e` si `t` se lee una única vez.
fn coalesce(code: &mut Vec<Instruction>, index: usize) -> bool {
    let temp = match code[index].dest() {
        Some(temp) if temp.is_temp() => temp.clone(),
        _ => return false,
    };

    let target = match code.get(index + 1) {
        Some(Instruction::Copy {
            dest,
            source: Operand::Name(source),
        }) if *source == temp => dest.clone(),

        _ => return false,
    };

    let reads = code
        .iter()
        .flat_map(Instruction::operands)
        .filter(|operand| operand.name() == Some(&temp))
        .count();

    if reads != 1 {
        return false;
    }

    match &mut code[index] {
        Instruction::Copy { dest, .. } | Instruction::Binary { dest, .. } => *dest = target,
        _ => return false,
    }

    log::trace!("copy: coalesced into `{}`", code[index]);
    code.remove(index + 1);

    true
}

fn jumps(code: &mut Vec<Instruction>) {
    let mut index = 0;
    while index + 1 < code.len() {
        match (&code[index], &code[index + 1]) {
            (Instruction::Jump(target), Instruction::SetLabel(label)) if target == label => {
                log::trace!("jumps: removed `goto {}`", target);
                code.remove(index);
            }

            _ => index += 1,
        }
    }

    let targets: HashSet<Label> = code.iter().filter_map(Instruction::target).cloned().collect();
    code.retain(|instruction| match instruction {
        Instruction::SetLabel(label @ Label::Generated(_)) => targets.contains(label),
        _ => true,
    });
}

fn algebraic(code: &mut Vec<Instruction>) {
    for instruction in code.iter_mut() {
        let (dest, source) = match instruction {
            Instruction::Binary { dest, lhs, op, rhs } => {
                let source = match (op, &*lhs, &*rhs) {
                    (BinOp::Mul, Operand::Int(0), _) | (BinOp::Mul, _, Operand::Int(0)) => {
                        Operand::Int(0)
                    }

                    (BinOp::Add, value, Operand::Int(0))
                    | (BinOp::Add, Operand::Int(0), value)
                    | (BinOp::Sub, value, Operand::Int(0))
                    | (BinOp::Mul, value, Operand::Int(1))
                    | (BinOp::Mul, Operand::Int(1), value)
                    | (BinOp::Div, value, Operand::Int(1)) => value.clone(),

                    _ => continue,
                };

                (dest.clone(), source)
            }

            _ => continue,
        };

        log::trace!("algebra: `{}` becomes `{} := {}`", instruction, dest, source);
        *instruction = Instruction::Copy { dest, source };
    }
}

fn constant_conditions(code: &mut Vec<Instruction>) {
    let folded: Vec<_> = code.drain(..).filter_map(|instruction| match &instruction {
        Instruction::JumpIf {
            lhs,
            op,
            rhs,
            target,
        } => match decide(lhs, *op, rhs) {
            Some(true) => Some(Instruction::Jump(target.clone())),
            Some(false) => None,
            None => Some(instruction),
        },

        _ => Some(instruction),
    })
    .collect();

    *code = folded;
}

/// Resultado estático de una comparación, si se conoce.
fn decide(lhs: &Operand, op: RelOp, rhs: &Operand) -> Option<bool> {
    match (lhs, rhs) {
        (Operand::Name(lhs), Operand::Name(rhs)) if lhs == rhs => Some(op.evaluate(0, 0)),
        (Operand::Int(lhs), Operand::Int(rhs)) => Some(op.evaluate(lhs, rhs)),
        (Operand::Text(lhs), Operand::Text(rhs)) => Some(op.evaluate(lhs, rhs)),
        (Operand::Int(_) | Operand::Decimal(_), Operand::Int(_) | Operand::Decimal(_)) => {
            let lhs = numeric(lhs)?;
            let rhs = numeric(rhs)?;
            Some(op.evaluate(lhs, rhs))
        }

        _ => None,
    }
}

fn numeric(operand: &Operand) -> Option<f64> {
    match operand {
        Operand::Int(int) => Some(*int as f64),
        Operand::Decimal(lexeme) => lexeme.parse().ok(),
        _ => None,
    }
}

fn redundant(code: &mut Vec<Instruction>) {
    code.retain(|instruction| match instruction {
        Instruction::Copy {
            dest,
            source: Operand::Name(source),
        } => dest != source,

        _ => true,
    });

    let mut index = 1;
    while index < code.len() {
        let (previous, current) = (&code[index - 1], &code[index]);

        if let (Instruction::SetLabel(kept), Instruction::SetLabel(merged @ Label::Generated(_))) =
            (previous, current)
        {
            let (kept, merged) = (kept.clone(), merged.clone());
            for target in code.iter_mut().filter_map(Instruction::target_mut) {
                if *target == merged {
                    *target = kept.clone();
                }
            }

            log::trace!("redundant: label `{}` merged into `{}`", merged, kept);
            code.remove(index);
            continue;
        }

        let repeated = previous == current
            && !matches!(current, Instruction::Call { .. } | Instruction::SetLabel(_))
            && !current.dest().map_or(false, |dest| current.reads(dest));

        if repeated {
            log::trace!("redundant: removed repeated `{}`", current);
            code.remove(index);
        } else {
            index += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn var(name: &str) -> Operand {
        Operand::Name(Name::Var(Rc::from(name)))
    }

    fn temp(number: u32) -> Operand {
        Operand::Name(Name::Temp(number))
    }

    fn binary(dest: u32, lhs: Operand, op: BinOp, rhs: Operand) -> Instruction {
        Instruction::Binary {
            dest: Name::Temp(dest),
            lhs,
            op,
            rhs,
        }
    }

    fn setup(code: Vec<Instruction>, passes: Passes) -> Vec<String> {
        crate::ir::render(&optimize(code, passes).code)
    }

    #[test]
    fn add_zero_is_identity() {
        let code = vec![
            binary(1, var("x"), BinOp::Add, Operand::Int(0)),
            Instruction::Return(Some(temp(1))),
        ];

        assert_eq!(setup(code, Passes::ALGEBRAIC), ["t1 := x", "return t1"]);
    }

    #[test]
    fn times_zero_is_zero() {
        let code = vec![
            binary(1, var("x"), BinOp::Mul, Operand::Int(0)),
            Instruction::Return(Some(temp(1))),
        ];

        assert_eq!(setup(code, Passes::ALGEBRAIC), ["t1 := 0", "return t1"]);
    }

    #[test]
    fn unread_temporaries_are_dead() {
        let code = vec![
            binary(1, var("a"), BinOp::Add, var("b")),
            binary(2, temp(1), BinOp::Mul, Operand::Int(2)),
            Instruction::Return(Some(var("a"))),
        ];

        assert_eq!(setup(code.clone(), Passes::DEAD_CODE), ["return a"]);
        assert_eq!(setup(code, Passes::all()), ["return a"]);
    }

    #[test]
    fn common_subexpression_is_reused() {
        let code = vec![
            binary(1, var("a"), BinOp::Add, var("b")),
            binary(2, var("a"), BinOp::Add, var("b")),
            binary(3, temp(1), BinOp::Mul, temp(2)),
            Instruction::Return(Some(temp(3))),
        ];

        assert_eq!(
            setup(code, Passes::COMMON_SUBEXPRESSIONS),
            ["t1 := a + b", "t2 := t1", "t3 := t1 * t2", "return t3"]
        );
    }

    #[test]
    fn common_subexpression_invalidated_by_redefinition() {
        let code = vec![
            binary(1, var("a"), BinOp::Add, var("b")),
            Instruction::Copy {
                dest: Name::Var(Rc::from("a")),
                source: Operand::Int(3),
            },
            binary(2, var("a"), BinOp::Add, var("b")),
            binary(3, temp(1), BinOp::Mul, temp(2)),
            Instruction::Return(Some(temp(3))),
        ];

        let optimized = setup(code, Passes::COMMON_SUBEXPRESSIONS);
        assert_eq!(optimized[2], "t2 := a + b");
    }

    #[test]
    fn constant_conditions_fold() {
        let code = vec![
            Instruction::JumpIf {
                lhs: Operand::Int(1),
                op: RelOp::Less,
                rhs: Operand::Int(2),
                target: Label::Generated(1),
            },
            Instruction::JumpIf {
                lhs: Operand::Int(2),
                op: RelOp::Less,
                rhs: Operand::Int(1),
                target: Label::Generated(1),
            },
            Instruction::JumpIf {
                lhs: var("x"),
                op: RelOp::NotEqual,
                rhs: var("x"),
                target: Label::Generated(1),
            },
            Instruction::SetLabel(Label::Generated(1)),
        ];

        assert_eq!(
            setup(code, Passes::CONSTANT_CONDITIONS),
            ["goto L1", "L1:"]
        );
    }

    #[test]
    fn equal_operands_decide_the_jump() {
        let jump_if = |op| Instruction::JumpIf {
            lhs: var("x"),
            op,
            rhs: var("x"),
            target: Label::Generated(1),
        };

        let code = vec![
            jump_if(RelOp::Less),
            jump_if(RelOp::Equal),
            Instruction::SetLabel(Label::Generated(1)),
        ];

        assert_eq!(
            setup(code, Passes::CONSTANT_CONDITIONS),
            ["goto L1", "L1:"]
        );
    }

    fn copy(dest: &str, source: Operand) -> Instruction {
        Instruction::Copy {
            dest: Name::Var(Rc::from(dest)),
            source,
        }
    }

    #[test]
    fn copies_propagate_transitively() {
        let code = vec![
            copy("a", var("b")),
            copy("c", var("a")),
            Instruction::Return(Some(var("c"))),
        ];

        assert_eq!(setup(code, Passes::COPY_PROPAGATION), ["return b"]);
    }

    #[test]
    fn redefined_destination_stops_propagation() {
        let code = vec![
            copy("x", var("y")),
            binary(1, var("x"), BinOp::Add, Operand::Int(1)),
            copy("x", Operand::Int(2)),
            binary(2, var("x"), BinOp::Add, temp(1)),
            Instruction::Return(Some(temp(2))),
        ];

        assert_eq!(
            setup(code, Passes::COPY_PROPAGATION),
            ["t1 := y + 1", "t2 := 2 + t1", "return t2"]
        );
    }

    #[test]
    fn redefined_source_stops_propagation() {
        let code = vec![
            copy("x", var("y")),
            copy("y", Operand::Int(3)),
            binary(1, var("x"), BinOp::Add, var("y")),
            Instruction::Return(Some(temp(1))),
        ];

        assert_eq!(
            setup(code, Passes::COPY_PROPAGATION),
            ["x := y", "y := 3", "t1 := x + 3", "return t1"]
        );
    }

    #[test]
    fn labels_and_calls_stop_propagation() {
        let code = vec![
            copy("x", Operand::Int(1)),
            Instruction::SetLabel(Label::Generated(1)),
            binary(1, var("x"), BinOp::Add, Operand::Int(1)),
            Instruction::Return(Some(temp(1))),
        ];

        assert_eq!(
            setup(code, Passes::COPY_PROPAGATION),
            ["x := 1", "L1:", "t1 := x + 1", "return t1"]
        );

        let code = vec![
            copy("x", Operand::Int(1)),
            Instruction::Call {
                function: Rc::from("f"),
                arguments: vec![var("x")],
            },
            binary(1, var("x"), BinOp::Add, Operand::Int(1)),
            Instruction::Return(Some(temp(1))),
        ];

        assert_eq!(
            setup(code, Passes::COPY_PROPAGATION),
            ["x := 1", "call f(1)", "t1 := x + 1", "return t1"]
        );
    }

    #[test]
    fn jump_to_next_instruction() {
        let code = vec![
            Instruction::Jump(Label::Generated(1)),
            Instruction::SetLabel(Label::Generated(1)),
            Instruction::SetLabel(Label::Generated(2)),
            Instruction::Return(None),
        ];

        assert_eq!(setup(code, Passes::JUMPS), ["return"]);
    }

    #[test]
    fn adjacent_labels_merge() {
        let code = vec![
            Instruction::JumpIf {
                lhs: var("x"),
                op: RelOp::Less,
                rhs: Operand::Int(0),
                target: Label::Generated(2),
            },
            Instruction::Return(Some(var("x"))),
            Instruction::SetLabel(Label::Generated(1)),
            Instruction::SetLabel(Label::Generated(2)),
            Instruction::Copy {
                dest: Name::Var(Rc::from("x")),
                source: var("x"),
            },
            Instruction::Return(None),
            Instruction::Return(None),
        ];

        assert_eq!(
            setup(code, Passes::REDUNDANT),
            ["if x < 0 goto L1", "return x", "L1:", "return"]
        );
    }

    #[test]
    fn loop_increment_is_coalesced() {
        let code = vec![
            Instruction::Copy {
                dest: Name::Var(Rc::from("i")),
                source: Operand::Int(0),
            },
            Instruction::SetLabel(Label::Generated(1)),
            Instruction::JumpIf {
                lhs: var("i"),
                op: RelOp::Greater,
                rhs: Operand::Int(2),
                target: Label::Generated(2),
            },
            binary(1, var("i"), BinOp::Add, Operand::Int(1)),
            Instruction::Copy {
                dest: Name::Var(Rc::from("i")),
                source: temp(1),
            },
            Instruction::Jump(Label::Generated(1)),
            Instruction::SetLabel(Label::Generated(2)),
            Instruction::Return(Some(var("i"))),
        ];

        assert_eq!(
            setup(code, Passes::all()),
            [
                "i := 0",
                "L1:",
                "if i > 2 goto L2",
                "i := i + 1",
                "goto L1",
                "L2:",
                "return i"
            ]
        );
    }

    #[test]
    fn fixed_point_is_idempotent() {
        let code = vec![
            Instruction::Copy {
                dest: Name::Var(Rc::from("a")),
                source: Operand::Int(4),
            },
            binary(1, var("a"), BinOp::Mul, Operand::Int(1)),
            binary(2, var("a"), BinOp::Mul, Operand::Int(1)),
            binary(3, temp(1), BinOp::Add, temp(2)),
            Instruction::JumpIf {
                lhs: temp(3),
                op: RelOp::Equal,
                rhs: Operand::Int(0),
                target: Label::Generated(1),
            },
            Instruction::Call {
                function: Rc::from("f"),
                arguments: vec![temp(3)],
            },
            Instruction::SetLabel(Label::Generated(1)),
            Instruction::Return(Some(var("a"))),
        ];

        let first = optimize(code.clone(), Passes::all());
        assert!(first.changes > 0);
        assert!(first.code.len() < code.len());
        assert!(!first.original_by_index.is_empty());

        let second = optimize(first.code.clone(), Passes::all());
        assert_eq!(second.changes, 0);
        assert_eq!(second.code, first.code);
        assert!(second.original_by_index.is_empty());
    }

    #[test]
    fn no_passes_is_identity() {
        let code = vec![
            binary(1, var("x"), BinOp::Add, Operand::Int(0)),
            Instruction::Return(None),
        ];

        let optimization = optimize(code.clone(), Passes::empty());
        assert_eq!(optimization.code, code);
        assert_eq!(optimization.changes, 0);
    }

    #[test]
    fn pass_names() {
        assert_eq!("cse".parse::<Passes>().ok(), Some(Passes::COMMON_SUBEXPRESSIONS));
        assert_eq!("all".parse::<Passes>().ok(), Some(Passes::all()));
        assert!("loop-unrolling".parse::<Passes>().is_err());
    }
}
