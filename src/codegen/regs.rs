//! Asignación de registros.
//!
//! Cada nombre distinto del programa recibe un registro fijo del
//! conjunto `R1..RA`, en orden de primera aparición. No hay spilling:
//! si hay más nombres que registros, la asignación da la vuelta y
//! algunos nombres comparten registro.

use std::fmt::{self, Display};

use indexmap::IndexMap;

use crate::ir::{self, Instruction, Name};

/// Un registro de SimpSIM, `R0` a `RF`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Reg(u8);

impl Reg {
    /// Operando derecho de `jmpEQ` y `jmpLE`.
    pub const COMPARE: Reg = Reg(0x0);

    /// Temporales de traducción para operandos izquierdo y derecho.
    pub const SCRATCH_LHS: Reg = Reg(0xB);
    pub const SCRATCH_RHS: Reg = Reg(0xC);

    /// Operandos de las subrutinas de multiplicación y división.
    pub const OPERAND_LHS: Reg = Reg(0xD);
    pub const OPERAND_RHS: Reg = Reg(0xE);

    /// Resultado de subrutinas y valor de retorno del programa.
    pub const RESULT: Reg = Reg(0xF);

    const FIRST_FREE: u8 = 0x1;
    const LAST_FREE: u8 = 0xA;
}

impl Display for Reg {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "R{:X}", self.0)
    }
}

/// Registro asignado a cada nombre de un programa.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RegisterMap {
    regs: IndexMap<Name, Reg>,
    shared: bool,
}

impl RegisterMap {
    pub fn assign(code: &[Instruction]) -> Self {
        let pool = (Reg::LAST_FREE - Reg::FIRST_FREE + 1) as usize;
        let mut map = RegisterMap::default();

        for name in ir::names(code) {
            if map.regs.contains_key(name) {
                continue;
            }

            let count = map.regs.len();
            if count == pool {
                log::warn!(
                    "more than {} names in program, `{}` and later names will share registers",
                    pool,
                    name
                );

                map.shared = true;
            }

            let reg = Reg(Reg::FIRST_FREE + (count % pool) as u8);
            map.regs.insert(name.clone(), reg);
        }

        map
    }

    pub fn get(&self, name: &Name) -> Option<Reg> {
        self.regs.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Name, Reg)> {
        self.regs.iter().map(|(name, reg)| (name, *reg))
    }

    pub fn len(&self) -> usize {
        self.regs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regs.is_empty()
    }

    /// Determina si algún registro quedó asignado a más de un nombre.
    pub fn is_shared(&self) -> bool {
        self.shared
    }
}

impl Display for RegisterMap {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, reg) in self.iter() {
            writeln!(fmt, "{:<16} {}", name, reg)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BinOp, Operand};
    use std::rc::Rc;

    fn var(name: &str) -> Name {
        Name::Var(Rc::from(name))
    }

    #[test]
    fn first_appearance_order() {
        let code = vec![
            Instruction::Binary {
                dest: Name::Temp(1),
                lhs: var("b").into(),
                op: BinOp::Add,
                rhs: var("a").into(),
            },
            Instruction::Return(Some(Operand::Name(var("b")))),
        ];

        let map = RegisterMap::assign(&code);
        assert_eq!(map.get(&Name::Temp(1)), Some(Reg(1)));
        assert_eq!(map.get(&var("b")), Some(Reg(2)));
        assert_eq!(map.get(&var("a")), Some(Reg(3)));
        assert_eq!(map.len(), 3);
        assert!(!map.is_shared());

        assert_eq!(RegisterMap::assign(&code), map);
    }

    #[test]
    fn exhausted_pool_wraps_around() {
        let code: Vec<_> = (1..=12)
            .map(|number| Instruction::Copy {
                dest: Name::Temp(number),
                source: Operand::Int(0),
            })
            .collect();

        let map = RegisterMap::assign(&code);
        assert!(map.is_shared());
        assert_eq!(map.get(&Name::Temp(10)), Some(Reg(0xA)));
        assert_eq!(map.get(&Name::Temp(11)), Some(Reg(0x1)));
        assert_eq!(Reg(0xA).to_string(), "RA");
    }
}
