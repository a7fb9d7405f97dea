//! Generación de código de tres direcciones.
//!
//! Igual que el análisis semántico, el generador vuelve a recorrer
//! el flujo de tokens con la gramática del parser. Se asume que el
//! programa ya superó todas las fases de verificación.

use std::{mem, rc::Rc};

use super::{BinOp, Instruction, Label, Name, Operand, RelOp};
use crate::{
    lex::{Keyword, Token, TokenKind},
    parse::{Cursor, FIRST_EXPRESSION},
    semantic::{SymbolTable, GLOBAL},
    source::Located,
};

/// Estado de una generación: contadores de temporales y etiquetas.
pub struct Generator<'a> {
    cursor: Cursor<'a>,
    symbols: &'a SymbolTable,
    scopes: Vec<Rc<str>>,
    code: Vec<Instruction>,
    next_temp: u32,
    next_label: u32,
}

/// Traduce un programa verificado a código de tres direcciones.
pub fn generate(tokens: &[Located<Token>], symbols: &SymbolTable) -> Vec<Instruction> {
    let mut generator = Generator::new(tokens, symbols);
    while !generator.cursor.is_done() {
        generator.statement();
    }

    log::debug!("generate: {} instructions", generator.code.len());
    generator.code
}

impl<'a> Generator<'a> {
    pub fn new(tokens: &'a [Located<Token>], symbols: &'a SymbolTable) -> Self {
        Generator {
            cursor: Cursor::new(tokens),
            symbols,
            scopes: vec![Rc::from(GLOBAL)],
            code: Vec::new(),
            next_temp: 1,
            next_label: 1,
        }
    }

    fn temp(&mut self) -> Name {
        let temp = Name::Temp(self.next_temp);
        self.next_temp += 1;
        temp
    }

    fn label(&mut self) -> Label {
        let label = Label::Generated(self.next_label);
        self.next_label += 1;
        label
    }

    fn emit(&mut self, instruction: Instruction) {
        self.code.push(instruction);
    }

    fn statement(&mut self) {
        match self.cursor.peek_kind() {
            Some(TokenKind::Keyword(Keyword::Variavel)) => self.variable_declaration(),
            Some(TokenKind::Keyword(Keyword::Se)) => self.conditional(),
            Some(TokenKind::Keyword(Keyword::Enquanto)) => self.while_loop(),
            Some(TokenKind::Keyword(Keyword::Para)) => self.for_loop(),
            Some(TokenKind::Keyword(Keyword::Funcao)) => self.function_declaration(),
            Some(TokenKind::Keyword(Keyword::Retornar)) => {
                self.cursor.next();

                let value = if self.cursor.is_at_any(FIRST_EXPRESSION) {
                    Some(self.expression())
                } else {
                    None
                };

                self.emit(Instruction::Return(value));
                self.cursor.accept(TokenKind::Semicolon);
            }

            Some(TokenKind::Id) if self.cursor.lookahead(1) == Some(TokenKind::OpenParen) => {
                self.call()
            }

            Some(TokenKind::Id) if self.cursor.lookahead(1) == Some(TokenKind::Assign) => {
                self.assignment()
            }

            _ => {
                self.cursor.next();
            }
        }
    }

    fn variable_declaration(&mut self) {
        // variavel id : tipo
        self.cursor.next();
        let id = self.cursor.accept(TokenKind::Id);
        self.cursor.accept(TokenKind::Colon);
        self.cursor.accept(TokenKind::Type);

        if self.cursor.accept(TokenKind::Assign).is_some() {
            let source = self.expression();
            if let Some(id) = id {
                let dest = self.var(id);
                self.emit(Instruction::Copy { dest, source });
            }
        }

        self.cursor.accept(TokenKind::Semicolon);
    }

    fn assignment(&mut self) {
        let id = match self.cursor.next() {
            Some(id) => id,
            None => return,
        };

        self.cursor.accept(TokenKind::Assign);
        let source = self.expression();

        let dest = self.var(id);
        self.emit(Instruction::Copy { dest, source });
        self.cursor.accept(TokenKind::Semicolon);
    }

    fn conditional(&mut self) {
        self.cursor.next();

        let otherwise = self.label();
        self.condition(otherwise.clone());
        self.block();

        if self
            .cursor
            .accept(TokenKind::Keyword(Keyword::Senao))
            .is_some()
        {
            let end = self.label();
            self.emit(Instruction::Jump(end.clone()));
            self.emit(Instruction::SetLabel(otherwise));

            self.block();
            self.emit(Instruction::SetLabel(end));
        } else {
            self.emit(Instruction::SetLabel(otherwise));
        }
    }

    fn while_loop(&mut self) {
        self.cursor.next();

        let start = self.label();
        let end = self.label();

        self.emit(Instruction::SetLabel(start.clone()));
        self.condition(end.clone());
        self.block();

        self.emit(Instruction::Jump(start));
        self.emit(Instruction::SetLabel(end));
    }

    fn for_loop(&mut self) {
        self.cursor.next();
        self.cursor.accept(TokenKind::OpenParen);

        if self.cursor.is_at(TokenKind::Id) {
            self.assignment();
        }

        let start = self.label();
        let end = self.label();

        self.emit(Instruction::SetLabel(start.clone()));
        self.negated_jump(end.clone());
        self.cursor.accept(TokenKind::Semicolon);

        // El incremento se genera aparte y se reinserta tras el cuerpo
        let outer = mem::take(&mut self.code);
        if self.cursor.is_at(TokenKind::Id) {
            self.assignment();
        }

        let increment = mem::replace(&mut self.code, outer);

        self.cursor.accept(TokenKind::CloseParen);
        self.block();

        self.code.extend(increment);
        self.emit(Instruction::Jump(start));
        self.emit(Instruction::SetLabel(end));
    }

    fn function_declaration(&mut self) {
        self.cursor.next();

        let name = match self.cursor.accept(TokenKind::Id) {
            Some(id) => id.as_ref().name(),
            None => return,
        };

        // Los parámetros ya fueron resueltos por el análisis semántico
        self.cursor.skip_until(&[TokenKind::CloseParen]);
        self.cursor.accept(TokenKind::CloseParen);

        let end = self.label();
        self.emit(Instruction::Jump(end.clone()));
        self.emit(Instruction::SetLabel(Label::Function(name.clone())));

        self.scopes.push(name);
        self.block();
        self.scopes.pop();

        // Un cuerpo sin `retornar` también debe volver a quien llama
        self.emit(Instruction::Return(None));
        self.emit(Instruction::SetLabel(end));
    }

    fn call(&mut self) {
        let function = match self.cursor.next() {
            Some(id) => id.as_ref().name(),
            None => return,
        };

        self.cursor.accept(TokenKind::OpenParen);

        let mut arguments = Vec::new();
        while self.cursor.is_at_any(FIRST_EXPRESSION) {
            arguments.push(self.expression());
            if self.cursor.accept(TokenKind::Comma).is_none() {
                break;
            }
        }

        self.cursor.accept(TokenKind::CloseParen);
        self.cursor.accept(TokenKind::Semicolon);

        self.emit(Instruction::Call {
            function,
            arguments,
        });
    }

    fn block(&mut self) {
        if self.cursor.accept(TokenKind::OpenCurly).is_none() {
            return;
        }

        while !self.cursor.is_done() && !self.cursor.is_at(TokenKind::CloseCurly) {
            self.statement();
        }

        self.cursor.accept(TokenKind::CloseCurly);
    }

    /// `( relacional )` seguido de un salto si la condición es falsa.
    fn condition(&mut self, otherwise: Label) {
        self.cursor.accept(TokenKind::OpenParen);
        self.negated_jump(otherwise);
        self.cursor.accept(TokenKind::CloseParen);
    }

    /// Salta a `target` cuando la relación no se cumple.
    ///
    /// Una expresión sin operador relacional es falsa si vale cero.
    fn negated_jump(&mut self, target: Label) {
        let lhs = self.expression();

        let op = match self.cursor.peek_kind() {
            Some(TokenKind::Equal) => RelOp::Equal,
            Some(TokenKind::Less) => RelOp::Less,
            Some(TokenKind::LessOrEqual) => RelOp::LessOrEqual,
            Some(TokenKind::Greater) => RelOp::Greater,
            Some(TokenKind::GreaterOrEqual) => RelOp::GreaterOrEqual,

            _ => {
                self.emit(Instruction::JumpIf {
                    lhs,
                    op: RelOp::Equal,
                    rhs: Operand::Int(0),
                    target,
                });

                return;
            }
        };

        self.cursor.next();
        let rhs = self.expression();

        self.emit(Instruction::JumpIf {
            lhs,
            op: op.negate(),
            rhs,
            target,
        });
    }

    fn expression(&mut self) -> Operand {
        let mut lhs = self.term();
        loop {
            let op = match self.cursor.peek_kind() {
                Some(TokenKind::Plus) => BinOp::Add,
                Some(TokenKind::Minus) => BinOp::Sub,
                _ => break lhs,
            };

            self.cursor.next();
            let rhs = self.term();
            lhs = self.binary(lhs, op, rhs);
        }
    }

    fn term(&mut self) -> Operand {
        let mut lhs = self.factor();
        loop {
            let op = match self.cursor.peek_kind() {
                Some(TokenKind::Times) => BinOp::Mul,
                Some(TokenKind::Divide) => BinOp::Div,
                _ => break lhs,
            };

            self.cursor.next();
            let rhs = self.factor();
            lhs = self.binary(lhs, op, rhs);
        }
    }

    fn factor(&mut self) -> Operand {
        let token = match self.cursor.next() {
            Some(token) => token,
            None => return Operand::Int(0),
        };

        let lexeme = token.as_ref().lexeme();
        match token.as_ref().kind() {
            TokenKind::Id => Operand::Name(self.var(token)),
            TokenKind::Number => Operand::Int(lexeme.parse().unwrap_or_default()),
            TokenKind::Decimal => Operand::Decimal(token.as_ref().name()),
            TokenKind::Str => Operand::Text(token.as_ref().name()),

            TokenKind::OpenParen => {
                let inner = self.expression();
                self.cursor.accept(TokenKind::CloseParen);
                inner
            }

            _ => Operand::Int(0),
        }
    }

    fn binary(&mut self, lhs: Operand, op: BinOp, rhs: Operand) -> Operand {
        let dest = self.temp();
        self.emit(Instruction::Binary {
            dest: dest.clone(),
            lhs,
            op,
            rhs,
        });

        Operand::Name(dest)
    }

    /// Nombre de una variable en el ámbito actual.
    ///
    /// Una variable local que oculta a una global del mismo nombre se
    /// califica con el nombre de su función, de forma que ambas
    /// permanezcan distintas en el resto del pipeline.
    fn var(&self, id: &Located<Token>) -> Name {
        let name = id.as_ref().name();
        let scope = match self.scopes.last() {
            Some(scope) if &**scope != GLOBAL => scope,
            _ => return Name::Var(name),
        };

        let local = self
            .symbols
            .lookup(&name, scope)
            .map_or(false, |symbol| symbol.scope() == scope);

        if local && self.symbols.lookup(&name, GLOBAL).is_some() {
            Name::Var(Rc::from(format!("{}.{}", scope, name)))
        } else {
            Name::Var(name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ir::render, lex::tokenize, semantic::analyze};

    fn setup(source: &str) -> Vec<String> {
        let (tokens, _) = tokenize(source);
        let analysis = analyze(&tokens);

        render(&generate(&tokens, &analysis.symbols))
    }

    #[test]
    fn straight_line() {
        let code = setup(
            "variavel a : inteiro = 5;\n\
             variavel b : inteiro = 10;\n\
             variavel c : inteiro = a + b;\n\
             retornar c;",
        );

        assert_eq!(code, ["a := 5", "b := 10", "t1 := a + b", "c := t1", "return c"]);
    }

    #[test]
    fn declaration_without_initializer_is_silent() {
        assert!(setup("variavel a : inteiro;").is_empty());
    }

    #[test]
    fn precedence() {
        let code = setup("x = 1 + 2 * (3 - y);");
        assert_eq!(
            code,
            ["t1 := 3 - y", "t2 := 2 * t1", "t3 := 1 + t2", "x := t3"]
        );
    }

    #[test]
    fn conditional_with_else() {
        let code = setup("se (a == b) { x = 1; } senao { x = 2; }");
        assert_eq!(
            code,
            [
                "if a != b goto L1",
                "x := 1",
                "goto L2",
                "L1:",
                "x := 2",
                "L2:"
            ]
        );
    }

    #[test]
    fn while_loop() {
        let code = setup("enquanto (i < 3) { i = i + 1; }");
        assert_eq!(
            code,
            [
                "L1:",
                "if i >= 3 goto L2",
                "t1 := i + 1",
                "i := t1",
                "goto L1",
                "L2:"
            ]
        );
    }

    #[test]
    fn for_loop_reinserts_increment() {
        let code = setup("para (i = 0; i <= 2; i = i + 1) { f(i); }");
        assert_eq!(
            code,
            [
                "i := 0",
                "L1:",
                "if i > 2 goto L2",
                "call f(i)",
                "t1 := i + 1",
                "i := t1",
                "goto L1",
                "L2:"
            ]
        );
    }

    #[test]
    fn condition_without_relation() {
        let code = setup("enquanto (x) { }");
        assert_eq!(code, ["L1:", "if x == 0 goto L2", "goto L1", "L2:"]);
    }

    #[test]
    fn functions_are_skipped_over() {
        let code = setup(
            "variavel n : inteiro = 1;\n\
             funcao f(n: inteiro, m: inteiro) { retornar n + m; }\n\
             f(n, 2);",
        );

        assert_eq!(
            code,
            [
                "n := 1",
                "goto L1",
                "f:",
                "t1 := f.n + m",
                "return t1",
                "return",
                "L1:",
                "call f(n, 2)"
            ]
        );
    }
}
