//! Análisis semántico.
//!
//! Un único recorrido lineal sobre el flujo de tokens, ya validado
//! por el parser, que mantiene una pila de ámbitos. La búsqueda de
//! símbolos consulta el ámbito actual y luego el global, nunca
//! ámbitos intermedios. Los bloques de `se`, `enquanto` y `para` no
//! introducen ámbitos; solo los cuerpos de funciones lo hacen.

use std::{
    fmt::{self, Display},
    rc::Rc,
};

use indexmap::IndexMap;
use thiserror::Error;

use crate::{
    lex::{Keyword, Token, TokenKind},
    parse::{Cursor, FIRST_EXPRESSION},
    source::{Located, Location},
};

/// Nombre del ámbito exterior.
pub const GLOBAL: &str = "global";

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    Inteiro,
    Decimal,
    Texto,
    Logico,
    Void,
}

impl Type {
    /// Tipo denotado por una anotación.
    pub fn annotation(lexeme: &str) -> Option<Type> {
        match lexeme {
            "inteiro" => Some(Type::Inteiro),
            "decimal" => Some(Type::Decimal),
            "texto" => Some(Type::Texto),
            "logico" => Some(Type::Logico),
            _ => None,
        }
    }

    fn is_numeric(self) -> bool {
        matches!(self, Type::Inteiro | Type::Decimal)
    }
}

impl Display for Type {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let string = match self {
            Type::Inteiro => "inteiro",
            Type::Decimal => "decimal",
            Type::Texto => "texto",
            Type::Logico => "logico",
            Type::Void => "void",
        };

        fmt.write_str(string)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Category {
    Variable,
    Function,
}

impl Display for Category {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Variable => fmt.write_str("variable"),
            Category::Function => fmt.write_str("function"),
        }
    }
}

/// Valor estático de una expresión construida solo con literales.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Int(i64),
    Decimal(f64),
    Text(Rc<str>),
}

impl Value {
    /// Ajusta el valor al tipo declarado de su destino.
    fn cast(self, typ: Type) -> Option<Value> {
        match (self, typ) {
            (Value::Int(int), Type::Decimal) => Some(Value::Decimal(int as f64)),
            (Value::Decimal(decimal), Type::Inteiro) => Some(Value::Int(decimal.trunc() as i64)),
            (value @ Value::Int(_), Type::Inteiro)
            | (value @ Value::Decimal(_), Type::Decimal)
            | (value @ Value::Text(_), Type::Texto) => Some(value),
            _ => None,
        }
    }
}

impl Display for Value {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(int) => write!(fmt, "{}", int),
            Value::Decimal(decimal) => write!(fmt, "{:?}", decimal),
            Value::Text(text) => write!(fmt, "{:?}", text),
        }
    }
}

/// Una entrada de la tabla de símbolos.
#[derive(Clone, Debug)]
pub struct Symbol {
    name: Rc<str>,
    typ: Type,
    category: Category,
    scope: Rc<str>,
    location: Location,
    initialized: bool,
    used: bool,
    value: Option<Value>,
    parameters: Vec<Type>,
}

impl Symbol {
    pub fn name(&self) -> &Rc<str> {
        &self.name
    }

    pub fn typ(&self) -> Type {
        self.typ
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn scope(&self) -> &Rc<str> {
        &self.scope
    }

    /// Línea de la declaración.
    pub fn line(&self) -> u32 {
        self.location.start().line()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_used(&self) -> bool {
        self.used
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Tipos de los parámetros, vacío para variables.
    pub fn parameters(&self) -> &[Type] {
        &self.parameters
    }
}

/// Símbolos en orden de declaración, únicos por ámbito.
#[derive(Default, Debug)]
pub struct SymbolTable {
    symbols: IndexMap<(Rc<str>, Rc<str>), Symbol>,
}

impl SymbolTable {
    /// Busca en `scope` y luego en el ámbito global.
    pub fn lookup(&self, name: &str, scope: &str) -> Option<&Symbol> {
        self.find(name, scope)
            .or_else(|| self.find(name, GLOBAL))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.values()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    fn find(&self, name: &str, scope: &str) -> Option<&Symbol> {
        self.symbols.get(&(Rc::from(scope), Rc::from(name)))
    }

    fn lookup_mut(&mut self, name: &str, scope: &str) -> Option<&mut Symbol> {
        let key = self
            .find(name, scope)
            .or_else(|| self.find(name, GLOBAL))
            .map(|symbol| (symbol.scope.clone(), symbol.name.clone()))?;

        self.symbols.get_mut(&key)
    }
}

impl Display for SymbolTable {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            fmt,
            "{:<16} {:<8} {:<9} {:<12} {:>5}  {:<11} {:<5} value",
            "name", "type", "category", "scope", "line", "initialized", "used"
        )?;

        for symbol in self.iter() {
            let value = symbol
                .value
                .as_ref()
                .map_or_else(|| String::from("-"), Value::to_string);

            writeln!(
                fmt,
                "{:<16} {:<8} {:<9} {:<12} {:>5}  {:<11} {:<5} {}",
                symbol.name,
                symbol.typ,
                symbol.category,
                symbol.scope,
                symbol.line(),
                symbol.initialized,
                symbol.used,
                value
            )?;
        }

        Ok(())
    }
}

/// Pérdida asociada a una conversión implícita.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Loss {
    Precision,
    Information,
}

impl Display for Loss {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Loss::Precision => fmt.write_str("precision"),
            Loss::Information => fmt.write_str("information"),
        }
    }
}

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SemanticError {
    #[error("Redeclaration of `{0}` in scope `{1}`")]
    Redeclaration(Rc<str>, Rc<str>),

    #[error("Implicit cast from `{from}` to `{to}` in {context}, possible loss of {loss}")]
    ImplicitCast {
        from: Type,
        to: Type,
        context: String,
        loss: Loss,
    },

    #[error("Incompatible types in {context}: expected `{expected}`, found `{found}`")]
    Incompatible {
        expected: Type,
        found: Type,
        context: String,
    },

    #[error("Variable `{0}` is not declared")]
    UndeclaredVariable(Rc<str>),

    #[error("Function `{0}` is not declared")]
    UndeclaredFunction(Rc<str>),

    #[error("`{0}` is not a function")]
    NotAFunction(Rc<str>),

    #[error("Wrong number of arguments in call to `{function}`: expected {expected}, received {received}")]
    ArgumentCount {
        function: Rc<str>,
        expected: usize,
        received: usize,
    },

    #[error("Variable `{0}` used before being initialized")]
    UninitializedUse(Rc<str>),

    #[error("Operator `{0}` cannot be applied to type `{1}`")]
    OperatorType(Rc<str>, Type),

    #[error("Division by zero in constant expression")]
    DivisionByZero,

    #[error("Variable `{0}` declared but never initialized")]
    NeverInitialized(Rc<str>),

    #[error("Variable `{0}` declared but never used")]
    NeverUsed(Rc<str>),
}

pub type Semantic<T> = Result<T, Located<SemanticError>>;

/// Resultado del análisis semántico.
pub struct Analysis {
    pub errors: Vec<Located<SemanticError>>,
    pub symbols: SymbolTable,
}

/// Analiza un programa sintácticamente válido.
pub fn analyze(tokens: &[Located<Token>]) -> Analysis {
    let mut analyzer = Analyzer {
        cursor: Cursor::new(tokens),
        symbols: SymbolTable::default(),
        scopes: vec![Rc::from(GLOBAL)],
        errors: Vec::new(),
    };

    while !analyzer.cursor.is_done() {
        analyzer.statement();
    }

    analyzer.finish()
}

/// Tipo y, si la expresión es puramente literal, valor de una expresión.
///
/// Un tipo ausente indica que la expresión ya produjo un error y no
/// debe seguir verificándose.
#[derive(Clone, Debug, Default)]
struct Eval {
    typ: Option<Type>,
    value: Option<Value>,
}

struct Analyzer<'a> {
    cursor: Cursor<'a>,
    symbols: SymbolTable,
    scopes: Vec<Rc<str>>,
    errors: Vec<Located<SemanticError>>,
}

impl<'a> Analyzer<'a> {
    fn statement(&mut self) {
        let token = match self.cursor.peek() {
            Some(token) => token,
            None => return,
        };

        match token.as_ref().kind() {
            TokenKind::Keyword(Keyword::Variavel) => self.variable_declaration(),
            TokenKind::Keyword(Keyword::Funcao) => self.function_declaration(),
            TokenKind::Keyword(Keyword::Se) => self.conditional(),
            TokenKind::Keyword(Keyword::Enquanto) => self.while_loop(),
            TokenKind::Keyword(Keyword::Para) => self.for_loop(),
            TokenKind::Keyword(Keyword::Retornar) => {
                self.cursor.next();
                if self.cursor.is_at_any(FIRST_EXPRESSION) {
                    self.expression();
                }

                self.cursor.accept(TokenKind::Semicolon);
            }

            TokenKind::Id => match self.cursor.lookahead(1) {
                Some(TokenKind::Assign) => self.assignment(),
                Some(TokenKind::OpenParen) => self.call(),
                _ => {
                    self.cursor.next();
                    self.read(token);
                }
            },

            _ => {
                self.cursor.next();
            }
        }
    }

    fn variable_declaration(&mut self) {
        self.cursor.next();

        let id = match self.cursor.accept(TokenKind::Id) {
            Some(id) => id,
            None => return,
        };

        self.cursor.accept(TokenKind::Colon);
        let typ = match self
            .cursor
            .accept(TokenKind::Type)
            .and_then(|typ| Type::annotation(typ.as_ref().lexeme()))
        {
            Some(typ) => typ,
            None => return,
        };

        let scope = self.scope();
        let declared = self.declare(id, typ, Category::Variable, scope.clone());

        if self.cursor.accept(TokenKind::Assign).is_some() {
            let eval = self.expression();
            let name = id.as_ref().name();

            if let Some(found) = eval.typ {
                let context = format!("assignment to `{}`", name);
                self.check_compatible(typ, found, context, id.location());
            }

            if declared {
                if let Some(symbol) = self.symbols.lookup_mut(&name, &scope) {
                    symbol.initialized = true;
                    symbol.value = eval.value.and_then(|value| value.cast(typ));
                }
            }
        }

        self.cursor.accept(TokenKind::Semicolon);
    }

    fn assignment(&mut self) {
        let id = match self.cursor.next() {
            Some(id) => id,
            None => return,
        };

        self.cursor.next();
        let eval = self.expression();

        let name = id.as_ref().name();
        let scope = self.scope();

        match self.symbols.lookup(&name, &scope).map(Symbol::typ) {
            None => self.error(SemanticError::UndeclaredVariable(name), id.location()),

            Some(typ) => {
                if let Some(found) = eval.typ {
                    let context = format!("assignment to `{}`", name);
                    self.check_compatible(typ, found, context, id.location());
                }

                if let Some(symbol) = self.symbols.lookup_mut(&name, &scope) {
                    symbol.initialized = true;
                    symbol.value = eval.value.and_then(|value| value.cast(typ));
                }
            }
        }

        self.cursor.accept(TokenKind::Semicolon);
    }

    fn conditional(&mut self) {
        self.cursor.next();
        self.condition();
        self.block();

        if self
            .cursor
            .accept(TokenKind::Keyword(Keyword::Senao))
            .is_some()
        {
            self.block();
        }
    }

    fn while_loop(&mut self) {
        self.cursor.next();
        self.condition();
        self.block();
    }

    fn for_loop(&mut self) {
        self.cursor.next();
        self.cursor.accept(TokenKind::OpenParen);

        if self.cursor.is_at(TokenKind::Id) {
            self.assignment();
        }

        if self.cursor.is_at_any(FIRST_EXPRESSION) {
            self.relational();
        }

        self.cursor.accept(TokenKind::Semicolon);
        if self.cursor.is_at(TokenKind::Id) {
            self.assignment();
        }

        self.cursor.accept(TokenKind::CloseParen);
        self.block();
    }

    fn function_declaration(&mut self) {
        self.cursor.next();

        let id = match self.cursor.accept(TokenKind::Id) {
            Some(id) => id,
            None => return,
        };

        let name = id.as_ref().name();
        let global: Rc<str> = Rc::from(GLOBAL);
        let declared = self.declare(id, Type::Void, Category::Function, global.clone());

        self.scopes.push(name.clone());
        self.cursor.accept(TokenKind::OpenParen);

        let mut parameters = Vec::new();
        while let Some(parameter) = self.cursor.accept(TokenKind::Id) {
            self.cursor.accept(TokenKind::Colon);

            let typ = self
                .cursor
                .accept(TokenKind::Type)
                .and_then(|typ| Type::annotation(typ.as_ref().lexeme()));

            if let Some(typ) = typ {
                parameters.push(typ);
                if self.declare(parameter, typ, Category::Variable, name.clone()) {
                    if let Some(symbol) = self.symbols.lookup_mut(&parameter.as_ref().name(), &name) {
                        symbol.initialized = true;
                    }
                }
            }

            if self.cursor.accept(TokenKind::Comma).is_none() {
                break;
            }
        }

        if declared {
            if let Some(symbol) = self.symbols.lookup_mut(&name, &global) {
                symbol.initialized = true;
                symbol.parameters = parameters;
            }
        }

        self.cursor.accept(TokenKind::CloseParen);
        self.block();
        self.scopes.pop();
    }

    fn call(&mut self) {
        let id = match self.cursor.next() {
            Some(id) => id,
            None => return,
        };

        let name = id.as_ref().name();
        let scope = self.scope();

        let parameters = match self.symbols.lookup_mut(&name, &scope) {
            None => {
                self.error(SemanticError::UndeclaredFunction(name.clone()), id.location());
                None
            }

            Some(symbol) if symbol.category != Category::Function => {
                self.error(SemanticError::NotAFunction(name.clone()), id.location());
                None
            }

            Some(symbol) => {
                symbol.used = true;
                Some(symbol.parameters.clone())
            }
        };

        self.cursor.accept(TokenKind::OpenParen);

        let mut arguments = Vec::new();
        while self.cursor.is_at_any(FIRST_EXPRESSION) {
            arguments.push(self.expression().typ);
            if self.cursor.accept(TokenKind::Comma).is_none() {
                break;
            }
        }

        self.cursor.accept(TokenKind::CloseParen);
        self.cursor.accept(TokenKind::Semicolon);

        let parameters = match parameters {
            Some(parameters) => parameters,
            None => return,
        };

        if parameters.len() != arguments.len() {
            let error = SemanticError::ArgumentCount {
                function: name,
                expected: parameters.len(),
                received: arguments.len(),
            };

            self.error(error, id.location());
            return;
        }

        for (index, (expected, found)) in parameters.into_iter().zip(arguments).enumerate() {
            if let Some(found) = found {
                let context = format!("argument {} of call to `{}`", index + 1, name);
                self.check_compatible(expected, found, context, id.location());
            }
        }
    }

    /// `( relacional )`
    fn condition(&mut self) {
        self.cursor.accept(TokenKind::OpenParen);
        if self.cursor.is_at_any(FIRST_EXPRESSION) {
            self.relational();
        }

        self.cursor.accept(TokenKind::CloseParen);
    }

    /// `{ declaración* }`, hasta la llave que cierra el bloque.
    fn block(&mut self) {
        if self.cursor.accept(TokenKind::OpenCurly).is_none() {
            return;
        }

        while !self.cursor.is_done() && !self.cursor.is_at(TokenKind::CloseCurly) {
            self.statement();
        }

        self.cursor.accept(TokenKind::CloseCurly);
    }

    fn relational(&mut self) -> Eval {
        let lhs = self.expression();

        let operator = match self.cursor.peek() {
            Some(operator) if operator.as_ref().kind().is_relational() => operator,
            _ => return lhs,
        };

        self.cursor.next();
        let rhs = self.expression();

        if let (Some(lhs), Some(rhs)) = (lhs.typ, rhs.typ) {
            let comparable = lhs == rhs || (lhs.is_numeric() && rhs.is_numeric());
            if !comparable {
                let error = SemanticError::Incompatible {
                    expected: lhs,
                    found: rhs,
                    context: String::from("comparison"),
                };

                self.error(error, operator.location());
            }
        }

        Eval {
            typ: Some(Type::Logico),
            value: None,
        }
    }

    fn expression(&mut self) -> Eval {
        let mut lhs = self.term();
        while let Some(operator) = self.cursor.peek() {
            match operator.as_ref().kind() {
                TokenKind::Plus | TokenKind::Minus => {
                    self.cursor.next();
                    let rhs = self.term();
                    lhs = self.binary(lhs, operator, rhs);
                }

                _ => break,
            }
        }

        lhs
    }

    fn term(&mut self) -> Eval {
        let mut lhs = self.factor();
        while let Some(operator) = self.cursor.peek() {
            match operator.as_ref().kind() {
                TokenKind::Times | TokenKind::Divide => {
                    self.cursor.next();
                    let rhs = self.factor();
                    lhs = self.binary(lhs, operator, rhs);
                }

                _ => break,
            }
        }

        lhs
    }

    fn factor(&mut self) -> Eval {
        let token = match self.cursor.next() {
            Some(token) => token,
            None => return Eval::default(),
        };

        let lexeme = token.as_ref().lexeme();
        match token.as_ref().kind() {
            TokenKind::Id => Eval {
                typ: self.read(token),
                value: None,
            },

            TokenKind::Number => Eval {
                typ: Some(Type::Inteiro),
                value: lexeme.parse().ok().map(Value::Int),
            },

            TokenKind::Decimal => Eval {
                typ: Some(Type::Decimal),
                value: lexeme.parse().ok().map(Value::Decimal),
            },

            TokenKind::Str => {
                let text = lexeme
                    .strip_prefix('"')
                    .and_then(|text| text.strip_suffix('"'))
                    .unwrap_or(lexeme);

                Eval {
                    typ: Some(Type::Texto),
                    value: Some(Value::Text(Rc::from(text))),
                }
            }

            TokenKind::OpenParen => {
                let eval = self.expression();
                self.cursor.accept(TokenKind::CloseParen);
                eval
            }

            _ => Eval::default(),
        }
    }

    /// Lectura de un identificador en una expresión.
    fn read(&mut self, id: &Located<Token>) -> Option<Type> {
        let name = id.as_ref().name();
        let scope = self.scope();

        let (typ, initialized) = match self.symbols.lookup_mut(&name, &scope) {
            Some(symbol) => {
                symbol.used = true;
                let initialized = symbol.initialized || symbol.category == Category::Function;

                (symbol.typ, initialized)
            }

            None => {
                self.error(SemanticError::UndeclaredVariable(name), id.location());
                return None;
            }
        };

        if !initialized {
            self.error(SemanticError::UninitializedUse(name), id.location());
        }

        Some(typ)
    }

    fn binary(&mut self, lhs: Eval, operator: &Located<Token>, rhs: Eval) -> Eval {
        let (lhs_type, rhs_type) = match (lhs.typ, rhs.typ) {
            (Some(lhs), Some(rhs)) => (lhs, rhs),
            _ => return Eval::default(),
        };

        let bad_operand = [lhs_type, rhs_type]
            .into_iter()
            .find(|typ| !typ.is_numeric());

        if let Some(typ) = bad_operand {
            let error = SemanticError::OperatorType(operator.as_ref().name(), typ);
            self.error(error, operator.location());

            return Eval::default();
        }

        let typ = if lhs_type == Type::Decimal || rhs_type == Type::Decimal {
            Type::Decimal
        } else {
            Type::Inteiro
        };

        let value = match (lhs.value, rhs.value) {
            (Some(lhs), Some(rhs)) => self.fold(lhs, operator, rhs),
            _ => None,
        };

        Eval {
            typ: Some(typ),
            value,
        }
    }

    fn fold(&mut self, lhs: Value, operator: &Located<Token>, rhs: Value) -> Option<Value> {
        let kind = operator.as_ref().kind();

        let is_zero = match rhs {
            Value::Int(int) => int == 0,
            Value::Decimal(decimal) => decimal == 0.0,
            Value::Text(_) => false,
        };

        if kind == TokenKind::Divide && is_zero {
            self.error(SemanticError::DivisionByZero, operator.location());
            return None;
        }

        match (lhs, rhs) {
            (Value::Int(lhs), Value::Int(rhs)) => {
                let result = match kind {
                    TokenKind::Plus => lhs.checked_add(rhs),
                    TokenKind::Minus => lhs.checked_sub(rhs),
                    TokenKind::Times => lhs.checked_mul(rhs),
                    TokenKind::Divide => lhs.checked_div(rhs),
                    _ => None,
                };

                result.map(Value::Int)
            }

            (lhs, rhs) => {
                let (lhs, rhs) = (as_decimal(&lhs)?, as_decimal(&rhs)?);
                let result = match kind {
                    TokenKind::Plus => lhs + rhs,
                    TokenKind::Minus => lhs - rhs,
                    TokenKind::Times => lhs * rhs,
                    TokenKind::Divide => lhs / rhs,
                    _ => return None,
                };

                Some(Value::Decimal(result))
            }
        }
    }

    /// Registra un símbolo. Retorna `false` si ya existía en el ámbito.
    fn declare(
        &mut self,
        id: &Located<Token>,
        typ: Type,
        category: Category,
        scope: Rc<str>,
    ) -> bool {
        let name = id.as_ref().name();
        let key = (scope.clone(), name.clone());

        if self.symbols.symbols.contains_key(&key) {
            self.error(SemanticError::Redeclaration(name, scope), id.location());
            return false;
        }

        let symbol = Symbol {
            name,
            typ,
            category,
            scope,
            location: id.location().clone(),
            initialized: false,
            used: false,
            value: None,
            parameters: Vec::new(),
        };

        self.symbols.symbols.insert(key, symbol);
        true
    }

    /// Regla de compatibilidad de asignaciones y argumentos.
    fn check_compatible(&mut self, expected: Type, found: Type, context: String, location: &Location) {
        let error = match (expected, found) {
            _ if expected == found => return,

            (Type::Decimal, Type::Inteiro) => SemanticError::ImplicitCast {
                from: found,
                to: expected,
                context,
                loss: Loss::Precision,
            },

            (Type::Inteiro, Type::Decimal) => SemanticError::ImplicitCast {
                from: found,
                to: expected,
                context,
                loss: Loss::Information,
            },

            _ => SemanticError::Incompatible {
                expected,
                found,
                context,
            },
        };

        self.error(error, location);
    }

    fn scope(&self) -> Rc<str> {
        self.scopes
            .last()
            .cloned()
            .unwrap_or_else(|| Rc::from(GLOBAL))
    }

    fn error(&mut self, error: SemanticError, location: &Location) {
        self.errors.push(Located::at(error, location.clone()));
    }

    fn finish(mut self) -> Analysis {
        let variables = || {
            self.symbols
                .iter()
                .filter(|symbol| symbol.category == Category::Variable)
        };

        let never_initialized = variables()
            .filter(|symbol| !symbol.initialized)
            .map(|symbol| {
                let error = SemanticError::NeverInitialized(symbol.name.clone());
                Located::at(error, symbol.location.clone())
            });

        let never_used = variables().filter(|symbol| !symbol.used).map(|symbol| {
            let error = SemanticError::NeverUsed(symbol.name.clone());
            Located::at(error, symbol.location.clone())
        });

        let late: Vec<_> = never_initialized.chain(never_used).collect();
        self.errors.extend(late);

        log::debug!(
            "semantic: {} symbols, {} errors",
            self.symbols.len(),
            self.errors.len()
        );

        Analysis {
            errors: self.errors,
            symbols: self.symbols,
        }
    }
}

fn as_decimal(value: &Value) -> Option<f64> {
    match value {
        Value::Int(int) => Some(*int as f64),
        Value::Decimal(decimal) => Some(*decimal),
        Value::Text(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lex::tokenize, parse::parse};

    fn setup(source: &str) -> Analysis {
        let (tokens, errors) = tokenize(source);
        assert!(errors.is_empty(), "lexical errors in test input");
        assert!(parse(&tokens).is_empty(), "syntax errors in test input");

        analyze(&tokens)
    }

    fn count<F>(analysis: &Analysis, predicate: F) -> usize
    where
        F: Fn(&SemanticError) -> bool,
    {
        analysis
            .errors
            .iter()
            .filter(|error| predicate(error.val()))
            .count()
    }

    #[test]
    fn clean_program() {
        let analysis = setup(
            "variavel a : inteiro = 5;\n\
             variavel b : inteiro = a + 1;\n\
             retornar b;",
        );

        assert!(analysis.errors.is_empty(), "{:?}", analysis.errors);
        assert_eq!(analysis.symbols.len(), 2);
    }

    #[test]
    fn redeclaration() {
        let analysis = setup("variavel x : inteiro = 1;\nvariavel x : inteiro = 2;\nretornar x;");
        assert_eq!(
            count(&analysis, |error| matches!(error, SemanticError::Redeclaration(..))),
            1
        );

        let error = analysis.errors[0].to_string();
        assert_eq!(error, "Line 2: Redeclaration of `x` in scope `global`");
    }

    #[test]
    fn undeclared_variable() {
        let analysis = setup("variavel x : inteiro = y;\nretornar x;");
        assert_eq!(
            count(&analysis, |error| matches!(error, SemanticError::UndeclaredVariable(_))),
            1
        );
    }

    #[test]
    fn decimal_into_inteiro_loses_information() {
        let analysis = setup("variavel x : inteiro = 2.5;\nretornar x;");
        assert_eq!(analysis.errors.len(), 1);
        assert!(matches!(
            analysis.errors[0].val(),
            SemanticError::ImplicitCast {
                loss: Loss::Information,
                ..
            }
        ));
    }

    #[test]
    fn inteiro_into_decimal_loses_precision() {
        let analysis = setup("variavel x : decimal = 5;\nretornar x;");
        assert_eq!(analysis.errors.len(), 1);
        assert!(matches!(
            analysis.errors[0].val(),
            SemanticError::ImplicitCast {
                loss: Loss::Precision,
                ..
            }
        ));

        let symbol = analysis.symbols.lookup("x", GLOBAL).unwrap();
        assert_eq!(symbol.value(), Some(&Value::Decimal(5.0)));
    }

    #[test]
    fn text_into_inteiro_is_incompatible() {
        let analysis = setup("variavel x : inteiro = \"ola\";\nretornar x;");
        assert!(matches!(
            analysis.errors[0].val(),
            SemanticError::Incompatible {
                expected: Type::Inteiro,
                found: Type::Texto,
                ..
            }
        ));
    }

    #[test]
    fn operator_on_text() {
        let analysis = setup("variavel s : texto = \"a\" + 1;\nretornar s;");
        assert_eq!(
            count(&analysis, |error| matches!(error, SemanticError::OperatorType(_, Type::Texto))),
            1
        );

        // El tipo resultante se descarta, sin errores derivados
        assert_eq!(analysis.errors.len(), 1);
    }

    #[test]
    fn constant_values_only_from_literals() {
        let analysis = setup(
            "variavel a : inteiro = 2 * (3 + 4);\n\
             variavel b : inteiro = a + 1;\n\
             a = b;\n\
             retornar a;",
        );

        assert!(analysis.errors.is_empty(), "{:?}", analysis.errors);
        assert_eq!(analysis.symbols.lookup("a", GLOBAL).unwrap().value(), None);
        assert_eq!(analysis.symbols.lookup("b", GLOBAL).unwrap().value(), None);

        let analysis = setup("variavel a : inteiro = 2 * (3 + 4);\nretornar a;");
        let a = analysis.symbols.lookup("a", GLOBAL).unwrap();
        assert_eq!(a.value(), Some(&Value::Int(14)));
    }

    #[test]
    fn constant_division_by_zero() {
        let analysis = setup("variavel a : inteiro = 4 / (2 - 2);\nretornar a;");
        assert_eq!(
            count(&analysis, |error| *error == SemanticError::DivisionByZero),
            1
        );
    }

    #[test]
    fn uninitialized_and_unused() {
        let analysis = setup("variavel a : inteiro;\nvariavel b : inteiro = a;\n");
        assert!(analysis.errors.iter().any(|error| matches!(
            error.val(),
            SemanticError::UninitializedUse(name) if &**name == "a"
        )));

        assert!(analysis.errors.iter().any(|error| matches!(
            error.val(),
            SemanticError::NeverInitialized(name) if &**name == "a"
        )));

        let unused = analysis
            .errors
            .iter()
            .find(|error| matches!(error.val(), SemanticError::NeverUsed(_)))
            .unwrap();

        assert_eq!(unused.line(), 2);
    }

    #[test]
    fn function_scope_and_calls() {
        let analysis = setup(
            "funcao dobro(n: inteiro) {\n\
                 se (n > 0) { n = n * 2; }\n\
                 retornar n;\n\
             }\n\
             variavel n : decimal = 1.5;\n\
             dobro(3);\n\
             dobro(1, 2);\n\
             n(1);\n\
             retornar n;",
        );

        let n = analysis.symbols.lookup("n", "dobro").unwrap();
        assert_eq!(&**n.scope(), "dobro");
        assert!(n.is_used());

        let global = analysis.symbols.lookup("n", GLOBAL).unwrap();
        assert_eq!(global.typ(), Type::Decimal);

        assert_eq!(
            count(&analysis, |error| matches!(
                error,
                SemanticError::ArgumentCount {
                    expected: 1,
                    received: 2,
                    ..
                }
            )),
            1
        );

        assert_eq!(
            count(&analysis, |error| matches!(error, SemanticError::NotAFunction(_))),
            1
        );

        assert_eq!(analysis.errors.len(), 2, "{:?}", analysis.errors);
    }

    #[test]
    fn argument_types() {
        let analysis = setup(
            "funcao f(s: texto) { retornar s; }\n\
             f(1);\n\
             g();",
        );

        assert!(matches!(
            analysis.errors[0].val(),
            SemanticError::Incompatible { context, .. } if context == "argument 1 of call to `f`"
        ));

        assert!(matches!(
            analysis.errors[1].val(),
            SemanticError::UndeclaredFunction(_)
        ));
    }

    #[test]
    fn symbol_table_display() {
        let analysis = setup("variavel a : inteiro = 5;\nretornar a;");
        let table = analysis.symbols.to_string();

        assert!(table.starts_with("name"));
        assert!(table.contains("global"));
        assert!(table.lines().nth(1).unwrap().trim_end().ends_with('5'));
    }
}
