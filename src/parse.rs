//! Análisis sintáctico.
//!
//! El parser es descendente recursivo, con una función por no
//! terminal de la gramática. No construye un árbol sintáctico: su
//! única salida son diagnósticos. Las fases posteriores vuelven a
//! recorrer el flujo de tokens por medio de un [`Cursor`].
//!
//! # Recuperación de errores
//! Ante un token inesperado se reporta un error con lo esperado, lo
//! encontrado, el constructo en curso y una sugerencia. Luego se
//! avanza hasta algún token del conjunto de sincronización del
//! constructo, de forma que un mismo error no produzca una cascada
//! de errores derivados. Todo token real es procesado, por lo cual
//! una misma ejecución puede reportar varios errores independientes.

use std::{
    borrow::Cow,
    fmt::{self, Display},
};

use thiserror::Error;

use crate::{
    lex::{Keyword, Token, TokenKind, TYPE_NAMES},
    source::{Located, Location},
};

use TokenKind::*;

/// Inicios de una declaración.
pub const FIRST_DECLARATION: &[TokenKind] = &[
    TokenKind::Keyword(Keyword::Variavel),
    Id,
    TokenKind::Keyword(Keyword::Se),
    TokenKind::Keyword(Keyword::Enquanto),
    TokenKind::Keyword(Keyword::Para),
    TokenKind::Keyword(Keyword::Funcao),
    TokenKind::Keyword(Keyword::Retornar),
];

/// Inicios de un parámetro.
pub const FIRST_PARAMETERS: &[TokenKind] = &[Id];

/// Inicios de una expresión.
pub const FIRST_EXPRESSION: &[TokenKind] = &[Id, Number, Decimal, Str, OpenParen];

/// Operadores relacionales.
pub const FIRST_RELATIONAL_OPERATOR: &[TokenKind] =
    &[Less, Greater, Equal, LessOrEqual, GreaterOrEqual];

// Conjuntos de sincronización. El fin de la entrada siempre sincroniza.
const STATEMENT_FOLLOW: &[TokenKind] = &[
    Semicolon,
    CloseCurly,
    TokenKind::Keyword(Keyword::Variavel),
    TokenKind::Keyword(Keyword::Se),
    TokenKind::Keyword(Keyword::Enquanto),
    TokenKind::Keyword(Keyword::Para),
    TokenKind::Keyword(Keyword::Funcao),
    TokenKind::Keyword(Keyword::Retornar),
];

const PARAMETER_FOLLOW: &[TokenKind] = &[Comma, CloseParen];
const LIST_FOLLOW: &[TokenKind] = &[CloseParen];
const CALL_FOLLOW: &[TokenKind] = &[Semicolon, CloseCurly];
const RELATIONAL_FOLLOW: &[TokenKind] = &[CloseParen, Semicolon];
const RELATIONAL_OPERATOR_FOLLOW: &[TokenKind] = &[Id, Number, OpenParen];
const TYPE_FOLLOW: &[TokenKind] = &[Assign, Semicolon, Comma, CloseParen];

const EXPRESSION_FOLLOW: &[TokenKind] = &[
    Semicolon,
    Comma,
    CloseParen,
    Less,
    Greater,
    Equal,
    LessOrEqual,
    GreaterOrEqual,
];

const TERM_FOLLOW: &[TokenKind] = &[
    Plus,
    Minus,
    Semicolon,
    Comma,
    CloseParen,
    Less,
    Greater,
    Equal,
    LessOrEqual,
    GreaterOrEqual,
];

const FACTOR_FOLLOW: &[TokenKind] = &[
    Times,
    Divide,
    Plus,
    Minus,
    Semicolon,
    Comma,
    CloseParen,
    Less,
    Greater,
    Equal,
    LessOrEqual,
    GreaterOrEqual,
];

const SUGGEST_ID: &str = "identifiers start with a letter or `_`, followed by letters, digits or `_`";
const SUGGEST_DECLARATION: &str =
    "expected `variavel`, an identifier, `se`, `enquanto`, `para`, `funcao` or `retornar`";

/// Constructo gramatical en el que ocurrió un error.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Construct {
    Program,
    Declaration,
    VariableDeclaration,
    Assignment,
    Conditional,
    WhileLoop,
    ForLoop,
    FunctionDeclaration,
    ParameterList,
    FunctionCall,
    ArgumentList,
    Expression,
    Term,
    RelationalExpression,
    TypeAnnotation,
    Return,
}

impl Display for Construct {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Construct::*;

        let string = match self {
            Program => "program",
            Declaration => "declaration",
            VariableDeclaration => "variable declaration",
            Assignment => "assignment",
            Conditional => "conditional",
            WhileLoop => "`enquanto` loop",
            ForLoop => "`para` loop",
            FunctionDeclaration => "function declaration",
            ParameterList => "parameter list",
            FunctionCall => "function call",
            ArgumentList => "argument list",
            Expression => "expression",
            Term => "term",
            RelationalExpression => "relational expression",
            TypeAnnotation => "type annotation",
            Return => "return statement",
        };

        fmt.write_str(string)
    }
}

/// Lo que se encontró en lugar de lo esperado.
#[derive(Clone, Debug, PartialEq)]
pub enum Found {
    Token(Token),
    Eof,
}

impl Display for Found {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Found::Token(token) => token.fmt(fmt),
            Found::Eof => fmt.write_str("end of input"),
        }
    }
}

/// Error de sintaxis.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{expected}. Found: {found}. Context: {context}. Suggestion: {suggestion}")]
pub struct ParserError {
    pub expected: Cow<'static, str>,
    pub found: Found,
    pub context: Construct,
    pub suggestion: Cow<'static, str>,
}

/// Recorrido secuencial sobre un flujo de tokens.
///
/// Todas las fases posteriores al lexer recorren los tokens con este
/// tipo. Nunca falla: al terminar los tokens, toda consulta retorna
/// `None` o `false`.
#[derive(Clone)]
pub struct Cursor<'a> {
    tokens: &'a [Located<Token>],
    index: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(tokens: &'a [Located<Token>]) -> Self {
        Cursor { tokens, index: 0 }
    }

    /// Todos los tokens, sin importar la posición actual.
    pub fn tokens(&self) -> &'a [Located<Token>] {
        self.tokens
    }

    pub fn peek(&self) -> Option<&'a Located<Token>> {
        self.tokens.get(self.index)
    }

    pub fn peek_kind(&self) -> Option<TokenKind> {
        self.lookahead(0)
    }

    /// Tipo del token `n` posiciones adelante de la actual.
    pub fn lookahead(&self, n: usize) -> Option<TokenKind> {
        self.tokens
            .get(self.index + n)
            .map(|token| token.as_ref().kind())
    }

    pub fn is_at(&self, kind: TokenKind) -> bool {
        self.peek_kind() == Some(kind)
    }

    pub fn is_at_any(&self, kinds: &[TokenKind]) -> bool {
        self.peek_kind().map_or(false, |kind| kinds.contains(&kind))
    }

    /// Consume el siguiente token solo si es del tipo indicado.
    pub fn accept(&mut self, kind: TokenKind) -> Option<&'a Located<Token>> {
        if self.is_at(kind) {
            self.next()
        } else {
            None
        }
    }

    /// Avanza hasta algún token de `follow`, sin consumirlo.
    pub fn skip_until(&mut self, follow: &[TokenKind]) {
        while !self.is_done() && !self.is_at_any(follow) {
            self.index += 1;
        }
    }

    pub fn is_done(&self) -> bool {
        self.index >= self.tokens.len()
    }

    /// Línea del token actual, o del último token si ya no quedan.
    pub fn line(&self) -> u32 {
        self.peek()
            .or_else(|| self.tokens.last())
            .map_or(1, Located::line)
    }
}

impl<'a> Iterator for Cursor<'a> {
    type Item = &'a Located<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        let token = self.tokens.get(self.index)?;
        self.index += 1;

        Some(token)
    }
}

/// Verifica la gramática de un flujo de tokens.
pub fn parse(tokens: &[Located<Token>]) -> Vec<Located<ParserError>> {
    let mut parser = Parser {
        cursor: Cursor::new(tokens),
        errors: Vec::new(),
    };

    parser.program();
    log::debug!("parser: {} errors", parser.errors.len());

    parser.errors
}

struct Parser<'a> {
    cursor: Cursor<'a>,
    errors: Vec<Located<ParserError>>,
}

/// Un constructo fue abandonado luego de reportar un error y sincronizar.
struct Abandoned;

type Parse<T = ()> = Result<T, Abandoned>;

/// Exigencia del `;` final de una asignación.
#[derive(Copy, Clone, PartialEq, Eq)]
enum Terminator {
    Required,
    Optional,
}

impl<'a> Parser<'a> {
    fn program(&mut self) {
        if self.cursor.is_done() {
            self.report(
                "Empty input, expected a program with at least one declaration",
                Construct::Program,
                SUGGEST_DECLARATION,
            );
        }

        while !self.cursor.is_done() {
            if self.cursor.is_at_any(FIRST_DECLARATION) {
                let _ = self.declaration();
            } else {
                self.unexpected(Construct::Program);
                self.cursor.next();
            }
        }
    }

    fn declaration(&mut self) -> Parse {
        match self.cursor.peek_kind() {
            Some(TokenKind::Keyword(Keyword::Variavel)) => self.variable_declaration(),
            Some(Id) if self.cursor.lookahead(1) == Some(OpenParen) => self.call(),
            Some(Id) => self.assignment(Construct::Assignment, Terminator::Required),
            Some(TokenKind::Keyword(Keyword::Se)) => self.conditional(),
            Some(TokenKind::Keyword(Keyword::Enquanto))
            | Some(TokenKind::Keyword(Keyword::Para)) => self.repetition(),
            Some(TokenKind::Keyword(Keyword::Funcao)) => self.function_declaration(),
            Some(TokenKind::Keyword(Keyword::Retornar)) => self.return_statement(),

            _ => {
                self.unexpected(Construct::Declaration);
                self.synchronize(STATEMENT_FOLLOW)
            }
        }
    }

    fn variable_declaration(&mut self) -> Parse {
        let context = Construct::VariableDeclaration;
        self.cursor.next();

        self.expect(
            Id,
            "Expected identifier after `variavel`",
            context,
            SUGGEST_ID,
            STATEMENT_FOLLOW,
        )?;

        self.expect(
            Colon,
            "Expected `:` after identifier",
            context,
            "add `:` followed by the variable's type",
            STATEMENT_FOLLOW,
        )?;

        self.typ();
        if self.cursor.accept(Assign).is_some() {
            self.required_expression("Expected an expression after `=`", context);
        }

        self.terminator(
            "Expected `;` at end of variable declaration",
            context,
            "add `;` to end the declaration",
        );

        Ok(())
    }

    fn assignment(&mut self, context: Construct, terminator: Terminator) -> Parse {
        self.expect(
            Id,
            "Expected identifier for assignment",
            context,
            SUGGEST_ID,
            STATEMENT_FOLLOW,
        )?;

        if !self.cursor.is_at(Assign) {
            // `Variavel x ...` llega aquí como una asignación a `Variavel`
            let target = self.cursor.tokens()[self.cursor.index - 1].as_ref();
            let suggestion = case_hint(target.lexeme())
                .map(Cow::Owned)
                .unwrap_or(Cow::Borrowed("use `=` to assign a value to the variable"));

            self.report("Expected `=` after identifier", context, suggestion);
            return self.synchronize(STATEMENT_FOLLOW);
        }

        self.cursor.next();
        self.required_expression("Expected an expression after `=`", context);

        match terminator {
            Terminator::Optional if self.cursor.is_at(CloseParen) => (),
            _ => self.terminator(
                "Expected `;` at end of assignment",
                context,
                "add `;` to end the assignment",
            ),
        }

        Ok(())
    }

    fn return_statement(&mut self) -> Parse {
        let context = Construct::Return;
        self.cursor.next();

        self.required_expression("Expected an expression after `retornar`", context);
        self.terminator(
            "Expected `;` after return expression",
            context,
            "add `;` to end the statement",
        );

        Ok(())
    }

    fn conditional(&mut self) -> Parse {
        let context = Construct::Conditional;
        self.cursor.next();

        self.condition("`se`", context)?;
        self.block(context, "Expected `{` to open the block")?;

        if self.cursor.accept(TokenKind::Keyword(Keyword::Senao)).is_some() {
            self.block(context, "Expected `{` after `senao`")?;
        }

        Ok(())
    }

    fn repetition(&mut self) -> Parse {
        match self.cursor.peek_kind() {
            Some(TokenKind::Keyword(Keyword::Para)) => self.for_loop(),
            _ => self.while_loop(),
        }
    }

    fn while_loop(&mut self) -> Parse {
        let context = Construct::WhileLoop;
        self.cursor.next();

        self.condition("`enquanto`", context)?;
        self.block(context, "Expected `{` to open the block")
    }

    fn for_loop(&mut self) -> Parse {
        let context = Construct::ForLoop;
        self.cursor.next();

        self.expect(
            OpenParen,
            "Expected `(` after `para`",
            context,
            "add `(` to open the loop header",
            STATEMENT_FOLLOW,
        )?;

        if self.cursor.is_at(Id) {
            let _ = self.assignment(context, Terminator::Required);
        } else {
            self.report(
                "Expected an initial assignment",
                context,
                "add an assignment that initializes the loop variable",
            );
        }

        if self.cursor.is_at_any(FIRST_EXPRESSION) {
            self.relational();
        } else {
            self.report(
                "Expected a relational expression",
                context,
                "add a valid loop condition",
            );
        }

        self.expect(
            Semicolon,
            "Expected `;` after relational expression",
            context,
            "add `;` to separate the loop condition from the increment",
            STATEMENT_FOLLOW,
        )?;

        if self.cursor.is_at(Id) {
            let _ = self.assignment(context, Terminator::Optional);
        } else {
            self.report(
                "Expected an increment assignment",
                context,
                "add an assignment that advances the loop variable",
            );
        }

        self.expect(
            CloseParen,
            "Expected `)` after loop header",
            context,
            "add `)` to close the loop header",
            STATEMENT_FOLLOW,
        )?;

        self.block(context, "Expected `{` to open the block")
    }

    fn function_declaration(&mut self) -> Parse {
        let context = Construct::FunctionDeclaration;
        self.cursor.next();

        self.expect(
            Id,
            "Expected identifier after `funcao`",
            context,
            SUGGEST_ID,
            STATEMENT_FOLLOW,
        )?;

        self.expect(
            OpenParen,
            "Expected `(` after identifier",
            context,
            "add `(` to open the parameter list",
            STATEMENT_FOLLOW,
        )?;

        if self.cursor.is_at_any(FIRST_PARAMETERS) {
            self.parameter_list();
        }

        self.expect(
            CloseParen,
            "Expected `)` after parameter list",
            context,
            "add `)` to close the parameter list",
            STATEMENT_FOLLOW,
        )?;

        self.block(context, "Expected `{` to open the function body")
    }

    fn parameter_list(&mut self) {
        let _ = self.parameter();

        while self.cursor.accept(Comma).is_some() {
            if self.cursor.is_at_any(FIRST_PARAMETERS) {
                let _ = self.parameter();
            } else {
                self.report(
                    "Expected a parameter after `,`",
                    Construct::ParameterList,
                    "add a parameter such as `n: inteiro` after the comma",
                );

                let _ = self.synchronize(LIST_FOLLOW);
                break;
            }
        }
    }

    fn parameter(&mut self) -> Parse {
        let context = Construct::ParameterList;

        self.expect(
            Id,
            "Expected identifier for parameter",
            context,
            SUGGEST_ID,
            PARAMETER_FOLLOW,
        )?;

        self.expect(
            Colon,
            "Expected `:` after identifier",
            context,
            "add `:` followed by the parameter's type",
            PARAMETER_FOLLOW,
        )?;

        self.typ();
        Ok(())
    }

    fn call(&mut self) -> Parse {
        let context = Construct::FunctionCall;
        self.cursor.next();

        self.expect(
            OpenParen,
            "Expected `(` after identifier",
            context,
            "add `(` to open the argument list",
            CALL_FOLLOW,
        )?;

        if self.cursor.is_at_any(FIRST_EXPRESSION) {
            self.argument_list();
        }

        self.expect(
            CloseParen,
            "Expected `)` after argument list",
            context,
            "add `)` to close the argument list",
            CALL_FOLLOW,
        )?;

        self.terminator(
            "Expected `;` at end of function call",
            context,
            "add `;` to end the call",
        );

        Ok(())
    }

    fn argument_list(&mut self) {
        let context = Construct::ArgumentList;
        self.expression();

        while self.cursor.accept(Comma).is_some() {
            if self.cursor.is_at_any(FIRST_EXPRESSION) {
                self.expression();
            } else {
                self.report(
                    "Expected an expression after `,`",
                    context,
                    "add a valid argument after the comma",
                );

                let _ = self.synchronize(LIST_FOLLOW);
                break;
            }
        }
    }

    fn expression(&mut self) {
        if !self.cursor.is_at_any(FIRST_EXPRESSION) {
            self.report(
                "Expected a valid expression",
                Construct::Expression,
                "use an identifier, a literal or a parenthesized expression",
            );

            let _ = self.synchronize(EXPRESSION_FOLLOW);
            return;
        }

        self.term();
        while self.cursor.is_at_any(&[Plus, Minus]) {
            self.cursor.next();

            if self.cursor.is_at_any(FIRST_EXPRESSION) {
                self.term();
            } else {
                self.report(
                    "Expected a term after `+` or `-`",
                    Construct::Expression,
                    "add a valid operand after the operator",
                );

                let _ = self.synchronize(EXPRESSION_FOLLOW);
                break;
            }
        }
    }

    fn term(&mut self) {
        if !self.cursor.is_at_any(FIRST_EXPRESSION) {
            self.report(
                "Expected a factor",
                Construct::Term,
                "use an identifier, a literal or a parenthesized expression",
            );

            let _ = self.synchronize(TERM_FOLLOW);
            return;
        }

        self.factor();
        while self.cursor.is_at_any(&[Times, Divide]) {
            self.cursor.next();

            if self.cursor.is_at_any(FIRST_EXPRESSION) {
                self.factor();
            } else {
                self.report(
                    "Expected a factor after `*` or `/`",
                    Construct::Term,
                    "add a valid operand after the operator",
                );

                let _ = self.synchronize(TERM_FOLLOW);
                break;
            }
        }
    }

    fn factor(&mut self) {
        let context = Construct::Expression;

        match self.cursor.peek_kind() {
            Some(Id) | Some(Number) | Some(Decimal) | Some(Str) => {
                self.cursor.next();
            }

            Some(OpenParen) => {
                self.cursor.next();
                self.required_expression("Expected an expression inside parentheses", context);

                if self.cursor.accept(CloseParen).is_none() {
                    self.report(
                        "Expected `)` to close the expression",
                        context,
                        "add `)` to close the parenthesized expression",
                    );

                    let _ = self.synchronize(FACTOR_FOLLOW);
                }
            }

            _ => {
                self.report(
                    "Expected an identifier, a literal or `(`",
                    context,
                    "use an identifier, a literal or a parenthesized expression",
                );

                let _ = self.synchronize(FACTOR_FOLLOW);
            }
        }
    }

    fn relational(&mut self) {
        let context = Construct::RelationalExpression;
        if !self.cursor.is_at_any(FIRST_EXPRESSION) {
            self.report("Expected an expression", context, "add a valid expression");
            let _ = self.synchronize(RELATIONAL_FOLLOW);
            return;
        }

        self.expression();
        if self.cursor.is_at_any(FIRST_RELATIONAL_OPERATOR) {
            self.relational_operator();
            self.required_expression("Expected an expression after relational operator", context);
        }
    }

    fn relational_operator(&mut self) {
        if self.cursor.is_at_any(FIRST_RELATIONAL_OPERATOR) {
            self.cursor.next();
        } else {
            self.report(
                "Expected a relational operator (`<`, `>`, `==`, `<=`, `>=`)",
                Construct::RelationalExpression,
                "use a valid relational operator",
            );

            let _ = self.synchronize(RELATIONAL_OPERATOR_FOLLOW);
        }
    }

    fn typ(&mut self) {
        if self.cursor.accept(Type).is_some() {
            return;
        }

        let suggestion = self
            .cursor
            .peek()
            .and_then(|token| case_hint(token.as_ref().lexeme()))
            .map(Cow::Owned)
            .unwrap_or(Cow::Borrowed("use one of `inteiro`, `decimal`, `texto`, `logico`"));

        self.report(
            "Expected a type (`inteiro`, `decimal`, `texto`, `logico`)",
            Construct::TypeAnnotation,
            suggestion,
        );

        let _ = self.synchronize(TYPE_FOLLOW);
    }

    /// `( relacional )` de `se` y `enquanto`.
    fn condition(&mut self, keyword: &'static str, context: Construct) -> Parse {
        if self.cursor.accept(OpenParen).is_none() {
            self.report(
                format!("Expected `(` after {}", keyword),
                context,
                "add `(` to open the condition",
            );

            return self.synchronize(STATEMENT_FOLLOW);
        }

        if self.cursor.is_at_any(FIRST_EXPRESSION) {
            self.relational();
        } else {
            self.report(
                "Expected a relational expression",
                context,
                "add a valid condition",
            );
        }

        self.expect(
            CloseParen,
            "Expected `)` after relational expression",
            context,
            "add `)` to close the condition",
            STATEMENT_FOLLOW,
        )
    }

    /// `{ declaración* }`
    fn block(&mut self, context: Construct, opening: &'static str) -> Parse {
        self.expect(
            OpenCurly,
            opening,
            context,
            "add `{` to open the block",
            STATEMENT_FOLLOW,
        )?;

        while self.cursor.is_at_any(FIRST_DECLARATION) {
            let _ = self.declaration();
        }

        self.expect(
            CloseCurly,
            "Expected `}` to close the block",
            context,
            "add `}` to close the block",
            STATEMENT_FOLLOW,
        )
    }

    fn required_expression(&mut self, expected: &'static str, context: Construct) {
        if self.cursor.is_at_any(FIRST_EXPRESSION) {
            self.expression();
        } else {
            self.report(expected, context, "add a valid expression");
        }
    }

    /// `;` faltante: se reporta pero no se sincroniza.
    fn terminator(&mut self, expected: &'static str, context: Construct, suggestion: &'static str) {
        if self.cursor.accept(Semicolon).is_none() {
            self.report(expected, context, suggestion);
        }
    }

    fn expect(
        &mut self,
        kind: TokenKind,
        expected: &'static str,
        context: Construct,
        suggestion: &'static str,
        follow: &[TokenKind],
    ) -> Parse {
        if self.cursor.accept(kind).is_some() {
            Ok(())
        } else {
            self.report(expected, context, suggestion);
            self.synchronize(follow)
        }
    }

    fn unexpected(&mut self, context: Construct) {
        let lexeme = self.cursor.peek().map_or("", |token| token.as_ref().lexeme());
        self.report(
            format!("Unexpected token '{}'", lexeme),
            context,
            SUGGEST_DECLARATION,
        );
    }

    fn synchronize(&mut self, follow: &[TokenKind]) -> Parse {
        self.cursor.skip_until(follow);

        // Solo los conjuntos de sentencia incluyen `}`; ahí un `;` cierra
        // la sentencia abandonada
        if follow.contains(&CloseCurly) {
            self.cursor.accept(Semicolon);
        }

        Err(Abandoned)
    }

    fn report<E, S>(&mut self, expected: E, context: Construct, suggestion: S)
    where
        E: Into<Cow<'static, str>>,
        S: Into<Cow<'static, str>>,
    {
        let (location, found) = match self.cursor.peek() {
            Some(token) => (token.location().clone(), Found::Token(token.as_ref().clone())),
            None => {
                let location = self
                    .cursor
                    .tokens()
                    .last()
                    .map(|token| token.location().clone())
                    .unwrap_or_else(Location::default);

                (location, Found::Eof)
            }
        };

        let error = ParserError {
            expected: expected.into(),
            found,
            context,
            suggestion: suggestion.into(),
        };

        self.errors.push(Located::at(error, location));
    }
}

/// Sugerencia para palabras clave o tipos escritos con otras mayúsculas.
fn case_hint(lexeme: &str) -> Option<String> {
    const KEYWORDS: &[&str] = &[
        "variavel", "se", "senao", "enquanto", "para", "funcao", "retornar",
    ];

    KEYWORDS
        .iter()
        .chain(TYPE_NAMES.iter())
        .find(|name| **name != lexeme && unicase::eq_ascii(**name, lexeme))
        .map(|name| format!("keywords and types are lowercase, write `{}`", name))
}
