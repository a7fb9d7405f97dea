//! Compilador de un lenguaje de juguete con palabras clave en
//! portugués hacia ensamblador SimpSIM.
//!
//! # Front end
//! Cada programa deriva de un único texto de código fuente. Este
//! texto se somete primero a análisis léxico en [`lex`], de lo cual
//! se obtiene un flujo de tokens. El flujo de tokens se valida contra
//! la gramática en [`parse`], que solo produce diagnósticos. Si no hay
//! errores, [`semantic`] recorre nuevamente los tokens construyendo la
//! tabla de símbolos y verificando tipos.
//!
//! # Back end
//! Un programa sin errores se traduce a código de tres direcciones en
//! [`ir::generate`], se simplifica en [`ir::optimize`] y finalmente se
//! traduce a ensamblador SimpSIM en [`codegen`].
//!
//! Cada invocación de [`compile()`] inicia desde un estado nuevo.

#[macro_use]
mod macros;

pub mod codegen;
pub mod error;
pub mod ir;
pub mod lex;
pub mod parse;
pub mod semantic;
pub mod source;

use crate::{
    codegen::Translation,
    error::{Diagnostics, Stage},
    ir::{
        optimize::{Optimization, Passes},
        Instruction,
    },
    lex::Token,
    semantic::SymbolTable,
    source::Located,
};

/// Salidas de todas las fases de una compilación.
///
/// Las fases posteriores a una que reportó errores no se ejecutan,
/// en cuyo caso sus salidas quedan vacías.
pub struct Compilation {
    pub tokens: Vec<Located<Token>>,
    pub diagnostics: Diagnostics,
    pub symbols: SymbolTable,

    /// Código de tres direcciones sin optimizar.
    pub tac: Vec<Instruction>,

    pub optimization: Option<Optimization>,
    pub translation: Option<Translation>,
}

impl Compilation {
    /// Determina si ninguna fase reportó errores.
    pub fn is_ok(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

pub fn compile(text: &str, passes: Passes) -> Compilation {
    let (tokens, lexer_errors) = lex::tokenize(text);
    let parser_errors = parse::parse(&tokens);

    log::debug!(
        "front end: {} tokens, {} lexical errors, {} syntax errors",
        tokens.len(),
        lexer_errors.len(),
        parser_errors.len()
    );

    let clean_syntax = lexer_errors.is_empty() && parser_errors.is_empty();

    let mut diagnostics = Diagnostics::default();
    diagnostics.extend(Stage::Lexical, lexer_errors);
    diagnostics.extend(Stage::Syntax, parser_errors);

    let mut compilation = Compilation {
        tokens,
        diagnostics,
        symbols: SymbolTable::default(),
        tac: Vec::new(),
        optimization: None,
        translation: None,
    };

    if !clean_syntax {
        return compilation;
    }

    let analysis = semantic::analyze(&compilation.tokens);
    compilation.symbols = analysis.symbols;
    if !analysis.errors.is_empty() {
        compilation
            .diagnostics
            .extend(Stage::Semantic, analysis.errors);

        return compilation;
    }

    compilation.tac = ir::generate::generate(&compilation.tokens, &compilation.symbols);

    let optimization = ir::optimize::optimize(compilation.tac.clone(), passes);
    compilation.translation = Some(codegen::translate(&optimization.code));
    compilation.optimization = Some(optimization);

    compilation
}
