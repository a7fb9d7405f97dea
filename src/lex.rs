//! Análisis léxico.
//!
//! # Tokenization
//! Esta es la primera fase del compilador. Descompone el texto fuente
//! en unidades léxicas denominadas tokens. Los espacios en blanco y los
//! comentarios (`// ...` y `/* ... */`) se descartan durante esta
//! operación. Cada token emitido está asociado a una ubicación en el
//! código fuente original, lo cual permite rastrear errores tanto en
//! los mismos como en constructos más elevados de fases posteriores.
//!
//! # Contenido de un token
//! A diferencia de otras representaciones, aquí todo token conserva su
//! lexema original. Las fases posteriores no construyen un árbol
//! sintáctico, sino que vuelven a recorrer el flujo de tokens, por lo
//! cual necesitan los lexemas de identificadores y literales tal como
//! aparecen. Los literales de texto conservan sus comillas y tienen sus
//! secuencias de escape ya resueltas.
//!
//! # Reglas importantes del lenguaje
//! - Las palabras clave son sensibles a mayúsculas: `se` es una
//!   palabra clave, `Se` es un identificador.
//! - Los cuatro tipos (`inteiro`, `decimal`, `texto`, `logico`) producen
//!   un mismo tipo de token, [`TokenKind::Type`].
//! - Un literal numérico seguido inmediatamente de letras no es un
//!   identificador válido y se reporta como error.
//!
//! # Errores
//! El lexer se recupera de toda condición de error: el carácter o
//! lexema problemático se descarta y el escaneo continúa, de forma que
//! se reportan todos los errores léxicos en una misma ejecución.

use crate::source::{Located, Location, Position};
use std::{
    fmt::{self, Display},
    iter::{self, Chain, Once, Peekable},
    rc::Rc,
    str::{Chars, FromStr},
};

use thiserror::Error;

/// Literal entero máximo.
pub const INT_MAX: i32 = i32::MAX;

/// Error de escaneo.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LexerError {
    /// Carácter desconocido o inesperado en el flujo de entrada.
    #[error("Invalid character {0:?}")]
    BadChar(char),

    /// Un número seguido de letras.
    #[error("Malformed identifier '{0}' (identifiers cannot start with a digit)")]
    MalformedId(String),

    /// Una constante entera se encuentra fuera de rango.
    #[error("Integer literal overflow, valid range is [0, {}]", INT_MAX)]
    IntOverflow,

    /// Literal de texto sin `"` de cierre antes del fin de línea.
    #[error("Unterminated string literal")]
    UnterminatedString,

    /// Comentario de bloque sin `*/`.
    #[error("Unterminated block comment, opened on line {0}")]
    UnterminatedComment(u32),
}

/// Categoría de un token.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Palabra clave.
    Keyword(Keyword),

    /// Nombre de tipo: `inteiro`, `decimal`, `texto` o `logico`.
    Type,

    /// Identificador.
    Id,

    /// Literal entero.
    Number,

    /// Literal con punto decimal.
    Decimal,

    /// Literal de texto.
    Str,

    /// `==`
    Equal,

    /// `=`
    Assign,

    /// `<=`
    LessOrEqual,

    /// `<`
    Less,

    /// `>=`
    GreaterOrEqual,

    /// `>`
    Greater,

    /// `+`
    Plus,

    /// `-`
    Minus,

    /// `*`
    Times,

    /// `/`
    Divide,

    /// `(`
    OpenParen,

    /// `)`
    CloseParen,

    /// `{`
    OpenCurly,

    /// `}`
    CloseCurly,

    /// `;`
    Semicolon,

    /// `,`
    Comma,

    /// `:`
    Colon,
}

impl TokenKind {
    /// Determina si es un operador relacional.
    pub fn is_relational(self) -> bool {
        use TokenKind::*;
        matches!(
            self,
            Equal | LessOrEqual | Less | GreaterOrEqual | Greater
        )
    }
}

impl Display for TokenKind {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use TokenKind::*;

        let string = match self {
            Keyword(keyword) => return write!(fmt, "keyword `{}`", keyword),
            Type => "type",
            Id => "identifier",
            Number => "integer literal",
            Decimal => "decimal literal",
            Str => "string literal",
            Equal => "`==`",
            Assign => "`=`",
            LessOrEqual => "`<=`",
            Less => "`<`",
            GreaterOrEqual => "`>=`",
            Greater => "`>`",
            Plus => "`+`",
            Minus => "`-`",
            Times => "`*`",
            Divide => "`/`",
            OpenParen => "`(`",
            CloseParen => "`)`",
            OpenCurly => "`{`",
            CloseCurly => "`}`",
            Semicolon => "`;`",
            Comma => "`,`",
            Colon => "`:`",
        };

        fmt.write_str(string)
    }
}

/// Una palabra clave.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Keyword {
    Variavel,
    Se,
    Senao,
    Enquanto,
    Para,
    Funcao,
    Retornar,
}

impl Display for Keyword {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Keyword::*;
        let string = match self {
            Variavel => "variavel",
            Se       => "se",
            Senao    => "senao",
            Enquanto => "enquanto",
            Para     => "para",
            Funcao   => "funcao",
            Retornar => "retornar",
        };

        fmt.write_str(string)
    }
}

impl FromStr for Keyword {
    type Err = ();

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        use Keyword::*;

        const KEYWORDS: &[(&str, Keyword)] = &[
            ("variavel", Variavel),
            ("se",       Se),
            ("senao",    Senao),
            ("enquanto", Enquanto),
            ("para",     Para),
            ("funcao",   Funcao),
            ("retornar", Retornar),
        ];

        KEYWORDS
            .iter()
            .find(|&&(name, _)| name == string)
            .map(|&(_, keyword)| keyword)
            .ok_or(())
    }
}

/// Nombres de tipo reconocidos por el lexer.
pub const TYPE_NAMES: &[&str] = &["inteiro", "decimal", "texto", "logico"];

/// Objeto resultante del análisis léxico.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    kind: TokenKind,
    lexeme: Rc<str>,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: &str) -> Self {
        Token {
            kind,
            lexeme: Rc::from(lexeme),
        }
    }

    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    /// Texto original del token.
    pub fn lexeme(&self) -> &str {
        &self.lexeme
    }

    /// Lexema compartido, útil para nombres que sobreviven al token.
    pub fn name(&self) -> Rc<str> {
        Rc::clone(&self.lexeme)
    }
}

impl Display for Token {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "'{}' ({})", self.lexeme, self.kind)
    }
}

type InputStream<'a> = Peekable<Chain<Chars<'a>, Once<char>>>;

/// Máquina de estados para análisis léxico.
///
/// Un lexer puede encontrarse en uno de diversos estados. La
/// salida del lexer, así como su siguiente estado, se define
/// a partir de tanto su estado actual como el siguiente carácter
/// encontrado en el flujo de entrada.
pub struct Lexer<'a> {
    source: InputStream<'a>,
    state: State,
    lexeme: String,
    start: Position,
    last: Position,
    next: Position,
}

/// Posibles estados del lexer.
enum State {
    /// Estado que ocurre antes de encontrar el inicio de un token.
    Start,

    /// Estado de completitud; siempre emite el token incluido,
    /// consume la entrada actual y pasa a [`State::Start`].
    Complete(TokenKind),

    /// Se encontró `/`, que puede iniciar un comentario.
    Slash,

    /// Comentario de línea.
    ///
    /// Este estado vuelve a [`State::Start`] al encontrar `'\n'`.
    LineComment,

    /// Comentario de bloque; `star` indica si el último carácter fue `*`.
    BlockComment { star: bool },

    /// Literal de texto; `escape` indica si el último carácter fue `\`.
    Text { escape: bool },

    /// Se encontró `=`, `<` o `>`, que pueden formar un operador doble
    /// si les sigue `=`.
    Compare { single: TokenKind, double: TokenKind },

    /// Constante entera.
    Integer,

    /// Constante decimal, ya se encontró el punto.
    Fraction,

    /// Una constante numérica seguida de letras.
    Malformed,

    /// Término que puede ser un identificador o una palabra clave.
    Word,
}

impl<'a> Lexer<'a> {
    /// Crea un lexer en estado inicial a partir de un texto.
    ///
    /// Se agrega un espacio virtual al final de la entrada, con lo cual
    /// el último token siempre termina por encontrar un separador.
    pub fn new(source: &'a str) -> Self {
        Lexer {
            source: source.chars().chain(iter::once(' ')).peekable(),
            state: State::Start,
            lexeme: String::new(),
            start: Position::default(),
            last: Position::default(),
            next: Position::default(),
        }
    }

    /// Intenta construir un siguiente token.
    fn lex(&mut self) -> Result<Option<Token>, LexerError> {
        use {State::*, TokenKind::*};

        let kind = loop {
            let next_char = self.source.peek().copied();

            // La posición de origen se mueve junto a la posición
            // siguiente siempre que no se haya encontrado una
            // frontera de token
            if let Start = self.state {
                self.start = self.next;
                self.lexeme.clear();
            }

            // Switch table principal, determina cambios de estado
            // y de salida del lexer a partir de combinaciones del
            // estado actual y el siguiente carácter
            match (&mut self.state, next_char) {
                // Tokens triviales
                (Start, None) => return Ok(None),
                (Start, Some(c)) if c.is_whitespace() => (),
                (Start, Some(',')) => self.complete(Comma, ','),
                (Start, Some(';')) => self.complete(Semicolon, ';'),
                (Start, Some(':')) => self.complete(Colon, ':'),
                (Start, Some('(')) => self.complete(OpenParen, '('),
                (Start, Some(')')) => self.complete(CloseParen, ')'),
                (Start, Some('{')) => self.complete(OpenCurly, '{'),
                (Start, Some('}')) => self.complete(CloseCurly, '}'),
                (Start, Some('+')) => self.complete(Plus, '+'),
                (Start, Some('-')) => self.complete(Minus, '-'),
                (Start, Some('*')) => self.complete(Times, '*'),
                (Start, Some('/')) => self.shift(Slash, '/'),
                (Start, Some('=')) => self.shift(Compare { single: Assign, double: Equal }, '='),
                (Start, Some('<')) => self.shift(Compare { single: Less, double: LessOrEqual }, '<'),
                (Start, Some('>')) => {
                    self.shift(Compare { single: Greater, double: GreaterOrEqual }, '>')
                }

                (Start, Some('"')) => self.shift(Text { escape: false }, '"'),

                // Identificadores y palabras clave
                (Start, Some(c)) if c.is_ascii_alphabetic() || c == '_' => self.shift(Word, c),
                (Start, Some(c)) if c.is_ascii_digit() => self.shift(Integer, c),

                // Caracteres inesperados se descartan
                (Start, Some(c)) => {
                    self.bump();
                    return Err(LexerError::BadChar(c));
                }

                // Emisión retardada de tokens cualesquiera
                (Complete(kind), _) => break *kind,

                // `/` puede ser división o iniciar un comentario
                (Slash, Some('/')) => self.state = LineComment,
                (Slash, Some('*')) => self.state = BlockComment { star: false },
                (Slash, _) => break Divide,

                // Los comentarios de línea descartan el resto de la línea
                (LineComment, Some('\n')) | (LineComment, None) => self.state = Start,
                (LineComment, Some(_)) => (),

                (BlockComment { star: true }, Some('/')) => self.state = Start,
                (BlockComment { star }, Some(c)) => *star = c == '*',
                (BlockComment { .. }, None) => {
                    return Err(LexerError::UnterminatedComment(self.start.line()))
                }

                // Un salto de línea o el fin de la entrada cortan el literal
                (Text { .. }, Some('\n')) | (Text { .. }, None) => {
                    return Err(LexerError::UnterminatedString)
                }

                (Text { escape: true }, Some(c)) => {
                    let unescaped = match c {
                        'n' => '\n',
                        't' => '\t',
                        other => other,
                    };

                    self.lexeme.push(unescaped);
                    self.state = Text { escape: false };
                }

                (Text { escape: false }, Some('\\')) => self.state = Text { escape: true },
                (Text { escape: false }, Some('"')) => self.complete(Str, '"'),
                (Text { escape: false }, Some(c)) => self.lexeme.push(c),

                // Si sigue una letra, el "número" es un identificador mal formado
                (Integer, Some(c)) | (Fraction, Some(c)) | (Malformed, Some(c))
                    if c.is_ascii_alphabetic() || c == '_' =>
                {
                    self.lexeme.push(c);
                    self.state = Malformed;
                }

                (Malformed, _) => {
                    return Err(LexerError::MalformedId(std::mem::take(&mut self.lexeme)))
                }

                // Acumulación dígito por dígito de constantes
                (Integer, Some(c)) | (Fraction, Some(c)) if c.is_ascii_digit() => {
                    self.lexeme.push(c)
                }

                // Solo se permite un punto decimal
                (Integer, Some('.')) => {
                    self.lexeme.push('.');
                    self.state = Fraction;
                }

                // Si sigue algo que no es un dígito, la constante ha terminado
                (Integer, _) => match self.lexeme.parse::<i32>() {
                    Ok(_) => break Number,
                    Err(_) => return Err(LexerError::IntOverflow),
                },

                (Fraction, _) => break Decimal,

                (Compare { double, .. }, Some('=')) => {
                    let double = *double;
                    self.complete(double, '=');
                }

                (Compare { single, .. }, _) => break *single,

                // Extensión de términos
                (Word, Some(c)) if is_word_char(c) => self.lexeme.push(c),

                // Si sigue algo que no puede formar parte del término, ha terminado
                (Word, _) => {
                    if let Ok(keyword) = self::Keyword::from_str(&self.lexeme) {
                        break TokenKind::Keyword(keyword);
                    } else if TYPE_NAMES.contains(&self.lexeme.as_str()) {
                        break Type;
                    } else {
                        break Id;
                    }
                }
            }

            // Aquí se consume el carácter que se observó con lookahead anteriormente
            self.bump();
        };

        Ok(Some(Token::new(kind, &self.lexeme)))
    }

    /// Pasa a un estado que solamente emite un token.
    fn complete(&mut self, kind: TokenKind, c: char) {
        self.shift(State::Complete(kind), c);
    }

    /// Cambia de estado, agregando `c` al lexema.
    fn shift(&mut self, state: State, c: char) {
        self.lexeme.push(c);
        self.state = state;
    }

    /// Consume un carácter y actualiza la posición.
    fn bump(&mut self) {
        if let Some(c) = self.source.next() {
            let next = match c {
                '\n' => self.next.newline(),
                '\t' => self.next.tab(),
                _ => self.next.advance(),
            };

            self.last = std::mem::replace(&mut self.next, next);
        }
    }

    /// Rango de posiciones del último token o error.
    fn location(&self) -> Location {
        let end = if self.last.line() < self.start.line() {
            self.start
        } else {
            self.last
        };

        Location::span(&Location::at(self.start), &Location::at(end))
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Located<Token>, Located<LexerError>>;

    fn next(&mut self) -> Option<Self::Item> {
        let result = self.lex();
        let location = self.location();
        self.state = State::Start;

        match result {
            Ok(None) => None,
            Ok(Some(token)) => Some(Ok(Located::at(token, location))),
            Err(error) => Some(Err(Located::at(error, location))),
        }
    }
}

/// Reduce un texto fuente a su secuencia de tokens y la lista de
/// errores léxicos encontrados, en ese orden.
pub fn tokenize(source: &str) -> (Vec<Located<Token>>, Vec<Located<LexerError>>) {
    let mut tokens = Vec::new();
    let mut errors = Vec::new();

    for result in Lexer::new(source) {
        match result {
            Ok(token) => tokens.push(token),
            Err(error) => errors.push(error),
        }
    }

    log::debug!(
        "lexer: {} tokens, {} errors",
        tokens.len(),
        errors.len()
    );

    (tokens, errors)
}

/// Determina si un carácter puede pertenecer a un término.
fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(source: &str) -> (Vec<(TokenKind, String, u32)>, Vec<Located<LexerError>>) {
        let (tokens, errors) = tokenize(source);
        let tokens = tokens
            .into_iter()
            .map(|token| {
                let line = token.line();
                let token = token.into_inner();
                (token.kind(), token.lexeme().to_owned(), line)
            })
            .collect();

        (tokens, errors)
    }

    fn kinds(source: &str) -> Vec<TokenKind> {
        setup(source).0.into_iter().map(|(kind, _, _)| kind).collect()
    }

    #[test]
    fn variable_declaration() {
        use TokenKind::*;

        let (tokens, errors) = setup("variavel x : inteiro = 5;");
        assert!(errors.is_empty());

        let expected = vec![
            (Keyword(self::Keyword::Variavel), "variavel"),
            (Id, "x"),
            (Colon, ":"),
            (Type, "inteiro"),
            (Assign, "="),
            (Number, "5"),
            (Semicolon, ";"),
        ];

        let found: Vec<_> = tokens
            .iter()
            .map(|(kind, lexeme, _)| (*kind, lexeme.as_str()))
            .collect();

        assert_eq!(found, expected);
    }

    #[test]
    fn double_char_operators() {
        use TokenKind::*;

        assert_eq!(
            kinds("== = <= < >= > + - * /"),
            vec![Equal, Assign, LessOrEqual, Less, GreaterOrEqual, Greater, Plus, Minus, Times, Divide]
        );

        assert_eq!(kinds("a<=b"), vec![Id, LessOrEqual, Id]);
    }

    #[test]
    fn keywords_are_case_sensitive() {
        use TokenKind::*;

        assert_eq!(
            kinds("se Se senao enquanto para funcao retornar Inteiro logico"),
            vec![
                Keyword(self::Keyword::Se),
                Id,
                Keyword(self::Keyword::Senao),
                Keyword(self::Keyword::Enquanto),
                Keyword(self::Keyword::Para),
                Keyword(self::Keyword::Funcao),
                Keyword(self::Keyword::Retornar),
                Id,
                Type,
            ]
        );
    }

    #[test]
    fn number_followed_by_letters_is_malformed() {
        let (tokens, errors) = setup("123abc");
        assert!(tokens.is_empty());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].line(), 1);
        assert_eq!(
            errors[0].val(),
            &LexerError::MalformedId(String::from("123abc"))
        );
    }

    #[test]
    fn decimal_literals() {
        let (tokens, errors) = setup("3.14 7");
        assert!(errors.is_empty());
        assert_eq!(tokens[0].0, TokenKind::Decimal);
        assert_eq!(tokens[0].1, "3.14");
        assert_eq!(tokens[1].0, TokenKind::Number);
    }

    #[test]
    fn integer_overflow() {
        let (tokens, errors) = setup("99999999999;");
        assert_eq!(tokens.len(), 1);
        assert_eq!(errors[0].val(), &LexerError::IntOverflow);
    }

    #[test]
    fn unterminated_block_comment_reports_opening_line() {
        let (tokens, errors) = setup("/* foo");
        assert!(tokens.is_empty());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].val(), &LexerError::UnterminatedComment(1));

        let (_, errors) = setup("x\n/* foo\nbar\n");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].line(), 2);
    }

    #[test]
    fn comments_are_skipped() {
        use TokenKind::*;

        assert_eq!(kinds("a // nada\n/* tampoco\n ** */ b / c"), vec![Id, Id, Divide, Id]);
    }

    #[test]
    fn string_escapes() {
        let (tokens, errors) = setup(r#""a\nb\"c\\d\q""#);
        assert!(errors.is_empty());
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].0, TokenKind::Str);
        assert_eq!(tokens[0].1, "\"a\nb\"c\\dq\"");
    }

    #[test]
    fn unterminated_string_is_dropped() {
        let (tokens, errors) = setup("x = \"abc\ny");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].val(), &LexerError::UnterminatedString);
        assert_eq!(errors[0].line(), 1);

        let lexemes: Vec<_> = tokens.iter().map(|(_, lexeme, _)| lexeme.as_str()).collect();
        assert_eq!(lexemes, vec!["x", "=", "y"]);
        assert_eq!(tokens[2].2, 2);
    }

    #[test]
    fn unterminated_string_at_end_of_input() {
        let (tokens, errors) = setup("x = \"abc");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].val(), &LexerError::UnterminatedString);
        assert_eq!(errors[0].line(), 1);

        let lexemes: Vec<_> = tokens.iter().map(|(_, lexeme, _)| lexeme.as_str()).collect();
        assert_eq!(lexemes, vec!["x", "="]);
    }

    #[test]
    fn invalid_characters_are_reported_and_skipped() {
        let (tokens, errors) = setup("a @ b # c");
        assert_eq!(tokens.len(), 3);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].val(), &LexerError::BadChar('@'));
        assert_eq!(errors[1].val(), &LexerError::BadChar('#'));
    }

    #[test]
    fn line_numbers() {
        let (tokens, _) = setup("a\n\n  b\n/* x\n y */ c");
        let lines: Vec<_> = tokens.iter().map(|(_, _, line)| *line).collect();
        assert_eq!(lines, vec![1, 3, 5]);
    }

    #[test]
    fn error_messages_are_line_prefixed() {
        let (_, errors) = setup("\n$");
        assert_eq!(errors[0].to_string(), "Line 2: Invalid character '$'");
    }
}
