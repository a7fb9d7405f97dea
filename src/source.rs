//! Rastreo de ubicaciones originales en código fuente.
//!
//! Los distintos objetos internos que el compilador construye
//! deben llevar cuenta de posiciones o rangos de ubicaciones en
//! el código fuente original, lo cual permite determinar un punto
//! exacto o aproximado en donde ocurre un error. Los números de
//! línea inician en 1, tal como se muestran al usuario.

use std::{
    fmt::{self, Debug, Display, Formatter},
    io::{self, Read},
    ops::Range,
};

/// Ancho de los divisores de tabulador.
const TAB_STOP: u32 = 4;

/// Un objeto cualquiera con una posición original asociada.
#[derive(Debug, Clone, PartialEq)]
pub struct Located<T> {
    location: Location,
    value: T,
}

impl<T> Located<T> {
    /// Obtiene el valor.
    pub fn val(&self) -> &T {
        &self.value
    }

    /// Obtiene la ubicación.
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Línea donde inicia el objeto.
    pub fn line(&self) -> u32 {
        self.location.start().line()
    }

    /// Descarta la ubicación y toma ownership del valor.
    pub fn into_inner(self) -> T {
        self.value
    }

    /// Descompone y toma ownership de las dos partes.
    pub fn split(self) -> (Location, T) {
        (self.location, self.value)
    }

    /// Construye a partir de un valor y una ubicación.
    pub fn at(value: T, location: Location) -> Self {
        Located { value, location }
    }

    /// Transforma el valor con la misma ubicación.
    pub fn map<U, F>(self, map: F) -> Located<U>
    where
        F: FnOnce(T) -> U,
    {
        Located {
            value: map(self.value),
            location: self.location,
        }
    }
}

impl<T> AsRef<T> for Located<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}

/// Forma plana de un diagnóstico: `Line N: descripción`.
impl<T: Display> Display for Located<T> {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "Line {}: {}", self.line(), self.value)
    }
}

/// Una ubicación es un rango semiabierto de posiciones.
#[derive(Clone, PartialEq, Eq)]
pub struct Location {
    position: Range<Position>,
}

impl Location {
    /// Ubicación de un único carácter.
    pub fn at(position: Position) -> Self {
        Location {
            position: position..position.advance(),
        }
    }

    /// Unifica un rango de ubicaciones.
    pub fn span(from: &Location, to: &Location) -> Self {
        Location {
            position: from.position.start..to.position.end,
        }
    }

    /// Obtiene la posición de inicio.
    pub fn start(&self) -> Position {
        self.position.start
    }

    /// Obtiene la posición de fin.
    pub fn end(&self) -> Position {
        self.position.end
    }
}

impl Default for Location {
    fn default() -> Self {
        Location::at(Position::default())
    }
}

impl Display for Location {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        let Range { start, end } = self.position;
        if end == start.advance() || end.line() != start.line() || end.column() <= start.column() {
            // Solo se señala una columna en específico
            write!(formatter, "{}", start)
        } else {
            write!(formatter, "[{}-{}]", start, end.back())
        }
    }
}

impl Debug for Location {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        <Self as Display>::fmt(self, formatter)
    }
}

/// Una posición línea-columna en un archivo.
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct Position {
    line: u32,
    column: u32,
}

impl Position {
    /// Obtiene el número de línea.
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Obtiene el número de columna.
    pub fn column(&self) -> u32 {
        self.column
    }

    /// Incrementa el número de columna.
    pub fn advance(self) -> Position {
        Position {
            line: self.line,
            column: self.column + 1,
        }
    }

    /// Decrementa el número de columna.
    pub fn back(self) -> Position {
        Position {
            line: self.line,
            column: self.column.saturating_sub(1).max(1),
        }
    }

    /// Incrementa el número de línea y retorna a la columna 1.
    pub fn newline(self) -> Position {
        Position {
            line: self.line + 1,
            column: 1,
        }
    }

    /// Ajusta la posición a la siguiente columna de tabulador.
    pub fn tab(self) -> Position {
        let column = 1 + ((self.column - 1) / TAB_STOP + 1) * TAB_STOP;
        Position {
            line: self.line,
            column,
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Position { line: 1, column: 1 }
    }
}

impl Display for Position {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:{}", self.line, self.column)
    }
}

impl Debug for Position {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        <Self as Display>::fmt(self, formatter)
    }
}

/// Nombre de origen y líneas del programa.
///
/// El núcleo del compilador trabaja sobre un `&str`; este tipo
/// solo existe para que los diagnósticos puedan citar la línea
/// original donde ocurrió cada error.
pub struct Source {
    name: String,
    lines: Vec<String>,
}

impl Source {
    /// Construye a partir de texto ya leído.
    pub fn new<S: Into<String>>(name: S, text: &str) -> Self {
        Source {
            name: name.into(),
            lines: text.lines().map(String::from).collect(),
        }
    }

    /// Lee un flujo completo.
    pub fn read<R, S>(mut reader: R, name: S) -> io::Result<(Self, String)>
    where
        R: Read,
        S: Into<String>,
    {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;

        Ok((Source::new(name, &text), text))
    }

    /// Nombre del origen, usualmente una ruta.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoca a `callback` con el contenido de una línea, o una
    /// línea vacía si el número está fuera de rango.
    pub fn with_line<F, R>(&self, line: u32, callback: F) -> R
    where
        F: FnOnce(&str) -> R,
    {
        let index = (line as usize).saturating_sub(1);
        callback(self.lines.get(index).map(String::as_str).unwrap_or(""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tab_stops_align_to_four_columns() {
        let position = Position::default().advance().tab();
        assert_eq!(position.column(), 5);
        assert_eq!(position.tab().column(), 9);
    }

    #[test]
    fn located_display_is_line_prefixed() {
        let located = Located::at("bad", Location::at(Position::default().newline()));
        assert_eq!(located.to_string(), "Line 2: bad");
    }

    #[test]
    fn source_lines_out_of_range_are_empty() {
        let source = Source::new("test", "uno\ndos");
        assert_eq!(source.with_line(2, str::to_owned), "dos");
        assert_eq!(source.with_line(7, str::to_owned), "");
    }
}
