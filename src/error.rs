//! Reporte de diagnósticos.
//!
//! Cada fase produce errores tipados envueltos en [`Located`]. Este
//! módulo los reúne, sin importar su tipo concreto, en un único
//! [`Diagnostics`] que recuerda la fase de origen de cada uno.

use crate::source::{Located, Location, Source};
use std::{
    error::Error,
    fmt::{self, Display},
};

mod sealed {
    pub trait Sealed {}
}

/// Error con ubicación, sin importar la fase.
pub trait LocatedError: sealed::Sealed {
    fn source(&self) -> &dyn Error;
    fn location(&self) -> &Location;
}

/// Fase que originó un error.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Lexical,
    Syntax,
    Semantic,
}

impl Display for Stage {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let string = match self {
            Stage::Lexical => "Lexical",
            Stage::Syntax => "Syntax",
            Stage::Semantic => "Semantic",
        };

        fmt.write_str(string)
    }
}

struct Entry {
    stage: Stage,
    error: Box<dyn 'static + LocatedError>,
}

#[derive(Default)]
pub struct Diagnostics {
    entries: Vec<Entry>,
}

impl Diagnostics {
    pub fn push<E: 'static + LocatedError>(&mut self, stage: Stage, error: E) {
        self.entries.push(Entry {
            stage,
            error: Box::new(error),
        });
    }

    pub fn extend<E, I>(&mut self, stage: Stage, errors: I)
    where
        E: 'static + LocatedError,
        I: IntoIterator<Item = E>,
    {
        for error in errors {
            self.push(stage, error);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cantidad de errores de una fase.
    pub fn count(&self, stage: Stage) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.stage == stage)
            .count()
    }

    /// Forma plana: `<Fase> error on line N: descripción`.
    pub fn messages(&self) -> impl '_ + Iterator<Item = String> {
        self.entries.iter().map(|Entry { stage, error }| {
            format!(
                "{} error on line {}: {}",
                stage,
                error.location().start().line(),
                error.source()
            )
        })
    }

    /// Igual a [`Diagnostics::messages()`], filtrado por fase.
    pub fn messages_of(&self, stage: Stage) -> Vec<String> {
        self.entries
            .iter()
            .zip(self.messages())
            .filter(|(entry, _)| entry.stage == stage)
            .map(|(_, message)| message)
            .collect()
    }

    /// Muestra cada error junto a la línea de código que lo originó.
    pub fn render<'a>(&'a self, source: &'a Source) -> Rendered<'a> {
        Rendered {
            diagnostics: self,
            source,
        }
    }
}

/// Diagnósticos listos para mostrarse, ver [`Diagnostics::render()`].
pub struct Rendered<'a> {
    diagnostics: &'a Diagnostics,
    source: &'a Source,
}

impl Display for Rendered<'_> {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Rendered {
            diagnostics,
            source,
        } = self;

        let entries = &diagnostics.entries;
        if entries.is_empty() {
            return writeln!(fmt, "No errors were reported");
        }

        for Entry { stage, error } in entries.iter() {
            writeln!(fmt, "{} error: {}", stage, error.source())?;

            let location = error.location();
            writeln!(fmt, " --> {}:{}", source.name(), location)?;

            let digits = location.end().line().to_string().chars().count();
            writeln!(fmt, "{:digits$} |", "", digits = digits)?;

            for line_number in location.start().line()..=location.end().line() {
                source.with_line(line_number, |line| {
                    writeln!(fmt, "{:>digits$} | {}", line_number, line, digits = digits)
                })?
            }

            let from = location.start().column();
            let to = location.end().column().saturating_sub(1).max(1);
            let (min, max) = (from.min(to), from.max(to));

            let skip = (min - 1) as usize;
            let highlight = (max - min + 1) as usize;

            writeln!(
                fmt,
                "{:digits$} | {:skip$}{:^<highlight$}",
                "",
                "",
                "",
                digits = digits,
                skip = skip,
                highlight = highlight
            )?;

            writeln!(fmt)?;
        }

        let error_or_errors = if entries.len() == 1 { "error" } else { "errors" };
        writeln!(
            fmt,
            "Build failed with {} {}",
            entries.len(),
            error_or_errors
        )
    }
}

impl<E: Error> sealed::Sealed for Located<E> {}

impl<E: Error> LocatedError for Located<E> {
    fn source(&self) -> &dyn Error {
        self.as_ref()
    }

    fn location(&self) -> &Location {
        Located::location(self)
    }
}
