//! Runtime fault type with source-location tracking.
//!
//! Every error raised by executing code is a [`RuntimeFault`] wrapped in an
//! [`anyhow::Error`]. The runner hands it to the caller untouched, so
//! `err.downcast_ref::<RuntimeFault>()` always recovers the original kind,
//! message and span.

use coderun_syntax::Span;
use std::fmt;

/// The class of a [`RuntimeFault`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    NameError,
    UnboundLocalError,
    TypeError,
    ValueError,
    ZeroDivisionError,
    IndexError,
    KeyError,
    AttributeError,
    OverflowError,
    RecursionError,
    /// The compiled artifact itself is inconsistent (e.g. an edited constant
    /// pool that no longer matches its instructions).
    SystemError,
}

impl FaultKind {
    pub fn name(&self) -> &'static str {
        match self {
            FaultKind::NameError => "NameError",
            FaultKind::UnboundLocalError => "UnboundLocalError",
            FaultKind::TypeError => "TypeError",
            FaultKind::ValueError => "ValueError",
            FaultKind::ZeroDivisionError => "ZeroDivisionError",
            FaultKind::IndexError => "IndexError",
            FaultKind::KeyError => "KeyError",
            FaultKind::AttributeError => "AttributeError",
            FaultKind::OverflowError => "OverflowError",
            FaultKind::RecursionError => "RecursionError",
            FaultKind::SystemError => "SystemError",
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An error raised by the executed code.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeFault {
    pub kind: FaultKind,
    pub message: String,
    /// Source location of the instruction that failed, when known.
    pub span: Option<Span>,
}

impl RuntimeFault {
    pub fn new(kind: FaultKind, message: impl Into<String>, span: Option<Span>) -> Self {
        Self {
            kind,
            message: message.into(),
            span,
        }
    }

    /// Fills in `span` unless one is already recorded.
    pub fn or_span(mut self, span: Option<Span>) -> Self {
        if self.span.is_none() {
            self.span = span;
        }
        self
    }
}

impl fmt::Display for RuntimeFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for RuntimeFault {}

/// Builds an [`anyhow::Error`] holding a [`RuntimeFault`] without a span.
///
/// # Usage
/// ```ignore
/// return Err(fault!(TypeError, "unsupported operand type(s) for +: '{}' and '{}'", a, b));
/// ```
#[macro_export]
macro_rules! fault {
    ($kind:ident, $($arg:tt)*) => {
        anyhow::anyhow!($crate::error::RuntimeFault::new(
            $crate::error::FaultKind::$kind,
            format!($($arg)*),
            None,
        ))
    };
}

/// Bail out of a function with a [`RuntimeFault`] that includes a source span.
///
/// # Usage
/// ```ignore
/// bail_fault!(span, NameError, "name '{}' is not defined", name);
/// bail_fault!(None::<Span>, ZeroDivisionError, "division by zero");
/// ```
#[macro_export]
macro_rules! bail_fault {
    ($span:expr, $kind:ident, $($arg:tt)*) => {
        return Err(anyhow::anyhow!($crate::error::RuntimeFault::new(
            $crate::error::FaultKind::$kind,
            format!($($arg)*),
            $crate::error::into_option_span($span),
        )))
    };
}

/// Attaches `span` to a fault that does not have one yet. Errors that are
/// not faults pass through unchanged.
pub fn with_span(err: anyhow::Error, span: Option<Span>) -> anyhow::Error {
    match err.downcast::<RuntimeFault>() {
        Ok(fault) => anyhow::Error::new(fault.or_span(span)),
        Err(other) => other,
    }
}

/// Helper to convert various span representations into `Option<Span>`.
///
/// Accepts `Span`, `&Span`, `Option<Span>`, and `Option<&Span>`.
pub fn into_option_span(span: impl IntoOptionSpan) -> Option<Span> {
    span.into_option_span()
}

/// Trait for converting span-like values to `Option<Span>`.
pub trait IntoOptionSpan {
    fn into_option_span(self) -> Option<Span>;
}

impl IntoOptionSpan for Span {
    fn into_option_span(self) -> Option<Span> {
        Some(self)
    }
}

impl IntoOptionSpan for &Span {
    fn into_option_span(self) -> Option<Span> {
        Some(*self)
    }
}

impl IntoOptionSpan for Option<Span> {
    fn into_option_span(self) -> Option<Span> {
        self
    }
}

impl IntoOptionSpan for Option<&Span> {
    fn into_option_span(self) -> Option<Span> {
        self.copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn divide(a: i64, b: i64, span: Span) -> Result<i64> {
        if b == 0 {
            bail_fault!(span, ZeroDivisionError, "integer division or modulo by zero");
        }
        Ok(a / b)
    }

    #[test]
    fn display_includes_kind() {
        let fault = RuntimeFault::new(FaultKind::NameError, "name 'x' is not defined", None);
        assert_eq!(fault.to_string(), "NameError: name 'x' is not defined");
    }

    #[test]
    fn bail_fault_carries_span() {
        let span = Span::new(2, 3, 10, 12);
        let err = divide(1, 0, span).unwrap_err();
        let fault = err.downcast_ref::<RuntimeFault>().unwrap();
        assert_eq!(fault.kind, FaultKind::ZeroDivisionError);
        assert_eq!(fault.span, Some(span));
    }

    #[test]
    fn with_span_keeps_existing_span() {
        let first = Span::new(1, 1, 0, 1);
        let second = Span::new(9, 9, 90, 91);
        let err = anyhow::Error::new(RuntimeFault::new(FaultKind::TypeError, "bad", Some(first)));
        let err = with_span(err, Some(second));
        assert_eq!(err.downcast_ref::<RuntimeFault>().unwrap().span, Some(first));

        let err = with_span(fault!(KeyError, "'k'"), Some(second));
        assert_eq!(err.downcast_ref::<RuntimeFault>().unwrap().span, Some(second));
    }

    #[test]
    fn with_span_ignores_foreign_errors() {
        let err = with_span(anyhow::anyhow!("plain"), None);
        assert!(err.downcast_ref::<RuntimeFault>().is_none());
        assert_eq!(err.to_string(), "plain");
    }
}
