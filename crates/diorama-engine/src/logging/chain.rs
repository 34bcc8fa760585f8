use std::error::Error;
use std::fmt::Write;

/// Formats an error and its `source()` chain, one cause per line.
///
/// ```text
/// scenes.main.objects.sun: update failed
///   ↳ property `intensity`
///   ↳ nope is not defined in expression `nope * 2`
/// ```
pub fn error_chain(err: &(dyn Error + '_)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let _ = write!(out, "\n  ↳ {cause}");
        source = cause.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    #[derive(Debug)]
    struct Layer(&'static str, Option<Box<Layer>>);

    impl fmt::Display for Layer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.0)
        }
    }

    impl Error for Layer {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            self.1.as_deref().map(|e| e as _)
        }
    }

    #[test]
    fn single_error_has_no_continuation() {
        assert_eq!(error_chain(&Layer("boom", None)), "boom");
    }

    #[test]
    fn causes_are_indented() {
        let err = Layer("outer", Some(Box::new(Layer("middle", Some(Box::new(Layer("inner", None)))))));
        assert_eq!(error_chain(&err), "outer\n  ↳ middle\n  ↳ inner");
    }
}
