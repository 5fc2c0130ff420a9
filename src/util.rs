use std::fmt::{self, Write};

#[macro_export]
macro_rules! try_match {
    ($e:expr, $(|)? $pattern:pat $( if $guard:expr )? $(,)? => $v:expr) => {
        match $e {
            $pattern $( if $guard )? => Some($v),
            _ => None,
        }
    }
}

/// A writer adapter that indents every line written through it by four spaces.
pub struct Indented<'a, W: Write> {
    inner: &'a mut W,
    at_line_start: bool,
}

impl<'a, W: Write> Indented<'a, W> {
    pub fn new(inner: &'a mut W) -> Self {
        Self {
            inner,
            at_line_start: true,
        }
    }
}

impl<W: Write> Write for Indented<'_, W> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for line in s.split_inclusive('\n') {
            if self.at_line_start {
                self.inner.write_str("    ")?;
            }

            self.inner.write_str(line)?;
            self.at_line_start = line.ends_with('\n');
        }

        Ok(())
    }
}
