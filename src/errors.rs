use std::error::Error;
use std::fmt::{self, Display};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    /// A bug in the compiler itself rather than in the input program.
    Internal,
    Fatal,
    Error,
    Warn,
    Info,
}

impl Level {
    pub fn is_error(self) -> bool {
        matches!(self, Self::Internal | Self::Fatal | Self::Error)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticMessage {
    /// The qualified name of the method being processed, if any.
    pub method: Option<String>,
    pub message: String,
}

impl DiagnosticMessage {
    pub fn new(message: String) -> Self {
        Self {
            method: None,
            message,
        }
    }
}

impl From<String> for DiagnosticMessage {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl Display for DiagnosticMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.method {
            Some(method) => write!(f, "in {}: {}", method, &self.message),
            None => write!(f, "{}", &self.message),
        }
    }
}

#[derive(Debug)]
pub struct Diagnostic {
    pub level: Level,
    pub message: DiagnosticMessage,
    pub source: Option<Box<dyn Error + 'static>>,
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.message)
    }
}

impl Error for Diagnostic {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source.as_deref()
    }
}

#[must_use = "DiagnosticBuilder is useless unless emitted"]
pub struct DiagnosticBuilder<'a, 'emt> {
    owner: &'a mut Diagnostics<'emt>,
    level: Level,
    method: Option<String>,
    message: Option<String>,
    source: Option<Box<dyn Error + 'static>>,
}

impl<'a, 'emt> DiagnosticBuilder<'a, 'emt> {
    fn new(owner: &'a mut Diagnostics<'emt>, level: Level) -> Self {
        Self {
            owner,
            level,
            method: None,
            message: None,
            source: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());

        self
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());

        self
    }

    pub fn with_source(mut self, source: Box<dyn Error + 'static>) -> Self {
        self.source = Some(source);

        self
    }

    /// Uses the `error` to fill in the message (unless already set) and the source.
    pub fn with_error(mut self, error: impl Error + 'static) -> Self {
        self.message = self.message.or_else(|| Some(format!("{}", error)));
        self.source = Some(Box::new(error));

        self
    }

    /// Emits the diagnostic.
    ///
    /// Panics if the message is not set.
    pub fn emit(self) {
        let message = self.message.expect("message must be set");
        let diagnostic = Diagnostic {
            level: self.level,
            message: DiagnosticMessage {
                method: self.method,
                message,
            },
            source: self.source,
        };

        self.owner.emit(diagnostic);
    }
}

pub type Emitter<'emt> = Box<dyn FnMut(&Diagnostic) + 'emt>;

#[derive(Default)]
pub struct Diagnostics<'emt> {
    diagnostics: Vec<Diagnostic>,
    emitter: Option<Emitter<'emt>>,
    error_count: usize,
}

impl fmt::Debug for Diagnostics<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostics")
            .field("diagnostics", &self.diagnostics)
            .field("error_count", &self.error_count)
            .finish_non_exhaustive()
    }
}

impl<'emt> Diagnostics<'emt> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a callback invoked for every diagnostic as soon as it's emitted.
    pub fn set_emitter(&mut self, emitter: Emitter<'emt>) {
        self.emitter = Some(emitter);
    }

    pub fn with_level(&mut self, level: Level) -> DiagnosticBuilder<'_, 'emt> {
        DiagnosticBuilder::new(self, level)
    }

    pub fn internal(&mut self) -> DiagnosticBuilder<'_, 'emt> {
        self.with_level(Level::Internal)
    }

    pub fn fatal(&mut self) -> DiagnosticBuilder<'_, 'emt> {
        self.with_level(Level::Fatal)
    }

    pub fn error(&mut self) -> DiagnosticBuilder<'_, 'emt> {
        self.with_level(Level::Error)
    }

    pub fn warn(&mut self) -> DiagnosticBuilder<'_, 'emt> {
        self.with_level(Level::Warn)
    }

    pub fn info(&mut self) -> DiagnosticBuilder<'_, 'emt> {
        self.with_level(Level::Info)
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    fn emit(&mut self, diagnostic: Diagnostic) {
        if diagnostic.level.is_error() {
            self.error_count += 1;
        }

        if let Some(emitter) = &mut self.emitter {
            emitter(&diagnostic);
        }

        self.diagnostics.push(diagnostic);
    }
}
