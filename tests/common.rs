#![allow(dead_code)]

use std::borrow::Cow;

use once_cell::unsync::OnceCell;

use itergen::bound::{BoundMethod, BoundProgram};
use itergen::errors::{Diagnostic, Diagnostics};
use itergen::lower::{self, LoweringOptions, LoweringOutput};

pub struct Dump<'a> {
    bytes: Cow<'a, [u8]>,
    string: OnceCell<String>,
}

impl PartialEq for Dump<'_> {
    fn eq(&self, other: &Dump) -> bool {
        self.bytes == other.bytes
    }
}

impl AsRef<str> for Dump<'_> {
    fn as_ref(&self) -> &str {
        self.string
            .get_or_init(|| String::from_utf8_lossy(&self.bytes).into_owned())
    }
}

impl<'a> From<&'a [u8]> for Dump<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        Self {
            bytes: Cow::Borrowed(bytes),
            string: OnceCell::new(),
        }
    }
}

impl From<Vec<u8>> for Dump<'_> {
    fn from(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Cow::Owned(bytes),
            string: OnceCell::new(),
        }
    }
}

pub fn parse_program(text: &str) -> BoundProgram {
    ron::from_str(text).unwrap()
}

pub fn parse_method(text: &str) -> BoundMethod {
    ron::from_str(text).unwrap()
}

pub fn lower_with(
    methods: &[BoundMethod],
    options: &LoweringOptions,
) -> (LoweringOutput, Vec<Diagnostic>) {
    let mut diagnostics = Diagnostics::new();
    let output = lower::lower_methods(methods, options, &mut diagnostics);

    (output, diagnostics.into_vec())
}

/// Lowers the methods with the default options, asserting nothing went wrong.
pub fn lower_ok(methods: &[BoundMethod]) -> LoweringOutput {
    let (output, diagnostics) = lower_with(methods, &LoweringOptions::default());
    assert!(diagnostics.is_empty(), "lowering failed!\n{:?}", diagnostics);

    output
}
