//! Runs every method of a lowered program and writes a transcript of what happened.

use std::fmt;
use std::io::{self, Write};
use std::iter;

use itertools::Itertools;

use crate::lower::{LoweredMethod, LoweringOutput};

use super::{Host, Runtime, RuntimeError, Value};

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// The integer arguments passed to every method, padded with zeros.
    pub args: Vec<i64>,

    /// Stop resuming an iterator after this many values and dispose of it.
    pub limit: Option<usize>,
    pub fuel: Option<u64>,
}

/// A host that prints every external call it receives.
pub struct EchoHost<W> {
    out: W,
}

impl<W: Write> EchoHost<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn echo(&mut self, args: fmt::Arguments<'_>) -> Result<(), RuntimeError> {
        writeln!(self.out, "  {}", args).map_err(|e| RuntimeError::Host(e.to_string()))
    }
}

impl<W: Write> Host for EchoHost<W> {
    fn call(&mut self, func: &str, args: &[Value]) -> Result<Value, RuntimeError> {
        self.echo(format_args!("call {}({})", func, args.iter().join(", ")))?;

        Ok(Value::Unit)
    }
}

enum Outcome {
    Done,
    Stopped(usize),
}

fn drive<W: Write>(
    runtime: &mut Runtime<'_, EchoHost<W>>,
    name: &str,
    method: &LoweredMethod,
    args: Vec<Value>,
    limit: Option<usize>,
) -> Result<Outcome, RuntimeError> {
    let receiver = (!method.is_static)
        .then(|| Value::Ref(runtime.alloc_object(method.container.clone())));
    let instance = runtime.invoke(name, receiver, args)?.as_object()?;

    let is_iterable = runtime
        .program()
        .state_machine_of(name)
        .map_or(false, |ty| ty.capabilities.is_iterable());
    let iter = if is_iterable {
        runtime.get_iterator(instance)?
    } else {
        instance
    };

    let mut produced = 0;

    while limit.map_or(true, |limit| produced < limit) {
        if !runtime.resume(iter)? {
            return Ok(Outcome::Done);
        }

        let value = runtime.current(iter)?;
        runtime.host_mut().echo(format_args!("yield {}", value))?;
        produced += 1;
    }

    runtime.dispose(iter)?;

    Ok(Outcome::Stopped(produced))
}

pub fn run_method(
    program: &LoweringOutput,
    name: &str,
    options: &RunOptions,
    mut out: impl Write,
) -> io::Result<()> {
    let Some(method) = program.method(name) else {
        return writeln!(out, "{}: {}", name, RuntimeError::UnknownMethod(name.to_owned()));
    };

    let args = options
        .args
        .iter()
        .copied()
        .chain(iter::repeat(0))
        .take(method.body.param_count)
        .map(Value::Int)
        .collect::<Vec<_>>();
    writeln!(out, "{}({}):", name, args.iter().join(", "))?;

    let mut runtime = Runtime::new(program, EchoHost::new(&mut out));

    if let Some(fuel) = options.fuel {
        runtime = runtime.with_fuel(fuel);
    }

    let result = drive(&mut runtime, name, method, args, options.limit);
    drop(runtime);

    match result {
        Ok(Outcome::Done) => writeln!(out, "  done"),
        Ok(Outcome::Stopped(count)) => writeln!(out, "  stopped after {} values", count),
        Err(e) => writeln!(out, "  error: {}", e),
    }
}

/// Runs every method in definition order.
pub fn run_program(
    program: &LoweringOutput,
    options: &RunOptions,
    mut out: impl Write,
) -> io::Result<()> {
    for name in program.methods.keys() {
        run_method(program, name, options, &mut out)?;
    }

    Ok(())
}
