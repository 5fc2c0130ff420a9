use super::error::RuntimeError;
use super::value::Value;

/// Supplies the meaning of calls to external functions.
pub trait Host {
    fn call(&mut self, func: &str, args: &[Value]) -> Result<Value, RuntimeError>;
}

impl<H: Host + ?Sized> Host for &mut H {
    fn call(&mut self, func: &str, args: &[Value]) -> Result<Value, RuntimeError> {
        (**self).call(func, args)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostCall {
    pub func: String,
    pub args: Vec<Value>,
}

/// Records every external call. All calls return `()`.
#[derive(Debug, Clone, Default)]
pub struct RecordingHost {
    pub calls: Vec<HostCall>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, func: &str) -> usize {
        self.calls.iter().filter(|call| call.func == func).count()
    }
}

impl Host for RecordingHost {
    fn call(&mut self, func: &str, args: &[Value]) -> Result<Value, RuntimeError> {
        self.calls.push(HostCall {
            func: func.to_owned(),
            args: args.to_vec(),
        });

        Ok(Value::Unit)
    }
}
