//! An interpreter for the lowered program.
//!
//! The runtime owns a heap of objects and runs bodies against it. The thread identity is
//! simulated: it's whatever [`Runtime::set_current_thread`] last set.

use slotmap::SlotMap;
use tracing::trace;

use crate::bound::{BinOp, UnOp};
use crate::ir::{
    Body, Const, Expr, FailureKind, Instr, Place, ProtocolMethod, StateId, StateMachineType,
    Terminator,
};
use crate::lower::fields::STATE_FIELD;
use crate::lower::LoweringOutput;

pub mod echo;
mod error;
mod host;
mod value;

pub use error::RuntimeError;
pub use host::{Host, HostCall, RecordingHost};
pub use value::{Object, ObjectId, Value};

pub const MAIN_THREAD: i64 = 1;

struct Frame {
    this: Option<Value>,
    locals: Vec<Value>,
}

pub struct Runtime<'a, H> {
    program: &'a LoweringOutput,
    host: H,
    heap: SlotMap<ObjectId, Object>,
    thread: i64,
    fuel: Option<u64>,
}

impl<'a, H: Host> Runtime<'a, H> {
    pub fn new(program: &'a LoweringOutput, host: H) -> Self {
        Self {
            program,
            host,
            heap: SlotMap::with_key(),
            thread: MAIN_THREAD,
            fuel: None,
        }
    }

    /// Limits the number of blocks the runtime executes in total.
    pub fn with_fuel(mut self, fuel: u64) -> Self {
        self.fuel = Some(fuel);

        self
    }

    pub fn program(&self) -> &'a LoweringOutput {
        self.program
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn into_host(self) -> H {
        self.host
    }

    pub fn set_current_thread(&mut self, thread: i64) {
        self.thread = thread;
    }

    /// Allocates an object with no fields, e.g. to serve as a receiver.
    pub fn alloc_object(&mut self, class: impl Into<String>) -> ObjectId {
        self.heap.insert(Object::new(class))
    }

    pub fn object(&self, obj: ObjectId) -> Result<&Object, RuntimeError> {
        self.heap.get(obj).ok_or(RuntimeError::DanglingReference)
    }

    pub fn field(&self, obj: ObjectId, field: &str) -> Result<Value, RuntimeError> {
        let object = self.object(obj)?;

        object
            .fields
            .get(field)
            .copied()
            .ok_or_else(|| RuntimeError::UnknownField {
                class: object.class.clone(),
                field: field.to_owned(),
            })
    }

    /// Stores a value into a field, adding it if the object doesn't have it yet.
    pub fn set_field(
        &mut self,
        obj: ObjectId,
        field: &str,
        value: Value,
    ) -> Result<(), RuntimeError> {
        let object = self
            .heap
            .get_mut(obj)
            .ok_or(RuntimeError::DanglingReference)?;
        object.fields.insert(field.to_owned(), value);

        Ok(())
    }

    pub fn state(&self, obj: ObjectId) -> Result<i64, RuntimeError> {
        self.field(obj, STATE_FIELD)?.as_int()
    }

    /// Calls a method of the program by its qualified name.
    pub fn invoke(
        &mut self,
        method: &str,
        receiver: Option<Value>,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        let program = self.program;
        let lowered = program
            .method(method)
            .ok_or_else(|| RuntimeError::UnknownMethod(method.to_owned()))?;
        trace!(method, ?args, "invoking a method");

        let this = if lowered.is_static {
            None
        } else {
            Some(receiver.ok_or(RuntimeError::MissingReceiver)?)
        };

        self.exec(&lowered.body, this, args)
    }

    fn state_machine(&self, obj: ObjectId) -> Result<&'a StateMachineType, RuntimeError> {
        let program = self.program;
        let class = &self.object(obj)?.class;

        program
            .types
            .get(class.as_str())
            .ok_or_else(|| RuntimeError::UnknownType(class.clone()))
    }

    pub fn call_protocol(
        &mut self,
        obj: ObjectId,
        method: ProtocolMethod,
    ) -> Result<Value, RuntimeError> {
        let ty = self.state_machine(obj)?;
        let def = ty
            .method(method)
            .ok_or_else(|| RuntimeError::NoSuchProtocolMethod {
                class: ty.name.to_string(),
                method,
            })?;
        trace!(%method, class = %ty.name, "calling a protocol method");

        self.exec(&def.body, Some(Value::Ref(obj)), vec![])
    }

    pub fn resume(&mut self, obj: ObjectId) -> Result<bool, RuntimeError> {
        self.call_protocol(obj, ProtocolMethod::Resume)?.as_bool()
    }

    pub fn current(&mut self, obj: ObjectId) -> Result<Value, RuntimeError> {
        self.call_protocol(obj, ProtocolMethod::CurrentValue)
    }

    pub fn dispose(&mut self, obj: ObjectId) -> Result<(), RuntimeError> {
        self.call_protocol(obj, ProtocolMethod::Dispose).map(|_| ())
    }

    pub fn get_iterator(&mut self, obj: ObjectId) -> Result<ObjectId, RuntimeError> {
        self.call_protocol(obj, ProtocolMethod::GetIterator)?.as_object()
    }

    pub fn get_iterator_untyped(&mut self, obj: ObjectId) -> Result<ObjectId, RuntimeError> {
        self.call_protocol(obj, ProtocolMethod::GetIteratorUntyped)?
            .as_object()
    }

    pub fn reset(&mut self, obj: ObjectId) -> Result<(), RuntimeError> {
        self.call_protocol(obj, ProtocolMethod::ResetUnsupported).map(|_| ())
    }

    /// Resumes the iterator until it's done or `limit` values have been produced.
    pub fn drain(
        &mut self,
        obj: ObjectId,
        limit: Option<usize>,
    ) -> Result<Vec<Value>, RuntimeError> {
        let mut values = vec![];

        while limit.map_or(true, |limit| values.len() < limit) && self.resume(obj)? {
            values.push(self.current(obj)?);
        }

        Ok(values)
    }

    fn new_object(&mut self, class: &str, args: Vec<Value>) -> Result<ObjectId, RuntimeError> {
        let program = self.program;
        let ty = program
            .types
            .get(class)
            .ok_or_else(|| RuntimeError::UnknownType(class.to_owned()))?;

        let mut object = Object::new(class);

        for field in ty.fields.values() {
            object.fields.insert(
                field.name.to_string(),
                Const::default_for(&field.ty).into(),
            );
        }

        let obj = self.heap.insert(object);
        self.exec(&ty.ctor.body, Some(Value::Ref(obj)), args)?;

        Ok(obj)
    }

    fn consume_fuel(&mut self) -> Result<(), RuntimeError> {
        match &mut self.fuel {
            Some(0) => Err(RuntimeError::OutOfFuel),

            Some(fuel) => {
                *fuel -= 1;

                Ok(())
            }

            None => Ok(()),
        }
    }

    fn exec(
        &mut self,
        body: &'a Body,
        this: Option<Value>,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        if args.len() != body.param_count {
            return Err(RuntimeError::ArgumentCount {
                expected: body.param_count,
                found: args.len(),
            });
        }

        let mut locals = args;
        locals.extend(
            body.locals[body.param_count..]
                .iter()
                .map(|decl| Value::from(Const::default_for(&decl.ty))),
        );

        let mut frame = Frame { this, locals };
        let mut block = body.entry;

        loop {
            self.consume_fuel()?;
            let data = &body.blocks[block];

            for instr in &data.instrs {
                match instr {
                    Instr::Assign { place, value } => {
                        let value = self.eval(&mut frame, value)?;
                        self.store(&mut frame, place, value)?;
                    }

                    Instr::Eval(expr) => {
                        self.eval(&mut frame, expr)?;
                    }
                }
            }

            block = match &data.terminator {
                Terminator::Jump(target) => *target,

                Terminator::Branch {
                    cond,
                    then_bb,
                    else_bb,
                } => {
                    if self.eval(&mut frame, cond)?.as_bool()? {
                        *then_bb
                    } else {
                        *else_bb
                    }
                }

                Terminator::Switch {
                    discr,
                    arms,
                    default,
                } => {
                    let discr = StateId::from_raw(self.eval(&mut frame, discr)?.as_int()?);

                    arms.iter()
                        .find(|&&(state, _)| Some(state) == discr)
                        .map(|&(_, target)| target)
                        .unwrap_or(*default)
                }

                Terminator::Return(value) => {
                    return match value {
                        Some(value) => self.eval(&mut frame, value),
                        None => Ok(Value::Unit),
                    }
                }

                Terminator::Fail(FailureKind::UnsupportedOperation) => {
                    return Err(RuntimeError::UnsupportedOperation)
                }

                Terminator::Fail(FailureKind::LoweringFailed) => {
                    return Err(RuntimeError::LoweringFailed)
                }

                Terminator::Unreachable => return Err(RuntimeError::UnreachableExecuted),
            };
        }
    }

    fn store(
        &mut self,
        frame: &mut Frame,
        place: &Place,
        value: Value,
    ) -> Result<(), RuntimeError> {
        match place {
            Place::Local(local) => {
                frame.locals[local.idx()] = value;

                Ok(())
            }

            Place::Field { obj, field } => {
                let obj = self.eval(frame, obj)?.as_object()?;

                self.set_field(obj, field.as_str(), value)
            }
        }
    }

    fn eval(&mut self, frame: &mut Frame, expr: &Expr) -> Result<Value, RuntimeError> {
        Ok(match expr {
            Expr::Const(value) => (*value).into(),

            Expr::Load(place) => match &**place {
                Place::Local(local) => frame.locals[local.idx()],

                Place::Field { obj, field } => {
                    let obj = self.eval(frame, obj)?.as_object()?;
                    self.field(obj, field.as_str())?
                }
            },

            Expr::This => frame.this.ok_or(RuntimeError::MissingReceiver)?,

            Expr::Binary {
                op: BinOp::And,
                lhs,
                rhs,
            } => Value::Bool(
                self.eval(frame, lhs)?.as_bool()? && self.eval(frame, rhs)?.as_bool()?,
            ),

            Expr::Binary {
                op: BinOp::Or,
                lhs,
                rhs,
            } => Value::Bool(
                self.eval(frame, lhs)?.as_bool()? || self.eval(frame, rhs)?.as_bool()?,
            ),

            Expr::Binary { op, lhs, rhs } => {
                let lhs = self.eval(frame, lhs)?;
                let rhs = self.eval(frame, rhs)?;

                eval_binary(*op, lhs, rhs)?
            }

            Expr::Unary { op, expr } => {
                let value = self.eval(frame, expr)?;

                match op {
                    UnOp::Neg => Value::Int(value.as_int()?.wrapping_neg()),
                    UnOp::Not => Value::Bool(!value.as_bool()?),
                }
            }

            Expr::Call { func, args } => {
                let args = args
                    .iter()
                    .map(|arg| self.eval(frame, arg))
                    .collect::<Result<Vec<_>, _>>()?;
                trace!(%func, ?args, "calling an external function");

                self.host.call(func, &args)?
            }

            Expr::CallMethod { recv, method } => {
                let recv = self.eval(frame, recv)?.as_object()?;

                self.call_protocol(recv, *method)?
            }

            Expr::New { ty, args } => {
                let args = args
                    .iter()
                    .map(|arg| self.eval(frame, arg))
                    .collect::<Result<Vec<_>, _>>()?;

                Value::Ref(self.new_object(ty.as_str(), args)?)
            }

            Expr::CurrentThreadId => Value::Int(self.thread),
        })
    }
}

fn eval_binary(op: BinOp, lhs: Value, rhs: Value) -> Result<Value, RuntimeError> {
    let ints = || -> Result<(i64, i64), RuntimeError> { Ok((lhs.as_int()?, rhs.as_int()?)) };

    Ok(match op {
        BinOp::Eq => Value::Bool(lhs == rhs),
        BinOp::Ne => Value::Bool(lhs != rhs),
        BinOp::And => Value::Bool(lhs.as_bool()? && rhs.as_bool()?),
        BinOp::Or => Value::Bool(lhs.as_bool()? || rhs.as_bool()?),

        BinOp::Add => {
            let (lhs, rhs) = ints()?;
            Value::Int(lhs.wrapping_add(rhs))
        }

        BinOp::Sub => {
            let (lhs, rhs) = ints()?;
            Value::Int(lhs.wrapping_sub(rhs))
        }

        BinOp::Mul => {
            let (lhs, rhs) = ints()?;
            Value::Int(lhs.wrapping_mul(rhs))
        }

        BinOp::Div | BinOp::Rem => {
            let (lhs, rhs) = ints()?;

            if rhs == 0 {
                return Err(RuntimeError::DivisionByZero);
            }

            Value::Int(if op == BinOp::Div {
                lhs.wrapping_div(rhs)
            } else {
                lhs.wrapping_rem(rhs)
            })
        }

        BinOp::Lt => {
            let (lhs, rhs) = ints()?;
            Value::Bool(lhs < rhs)
        }

        BinOp::Le => {
            let (lhs, rhs) = ints()?;
            Value::Bool(lhs <= rhs)
        }

        BinOp::Gt => {
            let (lhs, rhs) = ints()?;
            Value::Bool(lhs > rhs)
        }

        BinOp::Ge => {
            let (lhs, rhs) = ints()?;
            Value::Bool(lhs >= rhs)
        }
    })
}
