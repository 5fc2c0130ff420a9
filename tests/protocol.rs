mod common;

use pretty_assertions::assert_eq;

use itergen::interp::{ObjectId, RecordingHost, Runtime, RuntimeError, Value};
use itergen::lower::{LoweringOptions, LoweringOutput};

use self::common::{lower_ok, lower_with, parse_program};

const PROGRAM: &str = r#"(methods: [
    (
        name: "Values",
        container: "Pair",
        is_static: true,
        ret: Iterator(Int),
        body: [Yield(Int(1)), Yield(Int(2))],
    ),
    (
        name: "Countdown",
        container: "Numbers",
        is_static: true,
        params: [(name: "n", ty: Int)],
        ret: Iterable(Int),
        body: [
            While(
                cond: Binary(op: Gt, lhs: Param(0), rhs: Int(0)),
                body: [
                    Yield(Param(0)),
                    Assign(target: Param(0), value: Binary(op: Sub, lhs: Param(0), rhs: Int(1))),
                ],
            ),
        ],
    ),
    (
        name: "Guarded",
        container: "Files",
        is_static: true,
        ret: Iterable(Int),
        body: [
            Try(
                body: [Yield(Int(1)), Yield(Int(2))],
                finally: [Expr(Call(func: "tick"))],
            ),
        ],
    ),
    (
        name: "Nested",
        container: "Files",
        is_static: true,
        ret: Iterator(Int),
        body: [
            Try(
                body: [
                    Yield(Int(1)),
                    Try(
                        body: [Yield(Int(2))],
                        finally: [Expr(Call(func: "inner"))],
                    ),
                ],
                finally: [Expr(Call(func: "outer"))],
            ),
        ],
    ),
    (
        name: "Scaled",
        container: "Counter",
        params: [(name: "by", ty: Int)],
        ret: Iterable(Int),
        body: [
            Yield(Binary(op: Mul, lhs: Field(obj: This, name: "step"), rhs: Param(0))),
        ],
    ),
])"#;

fn program() -> LoweringOutput {
    lower_ok(&parse_program(PROGRAM).methods)
}

fn start(runtime: &mut Runtime<'_, RecordingHost>, method: &str, args: Vec<Value>) -> ObjectId {
    runtime
        .invoke(method, None, args)
        .unwrap()
        .as_object()
        .unwrap()
}

#[test]
fn test_values_then_false() {
    let program = program();
    let mut runtime = Runtime::new(&program, RecordingHost::new());
    let it = start(&mut runtime, "Pair.Values", vec![]);

    assert_eq!(runtime.state(it), Ok(0));
    assert_eq!(runtime.resume(it), Ok(true));
    assert_eq!(runtime.current(it), Ok(Value::Int(1)));
    assert_eq!(runtime.resume(it), Ok(true));
    assert_eq!(runtime.current(it), Ok(Value::Int(2)));
    assert_eq!(runtime.resume(it), Ok(false));
    assert_eq!(runtime.state(it), Ok(-1));

    assert_eq!(runtime.resume(it), Ok(false));
    runtime.dispose(it).unwrap();
    assert_eq!(runtime.state(it), Ok(-1));
}

#[test]
fn test_states_only_move_forward() {
    let program = program();
    let mut runtime = Runtime::new(&program, RecordingHost::new());
    let it = start(&mut runtime, "Pair.Values", vec![]);

    let mut states = vec![runtime.state(it).unwrap()];

    while runtime.resume(it).unwrap() {
        states.push(runtime.state(it).unwrap());
    }

    states.push(runtime.state(it).unwrap());
    assert_eq!(states, vec![0, 1, 2, -1]);
}

#[test]
fn test_first_iterator_reuses_the_instance() {
    let program = program();
    let mut runtime = Runtime::new(&program, RecordingHost::new());
    let iterable = start(&mut runtime, "Numbers.Countdown", vec![Value::Int(2)]);
    assert_eq!(runtime.state(iterable), Ok(-2));

    let first = runtime.get_iterator(iterable).unwrap();
    assert_eq!(first, iterable);
    assert_eq!(runtime.state(first), Ok(0));

    let second = runtime.get_iterator(iterable).unwrap();
    assert_ne!(second, iterable);
    assert_eq!(runtime.state(second), Ok(0));
}

#[test]
fn test_no_reuse_on_another_thread() {
    let program = program();
    let mut runtime = Runtime::new(&program, RecordingHost::new());
    let iterable = start(&mut runtime, "Numbers.Countdown", vec![Value::Int(2)]);

    runtime.set_current_thread(2);
    let it = runtime.get_iterator(iterable).unwrap();

    assert_ne!(it, iterable);
    assert_eq!(runtime.state(iterable), Ok(-2));
    assert_eq!(runtime.field(it, "$thread"), Ok(Value::Int(2)));
}

#[test]
fn test_reuse_ignores_threads_without_thread_identity() {
    let options = LoweringOptions {
        thread_identity: false,
        ..Default::default()
    };
    let (program, diagnostics) = lower_with(&parse_program(PROGRAM).methods, &options);
    assert!(diagnostics.is_empty());

    let mut runtime = Runtime::new(&program, RecordingHost::new());
    let iterable = start(&mut runtime, "Numbers.Countdown", vec![Value::Int(2)]);

    runtime.set_current_thread(2);
    assert_eq!(runtime.get_iterator(iterable), Ok(iterable));
}

#[test]
fn test_no_reuse_after_iteration_started() {
    let program = program();
    let mut runtime = Runtime::new(&program, RecordingHost::new());
    let iterable = start(&mut runtime, "Numbers.Countdown", vec![Value::Int(2)]);

    let first = runtime.get_iterator(iterable).unwrap();
    assert_eq!(runtime.drain(first, Some(1)), Ok(vec![Value::Int(2)]));

    let second = runtime.get_iterator(iterable).unwrap();
    assert_ne!(second, first);
}

#[test]
fn test_iterators_get_their_own_arguments() {
    let program = program();
    let mut runtime = Runtime::new(&program, RecordingHost::new());
    let iterable = start(&mut runtime, "Numbers.Countdown", vec![Value::Int(3)]);

    let first = runtime.get_iterator(iterable).unwrap();
    assert_eq!(
        runtime.drain(first, None),
        Ok(vec![Value::Int(3), Value::Int(2), Value::Int(1)])
    );
    assert_eq!(runtime.field(first, "n"), Ok(Value::Int(0)));

    let second = runtime.get_iterator(iterable).unwrap();
    runtime.set_field(second, "n", Value::Int(1)).unwrap();
    let third = runtime.get_iterator(iterable).unwrap();

    assert_eq!(runtime.drain(second, None), Ok(vec![Value::Int(1)]));
    assert_eq!(
        runtime.drain(third, None),
        Ok(vec![Value::Int(3), Value::Int(2), Value::Int(1)])
    );
}

#[test]
fn test_untyped_iterator() {
    let program = program();
    let mut runtime = Runtime::new(&program, RecordingHost::new());
    let iterable = start(&mut runtime, "Numbers.Countdown", vec![Value::Int(1)]);

    let it = runtime.get_iterator_untyped(iterable).unwrap();
    assert_eq!(it, iterable);
    assert_eq!(runtime.drain(it, None), Ok(vec![Value::Int(1)]));
}

#[test]
fn test_receiver_is_captured() {
    let program = program();
    let mut runtime = Runtime::new(&program, RecordingHost::new());
    let counter = runtime.alloc_object("Counter");
    runtime.set_field(counter, "step", Value::Int(7)).unwrap();

    let iterable = runtime
        .invoke("Counter.Scaled", Some(Value::Ref(counter)), vec![Value::Int(2)])
        .unwrap()
        .as_object()
        .unwrap();
    let it = runtime.get_iterator(iterable).unwrap();

    assert_eq!(runtime.field(it, "$this"), Ok(Value::Ref(counter)));
    assert_eq!(runtime.drain(it, None), Ok(vec![Value::Int(14)]));
}

#[test]
fn test_instance_method_needs_receiver() {
    let program = program();
    let mut runtime = Runtime::new(&program, RecordingHost::new());

    assert_eq!(
        runtime.invoke("Counter.Scaled", None, vec![Value::Int(2)]),
        Err(RuntimeError::MissingReceiver)
    );
}

#[test]
fn test_dispose_runs_finally_once() {
    let program = program();
    let mut runtime = Runtime::new(&program, RecordingHost::new());
    let iterable = start(&mut runtime, "Files.Guarded", vec![]);
    let it = runtime.get_iterator(iterable).unwrap();

    assert_eq!(runtime.drain(it, Some(1)), Ok(vec![Value::Int(1)]));
    assert_eq!(runtime.host().count("tick"), 0);

    runtime.dispose(it).unwrap();
    assert_eq!(runtime.host().count("tick"), 1);
    assert_eq!(runtime.state(it), Ok(-1));

    runtime.dispose(it).unwrap();
    assert_eq!(runtime.host().count("tick"), 1);
    assert_eq!(runtime.resume(it), Ok(false));
}

#[test]
fn test_finally_runs_on_completion_only() {
    let program = program();
    let mut runtime = Runtime::new(&program, RecordingHost::new());
    let iterable = start(&mut runtime, "Files.Guarded", vec![]);
    let it = runtime.get_iterator(iterable).unwrap();

    assert_eq!(
        runtime.drain(it, None),
        Ok(vec![Value::Int(1), Value::Int(2)])
    );
    assert_eq!(runtime.host().count("tick"), 1);

    runtime.dispose(it).unwrap();
    assert_eq!(runtime.host().count("tick"), 1);
}

#[test]
fn test_dispose_before_start() {
    let program = program();
    let mut runtime = Runtime::new(&program, RecordingHost::new());
    let iterable = start(&mut runtime, "Files.Guarded", vec![]);

    runtime.dispose(iterable).unwrap();
    assert_eq!(runtime.state(iterable), Ok(-2));

    let it = runtime.get_iterator(iterable).unwrap();
    runtime.dispose(it).unwrap();
    assert_eq!(runtime.state(it), Ok(-1));
    assert_eq!(runtime.host().count("tick"), 0);
}

#[test]
fn test_dispose_runs_nested_finally_innermost_first() {
    let program = program();
    let mut runtime = Runtime::new(&program, RecordingHost::new());
    let it = start(&mut runtime, "Files.Nested", vec![]);

    assert_eq!(
        runtime.drain(it, Some(2)),
        Ok(vec![Value::Int(1), Value::Int(2)])
    );
    runtime.dispose(it).unwrap();

    let calls = runtime
        .into_host()
        .calls
        .into_iter()
        .map(|call| call.func)
        .collect::<Vec<_>>();
    assert_eq!(calls, vec!["inner", "outer"]);
}

#[test]
fn test_dispose_between_regions() {
    let program = program();
    let mut runtime = Runtime::new(&program, RecordingHost::new());
    let it = start(&mut runtime, "Files.Nested", vec![]);

    assert_eq!(runtime.drain(it, Some(1)), Ok(vec![Value::Int(1)]));
    runtime.dispose(it).unwrap();

    assert_eq!(runtime.host().count("inner"), 0);
    assert_eq!(runtime.host().count("outer"), 1);
}

#[test]
fn test_reset_is_unsupported() {
    let program = program();
    let mut runtime = Runtime::new(&program, RecordingHost::new());
    let it = start(&mut runtime, "Pair.Values", vec![]);

    assert_eq!(runtime.reset(it), Err(RuntimeError::UnsupportedOperation));
}

#[test]
fn test_iterator_only_type_has_no_get_iterator() {
    let program = program();
    let mut runtime = Runtime::new(&program, RecordingHost::new());
    let it = start(&mut runtime, "Pair.Values", vec![]);

    assert!(matches!(
        runtime.get_iterator(it),
        Err(RuntimeError::NoSuchProtocolMethod { .. })
    ));
}

#[test]
fn test_failed_lowering_fails_at_call() {
    let program = parse_program(
        r#"(methods: [(
            name: "Bad",
            container: "C",
            is_static: true,
            ret: Iterator(Int),
            body: [Try(body: [], finally: [Yield(Int(1))])],
        )])"#,
    );
    let (output, diagnostics) = lower_with(&program.methods, &LoweringOptions::default());
    assert_eq!(diagnostics.len(), 1);

    let mut runtime = Runtime::new(&output, RecordingHost::new());
    assert_eq!(
        runtime.invoke("C.Bad", None, vec![]),
        Err(RuntimeError::LoweringFailed)
    );
}

#[test]
fn test_fuel_limits_execution() {
    let program = parse_program(
        r#"(methods: [(
            name: "Forever",
            container: "Loop",
            is_static: true,
            ret: Iterator(Int),
            body: [While(cond: Bool(true), body: [])],
        )])"#,
    );
    let output = lower_ok(&program.methods);
    let mut runtime = Runtime::new(&output, RecordingHost::new()).with_fuel(20);
    let it = start(&mut runtime, "Loop.Forever", vec![]);

    assert_eq!(runtime.resume(it), Err(RuntimeError::OutOfFuel));
}

#[test]
fn test_dispose_unwinds_loop_regions() {
    let program = lower_ok(&parse_program(include_str!("run/control_flow.ron")).methods);
    let calls = |runtime: Runtime<'_, RecordingHost>| {
        runtime
            .into_host()
            .calls
            .into_iter()
            .map(|call| (call.func, call.args))
            .collect::<Vec<_>>()
    };

    let mut runtime = Runtime::new(&program, RecordingHost::new());
    let it = start(&mut runtime, "Flow.Unwind", vec![]);
    assert_eq!(runtime.drain(it, Some(1)), Ok(vec![Value::Int(1)]));

    runtime.dispose(it).unwrap();
    runtime.dispose(it).unwrap();
    assert_eq!(runtime.resume(it), Ok(false));
    assert_eq!(
        calls(runtime),
        vec![
            ("inner".to_owned(), vec![Value::Int(1)]),
            ("outer".to_owned(), vec![Value::Int(1)]),
        ]
    );

    let mut runtime = Runtime::new(&program, RecordingHost::new());
    let it = start(&mut runtime, "Flow.Unwind", vec![]);
    assert_eq!(
        runtime.drain(it, Some(2)),
        Ok(vec![Value::Int(1), Value::Int(30)])
    );

    runtime.dispose(it).unwrap();
    assert_eq!(
        calls(runtime),
        vec![
            ("inner".to_owned(), vec![Value::Int(1)]),
            ("inner".to_owned(), vec![Value::Int(2)]),
            ("inner".to_owned(), vec![Value::Int(3)]),
            ("outer".to_owned(), vec![Value::Int(3)]),
        ]
    );
}
