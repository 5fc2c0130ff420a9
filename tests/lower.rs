mod common;

use insta::assert_snapshot;
use pretty_assertions::assert_eq;

use itergen::bound::{LocalSymbol, Ty};
use itergen::errors::Level;
use itergen::ir::{
    CapabilitySet, FieldRole, ProtocolMethod, StateId, StateTable, SuspensionPoint, Terminator,
};
use itergen::lower::synth::select_capabilities;
use itergen::lower::validate::check_dispatch;
use itergen::lower::{
    lower_iterator_method, LoweringError, LoweringOptions, NameAllocator, PromotionPolicy,
};

use self::common::{lower_ok, lower_with, parse_method, parse_program};

const COUNT: &str = r#"(
    name: "Count",
    container: "Numbers",
    is_static: true,
    params: [(name: "n", ty: Int)],
    ret: Iterable(Int),
    locals: [(name: "i", ty: Int)],
    body: [
        Let(local: 0, init: Some(Int(0))),
        While(
            cond: Binary(op: Lt, lhs: Local(0), rhs: Param(0)),
            body: [
                Assign(target: Local(0), value: Binary(op: Add, lhs: Local(0), rhs: Int(1))),
                Yield(Local(0)),
            ],
        ),
    ],
)"#;

const PAIR: &str = r#"(
    name: "Values",
    container: "Pair",
    is_static: true,
    ret: Iterator(Int),
    body: [Yield(Int(1)), Yield(Int(2))],
)"#;

fn type_name(name: &str) -> itergen::ir::TypeName {
    itergen::ir::TypeName::new(name)
}

#[test]
fn test_capabilities_follow_return_shape() {
    assert_eq!(
        select_capabilities(&Ty::Iterable(Box::new(Ty::Int))),
        Ok((CapabilitySet::IterableIterator, Ty::Int))
    );
    assert_eq!(
        select_capabilities(&Ty::Iterator(Box::new(Ty::Bool))),
        Ok((CapabilitySet::IteratorOnly, Ty::Bool))
    );
    assert_eq!(
        select_capabilities(&Ty::Int),
        Err(LoweringError::UnexpectedReturnShape(Ty::Int))
    );
}

#[test]
fn test_iterable_signature() {
    let method = parse_method(COUNT);
    let (ty, _) = lower_iterator_method(
        &method,
        type_name("Numbers.Count$iter0"),
        &LoweringOptions::default(),
    )
    .unwrap();

    assert_snapshot!(ty.signature().to_string(), @r###"
    type Numbers.Count$iter0: Object [iterable + iterator] of int {
        field $state: int
        field $current: int
        field $thread: int
        field n: int
        field $init.n: int
        field i$0: int
        ctor(int)
        method GetIterator() -> iterator<int>
        method GetIteratorUntyped() -> iterator<Object>
        method Resume() -> bool
        method Dispose() -> unit
        method CurrentValue() -> int
        method ResetUnsupported() -> unit
    }
    "###);
}

#[test]
fn test_iterator_signature() {
    let method = parse_method(PAIR);
    let (ty, _) = lower_iterator_method(
        &method,
        type_name("Pair.Values$iter0"),
        &LoweringOptions::default(),
    )
    .unwrap();

    assert_snapshot!(ty.signature().to_string(), @r###"
    type Pair.Values$iter0: Object [iterator] of int {
        field $state: int
        field $current: int
        ctor(int)
        method Resume() -> bool
        method Dispose() -> unit
        method CurrentValue() -> int
        method ResetUnsupported() -> unit
    }
    "###);
}

#[test]
fn test_no_thread_field_without_thread_identity() {
    let method = parse_method(COUNT);
    let options = LoweringOptions {
        thread_identity: false,
        ..Default::default()
    };
    let (ty, _) = lower_iterator_method(&method, type_name("T"), &options).unwrap();

    assert!(ty.field_by_role(FieldRole::ThreadAffinity).is_none());

    let get_iterator = ty.method(ProtocolMethod::GetIterator).unwrap();
    let entry = &get_iterator.body.blocks[get_iterator.body.entry];
    let Terminator::Branch { cond, .. } = &entry.terminator else {
        panic!("expected a branch, got {:?}", entry.terminator);
    };
    assert_eq!(cond.to_string(), "(this.$state == -2)");
}

#[test]
fn test_resume_body() {
    let method = parse_method(PAIR);
    let (ty, _) =
        lower_iterator_method(&method, type_name("T"), &LoweringOptions::default()).unwrap();
    let resume = &ty.method(ProtocolMethod::Resume).unwrap().body;

    assert_snapshot!(resume.to_string().trim_end(), @r###"
    bb0 (entry):
        switch this.$state [0 => bb1, 1 => bb2, 2 => bb3] else bb4
    bb1:
        this.$state = -1
        this.$current = 1
        this.$state = 1
        return true
    bb2:
        this.$state = -1
        this.$current = 2
        this.$state = 2
        return true
    bb3:
        this.$state = -1
        return false
    bb4:
        return false
    "###);
}

#[test]
fn test_dispose_body_without_regions() {
    let method = parse_method(PAIR);
    let (ty, _) =
        lower_iterator_method(&method, type_name("T"), &LoweringOptions::default()).unwrap();
    let dispose = &ty.method(ProtocolMethod::Dispose).unwrap().body;

    assert_snapshot!(dispose.to_string().trim_end(), @r###"
    bb0 (entry):
        switch this.$state [0 => bb2, 1 => bb2, 2 => bb2] else bb1
    bb1:
        return
    bb2:
        this.$state = -1
        return
    "###);
}

#[test]
fn test_kickoff_and_get_iterator_bodies() {
    let method = parse_method(COUNT);
    let (ty, kickoff) = lower_iterator_method(
        &method,
        type_name("Numbers.Count$iter0"),
        &LoweringOptions::default(),
    )
    .unwrap();

    assert_snapshot!(kickoff.to_string().trim_end(), @r###"
    param _0: int (n)
    local _1: iterable<int> (instance)
    bb0 (entry):
        _1 = new Numbers.Count$iter0(-2)
        _1.$init.n = _0
        return _1
    "###);

    let get_iterator = &ty.method(ProtocolMethod::GetIterator).unwrap().body;

    assert_snapshot!(get_iterator.to_string().trim_end(), @r###"
    local _0: iterator<int> (result)
    bb0 (entry):
        branch ((this.$state == -2) && (this.$thread == current_thread_id())) then bb1 else bb2
    bb1:
        this.$state = 0
        _0 = this
        jump bb3
    bb2:
        _0 = new Numbers.Count$iter0(0)
        jump bb3
    bb3:
        _0.n = this.$init.n
        return _0
    "###);
}

#[test]
fn test_ctor_records_thread() {
    let method = parse_method(COUNT);
    let (ty, _) =
        lower_iterator_method(&method, type_name("T"), &LoweringOptions::default()).unwrap();

    assert_snapshot!(ty.ctor.body.to_string().trim_end(), @r###"
    param _0: int (initial_state)
    bb0 (entry):
        this.$state = _0
        this.$thread = current_thread_id()
        return
    "###);
}

#[test]
fn test_states_are_numbered_in_lexical_order() {
    let method = parse_method(
        r#"(
            name: "Three",
            container: "C",
            is_static: true,
            ret: Iterator(Int),
            body: [
                If(cond: Bool(true), then: [Yield(Int(1))], otherwise: [Yield(Int(2))]),
                Yield(Int(3)),
            ],
        )"#,
    );
    let (ty, _) =
        lower_iterator_method(&method, type_name("T"), &LoweringOptions::default()).unwrap();

    assert_eq!(
        ty.states.states().collect::<Vec<_>>(),
        vec![
            StateId::Suspended(1),
            StateId::Suspended(2),
            StateId::Suspended(3)
        ]
    );

    let resume = &ty.method(ProtocolMethod::Resume).unwrap().body;
    check_dispatch(resume, &ty.states, 3).unwrap();
}

#[test]
fn test_region_chains() {
    let method = parse_method(
        r#"(
            name: "Regions",
            container: "C",
            is_static: true,
            ret: Iterator(Int),
            body: [
                Yield(Int(0)),
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
                Try(body: [Expr(Call(func: "quiet"))], finally: [Expr(Call(func: "unused"))]),
            ],
        )"#,
    );
    let (ty, _) =
        lower_iterator_method(&method, type_name("T"), &LoweringOptions::default()).unwrap();

    assert_eq!(
        ty.states,
        StateTable {
            points: vec![
                SuspensionPoint {
                    state: StateId::Suspended(1),
                    regions: vec![],
                },
                SuspensionPoint {
                    state: StateId::Suspended(2),
                    regions: vec![0],
                },
                SuspensionPoint {
                    state: StateId::Suspended(3),
                    regions: vec![1, 0],
                },
            ],
            regions: 2,
        }
    );
}

#[test]
fn test_promotes_only_locals_live_across_suspension() {
    let method = parse_method(
        r#"(
            name: "Temps",
            container: "C",
            is_static: true,
            ret: Iterator(Int),
            locals: [(name: "kept", ty: Int), (name: "temp", ty: Int)],
            body: [
                Let(local: 0, init: Some(Int(10))),
                Let(local: 1, init: Some(Binary(op: Mul, lhs: Local(0), rhs: Int(2)))),
                Yield(Local(1)),
                Yield(Local(0)),
            ],
        )"#,
    );

    let (ty, _) =
        lower_iterator_method(&method, type_name("T"), &LoweringOptions::default()).unwrap();
    assert!(ty
        .field_by_role(FieldRole::Hoisted(LocalSymbol(0)))
        .is_some());
    assert!(ty
        .field_by_role(FieldRole::Hoisted(LocalSymbol(1)))
        .is_none());

    let resume = &ty.method(ProtocolMethod::Resume).unwrap().body;
    assert_eq!(resume.locals.len(), 1);
    assert_eq!(resume.locals[0].name, "temp");

    let options = LoweringOptions {
        promotion: PromotionPolicy::AllLocals,
        ..Default::default()
    };
    let (ty, _) = lower_iterator_method(&method, type_name("T"), &options).unwrap();
    assert!(ty
        .field_by_role(FieldRole::Hoisted(LocalSymbol(1)))
        .is_some());
    assert!(ty
        .method(ProtocolMethod::Resume)
        .unwrap()
        .body
        .locals
        .is_empty());
}

#[test]
fn test_promotes_locals_read_by_finally() {
    let method = parse_method(
        r#"(
            name: "Cleanup",
            container: "C",
            is_static: true,
            ret: Iterator(Int),
            locals: [(name: "handle", ty: Int)],
            body: [
                Let(local: 0, init: Some(Int(5))),
                Try(
                    body: [Yield(Int(1))],
                    finally: [Expr(Call(func: "close", args: [Local(0)]))],
                ),
            ],
        )"#,
    );
    let (ty, _) =
        lower_iterator_method(&method, type_name("T"), &LoweringOptions::default()).unwrap();

    assert!(ty
        .field_by_role(FieldRole::Hoisted(LocalSymbol(0)))
        .is_some());
}

#[test]
fn test_internal_faults_produce_stubs() {
    let program = parse_program(
        r#"(methods: [
            (
                name: "Bad",
                container: "C",
                is_static: true,
                ret: Iterator(Int),
                body: [Try(body: [], finally: [Yield(Int(1))])],
            ),
            (
                name: "NotAnIterator",
                container: "C",
                is_static: true,
                params: [(name: "x", ty: Int)],
                ret: Int,
                body: [],
            ),
            (
                name: "Good",
                container: "C",
                is_static: true,
                ret: Iterator(Int),
                body: [Yield(Int(1))],
            ),
        ])"#,
    );
    let (output, diagnostics) = lower_with(&program.methods, &LoweringOptions::default());

    assert_eq!(
        diagnostics
            .iter()
            .map(|diagnostic| (
                diagnostic.level,
                diagnostic.message.method.clone(),
                diagnostic.message.message.clone()
            ))
            .collect::<Vec<_>>(),
        vec![
            (
                Level::Internal,
                Some("C.Bad".to_owned()),
                LoweringError::SuspensionInFinally.to_string()
            ),
            (
                Level::Internal,
                Some("C.NotAnIterator".to_owned()),
                LoweringError::UnexpectedReturnShape(Ty::Int).to_string()
            ),
        ]
    );

    let bad = output.method("C.NotAnIterator").unwrap();
    assert!(bad.state_machine.is_none());
    assert_eq!(bad.body.param_count, 1);
    assert!(matches!(
        bad.body.blocks[bad.body.entry].terminator,
        Terminator::Fail(_)
    ));

    assert!(output.state_machine_of("C.Good").is_some());
    assert_eq!(output.types.len(), 1);
}

#[test]
fn test_validation_faults() {
    let cases = [
        (
            r#"[While(cond: Bool(true), body: [Try(body: [], finally: [Break])])]"#,
            LoweringError::JumpOutOfFinally,
        ),
        (
            r#"[Try(body: [], finally: [YieldBreak])]"#,
            LoweringError::JumpOutOfFinally,
        ),
        (r#"[Continue]"#, LoweringError::JumpOutsideLoop),
        (r#"[Yield(Local(3))]"#, LoweringError::UnknownLocal(LocalSymbol(3))),
        (r#"[Yield(Field(obj: This, name: "x"))]"#, LoweringError::ReceiverInStaticMethod),
    ];

    for (body, expected) in cases {
        let method = parse_method(&format!(
            r#"(name: "M", container: "C", is_static: true, ret: Iterator(Int), body: {})"#,
            body
        ));
        let result = lower_iterator_method(&method, type_name("T"), &LoweringOptions::default());

        assert_eq!(result.err(), Some(expected), "body: {}", body);
    }
}

#[test]
fn test_field_name_collisions_are_faults() {
    let method = parse_method(
        r#"(
            name: "Shadow",
            container: "C",
            is_static: true,
            params: [(name: "$state", ty: Int)],
            ret: Iterator(Int),
            body: [Yield(Param(0))],
        )"#,
    );
    let result = lower_iterator_method(&method, type_name("T"), &LoweringOptions::default());
    assert_eq!(
        result.err(),
        Some(LoweringError::FieldCollision("$state".into()))
    );

    let method = parse_method(
        r#"(
            name: "Hoisted",
            container: "C",
            is_static: true,
            params: [(name: "i$0", ty: Int)],
            ret: Iterator(Int),
            locals: [(name: "i", ty: Int)],
            body: [
                Let(local: 0, init: Some(Param(0))),
                Yield(Int(1)),
                Yield(Local(0)),
            ],
        )"#,
    );
    let result = lower_iterator_method(&method, type_name("T"), &LoweringOptions::default());
    assert_eq!(result.err(), Some(LoweringError::FieldCollision("i$0".into())));
}

#[test]
fn test_dispatch_check_catches_collisions() {
    let method = parse_method(PAIR);
    let (ty, _) =
        lower_iterator_method(&method, type_name("T"), &LoweringOptions::default()).unwrap();
    let resume = &ty.method(ProtocolMethod::Resume).unwrap().body;

    let mut table = ty.states.clone();
    table.points[1].state = StateId::Suspended(1);
    assert_eq!(
        check_dispatch(resume, &table, 2),
        Err(LoweringError::NumberingCollision(StateId::Suspended(1)))
    );

    let mut table = ty.states.clone();
    table.points.push(SuspensionPoint {
        state: StateId::Suspended(3),
        regions: vec![],
    });
    assert_eq!(
        check_dispatch(resume, &table, 3),
        Err(LoweringError::DispatchMissing(StateId::Suspended(3)))
    );

    assert_eq!(
        check_dispatch(resume, &ty.states, 3),
        Err(LoweringError::StateCountMismatch {
            expected: 3,
            allocated: 2
        })
    );
}

#[test]
fn test_type_names_are_deterministic() {
    let method = parse_method(PAIR);
    let mut names = NameAllocator::new();

    assert_eq!(names.allocate(&method).as_str(), "Pair.Values$iter0");
    assert_eq!(names.allocate(&method).as_str(), "Pair.Values$iter1");

    let output = lower_ok(&[method]);
    assert_eq!(
        output.method("Pair.Values").unwrap().state_machine,
        Some(type_name("Pair.Values$iter0"))
    );
}
