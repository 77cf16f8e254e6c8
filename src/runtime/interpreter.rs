use crate::language::ast::{LogicalOp, Statement};
use crate::runtime::{
    context::Context,
    environment::Closure,
    error::{ExecResult, RuntimeError, RuntimeResult, Unwind},
    ops,
    value::{Holder, Instance, Value, INIT_METHOD, SELF},
};
use std::io::Write;
use std::rc::Rc;

impl Statement {
    /// Evaluate this node against `closure`, writing any output through
    /// `ctx`. Returns the node's holder, or unwinds with a runtime error or
    /// an in-flight `return`.
    pub fn execute(&self, closure: &mut Closure, ctx: &mut Context) -> ExecResult {
        match self {
            Statement::NumericConst(value) => Ok(Holder::own(Value::Number(*value))),
            Statement::StringConst(value) => Ok(Holder::own(Value::String(value.clone()))),
            Statement::BoolConst(value) => Ok(Holder::own(Value::Bool(*value))),
            Statement::NoneConst => Ok(Holder::none()),
            Statement::Variable(path) => resolve_path(path, closure),
            Statement::Assignment { name, value } => {
                let holder = value.execute(closure, ctx)?;
                closure.set(name.clone(), holder.clone());
                Ok(holder)
            }
            Statement::FieldAssignment {
                object,
                field,
                value,
            } => {
                let target = resolve_path(object, closure)?;
                let Some(target) = target.value() else {
                    return Err(RuntimeError::NotAnInstance {
                        target: "The field assignment target".into(),
                    }
                    .into());
                };
                let Value::Instance(instance) = target.as_ref() else {
                    return Err(RuntimeError::NotAnInstance {
                        target: "The field assignment target".into(),
                    }
                    .into());
                };
                let holder = value.execute(closure, ctx)?;
                instance.fields_mut().set(field.clone(), holder.clone());
                Ok(holder)
            }
            Statement::NewInstance { class, args } => {
                let instance = Holder::own(Value::Instance(Instance::new(Rc::clone(class))));
                let actual = eval_arguments(args, closure, ctx)?;
                if class.has_method(INIT_METHOD, actual.len()) {
                    if let Some(receiver) = instance.value() {
                        call_method(&receiver, INIT_METHOD, actual, ctx)?;
                    }
                }
                Ok(instance)
            }
            Statement::MethodCall {
                object,
                method,
                args,
            } => {
                let receiver = object.execute(closure, ctx)?;
                let Some(target) = receiver.value() else {
                    return Err(RuntimeError::NotAnInstance {
                        target: "The method receiver".into(),
                    }
                    .into());
                };
                if target.as_instance().is_none() {
                    return Err(RuntimeError::NotAnInstance {
                        target: "The method receiver".into(),
                    }
                    .into());
                }
                let actual = eval_arguments(args, closure, ctx)?;
                call_method(&target, method, actual, ctx)
            }
            Statement::Compound(statements) => {
                for statement in statements {
                    statement.execute(closure, ctx)?;
                }
                Ok(Holder::none())
            }
            Statement::Return(value) => {
                let holder = value.execute(closure, ctx)?;
                Err(Unwind::Return(holder))
            }
            Statement::MethodBody(body) => match body.execute(closure, ctx) {
                Ok(_) => Ok(Holder::none()),
                Err(Unwind::Return(holder)) => Ok(holder),
                Err(unwind) => Err(unwind),
            },
            Statement::ClassDefinition(class) => {
                closure.set(
                    class.name().to_string(),
                    Holder::own(Value::Class(Rc::clone(class))),
                );
                Ok(Holder::none())
            }
            Statement::Print(args) => {
                let mut last = Holder::none();
                for (index, arg) in args.iter().enumerate() {
                    if index > 0 {
                        write!(ctx.output(), " ")?;
                    }
                    last = arg.execute(closure, ctx)?;
                    last.print(ctx)?;
                }
                writeln!(ctx.output())?;
                Ok(last)
            }
            Statement::Stringify(inner) => {
                let holder = inner.execute(closure, ctx)?;
                let mut buffer = Vec::new();
                {
                    let mut sink = Context::new(&mut buffer);
                    holder.print(&mut sink)?;
                }
                Ok(Holder::own(Value::String(
                    String::from_utf8_lossy(&buffer).into_owned(),
                )))
            }
            Statement::Arithmetic { op, lhs, rhs } => {
                let left = lhs.execute(closure, ctx)?;
                let right = rhs.execute(closure, ctx)?;
                ops::arithmetic(*op, &left, &right, ctx)
            }
            Statement::Logical { op, lhs, rhs } => {
                // both sides are evaluated; `and`/`or` do not short-circuit
                let left = lhs.execute(closure, ctx)?;
                let right = rhs.execute(closure, ctx)?;
                let result = match op {
                    LogicalOp::And => left.is_truthy() && right.is_truthy(),
                    LogicalOp::Or => left.is_truthy() || right.is_truthy(),
                };
                Ok(Holder::own(Value::Bool(result)))
            }
            Statement::Not(inner) => {
                let holder = inner.execute(closure, ctx)?;
                Ok(Holder::own(Value::Bool(!holder.is_truthy())))
            }
            Statement::Comparison { op, lhs, rhs } => {
                let left = lhs.execute(closure, ctx)?;
                let right = rhs.execute(closure, ctx)?;
                let result = ops::compare(*op, &left, &right, ctx)?;
                Ok(Holder::own(Value::Bool(result)))
            }
            Statement::IfElse {
                condition,
                then_body,
                else_body,
            } => {
                let verdict = condition.execute(closure, ctx)?;
                if verdict.is_truthy() {
                    then_body.execute(closure, ctx)
                } else if let Some(else_body) = else_body {
                    else_body.execute(closure, ctx)
                } else {
                    Ok(Holder::none())
                }
            }
        }
    }
}

fn resolve_path(path: &[String], closure: &Closure) -> ExecResult {
    let mut segments = path.iter();
    let Some(first) = segments.next() else {
        return Err(RuntimeError::NameUnbound {
            name: String::new(),
        }
        .into());
    };
    let mut holder = closure
        .get(first)
        .cloned()
        .ok_or_else(|| RuntimeError::NameUnbound {
            name: first.clone(),
        })?;
    let mut resolved = first.as_str();
    for segment in segments {
        let value = holder.value().ok_or_else(|| RuntimeError::NotAnInstance {
            target: format!("`{resolved}`"),
        })?;
        let Value::Instance(instance) = value.as_ref() else {
            return Err(RuntimeError::NotAnInstance {
                target: format!("`{resolved}`"),
            }
            .into());
        };
        let next = instance.fields().get(segment).cloned();
        holder = next.ok_or_else(|| RuntimeError::NameUnbound {
            name: segment.clone(),
        })?;
        resolved = segment.as_str();
    }
    Ok(holder)
}

fn eval_arguments(
    args: &[Statement],
    closure: &mut Closure,
    ctx: &mut Context,
) -> ExecResult<Vec<Holder>> {
    args.iter().map(|arg| arg.execute(closure, ctx)).collect()
}

/// The method-call protocol: resolve the method with a matching arity, build
/// a fresh frame holding `self` (as a sharing holder) and the formal
/// parameters, then evaluate the body. The body is always a `MethodBody`
/// wrapper, so a `return` anywhere inside becomes the call's result.
pub fn call_method(
    receiver: &Rc<Value>,
    method: &str,
    args: Vec<Holder>,
    ctx: &mut Context,
) -> ExecResult {
    let Value::Instance(instance) = receiver.as_ref() else {
        return Err(RuntimeError::NotAnInstance {
            target: "The method receiver".into(),
        }
        .into());
    };
    let class = instance.class();
    let record = class
        .get_method(method)
        .filter(|record| record.formal_params.len() == args.len())
        .cloned()
        .ok_or_else(|| RuntimeError::NoSuchMethod {
            class: class.name().to_string(),
            method: method.to_string(),
            arity: args.len(),
        })?;
    let mut frame = Closure::new();
    frame.set(SELF, Holder::share(receiver));
    for (param, arg) in record.formal_params.iter().zip(args) {
        frame.set(param.clone(), arg);
    }
    record.body.execute(&mut frame, ctx)
}

/// Owns the program tree and runs it against a fresh top-level environment.
pub struct Interpreter {
    program: Statement,
}

impl Interpreter {
    pub fn new(program: Statement) -> Self {
        Self { program }
    }

    pub fn run(&self, output: &mut dyn Write) -> RuntimeResult<()> {
        let mut globals = Closure::new();
        let mut ctx = Context::new(output);
        match self.program.execute(&mut globals, &mut ctx) {
            Ok(_) => Ok(()),
            Err(Unwind::Return(_)) => Err(RuntimeError::ReturnAtTopLevel),
            Err(Unwind::Error(error)) => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::ast::{ArithmeticOp, ComparisonOp};
    use crate::runtime::value::{Class, Method};

    fn eval(statement: &Statement, closure: &mut Closure) -> ExecResult {
        let mut buffer = Vec::new();
        let mut ctx = Context::new(&mut buffer);
        statement.execute(closure, &mut ctx)
    }

    fn eval_printed(statement: &Statement, closure: &mut Closure) -> String {
        let mut buffer = Vec::new();
        {
            let mut ctx = Context::new(&mut buffer);
            statement
                .execute(closure, &mut ctx)
                .expect("execution should succeed");
        }
        String::from_utf8(buffer).expect("printed output is utf8")
    }

    fn as_number(result: ExecResult) -> i64 {
        result
            .expect("execution should succeed")
            .value()
            .and_then(|value| value.as_number())
            .expect("a number result")
    }

    fn adder_class() -> Rc<Class> {
        // class Adder:
        //   def bump(self, x):
        //     return x + 1
        Class::new(
            "Adder",
            vec![Method {
                name: "bump".into(),
                formal_params: vec!["x".into()],
                body: Statement::method_body(Statement::returning(Statement::arithmetic(
                    ArithmeticOp::Add,
                    Statement::variable("x"),
                    Statement::NumericConst(1),
                ))),
            }],
            None,
        )
    }

    #[test]
    fn constants_evaluate_to_their_payload() {
        let mut closure = Closure::new();
        assert_eq!(as_number(eval(&Statement::NumericConst(57), &mut closure)), 57);
        assert!(eval(&Statement::NoneConst, &mut closure)
            .expect("none")
            .is_none());
    }

    #[test]
    fn assignment_binds_and_returns_the_holder() {
        let mut closure = Closure::new();
        let statement = Statement::assignment("x", Statement::NumericConst(5));
        let returned = eval(&statement, &mut closure).expect("assignment");
        let stored = closure.get("x").expect("binding for x");
        assert!(returned.ptr_eq(stored));
        assert_eq!(as_number(eval(&Statement::variable("x"), &mut closure)), 5);
    }

    #[test]
    fn unknown_names_are_reported() {
        let mut closure = Closure::new();
        let err = eval(&Statement::variable("ghost"), &mut closure).expect_err("should fail");
        assert!(matches!(
            err,
            Unwind::Error(RuntimeError::NameUnbound { name }) if name == "ghost"
        ));
    }

    #[test]
    fn dotted_paths_descend_through_instance_fields() {
        let mut closure = Closure::new();
        let class = Class::new("Box", Vec::new(), None);
        let outer = Holder::own(Value::Instance(Instance::new(Rc::clone(&class))));
        let inner = Holder::own(Value::Instance(Instance::new(class)));
        if let Some(target) = inner.value() {
            if let Value::Instance(instance) = target.as_ref() {
                instance.fields_mut().set("leaf", Holder::own(Value::Number(9)));
            }
        }
        if let Some(target) = outer.value() {
            if let Value::Instance(instance) = target.as_ref() {
                instance.fields_mut().set("inner", inner);
            }
        }
        closure.set("outer", outer);
        let path = Statement::Variable(vec!["outer".into(), "inner".into(), "leaf".into()]);
        assert_eq!(as_number(eval(&path, &mut closure)), 9);
    }

    #[test]
    fn non_instance_in_the_middle_of_a_path_is_an_error() {
        let mut closure = Closure::new();
        closure.set("x", Holder::own(Value::Number(1)));
        let path = Statement::Variable(vec!["x".into(), "field".into()]);
        let err = eval(&path, &mut closure).expect_err("should fail");
        assert!(matches!(
            err,
            Unwind::Error(RuntimeError::NotAnInstance { .. })
        ));
    }

    #[test]
    fn method_calls_bind_self_and_formals() {
        let mut closure = Closure::new();
        closure.set(
            "a",
            Holder::own(Value::Instance(Instance::new(adder_class()))),
        );
        let call = Statement::method_call(
            Statement::variable("a"),
            "bump",
            vec![Statement::NumericConst(4)],
        );
        assert_eq!(as_number(eval(&call, &mut closure)), 5);
    }

    #[test]
    fn arity_mismatch_is_no_such_method() {
        let mut closure = Closure::new();
        closure.set(
            "a",
            Holder::own(Value::Instance(Instance::new(adder_class()))),
        );
        let call = Statement::method_call(Statement::variable("a"), "bump", Vec::new());
        let err = eval(&call, &mut closure).expect_err("should fail");
        assert!(matches!(
            err,
            Unwind::Error(RuntimeError::NoSuchMethod { arity: 0, .. })
        ));
    }

    #[test]
    fn calling_through_a_non_instance_fails() {
        let mut closure = Closure::new();
        closure.set("n", Holder::own(Value::Number(3)));
        let call = Statement::method_call(Statement::variable("n"), "bump", Vec::new());
        let err = eval(&call, &mut closure).expect_err("should fail");
        assert!(matches!(
            err,
            Unwind::Error(RuntimeError::NotAnInstance { .. })
        ));
    }

    #[test]
    fn methods_cannot_see_the_callers_environment() {
        let mut closure = Closure::new();
        let class = Class::new(
            "Peeker",
            vec![Method {
                name: "peek".into(),
                formal_params: Vec::new(),
                body: Statement::method_body(Statement::returning(Statement::variable(
                    "caller_local",
                ))),
            }],
            None,
        );
        closure.set("caller_local", Holder::own(Value::Number(1)));
        closure.set("p", Holder::own(Value::Instance(Instance::new(class))));
        let call = Statement::method_call(Statement::variable("p"), "peek", Vec::new());
        let err = eval(&call, &mut closure).expect_err("should fail");
        assert!(matches!(
            err,
            Unwind::Error(RuntimeError::NameUnbound { name }) if name == "caller_local"
        ));
    }

    #[test]
    fn overriding_resolves_to_the_child_and_self_stays_dynamic() {
        // class Base:           class Child(Base):
        //   def tag(self):        def tag(self):
        //     return 1              return 2
        //   def describe(self):
        //     return self.tag()
        let base = Class::new(
            "Base",
            vec![
                Method {
                    name: "tag".into(),
                    formal_params: Vec::new(),
                    body: Statement::method_body(Statement::returning(Statement::NumericConst(1))),
                },
                Method {
                    name: "describe".into(),
                    formal_params: Vec::new(),
                    body: Statement::method_body(Statement::returning(Statement::method_call(
                        Statement::variable(SELF),
                        "tag",
                        Vec::new(),
                    ))),
                },
            ],
            None,
        );
        let child = Class::new(
            "Child",
            vec![Method {
                name: "tag".into(),
                formal_params: Vec::new(),
                body: Statement::method_body(Statement::returning(Statement::NumericConst(2))),
            }],
            Some(base),
        );
        let mut closure = Closure::new();
        closure.set("c", Holder::own(Value::Instance(Instance::new(child))));
        // describe comes from Base, but self.tag() dispatches to Child
        let call = Statement::method_call(Statement::variable("c"), "describe", Vec::new());
        assert_eq!(as_number(eval(&call, &mut closure)), 2);
    }

    #[test]
    fn return_unwinds_through_nested_blocks() {
        let body = Statement::method_body(Statement::Compound(vec![
            Statement::if_else(
                Statement::BoolConst(true),
                Statement::Compound(vec![Statement::returning(Statement::NumericConst(7))]),
                None,
            ),
            // unreachable once the return has unwound
            Statement::returning(Statement::NumericConst(0)),
        ]));
        let class = Class::new(
            "Flow",
            vec![Method {
                name: "run".into(),
                formal_params: Vec::new(),
                body,
            }],
            None,
        );
        let mut closure = Closure::new();
        closure.set("f", Holder::own(Value::Instance(Instance::new(class))));
        let call = Statement::method_call(Statement::variable("f"), "run", Vec::new());
        assert_eq!(as_number(eval(&call, &mut closure)), 7);
    }

    #[test]
    fn falling_off_a_method_body_yields_none() {
        let class = Class::new(
            "Quiet",
            vec![Method {
                name: "noop".into(),
                formal_params: Vec::new(),
                body: Statement::method_body(Statement::Compound(Vec::new())),
            }],
            None,
        );
        let mut closure = Closure::new();
        closure.set("q", Holder::own(Value::Instance(Instance::new(class))));
        let call = Statement::method_call(Statement::variable("q"), "noop", Vec::new());
        assert!(eval(&call, &mut closure).expect("call").is_none());
    }

    #[test]
    fn new_instance_runs_init_with_matching_arity() {
        // class Point:
        //   def __init__(self, x):
        //     self.x = x
        let class = Class::new(
            "Point",
            vec![Method {
                name: INIT_METHOD.into(),
                formal_params: vec!["x".into()],
                body: Statement::method_body(Statement::field_assignment(
                    vec![SELF.into()],
                    "x",
                    Statement::variable("x"),
                )),
            }],
            None,
        );
        let mut closure = Closure::new();
        let construct = Statement::assignment(
            "p",
            Statement::new_instance(class, vec![Statement::NumericConst(11)]),
        );
        eval(&construct, &mut closure).expect("construction");
        let field = Statement::Variable(vec!["p".into(), "x".into()]);
        assert_eq!(as_number(eval(&field, &mut closure)), 11);
    }

    #[test]
    fn instance_identity_is_preserved_across_assignments() {
        let mut closure = Closure::new();
        let class = Class::new("Box", Vec::new(), None);
        eval(
            &Statement::assignment("a", Statement::new_instance(class, Vec::new())),
            &mut closure,
        )
        .expect("construction");
        eval(
            &Statement::assignment("b", Statement::variable("a")),
            &mut closure,
        )
        .expect("aliasing");
        eval(
            &Statement::field_assignment(vec!["b".into()], "v", Statement::NumericConst(3)),
            &mut closure,
        )
        .expect("field assignment");
        let through_a = Statement::Variable(vec!["a".into(), "v".into()]);
        assert_eq!(as_number(eval(&through_a, &mut closure)), 3);
    }

    #[test]
    fn print_separates_with_spaces_and_ends_with_newline() {
        let mut closure = Closure::new();
        let statement = Statement::Print(vec![
            Statement::NumericConst(1),
            Statement::StringConst("two".into()),
            Statement::BoolConst(false),
            Statement::NoneConst,
        ]);
        assert_eq!(eval_printed(&statement, &mut closure), "1 two False None\n");
    }

    #[test]
    fn empty_print_emits_a_bare_newline() {
        let mut closure = Closure::new();
        assert_eq!(eval_printed(&Statement::Print(Vec::new()), &mut closure), "\n");
    }

    #[test]
    fn stringify_matches_print_output() {
        let mut closure = Closure::new();
        for statement in [
            Statement::NumericConst(42),
            Statement::StringConst("abc".into()),
            Statement::BoolConst(true),
            Statement::NoneConst,
        ] {
            let printed = eval_printed(&Statement::Print(vec![statement.clone()]), &mut closure);
            let stringified = eval(&Statement::stringify(statement), &mut closure)
                .expect("stringify")
                .value()
                .and_then(|value| value.as_str().map(str::to_owned))
                .expect("a string result");
            assert_eq!(format!("{stringified}\n"), printed);
        }
    }

    #[test]
    fn if_else_picks_the_branch_by_truthiness() {
        let mut closure = Closure::new();
        let pick = |condition: Statement| {
            Statement::if_else(
                condition,
                Statement::assignment("r", Statement::NumericConst(1)),
                Some(Statement::assignment("r", Statement::NumericConst(2))),
            )
        };
        eval(&pick(Statement::StringConst("x".into())), &mut closure).expect("if");
        assert_eq!(as_number(eval(&Statement::variable("r"), &mut closure)), 1);
        eval(&pick(Statement::NumericConst(0)), &mut closure).expect("if");
        assert_eq!(as_number(eval(&Statement::variable("r"), &mut closure)), 2);
    }

    #[test]
    fn logical_operators_yield_booleans() {
        let mut closure = Closure::new();
        let and = Statement::logical(
            LogicalOp::And,
            Statement::NumericConst(1),
            Statement::StringConst(String::new()),
        );
        let or = Statement::logical(
            LogicalOp::Or,
            Statement::NumericConst(0),
            Statement::StringConst("x".into()),
        );
        let not = Statement::logical_not(Statement::NoneConst);
        for (statement, expected) in [(and, false), (or, true), (not, true)] {
            let result = eval(&statement, &mut closure)
                .expect("logic")
                .value()
                .and_then(|value| value.as_bool());
            assert_eq!(result, Some(expected));
        }
    }

    #[test]
    fn comparisons_wrap_their_verdict_in_bool() {
        let mut closure = Closure::new();
        let statement = Statement::comparison(
            ComparisonOp::LessEq,
            Statement::NumericConst(3),
            Statement::NumericConst(3),
        );
        let result = eval(&statement, &mut closure)
            .expect("comparison")
            .value()
            .and_then(|value| value.as_bool());
        assert_eq!(result, Some(true));
    }

    #[test]
    fn class_definition_binds_the_descriptor() {
        let mut closure = Closure::new();
        let class = Class::new("Widget", Vec::new(), None);
        eval(&Statement::ClassDefinition(class), &mut closure).expect("definition");
        let bound = closure
            .get("Widget")
            .and_then(|holder| holder.value())
            .and_then(|value| value.as_class().map(|class| class.name().to_string()));
        assert_eq!(bound.as_deref(), Some("Widget"));
    }

    #[test]
    fn top_level_return_reaches_the_driver() {
        let program = Statement::Compound(vec![Statement::returning(Statement::NumericConst(1))]);
        let mut output = Vec::new();
        let err = Interpreter::new(program)
            .run(&mut output)
            .expect_err("should fail");
        assert!(matches!(err, RuntimeError::ReturnAtTopLevel));
    }

    #[test]
    fn the_driver_runs_a_program_against_fresh_globals() {
        let program = Statement::Compound(vec![
            Statement::assignment("x", Statement::NumericConst(2)),
            Statement::Print(vec![Statement::arithmetic(
                ArithmeticOp::Mul,
                Statement::variable("x"),
                Statement::NumericConst(21),
            )]),
        ]);
        let mut output = Vec::new();
        Interpreter::new(program).run(&mut output).expect("run");
        assert_eq!(String::from_utf8(output).expect("utf8"), "42\n");
    }
}
