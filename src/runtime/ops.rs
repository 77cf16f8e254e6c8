use crate::language::ast::{ArithmeticOp, ComparisonOp};
use crate::runtime::{
    context::Context,
    error::{ExecResult, RuntimeError, Unwind},
    interpreter,
    value::{Holder, Value, ADD_METHOD, EQ_METHOD, LT_METHOD},
};

pub fn equal(lhs: &Holder, rhs: &Holder, ctx: &mut Context) -> ExecResult<bool> {
    let Some(left) = lhs.value() else {
        return if rhs.is_none() {
            Ok(true)
        } else {
            Err(RuntimeError::Uncomparable {
                operation: "equality",
            }
            .into())
        };
    };
    let right = rhs.value();
    match (left.as_ref(), right.as_deref()) {
        (Value::Number(a), Some(Value::Number(b))) => Ok(a == b),
        (Value::String(a), Some(Value::String(b))) => Ok(a == b),
        (Value::Bool(a), Some(Value::Bool(b))) => Ok(a == b),
        (Value::Instance(instance), _) if instance.class().has_method(EQ_METHOD, 1) => {
            let verdict = interpreter::call_method(&left, EQ_METHOD, vec![rhs.clone()], ctx)?;
            bool_verdict(verdict, EQ_METHOD)
        }
        _ => Err(RuntimeError::Uncomparable {
            operation: "equality",
        }
        .into()),
    }
}

// Note the asymmetry: only the left operand is pre-checked for emptiness.
pub fn less(lhs: &Holder, rhs: &Holder, ctx: &mut Context) -> ExecResult<bool> {
    let Some(left) = lhs.value() else {
        return Err(RuntimeError::Uncomparable {
            operation: "ordering",
        }
        .into());
    };
    let right = rhs.value();
    match (left.as_ref(), right.as_deref()) {
        (Value::Number(a), Some(Value::Number(b))) => Ok(a < b),
        (Value::String(a), Some(Value::String(b))) => Ok(a < b),
        (Value::Bool(a), Some(Value::Bool(b))) => Ok(a < b),
        (Value::Instance(instance), _) if instance.class().has_method(LT_METHOD, 1) => {
            let verdict = interpreter::call_method(&left, LT_METHOD, vec![rhs.clone()], ctx)?;
            bool_verdict(verdict, LT_METHOD)
        }
        _ => Err(RuntimeError::Uncomparable {
            operation: "ordering",
        }
        .into()),
    }
}

pub fn compare(op: ComparisonOp, lhs: &Holder, rhs: &Holder, ctx: &mut Context) -> ExecResult<bool> {
    match op {
        ComparisonOp::Eq => equal(lhs, rhs, ctx),
        ComparisonOp::NotEq => Ok(!equal(lhs, rhs, ctx)?),
        ComparisonOp::Less => less(lhs, rhs, ctx),
        ComparisonOp::Greater => Ok(!less(lhs, rhs, ctx)? && !equal(lhs, rhs, ctx)?),
        ComparisonOp::LessEq => Ok(less(lhs, rhs, ctx)? || equal(lhs, rhs, ctx)?),
        ComparisonOp::GreaterEq => Ok(!less(lhs, rhs, ctx)?),
    }
}

pub fn arithmetic(op: ArithmeticOp, lhs: &Holder, rhs: &Holder, ctx: &mut Context) -> ExecResult {
    let operator = op.symbol();
    let (Some(left), Some(right)) = (lhs.value(), rhs.value()) else {
        return Err(RuntimeError::NullOperand { operator }.into());
    };
    if let (Some(a), Some(b)) = (left.as_number(), right.as_number()) {
        let result = match op {
            ArithmeticOp::Add => a.wrapping_add(b),
            ArithmeticOp::Sub => a.wrapping_sub(b),
            ArithmeticOp::Mul => a.wrapping_mul(b),
            ArithmeticOp::Div => {
                if b == 0 {
                    return Err(RuntimeError::DivByZero.into());
                }
                a.wrapping_div(b)
            }
        };
        return Ok(Holder::own(Value::Number(result)));
    }
    if op == ArithmeticOp::Add {
        if let (Some(a), Some(b)) = (left.as_str(), right.as_str()) {
            return Ok(Holder::own(Value::String(format!("{a}{b}"))));
        }
        if let Some(instance) = left.as_instance() {
            if instance.class().has_method(ADD_METHOD, 1) {
                return interpreter::call_method(&left, ADD_METHOD, vec![rhs.clone()], ctx);
            }
        }
    }
    Err(RuntimeError::BadOperands { operator }.into())
}

fn bool_verdict(holder: Holder, method: &str) -> ExecResult<bool> {
    holder
        .value()
        .and_then(|value| value.as_bool())
        .ok_or_else(|| {
            Unwind::from(RuntimeError::TypeMismatch {
                message: format!("`{method}` must return True or False"),
            })
        })
}
