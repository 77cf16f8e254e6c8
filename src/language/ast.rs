use crate::runtime::value::Class;
use std::rc::Rc;

/// The closed union of Mython tree nodes. Every variant is evaluated against
/// a closure and an output context by `runtime::interpreter`.
#[derive(Clone, Debug)]
pub enum Statement {
    NumericConst(i64),
    StringConst(String),
    BoolConst(bool),
    NoneConst,
    /// Dotted lookup rooted in the current environment: `a` or `a.b.c`.
    Variable(Vec<String>),
    Assignment {
        name: String,
        value: Box<Statement>,
    },
    FieldAssignment {
        object: Vec<String>,
        field: String,
        value: Box<Statement>,
    },
    NewInstance {
        class: Rc<Class>,
        args: Vec<Statement>,
    },
    MethodCall {
        object: Box<Statement>,
        method: String,
        args: Vec<Statement>,
    },
    Compound(Vec<Statement>),
    Return(Box<Statement>),
    /// Boundary that turns a return-unwind into the call's result.
    MethodBody(Box<Statement>),
    ClassDefinition(Rc<Class>),
    Print(Vec<Statement>),
    Stringify(Box<Statement>),
    Arithmetic {
        op: ArithmeticOp,
        lhs: Box<Statement>,
        rhs: Box<Statement>,
    },
    Logical {
        op: LogicalOp,
        lhs: Box<Statement>,
        rhs: Box<Statement>,
    },
    Not(Box<Statement>),
    Comparison {
        op: ComparisonOp,
        lhs: Box<Statement>,
        rhs: Box<Statement>,
    },
    IfElse {
        condition: Box<Statement>,
        then_body: Box<Statement>,
        else_body: Option<Box<Statement>>,
    },
}

impl Statement {
    pub fn variable(name: impl Into<String>) -> Self {
        Statement::Variable(vec![name.into()])
    }

    pub fn assignment(name: impl Into<String>, value: Statement) -> Self {
        Statement::Assignment {
            name: name.into(),
            value: Box::new(value),
        }
    }

    pub fn field_assignment(
        object: Vec<String>,
        field: impl Into<String>,
        value: Statement,
    ) -> Self {
        Statement::FieldAssignment {
            object,
            field: field.into(),
            value: Box::new(value),
        }
    }

    pub fn new_instance(class: Rc<Class>, args: Vec<Statement>) -> Self {
        Statement::NewInstance { class, args }
    }

    pub fn method_call(object: Statement, method: impl Into<String>, args: Vec<Statement>) -> Self {
        Statement::MethodCall {
            object: Box::new(object),
            method: method.into(),
            args,
        }
    }

    pub fn returning(value: Statement) -> Self {
        Statement::Return(Box::new(value))
    }

    pub fn method_body(body: Statement) -> Self {
        Statement::MethodBody(Box::new(body))
    }

    pub fn stringify(inner: Statement) -> Self {
        Statement::Stringify(Box::new(inner))
    }

    pub fn arithmetic(op: ArithmeticOp, lhs: Statement, rhs: Statement) -> Self {
        Statement::Arithmetic {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn logical(op: LogicalOp, lhs: Statement, rhs: Statement) -> Self {
        Statement::Logical {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn logical_not(inner: Statement) -> Self {
        Statement::Not(Box::new(inner))
    }

    pub fn comparison(op: ComparisonOp, lhs: Statement, rhs: Statement) -> Self {
        Statement::Comparison {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn if_else(condition: Statement, then_body: Statement, else_body: Option<Statement>) -> Self {
        Statement::IfElse {
            condition: Box::new(condition),
            then_body: Box::new(then_body),
            else_body: else_body.map(Box::new),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl ArithmeticOp {
    pub fn symbol(self) -> &'static str {
        match self {
            ArithmeticOp::Add => "+",
            ArithmeticOp::Sub => "-",
            ArithmeticOp::Mul => "*",
            ArithmeticOp::Div => "/",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComparisonOp {
    Eq,
    NotEq,
    Less,
    Greater,
    LessEq,
    GreaterEq,
}
