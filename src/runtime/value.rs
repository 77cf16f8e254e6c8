use crate::language::ast::Statement;
use crate::runtime::{context::Context, environment::Closure, error::ExecResult, interpreter};
use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::rc::{Rc, Weak};

pub const SELF: &str = "self";
pub const INIT_METHOD: &str = "__init__";
pub const STR_METHOD: &str = "__str__";
pub const EQ_METHOD: &str = "__eq__";
pub const LT_METHOD: &str = "__lt__";
pub const ADD_METHOD: &str = "__add__";

/// A runtime value. Deliberately not `Clone`: values are shared through
/// holders, never copied.
#[derive(Debug)]
pub enum Value {
    Number(i64),
    String(String),
    Bool(bool),
    Class(Rc<Class>),
    Instance(Instance),
}

impl Value {
    pub fn as_number(&self) -> Option<i64> {
        match self {
            Value::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_class(&self) -> Option<&Rc<Class>> {
        match self {
            Value::Class(class) => Some(class),
            _ => None,
        }
    }

    pub fn as_instance(&self) -> Option<&Instance> {
        match self {
            Value::Instance(instance) => Some(instance),
            _ => None,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(value) => *value,
            Value::Number(value) => *value != 0,
            Value::String(value) => !value.is_empty(),
            Value::Class(_) | Value::Instance(_) => true,
        }
    }
}

pub struct Method {
    pub name: String,
    pub formal_params: Vec<String>,
    pub body: Statement,
}

/// Immutable class descriptor. The name-to-method table is flattened at
/// construction: the parent's table is copied first and then overwritten by
/// the class's own methods, so lookup never walks the parent chain.
pub struct Class {
    name: String,
    methods: Vec<Rc<Method>>,
    parent: Option<Rc<Class>>,
    table: HashMap<String, Rc<Method>>,
}

impl Class {
    pub fn new(name: impl Into<String>, methods: Vec<Method>, parent: Option<Rc<Class>>) -> Rc<Self> {
        let mut table = match &parent {
            Some(parent) => parent.table.clone(),
            None => HashMap::new(),
        };
        let methods: Vec<Rc<Method>> = methods.into_iter().map(Rc::new).collect();
        for method in &methods {
            table.insert(method.name.clone(), Rc::clone(method));
        }
        Rc::new(Self {
            name: name.into(),
            methods,
            parent,
            table,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&Rc<Class>> {
        self.parent.as_ref()
    }

    pub fn methods(&self) -> &[Rc<Method>] {
        &self.methods
    }

    pub fn get_method(&self, name: &str) -> Option<&Rc<Method>> {
        self.table.get(name)
    }

    pub fn has_method(&self, name: &str, arity: usize) -> bool {
        self.table
            .get(name)
            .is_some_and(|method| method.formal_params.len() == arity)
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("name", &self.name)
            .field(
                "methods",
                &self
                    .methods
                    .iter()
                    .map(|method| method.name.as_str())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// A live object: a class link plus an owned field environment.
pub struct Instance {
    class: Rc<Class>,
    fields: RefCell<Closure>,
}

impl Instance {
    pub fn new(class: Rc<Class>) -> Self {
        Self {
            class,
            fields: RefCell::new(Closure::new()),
        }
    }

    pub fn class(&self) -> &Rc<Class> {
        &self.class
    }

    pub fn fields(&self) -> Ref<'_, Closure> {
        self.fields.borrow()
    }

    pub fn fields_mut(&self) -> RefMut<'_, Closure> {
        self.fields.borrow_mut()
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Instance of {}", self.class.name)
    }
}

/// A slot that can hold a value. Owning holders keep the value alive;
/// sharing holders observe a value whose lifetime is guaranteed elsewhere
/// (`self` during a call). Copying a holder never copies the value, and an
/// expired sharing holder reads as empty.
#[derive(Clone, Default)]
pub struct Holder {
    slot: Slot,
}

#[derive(Clone, Default)]
enum Slot {
    #[default]
    Empty,
    Owned(Rc<Value>),
    Shared(Weak<Value>),
}

impl Holder {
    pub fn own(value: Value) -> Self {
        Self {
            slot: Slot::Owned(Rc::new(value)),
        }
    }

    pub fn share(target: &Rc<Value>) -> Self {
        Self {
            slot: Slot::Shared(Rc::downgrade(target)),
        }
    }

    pub fn none() -> Self {
        Self { slot: Slot::Empty }
    }

    pub fn value(&self) -> Option<Rc<Value>> {
        match &self.slot {
            Slot::Empty => None,
            Slot::Owned(value) => Some(Rc::clone(value)),
            Slot::Shared(value) => value.upgrade(),
        }
    }

    pub fn is_none(&self) -> bool {
        self.value().is_none()
    }

    pub fn is_truthy(&self) -> bool {
        self.value().map(|value| value.is_truthy()).unwrap_or(false)
    }

    /// Pointer identity of the targets; distinct from the language-level `==`.
    pub fn ptr_eq(&self, other: &Holder) -> bool {
        match (self.value(), other.value()) {
            (Some(lhs), Some(rhs)) => Rc::ptr_eq(&lhs, &rhs),
            (None, None) => true,
            _ => false,
        }
    }

    /// Writes the printed form to the context's sink. Instances defer to
    /// `__str__` when their class defines it, otherwise an address-like
    /// identity token is written.
    pub fn print(&self, ctx: &mut Context) -> ExecResult<()> {
        let Some(value) = self.value() else {
            write!(ctx.output(), "None")?;
            return Ok(());
        };
        match value.as_ref() {
            Value::Number(number) => write!(ctx.output(), "{number}")?,
            Value::String(text) => write!(ctx.output(), "{text}")?,
            Value::Bool(true) => write!(ctx.output(), "True")?,
            Value::Bool(false) => write!(ctx.output(), "False")?,
            Value::Class(class) => write!(ctx.output(), "Class {}", class.name())?,
            Value::Instance(instance) => {
                if instance.class().has_method(STR_METHOD, 0) {
                    let printed = interpreter::call_method(&value, STR_METHOD, Vec::new(), ctx)?;
                    printed.print(ctx)?;
                } else {
                    write!(
                        ctx.output(),
                        "<{} object at {:p}>",
                        instance.class().name(),
                        Rc::as_ptr(&value)
                    )?;
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Holder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.slot {
            Slot::Empty => write!(f, "None"),
            Slot::Owned(value) => f.debug_tuple("Owned").field(value).finish(),
            Slot::Shared(value) => match value.upgrade() {
                Some(value) => f.debug_tuple("Shared").field(&value).finish(),
                None => write!(f, "Shared(<expired>)"),
            },
        }
    }
}
