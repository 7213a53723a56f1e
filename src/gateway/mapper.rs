//! Named operations, their parameter shapes, and the registry mappers fill at DAO construction.
//!
//! An operation is identified by its name plus the shape of its parameters, so `delete(bean)`
//! and `delete(map)` are distinct entries. Resolution is an exact lookup; there is no
//! overload scoring.

use crate::error::{GatewayError, GatewayResult};
use crate::gateway::session::Session;
use futures_util::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

/// Future returned by a registered operation, borrowing the session for `'s`.
pub type OperationFuture<'s> = BoxFuture<'s, GatewayResult<Value>>;

/// Runtime kind of one positional argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgKind {
    Null,
    Bool,
    Integer,
    Float,
    Text,
    List,
    Object,
}

impl ArgKind {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Bool,
            Value::Number(n) if n.is_f64() => Self::Float,
            Value::Number(_) => Self::Integer,
            Value::String(_) => Self::Text,
            Value::Array(_) => Self::List,
            Value::Object(_) => Self::Object,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Text => "text",
            Self::List => "list",
            Self::Object => "object",
        }
    }
}

/// The parameter signature half of an operation's identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParamShape {
    None,
    Keyed,
    /// A single typed bean, identified by its Rust type name.
    Bean(&'static str),
    Positional(Vec<ArgKind>),
}

impl ParamShape {
    pub fn bean<T: ?Sized>() -> Self {
        Self::Bean(std::any::type_name::<T>())
    }

    pub fn positional(kinds: impl IntoIterator<Item = ArgKind>) -> Self {
        let kinds: Vec<ArgKind> = kinds.into_iter().collect();
        if kinds.is_empty() {
            Self::None
        } else {
            Self::Positional(kinds)
        }
    }
}

impl fmt::Display for ParamShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "()"),
            Self::Keyed => write!(f, "(map)"),
            Self::Bean(type_name) => write!(f, "({})", short_type_name(type_name)),
            Self::Positional(kinds) => {
                let names: Vec<&str> = kinds.iter().map(ArgKind::name).collect();
                write!(f, "({})", names.join(", "))
            }
        }
    }
}

static NULL: Value = Value::Null;

/// Strip module paths from a type name: `app::model::Widget` becomes `Widget`.
pub(crate) fn short_type_name(type_name: &str) -> &str {
    let base = type_name.split('<').next().unwrap_or(type_name);
    base.rsplit("::").next().unwrap_or(base)
}

/// Arguments handed to an operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Params {
    None,
    Keyed(Map<String, Value>),
    Bean { type_name: &'static str, value: Value },
    Positional(Vec<Value>),
}

impl Params {
    /// Serialize a typed bean.
    pub fn bean<T: Serialize>(bean: &T) -> GatewayResult<Self> {
        Ok(Self::Bean {
            type_name: std::any::type_name::<T>(),
            value: serde_json::to_value(bean)?,
        })
    }

    pub fn keyed(map: Map<String, Value>) -> Self {
        Self::Keyed(map)
    }

    /// Positional arguments. An empty list is the same as no parameters.
    pub fn positional(args: Vec<Value>) -> Self {
        if args.is_empty() {
            Self::None
        } else {
            Self::Positional(args)
        }
    }

    pub fn shape(&self) -> ParamShape {
        match self {
            Self::None => ParamShape::None,
            Self::Keyed(_) => ParamShape::Keyed,
            Self::Bean { type_name, .. } => ParamShape::Bean(*type_name),
            Self::Positional(args) => ParamShape::Positional(args.iter().map(ArgKind::of).collect()),
        }
    }

    /// Look up a named field of a bean or keyed map. Missing fields read as null.
    pub fn field(&self, name: &str) -> &Value {
        let map = match self {
            Self::Keyed(map) => Some(map),
            Self::Bean { value, .. } => value.as_object(),
            _ => None,
        };
        map.and_then(|m| m.get(name)).unwrap_or(&NULL)
    }

    /// Positional argument at `index`. Missing arguments read as null.
    pub fn arg(&self, index: usize) -> &Value {
        match self {
            Self::Positional(args) => args.get(index).unwrap_or(&NULL),
            _ => &NULL,
        }
    }

    /// Decode a bean or keyed map into a typed value.
    pub fn decode<T: DeserializeOwned>(&self) -> GatewayResult<T> {
        match self {
            Self::Bean { value, .. } => Ok(T::deserialize(value)?),
            Self::Keyed(map) => Ok(T::deserialize(&Value::Object(map.clone()))?),
            other => Err(GatewayError::decode(format!(
                "expected a bean or map parameter, got {}",
                other.shape()
            ))),
        }
    }

    /// Decode the positional argument at `index`.
    pub fn decode_arg<T: DeserializeOwned>(&self, index: usize) -> GatewayResult<T> {
        Ok(T::deserialize(self.arg(index))?)
    }
}

/// Type-erased registered operation.
trait Operation<S>: Send + Sync {
    fn call<'s>(&self, session: &'s mut S, params: Params) -> OperationFuture<'s>;
}

impl<S, F> Operation<S> for F
where
    F: for<'s> Fn(&'s mut S, Params) -> OperationFuture<'s> + Send + Sync,
{
    fn call<'s>(&self, session: &'s mut S, params: Params) -> OperationFuture<'s> {
        self(session, params)
    }
}

/// Operations of one mapper, keyed by name and parameter shape.
pub struct OperationRegistry<S> {
    mapper: &'static str,
    operations: HashMap<(String, ParamShape), Box<dyn Operation<S>>>,
}

impl<S: Session> OperationRegistry<S> {
    pub fn new(mapper: &'static str) -> Self {
        Self {
            mapper,
            operations: HashMap::new(),
        }
    }

    /// Name of the mapper that filled this registry.
    pub fn mapper(&self) -> &'static str {
        self.mapper
    }

    /// Register an operation. A later registration with the same name and shape replaces
    /// the earlier one.
    ///
    /// ```ignore
    /// registry.register("selectById", ParamShape::positional([ArgKind::Integer]), |session, params| {
    ///     Box::pin(async move {
    ///         let id: i64 = params.decode_arg(0)?;
    ///         session.fetch_optional("SELECT * FROM widget WHERE id = ?", &[id.into()]).await
    ///     })
    /// });
    /// ```
    pub fn register<F>(&mut self, name: &str, shape: ParamShape, operation: F) -> &mut Self
    where
        F: for<'s> Fn(&'s mut S, Params) -> OperationFuture<'s> + Send + Sync + 'static,
    {
        self.operations
            .insert((name.to_string(), shape), Box::new(operation));
        self
    }

    pub fn contains(&self, name: &str, shape: &ParamShape) -> bool {
        self.operations
            .contains_key(&(name.to_string(), shape.clone()))
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Bind this registry to a session.
    pub fn handle<'a>(&'a self, session: &'a mut S) -> MapperHandle<'a, S> {
        MapperHandle {
            registry: self,
            session,
        }
    }

    fn resolve(&self, name: &str, shape: &ParamShape) -> Option<&dyn Operation<S>> {
        self.operations
            .get(&(name.to_string(), shape.clone()))
            .map(Box::as_ref)
    }
}

impl<S> fmt::Debug for OperationRegistry<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self
            .operations
            .keys()
            .map(|(name, shape)| format!("{name}{shape}"))
            .collect();
        names.sort();
        f.debug_struct("OperationRegistry")
            .field("mapper", &self.mapper)
            .field("operations", &names)
            .finish()
    }
}

/// A mapper's operations bound to one open session.
pub struct MapperHandle<'a, S> {
    registry: &'a OperationRegistry<S>,
    session: &'a mut S,
}

impl<S: Session> MapperHandle<'_, S> {
    /// Resolve `operation` by name and the shape of `params`, then run it.
    pub async fn call(&mut self, operation: &str, params: Params) -> GatewayResult<Value> {
        let shape = params.shape();
        let op = self.registry.resolve(operation, &shape).ok_or_else(|| {
            GatewayError::operation_not_found(
                short_type_name(self.registry.mapper),
                operation,
                shape.to_string(),
            )
        })?;
        op.call(&mut *self.session, params).await
    }

    pub fn session(&mut self) -> &mut S {
        &mut *self.session
    }

    pub fn mapper(&self) -> &'static str {
        self.registry.mapper
    }
}

/// A set of named operations for one backend session type.
pub trait Mapper<S: Session>: Send + Sync + 'static {
    fn register(registry: &mut OperationRegistry<S>);

    /// A registry holding this mapper's operations.
    fn registry() -> OperationRegistry<S> {
        let mut registry = OperationRegistry::new(std::any::type_name::<Self>());
        Self::register(&mut registry);
        registry
    }
}
