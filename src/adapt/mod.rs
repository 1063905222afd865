//! The type adaptation protocol.
//!
//! Two process-wide registries decouple value translation from the cursor
//! machinery: *adapters* map host value types to native storage values on
//! the way in, and *converters* map native values back to host values on
//! the way out, keyed by a column's declared type.
//!
//! Both registries start empty, are mutated only through the `register_*`
//! functions, and follow last-registration-wins semantics per key. A
//! registration takes effect immediately for every connection, including
//! ones already open. Reads vastly outnumber writes, so both sit behind a
//! read-write lock.
//!
//! ```
//! use rusq::{register_adapter, register_converter, Value};
//!
//! struct Point { x: i32, y: i32 }
//!
//! register_adapter::<Point, _>(|p| Ok(Value::Text(format!("{},{}", p.x, p.y))));
//! register_converter::<Point, _>("POINT", |v| {
//!     let text = v.as_text().ok_or("expected TEXT storage for POINT")?;
//!     let (x, y) = text.split_once(',').ok_or("malformed point")?;
//!     Ok(Point {
//!         x: x.parse().map_err(|e| format!("{e}"))?,
//!         y: y.parse().map_err(|e| format!("{e}"))?,
//!     })
//! });
//! ```

use std::{
    any::{Any, TypeId},
    collections::HashMap,
    sync::{Arc, LazyLock, PoisonError, RwLock},
};

use crate::{
    error::{Error, Result},
    row::{Cell, CustomValue},
    Value,
};

pub mod defaults;

/// Errors produced inside adapter and converter functions are plain
/// strings; the registry attaches the host type or declared type when
/// surfacing them.
type AdaptFn = Arc<dyn Fn(&dyn Any) -> std::result::Result<Value, String> + Send + Sync>;
type ConvertFn =
    Arc<dyn Fn(&Value) -> std::result::Result<Arc<dyn Any + Send + Sync>, String> + Send + Sync>;

static ADAPTERS: LazyLock<RwLock<HashMap<TypeId, AdaptFn>>> = LazyLock::new(Default::default);
static CONVERTERS: LazyLock<RwLock<HashMap<String, ConvertFn>>> = LazyLock::new(Default::default);

/// Register an adapter mapping host values of type `T` to native storage
/// values. Replaces any previous adapter for `T`.
pub fn register_adapter<T, F>(adapt: F)
where
    T: Any,
    F: Fn(&T) -> std::result::Result<Value, String> + Send + Sync + 'static,
{
    let adapt: AdaptFn = Arc::new(move |any| {
        let value = any
            .downcast_ref::<T>()
            .ok_or_else(|| "adapter invoked with mismatched host type".to_owned())?;
        adapt(value)
    });

    ADAPTERS
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(TypeId::of::<T>(), adapt);
}

/// Register a converter producing host values of type `T` for columns whose
/// declared type matches `decl_type`. Replaces any previous converter for
/// that name.
///
/// Declared type names are normalized on both registration and lookup: the
/// token before the first space or `(`, ASCII-uppercased, so a converter
/// registered for `"POINT"` also fires for columns declared `point` or
/// `POINT(2)`.
pub fn register_converter<T, F>(decl_type: &str, convert: F)
where
    T: Any + Send + Sync,
    F: Fn(&Value) -> std::result::Result<T, String> + Send + Sync + 'static,
{
    let convert: ConvertFn =
        Arc::new(move |value| convert(value).map(|v| Arc::new(v) as Arc<dyn Any + Send + Sync>));

    CONVERTERS
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(normalize_decl_type(decl_type), convert);
}

/// Reduce a declared column type to its converter lookup key.
fn normalize_decl_type(decl_type: &str) -> String {
    decl_type
        .split(|c| c == ' ' || c == '(')
        .next()
        .unwrap_or(decl_type)
        .to_ascii_uppercase()
}

/// Adapt one host parameter to a native storage value.
///
/// Values that are already native pass through untouched. Custom values
/// dispatch on their type; a missing or failing adapter surfaces before
/// any native call is made.
pub fn adapt(param: Param) -> Result<Value> {
    match param {
        Param::Value(value) => Ok(value),
        Param::Custom { value, type_name } => {
            let adapter = ADAPTERS
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .get(&value.as_ref().type_id())
                .cloned();

            match adapter {
                Some(adapter) => adapter(value.as_ref()).map_err(|message| Error::Adapt {
                    type_name: type_name.to_owned(),
                    message,
                }),
                None => Err(Error::Adapt {
                    type_name: type_name.to_owned(),
                    message: "no adapter registered".into(),
                }),
            }
        }
    }
}

/// Convert one column value using the converter registered for the
/// column's declared type, falling back to the raw native value when no
/// converter matches.
pub fn convert(value: Value, decl_type: Option<&str>) -> Result<Cell> {
    let Some(decl_type) = decl_type else {
        return Ok(Cell::Value(value));
    };

    let converter = CONVERTERS
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&normalize_decl_type(decl_type))
        .cloned();

    match converter {
        Some(converter) => match converter(&value) {
            Ok(host) => Ok(Cell::Custom(CustomValue(host))),
            Err(message) => Err(Error::Convert {
                declared_type: decl_type.to_owned(),
                message,
            }),
        },
        None => Ok(Cell::Value(value)),
    }
}

/// One statement parameter: a value already in a native storage class, or
/// an arbitrary host value routed through the adapter registry at bind
/// time.
pub enum Param {
    Value(Value),
    Custom {
        value: Box<dyn Any + Send>,
        type_name: &'static str,
    },
}

impl std::fmt::Debug for Param {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Param::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Param::Custom { type_name, .. } => {
                f.debug_struct("Custom").field("type_name", type_name).finish()
            }
        }
    }
}

impl Param {
    /// Wrap an arbitrary host value for adaptation at bind time.
    pub fn custom<T: Any + Send>(value: T) -> Param {
        Param::Custom {
            value: Box::new(value),
            type_name: std::any::type_name::<T>(),
        }
    }
}

impl From<Value> for Param {
    fn from(v: Value) -> Self {
        Param::Value(v)
    }
}

macro_rules! param_from {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl From<$ty> for Param {
                fn from(v: $ty) -> Self {
                    Param::Value(v.into())
                }
            }
        )+
    };
}

param_from!(i32, i64, u32, f32, f64, bool, String, &str, Vec<u8>, &[u8]);

impl<T> From<Option<T>> for Param
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        Param::Value(v.into())
    }
}

/// The full parameter set for one execution: empty, positional, or named.
#[derive(Debug, Default)]
pub enum Params {
    #[default]
    None,
    Positional(Vec<Param>),
    Named(Vec<(String, Param)>),
}

impl Params {
    /// Build a named parameter set. Names may carry their SQL prefix
    /// (`:`, `@`, `$`) or omit it.
    pub fn named<N, P>(pairs: impl IntoIterator<Item = (N, P)>) -> Params
    where
        N: Into<String>,
        P: Into<Param>,
    {
        Params::Named(
            pairs
                .into_iter()
                .map(|(n, p)| (n.into(), p.into()))
                .collect(),
        )
    }
}

impl From<()> for Params {
    fn from(_: ()) -> Self {
        Params::None
    }
}

impl From<Vec<Param>> for Params {
    fn from(params: Vec<Param>) -> Self {
        Params::Positional(params)
    }
}

impl From<Param> for Params {
    fn from(param: Param) -> Self {
        Params::Positional(vec![param])
    }
}

/// Build a positional parameter vector:
/// `conn.execute("SELECT ?1 + ?2", params![1, 2])?`.
#[macro_export]
macro_rules! params {
    () => {
        Vec::<$crate::Param>::new()
    };
    ($($v:expr),+ $(,)?) => {
        vec![$($crate::Param::from($v)),+]
    };
}
