// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 类型模式模块
//!
//! 参数绑定需要"可默认构造、可按字段名赋值"的能力。本模块不依赖运行时反射，
//! 而是在路由注册阶段为每个目标类型构建一份显式模式：字段名 → 标量类型 + 赋值函数。
//!
//! - [`ScalarKind`] / [`Scalar`]：绑定所支持的标量类型及其取值。
//! - [`Bindable`]：可被绑定的对象类型需实现的 trait。
//! - [`ObjectSchema`]：类型擦除后的对象模式，支持通过 `extends` 声明祖先类型，
//!   查找字段时先查自身字段，再按声明顺序查找祖先。

use std::any::{type_name, Any};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// 绑定所支持的标量类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Str,
    Int,
    Long,
    Float,
    Bool,
    Char,
}

/// 转换后的标量值
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Str(String),
    Int(i32),
    Long(i64),
    Float(f64),
    Bool(bool),
    Char(char),
}

/// 标量转换失败的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionError {
    /// 值不存在或为空白
    Missing,
    /// 值存在但无法解析为目标类型
    Unparsable,
}

impl ScalarKind {
    /// 该类型的零值：空字符串、0、0.0、false 或 NUL 字符。
    pub fn zero(self) -> Scalar {
        match self {
            ScalarKind::Str => Scalar::Str(String::new()),
            ScalarKind::Int => Scalar::Int(0),
            ScalarKind::Long => Scalar::Long(0),
            ScalarKind::Float => Scalar::Float(0.0),
            ScalarKind::Bool => Scalar::Bool(false),
            ScalarKind::Char => Scalar::Char('\0'),
        }
    }

    /// 将原始字符串转换为该类型。
    ///
    /// 缺失或空白的值视为 `Missing`；布尔值只有忽略大小写等于 `"true"` 时为真，从不失败；
    /// 字符类型取第一个字符。
    pub fn convert(self, raw: Option<&str>) -> Result<Scalar, ConversionError> {
        let value = match raw {
            Some(v) if !v.trim().is_empty() => v,
            _ => return Err(ConversionError::Missing),
        };

        let parsed = match self {
            ScalarKind::Str => Some(Scalar::Str(value.to_string())),
            ScalarKind::Int => value.parse().ok().map(Scalar::Int),
            ScalarKind::Long => value.parse().ok().map(Scalar::Long),
            ScalarKind::Float => value.parse().ok().map(Scalar::Float),
            ScalarKind::Bool => Some(Scalar::Bool(value.eq_ignore_ascii_case("true"))),
            ScalarKind::Char => value.chars().next().map(Scalar::Char),
        };
        parsed.ok_or(ConversionError::Unparsable)
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScalarKind::Str => "string",
            ScalarKind::Int => "int",
            ScalarKind::Long => "long",
            ScalarKind::Float => "float",
            ScalarKind::Bool => "bool",
            ScalarKind::Char => "char",
        };
        write!(f, "{}", name)
    }
}

impl Scalar {
    pub fn kind(&self) -> ScalarKind {
        match self {
            Scalar::Str(_) => ScalarKind::Str,
            Scalar::Int(_) => ScalarKind::Int,
            Scalar::Long(_) => ScalarKind::Long,
            Scalar::Float(_) => ScalarKind::Float,
            Scalar::Bool(_) => ScalarKind::Bool,
            Scalar::Char(_) => ScalarKind::Char,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Scalar::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            Scalar::Long(v) => Some(*v),
            Scalar::Int(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Scalar::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_char(&self) -> Option<char> {
        match self {
            Scalar::Char(v) => Some(*v),
            _ => None,
        }
    }
}

/// 可被参数绑定器实例化并填充的对象类型。
///
/// ```
/// use webfront::schema::{Bindable, ObjectSchema, SchemaBuilder};
///
/// #[derive(Default)]
/// struct Dept {
///     id: i32,
///     name: String,
/// }
///
/// impl Bindable for Dept {
///     fn schema() -> ObjectSchema {
///         SchemaBuilder::<Dept>::new()
///             .int("id", |d, v| d.id = v)
///             .string("name", |d, v| d.name = v)
///             .build()
///     }
/// }
///
/// let schema = Dept::schema();
/// assert!(schema.has_field("name"));
/// ```
pub trait Bindable: Default + Send + 'static {
    fn schema() -> ObjectSchema;
}

type Erased = dyn Any + Send;
type Setter = Arc<dyn Fn(&mut Erased, Scalar) + Send + Sync>;
type Projection = Arc<dyn Fn(&mut Erased) -> Option<&mut Erased> + Send + Sync>;

#[derive(Clone)]
struct FieldSetter {
    name: &'static str,
    kind: ScalarKind,
    set: Setter,
}

#[derive(Clone)]
struct Ancestor {
    schema: ObjectSchema,
    project: Projection,
}

/// 类型擦除后的对象模式。
#[derive(Clone)]
pub struct ObjectSchema {
    type_name: String,
    create: Arc<dyn Fn() -> Box<Erased> + Send + Sync>,
    fields: Vec<FieldSetter>,
    ancestors: Vec<Ancestor>,
}

impl ObjectSchema {
    /// 目标类型的短名称（不含模块路径）。
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// 通过默认构造创建一个新的实例。
    pub fn instantiate(&self) -> Box<dyn Any + Send> {
        (self.create)()
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field_kind(name).is_some()
    }

    /// 查找字段的标量类型：先查自身字段，再按顺序查找祖先，第一个命中者胜出。
    pub fn field_kind(&self, name: &str) -> Option<ScalarKind> {
        if let Some(field) = self.fields.iter().find(|f| f.name == name) {
            return Some(field.kind);
        }
        self.ancestors
            .iter()
            .find_map(|ancestor| ancestor.schema.field_kind(name))
    }

    /// 为实例的字段赋值。字段不存在或实例类型不符时返回 `false`。
    pub fn assign(
        &self,
        target: &mut (dyn Any + Send + 'static),
        name: &str,
        value: Scalar,
    ) -> bool {
        if let Some(field) = self.fields.iter().find(|f| f.name == name) {
            (field.set)(target, value);
            return true;
        }
        for ancestor in &self.ancestors {
            if ancestor.schema.field_kind(name).is_some() {
                return match (ancestor.project)(target) {
                    Some(inner) => ancestor.schema.assign(inner, name, value),
                    None => false,
                };
            }
        }
        false
    }
}

impl fmt::Debug for ObjectSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<&str> = self.fields.iter().map(|field| field.name).collect();
        let ancestors: Vec<&str> = self
            .ancestors
            .iter()
            .map(|a| a.schema.type_name.as_str())
            .collect();
        f.debug_struct("ObjectSchema")
            .field("type_name", &self.type_name)
            .field("fields", &fields)
            .field("ancestors", &ancestors)
            .finish()
    }
}

/// 为类型 `T` 构建 [`ObjectSchema`] 的构建器。
pub struct SchemaBuilder<T> {
    fields: Vec<FieldSetter>,
    ancestors: Vec<Ancestor>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Default + Send + 'static> Default for SchemaBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Default + Send + 'static> SchemaBuilder<T> {
    pub fn new() -> Self {
        Self {
            fields: Vec::new(),
            ancestors: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// 注册一个字段。值的类型与 `kind` 不符时赋值被忽略。
    pub fn field<F>(mut self, name: &'static str, kind: ScalarKind, set: F) -> Self
    where
        F: Fn(&mut T, Scalar) + Send + Sync + 'static,
    {
        let set: Setter = Arc::new(move |target: &mut Erased, value: Scalar| {
            if let Some(target) = target.downcast_mut::<T>() {
                set(target, value);
            }
        });
        self.fields.push(FieldSetter { name, kind, set });
        self
    }

    pub fn string<F>(self, name: &'static str, set: F) -> Self
    where
        F: Fn(&mut T, String) + Send + Sync + 'static,
    {
        self.field(name, ScalarKind::Str, move |t, v| {
            if let Scalar::Str(s) = v {
                set(t, s)
            }
        })
    }

    pub fn int<F>(self, name: &'static str, set: F) -> Self
    where
        F: Fn(&mut T, i32) + Send + Sync + 'static,
    {
        self.field(name, ScalarKind::Int, move |t, v| {
            if let Some(v) = v.as_int() {
                set(t, v)
            }
        })
    }

    pub fn long<F>(self, name: &'static str, set: F) -> Self
    where
        F: Fn(&mut T, i64) + Send + Sync + 'static,
    {
        self.field(name, ScalarKind::Long, move |t, v| {
            if let Some(v) = v.as_long() {
                set(t, v)
            }
        })
    }

    pub fn float<F>(self, name: &'static str, set: F) -> Self
    where
        F: Fn(&mut T, f64) + Send + Sync + 'static,
    {
        self.field(name, ScalarKind::Float, move |t, v| {
            if let Some(v) = v.as_float() {
                set(t, v)
            }
        })
    }

    pub fn bool<F>(self, name: &'static str, set: F) -> Self
    where
        F: Fn(&mut T, bool) + Send + Sync + 'static,
    {
        self.field(name, ScalarKind::Bool, move |t, v| {
            if let Some(v) = v.as_bool() {
                set(t, v)
            }
        })
    }

    pub fn char<F>(self, name: &'static str, set: F) -> Self
    where
        F: Fn(&mut T, char) + Send + Sync + 'static,
    {
        self.field(name, ScalarKind::Char, move |t, v| {
            if let Some(v) = v.as_char() {
                set(t, v)
            }
        })
    }

    /// 声明一个祖先类型 `P`，其字段通过 `access` 投影到 `T` 内嵌的 `P` 上。
    pub fn extends<P: Bindable>(mut self, access: fn(&mut T) -> &mut P) -> Self {
        let project = projection(move |target| {
            target
                .downcast_mut::<T>()
                .map(|t| access(t) as &mut Erased)
        });
        self.ancestors.push(Ancestor {
            schema: P::schema(),
            project,
        });
        self
    }

    pub fn build(self) -> ObjectSchema {
        ObjectSchema {
            type_name: short_type_name::<T>(),
            create: Arc::new(|| Box::new(T::default()) as Box<Erased>),
            fields: self.fields,
            ancestors: self.ancestors,
        }
    }
}

fn projection<F>(f: F) -> Projection
where
    F: Fn(&mut Erased) -> Option<&mut Erased> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// 去掉模块路径后的类型名，泛型参数中的路径同样去掉，
/// 例如 `app::model::Emp` → `Emp`，`alloc::vec::Vec<app::model::Emp>` → `Vec<Emp>`。
pub fn short_type_name<T: ?Sized>() -> String {
    let full = type_name::<T>();
    let mut short = String::with_capacity(full.len());
    let mut start = 0;
    for (pos, c) in full.char_indices() {
        if matches!(c, '<' | '>' | ',' | ' ' | '[' | ']' | '(' | ')' | '&' | ';') {
            short.push_str(strip_module_path(&full[start..pos]));
            short.push(c);
            start = pos + c.len_utf8();
        }
    }
    short.push_str(strip_module_path(&full[start..]));
    short
}

fn strip_module_path(segment: &str) -> &str {
    segment.rsplit("::").next().unwrap_or(segment)
}
