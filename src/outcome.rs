// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 处理结果模块
//!
//! 处理函数的返回值统一表示为 [`Outcome`]，由分发器在 ENCODE 阶段分类编码：
//! - [`Outcome::Text`]：纯文本
//! - [`Outcome::View`]：视图名 + 属性包
//! - [`Outcome::Data`]：任意可序列化的结构化数据
//! - [`Outcome::Empty`]：空结果
//!
//! 同时提供 API 处理函数使用的 JSON 信封格式。

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::schema::short_type_name;

/// 请求作用域的属性包：名称 → JSON 值。
pub type Attributes = BTreeMap<String, Value>;

/// 视图转发结果：视图标识 + 交给视图引擎的属性。
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModelView {
    view: String,
    attributes: Attributes,
}

impl ModelView {
    pub fn new(view: impl Into<String>) -> Self {
        Self {
            view: view.into(),
            attributes: Attributes::new(),
        }
    }

    /// 添加一个属性。无法序列化的值以 `null` 存储。
    pub fn add_attribute<T: Serialize>(&mut self, name: impl Into<String>, value: T) -> &mut Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.attributes.insert(name.into(), value);
        self
    }

    pub fn with_attribute<T: Serialize>(mut self, name: impl Into<String>, value: T) -> Self {
        self.add_attribute(name, value);
        self
    }

    pub fn view(&self) -> &str {
        &self.view
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn into_parts(self) -> (String, Attributes) {
        (self.view, self.attributes)
    }
}

/// 处理函数的返回值。
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Text(String),
    View(ModelView),
    Data {
        value: Value,
        /// 运行时类型名，用于非 API 处理函数的执行确认页
        type_name: String,
    },
    Empty,
}

impl Outcome {
    pub fn text(text: impl Into<String>) -> Self {
        Outcome::Text(text.into())
    }

    pub fn view(view: ModelView) -> Self {
        Outcome::View(view)
    }

    /// 将任意可序列化的值包装为结构化结果。
    pub fn data<T: Serialize>(value: &T) -> Self {
        Outcome::Data {
            value: serde_json::to_value(value).unwrap_or(Value::Null),
            type_name: short_type_name::<T>(),
        }
    }

    /// 处理函数已执行，但结果不需要序列化，仅记录其类型名。
    pub fn done<T: ?Sized>() -> Self {
        Outcome::Data {
            value: Value::Null,
            type_name: short_type_name::<T>(),
        }
    }

    /// 空结果，或值为 `null` 的结构化结果。
    pub fn is_empty(&self) -> bool {
        matches!(
            self,
            Outcome::Empty | Outcome::Data { value: Value::Null, .. }
        )
    }

    pub fn type_name(&self) -> &str {
        match self {
            Outcome::Text(_) => "String",
            Outcome::View(_) => "ModelView",
            Outcome::Data { type_name, .. } => type_name,
            Outcome::Empty => "null",
        }
    }
}

impl From<String> for Outcome {
    fn from(text: String) -> Self {
        Outcome::Text(text)
    }
}

impl From<&str> for Outcome {
    fn from(text: &str) -> Self {
        Outcome::Text(text.to_string())
    }
}

impl From<ModelView> for Outcome {
    fn from(view: ModelView) -> Self {
        Outcome::View(view)
    }
}

impl From<()> for Outcome {
    fn from(_: ()) -> Self {
        Outcome::Empty
    }
}

/// 处理函数执行失败时返回的应用错误。
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct HandlerFault {
    message: String,
    detail: String,
}

impl HandlerFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            detail: String::new(),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }
}

/// 成功信封：`{"status":"success","code":200,"data":...,"count":n}`，
/// 仅当 `data` 为数组时带 `count`。
pub fn envelope_success(data: Value) -> Value {
    let mut envelope = Map::new();
    envelope.insert("status".to_string(), json!("success"));
    envelope.insert("code".to_string(), json!(200));
    let count = data.as_array().map(Vec::len);
    envelope.insert("data".to_string(), data);
    if let Some(count) = count {
        envelope.insert("count".to_string(), json!(count));
    }
    Value::Object(envelope)
}

/// 错误信封：`{"status":"error","code":<code>,"message":<message>}`。
pub fn envelope_error(code: u16, message: &str) -> Value {
    let mut envelope = Map::new();
    envelope.insert("status".to_string(), json!("error"));
    envelope.insert("code".to_string(), json!(code));
    envelope.insert("message".to_string(), json!(message));
    Value::Object(envelope)
}
