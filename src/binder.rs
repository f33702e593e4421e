// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 参数绑定模块
//!
//! 将路径参数与扁平的多值键值请求数据转换为处理函数声明的参数列表。
//!
//! 请求键的结构编码：
//! - `name`：标量参数。
//! - `name.attr`：对象参数 `name` 的字段 `attr`。
//! - `name[i].attr`：数组参数 `name` 第 `i` 个元素的字段 `attr`。
//!
//! 绑定从不失败。无法定位或无法转换的值会退化为零值，并以 [`Degradation`]
//! 的形式记录在 [`BindReport`] 中，由调用方依据 [`BindPolicy`] 决定是否拒绝请求。

use std::any::Any;
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use log::{debug, warn};
use serde_derive::{Deserialize, Serialize};
use serde_json::Value;

use crate::outcome::Attributes;
use crate::pattern::PathParams;
use crate::schema::{Bindable, ConversionError, ObjectSchema, Scalar, ScalarKind};

/// 数组参数允许的最大长度，超出的下标按 `BadIndex` 处理。
pub const MAX_ARRAY_LEN: usize = 10_000;

/// 请求提供的多值键值空间（查询串、表单体）。保留插入顺序。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamSpace {
    entries: Vec<(String, String)>,
}

impl ParamSpace {
    pub fn new() -> Self {
        Self::default()
    }

    /// 解析 `application/x-www-form-urlencoded` 格式的字符串。
    pub fn from_urlencoded(input: &str) -> Self {
        let mut space = Self::new();
        space.extend_urlencoded(input);
        space
    }

    pub fn extend_urlencoded(&mut self, input: &str) {
        for (key, value) in form_urlencoded::parse(input.as_bytes()) {
            self.entries.push((key.into_owned(), value.into_owned()));
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.push((key.into(), value.into()));
    }

    /// 返回该键的第一个值。
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// 去重后的键，按首次出现的顺序。
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = Vec::new();
        for (key, _) in &self.entries {
            if !keys.contains(&key.as_str()) {
                keys.push(key);
            }
        }
        keys
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ParamSpace {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// 随请求上传的文件。
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedFile {
    pub field_name: String,
    pub file_name: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

/// 参数的目标类型。
#[derive(Debug, Clone)]
pub enum ParamKind {
    Scalar(ScalarKind),
    Object(ObjectSchema),
    /// 元素类型为该模式的对象数组
    Array(ObjectSchema),
    File,
}

/// 处理函数声明的单个参数：名称 + 目标类型。
#[derive(Debug, Clone)]
pub struct ParamSpec {
    name: String,
    kind: ParamKind,
}

impl ParamSpec {
    pub fn new(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn scalar(name: impl Into<String>, kind: ScalarKind) -> Self {
        Self::new(name, ParamKind::Scalar(kind))
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::scalar(name, ScalarKind::Str)
    }

    pub fn int(name: impl Into<String>) -> Self {
        Self::scalar(name, ScalarKind::Int)
    }

    pub fn long(name: impl Into<String>) -> Self {
        Self::scalar(name, ScalarKind::Long)
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::scalar(name, ScalarKind::Float)
    }

    pub fn bool(name: impl Into<String>) -> Self {
        Self::scalar(name, ScalarKind::Bool)
    }

    pub fn char(name: impl Into<String>) -> Self {
        Self::scalar(name, ScalarKind::Char)
    }

    pub fn object<T: Bindable>(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Object(T::schema()))
    }

    pub fn array<T: Bindable>(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Array(T::schema()))
    }

    pub fn file(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::File)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &ParamKind {
        &self.kind
    }

    /// 用于日志与诊断的类型描述，例如 `int`、`Dept`、`Emp[]`。
    pub fn type_label(&self) -> String {
        match &self.kind {
            ParamKind::Scalar(kind) => kind.to_string(),
            ParamKind::Object(schema) => schema.type_name().to_string(),
            ParamKind::Array(schema) => format!("{}[]", schema.type_name()),
            ParamKind::File => "file".to_string(),
        }
    }
}

/// 单个已物化的参数值。
pub enum Argument {
    Scalar(Scalar),
    Object(Box<dyn Any + Send>),
    Array(Vec<Option<Box<dyn Any + Send>>>),
    File(Option<UploadedFile>),
    /// 值已被处理函数通过 `take_*` 取走
    Taken,
}

impl fmt::Debug for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Scalar(s) => f.debug_tuple("Scalar").field(s).finish(),
            Argument::Object(_) => f.write_str("Object(..)"),
            Argument::Array(items) => write!(f, "Array(len={})", items.len()),
            Argument::File(file) => f
                .debug_tuple("File")
                .field(&file.as_ref().map(|x| &x.file_name))
                .finish(),
            Argument::Taken => f.write_str("Taken"),
        }
    }
}

/// 与处理函数参数列表按位置对齐的参数值序列。
#[derive(Debug, Default)]
pub struct BoundArguments {
    names: Vec<String>,
    values: Vec<Argument>,
}

impl BoundArguments {
    fn push(&mut self, name: &str, value: Argument) {
        self.names.push(name.to_string());
        self.values.push(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Argument> {
        self.values.get(index)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    fn scalar(&self, index: usize) -> Option<&Scalar> {
        match self.values.get(index)? {
            Argument::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn str(&self, index: usize) -> Option<&str> {
        self.scalar(index)?.as_str()
    }

    pub fn int(&self, index: usize) -> Option<i32> {
        self.scalar(index)?.as_int()
    }

    pub fn long(&self, index: usize) -> Option<i64> {
        self.scalar(index)?.as_long()
    }

    pub fn float(&self, index: usize) -> Option<f64> {
        self.scalar(index)?.as_float()
    }

    pub fn bool(&self, index: usize) -> Option<bool> {
        self.scalar(index)?.as_bool()
    }

    pub fn char(&self, index: usize) -> Option<char> {
        self.scalar(index)?.as_char()
    }

    pub fn object<T: Any>(&self, index: usize) -> Option<&T> {
        match self.values.get(index)? {
            Argument::Object(obj) => obj.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// 数组参数的借用视图，空位为 `None`。
    pub fn array<T: Any>(&self, index: usize) -> Option<Vec<Option<&T>>> {
        match self.values.get(index)? {
            Argument::Array(items) => items
                .iter()
                .map(|item| match item {
                    Some(obj) => obj.downcast_ref::<T>().map(Some),
                    None => Some(None),
                })
                .collect(),
            _ => None,
        }
    }

    pub fn file(&self, index: usize) -> Option<&UploadedFile> {
        match self.values.get(index)? {
            Argument::File(file) => file.as_ref(),
            _ => None,
        }
    }

    /// 取走对象参数的所有权。类型不符时保持原值不变。
    pub fn take_object<T: Any>(&mut self, index: usize) -> Option<T> {
        let slot = self.values.get_mut(index)?;
        match slot {
            Argument::Object(obj) if obj.is::<T>() => {}
            _ => return None,
        }
        match std::mem::replace(slot, Argument::Taken) {
            Argument::Object(obj) => obj.downcast::<T>().ok().map(|b| *b),
            _ => None,
        }
    }

    /// 取走数组参数的所有权。类型不符时保持原值不变。
    pub fn take_array<T: Any>(&mut self, index: usize) -> Option<Vec<Option<T>>> {
        let slot = self.values.get_mut(index)?;
        match slot {
            Argument::Array(items) if items.iter().flatten().all(|obj| obj.is::<T>()) => {}
            _ => return None,
        }
        match std::mem::replace(slot, Argument::Taken) {
            Argument::Array(items) => Some(
                items
                    .into_iter()
                    .map(|item| item.and_then(|obj| obj.downcast::<T>().ok().map(|b| *b)))
                    .collect(),
            ),
            _ => None,
        }
    }
}

/// 绑定退化的处理策略。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BindPolicy {
    /// 退化只记录日志，以零值继续执行
    #[default]
    Lenient,
    /// 存在无法解析的值或非法数组下标时拒绝请求
    Strict,
}

/// 退化原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegradeReason {
    /// 请求中没有该值，或值为空白
    Missing,
    /// 值存在但无法转换为目标类型
    Unparsable(ScalarKind),
    /// 目标类型及其祖先都没有该字段
    UnknownAttribute,
    /// 数组下标无法解析、缺少 `].attr` 后缀或超出上限
    BadIndex,
}

impl fmt::Display for DegradeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DegradeReason::Missing => write!(f, "missing"),
            DegradeReason::Unparsable(kind) => write!(f, "not a valid {}", kind),
            DegradeReason::UnknownAttribute => write!(f, "unknown attribute"),
            DegradeReason::BadIndex => write!(f, "bad array index"),
        }
    }
}

/// 一条绑定退化记录。
#[derive(Debug, Clone, PartialEq)]
pub struct Degradation {
    /// 声明的参数名
    pub parameter: String,
    /// 触发退化的请求键
    pub key: String,
    /// 原始值（缺失时为 `None`）
    pub raw: Option<String>,
    pub reason: DegradeReason,
}

impl fmt::Display for Degradation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.raw {
            Some(raw) => write!(f, "{} = '{}': {}", self.key, raw, self.reason),
            None => write!(f, "{}: {}", self.key, self.reason),
        }
    }
}

/// 一次绑定的诊断报告。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BindReport {
    degradations: Vec<Degradation>,
}

impl BindReport {
    fn record(&mut self, id: u128, degradation: Degradation) {
        match degradation.reason {
            DegradeReason::Missing | DegradeReason::UnknownAttribute => {
                debug!("[ID{}]参数{}绑定退化：{}", id, degradation.parameter, degradation)
            }
            _ => warn!("[ID{}]参数{}绑定退化：{}", id, degradation.parameter, degradation),
        }
        self.degradations.push(degradation);
    }

    pub fn is_clean(&self) -> bool {
        self.degradations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.degradations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.degradations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Degradation> {
        self.degradations.iter()
    }

    /// 在给定策略下导致请求被拒绝的退化记录。
    pub fn rejected(&self, policy: BindPolicy) -> Vec<&Degradation> {
        match policy {
            BindPolicy::Lenient => Vec::new(),
            BindPolicy::Strict => self
                .degradations
                .iter()
                .filter(|d| {
                    matches!(
                        d.reason,
                        DegradeReason::Unparsable(_) | DegradeReason::BadIndex
                    )
                })
                .collect(),
        }
    }

    pub fn rejects(&self, policy: BindPolicy) -> bool {
        !self.rejected(policy).is_empty()
    }
}

/// 绑定结果：参数值 + 诊断报告。
#[derive(Debug, Default)]
pub struct Binding {
    pub args: BoundArguments,
    pub report: BindReport,
}

/// 绑定所需的请求侧数据。
#[derive(Debug, Clone, Copy)]
pub struct RequestData<'a> {
    pub path_params: &'a PathParams,
    pub params: &'a ParamSpace,
    /// 请求作用域的属性，标量查找的最后一级回退
    pub attributes: &'a Attributes,
    pub files: &'a [UploadedFile],
}

/// 按声明顺序为每个参数物化一个值。
pub fn bind(specs: &[ParamSpec], data: &RequestData<'_>, id: u128) -> Binding {
    let mut binding = Binding::default();
    for spec in specs {
        let value = match &spec.kind {
            ParamKind::Scalar(kind) => bind_scalar(spec, *kind, data, &mut binding.report, id),
            ParamKind::Object(schema) => {
                Argument::Object(bind_object(spec, schema, data, &mut binding.report, id))
            }
            ParamKind::Array(schema) => {
                Argument::Array(bind_array(spec, schema, data, &mut binding.report, id))
            }
            ParamKind::File => bind_file(spec, data, &mut binding.report, id),
        };
        binding.args.push(&spec.name, value);
    }
    debug!(
        "[ID{}]参数绑定完成，共{}个参数，{}条退化记录",
        id,
        binding.args.len(),
        binding.report.len()
    );
    binding
}

fn lookup_scalar(name: &str, data: &RequestData<'_>) -> Option<String> {
    if let Some(value) = data.path_params.get(name) {
        return Some(value.clone());
    }
    if let Some(value) = data.params.get(name) {
        return Some(value.to_string());
    }
    data.attributes.get(name).map(|value| match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}

fn bind_scalar(
    spec: &ParamSpec,
    kind: ScalarKind,
    data: &RequestData<'_>,
    report: &mut BindReport,
    id: u128,
) -> Argument {
    let raw = lookup_scalar(&spec.name, data);
    match kind.convert(raw.as_deref()) {
        Ok(value) => Argument::Scalar(value),
        Err(e) => {
            report.record(
                id,
                Degradation {
                    parameter: spec.name.clone(),
                    key: spec.name.clone(),
                    raw,
                    reason: conversion_reason(e, kind),
                },
            );
            Argument::Scalar(kind.zero())
        }
    }
}

fn conversion_reason(error: ConversionError, kind: ScalarKind) -> DegradeReason {
    match error {
        ConversionError::Missing => DegradeReason::Missing,
        ConversionError::Unparsable => DegradeReason::Unparsable(kind),
    }
}

/// 按 `{attr: value}` 填充一个实例。单个字段的失败不影响其他字段。
fn populate(
    parameter: &str,
    schema: &ObjectSchema,
    target: &mut (dyn Any + Send + 'static),
    fields: &[(String, String, String)],
    report: &mut BindReport,
    id: u128,
) {
    for (key, attr, raw) in fields {
        let kind = match schema.field_kind(attr) {
            Some(kind) => kind,
            None => {
                report.record(
                    id,
                    Degradation {
                        parameter: parameter.to_string(),
                        key: key.clone(),
                        raw: Some(raw.clone()),
                        reason: DegradeReason::UnknownAttribute,
                    },
                );
                continue;
            }
        };
        match kind.convert(Some(raw)) {
            Ok(value) => {
                schema.assign(target, attr, value);
            }
            Err(e) => report.record(
                id,
                Degradation {
                    parameter: parameter.to_string(),
                    key: key.clone(),
                    raw: Some(raw.clone()),
                    reason: conversion_reason(e, kind),
                },
            ),
        }
    }
}

fn bind_object(
    spec: &ParamSpec,
    schema: &ObjectSchema,
    data: &RequestData<'_>,
    report: &mut BindReport,
    id: u128,
) -> Box<dyn Any + Send> {
    let prefix = format!("{}.", spec.name);
    let mut fields: Vec<(String, String, String)> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    for (key, value) in data.params.iter() {
        let attr = match key.strip_prefix(&prefix) {
            Some(attr) if !attr.is_empty() => attr,
            _ => continue,
        };
        // 同一字段多次出现时以第一个值为准
        if !seen.insert(key) {
            continue;
        }
        fields.push((key.to_string(), attr.to_string(), value.to_string()));
    }

    let mut instance = schema.instantiate();
    populate(&spec.name, schema, instance.as_mut(), &fields, report, id);
    instance
}

/// 解析 `[i].attr` 后缀，返回下标与字段名。
fn parse_indexed(rest: &str) -> Option<(usize, &str)> {
    let close = rest.find(']')?;
    let index = rest[..close].parse::<usize>().ok()?;
    let attr = rest[close + 1..].strip_prefix('.')?;
    if attr.is_empty() {
        return None;
    }
    Some((index, attr))
}

fn bind_array(
    spec: &ParamSpec,
    schema: &ObjectSchema,
    data: &RequestData<'_>,
    report: &mut BindReport,
    id: u128,
) -> Vec<Option<Box<dyn Any + Send>>> {
    let prefix = format!("{}[", spec.name);
    let mut groups: BTreeMap<usize, Vec<(String, String, String)>> = BTreeMap::new();
    let mut seen: HashSet<&str> = HashSet::new();

    for (key, value) in data.params.iter() {
        let rest = match key.strip_prefix(&prefix) {
            Some(rest) => rest,
            None => continue,
        };
        match parse_indexed(rest) {
            Some((index, attr)) if index < MAX_ARRAY_LEN => {
                if !seen.insert(key) {
                    continue;
                }
                groups.entry(index).or_default().push((
                    key.to_string(),
                    attr.to_string(),
                    value.to_string(),
                ));
            }
            _ => report.record(
                id,
                Degradation {
                    parameter: spec.name.clone(),
                    key: key.to_string(),
                    raw: Some(value.to_string()),
                    reason: DegradeReason::BadIndex,
                },
            ),
        }
    }

    let len = match groups.keys().next_back() {
        Some(max) => max + 1,
        None => return Vec::new(),
    };
    let mut items: Vec<Option<Box<dyn Any + Send>>> = (0..len).map(|_| None).collect();
    for (index, fields) in groups {
        let mut instance = schema.instantiate();
        populate(&spec.name, schema, instance.as_mut(), &fields, report, id);
        items[index] = Some(instance);
    }
    debug!(
        "[ID{}]数组参数{}绑定完成，长度{}",
        id,
        spec.name,
        items.len()
    );
    items
}

fn bind_file(
    spec: &ParamSpec,
    data: &RequestData<'_>,
    report: &mut BindReport,
    id: u128,
) -> Argument {
    let file = data
        .files
        .iter()
        .find(|file| file.field_name == spec.name)
        .cloned();
    if file.is_none() {
        report.record(
            id,
            Degradation {
                parameter: spec.name.clone(),
                key: spec.name.clone(),
                raw: None,
                reason: DegradeReason::Missing,
            },
        );
    }
    Argument::File(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaBuilder;

    #[derive(Default, Debug, PartialEq)]
    struct Employee {
        name: String,
        salary: i32,
    }

    impl Bindable for Employee {
        fn schema() -> ObjectSchema {
            SchemaBuilder::<Employee>::new()
                .string("name", |e, v| e.name = v)
                .int("salary", |e, v| e.salary = v)
                .build()
        }
    }

    #[derive(Default, Debug)]
    struct Base {
        id: i64,
    }

    impl Bindable for Base {
        fn schema() -> ObjectSchema {
            SchemaBuilder::<Base>::new().long("id", |b, v| b.id = v).build()
        }
    }

    #[derive(Default, Debug)]
    struct Dept {
        base: Base,
        name: String,
    }

    impl Bindable for Dept {
        fn schema() -> ObjectSchema {
            SchemaBuilder::<Dept>::new()
                .string("name", |d, v| d.name = v)
                .extends(|d: &mut Dept| &mut d.base)
                .build()
        }
    }

    fn run(specs: &[ParamSpec], path: &PathParams, params: &ParamSpace) -> Binding {
        let attributes = Attributes::new();
        let data = RequestData {
            path_params: path,
            params,
            attributes: &attributes,
            files: &[],
        };
        bind(specs, &data, 0)
    }

    #[test]
    fn test_param_space_multi_values() {
        let space = ParamSpace::from_urlencoded("tag=a&tag=b&name=Ann%20Lee&x=1+2");
        assert_eq!(space.get("tag"), Some("a"));
        assert_eq!(space.get_all("tag"), vec!["a", "b"]);
        assert_eq!(space.get("name"), Some("Ann Lee"));
        assert_eq!(space.get("x"), Some("1 2"));
        assert_eq!(space.keys(), vec!["tag", "name", "x"]);
        assert_eq!(space.len(), 4);
    }

    #[test]
    fn test_array_of_objects() {
        let params: ParamSpace = vec![
            ("emp[0].name", "Ann"),
            ("emp[0].salary", "50000"),
            ("emp[1].name", "Bo"),
        ]
        .into_iter()
        .collect();
        let mut binding = run(&[ParamSpec::array::<Employee>("emp")], &PathParams::new(), &params);

        let emps = binding.args.take_array::<Employee>(0).unwrap();
        assert_eq!(emps.len(), 2);
        assert_eq!(
            emps[0],
            Some(Employee {
                name: "Ann".to_string(),
                salary: 50000
            })
        );
        assert_eq!(
            emps[1],
            Some(Employee {
                name: "Bo".to_string(),
                salary: 0
            })
        );
        assert!(binding.report.is_clean());
    }

    /// 重复出现的键以第一个值为准，大量参数下同样成立
    #[test]
    fn test_duplicate_keys_first_value_wins() {
        let rows = 5_000;
        let mut params = ParamSpace::new();
        for i in 0..rows {
            params.insert(format!("emp[{}].name", i), format!("user{}", i));
            params.insert(format!("emp[{}].salary", i), i.to_string());
        }
        params.insert("emp[0].name", "late");
        params.insert("emp[4999].salary", "-1");
        params.insert("dept.name", "Sales");
        params.insert("dept.name", "Ops");

        let mut binding = run(
            &[ParamSpec::array::<Employee>("emp"), ParamSpec::object::<Dept>("dept")],
            &PathParams::new(),
            &params,
        );

        let emps = binding.args.take_array::<Employee>(0).unwrap();
        assert_eq!(emps.len(), rows);
        assert_eq!(emps[0].as_ref().map(|e| e.name.as_str()), Some("user0"));
        assert_eq!(emps[4999].as_ref().map(|e| e.salary), Some(4999));
        let dept = binding.args.take_object::<Dept>(1).unwrap();
        assert_eq!(dept.name, "Sales");
        assert!(binding.report.is_clean());
    }

    #[test]
    fn test_array_gaps_are_not_backfilled() {
        let params: ParamSpace = vec![("emp[2].name", "Cy")].into_iter().collect();
        let binding = run(&[ParamSpec::array::<Employee>("emp")], &PathParams::new(), &params);

        let emps = binding.args.array::<Employee>(0).unwrap();
        assert_eq!(emps.len(), 3);
        assert!(emps[0].is_none());
        assert!(emps[1].is_none());
        assert_eq!(emps[2].map(|e| e.name.as_str()), Some("Cy"));
    }

    #[test]
    fn test_array_without_keys_is_empty() {
        let binding = run(
            &[ParamSpec::array::<Employee>("emp")],
            &PathParams::new(),
            &ParamSpace::new(),
        );
        assert_eq!(binding.args.array::<Employee>(0).unwrap().len(), 0);
    }

    #[test]
    fn test_bad_array_index() {
        let params: ParamSpace = vec![
            ("emp[x].name", "Ann"),
            ("emp[0]", "Bo"),
            ("emp[99999].name", "Cy"),
            ("emp[1].name", "Di"),
        ]
        .into_iter()
        .collect();
        let binding = run(&[ParamSpec::array::<Employee>("emp")], &PathParams::new(), &params);

        assert_eq!(binding.args.array::<Employee>(0).unwrap().len(), 2);
        let bad: Vec<&str> = binding
            .report
            .iter()
            .filter(|d| d.reason == DegradeReason::BadIndex)
            .map(|d| d.key.as_str())
            .collect();
        assert_eq!(bad, vec!["emp[x].name", "emp[0]", "emp[99999].name"]);
        assert!(binding.report.rejects(BindPolicy::Strict));
        assert!(!binding.report.rejects(BindPolicy::Lenient));
    }

    #[test]
    fn test_missing_int_is_zero() {
        let binding = run(&[ParamSpec::int("age")], &PathParams::new(), &ParamSpace::new());
        assert_eq!(binding.args.int(0), Some(0));

        let degradation = binding.report.iter().next().unwrap();
        assert_eq!(degradation.reason, DegradeReason::Missing);
        assert_eq!(degradation.raw, None);
        assert!(!binding.report.rejects(BindPolicy::Strict));
    }

    #[test]
    fn test_present_int_is_converted() {
        let params: ParamSpace = vec![("age", "42")].into_iter().collect();
        let binding = run(&[ParamSpec::int("age")], &PathParams::new(), &params);
        assert_eq!(binding.args.int(0), Some(42));
        assert!(binding.report.is_clean());
    }

    #[test]
    fn test_unparsable_int_degrades() {
        let params: ParamSpace = vec![("age", "forty")].into_iter().collect();
        let binding = run(&[ParamSpec::int("age")], &PathParams::new(), &params);
        assert_eq!(binding.args.int(0), Some(0));
        assert_eq!(
            binding.report.rejected(BindPolicy::Strict)[0].reason,
            DegradeReason::Unparsable(ScalarKind::Int)
        );
    }

    #[test]
    fn test_path_params_take_precedence() {
        let mut path = PathParams::new();
        path.insert("id".to_string(), "7".to_string());
        let params: ParamSpace = vec![("id", "8")].into_iter().collect();
        let binding = run(&[ParamSpec::long("id")], &path, &params);
        assert_eq!(binding.args.long(0), Some(7));
    }

    #[test]
    fn test_attribute_fallback() {
        let mut attributes = Attributes::new();
        attributes.insert("lang".to_string(), Value::from("zh"));
        attributes.insert("page".to_string(), Value::from(3));
        let data = RequestData {
            path_params: &PathParams::new(),
            params: &ParamSpace::new(),
            attributes: &attributes,
            files: &[],
        };
        let binding = bind(&[ParamSpec::string("lang"), ParamSpec::int("page")], &data, 0);
        assert_eq!(binding.args.str(0), Some("zh"));
        assert_eq!(binding.args.int(1), Some(3));
    }

    #[test]
    fn test_object_with_ancestor_fields() {
        let params: ParamSpace = vec![
            ("dept.name", "Sales"),
            ("dept.id", "12"),
            ("dept.budget", "1000"),
            ("other.name", "ignored"),
        ]
        .into_iter()
        .collect();
        let mut binding = run(&[ParamSpec::object::<Dept>("dept")], &PathParams::new(), &params);

        let dept = binding.args.take_object::<Dept>(0).unwrap();
        assert_eq!(dept.name, "Sales");
        assert_eq!(dept.base.id, 12);

        let unknown: Vec<&Degradation> = binding.report.iter().collect();
        assert_eq!(unknown.len(), 1);
        assert_eq!(unknown[0].key, "dept.budget");
        assert_eq!(unknown[0].reason, DegradeReason::UnknownAttribute);
        assert!(matches!(binding.args.get(0), Some(Argument::Taken)));
    }

    #[test]
    fn test_take_object_with_wrong_type_keeps_value() {
        let mut binding = run(
            &[ParamSpec::object::<Dept>("dept")],
            &PathParams::new(),
            &ParamSpace::new(),
        );
        assert!(binding.args.take_object::<Employee>(0).is_none());
        assert!(binding.args.object::<Dept>(0).is_some());
    }

    #[test]
    fn test_positional_alignment() {
        let params: ParamSpace = vec![("flag", "TRUE"), ("initial", "Zed")].into_iter().collect();
        let binding = run(
            &[
                ParamSpec::bool("flag"),
                ParamSpec::float("ratio"),
                ParamSpec::char("initial"),
            ],
            &PathParams::new(),
            &params,
        );
        assert_eq!(binding.args.len(), 3);
        assert_eq!(binding.args.bool(0), Some(true));
        assert_eq!(binding.args.float(1), Some(0.0));
        assert_eq!(binding.args.char(2), Some('Z'));
        assert_eq!(binding.args.index_of("initial"), Some(2));
    }

    #[test]
    fn test_file_parameter() {
        let files = vec![UploadedFile {
            field_name: "avatar".to_string(),
            file_name: "me.png".to_string(),
            content_type: "image/png".to_string(),
            content: vec![1, 2, 3],
        }];
        let attributes = Attributes::new();
        let data = RequestData {
            path_params: &PathParams::new(),
            params: &ParamSpace::new(),
            attributes: &attributes,
            files: &files,
        };
        let binding = bind(&[ParamSpec::file("avatar"), ParamSpec::file("cv")], &data, 0);
        assert_eq!(binding.args.file(0).map(|f| f.file_name.as_str()), Some("me.png"));
        assert!(binding.args.file(1).is_none());
        assert_eq!(binding.report.len(), 1);
    }
}
