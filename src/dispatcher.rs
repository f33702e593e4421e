// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 分发器模块
//!
//! 每个请求都走一遍同一个状态机：
//!
//! ```text
//! ROUTE_LOOKUP → BIND → INVOKE → ENCODE → DONE
//!        \         \       \        \
//!         +---------+-------+--------+--→ ERROR_RESPONSE → DONE
//! ```
//!
//! 状态只存在于单次 [`Dispatcher::dispatch`] 调用中，不跨请求共享。
//! 无论处理函数返回什么、是否 panic，每个请求都恰好产生一个 [`Reply`]。

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use log::{debug, error, info, warn};
use serde::Serialize;
use serde_json::{json, Value};

use crate::binder::{
    self, BindPolicy, BindReport, Binding, BoundArguments, ParamSpace, RequestData, UploadedFile,
};
use crate::config::Config;
use crate::exception::Exception;
use crate::outcome::{envelope_error, envelope_success, Attributes, Outcome};
use crate::param::HttpRequestMethod;
use crate::pattern::PathParams;
use crate::route::{Route, RouteTable};
use crate::util::HtmlBuilder;

/// API 处理函数返回空结果时的提示信息
pub const RESOURCE_NOT_FOUND: &str = "Resource not found";

/// 分发器的运行参数，通常由 [`Config`] 转换而来。
#[derive(Debug, Clone, PartialEq)]
pub struct DispatcherOptions {
    /// 路径规范化时剥离的挂载前缀，例如 `/front`
    pub mount_prefix: String,
    /// 视图标识缺少后缀时补全的文件约定，例如 `.html`
    pub view_suffix: String,
    pub bind_policy: BindPolicy,
}

impl Default for DispatcherOptions {
    fn default() -> Self {
        Self {
            mount_prefix: String::new(),
            view_suffix: ".html".to_string(),
            bind_policy: BindPolicy::Lenient,
        }
    }
}

impl From<&Config> for DispatcherOptions {
    fn from(config: &Config) -> Self {
        Self {
            mount_prefix: config.mount_prefix().to_string(),
            view_suffix: config.view_suffix().to_string(),
            bind_policy: config.bind_policy(),
        }
    }
}

/// 交给分发器的请求：方法、路径、请求参数、请求作用域属性与上传文件。
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    id: u128,
    method: HttpRequestMethod,
    path: String,
    params: ParamSpace,
    attributes: Attributes,
    files: Vec<UploadedFile>,
}

impl DispatchRequest {
    pub fn new(method: HttpRequestMethod, path: impl Into<String>) -> Self {
        Self {
            id: 0,
            method,
            path: path.into(),
            params: ParamSpace::new(),
            attributes: Attributes::new(),
            files: Vec::new(),
        }
    }

    /// 用于日志追踪的请求编号
    pub fn with_id(mut self, id: u128) -> Self {
        self.id = id;
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key, value);
        self
    }

    pub fn params(mut self, params: ParamSpace) -> Self {
        self.params = params;
        self
    }

    pub fn attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn file(mut self, file: UploadedFile) -> Self {
        self.files.push(file);
        self
    }

    pub fn id(&self) -> u128 {
        self.id
    }

    pub fn method(&self) -> HttpRequestMethod {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// 处理函数在 INVOKE 阶段看到的上下文。
#[derive(Debug)]
pub struct Invocation {
    id: u128,
    method: HttpRequestMethod,
    path: String,
    args: BoundArguments,
    report: BindReport,
    attributes: Attributes,
}

impl Invocation {
    pub fn id(&self) -> u128 {
        self.id
    }

    pub fn method(&self) -> HttpRequestMethod {
        self.method
    }

    /// 规范化后的路径（已剥离挂载前缀）
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn args(&self) -> &BoundArguments {
        &self.args
    }

    pub fn args_mut(&mut self) -> &mut BoundArguments {
        &mut self.args
    }

    pub fn bind_report(&self) -> &BindReport {
        &self.report
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// 设置请求作用域属性，视图转发时会一并交给视图引擎。
    pub fn set_attribute<T: Serialize>(&mut self, name: impl Into<String>, value: T) {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.attributes.insert(name.into(), value);
    }
}

/// 分发结果。
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Html { status: u16, body: String },
    Json { status: u16, body: Value },
    /// 转发给视图引擎渲染，复用当前请求的属性
    Forward { view: String, attributes: Attributes },
}

impl Reply {
    pub fn status(&self) -> u16 {
        match self {
            Reply::Html { status, .. } | Reply::Json { status, .. } => *status,
            Reply::Forward { .. } => 200,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == 404
    }
}

enum Stage<'r> {
    RouteLookup,
    Bind {
        route: &'r Route,
        path_params: PathParams,
    },
    Invoke {
        route: &'r Route,
        binding: Binding,
    },
    Encode {
        route: &'r Route,
        outcome: Outcome,
    },
    ErrorResponse {
        route: Option<&'r Route>,
        error: Exception,
    },
    Done(Reply),
}

impl Stage<'_> {
    fn name(&self) -> &'static str {
        match self {
            Stage::RouteLookup => "ROUTE_LOOKUP",
            Stage::Bind { .. } => "BIND",
            Stage::Invoke { .. } => "INVOKE",
            Stage::Encode { .. } => "ENCODE",
            Stage::ErrorResponse { .. } => "ERROR_RESPONSE",
            Stage::Done(_) => "DONE",
        }
    }
}

/// 请求分发器。持有封存后的路由表，可在多个线程间共享。
#[derive(Debug)]
pub struct Dispatcher {
    table: RouteTable,
    options: DispatcherOptions,
}

impl Dispatcher {
    pub fn new(mut table: RouteTable, options: DispatcherOptions) -> Self {
        table.seal();
        info!(
            "分发器就绪：{}条路由，挂载前缀'{}'，绑定策略{:?}",
            table.len(),
            options.mount_prefix,
            options.bind_policy
        );
        Self { table, options }
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    pub fn options(&self) -> &DispatcherOptions {
        &self.options
    }

    /// 剥离查询串与挂载前缀，并保证路径以单个 `/` 开头。
    pub fn normalize_path(&self, path: &str) -> String {
        let path = path.split('?').next().unwrap_or("");
        let prefix = self.options.mount_prefix.trim_end_matches('/');
        let path = match path.strip_prefix(prefix) {
            Some(rest) if !prefix.is_empty() && (rest.is_empty() || rest.starts_with('/')) => rest,
            _ => path,
        };
        format!("/{}", path.trim_start_matches('/'))
    }

    /// 处理一个请求，总是返回恰好一个响应。
    pub fn dispatch(&self, request: DispatchRequest) -> Reply {
        let start = Instant::now();
        let DispatchRequest {
            id,
            method,
            path: raw_path,
            params,
            mut attributes,
            files,
        } = request;
        let path = self.normalize_path(&raw_path);
        debug!("[ID{}]开始分发：[{}] {} -> {}", id, method, raw_path, path);

        let mut stage = Stage::RouteLookup;
        let reply = loop {
            debug!("[ID{}]进入{}阶段", id, stage.name());
            stage = match stage {
                Stage::RouteLookup => match self.table.resolve(method, &path) {
                    Ok((route, path_params)) => Stage::Bind { route, path_params },
                    Err(Exception::NotFound { available, .. }) => Stage::ErrorResponse {
                        route: None,
                        error: Exception::NotFound {
                            method: method.to_string(),
                            path: raw_path.clone(),
                            available,
                        },
                    },
                    Err(error) => Stage::ErrorResponse { route: None, error },
                },
                Stage::Bind { route, path_params } => {
                    for (name, value) in &path_params {
                        attributes.insert(name.clone(), Value::String(value.clone()));
                    }
                    let data = RequestData {
                        path_params: &path_params,
                        params: &params,
                        attributes: &attributes,
                        files: &files,
                    };
                    let binding = binder::bind(route.params(), &data, id);
                    let rejected: Vec<String> = binding
                        .report
                        .rejected(self.options.bind_policy)
                        .iter()
                        .map(|d| d.to_string())
                        .collect();
                    if rejected.is_empty() {
                        Stage::Invoke { route, binding }
                    } else {
                        Stage::ErrorResponse {
                            route: Some(route),
                            error: Exception::BindRejected(rejected),
                        }
                    }
                }
                Stage::Invoke { route, binding } => {
                    let mut invocation = Invocation {
                        id,
                        method,
                        path: path.clone(),
                        args: binding.args,
                        report: binding.report,
                        attributes: std::mem::take(&mut attributes),
                    };
                    let handler = route.handler();
                    let result = panic::catch_unwind(AssertUnwindSafe(|| handler(&mut invocation)));
                    attributes = invocation.attributes;
                    match result {
                        Ok(Ok(outcome)) => Stage::Encode { route, outcome },
                        Ok(Err(fault)) => Stage::ErrorResponse {
                            route: Some(route),
                            error: Exception::HandlerFault {
                                message: fault.message().to_string(),
                                detail: fault.detail().to_string(),
                            },
                        },
                        Err(payload) => Stage::ErrorResponse {
                            route: Some(route),
                            error: Exception::UnexpectedFault(panic_message(payload.as_ref())),
                        },
                    }
                }
                Stage::Encode { route, outcome } => {
                    Stage::Done(self.encode(route, outcome, &mut attributes, id))
                }
                Stage::ErrorResponse { route, error } => {
                    Stage::Done(self.error_reply(route, error, id))
                }
                Stage::Done(reply) => break reply,
            };
        };

        info!(
            "[ID{}] [{}] {} -> {} ({}ms)",
            id,
            method,
            raw_path,
            reply.status(),
            start.elapsed().as_millis()
        );
        reply
    }

    fn encode(
        &self,
        route: &Route,
        outcome: Outcome,
        attributes: &mut Attributes,
        id: u128,
    ) -> Reply {
        if route.is_api() {
            debug!("[ID{}]API处理函数，编码为JSON信封", id);
            if outcome.is_empty() {
                return Reply::Json {
                    status: 404,
                    body: envelope_error(404, RESOURCE_NOT_FOUND),
                };
            }
            let data = match outcome {
                Outcome::Text(text) => Value::String(text),
                Outcome::View(mv) => {
                    let (view, attributes) = mv.into_parts();
                    json!({ "view": view, "attributes": attributes })
                }
                Outcome::Data { value, .. } => value,
                Outcome::Empty => Value::Null,
            };
            return Reply::Json {
                status: 200,
                body: envelope_success(data),
            };
        }

        match outcome {
            Outcome::Text(text) => Reply::Html {
                status: 200,
                body: HtmlBuilder::from_text(&text).build(),
            },
            Outcome::View(mv) => {
                let (view, staged) = mv.into_parts();
                attributes.extend(staged);
                let view = self.view_id(&view);
                debug!("[ID{}]转发至视图{}", id, view);
                Reply::Forward {
                    view,
                    attributes: attributes.clone(),
                }
            }
            other => Reply::Html {
                status: 200,
                body: HtmlBuilder::acknowledge(other.type_name()).build(),
            },
        }
    }

    /// 视图标识补全前导 `/` 与文件后缀。
    fn view_id(&self, view: &str) -> String {
        let mut id = format!("/{}", view.trim_start_matches('/'));
        if !self.options.view_suffix.is_empty() && !id.ends_with(&self.options.view_suffix) {
            id.push_str(&self.options.view_suffix);
        }
        id
    }

    fn error_reply(&self, route: Option<&Route>, error: Exception, id: u128) -> Reply {
        let api = route.map_or(false, Route::is_api);
        let status = error.status_code();
        match &error {
            Exception::NotFound {
                method,
                path,
                available,
            } => {
                warn!("[ID{}]没有匹配的路由：[{}] {}", id, method, path);
                return Reply::Html {
                    status,
                    body: HtmlBuilder::not_found(method, path, available).build(),
                };
            }
            Exception::HandlerFault { message, detail } => {
                error!(
                    "[ID{}]处理函数{}执行失败：{} {}",
                    id,
                    route.map(Route::handler_name).unwrap_or_default(),
                    message,
                    detail
                );
            }
            Exception::UnexpectedFault(detail) => {
                error!(
                    "[ID{}]分发流水线出现意外故障，处理函数{}：{}",
                    id,
                    route.map(Route::handler_name).unwrap_or_default(),
                    detail
                );
            }
            Exception::BindRejected(fields) => {
                warn!("[ID{}]严格绑定策略拒绝了请求：{}", id, fields.join(", "));
            }
            other => error!("[ID{}]{}", id, other),
        }

        let (message, detail) = match error {
            Exception::HandlerFault { message, detail } => (message, detail),
            other => (other.to_string(), String::new()),
        };
        if api {
            Reply::Json {
                status,
                body: envelope_error(status, &message),
            }
        } else {
            Reply::Html {
                status,
                body: HtmlBuilder::fault(status, &message, &detail).build(),
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("handler panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("handler panicked: {}", s)
    } else {
        "handler panicked".to_string()
    }
}
