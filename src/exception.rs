// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Exception 模块
//!
//! 该模块定义了分发引擎在启动注册与请求处理生命周期中可能出现的各类异常情况。
//!
//! ## 设计意图
//! - **错误分类**：涵盖路由模板编译错误、路由未命中、处理函数故障以及宿主服务器的协议解析错误。
//! - **语义映射**：每个变体都对应特定的处理阶段，便于分发器将其转化为对应的 HTTP 状态码。
//! - **参数绑定降级**不在此列：它被记录在 [`crate::binder::BindReport`] 中，从不向外传播。
//!   只有严格绑定策略下的拒绝才会以 [`Exception::BindRejected`] 的形式出现。

use thiserror::Error;

/// 分发引擎及宿主服务器抛出的异常类型。
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Exception {
    /// 路由模板格式非法（例如 `{` 与 `}` 不成对）。启动期致命错误，路由无法注册。
    #[error("Invalid route template '{template}': {reason}")]
    InvalidTemplate { template: String, reason: String },

    /// 同一模板中出现了重名的占位符。
    #[error("Duplicate placeholder '{name}' in route template '{template}'")]
    DuplicatePlaceholder { template: String, name: String },

    /// 没有任何路由匹配请求的方法与路径。携带已注册路由签名以便排查。
    #[error("No route for [{method}] {path}")]
    NotFound {
        method: String,
        path: String,
        available: Vec<String>,
    },

    /// 处理函数自身执行失败。
    #[error("Handler fault: {message}")]
    HandlerFault { message: String, detail: String },

    /// 严格绑定策略下，存在无法解析的参数值或非法数组下标。
    #[error("Rejected request parameters: {}", .0.join(", "))]
    BindRejected(Vec<String>),

    /// 逃逸出分发流水线的其他故障（例如处理函数 panic），说明框架层面存在缺陷。
    #[error("Unexpected fault: {0}")]
    UnexpectedFault(String),

    /// 路由表封存后仍尝试注册。
    #[error("Route table is sealed, cannot register [{method}] {template}")]
    RouteTableSealed { method: String, template: String },

    /// 视图文件不存在或路径越界。
    #[error("View not found: {0}")]
    ViewNotFound(String),

    /// 视图模板渲染失败。
    #[error("View render failed: {0}")]
    ViewRender(String),

    /// 配置文件无法读取或解析。
    #[error("Configuration error: {0}")]
    Config(String),

    /// 客户端发送的请求字节流无法解析为合法的 UTF-8 字符串。
    #[error("Request bytes can't be parsed in UTF-8")]
    RequestIsNotUtf8,

    /// 客户端使用了服务器不支持的 HTTP 方法。
    #[error("Unsupported request method")]
    UnSupportedRequestMethod,

    /// 客户端使用了服务器不支持的 HTTP 协议版本。
    #[error("Unsupported HTTP version")]
    UnsupportedHttpVersion,

    /// 请求行或请求头格式不完整。
    #[error("Malformed request: {0}")]
    MalformedRequest(String),
}

impl Exception {
    /// 该异常对应的 HTTP 状态码。
    pub fn status_code(&self) -> u16 {
        match self {
            Exception::NotFound { .. } => 404,
            Exception::RequestIsNotUtf8
            | Exception::UnsupportedHttpVersion
            | Exception::MalformedRequest(_)
            | Exception::BindRejected(_) => 400,
            Exception::UnSupportedRequestMethod => 405,
            _ => 500,
        }
    }
}
