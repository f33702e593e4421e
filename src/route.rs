// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 路由表模块
//!
//! 路由表是一组按注册顺序排列的已编译路由。查找时按注册顺序扫描，
//! 返回第一个方法完全一致且模板完整匹配路径的路由（先匹配者胜出）。
//! 因此 `/user/new` 这样更具体的模板必须先于 `/user/{id}` 注册。
//!
//! 路由表在启动阶段填充，交给 [`crate::dispatcher::Dispatcher`] 后封存，此后只读。

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use log::{debug, info};

use crate::binder::ParamSpec;
use crate::dispatcher::Invocation;
use crate::exception::Exception;
use crate::outcome::{HandlerFault, Outcome};
use crate::param::HttpRequestMethod;
use crate::pattern::{CompiledPattern, PathParams};
use crate::schema::short_type_name;

/// 处理函数。`Fn + Sync` 保证处理函数本身不持有可变状态。
pub type Handler = Arc<dyn Fn(&mut Invocation) -> Result<Outcome, HandlerFault> + Send + Sync>;

/// 启动阶段交给路由表的注册记录：方法、模板、目标类型、操作名、参数声明。
#[derive(Clone)]
pub struct Registration {
    method: HttpRequestMethod,
    template: String,
    target: String,
    operation: String,
    params: Vec<ParamSpec>,
    api: bool,
    handler: Handler,
}

impl Registration {
    pub fn new<F>(
        method: HttpRequestMethod,
        template: impl Into<String>,
        operation: impl Into<String>,
        handler: F,
    ) -> Self
    where
        F: Fn(&mut Invocation) -> Result<Outcome, HandlerFault> + Send + Sync + 'static,
    {
        Self {
            method,
            template: template.into(),
            target: String::new(),
            operation: operation.into(),
            params: Vec::new(),
            api: false,
            handler: Arc::new(handler),
        }
    }

    /// 注册控制器类型 `C` 上的一个操作。每个请求都会通过 `C::default()` 创建新的实例。
    pub fn controller<C, F>(
        method: HttpRequestMethod,
        template: impl Into<String>,
        operation: impl Into<String>,
        handler: F,
    ) -> Self
    where
        C: Default + 'static,
        F: Fn(&mut C, &mut Invocation) -> Result<Outcome, HandlerFault> + Send + Sync + 'static,
    {
        let mut registration = Self::new(method, template, operation, move |invocation| {
            let mut controller = C::default();
            handler(&mut controller, invocation)
        });
        registration.target = short_type_name::<C>();
        registration
    }

    /// 追加一个参数声明，顺序即处理函数的参数顺序。
    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    /// 标记为 API 处理函数：结果总是编码为 JSON 信封。
    pub fn api(mut self) -> Self {
        self.api = true;
        self
    }

    pub fn method(&self) -> HttpRequestMethod {
        self.method
    }

    pub fn template(&self) -> &str {
        &self.template
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("method", &self.method)
            .field("template", &self.template)
            .field("target", &self.target)
            .field("operation", &self.operation)
            .field("params", &self.params)
            .field("api", &self.api)
            .finish()
    }
}

/// 一条已编译的路由。注册后不可变。
pub struct Route {
    method: HttpRequestMethod,
    pattern: CompiledPattern,
    target: String,
    operation: String,
    params: Vec<ParamSpec>,
    api: bool,
    handler: Handler,
}

impl Route {
    pub fn method(&self) -> HttpRequestMethod {
        self.method
    }

    pub fn template(&self) -> &str {
        self.pattern.template()
    }

    pub fn pattern(&self) -> &CompiledPattern {
        &self.pattern
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    pub fn is_api(&self) -> bool {
        self.api
    }

    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    /// `[GET] /dept/{id}` 形式的签名
    pub fn signature(&self) -> String {
        format!("[{}] {}", self.method, self.pattern.template())
    }

    /// `Dept::show` 形式的处理函数名
    pub fn handler_name(&self) -> String {
        if self.target.is_empty() {
            self.operation.clone()
        } else {
            format!("{}::{}", self.target, self.operation)
        }
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("pattern", &self.pattern)
            .field("handler", &self.handler_name())
            .field("api", &self.api)
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
    // 方法 → 路由下标，保持注册顺序
    by_method: HashMap<HttpRequestMethod, Vec<usize>>,
    sealed: bool,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按顺序注册一组记录，任一模板非法则整体失败。
    pub fn from_registrations<I>(registrations: I) -> Result<Self, Exception>
    where
        I: IntoIterator<Item = Registration>,
    {
        let mut table = Self::new();
        for registration in registrations {
            table.register(registration)?;
        }
        info!("路由表构建完成，共{}条路由", table.len());
        Ok(table)
    }

    /// 编译模板并追加路由。注册顺序决定查找优先级。
    pub fn register(&mut self, registration: Registration) -> Result<(), Exception> {
        if self.sealed {
            return Err(Exception::RouteTableSealed {
                method: registration.method.to_string(),
                template: registration.template,
            });
        }
        let pattern = CompiledPattern::compile(&normalize_template(&registration.template))?;
        let route = Route {
            method: registration.method,
            pattern,
            target: registration.target,
            operation: registration.operation,
            params: registration.params,
            api: registration.api,
            handler: registration.handler,
        };
        info!(
            "注册路由 {} -> {}{}",
            route.signature(),
            route.handler_name(),
            if route.api { " (api)" } else { "" }
        );
        self.by_method
            .entry(route.method)
            .or_default()
            .push(self.routes.len());
        self.routes.push(route);
        Ok(())
    }

    /// 与 [`RouteTable::register`] 相同，便于链式书写。
    pub fn add(mut self, registration: Registration) -> Result<Self, Exception> {
        self.register(registration)?;
        Ok(self)
    }

    /// 封存路由表，此后的注册都会失败。
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// 返回第一个方法一致且完整匹配路径的路由及其路径参数。
    pub fn resolve(
        &self,
        method: HttpRequestMethod,
        path: &str,
    ) -> Result<(&Route, PathParams), Exception> {
        if let Some(indices) = self.by_method.get(&method) {
            for &index in indices {
                let route = &self.routes[index];
                if let Some(params) = route.pattern.match_path(path) {
                    debug!("路由命中：[{}] {} -> {}", method, path, route.signature());
                    return Ok((route, params));
                }
            }
        }
        Err(Exception::NotFound {
            method: method.to_string(),
            path: path.to_string(),
            available: self.signatures(),
        })
    }

    /// 全部已注册路由的签名，按注册顺序。
    pub fn signatures(&self) -> Vec<String> {
        self.routes.iter().map(Route::signature).collect()
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// 保证模板以单个 `/` 开头。
fn normalize_template(template: &str) -> String {
    format!("/{}", template.trim_start_matches('/'))
}
