pub mod binder;
pub mod config;
pub mod dispatcher;
pub mod exception;
pub mod outcome;
pub mod param;
pub mod pattern;
pub mod request;
pub mod response;
pub mod route;
pub mod schema;
pub mod util;
pub mod view;

pub use binder::{BindPolicy, BindReport, BoundArguments, ParamSpace, ParamSpec, UploadedFile};
pub use config::Config;
pub use dispatcher::{DispatchRequest, Dispatcher, DispatcherOptions, Invocation, Reply};
pub use exception::Exception;
pub use outcome::{HandlerFault, ModelView, Outcome};
pub use param::{HttpEncoding, HttpRequestMethod, HttpVersion};
pub use pattern::{CompiledPattern, PathParams};
pub use request::Request;
pub use response::Response;
pub use route::{Registration, Route, RouteTable};
pub use schema::{Bindable, ObjectSchema, SchemaBuilder};
pub use util::HtmlBuilder;
pub use view::{TemplateViewEngine, ViewEngine};
