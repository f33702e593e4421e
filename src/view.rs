//! # 视图渲染模块
//!
//! 分发器只产出转发指令（视图标识 + 属性包），渲染交给实现了 [`ViewEngine`] 的引擎。
//! 默认实现 [`TemplateViewEngine`] 在 `view_root` 下查找模板文件并用 minijinja 渲染。

use std::fs;
use std::path::{Component, Path, PathBuf};

use log::debug;
use minijinja::Environment;

use crate::exception::Exception;
use crate::outcome::Attributes;

/// 视图引擎：把视图标识与属性包渲染为 HTML。
#[cfg_attr(test, mockall::automock)]
pub trait ViewEngine: Send + Sync {
    fn render(&self, view: &str, attributes: &Attributes) -> Result<String, Exception>;
}

pub struct TemplateViewEngine {
    base_dir: PathBuf,
}

impl TemplateViewEngine {
    pub fn new<P: Into<PathBuf>>(base: P) -> Self {
        Self {
            base_dir: base.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// 将视图标识映射到 `base_dir` 下的文件，拒绝 `..` 与绝对路径。
    fn map_path(&self, view: &str) -> Option<PathBuf> {
        let mut pb = self.base_dir.clone();
        for comp in Path::new(view.trim_start_matches('/')).components() {
            match comp {
                Component::Normal(s) => pb.push(s),
                Component::CurDir => {}
                _ => return None,
            }
        }
        Some(pb)
    }
}

impl ViewEngine for TemplateViewEngine {
    fn render(&self, view: &str, attributes: &Attributes) -> Result<String, Exception> {
        let path = self
            .map_path(view)
            .ok_or_else(|| Exception::ViewNotFound(view.to_string()))?;
        if !path.is_file() {
            return Err(Exception::ViewNotFound(view.to_string()));
        }
        debug!("渲染视图{}，模板文件{}", view, path.display());

        let source =
            fs::read_to_string(&path).map_err(|e| Exception::ViewRender(e.to_string()))?;
        let mut env = Environment::new();
        env.add_template("view", &source)
            .map_err(|e| Exception::ViewRender(e.to_string()))?;
        let template = env
            .get_template("view")
            .map_err(|e| Exception::ViewRender(e.to_string()))?;
        template
            .render(attributes)
            .map_err(|e| Exception::ViewRender(e.to_string()))
    }
}
