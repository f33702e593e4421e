// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 路径模板编译模块
//!
//! 将 `/dept/{id}/{name}` 形式的声明式路径模板编译为锚定首尾的正则匹配器，
//! 并按模板从左到右的顺序记录占位符名称。
//!
//! 编译规则：
//! - 字面量片段原样匹配（正则元字符会被转义）。
//! - 每个占位符匹配一个或多个非 `/` 字符。
//! - 必须整条路径匹配，不存在前缀匹配。

use std::collections::BTreeMap;
use std::fmt;

use regex::Regex;

use crate::exception::Exception;

/// 一次匹配得到的路径参数：占位符名称 → 未解码的原始字符串。
pub type PathParams = BTreeMap<String, String>;

/// 路径模板编译后的只读产物。
///
/// 不变量：捕获组数量等于占位符数量，且捕获组顺序与模板中占位符的出现顺序一致。
#[derive(Clone)]
pub struct CompiledPattern {
    template: String,
    matcher: Regex,
    placeholders: Vec<String>,
    literal_prefix: String,
}

impl CompiledPattern {
    pub fn compile(template: &str) -> Result<Self, Exception> {
        let invalid = |reason: &str| Exception::InvalidTemplate {
            template: template.to_string(),
            reason: reason.to_string(),
        };

        let mut pattern = String::with_capacity(template.len() + 8);
        pattern.push('^');
        let mut placeholders: Vec<String> = Vec::new();
        let mut literal_prefix: Option<String> = None;
        let mut literal = String::new();
        let mut chars = template.chars();

        while let Some(c) = chars.next() {
            match c {
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for n in chars.by_ref() {
                        match n {
                            '}' => {
                                closed = true;
                                break;
                            }
                            '{' => return Err(invalid("nested '{'")),
                            '/' => return Err(invalid("placeholder spans a '/'")),
                            _ => name.push(n),
                        }
                    }
                    if !closed {
                        return Err(invalid("unbalanced '{'"));
                    }
                    if name.trim().is_empty() {
                        return Err(invalid("empty placeholder name"));
                    }
                    if placeholders.contains(&name) {
                        return Err(Exception::DuplicatePlaceholder {
                            template: template.to_string(),
                            name,
                        });
                    }
                    if literal_prefix.is_none() {
                        literal_prefix = Some(literal.clone());
                    }
                    pattern.push_str(&regex::escape(&literal));
                    literal.clear();
                    pattern.push_str("([^/]+)");
                    placeholders.push(name);
                }
                '}' => return Err(invalid("unbalanced '}'")),
                _ => literal.push(c),
            }
        }

        pattern.push_str(&regex::escape(&literal));
        pattern.push('$');
        let literal_prefix = literal_prefix.unwrap_or_else(|| literal.clone());

        let matcher = Regex::new(&pattern).map_err(|e| invalid(&e.to_string()))?;

        Ok(Self {
            template: template.to_string(),
            matcher,
            placeholders,
            literal_prefix,
        })
    }

    /// 判断路径是否完整匹配该模板。
    pub fn is_match(&self, path: &str) -> bool {
        path.starts_with(&self.literal_prefix) && self.matcher.is_match(path)
    }

    /// 对具体路径应用该模板，成功时返回按占位符名称索引的路径参数。
    pub fn match_path(&self, path: &str) -> Option<PathParams> {
        if !path.starts_with(&self.literal_prefix) {
            return None;
        }
        let captures = self.matcher.captures(path)?;
        let mut params = PathParams::new();
        for (index, name) in self.placeholders.iter().enumerate() {
            if let Some(value) = captures.get(index + 1) {
                params.insert(name.clone(), value.as_str().to_string());
            }
        }
        Some(params)
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// 占位符名称，按模板从左到右的顺序。
    pub fn placeholders(&self) -> &[String] {
        &self.placeholders
    }

    /// 第一个占位符之前的字面量部分，用于在正则匹配前快速排除。
    pub fn literal_prefix(&self) -> &str {
        &self.literal_prefix
    }
}

impl fmt::Debug for CompiledPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledPattern")
            .field("template", &self.template)
            .field("matcher", &self.matcher.as_str())
            .field("placeholders", &self.placeholders)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_path() {
        let pattern = CompiledPattern::compile("/").unwrap();
        assert!(pattern.is_match("/"));
        assert!(!pattern.is_match("/a"));
        assert!(pattern.placeholders().is_empty());
    }

    #[test]
    fn test_two_placeholders_in_order() {
        let pattern = CompiledPattern::compile("/dept/{id}/{name}").unwrap();
        assert_eq!(pattern.placeholders(), ["id", "name"]);

        let params = pattern.match_path("/dept/7/sales").unwrap();
        assert_eq!(params.get("id").map(String::as_str), Some("7"));
        assert_eq!(params.get("name").map(String::as_str), Some("sales"));
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_full_match_only() {
        let pattern = CompiledPattern::compile("/dept/{id}").unwrap();
        assert!(!pattern.is_match("/dept/7/extra"));
        assert!(!pattern.is_match("/prefix/dept/7"));
        assert!(!pattern.is_match("/dept/"));
        assert!(pattern.is_match("/dept/7"));
    }

    #[test]
    fn test_placeholder_does_not_cross_separator() {
        let pattern = CompiledPattern::compile("/files/{name}").unwrap();
        assert!(pattern.match_path("/files/a/b").is_none());
    }

    #[test]
    fn test_literals_are_escaped() {
        let pattern = CompiledPattern::compile("/report.v1/{id}").unwrap();
        assert!(pattern.is_match("/report.v1/3"));
        assert!(!pattern.is_match("/reportXv1/3"));
    }

    #[test]
    fn test_placeholder_inside_segment() {
        let pattern = CompiledPattern::compile("/img/{name}.{ext}").unwrap();
        let params = pattern.match_path("/img/logo.png").unwrap();
        assert_eq!(params["name"], "logo");
        assert_eq!(params["ext"], "png");
    }

    #[test]
    fn test_literal_prefix() {
        let pattern = CompiledPattern::compile("/user/{id}/edit").unwrap();
        assert_eq!(pattern.literal_prefix(), "/user/");
        let pattern = CompiledPattern::compile("/about").unwrap();
        assert_eq!(pattern.literal_prefix(), "/about");
    }

    #[test]
    fn test_unbalanced_braces() {
        for template in ["/dept/{id", "/dept/id}", "/dept/{a{b}}", "/{}", "/{a/b}"] {
            let result = CompiledPattern::compile(template);
            assert!(
                matches!(result, Err(Exception::InvalidTemplate { .. })),
                "{} should be rejected",
                template
            );
        }
    }

    #[test]
    fn test_duplicate_placeholder() {
        let result = CompiledPattern::compile("/a/{id}/b/{id}");
        assert_eq!(
            result.err(),
            Some(Exception::DuplicatePlaceholder {
                template: "/a/{id}/b/{id}".to_string(),
                name: "id".to_string(),
            })
        );
    }
}
