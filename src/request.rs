// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 请求处理模块
//!
//! 将 TCP 流中读取的原始字节解析为强类型的 `Request` 结构体，并转换为分发器的
//! [`DispatchRequest`]。它涵盖了：
//! 1. 请求行（Request-Line）的解析（方法、路径、查询串、版本）。
//! 2. 常用 HTTP 标头（Headers）的提取。
//! 3. 请求体的解析：`application/x-www-form-urlencoded` 表单与 `multipart/form-data` 文件上传。
//! 4. 内容协商（Content Negotiation）相关的编码解析。

use crate::{
    binder::{ParamSpace, UploadedFile},
    dispatcher::DispatchRequest,
    exception::Exception,
    param::*,
};
use log::{debug, error};

const HEADER_END: &[u8] = b"\r\n\r\n";

/// 表示一个完整的 HTTP 请求。
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTP 请求方法（GET, POST 等）
    method: HttpRequestMethod,
    /// 请求的资源路径（不含查询字符串）
    path: String,
    /// 原始查询字符串（不含 `?`）
    query: Option<String>,
    /// HTTP 协议版本
    version: HttpVersion,
    /// 客户端标识字符串
    user_agent: String,
    /// 客户端支持的压缩编码列表（按解析顺序排列）
    accept_encoding: Vec<HttpEncoding>,
    /// 客户端接受的内容类型（MIME）
    accept: Option<String>,
    /// 请求体的内容类型
    content_type: Option<String>,
    /// 请求体长度
    content_length: usize,
    /// 请求体
    body: Vec<u8>,
}

impl Request {
    /// 从原始字节缓冲区尝试构建 `Request` 实例。
    ///
    /// # 逻辑步骤
    /// 1. 定位头部结束位置，验证头部是合法的 UTF-8 字符串。
    /// 2. 解析请求行：提取方法、路径、查询串和协议版本。
    /// 3. 迭代解析标头：识别 `User-Agent`, `Accept`, `Content-Type`, `Content-Length` 等字段。
    /// 4. 解析编码：专门处理 `Accept-Encoding` 以支持后续的压缩传输。
    /// 5. 截取请求体（不超过 `Content-Length`）。
    pub fn try_from(buffer: &[u8], id: u128) -> Result<Self, Exception> {
        let (head, body) = match find_subslice(buffer, HEADER_END) {
            Some(pos) => (&buffer[..pos], &buffer[pos + HEADER_END.len()..]),
            None => (buffer, &buffer[buffer.len()..]),
        };

        // 1. 头部必须是 UTF-8，请求体保持原始字节
        let request_string = match std::str::from_utf8(head) {
            Ok(string) => string.trim_end_matches('\0'),
            Err(_) => {
                error!("[ID{}]无法解析HTTP请求", id);
                return Err(Exception::RequestIsNotUtf8);
            }
        };

        let request_lines: Vec<&str> = request_string.split(CRLF).collect();

        // 2. 解析请求行 (e.g., "GET /index.html HTTP/1.1")
        let first_line_parts: Vec<&str> = request_lines[0].split(' ').collect();

        if first_line_parts.len() < 3 {
            error!("[ID{}]HTTP请求行格式不正确：{}", id, request_lines[0]);
            return Err(Exception::MalformedRequest(request_lines[0].to_string()));
        }

        // 解析方法名
        let method: HttpRequestMethod = first_line_parts[0].parse().map_err(|e| {
            error!("[ID{}]不支持的HTTP请求方法：{}", id, first_line_parts[0]);
            e
        })?;

        // 解析协议版本
        let version_str = first_line_parts[first_line_parts.len() - 1].to_uppercase();
        let version = match version_str.as_str() {
            "HTTP/1.1" => HttpVersion::V1_1,
            "HTTP/1.0" => HttpVersion::V1_0,
            _ => {
                error!("[ID{}]不支持的HTTP协议版本：{}", id, &version_str);
                return Err(Exception::UnsupportedHttpVersion);
            }
        };

        // 解析路径（考虑到路径中可能包含空格的情况，虽然不规范但通过 join 尝试恢复）
        let target = if first_line_parts.len() == 3 {
            first_line_parts[1].to_string()
        } else {
            first_line_parts[1..first_line_parts.len() - 1].join(" ")
        };
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path.to_string(), Some(query.to_string())),
            None => (target, None),
        };

        // 3. 迭代各行解析 Headers
        let mut user_agent = "".to_string();
        let mut accept_encoding = vec![];
        let mut accept = None;
        let mut content_type = None;
        let mut content_length = None;
        for line in request_lines.iter().skip(1) {
            let (name, value) = match line.split_once(':') {
                Some((name, value)) => (name.trim().to_lowercase(), value.trim()),
                None => continue,
            };
            match name.as_str() {
                "user-agent" => user_agent = value.to_string(),
                "accept" => accept = Some(value.to_string()),
                "content-type" => content_type = Some(value.to_string()),
                "content-length" => match value.parse::<usize>() {
                    Ok(len) => content_length = Some(len),
                    Err(_) => {
                        error!("[ID{}]Content-Length不合法：{}", id, value);
                        return Err(Exception::MalformedRequest(format!(
                            "invalid Content-Length: {}",
                            value
                        )));
                    }
                },
                // 4. 只要包含关键词即视为支持
                "accept-encoding" => {
                    if value.contains("gzip") {
                        accept_encoding.push(HttpEncoding::Gzip);
                    }
                    if value.contains("deflate") {
                        accept_encoding.push(HttpEncoding::Deflate);
                    }
                    if value.contains("br") {
                        accept_encoding.push(HttpEncoding::Br);
                    }
                }
                _ => {}
            }
        }

        // 5. 请求体
        let content_length = content_length.unwrap_or(body.len());
        let body = body[..content_length.min(body.len())].to_vec();
        debug!(
            "[ID{}]请求体长度: {} bytes (Content-Length: {})",
            id,
            body.len(),
            content_length
        );

        Ok(Self {
            method,
            path,
            query,
            version,
            user_agent,
            accept_encoding,
            accept,
            content_type,
            content_length,
            body,
        })
    }

    /// 查询串与表单请求体合并后的参数空间，查询串在前。
    pub fn params(&self) -> ParamSpace {
        let mut params = ParamSpace::new();
        if let Some(query) = &self.query {
            params.extend_urlencoded(query);
        }
        if self.is_form() {
            params.extend_urlencoded(&String::from_utf8_lossy(&self.body));
        } else if let Some(boundary) = self.multipart_boundary() {
            for part in parse_multipart(&self.body, &boundary) {
                if part.file_name.is_none() {
                    params.insert(part.name, String::from_utf8_lossy(&part.content).into_owned());
                }
            }
        }
        params
    }

    /// `multipart/form-data` 请求中上传的文件。
    pub fn files(&self) -> Vec<UploadedFile> {
        let boundary = match self.multipart_boundary() {
            Some(b) => b,
            None => return Vec::new(),
        };
        parse_multipart(&self.body, &boundary)
            .into_iter()
            .filter_map(|part| {
                let file_name = part.file_name?;
                Some(UploadedFile {
                    field_name: part.name,
                    file_name,
                    content_type: part
                        .content_type
                        .unwrap_or_else(|| "application/octet-stream".to_string()),
                    content: part.content,
                })
            })
            .collect()
    }

    /// 转换为分发器的请求：查询串与表单合并为参数空间，上传文件一并带上。
    pub fn to_dispatch_request(&self, id: u128) -> DispatchRequest {
        let mut request = DispatchRequest::new(self.method, self.path.clone())
            .with_id(id)
            .params(self.params());
        for file in self.files() {
            request = request.file(file);
        }
        request
    }

    fn is_form(&self) -> bool {
        self.content_type
            .as_deref()
            .map_or(false, |t| t.to_lowercase().starts_with(FORM_URLENCODED))
    }

    fn multipart_boundary(&self) -> Option<String> {
        let content_type = self.content_type.as_deref()?;
        if !content_type.to_lowercase().starts_with("multipart/form-data") {
            return None;
        }
        content_type.split(';').find_map(|piece| {
            piece
                .trim()
                .strip_prefix("boundary=")
                .map(|b| b.trim_matches('"').to_string())
        })
    }
}

// --- Getter 访问器实现 ---

impl Request {
    /// 获取 HTTP 协议版本
    pub fn version(&self) -> &HttpVersion {
        &self.version
    }

    /// 获取请求路径（不含查询参数）
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// 获取请求方法
    pub fn method(&self) -> HttpRequestMethod {
        self.method
    }

    /// 获取用户代理字符串
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// 获取客户端支持的压缩算法列表
    pub fn accept_encoding(&self) -> &[HttpEncoding] {
        &self.accept_encoding
    }

    /// 获取客户端接受的文件 MIME 类型
    pub fn accept(&self) -> Option<&str> {
        self.accept.as_deref()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// `Content-Length` 标头声明的长度，缺省时为已读取的请求体长度
    pub fn content_length(&self) -> usize {
        self.content_length
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

/// 判断缓冲区是否已包含完整的请求：头部结束且请求体达到 `Content-Length`。
pub fn is_complete(buffer: &[u8]) -> bool {
    let pos = match find_subslice(buffer, HEADER_END) {
        Some(pos) => pos,
        None => return false,
    };
    let head = String::from_utf8_lossy(&buffer[..pos]);
    let declared = head
        .split(CRLF)
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    buffer.len() - (pos + HEADER_END.len()) >= declared
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

struct Part {
    name: String,
    file_name: Option<String>,
    content_type: Option<String>,
    content: Vec<u8>,
}

fn parse_multipart(body: &[u8], boundary: &str) -> Vec<Part> {
    let delimiter = format!("--{}", boundary).into_bytes();
    let mut parts = Vec::new();
    let mut rest = match find_subslice(body, &delimiter) {
        Some(pos) => &body[pos + delimiter.len()..],
        None => return parts,
    };
    loop {
        // 结束分隔符为 `--boundary--`
        if rest.starts_with(b"--") {
            break;
        }
        let end = match find_subslice(rest, &delimiter) {
            Some(end) => end,
            None => break,
        };
        let chunk = &rest[..end];
        rest = &rest[end + delimiter.len()..];

        let chunk = chunk.strip_prefix(CRLF.as_bytes()).unwrap_or(chunk);
        let chunk = chunk.strip_suffix(CRLF.as_bytes()).unwrap_or(chunk);
        let header_end = match find_subslice(chunk, HEADER_END) {
            Some(pos) => pos,
            None => continue,
        };
        let headers = String::from_utf8_lossy(&chunk[..header_end]);
        let content = chunk[header_end + HEADER_END.len()..].to_vec();

        let mut name = None;
        let mut file_name = None;
        let mut content_type = None;
        for line in headers.split(CRLF) {
            let (header, value) = match line.split_once(':') {
                Some(pair) => pair,
                None => continue,
            };
            if header.trim().eq_ignore_ascii_case("content-disposition") {
                for piece in value.split(';').map(str::trim) {
                    if let Some(v) = piece.strip_prefix("name=") {
                        name = Some(v.trim_matches('"').to_string());
                    } else if let Some(v) = piece.strip_prefix("filename=") {
                        file_name = Some(v.trim_matches('"').to_string());
                    }
                }
            } else if header.trim().eq_ignore_ascii_case("content-type") {
                content_type = Some(value.trim().to_string());
            }
        }
        if let Some(name) = name {
            parts.push(Part {
                name,
                file_name,
                content_type,
                content,
            });
        }
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 验证常规 GET 请求的解析，包括 Path、Query 和 Headers
    #[test]
    fn test_parse_get_request() {
        let request_str = "GET /front/dept/7?sort=name HTTP/1.1\r\nHost: localhost:7878\r\nUser-Agent: Test-Browser\r\nAccept-Encoding: gzip, deflate, br\r\n\r\n";
        let buffer = request_str.as_bytes().to_vec();

        let request = Request::try_from(&buffer, 0).unwrap();

        assert_eq!(request.method(), HttpRequestMethod::Get);
        assert_eq!(request.path(), "/front/dept/7");
        assert_eq!(request.query(), Some("sort=name"));
        assert_eq!(request.user_agent(), "Test-Browser");
        assert!(request.accept_encoding().contains(&HttpEncoding::Gzip));
        assert!(request.accept_encoding().contains(&HttpEncoding::Deflate));
        assert!(request.accept_encoding().contains(&HttpEncoding::Br));
        assert_eq!(request.params().get("sort"), Some("name"));
    }

    /// 验证表单 POST 请求体与查询串合并
    #[test]
    fn test_parse_form_post() {
        let body = "emp%5B0%5D.name=Ann&emp[0].salary=50000&emp[1].name=Bo";
        let request_str = format!(
            "POST /front/emp/save?from=form HTTP/1.1\r\nContent-Type: application/x-www-form-urlencoded\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        );

        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();
        let params = request.params();

        assert_eq!(request.method(), HttpRequestMethod::Post);
        assert_eq!(params.keys()[0], "from");
        assert_eq!(params.get("emp[0].name"), Some("Ann"));
        assert_eq!(params.get("emp[0].salary"), Some("50000"));
        assert_eq!(params.get("emp[1].name"), Some("Bo"));
    }

    /// 请求体超过 Content-Length 的部分被截断
    #[test]
    fn test_body_truncated_to_content_length() {
        let request_str = "POST /a HTTP/1.1\r\nContent-Length: 3\r\n\r\nabcdef";
        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();
        assert_eq!(request.body(), b"abc");
    }

    /// 验证 multipart 表单：普通字段进入参数空间，文件进入上传列表
    #[test]
    fn test_parse_multipart() {
        let body = "--XyZ\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\nReport\r\n--XyZ\r\nContent-Disposition: form-data; name=\"doc\"; filename=\"r.txt\"\r\nContent-Type: text/plain\r\n\r\nline1\r\nline2\r\n--XyZ--\r\n";
        let request_str = format!(
            "POST /upload HTTP/1.1\r\nContent-Type: multipart/form-data; boundary=XyZ\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        );

        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();

        assert_eq!(request.params().get("title"), Some("Report"));
        let files = request.files();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].field_name, "doc");
        assert_eq!(files[0].file_name, "r.txt");
        assert_eq!(files[0].content_type, "text/plain");
        assert_eq!(files[0].content, b"line1\r\nline2");
    }

    #[test]
    fn test_to_dispatch_request() {
        let request_str = "DELETE /front/dept/3?force=true HTTP/1.1\r\n\r\n";
        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();
        let dispatch = request.to_dispatch_request(42);

        assert_eq!(dispatch.id(), 42);
        assert_eq!(dispatch.method(), HttpRequestMethod::Delete);
        assert_eq!(dispatch.path(), "/front/dept/3");
    }

    /// 确保不支持的 HTTP 方法（如 TRACE）会返回错误
    #[test]
    fn test_unsupported_method() {
        let request_str = "TRACE /resource HTTP/1.1\r\nHost: localhost:7878\r\n\r\n";

        let result = Request::try_from(request_str.as_bytes(), 0);

        match result {
            Err(Exception::UnSupportedRequestMethod) => {}
            other => panic!("Expected UnSupportedRequestMethod error, got {:?}", other),
        }
    }

    /// 确保不支持的版本（如 HTTP/2.0）被正确拒绝
    #[test]
    fn test_unsupported_http_version() {
        let request_str = "GET / HTTP/2.0\r\nHost: localhost:7878\r\n\r\n";

        let result = Request::try_from(request_str.as_bytes(), 0);

        match result {
            Err(Exception::UnsupportedHttpVersion) => {}
            other => panic!("Expected UnsupportedHttpVersion error, got {:?}", other),
        }
    }

    /// 验证 UTF-8 编码检查
    #[test]
    fn test_invalid_utf8() {
        let buffer = vec![0xFF, 0xFE, 0xFD];

        let result = Request::try_from(&buffer, 0);

        match result {
            Err(Exception::RequestIsNotUtf8) => {}
            other => panic!("Expected RequestIsNotUtf8 error, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_request_line() {
        let result = Request::try_from(b"GET\r\n\r\n", 0);
        assert!(matches!(result, Err(Exception::MalformedRequest(_))));
    }

    /// 验证 Header 字段名是否大小写不敏感
    #[test]
    fn test_case_insensitive_headers() {
        let request_str = "GET / HTTP/1.1\r\nhost: localhost:7878\r\nuser-agent: Test\r\naccept-encoding: gzip\r\n\r\n";

        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();

        assert_eq!(request.user_agent(), "Test");
        assert!(request.accept_encoding().contains(&HttpEncoding::Gzip));
        assert!(!request.accept_encoding().contains(&HttpEncoding::Br));
    }

    /// 验证请求方法的小写兼容性处理
    #[test]
    fn test_lowercase_method() {
        let request_str = "get / HTTP/1.1\r\nHost: localhost:7878\r\n\r\n";

        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();

        assert_eq!(request.method(), HttpRequestMethod::Get);
    }

    #[test]
    fn test_is_complete() {
        assert!(!is_complete(b"GET / HTTP/1.1\r\nHost: x"));
        assert!(is_complete(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n"));
        assert!(!is_complete(b"POST / HTTP/1.1\r\nContent-Length: 5\r\n\r\nab"));
        assert!(is_complete(b"POST / HTTP/1.1\r\nContent-Length: 5\r\n\r\nabcde"));
    }
}
