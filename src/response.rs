use crate::{
    dispatcher::Reply,
    param::*,
    request::Request,
    util::HtmlBuilder,
    view::ViewEngine,
};

use brotli::enc::{self, backward_references::BrotliEncoderParams};
use bytes::Bytes;
use chrono::prelude::*;
use flate2::{
    write::{DeflateEncoder, GzEncoder},
    Compression,
};
use log::{debug, error};

use std::io::{self, Write};

#[derive(Debug, Clone)]
pub struct Response {
    version: HttpVersion,
    status_code: u16,
    information: String,
    content_type: Option<String>,
    content_length: u64,
    date: DateTime<Utc>,
    content_encoding: Option<HttpEncoding>,
    server_name: String,
    allow: Option<Vec<HttpRequestMethod>>,
    content: Option<Bytes>,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    pub fn new() -> Self {
        Self {
            version: HttpVersion::V1_1,
            status_code: 200,
            information: "OK".to_string(),
            content_type: None,
            content_length: 0,
            date: Utc::now(),
            content_encoding: None,
            server_name: SERVER_NAME.to_string(),
            allow: None,
            content: None,
        }
    }

    /// 将分发结果编码为 HTTP 响应。转发结果交给视图引擎渲染。
    pub fn from_reply(
        reply: &Reply,
        request: &Request,
        views: &dyn ViewEngine,
        id: u128,
    ) -> Self {
        let accept_encoding = request.accept_encoding();
        match reply {
            Reply::Html { status, body } => {
                Self::from_body(*status, TEXT_HTML, body.as_bytes(), accept_encoding, id)
            }
            Reply::Json { status, body } => {
                let json = body.to_string();
                Self::from_body(*status, APPLICATION_JSON, json.as_bytes(), accept_encoding, id)
            }
            Reply::Forward { view, attributes } => match views.render(view, attributes) {
                Ok(html) => {
                    debug!("[ID{}]视图{}渲染完成", id, view);
                    Self::from_body(200, TEXT_HTML, html.as_bytes(), accept_encoding, id)
                }
                Err(e) => {
                    error!("[ID{}]视图{}渲染失败：{}", id, view, e);
                    let html = HtmlBuilder::fault(500, &e.to_string(), "").build();
                    Self::from_body(500, TEXT_HTML, html.as_bytes(), accept_encoding, id)
                }
            },
        }
    }

    /// 仅含状态码说明的 HTML 页面，用于宿主服务器自身产生的错误（400、404、504 等）。
    pub fn from_status_code(code: u16, accept_encoding: &[HttpEncoding], id: u128) -> Self {
        let content = match code {
            404 => HtmlBuilder::from_status_code(
                404,
                Some(r"<h2>噢！</h2><p>你指定的网页无法找到。</p>"),
            ),
            405 => HtmlBuilder::from_status_code(
                405,
                Some(r"<h2>噢！</h2><p>服务器不支持该请求方法。</p>"),
            ),
            500 => HtmlBuilder::from_status_code(
                500,
                Some(r"<h2>噢！</h2><p>服务器出现了一个内部错误。</p>"),
            ),
            504 => HtmlBuilder::from_status_code(
                504,
                Some(r"<h2>噢！</h2><p>处理函数执行超时。</p>"),
            ),
            _ => HtmlBuilder::from_status_code(code, None),
        }
        .build();
        let mut response =
            Self::from_body(code, TEXT_HTML, content.as_bytes(), accept_encoding, id);
        if code == 405 {
            response.allow = Some(ALLOWED_METHODS.to_vec());
        }
        response
    }

    fn from_body(
        code: u16,
        content_type: &str,
        body: &[u8],
        accept_encoding: &[HttpEncoding],
        id: u128,
    ) -> Self {
        let mut response = Self::new();
        response.set_code(code);
        response.content_encoding = decide_encoding(accept_encoding);
        match response.content_encoding {
            Some(HttpEncoding::Gzip) => debug!("[ID{}]使用Gzip压缩编码", id),
            Some(HttpEncoding::Br) => debug!("[ID{}]使用Brotli压缩编码", id),
            Some(HttpEncoding::Deflate) => debug!("[ID{}]使用Deflate压缩编码", id),
            None => debug!("[ID{}]不进行压缩", id),
        };
        let content = match compress(body.to_vec(), response.content_encoding) {
            Ok(c) => c,
            Err(e) => {
                error!("[ID{}]压缩响应失败: {}，返回未压缩内容", id, e);
                response.content_encoding = None;
                body.to_vec()
            }
        };
        response.content_length = content.len() as u64;
        response.content_type = Some(content_type.to_string());
        response.content = Some(Bytes::from(content));
        response
    }

    /// HEAD 请求只发送头部。
    pub fn without_body(mut self) -> Self {
        self.content = None;
        self
    }

    fn set_code(&mut self, code: u16) -> &mut Self {
        self.status_code = code;
        self.information = reason_phrase(code).to_string();
        self
    }

    pub fn as_bytes(&self) -> Vec<u8> {
        let version: &str = match self.version {
            HttpVersion::V1_1 => "HTTP/1.1",
            HttpVersion::V1_0 => "HTTP/1.0",
        };
        let status_code: &str = &self.status_code.to_string();
        let information: &str = &self.information;
        let content_length: &str = &self.content_length.to_string();
        let date: &str = &format_date(&self.date);
        let server: &str = &self.server_name;
        let header = [
            version,
            " ",
            status_code,
            " ",
            information,
            CRLF,
            match &self.content_type {
                Some(t) => ["Content-Type: ", t.as_str(), CRLF].concat(),
                None => "".to_string(),
            }
            .as_str(),
            match self.content_encoding {
                Some(e) => ["Content-Encoding: ", &e.to_string(), CRLF].concat(),
                None => "".to_string(),
            }
            .as_str(),
            "Content-Length: ",
            content_length,
            CRLF,
            "Date: ",
            date,
            CRLF,
            "Server: ",
            server,
            CRLF,
            match &self.allow {
                Some(a) => {
                    let allow_str: Vec<String> = a.iter().map(|m| m.to_string()).collect();
                    ["Allow: ", &allow_str.join(", "), CRLF].concat()
                }
                None => "".to_string(),
            }
            .as_str(),
            "Connection: close",
            CRLF,
            CRLF,
        ]
        .concat();
        [
            header.as_bytes(),
            match &self.content {
                Some(c) => &c[..],
                None => &[],
            },
        ]
        .concat()
    }
}

impl Response {
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn information(&self) -> &str {
        &self.information
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn content_encoding(&self) -> Option<HttpEncoding> {
        self.content_encoding
    }

    pub fn content(&self) -> Option<&Bytes> {
        self.content.as_ref()
    }
}

fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc2822()
}

fn compress(data: Vec<u8>, mode: Option<HttpEncoding>) -> io::Result<Vec<u8>> {
    let original_size = data.len();
    let result = match mode {
        Some(HttpEncoding::Gzip) => {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&data)?;
            encoder.finish()
        }
        Some(HttpEncoding::Deflate) => {
            let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&data)?;
            encoder.finish()
        }
        Some(HttpEncoding::Br) => {
            let params = BrotliEncoderParams::default();
            let mut output = Vec::new();
            enc::BrotliCompress(&mut io::Cursor::new(data), &mut output, &params)?;
            Ok(output)
        }
        None => Ok(data),
    };
    if let Ok(ref compressed) = result {
        debug!(
            "压缩完成: {:?}, 原始大小: {} bytes, 压缩后: {} bytes",
            mode,
            original_size,
            compressed.len()
        );
    }
    result
}

fn decide_encoding(accept_encoding: &[HttpEncoding]) -> Option<HttpEncoding> {
    if accept_encoding.contains(&HttpEncoding::Gzip) {
        Some(HttpEncoding::Gzip)
    } else if accept_encoding.contains(&HttpEncoding::Deflate) {
        Some(HttpEncoding::Deflate)
    } else if accept_encoding.contains(&HttpEncoding::Br) {
        Some(HttpEncoding::Br)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exception::Exception;
    use crate::outcome::Attributes;
    use crate::view::MockViewEngine;
    use flate2::read::GzDecoder;
    use mockall::predicate::eq;
    use serde_json::json;
    use std::io::Read;

    fn plain_request() -> Request {
        Request::try_from(b"GET /front/x HTTP/1.1\r\n\r\n", 0).unwrap()
    }

    fn body_text(response: &Response) -> String {
        String::from_utf8(response.content().unwrap().to_vec()).unwrap()
    }

    #[test]
    fn test_format_date() {
        let date = Utc::now();
        let formatted = format_date(&date);
        assert!(formatted.contains("+0000") || formatted.contains("GMT"));
    }

    #[test]
    fn test_compress_none() {
        let data = b"Hello, World!".to_vec();
        let result = compress(data.clone(), None).unwrap();
        assert_eq!(result, data);
    }

    #[test]
    fn test_compress_gzip_round_trip() {
        let data = b"Hello, World! This is a test string for compression.".to_vec();
        let result = compress(data.clone(), Some(HttpEncoding::Gzip)).unwrap();
        assert_eq!(&result[0..2], &[0x1f, 0x8b]);

        let mut decoded = Vec::new();
        GzDecoder::new(&result[..]).read_to_end(&mut decoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_compress_brotli() {
        let data = b"Hello, World! This is a test string for compression.".to_vec();
        let result = compress(data.clone(), Some(HttpEncoding::Br)).unwrap();
        assert_ne!(result, data);
        assert!(!result.is_empty());
    }

    #[test]
    fn test_decide_encoding() {
        assert_eq!(
            decide_encoding(&[HttpEncoding::Br, HttpEncoding::Gzip]),
            Some(HttpEncoding::Gzip)
        );
        assert_eq!(
            decide_encoding(&[HttpEncoding::Deflate]),
            Some(HttpEncoding::Deflate)
        );
        assert_eq!(decide_encoding(&[HttpEncoding::Br]), Some(HttpEncoding::Br));
        assert_eq!(decide_encoding(&[]), None);
    }

    #[test]
    fn test_json_reply() {
        let reply = Reply::Json {
            status: 404,
            body: json!({"status": "error", "code": 404, "message": "Resource not found"}),
        };
        let views = MockViewEngine::new();
        let response = Response::from_reply(&reply, &plain_request(), &views, 0);

        assert_eq!(response.status_code(), 404);
        assert_eq!(response.content_type(), Some(APPLICATION_JSON));
        assert_eq!(
            body_text(&response),
            r#"{"status":"error","code":404,"message":"Resource not found"}"#
        );
    }

    #[test]
    fn test_forward_is_rendered_by_view_engine() {
        let mut attributes = Attributes::new();
        attributes.insert("name".to_string(), json!("Ann"));
        let reply = Reply::Forward {
            view: "/emp/show.html".to_string(),
            attributes: attributes.clone(),
        };

        let mut views = MockViewEngine::new();
        views
            .expect_render()
            .with(eq("/emp/show.html"), eq(attributes))
            .times(1)
            .returning(|_, attrs| Ok(format!("<p>{}</p>", attrs["name"].as_str().unwrap_or(""))));

        let response = Response::from_reply(&reply, &plain_request(), &views, 0);
        assert_eq!(response.status_code(), 200);
        assert_eq!(body_text(&response), "<p>Ann</p>");
    }

    #[test]
    fn test_missing_view_is_server_error() {
        let reply = Reply::Forward {
            view: "/nope.html".to_string(),
            attributes: Attributes::new(),
        };
        let mut views = MockViewEngine::new();
        views
            .expect_render()
            .returning(|view, _| Err(Exception::ViewNotFound(view.to_string())));

        let response = Response::from_reply(&reply, &plain_request(), &views, 0);
        assert_eq!(response.status_code(), 500);
        assert!(body_text(&response).contains("/nope.html"));
    }

    #[test]
    fn test_status_page_headers() {
        let response = Response::from_status_code(405, &[], 0);
        let text = String::from_utf8(response.as_bytes()).unwrap();
        assert!(text.starts_with("HTTP/1.1 405 Method Not Allowed\r\n"));
        assert!(text.contains("Allow: GET, HEAD, OPTIONS, POST, PUT, DELETE, PATCH\r\n"));
        assert!(text.contains(&format!("Server: {}\r\n", SERVER_NAME)));
    }

    #[test]
    fn test_gzip_header_and_head_request() {
        let response = Response::from_status_code(504, &[HttpEncoding::Gzip], 0);
        assert_eq!(response.content_encoding(), Some(HttpEncoding::Gzip));
        let text = String::from_utf8_lossy(&response.as_bytes()).into_owned();
        assert!(text.contains("Content-Encoding: gzip\r\n"));

        let head = response.without_body();
        let bytes = head.as_bytes();
        assert!(bytes.ends_with(b"\r\n\r\n"));
    }
}
