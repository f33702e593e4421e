use crate::param::reason_phrase;

pub struct HtmlBuilder {
    title: String,
    css: String,
    script: String,
    body: String,
}

const BASE_CSS: &str = r"
            body {
                width: 35em;
                margin: 0 auto;
                font-family: Tahoma, Verdana, Arial, sans-serif;
            }
            pre {
                white-space: pre-wrap;
            }
            ";

impl HtmlBuilder {
    pub fn new(title: &str, body: String) -> Self {
        Self {
            title: escape_html(title),
            css: BASE_CSS.to_string(),
            script: "".to_string(),
            body,
        }
    }

    pub fn from_status_code(code: u16, note: Option<&str>) -> Self {
        let description = match note {
            Some(n) => n.to_string(),
            None => reason_phrase(code).to_string(),
        };
        let body = format!(
            r"
            <h1>{}</h1>
            <p>{}</p>
            ",
            code, description
        );
        Self::new(&code.to_string(), body)
    }

    /// 纯文本结果：原样放入 `<pre>` 中。
    pub fn from_text(text: &str) -> Self {
        Self::new("", format!("<pre>{}</pre>", escape_html(text)))
    }

    /// 路由未命中页面，列出请求的方法、路径以及全部已注册路由。
    pub fn not_found(method: &str, path: &str, routes: &[String]) -> Self {
        let mut body = String::new();
        body.push_str("<h1>404</h1>");
        body.push_str(&format!(
            "<p>No route for <code>[{}] {}</code></p>",
            escape_html(method),
            escape_html(path)
        ));
        body.push_str("<h2>Registered routes</h2><ul>");
        for route in routes {
            body.push_str(&format!("<li>{}</li>", escape_html(route)));
        }
        body.push_str("</ul>");
        Self::new("404", body)
    }

    /// 处理函数故障页面，携带错误信息与详情。
    pub fn fault(code: u16, message: &str, detail: &str) -> Self {
        let mut body = format!("<h1>{}</h1><p>{}</p>", code, escape_html(message));
        if !detail.is_empty() {
            body.push_str(&format!("<pre>{}</pre>", escape_html(detail)));
        }
        Self::new(&code.to_string(), body)
    }

    /// 处理函数的执行确认页面，注明结果的运行时类型。
    pub fn acknowledge(type_name: &str) -> Self {
        Self::new(
            "OK",
            format!(
                "<p>Handler executed successfully, result type: <code>{}</code></p>",
                escape_html(type_name)
            ),
        )
    }

    pub fn build(&self) -> String {
        format!(
            r##"<!DOCTYPE html>
            <!-- 本文件由webfront自动生成 -->
            <html>
                <head>
                    <meta charset="utf-8">
                    <script>{}</script>
                    <title>{}</title>
                    <style>{}</style>
                </head>
                <body>
                {}
                </body>
            </html>"##,
            self.script, self.title, self.css, self.body
        )
    }
}

pub fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
