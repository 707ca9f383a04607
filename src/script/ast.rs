//! A minimal JavaScript AST and its renderer.
//!
//! Override blocks build statements from these nodes and never concatenate
//! source text themselves, so every profile value reaches the page as a
//! properly escaped literal.

use crate::js::format_number;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Undefined,
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
    Ident(String),
    /// `object.key`, or `object["key"]` when `key` is not an identifier.
    Member(Box<Expr>, String),
    Call(Box<Expr>, Vec<Expr>),
    New(Box<Expr>, Vec<Expr>),
    Array(Vec<Expr>),
    Object(Vec<(String, Expr)>),
    /// `function (params) { body }`
    Function(Vec<String>, Vec<Stmt>),
    /// Prefix operator such as `!` or `typeof `.
    Unary(&'static str, Box<Expr>),
    Binary(Box<Expr>, &'static str, Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// A directive prologue entry, e.g. `'use strict'`.
    Directive(&'static str),
    Expr(Expr),
    Const(String, Expr),
    Return(Expr),
    If(Expr, Vec<Stmt>),
    Try {
        body: Vec<Stmt>,
        binding: String,
        handler: Vec<Stmt>,
    },
    /// `(function () { body })();`
    Iife(Vec<Stmt>),
    /// Trusted static source, emitted line by line.
    Raw(&'static str),
}

impl Expr {
    pub fn ident(name: &str) -> Self {
        Expr::Ident(name.to_string())
    }

    pub fn str(s: &str) -> Self {
        Expr::Str(s.to_string())
    }

    pub fn num(n: impl Into<f64>) -> Self {
        Expr::Num(n.into())
    }

    pub fn opt_str(s: Option<&str>) -> Self {
        s.map(Expr::str).unwrap_or(Expr::Null)
    }

    pub fn strs<S: AsRef<str>>(items: &[S]) -> Self {
        Expr::Array(items.iter().map(|s| Expr::str(s.as_ref())).collect())
    }

    pub fn function(params: &[&str], body: Vec<Stmt>) -> Self {
        Expr::Function(params.iter().map(|p| p.to_string()).collect(), body)
    }

    pub fn member(self, key: &str) -> Self {
        Expr::Member(Box::new(self), key.to_string())
    }

    pub fn call(self, args: Vec<Expr>) -> Self {
        Expr::Call(Box::new(self), args)
    }

    pub fn new_with(self, args: Vec<Expr>) -> Self {
        Expr::New(Box::new(self), args)
    }

    pub fn binary(self, op: &'static str, rhs: Expr) -> Self {
        Expr::Binary(Box::new(self), op, Box::new(rhs))
    }

    /// `ident(args...)` as a statement.
    pub fn stmt(self) -> Stmt {
        Stmt::Expr(self)
    }
}

/// `helper(args...)` as a statement.
pub fn call(helper: &str, args: Vec<Expr>) -> Stmt {
    Expr::ident(helper).call(args).stmt()
}

/// Escape `s` as a double-quoted JavaScript string literal that is also safe
/// inside an inline `<script>` element.
pub fn quote(s: &str) -> String {
    // serde_json never fails on a str.
    let json = serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string());
    json.replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029")
        .replace("</", "<\\/")
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Renders statements to source text.
pub struct Renderer {
    out: String,
    depth: usize,
    pretty: bool,
}

impl Renderer {
    pub fn new(pretty: bool) -> Self {
        Self {
            out: String::new(),
            depth: 0,
            pretty,
        }
    }

    pub fn render(mut self, program: &[Stmt]) -> String {
        for stmt in program {
            self.stmt(stmt);
        }
        self.out
    }

    /// Append raw source, one line at a time, at the current depth.
    pub fn raw(&mut self, source: &str) {
        for line in source.lines().filter(|l| !l.trim().is_empty()) {
            self.line(line.trim_end());
        }
    }

    pub fn finish(self) -> String {
        self.out
    }

    fn line(&mut self, text: &str) {
        if self.pretty {
            for _ in 0..self.depth {
                self.out.push_str("  ");
            }
            self.out.push_str(text);
            self.out.push('\n');
        } else {
            self.out.push_str(text.trim_start());
            self.out.push(if text.ends_with('{') || text.ends_with(';') { ' ' } else { '\n' });
        }
    }

    fn open(&mut self, text: &str) {
        self.line(text);
        self.depth += 1;
    }

    fn close(&mut self, text: &str) {
        self.depth = self.depth.saturating_sub(1);
        self.line(text);
    }

    pub fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Directive(d) => self.line(&format!("'{}';", d)),
            Stmt::Expr(e) => {
                let text = self.expr(e);
                self.line(&format!("{};", text));
            }
            Stmt::Const(name, e) => {
                let text = self.expr(e);
                self.line(&format!("const {} = {};", name, text));
            }
            Stmt::Return(e) => {
                let text = self.expr(e);
                self.line(&format!("return {};", text));
            }
            Stmt::If(cond, body) => {
                let cond = self.expr(cond);
                self.open(&format!("if ({}) {{", cond));
                for s in body {
                    self.stmt(s);
                }
                self.close("}");
            }
            Stmt::Try {
                body,
                binding,
                handler,
            } => {
                self.open("try {");
                for s in body {
                    self.stmt(s);
                }
                self.close(&format!("}} catch ({}) {{", binding));
                self.depth += 1;
                for s in handler {
                    self.stmt(s);
                }
                self.close("}");
            }
            Stmt::Iife(body) => {
                self.open("(function () {");
                for s in body {
                    self.stmt(s);
                }
                self.close("})();");
            }
            Stmt::Raw(source) => self.raw(source),
        }
    }

    /// Render an expression inline. Nested function bodies are rendered
    /// on a single line.
    fn expr(&self, e: &Expr) -> String {
        match e {
            Expr::Undefined => "undefined".to_string(),
            Expr::Null => "null".to_string(),
            Expr::Bool(b) => b.to_string(),
            Expr::Num(n) => format_number(*n),
            Expr::Str(s) => quote(s),
            Expr::Ident(name) => name.clone(),
            Expr::Member(object, key) => {
                let object = self.operand(object);
                if is_identifier(key) {
                    format!("{}.{}", object, key)
                } else {
                    format!("{}[{}]", object, quote(key))
                }
            }
            Expr::Call(callee, args) => {
                format!("{}({})", self.operand(callee), self.list(args))
            }
            Expr::New(callee, args) => {
                format!("new {}({})", self.operand(callee), self.list(args))
            }
            Expr::Array(items) => format!("[{}]", self.list(items)),
            Expr::Object(fields) if fields.is_empty() => "{}".to_string(),
            Expr::Object(fields) => {
                let fields: Vec<String> = fields
                    .iter()
                    .map(|(k, v)| {
                        let key = if is_identifier(k) { k.clone() } else { quote(k) };
                        format!("{}: {}", key, self.expr(v))
                    })
                    .collect();
                format!("{{ {} }}", fields.join(", "))
            }
            Expr::Function(params, body) => {
                let mut inner = Renderer::new(false);
                for s in body {
                    inner.stmt(s);
                }
                let body = inner.finish();
                let body = body.trim_end();
                if body.is_empty() {
                    format!("function ({}) {{}}", params.join(", "))
                } else {
                    format!("function ({}) {{ {} }}", params.join(", "), body)
                }
            }
            Expr::Unary(op, operand) => format!("{}{}", op, self.operand(operand)),
            Expr::Binary(lhs, op, rhs) => {
                format!("({} {} {})", self.expr(lhs), op, self.expr(rhs))
            }
        }
    }

    /// Parenthesize expressions that cannot be a member/call target as is.
    fn operand(&self, e: &Expr) -> String {
        match e {
            Expr::Function(..) | Expr::Num(_) | Expr::Unary(..) | Expr::Object(_) | Expr::New(..) => {
                format!("({})", self.expr(e))
            }
            _ => self.expr(e),
        }
    }

    fn list(&self, items: &[Expr]) -> String {
        items
            .iter()
            .map(|e| self.expr(e))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_escapes_hostile_strings() {
        assert_eq!(quote("a\"b"), r#""a\"b""#);
        assert_eq!(quote("line\nbreak"), r#""line\nbreak""#);
        assert_eq!(quote("</script><script>"), r#""<\/script><\/script>""#);
        assert_eq!(quote("\u{2028}"), r#""\u2028""#);
        assert_eq!(quote("back\\slash"), r#""back\\slash""#);
    }

    #[test]
    fn test_member_rendering() {
        let r = Renderer::new(true);
        let e = Expr::ident("g").member("RTCPeerConnection");
        assert_eq!(r.expr(&e), "g.RTCPeerConnection");
        let e = Expr::ident("o").member("not-an-ident");
        assert_eq!(r.expr(&e), r#"o["not-an-ident"]"#);
        let e = Expr::num(1).member("toFixed").call(vec![]);
        assert_eq!(r.expr(&e), "(1).toFixed()");
    }

    #[test]
    fn test_function_and_try_rendering() {
        let program = vec![Stmt::Try {
            body: vec![call(
                "method",
                vec![
                    Expr::ident("p"),
                    Expr::str("getVoices"),
                    Expr::function(&[], vec![Stmt::Return(Expr::Array(vec![]))]),
                ],
            )],
            binding: "e".to_string(),
            handler: vec![],
        }];
        let out = Renderer::new(true).render(&program);
        assert_eq!(
            out,
            "try {\n  method(p, \"getVoices\", function () { return []; });\n} catch (e) {\n}\n"
        );
    }

    #[test]
    fn test_literals() {
        let r = Renderer::new(true);
        assert_eq!(r.expr(&Expr::Num(-420.0)), "-420");
        assert_eq!(r.expr(&Expr::Num(0.25)), "0.25");
        assert_eq!(r.expr(&Expr::Num(f64::INFINITY)), "Infinity");
        assert_eq!(r.expr(&Expr::opt_str(None)), "null");
        assert_eq!(
            r.expr(&Expr::Object(vec![
                ("type".into(), Expr::str("offer")),
                ("x-y".into(), Expr::Bool(true))
            ])),
            r#"{ type: "offer", "x-y": true }"#
        );
    }
}
