//! General-purpose template helpers registered next to the Handlebars built-ins.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use handlebars::{
    Handlebars, Helper, HelperResult, Output, RenderContext, RenderErrorReason, handlebars_helper,
};
use serde_json::Value;

handlebars_helper!(upper: |s: str| s.to_uppercase());
handlebars_helper!(lower: |s: str| s.to_lowercase());
handlebars_helper!(trim: |s: str| s.trim());
handlebars_helper!(trim_prefix: |prefix: str, s: str| s.strip_prefix(prefix).unwrap_or(s));
handlebars_helper!(trim_suffix: |suffix: str, s: str| s.strip_suffix(suffix).unwrap_or(s));
handlebars_helper!(replace: |from: str, to: str, s: str| s.replace(from, to));
handlebars_helper!(quote: |v: Json| format!("\"{}\"", display(v)));
handlebars_helper!(squote: |v: Json| format!("'{}'", display(v)));
handlebars_helper!(default_value: |fallback: Json, v: Json| {
    if is_empty(v) { fallback.clone() } else { v.clone() }
});
handlebars_helper!(b64enc: |s: str| STANDARD.encode(s));
handlebars_helper!(to_json: |v: Json| v.to_string());
handlebars_helper!(indent: |width: u64, s: str| indent_lines(width, s));
handlebars_helper!(nindent: |width: u64, s: str| format!("\n{}", indent_lines(width, s)));
handlebars_helper!(join: |sep: str, items: array| {
    items.iter().map(display).collect::<Vec<_>>().join(sep)
});
handlebars_helper!(has_key: |map: object, key: str| map.contains_key(key));
handlebars_helper!(add: |a: i64, b: i64| a.saturating_add(b));
handlebars_helper!(sub: |a: i64, b: i64| a.saturating_sub(b));

/// Register every helper of this module.
pub fn register(handlebars: &mut Handlebars) {
    handlebars.register_helper("upper", Box::new(upper));
    handlebars.register_helper("lower", Box::new(lower));
    handlebars.register_helper("trim", Box::new(trim));
    handlebars.register_helper("trimPrefix", Box::new(trim_prefix));
    handlebars.register_helper("trimSuffix", Box::new(trim_suffix));
    handlebars.register_helper("replace", Box::new(replace));
    handlebars.register_helper("quote", Box::new(quote));
    handlebars.register_helper("squote", Box::new(squote));
    handlebars.register_helper("default", Box::new(default_value));
    handlebars.register_helper("b64enc", Box::new(b64enc));
    handlebars.register_helper("b64dec", Box::new(b64dec_helper));
    handlebars.register_helper("toJson", Box::new(to_json));
    handlebars.register_helper("indent", Box::new(indent));
    handlebars.register_helper("nindent", Box::new(nindent));
    handlebars.register_helper("join", Box::new(join));
    handlebars.register_helper("contains", Box::new(contains_helper));
    handlebars.register_helper("hasKey", Box::new(has_key));
    handlebars.register_helper("add", Box::new(add));
    handlebars.register_helper("sub", Box::new(sub));
}

/// String form of a value: strings unquoted, everything else as JSON
fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Number(_) => false,
    }
}

fn indent_lines(width: u64, text: &str) -> String {
    let pad = " ".repeat(usize::try_from(width).unwrap_or(0));
    text.split('\n')
        .map(|line| format!("{}{}", pad, line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Helper function decoding standard base64 into a UTF-8 string
fn b64dec_helper(
    h: &Helper,
    _: &Handlebars,
    _: &handlebars::Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let encoded = h
        .param(0)
        .and_then(|v| v.value().as_str())
        .ok_or_else(|| RenderErrorReason::Other("b64dec expects a string".to_string()))?;

    let decoded = STANDARD
        .decode(encoded.trim())
        .map_err(|e| RenderErrorReason::Other(format!("b64dec: invalid base64: {}", e)))?;
    let text = String::from_utf8(decoded)
        .map_err(|_| RenderErrorReason::Other("b64dec: decoded value is not UTF-8".to_string()))?;

    out.write(&text)?;
    Ok(())
}

/// Helper function to check if an array contains a value, or a string a substring
fn contains_helper(
    h: &Helper,
    _: &Handlebars,
    _: &handlebars::Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let haystack = h.param(0).map(|v| v.value());
    let search_value = h.param(1).and_then(|v| v.value().as_str());

    let found = match (haystack, search_value) {
        (Some(Value::Array(arr)), Some(search)) => {
            arr.iter().any(|item| item.as_str() == Some(search))
        }
        (Some(Value::String(s)), Some(search)) => s.contains(search),
        _ => false,
    };

    if found {
        out.write("true")?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn render(template: &str, data: Value) -> String {
        let mut handlebars = Handlebars::new();
        handlebars.register_escape_fn(handlebars::no_escape);
        register(&mut handlebars);
        handlebars.render_template(template, &data).unwrap()
    }

    #[test]
    fn test_string_helpers() {
        let data = json!({"name": "  Alice  ", "host": "db.internal"});
        assert_eq!(render("{{upper (trim name)}}", data.clone()), "ALICE");
        assert_eq!(render("{{lower \"MiXeD\"}}", data.clone()), "mixed");
        assert_eq!(render("{{trimPrefix \"db.\" host}}", data.clone()), "internal");
        assert_eq!(render("{{trimSuffix \".internal\" host}}", data.clone()), "db");
        assert_eq!(render("{{replace \".\" \"-\" host}}", data), "db-internal");
    }

    #[test]
    fn test_quote_helpers() {
        let data = json!({"s": "v", "n": 5});
        assert_eq!(render("{{quote s}} {{squote s}} {{quote n}}", data), "\"v\" 'v' \"5\"");
    }

    #[test]
    fn test_default_helper() {
        let data = json!({"empty": "", "set": "x"});
        assert_eq!(render("{{default \"fallback\" empty}}", data.clone()), "fallback");
        assert_eq!(render("{{default \"fallback\" set}}", data), "x");
    }

    #[test]
    fn test_base64_helpers() {
        let data = json!({"plain": "hunter2", "encoded": "aHVudGVyMg=="});
        assert_eq!(render("{{b64enc plain}}", data.clone()), "aHVudGVyMg==");
        assert_eq!(render("{{b64dec encoded}}", data), "hunter2");
    }

    #[test]
    fn test_b64dec_rejects_invalid_input() {
        let mut handlebars = Handlebars::new();
        register(&mut handlebars);
        assert!(handlebars.render_template("{{b64dec \"***\"}}", &json!({})).is_err());
    }

    #[test]
    fn test_to_json() {
        let data = json!({"creds": {"user": "app"}});
        assert_eq!(render("{{toJson creds}}", data), r#"{"user":"app"}"#);
    }

    #[test]
    fn test_indent_helpers() {
        let data = json!({"cert": "line1\nline2"});
        assert_eq!(render("{{indent 2 cert}}", data.clone()), "  line1\n  line2");
        assert_eq!(render("key:{{nindent 4 cert}}", data), "key:\n    line1\n    line2");
    }

    #[test]
    fn test_join() {
        let data = json!({"hosts": ["a", "b", 3]});
        assert_eq!(render("{{join \",\" hosts}}", data), "a,b,3");
    }

    #[test]
    fn test_contains_helper() {
        let data = json!({"roles": ["admin", "dev"], "dsn": "postgres://db"});
        assert_eq!(
            render("{{#if (contains roles \"admin\")}}yes{{else}}no{{/if}}", data.clone()),
            "yes"
        );
        assert_eq!(
            render("{{#if (contains roles \"ops\")}}yes{{else}}no{{/if}}", data.clone()),
            "no"
        );
        assert_eq!(render("{{contains dsn \"postgres\"}}", data), "true");
    }

    #[test]
    fn test_has_key_and_math() {
        let data = json!({"creds": {"user": "app"}, "port": 5432});
        assert_eq!(render("{{hasKey creds \"user\"}}", data.clone()), "true");
        assert_eq!(render("{{hasKey creds \"password\"}}", data.clone()), "false");
        assert_eq!(render("{{add port 1}} {{sub port 2}}", data), "5433 5430");
    }
}
