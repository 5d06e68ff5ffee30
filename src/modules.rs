//! Registry of importable standard namespaces. `import NAME` in a
//! script asks [`resolve`] for a pre-built namespace value at parse
//! time; unknown names fail the parse.
//!
//! Every module is an ordinary [`crate::host`] namespace, so the
//! standard library exercises exactly the same embedding surface a
//! host program uses.

use std::io::BufRead;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::host::{self, IdentifierData};
use crate::value::Value;

/// Look up a module by name. Returns the namespace table value, or
/// `None` for unknown modules.
pub fn resolve(name: &str) -> Option<Value> {
    let module = match name {
        "math" => math_module(),
        "string" => string_module(),
        "io" => io_module(),
        "os" => os_module(),
        _ => return None,
    };
    Some(module.value)
}

fn math_module() -> IdentifierData {
    host::namespace(
        "math",
        [
            host::function("sin", |x: f64| x.sin()),
            host::function("cos", |x: f64| x.cos()),
            host::function("tan", |x: f64| x.tan()),
            host::function("asin", |x: f64| x.asin()),
            host::function("acos", |x: f64| x.acos()),
            host::function("atan", |x: f64| x.atan()),
            host::function("atan2", |y: f64, x: f64| y.atan2(x)),
            host::function("sqrt", |x: f64| x.sqrt()),
            host::function("pow", |x: f64, y: f64| x.powf(y)),
            host::function("log", |x: f64| x.ln()),
            host::function("exp", |x: f64| x.exp()),
            host::function("abs", |x: f64| x.abs()),
            host::function("ceil", |x: f64| x.ceil()),
            host::function("floor", |x: f64| x.floor()),
            host::function("round", |x: f64| x.round()),
            host::function("fmod", |x: f64, y: f64| x % y),
            host::function("hypot", |x: f64, y: f64| x.hypot(y)),
            host::function("max", |x: f64, y: f64| x.max(y)),
            host::function("min", |x: f64, y: f64| x.min(y)),
            host::constant("pi", std::f64::consts::PI),
            host::constant("e", std::f64::consts::E),
        ],
    )
}

fn string_module() -> IdentifierData {
    host::namespace(
        "string",
        [
            host::function("len", |s: String| s.len() as i64),
            host::function("upper", |s: String| s.to_uppercase()),
            host::function("lower", |s: String| s.to_lowercase()),
            host::function("trim", |s: String| s.trim().to_owned()),
            host::function("contains", |s: String, needle: String| {
                s.contains(&needle)
            }),
            host::function("replace", |s: String, from: String, to: String| {
                s.replace(&from, &to)
            }),
            host::function("split", |s: String, sep: String| {
                s.split(&sep)
                    .map(str::to_owned)
                    .collect::<Vec<String>>()
            }),
        ],
    )
}

fn io_module() -> IdentifierData {
    host::namespace(
        "io",
        [
            host::function("read_file", |path: String| std::fs::read_to_string(path)),
            host::function("write_file", |path: String, content: String| {
                std::fs::write(path, content)
            }),
            host::function("read_line", || -> Result<String, std::io::Error> {
                let mut line = String::new();
                std::io::stdin().lock().read_line(&mut line)?;
                Ok(line.trim_end_matches(['\r', '\n']).to_owned())
            }),
        ],
    )
}

fn os_module() -> IdentifierData {
    host::namespace(
        "os",
        [
            host::function("time", || {
                SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map_or(0, |d| d.as_secs() as i64)
            }),
            host::function("clock", || {
                SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map_or(0.0, |d| d.as_secs_f64())
            }),
            host::function("getenv", |name: String| {
                std::env::var(name).unwrap_or_default()
            }),
            host::function("name", || std::env::consts::OS),
        ],
    )
}
