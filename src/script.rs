//! Incremental script driver. A [`Script`] owns one VM with its root
//! frame entered and one parser kept across turns, so top-level
//! bindings persist while each fragment's tokens and AST stay
//! transient. Fragments queue up via [`Script::append`] and run in
//! order on [`Script::execute`]; the last fragment's value is the
//! turn's result.
//!
//! [`is_complete_fragment`] is the REPL's input-completeness
//! predicate: a buffer is accepted once its brackets balance and it
//! does not end in a dangling assignment.

use std::collections::VecDeque;

use crate::eval;
use crate::host::IdentifierData;
use crate::lexer::{self, TokenKind};
use crate::parser::Parser;
use crate::value::Value;
use crate::vm::Vm;
use crate::{DEFAULT_ROOT_SLOTS, Error};

/// Driver options.
#[derive(Debug, Clone, Copy)]
pub struct ScriptConfig {
    /// Slots pre-reserved for the root frame. A floor, not a
    /// ceiling: the root frame grows between turns as the top-level
    /// slot map does.
    pub reserved_slots: usize,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        ScriptConfig {
            reserved_slots: DEFAULT_ROOT_SLOTS,
        }
    }
}

/// Persistent interpreter session.
pub struct Script {
    vm: Vm,
    parser: Parser,
    pending: VecDeque<String>,
}

impl Default for Script {
    fn default() -> Self {
        Script::new()
    }
}

impl Script {
    pub fn new() -> Self {
        Script::with_config(ScriptConfig::default())
    }

    pub fn with_config(config: ScriptConfig) -> Self {
        Script {
            vm: Vm::with_root(config.reserved_slots),
            parser: Parser::new(),
            pending: VecDeque::new(),
        }
    }

    /// Queue a source fragment for the next [`Script::execute`].
    pub fn append(&mut self, source: &str) {
        self.pending.push_back(source.to_owned());
    }

    /// Bind a host identifier to a fresh top-level slot, making it
    /// visible to every later fragment.
    pub fn register_identifier(&mut self, id: IdentifierData) -> Result<(), Error> {
        let slot = self.parser.register_top_level(&id.name)?;
        self.vm.reserve_root(self.parser.top_slots())?;
        *self.vm.global_mut(slot)? = id.value;
        Ok(())
    }

    /// Drain the fragment queue: lex, parse and evaluate each in
    /// order, returning the last fragment's value. A failing fragment
    /// is dropped from the queue; fragments after it stay pending.
    pub fn execute(&mut self) -> Result<Value, Error> {
        let mut result = Value::nil();
        while let Some(source) = self.pending.pop_front() {
            let tokens = lexer::tokenize(&source)?;
            self.parser.reset(tokens);
            let program = self.parser.parse()?;
            self.vm.reserve_root(self.parser.top_slots())?;
            result = eval::eval_program(&program, &mut self.vm)?;
        }
        Ok(result)
    }

    /// The session VM, for drivers and diagnostics.
    pub fn vm(&self) -> &Vm {
        &self.vm
    }

    /// Slots the top-level frame holds so far.
    pub fn top_slots(&self) -> usize {
        self.parser.top_slots()
    }
}

/// Decide whether a REPL buffer is a complete fragment: all
/// `() {} []` balanced, and either a terminator (`;`, `}`, `{`) at
/// the end or no dangling assignment operator. Lex errors propagate
/// so the REPL can report them immediately.
pub fn is_complete_fragment(source: &str) -> Result<bool, Error> {
    let tokens = lexer::tokenize(source)?;

    // bracket balance
    let mut stack = Vec::new();
    for token in &tokens {
        if token.kind != TokenKind::Punctuation {
            continue;
        }
        match token.lexeme.as_str() {
            "(" | "{" | "[" => stack.push(token.lexeme.clone()),
            ")" => {
                if stack.pop().as_deref() != Some("(") {
                    return Ok(false);
                }
            }
            "}" => {
                if stack.pop().as_deref() != Some("{") {
                    return Ok(false);
                }
            }
            "]" => {
                if stack.pop().as_deref() != Some("[") {
                    return Ok(false);
                }
            }
            _ => {}
        }
    }
    if !stack.is_empty() {
        return Ok(false);
    }

    let Some(last) = tokens.last() else {
        return Ok(true);
    };
    if last.is_punct(";") || last.is_punct("}") || last.is_punct("{") {
        return Ok(true);
    }
    // an assignment with nothing after it still waits for its
    // right-hand side; ++/-- are complete on their own
    if last.kind == TokenKind::Assignment && last.lexeme != "++" && last.lexeme != "--" {
        return Ok(false);
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host;
    use crate::{EvalError, ResolveError};
    use pretty_assertions::assert_eq;

    fn run(script: &mut Script, source: &str) -> Result<Value, Error> {
        script.append(source);
        let result = script.execute();
        // frame balance after every turn, success or error
        assert_eq!(script.vm().depth(), 1, "frame imbalance after {source:?}");
        result
    }

    #[test]
    fn test_state_persists_between_turns() {
        let mut script = Script::new();
        run(&mut script, "a = 1").unwrap();
        run(&mut script, "b = a + 1").unwrap();
        assert_eq!(run(&mut script, "a + b").unwrap().to_string(), "3");

        // functions survive turns too
        run(&mut script, "inc = function(x) x + 1").unwrap();
        assert_eq!(run(&mut script, "inc(41)").unwrap().to_string(), "42");
    }

    #[test]
    fn test_end_to_end_scenarios() {
        let cases: Vec<(&str, &str)> = vec![
            ("1 + 2 * 3", "7"),
            ("a = 0; for (i = 0; i < 10; i = i + 1) a = a + i; a", "45"),
            (
                "f = function(n) { if (n < 2) n else f(n-1) + f(n-2) }; f(10)",
                "55",
            ),
            (
                "t = [x = 1, y = 2, [10] = \"ten\"]; t.x + t.y..\":\"..t[10]..\":\"..t.y",
                "\"3:ten:2\"",
            ),
            (
                "s = \"\"; for (i=0;i<3;i=i+1) { if (i==1) continue; s = s..i }; s",
                "\"02\"",
            ),
        ];
        for (i, (source, expected)) in cases.iter().enumerate() {
            let mut script = Script::new();
            let result = run(&mut script, source)
                .unwrap_or_else(|e| panic!("scenario {}: {source} failed: {e}", i + 1));
            assert_eq!(&result.to_string(), expected, "scenario {}", i + 1);
        }
    }

    #[test]
    fn test_const_scenario() {
        let mut script = Script::new();
        run(&mut script, "c = const 42").unwrap();
        assert_eq!(
            run(&mut script, "c = 0"),
            Err(Error::Eval(EvalError::AssignToConst))
        );
        // the cell still holds the original value
        assert_eq!(run(&mut script, "c").unwrap().to_string(), "42");
    }

    #[test]
    fn test_failed_fragment_is_dropped() {
        let mut script = Script::new();
        run(&mut script, "x = 1").unwrap();
        assert!(run(&mut script, "1 / 0").is_err());
        // the session keeps working afterwards
        assert_eq!(run(&mut script, "x + 1").unwrap().to_string(), "2");
    }

    #[test]
    fn test_root_frame_grows_with_slot_map() {
        let mut script = Script::with_config(ScriptConfig { reserved_slots: 2 });
        run(&mut script, "a = 1; b = 2; c = 3; d = 4").unwrap();
        // memory tracks base + locals_needed_so_far
        assert_eq!(script.vm().mem_len(), script.top_slots());
        assert_eq!(run(&mut script, "d").unwrap().to_string(), "4");

        let mut wide = String::new();
        for i in 0..40 {
            wide.push_str(&format!("v{i} = {i}; "));
        }
        run(&mut script, &wide).unwrap();
        assert_eq!(run(&mut script, "v39").unwrap().to_string(), "39");
        assert_eq!(script.vm().mem_len(), script.top_slots());
    }

    #[test]
    fn test_register_identifier() {
        let mut script = Script::new();
        script
            .register_identifier(host::function("double", |x: i64| x * 2))
            .unwrap();
        script
            .register_identifier(host::constant("answer", 42i64))
            .unwrap();
        script
            .register_identifier(host::namespace(
                "geo",
                [
                    host::constant("pi", std::f64::consts::PI),
                    host::function("area", |r: f64| std::f64::consts::PI * r * r),
                ],
            ))
            .unwrap();

        assert_eq!(run(&mut script, "double(21)").unwrap().to_string(), "42");
        assert_eq!(run(&mut script, "answer").unwrap().to_string(), "42");
        assert_eq!(
            run(&mut script, "geo.area(1.0) > 3.14 && geo.area(1.0) < 3.15")
                .unwrap()
                .to_string(),
            "true"
        );

        // registered constants refuse assignment
        assert_eq!(
            run(&mut script, "answer = 0"),
            Err(Error::Eval(EvalError::AssignToConst))
        );
        assert_eq!(
            run(&mut script, "geo.pi = 3"),
            Err(Error::Eval(EvalError::AssignToConst))
        );

        // duplicate registration is a resolve error
        assert_eq!(
            script.register_identifier(host::variable("double", 1i64)),
            Err(Error::Resolve(ResolveError::IdentifierRedeclared(
                "double".to_owned()
            )))
        );
    }

    #[test]
    fn test_imports_across_turns() {
        let mut script = Script::new();
        run(&mut script, "import math").unwrap();
        assert_eq!(
            run(&mut script, "math.sqrt(4.0)").unwrap().to_string(),
            "2.0"
        );
        assert_eq!(
            run(&mut script, "math.max(2.0, math.floor(3.7))")
                .unwrap()
                .to_string(),
            "3.0"
        );
        // module constants are const
        assert_eq!(
            run(&mut script, "math.pi = 3"),
            Err(Error::Eval(EvalError::AssignToConst))
        );

        run(&mut script, "import string").unwrap();
        assert_eq!(
            run(&mut script, "string.upper(\"abc\")").unwrap().to_string(),
            "\"ABC\""
        );
        assert_eq!(
            run(&mut script, "string.split(\"a,b,c\", \",\")")
                .unwrap()
                .to_string(),
            "[\"a\", \"b\", \"c\"]"
        );
    }

    #[test]
    fn test_completeness_predicate() {
        let cases: Vec<(&str, bool)> = vec![
            ("a = 1", true),
            ("a = 1;", true),
            ("a =", false),
            ("a +=", false),
            ("x++", true),
            ("x--", true),
            ("{ a = 1", false),
            ("{ a = 1 }", true),
            ("if (a) {", false),
            ("f(1, 2", false),
            ("[1, 2", false),
            ("for (i = 0; i < 3; i++) {", false),
            ("for (i = 0; i < 3; i++) { s = s..i }", true),
            ("", true),
            ("a = (1 + ", false),
            (")", false),
        ];
        for (i, (source, expected)) in cases.iter().enumerate() {
            assert_eq!(
                is_complete_fragment(source).unwrap(),
                *expected,
                "case {}: {source:?}",
                i + 1
            );
        }

        // lex errors surface instead of buffering forever
        assert!(is_complete_fragment("\"unclosed").is_err());
    }
}
