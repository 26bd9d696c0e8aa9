use std::collections::HashMap;

use crate::bytecode::compile_env::{Binding, CompileEnv};
use crate::lang::value::Value;
use crate::runtime::runtime_error::{RuntimeError, type_error};
use crate::runtime::value::{Prim, StrId, Unboxed};

/// Host-side state primitives may touch: the string table and the
/// output of `display`.
#[derive(Debug, Default)]
pub struct Host {
    strings: Vec<Option<String>>,
    index: HashMap<String, StrId>,
    /// Ids released by [`Host::retain_strings`], reused before the table grows.
    free_ids: Vec<usize>,
    pub output: Vec<String>,
}

impl Host {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identical strings share an id, so string equality is id equality.
    pub fn intern(&mut self, s: &str) -> StrId {
        if let Some(id) = self.index.get(s) {
            return *id;
        }
        let id = match self.free_ids.pop() {
            Some(slot) => {
                self.strings[slot] = Some(s.to_string());
                StrId(slot)
            }
            None => {
                self.strings.push(Some(s.to_string()));
                StrId(self.strings.len() - 1)
            }
        };
        self.index.insert(s.to_string(), id);
        id
    }

    pub fn string(&self, id: StrId) -> &str {
        self.strings
            .get(id.0)
            .and_then(|s| s.as_deref())
            .unwrap_or_default()
    }

    /// Drop every string whose id is not in `live`. Only sound at an
    /// instruction boundary, when every id in use sits in a heap node.
    pub fn retain_strings(&mut self, live: impl IntoIterator<Item = StrId>) {
        let mut marked = vec![false; self.strings.len()];
        for id in live {
            if let Some(mark) = marked.get_mut(id.0) {
                *mark = true;
            }
        }

        for (slot, entry) in self.strings.iter_mut().enumerate() {
            if marked[slot] {
                continue;
            }
            if let Some(s) = entry.take() {
                self.index.remove(&s);
                self.free_ids.push(slot);
            }
        }
    }

    /// Strings currently held by the table.
    #[cfg(test)]
    pub fn string_count(&self) -> usize {
        self.index.len()
    }

    pub fn from_value(&mut self, value: &Value) -> Prim {
        match value {
            Value::Number(n) => Prim::Number(*n),
            Value::Bool(b) => Prim::Bool(*b),
            Value::Str(s) => Prim::Str(self.intern(s)),
            Value::Undefined => Prim::Undefined,
            Value::Null => Prim::Null,
        }
    }

    pub fn to_value(&self, prim: Prim) -> Value {
        match prim {
            Prim::Number(n) => Value::Number(n),
            Prim::Bool(b) => Value::Bool(b),
            Prim::Str(id) => Value::Str(self.string(id).to_string()),
            Prim::Undefined => Value::Undefined,
            Prim::Null => Value::Null,
        }
    }

    pub fn render(&self, value: Unboxed) -> String {
        match value {
            Unboxed::Prim(p) => self.to_value(p).to_string(),
            Unboxed::Closure { arity, .. } => format!("<function/{}>", arity),
            Unboxed::Primitive(id) => match lookup(id) {
                Some(def) => format!("<primitive {}>", def.name),
                None => "<primitive>".to_string(),
            },
        }
    }

    /// Text of a value as `+` concatenates it.
    fn concat_text(&self, value: Unboxed) -> String {
        match value {
            Unboxed::Prim(Prim::Str(id)) => self.string(id).to_string(),
            other => self.render(other),
        }
    }
}

pub type PrimitiveFn = fn(&mut Host, &[Unboxed]) -> Result<Prim, RuntimeError>;

pub struct PrimitiveDef {
    pub name: &'static str,
    pub arity: usize,
    pub apply: PrimitiveFn,
}

/// Primitives by id. The global environment holds them in this order.
pub static PRIMITIVES: &[PrimitiveDef] = &[
    PrimitiveDef { name: "+", arity: 2, apply: add },
    PrimitiveDef { name: "-", arity: 2, apply: sub },
    PrimitiveDef { name: "*", arity: 2, apply: mul },
    PrimitiveDef { name: "/", arity: 2, apply: div },
    PrimitiveDef { name: "%", arity: 2, apply: rem },
    PrimitiveDef { name: "===", arity: 2, apply: strict_eq },
    PrimitiveDef { name: "!==", arity: 2, apply: strict_ne },
    PrimitiveDef { name: "<", arity: 2, apply: lt },
    PrimitiveDef { name: ">", arity: 2, apply: gt },
    PrimitiveDef { name: "<=", arity: 2, apply: le },
    PrimitiveDef { name: ">=", arity: 2, apply: ge },
    PrimitiveDef { name: "!", arity: 1, apply: not },
    PrimitiveDef { name: "-unary", arity: 1, apply: negate },
    PrimitiveDef { name: "display", arity: 1, apply: display },
    PrimitiveDef { name: "math_abs", arity: 1, apply: math_abs },
    PrimitiveDef { name: "math_floor", arity: 1, apply: math_floor },
    PrimitiveDef { name: "math_sqrt", arity: 1, apply: math_sqrt },
    PrimitiveDef { name: "math_max", arity: 2, apply: math_max },
    PrimitiveDef { name: "math_min", arity: 2, apply: math_min },
    PrimitiveDef { name: "is_number", arity: 1, apply: is_number },
    PrimitiveDef { name: "is_boolean", arity: 1, apply: is_boolean },
    PrimitiveDef { name: "is_string", arity: 1, apply: is_string },
    PrimitiveDef { name: "is_undefined", arity: 1, apply: is_undefined },
    PrimitiveDef { name: "is_function", arity: 1, apply: is_function },
];

pub fn lookup(id: usize) -> Option<&'static PrimitiveDef> {
    PRIMITIVES.get(id)
}

/// The outermost compile-time scope: every primitive, in id order.
pub fn global_compile_env() -> CompileEnv {
    CompileEnv::empty().extend(
        PRIMITIVES
            .iter()
            .map(|def| Binding::constant(def.name))
            .collect(),
    )
}

// =========================================================================
// Argument helpers
// =========================================================================

fn number(args: &[Unboxed], i: usize, context: &str) -> Result<f64, RuntimeError> {
    match args.get(i) {
        Some(Unboxed::Prim(Prim::Number(n))) => Ok(*n),
        Some(other) => Err(type_error("number", other.type_name(), context)),
        None => Err(type_error("number", "nothing", context)),
    }
}

fn numbers(args: &[Unboxed], context: &str) -> Result<(f64, f64), RuntimeError> {
    Ok((number(args, 0, context)?, number(args, 1, context)?))
}

fn boolean(args: &[Unboxed], i: usize, context: &str) -> Result<bool, RuntimeError> {
    match args.get(i) {
        Some(Unboxed::Prim(Prim::Bool(b))) => Ok(*b),
        Some(other) => Err(type_error("boolean", other.type_name(), context)),
        None => Err(type_error("boolean", "nothing", context)),
    }
}

fn arg(args: &[Unboxed], i: usize, context: &str) -> Result<Unboxed, RuntimeError> {
    args.get(i)
        .copied()
        .ok_or_else(|| type_error("an argument", "nothing", context))
}

// =========================================================================
// Arithmetic
// =========================================================================

/// Numeric addition, or concatenation when either side is a string.
fn add(host: &mut Host, args: &[Unboxed]) -> Result<Prim, RuntimeError> {
    let (a, b) = (arg(args, 0, "+")?, arg(args, 1, "+")?);
    match (a, b) {
        (Unboxed::Prim(Prim::Number(x)), Unboxed::Prim(Prim::Number(y))) => Ok(Prim::Number(x + y)),
        (Unboxed::Prim(Prim::Str(_)), Unboxed::Prim(_))
        | (Unboxed::Prim(_), Unboxed::Prim(Prim::Str(_))) => {
            let joined = format!("{}{}", host.concat_text(a), host.concat_text(b));
            Ok(Prim::Str(host.intern(&joined)))
        }
        (Unboxed::Prim(Prim::Number(_)), other) | (other, _) => {
            Err(type_error("numbers or strings", other.type_name(), "+"))
        }
    }
}

fn sub(_: &mut Host, args: &[Unboxed]) -> Result<Prim, RuntimeError> {
    let (x, y) = numbers(args, "-")?;
    Ok(Prim::Number(x - y))
}

fn mul(_: &mut Host, args: &[Unboxed]) -> Result<Prim, RuntimeError> {
    let (x, y) = numbers(args, "*")?;
    Ok(Prim::Number(x * y))
}

fn div(_: &mut Host, args: &[Unboxed]) -> Result<Prim, RuntimeError> {
    let (x, y) = numbers(args, "/")?;
    Ok(Prim::Number(x / y))
}

fn rem(_: &mut Host, args: &[Unboxed]) -> Result<Prim, RuntimeError> {
    let (x, y) = numbers(args, "%")?;
    Ok(Prim::Number(x % y))
}

fn negate(_: &mut Host, args: &[Unboxed]) -> Result<Prim, RuntimeError> {
    Ok(Prim::Number(-number(args, 0, "-")?))
}

// =========================================================================
// Comparison
// =========================================================================

fn identical(a: Unboxed, b: Unboxed) -> bool {
    match (a, b) {
        (Unboxed::Prim(Prim::Number(x)), Unboxed::Prim(Prim::Number(y))) => x == y,
        (Unboxed::Prim(x), Unboxed::Prim(y)) => x == y,
        (Unboxed::Closure { node: x, .. }, Unboxed::Closure { node: y, .. }) => x == y,
        (Unboxed::Primitive(x), Unboxed::Primitive(y)) => x == y,
        _ => false,
    }
}

fn strict_eq(_: &mut Host, args: &[Unboxed]) -> Result<Prim, RuntimeError> {
    Ok(Prim::Bool(identical(arg(args, 0, "===")?, arg(args, 1, "===")?)))
}

fn strict_ne(_: &mut Host, args: &[Unboxed]) -> Result<Prim, RuntimeError> {
    Ok(Prim::Bool(!identical(arg(args, 0, "!==")?, arg(args, 1, "!==")?)))
}

/// Numbers compare numerically, strings lexicographically.
fn compare(
    host: &Host,
    args: &[Unboxed],
    context: &str,
    test: fn(std::cmp::Ordering) -> bool,
) -> Result<Prim, RuntimeError> {
    match (arg(args, 0, context)?, arg(args, 1, context)?) {
        (Unboxed::Prim(Prim::Number(x)), Unboxed::Prim(Prim::Number(y))) => {
            Ok(Prim::Bool(x.partial_cmp(&y).is_some_and(test)))
        }
        (Unboxed::Prim(Prim::Str(x)), Unboxed::Prim(Prim::Str(y))) => {
            Ok(Prim::Bool(test(host.string(x).cmp(host.string(y)))))
        }
        (Unboxed::Prim(Prim::Number(_)), other) | (other, _) => {
            Err(type_error("two numbers or two strings", other.type_name(), context))
        }
    }
}

fn lt(host: &mut Host, args: &[Unboxed]) -> Result<Prim, RuntimeError> {
    compare(host, args, "<", |o| o.is_lt())
}

fn gt(host: &mut Host, args: &[Unboxed]) -> Result<Prim, RuntimeError> {
    compare(host, args, ">", |o| o.is_gt())
}

fn le(host: &mut Host, args: &[Unboxed]) -> Result<Prim, RuntimeError> {
    compare(host, args, "<=", |o| o.is_le())
}

fn ge(host: &mut Host, args: &[Unboxed]) -> Result<Prim, RuntimeError> {
    compare(host, args, ">=", |o| o.is_ge())
}

fn not(_: &mut Host, args: &[Unboxed]) -> Result<Prim, RuntimeError> {
    Ok(Prim::Bool(!boolean(args, 0, "!")?))
}

// =========================================================================
// Library
// =========================================================================

fn display(host: &mut Host, args: &[Unboxed]) -> Result<Prim, RuntimeError> {
    let text = host.render(arg(args, 0, "display")?);
    println!("{}", text);
    host.output.push(text);
    Ok(Prim::Undefined)
}

fn math_abs(_: &mut Host, args: &[Unboxed]) -> Result<Prim, RuntimeError> {
    Ok(Prim::Number(number(args, 0, "math_abs")?.abs()))
}

fn math_floor(_: &mut Host, args: &[Unboxed]) -> Result<Prim, RuntimeError> {
    Ok(Prim::Number(number(args, 0, "math_floor")?.floor()))
}

fn math_sqrt(_: &mut Host, args: &[Unboxed]) -> Result<Prim, RuntimeError> {
    Ok(Prim::Number(number(args, 0, "math_sqrt")?.sqrt()))
}

fn math_max(_: &mut Host, args: &[Unboxed]) -> Result<Prim, RuntimeError> {
    let (x, y) = numbers(args, "math_max")?;
    Ok(Prim::Number(x.max(y)))
}

fn math_min(_: &mut Host, args: &[Unboxed]) -> Result<Prim, RuntimeError> {
    let (x, y) = numbers(args, "math_min")?;
    Ok(Prim::Number(x.min(y)))
}

fn is_number(_: &mut Host, args: &[Unboxed]) -> Result<Prim, RuntimeError> {
    let value = arg(args, 0, "is_number")?;
    Ok(Prim::Bool(matches!(value, Unboxed::Prim(Prim::Number(_)))))
}

fn is_boolean(_: &mut Host, args: &[Unboxed]) -> Result<Prim, RuntimeError> {
    let value = arg(args, 0, "is_boolean")?;
    Ok(Prim::Bool(matches!(value, Unboxed::Prim(Prim::Bool(_)))))
}

fn is_string(_: &mut Host, args: &[Unboxed]) -> Result<Prim, RuntimeError> {
    let value = arg(args, 0, "is_string")?;
    Ok(Prim::Bool(matches!(value, Unboxed::Prim(Prim::Str(_)))))
}

fn is_undefined(_: &mut Host, args: &[Unboxed]) -> Result<Prim, RuntimeError> {
    let value = arg(args, 0, "is_undefined")?;
    Ok(Prim::Bool(matches!(value, Unboxed::Prim(Prim::Undefined))))
}

fn is_function(_: &mut Host, args: &[Unboxed]) -> Result<Prim, RuntimeError> {
    let value = arg(args, 0, "is_function")?;
    Ok(Prim::Bool(matches!(
        value,
        Unboxed::Closure { .. } | Unboxed::Primitive(_)
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::heap::NodeRef;
    use crate::runtime::runtime_error::RuntimeErrorKind;

    fn apply(name: &str, host: &mut Host, args: &[Unboxed]) -> Result<Prim, RuntimeError> {
        let def = PRIMITIVES
            .iter()
            .find(|def| def.name == name)
            .expect("unknown primitive");
        (def.apply)(host, args)
    }

    fn n(x: f64) -> Unboxed {
        Unboxed::Prim(Prim::Number(x))
    }

    fn b(x: bool) -> Unboxed {
        Unboxed::Prim(Prim::Bool(x))
    }

    #[test]
    fn test_names_are_unique() {
        let mut names: Vec<_> = PRIMITIVES.iter().map(|def| def.name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), PRIMITIVES.len());
    }

    #[test]
    fn test_global_env_matches_table_order() {
        let env = global_compile_env();
        for (id, def) in PRIMITIVES.iter().enumerate() {
            let address = env.resolve(def.name).unwrap();
            assert_eq!((address.frame, address.slot), (0, id));
        }
    }

    #[test]
    fn test_arithmetic() {
        let mut host = Host::new();
        assert_eq!(apply("+", &mut host, &[n(1.0), n(2.0)]).unwrap(), Prim::Number(3.0));
        assert_eq!(apply("-", &mut host, &[n(1.0), n(2.0)]).unwrap(), Prim::Number(-1.0));
        assert_eq!(apply("*", &mut host, &[n(3.0), n(2.0)]).unwrap(), Prim::Number(6.0));
        assert_eq!(apply("/", &mut host, &[n(3.0), n(2.0)]).unwrap(), Prim::Number(1.5));
        assert_eq!(apply("%", &mut host, &[n(7.0), n(4.0)]).unwrap(), Prim::Number(3.0));
        assert_eq!(apply("-unary", &mut host, &[n(7.0)]).unwrap(), Prim::Number(-7.0));
    }

    #[test]
    fn test_division_by_zero_follows_floats() {
        let mut host = Host::new();
        assert_eq!(
            apply("/", &mut host, &[n(1.0), n(0.0)]).unwrap(),
            Prim::Number(f64::INFINITY)
        );
    }

    #[test]
    fn test_arithmetic_type_error() {
        let mut host = Host::new();
        let err = apply("*", &mut host, &[n(1.0), b(true)]).unwrap_err();
        assert_eq!(err.kind, RuntimeErrorKind::TypeError);
        assert!(err.message.contains("expects number, got boolean"));
    }

    #[test]
    fn test_string_concatenation() {
        let mut host = Host::new();
        let hello = Unboxed::Prim(Prim::Str(host.intern("n = ")));

        let joined = apply("+", &mut host, &[hello, n(4.0)]).unwrap();
        assert_eq!(host.to_value(joined), Value::Str("n = 4".to_string()));
    }

    #[test]
    fn test_add_rejects_functions() {
        let mut host = Host::new();
        let f = Unboxed::Primitive(0);
        assert!(apply("+", &mut host, &[n(1.0), f]).is_err());
        assert!(apply("+", &mut host, &[f, n(1.0)]).is_err());
    }

    #[test]
    fn test_strict_equality() {
        let mut host = Host::new();
        let s1 = Unboxed::Prim(Prim::Str(host.intern("a")));
        let s2 = Unboxed::Prim(Prim::Str(host.intern("a")));
        let f = Unboxed::Closure {
            node: NodeRef::at(8),
            arity: 0,
        };
        let g = Unboxed::Closure {
            node: NodeRef::at(16),
            arity: 0,
        };

        assert_eq!(apply("===", &mut host, &[n(1.0), n(1.0)]).unwrap(), Prim::Bool(true));
        assert_eq!(apply("===", &mut host, &[n(1.0), b(true)]).unwrap(), Prim::Bool(false));
        assert_eq!(apply("===", &mut host, &[s1, s2]).unwrap(), Prim::Bool(true));
        assert_eq!(apply("===", &mut host, &[f, f]).unwrap(), Prim::Bool(true));
        assert_eq!(apply("!==", &mut host, &[f, g]).unwrap(), Prim::Bool(true));
        assert_eq!(
            apply("===", &mut host, &[n(f64::NAN), n(f64::NAN)]).unwrap(),
            Prim::Bool(false)
        );
    }

    #[test]
    fn test_ordering() {
        let mut host = Host::new();
        let a = Unboxed::Prim(Prim::Str(host.intern("apple")));
        let z = Unboxed::Prim(Prim::Str(host.intern("zebra")));

        assert_eq!(apply("<", &mut host, &[n(1.0), n(2.0)]).unwrap(), Prim::Bool(true));
        assert_eq!(apply(">=", &mut host, &[n(2.0), n(2.0)]).unwrap(), Prim::Bool(true));
        assert_eq!(apply(">", &mut host, &[a, z]).unwrap(), Prim::Bool(false));
        assert!(apply("<", &mut host, &[a, n(1.0)]).is_err());
    }

    #[test]
    fn test_not_requires_boolean() {
        let mut host = Host::new();
        assert_eq!(apply("!", &mut host, &[b(false)]).unwrap(), Prim::Bool(true));
        assert!(apply("!", &mut host, &[n(0.0)]).is_err());
    }

    #[test]
    fn test_display_records_output() {
        let mut host = Host::new();
        let result = apply("display", &mut host, &[n(42.0)]).unwrap();

        assert_eq!(result, Prim::Undefined);
        assert_eq!(host.output, vec!["42".to_string()]);
    }

    #[test]
    fn test_predicates() {
        let mut host = Host::new();
        assert_eq!(apply("is_number", &mut host, &[n(1.0)]).unwrap(), Prim::Bool(true));
        assert_eq!(apply("is_boolean", &mut host, &[n(1.0)]).unwrap(), Prim::Bool(false));
        assert_eq!(
            apply("is_undefined", &mut host, &[Unboxed::Prim(Prim::Undefined)]).unwrap(),
            Prim::Bool(true)
        );
        assert_eq!(
            apply("is_function", &mut host, &[Unboxed::Primitive(3)]).unwrap(),
            Prim::Bool(true)
        );
    }

    #[test]
    fn test_math() {
        let mut host = Host::new();
        assert_eq!(apply("math_abs", &mut host, &[n(-2.0)]).unwrap(), Prim::Number(2.0));
        assert_eq!(apply("math_floor", &mut host, &[n(2.7)]).unwrap(), Prim::Number(2.0));
        assert_eq!(apply("math_sqrt", &mut host, &[n(9.0)]).unwrap(), Prim::Number(3.0));
        assert_eq!(apply("math_max", &mut host, &[n(1.0), n(5.0)]).unwrap(), Prim::Number(5.0));
        assert_eq!(apply("math_min", &mut host, &[n(1.0), n(5.0)]).unwrap(), Prim::Number(1.0));
    }

    #[test]
    fn test_intern_dedups() {
        let mut host = Host::new();
        let a = host.intern("x");
        let b = host.intern("x");
        let c = host.intern("y");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(host.string(c), "y");
    }

    #[test]
    fn test_retain_strings_releases_and_reuses_ids() {
        let mut host = Host::new();
        let keep = host.intern("keep");
        let gone = host.intern("gone");

        host.retain_strings([keep]);

        assert_eq!(host.string_count(), 1);
        assert_eq!(host.string(keep), "keep");
        assert_eq!(host.intern("again"), gone);
        assert_eq!(host.intern("keep"), keep);
    }
}
