use std::rc::Rc;

/// A resolved lexical address: `frame` scopes outward, `slot` within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Address {
    pub frame: usize,
    pub slot: usize,
}

/// One declared name of a scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub name: String,
    pub constant: bool,
}

impl Binding {
    pub fn constant(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constant: true,
        }
    }

    pub fn variable(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constant: false,
        }
    }
}

#[derive(Debug)]
struct Scope {
    bindings: Vec<Binding>,
    parent: CompileEnv,
}

/// Compile-time environment.
///
/// A persistent chain of scopes mirroring the runtime environment chain:
/// every compiler rule that makes the machine extend its environment
/// extends this chain the same way, so a `(frame, slot)` computed here
/// names the same slot at runtime. Extending never mutates the original,
/// which keeps sibling scopes independent.
#[derive(Debug, Clone, Default)]
pub struct CompileEnv {
    innermost: Option<Rc<Scope>>,
}

impl CompileEnv {
    pub fn empty() -> Self {
        Self::default()
    }

    /// A new chain with one more scope holding `bindings` in slot order.
    pub fn extend(&self, bindings: Vec<Binding>) -> Self {
        Self {
            innermost: Some(Rc::new(Scope {
                bindings,
                parent: self.clone(),
            })),
        }
    }

    pub fn resolve(&self, name: &str) -> Option<Address> {
        self.lookup(name).map(|(address, _)| address)
    }

    /// Like [`CompileEnv::resolve`], also returning the binding found.
    pub fn lookup(&self, name: &str) -> Option<(Address, &Binding)> {
        let mut frame = 0;
        let mut env = self;

        while let Some(scope) = &env.innermost {
            if let Some(slot) = scope.bindings.iter().position(|b| b.name == name) {
                return Some((Address { frame, slot }, &scope.bindings[slot]));
            }
            frame += 1;
            env = &scope.parent;
        }

        None
    }

    /// Number of scopes in the chain.
    #[cfg(test)]
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut env = self;
        while let Some(scope) = &env.innermost {
            depth += 1;
            env = &scope.parent;
        }
        depth
    }

    /// Slot count of the innermost scope.
    #[cfg(test)]
    pub fn innermost_len(&self) -> usize {
        self.innermost
            .as_ref()
            .map(|scope| scope.bindings.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(ns: &[&str]) -> Vec<Binding> {
        ns.iter().map(|n| Binding::constant(*n)).collect()
    }

    #[test]
    fn test_resolve_innermost_first() {
        let env = CompileEnv::empty()
            .extend(names(&["a", "b"]))
            .extend(names(&["c", "a"]));

        assert_eq!(env.resolve("a"), Some(Address { frame: 0, slot: 1 }));
        assert_eq!(env.resolve("c"), Some(Address { frame: 0, slot: 0 }));
        assert_eq!(env.resolve("b"), Some(Address { frame: 1, slot: 1 }));
    }

    #[test]
    fn test_unknown_name() {
        let env = CompileEnv::empty().extend(names(&["a"]));
        assert_eq!(env.resolve("zzz"), None);
    }

    #[test]
    fn test_extend_leaves_original_untouched() {
        let outer = CompileEnv::empty().extend(names(&["x"]));
        let inner = outer.extend(names(&["y"]));

        assert_eq!(outer.resolve("y"), None);
        assert_eq!(outer.depth(), 1);
        assert_eq!(inner.depth(), 2);
        assert_eq!(inner.resolve("x"), Some(Address { frame: 1, slot: 0 }));
    }

    #[test]
    fn test_empty_scope_still_counts_as_frame() {
        let env = CompileEnv::empty()
            .extend(names(&["x"]))
            .extend(Vec::new());

        assert_eq!(env.resolve("x"), Some(Address { frame: 1, slot: 0 }));
        assert_eq!(env.innermost_len(), 0);
    }

    #[test]
    fn test_lookup_reports_constness() {
        let env = CompileEnv::empty().extend(vec![
            Binding::constant("k"),
            Binding::variable("v"),
        ]);

        assert!(env.lookup("k").unwrap().1.constant);
        assert!(!env.lookup("v").unwrap().1.constant);
    }
}
