use crate::runtime::heap::{NodeRef, RootSet};

/// Machine state that the collector must see.
///
/// Anything a handler needs across an allocation goes here first: into
/// `env`/`os`, onto `control`, or onto `pinned` for temporaries that are
/// not yet linked into anything.
#[derive(Debug, Clone)]
pub struct Registers {
    pub pc: usize,
    pub env: NodeRef,
    pub os: NodeRef,
    /// Call and block frames, innermost last.
    pub control: Vec<NodeRef>,
    pub pinned: Vec<NodeRef>,
}

impl Registers {
    pub fn new(env: NodeRef, os: NodeRef) -> Self {
        Registers {
            pc: 0,
            env,
            os,
            control: Vec::new(),
            pinned: Vec::new(),
        }
    }
}

impl RootSet for Registers {
    fn visit_roots(&mut self, visit: &mut dyn FnMut(&mut NodeRef)) {
        visit(&mut self.env);
        visit(&mut self.os);
        self.control.iter_mut().for_each(|frame| visit(frame));
        self.pinned.iter_mut().for_each(|node| visit(node));
    }
}
