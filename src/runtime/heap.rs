use crate::runtime::value::Prim;

/// Words in a node header: kind, size, child count.
pub const HEADER_SIZE: usize = 3;

const KIND: usize = 0;
const SIZE: usize = 1;
const CHILDREN: usize = 2;

/// Reference to a node: the heap index of its header, stamped with the
/// collection epoch it was handed out in.
///
/// Only valid until the next collection unless it is reachable from a
/// root, in which case the collector rewrites the root in place. A
/// reference from an earlier epoch is stale even when its index lands on
/// a live header again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRef {
    index: usize,
    epoch: u32,
}

impl NodeRef {
    pub(crate) fn new(index: usize, epoch: u32) -> Self {
        NodeRef { index, epoch }
    }

    #[cfg(test)]
    pub(crate) fn at(index: usize) -> Self {
        NodeRef::new(index, 0)
    }

    pub fn index(self) -> usize {
        self.index
    }

    pub(crate) fn epoch(self) -> u32 {
        self.epoch
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Environment,
    Closure,
    PrimitiveFunction,
    CallFrame,
    BlockFrame,
    OperandStack,
    Boxed,
}

/// One heap slot.
///
/// Slots are typed so that a payload read where a reference is expected
/// (or the reverse) is caught instead of silently misread.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Word {
    /// Free, or an unoccupied operand-stack slot.
    Empty,
    /// Header word 0.
    Tag(NodeKind),
    /// Header sizes and scalar payloads (arity, addresses, stack top).
    Count(usize),
    /// Reference to another node; followed by the collector.
    Ref(NodeRef),
    /// Broken heart left behind by the collector.
    Forward(NodeRef),
    /// "No node", e.g. the enclosing link of the global environment.
    Nil,
    /// Environment slot whose declaration has not run yet.
    Unassigned,
    /// Payload of a boxed value.
    Prim(Prim),
}

#[derive(Debug, Clone, PartialEq)]
pub enum HeapError {
    OutOfMemory { requested: usize, available: usize },
    StaleReference { index: usize },
    KindMismatch {
        index: usize,
        expected: NodeKind,
        found: NodeKind,
    },
    OffsetOutOfBounds { index: usize, offset: usize },
    UnexpectedWord {
        index: usize,
        offset: usize,
        expected: &'static str,
        found: Word,
    },
    CorruptHeader { index: usize },
    OperandStackOverflow { capacity: usize },
    OperandStackUnderflow,
}

impl std::fmt::Display for HeapError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HeapError::OutOfMemory {
                requested,
                available,
            } => write!(
                f,
                "out of memory: requested {} words, {} available after collection",
                requested, available
            ),
            HeapError::StaleReference { index } => {
                write!(f, "stale node reference @{} (node moved or freed)", index)
            }
            HeapError::KindMismatch {
                index,
                expected,
                found,
            } => write!(
                f,
                "node @{} is {:?}, expected {:?}",
                index, found, expected
            ),
            HeapError::OffsetOutOfBounds { index, offset } => {
                write!(f, "offset {} is outside node @{}", offset, index)
            }
            HeapError::UnexpectedWord {
                index,
                offset,
                expected,
                found,
            } => write!(
                f,
                "node @{} offset {} holds {:?}, expected {}",
                index, offset, found, expected
            ),
            HeapError::CorruptHeader { index } => write!(f, "corrupt node header @{}", index),
            HeapError::OperandStackOverflow { capacity } => write!(
                f,
                "operand stack overflow: push beyond static bound of {}",
                capacity
            ),
            HeapError::OperandStackUnderflow => write!(f, "operand stack underflow"),
        }
    }
}

impl std::error::Error for HeapError {}

/// Everything the collector must treat as live and may relocate.
pub trait RootSet {
    fn visit_roots(&mut self, visit: &mut dyn FnMut(&mut NodeRef));
}

/// A plain list of roots, used while bootstrapping the machine.
impl RootSet for Vec<NodeRef> {
    fn visit_roots(&mut self, visit: &mut dyn FnMut(&mut NodeRef)) {
        self.iter_mut().for_each(|root| visit(root));
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
    pub capacity: usize,
    pub collections: usize,
    pub words_copied: usize,
    pub live_words: usize,
}

/// Fixed-capacity word array split into two equal semispaces.
///
/// Allocation bumps `free` through the active semispace; when it runs
/// out, [`Heap::collect`] copies the live nodes into the other half.
pub struct Heap {
    pub(crate) words: Vec<Word>,
    pub(crate) semispace: usize,
    /// Base of the active semispace.
    pub(crate) to_start: usize,
    /// Next free word of the active semispace.
    pub(crate) free: usize,
    /// Bumped by every collection.
    pub(crate) epoch: u32,
    pub(crate) stats: HeapStats,
}

impl Heap {
    pub fn new(capacity: usize) -> Self {
        let semispace = capacity / 2;
        Self {
            words: vec![Word::Empty; semispace * 2],
            semispace,
            to_start: 0,
            free: 0,
            epoch: 0,
            stats: HeapStats {
                capacity: semispace * 2,
                ..HeapStats::default()
            },
        }
    }

    pub fn stats(&self) -> HeapStats {
        self.stats
    }

    /// The allocated part of the active semispace.
    pub fn live_words(&self) -> &[Word] {
        &self.words[self.to_start..self.free]
    }

    /// Words in use in the active semispace.
    pub fn used(&self) -> usize {
        self.free - self.to_start
    }

    pub fn available(&self) -> usize {
        self.to_start + self.semispace - self.free
    }

    /// Allocate a node of `size` words whose first `child_count` payload
    /// words are references. Collects first if the active semispace is
    /// short; every reference not reachable from `roots` is invalid after
    /// this call.
    pub fn allocate(
        &mut self,
        roots: &mut impl RootSet,
        kind: NodeKind,
        size: usize,
        child_count: usize,
    ) -> Result<NodeRef, HeapError> {
        debug_assert!(size >= HEADER_SIZE + child_count);

        if size > self.available() {
            self.collect(roots)?;
            if size > self.available() {
                return Err(HeapError::OutOfMemory {
                    requested: size,
                    available: self.available(),
                });
            }
        }

        let node = NodeRef::new(self.free, self.epoch);
        self.words[self.free + KIND] = Word::Tag(kind);
        self.words[self.free + SIZE] = Word::Count(size);
        self.words[self.free + CHILDREN] = Word::Count(child_count);
        self.words[self.free + HEADER_SIZE..self.free + size].fill(Word::Empty);
        self.free += size;

        Ok(node)
    }

    /// Kind of a live node. Fails loudly on references from an earlier
    /// epoch and on references that do not point at a header inside the
    /// allocated part of the active semispace.
    pub fn kind(&self, node: NodeRef) -> Result<NodeKind, HeapError> {
        let index = node.index;
        if node.epoch != self.epoch {
            return Err(HeapError::StaleReference { index });
        }
        if index < self.to_start || index + HEADER_SIZE > self.free {
            return Err(HeapError::StaleReference { index });
        }
        match self.words[index + KIND] {
            Word::Tag(kind) => Ok(kind),
            _ => Err(HeapError::StaleReference { index }),
        }
    }

    pub fn expect(&self, node: NodeRef, expected: NodeKind) -> Result<(), HeapError> {
        let found = self.kind(node)?;
        if found != expected {
            return Err(HeapError::KindMismatch {
                index: node.index,
                expected,
                found,
            });
        }
        Ok(())
    }

    pub fn size(&self, node: NodeRef) -> Result<usize, HeapError> {
        self.kind(node)?;
        self.count_at(node.index + SIZE)
    }

    pub fn child_count(&self, node: NodeRef) -> Result<usize, HeapError> {
        self.kind(node)?;
        self.count_at(node.index + CHILDREN)
    }

    /// Read the word at `offset` from the node's header.
    pub fn read(&self, node: NodeRef, offset: usize) -> Result<Word, HeapError> {
        self.check_offset(node, offset)?;
        Ok(self.words[node.index + offset])
    }

    pub fn write(&mut self, node: NodeRef, offset: usize, word: Word) -> Result<(), HeapError> {
        self.check_offset(node, offset)?;
        self.words[node.index + offset] = word;
        Ok(())
    }

    fn check_offset(&self, node: NodeRef, offset: usize) -> Result<(), HeapError> {
        if offset < HEADER_SIZE || offset >= self.size(node)? {
            return Err(HeapError::OffsetOutOfBounds {
                index: node.index,
                offset,
            });
        }
        Ok(())
    }

    pub(crate) fn count_at(&self, index: usize) -> Result<usize, HeapError> {
        match self.words[index] {
            Word::Count(n) => Ok(n),
            _ => Err(HeapError::CorruptHeader { index }),
        }
    }
}
