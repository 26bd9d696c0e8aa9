//! Stop-and-copy collection (Cheney's algorithm).
//!
//! The semispaces swap roles, every root is copied into the new active
//! space, and a `scan` cursor then walks the copied nodes breadth-first,
//! copying each child it finds until it catches up with `free`. The old
//! location of every copied node holds a `Forward` word so shared and
//! cyclic structure is copied once.

use crate::runtime::heap::{HEADER_SIZE, Heap, HeapError, NodeRef, RootSet, Word};

impl Heap {
    /// Copy everything reachable from `roots` into the inactive semispace
    /// and make it the active one. Roots are rewritten in place.
    pub fn collect(&mut self, roots: &mut impl RootSet) -> Result<(), HeapError> {
        let from_start = self.to_start;
        let from_end = self.free;
        let from_epoch = self.epoch;
        self.epoch = self.epoch.wrapping_add(1);

        self.to_start = if from_start == 0 { self.semispace } else { 0 };
        self.free = self.to_start;

        let mut failure = None;
        roots.visit_roots(&mut |root: &mut NodeRef| match self.evacuate(*root, from_start, from_end, from_epoch) {
            Ok(moved) => *root = moved,
            Err(e) => {
                failure.get_or_insert(e);
            }
        });
        if let Some(e) = failure {
            return Err(e);
        }

        let mut scan = self.to_start;
        while scan < self.free {
            let size = self.count_at(scan + 1)?;
            let children = self.count_at(scan + 2)?;

            for at in scan + HEADER_SIZE..scan + HEADER_SIZE + children {
                if let Word::Ref(child) = self.words[at] {
                    let moved = self.evacuate(child, from_start, from_end, from_epoch)?;
                    self.words[at] = Word::Ref(moved);
                }
            }

            scan += size;
        }

        let live = self.used();
        self.stats.collections += 1;
        self.stats.words_copied += live;
        self.stats.live_words = live;

        // Anything still pointing into the old half now fails loudly. The
        // epoch stamp covers references that outlive a second collection.
        if cfg!(debug_assertions) {
            self.words[from_start..from_start + self.semispace].fill(Word::Empty);
        }

        log::debug!(
            "gc #{}: {} of {} words live",
            self.stats.collections,
            live,
            from_end - from_start
        );

        Ok(())
    }

    /// Copy one node out of the old semispace, or follow its forwarding
    /// pointer if it was already copied.
    fn evacuate(
        &mut self,
        node: NodeRef,
        from_start: usize,
        from_end: usize,
        from_epoch: u32,
    ) -> Result<NodeRef, HeapError> {
        let index = node.index();
        if node.epoch() != from_epoch || index < from_start || index >= from_end {
            return Err(HeapError::StaleReference { index });
        }

        match self.words[index] {
            Word::Forward(moved) => Ok(moved),
            Word::Tag(_) => {
                let size = self.count_at(index + 1)?;
                let moved = self.free;
                self.words.copy_within(index..index + size, moved);
                self.free += size;
                let moved = NodeRef::new(moved, self.epoch);
                self.words[index] = Word::Forward(moved);
                Ok(moved)
            }
            _ => Err(HeapError::StaleReference { index }),
        }
    }
}
