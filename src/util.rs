use std::cell::Cell;

thread_local!(static ID_GEN: IdGen = IdGen::new());

struct IdGen {
    next: Cell<usize>,
}

impl IdGen {
    const fn new() -> Self {
        IdGen { next: Cell::new(0) }
    }

    fn next(&self) -> usize {
        let next = self.next.get();

        self.next.set(next + 1);

        next
    }
}

/// Returns an identifier that is unique among the GPU objects created on the current thread.
pub(crate) fn next_object_id() -> usize {
    ID_GEN.with(|id_gen| id_gen.next())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_object_id_is_monotonic() {
        let a = next_object_id();
        let b = next_object_id();
        let c = next_object_id();

        assert!(a < b);
        assert!(b < c);
    }
}
