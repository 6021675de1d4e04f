use std::cell::RefCell;

/// Memo of computed indicator values, one slot per bar.
///
/// A slot is written at most once. The borrow is never held while a value is
/// being computed, so an indicator may recurse into its own cache (or into an
/// upstream indicator sharing the same thread) without a `BorrowMutError`.
#[derive(Debug)]
pub struct IndicatorCache<N> {
    slots: RefCell<Vec<Option<Option<N>>>>,
}

impl<N: Copy> IndicatorCache<N> {
    pub fn new(len: usize) -> Self {
        Self {
            slots: RefCell::new(vec![None; len]),
        }
    }

    /// `Some(value)` if `index` was already computed (value may itself be `None`).
    pub fn get(&self, index: usize) -> Option<Option<N>> {
        self.slots.borrow().get(index).copied().flatten()
    }

    pub fn store(&self, index: usize, value: Option<N>) {
        if let Some(slot) = self.slots.borrow_mut().get_mut(index) {
            if slot.is_none() {
                *slot = Some(value);
            }
        }
    }

    pub fn get_or_compute(&self, index: usize, compute: impl FnOnce() -> Option<N>) -> Option<N> {
        if let Some(hit) = self.get(index) {
            return hit;
        }
        let value = compute();
        self.store(index, value);
        value
    }

    /// Highest index in `from..=to` holding a defined value.
    pub fn latest_defined(&self, from: usize, to: usize) -> Option<(usize, N)> {
        let slots = self.slots.borrow();
        (from..=to)
            .rev()
            .find_map(|i| match slots.get(i) {
                Some(Some(Some(v))) => Some((i, *v)),
                _ => None,
            })
    }

    pub fn computed(&self) -> usize {
        self.slots.borrow().iter().filter(|s| s.is_some()).count()
    }
}
