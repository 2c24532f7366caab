use parking_lot::Mutex;
use tracing::debug;

/// Positional, 0-based index of a row in column storage.
///
/// Identifiers are stable for the lifetime of a row: soft deletion never
/// shifts or reuses them.
pub type RowId = usize;

/// Physical storage behind a [Column].
///
/// `data` is fully allocated up to the column's capacity; only the first
/// `num_items` slots are meaningful.
#[derive(Debug)]
struct ColumnData {
    data: Vec<i64>,
    num_items: usize,
}

impl ColumnData {
    /// Reallocates to `new_capacity` slots, carrying the logical entries over.
    fn grow(&mut self, new_capacity: usize) {
        debug!(
            old_capacity = self.data.len(),
            new_capacity, "growing column storage"
        );
        let mut data = vec![0; new_capacity];
        data[..self.num_items].copy_from_slice(&self.data[..self.num_items]);
        self.data = data;
    }

    fn logical(&self) -> &[i64] {
        &self.data[..self.num_items]
    }
}

/// A growable, append-only column of 64-bit integers.
///
/// The logical length is tracked separately from the physical capacity, which
/// doubles whenever an append would overflow it. All access goes through the
/// column's own lock, so concurrent loads, appends and scans never observe a
/// half-copied buffer.
#[derive(Debug)]
pub struct Column {
    name: String,
    inner: Mutex<ColumnData>,
}

impl Column {
    /// Creates an empty column pre-allocating `capacity` slots.
    ///
    /// A capacity of zero is bumped to one so growth by doubling makes progress.
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            inner: Mutex::new(ColumnData {
                data: vec![0; capacity.max(1)],
                num_items: 0,
            }),
        }
    }

    /// Name of the column, fixed at creation.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Replaces the logical content of the column with `values`.
    ///
    /// This is a bulk overwrite, not an append: when `values` does not fit the
    /// current capacity the storage is reallocated to twice `values.len()`
    /// without preserving the old content.
    ///
    /// # Example
    /// ```
    /// # use colstore::Column;
    /// let col = Column::new("squares", 4);
    /// col.load(&[1, 4, 9, 16, 25]);
    ///
    /// assert_eq!(col.len(), 5);
    /// assert_eq!(col.capacity(), 10);
    /// assert_eq!(col.values(), vec![1, 4, 9, 16, 25]);
    /// ```
    pub fn load(&self, values: &[i64]) {
        let mut inner = self.inner.lock();
        if values.len() > inner.data.len() {
            debug!(
                column = %self.name,
                old_capacity = inner.data.len(),
                new_capacity = 2 * values.len(),
                "reallocating column for bulk load"
            );
            inner.data = vec![0; 2 * values.len()];
        }
        inner.data[..values.len()].copy_from_slice(values);
        inner.num_items = values.len();
    }

    /// Appends `value` at the end of the logical content.
    ///
    /// Doubles the capacity first if the column is full. Never fails.
    pub fn insert(&self, value: i64) {
        let mut inner = self.inner.lock();
        if inner.num_items + 1 > inner.data.len() {
            let new_capacity = 2 * inner.data.len();
            inner.grow(new_capacity);
        }
        let offset = inner.num_items;
        inner.data[offset] = value;
        inner.num_items += 1;
        debug_assert!(inner.num_items <= inner.data.len());
    }

    /// Number of logical entries.
    pub fn len(&self) -> usize {
        self.inner.lock().num_items
    }

    /// Returns true if the column holds no logical entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of allocated slots.
    pub fn capacity(&self) -> usize {
        self.inner.lock().data.len()
    }

    /// Returns the value at `row`, or `None` past the logical length.
    pub fn get(&self, row: RowId) -> Option<i64> {
        self.inner.lock().logical().get(row).copied()
    }

    /// Copies out the logical content.
    pub fn values(&self) -> Vec<i64> {
        self.inner.lock().logical().to_vec()
    }

    /// Runs `f` over the logical content while holding the column lock.
    pub(crate) fn with_values<R>(&self, f: impl FnOnce(&[i64]) -> R) -> R {
        let inner = self.inner.lock();
        f(inner.logical())
    }
}
