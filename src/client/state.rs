use super::resource::Resource;

/// Everything a view can observe about one resource collection.
///
/// `items` is `None` until the first successful fetch; an empty vector is a
/// loaded, empty collection.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreState<R> {
    pub items: Option<Vec<R>>,
    pub loading: bool,
    pub error: Option<String>,
    pub selected: Option<R>,
}

impl<R> Default for StoreState<R> {
    fn default() -> Self {
        Self {
            items: None,
            loading: false,
            error: None,
            selected: None,
        }
    }
}

impl<R: Resource> StoreState<R> {
    /// Items in cache order; empty while uninitialized.
    pub fn items(&self) -> &[R] {
        self.items.as_deref().unwrap_or(&[])
    }

    pub fn is_loaded(&self) -> bool {
        self.items.is_some()
    }

    pub fn find(&self, id: &str) -> Option<&R> {
        self.items().iter().find(|item| item.id() == id)
    }

    pub(crate) fn begin(&mut self) {
        self.loading = true;
        self.error = None;
    }

    /// A failed operation stops loading and leaves `items` untouched.
    pub(crate) fn fail(&mut self, message: String) {
        self.error = Some(message);
        self.loading = false;
    }

    fn succeed(&mut self) {
        self.loading = false;
        self.error = None;
    }

    pub(crate) fn replace_all(&mut self, items: Vec<R>) {
        self.items = Some(items);
        self.succeed();
    }

    pub(crate) fn prepend(&mut self, item: R) {
        self.items.get_or_insert_with(Vec::new).insert(0, item);
        self.succeed();
    }

    /// Swap the entity with the same id in place; order is preserved.
    pub(crate) fn replace_one(&mut self, item: R) {
        if let Some(items) = self.items.as_mut() {
            for existing in items.iter_mut().filter(|e| e.id() == item.id()) {
                *existing = item.clone();
            }
        }
        if self.selected.as_ref().is_some_and(|s| s.id() == item.id()) {
            self.selected = Some(item);
        }
        self.succeed();
    }

    /// Drop the entity with `id`; absent ids are a no-op.
    pub(crate) fn remove(&mut self, id: &str) {
        if let Some(items) = self.items.as_mut() {
            items.retain(|item| item.id() != id);
        }
        if self.selected.as_ref().is_some_and(|s| s.id() == id) {
            self.selected = None;
        }
        self.succeed();
    }
}
