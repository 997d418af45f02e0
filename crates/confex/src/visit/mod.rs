//! visitor pattern helpers
mod visit_paths;
pub use visit_paths::VisitPaths;

/// Visitor that visits its subjects
pub trait Visit<T: ?Sized> {
    fn visit(&mut self, value: &T);
}

// blanket impl for FnMut
impl<T: ?Sized, F> Visit<T> for F
where
    F: FnMut(&T),
{
    fn visit(&mut self, value: &T) {
        self(value)
    }
}
