use std::fmt;
use std::sync::Arc;

/// An opaque tag attached to a value.
///
/// Marks carry no meaning to the value domain itself; every operation
/// propagates the union of its inputs' marks onto its result.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Mark(Arc<str>);

impl Mark {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Mark({})", self.0)
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Mark {
    fn from(name: &str) -> Self {
        Mark::new(name)
    }
}

/// An immutable set of marks. Cloning is cheap and unions share structure.
pub type Marks = im::OrdSet<Mark>;

/// Unions the marks of every value in `values`.
pub fn union_marks<'a, I>(values: I) -> Marks
where
    I: IntoIterator<Item = &'a crate::Value>,
{
    let mut marks = Marks::new();
    for value in values {
        if value.is_marked() {
            marks = marks.union(value.marks().clone());
        }
    }
    marks
}
