use kube::ResourceExt;
use std::fmt;

/// Identifies an `ElasticWeb` and, by extension, the children that share its
/// namespace and name.
#[derive(Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct ResourceId {
    pub namespace: String,
    pub name: String,
}

impl ResourceId {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Returns `None` for cluster-scoped or unnamed objects.
    pub fn of<K: ResourceExt>(obj: &K) -> Option<Self> {
        let namespace = obj.namespace()?;
        let name = obj.meta().name.clone()?;
        Some(Self { namespace, name })
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}
