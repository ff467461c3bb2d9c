use serde::{Deserialize, Serialize};

use crate::classfile::ClassMetadata;

/// One scanned class: declared name, package, interface flag and a naive
/// line count. Value equality only; two records with identical fields are
/// interchangeable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassRecord {
    pub name: String,
    pub package: String,
    pub is_interface: bool,
    pub line_count: u64,
}

impl ClassRecord {
    pub fn from_metadata(meta: ClassMetadata, line_count: u64) -> Self {
        Self {
            name: meta.name,
            package: meta.package,
            is_interface: meta.is_interface,
            line_count,
        }
    }

    /// Name without the package prefix.
    pub fn simple_name(&self) -> &str {
        match self.name.rsplit_once('.') {
            Some((_, simple)) => simple,
            None => &self.name,
        }
    }
}
