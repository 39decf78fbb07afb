//! Field metadata tables.
//!
//! Every entity declares one static [`FieldSpec`] slice describing how
//! each of its fields participates in diffing, patching and rendering.

/// How a field participates in the model lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Unique identifier within the parent collection.
    Key,
    /// Ordinary writable value.
    Value,
    /// Present in expected form but never written back.
    ReadOnly,
    /// Only exists on provider-derived objects (ids, node ids, slugs).
    ExternalOnly,
    /// Declarative control field never sent to the provider.
    ModelOnly,
    /// Record-valued child with its own field handling.
    Embedded,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    /// List-of-string field compared as a set.
    pub unordered: bool,
}

impl FieldSpec {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            unordered: false,
        }
    }

    pub const fn unordered(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            unordered: true,
        }
    }

    /// Participates in expected-vs-current comparison.
    pub fn diffable(&self) -> bool {
        matches!(self.kind, FieldKind::Key | FieldKind::Value | FieldKind::Embedded)
    }

    /// May be sent to the provider on writes.
    pub fn writable(&self) -> bool {
        matches!(self.kind, FieldKind::Key | FieldKind::Value | FieldKind::Embedded)
    }

    /// Appears in rendered declarations.
    pub fn rendered(&self) -> bool {
        !matches!(self.kind, FieldKind::ExternalOnly)
    }
}

/// Convenience constructors keeping entity tables compact.
pub const fn key(name: &'static str) -> FieldSpec {
    FieldSpec::new(name, FieldKind::Key)
}

pub const fn value(name: &'static str) -> FieldSpec {
    FieldSpec::new(name, FieldKind::Value)
}

pub const fn set(name: &'static str) -> FieldSpec {
    FieldSpec::unordered(name, FieldKind::Value)
}

pub const fn list(name: &'static str) -> FieldSpec {
    FieldSpec::new(name, FieldKind::Value)
}

pub const fn read_only(name: &'static str) -> FieldSpec {
    FieldSpec::new(name, FieldKind::ReadOnly)
}

pub const fn external(name: &'static str) -> FieldSpec {
    FieldSpec::new(name, FieldKind::ExternalOnly)
}

pub const fn model_only(name: &'static str) -> FieldSpec {
    FieldSpec::new(name, FieldKind::ModelOnly)
}

pub const fn embedded(name: &'static str) -> FieldSpec {
    FieldSpec::new(name, FieldKind::Embedded)
}
