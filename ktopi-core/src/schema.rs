//! Column schema descriptor for the event record.
//!
//! Every field of [`EventRecord`](crate::EventRecord) is declared as a
//! [`ColumnSpec`] and handed to a [`ColumnVisitor`] together with a mutable
//! [`Slot`] over its storage. Binding to an external store walks this
//! descriptor; there is no name matching by reflection.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Capacity of the generator-level particle arrays.
pub const MAX_GEN: usize = 10_000;
/// Capacity of the reconstructed particle arrays.
pub const MAX_RECO: usize = 10_000;
/// Capacity of the simulation particle arrays.
pub const MAX_SIM: usize = 10_000;
/// Capacity of the K0S candidate arrays.
pub const MAX_KSHORT: usize = 4096;
/// Capacity of the phi candidate arrays.
pub const MAX_PHI: usize = 4096;

/// Particle collections carried by an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Collection {
    /// Generator-level (truth) particles.
    Gen,
    /// Reconstructed particles.
    Reco,
    /// Simulation-level particles.
    Sim,
    /// Short-lived neutral kaon candidates.
    KShort,
    /// Phi meson candidates.
    Phi,
}

impl Collection {
    /// All collections in declaration order.
    pub const ALL: [Collection; 5] = [
        Collection::Gen,
        Collection::Reco,
        Collection::Sim,
        Collection::KShort,
        Collection::Phi,
    ];

    /// Fixed array capacity of the collection.
    #[must_use]
    pub const fn capacity(self) -> usize {
        match self {
            Collection::Gen => MAX_GEN,
            Collection::Reco => MAX_RECO,
            Collection::Sim => MAX_SIM,
            Collection::KShort => MAX_KSHORT,
            Collection::Phi => MAX_PHI,
        }
    }

    /// Name of the column holding the collection's count.
    #[must_use]
    pub const fn count_column(self) -> &'static str {
        match self {
            Collection::Gen => "NGen",
            Collection::Reco => "NReco",
            Collection::Sim => "NSim",
            Collection::KShort => "NKShort",
            Collection::Phi => "NPhi",
        }
    }

    /// Clips a stored count to the valid prefix length `[0, capacity]`.
    #[must_use]
    pub fn clip(self, count: i64) -> usize {
        usize::try_from(count).map_or(0, |n| n.min(self.capacity()))
    }

    /// Returns true if the stored count does not fit the arrays.
    #[must_use]
    pub fn overflows(self, count: i64) -> bool {
        usize::try_from(count).is_ok_and(|n| n > self.capacity())
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.count_column())
    }
}

/// Element type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ValueKind {
    /// 64-bit float.
    F64,
    /// 64-bit signed integer.
    I64,
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueKind::F64 => f.pad("f64"),
            ValueKind::I64 => f.pad("i64"),
        }
    }
}

/// Shape of a column within one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    /// One value per entry.
    Scalar,
    /// Fixed-capacity array whose valid prefix is bounded by the collection count.
    Array(Collection),
}

/// Declaration of a single column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColumnSpec {
    /// Column name in the store.
    pub name: &'static str,
    /// Element type.
    pub kind: ValueKind,
    /// Scalar or array shape.
    pub shape: Shape,
}

impl ColumnSpec {
    /// Declares a scalar column.
    #[must_use]
    pub const fn scalar(name: &'static str, kind: ValueKind) -> Self {
        Self {
            name,
            kind,
            shape: Shape::Scalar,
        }
    }

    /// Declares an array column belonging to `collection`.
    #[must_use]
    pub const fn array(name: &'static str, kind: ValueKind, collection: Collection) -> Self {
        Self {
            name,
            kind,
            shape: Shape::Array(collection),
        }
    }

    /// Number of values the in-memory storage holds per entry.
    #[must_use]
    pub const fn width(&self) -> usize {
        match self.shape {
            Shape::Scalar => 1,
            Shape::Array(collection) => collection.capacity(),
        }
    }
}

/// Mutable view over the storage of one column.
#[derive(Debug)]
pub enum Slot<'a> {
    /// Float storage.
    F64(&'a mut [f64]),
    /// Integer storage.
    I64(&'a mut [i64]),
}

impl Slot<'_> {
    /// Element type of the slot.
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Slot::F64(_) => ValueKind::F64,
            Slot::I64(_) => ValueKind::I64,
        }
    }

    /// Number of values the slot can hold.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Slot::F64(values) => values.len(),
            Slot::I64(values) => values.len(),
        }
    }

    /// Returns true if the slot holds no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Visitor over every declared column of a record.
pub trait ColumnVisitor {
    /// Called once per column, in declaration order.
    fn visit(&mut self, spec: ColumnSpec, slot: Slot<'_>);
}
