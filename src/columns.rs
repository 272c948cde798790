//! Column identities and prefetch sets
//!
//! The session declares up front which dataset columns the worker should
//! prefetch into every batch. Accessing any other column later is a
//! recoverable error, not a protocol violation, because the caller may only
//! discover the omission deep inside a processing loop.

use std::fmt;

/// Identity of one prefetchable dataset column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnId {
    Time,
    Exposure,
    Antenna1,
    Antenna2,
    Feed1,
    Feed2,
    Scan,
    FieldId,
    Uvw,
    FlagRow,
    Flags,
    Weight,
    Sigma,
    Observed,
    Model,
    Corrected,
}

impl ColumnId {
    /// Every column, in canonical declaration order
    pub const ALL: [ColumnId; 16] = [
        ColumnId::Time,
        ColumnId::Exposure,
        ColumnId::Antenna1,
        ColumnId::Antenna2,
        ColumnId::Feed1,
        ColumnId::Feed2,
        ColumnId::Scan,
        ColumnId::FieldId,
        ColumnId::Uvw,
        ColumnId::FlagRow,
        ColumnId::Flags,
        ColumnId::Weight,
        ColumnId::Sigma,
        ColumnId::Observed,
        ColumnId::Model,
        ColumnId::Corrected,
    ];

    /// Stable lowercase name used in logs and error messages
    pub fn name(self) -> &'static str {
        match self {
            ColumnId::Time => "time",
            ColumnId::Exposure => "exposure",
            ColumnId::Antenna1 => "antenna1",
            ColumnId::Antenna2 => "antenna2",
            ColumnId::Feed1 => "feed1",
            ColumnId::Feed2 => "feed2",
            ColumnId::Scan => "scan",
            ColumnId::FieldId => "field_id",
            ColumnId::Uvw => "uvw",
            ColumnId::FlagRow => "flag_row",
            ColumnId::Flags => "flags",
            ColumnId::Weight => "weight",
            ColumnId::Sigma => "sigma",
            ColumnId::Observed => "observed",
            ColumnId::Model => "model",
            ColumnId::Corrected => "corrected",
        }
    }

    fn bit(self) -> u32 {
        1 << (self as u32)
    }
}

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which of the three visibility data columns an accessor refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataKind {
    Observed,
    Model,
    Corrected,
}

impl DataKind {
    /// The column this data kind is stored in
    pub fn column(self) -> ColumnId {
        match self {
            DataKind::Observed => ColumnId::Observed,
            DataKind::Model => ColumnId::Model,
            DataKind::Corrected => ColumnId::Corrected,
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.column().fmt(f)
    }
}

/// An ordered, duplicate-free set of columns declared for prefetch.
///
/// Declaration order matters: the worker fills columns in exactly the order
/// the caller declared them, so a reproducible fill sequence needs the set to
/// remember insertion order, not just membership.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnSet {
    order: Vec<ColumnId>,
    mask: u32,
}

impl ColumnSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a column; returns false (and keeps the original position) if it
    /// was already declared
    pub fn insert(&mut self, column: ColumnId) -> bool {
        if self.contains(column) {
            return false;
        }
        self.mask |= column.bit();
        self.order.push(column);
        true
    }

    /// Membership test
    pub fn contains(&self, column: ColumnId) -> bool {
        self.mask & column.bit() != 0
    }

    /// Columns in declaration order
    pub fn iter(&self) -> impl Iterator<Item = ColumnId> + '_ {
        self.order.iter().copied()
    }

    /// Number of declared columns
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether no columns are declared
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl FromIterator<ColumnId> for ColumnSet {
    fn from_iter<I: IntoIterator<Item = ColumnId>>(iter: I) -> Self {
        let mut set = Self::new();
        for column in iter {
            set.insert(column);
        }
        set
    }
}

impl<'a> IntoIterator for &'a ColumnSet {
    type Item = ColumnId;
    type IntoIter = std::iter::Copied<std::slice::Iter<'a, ColumnId>>;

    fn into_iter(self) -> Self::IntoIter {
        self.order.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_lowercase() {
        for column in ColumnId::ALL {
            let name = column.name();
            assert_eq!(name, name.to_lowercase());
            assert_eq!(column.to_string(), name);
        }
    }

    #[test]
    fn test_set_preserves_declaration_order() {
        let set: ColumnSet = [ColumnId::Weight, ColumnId::Time, ColumnId::Flags]
            .into_iter()
            .collect();
        let order: Vec<ColumnId> = set.iter().collect();
        assert_eq!(order, vec![ColumnId::Weight, ColumnId::Time, ColumnId::Flags]);
    }

    #[test]
    fn test_set_deduplicates() {
        let mut set = ColumnSet::new();
        assert!(set.insert(ColumnId::Time));
        assert!(!set.insert(ColumnId::Time));
        assert_eq!(set.len(), 1);
        assert!(set.contains(ColumnId::Time));
        assert!(!set.contains(ColumnId::Sigma));
    }

    #[test]
    fn test_data_kind_columns() {
        assert_eq!(DataKind::Observed.column(), ColumnId::Observed);
        assert_eq!(DataKind::Model.column(), ColumnId::Model);
        assert_eq!(DataKind::Corrected.column(), ColumnId::Corrected);
        assert_eq!(DataKind::Corrected.to_string(), "corrected");
    }
}
