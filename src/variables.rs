//! Named partitions of state-space ports
//!
//! External consumers address the flat row/column index space of a
//! state-space model by name ("the rigid-body velocity inputs", "the
//! control-surface deflections"), never by hard-coded index. A
//! [`LinearVector`] records that decomposition: an ordered list of
//! [`Variable`]s whose offset ranges tile the port width contiguously,
//! starting at zero, with no gaps or overlaps.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::{LtiError, LtiResult};

/// Which port of the system a partition describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariableRole {
    Input,
    State,
    Output,
}

/// A named, sized slice of a port
///
/// `index` is the ordinal position within the owning [`LinearVector`]; the
/// offset range is re-derived from the predecessors' sizes, never trusted
/// from the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variable {
    name: String,
    size: usize,
    index: usize,
    start: usize,
}

impl Variable {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Half-open row/column range this variable occupies in the owning
    /// matrix dimension
    pub fn rows_loc(&self) -> Range<usize> {
        self.start..self.start + self.size
    }
}

/// Structural equality: name, size and ordinal position
impl PartialEq for Variable {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.size == other.size && self.index == other.index
    }
}

/// An ordered, contiguous, role-homogeneous partition of a port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearVector {
    role: VariableRole,
    variables: Vec<Variable>,
}

impl LinearVector {
    /// Build a partition from `(name, size)` pairs in order
    ///
    /// Indices and offsets are derived here, which is what guarantees the
    /// contiguity invariant. Duplicate names are rejected.
    pub fn new<S>(role: VariableRole, named_sizes: impl IntoIterator<Item = (S, usize)>) -> LtiResult<Self>
    where
        S: Into<String>,
    {
        let mut variables = Vec::new();
        let mut start = 0;
        for (index, (name, size)) in named_sizes.into_iter().enumerate() {
            let name = name.into();
            if variables.iter().any(|v: &Variable| v.name == name) {
                return Err(LtiError::DuplicateVariable(name));
            }
            variables.push(Variable {
                name,
                size,
                index,
                start,
            });
            start += size;
        }
        Ok(Self { role, variables })
    }

    /// Partition holding a single variable covering the whole port
    pub fn single(role: VariableRole, name: &str, size: usize) -> Self {
        Self {
            role,
            variables: vec![Variable {
                name: name.to_string(),
                size,
                index: 0,
                start: 0,
            }],
        }
    }

    pub fn role(&self) -> VariableRole {
        self.role
    }

    /// Total scalar width of the port
    pub fn size(&self) -> usize {
        self.variables.iter().map(|v| v.size).sum()
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    /// Ordered view of the variables
    pub fn vector_variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Variable> {
        self.variables.iter()
    }

    /// Look up a variable by name
    ///
    /// A miss is reported as [`LtiError::VariableNotFound`], which callers
    /// match on to detect optional channels (e.g. a model with no control
    /// surfaces) without pre-checking existence.
    pub fn get_variable_from_name(&self, name: &str) -> LtiResult<&Variable> {
        self.variables
            .iter()
            .find(|v| v.name == name)
            .ok_or_else(|| LtiError::VariableNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.iter().any(|v| v.name == name)
    }

    /// New partition with the named variables excluded
    ///
    /// Remaining variables keep their relative order and sizes; indices and
    /// offsets are recomputed so the partition stays contiguous from zero.
    /// Fails if any name is absent.
    pub fn remove(&self, names: &[&str]) -> LtiResult<Self> {
        for name in names {
            if !self.contains(name) {
                return Err(LtiError::VariableNotFound(name.to_string()));
            }
        }
        Self::new(
            self.role,
            self.variables
                .iter()
                .filter(|v| !names.contains(&v.name.as_str()))
                .map(|v| (v.name.clone(), v.size)),
        )
    }

    /// Concatenation of two partitions of the same role, `first` leading
    ///
    /// Fails on a duplicate name across the operands.
    pub fn merge(first: &Self, second: &Self) -> LtiResult<Self> {
        assert_eq!(first.role, second.role, "cannot merge partitions of different roles");
        Self::new(
            first.role,
            first
                .variables
                .iter()
                .chain(second.variables.iter())
                .map(|v| (v.name.clone(), v.size)),
        )
    }

    /// Reinterpret the partition under a different role, preserving names,
    /// sizes and ordering
    ///
    /// Used when an output port becomes the input port of a downstream
    /// block (gains, series connection).
    pub fn transform(&self, role: VariableRole) -> Self {
        Self {
            role,
            variables: self.variables.clone(),
        }
    }

    /// Variable-by-variable name/size agreement, ignoring role
    ///
    /// This is the compatibility check used by `series` and `add_gain`.
    pub fn matches(&self, other: &Self) -> bool {
        self.num_variables() == other.num_variables()
            && self
                .iter()
                .zip(other.iter())
                .all(|(a, b)| a.name == b.name && a.size == b.size)
    }
}

impl<'a> IntoIterator for &'a LinearVector {
    type Item = &'a Variable;
    type IntoIter = std::slice::Iter<'a, Variable>;

    fn into_iter(self) -> Self::IntoIter {
        self.variables.iter()
    }
}
