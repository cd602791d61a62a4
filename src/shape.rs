//! Shape inference for streamed training data.
//!
//! The first pass over the stream never trains; it only observes. At the
//! first end-of-epoch marker the unioned field names and the remembered first
//! datum are frozen into a [`ShapeDescriptor`]: one [`FieldLayout`] per side
//! plus the hidden-layer sizes. The descriptor is computed exactly once per
//! stream and every later datum is formatted against it, so field numbering
//! is deterministic for the whole run.

use std::collections::HashMap;

use crate::error::{Result, TrainStreamError};
use crate::record::{Datum, FieldSet, Fields, TrainPair};

/// Ordered field-name to position lookup.
///
/// Positions follow first-seen order of the names, never sort order. The same
/// sequence of names always produces the same numbering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldLookup {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl FieldLookup {
    /// Build a lookup from a name sequence, keeping the first occurrence of
    /// any duplicate.
    pub fn from_names<K, I>(names: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = K>,
    {
        let mut lookup = Self {
            names: Vec::new(),
            index: HashMap::new(),
        };
        for name in names {
            let name = name.into();
            if !lookup.index.contains_key(&name) {
                lookup.index.insert(name.clone(), lookup.names.len());
                lookup.names.push(name);
            }
        }
        lookup
    }

    /// Position of a field name, if known.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Field names in positional order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Number of known fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the lookup holds no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl From<&FieldSet> for FieldLookup {
    fn from(set: &FieldSet) -> Self {
        Self::from_names(set.names().iter().cloned())
    }
}

/// How one side of the stream's records maps to a numeric vector.
///
/// Resolved once at shape determination from the first datum and never
/// re-checked ad hoc afterwards; a later datum with the opposite layout is an
/// explicit error.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldLayout {
    /// Named fields, vectorized through an ordered lookup.
    Named(FieldLookup),
    /// Already-positional values of a fixed observed size.
    Positional {
        /// Vector length observed on the first datum.
        size: usize,
    },
}

impl FieldLayout {
    /// Vector length of this side.
    #[must_use]
    pub fn size(&self) -> usize {
        match self {
            Self::Named(lookup) => lookup.len(),
            Self::Positional { size } => *size,
        }
    }

    /// Lookup for named layouts; `None` when the side is positional.
    #[must_use]
    pub fn lookup(&self) -> Option<&FieldLookup> {
        match self {
            Self::Named(lookup) => Some(lookup),
            Self::Positional { .. } => None,
        }
    }

    /// Human-readable layout kind, used in mismatch reports.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Named(_) => "named fields",
            Self::Positional { .. } => "positional values",
        }
    }

    /// Format one record side into its numeric vector.
    ///
    /// Named sides start from a zero vector: fields the datum omits stay
    /// `0.0`, and names the first epoch never saw are ignored. Positional
    /// sides pass through unchanged; their length is not coerced to the
    /// observed size. A named datum against a positional layout (or vice
    /// versa) is a [`TrainStreamError::LayoutMismatch`].
    pub fn vectorize(&self, fields: &Fields, side: &'static str) -> Result<Vec<f64>> {
        match (self, fields) {
            (Self::Named(lookup), Fields::Named(pairs)) => {
                let mut values = vec![0.0; lookup.len()];
                for (name, value) in pairs {
                    if let Some(ix) = lookup.index_of(name) {
                        values[ix] = *value;
                    }
                }
                Ok(values)
            }
            (Self::Positional { .. }, Fields::Positional(values)) => Ok(values.clone()),
            (layout, fields) => Err(TrainStreamError::LayoutMismatch {
                side,
                expected: layout.kind_name(),
                got: fields.kind_name(),
            }),
        }
    }
}

/// The one-time product of shape inference.
///
/// Carries the per-side layouts, the concrete input/output vector lengths,
/// and the hidden-layer size list. The concrete lengths equal the layout
/// sizes unless a model formatter produces vectors of a different width, in
/// which case [`ShapeDescriptor::with_sizes`] records the formatter's
/// lengths. When no hidden sizes are configured, a single layer of
/// `max(3, input_size / 2)` units is derived from the concrete input length.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeDescriptor {
    input: FieldLayout,
    output: FieldLayout,
    input_size: usize,
    output_size: usize,
    hidden_sizes: Vec<usize>,
}

impl ShapeDescriptor {
    /// Build a descriptor from resolved layouts, taking the vector lengths
    /// from the layouts themselves.
    ///
    /// `hidden_sizes` of `None` derives the default single hidden layer from
    /// the input size.
    #[must_use]
    pub fn new(input: FieldLayout, output: FieldLayout, hidden_sizes: Option<Vec<usize>>) -> Self {
        let input_size = input.size();
        let output_size = output.size();
        Self::with_sizes(input, output, input_size, output_size, hidden_sizes)
    }

    /// Build a descriptor with explicit vector lengths.
    ///
    /// Used when the concrete lengths are observed rather than derived: the
    /// vectors a model formatter emits for the first datum may be wider or
    /// narrower than the layouts suggest, and those observed lengths are
    /// what the model gets sized with.
    #[must_use]
    pub fn with_sizes(
        input: FieldLayout,
        output: FieldLayout,
        input_size: usize,
        output_size: usize,
        hidden_sizes: Option<Vec<usize>>,
    ) -> Self {
        let hidden_sizes =
            hidden_sizes.unwrap_or_else(|| Self::default_hidden_sizes(input_size));
        Self {
            input,
            output,
            input_size,
            output_size,
            hidden_sizes,
        }
    }

    /// Default hidden-layer sizes for a given input vector length: one layer
    /// of `max(3, input_size / 2)` units.
    #[must_use]
    pub fn default_hidden_sizes(input_size: usize) -> Vec<usize> {
        vec![std::cmp::max(3, input_size / 2)]
    }

    /// Input-side layout.
    #[must_use]
    pub fn input(&self) -> &FieldLayout {
        &self.input
    }

    /// Output-side layout.
    #[must_use]
    pub fn output(&self) -> &FieldLayout {
        &self.output
    }

    /// Concrete input vector length.
    #[must_use]
    pub fn input_size(&self) -> usize {
        self.input_size
    }

    /// Concrete output vector length.
    #[must_use]
    pub fn output_size(&self) -> usize {
        self.output_size
    }

    /// Hidden-layer sizes between input and output.
    #[must_use]
    pub fn hidden_sizes(&self) -> &[usize] {
        &self.hidden_sizes
    }

    /// Flattened `(input, hidden…, output)` sizes in network order.
    #[must_use]
    pub fn layer_sizes(&self) -> Vec<usize> {
        let mut sizes = Vec::with_capacity(self.hidden_sizes.len() + 2);
        sizes.push(self.input_size);
        sizes.extend_from_slice(&self.hidden_sizes);
        sizes.push(self.output_size);
        sizes
    }

    /// Format a datum into the numeric vectors this shape prescribes.
    pub fn format(&self, datum: &Datum) -> Result<TrainPair> {
        Ok(TrainPair::new(
            self.input.vectorize(&datum.input, "input")?,
            self.output.vectorize(&datum.output, "output")?,
        ))
    }
}
