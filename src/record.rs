//! Record model for streamed training data.
//!
//! A [`Datum`] is one labeled training example. Each side (input and output)
//! is a [`Fields`] value: either named field/value pairs or an
//! already-positional numeric sequence. Field names are not known up front
//! and may vary across examples within the first epoch, so [`FieldSet`]
//! unions them across the stream in deterministic first-seen order.

use std::collections::HashSet;

/// One side of a training example: named fields or a positional sequence.
///
/// The named form keeps its pairs in author order; that order is what drives
/// first-seen field numbering during shape inference. The positional form is
/// passed through to the model unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum Fields {
    /// Named field/value pairs in author order.
    Named(Vec<(String, f64)>),
    /// An already-positional numeric sequence.
    Positional(Vec<f64>),
}

impl Fields {
    /// Build a named side from field/value pairs.
    pub fn named<K, I>(pairs: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, f64)>,
    {
        Self::Named(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Build a positional side from a sequence of values.
    pub fn positional<I: IntoIterator<Item = f64>>(values: I) -> Self {
        Self::Positional(values.into_iter().collect())
    }

    /// Whether this side carries named fields.
    #[must_use]
    pub fn is_named(&self) -> bool {
        matches!(self, Self::Named(_))
    }

    /// Whether this side is an already-positional sequence.
    #[must_use]
    pub fn is_positional(&self) -> bool {
        matches!(self, Self::Positional(_))
    }

    /// Number of entries on this side.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Named(pairs) => pairs.len(),
            Self::Positional(values) => values.len(),
        }
    }

    /// Whether this side carries no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Named pairs, if this side is named.
    #[must_use]
    pub fn named_pairs(&self) -> Option<&[(String, f64)]> {
        match self {
            Self::Named(pairs) => Some(pairs),
            Self::Positional(_) => None,
        }
    }

    /// Positional values, if this side is positional.
    #[must_use]
    pub fn positional_values(&self) -> Option<&[f64]> {
        match self {
            Self::Named(_) => None,
            Self::Positional(values) => Some(values),
        }
    }

    /// Human-readable layout kind, used in mismatch reports.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Named(_) => "named fields",
            Self::Positional(_) => "positional values",
        }
    }
}

/// One labeled training example.
#[derive(Debug, Clone, PartialEq)]
pub struct Datum {
    /// Input side of the example.
    pub input: Fields,
    /// Expected output side of the example.
    pub output: Fields,
}

impl Datum {
    /// Build a datum from explicit sides.
    #[must_use]
    pub fn new(input: Fields, output: Fields) -> Self {
        Self { input, output }
    }

    /// Build a datum whose input and output are both named.
    pub fn named<KI, I, KO, O>(input: I, output: O) -> Self
    where
        KI: Into<String>,
        I: IntoIterator<Item = (KI, f64)>,
        KO: Into<String>,
        O: IntoIterator<Item = (KO, f64)>,
    {
        Self::new(Fields::named(input), Fields::named(output))
    }

    /// Build a datum whose input and output are both positional.
    pub fn positional<I, O>(input: I, output: O) -> Self
    where
        I: IntoIterator<Item = f64>,
        O: IntoIterator<Item = f64>,
    {
        Self::new(Fields::positional(input), Fields::positional(output))
    }
}

/// Union-merge collector for named field names.
///
/// Accumulates the names seen across one epoch's records, deduplicated, in
/// first-seen order. Positional sides contribute no names.
#[derive(Debug, Clone, Default)]
pub struct FieldSet {
    names: Vec<String>,
    seen: HashSet<String>,
}

impl FieldSet {
    /// Create an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one name. Returns `true` if the name was not seen before.
    pub fn insert(&mut self, name: &str) -> bool {
        if self.seen.contains(name) {
            return false;
        }
        self.seen.insert(name.to_owned());
        self.names.push(name.to_owned());
        true
    }

    /// Union the names of one record side into the collector.
    pub fn union(&mut self, fields: &Fields) {
        if let Fields::Named(pairs) = fields {
            for (name, _) in pairs {
                self.insert(name);
            }
        }
    }

    /// Collected names in first-seen order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Number of distinct names collected.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether no names have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// A datum formatted into the model's native numeric vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainPair {
    /// Formatted input vector.
    pub input: Vec<f64>,
    /// Formatted expected-output vector.
    pub output: Vec<f64>,
}

impl TrainPair {
    /// Build a pair from formatted vectors.
    #[must_use]
    pub fn new(input: Vec<f64>, output: Vec<f64>) -> Self {
        Self { input, output }
    }
}
