//! # train-stream-rs
//!
//! Streaming epoch controller for training a pluggable supervised-learning
//! model from records delivered incrementally rather than as one in-memory
//! batch.
//!
//! The controller consumes a backpressure-aware stream of labeled examples,
//! infers the model's input/output shape from the first pass, drives the
//! model's per-example training step, aggregates per-epoch error, and decides
//! at every epoch boundary whether the source should replay the training set
//! or stop.
//!
//! ## Key Properties
//!
//! - **Shape-free intake**: field names are unioned across the first epoch in
//!   first-seen order; the model is sized and initialized only once the first
//!   end-of-epoch marker arrives.
//! - **Outcome-driven loop**: every epoch boundary returns an
//!   [`EpochOutcome`] (`ShapeDetermined`, `Continue`, or `Done`) instead of
//!   firing hidden continuation callbacks; the embedder loops with whatever
//!   task or channel idiom fits.
//! - **Call-return backpressure**: [`TrainStream::write`] returning is the
//!   readiness signal; the source never runs ahead of the controller.
//! - **Pluggable model**: anything implementing [`Model`] can be trained; the
//!   controller never looks inside the training step.
//!
//! ## Quick Start
//!
//! ```
//! use train_stream_rs::prelude::*;
//!
//! struct Toy {
//!     error: f64,
//! }
//!
//! impl Model for Toy {
//!     fn initialize(&mut self, _shape: &ShapeDescriptor) -> Result<()> {
//!         Ok(())
//!     }
//!
//!     fn train_pattern(&mut self, _input: &[f64], _output: &[f64]) -> Result<f64> {
//!         self.error *= 0.5;
//!         Ok(self.error)
//!     }
//! }
//!
//! let data = vec![
//!     Datum::named([("x", 0.0), ("y", 1.0)], [("hot", 1.0)]),
//!     Datum::named([("x", 1.0), ("y", 0.0)], [("hot", 1.0)]),
//! ];
//!
//! let config = TrainStreamConfig::builder().iterations(100).build();
//! let mut stream = TrainStream::new(Toy { error: 1.0 }, config)?;
//!
//! let stats = stream.train(&data)?;
//! assert!(stats.error <= 0.005);
//! assert!(stats.iterations <= 100);
//! # Ok::<(), TrainStreamError>(())
//! ```
//!
//! For sources that deliver records one at a time, drive the protocol
//! directly: [`TrainStream::write`] per record, [`TrainStream::end_epoch`] at
//! each epoch boundary, and replay the set while the returned outcome
//! [`wants_more`](EpochOutcome::wants_more).
//!
//! ## Modules
//!
//! - [`config`]: Stream configuration, builder, and TOML round-trip
//! - [`error`]: Error types and the crate result alias
//! - [`record`]: Datum model, field unioning, formatted training pairs
//! - [`shape`]: One-time shape inference and datum vectorization
//! - [`stream`]: The epoch controller state machine

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod record;
pub mod shape;
pub mod stream;

pub use config::{LogMode, TrainStreamConfig, TrainStreamConfigBuilder};
pub use error::{Result, TrainStreamError};
pub use record::{Datum, FieldSet, Fields, TrainPair};
pub use shape::{FieldLayout, FieldLookup, ShapeDescriptor};
pub use stream::{EpochOutcome, EpochStats, StreamPhase, TrainStream};

/// The capability set a trainable model exposes to the controller.
///
/// The controller owns the model for the duration of one run and talks to it
/// through exactly these three operations: a one-time [`initialize`] once the
/// shape is known, a [`format_data`] conversion per record, and a
/// [`train_pattern`] step per formatted record. How the model computes error
/// or updates weights is its own business.
///
/// [`initialize`]: Model::initialize
/// [`format_data`]: Model::format_data
/// [`train_pattern`]: Model::train_pattern
pub trait Model: Send {
    /// Allocate or reset model structure for the inferred shape.
    ///
    /// Called exactly once per stream, at the first end-of-epoch marker.
    /// [`ShapeDescriptor::layer_sizes`] is the flattened
    /// `(input, hidden…, output)` size list.
    fn initialize(&mut self, shape: &ShapeDescriptor) -> Result<()>;

    /// Run one training step on a formatted example and return its error.
    fn train_pattern(&mut self, input: &[f64], output: &[f64]) -> Result<f64>;

    /// Convert a raw datum into the model's native numeric representation.
    ///
    /// Used both for the shape probe and for per-record training input. The
    /// lengths of the vectors returned for the first datum become the
    /// shape's concrete input/output sizes, so [`Model::initialize`] always
    /// sees the widths [`Model::train_pattern`] will later receive. The default
    /// delegates to [`ShapeDescriptor::format`]: named fields are vectorized
    /// through the lookup with missing fields zero-filled and unknown names
    /// ignored; positional values pass through unchanged. Models with their
    /// own representation override this.
    fn format_data(&self, datum: &Datum, shape: &ShapeDescriptor) -> Result<TrainPair> {
        shape.format(datum)
    }
}

/// Convenience re-exports for embedding the controller.
pub mod prelude {
    pub use crate::config::{LogMode, TrainStreamConfig};
    pub use crate::error::{Result, TrainStreamError};
    pub use crate::record::{Datum, Fields, TrainPair};
    pub use crate::shape::{FieldLayout, FieldLookup, ShapeDescriptor};
    pub use crate::stream::{EpochOutcome, EpochStats, StreamPhase, TrainStream};
    pub use crate::Model;
}
