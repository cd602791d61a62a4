//! The streaming epoch controller.
//!
//! [`TrainStream`] consumes one epoch of records at a time and decides, at
//! each epoch boundary, whether the source should replay the training set or
//! stop. The first pass never trains: it unions field names and remembers the
//! first datum, then freezes both into a [`ShapeDescriptor`] and initializes
//! the model. Every later pass trains record by record and reports average
//! error at the boundary.
//!
//! ```text
//! Collecting --end_epoch--> Training --end_epoch--> Done
//!  (union field names,        |   ^                  (terminal; final
//!   remember first datum)     +---+                   stats returned once)
//!                        Continue while
//!               epoch < iterations && error > thresh
//! ```
//!
//! The continue/stop decision is the [`EpochOutcome`] returned from
//! [`TrainStream::end_epoch`]; there are no hidden callbacks driving the
//! loop. Back pressure is call-return: [`TrainStream::write`] returning is
//! the signal that the source may push the next record.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{LogMode, TrainStreamConfig};
use crate::error::{Result, TrainStreamError};
use crate::record::{Datum, FieldSet, Fields};
use crate::shape::{FieldLayout, FieldLookup, ShapeDescriptor};
use crate::Model;

/// Lifecycle phase of a training stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamPhase {
    /// First pass over the stream: collecting field names, no training.
    Collecting,
    /// Shape determined; epochs train and count toward the iteration budget.
    Training,
    /// Terminal: final stats were returned, no further records accepted.
    Done,
}

impl StreamPhase {
    /// Short lowercase name for logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Collecting => "collecting",
            Self::Training => "training",
            Self::Done => "done",
        }
    }

    /// Whether the stream accepts no further records.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }
}

impl fmt::Display for StreamPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Average error and epoch index reported at an epoch boundary.
///
/// In [`EpochOutcome::Continue`] and in progress callbacks, `iterations` is
/// the zero-based index of the epoch that just finished. In
/// [`EpochOutcome::Done`] it is the total number of trained epochs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochStats {
    /// Average error of the finished epoch (`sum / size`).
    pub error: f64,
    /// Epoch index (see type-level docs for the convention).
    pub iterations: usize,
}

impl fmt::Display for EpochStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "iterations: {}, training error: {}",
            self.iterations, self.error
        )
    }
}

/// Decision returned at each epoch boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EpochOutcome {
    /// First pass complete: shape inferred and the model initialized. The
    /// source should replay the training set for the first real epoch. This
    /// boundary carries no stats and does not count toward the iteration
    /// budget.
    ShapeDetermined,
    /// Error is still above threshold and the iteration budget allows
    /// another epoch: the source should replay the training set.
    Continue(EpochStats),
    /// Stopping condition met; final stats. The stream accepts nothing more.
    Done(EpochStats),
}

impl EpochOutcome {
    /// Whether the source should stream another epoch.
    #[must_use]
    pub fn wants_more(&self) -> bool {
        !matches!(self, Self::Done(_))
    }

    /// Stats attached to this boundary, if the finished epoch trained.
    #[must_use]
    pub fn stats(&self) -> Option<EpochStats> {
        match self {
            Self::ShapeDetermined => None,
            Self::Continue(stats) | Self::Done(stats) => Some(*stats),
        }
    }
}

enum LogSink {
    Off,
    Tracing,
    Custom(Box<dyn FnMut(&str) + Send>),
}

type ProgressFn = Box<dyn FnMut(&EpochStats) + Send>;

/// Streaming epoch controller for one training run.
///
/// Owns the model exclusively for the duration of the run; recover it with
/// [`TrainStream::into_model`] once training is done. A stream is bound to
/// one model and one configuration and is not reused across runs.
pub struct TrainStream<M: Model> {
    model: M,
    config: TrainStreamConfig,
    phase: StreamPhase,

    // First-pass collection.
    input_fields: FieldSet,
    output_fields: FieldSet,
    first_datum: Option<Datum>,
    size: usize,

    // Per-epoch bookkeeping after shape determination.
    shape: Option<ShapeDescriptor>,
    epoch: usize,
    sum: f64,
    count: usize,
    last_error: Option<f64>,

    log_sink: LogSink,
    progress: Option<ProgressFn>,
}

impl<M: Model> TrainStream<M> {
    /// Create a stream bound to one model instance and one configuration.
    ///
    /// Fails with [`TrainStreamError::InvalidConfig`] when the configuration
    /// does not validate. No training happens until records arrive.
    pub fn new(model: M, config: TrainStreamConfig) -> Result<Self> {
        config.validate()?;
        let log_sink = match config.log {
            LogMode::Off => LogSink::Off,
            LogMode::Tracing => LogSink::Tracing,
        };
        Ok(Self {
            model,
            config,
            phase: StreamPhase::Collecting,
            input_fields: FieldSet::new(),
            output_fields: FieldSet::new(),
            first_datum: None,
            size: 0,
            shape: None,
            epoch: 0,
            sum: 0.0,
            count: 0,
            last_error: None,
            log_sink,
            progress: None,
        })
    }

    /// Attach a custom log sink, overriding the configured log mode.
    ///
    /// The sink receives the formatted log line on the `log_period` cadence.
    #[must_use]
    pub fn with_log_sink<F>(mut self, sink: F) -> Self
    where
        F: FnMut(&str) + Send + 'static,
    {
        self.log_sink = LogSink::Custom(Box::new(sink));
        self
    }

    /// Attach a progress callback, invoked with the epoch's stats every
    /// `callback_period` epochs.
    #[must_use]
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&EpochStats) + Send + 'static,
    {
        self.progress = Some(Box::new(callback));
        self
    }

    /// Feed one record of the current epoch.
    ///
    /// Before shape determination this only unions field names and remembers
    /// the first datum; afterwards it formats the record, runs one training
    /// step, and accumulates the returned error. Returning is the readiness
    /// signal of the backpressure protocol: the record has been fully
    /// processed and the source may push the next one.
    pub fn write(&mut self, datum: &Datum) -> Result<()> {
        if self.phase.is_terminal() {
            return Err(TrainStreamError::StreamFinished);
        }
        if let Some(shape) = &self.shape {
            let pair = self.model.format_data(datum, shape)?;
            let error = self.model.train_pattern(&pair.input, &pair.output)?;
            self.sum += error;
            self.count += 1;
        } else {
            self.size += 1;
            self.input_fields.union(&datum.input);
            self.output_fields.union(&datum.output);
            if self.first_datum.is_none() {
                self.first_datum = Some(datum.clone());
            }
        }
        Ok(())
    }

    /// Signal the end-of-epoch marker.
    ///
    /// On the first call this freezes the unioned field names into the shape
    /// descriptor, initializes the model, and returns
    /// [`EpochOutcome::ShapeDetermined`] without touching the error
    /// bookkeeping. Later calls report the finished epoch and decide whether
    /// the source should replay the training set.
    pub fn end_epoch(&mut self) -> Result<EpochOutcome> {
        if self.phase.is_terminal() {
            return Err(TrainStreamError::StreamFinished);
        }
        if self.shape.is_none() {
            self.determine_shape()?;
            return Ok(EpochOutcome::ShapeDetermined);
        }
        Ok(self.finish_epoch())
    }

    /// Stream one epoch of records, then signal end-of-epoch.
    pub fn write_all<'a, I>(&mut self, data: I) -> Result<EpochOutcome>
    where
        I: IntoIterator<Item = &'a Datum>,
    {
        for datum in data {
            self.write(datum)?;
        }
        self.end_epoch()
    }

    /// Flood the stream with `data` once per requested epoch until training
    /// stops, returning the final stats.
    ///
    /// Equivalent to a source that replays the training set on every
    /// continue signal.
    pub fn train(&mut self, data: &[Datum]) -> Result<EpochStats> {
        loop {
            match self.write_all(data)? {
                EpochOutcome::ShapeDetermined | EpochOutcome::Continue(_) => {}
                EpochOutcome::Done(stats) => return Ok(stats),
            }
        }
    }

    /// Lifecycle phase of the stream.
    #[must_use]
    pub fn phase(&self) -> StreamPhase {
        self.phase
    }

    /// Zero-based index of the current post-shape epoch. The shape-inference
    /// pass does not count toward this index.
    #[must_use]
    pub fn epoch(&self) -> usize {
        self.epoch
    }

    /// Shape inferred from the first epoch, once determined.
    #[must_use]
    pub fn shape(&self) -> Option<&ShapeDescriptor> {
        self.shape.as_ref()
    }

    /// Record count every epoch is expected to deliver (the first epoch's
    /// count), once the shape has been determined.
    #[must_use]
    pub fn expected_epoch_size(&self) -> Option<usize> {
        if self.shape.is_some() {
            Some(self.size)
        } else {
            None
        }
    }

    /// Average error of the most recently finished epoch.
    #[must_use]
    pub fn last_error(&self) -> Option<f64> {
        self.last_error
    }

    /// The configuration this stream runs with.
    #[must_use]
    pub fn config(&self) -> &TrainStreamConfig {
        &self.config
    }

    /// The wrapped model.
    #[must_use]
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Consume the stream, returning the trained model.
    #[must_use]
    pub fn into_model(self) -> M {
        self.model
    }

    /// Freeze the first epoch's observations into the shape descriptor and
    /// initialize the model with it.
    fn determine_shape(&mut self) -> Result<()> {
        let Some(first) = self.first_datum.take() else {
            return Err(TrainStreamError::EmptyFirstEpoch);
        };

        // The first datum fixes each side's layout; named sides take the
        // unioned lookup, positional sides the observed vector length.
        let input = match &first.input {
            Fields::Named(_) => FieldLayout::Named(FieldLookup::from(&self.input_fields)),
            Fields::Positional(values) => FieldLayout::Positional { size: values.len() },
        };
        let output = match &first.output {
            Fields::Named(_) => FieldLayout::Named(FieldLookup::from(&self.output_fields)),
            Fields::Positional(values) => FieldLayout::Positional { size: values.len() },
        };

        // Probe the first datum through the model's formatter: the vectors
        // it emits carry the concrete lengths this stream will deliver,
        // which differ from the layout sizes when the formatter is
        // overridden. Those lengths size the model.
        let layout_shape = ShapeDescriptor::new(
            input.clone(),
            output.clone(),
            self.config.hidden_layers.clone(),
        );
        let probe = self.model.format_data(&first, &layout_shape)?;
        let shape = ShapeDescriptor::with_sizes(
            input,
            output,
            probe.input.len(),
            probe.output.len(),
            self.config.hidden_layers.clone(),
        );
        debug!(
            layer_sizes = ?shape.layer_sizes(),
            expected_epoch_size = self.size,
            "shape determined"
        );
        self.model.initialize(&shape)?;

        self.shape = Some(shape);
        self.phase = StreamPhase::Training;
        self.sum = 0.0;
        self.count = 0;
        Ok(())
    }

    /// Close out one trained epoch: report on cadence, reset the
    /// accumulator, and decide continue versus stop.
    fn finish_epoch(&mut self) -> EpochOutcome {
        if self.count != self.size {
            warn!(
                expected = self.size,
                actual = self.count,
                "epoch delivered a different record count than the first epoch"
            );
        }

        // Average over the expected size, not the actual count.
        let error = self.sum / self.size as f64;
        let stats = EpochStats {
            error,
            iterations: self.epoch,
        };

        if self.epoch % self.config.log_period == 0 {
            self.emit_log(&stats);
        }
        if self.epoch % self.config.callback_period == 0 {
            if let Some(callback) = self.progress.as_mut() {
                callback(&stats);
            }
        }

        self.sum = 0.0;
        self.count = 0;
        self.epoch += 1;
        self.last_error = Some(error);

        if self.epoch < self.config.iterations && error > self.config.error_thresh {
            EpochOutcome::Continue(stats)
        } else {
            self.phase = StreamPhase::Done;
            EpochOutcome::Done(EpochStats {
                error,
                iterations: self.epoch,
            })
        }
    }

    fn emit_log(&mut self, stats: &EpochStats) {
        match &mut self.log_sink {
            LogSink::Off => {}
            LogSink::Tracing => info!("{}", stats),
            LogSink::Custom(sink) => sink(&stats.to_string()),
        }
    }
}
