//! Record-level protocol tests: shape inference, epoch bookkeeping, and
//! failure propagation.

use std::io;
use std::sync::{Arc, Mutex};

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::util::SubscriberInitExt;

use train_stream_rs::prelude::*;

/// Model returning a constant error and recording every formatted pair.
struct ConstModel {
    error: f64,
    trained: Vec<TrainPair>,
}

impl ConstModel {
    fn new(error: f64) -> Self {
        Self {
            error,
            trained: Vec::new(),
        }
    }
}

impl Model for ConstModel {
    fn initialize(&mut self, _shape: &ShapeDescriptor) -> Result<()> {
        Ok(())
    }

    fn train_pattern(&mut self, input: &[f64], output: &[f64]) -> Result<f64> {
        self.trained.push(TrainPair::new(input.to_vec(), output.to_vec()));
        Ok(self.error)
    }
}

#[test]
fn test_first_epoch_unions_field_names_in_first_seen_order() {
    let data = vec![
        Datum::named([("width", 1.0), ("height", 2.0)], [("y", 1.0)]),
        Datum::named([("depth", 3.0), ("width", 4.0)], [("z", 0.0), ("y", 1.0)]),
        Datum::named([("height", 5.0)], [("y", 0.0)]),
    ];
    let mut stream =
        TrainStream::new(ConstModel::new(1.0), TrainStreamConfig::default()).unwrap();

    for datum in &data {
        stream.write(datum).unwrap();
    }
    assert_eq!(stream.end_epoch().unwrap(), EpochOutcome::ShapeDetermined);

    let shape = stream.shape().unwrap();
    assert_eq!(
        shape.input().lookup().unwrap().names(),
        &["width", "height", "depth"]
    );
    assert_eq!(shape.output().lookup().unwrap().names(), &["y", "z"]);
    assert_eq!(stream.expected_epoch_size(), Some(3));
}

#[test]
fn test_short_epoch_still_divides_by_expected_size() {
    let datum = Datum::named([("x", 1.0)], [("y", 1.0)]);
    let config = TrainStreamConfig::builder()
        .iterations(10)
        .error_thresh(0.0)
        .build();
    let mut stream = TrainStream::new(ConstModel::new(1.0), config).unwrap();

    // First epoch: 5 records fix the expected size.
    for _ in 0..5 {
        stream.write(&datum).unwrap();
    }
    stream.end_epoch().unwrap();

    // Second epoch delivers only 3 records; the average still divides by 5.
    for _ in 0..3 {
        stream.write(&datum).unwrap();
    }
    let outcome = stream.end_epoch().unwrap();

    let stats = outcome.stats().unwrap();
    assert!((stats.error - 0.6).abs() < 1e-12);
}

#[test]
fn test_layout_conflict_after_shape_determination_errors() {
    let named = Datum::named([("x", 1.0)], [("y", 1.0)]);
    let mut stream =
        TrainStream::new(ConstModel::new(1.0), TrainStreamConfig::default()).unwrap();

    stream.write(&named).unwrap();
    stream.end_epoch().unwrap();

    let positional = Datum::positional([1.0], [0.0]);
    let err = stream.write(&positional).unwrap_err();
    assert!(matches!(
        err,
        TrainStreamError::LayoutMismatch { side: "input", .. }
    ));
}

#[test]
fn test_positional_records_pass_through_unchanged() {
    let data = vec![
        Datum::positional([0.25, 0.5, 0.75, 1.0], [1.0, 0.0]),
        Datum::positional([0.1, 0.2, 0.3, 0.4], [0.0, 1.0]),
    ];
    let config = TrainStreamConfig::builder().iterations(1).build();
    let mut stream = TrainStream::new(ConstModel::new(1.0), config).unwrap();

    stream.write_all(&data).unwrap();
    let shape = stream.shape().unwrap();
    assert!(shape.input().lookup().is_none());
    assert!(shape.output().lookup().is_none());
    assert_eq!(shape.layer_sizes(), vec![4, 3, 2]);

    stream.write_all(&data).unwrap();
    let trained = &stream.model().trained;
    assert_eq!(trained[0].input, vec![0.25, 0.5, 0.75, 1.0]);
    assert_eq!(trained[1].output, vec![0.0, 1.0]);
}

#[test]
fn test_empty_first_epoch_errors_then_recovers() {
    let mut stream =
        TrainStream::new(ConstModel::new(1.0), TrainStreamConfig::default()).unwrap();

    assert!(matches!(
        stream.end_epoch().unwrap_err(),
        TrainStreamError::EmptyFirstEpoch
    ));

    // The stream is still collecting; a source can keep feeding records.
    stream.write(&Datum::named([("x", 1.0)], [("y", 0.0)])).unwrap();
    assert_eq!(stream.end_epoch().unwrap(), EpochOutcome::ShapeDetermined);
}

/// Model whose training step fails after a set number of successful calls.
struct FailingModel {
    fail_after: usize,
    calls: usize,
}

impl Model for FailingModel {
    fn initialize(&mut self, _shape: &ShapeDescriptor) -> Result<()> {
        Ok(())
    }

    fn train_pattern(&mut self, _input: &[f64], _output: &[f64]) -> Result<f64> {
        if self.calls >= self.fail_after {
            return Err(TrainStreamError::training("loss diverged"));
        }
        self.calls += 1;
        Ok(1.0)
    }
}

#[test]
fn test_training_step_failure_propagates() {
    let data = vec![
        Datum::named([("x", 1.0)], [("y", 1.0)]),
        Datum::named([("x", 0.0)], [("y", 0.0)]),
    ];
    let model = FailingModel {
        fail_after: 3,
        calls: 0,
    };
    let mut stream = TrainStream::new(model, TrainStreamConfig::default()).unwrap();

    stream.write_all(&data).unwrap();
    stream.write_all(&data).unwrap();

    // Fourth training step fails; the error surfaces from write.
    stream.write(&data[0]).unwrap();
    let err = stream.write(&data[1]).unwrap_err();
    assert!(matches!(err, TrainStreamError::Training(_)));
}

/// Model whose formatter rejects every datum.
struct PickyFormatter;

impl Model for PickyFormatter {
    fn initialize(&mut self, _shape: &ShapeDescriptor) -> Result<()> {
        Ok(())
    }

    fn train_pattern(&mut self, _input: &[f64], _output: &[f64]) -> Result<f64> {
        Ok(0.0)
    }

    fn format_data(&self, _datum: &Datum, _shape: &ShapeDescriptor) -> Result<TrainPair> {
        Err(TrainStreamError::training("unsupported datum"))
    }
}

#[test]
fn test_shape_probe_goes_through_the_model_formatter() {
    let mut stream =
        TrainStream::new(PickyFormatter, TrainStreamConfig::default()).unwrap();

    stream.write(&Datum::named([("x", 1.0)], [("y", 0.0)])).unwrap();

    // The first end-of-epoch probes the remembered first datum through
    // format_data; the formatter's failure surfaces there.
    let err = stream.end_epoch().unwrap_err();
    assert!(matches!(err, TrainStreamError::Training(_)));
}

/// Model whose formatter widens each input value to three, so its vectors
/// are wider than the field lookup suggests.
struct ExpandingModel {
    initialized_with: Option<Vec<usize>>,
    trained_widths: Vec<(usize, usize)>,
}

impl Model for ExpandingModel {
    fn initialize(&mut self, shape: &ShapeDescriptor) -> Result<()> {
        self.initialized_with = Some(shape.layer_sizes());
        Ok(())
    }

    fn train_pattern(&mut self, input: &[f64], output: &[f64]) -> Result<f64> {
        self.trained_widths.push((input.len(), output.len()));
        Ok(1.0)
    }

    fn format_data(&self, datum: &Datum, shape: &ShapeDescriptor) -> Result<TrainPair> {
        let pair = shape.format(datum)?;
        let input = pair.input.iter().flat_map(|v| [*v; 3]).collect();
        Ok(TrainPair::new(input, pair.output))
    }
}

#[test]
fn test_formatter_vector_lengths_size_the_model() {
    let fields: Vec<(String, f64)> = (0..8).map(|i| (format!("f{i}"), f64::from(i))).collect();
    let datum = Datum::new(Fields::named(fields), Fields::named([("y", 1.0)]));
    let model = ExpandingModel {
        initialized_with: None,
        trained_widths: Vec::new(),
    };
    let config = TrainStreamConfig::builder().iterations(1).build();
    let mut stream = TrainStream::new(model, config).unwrap();

    stream.write(&datum).unwrap();
    assert_eq!(stream.end_epoch().unwrap(), EpochOutcome::ShapeDetermined);

    // Eight named fields widen to 24 input values, and the model is sized
    // from the widened vectors, hidden layer included.
    assert_eq!(stream.model().initialized_with, Some(vec![24, 12, 1]));
    let shape = stream.shape().unwrap();
    assert_eq!(shape.input_size(), 24);
    assert_eq!(shape.output_size(), 1);

    stream.write(&datum).unwrap();
    stream.end_epoch().unwrap();
    assert_eq!(stream.model().trained_widths, vec![(24, 1)]);
}

/// Thread-shared writer capturing formatted log output.
#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for SharedBuffer {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[test]
fn test_size_mismatch_warns_and_matched_epochs_stay_silent() {
    let buffer = SharedBuffer::default();
    let _guard = tracing_subscriber::fmt()
        .with_writer(buffer.clone())
        .with_ansi(false)
        .with_max_level(LevelFilter::WARN)
        .finish()
        .set_default();

    let datum = Datum::named([("x", 1.0)], [("y", 1.0)]);
    let config = TrainStreamConfig::builder()
        .iterations(10)
        .error_thresh(0.0)
        .build();
    let mut stream = TrainStream::new(ConstModel::new(1.0), config).unwrap();

    // First epoch: 3 records fix the expected size.
    for _ in 0..3 {
        stream.write(&datum).unwrap();
    }
    stream.end_epoch().unwrap();

    // A matched second epoch logs nothing at warn level.
    for _ in 0..3 {
        stream.write(&datum).unwrap();
    }
    stream.end_epoch().unwrap();
    assert_eq!(buffer.contents(), "");

    // A short epoch emits the discrepancy warning and still finishes.
    stream.write(&datum).unwrap();
    stream.end_epoch().unwrap();

    let logged = buffer.contents();
    assert!(logged.contains("WARN"));
    assert!(logged.contains("different record count"));
    assert!(logged.contains("expected=3"));
    assert!(logged.contains("actual=1"));
}
