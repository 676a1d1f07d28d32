//! Values produced by tasks.
//!
//! A task produces either a plain JSON [`Value`] or a [`DataStream`]: a lazy,
//! possibly infinite sequence. Each call to [`DataStream::iter`] restarts the
//! sequence from its source; a single iterator is single-pass and cannot be
//! rewound mid-way.

use crate::error::{CoreError, CoreResult};
use crate::spec::ValueKind;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Pull-based iterator over stream items
pub type StreamIter = Box<dyn Iterator<Item = CoreResult<Value>> + Send>;

type Source = dyn Fn() -> StreamIter + Send + Sync;

/// Lazy, restartable sequence of JSON values
#[derive(Clone)]
pub struct DataStream {
    source: Arc<Source>,
}

impl DataStream {
    /// Create a stream from an infallible iterator factory
    pub fn from_fn<F, I>(factory: F) -> Self
    where
        F: Fn() -> I + Send + Sync + 'static,
        I: Iterator<Item = Value> + Send + 'static,
    {
        Self::from_results(move || factory().map(Ok))
    }

    /// Create a stream from a factory whose items may fail
    pub fn from_results<F, I>(factory: F) -> Self
    where
        F: Fn() -> I + Send + Sync + 'static,
        I: Iterator<Item = CoreResult<Value>> + Send + 'static,
    {
        Self {
            source: Arc::new(move || Box::new(factory()) as StreamIter),
        }
    }

    /// Create a finite stream over owned values
    #[must_use]
    pub fn from_vec(values: Vec<Value>) -> Self {
        let values = Arc::new(values);
        Self::from_fn(move || {
            let values = Arc::clone(&values);
            (0..values.len()).map(move |i| values[i].clone())
        })
    }

    /// Start a fresh pass over the sequence
    #[must_use]
    pub fn iter(&self) -> StreamIter {
        (self.source)()
    }

    /// Lazily apply `f` to every item
    #[must_use]
    pub fn map<F>(&self, f: F) -> Self
    where
        F: Fn(Value) -> CoreResult<Value> + Send + Sync + 'static,
    {
        let upstream = self.clone();
        let f = Arc::new(f);
        Self::from_results(move || {
            let f = Arc::clone(&f);
            upstream.iter().map(move |item| item.and_then(|v| f(v)))
        })
    }

    /// Lazily keep items for which `predicate` holds
    #[must_use]
    pub fn filter<F>(&self, predicate: F) -> Self
    where
        F: Fn(&Value) -> CoreResult<bool> + Send + Sync + 'static,
    {
        let upstream = self.clone();
        let predicate = Arc::new(predicate);
        Self::from_results(move || {
            let predicate = Arc::clone(&predicate);
            upstream.iter().filter_map(move |item| match item {
                Ok(v) => match predicate(&v) {
                    Ok(true) => Some(Ok(v)),
                    Ok(false) => None,
                    Err(e) => Some(Err(e)),
                },
                Err(e) => Some(Err(e)),
            })
        })
    }

    /// Materialize the whole sequence.
    ///
    /// Never returns for an infinite stream.
    ///
    /// # Errors
    ///
    /// Returns the first item error
    pub fn collect(&self) -> CoreResult<Vec<Value>> {
        self.iter().collect()
    }
}

impl fmt::Debug for DataStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DataStream(..)")
    }
}

/// Output of a task transform
#[derive(Debug, Clone)]
pub enum Data {
    /// A fully computed value
    Value(Value),
    /// A lazily produced sequence
    Stream(DataStream),
}

impl Data {
    /// Borrow the plain value, if this is not a stream
    #[must_use]
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(v) => Some(v),
            Self::Stream(_) => None,
        }
    }

    /// Check if this is a lazy stream
    #[must_use]
    pub fn is_stream(&self) -> bool {
        matches!(self, Self::Stream(_))
    }

    /// View this data as a sequence.
    ///
    /// JSON arrays are accepted as finite sequences.
    ///
    /// # Errors
    ///
    /// Returns error if the value is not a sequence
    pub fn as_stream(&self) -> CoreResult<DataStream> {
        match self {
            Self::Stream(stream) => Ok(stream.clone()),
            Self::Value(Value::Array(items)) => Ok(DataStream::from_vec(items.clone())),
            Self::Value(other) => Err(CoreError::UnexpectedValue {
                expected: "sequence".to_string(),
                found: ValueKind::of(other).to_string(),
            }),
        }
    }

    /// Force the data into a JSON value; streams become arrays
    ///
    /// # Errors
    ///
    /// Returns the first stream item error
    pub fn to_value(&self) -> CoreResult<Value> {
        match self {
            Self::Value(v) => Ok(v.clone()),
            Self::Stream(stream) => stream.collect().map(Value::Array),
        }
    }

    /// Consuming variant of [`Data::to_value`]
    ///
    /// # Errors
    ///
    /// Returns the first stream item error
    pub fn into_value(self) -> CoreResult<Value> {
        match self {
            Self::Value(v) => Ok(v),
            Self::Stream(stream) => stream.collect().map(Value::Array),
        }
    }
}

impl From<Value> for Data {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<DataStream> for Data {
    fn from(stream: DataStream) -> Self {
        Self::Stream(stream)
    }
}
