//! Shard-key space: single key values with explicit bottom/top sentinels, key
//! tuples, and half-open chunk ranges.

use std::cmp::Ordering;
use std::fmt;

use bson::{Bson, Document};
use ordered_float::OrderedFloat;
use snafu::Snafu;

/// Errors converting raw catalog values into shard-key space.
#[derive(Debug, Snafu)]
#[allow(missing_docs)]
pub enum KeyError {
    #[snafu(display("unsupported shard key value: {value}"))]
    UnsupportedValue { value: String },

    #[snafu(display("shard key document is empty"))]
    EmptyKey,
}

/// One component of a shard key.
///
/// `MinKey` compares strictly below every ordinary value and `MaxKey`
/// strictly above; ordinary values compare within the document database's
/// canonical type order (numbers, then text, then object ids, then booleans,
/// then dates), with `Int` and `Float` comparing numerically across the two
/// variants.
#[derive(Debug, Clone)]
pub enum ShardKeyValue {
    /// The bottom element of shard-key space.
    MinKey,
    /// The top element of shard-key space.
    MaxKey,
    /// A 32 or 64 bit integer.
    Int(i64),
    /// A double. [`OrderedFloat`] supplies the total order.
    Float(OrderedFloat<f64>),
    /// A UTF-8 string.
    Text(String),
    /// An opaque 12-byte object id, ordered bytewise.
    ObjectId([u8; 12]),
    /// A boolean.
    Bool(bool),
    /// A UTC datetime.
    Date(bson::DateTime),
}

impl ShardKeyValue {
    /// Canonical comparison rank of the value's type. Sentinels bound the
    /// scale; `Int` and `Float` share a rank so they compare numerically.
    fn type_rank(&self) -> u8 {
        match self {
            Self::MinKey => 0,
            Self::Int(_) | Self::Float(_) => 1,
            Self::Text(_) => 2,
            Self::ObjectId(_) => 3,
            Self::Bool(_) => 4,
            Self::Date(_) => 5,
            Self::MaxKey => 6,
        }
    }
}

impl Ord for ShardKeyValue {
    fn cmp(&self, other: &Self) -> Ordering {
        use ShardKeyValue::*;

        match (self, other) {
            (Int(a), Int(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.cmp(b),
            (Int(a), Float(b)) => OrderedFloat(*a as f64).cmp(b),
            (Float(a), Int(b)) => a.cmp(&OrderedFloat(*b as f64)),
            (Text(a), Text(b)) => a.cmp(b),
            (ObjectId(a), ObjectId(b)) => a.cmp(b),
            (Bool(a), Bool(b)) => a.cmp(b),
            (Date(a), Date(b)) => a.cmp(b),
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }
}

impl PartialOrd for ShardKeyValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Equality must agree with `Ord`, so `Int(5)` and `Float(5.0)` are equal.
impl PartialEq for ShardKeyValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ShardKeyValue {}

impl TryFrom<&Bson> for ShardKeyValue {
    type Error = KeyError;

    fn try_from(value: &Bson) -> Result<Self, Self::Error> {
        match value {
            Bson::MinKey => Ok(Self::MinKey),
            Bson::MaxKey => Ok(Self::MaxKey),
            Bson::Int32(v) => Ok(Self::Int(i64::from(*v))),
            Bson::Int64(v) => Ok(Self::Int(*v)),
            Bson::Double(v) => Ok(Self::Float(OrderedFloat(*v))),
            Bson::String(v) => Ok(Self::Text(v.clone())),
            Bson::ObjectId(v) => Ok(Self::ObjectId(v.bytes())),
            Bson::Boolean(v) => Ok(Self::Bool(*v)),
            Bson::DateTime(v) => Ok(Self::Date(*v)),
            other => UnsupportedValueSnafu {
                value: other.to_string(),
            }
            .fail(),
        }
    }
}

impl fmt::Display for ShardKeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MinKey => write!(f, "MinKey"),
            Self::MaxKey => write!(f, "MaxKey"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "\"{v}\""),
            Self::ObjectId(v) => {
                write!(f, "ObjectId(")?;
                for b in v {
                    write!(f, "{b:02x}")?;
                }
                write!(f, ")")
            }
            Self::Bool(v) => write!(f, "{v}"),
            Self::Date(v) => write!(f, "{v}"),
        }
    }
}

/// An ordered tuple of [`ShardKeyValue`]s.
///
/// The tuple's length matches the namespace's number of shard-key fields and
/// is constant per namespace; comparing tuples of different arities is a
/// caller error.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ShardKeyTuple(Vec<ShardKeyValue>);

impl ShardKeyTuple {
    /// Create a tuple from its components.
    pub fn new(values: Vec<ShardKeyValue>) -> Self {
        Self(values)
    }

    /// Extract field names and key values from a catalog `min`/`max`
    /// document, preserving field order.
    pub fn from_document(doc: &Document) -> Result<(Vec<String>, Self), KeyError> {
        if doc.is_empty() {
            return EmptyKeySnafu.fail();
        }

        let mut fields = Vec::with_capacity(doc.len());
        let mut values = Vec::with_capacity(doc.len());
        for (field, value) in doc {
            fields.push(field.clone());
            values.push(ShardKeyValue::try_from(value)?);
        }
        Ok((fields, Self(values)))
    }

    /// Number of key components.
    pub fn arity(&self) -> usize {
        self.0.len()
    }

    /// The key components in order.
    pub fn values(&self) -> &[ShardKeyValue] {
        &self.0
    }

    /// Whether every component is the bottom sentinel.
    pub fn is_all_min(&self) -> bool {
        self.0.iter().all(|v| matches!(v, ShardKeyValue::MinKey))
    }

    /// Whether every component is the top sentinel.
    pub fn is_all_max(&self) -> bool {
        self.0.iter().all(|v| matches!(v, ShardKeyValue::MaxKey))
    }

    /// Render the tuple with its field names, e.g. `{_id: MinKey}`, for
    /// report and diagnostic text.
    pub fn display_with<'a>(&'a self, fields: &'a [String]) -> impl fmt::Display + 'a {
        TupleWithFields {
            tuple: self,
            fields,
        }
    }
}

impl From<Vec<ShardKeyValue>> for ShardKeyTuple {
    fn from(values: Vec<ShardKeyValue>) -> Self {
        Self(values)
    }
}

impl fmt::Display for ShardKeyTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{v}")?;
        }
        write!(f, ")")
    }
}

#[derive(Debug)]
struct TupleWithFields<'a> {
    tuple: &'a ShardKeyTuple,
    fields: &'a [String],
}

impl fmt::Display for TupleWithFields<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, v) in self.tuple.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match self.fields.get(i) {
                Some(field) => write!(f, "{field}: {v}")?,
                None => write!(f, "{v}")?,
            }
        }
        write!(f, "}}")
    }
}

/// A half-open range `[min, max)` in shard-key space.
///
/// Ranges order lexicographically by `(min, max)`, which keeps a
/// distribution's chunks sorted by their position in key space.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ChunkRange {
    /// Inclusive lower bound.
    pub min: ShardKeyTuple,
    /// Exclusive upper bound.
    pub max: ShardKeyTuple,
}

impl ChunkRange {
    /// Create a range. `min` must compare below `max`.
    pub fn new(min: ShardKeyTuple, max: ShardKeyTuple) -> Self {
        Self { min, max }
    }

    /// Whether `key` falls within `[min, max)`.
    pub fn contains(&self, key: &ShardKeyTuple) -> bool {
        &self.min <= key && key < &self.max
    }
}

impl fmt::Display for ChunkRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-->{}", self.min, self.max)
    }
}
