//! Logical values flowing through pipelines.
//!
//! Rows are plain `[Scalar]` slices; see `row.rs`. The ordering and key
//! equality helpers here are shared by sorting, grouping and expression
//! evaluation so that all operators agree on value semantics.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::mem;

use serde::{Deserialize, Serialize};

use crate::schema::DataType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    Null,
    Bool(bool),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Str(String),
    Bin(Vec<u8>),
    /// Nested values. Also the wire shape of composite partial aggregate states.
    Array(Vec<Scalar>),
}

impl Scalar {
    pub fn data_type(&self) -> DataType {
        match self {
            Scalar::Null => DataType::Undefined,
            Scalar::Bool(_) => DataType::Boolean,
            Scalar::I32(_) => DataType::Int32,
            Scalar::I64(_) => DataType::Int64,
            Scalar::F32(_) => DataType::Float32,
            Scalar::F64(_) => DataType::Float64,
            Scalar::Str(_) => DataType::Utf8,
            Scalar::Bin(_) => DataType::Binary,
            Scalar::Array(_) => DataType::Array,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    /// Integral value widened to i64, `None` for any other type.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::I32(v) => Some(i64::from(*v)),
            Scalar::I64(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric value widened to f64, `None` for non-numeric types.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::I32(v) => Some(f64::from(*v)),
            Scalar::I64(v) => Some(*v as f64),
            Scalar::F32(v) => Some(f64::from(*v)),
            Scalar::F64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Approximate heap + inline footprint used for memory accounting.
    pub fn estimated_size(&self) -> usize {
        let inline = mem::size_of::<Scalar>();
        match self {
            Scalar::Str(s) => inline + s.len(),
            Scalar::Bin(b) => inline + b.len(),
            Scalar::Array(items) => inline + items.iter().map(Scalar::estimated_size).sum::<usize>(),
            _ => inline,
        }
    }

    /// Grouping equality: same type and same value, `NULL` equals `NULL`,
    /// floats compare by bit pattern with all NaNs equal.
    pub fn key_eq(&self, other: &Scalar) -> bool {
        use Scalar::*;
        match (self, other) {
            (Null, Null) => true,
            (Bool(a), Bool(b)) => a == b,
            (I32(a), I32(b)) => a == b,
            (I64(a), I64(b)) => a == b,
            (F32(a), F32(b)) => canonical_f32(*a) == canonical_f32(*b),
            (F64(a), F64(b)) => canonical_f64(*a) == canonical_f64(*b),
            (Str(a), Str(b)) => a == b,
            (Bin(a), Bin(b)) => a == b,
            (Array(a), Array(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.key_eq(y))
            }
            _ => false,
        }
    }

    /// Hash consistent with [`Scalar::key_eq`].
    pub fn hash_key<H: Hasher>(&self, state: &mut H) {
        use Scalar::*;
        type_order(self).hash(state);
        match self {
            Null => {}
            Bool(b) => b.hash(state),
            I32(i) => i.hash(state),
            I64(i) => i.hash(state),
            F32(f) => canonical_f32(*f).hash(state),
            F64(f) => canonical_f64(*f).hash(state),
            Str(s) => s.hash(state),
            Bin(b) => b.hash(state),
            Array(items) => {
                items.len().hash(state);
                for item in items {
                    item.hash_key(state);
                }
            }
        }
    }
}

fn canonical_f32(f: f32) -> u32 {
    if f.is_nan() {
        f32::NAN.to_bits()
    } else if f == 0.0 {
        0.0f32.to_bits()
    } else {
        f.to_bits()
    }
}

fn canonical_f64(f: f64) -> u64 {
    if f.is_nan() {
        f64::NAN.to_bits()
    } else if f == 0.0 {
        0.0f64.to_bits()
    } else {
        f.to_bits()
    }
}

/// Total order over non-null values.
///
/// Numbers compare by value across integer/float widths, NaN sorts after every
/// other number. Values of unrelated types order by type tag. `NULL` sorts
/// first here; operators with explicit null placement handle nulls before
/// calling this.
pub fn compare_values(a: &Scalar, b: &Scalar) -> Ordering {
    use Scalar::*;

    match (a, b) {
        (Null, Null) => Ordering::Equal,
        (Null, _) => Ordering::Less,
        (_, Null) => Ordering::Greater,
        (Bool(x), Bool(y)) => x.cmp(y),
        (Str(x), Str(y)) => x.cmp(y),
        (Bin(x), Bin(y)) => x.cmp(y),
        (Array(x), Array(y)) => {
            for (l, r) in x.iter().zip(y.iter()) {
                match compare_values(l, r) {
                    Ordering::Equal => continue,
                    other => return other,
                }
            }
            x.len().cmp(&y.len())
        }
        _ => match (a.as_i64(), b.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => compare_f64(x, y),
                _ => type_order(a).cmp(&type_order(b)),
            },
        },
    }
}

fn compare_f64(x: f64, y: f64) -> Ordering {
    if x.is_nan() && y.is_nan() {
        Ordering::Equal
    } else if x.is_nan() {
        Ordering::Greater
    } else if y.is_nan() {
        Ordering::Less
    } else {
        x.partial_cmp(&y).unwrap_or(Ordering::Equal)
    }
}

/// Numeric order to scalar types for mixed-type comparisons.
fn type_order(s: &Scalar) -> u8 {
    use Scalar::*;
    match s {
        Null => 0,
        Bool(_) => 1,
        I32(_) => 2,
        I64(_) => 3,
        F32(_) => 4,
        F64(_) => 5,
        Str(_) => 6,
        Bin(_) => 7,
        Array(_) => 8,
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => f.write_str("NULL"),
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::I32(v) => write!(f, "{v}"),
            Scalar::I64(v) => write!(f, "{v}"),
            Scalar::F32(v) => write!(f, "{v}"),
            Scalar::F64(v) => write!(f, "{v}"),
            Scalar::Str(s) => f.write_str(s),
            Scalar::Bin(b) => {
                f.write_str("\\x")?;
                for byte in b {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
            Scalar::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

macro_rules! scalar_from {
    ($ty:ty, $variant:ident) => {
        impl From<$ty> for Scalar {
            fn from(v: $ty) -> Self {
                Scalar::$variant(v)
            }
        }
    };
}

scalar_from!(bool, Bool);
scalar_from!(i32, I32);
scalar_from!(i64, I64);
scalar_from!(f32, F32);
scalar_from!(f64, F64);
scalar_from!(String, Str);
scalar_from!(Vec<u8>, Bin);

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Str(v.to_string())
    }
}

impl<T: Into<Scalar>> From<Option<T>> for Scalar {
    fn from(v: Option<T>) -> Self {
        v.map_or(Scalar::Null, Into::into)
    }
}
