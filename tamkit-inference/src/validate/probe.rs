use anyhow::{bail, Result};
use ndarray::{ArrayD, IxDyn};
use ort::tensor::TensorElementType;
use ort::value::{DynValue, Tensor, ValueType};
use rand::Rng;
use std::fmt::{Display, Formatter};

/// Byte markers of operators that only some runtimes or builds provide.
pub const CUSTOM_OP_MARKERS: [&str; 3] = ["FlexDelegate", "com.microsoft", "ai.onnx.contrib"];

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ElementType {
    Float16,
    BFloat16,
    Float32,
    Float64,
    Int8,
    Uint8,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Int64,
    Uint64,
    Bool,
    String,
    Other,
}

impl ElementType {
    /// Bytes per element; strings and unknown types count as pointers.
    pub fn size(&self) -> usize {
        match self {
            ElementType::Int8 | ElementType::Uint8 | ElementType::Bool => 1,
            ElementType::Float16 | ElementType::BFloat16 => 2,
            ElementType::Int16 | ElementType::Uint16 => 2,
            ElementType::Float32 | ElementType::Int32 | ElementType::Uint32 => 4,
            ElementType::Float64 | ElementType::Int64 | ElementType::Uint64 => 8,
            ElementType::String | ElementType::Other => 8,
        }
    }

    pub fn is_quantized(&self) -> bool {
        matches!(self, ElementType::Int8 | ElementType::Uint8)
    }
}

impl Display for ElementType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ElementType::Float16 => "float16",
            ElementType::BFloat16 => "bfloat16",
            ElementType::Float32 => "float32",
            ElementType::Float64 => "float64",
            ElementType::Int8 => "int8",
            ElementType::Uint8 => "uint8",
            ElementType::Int16 => "int16",
            ElementType::Uint16 => "uint16",
            ElementType::Int32 => "int32",
            ElementType::Uint32 => "uint32",
            ElementType::Int64 => "int64",
            ElementType::Uint64 => "uint64",
            ElementType::Bool => "bool",
            ElementType::String => "string",
            ElementType::Other => "other",
        };
        write!(f, "{}", name)
    }
}

impl From<TensorElementType> for ElementType {
    fn from(value: TensorElementType) -> Self {
        match value {
            TensorElementType::Float16 => ElementType::Float16,
            TensorElementType::Bfloat16 => ElementType::BFloat16,
            TensorElementType::Float32 => ElementType::Float32,
            TensorElementType::Float64 => ElementType::Float64,
            TensorElementType::Int8 => ElementType::Int8,
            TensorElementType::Uint8 => ElementType::Uint8,
            TensorElementType::Int16 => ElementType::Int16,
            TensorElementType::Uint16 => ElementType::Uint16,
            TensorElementType::Int32 => ElementType::Int32,
            TensorElementType::Uint32 => ElementType::Uint32,
            TensorElementType::Int64 => ElementType::Int64,
            TensorElementType::Uint64 => ElementType::Uint64,
            TensorElementType::Bool => ElementType::Bool,
            TensorElementType::String => ElementType::String,
            _ => ElementType::Other,
        }
    }
}

/// Declared shape and element type of a model input or output; `-1` marks a dynamic dimension.
#[derive(Clone, Debug, PartialEq)]
pub struct TensorSpec {
    pub name: String,
    pub shape: Vec<i64>,
    pub ty: ElementType,
}

impl TensorSpec {
    pub fn from_value_type(name: &str, value_type: &ValueType) -> Self {
        match value_type {
            ValueType::Tensor { ty, shape, .. } => TensorSpec {
                name: name.to_string(),
                shape: shape.iter().copied().collect(),
                ty: ElementType::from(*ty),
            },
            _ => TensorSpec {
                name: name.to_string(),
                shape: Vec::new(),
                ty: ElementType::Other,
            },
        }
    }

    pub fn is_dynamic(&self) -> bool {
        self.shape.iter().any(|dim| *dim < 0)
    }

    /// Bytes of one instance, counting only the known dimensions.
    pub fn byte_size(&self) -> usize {
        let elements: i64 = self.shape.iter().filter(|dim| **dim > 0).product();
        elements as usize * self.ty.size()
    }

    /// The shape with every dynamic dimension pinned to 1.
    pub fn concrete_shape(&self) -> Vec<usize> {
        self.shape
            .iter()
            .map(|dim| if *dim > 0 { *dim as usize } else { 1 })
            .collect()
    }
}

pub fn estimate_memory_mb<'a>(specs: impl IntoIterator<Item = &'a TensorSpec>) -> f64 {
    let bytes: usize = specs.into_iter().map(TensorSpec::byte_size).sum();
    bytes as f64 / (1024.0 * 1024.0)
}

/// Markers from [`CUSTOM_OP_MARKERS`] found anywhere in the model bytes.
pub fn scan_custom_ops(model: &[u8]) -> Vec<&'static str> {
    CUSTOM_OP_MARKERS
        .into_iter()
        .filter(|marker| {
            model
                .windows(marker.len())
                .any(|window| window == marker.as_bytes())
        })
        .collect()
}

/// Uniform noise for one input: `[-1, 1)` for floats, the full byte range for integers.
pub fn random_input<R: Rng>(spec: &TensorSpec, rng: &mut R) -> Result<DynValue> {
    let shape = IxDyn(&spec.concrete_shape());

    let value = match spec.ty {
        ElementType::Float32 => Tensor::from_array(ArrayD::<f32>::from_shape_fn(shape, |_| {
            rng.gen_range(-1.0..1.0)
        }))?
        .into_dyn(),
        ElementType::Float64 => Tensor::from_array(ArrayD::<f64>::from_shape_fn(shape, |_| {
            rng.gen_range(-1.0..1.0)
        }))?
        .into_dyn(),
        ElementType::Uint8 => {
            Tensor::from_array(ArrayD::<u8>::from_shape_fn(shape, |_| rng.gen()))?.into_dyn()
        }
        ElementType::Int8 => {
            Tensor::from_array(ArrayD::<i8>::from_shape_fn(shape, |_| rng.gen()))?.into_dyn()
        }
        ElementType::Int32 => Tensor::from_array(ArrayD::<i32>::from_shape_fn(shape, |_| {
            rng.gen_range(0..256)
        }))?
        .into_dyn(),
        ElementType::Int64 => Tensor::from_array(ArrayD::<i64>::from_shape_fn(shape, |_| {
            rng.gen_range(0..256)
        }))?
        .into_dyn(),
        ElementType::Bool => {
            Tensor::from_array(ArrayD::<bool>::from_shape_fn(shape, |_| rng.gen()))?.into_dyn()
        }
        ty => bail!("Cannot generate random data for {} input '{}'", ty, spec.name),
    };

    Ok(value)
}
