//! Field tables and the buffered output schema.
//!
//! An [`OSchema`] keeps one value per output sample for every field it has
//! seen. Fields left unset in a sample hold their previous value; fields
//! that appear late are backfilled with empty values.

use super::SchemaKind;
use crate::abc::{ArrayData, CompoundData, IArrayProperty, IProperty, IScalarProperty, PropertyData, ScalarData};
use crate::core::{ArraySample, MetaData, PropertyHeader, PropertyType, SampleData};
use crate::stitch::context::{join_path, StitchContext};
use crate::stitch::error::StitchError;
use crate::stitch::geom_param::{identity_indices, INDICES_NAME, VALS_NAME};
use crate::stitch::report::SkipReason;
use crate::util::{DataType, Result};

// ============================================================================
// Field specs
// ============================================================================

/// Storage shape of a schema field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldShape {
    Scalar,
    Array,
    /// Geometry parameter: expanded array or indexed `.vals`/`.indices`.
    Param,
    /// Scalar or array, written in the shape of the first input that has it.
    Either,
}

impl FieldShape {
    pub const fn property_type(self) -> PropertyType {
        match self {
            Self::Scalar | Self::Either => PropertyType::Scalar,
            Self::Array | Self::Param => PropertyType::Array,
        }
    }

    /// Shape written before any input has decided it.
    const fn initial(self) -> Self {
        match self {
            Self::Either => Self::Scalar,
            other => other,
        }
    }
}

/// What an explicit empty sample writes for a field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OnEmpty {
    /// Zero-length array (zeroed value for scalars).
    Empty,
    /// Zero-valued scalar.
    Zero,
    /// Keep the previous value.
    Hold,
}

/// One named property of a schema compound.
#[derive(Clone, Copy, Debug)]
pub struct FieldSpec {
    pub name: &'static str,
    pub shape: FieldShape,
    /// Type used when the field has to be written before any input has it.
    pub default_type: DataType,
    pub on_empty: OnEmpty,
    /// Written once from the first input that has it.
    pub constant: bool,
    /// Written by empty samples even when no input has it yet.
    pub required: bool,
}

impl FieldSpec {
    const fn new(name: &'static str, shape: FieldShape, default_type: DataType, on_empty: OnEmpty) -> Self {
        Self {
            name,
            shape,
            default_type,
            on_empty,
            constant: false,
            required: false,
        }
    }

    pub const fn scalar(name: &'static str, default_type: DataType) -> Self {
        Self::new(name, FieldShape::Scalar, default_type, OnEmpty::Hold)
    }

    pub const fn array(name: &'static str, default_type: DataType) -> Self {
        Self::new(name, FieldShape::Array, default_type, OnEmpty::Empty)
    }

    pub const fn param(name: &'static str, default_type: DataType) -> Self {
        Self::new(name, FieldShape::Param, default_type, OnEmpty::Empty)
    }

    /// Scalar or array field. Empty samples hold like scalars.
    pub const fn either(name: &'static str, default_type: DataType) -> Self {
        Self::new(name, FieldShape::Either, default_type, OnEmpty::Hold)
    }

    /// Zeroed by empty samples.
    pub const fn zero(mut self) -> Self {
        self.on_empty = OnEmpty::Zero;
        self
    }

    pub const fn constant(mut self) -> Self {
        self.constant = true;
        self
    }

    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

fn empty_value(shape: FieldShape, data_type: DataType) -> FieldValue {
    match shape.initial() {
        FieldShape::Array => FieldValue::Array(ArraySample::empty(data_type.pod)),
        FieldShape::Param => FieldValue::Param {
            vals: ArraySample::empty(data_type.pod),
            indices: None,
        },
        _ => FieldValue::Scalar(SampleData::zeroed(data_type)),
    }
}

/// One sample of one field.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Scalar(SampleData),
    Array(ArraySample),
    Param {
        vals: ArraySample,
        indices: Option<ArraySample>,
    },
}

// ============================================================================
// Bound inputs
// ============================================================================

#[derive(Clone, Copy)]
enum InField<'a> {
    Scalar(IScalarProperty<'a>),
    Array(IArrayProperty<'a>),
    Param {
        vals: IArrayProperty<'a>,
        indices: Option<IArrayProperty<'a>>,
    },
}

impl<'a> InField<'a> {
    fn resolve(shape: FieldShape, prop: IProperty<'a>) -> Option<Self> {
        match (shape, prop) {
            (FieldShape::Scalar | FieldShape::Either, IProperty::Scalar(p)) => Some(Self::Scalar(p)),
            (FieldShape::Array | FieldShape::Either, IProperty::Array(p)) => Some(Self::Array(p)),
            (FieldShape::Param, IProperty::Array(vals)) => Some(Self::Param { vals, indices: None }),
            (FieldShape::Param, IProperty::Compound(c)) => Some(Self::Param {
                vals: c.array(VALS_NAME)?,
                indices: c.array(INDICES_NAME),
            }),
            _ => None,
        }
    }

    fn data_type(&self) -> DataType {
        match self {
            Self::Scalar(p) => p.data_type(),
            Self::Array(p) => p.data_type(),
            Self::Param { vals, .. } => vals.data_type(),
        }
    }

    fn shape(&self) -> FieldShape {
        match self {
            Self::Scalar(_) => FieldShape::Scalar,
            Self::Array(_) => FieldShape::Array,
            Self::Param { .. } => FieldShape::Param,
        }
    }

    fn num_samples(&self) -> usize {
        match self {
            Self::Scalar(p) => p.num_samples(),
            Self::Array(p) => p.num_samples(),
            Self::Param { vals, .. } => vals.num_samples(),
        }
    }

    /// Sample `index`, clamped to the property's own last sample.
    fn value(&self, index: usize) -> Result<FieldValue> {
        Ok(match self {
            Self::Scalar(p) => FieldValue::Scalar(p.sample(index)?),
            Self::Array(p) => FieldValue::Array(p.sample(index)?),
            Self::Param { vals, indices } => FieldValue::Param {
                vals: vals.sample(index)?,
                indices: match indices {
                    Some(i) if i.num_samples() > 0 => Some(i.sample(index)?),
                    _ => None,
                },
            },
        })
    }
}

/// An input schema's fields, aligned with the spec table. Fields the
/// input lacks or that were skipped are `None`.
pub struct BoundInput<'a> {
    pub input: usize,
    /// Sample count of the input schema.
    pub num_samples: usize,
    fields: Vec<Option<InField<'a>>>,
}

impl BoundInput<'_> {
    /// A binding with no fields.
    #[cfg(test)]
    pub(crate) fn detached(input: usize) -> Self {
        Self {
            input,
            num_samples: 0,
            fields: Vec::new(),
        }
    }
}

// ============================================================================
// Output schema
// ============================================================================

struct OField {
    spec: &'static FieldSpec,
    /// Shape written; differs from the spec's only for [`FieldShape::Either`].
    shape: FieldShape,
    data_type: DataType,
    meta: MetaData,
    /// Metadata of `.vals` when a param is written indexed.
    vals_meta: MetaData,
    values: Vec<FieldValue>,
    /// Created by an empty sample from the field's default type.
    provisional: bool,
}

impl OField {
    fn new(spec: &'static FieldSpec, data_type: DataType) -> Self {
        Self {
            spec,
            shape: spec.shape.initial(),
            data_type,
            meta: MetaData::new(),
            vals_meta: MetaData::new(),
            values: Vec::new(),
            provisional: false,
        }
    }

    fn empty(&self) -> FieldValue {
        empty_value(self.shape, self.data_type)
    }

    fn backfill(&mut self, len: usize) {
        while self.values.len() < len {
            let empty = self.empty();
            self.values.push(empty);
        }
    }

    fn hold(&mut self, len: usize) {
        while self.values.len() < len {
            let value = self.values.last().cloned().unwrap_or_else(|| self.empty());
            self.values.push(value);
        }
    }

    /// Adopt the shape, type and metadata of the first real input.
    fn retype(&mut self, shape: FieldShape, data_type: DataType, meta: MetaData, vals_meta: MetaData) {
        self.meta = meta;
        self.vals_meta = vals_meta;
        self.provisional = false;
        if self.data_type != data_type || self.shape != shape {
            self.data_type = data_type;
            self.shape = shape;
            let len = self.values.len();
            self.values.clear();
            self.backfill(len);
        }
    }

    fn write(self, out: &mut CompoundData, ts_index: u32) {
        let name = self.spec.name;
        match self.shape {
            FieldShape::Scalar | FieldShape::Either => {
                let mut data = ScalarData::new(
                    PropertyHeader::scalar(name, self.data_type)
                        .with_time_sampling(ts_index)
                        .with_meta_data(self.meta),
                );
                for value in self.values {
                    if let FieldValue::Scalar(s) = value {
                        data.push(s);
                    }
                }
                out.add(PropertyData::Scalar(data));
            }
            FieldShape::Array => {
                let mut data = ArrayData::new(
                    PropertyHeader::array(name, self.data_type)
                        .with_time_sampling(ts_index)
                        .with_meta_data(self.meta),
                );
                for value in self.values {
                    if let FieldValue::Array(a) = value {
                        data.push(a);
                    }
                }
                out.add(PropertyData::Array(data));
            }
            FieldShape::Param => write_param(self, out, ts_index),
        }
    }
}

fn write_param(field: OField, out: &mut CompoundData, ts_index: u32) {
    let indexed = field
        .values
        .iter()
        .any(|v| matches!(v, FieldValue::Param { indices: Some(_), .. }));
    let name = field.spec.name;

    if !indexed {
        let mut data = ArrayData::new(
            PropertyHeader::array(name, field.data_type)
                .with_time_sampling(ts_index)
                .with_meta_data(field.meta),
        );
        for value in field.values {
            if let FieldValue::Param { vals, .. } = value {
                data.push(vals);
            }
        }
        out.add(PropertyData::Array(data));
        return;
    }

    let mut meta = field.meta;
    meta.set(MetaData::GEOM_PARAM_KEY, "true");
    let mut vals = ArrayData::new(
        PropertyHeader::array(VALS_NAME, field.data_type)
            .with_time_sampling(ts_index)
            .with_meta_data(field.vals_meta),
    );
    let mut indices = ArrayData::new(
        PropertyHeader::array(INDICES_NAME, DataType::UINT32).with_time_sampling(ts_index),
    );
    for value in field.values {
        if let FieldValue::Param { vals: v, indices: i } = value {
            indices.push(i.unwrap_or_else(|| identity_indices(v.len())));
            vals.push(v);
        }
    }
    let compound = out.add_compound(PropertyHeader::compound(name).with_meta_data(meta));
    compound.add(PropertyData::Array(vals));
    compound.add(PropertyData::Array(indices));
}

/// Buffered output schema.
pub struct OSchema {
    kind: SchemaKind,
    specs: &'static [FieldSpec],
    fields: Vec<OField>,
    constants: Vec<PropertyData>,
    num_samples: usize,
}

impl OSchema {
    pub fn new(kind: SchemaKind, specs: &'static [FieldSpec]) -> Self {
        Self {
            kind,
            specs,
            fields: Vec::new(),
            constants: Vec::new(),
            num_samples: 0,
        }
    }

    pub fn kind(&self) -> SchemaKind {
        self.kind
    }

    pub fn num_samples(&self) -> usize {
        self.num_samples
    }

    /// Number of samples held by field `name`, if the field exists.
    pub fn field_len(&self, name: &str) -> Option<usize> {
        self.field(name).map(|f| f.values.len())
    }

    /// Last value of field `name`.
    pub fn last_value(&self, name: &str) -> Option<&FieldValue> {
        self.field(name).and_then(|f| f.values.last())
    }

    pub fn field_type(&self, name: &str) -> Option<DataType> {
        self.field(name).map(|f| f.data_type)
    }

    fn field(&self, name: &str) -> Option<&OField> {
        self.fields.iter().find(|f| f.spec.name == name)
    }

    fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.spec.name == name)
    }

    /// Field `spec`, created provisionally from its default type if missing.
    fn field_or_default(&mut self, spec: &'static FieldSpec) -> &mut OField {
        let index = match self.field_index(spec.name) {
            Some(i) => i,
            None => {
                let mut field = OField::new(spec, spec.default_type);
                field.provisional = true;
                self.fields.push(field);
                self.fields.len() - 1
            }
        };
        &mut self.fields[index]
    }

    /// Check an input's fields against the output and capture constants.
    ///
    /// Fields whose kind or data type disagrees with the output are left
    /// out for this input and reported through `ctx`.
    pub fn bind<'a>(
        &mut self,
        ctx: &mut StitchContext<'_>,
        input: usize,
        schema: &super::ISchema<'a>,
        path: &str,
    ) -> Result<BoundInput<'a>, StitchError> {
        let specs = self.specs;
        let mut fields = Vec::with_capacity(specs.len());
        for spec in specs {
            let Some(prop) = schema.compound.property(spec.name) else {
                fields.push(None);
                continue;
            };
            let prop_path = join_path(path, spec.name);

            if spec.constant {
                self.capture_constant(spec, prop)?;
                fields.push(None);
                continue;
            }

            let Some(field) = InField::resolve(spec.shape, prop) else {
                ctx.skip(
                    &prop_path,
                    input,
                    SkipReason::PropertyTypeMismatch {
                        expected: spec.shape.property_type(),
                        actual: prop.property_type(),
                    },
                )?;
                fields.push(None);
                continue;
            };

            let shape = field.shape();
            let data_type = field.data_type();
            let meta = prop.header().meta_data.clone();
            let vals_meta = match field {
                InField::Param { vals, .. } if prop.property_type() == PropertyType::Compound => {
                    vals.header().meta_data.clone()
                }
                _ => {
                    let mut m = meta.clone();
                    m.remove(MetaData::GEOM_PARAM_KEY);
                    m
                }
            };

            match self.field_index(spec.name) {
                Some(i) if self.fields[i].provisional => {
                    self.fields[i].retype(shape, data_type, meta, vals_meta);
                }
                Some(i) if self.fields[i].shape != shape && spec.shape == FieldShape::Either => {
                    let expected = self.fields[i].shape.property_type();
                    ctx.skip(
                        &prop_path,
                        input,
                        SkipReason::PropertyTypeMismatch { expected, actual: prop.property_type() },
                    )?;
                    fields.push(None);
                    continue;
                }
                Some(i) if self.fields[i].data_type != data_type => {
                    let expected = self.fields[i].data_type;
                    ctx.skip(
                        &prop_path,
                        input,
                        SkipReason::DataTypeMismatch { expected, actual: data_type },
                    )?;
                    fields.push(None);
                    continue;
                }
                Some(_) => {}
                None => {
                    let mut out = OField::new(spec, data_type);
                    out.shape = shape;
                    out.meta = meta;
                    out.vals_meta = vals_meta;
                    self.fields.push(out);
                }
            }
            fields.push(Some(field));
        }
        Ok(BoundInput {
            input,
            num_samples: schema.num_samples,
            fields,
        })
    }

    fn capture_constant(&mut self, spec: &FieldSpec, prop: IProperty<'_>) -> Result<()> {
        if self.constants.iter().any(|c| c.name() == spec.name) {
            return Ok(());
        }
        let data = match prop {
            IProperty::Scalar(p) if p.num_samples() > 0 => {
                let mut data = ScalarData::new(p.header().clone());
                data.push(p.sample(0)?);
                PropertyData::Scalar(data)
            }
            IProperty::Array(p) if p.num_samples() > 0 => {
                let mut data = ArrayData::new(p.header().clone());
                data.push(p.sample(0)?);
                PropertyData::Array(data)
            }
            _ => return Ok(()),
        };
        self.constants.push(data);
        Ok(())
    }

    /// Set one field for the sample being built.
    pub fn set_value(&mut self, spec: &'static FieldSpec, value: FieldValue) {
        let len = self.num_samples;
        let field = self.field_or_default(spec);
        field.backfill(len);
        field.values.truncate(len);
        field.values.push(value);
    }

    /// Close the sample being built. Unset fields hold their last value.
    pub fn commit(&mut self) {
        self.num_samples += 1;
        for field in &mut self.fields {
            field.hold(self.num_samples);
        }
    }

    /// Write sample `index` of `input`. Fields the input lacks hold.
    pub fn set_from_input(&mut self, input: &BoundInput<'_>, index: usize) -> Result<()> {
        let specs = self.specs;
        for (spec, field) in specs.iter().zip(&input.fields) {
            let Some(field) = field else { continue };
            if field.num_samples() == 0 {
                continue;
            }
            let value = field.value(index)?;
            self.set_value(spec, value);
        }
        self.commit();
        Ok(())
    }

    /// Write an explicit empty sample.
    pub fn set_empty(&mut self) {
        let specs = self.specs;
        for spec in specs {
            if spec.constant {
                continue;
            }
            let exists = self.field_index(spec.name).is_some();
            if !exists && !spec.required {
                continue;
            }
            match spec.on_empty {
                OnEmpty::Hold if exists => {}
                _ => {
                    let len = self.num_samples;
                    let field = self.field_or_default(spec);
                    field.backfill(len);
                    let empty = field.empty();
                    field.values.truncate(len);
                    field.values.push(empty);
                }
            }
        }
        self.commit();
    }

    /// Repeat the previous sample.
    pub fn set_from_previous(&mut self) {
        self.commit();
    }

    /// Write every field and constant into `out`, in table order.
    pub fn finish(mut self, out: &mut CompoundData, ts_index: u32) {
        let len = self.num_samples;
        let specs = self.specs;
        for spec in specs {
            if spec.constant {
                if let Some(i) = self.constants.iter().position(|c| c.name() == spec.name) {
                    let mut data = self.constants.swap_remove(i);
                    set_time_sampling(&mut data, ts_index);
                    out.add(data);
                }
            } else if let Some(i) = self.field_index(spec.name) {
                let mut field = self.fields.swap_remove(i);
                field.backfill(len);
                field.write(out, ts_index);
            }
        }
    }
}

fn set_time_sampling(data: &mut PropertyData, ts_index: u32) {
    match data {
        PropertyData::Scalar(s) => s.header.time_sampling_index = ts_index,
        PropertyData::Array(a) => a.header.time_sampling_index = ts_index,
        PropertyData::Compound(_) => {}
    }
}
