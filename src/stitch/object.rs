//! Object tree merging.

use std::collections::HashSet;

use super::context::{join_path, StitchContext};
use super::error::{SamplingField, StitchError};
use super::index::get_index_sample;
use super::options::ChildMatching;
use super::property::{stitch_compound_prop, stitch_scalar_prop};
use super::report::SkipReason;
use super::schema::{
    compound_name, ISchema, SchemaHandler, SchemaKind, ARB_GEOM_PARAMS_NAME, CHILD_BOUNDS_NAME,
    USER_PROPERTIES_NAME, VISIBILITY_NAME,
};
use crate::abc::{CompoundData, ICompoundProperty, IObject, ObjectData};
use crate::core::{PropertyHeader, TimeSampling};
use crate::util::Error;

/// Merge one aligned set of input objects into `out_parent`.
///
/// At the root the inputs' root objects are merged into `out_parent`
/// itself; elsewhere a child named after the first present input is added.
pub fn visit_objects(
    ctx: &mut StitchContext<'_>,
    inputs: &[Option<IObject<'_>>],
    out_parent: &mut ObjectData,
    at_root: bool,
) -> Result<(), StitchError> {
    let Some(first) = inputs.iter().flatten().next().copied() else {
        return Ok(());
    };

    let kind = if at_root {
        SchemaKind::Generic
    } else {
        SchemaKind::identify(first.header())
    };
    tracing::debug!("{} ({}, {} inputs)", first.full_name(), kind, inputs.iter().flatten().count());

    let out_obj = match kind.handler() {
        Some(handler) => stitch_schema_object(ctx, handler, inputs, first, out_parent)?,
        None => {
            let out_obj = if at_root {
                out_parent
            } else {
                out_parent.add_child(first.name(), first.meta_data().clone())
            };
            let compounds: Vec<_> = inputs.iter().map(|o| o.map(|o| o.properties())).collect();
            stitch_compound_prop(ctx, &compounds, &mut out_obj.properties, first.full_name())?;
            out_obj
        }
    };
    ctx.report.record_object(kind);
    ctx.spill(&mut out_obj.properties)?;

    visit_children(ctx, inputs, first, out_obj)
}

fn visit_children(
    ctx: &mut StitchContext<'_>,
    inputs: &[Option<IObject<'_>>],
    first: IObject<'_>,
    out_obj: &mut ObjectData,
) -> Result<(), StitchError> {
    match ctx.options.identity {
        ChildMatching::ByName => {
            let mut visited: HashSet<String> =
                out_obj.children.iter().map(|c| c.name().to_string()).collect();
            for input in inputs.iter().flatten() {
                for child in input.children() {
                    if !visited.insert(child.name().to_string()) {
                        continue;
                    }
                    let aligned: Vec<_> = inputs
                        .iter()
                        .map(|o| o.and_then(|o| o.child_by_name(child.name())))
                        .collect();
                    visit_objects(ctx, &aligned, out_obj, false)?;
                }
            }
        }
        ChildMatching::ByIndex => {
            let expected = first.num_children();
            for (i, input) in inputs.iter().enumerate() {
                let Some(input) = input else { continue };
                if input.num_children() != expected {
                    return Err(StitchError::ChildCountMismatch {
                        path: first.full_name().to_string(),
                        input: i,
                        expected,
                        actual: input.num_children(),
                    });
                }
            }
            for c in 0..expected {
                let aligned: Vec<_> = inputs.iter().map(|o| o.and_then(|o| o.child(c))).collect();
                let name = first.child(c).map(|o| o.name());
                if name.is_some_and(|n| out_obj.child(n).is_some()) {
                    continue;
                }
                visit_objects(ctx, &aligned, out_obj, false)?;
            }
        }
    }
    Ok(())
}

fn stitch_schema_object<'o>(
    ctx: &mut StitchContext<'_>,
    handler: &dyn SchemaHandler,
    inputs: &[Option<IObject<'_>>],
    first: IObject<'_>,
    out_parent: &'o mut ObjectData,
) -> Result<&'o mut ObjectData, StitchError> {
    let schemas = inputs
        .iter()
        .map(|o| o.map(|o| ISchema::new(o, handler)).transpose())
        .collect::<Result<Vec<_>, Error>>()?;
    let Some(first_schema) = schemas.iter().flatten().next().copied() else {
        return Err(Error::invalid(format!("{}: no schema inputs", first.full_name())).into());
    };
    let path = first.full_name();

    validate_sampling(path, &schemas)?;
    handler.validate(path, &schemas)?;

    let cname = compound_name(first.meta_data(), handler);
    let schema_path = join_path(path, cname);
    let track = ctx.track(first_schema.time_sampling);

    let mut out_schema = handler.create_output();
    for (i, schema) in schemas.iter().enumerate() {
        let Some(schema) = schema else { continue };
        let bound = out_schema.bind(ctx, i, schema, &schema_path)?;
        let align = get_index_sample(
            out_schema.num_samples(),
            &track.sampling,
            schema.num_samples,
            schema.time_sampling,
        );
        handler.gap_fill(&mut out_schema, &bound, align)?;
        for k in align.start..schema.num_samples {
            handler.transfer_sample(&mut out_schema, &bound, k)?;
        }
    }
    handler.tail_pad(&mut out_schema, track.expected);
    tracing::trace!("{}: {} samples ({})", schema_path, out_schema.num_samples(), out_schema.kind());

    let out_obj = out_parent.add_child(first.name(), first.meta_data().clone());
    let out_compound = out_obj.properties.add_compound(
        PropertyHeader::compound(cname).with_meta_data(first_schema.compound.header().meta_data.clone()),
    );
    out_schema.finish(out_compound, track.index);

    let child_bounds: Vec<_> = schemas
        .iter()
        .map(|s| s.and_then(|s| s.compound.scalar(CHILD_BOUNDS_NAME)))
        .collect();
    stitch_scalar_prop(ctx, &child_bounds, out_compound, &schema_path)?;

    for name in [ARB_GEOM_PARAMS_NAME, USER_PROPERTIES_NAME] {
        let compounds: Vec<Option<ICompoundProperty<'_>>> =
            schemas.iter().map(|s| s.and_then(|s| s.compound.compound(name))).collect();
        stitch_shared_compound(ctx, &schemas, &compounds, out_compound, &schema_path, name)?;
    }

    let has_visibility = first.properties().has_property(VISIBILITY_NAME);
    if has_visibility {
        let visible: Vec<_> = inputs
            .iter()
            .map(|o| o.and_then(|o| o.properties().scalar(VISIBILITY_NAME)))
            .collect();
        stitch_scalar_prop(ctx, &visible, &mut out_obj.properties, path)?;
    }

    Ok(out_obj)
}

/// Stitch `.arbGeomParams` or `.userProperties` when every present input
/// has it. Otherwise the inputs that do are reported and nothing is written.
fn stitch_shared_compound(
    ctx: &mut StitchContext<'_>,
    schemas: &[Option<ISchema<'_>>],
    compounds: &[Option<ICompoundProperty<'_>>],
    out: &mut CompoundData,
    path: &str,
    name: &str,
) -> Result<(), StitchError> {
    let Some(first) = compounds.iter().flatten().next() else {
        return Ok(());
    };
    let prop_path = join_path(path, name);
    let all = schemas
        .iter()
        .zip(compounds)
        .all(|(s, c)| s.is_none() || c.is_some());
    if !all {
        for (i, c) in compounds.iter().enumerate() {
            if c.is_some() {
                ctx.skip(&prop_path, i, SkipReason::PartialPresence)?;
            }
        }
        return Ok(());
    }

    let out_compound = out.add_compound(
        PropertyHeader::compound(name).with_meta_data(first.header().meta_data.clone()),
    );
    stitch_compound_prop(ctx, compounds, out_compound, &prop_path)
}

/// Reject acyclic sampling, differing sampling types and partial child
/// bounds across the inputs of one schema object.
fn validate_sampling(path: &str, schemas: &[Option<ISchema<'_>>]) -> Result<(), StitchError> {
    let Some(first) = schemas.iter().flatten().next() else {
        return Ok(());
    };
    let first_bounds = first.compound.scalar(CHILD_BOUNDS_NAME);

    for (i, schema) in schemas.iter().enumerate() {
        let Some(schema) = schema else { continue };
        check_pair(path, schema.time_source, first.time_sampling, schema.time_sampling)?;

        match (first_bounds, schema.compound.scalar(CHILD_BOUNDS_NAME)) {
            (Some(a), Some(b)) => {
                check_pair(path, CHILD_BOUNDS_NAME, a.time_sampling(), b.time_sampling())?;
            }
            (None, None) => {}
            _ => {
                return Err(StitchError::ChildBoundsPresence {
                    path: path.to_string(),
                    input: i,
                })
            }
        }
    }
    Ok(())
}

fn check_pair(
    path: &str,
    property: &str,
    first: &TimeSampling,
    other: &TimeSampling,
) -> Result<(), StitchError> {
    if first.is_acyclic() || other.is_acyclic() {
        return Err(StitchError::AcyclicSampling {
            path: path.to_string(),
            property: property.to_string(),
        });
    }

    let (a, b) = (first.sampling_type(), other.sampling_type());
    if a.samples_per_cycle != b.samples_per_cycle {
        return Err(StitchError::TimeSamplingMismatch {
            path: path.to_string(),
            property: property.to_string(),
            field: SamplingField::SamplesPerCycle,
            first: a.samples_per_cycle.to_string(),
            other: b.samples_per_cycle.to_string(),
        });
    }
    if a.time_per_cycle != b.time_per_cycle {
        return Err(StitchError::TimeSamplingMismatch {
            path: path.to_string(),
            property: property.to_string(),
            field: SamplingField::TimePerCycle,
            first: a.time_per_cycle.to_string(),
            other: b.time_per_cycle.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ArraySample, MetaData, SampleData, TimeSamplingType};
    use crate::util::DataType;

    fn ts(spc: u32, tpc: f64) -> TimeSampling {
        TimeSampling {
            sampling_type: TimeSamplingType::cyclic(spc, tpc),
            stored_times: (0..spc).map(|i| i as f64 * tpc / spc as f64).collect(),
        }
    }

    #[test]
    fn test_check_pair_names_field() {
        let err = check_pair("/a", "P", &ts(1, 1.0 / 24.0), &ts(2, 1.0 / 24.0)).unwrap_err();
        assert!(matches!(
            err,
            StitchError::TimeSamplingMismatch { field: SamplingField::SamplesPerCycle, .. }
        ));
        let err = check_pair("/a", "P", &ts(1, 1.0 / 24.0), &ts(1, 1.0 / 30.0)).unwrap_err();
        assert!(matches!(
            err,
            StitchError::TimeSamplingMismatch { field: SamplingField::TimePerCycle, .. }
        ));
        let acyclic = TimeSampling::acyclic(vec![0.0, 0.3]);
        assert!(matches!(
            check_pair("/a", "P", &ts(1, 1.0), &acyclic),
            Err(StitchError::AcyclicSampling { .. })
        ));
        assert!(check_pair("/a", "P", &ts(1, 0.5), &TimeSampling::uniform(0.5, 3.0)).is_ok());
    }

    #[test]
    fn test_child_bounds_presence() {
        let build = |with_bounds: bool| {
            let mut data = crate::abc::ArchiveData {
                time_samplings: vec![TimeSampling::IDENTITY],
                ..Default::default()
            };
            let obj = data
                .root
                .add_child("pts", MetaData::new().with(MetaData::SCHEMA_KEY, "AbcGeom_Points_v1"));
            let geom = obj.properties.add_compound(PropertyHeader::compound(".geom"));
            geom.add_array(PropertyHeader::array("P", DataType::VEC3F))
                .push(ArraySample::from_values(&[0.0f32; 3], 3));
            if with_bounds {
                geom.add_scalar(PropertyHeader::scalar(CHILD_BOUNDS_NAME, DataType::BOX3D))
                    .push(SampleData::zeroed(DataType::BOX3D));
            }
            data.update_max_samples();
            crate::abc::IArchive::from_data("pts", data).unwrap()
        };
        let a = build(true);
        let b = build(false);
        let handler = SchemaKind::Points.handler().unwrap();
        let sa = ISchema::new(a.find_object("/pts").unwrap(), handler).unwrap();
        let sb = ISchema::new(b.find_object("/pts").unwrap(), handler).unwrap();

        assert!(validate_sampling("/pts", &[Some(sa), Some(sa)]).is_ok());
        assert!(matches!(
            validate_sampling("/pts", &[Some(sa), None, Some(sb)]),
            Err(StitchError::ChildBoundsPresence { input: 2, .. })
        ));
    }
}
