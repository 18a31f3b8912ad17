//! Fixtures shared by the schema handler tests.

use super::{ISchema, SchemaHandler};
use crate::abc::{ArchiveData, CompoundData, IArchive, PropertyData, TimeSamplingTable};
use crate::core::{ArraySample, MetaData, PropertyHeader, SampleData, TimeSampling};
use crate::stitch::context::StitchContext;
use crate::stitch::index::SampleAlignment;
use crate::stitch::{StitchOptions, StitchReport, TimeAndSamplesMap};

/// Archive holding `/obj` with `schema`, its schema compound filled by `fill`.
pub fn single_object(handler: &dyn SchemaHandler, schema: &str, fill: impl FnOnce(&mut CompoundData)) -> IArchive {
    let mut data = ArchiveData {
        time_samplings: vec![TimeSampling::IDENTITY],
        ..Default::default()
    };
    let obj = data.root.add_child("obj", MetaData::new().with(MetaData::SCHEMA_KEY, schema));
    fill(obj.properties.add_compound(PropertyHeader::compound(handler.default_compound())));
    data.update_max_samples();
    IArchive::from_data("obj", data).unwrap()
}

/// Run `handler` over `gap` empty samples, every sample of `/obj`, then pad
/// to `expected`, and return the written schema compound.
pub fn gap_then_tail(handler: &dyn SchemaHandler, archive: &IArchive, gap: usize, expected: usize) -> CompoundData {
    let schema = ISchema::new(archive.find_object("/obj").unwrap(), handler).unwrap();

    let registry = TimeAndSamplesMap::new();
    let mut samplings = TimeSamplingTable::new();
    let options = StitchOptions::default();
    let mut report = StitchReport::new(1);
    let mut ctx = StitchContext::new(&registry, &mut samplings, &options, &mut report);

    let mut out = handler.create_output();
    let bound = out.bind(&mut ctx, 0, &schema, "/obj/.geom").unwrap();
    handler
        .gap_fill(&mut out, &bound, SampleAlignment { start: 0, num_empty: gap })
        .unwrap();
    for k in 0..schema.num_samples {
        handler.transfer_sample(&mut out, &bound, k).unwrap();
    }
    handler.tail_pad(&mut out, expected);
    assert_eq!(out.num_samples(), expected);
    assert!(report.skipped().is_empty());

    let mut compound = CompoundData::new(PropertyHeader::compound(handler.default_compound()));
    out.finish(&mut compound, 0);
    compound
}

pub fn array<'c>(compound: &'c CompoundData, name: &str) -> &'c [ArraySample] {
    match compound.get(name) {
        Some(PropertyData::Array(a)) => &a.samples,
        other => panic!("{} is not an array: {:?}", name, other),
    }
}

pub fn scalar<'c>(compound: &'c CompoundData, name: &str) -> &'c [SampleData] {
    match compound.get(name) {
        Some(PropertyData::Scalar(s)) => &s.samples,
        other => panic!("{} is not a scalar: {:?}", name, other),
    }
}
