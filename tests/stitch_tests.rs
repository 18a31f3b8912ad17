//! Integration tests for stitching archives on disk.

use std::path::{Path, PathBuf};

use abc_stitch::abc::backend::{ArchiveBackend, BackendKind};
use abc_stitch::abc::{ArchiveData, CompoundData, IArchive, ObjectData};
use abc_stitch::core::{ArraySample, MetaData, PropertyHeader, SampleData, TimeSampling};
use abc_stitch::stitch::{
    stitch_files, ChildMatching, MergePolicy, SchemaKind, SkipReason, StitchError, StitchOptions,
    INDICES_NAME, VALS_NAME,
};
use abc_stitch::{DataType, PlainOldDataType};

use glam::Vec3;
use tempfile::TempDir;

const FPS: f64 = 1.0 / 24.0;

// ============================================================================
// Fixtures
// ============================================================================

/// Archive with one animated sampling at index 1 starting at `first_frame`.
fn archive_data(first_frame: f64) -> ArchiveData {
    ArchiveData {
        time_samplings: vec![TimeSampling::IDENTITY, TimeSampling::uniform(FPS, first_frame * FPS)],
        ..Default::default()
    }
}

fn write(dir: &TempDir, name: &str, data: ArchiveData) -> PathBuf {
    write_with(dir, name, data, BackendKind::Ogawa)
}

fn write_with(dir: &TempDir, name: &str, mut data: ArchiveData, kind: BackendKind) -> PathBuf {
    let path = dir.path().join(name);
    data.update_max_samples();
    kind.backend()
        .write(&path, &data, -1)
        .expect("Failed to write input archive");
    path
}

fn xform_meta() -> MetaData {
    MetaData::new()
        .with(MetaData::SCHEMA_KEY, "AbcGeom_Xform_v3")
        .with(MetaData::SCHEMA_OBJ_TITLE_KEY, "AbcGeom_Xform_v3:.xform")
}

fn mesh_meta() -> MetaData {
    MetaData::new()
        .with(MetaData::SCHEMA_KEY, "AbcGeom_PolyMesh_v1")
        .with(MetaData::SCHEMA_OBJ_TITLE_KEY, "AbcGeom_PolyMesh_v1:.geom")
}

fn uv_meta() -> MetaData {
    MetaData::new()
        .with(MetaData::GEOM_PARAM_KEY, "true")
        .with(MetaData::GEO_SCOPE_KEY, "fvr")
}

/// Translation xform sampled once per frame.
fn add_xform<'a>(parent: &'a mut ObjectData, name: &str, translations: &[f64]) -> &'a mut ObjectData {
    let obj = parent.add_child(name, xform_meta());
    let xform = obj.properties.add_compound(PropertyHeader::compound(".xform"));
    xform
        .add_scalar(PropertyHeader::scalar(".ops", DataType::new(PlainOldDataType::Uint8, 1)))
        .push(SampleData::from_values(&[0u8]));
    let vals = xform.add_scalar(
        PropertyHeader::scalar(".vals", DataType::new(PlainOldDataType::Float64, 3))
            .with_time_sampling(1),
    );
    for &x in translations {
        vals.push(SampleData::from_values(&[x, 0.0, 0.0]));
    }
    obj
}

fn triangle(offset: f32) -> Vec<Vec3> {
    vec![
        Vec3::new(offset, 0.0, 0.0),
        Vec3::new(offset + 1.0, 0.0, 0.0),
        Vec3::new(offset + 0.5, 1.0, 0.0),
    ]
}

/// Triangle mesh with one sample per frame. `uv` is written indexed when
/// `indexed_uv` is set and expanded otherwise.
fn add_mesh(parent: &mut ObjectData, name: &str, frames: &[f32], indexed_uv: bool) {
    let obj = parent.add_child(name, mesh_meta());
    let geom = obj.properties.add_compound(PropertyHeader::compound(".geom"));
    fill_mesh(geom, frames, indexed_uv);
}

fn fill_mesh(geom: &mut CompoundData, frames: &[f32], indexed_uv: bool) {
    let bnds = geom.add_scalar(PropertyHeader::scalar(".selfBnds", DataType::BOX3D).with_time_sampling(1));
    for &f in frames {
        bnds.push(SampleData::from_values(&[f as f64, 0.0, 0.0, f as f64 + 1.0, 1.0, 0.0]));
    }
    let p = geom.add_array(PropertyHeader::array("P", DataType::VEC3F).with_time_sampling(1));
    for &f in frames {
        let points = triangle(f);
        p.push(ArraySample::from_values(bytemuck::cast_slice::<Vec3, f32>(&points), 3));
    }
    let counts = geom.add_array(PropertyHeader::array(".faceCounts", DataType::INT32).with_time_sampling(1));
    for _ in frames {
        counts.push(ArraySample::from_values(&[3i32], 1));
    }
    let indices = geom.add_array(PropertyHeader::array(".faceIndices", DataType::INT32).with_time_sampling(1));
    for _ in frames {
        indices.push(ArraySample::from_values(&[0i32, 1, 2], 1));
    }

    if indexed_uv {
        let uv = geom.add_compound(PropertyHeader::compound("uv").with_meta_data(uv_meta()));
        let vals = uv.add_array(PropertyHeader::array(VALS_NAME, DataType::VEC2F).with_time_sampling(1));
        for _ in frames {
            vals.push(ArraySample::from_values(&[0.0f32, 0.0, 1.0, 1.0], 2));
        }
        let idx = uv.add_array(PropertyHeader::array(INDICES_NAME, DataType::UINT32).with_time_sampling(1));
        for _ in frames {
            idx.push(ArraySample::from_values(&[0u32, 1, 1], 1));
        }
    } else {
        let uv = geom.add_array(
            PropertyHeader::array("uv", DataType::VEC2F)
                .with_time_sampling(1)
                .with_meta_data(uv_meta()),
        );
        for _ in frames {
            uv.push(ArraySample::from_values(&[0.0f32, 0.0, 1.0, 0.0, 0.5, 1.0], 2));
        }
    }
}

fn scene_data(frames: &[f32], indexed_uv: bool) -> ArchiveData {
    let mut data = archive_data(frames[0] as f64);
    let translations: Vec<f64> = frames.iter().map(|&f| f as f64).collect();
    let xf = add_xform(&mut data.root, "xf", &translations);
    add_mesh(xf, "mesh", frames, indexed_uv);
    data
}

/// `/xf/mesh` animated over `frames`.
fn scene(dir: &TempDir, name: &str, frames: &[f32], indexed_uv: bool) -> PathBuf {
    write(dir, name, scene_data(frames, indexed_uv))
}

fn open(path: &Path) -> IArchive {
    IArchive::open(path).expect("Failed to open stitched archive")
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn test_consecutive_ranges_merge_without_gaps() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let a = scene(&dir, "a.abc", &[1.0, 2.0], false);
    let b = scene(&dir, "b.abc", &[3.0, 4.0], false);
    let out = dir.path().join("out.abc");

    let report = stitch_files(&out, &[&b, &a], &StitchOptions::default()).expect("stitch failed");
    assert_eq!(report.inputs, 2);
    assert_eq!(report.objects(SchemaKind::Xform), 1);
    assert_eq!(report.objects(SchemaKind::PolyMesh), 1);
    assert!(report.skipped().is_empty(), "unexpected skips: {:?}", report.skipped());

    let archive = open(&out);
    assert_eq!(archive.app_name(), Some("abc-stitch"));

    let geom = archive
        .find_object("/xf/mesh")
        .expect("mesh missing")
        .properties()
        .compound(".geom")
        .expect(".geom missing");
    let p = geom.array("P").expect("P missing");
    assert_eq!(p.num_samples(), 4);
    assert!((p.time_sampling().start_time() - FPS).abs() < 1e-9);
    for (i, frame) in [1.0f32, 2.0, 3.0, 4.0].iter().enumerate() {
        let values = p.values::<f32>(i).unwrap();
        assert_eq!(values[0], *frame, "sample {} came from the wrong input", i);
    }

    let vals = archive
        .find_object("/xf")
        .unwrap()
        .properties()
        .compound(".xform")
        .unwrap()
        .scalar(".vals")
        .unwrap();
    assert_eq!(vals.num_samples(), 4);
    assert_eq!(vals.values::<f64>(3).unwrap(), vec![4.0, 0.0, 0.0]);
}

#[test]
fn test_gap_between_ranges() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let a = scene(&dir, "a.abc", &[1.0, 2.0], false);
    let b = scene(&dir, "b.abc", &[5.0, 6.0], false);
    let out = dir.path().join("out.abc");

    stitch_files(&out, &[&a, &b], &StitchOptions::default()).expect("stitch failed");
    let archive = open(&out);

    let geom = archive.find_object("/xf/mesh").unwrap().properties().compound(".geom").unwrap();
    let p = geom.array("P").unwrap();
    assert_eq!(p.num_samples(), 6);
    assert!(p.sample(2).unwrap().is_empty());
    assert!(p.sample(3).unwrap().is_empty());
    assert_eq!(p.values::<f32>(4).unwrap()[0], 5.0);

    let bnds = geom.scalar(".selfBnds").unwrap();
    assert_eq!(bnds.num_samples(), 6);
    assert_eq!(bnds.values::<f64>(2).unwrap(), vec![0.0; 6]);

    // Transforms hold the next input's first sample across the gap.
    let vals = archive
        .find_object("/xf")
        .unwrap()
        .properties()
        .compound(".xform")
        .unwrap()
        .scalar(".vals")
        .unwrap();
    assert_eq!(vals.num_samples(), 6);
    assert_eq!(vals.values::<f64>(2).unwrap(), vec![5.0, 0.0, 0.0]);
    assert_eq!(vals.values::<f64>(3).unwrap(), vec![5.0, 0.0, 0.0]);
}

#[test]
fn test_same_input_twice_is_idempotent() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let a = scene(&dir, "a.abc", &[1.0, 2.0, 3.0], true);
    let out = dir.path().join("out.abc");

    stitch_files(&out, &[&a, &a], &StitchOptions::default()).expect("stitch failed");
    let input = open(&a);
    let output = open(&out);

    for path in ["/xf", "/xf/mesh"] {
        assert!(output.find_object(path).is_some(), "{} missing", path);
    }
    let geom_in = input.find_object("/xf/mesh").unwrap().properties().compound(".geom").unwrap();
    let geom_out = output.find_object("/xf/mesh").unwrap().properties().compound(".geom").unwrap();
    for name in ["P", ".faceCounts", ".faceIndices"] {
        let a = geom_in.array(name).unwrap();
        let b = geom_out.array(name).unwrap();
        assert_eq!(a.num_samples(), b.num_samples(), "{}", name);
        for i in 0..a.num_samples() {
            assert_eq!(a.sample(i).unwrap(), b.sample(i).unwrap(), "{} sample {}", name, i);
        }
    }
    let uv = geom_out.compound("uv").expect("uv stays indexed");
    assert_eq!(uv.array(VALS_NAME).unwrap().num_samples(), 3);
}

#[test]
fn test_expanded_and_indexed_uv_become_indexed() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let a = scene(&dir, "a.abc", &[1.0, 2.0], false);
    let b = scene(&dir, "b.abc", &[3.0, 4.0], true);
    let out = dir.path().join("out.abc");

    stitch_files(&out, &[&a, &b], &StitchOptions::default()).expect("stitch failed");
    let archive = open(&out);
    let geom = archive.find_object("/xf/mesh").unwrap().properties().compound(".geom").unwrap();

    let uv = geom.compound("uv").expect("uv should be written indexed");
    assert!(uv.header().meta_data.is_geom_param());
    let vals = uv.array(VALS_NAME).unwrap();
    let indices = uv.array(INDICES_NAME).unwrap();
    assert_eq!(vals.num_samples(), 4);
    assert_eq!(indices.num_samples(), 4);
    assert_eq!(indices.values::<u32>(0).unwrap(), vec![0, 1, 2]);
    assert_eq!(indices.values::<u32>(2).unwrap(), vec![0, 1, 1]);
}

#[test]
fn test_acyclic_sampling_rejected() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let a = scene(&dir, "a.abc", &[1.0, 2.0], false);

    let mut data = ArchiveData {
        time_samplings: vec![
            TimeSampling::IDENTITY,
            TimeSampling::acyclic(vec![3.0 * FPS, 3.5 * FPS]),
        ],
        ..Default::default()
    };
    let xf = add_xform(&mut data.root, "xf", &[3.0, 4.0]);
    add_mesh(xf, "mesh", &[3.0, 4.0], false);
    let b = write(&dir, "b.abc", data);
    let out = dir.path().join("out.abc");

    let err = stitch_files(&out, &[&a, &b], &StitchOptions::default()).unwrap_err();
    assert!(matches!(err, StitchError::AcyclicSampling { .. }), "got {}", err);
    assert_eq!(err.exit_code(), 1);
}

#[test]
fn test_mismatched_user_property_skipped_or_fatal() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let build = |name: &str, frame: f64, data_type: DataType| {
        let mut data = archive_data(frame);
        let obj = data.root.add_child("group", MetaData::new());
        let weight = obj
            .properties
            .add_scalar(PropertyHeader::scalar("weight", data_type).with_time_sampling(1));
        weight.push(SampleData::zeroed(data_type));
        weight.push(SampleData::zeroed(data_type));
        write(&dir, name, data)
    };
    let a = build("a.abc", 1.0, DataType::FLOAT32);
    let b = build("b.abc", 3.0, DataType::INT32);
    let out = dir.path().join("out.abc");

    let report = stitch_files(&out, &[&a, &b], &StitchOptions::default()).expect("stitch failed");
    assert_eq!(report.skipped().len(), 1);
    let skip = &report.skipped()[0];
    assert_eq!(skip.path, "/group/weight");
    assert_eq!(skip.input, 1);
    assert!(matches!(skip.reason, SkipReason::DataTypeMismatch { .. }));

    let archive = open(&out);
    let weight = archive.find_object("/group").unwrap().properties().scalar("weight").unwrap();
    assert_eq!(weight.data_type(), DataType::FLOAT32);
    assert_eq!(weight.num_samples(), 4);

    let strict = StitchOptions::new().with_merge_policy(MergePolicy::Strict);
    let err = stitch_files(&out, &[&a, &b], &strict).unwrap_err();
    assert!(matches!(err, StitchError::DataTypeMismatch { input: 1, .. }));
}

#[test]
fn test_overlapping_inputs_rejected() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let a = scene(&dir, "a.abc", &[1.0, 2.0], false);
    let b = scene(&dir, "b.abc", &[1.0, 2.0], false);
    let out = dir.path().join("out.abc");

    let err = stitch_files(&out, &[&a, &b], &StitchOptions::default()).unwrap_err();
    assert!(matches!(err, StitchError::OverlappingFrameRange { .. }));
}

#[test]
fn test_children_by_name_and_by_index() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let mut data = archive_data(1.0);
    data.root.add_child("left", MetaData::new());
    data.root.add_child("right", MetaData::new());
    let a = write(&dir, "a.abc", data);

    let mut data = archive_data(3.0);
    data.root.add_child("right", MetaData::new());
    data.root.add_child("extra", MetaData::new());
    let b = write(&dir, "b.abc", data);
    let out = dir.path().join("out.abc");

    stitch_files(&out, &[&a, &b], &StitchOptions::default()).expect("stitch failed");
    let archive = open(&out);
    let names: Vec<&str> = archive.root().children().map(|c| c.name()).collect();
    assert_eq!(names, vec!["left", "right", "extra"]);

    let mut data = archive_data(3.0);
    data.root.add_child("right", MetaData::new());
    let c = write(&dir, "c.abc", data);
    let by_index = StitchOptions::new().with_identity(ChildMatching::ByIndex);
    let err = stitch_files(&out, &[&a, &c], &by_index).unwrap_err();
    assert!(matches!(
        err,
        StitchError::ChildCountMismatch { expected: 2, actual: 1, .. }
    ));
}

#[test]
fn test_missing_input_and_unwritable_output() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let a = scene(&dir, "a.abc", &[1.0], false);
    let b = scene(&dir, "b.abc", &[2.0], false);

    let missing = dir.path().join("missing.abc");
    let err = stitch_files(dir.path().join("out.abc"), &[&a, &missing], &StitchOptions::default()).unwrap_err();
    assert_eq!(err.exit_code(), 1);

    let bad_out = dir.path().join("no_such_dir").join("out.abc");
    let err = stitch_files(&bad_out, &[&a, &b], &StitchOptions::default()).unwrap_err();
    assert!(matches!(err, StitchError::OutputCreate { .. }));
    assert_eq!(err.exit_code(), -1);
}

#[test]
fn test_output_is_ogawa_and_inputs_may_mix_backends() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let a = write_with(&dir, "a.abcst", scene_data(&[1.0, 2.0], false), BackendKind::Binary);
    let b = write_with(&dir, "b.json", scene_data(&[3.0, 4.0], true), BackendKind::Json);
    let c = scene(&dir, "c.abc", &[5.0, 6.0], false);
    let out = dir.path().join("out.abc");

    stitch_files(&out, &[&c, &a, &b], &StitchOptions::default()).expect("stitch failed");
    assert_eq!(&std::fs::read(&out).unwrap()[..5], b"Ogawa");

    let archive = open(&out);
    assert_eq!(archive.backend(), BackendKind::Ogawa);
    let p = archive
        .find_object("/xf/mesh")
        .unwrap()
        .properties()
        .compound(".geom")
        .unwrap()
        .array("P")
        .unwrap();
    assert_eq!(p.num_samples(), 6);
    for (i, frame) in [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0].iter().enumerate() {
        assert_eq!(p.values::<f32>(i).unwrap()[0], *frame);
    }
}

#[test]
fn test_input_without_objects_is_invalid() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let a = scene(&dir, "a.abc", &[1.0, 2.0], false);
    let empty = write(&dir, "empty.abc", archive_data(3.0));
    let out = dir.path().join("out.abc");

    let err = stitch_files(&out, &[&a, &empty], &StitchOptions::default()).unwrap_err();
    assert!(matches!(err, StitchError::Storage(_)), "got {}", err);
    assert!(err.to_string().contains("invalid input file"), "got {}", err);
    assert_eq!(err.exit_code(), 1);
}
