//! Top-level stitch entry points.

use std::path::{Path, PathBuf};

use super::context::StitchContext;
use super::error::StitchError;
use super::object::visit_objects;
use super::options::StitchOptions;
use super::report::StitchReport;
use super::time_map::TimeAndSamplesMap;
use crate::abc::{IArchive, OArchive};
use crate::util::{Chrono, Error};

/// Application name written to stitched archives.
pub const APP_NAME: &str = "abc-stitch";

/// Stitch the archives at `inputs` into a new archive at `output`.
///
/// Inputs are reordered by the start time of their first animated time
/// sampling; two distinct inputs starting at the same time are rejected.
pub fn stitch_files<P, Q>(output: P, inputs: &[Q], options: &StitchOptions) -> Result<StitchReport, StitchError>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    if inputs.len() < 2 {
        return Err(StitchError::NotEnoughInputs(inputs.len()));
    }

    let mut archives = Vec::with_capacity(inputs.len());
    for path in inputs {
        let path = path.as_ref();
        let archive = IArchive::open(path)?;
        if archive.root().num_children() == 0 {
            return Err(Error::invalid(format!("{}: invalid input file, no objects", path.display())).into());
        }
        tracing::debug!(
            "opened {} ({} backend, {} time samplings)",
            path.display(),
            archive.backend().name(),
            archive.num_time_samplings()
        );
        archives.push((path.to_path_buf(), archive));
    }
    let archives = order_inputs(archives)?;

    let output = output.as_ref();
    let mut out = OArchive::create(output).map_err(|source| StitchError::OutputCreate {
        path: output.to_path_buf(),
        source,
    })?;
    out.set_compression_hint(options.compression);
    out.set_app_name(APP_NAME);
    out.set_description(&format!("stitched from {} archives", archives.len()));

    let report = stitch_archives(&archives, &mut out, options)?;
    out.close()?;
    tracing::info!("wrote {}", output.display());
    Ok(report)
}

/// Start time used for ordering: sampling index 1, or 0 when the archive
/// only has identity sampling.
fn start_time(archive: &IArchive) -> Chrono {
    archive.time_sampling(1).map(|ts| ts.start_time()).unwrap_or(0.0)
}

/// Sort inputs by start time. Distinct paths sharing a start time are an
/// overlapping frame range; the same path given twice is kept.
fn order_inputs(mut archives: Vec<(PathBuf, IArchive)>) -> Result<Vec<IArchive>, StitchError> {
    archives.sort_by(|(_, a), (_, b)| start_time(a).total_cmp(&start_time(b)));

    for pair in archives.windows(2) {
        let (first, a) = &pair[0];
        let (second, b) = &pair[1];
        let time = start_time(a);
        if time == start_time(b) && first != second {
            return Err(StitchError::OverlappingFrameRange {
                first: first.clone(),
                second: second.clone(),
                time,
            });
        }
    }

    Ok(archives.into_iter().map(|(_, a)| a).collect())
}

/// Stitch already opened, already ordered archives into `out`.
pub fn stitch_archives(
    archives: &[IArchive],
    out: &mut OArchive,
    options: &StitchOptions,
) -> Result<StitchReport, StitchError> {
    let mut registry = TimeAndSamplesMap::new();
    for archive in archives {
        for (i, ts) in archive.time_samplings().iter().enumerate() {
            let n = archive.max_num_samples_for_time_sampling(i).unwrap_or(0);
            registry.add(ts, n);
        }
    }
    tracing::debug!("{} distinct time sampling types", registry.len());

    let mut report = StitchReport::new(archives.len());
    let roots: Vec<_> = archives.iter().map(|a| Some(a.root())).collect();
    let (samplings, root, writer) = out.parts_mut();
    let mut ctx = StitchContext::new(&registry, samplings, options, &mut report).with_writer(writer);
    visit_objects(&mut ctx, &roots, root, true)?;

    tracing::info!("{}", report);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abc::ArchiveData;
    use crate::core::TimeSampling;

    fn archive(start: Chrono) -> IArchive {
        let data = ArchiveData {
            time_samplings: vec![TimeSampling::IDENTITY, TimeSampling::uniform(0.5, start)],
            ..Default::default()
        };
        IArchive::from_data("mem", data).unwrap()
    }

    #[test]
    fn test_order_by_start_time() {
        let ordered = order_inputs(vec![
            ("b.abc".into(), archive(2.0)),
            ("a.abc".into(), archive(1.0)),
        ])
        .unwrap();
        assert_eq!(start_time(&ordered[0]), 1.0);
        assert_eq!(start_time(&ordered[1]), 2.0);
    }

    #[test]
    fn test_overlap_rejected_same_path_kept() {
        let err = order_inputs(vec![
            ("a.abc".into(), archive(1.0)),
            ("b.abc".into(), archive(1.0)),
        ])
        .unwrap_err();
        assert!(matches!(err, StitchError::OverlappingFrameRange { .. }));

        let kept = order_inputs(vec![
            ("a.abc".into(), archive(1.0)),
            ("a.abc".into(), archive(1.0)),
        ])
        .unwrap();
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_not_enough_inputs() {
        let err = stitch_files("out.abc", &["a.abc"], &StitchOptions::default()).unwrap_err();
        assert!(matches!(err, StitchError::NotEnoughInputs(1)));
        assert_eq!(err.exit_code(), -1);
    }
}
