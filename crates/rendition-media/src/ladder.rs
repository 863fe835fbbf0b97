//! Rendition ladder planning.

use tracing::info;

use rendition_models::{QualityRung, VideoMetadata};

/// Whether a rung survives for the given source.
///
/// The gate is an inclusive OR: a rung is kept when *either* threshold fits
/// inside the source, so a very wide but short source can keep a tall rung.
/// The floor rung `(0,0)` always passes.
pub fn retains(rung: &QualityRung, source: &VideoMetadata) -> bool {
    rung.width_threshold <= source.width() || rung.height_threshold <= source.height()
}

/// Select the rungs to produce, preserving the candidates' descending order.
pub fn plan_ladder(source: &VideoMetadata, candidates: &[QualityRung]) -> Vec<QualityRung> {
    let ladder: Vec<QualityRung> = candidates
        .iter()
        .filter(|rung| retains(rung, source))
        .cloned()
        .collect();

    info!(
        "Planned ladder for {}x{}: [{}]",
        source.width(),
        source.height(),
        ladder
            .iter()
            .map(|r| r.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    ladder
}

#[cfg(test)]
mod tests {
    use super::*;
    use rendition_models::default_candidates;

    fn meta(width: u32, height: u32) -> VideoMetadata {
        VideoMetadata::new(width, height, 30, 1.0).unwrap()
    }

    fn names(ladder: &[QualityRung]) -> Vec<&str> {
        ladder.iter().map(|r| r.name.as_str()).collect()
    }

    #[test]
    fn test_full_hd_keeps_every_rung() {
        let ladder = plan_ladder(&meta(1920, 1080), &default_candidates());
        assert_eq!(names(&ladder), ["1080p", "720p", "480p"]);
    }

    #[test]
    fn test_hd_drops_1080p() {
        let ladder = plan_ladder(&meta(1280, 720), &default_candidates());
        assert_eq!(names(&ladder), ["720p", "480p"]);
    }

    #[test]
    fn test_small_source_keeps_only_floor() {
        let ladder = plan_ladder(&meta(640, 360), &default_candidates());
        assert_eq!(names(&ladder), ["480p"]);
    }

    #[test]
    fn test_floor_survives_tiny_source() {
        let ladder = plan_ladder(&meta(1, 1), &default_candidates());
        assert_eq!(names(&ladder), ["480p"]);
    }

    #[test]
    fn test_floor_survives_every_resolution() {
        let candidates = default_candidates();
        for (w, h) in [(1, 1), (2, 4000), (4000, 2), (320, 240), (7680, 4320)] {
            let ladder = plan_ladder(&meta(w, h), &candidates);
            assert_eq!(ladder.last().map(|r| r.name.as_str()), Some("480p"));
        }
    }

    /// The gate is OR, not AND: width alone keeps 1080p for an ultra-wide,
    /// very short source. Pinned deliberately; see DESIGN.md.
    #[test]
    fn test_or_gate_keeps_rung_on_width_alone() {
        let ladder = plan_ladder(&meta(3840, 200), &default_candidates());
        assert_eq!(names(&ladder), ["1080p", "720p", "480p"]);
    }

    #[test]
    fn test_or_gate_keeps_rung_on_height_alone() {
        let ladder = plan_ladder(&meta(400, 720), &default_candidates());
        assert_eq!(names(&ladder), ["720p", "480p"]);
    }

    #[test]
    fn test_just_below_threshold_drops_rung() {
        let ladder = plan_ladder(&meta(1919, 1079), &default_candidates());
        assert_eq!(names(&ladder), ["720p", "480p"]);
    }
}
