//! Property-based tests for control parsing and capture-request selection
//!
//! Run with: cargo test --test recording_props

use proptest::prelude::*;
use procamera::controls::{
    iso_from_slider, parse_fps_label, parse_resolution_label, shutter_from_slider, ControlPanel,
    OptionGroup,
};
use procamera::request::{build_capture_request, high_speed_request_list, ControlMode};
use procamera::platform::SurfaceId;
use procamera::{CaptureConfig, Resolution, SessionKind};

// ═══════════════════════════════════════════════════════════════════════════
// LABEL PARSING
// ═══════════════════════════════════════════════════════════════════════════

proptest! {
    /// "WxH" labels parse to exactly those dimensions
    #[test]
    fn explicit_resolution_round_trips(width in 1u32..8192, height in 1u32..8192) {
        let label = format!("{}x{}", width, height);
        prop_assert_eq!(parse_resolution_label(&label), Some(Resolution::new(width, height)));
    }

    /// Any label with one run of digits yields that frame rate, or nothing for zero
    #[test]
    fn fps_label_keeps_digits(fps in 0u32..100_000, prefix in "[A-Za-z ]{0,4}", suffix in "[A-Za-z ]{0,6}") {
        let label = format!("{}{}{}", prefix, fps, suffix);
        let expected = if fps == 0 { None } else { Some(fps) };
        prop_assert_eq!(parse_fps_label(&label), expected);
    }

    /// Labels without digits never parse
    #[test]
    fn fps_label_without_digits_rejected(label in "[A-Za-z ]{0,12}") {
        prop_assert_eq!(parse_fps_label(&label), None);
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// SLIDER MAPPINGS
// ═══════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn iso_never_below_100(position in -1000.0f32..10_000.0) {
        let iso = iso_from_slider(position);
        prop_assert!(iso >= 100);
        if position >= 100.0 {
            prop_assert_eq!(iso, position as u32);
        }
    }

    #[test]
    fn shutter_is_whole_milliseconds(position in 0u32..1000) {
        prop_assert_eq!(shutter_from_slider(position as f32), 1_000_000 * (position as u64 + 1));
    }

    /// An unparsable resolution option leaves the previous size in place
    #[test]
    fn unrecognized_resolution_keeps_previous(label in "[a-w ]{1,10}") {
        let mut panel = ControlPanel::new(
            OptionGroup::new(["60 FPS"]).with_checked(0),
            OptionGroup::new([label.as_str()]).with_checked(0),
        );
        let collected = panel.collect();
        prop_assert_eq!(collected.resolution(), Resolution::hd());
        prop_assert_eq!(collected.target_fps, 60);
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// SESSION SELECTION AND REQUESTS
// ═══════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn threshold_selects_session_kind(fps in 1u32..1000, threshold in 1u32..1000) {
        let kind = SessionKind::for_fps(fps, threshold);
        prop_assert_eq!(kind == SessionKind::HighSpeed, fps >= threshold);
    }

    /// Standard requests carry the manual values, high-speed ones leave them to the sensor
    #[test]
    fn request_matches_session_kind(fps in 1u32..480, iso in 100u32..3200, shutter_ms in 1u64..100) {
        let config = CaptureConfig::new(Resolution::hd(), fps, iso, shutter_ms * 1_000_000);
        let kind = config.session_kind(240);
        let request = build_capture_request(&config, kind, SurfaceId(1));
        prop_assert_eq!(request.targets.clone(), vec![SurfaceId(1)]);
        match kind {
            SessionKind::Standard => {
                prop_assert_eq!(request.control_mode, ControlMode::Off);
                prop_assert_eq!(request.sensor_sensitivity, Some(iso));
                prop_assert_eq!(request.sensor_exposure_time_ns, Some(shutter_ms * 1_000_000));
            }
            SessionKind::HighSpeed => {
                prop_assert_eq!(request.control_mode, ControlMode::Auto);
                prop_assert_eq!(request.sensor_sensitivity, None);
                let burst = high_speed_request_list(&request);
                prop_assert_eq!(burst.len() as u32, (fps / 30).max(1));
            }
        }
        let range = request.ae_target_fps_range.unwrap();
        prop_assert_eq!((range.min, range.max), (fps, fps));
    }
}
