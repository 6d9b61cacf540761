//! Tests for headless recording

#[cfg(feature = "headless")]
mod headless_tests {
    use procamera::headless::{list_cameras, record, record_on, HeadlessOptions};
    use procamera::platform::{FaultPlan, SimulatedCamera};
    use procamera::{Resolution, SessionKind};
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use std::time::Duration;

    fn options(dir: &std::path::Path) -> HeadlessOptions {
        let mut options = HeadlessOptions::new(dir);
        options.duration = Duration::from_millis(200);
        options
    }

    #[test]
    fn test_list_cameras() {
        let cameras = list_cameras().unwrap();
        assert_eq!(cameras.len(), 2);
        assert_eq!(cameras[0].id, "0");
        assert!(!cameras[0].characteristics.high_speed_modes.is_empty());
    }

    #[tokio::test]
    async fn test_record_high_speed_to_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut options = options(dir.path());
        options.fps_label = "240 FPS".to_string();
        options.resolution_label = "1920x1080".to_string();

        let report = record(&options, Arc::new(AtomicBool::new(false))).await.unwrap();
        assert_eq!(report.session_kind, SessionKind::HighSpeed);
        assert_eq!(report.config.resolution(), Resolution::full_hd());
        assert!(!report.interrupted);

        let path = report.saved.output.path.clone().unwrap();
        assert!(path.exists());
        assert!(path.starts_with(dir.path().join("DCIM/ProCamera240fps")));
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("ManualCinema_") && name.ends_with(".mp4"));
    }

    #[tokio::test]
    async fn test_manual_values_reach_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut options = options(dir.path());
        options.fps_label = "60 FPS".to_string();
        options.iso_position = 40.0;
        options.shutter_position = 3.0;

        let report = record(&options, Arc::new(AtomicBool::new(false))).await.unwrap();
        assert_eq!(report.session_kind, SessionKind::Standard);
        assert_eq!(report.config.target_fps, 60);
        assert_eq!(report.config.iso, 100);
        assert_eq!(report.config.shutter_duration_ns, 4_000_000);
    }

    #[tokio::test]
    async fn test_unrecognized_resolution_keeps_default() {
        let dir = tempfile::tempdir().unwrap();
        let mut options = options(dir.path());
        options.resolution_label = "cinema".to_string();

        let report = record(&options, Arc::new(AtomicBool::new(false))).await.unwrap();
        assert_eq!(report.config.resolution(), Resolution::hd());
    }

    #[tokio::test]
    async fn test_stop_flag_ends_early() {
        let dir = tempfile::tempdir().unwrap();
        let mut options = options(dir.path());
        options.duration = Duration::from_secs(30);

        let report = record(&options, Arc::new(AtomicBool::new(true))).await.unwrap();
        assert!(report.interrupted);
        assert!(report.saved.output.path.unwrap().exists());
    }

    #[tokio::test]
    async fn test_disconnect_reports_partial_recording() {
        let dir = tempfile::tempdir().unwrap();
        let mut options = options(dir.path());
        options.duration = Duration::from_secs(5);
        let camera = Arc::new(SimulatedCamera::new().with_faults(FaultPlan {
            disconnect_after_frames: Some(5),
            ..FaultPlan::default()
        }));

        let report = record_on(camera, &options, Arc::new(AtomicBool::new(false)))
            .await
            .unwrap();
        assert!(report.interrupted);
        assert!(report.saved.warnings.iter().any(|w| w.contains("interrupted")));
    }
}
