//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 配置 → 分析链路的性质测试
//! - 模拟源 e2e 测试（无需真实硬件）

#[cfg(test)]
mod contract_tests {
    use config_loader::{ConfigFormat, ConfigLoader};

    #[test]
    fn test_empty_config_is_valid() {
        let blueprint = ConfigLoader::load_from_str("", ConfigFormat::Toml).unwrap();
        assert_eq!(blueprint.version, contracts::ConfigVersion::V1);
        assert_eq!(blueprint.detector.bands.len(), 2);
    }

    #[test]
    fn test_toml_and_json_agree() {
        let toml = r#"
            [analyzer]
            min_valid_samples = 5

            [detector]
            max_gap = 3
        "#;
        let json = r#"{"analyzer": {"min_valid_samples": 5}, "detector": {"max_gap": 3}}"#;
        let a = ConfigLoader::load_from_str(toml, ConfigFormat::Toml).unwrap();
        let b = ConfigLoader::load_from_str(json, ConfigFormat::Json).unwrap();
        assert_eq!(a.analyzer, b.analyzer);
        assert_eq!(a.detector.max_gap, b.detector.max_gap);
    }
}

#[cfg(test)]
mod property_tests {
    use analysis::{cluster_indices, classify, AnalysisSuite};
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{
        AccelSample, AnomalyKind, CalibrationBaseline, Orientation, QualityThresholds,
        RangeSample, RoadQuality, ScanFrame,
    };

    /// Distances laid out one per degree starting at nadir
    fn frame_at_nadir(distances: &[f64]) -> ScanFrame {
        distances
            .iter()
            .enumerate()
            .map(|(i, &d)| RangeSample::new(i as f64, d))
            .collect()
    }

    fn baseline(g: f64) -> CalibrationBaseline {
        CalibrationBaseline {
            accel_baseline_g: g,
            ground_distance_baseline_mm: 300.0,
            orientation: Orientation::from_gravity(g),
            captured_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_reference_frame_through_configured_suite() {
        let blueprint = ConfigLoader::load_from_str(
            "[analyzer]\nmin_valid_samples = 5\n",
            ConfigFormat::Toml,
        )
        .unwrap();
        let suite = AnalysisSuite::from_blueprint(&blueprint);

        let outcome = suite.run(&frame_at_nadir(&[100.0, 110.0, 105.0, 95.0, 100.0]), None, None);

        assert_eq!(outcome.metrics.ground_points, 5);
        assert!((outcome.metrics.mean_distance_mm - 102.0).abs() < 1e-9);
        assert!((outcome.metrics.variance - 26.0).abs() < 1e-9);
        assert!((outcome.metrics.roughness_index - 25.490_196).abs() < 1e-3);
        assert_eq!(outcome.metrics.quality, RoadQuality::VeryPoor);
        assert_eq!(outcome.metrics.quality_score, 10);
    }

    #[test]
    fn test_sparse_frame_is_unknown_with_defaults() {
        let suite = AnalysisSuite::default();
        let outcome = suite.run(&frame_at_nadir(&[100.0, 900.0, 105.0]), None, None);
        assert_eq!(outcome.metrics.quality, RoadQuality::Unknown);
        assert_eq!(outcome.metrics.quality_score, 50);
        assert_eq!(outcome.metrics.roughness_index, 0.0);
    }

    #[test]
    fn test_classification_never_improves_with_roughness() {
        let thresholds = QualityThresholds::default();
        let mut last = u8::MAX;
        for step in 0..400 {
            let score = classify(step as f64 * 0.05, &thresholds).score();
            assert!(score <= last);
            last = score;
        }
    }

    #[test]
    fn test_cluster_gap_rule() {
        assert_eq!(cluster_indices(&[5, 6, 8], 2), vec![vec![5, 6, 8]]);
        assert_eq!(cluster_indices(&[5, 6, 9], 2), vec![vec![5, 6], vec![9]]);
    }

    #[test]
    fn test_zero_relative_accel_keeps_analysis_unchanged() {
        let suite = AnalysisSuite::default();
        let frame = frame_at_nadir(&[300.0, 302.0, 298.0, 301.0, 299.0, 300.0, 303.0, 297.0, 300.0, 301.0]);

        let plain = suite.run(&frame, None, None);
        let compensated = suite.run(&frame, Some(AccelSample::new(0.98)), Some(&baseline(0.98)));

        assert_eq!(plain.metrics.roughness_index, compensated.metrics.roughness_index);
        assert_eq!(plain.metrics.mean_distance_mm, compensated.metrics.mean_distance_mm);
    }

    #[test]
    fn test_missing_inputs_fail_open() {
        let suite = AnalysisSuite::default();
        let frame = frame_at_nadir(&[300.0; 12]);
        assert_eq!(suite.compensator.compensate(&frame, None, Some(&baseline(1.0))), frame);
        assert_eq!(
            suite.compensator.compensate(&frame, Some(AccelSample::new(1.3)), None),
            frame
        );
    }

    #[test]
    fn test_detection_idempotent_on_compensated_frame() {
        let suite = AnalysisSuite::default();
        let mut distances = vec![300.0; 11];
        distances[1] = 360.0;
        distances[2] = 365.0;
        distances[3] = 362.0;
        // Detector band is [355, 359] ∪ [0, 5]; shift so indices land in it
        let frame: ScanFrame = distances
            .iter()
            .enumerate()
            .map(|(i, &d)| RangeSample::new(contracts::normalize_angle(i as f64 - 5.0), d))
            .collect();
        let compensated = suite
            .compensator
            .compensate(&frame, Some(AccelSample::new(1.05)), Some(&baseline(1.0)));

        let first = suite.detector.detect(&compensated);
        let second = suite.detector.detect(&compensated);

        assert_eq!(first, second);
        assert!(first
            .anomalies
            .iter()
            .any(|e| e.kind == AnomalyKind::Pothole));
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{
        AnomalyKind, ContractError, DataSink, FusionSnapshot, Severity, SinkConfig, SinkType,
        SnapshotTrigger, SurveyBlueprint,
    };
    use dispatcher::{create_dispatcher, Dispatcher, SinkHandle};
    use fusion::{FusionSources, Orchestrator, StateStore};
    use ingestion::{
        SimulatedAccelSource, SimulatedBattery, SimulatedFixConfig, SimulatedFixSource,
        SimulatedScanConfig, SimulatedScanSource,
    };
    use observability::SurveyStatsAggregator;
    use tokio::sync::mpsc;

    const FAST_SURVEY: &str = r#"
        [vehicle]
        id = "e2e-van"

        [calibration]
        accel_samples = 5
        accel_interval_ms = 1
        scan_samples = 3
        scan_interval_ms = 1

        [cadence]
        scan_ms = 5
        fix_ms = 5
        accel_ms = 5
        analysis_ms = 10
        battery_ms = 10
        track_interval_ms = 25
        shutdown_timeout_ms = 1000
    "#;

    fn fast_blueprint() -> SurveyBlueprint {
        ConfigLoader::load_from_str(FAST_SURVEY, ConfigFormat::Toml).unwrap()
    }

    /// Sink that keeps every snapshot it receives
    struct CollectingSink {
        name: String,
        received: Arc<Mutex<Vec<FusionSnapshot>>>,
    }

    impl DataSink for CollectingSink {
        fn name(&self) -> &str {
            &self.name
        }

        async fn write(&mut self, snapshot: &FusionSnapshot) -> Result<(), ContractError> {
            self.received.lock().unwrap().push(snapshot.clone());
            Ok(())
        }

        async fn flush(&mut self) -> Result<(), ContractError> {
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            Ok(())
        }
    }

    fn sources(
        pothole_every: Option<u64>,
    ) -> FusionSources<SimulatedScanSource, SimulatedFixSource, SimulatedAccelSource> {
        FusionSources::new(
            SimulatedScanSource::new(SimulatedScanConfig {
                pothole_every,
                ..Default::default()
            }),
            SimulatedFixSource::new(SimulatedFixConfig {
                warmup_reads: 0,
                ..Default::default()
            }),
            SimulatedAccelSource::default(),
        )
    }

    /// End-to-end: simulated sources -> calibration -> fusion -> dispatcher -> sink
    #[tokio::test]
    async fn test_e2e_simulated_survey() {
        let blueprint = fast_blueprint();
        let store = Arc::new(StateStore::new("e2e", &blueprint.history));

        let received = Arc::new(Mutex::new(Vec::new()));
        let (tx, rx) = mpsc::channel(blueprint.history.snapshot_queue);
        let dispatcher = Dispatcher::with_handles(
            vec![SinkHandle::spawn(
                CollectingSink {
                    name: "collect".to_string(),
                    received: Arc::clone(&received),
                },
                256,
            )],
            rx,
        );
        let dispatcher_handle = dispatcher.spawn();

        let mut orchestrator = Orchestrator::new(
            &blueprint,
            Arc::clone(&store),
            sources(Some(1)).with_battery(SimulatedBattery::new()),
        )
        .with_output(tx);

        let baseline = orchestrator.calibrate().await.unwrap();
        assert!((baseline.accel_baseline_g - 1.0).abs() < 0.05);
        assert_eq!(store.calibration(), Some(baseline));

        let handle = orchestrator.start().unwrap();
        drop(orchestrator);
        tokio::time::sleep(Duration::from_millis(250)).await;
        handle
            .shutdown(blueprint.cadence.shutdown_timeout())
            .await
            .unwrap();

        tokio::time::timeout(Duration::from_secs(2), dispatcher_handle)
            .await
            .expect("dispatcher drained")
            .unwrap();

        let snapshots = received.lock().unwrap().clone();
        assert!(!snapshots.is_empty());
        assert!(snapshots.iter().all(|s| s.session_id == "e2e"));

        // Every scan carries a pothole right below the vehicle
        let analysis: Vec<_> = snapshots
            .iter()
            .filter(|s| s.trigger == SnapshotTrigger::Analysis)
            .collect();
        assert!(!analysis.is_empty());
        assert!(analysis.windows(2).all(|w| w[0].tick < w[1].tick));

        let history = store.anomaly_history();
        assert!(history
            .iter()
            .any(|r| r.event.kind == AnomalyKind::Pothole && r.event.severity == Severity::High));

        // Track points only once a fix is held
        let track: Vec<_> = snapshots
            .iter()
            .filter(|s| s.trigger == SnapshotTrigger::Track)
            .collect();
        assert!(!track.is_empty());
        assert!(track.iter().all(|s| s.gps.is_some()));

        let mut survey = SurveyStatsAggregator::new();
        for snapshot in &snapshots {
            survey.update(snapshot);
        }
        let summary = survey.summary();
        assert_eq!(summary.total_snapshots, snapshots.len() as u64);
        assert!(summary.anomaly_counts.get("pothole").copied().unwrap_or(0) > 0);
    }

    /// A flat road never raises a pothole or bump
    #[tokio::test]
    async fn test_e2e_flat_road_quality() {
        let blueprint = fast_blueprint();
        let store = Arc::new(StateStore::new("flat", &blueprint.history));
        let (tx, mut rx) = mpsc::channel(256);

        let mut orchestrator =
            Orchestrator::new(&blueprint, Arc::clone(&store), sources(None)).with_output(tx);
        orchestrator.calibrate().await.unwrap();
        let handle = orchestrator.start().unwrap();
        drop(orchestrator);

        tokio::time::sleep(Duration::from_millis(120)).await;
        handle
            .shutdown(blueprint.cadence.shutdown_timeout())
            .await
            .unwrap();

        let mut measured = 0;
        while let Some(snapshot) = rx.recv().await {
            assert!(snapshot.anomalies.is_empty());
            if snapshot.quality.quality.is_measured() {
                measured += 1;
            }
        }
        assert!(measured > 0);

        // Unknown (50) only before the first scan lands
        let scores = store.score_history();
        assert!(scores.iter().any(|&s| s >= 70));
        assert!(scores.iter().all(|&s| s == 50 || s >= 70));
    }

    /// Dispatcher built from config with the default sink set
    #[tokio::test]
    async fn test_dispatcher_default_sinks() {
        let blueprint = SurveyBlueprint::default();
        let (tx, rx) = mpsc::channel::<FusionSnapshot>(10);

        let sinks = ConfigLoader::effective_sinks(&blueprint);
        assert_eq!(
            sinks.iter().map(|s| s.sink_type).collect::<Vec<_>>(),
            vec![SinkType::Log, SinkType::Alert]
        );

        let dispatcher = create_dispatcher(sinks, rx).await.unwrap();
        let metrics = dispatcher.sink_metrics();
        assert_eq!(metrics.len(), 2);
        let handle = dispatcher.spawn();

        for tick in 1..=5 {
            tx.send(FusionSnapshot {
                tick,
                ..Default::default()
            })
            .await
            .unwrap();
        }
        drop(tx);

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
        for (_, m) in metrics {
            assert_eq!(m.write_count(), 5);
        }
    }

    /// Rejected sink params surface before anything runs
    #[tokio::test]
    async fn test_dispatcher_rejects_bad_alert_params() {
        let (_tx, rx) = mpsc::channel::<FusionSnapshot>(1);
        let mut config = SinkConfig::new("alerts", SinkType::Alert);
        config
            .params
            .insert("min_severity".to_string(), "critical".to_string());
        assert!(create_dispatcher(vec![config], rx).await.is_err());
    }
}
