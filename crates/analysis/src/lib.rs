//! # Analysis
//!
//! 路面分析计算（纯计算，无 I/O，无锁）。
//!
//! 负责：
//! - 运动补偿（加速度修正地面测距）
//! - 路面质量评分（粗糙度指数 + 分级）
//! - 异常检测（坑洞 / 凸起 / 裂缝聚类）
//! - 标定数据归约
//!
//! ## 使用示例
//!
//! ```ignore
//! use analysis::{AnomalyDetector, MotionCompensator, RoadQualityAnalyzer};
//!
//! let compensated = compensator.compensate(&frame, accel, baseline.as_ref());
//! let metrics = analyzer.analyze(&compensated);
//! let report = detector.detect(&compensated);
//! ```

mod anomaly;
pub mod calibration;
mod compensation;
mod error;
pub mod ground;
mod quality;
pub mod stats;

pub use anomaly::{cluster_indices, AnomalyDetector};
pub use compensation::{MotionCompensator, STANDARD_GRAVITY};
pub use error::AnalysisError;
pub use quality::{classify, RoadQualityAnalyzer};

use contracts::{AnomalyReport, RoadQualityMetrics, SurveyBlueprint};

/// Analyzer, detector and compensator built from one blueprint
#[derive(Debug, Clone)]
pub struct AnalysisSuite {
    pub compensator: MotionCompensator,
    pub analyzer: RoadQualityAnalyzer,
    pub detector: AnomalyDetector,
}

/// Result of one analysis pass
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub metrics: RoadQualityMetrics,
    pub report: AnomalyReport,
}

impl AnalysisSuite {
    pub fn from_blueprint(blueprint: &SurveyBlueprint) -> Self {
        Self {
            compensator: MotionCompensator::new(blueprint.compensation),
            analyzer: RoadQualityAnalyzer::new(blueprint.analyzer, blueprint.ground),
            detector: AnomalyDetector::new(blueprint.detector.clone(), blueprint.ground),
        }
    }

    /// Compensate once, then score and detect on the same frame.
    pub fn run(
        &self,
        frame: &contracts::ScanFrame,
        accel: Option<contracts::AccelSample>,
        baseline: Option<&contracts::CalibrationBaseline>,
    ) -> AnalysisOutcome {
        let compensated = self.compensator.compensate(frame, accel, baseline);
        AnalysisOutcome {
            metrics: self.analyzer.analyze(&compensated),
            report: self.detector.detect(&compensated),
        }
    }
}

impl Default for AnalysisSuite {
    fn default() -> Self {
        Self::from_blueprint(&SurveyBlueprint::default())
    }
}
