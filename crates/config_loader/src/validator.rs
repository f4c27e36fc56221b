//! 配置校验模块
//!
//! 先执行声明式范围校验 (`validator` derive)，再执行跨字段规则：
//! - 粗糙度阈值严格递增
//! - 分析角度区间 min < max
//! - 地面距离窗口 min < max
//! - 检测波束区间 from <= to，且落在分析角度区间内
//! - 电池告警阈值 low < recover
//! - sink 名称唯一

use std::collections::HashSet;

use contracts::{ContractError, SurveyBlueprint};
use ::validator::Validate;

/// 校验 SurveyBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &SurveyBlueprint) -> Result<(), ContractError> {
    validate_declared_ranges(blueprint)?;
    validate_thresholds(blueprint)?;
    validate_analyzer_band(blueprint)?;
    validate_ground_window(blueprint)?;
    validate_detector_bands(blueprint)?;
    validate_battery(blueprint)?;
    validate_sinks(blueprint)?;
    Ok(())
}

/// 声明式范围校验
fn validate_declared_ranges(blueprint: &SurveyBlueprint) -> Result<(), ContractError> {
    blueprint
        .validate()
        .map_err(|e| ContractError::config_validation("blueprint", e.to_string()))
}

/// 校验粗糙度阈值递增
fn validate_thresholds(blueprint: &SurveyBlueprint) -> Result<(), ContractError> {
    let t = &blueprint.analyzer.thresholds;
    if !t.is_ascending() {
        return Err(ContractError::config_validation(
            "analyzer.thresholds",
            format!(
                "thresholds must be strictly ascending, got excellent={} good={} fair={} poor={}",
                t.excellent, t.good, t.fair, t.poor
            ),
        ));
    }
    Ok(())
}

/// 校验分析角度区间
fn validate_analyzer_band(blueprint: &SurveyBlueprint) -> Result<(), ContractError> {
    let a = &blueprint.analyzer;
    if a.min_angle_deg >= a.max_angle_deg {
        return Err(ContractError::config_validation(
            "analyzer.min_angle_deg / analyzer.max_angle_deg",
            format!(
                "min_angle_deg ({}) must be < max_angle_deg ({})",
                a.min_angle_deg, a.max_angle_deg
            ),
        ));
    }
    Ok(())
}

/// 校验地面距离窗口
fn validate_ground_window(blueprint: &SurveyBlueprint) -> Result<(), ContractError> {
    let g = &blueprint.ground;
    if g.min_distance_mm >= g.max_distance_mm {
        return Err(ContractError::config_validation(
            "ground.min_distance_mm / ground.max_distance_mm",
            format!(
                "min_distance_mm ({}) must be < max_distance_mm ({})",
                g.min_distance_mm, g.max_distance_mm
            ),
        ));
    }
    Ok(())
}

/// 校验检测波束区间
fn validate_detector_bands(blueprint: &SurveyBlueprint) -> Result<(), ContractError> {
    for (idx, band) in blueprint.detector.bands.iter().enumerate() {
        if band.from_deg > band.to_deg {
            return Err(ContractError::config_validation(
                format!("detector.bands[{idx}]"),
                format!(
                    "from_deg ({}) must be <= to_deg ({}); split bands that cross 0",
                    band.from_deg, band.to_deg
                ),
            ));
        }

        // 检测波束必须是分析波束的子集
        let a = &blueprint.analyzer;
        let from = contracts::signed_angle(band.from_deg);
        let to = contracts::signed_angle(band.to_deg);
        let inside = |angle: f64| angle >= a.min_angle_deg && angle <= a.max_angle_deg;
        if from > to || !inside(from) || !inside(to) {
            return Err(ContractError::config_validation(
                format!("detector.bands[{idx}]"),
                format!(
                    "band {}..{} must lie within the analyzer band {}..{}",
                    band.from_deg, band.to_deg, a.min_angle_deg, a.max_angle_deg
                ),
            ));
        }
    }
    Ok(())
}

/// 校验电池告警阈值
fn validate_battery(blueprint: &SurveyBlueprint) -> Result<(), ContractError> {
    let b = &blueprint.battery;
    if b.low_pct >= b.recover_pct {
        return Err(ContractError::config_validation(
            "battery.low_pct / battery.recover_pct",
            format!(
                "low_pct ({}) must be < recover_pct ({})",
                b.low_pct, b.recover_pct
            ),
        ));
    }
    Ok(())
}

/// 校验 sink 配置
fn validate_sinks(blueprint: &SurveyBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, sink) in blueprint.sinks.iter().enumerate() {
        if sink.name.is_empty() {
            return Err(ContractError::config_validation(
                format!("sinks[{}].name", idx),
                "sink name cannot be empty",
            ));
        }
        if !seen.insert(sink.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("sinks[name={}]", sink.name),
                "duplicate sink name",
            ));
        }
    }
    Ok(())
}
