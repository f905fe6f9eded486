//! 环境上下文采集
//!
//! 天气读数由调用方注入的提供者产生；缺项在转换为
//! `AmbientContext` 时落到固定默认值。

use chrono::{Datelike, Utc};
use hps_core::{AmbientReading, Season};
use rand::Rng;

/// 天气数据提供者
pub trait WeatherProvider: Send + Sync {
    fn sample(&self) -> AmbientReading;
}

/// 模拟天气提供者：温度10.0~40.0（1位小数）、湿度30~90、AQI 1~5
pub struct SimulatedWeather;

impl WeatherProvider for SimulatedWeather {
    fn sample(&self) -> AmbientReading {
        let mut rng = rand::thread_rng();
        AmbientReading {
            temperature: Some((rng.gen_range(10.0..40.0f64) * 10.0).round() / 10.0),
            humidity: Some(rng.gen_range(30..=90) as f64),
            air_quality_index: Some(rng.gen_range(1..=5) as f64),
        }
    }
}

/// 按当前月份判定季节
pub fn current_season() -> Season {
    Season::from_month(Utc::now().month())
}
