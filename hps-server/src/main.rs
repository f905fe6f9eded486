//! HPS服务器主程序

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use hps_core::{
    AmbientContext, AppConfig, Gender, HpsError, PatientProfile, Result, Season, UserProfile,
};
use hps_database::{DatabasePool, DatabaseQueries, PgStore};
use hps_ml::{
    ArtifactCodec, FeatureEncoder, InferenceEngine, JsonArtifactCodec, Trainer, TrainerConfig,
    TrainingExample,
};
use hps_ml::features::BASE_FEATURES;
use hps_pipeline::{
    CachedCatalog, CatalogService, PredictionCoordinator, SimulatedWeather,
};
use hps_web::{AppState, WebServer};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// HPS服务器命令行参数
#[derive(Parser, Debug)]
#[command(name = "hps-server")]
#[command(about = "HPS (Health Prediction System) 疾病预测服务器")]
struct Args {
    /// 配置文件路径
    #[arg(short, long)]
    config: Option<String>,

    /// 日志级别
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 启动预测服务
    Serve,
    /// 从历史病历训练模型并保存工件
    Train {
        /// 工件输出路径（默认取配置中的 artifact_path）
        #[arg(short, long)]
        output: Option<String>,
    },
    /// 初始化数据库表结构
    InitDb {
        /// 目录种子文件（JSON：症状/疾病编码与名称）
        #[arg(long)]
        catalog: Option<String>,
    },
}

/// 目录种子文件格式
#[derive(Debug, Deserialize)]
struct CatalogSeed {
    symptoms: Vec<(String, String)>,
    diseases: Vec<(String, String)>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(&args.log_level)
        .init();

    let config = AppConfig::load(args.config.as_deref()).context("配置加载失败")?;

    let result = match args.command {
        Command::Serve => serve(config).await,
        Command::Train { output } => train(config, output).await,
        Command::InitDb { catalog } => init_db(config, catalog).await,
    };

    if let Err(e) = &result {
        error!("命令执行失败: {}", e);
    }
    Ok(result?)
}

/// 启动预测服务
async fn serve(config: AppConfig) -> Result<()> {
    info!("启动HPS预测服务器...");
    info!("  监听地址: {}:{}", config.server.host, config.server.port);
    info!("  模型路径: {}", config.model.artifact_path);
    info!("  判定阈值: {}", config.model.threshold);

    let pool = DatabasePool::new(&config.database).await?;

    // 模型在进程启动时加载一次，缺失即失败，绝不静默替换
    let codec = JsonArtifactCodec;
    let artifact = codec.load(Path::new(&config.model.artifact_path))?;
    let engine = InferenceEngine::new(Arc::new(artifact))?;

    let store = Arc::new(PgStore::new(pool));
    let catalog = Arc::new(CachedCatalog::new(
        store.clone() as Arc<dyn CatalogService>,
        Duration::from_secs(config.model.catalog_ttl_secs),
    ));

    let coordinator = Arc::new(PredictionCoordinator::new(
        store.clone(),
        catalog,
        store.clone(),
        engine,
        Arc::new(SimulatedWeather),
        config.model.threshold,
    ));

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| HpsError::Config(format!("invalid listen address: {}", e)))?;

    WebServer::new(addr, AppState { coordinator }).run().await
}

/// 训练模型并保存工件
async fn train(config: AppConfig, output: Option<String>) -> Result<()> {
    info!("开始多标签模型训练...");

    let pool = DatabasePool::new(&config.database).await?;
    let queries = DatabaseQueries::new(&pool);

    let rows = queries.load_training_rows().await?;
    if rows.is_empty() {
        return Err(HpsError::Validation(
            "no training data available".to_string(),
        ));
    }

    // 标签顺序与特征顺序来自目录，训练与推理共用同一约定
    let label_codes = queries.list_disease_codes().await?;
    let symptom_codes = queries.list_symptom_codes().await?;
    let mut feature_names: Vec<String> =
        BASE_FEATURES.iter().map(|s| s.to_string()).collect();
    feature_names.extend(symptom_codes);

    let today = Utc::now().date_naive();
    let examples: Vec<TrainingExample> = rows
        .into_iter()
        .map(|row| {
            let profile = PatientProfile::from_user(
                &UserProfile {
                    id: 0,
                    date_of_birth: row.date_of_birth,
                    gender: Gender::from_str_or_other(&row.gender),
                },
                today,
            );
            let ambient = AmbientContext {
                temperature: row.weather_temp,
                humidity: row.humidity,
                air_quality_index: row.air_quality_index,
                season: Season::from_str_or_default(&row.season),
            };
            let features = FeatureEncoder::encode(&profile, &ambient, &row.symptoms);
            TrainingExample {
                features,
                labels: row.diseases,
            }
        })
        .collect();

    info!(
        "训练数据就绪: {} 条样本, {} 个特征, {} 个标签",
        examples.len(),
        feature_names.len(),
        label_codes.len()
    );

    let trainer = Trainer::new(TrainerConfig::default());
    let artifact = trainer.fit(&examples, &feature_names, &label_codes)?;

    let path = output.unwrap_or(config.model.artifact_path);
    JsonArtifactCodec.save(&artifact, Path::new(&path))?;

    info!("训练完成，工件已保存: {}", path);
    Ok(())
}

/// 初始化数据库表结构并按需写入目录种子
async fn init_db(config: AppConfig, catalog: Option<String>) -> Result<()> {
    info!("初始化数据库...");

    let pool = DatabasePool::new(&config.database).await?;
    let queries = DatabaseQueries::new(&pool);
    queries.create_tables().await?;

    if let Some(path) = catalog {
        let data = std::fs::read_to_string(&path)?;
        let seed: CatalogSeed = serde_json::from_str(&data)?;
        queries.seed_catalog(&seed.symptoms, &seed.diseases).await?;
    }

    info!("数据库初始化完成");
    Ok(())
}
