use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use tracing::{info, info_span, warn};
use tracing_subscriber::{EnvFilter, fmt};

use fconn_config::settings::{NO_CONNECTOR_MARKER, PluginSettings, SettingsStore};
use fconn_config::{AppConfig, ConfigError, RunMode, SchemaConfig};
use fconn_core::model::EntityId;
use fconn_engine::pipeline::{Assignment, PlacementPipeline};
use fconn_engine::propagate::{AttributePropagator, TransferSchema};
use fconn_engine::{catalog, grouping};

mod demo;

const PLUGIN_NAME: &str = "FrameConnector";

fn main() {
    let mut args = std::env::args().skip(1);
    let mut override_mode: Option<RunMode> = None;
    let mut config_override: Option<PathBuf> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--batch" => override_mode = Some(RunMode::Batch),
            "--manual" => override_mode = Some(RunMode::Manual),
            "--config" => {
                let Some(path) = args.next() else {
                    eprintln!("`--config` 需要提供配置文件路径");
                    std::process::exit(1);
                };
                config_override = Some(PathBuf::from(path));
            }
            other => {
                eprintln!("未知参数：{other}");
                std::process::exit(1);
            }
        }
    }

    let config = load_configuration(config_override);
    init_logging(&config);
    info!("启动骨架连接件批处理应用");

    let mode = override_mode.unwrap_or(config.run.default_mode);
    match mode {
        RunMode::Batch => {
            info!("以批量分组模式运行");
            run_batch(&config);
        }
        RunMode::Manual => {
            info!("以手动配对模式运行");
            run_manual(&config);
        }
    }
}

fn load_configuration(override_path: Option<PathBuf>) -> AppConfig {
    match override_path {
        Some(path) => AppConfig::from_file(&path).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "加载指定配置失败，使用默认配置");
            AppConfig::default()
        }),
        None => match AppConfig::discover() {
            Ok(cfg) => cfg,
            Err(err) => {
                match &err {
                    ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
                        warn!(path = %path.display(), error = %err, "加载默认配置失败，使用内建默认值");
                    }
                    ConfigError::Context { .. } => {
                        warn!(error = %err, "加载默认配置失败，使用内建默认值");
                    }
                }
                AppConfig::default()
            }
        },
    }
}

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    // 重复初始化（例如测试环境）不视为错误
    let _ = fmt().with_env_filter(filter).try_init();
}

fn transfer_schema(schema: &SchemaConfig) -> TransferSchema {
    TransferSchema {
        transfer_list: schema.transfer_list.clone(),
        nested_family_marker: schema.nested_family_marker.clone(),
        nested_source_attribute: schema.nested_source_attribute.clone(),
        nested_target_family: schema.nested_target_family.clone(),
    }
}

/// 批量工作流：框选骨架 → 分组 → 指派连接件 → 在一个事务内
/// 批量放置 → 成功后保存设置。交互环节由脚本化替身完成。
fn run_batch(config: &AppConfig) {
    let store = SettingsStore::for_plugin(&config.run.userdata_root, PLUGIN_NAME);
    let saved = store.load();

    let demo = demo::sample_model(&config.schema);
    let mut model = demo.model;

    // 框选替身：把全部实体交给精确族名过滤
    let candidates: Vec<EntityId> = model.entities().map(|(id, _)| *id).collect();
    let frames = catalog::filter_frames(&model, &candidates, &config.schema.frame_family);
    if frames.is_empty() {
        println!("未选中任何骨架，批处理结束。");
        return;
    }
    println!("选中骨架数：{}", frames.len());

    let names = grouping::attribute_names_present(&model, &frames);
    let grouping_attribute = if names.contains(&saved.last_grouping_attribute) {
        saved.last_grouping_attribute.clone()
    } else {
        match names.iter().next() {
            Some(name) => name.clone(),
            None => {
                println!("骨架上没有可用于分组的属性。");
                return;
            }
        }
    };
    info!(attribute = %grouping_attribute, "按属性分组");

    let groups = grouping::group_by(&model, &frames, &grouping_attribute);
    println!("分组结果（按属性「{grouping_attribute}」）：");
    for group in &groups {
        println!("  - 组 \"{}\"：{} 个", group.key, group.members.len());
    }

    // 界面替身：沿用上次保存的指派；首次运行选用演示连接件类型
    let preferred_display = model
        .template(demo.preferred_connector)
        .map(|template| template.display_name())
        .unwrap_or_else(|| NO_CONNECTOR_MARKER.to_string());

    let mut assignments = HashMap::new();
    let mut display_choices: BTreeMap<String, String> = BTreeMap::new();
    for group in &groups {
        let chosen_display = saved
            .connector_assignments
            .get(&group.key)
            .cloned()
            .unwrap_or_else(|| preferred_display.clone());
        let assignment = if chosen_display == NO_CONNECTOR_MARKER {
            Assignment::Skip
        } else {
            match catalog::find_by_display_name(
                &model,
                &config.schema.connector_family_pattern,
                &chosen_display,
            ) {
                Some(template) => Assignment::Template(template),
                None => {
                    // 保存的类型已不在项目中
                    warn!(group = %group.key, display = %chosen_display, "记住的连接件类型无法解析，跳过该组");
                    Assignment::Skip
                }
            }
        };
        assignments.insert(group.key.clone(), assignment);
        display_choices.insert(group.key.clone(), chosen_display);
    }

    let pipeline = PlacementPipeline::new(AttributePropagator::new(transfer_schema(
        &config.schema,
    )));
    // 宿主事务边界的替身：一次 run 的全部创建落在同一个作用域里
    let span = info_span!("host_transaction", title = "создание соединителей каркасов");
    let report = span.in_scope(|| pipeline.run(&mut model, &groups, &assignments));

    // 设置只在放置运行完成后写回
    store.save(&PluginSettings {
        last_grouping_attribute: grouping_attribute,
        connector_assignments: display_choices,
    });

    println!(
        "已创建连接件：{} / {}（分组 {} 个）",
        report.created, report.considered, report.groups
    );
    for failure in &report.failures {
        println!("  ! 实体 #{} 处理失败：{}", failure.entity.get(), failure.reason);
    }
}

/// 手动工作流：逐对把既有连接件对齐到骨架并传递属性。
/// 每次配对独立；单对失败只报告并继续，对应交互循环里
/// 用户跳过一对的情形。
fn run_manual(config: &AppConfig) {
    let demo = demo::sample_model(&config.schema);
    let mut model = demo.model;

    let pipeline = PlacementPipeline::new(AttributePropagator::new(transfer_schema(
        &config.schema,
    )));

    println!("手动配对模式：依次处理骨架与连接件对。");
    let mut processed = 0;
    for (frame, connector) in demo.frames.iter().zip(demo.spare_connectors.iter()) {
        let span = info_span!("host_transaction", title = "ручное сопоставление");
        match span.in_scope(|| pipeline.pair(&mut model, *frame, *connector)) {
            Ok(report) => {
                processed += 1;
                println!(
                    "  - 骨架 #{} ↔ 连接件 #{}：拷贝 {} 项，跳过 {} 项",
                    frame.get(),
                    connector.get(),
                    report.copied,
                    report.skipped
                );
            }
            Err(err) => {
                warn!(frame = frame.get(), connector = connector.get(), error = %err, "配对失败，继续下一对");
            }
        }
    }
    println!("已处理骨架-连接件配对：{processed}");
}
