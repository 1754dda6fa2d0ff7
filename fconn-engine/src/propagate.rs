use fconn_core::model::{EntityId, Model, WriteOutcome};
use tracing::debug;

use crate::errors::EngineError;

/// 属性传递的静态配置。作为构造参数显式传入，
/// 而不是进程级常量，测试可以替换任意替代方案。
#[derive(Debug, Clone)]
pub struct TransferSchema {
    /// 主传递列表：按固定顺序逐个尝试拷贝的属性名。
    pub transfer_list: Vec<String>,
    /// 源侧嵌套子实体的族名须包含该标记。
    pub nested_family_marker: String,
    /// 嵌套传递的属性名，源与目标两侧同名。
    pub nested_source_attribute: String,
    /// 目标侧嵌套子实体的族名须与之完全相等。
    pub nested_target_family: String,
}

/// 单个属性拷贝的结果。跳过与真正的类别不匹配严格区分。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    Copied,
    /// 目标值已与源值相等。
    Unchanged,
    /// 任一侧解析不到该属性。
    SkippedAbsent,
    /// 源属性存在但尚未赋值。
    SkippedUnset,
}

/// 把 `name` 属性从 `source` 拷贝到 `target`。
/// 两侧都按「实例级优先、类型级回退」解析；
/// 存储类别不同时报告 `TypeMismatch`，绝不静默改写。
pub fn copy_attribute(
    model: &mut Model,
    source: EntityId,
    target: EntityId,
    name: &str,
) -> Result<CopyOutcome, EngineError> {
    let Some(source_attribute) = model.attribute(source, name) else {
        return Ok(CopyOutcome::SkippedAbsent);
    };
    let Some(value) = source_attribute.value.clone() else {
        return Ok(CopyOutcome::SkippedUnset);
    };
    if model.attribute(target, name).is_none() {
        return Ok(CopyOutcome::SkippedAbsent);
    }

    match model.write_attribute(target, name, value) {
        WriteOutcome::Written => Ok(CopyOutcome::Copied),
        WriteOutcome::Unchanged => Ok(CopyOutcome::Unchanged),
        WriteOutcome::KindMismatch { expected, found } => Err(EngineError::TypeMismatch {
            name: name.to_string(),
            source_kind: found,
            target_kind: expected,
        }),
        WriteOutcome::NotFound => Ok(CopyOutcome::SkippedAbsent),
    }
}

/// 主传递一轮的统计结果。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferReport {
    pub copied: usize,
    pub skipped: usize,
    pub nested_copied: bool,
}

/// 按固定传递列表把属性从源实体拷贝到目标实体，
/// 并额外处理一层嵌套子实体之间的单值传递。
#[derive(Debug, Clone)]
pub struct AttributePropagator {
    schema: TransferSchema,
}

impl AttributePropagator {
    pub fn new(schema: TransferSchema) -> Self {
        Self { schema }
    }

    #[inline]
    pub fn schema(&self) -> &TransferSchema {
        &self.schema
    }

    /// 执行一次完整传递。单个属性的失败只记入统计并继续；
    /// 嵌套块的任何失败都被吞掉（记日志）；
    /// 只有两个实体本身无法枚举时才整体报错。
    pub fn transfer(
        &self,
        model: &mut Model,
        source: EntityId,
        target: EntityId,
    ) -> Result<TransferReport, EngineError> {
        if model.entity(source).is_none() {
            return Err(EngineError::EntityNotFound(source.get()));
        }
        if model.entity(target).is_none() {
            return Err(EngineError::EntityNotFound(target.get()));
        }

        let mut report = TransferReport::default();
        for name in &self.schema.transfer_list {
            match copy_attribute(model, source, target, name) {
                Ok(CopyOutcome::Copied) | Ok(CopyOutcome::Unchanged) => report.copied += 1,
                Ok(CopyOutcome::SkippedAbsent) | Ok(CopyOutcome::SkippedUnset) => {
                    report.skipped += 1
                }
                Err(err) => {
                    debug!(attribute = %name, error = %err, "跳过无法拷贝的属性");
                    report.skipped += 1;
                }
            }
        }

        match self.transfer_nested(model, source, target) {
            Ok(copied) => report.nested_copied = copied,
            Err(err) => {
                // 嵌套传递不影响主流程，失败只记日志
                debug!(error = %err, "嵌套属性传递失败，已忽略");
            }
        }

        Ok(report)
    }

    /// 嵌套传递：在源实体的子实体中按枚举顺序寻找族名包含标记、
    /// 且嵌套属性已赋值的第一个子实体，把该值写入目标实体中
    /// 族名与 `nested_target_family` 完全相等的子实体。
    /// 「取第一个命中」是既定策略，多个候选值不聚合。
    fn transfer_nested(
        &self,
        model: &mut Model,
        source: EntityId,
        target: EntityId,
    ) -> Result<bool, EngineError> {
        let Some(target_nested) = model
            .sub_entities_of(target)
            .iter()
            .copied()
            .find(|sub| model.entity_family(*sub) == Some(self.schema.nested_target_family.as_str()))
        else {
            // 目标没有对应的嵌套子实体：整步视为无操作
            return Ok(false);
        };

        let candidates: Vec<EntityId> = model
            .sub_entities_of(source)
            .iter()
            .copied()
            .filter(|sub| {
                model
                    .entity_family(*sub)
                    .is_some_and(|family| family.contains(&self.schema.nested_family_marker))
            })
            .collect();

        let name = self.schema.nested_source_attribute.as_str();
        for candidate in candidates {
            let source_valued = model
                .attribute(candidate, name)
                .is_some_and(|attribute| attribute.has_value());
            let target_resolvable = model.attribute(target_nested, name).is_some();
            if !(source_valued && target_resolvable) {
                continue;
            }

            // 第一个合格的源即终止扫描，即便拷贝本身因类别不匹配被拒绝
            return match copy_attribute(model, candidate, target_nested, name) {
                Ok(CopyOutcome::Copied) | Ok(CopyOutcome::Unchanged) => Ok(true),
                Ok(_) => Ok(false),
                Err(err) => {
                    debug!(attribute = %name, error = %err, "嵌套属性类别不匹配，放弃拷贝");
                    Ok(false)
                }
            };
        }

        Ok(false)
    }
}
