use std::collections::HashMap;

use fconn_core::model::{EntityId, Model, TemplateId};
use tracing::{debug, info, warn};

use crate::errors::EngineError;
use crate::grouping::FrameGroup;
use crate::placer;
use crate::propagate::{AttributePropagator, TransferReport};

/// 某个分组的连接件指派。映射中缺失的键表示「尚未决定」，
/// 与显式的 [`Assignment::Skip`] 同样不会触发放置。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    Template(TemplateId),
    Skip,
}

/// 单个成员失败的记录。批处理不会因此中断。
#[derive(Debug, Clone)]
pub struct PlacementFailure {
    pub entity: EntityId,
    pub reason: String,
}

/// 一次批量放置的统计结果。
#[derive(Debug, Clone, Default)]
pub struct PlacementReport {
    /// 分组总数（含未指派的组）。
    pub groups: usize,
    /// 所有分组成员的总数。
    pub considered: usize,
    /// 成功创建的连接件数量。
    pub created: usize,
    pub failures: Vec<PlacementFailure>,
}

/// 批量放置管线：对每个已指派的分组，为每个成员创建对齐的
/// 连接件并传递属性。管线自身不开启事务边界，
/// 调用方负责把一次 `run` 包在宿主事务内。
#[derive(Debug)]
pub struct PlacementPipeline {
    propagator: AttributePropagator,
}

impl PlacementPipeline {
    pub fn new(propagator: AttributePropagator) -> Self {
        Self { propagator }
    }

    /// 执行批量放置。成员按分组内的输入顺序处理；
    /// 创建或属性传递失败只记入 `failures`，从不中断批次。
    /// 连接件一经创建即计入 `created`，即便其后的传递失败。
    pub fn run(
        &self,
        model: &mut Model,
        groups: &[FrameGroup],
        assignments: &HashMap<String, Assignment>,
    ) -> PlacementReport {
        let mut report = PlacementReport {
            groups: groups.len(),
            ..PlacementReport::default()
        };

        for group in groups {
            report.considered += group.members.len();

            let template = match assignments.get(&group.key) {
                Some(Assignment::Template(template)) => *template,
                Some(Assignment::Skip) | None => {
                    debug!(group = %group.key, members = group.members.len(), "分组未指派连接件，跳过");
                    continue;
                }
            };

            for member in &group.members {
                let connector = match placer::create_aligned(model, template, *member) {
                    Ok(connector) => connector,
                    Err(err) => {
                        warn!(entity = member.get(), error = %err, "创建连接件失败，继续处理下一个成员");
                        report.failures.push(PlacementFailure {
                            entity: *member,
                            reason: err.to_string(),
                        });
                        continue;
                    }
                };
                report.created += 1;

                if let Err(err) = self.propagator.transfer(model, *member, connector) {
                    warn!(entity = member.get(), error = %err, "属性传递失败，继续处理下一个成员");
                    report.failures.push(PlacementFailure {
                        entity: *member,
                        reason: err.to_string(),
                    });
                }
            }
        }

        info!(
            groups = report.groups,
            considered = report.considered,
            created = report.created,
            failures = report.failures.len(),
            "批量放置完成"
        );
        report
    }

    /// 手动配对模式：把既有连接件对齐到指定骨架并传递属性。
    /// 不创建新实体；每次调用独立，交互循环由外部协作者驱动。
    pub fn pair(
        &self,
        model: &mut Model,
        frame: EntityId,
        connector: EntityId,
    ) -> Result<TransferReport, EngineError> {
        placer::align(model, connector, frame)?;
        self.propagator.transfer(model, frame, connector)
    }
}

#[cfg(test)]
mod tests {
    use fconn_core::geometry::Point2;
    use fconn_core::model::{Attribute, AttributeValue, StorageKind, Template};

    use crate::grouping;
    use crate::propagate::TransferSchema;

    use super::*;

    fn schema() -> TransferSchema {
        TransferSchema {
            transfer_list: vec!["Марка".into()],
            nested_family_marker: "ВБ_".into(),
            nested_source_attribute: "Средние_Диаметр арматуры".into(),
            nested_target_family: "KRGP_СБ_Крайние стержни".into(),
        }
    }

    fn fixture() -> (Model, TemplateId, Vec<EntityId>) {
        let mut model = Model::new();
        let mut frame = Template::new("KRGP_Каркас колонны", "400x400");
        frame
            .instance_defaults
            .push(Attribute::unset("Марка", StorageKind::Text));
        let frame = model.add_template(frame);

        let mut connector = Template::new("KRGP_СБ_Соединитель", "тип 1");
        connector
            .instance_defaults
            .push(Attribute::unset("Марка", StorageKind::Text));
        let connector = model.add_template(connector);

        let marks = ["A10", "A10", "A10", "B20", "B20"];
        let mut frames = Vec::new();
        for (index, mark) in marks.iter().enumerate() {
            let id = model
                .create_entity(frame, Point2::new(index as f64 * 2.0, 0.0))
                .unwrap();
            model.write_attribute(id, "Марка", AttributeValue::Text((*mark).into()));
            frames.push(id);
        }
        (model, connector, frames)
    }

    #[test]
    fn run_creates_connectors_only_for_assigned_groups() {
        let (mut model, connector, frames) = fixture();
        let groups = grouping::group_by(&model, &frames, "Марка");
        assert_eq!(groups.len(), 2);

        let mut assignments = HashMap::new();
        assignments.insert("A10".to_string(), Assignment::Template(connector));
        assignments.insert("B20".to_string(), Assignment::Skip);

        let before = model.entities().count();
        let pipeline = PlacementPipeline::new(AttributePropagator::new(schema()));
        let report = pipeline.run(&mut model, &groups, &assignments);

        assert_eq!(report.groups, 2);
        assert_eq!(report.considered, 5);
        assert_eq!(report.created, 3);
        assert!(report.failures.is_empty());
        assert_eq!(model.entities().count(), before + 3);
    }

    #[test]
    fn missing_assignment_means_not_yet_decided() {
        let (mut model, connector, frames) = fixture();
        let groups = grouping::group_by(&model, &frames, "Марка");

        let assignments = HashMap::new();
        let pipeline = PlacementPipeline::new(AttributePropagator::new(schema()));
        let report = pipeline.run(&mut model, &groups, &assignments);

        assert_eq!(report.created, 0);
        assert_eq!(report.considered, 5);
        let _ = connector;
    }

    #[test]
    fn created_connectors_inherit_placement_and_attributes() {
        let (mut model, connector, frames) = fixture();
        model.rotate(frames[0], Point2::new(0.0, 0.0), 0.3);

        let groups = grouping::group_by(&model, &frames, "Марка");
        let mut assignments = HashMap::new();
        assignments.insert("A10".to_string(), Assignment::Template(connector));

        let existing: Vec<EntityId> = model.entities().map(|(id, _)| *id).collect();
        let pipeline = PlacementPipeline::new(AttributePropagator::new(schema()));
        pipeline.run(&mut model, &groups, &assignments);

        let created: Vec<EntityId> = model
            .entities()
            .map(|(id, _)| *id)
            .filter(|id| !existing.contains(id))
            .collect();
        assert_eq!(created.len(), 3);

        let frame_placement = model.placement(frames[0]).unwrap();
        let connector_placement = model.placement(created[0]).unwrap();
        assert!(
            (frame_placement.position.x() - connector_placement.position.x()).abs() < 1e-9
        );
        assert!((frame_placement.rotation - connector_placement.rotation).abs() < 1e-9);
        assert_eq!(
            model.attribute(created[0], "Марка").unwrap().value,
            Some(AttributeValue::Text("A10".into()))
        );
    }

    #[test]
    fn member_failure_does_not_abort_the_batch() {
        let (mut model, connector, frames) = fixture();
        // 让第二个成员失去放置信息
        model.entity_mut(frames[1]).unwrap().placement = None;

        let groups = grouping::group_by(&model, &frames, "Марка");
        let mut assignments = HashMap::new();
        assignments.insert("A10".to_string(), Assignment::Template(connector));
        assignments.insert("B20".to_string(), Assignment::Template(connector));

        let pipeline = PlacementPipeline::new(AttributePropagator::new(schema()));
        let report = pipeline.run(&mut model, &groups, &assignments);

        assert_eq!(report.created, 4);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].entity, frames[1]);
    }

    #[test]
    fn pair_aligns_existing_connector_without_creating() {
        let (mut model, connector, frames) = fixture();
        model.rotate(frames[2], Point2::new(4.0, 0.0), 0.7);
        let existing = model
            .create_entity(connector, Point2::new(100.0, 100.0))
            .unwrap();

        let before = model.entities().count();
        let pipeline = PlacementPipeline::new(AttributePropagator::new(schema()));
        let report = pipeline.pair(&mut model, frames[2], existing).unwrap();

        assert_eq!(model.entities().count(), before);
        assert_eq!(report.copied, 1);
        let placement = model.placement(existing).unwrap();
        assert!((placement.position.x() - 4.0).abs() < 1e-9);
        assert!((placement.rotation - 0.7).abs() < 1e-9);
    }
}
