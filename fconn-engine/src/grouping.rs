use std::collections::BTreeSet;

use fconn_core::model::{EntityId, Model};
use tracing::debug;

/// 分组属性缺失或未赋值时使用的哨兵键。
/// 与任何真实属性显示值都区分开来，界面按原样展示。
pub const NO_VALUE_KEY: &str = "未赋值";

/// 按分组属性的解析值划分出的一组实体。
/// 键在一次分组中唯一，成员保持输入顺序。
#[derive(Debug, Clone)]
pub struct FrameGroup {
    pub key: String,
    pub members: Vec<EntityId>,
}

/// 给定实体集合中出现过的全部可分组属性名的并集。
/// 结果自然有序，供界面直接填充下拉列表。
pub fn attribute_names_present(model: &Model, entities: &[EntityId]) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    for id in entities {
        names.extend(model.attribute_names(*id));
    }
    names
}

/// 按 `attribute_name` 的解析值对实体分组。
/// 每个实体恰好落入一个组；无值实体统一归入 [`NO_VALUE_KEY`]。
/// 组按键首次出现的顺序排列，显示排序由调用方负责。
pub fn group_by(model: &Model, entities: &[EntityId], attribute_name: &str) -> Vec<FrameGroup> {
    let mut groups: Vec<FrameGroup> = Vec::new();

    for id in entities {
        let key = match model
            .attribute(*id, attribute_name)
            .and_then(|attribute| attribute.value.as_ref())
        {
            Some(value) => model.display_value(value),
            None => NO_VALUE_KEY.to_string(),
        };

        match groups.iter_mut().find(|group| group.key == key) {
            Some(group) => group.members.push(*id),
            None => groups.push(FrameGroup {
                key,
                members: vec![*id],
            }),
        }
    }

    debug!(
        attribute = attribute_name,
        entities = entities.len(),
        groups = groups.len(),
        "实体分组完成"
    );
    groups
}
