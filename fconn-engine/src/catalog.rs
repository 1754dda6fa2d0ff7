use std::collections::BTreeMap;

use fconn_core::model::{EntityId, Model, TemplateId};

/// 项目中全部连接件模板，按显示名索引。
/// 族名包含 `family_pattern` 的模板才视为连接件；
/// 显示名形如 `"族名: 类型名"`，供界面与设置持久化使用。
pub fn connector_types_with_names(
    model: &Model,
    family_pattern: &str,
) -> BTreeMap<String, TemplateId> {
    let mut result = BTreeMap::new();
    for (id, template) in model.templates() {
        if template.family.contains(family_pattern) {
            result.insert(template.display_name(), *id);
        }
    }
    result
}

/// 按显示名查找连接件模板。
pub fn find_by_display_name(
    model: &Model,
    family_pattern: &str,
    display_name: &str,
) -> Option<TemplateId> {
    connector_types_with_names(model, family_pattern)
        .get(display_name)
        .copied()
}

/// 框选结果的后置过滤：只保留族名与 `frame_family` 完全相等的实体，
/// 保持输入顺序。
pub fn filter_frames(model: &Model, candidates: &[EntityId], frame_family: &str) -> Vec<EntityId> {
    candidates
        .iter()
        .copied()
        .filter(|id| model.entity_family(*id) == Some(frame_family))
        .collect()
}

/// 点选过滤谓词：实体的族名包含连接件标记即可选。
pub fn is_connector(model: &Model, entity: EntityId, family_pattern: &str) -> bool {
    model
        .entity_family(entity)
        .is_some_and(|family| family.contains(family_pattern))
}

#[cfg(test)]
mod tests {
    use fconn_core::geometry::Point2;
    use fconn_core::model::Template;

    use super::*;

    fn fixture() -> (Model, TemplateId, TemplateId) {
        let mut model = Model::new();
        let frame = model.add_template(Template::new("KRGP_Каркас колонны", "400x400"));
        let connector = model.add_template(Template::new("KRGP_СБ_Соединитель", "тип 1"));
        model.add_template(Template::new("KRGP_СБ_Соединитель", "тип 2"));
        model.add_template(Template::new("Прочее семейство", "тип 1"));
        (model, frame, connector)
    }

    #[test]
    fn catalog_lists_connector_templates_by_display_name() {
        let (model, _, connector) = fixture();
        let catalog = connector_types_with_names(&model, "KRGP_СБ");
        assert_eq!(catalog.len(), 2);
        assert_eq!(
            catalog.get("KRGP_СБ_Соединитель: тип 1").copied(),
            Some(connector)
        );
        assert_eq!(
            find_by_display_name(&model, "KRGP_СБ", "KRGP_СБ_Соединитель: тип 2"),
            connector_types_with_names(&model, "KRGP_СБ")
                .get("KRGP_СБ_Соединитель: тип 2")
                .copied()
        );
        assert!(find_by_display_name(&model, "KRGP_СБ", "нет такого").is_none());
    }

    #[test]
    fn filter_frames_keeps_exact_family_matches_in_order() {
        let (mut model, frame, connector) = fixture();
        let a = model.create_entity(frame, Point2::new(0.0, 0.0)).unwrap();
        let b = model
            .create_entity(connector, Point2::new(1.0, 0.0))
            .unwrap();
        let c = model.create_entity(frame, Point2::new(2.0, 0.0)).unwrap();

        let picked = filter_frames(&model, &[a, b, c], "KRGP_Каркас колонны");
        assert_eq!(picked, vec![a, c]);

        assert!(is_connector(&model, b, "KRGP_СБ"));
        assert!(!is_connector(&model, a, "KRGP_СБ"));
    }
}
