use fconn_config::SchemaConfig;
use fconn_core::geometry::Point2;
use fconn_core::model::{
    Attribute, AttributeValue, EntityId, Model, StorageKind, Template, TemplateId,
};

/// 内置示例模型：替代宿主文档与交互选取，
/// 按部署约定构造骨架、连接件与嵌套钢筋模板。
pub struct DemoModel {
    pub model: Model,
    /// 「框选」得到的骨架实体，保持选取顺序。
    pub frames: Vec<EntityId>,
    /// 手动模式用的既有连接件，放在远离骨架的位置。
    pub spare_connectors: Vec<EntityId>,
    /// 首次运行（尚无设置文件）时脚本化「用户选择」的连接件类型。
    pub preferred_connector: TemplateId,
}

pub fn sample_model(schema: &SchemaConfig) -> DemoModel {
    let mut model = Model::new();

    // 源侧嵌套钢筋：族名包含嵌套标记
    let mut middle_bars = Template::new(format!("{}Средние стержни", schema.nested_family_marker), "d12");
    middle_bars.instance_defaults.push(Attribute::new(
        schema.nested_source_attribute.clone(),
        AttributeValue::Real(12.0),
    ));
    let middle_bars = model.add_template(middle_bars);

    // 目标侧嵌套钢筋：族名须与配置完全相等
    let mut edge_bars = Template::new(schema.nested_target_family.clone(), "стандарт");
    edge_bars.instance_defaults.push(Attribute::unset(
        schema.nested_source_attribute.clone(),
        StorageKind::Real,
    ));
    let edge_bars = model.add_template(edge_bars);

    let mut frame_400 = Template::new(schema.frame_family.clone(), "400x400");
    frame_400
        .attributes
        .push(Attribute::new("Колонна_Длина", AttributeValue::Real(0.4)));
    frame_400
        .attributes
        .push(Attribute::new("Колонна_Ширина", AttributeValue::Real(0.4)));
    frame_400.instance_defaults.extend([
        Attribute::unset("Марка", StorageKind::Text),
        Attribute::unset("ADSK_Марка изделия", StorageKind::Text),
        Attribute::new("ВБ_Диаметр арматуры", AttributeValue::Real(16.0)),
        Attribute::new("Колонна_Высота", AttributeValue::Real(3.0)),
    ]);
    frame_400.nested.push(middle_bars);
    let frame_400 = model.add_template(frame_400);

    let mut connector = Template::new(
        format!("{}_Соединитель", schema.connector_family_pattern),
        "тип 1",
    );
    connector.instance_defaults.extend([
        Attribute::unset("Колонна_Длина", StorageKind::Real),
        Attribute::unset("Колонна_Ширина", StorageKind::Real),
        Attribute::unset("Колонна_Высота", StorageKind::Real),
        Attribute::unset("ВБ_Диаметр арматуры", StorageKind::Real),
        Attribute::unset("Марка", StorageKind::Text),
        Attribute::unset("ADSK_Марка изделия", StorageKind::Text),
    ]);
    connector.nested.push(edge_bars);
    let connector = model.add_template(connector);

    // 第二种连接件类型，供目录与界面展示
    let mut connector_heavy = Template::new(
        format!("{}_Соединитель", schema.connector_family_pattern),
        "усиленный",
    );
    connector_heavy.instance_defaults.extend([
        Attribute::unset("Колонна_Длина", StorageKind::Real),
        Attribute::unset("Марка", StorageKind::Text),
    ]);
    connector_heavy.nested.push(edge_bars);
    model.add_template(connector_heavy);

    // 五个骨架：三个 A10、两个 B20，部分带旋转
    let marks = [
        ("A10", Point2::new(0.0, 0.0), 0.0),
        ("A10", Point2::new(6.0, 0.0), 0.3),
        ("A10", Point2::new(12.0, 0.0), 0.0),
        ("B20", Point2::new(0.0, 8.0), 1.2),
        ("B20", Point2::new(6.0, 8.0), 0.0),
    ];
    let mut frames = Vec::new();
    for (mark, position, rotation) in marks {
        let id = model
            .create_entity(frame_400, position)
            .expect("frame template registered above");
        if rotation != 0.0 {
            model.rotate(id, position, rotation);
        }
        model.write_attribute(id, "Марка", AttributeValue::Text(mark.into()));
        model.write_attribute(
            id,
            "ADSK_Марка изделия",
            AttributeValue::Text(format!("КЛ-{mark}")),
        );
        frames.push(id);
    }

    let mut spare_connectors = Vec::new();
    for index in 0..2 {
        let id = model
            .create_entity(connector, Point2::new(100.0 + index as f64 * 5.0, 100.0))
            .expect("connector template registered above");
        spare_connectors.push(id);
    }

    DemoModel {
        model,
        frames,
        spare_connectors,
        preferred_connector: connector,
    }
}
