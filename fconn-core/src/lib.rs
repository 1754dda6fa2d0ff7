pub mod geometry {
    use glam::DVec2;
    use serde::{Deserialize, Serialize};

    /// 二维点，内部以 `glam::DVec2` 表示，与宿主模型的双精度坐标兼容。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point2(pub DVec2);

    impl Point2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_vec(vec: DVec2) -> Self {
            Self(vec)
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn translate(self, offset: Vector2) -> Self {
            Self(self.0 + offset.0)
        }

        #[inline]
        pub fn vector_to(self, other: Point2) -> Vector2 {
            Vector2(other.0 - self.0)
        }

        /// 绕 `about` 逆时针旋转 `radians`，仅建模单轴平面内旋转。
        pub fn rotate_about(self, about: Point2, radians: f64) -> Self {
            let (sin, cos) = radians.sin_cos();
            let rel = self.0 - about.0;
            let rotated = DVec2::new(rel.x * cos - rel.y * sin, rel.x * sin + rel.y * cos);
            Self(about.0 + rotated)
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }
    }

    impl From<DVec2> for Point2 {
        fn from(value: DVec2) -> Self {
            Self::from_vec(value)
        }
    }

    /// 二维向量，提供平移所需的基础运算。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Vector2(pub DVec2);

    impl Vector2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_points(start: Point2, end: Point2) -> Self {
            Self(end.0 - start.0)
        }

        #[inline]
        pub fn length_squared(self) -> f64 {
            self.0.length_squared()
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }
    }

    impl From<DVec2> for Vector2 {
        fn from(value: DVec2) -> Self {
            Self(value)
        }
    }
}

pub mod model {
    use std::collections::BTreeSet;

    use serde::{Deserialize, Serialize};

    use crate::geometry::{Point2, Vector2};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct EntityId(u64);

    impl EntityId {
        #[inline]
        pub fn new(raw: u64) -> Self {
            Self(raw)
        }

        /// 提供原始数值，便于序列化或日志输出。
        #[inline]
        pub fn get(self) -> u64 {
            self.0
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct TemplateId(u64);

    impl TemplateId {
        #[inline]
        pub fn new(raw: u64) -> Self {
            Self(raw)
        }

        #[inline]
        pub fn get(self) -> u64 {
            self.0
        }
    }

    /// 属性的存储类别。同名属性只有在类别一致时才允许互相拷贝。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum StorageKind {
        Text,
        Integer,
        Real,
        Reference,
    }

    /// 属性值。`Reference` 指向模型中的其他实体。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum AttributeValue {
        Text(String),
        Integer(i64),
        Real(f64),
        Reference(EntityId),
    }

    impl AttributeValue {
        #[inline]
        pub fn kind(&self) -> StorageKind {
            match self {
                AttributeValue::Text(_) => StorageKind::Text,
                AttributeValue::Integer(_) => StorageKind::Integer,
                AttributeValue::Real(_) => StorageKind::Real,
                AttributeValue::Reference(_) => StorageKind::Reference,
            }
        }
    }

    /// 命名属性。名称在「实体 + 模板」范围内唯一且区分大小写；
    /// `kind` 在属性尚未赋值时依然固定不变。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Attribute {
        pub name: String,
        pub kind: StorageKind,
        pub value: Option<AttributeValue>,
        pub is_read_only: bool,
    }

    impl Attribute {
        pub fn new(name: impl Into<String>, value: AttributeValue) -> Self {
            Self {
                name: name.into(),
                kind: value.kind(),
                value: Some(value),
                is_read_only: false,
            }
        }

        pub fn unset(name: impl Into<String>, kind: StorageKind) -> Self {
            Self {
                name: name.into(),
                kind,
                value: None,
                is_read_only: false,
            }
        }

        pub fn read_only(name: impl Into<String>, value: AttributeValue) -> Self {
            Self {
                is_read_only: true,
                ..Self::new(name, value)
            }
        }

        #[inline]
        pub fn has_value(&self) -> bool {
            self.value.is_some()
        }
    }

    /// `Model::write_attribute` 的结果。核心层不依赖错误库，
    /// 由上层决定哪些结果需要升级为错误。
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum WriteOutcome {
        Written,
        /// 新值与旧值相等，视为无操作。
        Unchanged,
        KindMismatch {
            expected: StorageKind,
            found: StorageKind,
        },
        NotFound,
    }

    /// 实体的平面放置：位置加上绕竖直轴的旋转角（弧度）。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Placement {
        pub position: Point2,
        pub rotation: f64,
    }

    impl Placement {
        #[inline]
        pub fn new(position: Point2, rotation: f64) -> Self {
            Self { position, rotation }
        }
    }

    /// 模板（族 + 类型）。实体从模板实例化而来；
    /// `attributes` 为类型级属性，同名的实例级属性会将其遮蔽。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Template {
        pub family: String,
        pub name: String,
        pub attributes: Vec<Attribute>,
        /// 实例化时拷贝到新实体上的实例级属性。
        pub instance_defaults: Vec<Attribute>,
        /// 实例化时作为子实体一并创建的嵌套模板（仅一层）。
        pub nested: Vec<TemplateId>,
    }

    impl Template {
        pub fn new(family: impl Into<String>, name: impl Into<String>) -> Self {
            Self {
                family: family.into(),
                name: name.into(),
                attributes: Vec::new(),
                instance_defaults: Vec::new(),
                nested: Vec::new(),
            }
        }

        /// 用于界面与设置持久化的显示名，形如 `"族名: 类型名"`。
        pub fn display_name(&self) -> String {
            format!("{}: {}", self.family, self.name)
        }
    }

    /// 放置到模型中的实体。子实体嵌套深度恰好为一层：
    /// 子实体自身不再持有子实体。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Entity {
        pub template: TemplateId,
        pub placement: Option<Placement>,
        pub attributes: Vec<Attribute>,
        pub sub_entities: Vec<EntityId>,
    }

    /// 宿主文档的内存替身：以稳定 ID 为键的实体与模板仓库。
    /// 实体身份只能经由 `create_entity` 产生，核心层从不悬挂引用。
    #[derive(Debug, Default, Clone, Serialize, Deserialize)]
    pub struct Model {
        templates: Vec<(TemplateId, Template)>,
        entities: Vec<(EntityId, Entity)>,
        next_template_id: u64,
        next_entity_id: u64,
    }

    impl Model {
        pub fn new() -> Self {
            Self::default()
        }

        fn next_template_id(&mut self) -> TemplateId {
            let id = TemplateId::new(self.next_template_id);
            self.next_template_id += 1;
            id
        }

        fn next_entity_id(&mut self) -> EntityId {
            let id = EntityId::new(self.next_entity_id);
            self.next_entity_id += 1;
            id
        }

        pub fn add_template(&mut self, template: Template) -> TemplateId {
            let id = self.next_template_id();
            self.templates.push((id, template));
            id
        }

        pub fn template(&self, id: TemplateId) -> Option<&Template> {
            self.templates
                .iter()
                .find(|(candidate, _)| *candidate == id)
                .map(|(_, template)| template)
        }

        fn template_mut(&mut self, id: TemplateId) -> Option<&mut Template> {
            self.templates
                .iter_mut()
                .find(|(candidate, _)| *candidate == id)
                .map(|(_, template)| template)
        }

        #[inline]
        pub fn templates(&self) -> impl Iterator<Item = &(TemplateId, Template)> {
            self.templates.iter()
        }

        /// 列出族名包含 `pattern` 的全部模板，保持注册顺序。
        pub fn templates_with_family_containing(&self, pattern: &str) -> Vec<TemplateId> {
            self.templates
                .iter()
                .filter(|(_, template)| template.family.contains(pattern))
                .map(|(id, _)| *id)
                .collect()
        }

        /// 按模板实例化新实体：拷贝实例级默认属性，并为模板声明的
        /// 每个嵌套模板创建一个子实体（子实体不再继续嵌套）。
        /// 模板不存在时返回 `None`。
        pub fn create_entity(&mut self, template: TemplateId, position: Point2) -> Option<EntityId> {
            let (defaults, nested) = {
                let template = self.template(template)?;
                (template.instance_defaults.clone(), template.nested.clone())
            };

            let mut sub_entities = Vec::with_capacity(nested.len());
            for nested_template in nested {
                let Some(nested_defaults) = self
                    .template(nested_template)
                    .map(|template| template.instance_defaults.clone())
                else {
                    continue;
                };
                let sub_id = self.next_entity_id();
                self.entities.push((
                    sub_id,
                    Entity {
                        template: nested_template,
                        placement: Some(Placement::new(position, 0.0)),
                        attributes: nested_defaults,
                        sub_entities: Vec::new(),
                    },
                ));
                sub_entities.push(sub_id);
            }

            let id = self.next_entity_id();
            self.entities.push((
                id,
                Entity {
                    template,
                    placement: Some(Placement::new(position, 0.0)),
                    attributes: defaults,
                    sub_entities,
                },
            ));
            Some(id)
        }

        pub fn entity(&self, id: EntityId) -> Option<&Entity> {
            self.entities
                .iter()
                .find(|(candidate, _)| *candidate == id)
                .map(|(_, entity)| entity)
        }

        pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
            self.entities
                .iter_mut()
                .find(|(candidate, _)| *candidate == id)
                .map(|(_, entity)| entity)
        }

        #[inline]
        pub fn entities(&self) -> impl Iterator<Item = &(EntityId, Entity)> {
            self.entities.iter()
        }

        /// 实体的子实体 ID 列表；实体不存在时返回空。
        pub fn sub_entities_of(&self, id: EntityId) -> &[EntityId] {
            self.entity(id)
                .map(|entity| entity.sub_entities.as_slice())
                .unwrap_or(&[])
        }

        #[inline]
        pub fn placement(&self, id: EntityId) -> Option<Placement> {
            self.entity(id).and_then(|entity| entity.placement)
        }

        /// 实体所属模板的族名。
        pub fn entity_family(&self, id: EntityId) -> Option<&str> {
            let entity = self.entity(id)?;
            self.template(entity.template)
                .map(|template| template.family.as_str())
        }

        /// 平移实体。仅移动实体自身，子实体的位置不参与任何业务计算。
        pub fn translate(&mut self, id: EntityId, delta: Vector2) -> bool {
            match self.entity_mut(id).and_then(|entity| entity.placement.as_mut()) {
                Some(placement) => {
                    placement.position = placement.position.translate(delta);
                    true
                }
                None => false,
            }
        }

        /// 绕 `about` 旋转实体：位置沿圆弧移动，旋转角累加。
        pub fn rotate(&mut self, id: EntityId, about: Point2, radians: f64) -> bool {
            match self.entity_mut(id).and_then(|entity| entity.placement.as_mut()) {
                Some(placement) => {
                    placement.position = placement.position.rotate_about(about, radians);
                    placement.rotation += radians;
                    true
                }
                None => false,
            }
        }

        /// 按名称解析属性：先查实例级，再回退到模板的类型级。
        pub fn attribute(&self, id: EntityId, name: &str) -> Option<&Attribute> {
            let entity = self.entity(id)?;
            if let Some(attribute) = entity.attributes.iter().find(|attr| attr.name == name) {
                return Some(attribute);
            }
            self.template(entity.template)?
                .attributes
                .iter()
                .find(|attr| attr.name == name)
        }

        /// 实例级与类型级所有「已赋值且可写」属性名的并集，自然有序。
        pub fn attribute_names(&self, id: EntityId) -> BTreeSet<String> {
            let mut names = BTreeSet::new();
            let Some(entity) = self.entity(id) else {
                return names;
            };
            for attribute in &entity.attributes {
                if attribute.has_value() && !attribute.is_read_only {
                    names.insert(attribute.name.clone());
                }
            }
            if let Some(template) = self.template(entity.template) {
                for attribute in &template.attributes {
                    if attribute.has_value() && !attribute.is_read_only {
                        names.insert(attribute.name.clone());
                    }
                }
            }
            names
        }

        /// 向解析到的属性写入新值。实例级属性优先，未命中时写类型级
        /// （与宿主一致：类型级写入影响同模板的全部实例）。
        /// 类别不匹配永远报告为 `KindMismatch`，不会被当作跳过。
        pub fn write_attribute(
            &mut self,
            id: EntityId,
            name: &str,
            value: AttributeValue,
        ) -> WriteOutcome {
            let template_id = match self.entity(id) {
                Some(entity) => entity.template,
                None => return WriteOutcome::NotFound,
            };
            if let Some(entity) = self.entity_mut(id) {
                if let Some(attribute) = entity.attributes.iter_mut().find(|attr| attr.name == name)
                {
                    return Self::apply_value(attribute, value);
                }
            }
            if let Some(template) = self.template_mut(template_id) {
                if let Some(attribute) =
                    template.attributes.iter_mut().find(|attr| attr.name == name)
                {
                    return Self::apply_value(attribute, value);
                }
            }
            WriteOutcome::NotFound
        }

        fn apply_value(attribute: &mut Attribute, value: AttributeValue) -> WriteOutcome {
            let found = value.kind();
            if attribute.kind != found {
                return WriteOutcome::KindMismatch {
                    expected: attribute.kind,
                    found,
                };
            }
            if attribute.value.as_ref() == Some(&value) {
                return WriteOutcome::Unchanged;
            }
            attribute.value = Some(value);
            WriteOutcome::Written
        }

        /// 属性值的显示形式，用作分组键与界面文本。
        /// 引用类型渲染为被引用实体的模板显示名。
        pub fn display_value(&self, value: &AttributeValue) -> String {
            match value {
                AttributeValue::Text(text) => text.clone(),
                AttributeValue::Integer(number) => number.to_string(),
                AttributeValue::Real(number) => format!("{number}"),
                AttributeValue::Reference(id) => self
                    .entity(*id)
                    .and_then(|entity| self.template(entity.template))
                    .map(|template| template.display_name())
                    .unwrap_or_else(|| format!("#{}", id.get())),
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn model_with_frame() -> (Model, TemplateId, EntityId) {
            let mut model = Model::new();
            let mut template = Template::new("KRGP_Каркас колонны", "400x400");
            template
                .attributes
                .push(Attribute::new("Марка", AttributeValue::Text("A10".into())));
            template
                .attributes
                .push(Attribute::new("Высота", AttributeValue::Real(3.0)));
            template
                .instance_defaults
                .push(Attribute::unset("Метка", StorageKind::Text));
            let template_id = model.add_template(template);
            let entity = model
                .create_entity(template_id, Point2::new(1.0, 2.0))
                .expect("template exists");
            (model, template_id, entity)
        }

        #[test]
        fn instance_attribute_shadows_template_attribute() {
            let (mut model, _, entity) = model_with_frame();
            model
                .entity_mut(entity)
                .unwrap()
                .attributes
                .push(Attribute::new("Марка", AttributeValue::Text("B20".into())));

            let resolved = model.attribute(entity, "Марка").unwrap();
            assert_eq!(resolved.value, Some(AttributeValue::Text("B20".into())));
        }

        #[test]
        fn attribute_falls_back_to_template_level() {
            let (model, _, entity) = model_with_frame();
            let resolved = model.attribute(entity, "Высота").unwrap();
            assert_eq!(resolved.kind, StorageKind::Real);
            assert!(model.attribute(entity, "高さ").is_none());
        }

        #[test]
        fn write_attribute_reports_kind_mismatch() {
            let (mut model, _, entity) = model_with_frame();
            let outcome = model.write_attribute(entity, "Высота", AttributeValue::Text("x".into()));
            assert_eq!(
                outcome,
                WriteOutcome::KindMismatch {
                    expected: StorageKind::Real,
                    found: StorageKind::Text,
                }
            );
            // 原值保持不变
            assert_eq!(
                model.attribute(entity, "Высота").unwrap().value,
                Some(AttributeValue::Real(3.0))
            );
        }

        #[test]
        fn write_attribute_noops_on_equal_value() {
            let (mut model, _, entity) = model_with_frame();
            assert_eq!(
                model.write_attribute(entity, "Высота", AttributeValue::Real(3.0)),
                WriteOutcome::Unchanged
            );
            assert_eq!(
                model.write_attribute(entity, "Высота", AttributeValue::Real(4.5)),
                WriteOutcome::Written
            );
        }

        #[test]
        fn attribute_names_union_is_sorted_and_filtered() {
            let (mut model, _, entity) = model_with_frame();
            model
                .entity_mut(entity)
                .unwrap()
                .attributes
                .push(Attribute::read_only("Системная", AttributeValue::Integer(1)));
            model
                .entity_mut(entity)
                .unwrap()
                .attributes
                .push(Attribute::new("Метка2", AttributeValue::Text("m".into())));

            let names: Vec<String> = model.attribute_names(entity).into_iter().collect();
            // 只读属性与未赋值的实例默认属性都不应出现
            assert_eq!(names, vec!["Высота", "Марка", "Метка2"]);
        }

        #[test]
        fn create_entity_instantiates_nested_sub_entities() {
            let mut model = Model::new();
            let mut bar = Template::new("ВБ_Средние стержни", "d12");
            bar.instance_defaults.push(Attribute::new(
                "Диаметр",
                AttributeValue::Real(12.0),
            ));
            let bar_id = model.add_template(bar);

            let mut frame = Template::new("KRGP_Каркас колонны", "400x400");
            frame.nested.push(bar_id);
            let frame_id = model.add_template(frame);

            let entity = model
                .create_entity(frame_id, Point2::new(0.0, 0.0))
                .unwrap();
            let subs = model.sub_entities_of(entity);
            assert_eq!(subs.len(), 1);
            assert!(model.sub_entities_of(subs[0]).is_empty());
            assert_eq!(
                model.attribute(subs[0], "Диаметр").unwrap().value,
                Some(AttributeValue::Real(12.0))
            );
        }

        #[test]
        fn rotate_moves_position_and_accumulates_angle() {
            let (mut model, _, entity) = model_with_frame();
            let about = Point2::new(0.0, 0.0);
            assert!(model.rotate(entity, about, std::f64::consts::FRAC_PI_2));

            let placement = model.placement(entity).unwrap();
            assert!((placement.position.x() - (-2.0)).abs() < 1e-9);
            assert!((placement.position.y() - 1.0).abs() < 1e-9);
            assert!((placement.rotation - std::f64::consts::FRAC_PI_2).abs() < 1e-9);
        }

        #[test]
        fn display_value_renders_references_via_template_name() {
            let (mut model, template_id, entity) = model_with_frame();
            let other = model
                .create_entity(template_id, Point2::new(0.0, 0.0))
                .unwrap();
            assert_eq!(
                model.display_value(&AttributeValue::Reference(other)),
                "KRGP_Каркас колонны: 400x400"
            );
            assert_eq!(
                model.display_value(&AttributeValue::Reference(EntityId::new(999))),
                "#999"
            );
            assert_eq!(model.display_value(&AttributeValue::Integer(7)), "7");
            let _ = entity;
        }
    }
}
