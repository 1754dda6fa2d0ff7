use fconn_core::geometry::Vector2;
use fconn_core::model::{EntityId, Model, TemplateId};
use tracing::debug;

use crate::errors::EngineError;

/// 低于该角度（弧度）的旋转视为零，不再施加。
pub const ROTATION_TOLERANCE: f64 = 1e-6;

/// 按 `like` 的放置实例化 `template` 的新实体：
/// 先落在 `like` 的位置，再绕该点施加 `like` 的旋转角。
/// `like` 自身永远不会被改动。
pub fn create_aligned(
    model: &mut Model,
    template: TemplateId,
    like: EntityId,
) -> Result<EntityId, EngineError> {
    let placement = model
        .placement(like)
        .ok_or(EngineError::MissingPlacement(like.get()))?;

    let created = model
        .create_entity(template, placement.position)
        .ok_or(EngineError::TemplateNotFound(template.get()))?;

    if placement.rotation.abs() > ROTATION_TOLERANCE {
        model.rotate(created, placement.position, placement.rotation);
    }

    debug!(
        created = created.get(),
        like = like.get(),
        x = placement.position.x(),
        y = placement.position.y(),
        rotation = placement.rotation,
        "已按参照实体放置新实体"
    );
    Ok(created)
}

/// 把 `mover` 对齐到 `target` 的放置：先平移位置差，
/// 再绕 `target` 的位置旋转角度差。容差内的旋转差不施加，
/// 因此连续调用两次是幂等的。
pub fn align(model: &mut Model, mover: EntityId, target: EntityId) -> Result<(), EngineError> {
    let mover_placement = model
        .placement(mover)
        .ok_or(EngineError::MissingPlacement(mover.get()))?;
    let target_placement = model
        .placement(target)
        .ok_or(EngineError::MissingPlacement(target.get()))?;

    let translation = Vector2::from_points(mover_placement.position, target_placement.position);
    model.translate(mover, translation);

    let rotation_difference = target_placement.rotation - mover_placement.rotation;
    if rotation_difference.abs() > ROTATION_TOLERANCE {
        model.rotate(mover, target_placement.position, rotation_difference);
    }

    Ok(())
}
