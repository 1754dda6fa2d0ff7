pub mod catalog;
pub mod grouping;
pub mod pipeline;
pub mod placer;
pub mod propagate;

pub mod errors {
    use fconn_core::model::StorageKind;
    use thiserror::Error;

    #[derive(Debug, Error)]
    pub enum EngineError {
        #[error("entity with id {0} not found")]
        EntityNotFound(u64),
        #[error("template with id {0} not found")]
        TemplateNotFound(u64),
        #[error("entity with id {0} has no resolvable placement")]
        MissingPlacement(u64),
        #[error("attribute {name} storage kinds differ: source {source_kind:?}, target {target_kind:?}")]
        TypeMismatch {
            name: String,
            source_kind: StorageKind,
            target_kind: StorageKind,
        },
        #[error("attribute transfer failed: {0}")]
        Propagation(String),
    }
}
