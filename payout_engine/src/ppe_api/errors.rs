use thiserror::Error;

use crate::{
    db_types::ApproverRole,
    ppe_api::permissions::Capability,
    traits::PayoutDbError,
};

#[derive(Debug, Error)]
pub enum PayoutApiError {
    #[error("Role {role} is not permitted to {capability}")]
    Forbidden { role: ApproverRole, capability: Capability },
    #[error(transparent)]
    Database(#[from] PayoutDbError),
}
