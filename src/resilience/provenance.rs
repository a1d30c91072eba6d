//! # Error Provenance
//!
//! The same driver failure type is produced by connections to ReadySet and by
//! connections to the upstream database, so the type alone cannot tell the
//! health monitor where a failure came from. The ReadySet adapter marks the
//! root cause of every error it produces; classification later walks back to
//! that root, however many layers of context were added in between.

use std::error::Error;

use crate::database::DatabaseError;

/// Follow `source()` links until none remain
pub fn root_cause<'a>(error: &'a (dyn Error + 'static)) -> &'a (dyn Error + 'static) {
    let mut current = error;
    while let Some(source) = current.source() {
        current = source;
    }
    current
}

/// Mark the root cause of `error` as a ReadySet failure.
///
/// Only a [`DatabaseError`] root is marked; wrappers are never touched and
/// other root types are left alone. Marking is idempotent.
pub fn annotate_error(error: &(dyn Error + 'static)) {
    if let Some(root) = root_cause(error).downcast_ref::<DatabaseError>() {
        root.mark_from_readyset();
    }
}

/// True when the root cause is a ReadySet connectivity failure, the only kind
/// of error that counts against ReadySet's health
pub fn is_readyset_connection_error(error: &(dyn Error + 'static)) -> bool {
    root_cause(error)
        .downcast_ref::<DatabaseError>()
        .is_some_and(|root| root.kind().is_connectivity() && root.is_from_readyset())
}
