//! The pipeline handler inserted into every hooked channel.

use crate::connection::InterceptedConnection;
use crate::host::{Flow, PipelineHandler};
use crate::interceptor::Shared;
use hostlink_reflect::host::Value;
use std::sync::{Arc, Weak};

/// Routes a connection's traffic through the tracker and modifier chains.
///
/// Once the interceptor is gone the handler degrades to a pass-through.
pub(crate) struct InterceptHandler {
    shared: Weak<Shared>,
    connection: Arc<InterceptedConnection>,
}

impl InterceptHandler {
    pub(crate) fn new(shared: Weak<Shared>, connection: Arc<InterceptedConnection>) -> Self {
        Self { shared, connection }
    }
}

impl PipelineHandler for InterceptHandler {
    fn inbound(&self, message: Value) -> Flow {
        match self.shared.upgrade() {
            Some(shared) => shared.process_inbound(&self.connection, message),
            None => Flow::Continue(message),
        }
    }

    fn outbound(&self, message: Value) -> Flow {
        match self.shared.upgrade() {
            Some(shared) => shared.process_outbound(&self.connection, message),
            None => Flow::Continue(message),
        }
    }
}
