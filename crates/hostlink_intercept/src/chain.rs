//! Running a message through modifier chains.

use crate::connection::InterceptedConnection;
use crate::host::Message;
use crate::modifier::Verdict;
use crate::registry::{ModifierRegistry, Registration};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{error, trace};
use uuid::Uuid;

#[derive(Clone, Copy)]
enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    fn as_str(self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

/// The chains that apply to one message: global first, then the identity's
/// own chain once the identity is known.
fn chains_for(registry: &ModifierRegistry, identity: Option<Uuid>) -> Vec<Arc<Vec<Registration>>> {
    let mut chains = vec![registry.global().snapshot()];
    if let Some(chain) = identity.and_then(|id| registry.specific(&id)) {
        chains.push(chain.snapshot());
    }
    chains
}

pub(crate) fn run_inbound(
    registry: &ModifierRegistry,
    identity: Option<Uuid>,
    source: &InterceptedConnection,
    message: Message,
) -> Verdict {
    run(registry, identity, source.id(), Direction::Inbound, message, |r, msg| {
        r.modifier.modify_inbound(identity, source, msg)
    })
}

pub(crate) fn run_outbound(
    registry: &ModifierRegistry,
    identity: Option<Uuid>,
    connection: u64,
    message: Message,
) -> Verdict {
    run(registry, identity, connection, Direction::Outbound, message, |r, msg| {
        r.modifier.modify_outbound(identity, msg)
    })
}

fn run<F>(
    registry: &ModifierRegistry,
    identity: Option<Uuid>,
    connection: u64,
    direction: Direction,
    mut message: Message,
    apply: F,
) -> Verdict
where
    F: Fn(&Registration, Message) -> anyhow::Result<Verdict>,
{
    for chain in chains_for(registry, identity) {
        for registration in chain.iter() {
            let outcome = catch_unwind(AssertUnwindSafe(|| apply(registration, message.clone())));
            match outcome {
                Ok(Ok(Verdict::Forward(next))) => message = next,
                Ok(Ok(Verdict::Terminate)) => {
                    trace!(
                        connection,
                        modifier = registration.modifier.name(),
                        "{} message terminated",
                        direction.as_str()
                    );
                    return Verdict::Terminate;
                }
                Ok(Err(e)) => {
                    error!(
                        connection,
                        identity = ?identity,
                        modifier = registration.modifier.name(),
                        "❌ {} modifier failed, passing message through: {:#}",
                        direction.as_str(),
                        e
                    );
                }
                Err(panic) => {
                    error!(
                        connection,
                        identity = ?identity,
                        modifier = registration.modifier.name(),
                        "💥 {} modifier panicked, passing message through: {}",
                        direction.as_str(),
                        panic_message(&panic)
                    );
                }
            }
        }
    }
    Verdict::Forward(message)
}

fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
