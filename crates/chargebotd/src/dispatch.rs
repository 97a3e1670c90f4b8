//! Maps protocol commands onto the session manager

use chargebot_api::{Command, ErrorInfo, HealthStatus, Response, ResponsePayload};
use chargebot_core::{RequestOutcome, SessionManager};
use chargebot_util::{ChargeError, ClientId};
use tracing::debug;

/// Run one command and build its reply.
///
/// Never blocks: every manager operation returns without waiting on I/O.
pub fn handle_command(
    manager: &SessionManager,
    client_id: &ClientId,
    subscribers: usize,
    request_id: u64,
    command: Command,
) -> Response {
    debug!(client_id = %client_id, request_id, command = ?command, "Handling command");

    let result = match command {
        Command::CheckIn { user_id } => manager
            .check_in(&user_id)
            .map(|admission| ResponsePayload::CheckedIn {
                grace_ends_at: admission.grace_ends_at,
            }),

        Command::Request { user_id } => manager.request(&user_id).map(|outcome| match outcome {
            RequestOutcome::CheckedIn(admission) => ResponsePayload::CheckedIn {
                grace_ends_at: admission.grace_ends_at,
            },
            RequestOutcome::Queued { position } => ResponsePayload::Queued { position },
        }),

        Command::EndEarly { user_id } => manager
            .end_early(&user_id)
            .map(|promoted| ResponsePayload::Ended { promoted }),

        Command::LeaveQueue { user_id } => manager
            .leave_queue(&user_id)
            .map(|()| ResponsePayload::LeftQueue),

        Command::Status => Ok(ResponsePayload::Status(manager.status())),

        Command::SubscribeEvents => Ok(ResponsePayload::Subscribed {
            client_id: client_id.clone(),
        }),

        Command::UnsubscribeEvents => Ok(ResponsePayload::Unsubscribed),

        Command::GetHealth => Ok(ResponsePayload::Health(HealthStatus {
            live: true,
            version: env!("CARGO_PKG_VERSION").to_string(),
            subscribers,
        })),

        Command::Ping => Ok(ResponsePayload::Pong),
    };

    into_response(request_id, result)
}

fn into_response(request_id: u64, result: Result<ResponsePayload, ChargeError>) -> Response {
    match result {
        Ok(payload) => Response::success(request_id, payload),
        Err(e) => {
            debug!(request_id, error = %e, "Command refused");
            Response::error(request_id, ErrorInfo::from(&e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chargebot_api::{ErrorCode, Phase, ResponseResult};
    use chargebot_config::Timing;
    use chargebot_core::{RecordingNotifier, Timer};
    use chargebot_util::UserId;
    use std::sync::Arc;

    fn manager() -> SessionManager {
        SessionManager::new(
            Timing::default(),
            Timer::current().unwrap(),
            Arc::new(RecordingNotifier::new()),
        )
    }

    fn user(id: &str) -> UserId {
        UserId::parse(id).unwrap()
    }

    fn run(manager: &SessionManager, command: Command) -> ResponseResult {
        handle_command(manager, &ClientId::new(), 0, 1, command).result
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_then_queue() {
        let manager = manager();

        assert!(matches!(
            run(&manager, Command::Request { user_id: user("A") }),
            ResponseResult::Ok(ResponsePayload::CheckedIn { .. })
        ));
        assert!(matches!(
            run(&manager, Command::Request { user_id: user("B") }),
            ResponseResult::Ok(ResponsePayload::Queued { position: 1 })
        ));

        match run(&manager, Command::EndEarly { user_id: user("A") }) {
            ResponseResult::Ok(ResponsePayload::Ended { promoted }) => {
                assert_eq!(promoted, Some(user("B")));
            }
            other => panic!("unexpected result: {:?}", other),
        }

        match run(&manager, Command::Status) {
            ResponseResult::Ok(ResponsePayload::Status(snapshot)) => {
                let holder = snapshot.holder.unwrap();
                assert_eq!(holder.user_id, user("B"));
                assert_eq!(holder.phase, Phase::Grace);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_refusals_carry_codes() {
        let manager = manager();
        manager.check_in(&user("A")).unwrap();

        let cases = [
            (Command::CheckIn { user_id: user("B") }, ErrorCode::ResourceBusy),
            (Command::Request { user_id: user("A") }, ErrorCode::AlreadyHolder),
            (Command::EndEarly { user_id: user("B") }, ErrorCode::NotHolder),
            (Command::LeaveQueue { user_id: user("B") }, ErrorCode::NotQueued),
        ];

        for (command, code) in cases {
            match run(&manager, command) {
                ResponseResult::Err(e) => assert_eq!(e.code, code),
                other => panic!("expected {:?}, got {:?}", code, other),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_reports_subscribers() {
        let manager = manager();
        let response = handle_command(&manager, &ClientId::new(), 3, 9, Command::GetHealth);

        assert_eq!(response.request_id, 9);
        match response.result {
            ResponseResult::Ok(ResponsePayload::Health(health)) => {
                assert!(health.live);
                assert_eq!(health.subscribers, 3);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
