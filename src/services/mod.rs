/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Host operations driving the session state machine.
pub mod host_service;
/// Join-code allocation on top of the store's unique reservations.
pub mod join_code;
/// Player operations: join, answer submission and reveal long-polls.
pub mod player_service;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events streaming service.
pub mod sse_service;
/// Storage connection supervisor toggling degraded mode.
pub mod storage_supervisor;
