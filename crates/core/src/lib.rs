pub mod auth;
pub mod clock;
pub mod config;
pub mod demo;
pub mod fault;
pub mod metrics;
pub mod profile;
pub mod testing;
pub mod ticket;

pub use auth::{
    create_authenticator, ApiKeyAuthenticator, AuthError, AuthRequest, Authenticator, Identity,
    NoneAuthenticator,
};
pub use clock::{Clock, SystemClock};
pub use config::{
    load_config, load_config_from_str, validate_config, ApiKeyConfig, AuthMethod, Config,
    ConfigError, DatabaseBackend, LogFormat, SanitizedConfig,
};
pub use demo::{demo_tickets, seed_demo_data};
pub use fault::{FaultInjector, NoFaults, QueueOperation, RandomFaults};
pub use profile::{filter_by_professional_profile, ProfessionalProfile, ProfilePolicy};
pub use ticket::{
    DailyStats, ErrorKind, FinishReason, HistoryFilter, InMemoryTicketStore,
    IssueTicketRequest, NewTicket, PriorityClass, ProcedureType, QueuePolicy,
    SqliteTicketStore, Ticket, TicketError, TicketFilter, TicketQueue, TicketStatus, TicketStore,
};
