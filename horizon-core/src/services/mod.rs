//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Every
//! privileged operation takes the scope that authorizes it; services
//! never look up an ambient current user.

mod accounts;
pub mod event_log;
mod link;
mod pager;
mod refresh;
mod registry;
mod session;
mod status;
mod transactions;

pub use accounts::{AccountService, AccountsSummary};
pub use event_log::{EntryPoint, EventLogService, LogEntry, LogEvent};
pub use link::{Handshake, HandshakePhase, LinkService};
pub use pager::{paginate, TransactionPage};
pub use refresh::{ItemRefreshResult, RefreshResult, RefreshService};
pub use registry::RegistryService;
pub use session::{generate_admin_key, SessionService, SignIn};
pub use status::{DateRange, StatusService, StatusSummary};
pub use transactions::TransactionService;
