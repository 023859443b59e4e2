pub mod evolution;
pub mod loan;
pub mod pipeline;

pub use evolution::{default_sources, EvolutionSource, FreshExtraction, ReportSnapshot, StaleSnapshot};
pub use loan::{quote, BalanceSource, LoanCalculator, LoanOffer, LoanQuote};
pub use pipeline::{parse_limit, DashboardSnapshot, SyncPipeline};
