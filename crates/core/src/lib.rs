pub mod dates;
pub mod member;
pub mod money;
pub mod settings;
pub mod text;

pub use member::{normalize_cpf, BalanceView, EvolutionPoint, MemberRecord};
pub use money::{format_currency, parse_decimal, parse_percentage};
pub use settings::{EvolutionLayout, Settings, SettingsError, SheetTarget};
pub use text::{find_column, find_column_index, normalize, resolve_sheet};
