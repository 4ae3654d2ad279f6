//! Pseudo-legality screening and the authoritative rules-oracle boundary.
//!
//! Screening is deliberately permissive: it exists so premoves can be
//! filtered before it is the player's turn, when legal-move enumeration is
//! unavailable. The oracle is the final gate at drain time.

pub mod oracle;
pub mod plausible;

mod shakmaty_oracle;

pub use oracle::{rules_error, RulesOracle, Terminal};
pub use plausible::is_plausible;
pub use shakmaty_oracle::ShakmatyOracle;
