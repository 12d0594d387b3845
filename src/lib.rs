//! Account ledger chaincode for EV charging payments.
//!
//! An e-mobility provider (EMP) pays a charge point operator (CPO) for a
//! charging session. Every payment moves an integer amount of euro cents from
//! the payer's account record to the payee's and appends the session to both
//! histories. Records live in a key-value state store owned by the host
//! ledger:
//!
//! * [`ledger`] — the `Account` / `Transaction` records and the balance
//!   arithmetic applied to them.
//! * [`store`] — the [`StateStore`] contract plus an in-memory and a
//!   file-backed implementation.
//! * [`chaincode`] — [`AccountLedger`], the adapter that turns `init`,
//!   `invoke` and `query` calls into reads, arithmetic and writes.
//!
//! Ordering, consensus and concurrency are the host's job; each invocation
//! runs to completion before the next one starts.

pub mod chaincode;
pub mod ledger;
pub mod store;

mod error;

pub use chaincode::{AccountLedger, Function};
pub use error::ChaincodeError;
pub use ledger::{Account, AccountKey, Amount, Transaction};
pub use store::{FileStore, MemoryStore, StateStore, StoreError};
