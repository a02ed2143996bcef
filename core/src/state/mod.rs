//! Account-based world state: accounts, per-account storage, contract
//! code and the live objects tying them together (§4.2).

mod account;
mod code_store;
mod db;
mod object;

pub use account::{Account, AddressedAccount};
pub use code_store::CodeStore;
pub use db::StateDB;
pub use object::StateObject;
