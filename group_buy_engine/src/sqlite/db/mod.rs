pub mod groups;
pub mod ledger;
pub mod memberships;
pub mod products;
