pub mod health;
pub mod issue;
pub mod proxy;
pub mod revoke;
pub mod serve;
pub mod validate;
